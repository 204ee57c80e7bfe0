//! Domain models for dispatch-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// Order Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
    PaymentFailed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::PaymentFailed => "payment_failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "pending" => Self::Pending,
            "confirmed" => Self::Confirmed,
            "processing" => Self::Processing,
            "shipped" => Self::Shipped,
            "delivered" => Self::Delivered,
            "completed" => Self::Completed,
            "cancelled" => Self::Cancelled,
            "payment_failed" => Self::PaymentFailed,
            other => {
                tracing::warn!(status = %other, "Unknown order status, defaulting to pending");
                Self::Pending
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    ProductPurchase,
    ServiceBooking,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductPurchase => "product_purchase",
            Self::ServiceBooking => "service_booking",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "service_booking" => Self::ServiceBooking,
            _ => Self::ProductPurchase,
        }
    }
}

/// Order lifecycle events a subscriber can listen for.
///
/// Unlike the status enums, parsing is strict: an unknown event string must
/// be rejected at the trigger boundary, never coerced to a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    OrderCreated,
    OrderUpdated,
    OrderCancelled,
    OrderCompleted,
    OrderConfirmed,
    OrderPaymentUpdated,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderCreated => "order.created",
            Self::OrderUpdated => "order.updated",
            Self::OrderCancelled => "order.cancelled",
            Self::OrderCompleted => "order.completed",
            Self::OrderConfirmed => "order.confirmed",
            Self::OrderPaymentUpdated => "order.payment_updated",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "order.created" => Some(Self::OrderCreated),
            "order.updated" => Some(Self::OrderUpdated),
            "order.cancelled" => Some(Self::OrderCancelled),
            "order.completed" => Some(Self::OrderCompleted),
            "order.confirmed" => Some(Self::OrderConfirmed),
            "order.payment_updated" => Some(Self::OrderPaymentUpdated),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Order Models
// ============================================================================

/// Row shape for the `orders` table joined with the customer profile.
#[derive(Debug, Clone, FromRow)]
pub struct OrderRow {
    pub order_id: Uuid,
    pub partner_id: Uuid,
    pub customer_id: Uuid,
    pub status: String,
    pub order_type: String,
    pub iva_rate: Decimal,
    pub iva_included_in_price: bool,
    pub shipping_cost: Decimal,
    pub payment_method: Option<String>,
    pub payment_id: Option<String>,
    pub payment_status: Option<String>,
    pub payment_preference_id: Option<String>,
    pub booking_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub appointment_date: Option<NaiveDate>,
    pub appointment_time: Option<String>,
    pub pet_id: Option<Uuid>,
    pub booking_notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
    pub customer_full_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct OrderItem {
    pub item_id: Uuid,
    pub order_id: Uuid,
    pub name: String,
    /// Unit price as stored (tax-aware per the order's convention).
    pub price: Decimal,
    /// Pre-discount unit price; falls back to `price` when absent.
    pub original_price: Option<Decimal>,
    pub quantity: i32,
    pub discount_percentage: Option<Decimal>,
    /// Per-item override of the order-level tax rate.
    pub iva_rate: Option<Decimal>,
    pub partner_id: Option<Uuid>,
    pub position: i32,
}

impl OrderItem {
    /// Quantity clamped to a minimum of 1.
    pub fn effective_quantity(&self) -> u32 {
        if self.quantity < 1 {
            1
        } else {
            self.quantity as u32
        }
    }

    pub fn effective_unit_price(&self) -> Decimal {
        self.original_price.unwrap_or(self.price)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerInfo {
    pub customer_id: Uuid,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Fully loaded order aggregate: row, customer snapshot and ordered items.
#[derive(Debug, Clone)]
pub struct Order {
    pub order_id: Uuid,
    pub partner_id: Uuid,
    pub customer: CustomerInfo,
    pub status: OrderStatus,
    pub order_type: OrderType,
    pub iva_rate: Decimal,
    pub iva_included_in_price: bool,
    pub shipping_cost: Decimal,
    pub payment_method: Option<String>,
    pub payment_id: Option<String>,
    pub payment_status: Option<String>,
    pub payment_preference_id: Option<String>,
    pub booking_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub appointment_date: Option<NaiveDate>,
    pub appointment_time: Option<String>,
    pub pet_id: Option<Uuid>,
    pub booking_notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn from_parts(row: OrderRow, items: Vec<OrderItem>) -> Self {
        Self {
            order_id: row.order_id,
            partner_id: row.partner_id,
            customer: CustomerInfo {
                customer_id: row.customer_id,
                full_name: row.customer_full_name,
                email: row.customer_email,
                phone: row.customer_phone,
            },
            status: OrderStatus::from_str(&row.status),
            order_type: OrderType::from_str(&row.order_type),
            iva_rate: row.iva_rate,
            iva_included_in_price: row.iva_included_in_price,
            shipping_cost: row.shipping_cost,
            payment_method: row.payment_method,
            payment_id: row.payment_id,
            payment_status: row.payment_status,
            payment_preference_id: row.payment_preference_id,
            booking_id: row.booking_id,
            service_id: row.service_id,
            appointment_date: row.appointment_date,
            appointment_time: row.appointment_time,
            pet_id: row.pet_id,
            booking_notes: row.booking_notes,
            created_utc: row.created_utc,
            updated_utc: row.updated_utc,
            items,
        }
    }

    /// Tax rate for an item, honoring the per-item override.
    pub fn item_iva_rate(&self, item: &OrderItem) -> Decimal {
        item.iva_rate.unwrap_or(self.iva_rate)
    }

    pub fn is_free(&self) -> bool {
        self.payment_method.as_deref() == Some("free")
    }
}

// ============================================================================
// Partner Models
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct Partner {
    pub partner_id: Uuid,
    pub business_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    /// Platform cut of the tax-exclusive subtotal; the configured default
    /// applies when absent.
    pub commission_percentage: Option<Decimal>,
}

// ============================================================================
// Webhook Subscription Models
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct WebhookSubscription {
    pub subscription_id: Uuid,
    pub webhook_url: String,
    pub secret_key: String,
    pub events: Vec<String>,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl WebhookSubscription {
    pub fn subscribes_to(&self, event: EventType) -> bool {
        self.events.iter().any(|e| e == event.as_str())
    }
}

// ============================================================================
// Delivery Audit Models
// ============================================================================

/// Which audit table an attempt record lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryChannel {
    Webhook,
    Crm,
}

impl DeliveryChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::Crm => "crm",
        }
    }
}

impl std::fmt::Display for DeliveryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One append-only audit row per delivery attempt. Never updated or deleted.
#[derive(Debug, Clone)]
pub struct DeliveryLogRecord {
    pub log_id: Uuid,
    pub channel: DeliveryChannel,
    pub subscription_id: Option<Uuid>,
    pub order_id: Uuid,
    pub event: String,
    pub payload: String,
    /// HTTP status of the attempt; 0 for transport-level failures.
    pub response_status: i32,
    pub response_body: Option<String>,
    pub attempt_number: i32,
    pub success: bool,
    pub created_utc: DateTime<Utc>,
}

impl DeliveryLogRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn attempt(
        channel: DeliveryChannel,
        subscription_id: Option<Uuid>,
        order_id: Uuid,
        event: EventType,
        payload: &str,
        response_status: i32,
        response_body: Option<String>,
        attempt_number: u32,
        success: bool,
    ) -> Self {
        Self {
            log_id: Uuid::new_v4(),
            channel,
            subscription_id,
            order_id,
            event: event.as_str().to_string(),
            payload: payload.to_string(),
            response_status,
            response_body,
            attempt_number: attempt_number as i32,
            success,
            created_utc: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_status_string_falls_back_to_pending() {
        assert_eq!(OrderStatus::from_str("limbo"), OrderStatus::Pending);
        assert_eq!(OrderStatus::from_str("shipped"), OrderStatus::Shipped);
    }

    #[test]
    fn test_event_type_parsing_is_strict() {
        assert_eq!(
            EventType::from_str("order.created"),
            Some(EventType::OrderCreated)
        );
        assert_eq!(EventType::from_str("order.limbo"), None);
    }
}
