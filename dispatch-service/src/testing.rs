//! Shared test fixtures and an in-memory [`DispatchStore`] double.

use crate::error::AppError;
use crate::models::{
    CustomerInfo, DeliveryLogRecord, EventType, Order, OrderItem, OrderStatus, OrderType, Partner,
    WebhookSubscription,
};
use crate::services::database::DispatchStore;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Mutex;
use uuid::Uuid;

/// In-memory store: orders and partners seeded up front, audit rows
/// collected for assertions.
#[derive(Default)]
pub struct InMemoryStore {
    orders: Mutex<Vec<Order>>,
    partners: Mutex<Vec<Partner>>,
    subscriptions: Mutex<Vec<WebhookSubscription>>,
    logs: Mutex<Vec<DeliveryLogRecord>>,
}

impl InMemoryStore {
    pub fn with_order(self, order: Order) -> Self {
        self.orders.lock().unwrap().push(order);
        self
    }

    pub fn with_partner(self, partner: Partner) -> Self {
        self.partners.lock().unwrap().push(partner);
        self
    }

    pub fn add_subscription(&self, subscription: WebhookSubscription) {
        self.subscriptions.lock().unwrap().push(subscription);
    }

    pub fn delivery_logs(&self) -> Vec<DeliveryLogRecord> {
        self.logs.lock().unwrap().clone()
    }
}

#[async_trait]
impl DispatchStore for InMemoryStore {
    async fn load_order(&self, order_id: Uuid) -> Result<Option<Order>, AppError> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.order_id == order_id)
            .cloned())
    }

    async fn load_partners(&self, partner_ids: &[Uuid]) -> Result<Vec<Partner>, AppError> {
        Ok(self
            .partners
            .lock()
            .unwrap()
            .iter()
            .filter(|p| partner_ids.contains(&p.partner_id))
            .cloned()
            .collect())
    }

    async fn active_subscriptions(
        &self,
        event: EventType,
    ) -> Result<Vec<WebhookSubscription>, AppError> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.is_active && s.subscribes_to(event))
            .cloned()
            .collect())
    }

    async fn append_delivery_log(&self, record: &DeliveryLogRecord) -> Result<(), AppError> {
        self.logs.lock().unwrap().push(record.clone());
        Ok(())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn untagged_item(name: &str, price: Decimal, quantity: i32) -> OrderItem {
    OrderItem {
        item_id: Uuid::new_v4(),
        order_id: Uuid::nil(),
        name: name.to_string(),
        price,
        original_price: None,
        quantity,
        discount_percentage: None,
        iva_rate: None,
        partner_id: None,
        position: 0,
    }
}

pub fn tagged_item(name: &str, price: Decimal, quantity: i32, partner_id: Uuid) -> OrderItem {
    OrderItem {
        partner_id: Some(partner_id),
        ..untagged_item(name, price, quantity)
    }
}

/// Confirmed product-purchase order: 22% IVA added on top of listed prices.
pub fn order_with_items(partner_id: Uuid, items: Vec<OrderItem>) -> Order {
    let order_id = Uuid::new_v4();
    let now = Utc::now();
    let items = items
        .into_iter()
        .enumerate()
        .map(|(i, mut item)| {
            item.order_id = order_id;
            item.position = i as i32;
            item
        })
        .collect();

    Order {
        order_id,
        partner_id,
        customer: CustomerInfo {
            customer_id: Uuid::new_v4(),
            full_name: Some("Test Customer".to_string()),
            email: Some("customer@example.com".to_string()),
            phone: None,
        },
        status: OrderStatus::Confirmed,
        order_type: OrderType::ProductPurchase,
        iva_rate: dec!(22),
        iva_included_in_price: false,
        shipping_cost: Decimal::ZERO,
        payment_method: Some("card".to_string()),
        payment_id: Some("pay_123".to_string()),
        payment_status: Some("approved".to_string()),
        payment_preference_id: None,
        booking_id: None,
        service_id: None,
        appointment_date: None,
        appointment_time: None,
        pet_id: None,
        booking_notes: None,
        created_utc: now,
        updated_utc: now,
        items,
    }
}

pub fn service_booking_order() -> Order {
    let partner_id = Uuid::new_v4();
    let mut order = order_with_items(partner_id, vec![untagged_item("Grooming", dec!(45), 1)]);
    order.order_type = OrderType::ServiceBooking;
    order.booking_id = Some(Uuid::new_v4());
    order.service_id = Some(Uuid::new_v4());
    order.appointment_date = NaiveDate::from_ymd_opt(2026, 9, 14);
    order.appointment_time = Some("10:30".to_string());
    order.pet_id = Some(Uuid::new_v4());
    order.booking_notes = Some("Side gate".to_string());
    order
}

pub fn partner(partner_id: Uuid, commission_percentage: Option<Decimal>) -> Partner {
    Partner {
        partner_id,
        business_name: "Test Partner".to_string(),
        email: Some("partner@example.com".to_string()),
        phone: None,
        address: None,
        city: None,
        commission_percentage,
    }
}

pub fn subscription(url: &str, events: &[&str]) -> WebhookSubscription {
    let now = Utc::now();
    WebhookSubscription {
        subscription_id: Uuid::new_v4(),
        webhook_url: url.to_string(),
        secret_key: "sub_secret".to_string(),
        events: events.iter().map(|e| e.to_string()).collect(),
        is_active: true,
        created_utc: now,
        updated_utc: now,
    }
}
