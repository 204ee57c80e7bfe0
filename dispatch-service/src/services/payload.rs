//! Externally-facing dispatch payload assembly.
//!
//! Folds the per-partner ledger and order-level shipping/payment/booking
//! metadata into the single JSON document that gets signed and transmitted.
//! Monetary values are rounded to 2dp here and nowhere else; the serialized
//! string is produced once by the caller and reused byte-for-byte for both
//! signing and transmission.

use crate::error::AppError;
use crate::models::{CustomerInfo, EventType, Order, OrderType};
use crate::services::ledger::PartnerLedgerEntry;
use crate::services::tax::compute_item_financials;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct DispatchPayload {
    pub event: String,
    pub order_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub data: OrderData,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderData {
    pub id: Uuid,
    pub status: String,
    pub customer: CustomerInfo,
    pub partners: Vec<PartnerEntry>,
    pub totals: OrderTotals,
    #[serde(flatten)]
    pub fulfillment: FulfillmentInfo,
    pub payment_info: PaymentInfo,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order-type-specific block, discriminated on `order_type` in the JSON.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "order_type", rename_all = "snake_case")]
pub enum FulfillmentInfo {
    ProductPurchase { shipping_info: ShippingInfo },
    ServiceBooking { booking_info: BookingInfo },
}

#[derive(Debug, Clone, Serialize)]
pub struct ShippingInfo {
    /// Shipping cost as stored on the order (tax-aware per its convention).
    pub cost: Decimal,
    pub subtotal_ex_tax: Decimal,
    pub iva_amount: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingInfo {
    pub booking_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pet_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preference_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub iva_amount: Decimal,
    pub total_commission: Decimal,
    pub total_partner_amount: Decimal,
    pub shipping_total: Decimal,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PartnerEntry {
    pub partner: PartnerContact,
    pub is_primary: bool,
    pub items: Vec<ItemEntry>,
    pub subtotal: Decimal,
    pub iva_amount: Decimal,
    pub commission_amount: Decimal,
    pub partner_amount: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PartnerContact {
    pub partner_id: Uuid,
    pub business_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    pub commission_percentage: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemEntry {
    pub name: String,
    pub quantity: u32,
    pub price: Decimal,
    pub subtotal: Decimal,
    pub iva_amount: Decimal,
    pub discount_amount: Decimal,
    pub total: Decimal,
}

/// Assemble the dispatch payload for an order and its computed ledger.
///
/// Shipping participates in the same included/excluded tax convention as
/// items, and the grand total always folds in the tax-adjusted shipping
/// total. Service bookings carry a booking block instead of shipping and
/// must have their booking fields populated.
pub fn assemble(
    order: &Order,
    entries: &[PartnerLedgerEntry],
    event: EventType,
    now: DateTime<Utc>,
) -> Result<DispatchPayload, AppError> {
    let mut subtotal = Decimal::ZERO;
    let mut iva_amount = Decimal::ZERO;
    let mut total_commission = Decimal::ZERO;
    let mut total_partner_amount = Decimal::ZERO;

    for entry in entries {
        subtotal += entry.subtotal;
        iva_amount += entry.iva_amount;
        total_commission += entry.commission_amount;
        total_partner_amount += entry.partner_amount;
    }
    let items_total = subtotal + iva_amount;

    let (fulfillment, shipping_total) = match order.order_type {
        OrderType::ProductPurchase => {
            let shipping = compute_item_financials(
                order.shipping_cost,
                1,
                order.iva_rate,
                Decimal::ZERO,
                order.iva_included_in_price,
            );
            (
                FulfillmentInfo::ProductPurchase {
                    shipping_info: ShippingInfo {
                        cost: order.shipping_cost.round_dp(2),
                        subtotal_ex_tax: shipping.subtotal_ex_tax.round_dp(2),
                        iva_amount: shipping.iva_amount.round_dp(2),
                        total: shipping.total.round_dp(2),
                    },
                },
                shipping.total,
            )
        }
        OrderType::ServiceBooking => {
            let booking_id = order.booking_id.ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "Service booking order {} has no booking_id",
                    order.order_id
                ))
            })?;
            (
                FulfillmentInfo::ServiceBooking {
                    booking_info: BookingInfo {
                        booking_id,
                        service_id: order.service_id,
                        appointment_date: order.appointment_date,
                        appointment_time: order.appointment_time.clone(),
                        pet_id: order.pet_id,
                        notes: order.booking_notes.clone(),
                    },
                },
                Decimal::ZERO,
            )
        }
    };

    let totals = OrderTotals {
        subtotal: subtotal.round_dp(2),
        iva_amount: iva_amount.round_dp(2),
        total_commission: total_commission.round_dp(2),
        total_partner_amount: total_partner_amount.round_dp(2),
        shipping_total: shipping_total.round_dp(2),
        total_amount: (items_total + shipping_total).round_dp(2),
    };

    Ok(DispatchPayload {
        event: event.as_str().to_string(),
        order_id: order.order_id,
        timestamp: now,
        data: OrderData {
            id: order.order_id,
            status: order.status.as_str().to_string(),
            customer: order.customer.clone(),
            partners: entries.iter().map(partner_entry).collect(),
            totals,
            fulfillment,
            payment_info: PaymentInfo {
                method: order.payment_method.clone(),
                payment_id: order.payment_id.clone(),
                status: order.payment_status.clone(),
                preference_id: order.payment_preference_id.clone(),
            },
            created_at: order.created_utc,
            updated_at: order.updated_utc,
        },
    })
}

fn partner_entry(entry: &PartnerLedgerEntry) -> PartnerEntry {
    PartnerEntry {
        partner: PartnerContact {
            partner_id: entry.partner.partner_id,
            business_name: entry.partner.business_name.clone(),
            email: entry.partner.email.clone(),
            phone: entry.partner.phone.clone(),
            address: entry.partner.address.clone(),
            city: entry.partner.city.clone(),
            commission_percentage: entry.partner.commission_percentage,
        },
        is_primary: entry.is_primary,
        items: entry
            .items
            .iter()
            .map(|i| ItemEntry {
                name: i.name.clone(),
                quantity: i.quantity,
                price: i.unit_price_ex_tax.round_dp(2),
                subtotal: i.subtotal.round_dp(2),
                iva_amount: i.iva_amount.round_dp(2),
                discount_amount: i.discount_amount.round_dp(2),
                total: i.total.round_dp(2),
            })
            .collect(),
        subtotal: entry.subtotal.round_dp(2),
        iva_amount: entry.iva_amount.round_dp(2),
        commission_amount: entry.commission_amount.round_dp(2),
        partner_amount: entry.partner_amount.round_dp(2),
        total: entry.total.round_dp(2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ledger::build_ledger;
    use crate::testing::{order_with_items, partner, service_booking_order, untagged_item};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn test_product_order_folds_shipping_into_total() {
        let primary = Uuid::new_v4();
        let mut order = order_with_items(primary, vec![untagged_item("Bed", dec!(100), 1)]);
        order.shipping_cost = dec!(10);
        let partners = vec![partner(primary, Some(dec!(5)))];
        let entries = build_ledger(&order, &partners, dec!(5));

        let payload = assemble(&order, &entries, EventType::OrderCreated, Utc::now()).unwrap();

        // 22% added on top: items 122, shipping 12.20.
        assert_eq!(payload.data.totals.subtotal, dec!(100.00));
        assert_eq!(payload.data.totals.iva_amount, dec!(22.00));
        assert_eq!(payload.data.totals.shipping_total, dec!(12.20));
        assert_eq!(payload.data.totals.total_amount, dec!(134.20));

        match &payload.data.fulfillment {
            FulfillmentInfo::ProductPurchase { shipping_info } => {
                assert_eq!(shipping_info.cost, dec!(10.00));
                assert_eq!(shipping_info.iva_amount, dec!(2.20));
            }
            other => panic!("expected product fulfillment, got {:?}", other),
        }
    }

    #[test]
    fn test_service_order_zeroes_shipping_and_carries_booking() {
        let order = service_booking_order();
        let partners = vec![partner(order.partner_id, Some(dec!(5)))];
        let entries = build_ledger(&order, &partners, dec!(5));

        let payload = assemble(&order, &entries, EventType::OrderConfirmed, Utc::now()).unwrap();

        assert_eq!(payload.data.totals.shipping_total, Decimal::ZERO);
        match &payload.data.fulfillment {
            FulfillmentInfo::ServiceBooking { booking_info } => {
                assert_eq!(Some(booking_info.booking_id), order.booking_id);
                assert!(booking_info.appointment_date.is_some());
            }
            other => panic!("expected service fulfillment, got {:?}", other),
        }

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["data"]["order_type"], "service_booking");
        assert!(json["data"].get("shipping_info").is_none());
        assert!(json["data"]["booking_info"].is_object());
        assert!(json["data"]["payment_info"].is_object());
    }

    #[test]
    fn test_service_order_without_booking_id_is_rejected() {
        let mut order = service_booking_order();
        order.booking_id = None;
        let partners = vec![partner(order.partner_id, Some(dec!(5)))];
        let entries = build_ledger(&order, &partners, dec!(5));

        assert!(assemble(&order, &entries, EventType::OrderCreated, Utc::now()).is_err());
    }

    #[test]
    fn test_totals_sum_ledger_entries() {
        let primary = Uuid::new_v4();
        let order = order_with_items(
            primary,
            vec![
                untagged_item("A", dec!(19.99), 2),
                untagged_item("B", dec!(5.25), 4),
            ],
        );
        let partners = vec![partner(primary, Some(dec!(7.5)))];
        let entries = build_ledger(&order, &partners, dec!(5));

        let payload = assemble(&order, &entries, EventType::OrderUpdated, Utc::now()).unwrap();
        let t = &payload.data.totals;
        assert_eq!(
            t.total_commission + t.total_partner_amount,
            t.subtotal
        );
        assert_eq!(payload.data.partners.len(), 1);
    }

    #[test]
    fn test_serialized_payload_is_stable() {
        let primary = Uuid::new_v4();
        let order = order_with_items(primary, vec![untagged_item("A", dec!(10), 1)]);
        let partners = vec![partner(primary, Some(dec!(5)))];
        let entries = build_ledger(&order, &partners, dec!(5));
        let now = Utc::now();

        let a = assemble(&order, &entries, EventType::OrderCreated, now).unwrap();
        let b = assemble(&order, &entries, EventType::OrderCreated, now).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
