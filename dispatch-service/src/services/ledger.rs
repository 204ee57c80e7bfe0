//! Per-partner financial ledger construction.
//!
//! Groups an order's items by owning partner, runs the tax computation over
//! each line and produces one ledger entry per partner. Entries are computed
//! fresh on every dispatch and never cached.

use crate::models::{Order, OrderItem, Partner};
use crate::services::tax::{compute_item_financials, ItemFinancials};
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

/// An order line enriched with its computed financials.
#[derive(Debug, Clone)]
pub struct LedgerItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price_ex_tax: Decimal,
    pub subtotal: Decimal,
    pub iva_amount: Decimal,
    pub discount_amount: Decimal,
    pub total: Decimal,
}

/// Contact snapshot of the partner a ledger entry belongs to.
#[derive(Debug, Clone)]
pub struct PartnerSnapshot {
    pub partner_id: Uuid,
    pub business_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    /// Effective commission rate applied to this entry.
    pub commission_percentage: Decimal,
}

/// Computed financial breakdown for one partner within one order.
#[derive(Debug, Clone)]
pub struct PartnerLedgerEntry {
    pub partner: PartnerSnapshot,
    pub is_primary: bool,
    pub items: Vec<LedgerItem>,
    pub subtotal: Decimal,
    pub iva_amount: Decimal,
    pub commission_amount: Decimal,
    pub partner_amount: Decimal,
    pub total: Decimal,
}

/// Build the per-partner ledger for an order.
///
/// Partner ids are taken from the items' partner tags in order of first
/// appearance; an order with no tagged items attributes everything to its
/// primary `partner_id`. A partner id with no matching partner record is
/// skipped with a warning, never fatal.
pub fn build_ledger(
    order: &Order,
    partners: &[Partner],
    default_commission: Decimal,
) -> Vec<PartnerLedgerEntry> {
    let by_id: HashMap<Uuid, &Partner> =
        partners.iter().map(|p| (p.partner_id, p)).collect();

    let tagged = order.items.iter().any(|i| i.partner_id.is_some());
    let partner_ids = if tagged {
        let mut seen = Vec::new();
        for item in &order.items {
            if let Some(pid) = item.partner_id {
                if !seen.contains(&pid) {
                    seen.push(pid);
                }
            }
        }
        seen
    } else {
        vec![order.partner_id]
    };

    let mut entries = Vec::with_capacity(partner_ids.len());

    for pid in partner_ids {
        let Some(partner) = by_id.get(&pid) else {
            tracing::warn!(
                order_id = %order.order_id,
                partner_id = %pid,
                "Partner record missing, skipping ledger entry"
            );
            continue;
        };

        let items: Vec<&OrderItem> = if tagged {
            order
                .items
                .iter()
                .filter(|i| i.partner_id == Some(pid))
                .collect()
        } else {
            order.items.iter().collect()
        };

        let mut subtotal = Decimal::ZERO;
        let mut iva_amount = Decimal::ZERO;
        let mut ledger_items = Vec::with_capacity(items.len());

        for item in items {
            let financials = compute_line(order, item);
            subtotal += financials.subtotal_ex_tax;
            iva_amount += financials.iva_amount;
            ledger_items.push(LedgerItem {
                name: item.name.clone(),
                quantity: item.effective_quantity(),
                unit_price_ex_tax: financials.unit_price_ex_tax,
                subtotal: financials.subtotal_ex_tax,
                iva_amount: financials.iva_amount,
                discount_amount: financials.discount_amount,
                total: financials.total,
            });
        }

        let commission_percentage = partner.commission_percentage.unwrap_or(default_commission);
        let commission_amount = subtotal * commission_percentage / Decimal::from(100);
        let partner_amount = subtotal - commission_amount;

        entries.push(PartnerLedgerEntry {
            partner: PartnerSnapshot {
                partner_id: partner.partner_id,
                business_name: partner.business_name.clone(),
                email: partner.email.clone(),
                phone: partner.phone.clone(),
                address: partner.address.clone(),
                city: partner.city.clone(),
                commission_percentage,
            },
            is_primary: pid == order.partner_id,
            items: ledger_items,
            subtotal,
            iva_amount,
            commission_amount,
            partner_amount,
            total: subtotal + iva_amount,
        });
    }

    entries
}

fn compute_line(order: &Order, item: &OrderItem) -> ItemFinancials {
    compute_item_financials(
        item.effective_unit_price(),
        item.effective_quantity(),
        order.item_iva_rate(item),
        item.discount_percentage.unwrap_or(Decimal::ZERO),
        order.iva_included_in_price,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{order_with_items, partner, tagged_item, untagged_item};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn test_single_partner_fallback_takes_all_items() {
        let primary = Uuid::new_v4();
        let order = order_with_items(
            primary,
            vec![untagged_item("Collar", dec!(100), 2), untagged_item("Leash", dec!(50), 1)],
        );
        let partners = vec![partner(primary, Some(dec!(10)))];

        let entries = build_ledger(&order, &partners, dec!(5));
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert!(entry.is_primary);
        assert_eq!(entry.items.len(), 2);
        // 22% added on top: subtotal is the gross 250.
        assert_eq!(entry.subtotal, dec!(250));
        assert_eq!(entry.commission_amount, dec!(25.0));
        assert_eq!(entry.partner_amount, dec!(225.0));
    }

    #[test]
    fn test_commission_conservation() {
        let primary = Uuid::new_v4();
        let order = order_with_items(primary, vec![untagged_item("Toy", dec!(33.33), 3)]);
        let partners = vec![partner(primary, None)];

        let entries = build_ledger(&order, &partners, dec!(5));
        let entry = &entries[0];
        assert_eq!(
            entry.commission_amount + entry.partner_amount,
            entry.subtotal
        );
        // Config default applies when the partner carries no rate.
        assert_eq!(entry.partner.commission_percentage, dec!(5));
    }

    #[test]
    fn test_multi_partner_partition_preserves_first_appearance() {
        let primary = Uuid::new_v4();
        let second = Uuid::new_v4();
        let order = order_with_items(
            primary,
            vec![
                tagged_item("A", dec!(10), 1, second),
                tagged_item("B", dec!(20), 1, primary),
                tagged_item("C", dec!(30), 1, second),
            ],
        );
        let partners = vec![partner(primary, Some(dec!(5))), partner(second, Some(dec!(5)))];

        let entries = build_ledger(&order, &partners, dec!(5));
        assert_eq!(entries.len(), 2);
        // First-appearance order: `second` owns the first item.
        assert_eq!(entries[0].partner.partner_id, second);
        assert!(!entries[0].is_primary);
        assert_eq!(entries[1].partner.partner_id, primary);
        assert!(entries[1].is_primary);

        // Every item lands in exactly one entry.
        let total_items: usize = entries.iter().map(|e| e.items.len()).sum();
        assert_eq!(total_items, order.items.len());
        assert_eq!(entries[0].items.len(), 2);
        assert_eq!(entries[1].items.len(), 1);
    }

    #[test]
    fn test_missing_partner_record_is_skipped() {
        let primary = Uuid::new_v4();
        let ghost = Uuid::new_v4();
        let order = order_with_items(
            primary,
            vec![
                tagged_item("A", dec!(10), 1, primary),
                tagged_item("B", dec!(20), 1, ghost),
            ],
        );
        let partners = vec![partner(primary, Some(dec!(5)))];

        let entries = build_ledger(&order, &partners, dec!(5));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].partner.partner_id, primary);
    }

    #[test]
    fn test_item_rate_override_beats_order_default() {
        let primary = Uuid::new_v4();
        let mut item = untagged_item("Exempt", dec!(100), 1);
        item.iva_rate = Some(Decimal::ZERO);
        let order = order_with_items(primary, vec![item]);
        let partners = vec![partner(primary, Some(dec!(5)))];

        let entries = build_ledger(&order, &partners, dec!(5));
        assert_eq!(entries[0].iva_amount, Decimal::ZERO);
        assert_eq!(entries[0].subtotal, dec!(100));
    }
}
