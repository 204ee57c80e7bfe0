//! Per-item tax computation under both pricing conventions.
//!
//! All arithmetic stays at full `Decimal` precision; rounding to 2dp happens
//! once, at payload emission, so accumulation never compounds rounding error.

use rust_decimal::Decimal;

/// Financial breakdown of a single order line.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFinancials {
    /// Tax-exclusive unit price after discount.
    pub unit_price_ex_tax: Decimal,
    /// Tax-exclusive line subtotal (unit * quantity).
    pub subtotal_ex_tax: Decimal,
    pub iva_amount: Decimal,
    pub discount_amount: Decimal,
    /// Line total including tax.
    pub total: Decimal,
}

/// Compute the financial breakdown of one line item.
///
/// When `iva_included_in_price` is set the listed price already embeds the
/// tax, which is backed out of the gross amount; otherwise tax is added on
/// top of the gross amount. A zero rate yields no tax either way.
pub fn compute_item_financials(
    original_price: Decimal,
    quantity: u32,
    iva_rate: Decimal,
    discount_percentage: Decimal,
    iva_included_in_price: bool,
) -> ItemFinancials {
    let hundred = Decimal::from(100);
    let quantity = Decimal::from(quantity.max(1));

    let price_after_discount = original_price * (Decimal::ONE - discount_percentage / hundred);
    let discount_amount = (original_price - price_after_discount) * quantity;
    let gross_line_amount = price_after_discount * quantity;

    let (subtotal_ex_tax, iva_amount) = if iva_rate.is_zero() {
        (gross_line_amount, Decimal::ZERO)
    } else if iva_included_in_price {
        let subtotal = gross_line_amount / (Decimal::ONE + iva_rate / hundred);
        (subtotal, gross_line_amount - subtotal)
    } else {
        (gross_line_amount, gross_line_amount * (iva_rate / hundred))
    };

    ItemFinancials {
        unit_price_ex_tax: subtotal_ex_tax / quantity,
        subtotal_ex_tax,
        iva_amount,
        discount_amount,
        total: subtotal_ex_tax + iva_amount,
    }
}
