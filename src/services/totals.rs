//! Line and document totals for invoices and quotes.
//!
//! Amounts are rounded half away from zero to two decimal places, matching
//! the `numeric(14, 2)` money columns.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const MONEY_SCALE: u32 = 2;

/// Quantity, unit price and tax rate (percent) of one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TaxedLine {
    pub quantity: Decimal,
    pub price: Decimal,
    pub tax_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTotals {
    /// Net amount per line, in input order
    pub line_totals: Vec<Decimal>,
    pub subtotal: Decimal,
    pub total: Decimal,
}

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Net amount of one line: `quantity × price`.
pub fn line_total(quantity: Decimal, price: Decimal) -> Decimal {
    round_money(quantity * price)
}

/// Net and gross totals over all lines.
pub fn compute(lines: &[TaxedLine]) -> DocumentTotals {
    let hundred = Decimal::ONE_HUNDRED;
    let mut subtotal = Decimal::ZERO;
    let mut gross = Decimal::ZERO;
    let mut line_totals = Vec::with_capacity(lines.len());

    for line in lines {
        let net = line_total(line.quantity, line.price);
        subtotal += net;
        gross += net * (Decimal::ONE + line.tax_rate / hundred);
        line_totals.push(net);
    }

    DocumentTotals {
        line_totals,
        subtotal: round_money(subtotal),
        total: round_money(gross),
    }
}

/// Rejects negative quantities, prices and tax rates.
pub fn validate_line(line: &TaxedLine) -> Result<(), &'static str> {
    if line.quantity.is_sign_negative() {
        return Err("quantity must not be negative");
    }
    if line.price.is_sign_negative() {
        return Err("price must not be negative");
    }
    if line.tax_rate.is_sign_negative() || line.tax_rate > Decimal::ONE_HUNDRED {
        return Err("tax_rate must be between 0 and 100");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn line(quantity: Decimal, price: Decimal, tax_rate: Decimal) -> TaxedLine {
        TaxedLine {
            quantity,
            price,
            tax_rate,
        }
    }

    #[test]
    fn consulting_invoice_totals() {
        // 10h consulting at 120 plus a 500 license, both at 19 %
        let totals = compute(&[
            line(d("10"), d("120"), d("19")),
            line(d("1"), d("500"), d("19")),
        ]);

        assert_eq!(totals.line_totals, vec![d("1200"), d("500")]);
        assert_eq!(totals.subtotal, d("1700"));
        assert_eq!(totals.total, d("2023.00"));
    }

    #[test]
    fn mixed_tax_rates() {
        let totals = compute(&[
            line(d("2"), d("10"), d("7")),
            line(d("1"), d("100"), d("19")),
        ]);
        assert_eq!(totals.subtotal, d("120"));
        assert_eq!(totals.total, d("140.40"));
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(line_total(d("0.5"), d("0.05")), d("0.03"));
        assert_eq!(round_money(d("1.005")), d("1.01"));
        assert_eq!(round_money(d("1.004")), d("1.00"));
    }

    #[test]
    fn empty_document_is_zero() {
        let totals = compute(&[]);
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);
        assert!(totals.line_totals.is_empty());
    }

    #[test]
    fn rejects_negative_values() {
        assert!(validate_line(&line(d("-1"), d("1"), d("19"))).is_err());
        assert!(validate_line(&line(d("1"), d("-1"), d("19"))).is_err());
        assert!(validate_line(&line(d("1"), d("1"), d("101"))).is_err());
        assert!(validate_line(&line(d("1"), d("1"), d("0"))).is_ok());
    }
}
