//! Order money math shared by the server and the offline terminal.
//!
//! Both sides must arrive at the same totals for the same lines, so the
//! rounding rules live here and nowhere else:
//!
//! - every line total is rounded to cents,
//! - tax is computed once on the subtotal and rounded to cents,
//! - midpoints round away from zero.
//!
//! Amounts are bounded by [`MAX_AMOUNT`] and quantities by
//! [`MAX_LINE_QUANTITY`] so every priced order fits the server's columns.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while pricing an order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// An order needs at least one line.
    #[error("order has no items")]
    Empty,
    /// Quantity must be at least one.
    #[error("line {index}: quantity must be at least 1")]
    InvalidQuantity {
        /// Zero-based line index.
        index: usize,
    },
    /// Unit prices cannot be negative.
    #[error("line {index}: unit price cannot be negative")]
    NegativePrice {
        /// Zero-based line index.
        index: usize,
    },
    /// Quantity above [`MAX_LINE_QUANTITY`].
    #[error("line {index}: quantity must be at most {max}")]
    QuantityTooLarge {
        /// Zero-based line index.
        index: usize,
        /// The cap.
        max: i32,
    },
    /// Unit prices are whole cents.
    #[error("line {index}: unit price has more than 2 decimal places")]
    PriceTooPrecise {
        /// Zero-based line index.
        index: usize,
    },
    /// Unit price above [`MAX_AMOUNT`].
    #[error("line {index}: unit price must be at most {MAX_AMOUNT}")]
    PriceTooLarge {
        /// Zero-based line index.
        index: usize,
    },
    /// A line total or the order total does not fit [`MAX_AMOUNT`].
    #[error("order total must be at most {MAX_AMOUNT}")]
    Overflow,
    /// Tax rates are fractions in `0..=1`.
    #[error("tax rate must be between 0 and 1")]
    InvalidTaxRate,
}

/// Most units of one product on a single line.
pub const MAX_LINE_QUANTITY: i32 = 10_000;

/// Largest price or total: 9,999,999,999.99, the range of `NUMERIC(12, 2)`.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

/// Round an amount to cents, midpoint away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// A priced line of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Price of a single unit.
    pub unit_price: Decimal,
    /// Number of units.
    pub quantity: i32,
}

impl OrderLine {
    /// Create a new line.
    #[must_use]
    pub const fn new(unit_price: Decimal, quantity: i32) -> Self {
        Self {
            unit_price,
            quantity,
        }
    }

    /// Rounded total of this line.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] when the total exceeds [`MAX_AMOUNT`].
    pub fn total(&self) -> Result<Decimal, MoneyError> {
        self.unit_price
            .checked_mul(Decimal::from(self.quantity))
            .map(round_money)
            .filter(|total| *total <= MAX_AMOUNT)
            .ok_or(MoneyError::Overflow)
    }
}

/// Computed totals of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    /// Price a set of lines with the given tax rate (e.g. `0.08` for 8%).
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError`] for an empty order, a quantity outside
    /// `1..=MAX_LINE_QUANTITY`, a unit price that is negative, finer than a
    /// cent or above [`MAX_AMOUNT`], a tax rate outside `0..=1`, or a total
    /// above [`MAX_AMOUNT`].
    pub fn compute(lines: &[OrderLine], tax_rate: Decimal) -> Result<Self, MoneyError> {
        if lines.is_empty() {
            return Err(MoneyError::Empty);
        }
        if tax_rate < Decimal::ZERO || tax_rate > Decimal::ONE {
            return Err(MoneyError::InvalidTaxRate);
        }

        let mut subtotal = Decimal::ZERO;
        for (index, line) in lines.iter().enumerate() {
            if line.quantity < 1 {
                return Err(MoneyError::InvalidQuantity { index });
            }
            if line.quantity > MAX_LINE_QUANTITY {
                return Err(MoneyError::QuantityTooLarge {
                    index,
                    max: MAX_LINE_QUANTITY,
                });
            }
            if line.unit_price < Decimal::ZERO {
                return Err(MoneyError::NegativePrice { index });
            }
            if line.unit_price > MAX_AMOUNT {
                return Err(MoneyError::PriceTooLarge { index });
            }
            if round_money(line.unit_price) != line.unit_price {
                return Err(MoneyError::PriceTooPrecise { index });
            }
            subtotal = subtotal
                .checked_add(line.total()?)
                .ok_or(MoneyError::Overflow)?;
        }

        let tax = subtotal
            .checked_mul(tax_rate)
            .map(round_money)
            .ok_or(MoneyError::Overflow)?;
        let total = subtotal
            .checked_add(tax)
            .filter(|total| *total <= MAX_AMOUNT)
            .ok_or(MoneyError::Overflow)?;
        Ok(Self {
            subtotal,
            tax,
            total,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_round_money_midpoint_away_from_zero() {
        assert_eq!(round_money(dec("1.005")), dec("1.01"));
        assert_eq!(round_money(dec("2.345")), dec("2.35"));
        assert_eq!(round_money(dec("2.344")), dec("2.34"));
    }

    #[test]
    fn test_compute_totals_with_tax() {
        let lines = [
            OrderLine::new(dec("3.50"), 2),
            OrderLine::new(dec("4.25"), 1),
        ];
        let totals = OrderTotals::compute(&lines, dec("0.08")).unwrap();
        assert_eq!(totals.subtotal, dec("11.25"));
        assert_eq!(totals.tax, dec("0.90"));
        assert_eq!(totals.total, dec("12.15"));
    }

    #[test]
    fn test_tax_rounded_once_on_subtotal() {
        // 3 x 0.99 = 2.97; 2.97 * 0.0725 = 0.215325 -> 0.22
        let lines = [OrderLine::new(dec("0.99"), 3)];
        let totals = OrderTotals::compute(&lines, dec("0.0725")).unwrap();
        assert_eq!(totals.tax, dec("0.22"));
        assert_eq!(totals.total, dec("3.19"));
    }

    #[test]
    fn test_zero_tax_rate() {
        let lines = [OrderLine::new(dec("5"), 1)];
        let totals = OrderTotals::compute(&lines, Decimal::ZERO).unwrap();
        assert_eq!(totals.tax, Decimal::ZERO);
        assert_eq!(totals.total, dec("5"));
    }

    #[test]
    fn test_rejects_empty_order() {
        assert_eq!(
            OrderTotals::compute(&[], dec("0.1")),
            Err(MoneyError::Empty)
        );
    }

    #[test]
    fn test_rejects_zero_quantity() {
        let lines = [
            OrderLine::new(dec("1"), 1),
            OrderLine::new(dec("1"), 0),
        ];
        assert_eq!(
            OrderTotals::compute(&lines, Decimal::ZERO),
            Err(MoneyError::InvalidQuantity { index: 1 })
        );
    }

    #[test]
    fn test_rejects_negative_price() {
        let lines = [OrderLine::new(dec("-1.00"), 1)];
        assert_eq!(
            OrderTotals::compute(&lines, Decimal::ZERO),
            Err(MoneyError::NegativePrice { index: 0 })
        );
    }

    #[test]
    fn test_max_amount_is_numeric_12_2() {
        assert_eq!(MAX_AMOUNT, dec("9999999999.99"));
    }

    #[test]
    fn test_huge_prices_are_errors_not_panics() {
        let line = OrderLine::new(Decimal::MAX, 2);
        assert_eq!(line.total(), Err(MoneyError::Overflow));
        assert_eq!(
            OrderTotals::compute(&[line], Decimal::ZERO),
            Err(MoneyError::PriceTooLarge { index: 0 })
        );
    }

    #[test]
    fn test_rejects_totals_past_max_amount() {
        // Each line fits; together they do not.
        let lines = [
            OrderLine::new(dec("999999999.99"), 10),
            OrderLine::new(dec("0.10"), 1),
        ];
        assert_eq!(
            OrderTotals::compute(&lines, Decimal::ZERO),
            Err(MoneyError::Overflow)
        );

        // Subtotal fits, tax pushes the total over.
        let lines = [OrderLine::new(dec("999999999.99"), 10)];
        assert!(OrderTotals::compute(&lines, Decimal::ZERO).is_ok());
        assert_eq!(
            OrderTotals::compute(&lines, dec("0.10")),
            Err(MoneyError::Overflow)
        );
    }

    #[test]
    fn test_rejects_oversized_quantity() {
        let lines = [OrderLine::new(dec("100.00"), 1_000_000_000)];
        assert_eq!(
            OrderTotals::compute(&lines, Decimal::ZERO),
            Err(MoneyError::QuantityTooLarge {
                index: 0,
                max: MAX_LINE_QUANTITY
            })
        );
        let lines = [OrderLine::new(dec("100.00"), MAX_LINE_QUANTITY)];
        assert!(OrderTotals::compute(&lines, Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_rejects_fractional_cents() {
        let lines = [OrderLine::new(dec("1.005"), 1)];
        assert_eq!(
            OrderTotals::compute(&lines, Decimal::ZERO),
            Err(MoneyError::PriceTooPrecise { index: 0 })
        );
        // Trailing zeros are fine.
        let lines = [OrderLine::new(dec("1.500"), 2)];
        assert_eq!(
            OrderTotals::compute(&lines, Decimal::ZERO).unwrap().total,
            dec("3.00")
        );
    }

    #[test]
    fn test_rejects_out_of_range_tax() {
        let lines = [OrderLine::new(dec("1"), 1)];
        assert_eq!(
            OrderTotals::compute(&lines, dec("1.5")),
            Err(MoneyError::InvalidTaxRate)
        );
        assert_eq!(
            OrderTotals::compute(&lines, dec("-0.1")),
            Err(MoneyError::InvalidTaxRate)
        );
    }
}
