//! Pricing engine.
//!
//! Pure computation over line items: no caching, no incremental state. Every
//! change to an order's item set recomputes the totals from scratch.

use common::{Decimal, Money};
use serde::{Deserialize, Serialize};
use store::{ItemStatus, OrderItemRecord, OrderRecord};

/// Percentage applied when no VAT rate is configured.
pub const DEFAULT_VAT_PERCENT: u32 = 8;

/// VAT rate as a percentage of the subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VatRate(Decimal);

impl VatRate {
    pub fn new(percent: Decimal) -> Self {
        Self(percent)
    }

    /// Uses the configured rate when it is present and non-negative.
    pub fn resolve(configured: Option<Decimal>) -> Option<Self> {
        configured.filter(|r| !r.is_sign_negative()).map(Self)
    }

    pub fn percent(&self) -> Decimal {
        self.0
    }

    /// Tax owed on `subtotal`.
    pub fn tax_on(&self, subtotal: Money) -> Money {
        subtotal.percent(self.0)
    }
}

impl Default for VatRate {
    fn default() -> Self {
        Self(Decimal::from(DEFAULT_VAT_PERCENT))
    }
}

impl std::fmt::Display for VatRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// The pricing view of one order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceLine {
    pub unit_price: Money,
    pub quantity: u32,
    /// Rejected lines stay on the order but are not charged.
    pub billable: bool,
}

impl PriceLine {
    pub fn new(unit_price: Money, quantity: u32) -> Self {
        Self {
            unit_price,
            quantity,
            billable: true,
        }
    }

    pub fn total(&self) -> Money {
        line_total(self.unit_price, self.quantity)
    }
}

impl From<&OrderItemRecord> for PriceLine {
    fn from(item: &OrderItemRecord) -> Self {
        Self {
            unit_price: item.unit_price,
            quantity: item.quantity,
            billable: item.status != ItemStatus::Rejected,
        }
    }
}

/// Subtotal and tax for a set of lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceBreakdown {
    pub subtotal: Money,
    pub tax_amount: Money,
}

/// The four monetary fields stored on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub tax_amount: Money,
    pub discount_amount: Money,
    pub total_amount: Money,
}

impl OrderTotals {
    /// Writes the totals onto an order record.
    pub fn apply_to(&self, order: &mut OrderRecord) {
        order.subtotal = self.subtotal;
        order.tax_amount = self.tax_amount;
        order.discount_amount = self.discount_amount;
        order.total_amount = self.total_amount;
    }
}

/// Base price plus every selected modifier adjustment.
pub fn effective_unit_price(base: Money, adjustments: impl IntoIterator<Item = Money>) -> Money {
    base + adjustments.into_iter().sum::<Money>()
}

pub fn line_total(unit_price: Money, quantity: u32) -> Money {
    unit_price.multiply(quantity)
}

/// Computes subtotal over billable lines and the tax on it.
pub fn compute<I>(lines: I, vat: VatRate) -> PriceBreakdown
where
    I: IntoIterator<Item = PriceLine>,
{
    let subtotal = lines
        .into_iter()
        .filter(|line| line.billable)
        .map(|line| line.total())
        .sum();

    PriceBreakdown {
        subtotal,
        tax_amount: vat.tax_on(subtotal),
    }
}

/// `subtotal + tax - discount`, never below zero.
pub fn apply_discount(subtotal: Money, tax_amount: Money, discount: Money) -> Money {
    (subtotal + tax_amount - discount).non_negative()
}

/// Full recomputation with the discount capped at the subtotal.
pub fn totals<I>(lines: I, vat: VatRate, discount: Money) -> OrderTotals
where
    I: IntoIterator<Item = PriceLine>,
{
    let PriceBreakdown {
        subtotal,
        tax_amount,
    } = compute(lines, vat);
    let discount_amount = discount.non_negative().min(subtotal);

    OrderTotals {
        subtotal,
        tax_amount,
        discount_amount,
        total_amount: apply_discount(subtotal, tax_amount, discount_amount),
    }
}

/// Pricing lines for every item on an order.
pub fn order_lines(order: &OrderRecord) -> impl Iterator<Item = PriceLine> + '_ {
    order.items.iter().map(PriceLine::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn money(minor: i64) -> Money {
        Money::from_minor(minor)
    }

    #[test]
    fn unit_price_includes_modifiers() {
        let unit = effective_unit_price(money(50_000), [money(10_000), money(5_000)]);
        assert_eq!(unit, money(65_000));
        assert_eq!(line_total(unit, 3), money(195_000));
    }

    #[test]
    fn compute_skips_rejected_lines() {
        let rejected = PriceLine {
            billable: false,
            ..PriceLine::new(money(30_000), 1)
        };
        let breakdown = compute(
            [PriceLine::new(money(40_000), 2), rejected],
            VatRate::default(),
        );

        assert_eq!(breakdown.subtotal, money(80_000));
        assert_eq!(breakdown.tax_amount, money(6_400));
    }

    #[test]
    fn tax_rounds_half_away_from_zero() {
        // 80.48
        let breakdown = compute([PriceLine::new(money(1_006), 1)], VatRate::default());
        assert_eq!(breakdown.tax_amount, money(80));

        let ten = VatRate::new(Decimal::from(10));
        // 100.5
        assert_eq!(ten.tax_on(money(1_005)), money(101));
    }

    #[test]
    fn discount_is_clamped() {
        assert_eq!(apply_discount(money(100), money(8), money(50)), money(58));
        assert_eq!(apply_discount(money(100), money(8), money(500)), Money::zero());
    }

    #[test]
    fn totals_cap_discount_at_subtotal() {
        let t = totals(
            [PriceLine::new(money(20_000), 1)],
            VatRate::default(),
            money(50_000),
        );

        assert_eq!(t.discount_amount, money(20_000));
        assert_eq!(t.total_amount, money(1_600));
        assert_eq!(t.total_amount, t.subtotal + t.tax_amount - t.discount_amount);
    }

    #[test]
    fn totals_hold_invariant_across_rates() {
        for rate in [0, 5, 8, 10, 12] {
            for discount in [0, 999, 100_000, 1_000_000] {
                let t = totals(
                    [
                        PriceLine::new(money(12_345), 3),
                        PriceLine::new(money(999), 7),
                    ],
                    VatRate::new(Decimal::from(rate)),
                    money(discount),
                );
                assert!(t.discount_amount <= t.subtotal);
                assert!(!t.total_amount.is_negative());
                assert_eq!(
                    t.total_amount,
                    apply_discount(t.subtotal, t.tax_amount, t.discount_amount)
                );
            }
        }
    }

    #[test]
    fn vat_resolution_falls_back() {
        assert_eq!(VatRate::resolve(None), None);
        assert_eq!(VatRate::resolve(Some(Decimal::from(-1))), None);
        assert_eq!(
            VatRate::resolve(Some(Decimal::from(10))),
            Some(VatRate::new(Decimal::from(10)))
        );
        assert_eq!(VatRate::default().percent(), Decimal::from(8));
    }
}
