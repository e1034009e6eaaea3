//! # Pricing Calculator
//!
//! Turns priced lines into subtotal, tax and total, and converts a final
//! amount into loyalty points.
//!
//! ## Calculation Flow
//! ```text
//! for each line:
//!     base = unit_price × quantity
//!     tax  = round_half_up(base × tax_rate)
//!
//! subtotal = Σ base
//! tax      = Σ line tax
//! total    = subtotal + tax
//! points   = floor(total / points_unit)
//! ```
//!
//! Tax is rounded per line and then summed, so the invoice's tax column
//! always adds up to the header tax amount.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::TaxRate;
use crate::DEFAULT_POINTS_UNIT_CENTS;

/// One line after pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub unit_price: Money,
    pub quantity: i64,
    /// `unit_price × quantity`, before tax.
    pub base: Money,
    pub tax: Money,
}

impl PricedLine {
    /// Line amount including tax.
    #[inline]
    pub fn total(&self) -> Money {
        self.base + self.tax
    }
}

/// Header totals for a set of priced lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
}

impl PriceBreakdown {
    /// Adds one priced line to the running totals.
    pub fn accumulate(&mut self, line: &PricedLine) {
        self.subtotal += line.base;
        self.tax += line.tax;
        self.total = self.subtotal + self.tax;
    }
}

/// Pure pricing rules, parameterized by the configured tax rate and the
/// loyalty earning unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingCalculator {
    tax_rate: TaxRate,
    points_unit: Money,
}

impl PricingCalculator {
    /// Creates a calculator that earns one point per 100 currency units.
    pub fn new(tax_rate: TaxRate) -> Self {
        PricingCalculator {
            tax_rate,
            points_unit: Money::from_cents(DEFAULT_POINTS_UNIT_CENTS),
        }
    }

    /// Overrides the amount that earns one loyalty point.
    pub fn with_points_unit(mut self, points_unit: Money) -> Self {
        self.points_unit = points_unit;
        self
    }

    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        self.tax_rate
    }

    #[inline]
    pub fn points_unit(&self) -> Money {
        self.points_unit
    }

    /// Prices a single line.
    pub fn price_line(&self, unit_price: Money, quantity: i64) -> PricedLine {
        let base = unit_price.multiply_quantity(quantity);
        PricedLine {
            unit_price,
            quantity,
            base,
            tax: base.calculate_tax(self.tax_rate),
        }
    }

    /// Prices a full set of `(unit_price, quantity)` lines.
    ///
    /// ```rust
    /// use aurum_core::money::Money;
    /// use aurum_core::pricing::PricingCalculator;
    /// use aurum_core::types::TaxRate;
    ///
    /// let calc = PricingCalculator::new(TaxRate::from_bps(300));
    /// let (lines, totals) = calc.price(&[(Money::from_cents(10_000), 3)]);
    ///
    /// assert_eq!(lines.len(), 1);
    /// assert_eq!(totals.total.cents(), 30_900);
    /// ```
    pub fn price(&self, lines: &[(Money, i64)]) -> (Vec<PricedLine>, PriceBreakdown) {
        let mut breakdown = PriceBreakdown::default();
        let priced = lines
            .iter()
            .map(|&(unit_price, quantity)| {
                let line = self.price_line(unit_price, quantity);
                breakdown.accumulate(&line);
                line
            })
            .collect();
        (priced, breakdown)
    }

    /// Points earned for a final amount: floor(final / points_unit).
    pub fn loyalty_points(&self, final_amount: Money) -> i64 {
        final_amount.whole_units_of(self.points_unit)
    }
}

impl Default for PricingCalculator {
    fn default() -> Self {
        PricingCalculator::new(TaxRate::default())
    }
}
