//! Karat purity grades and bullion unit conversion.
//!
//! Live bullion feeds quote fine (24K) gold per troy ounce. Shop rates are per
//! gram for a given purity, so a live quote goes through two scalings:
//!
//! ```text
//! price_per_oz ──÷ 31.1034768──► per gram (24K) ──× karat/24──► per gram (22K)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::money::Money;

/// Grams in one troy ounce.
pub const TROY_OUNCE_GRAMS: f64 = 31.103_476_8;

/// Gold purity grade with a known ratio to fine gold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Purity {
    #[serde(rename = "24K")]
    K24,
    #[serde(rename = "22K")]
    K22,
    #[serde(rename = "18K")]
    K18,
    #[serde(rename = "14K")]
    K14,
}

impl Purity {
    pub const ALL: [Purity; 4] = [Purity::K24, Purity::K22, Purity::K18, Purity::K14];

    /// Karat number (parts of gold per 24).
    pub const fn karat(&self) -> u32 {
        match self {
            Purity::K24 => 24,
            Purity::K22 => 22,
            Purity::K18 => 18,
            Purity::K14 => 14,
        }
    }

    /// Fraction of fine gold.
    pub fn ratio(&self) -> f64 {
        self.karat() as f64 / 24.0
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Purity::K24 => "24K",
            Purity::K22 => "22K",
            Purity::K18 => "18K",
            Purity::K14 => "14K",
        }
    }

    /// Converts a fine-gold price per troy ounce (in major units) into a
    /// per-gram rate for this purity, rounded to the nearest cent.
    ///
    /// Returns `None` for non-finite or non-positive input, or when the
    /// result rounds to zero.
    ///
    /// ```rust
    /// use aurum_core::purity::Purity;
    ///
    /// // 3110.34768 per oz is exactly 100.00 per gram of 24K
    /// let rate = Purity::K24.per_gram_from_ounce(3110.34768).unwrap();
    /// assert_eq!(rate.cents(), 10_000);
    ///
    /// let rate = Purity::K18.per_gram_from_ounce(3110.34768).unwrap();
    /// assert_eq!(rate.cents(), 7_500);
    /// ```
    pub fn per_gram_from_ounce(&self, price_per_oz: f64) -> Option<Money> {
        if !price_per_oz.is_finite() || price_per_oz <= 0.0 {
            return None;
        }
        let per_gram = price_per_oz / TROY_OUNCE_GRAMS * self.ratio();
        let cents = (per_gram * 100.0).round();
        if cents < 1.0 || cents > i64::MAX as f64 {
            return None;
        }
        Some(Money::from_cents(cents as i64))
    }
}

impl fmt::Display for Purity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Purity {
    type Err = ValidationError;

    /// Accepts "22K", "22k", "22 K" and "22".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase();
        let digits = cleaned.strip_suffix('K').unwrap_or(cleaned.as_str());
        match digits {
            "24" => Ok(Purity::K24),
            "22" => Ok(Purity::K22),
            "18" => Ok(Purity::K18),
            "14" => Ok(Purity::K14),
            _ => Err(ValidationError::NotAllowed {
                field: "category".to_string(),
                value: s.to_string(),
                allowed: Purity::ALL.iter().map(|p| p.as_str().to_string()).collect(),
            }),
        }
    }
}
