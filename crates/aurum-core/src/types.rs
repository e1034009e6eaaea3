//! # Domain Types
//!
//! Fixed-field records for every entity the sale core touches.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │ SaleTransaction │   │  LoyaltyEntry   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  customer_id    │       │
//! │  │  sku (business) │   │  invoice_number │   │  transaction_id?│       │
//! │  │  stock_quantity │◄──│  line items     │──►│  points (±)     │       │
//! │  │  selling_price  │   │  final_amount   │   │  redeemed       │       │
//! │  └─────────────────┘   └────────┬────────┘   └─────────────────┘       │
//! │                                 │                                       │
//! │  ┌─────────────────┐   ┌────────▼────────┐   ┌─────────────────┐       │
//! │  │    Customer     │   │  SaleLineItem   │   │   RateQuote     │       │
//! │  │  phone (unique) │   │  unit_price     │   │  category (22K) │       │
//! │  │  total_spent    │   │  (snapshot)     │   │  rate / source  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every stored entity has:
//! - `id`: UUID v4, immutable, used for relations
//! - a business key: `sku`, `phone`, `invoice_number`

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000, so 300 bps = 3% GST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate(crate::DEFAULT_TAX_RATE_BPS)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name.
    pub name: String,

    /// Units available. Never negative.
    pub stock_quantity: i64,

    /// Current selling price in cents.
    pub selling_price_cents: i64,

    /// Whether the product is active (soft delete).
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the selling price as Money.
    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_price_cents)
    }

    /// Checks whether `quantity` units can be taken from current stock.
    #[inline]
    pub fn has_stock_for(&self, quantity: i64) -> bool {
        self.stock_quantity >= quantity
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A customer with a lifetime spend aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    pub id: String,
    pub name: String,
    /// Phone number - business identifier used by bulk import.
    pub phone: String,
    /// Sum of `final_amount` over every completed sale.
    pub total_spent_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Returns the lifetime spend as Money.
    #[inline]
    pub fn total_spent(&self) -> Money {
        Money::from_cents(self.total_spent_cents)
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale transaction.
///
/// The sale core only ever produces `Completed`; other states belong to
/// back-office workflows (returns, cancellations) outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    #[default]
    Completed,
}

// =============================================================================
// Payment Mode
// =============================================================================

/// How the customer paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    /// Physical cash.
    Cash,
    /// Card on an external terminal.
    Card,
    /// UPI / wallet transfer.
    Upi,
    /// Direct bank transfer (NEFT/RTGS/IMPS).
    BankTransfer,
}

impl PaymentMode {
    pub const ALL: [PaymentMode; 4] = [
        PaymentMode::Cash,
        PaymentMode::Card,
        PaymentMode::Upi,
        PaymentMode::BankTransfer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::Cash => "cash",
            PaymentMode::Card => "card",
            PaymentMode::Upi => "upi",
            PaymentMode::BankTransfer => "bank_transfer",
        }
    }
}

impl fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMode {
    type Err = ValidationError;

    /// Accepts the spellings found in spreadsheet exports ("Cash", "CARD",
    /// "credit card", "bank transfer", ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "cash" => Ok(PaymentMode::Cash),
            "card" | "credit_card" | "debit_card" | "credit" | "debit" => Ok(PaymentMode::Card),
            "upi" | "wallet" => Ok(PaymentMode::Upi),
            "bank_transfer" | "bank" | "neft" | "rtgs" | "imps" => Ok(PaymentMode::BankTransfer),
            _ => Err(ValidationError::NotAllowed {
                field: "payment_mode".to_string(),
                value: s.trim().to_string(),
                allowed: PaymentMode::ALL.iter().map(|m| m.as_str().to_string()).collect(),
            }),
        }
    }
}

// =============================================================================
// Sale Transaction
// =============================================================================

/// A persisted sale header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleTransaction {
    pub id: String,
    pub invoice_number: String,
    pub customer_id: String,
    /// Σ line totals, before tax.
    pub total_amount_cents: i64,
    pub tax_amount_cents: i64,
    /// `total_amount + tax_amount`.
    pub final_amount_cents: i64,
    pub payment_mode: PaymentMode,
    pub status: SaleStatus,
    pub created_at: DateTime<Utc>,
}

impl SaleTransaction {
    /// Returns the final amount as Money.
    #[inline]
    pub fn final_amount(&self) -> Money {
        Money::from_cents(self.final_amount_cents)
    }
}

// =============================================================================
// Sale Line Item
// =============================================================================

/// A line of a sale. Uses the snapshot pattern: price and SKU are frozen at
/// sale time so later catalogue edits do not rewrite history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleLineItem {
    pub id: String,
    pub transaction_id: String,
    pub product_id: String,
    /// SKU at time of sale (frozen).
    pub sku_snapshot: String,
    pub quantity: i64,
    /// Unit price at time of sale (frozen).
    pub unit_price_cents: i64,
    /// `unit_price × quantity`.
    pub total_price_cents: i64,
    /// Tax charged on this line.
    pub tax_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl SaleLineItem {
    #[inline]
    pub fn total_price(&self) -> Money {
        Money::from_cents(self.total_price_cents)
    }
}

/// One requested line of a new sale: which product and how many.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLineRequest {
    pub product_id: String,
    pub quantity: i64,
}

impl SaleLineRequest {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        SaleLineRequest {
            product_id: product_id.into(),
            quantity,
        }
    }
}

// =============================================================================
// Loyalty Entry
// =============================================================================

/// One append-only loyalty ledger event.
///
/// - earn: `points > 0`, `redeemed = false`
/// - redemption: `points < 0`, `redeemed = true`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LoyaltyEntry {
    pub id: String,
    pub customer_id: String,
    pub transaction_id: Option<String>,
    pub points: i64,
    pub redeemed: bool,
    pub created_at: DateTime<Utc>,
}

impl LoyaltyEntry {
    #[inline]
    pub fn is_redemption(&self) -> bool {
        self.redeemed
    }
}

// =============================================================================
// Rates
// =============================================================================

/// Where a resolved rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateSource {
    /// Manually entered today; authoritative.
    Manual,
    /// Derived from the live bullion feed.
    LiveApi,
    /// Most recent manual quote of any date, used when the feed is down.
    ManualFallback,
    /// Configured per-category default.
    Default,
}

impl fmt::Display for RateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RateSource::Manual => "manual",
            RateSource::LiveApi => "live-api",
            RateSource::ManualFallback => "manual-fallback",
            RateSource::Default => "default",
        };
        f.write_str(s)
    }
}

/// A manually entered per-gram rate, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ManualRate {
    pub id: String,
    /// Purity/category key, e.g. "22K".
    pub category: String,
    pub rate_cents: i64,
    /// Calendar day this quote is authoritative for.
    pub quoted_on: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl ManualRate {
    /// Converts the stored row into a quote attributed to `source`.
    pub fn into_quote(self, source: RateSource) -> RateQuote {
        RateQuote {
            category: self.category,
            rate_cents: self.rate_cents,
            source,
            timestamp: self.created_at,
        }
    }
}

/// An effective per-gram rate for a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateQuote {
    pub category: String,
    /// Rate per gram in cents. Always > 0.
    pub rate_cents: i64,
    pub source: RateSource,
    pub timestamp: DateTime<Utc>,
}

impl RateQuote {
    #[inline]
    pub fn rate(&self) -> Money {
        Money::from_cents(self.rate_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate_default_is_gst() {
        assert_eq!(TaxRate::default().bps(), 300);
        assert!((TaxRate::from_bps(300).percentage() - 3.0).abs() < 0.001);
    }

    #[test]
    fn test_payment_mode_parsing() {
        assert_eq!("Cash".parse::<PaymentMode>().unwrap(), PaymentMode::Cash);
        assert_eq!("credit card".parse::<PaymentMode>().unwrap(), PaymentMode::Card);
        assert_eq!(" UPI ".parse::<PaymentMode>().unwrap(), PaymentMode::Upi);
        assert_eq!("bank-transfer".parse::<PaymentMode>().unwrap(), PaymentMode::BankTransfer);

        let err = "barter".parse::<PaymentMode>().unwrap_err();
        assert!(err.to_string().contains("barter"));
    }

    #[test]
    fn test_rate_source_wire_names() {
        assert_eq!(serde_json::to_string(&RateSource::LiveApi).unwrap(), "\"live-api\"");
        assert_eq!(RateSource::ManualFallback.to_string(), "manual-fallback");
    }

    #[test]
    fn test_product_stock_check() {
        let now = Utc::now();
        let product = Product {
            id: "p1".into(),
            sku: "RING-22K".into(),
            name: "Ring".into(),
            stock_quantity: 2,
            selling_price_cents: 10_000,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        assert!(product.has_stock_for(2));
        assert!(!product.has_stock_for(5));
    }
}
