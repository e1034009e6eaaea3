//! # aurum-core: Pure Business Logic for the Aurum Back-Office
//!
//! This crate holds the sale-processing rules as pure functions with zero
//! I/O dependencies. Storage lives in `aurum-db`, orchestration in
//! `aurum-engine`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Aurum Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    backoffice (CLI)                             │   │
//! │  │    sale, import, rate, set-rate, earn, redeem, balance          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 aurum-engine (units of work)                    │   │
//! │  │   SaleWriter • LoyaltyLedger • BulkImporter • RateService       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ aurum-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  pricing  │  │  purity   │  │   │
//! │  │   │  Product  │  │   Money   │  │  TaxRate  │  │ 22K → 22/24│  │   │
//! │  │   │   Sale    │  │           │  │  Points   │  │ oz → gram │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    aurum-db (Database Layer)                    │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (Product, Customer, SaleTransaction, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`pricing`] - Pricing calculator: lines → subtotal, tax, total, points
//! - [`purity`] - Karat purity and bullion unit conversion
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use aurum_core::money::Money;
//! use aurum_core::pricing::PricingCalculator;
//! use aurum_core::types::TaxRate;
//!
//! let calc = PricingCalculator::new(TaxRate::from_bps(300));
//! let line = calc.price_line(Money::from_major_minor(100, 0), 3);
//!
//! assert_eq!(line.base.cents(), 30_000);
//! assert_eq!(line.tax.cents(), 900);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod pricing;
pub mod purity;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use pricing::{PriceBreakdown, PricedLine, PricingCalculator};
pub use purity::Purity;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Sales tax applied to every sale unless configured otherwise (3% GST).
pub const DEFAULT_TAX_RATE_BPS: u32 = 300;

/// One loyalty point is earned per this many cents of final amount
/// (100 major currency units).
pub const DEFAULT_POINTS_UNIT_CENTS: i64 = 10_000;

/// Maximum line items allowed in a single sale.
pub const MAX_SALE_LINES: usize = 100;
