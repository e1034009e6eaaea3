//! # aurum-engine: Units of Work for the Aurum Back-Office
//!
//! Everything here spans more than one repository and must either happen
//! completely or not at all.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Aurum Layers                                   │
//! │                                                                         │
//! │  apps/backoffice (CLI, ApiResponse envelope)                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  aurum-engine (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   BulkImporter ──► SaleWriter ──► stock CAS, pricing, loyalty   │   │
//! │  │   LoyaltyLedger     guarded redeem                              │   │
//! │  │   RateService  ──► QuoteSource (HTTP)                           │   │
//! │  │   ConflictRetry     bounded retry on SQLITE_BUSY                │   │
//! │  │   EngineConfig      defaults → aurum.toml → AURUM_* env         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  aurum-db (repositories, transactions)  ◄──  aurum-core (pure rules)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use aurum_engine::{EngineConfig, SaleWriter};
//! use aurum_core::{PaymentMode, SaleLineRequest};
//!
//! let config = EngineConfig::load(None)?;
//! let db = aurum_db::Database::new(config.db_config()).await?;
//! let writer = SaleWriter::from_config(db, &config);
//!
//! let receipt = writer
//!     .create_sale(&customer_id, &[SaleLineRequest::new(product_id, 1)], PaymentMode::Cash)
//!     .await?;
//! println!("{} {}", receipt.invoice_number, receipt.final_amount);
//! ```

pub mod bulk_import;
pub mod config;
pub mod error;
pub mod live_source;
pub mod loyalty;
pub mod rates;
pub mod retry;
pub mod sale_writer;

#[cfg(test)]
mod testing;

pub use bulk_import::{BulkImporter, ImportRow, ImportSummary, UploadedFile};
pub use config::EngineConfig;
pub use error::{ConfigError, ConfigResult, EngineError, EngineResult, ErrorKind};
pub use live_source::{HttpQuoteSource, QuoteSource, SpotQuote};
pub use loyalty::{LoyaltyLedger, Redemption};
pub use rates::RateService;
pub use retry::ConflictRetry;
pub use sale_writer::{SaleReceipt, SaleWriter};
