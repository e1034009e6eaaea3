//! CLI command implementations.
//!
//! ```text
//! commands/
//! ├── mod.rs      ◄─── Argument types (you are here)
//! ├── config.rs   ◄─── init-config
//! ├── sale.rs     ◄─── sale
//! ├── import.rs   ◄─── import
//! ├── loyalty.rs  ◄─── earn, redeem, balance, history
//! └── rate.rs     ◄─── rate, set-rate
//! ```
//!
//! Every command returns `ApiResult<T>`; `main` wraps it in an
//! `ApiResponse` and prints it.

pub mod config;
pub mod import;
pub mod loyalty;
pub mod rate;
pub mod sale;

use std::path::PathBuf;

use clap::Args;

use aurum_core::SaleLineRequest;

/// Arguments for the init-config command.
#[derive(Debug, Args)]
pub struct InitConfigArgs {
    /// Overwrite an existing config file.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the sale command.
#[derive(Debug, Args)]
pub struct SaleArgs {
    /// Customer id or phone number.
    #[arg(short, long)]
    pub customer: String,

    /// Line item as PRODUCT_ID[:QTY]. Repeat for more lines.
    #[arg(short, long = "item", required = true, value_parser = sale::parse_item)]
    pub items: Vec<SaleLineRequest>,

    /// Payment mode: cash, card, upi, bank_transfer.
    #[arg(short, long, default_value = "cash")]
    pub payment: String,
}

/// Arguments for the import command.
#[derive(Debug, Args)]
pub struct ImportArgs {
    /// CSV with columns customer_phone,product_sku,quantity,payment_mode.
    pub path: PathBuf,

    /// Delete the given file after import instead of working on a copy.
    #[arg(long)]
    pub consume: bool,
}

/// Arguments for the rate command.
#[derive(Debug, Args)]
pub struct RateArgs {
    /// Categories to resolve, e.g. 22K 18K.
    #[arg(required = true)]
    pub categories: Vec<String>,
}

/// Arguments for the set-rate command.
#[derive(Debug, Args)]
pub struct SetRateArgs {
    /// Category, e.g. 22K.
    pub category: String,

    /// Per-gram rate in minor units (paise).
    pub rate_cents: i64,
}

/// Arguments for the earn command.
#[derive(Debug, Args)]
pub struct EarnArgs {
    /// Customer id or phone number.
    pub customer: String,

    /// Points to add.
    pub points: i64,

    /// Sale to link the entry to.
    #[arg(long)]
    pub transaction: Option<String>,
}

/// Arguments for the redeem command.
#[derive(Debug, Args)]
pub struct RedeemArgs {
    /// Customer id or phone number.
    pub customer: String,

    /// Points to spend.
    pub points: i64,
}

/// Arguments for balance and history.
#[derive(Debug, Args)]
pub struct CustomerArgs {
    /// Customer id or phone number.
    pub customer: String,
}
