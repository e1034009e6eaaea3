//! # Aurum Back Office
//!
//! Command line front end for the sale-processing engine.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          backoffice <command>                           │
//! │                                                                         │
//! │  1. Initialize Logging ──────────► stderr, RUST_LOG aware              │
//! │  2. Parse Arguments ─────────────► clap                                │
//! │  3. Load Config ─────────────────► aurum.toml + AURUM_* env + --db     │
//! │  4. Open Database ───────────────► SQLite (WAL), migrations            │
//! │  5. Run Command ─────────────────► one aurum-engine unit of work       │
//! │  6. Print Envelope ──────────────► stdout JSON, exit 1 on failure      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Examples
//! ```text
//! backoffice init-config
//! backoffice sale --customer 9000000001 --item <PRODUCT_ID>:2 --payment upi
//! backoffice import sales.csv
//! backoffice set-rate 22K 650000
//! backoffice rate 22K 18K
//! backoffice redeem 9000000001 40
//! ```

mod commands;
mod context;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use commands::{
    CustomerArgs, EarnArgs, ImportArgs, InitConfigArgs, RateArgs, RedeemArgs, SaleArgs,
    SetRateArgs,
};
use context::Context;
use error::{ApiResponse, ApiResult};

#[derive(Debug, Parser)]
#[command(name = "backoffice", version, about = "Aurum jewellery back-office tools")]
struct Cli {
    /// Config file (defaults to the platform config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file, overriding config and environment.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write a default config file.
    InitConfig(InitConfigArgs),
    /// Record a sale.
    Sale(SaleArgs),
    /// Import sales from a CSV file.
    Import(ImportArgs),
    /// Show effective per-gram rates.
    Rate(RateArgs),
    /// Record today's manual rate for a category.
    SetRate(SetRateArgs),
    /// Add loyalty points.
    Earn(EarnArgs),
    /// Spend loyalty points.
    Redeem(RedeemArgs),
    /// Show a customer's loyalty balance.
    Balance(CustomerArgs),
    /// List a customer's loyalty entries, newest first.
    History(CustomerArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_tracing();

    let cli = Cli::parse();

    let command = match cli.command {
        Command::InitConfig(args) => {
            let ok = emit(commands::config::init(args, cli.config));
            return Ok(exit_code(ok));
        }
        other => other,
    };

    let ctx = Context::load(cli.config, cli.db).await?;

    let ok = match command {
        Command::InitConfig(_) => unreachable!("handled before the database is opened"),
        Command::Sale(args) => emit(commands::sale::run(args, &ctx).await),
        Command::Import(args) => emit(commands::import::run(args, &ctx).await),
        Command::Rate(args) => emit(commands::rate::resolve(args, &ctx).await),
        Command::SetRate(args) => emit(commands::rate::set(args, &ctx).await),
        Command::Earn(args) => emit(commands::loyalty::earn(args, &ctx).await),
        Command::Redeem(args) => emit(commands::loyalty::redeem(args, &ctx).await),
        Command::Balance(args) => emit(commands::loyalty::balance(args, &ctx).await),
        Command::History(args) => emit(commands::loyalty::history(args, &ctx).await),
    };

    ctx.db.close().await;
    Ok(exit_code(ok))
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Prints the result envelope and reports whether the command succeeded.
fn emit<T: Serialize>(result: ApiResult<T>) -> bool {
    match &result {
        Ok(_) => info!("Command succeeded"),
        Err(e) => error!(code = ?e.code, message = %e.message, "Command failed"),
    }

    let ok = result.is_ok();
    let response = ApiResponse::from(result);
    match serde_json::to_string_pretty(&response) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            error!(error = %e, "Failed to serialize response");
            return false;
        }
    }
    ok
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,aurum=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
