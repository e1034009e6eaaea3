//! # Rate Commands

use serde::Serialize;
use tracing::debug;

use aurum_core::RateQuote;

use super::{RateArgs, SetRateArgs};
use crate::context::Context;
use crate::error::{ApiError, ApiResult};

/// One category's outcome when several are resolved at once.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedRate {
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<RateQuote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

/// Resolves each requested category independently.
///
/// A single category that cannot be resolved fails the command; with
/// several, failures are reported per category.
pub async fn resolve(args: RateArgs, ctx: &Context) -> ApiResult<Vec<ResolvedRate>> {
    debug!(categories = ?args.categories, "rate command");

    let service = ctx.rates()?;
    let categories: Vec<&str> = args.categories.iter().map(String::as_str).collect();
    let mut results = service.resolve_rates(&categories).await;

    if results.len() == 1 && results[0].1.is_err() {
        if let Some((_, Err(e))) = results.pop() {
            return Err(ctx.fail(e));
        }
    }

    Ok(results
        .into_iter()
        .map(|(category, result)| match result {
            Ok(quote) => ResolvedRate {
                category,
                quote: Some(quote),
                error: None,
            },
            Err(e) => ResolvedRate {
                category,
                quote: None,
                error: Some(ctx.fail(e)),
            },
        })
        .collect())
}

/// Records today's manual rate.
pub async fn set(args: SetRateArgs, ctx: &Context) -> ApiResult<RateQuote> {
    debug!(category = %args.category, rate_cents = args.rate_cents, "set-rate command");

    ctx.rates()?
        .set_manual_rate(&args.category, args.rate_cents)
        .await
        .map_err(|e| ctx.fail(e))
}
