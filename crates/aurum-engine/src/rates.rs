//! # Rate Resolution
//!
//! Finds the per-gram rate to price a category at.
//!
//! ## Fallback Chain
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  resolve_rate("22K")                                                    │
//! │                                                                         │
//! │  1. manual quote for today ─────────────────► source = manual          │
//! │        │ none                                                           │
//! │        ▼                                                                │
//! │  2. live feed (known purities only) ────────► source = live-api        │
//! │        │ unavailable / bad price / no feed                              │
//! │        ▼                                                                │
//! │  3. latest manual quote, any day ───────────► source = manual-fallback │
//! │        │ none                                                           │
//! │        ▼                                                                │
//! │  4. configured default ─────────────────────► source = default         │
//! │        │ none                                                           │
//! │        ▼                                                                │
//! │  NoRateAvailable(category)                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! "Today" is the calendar date at the store's configured UTC offset
//! (`rates.utc_offset_minutes`, UTC when unset).

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use tracing::{debug, info, warn};

use aurum_core::validation::{validate_category, validate_rate_cents};
use aurum_core::{CoreError, Purity, RateQuote, RateSource};
use aurum_db::Database;

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::live_source::{HttpQuoteSource, QuoteSource};

/// Resolves and records per-gram rates.
#[derive(Clone)]
pub struct RateService {
    db: Database,
    source: Option<Arc<dyn QuoteSource>>,
    defaults: BTreeMap<String, i64>,
    offset: FixedOffset,
}

impl std::fmt::Debug for RateService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateService")
            .field("source", &self.source.as_ref().map(|s| s.name().to_string()))
            .field("defaults", &self.defaults)
            .field("offset", &self.offset)
            .finish()
    }
}

impl RateService {
    /// A service with no live feed and no defaults.
    pub fn new(db: Database) -> Self {
        RateService {
            db,
            source: None,
            defaults: BTreeMap::new(),
            offset: Utc.fix(),
        }
    }

    /// Builds the service from `[rates]`.
    pub fn from_config(db: Database, config: &EngineConfig) -> EngineResult<Self> {
        let mut service = Self::new(db)
            .with_defaults(config.rates.default_rates.clone())
            .with_utc_offset(config.business_offset());
        if let Some(source) = HttpQuoteSource::from_config(config)? {
            service = service.with_source(Arc::new(source));
        }
        Ok(service)
    }

    /// Adds a live quote source.
    pub fn with_source(mut self, source: Arc<dyn QuoteSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Sets the last-resort defaults, keyed by category.
    pub fn with_defaults(mut self, defaults: BTreeMap<String, i64>) -> Self {
        self.defaults = defaults
            .into_iter()
            .map(|(category, rate)| (normalize_category(&category), rate))
            .collect();
        self
    }

    /// Sets the offset whose calendar date counts as "today".
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// The store's calendar date at `now`.
    pub fn business_day(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    /// Records today's manual rate, replacing any earlier one for today.
    pub async fn set_manual_rate(&self, category: &str, rate_cents: i64) -> EngineResult<RateQuote> {
        self.set_manual_rate_at(category, rate_cents, Utc::now()).await
    }

    /// Records the manual rate for the business day containing `now`.
    pub async fn set_manual_rate_at(
        &self,
        category: &str,
        rate_cents: i64,
        now: DateTime<Utc>,
    ) -> EngineResult<RateQuote> {
        validate_category(category)?;
        validate_rate_cents(rate_cents)?;

        let category = normalize_category(category);
        let quoted_on = self.business_day(now);
        let stored = self
            .db
            .rates()
            .upsert(&category, rate_cents, quoted_on, now)
            .await?;

        info!(category = %category, rate_cents = rate_cents, %quoted_on, "Manual rate set");
        Ok(stored.into_quote(RateSource::Manual))
    }

    /// Resolves the effective rate for `category` now.
    pub async fn resolve_rate(&self, category: &str) -> EngineResult<RateQuote> {
        self.resolve_rate_at(category, Utc::now()).await
    }

    /// Resolves the effective rate for `category` as of `now`.
    pub async fn resolve_rate_at(
        &self,
        category: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<RateQuote> {
        validate_category(category)?;
        let category = normalize_category(category);
        let rates = self.db.rates();

        if let Some(manual) = rates.find_for_day(&category, self.business_day(now)).await? {
            debug!(category = %category, "Using today's manual rate");
            return Ok(manual.into_quote(RateSource::Manual));
        }

        if let Some(quote) = self.live_rate(&category).await {
            info!(category = %category, rate_cents = quote.rate_cents, "Using live rate");
            return Ok(quote);
        }

        if let Some(manual) = rates.latest(&category).await? {
            warn!(
                category = %category,
                quoted_on = %manual.quoted_on,
                "Falling back to last manual rate"
            );
            return Ok(manual.into_quote(RateSource::ManualFallback));
        }

        if let Some(&rate_cents) = self.defaults.get(&category) {
            warn!(category = %category, rate_cents = rate_cents, "Falling back to default rate");
            return Ok(RateQuote {
                category,
                rate_cents,
                source: RateSource::Default,
                timestamp: now,
            });
        }

        warn!(category = %category, "No rate available");
        Err(CoreError::NoRateAvailable(category).into())
    }

    /// Resolves each category independently.
    pub async fn resolve_rates(
        &self,
        categories: &[&str],
    ) -> Vec<(String, EngineResult<RateQuote>)> {
        let mut resolved = Vec::with_capacity(categories.len());
        for category in categories {
            let result = self.resolve_rate(category).await;
            resolved.push((category.to_string(), result));
        }
        resolved
    }

    async fn live_rate(&self, category: &str) -> Option<RateQuote> {
        let source = self.source.as_ref()?;
        let purity: Purity = category.parse().ok()?;

        let spot = match source.fetch_spot(purity).await {
            Ok(spot) => spot,
            Err(e) => {
                warn!(category = %category, source = source.name(), error = %e, "Live rate unavailable");
                return None;
            }
        };

        let Some(rate) = purity.per_gram_from_ounce(spot.price_per_ounce) else {
            warn!(
                category = %category,
                price_per_ounce = spot.price_per_ounce,
                "Live price out of range"
            );
            return None;
        };

        Some(RateQuote {
            category: category.to_string(),
            rate_cents: rate.cents(),
            source: RateSource::LiveApi,
            timestamp: spot.fetched_at,
        })
    }
}

/// Canonical category key: known purities become "22K" etc., anything else
/// is trimmed and upper-cased.
fn normalize_category(category: &str) -> String {
    match category.parse::<Purity>() {
        Ok(purity) => purity.as_str().to_string(),
        Err(_) => category.trim().to_uppercase(),
    }
}
