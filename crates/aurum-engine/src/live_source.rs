//! # Live Bullion Quotes
//!
//! The [`QuoteSource`] seam lets [`crate::rates::RateService`] ask an outside
//! feed for the current fine-gold price without knowing how it is fetched.
//!
//! ```text
//! RateService ──► QuoteSource::fetch_spot(purity)
//!                      │
//!                      ├── HttpQuoteSource   GET {live_url}/XAU/{currency}
//!                      │                     x-access-token: {api_key}
//!                      │                     ◄── {"price": 193450.25, ...}
//!                      │
//!                      └── (tests) scripted fake
//! ```
//!
//! Every failure, including timeouts and malformed payloads, comes back as
//! `CoreError::ExternalServiceUnavailable` so the caller can fall through
//! to the next tier.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use aurum_core::{CoreError, CoreResult, Purity};

use crate::config::EngineConfig;

/// A spot price for fine gold, per troy ounce.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotQuote {
    pub price_per_ounce: f64,
    pub fetched_at: DateTime<Utc>,
}

/// Anything that can quote a spot price.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Spot price to use for `purity`. Feeds that only publish fine gold
    /// return the same quote for every purity; the caller scales it.
    async fn fetch_spot(&self, purity: Purity) -> CoreResult<SpotQuote>;
}

#[derive(Debug, Deserialize)]
struct SpotPayload {
    price: f64,
    #[serde(default)]
    timestamp: Option<i64>,
}

/// HTTP quote feed speaking the common `/{metal}/{currency}` JSON shape.
#[derive(Debug, Clone)]
pub struct HttpQuoteSource {
    client: Client,
    base_url: Url,
    currency: String,
    api_key: Option<String>,
}

impl HttpQuoteSource {
    pub const NAME: &'static str = "live-api";

    /// Builds a client with a request timeout.
    pub fn new(
        base_url: &str,
        currency: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> CoreResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| CoreError::unavailable(Self::NAME, format!("invalid url: {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::unavailable(Self::NAME, e.to_string()))?;

        Ok(HttpQuoteSource {
            client,
            base_url,
            currency: currency.trim().to_uppercase(),
            api_key,
        })
    }

    /// Builds the source from `[rates]`, or `None` when no live URL is set.
    pub fn from_config(config: &EngineConfig) -> CoreResult<Option<Self>> {
        match config.rates.live_url.as_deref() {
            Some(url) => Self::new(
                url,
                &config.rates.currency,
                config.rates.api_key.clone(),
                config.request_timeout(),
            )
            .map(Some),
            None => Ok(None),
        }
    }

    fn spot_url(&self) -> Url {
        let path = format!(
            "{}/XAU/{}",
            self.base_url.path().trim_end_matches('/'),
            self.currency
        );
        let mut url = self.base_url.clone();
        url.set_path(&path);
        url
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch_spot(&self, purity: Purity) -> CoreResult<SpotQuote> {
        let url = self.spot_url();
        debug!(%url, %purity, "Fetching live spot price");

        let mut request = self.client.get(url);
        if let Some(key) = &self.api_key {
            request = request.header("x-access-token", key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| CoreError::unavailable(Self::NAME, e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CoreError::unavailable(
                Self::NAME,
                format!("unexpected status {status}"),
            ));
        }

        let payload: SpotPayload = resp
            .json()
            .await
            .map_err(|e| CoreError::unavailable(Self::NAME, format!("malformed payload: {e}")))?;

        parse_spot(payload)
    }
}

fn parse_spot(payload: SpotPayload) -> CoreResult<SpotQuote> {
    if !payload.price.is_finite() || payload.price <= 0.0 {
        return Err(CoreError::unavailable(
            HttpQuoteSource::NAME,
            format!("non-positive price {}", payload.price),
        ));
    }

    let fetched_at = payload
        .timestamp
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now);

    Ok(SpotQuote {
        price_per_ounce: payload.price,
        fetched_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spot_url() {
        let source = HttpQuoteSource::new(
            "https://quotes.example.com/api/",
            "inr",
            None,
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            source.spot_url().as_str(),
            "https://quotes.example.com/api/XAU/INR"
        );
    }

    #[test]
    fn test_bad_url_rejected() {
        let err = HttpQuoteSource::new("not a url", "INR", None, Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, CoreError::ExternalServiceUnavailable { .. }));
    }

    #[test]
    fn test_parse_spot() {
        let payload: SpotPayload =
            serde_json::from_str(r#"{"price": 193450.25, "timestamp": 1760000000, "metal": "XAU"}"#)
                .unwrap();
        let quote = parse_spot(payload).unwrap();
        assert_eq!(quote.price_per_ounce, 193_450.25);
        assert_eq!(quote.fetched_at.timestamp(), 1_760_000_000);

        let payload: SpotPayload = serde_json::from_str(r#"{"price": 0}"#).unwrap();
        assert!(parse_spot(payload).is_err());

        assert!(serde_json::from_str::<SpotPayload>(r#"{"error": "quota"}"#).is_err());
    }

    #[test]
    fn test_from_config_without_url() {
        let config = EngineConfig::default();
        assert!(HttpQuoteSource::from_config(&config).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_unavailable() {
        let source =
            HttpQuoteSource::new("http://127.0.0.1:9", "INR", None, Duration::from_millis(500))
                .unwrap();
        let err = source.fetch_spot(Purity::K24).await.unwrap_err();
        assert!(matches!(err, CoreError::ExternalServiceUnavailable { .. }));
    }
}
