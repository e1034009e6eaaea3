//! # Manual Rate Repository
//!
//! Per-gram rates entered by hand at the counter. One authoritative quote
//! per category per calendar day; entering another the same day replaces it.
//!
//! Live and default rates are never persisted here.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use aurum_core::ManualRate;

/// Repository for manual rate quotes.
#[derive(Debug, Clone)]
pub struct RateRepository {
    pool: SqlitePool,
}

impl RateRepository {
    /// Creates a new RateRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RateRepository { pool }
    }

    /// Inserts or replaces the quote for `(category, quoted_on)`.
    pub async fn upsert(
        &self,
        category: &str,
        rate_cents: i64,
        quoted_on: NaiveDate,
        at: DateTime<Utc>,
    ) -> DbResult<ManualRate> {
        debug!(category = %category, rate_cents = rate_cents, %quoted_on, "Upserting manual rate");

        let rate = sqlx::query_as::<_, ManualRate>(
            r#"
            INSERT INTO manual_rates (id, category, rate_cents, quoted_on, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (category, quoted_on) DO UPDATE SET
                rate_cents = excluded.rate_cents,
                created_at = excluded.created_at
            RETURNING id, category, rate_cents, quoted_on, created_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(category)
        .bind(rate_cents)
        .bind(quoted_on)
        .bind(at)
        .fetch_one(&self.pool)
        .await?;

        Ok(rate)
    }

    /// The quote for a category on a specific day, if any.
    pub async fn find_for_day(
        &self,
        category: &str,
        day: NaiveDate,
    ) -> DbResult<Option<ManualRate>> {
        let rate = sqlx::query_as::<_, ManualRate>(
            r#"
            SELECT id, category, rate_cents, quoted_on, created_at
            FROM manual_rates
            WHERE category = ?1 AND quoted_on = ?2
            "#,
        )
        .bind(category)
        .bind(day)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rate)
    }

    /// The most recent quote for a category, regardless of date.
    pub async fn latest(&self, category: &str) -> DbResult<Option<ManualRate>> {
        let rate = sqlx::query_as::<_, ManualRate>(
            r#"
            SELECT id, category, rate_cents, quoted_on, created_at
            FROM manual_rates
            WHERE category = ?1
            ORDER BY quoted_on DESC, created_at DESC
            LIMIT 1
            "#,
        )
        .bind(category)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_one_quote_per_day() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.rates();
        let today = Utc::now().date_naive();

        repo.upsert("22K", 600_000, today, Utc::now()).await.unwrap();
        let replaced = repo.upsert("22K", 610_000, today, Utc::now()).await.unwrap();
        assert_eq!(replaced.rate_cents, 610_000);

        let found = repo.find_for_day("22K", today).await.unwrap().unwrap();
        assert_eq!(found.rate_cents, 610_000);
        assert!(repo.find_for_day("18K", today).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_latest_prefers_newest_day() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.rates();
        let today = Utc::now().date_naive();

        repo.upsert("24K", 700_000, today - Duration::days(7), Utc::now())
            .await
            .unwrap();
        repo.upsert("24K", 710_000, today - Duration::days(2), Utc::now())
            .await
            .unwrap();

        let latest = repo.latest("24K").await.unwrap().unwrap();
        assert_eq!(latest.rate_cents, 710_000);
        assert_eq!(latest.quoted_on, today - Duration::days(2));
        assert!(repo.latest("14K").await.unwrap().is_none());
    }
}
