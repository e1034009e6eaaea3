//! # Loyalty Repository
//!
//! Append-only ledger of loyalty point events.
//!
//! ## Ledger Shape
//! ```text
//! ┌──────────────┬─────────┬──────────┬───────────────┐
//! │ customer_id  │ points  │ redeemed │ transaction   │
//! ├──────────────┼─────────┼──────────┼───────────────┤
//! │ C1           │   +3    │  false   │ sale S1       │ earn
//! │ C1           │  +50    │  false   │ -             │ earn (manual)
//! │ C1           │  -20    │  true    │ -             │ redemption
//! └──────────────┴─────────┴──────────┴───────────────┘
//!               balance = Σ points = 33
//! ```
//!
//! Rows are only ever inserted. The balance is always derived.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use aurum_core::LoyaltyEntry;

/// Repository for the loyalty ledger.
#[derive(Debug, Clone)]
pub struct LoyaltyRepository {
    pool: SqlitePool,
}

impl LoyaltyRepository {
    /// Creates a new LoyaltyRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LoyaltyRepository { pool }
    }

    /// Current balance: net sum of every ledger entry for the customer.
    pub async fn balance(&self, customer_id: &str) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        Self::balance_in(&mut conn, customer_id).await
    }

    /// All entries for a customer, newest first.
    pub async fn history(&self, customer_id: &str) -> DbResult<Vec<LoyaltyEntry>> {
        let entries = sqlx::query_as::<_, LoyaltyEntry>(
            r#"
            SELECT id, customer_id, transaction_id, points, redeemed, created_at
            FROM loyalty_entries
            WHERE customer_id = ?1
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Entries linked to a sale.
    pub async fn for_transaction(&self, transaction_id: &str) -> DbResult<Vec<LoyaltyEntry>> {
        let entries = sqlx::query_as::<_, LoyaltyEntry>(
            r#"
            SELECT id, customer_id, transaction_id, points, redeemed, created_at
            FROM loyalty_entries
            WHERE transaction_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    // =========================================================================
    // Unit-of-work operations
    // =========================================================================

    /// Balance on the caller's connection.
    pub async fn balance_in(conn: &mut SqliteConnection, customer_id: &str) -> DbResult<i64> {
        let balance: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(points), 0) FROM loyalty_entries WHERE customer_id = ?1",
        )
        .bind(customer_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(balance)
    }

    /// Appends an entry on the caller's connection.
    pub async fn insert_entry(conn: &mut SqliteConnection, entry: &LoyaltyEntry) -> DbResult<()> {
        debug!(
            customer_id = %entry.customer_id,
            points = entry.points,
            redeemed = entry.redeemed,
            "Appending loyalty entry"
        );

        sqlx::query(
            r#"
            INSERT INTO loyalty_entries (
                id, customer_id, transaction_id, points, redeemed, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.customer_id)
        .bind(&entry.transaction_id)
        .bind(entry.points)
        .bind(entry.redeemed)
        .bind(entry.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Appends a `-points` redemption only if the balance covers it.
    ///
    /// Balance check and insert are one statement, so two concurrent
    /// redemptions can never both pass against the same balance.
    ///
    /// ## Returns
    /// * `Ok(Some(entry))` - Redemption recorded
    /// * `Ok(None)` - Balance too low; nothing written
    pub async fn try_redeem(
        conn: &mut SqliteConnection,
        customer_id: &str,
        points: i64,
        at: DateTime<Utc>,
    ) -> DbResult<Option<LoyaltyEntry>> {
        let id = Uuid::new_v4().to_string();

        debug!(customer_id = %customer_id, points = points, "Attempting redemption");

        let result = sqlx::query(
            r#"
            INSERT INTO loyalty_entries (
                id, customer_id, transaction_id, points, redeemed, created_at
            )
            SELECT ?1, ?2, NULL, -?3, 1, ?4
            WHERE (
                SELECT COALESCE(SUM(points), 0)
                FROM loyalty_entries
                WHERE customer_id = ?2
            ) >= ?3
            "#,
        )
        .bind(&id)
        .bind(customer_id)
        .bind(points)
        .bind(at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(LoyaltyEntry {
            id,
            customer_id: customer_id.to_string(),
            transaction_id: None,
            points: -points,
            redeemed: true,
            created_at: at,
        }))
    }
}

/// Builds an earn entry (positive points, not redeemed).
pub fn earn_entry(
    customer_id: &str,
    points: i64,
    transaction_id: Option<&str>,
    at: DateTime<Utc>,
) -> LoyaltyEntry {
    LoyaltyEntry {
        id: Uuid::new_v4().to_string(),
        customer_id: customer_id.to_string(),
        transaction_id: transaction_id.map(str::to_string),
        points,
        redeemed: false,
        created_at: at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig, DbError};

    #[tokio::test]
    async fn test_guarded_redeem() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let customer = db.customers().create("Asha", "9876543210").await.unwrap();

        {
            let mut conn = db.pool().acquire().await.unwrap();
            let earn = earn_entry(&customer.id, 50, None, Utc::now());
            LoyaltyRepository::insert_entry(&mut conn, &earn).await.unwrap();

            let refused = LoyaltyRepository::try_redeem(&mut conn, &customer.id, 60, Utc::now())
                .await
                .unwrap();
            assert!(refused.is_none());

            let entry = LoyaltyRepository::try_redeem(&mut conn, &customer.id, 50, Utc::now())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(entry.points, -50);
            assert!(entry.redeemed);
        }

        assert_eq!(db.loyalty().balance(&customer.id).await.unwrap(), 0);
        let history = db.loyalty().history(&customer.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].redeemed);
    }

    #[tokio::test]
    async fn test_schema_rejects_malformed_entries() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let customer = db.customers().create("Asha", "9876543210").await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        // earn rows must be positive
        let bad = earn_entry(&customer.id, -5, None, Utc::now());
        let err = LoyaltyRepository::insert_entry(&mut conn, &bad).await.unwrap_err();
        assert!(matches!(err, DbError::QueryFailed(_)));

        let orphan = earn_entry("no-such-customer", 5, None, Utc::now());
        let err = LoyaltyRepository::insert_entry(&mut conn, &orphan).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }
}
