//! # Loyalty Ledger
//!
//! Earn and redeem points against the append-only ledger.
//!
//! ```text
//! earn(C1, 50)    ──► +50            balance 50
//! redeem(C1, 20)  ──► -20 (redeemed) balance 30
//! redeem(C1, 60)  ──► InsufficientPoints { requested: 60, available: 30 }
//! ```
//!
//! The balance is never stored; it is the sum of the customer's entries.
//! A redemption's balance check and its insert are one guarded statement,
//! so two concurrent redemptions cannot both spend the same points.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use aurum_core::validation::validate_points;
use aurum_core::{CoreError, LoyaltyEntry};
use aurum_db::repository::loyalty::earn_entry;
use aurum_db::{Database, DbError, LoyaltyRepository};

use crate::error::{EngineError, EngineResult};
use crate::retry::ConflictRetry;

/// Outcome of a successful redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Redemption {
    pub redeemed_points: i64,
    pub remaining_points: i64,
}

/// Loyalty operations for one store database.
#[derive(Debug, Clone)]
pub struct LoyaltyLedger {
    db: Database,
    retry: ConflictRetry,
}

impl LoyaltyLedger {
    pub fn new(db: Database) -> Self {
        LoyaltyLedger {
            db,
            retry: ConflictRetry::default(),
        }
    }

    /// Replaces the retry policy.
    pub fn with_retry(mut self, retry: ConflictRetry) -> Self {
        self.retry = retry;
        self
    }

    /// Appends a positive entry, optionally linked to a sale.
    pub async fn earn(
        &self,
        customer_id: &str,
        points: i64,
        transaction_id: Option<&str>,
    ) -> EngineResult<LoyaltyEntry> {
        validate_points(points)?;
        self.ensure_customer(customer_id).await?;

        let entry = self
            .retry
            .run("loyalty_earn", move || async move {
                let entry = earn_entry(customer_id, points, transaction_id, Utc::now());
                let mut conn = self.db.pool().acquire().await.map_err(DbError::from)?;
                LoyaltyRepository::insert_entry(&mut conn, &entry).await?;
                Ok(entry)
            })
            .await?;

        info!(customer_id = %customer_id, points = points, "Loyalty points earned");
        Ok(entry)
    }

    /// Spends `points` if the balance covers them.
    ///
    /// ## Errors
    /// * `Validation` - points not positive
    /// * `NotFound` - unknown customer
    /// * `InsufficientPoints` - balance too low; nothing written
    pub async fn redeem(&self, customer_id: &str, points: i64) -> EngineResult<Redemption> {
        validate_points(points)?;
        self.ensure_customer(customer_id).await?;

        let redemption = self
            .retry
            .run("loyalty_redeem", move || self.redeem_once(customer_id, points))
            .await?;

        info!(
            customer_id = %customer_id,
            redeemed = redemption.redeemed_points,
            remaining = redemption.remaining_points,
            "Loyalty points redeemed"
        );
        Ok(redemption)
    }

    async fn redeem_once(&self, customer_id: &str, points: i64) -> EngineResult<Redemption> {
        let mut tx = self.db.begin().await?;

        let redeemed = LoyaltyRepository::try_redeem(&mut tx, customer_id, points, Utc::now()).await?;
        let remaining = LoyaltyRepository::balance_in(&mut tx, customer_id).await?;

        if redeemed.is_none() {
            warn!(
                customer_id = %customer_id,
                requested = points,
                available = remaining,
                "Redemption exceeds balance"
            );
            return Err(CoreError::InsufficientPoints {
                requested: points,
                available: remaining,
            }
            .into());
        }

        tx.commit().await.map_err(DbError::from)?;

        Ok(Redemption {
            redeemed_points: points,
            remaining_points: remaining,
        })
    }

    /// Current balance.
    pub async fn balance(&self, customer_id: &str) -> EngineResult<i64> {
        self.ensure_customer(customer_id).await?;
        Ok(self.db.loyalty().balance(customer_id).await?)
    }

    /// Every entry for the customer, newest first.
    pub async fn history(&self, customer_id: &str) -> EngineResult<Vec<LoyaltyEntry>> {
        self.ensure_customer(customer_id).await?;
        Ok(self.db.loyalty().history(customer_id).await?)
    }

    async fn ensure_customer(&self, customer_id: &str) -> EngineResult<()> {
        debug!(customer_id = %customer_id, "Checking customer");
        if self.db.customers().exists(customer_id).await? {
            Ok(())
        } else {
            Err(EngineError::not_found("Customer", customer_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{memory_db, seed_customer};
    use aurum_db::DbConfig;
    use std::time::Duration;

    #[tokio::test]
    async fn test_earn_then_redeem() {
        let db = memory_db().await;
        let customer = seed_customer(&db, "9000000001").await;
        let ledger = LoyaltyLedger::new(db);

        let entry = ledger.earn(&customer.id, 50, None).await.unwrap();
        assert_eq!(entry.points, 50);
        assert!(!entry.redeemed);
        assert!(entry.transaction_id.is_none());

        let redemption = ledger.redeem(&customer.id, 20).await.unwrap();
        assert_eq!(
            redemption,
            Redemption {
                redeemed_points: 20,
                remaining_points: 30
            }
        );
        assert_eq!(ledger.balance(&customer.id).await.unwrap(), 30);

        let history = ledger.history(&customer.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].points, -20);
        assert!(history[0].is_redemption());
        assert!(!history[1].is_redemption());
    }

    #[tokio::test]
    async fn test_overdraw_rejected() {
        let db = memory_db().await;
        let customer = seed_customer(&db, "9000000001").await;
        let ledger = LoyaltyLedger::new(db);
        ledger.earn(&customer.id, 50, None).await.unwrap();

        let err = ledger.redeem(&customer.id, 60).await.unwrap_err();
        match err {
            EngineError::Domain(CoreError::InsufficientPoints {
                requested,
                available,
            }) => {
                assert_eq!(requested, 60);
                assert_eq!(available, 50);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(ledger.balance(&customer.id).await.unwrap(), 50);
        assert_eq!(ledger.history(&customer.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_exact_balance_redeems_to_zero() {
        let db = memory_db().await;
        let customer = seed_customer(&db, "9000000001").await;
        let ledger = LoyaltyLedger::new(db);
        ledger.earn(&customer.id, 15, None).await.unwrap();

        let redemption = ledger.redeem(&customer.id, 15).await.unwrap();
        assert_eq!(redemption.remaining_points, 0);

        let err = ledger.redeem(&customer.id, 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientPoints);
    }

    #[tokio::test]
    async fn test_invalid_input() {
        let db = memory_db().await;
        let customer = seed_customer(&db, "9000000001").await;
        let ledger = LoyaltyLedger::new(db);

        assert_eq!(
            ledger.earn(&customer.id, 0, None).await.unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ledger.redeem(&customer.id, -5).await.unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ledger.earn("ghost", 10, None).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ledger.redeem("ghost", 10).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ledger.balance("ghost").await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_redemptions_never_overdraw() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("aurum.db")).max_connections(4))
            .await
            .unwrap();
        let customer = seed_customer(&db, "9000000001").await;
        let ledger =
            LoyaltyLedger::new(db).with_retry(ConflictRetry::new(20, Duration::from_millis(5)));
        ledger.earn(&customer.id, 100, None).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..6 {
            let ledger = ledger.clone();
            let customer_id = customer.id.clone();
            handles.push(tokio::spawn(async move {
                ledger.redeem(&customer_id, 30).await
            }));
        }

        let mut successes = 0i64;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(e) => assert!(
                    matches!(
                        e.kind(),
                        ErrorKind::InsufficientPoints | ErrorKind::PersistenceFailure
                    ),
                    "unexpected error: {e:?}"
                ),
            }
        }

        assert!(successes <= 3);
        let balance = ledger.balance(&customer.id).await.unwrap();
        assert!(balance >= 0);
        assert_eq!(balance, 100 - 30 * successes);
    }
}
