//! # Sale Transaction Writer
//!
//! Turns a cart into a durable sale in one SQLite transaction.
//!
//! ## Unit of Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     create_sale (one attempt)                           │
//! │                                                                         │
//! │  pool:  validate lines ─► customer exists?                             │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │   ├─ for each line:                                                     │
//! │   │    UPDATE stock = stock - q WHERE stock >= q   (guarded)           │
//! │   │    0 rows ─► NotFound / InsufficientStock ─► ROLLBACK              │
//! │   │    read product ─► price line (base + tax) ─► accumulate           │
//! │   ├─ customer still exists? ─► NotFound ─► ROLLBACK                     │
//! │   ├─ INSERT sale header                                                 │
//! │   ├─ INSERT line items                                                  │
//! │   ├─ customer.total_spent += final                                      │
//! │   ├─ INSERT loyalty earn entry (if points > 0)                          │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The guarded decrement is the first statement of the transaction. The
//! connection takes the write lock before it reads anything, so the reads
//! that follow never see a snapshot another writer has moved past. Lock
//! contention (`SQLITE_BUSY`) rolls the attempt back and [`ConflictRetry`]
//! runs it again.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use aurum_core::validation::validate_sale_lines;
use aurum_core::{
    CoreError, Money, PaymentMode, PriceBreakdown, PricingCalculator, SaleLineItem,
    SaleLineRequest, SaleStatus, SaleTransaction,
};
use aurum_db::repository::loyalty::earn_entry;
use aurum_db::repository::sale::{generate_invoice_number, generate_sale_id, generate_sale_item_id};
use aurum_db::{
    CustomerRepository, Database, DbError, LoyaltyRepository, ProductRepository, SaleRepository,
};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::retry::ConflictRetry;

/// What a committed sale returns to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleReceipt {
    pub transaction_id: String,
    pub invoice_number: String,
    pub customer_id: String,
    /// Σ line base amounts, before tax.
    pub total_amount: Money,
    pub tax_amount: Money,
    pub final_amount: Money,
    pub payment_mode: PaymentMode,
    pub line_items: Vec<SaleLineItem>,
    pub loyalty_points_earned: i64,
    pub created_at: DateTime<Utc>,
}

/// Writes sales.
///
/// Cheap to clone: the database handle is a pool handle.
#[derive(Debug, Clone)]
pub struct SaleWriter {
    db: Database,
    pricing: PricingCalculator,
    retry: ConflictRetry,
}

impl SaleWriter {
    /// Creates a writer with the default retry policy.
    pub fn new(db: Database, pricing: PricingCalculator) -> Self {
        SaleWriter {
            db,
            pricing,
            retry: ConflictRetry::default(),
        }
    }

    /// Creates a writer from the `[sales]` settings.
    pub fn from_config(db: Database, config: &EngineConfig) -> Self {
        SaleWriter {
            db,
            pricing: config.pricing(),
            retry: ConflictRetry::new(
                config.sales.max_conflict_retries,
                std::time::Duration::from_millis(config.sales.initial_backoff_ms),
            ),
        }
    }

    /// Replaces the retry policy.
    pub fn with_retry(mut self, retry: ConflictRetry) -> Self {
        self.retry = retry;
        self
    }

    pub fn pricing(&self) -> &PricingCalculator {
        &self.pricing
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Records a sale of `items` to `customer_id`.
    ///
    /// ## Errors
    /// * `Validation` - empty cart, bad quantity, blank product id
    /// * `NotFound` - unknown customer, unknown or inactive product
    /// * `InsufficientStock` - a line asks for more than is left, counting
    ///   earlier lines of the same cart
    /// * `PersistenceFailure` - storage failed, or lock contention outlasted
    ///   the retry budget
    ///
    /// On any error nothing is written.
    pub async fn create_sale(
        &self,
        customer_id: &str,
        items: &[SaleLineRequest],
        payment_mode: PaymentMode,
    ) -> EngineResult<SaleReceipt> {
        debug!(customer_id = %customer_id, lines = items.len(), %payment_mode, "create_sale");

        validate_sale_lines(items)?;

        if !self.db.customers().exists(customer_id).await? {
            return Err(EngineError::not_found("Customer", customer_id));
        }

        let receipt = self
            .retry
            .run("create_sale", move || {
                self.create_sale_once(customer_id, items, payment_mode)
            })
            .await?;

        info!(
            transaction_id = %receipt.transaction_id,
            invoice_number = %receipt.invoice_number,
            customer_id = %receipt.customer_id,
            final_amount = %receipt.final_amount,
            points = receipt.loyalty_points_earned,
            "Sale committed"
        );

        Ok(receipt)
    }

    async fn create_sale_once(
        &self,
        customer_id: &str,
        items: &[SaleLineRequest],
        payment_mode: PaymentMode,
    ) -> EngineResult<SaleReceipt> {
        let now = Utc::now();
        let transaction_id = generate_sale_id();

        let mut tx = self.db.begin().await?;

        let mut breakdown = PriceBreakdown::default();
        let mut line_items = Vec::with_capacity(items.len());

        for item in items {
            let product_id = item.product_id.trim();

            if !ProductRepository::try_decrement_stock(&mut tx, product_id, item.quantity).await? {
                let err = match ProductRepository::get_by_id_in(&mut tx, product_id).await? {
                    None => EngineError::not_found("Product", product_id),
                    Some(product) => {
                        warn!(
                            sku = %product.sku,
                            requested = item.quantity,
                            available = product.stock_quantity,
                            "Insufficient stock"
                        );
                        CoreError::InsufficientStock {
                            product: product.sku,
                            requested: item.quantity,
                            available: product.stock_quantity,
                        }
                        .into()
                    }
                };
                return Err(err);
            }

            // Inactive products still match the guarded UPDATE; the read
            // below filters them out and the drop of `tx` undoes the decrement.
            let product = ProductRepository::get_by_id_in(&mut tx, product_id)
                .await?
                .ok_or_else(|| EngineError::not_found("Product", product_id))?;

            let priced = self.pricing.price_line(product.selling_price(), item.quantity);
            breakdown.accumulate(&priced);

            line_items.push(SaleLineItem {
                id: generate_sale_item_id(),
                transaction_id: transaction_id.clone(),
                product_id: product.id,
                sku_snapshot: product.sku,
                quantity: item.quantity,
                unit_price_cents: priced.unit_price.cents(),
                total_price_cents: priced.base.cents(),
                tax_cents: priced.tax.cents(),
                created_at: now,
            });
        }

        // Re-checked under the write lock; the pool check above can be stale.
        if !CustomerRepository::exists_in(&mut tx, customer_id).await? {
            return Err(EngineError::not_found("Customer", customer_id));
        }

        let sale = SaleTransaction {
            id: transaction_id.clone(),
            invoice_number: generate_invoice_number(now),
            customer_id: customer_id.to_string(),
            total_amount_cents: breakdown.subtotal.cents(),
            tax_amount_cents: breakdown.tax.cents(),
            final_amount_cents: breakdown.total.cents(),
            payment_mode,
            status: SaleStatus::Completed,
            created_at: now,
        };

        SaleRepository::insert_transaction(&mut tx, &sale).await?;
        for line in &line_items {
            SaleRepository::insert_line_item(&mut tx, line).await?;
        }

        CustomerRepository::add_to_total_spent(&mut tx, customer_id, sale.final_amount_cents)
            .await?;

        let points = self.pricing.loyalty_points(breakdown.total);
        if points > 0 {
            let entry = earn_entry(customer_id, points, Some(&transaction_id), now);
            LoyaltyRepository::insert_entry(&mut tx, &entry).await?;
        }

        tx.commit().await.map_err(DbError::from)?;

        Ok(SaleReceipt {
            transaction_id,
            invoice_number: sale.invoice_number,
            customer_id: sale.customer_id,
            total_amount: breakdown.subtotal,
            tax_amount: breakdown.tax,
            final_amount: breakdown.total,
            payment_mode,
            line_items,
            loyalty_points_earned: points,
            created_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{memory_writer, seed_customer, seed_product};
    use aurum_core::TaxRate;
    use aurum_db::DbConfig;
    use std::time::Duration;

    #[tokio::test]
    async fn test_single_line_sale() {
        let writer = memory_writer().await;
        let db = writer.database().clone();
        let customer = seed_customer(&db, "9000000001").await;
        let product = seed_product(&db, "RING-22K", 10, 10_000).await;

        let receipt = writer
            .create_sale(
                &customer.id,
                &[SaleLineRequest::new(&product.id, 3)],
                PaymentMode::Cash,
            )
            .await
            .unwrap();

        assert_eq!(receipt.total_amount.cents(), 30_000);
        assert_eq!(receipt.tax_amount.cents(), 900);
        assert_eq!(receipt.final_amount.to_string(), "309.00");
        assert_eq!(receipt.loyalty_points_earned, 3);
        assert_eq!(receipt.line_items.len(), 1);
        assert_eq!(receipt.line_items[0].sku_snapshot, "RING-22K");
        assert!(receipt.invoice_number.starts_with("INV-"));

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.stock_quantity, 7);

        let customer = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(customer.total_spent_cents, 30_900);

        assert_eq!(db.loyalty().balance(&customer.id).await.unwrap(), 3);
        let linked = db
            .loyalty()
            .for_transaction(&receipt.transaction_id)
            .await
            .unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].points, 3);

        let stored = db.sales().get_by_id(&receipt.transaction_id).await.unwrap().unwrap();
        assert_eq!(stored.final_amount_cents, 30_900);
        assert_eq!(stored.status, SaleStatus::Completed);
        assert_eq!(db.sales().get_items(&stored.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_large_quantity_within_stock() {
        let writer = memory_writer().await;
        let db = writer.database().clone();
        let customer = seed_customer(&db, "9000000001").await;
        let product = seed_product(&db, "BEAD", 5_000, 100).await;

        let receipt = writer
            .create_sale(
                &customer.id,
                &[SaleLineRequest::new(&product.id, 1_000)],
                PaymentMode::Cash,
            )
            .await
            .unwrap();

        assert_eq!(receipt.total_amount.cents(), 100_000);
        assert_eq!(receipt.final_amount.cents(), 103_000);
        assert_eq!(receipt.loyalty_points_earned, 10);

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.stock_quantity, 4_000);
    }

    #[tokio::test]
    async fn test_customer_checked_inside_transaction() {
        let writer = memory_writer().await;
        let db = writer.database().clone();
        let product = seed_product(&db, "RING", 10, 10_000).await;

        let err = writer
            .create_sale_once("deleted", &[SaleLineRequest::new(&product.id, 2)], PaymentMode::Cash)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("deleted"));

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.stock_quantity, 10);
        assert_eq!(db.sales().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_nothing() {
        let writer = memory_writer().await;
        let db = writer.database().clone();
        let customer = seed_customer(&db, "9000000001").await;
        let product = seed_product(&db, "P1", 2, 10_000).await;

        let err = writer
            .create_sale(
                &customer.id,
                &[SaleLineRequest::new(&product.id, 5)],
                PaymentMode::Card,
            )
            .await
            .unwrap_err();

        match err {
            EngineError::Domain(CoreError::InsufficientStock {
                product,
                requested,
                available,
            }) => {
                assert_eq!(product, "P1");
                assert_eq!(requested, 5);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.stock_quantity, 2);
        assert_eq!(db.sales().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failing_second_line_rolls_back_first() {
        let writer = memory_writer().await;
        let db = writer.database().clone();
        let customer = seed_customer(&db, "9000000001").await;
        let ring = seed_product(&db, "RING", 10, 10_000).await;
        let chain = seed_product(&db, "CHAIN", 1, 20_000).await;

        let err = writer
            .create_sale(
                &customer.id,
                &[
                    SaleLineRequest::new(&ring.id, 4),
                    SaleLineRequest::new(&chain.id, 2),
                ],
                PaymentMode::Upi,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);

        let ring = db.products().get_by_id(&ring.id).await.unwrap().unwrap();
        assert_eq!(ring.stock_quantity, 10);

        let customer = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(customer.total_spent_cents, 0);
        assert_eq!(db.loyalty().balance(&customer.id).await.unwrap(), 0);
        assert_eq!(db.sales().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_repeated_lines_see_earlier_decrements() {
        let writer = memory_writer().await;
        let db = writer.database().clone();
        let customer = seed_customer(&db, "9000000001").await;
        let product = seed_product(&db, "BANGLE", 5, 10_000).await;

        let err = writer
            .create_sale(
                &customer.id,
                &[
                    SaleLineRequest::new(&product.id, 3),
                    SaleLineRequest::new(&product.id, 3),
                ],
                PaymentMode::Cash,
            )
            .await
            .unwrap_err();

        match err {
            EngineError::Domain(CoreError::InsufficientStock {
                requested, available, ..
            }) => {
                assert_eq!(requested, 3);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.stock_quantity, 5);
    }

    #[tokio::test]
    async fn test_unknown_references() {
        let writer = memory_writer().await;
        let db = writer.database().clone();
        let customer = seed_customer(&db, "9000000001").await;
        let product = seed_product(&db, "RING", 10, 10_000).await;

        let err = writer
            .create_sale("missing", &[SaleLineRequest::new(&product.id, 1)], PaymentMode::Cash)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = writer
            .create_sale(
                &customer.id,
                &[
                    SaleLineRequest::new(&product.id, 1),
                    SaleLineRequest::new("no-such-product", 1),
                ],
                PaymentMode::Cash,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.stock_quantity, 10);
    }

    #[tokio::test]
    async fn test_validation_runs_first() {
        let writer = memory_writer().await;
        let db = writer.database().clone();
        let product = seed_product(&db, "RING", 10, 10_000).await;

        let err = writer
            .create_sale("missing", &[], PaymentMode::Cash)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = writer
            .create_sale("missing", &[SaleLineRequest::new(&product.id, 0)], PaymentMode::Cash)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_total_spent_accumulates_and_small_sales_earn_nothing() {
        let writer = memory_writer().await;
        let db = writer.database().clone();
        let customer = seed_customer(&db, "9000000001").await;
        let pendant = seed_product(&db, "PENDANT", 10, 5_000).await;

        let first = writer
            .create_sale(&customer.id, &[SaleLineRequest::new(&pendant.id, 1)], PaymentMode::Cash)
            .await
            .unwrap();
        assert_eq!(first.final_amount.cents(), 5_150);
        assert_eq!(first.loyalty_points_earned, 0);
        assert!(db
            .loyalty()
            .for_transaction(&first.transaction_id)
            .await
            .unwrap()
            .is_empty());

        let second = writer
            .create_sale(&customer.id, &[SaleLineRequest::new(&pendant.id, 2)], PaymentMode::Card)
            .await
            .unwrap();

        let customer = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(
            customer.total_spent_cents,
            first.final_amount.cents() + second.final_amount.cents()
        );
        assert_eq!(db.sales().list_for_customer(&customer.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_configured_tax_rate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let writer = SaleWriter::new(db.clone(), PricingCalculator::new(TaxRate::from_bps(0)));
        let customer = seed_customer(&db, "9000000001").await;
        let product = seed_product(&db, "COIN-24K", 3, 10_000).await;

        let receipt = writer
            .create_sale(&customer.id, &[SaleLineRequest::new(&product.id, 1)], PaymentMode::Cash)
            .await
            .unwrap();

        assert!(receipt.tax_amount.is_zero());
        assert_eq!(receipt.final_amount.cents(), 10_000);
        assert_eq!(receipt.loyalty_points_earned, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_never_oversell() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("aurum.db")).max_connections(4))
            .await
            .unwrap();
        let writer = SaleWriter::new(db.clone(), PricingCalculator::default())
            .with_retry(ConflictRetry::new(20, Duration::from_millis(5)));

        let customer = seed_customer(&db, "9000000001").await;
        let product = seed_product(&db, "RING", 10, 10_000).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let writer = writer.clone();
            let customer_id = customer.id.clone();
            let product_id = product.id.clone();
            handles.push(tokio::spawn(async move {
                writer
                    .create_sale(
                        &customer_id,
                        &[SaleLineRequest::new(product_id, 2)],
                        PaymentMode::Cash,
                    )
                    .await
            }));
        }

        let mut successes = 0i64;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(e) => assert!(
                    matches!(
                        e.kind(),
                        ErrorKind::InsufficientStock | ErrorKind::PersistenceFailure
                    ),
                    "unexpected error: {e:?}"
                ),
            }
        }

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert!(after.stock_quantity >= 0);
        assert_eq!(after.stock_quantity, 10 - 2 * successes);
        assert_eq!(db.sales().count().await.unwrap(), successes);

        let customer = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(customer.total_spent_cents, successes * 20_600);
    }
}
