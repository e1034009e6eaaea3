//! # Sale Repository
//!
//! Database operations for sale transactions and their line items.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  One Sale = One Transaction                             │
//! │                                                                         │
//! │  BEGIN                                                                 │
//! │   ├── ProductRepository::try_decrement_stock()   × lines               │
//! │   ├── SaleRepository::insert_transaction()       header                │
//! │   ├── SaleRepository::insert_line_item()         × lines               │
//! │   ├── CustomerRepository::add_to_total_spent()                         │
//! │   └── LoyaltyRepository::insert_entry()          if points > 0         │
//! │  COMMIT                                                                │
//! │                                                                         │
//! │  Any error before COMMIT: the transaction is dropped and SQLite        │
//! │  rolls every statement back.                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Headers and line items are never updated once written.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use aurum_core::{SaleLineItem, SaleTransaction};

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale header by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<SaleTransaction>> {
        let sale = sqlx::query_as::<_, SaleTransaction>(
            r#"
            SELECT
                id, invoice_number, customer_id,
                total_amount_cents, tax_amount_cents, final_amount_cents,
                payment_mode, status, created_at
            FROM sale_transactions
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Gets all line items of a sale, in insertion order.
    pub async fn get_items(&self, transaction_id: &str) -> DbResult<Vec<SaleLineItem>> {
        let items = sqlx::query_as::<_, SaleLineItem>(
            r#"
            SELECT
                id, transaction_id, product_id, sku_snapshot, quantity,
                unit_price_cents, total_price_cents, tax_cents, created_at
            FROM sale_line_items
            WHERE transaction_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Lists a customer's sales, newest first.
    pub async fn list_for_customer(&self, customer_id: &str) -> DbResult<Vec<SaleTransaction>> {
        let sales = sqlx::query_as::<_, SaleTransaction>(
            r#"
            SELECT
                id, invoice_number, customer_id,
                total_amount_cents, tax_amount_cents, final_amount_cents,
                payment_mode, status, created_at
            FROM sale_transactions
            WHERE customer_id = ?1
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Counts all sale transactions (for diagnostics and tests).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sale_transactions")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Unit-of-work operations
    // =========================================================================

    /// Inserts a sale header on the caller's connection.
    pub async fn insert_transaction(
        conn: &mut SqliteConnection,
        sale: &SaleTransaction,
    ) -> DbResult<()> {
        debug!(id = %sale.id, invoice_number = %sale.invoice_number, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sale_transactions (
                id, invoice_number, customer_id,
                total_amount_cents, tax_amount_cents, final_amount_cents,
                payment_mode, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.invoice_number)
        .bind(&sale.customer_id)
        .bind(sale.total_amount_cents)
        .bind(sale.tax_amount_cents)
        .bind(sale.final_amount_cents)
        .bind(sale.payment_mode)
        .bind(sale.status)
        .bind(sale.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts one line item on the caller's connection.
    ///
    /// ## Snapshot Pattern
    /// SKU and unit price are copied onto the line so later catalogue edits
    /// do not rewrite history.
    pub async fn insert_line_item(
        conn: &mut SqliteConnection,
        item: &SaleLineItem,
    ) -> DbResult<()> {
        debug!(
            transaction_id = %item.transaction_id,
            product_id = %item.product_id,
            quantity = item.quantity,
            "Adding sale line item"
        );

        sqlx::query(
            r#"
            INSERT INTO sale_line_items (
                id, transaction_id, product_id, sku_snapshot, quantity,
                unit_price_cents, total_price_cents, tax_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&item.id)
        .bind(&item.transaction_id)
        .bind(&item.product_id)
        .bind(&item.sku_snapshot)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(item.total_price_cents)
        .bind(item.tax_cents)
        .bind(item.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}

/// Generates an invoice number in format: `INV-YYYYMMDD-XXXXXXXX`.
///
/// The suffix is the first 8 hex digits of a fresh UUID, which keeps the
/// number unique across concurrent writers without a shared counter.
///
/// ## Example
/// `INV-20261019-3f2a9c1b`
pub fn generate_invoice_number(at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("INV-{}-{}", at.format("%Y%m%d"), &suffix[..8])
}

/// Generates a new sale transaction ID.
pub fn generate_sale_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a new sale line item ID.
pub fn generate_sale_item_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig, DbError};
    use aurum_core::{PaymentMode, SaleStatus};
    use chrono::TimeZone;

    #[test]
    fn test_invoice_number_format() {
        let at = Utc.with_ymd_and_hms(2026, 1, 31, 10, 0, 0).unwrap();
        let invoice = generate_invoice_number(at);

        assert!(invoice.starts_with("INV-20260131-"));
        assert_eq!(invoice.len(), "INV-20260131-".len() + 8);
        assert_ne!(invoice, generate_invoice_number(at));
    }

    #[tokio::test]
    async fn test_header_and_lines_round_trip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let customer = db.customers().create("Asha", "9876543210").await.unwrap();
        let product = db.products().create("RING-22K", "Ring", 10, 10_000).await.unwrap();
        let now = Utc::now();

        let sale = SaleTransaction {
            id: generate_sale_id(),
            invoice_number: generate_invoice_number(now),
            customer_id: customer.id.clone(),
            total_amount_cents: 30_000,
            tax_amount_cents: 900,
            final_amount_cents: 30_900,
            payment_mode: PaymentMode::Upi,
            status: SaleStatus::Completed,
            created_at: now,
        };
        let item = SaleLineItem {
            id: generate_sale_item_id(),
            transaction_id: sale.id.clone(),
            product_id: product.id.clone(),
            sku_snapshot: product.sku.clone(),
            quantity: 3,
            unit_price_cents: 10_000,
            total_price_cents: 30_000,
            tax_cents: 900,
            created_at: now,
        };

        {
            let mut tx = db.begin().await.unwrap();
            SaleRepository::insert_transaction(&mut tx, &sale).await.unwrap();
            SaleRepository::insert_line_item(&mut tx, &item).await.unwrap();
            tx.commit().await.unwrap();
        }

        let loaded = db.sales().get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(loaded.payment_mode, PaymentMode::Upi);
        assert_eq!(loaded.status, SaleStatus::Completed);
        assert_eq!(loaded.final_amount_cents, 30_900);

        let items = db.sales().get_items(&sale.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].sku_snapshot, "RING-22K");
        assert_eq!(db.sales().list_for_customer(&customer.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_inconsistent_header_rejected_by_schema() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let customer = db.customers().create("Asha", "9876543210").await.unwrap();
        let now = Utc::now();

        let sale = SaleTransaction {
            id: generate_sale_id(),
            invoice_number: generate_invoice_number(now),
            customer_id: customer.id,
            total_amount_cents: 30_000,
            tax_amount_cents: 900,
            final_amount_cents: 31_000,
            payment_mode: PaymentMode::Cash,
            status: SaleStatus::Completed,
            created_at: now,
        };

        let mut conn = db.pool().acquire().await.unwrap();
        let err = SaleRepository::insert_transaction(&mut conn, &sale)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::QueryFailed(_)));
    }
}
