//! # Product Repository
//!
//! Database operations for products and their stock (the inventory ledger).
//!
//! ## Stock Decrement: Guarded Compare-and-Swap
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                            │
//! │                                                                     │
//! │  ❌ WRONG: read, check in Rust, write absolute value               │
//! │     SELECT stock_quantity ...        → 10                          │
//! │     UPDATE products SET stock_quantity = 7                         │
//! │     (a concurrent sale between the two statements is lost)         │
//! │                                                                     │
//! │  ✅ CORRECT: one guarded statement                                 │
//! │     UPDATE products                                                 │
//! │        SET stock_quantity = stock_quantity - 3                      │
//! │      WHERE id = ? AND stock_quantity >= 3                           │
//! │                                                                     │
//! │  rows_affected = 1 → decremented                                   │
//! │  rows_affected = 0 → stock moved under us: InsufficientStock       │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use aurum_core::Product;

/// Repository for product database operations.
///
/// Pool-backed methods (`&self`) are for lookups outside a sale. The
/// associated functions taking a `SqliteConnection` run inside a caller's
/// transaction.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets an active product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        Self::get_by_id_in(&mut conn, id).await
    }

    /// Gets an active product by its SKU.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - No active product with that SKU
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        debug!(sku = %sku, "Looking up product by SKU");

        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id, sku, name, stock_quantity, selling_price_cents,
                is_active, created_at, updated_at
            FROM products
            WHERE sku = ?1 AND is_active = 1
            "#,
        )
        .bind(sku.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, stock_quantity, selling_price_cents,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.stock_quantity)
        .bind(product.selling_price_cents)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &product.sku),
            other => other,
        })?;

        Ok(product.clone())
    }

    /// Convenience constructor + insert used by the seeder and tests.
    pub async fn create(
        &self,
        sku: &str,
        name: &str,
        stock_quantity: i64,
        selling_price_cents: i64,
    ) -> DbResult<Product> {
        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            sku: sku.to_string(),
            name: name.to_string(),
            stock_quantity,
            selling_price_cents,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.insert(&product).await
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Unit-of-work operations
    // =========================================================================

    /// Gets an active product by ID on the caller's connection.
    pub async fn get_by_id_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id, sku, name, stock_quantity, selling_price_cents,
                is_active, created_at, updated_at
            FROM products
            WHERE id = ?1 AND is_active = 1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(product)
    }

    /// Takes `quantity` units out of stock if, and only if, that many are
    /// on hand at the moment the statement runs.
    ///
    /// ## Returns
    /// * `Ok(true)` - Decremented
    /// * `Ok(false)` - Not enough stock; nothing changed
    pub async fn try_decrement_stock(
        conn: &mut SqliteConnection,
        id: &str,
        quantity: i64,
    ) -> DbResult<bool> {
        debug!(id = %id, quantity = quantity, "Decrementing stock");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET
                stock_quantity = stock_quantity - ?2,
                updated_at = ?3
            WHERE id = ?1 AND stock_quantity >= ?2
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

/// Generates a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}
