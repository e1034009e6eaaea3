//! # Customer Repository
//!
//! Lookups by id and phone, plus the lifetime-spend aggregate that every
//! completed sale bumps inside its own transaction.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use aurum_core::Customer;

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Gets a customer by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;
        Self::get_by_id_in(&mut conn, id).await
    }

    /// Gets a customer by phone number (the bulk-import key).
    pub async fn get_by_phone(&self, phone: &str) -> DbResult<Option<Customer>> {
        debug!(phone = %phone, "Looking up customer by phone");

        let customer = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, phone, total_spent_cents, created_at, updated_at
            FROM customers
            WHERE phone = ?1
            "#,
        )
        .bind(phone.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Inserts a new customer with zero lifetime spend.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - Phone already registered
    pub async fn create(&self, name: &str, phone: &str) -> DbResult<Customer> {
        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            phone: phone.trim().to_string(),
            total_spent_cents: 0,
            created_at: now,
            updated_at: now,
        };

        debug!(phone = %customer.phone, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (id, name, phone, total_spent_cents, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(customer.total_spent_cents)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &customer.phone),
            other => other,
        })?;

        Ok(customer)
    }

    /// Whether a customer with this id exists.
    pub async fn exists(&self, id: &str) -> DbResult<bool> {
        let mut conn = self.pool.acquire().await?;
        Self::exists_in(&mut conn, id).await
    }

    // =========================================================================
    // Unit-of-work operations
    // =========================================================================

    /// Gets a customer by ID on the caller's connection.
    pub async fn get_by_id_in(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, phone, total_spent_cents, created_at, updated_at
            FROM customers
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(customer)
    }

    /// Whether a customer exists, on the caller's connection.
    pub async fn exists_in(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM customers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(found.is_some())
    }

    /// Adds a sale's final amount to the customer's lifetime spend.
    ///
    /// Relative update, so concurrent sales for the same customer compose.
    pub async fn add_to_total_spent(
        conn: &mut SqliteConnection,
        id: &str,
        amount_cents: i64,
    ) -> DbResult<()> {
        debug!(id = %id, amount_cents = amount_cents, "Adding to customer total_spent");

        let result = sqlx::query(
            r#"
            UPDATE customers
            SET
                total_spent_cents = total_spent_cents + ?2,
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(amount_cents)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::CustomerRepository;
    use crate::{Database, DbConfig, DbError};

    #[tokio::test]
    async fn test_create_and_find_by_phone() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.customers();

        let created = repo.create("Asha", " 9876543210 ").await.unwrap();
        assert_eq!(created.phone, "9876543210");

        let found = repo.get_by_phone("9876543210").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(repo.exists(&created.id).await.unwrap());
        assert!(repo.get_by_phone("0000000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_phone_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.customers().create("Asha", "9876543210").await.unwrap();

        let err = db.customers().create("Ravi", "9876543210").await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_total_spent_accumulates() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let customer = db.customers().create("Asha", "9876543210").await.unwrap();

        {
            let mut conn = db.pool().acquire().await.unwrap();
            CustomerRepository::add_to_total_spent(&mut conn, &customer.id, 30_900)
                .await
                .unwrap();
            CustomerRepository::add_to_total_spent(&mut conn, &customer.id, 1_030)
                .await
                .unwrap();
            let err = CustomerRepository::add_to_total_spent(&mut conn, "missing", 1)
                .await
                .unwrap_err();
            assert!(matches!(err, DbError::NotFound { .. }));
        }

        let reloaded = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(reloaded.total_spent_cents, 31_930);
    }
}
