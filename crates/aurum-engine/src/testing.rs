//! Fixtures shared by the engine's unit tests.

use aurum_core::{Customer, PricingCalculator, Product};
use aurum_db::{Database, DbConfig};

use crate::sale_writer::SaleWriter;

pub(crate) async fn memory_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

pub(crate) async fn memory_writer() -> SaleWriter {
    SaleWriter::new(memory_db().await, PricingCalculator::default())
}

pub(crate) async fn seed_customer(db: &Database, phone: &str) -> Customer {
    db.customers().create("Test Customer", phone).await.unwrap()
}

pub(crate) async fn seed_product(db: &Database, sku: &str, stock: i64, price_cents: i64) -> Product {
    db.products()
        .create(sku, &format!("{sku} test piece"), stock, price_cents)
        .await
        .unwrap()
}
