//! # Repository Module
//!
//! Database repository implementations.
//!
//! ## Two Kinds of Methods
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  db.customers().get_by_phone("98765...")      &self, runs on the pool  │
//! │                                                                         │
//! │  let mut tx = db.begin().await?;                                       │
//! │  ProductRepository::try_decrement_stock(&mut tx, id, 3)                │
//! │  SaleRepository::insert_transaction(&mut tx, &sale)                    │
//! │  tx.commit().await?;                            caller's transaction   │
//! │                                                                         │
//! │  Anything that mutates stock, spend or the loyalty ledger is of the    │
//! │  second kind, so it always belongs to some unit of work.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Products and stock
//! - [`CustomerRepository`](customer::CustomerRepository) - Customers and lifetime spend
//! - [`SaleRepository`](sale::SaleRepository) - Sale headers and line items
//! - [`LoyaltyRepository`](loyalty::LoyaltyRepository) - Loyalty ledger
//! - [`RateRepository`](rate::RateRepository) - Manual rate quotes

pub mod customer;
pub mod loyalty;
pub mod product;
pub mod rate;
pub mod sale;
