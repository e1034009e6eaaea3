//! # Seed Data Generator
//!
//! Populates a database with demo jewellery products, customers and today's
//! manual rates for development.
//!
//! ## Usage
//! ```bash
//! # 200 products, 25 customers (defaults)
//! cargo run -p aurum-db --bin seed
//!
//! cargo run -p aurum-db --bin seed -- --count 1000 --customers 100
//! cargo run -p aurum-db --bin seed -- --db ./data/aurum.db
//! ```
//!
//! ## Generated Data
//! - SKU: `{ITEM}-{PURITY}-{INDEX}`, e.g. `RING-22K-007`
//! - Price: grams × a fixed demo per-gram rate for the purity
//! - Stock: 0 - 24
//! - Customers: phones `90000000NN`

use chrono::Utc;
use std::env;
use aurum_db::{Database, DbConfig};

/// Item kinds with a typical weight range in grams.
const ITEMS: &[(&str, &str, i64, i64)] = &[
    ("RING", "Ring", 3, 8),
    ("CHAIN", "Chain", 8, 30),
    ("BANGLE", "Bangle", 10, 25),
    ("EARRING", "Earrings", 2, 6),
    ("PENDANT", "Pendant", 2, 7),
    ("COIN", "Coin", 1, 10),
];

/// Demo per-gram rates in cents by purity.
const PURITIES: &[(&str, i64)] = &[
    ("24K", 720_000),
    ("22K", 660_000),
    ("18K", 540_000),
    ("14K", 420_000),
];

const FIRST_NAMES: &[&str] = &[
    "Asha", "Ravi", "Meera", "Arjun", "Kavya", "Vikram", "Nisha", "Rahul", "Divya", "Sanjay",
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut customers: usize = 25;
    let mut db_path = String::from("./aurum_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--customers" | "-u" => {
                if i + 1 < args.len() {
                    customers = args[i + 1].parse().unwrap_or(25);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Aurum Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>       Number of products (default: 200)");
                println!("  -u, --customers <N>   Number of customers (default: 25)");
                println!("  -d, --db <PATH>       Database file path (default: ./aurum_dev.db)");
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Aurum Seed Data Generator");
    println!("=========================");
    println!("Database:  {}", db_path);
    println!("Products:  {}", count);
    println!("Customers: {}", customers);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database, migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut generated = 0usize;
    let mut seed = 0usize;

    'outer: for (code, name, min_g, max_g) in ITEMS {
        for (purity, rate_cents) in PURITIES {
            for _ in 0..10 {
                if generated >= count {
                    break 'outer;
                }
                seed += 1;

                let grams = min_g + (seed as i64 * 7) % (max_g - min_g + 1);
                let sku = format!("{}-{}-{:03}", code, purity, seed);
                let title = format!("{} {} {}g", purity, name, grams);
                let stock = (seed % 25) as i64;

                if let Err(e) = db
                    .products()
                    .create(&sku, &title, stock, grams * rate_cents)
                    .await
                {
                    eprintln!("Failed to insert {}: {}", sku, e);
                    continue;
                }
                generated += 1;
            }
        }
    }

    for n in 0..customers {
        let name = format!("{} {}", FIRST_NAMES[n % FIRST_NAMES.len()], n + 1);
        let phone = format!("90000000{:02}", n % 100);
        if let Err(e) = db.customers().create(&name, &phone).await {
            eprintln!("Failed to insert customer {}: {}", phone, e);
        }
    }

    let today = Utc::now().date_naive();
    for (purity, rate_cents) in PURITIES {
        db.rates().upsert(purity, *rate_cents, today, Utc::now()).await?;
    }

    println!();
    println!(
        "✓ Generated {} products and {} customers in {:?}",
        generated,
        customers,
        start.elapsed()
    );
    println!("✓ Manual rates set for {}", today);

    Ok(())
}
