//! # Bulk Sale Import
//!
//! Replays a spreadsheet of sales through [`SaleWriter`], one row at a time.
//!
//! ## Row Isolation
//! ```text
//! row 1 ──► lookup ──► create_sale ──► COMMIT        created_count += 1
//! row 2 ──► lookup ✗ (unknown SKU)                    errors += "Row 2 ..."
//! row 3 ──► lookup ──► create_sale ──► COMMIT        created_count += 1
//! ```
//!
//! Each row is its own unit of work, so a failing row rolls back only
//! itself. `created_count + error_count` always equals the number of rows.
//!
//! Rows run sequentially. Running them in parallel would need rows that
//! touch the same product to stay ordered, or the stock errors a user sees
//! would depend on scheduling.
//!
//! ## CSV Format
//! ```text
//! customer_phone,product_sku,quantity,payment_mode
//! 9000000001,RING-22K-001,1,cash
//! 9000000002,CHAIN-18K-003,2,upi
//! ```

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use aurum_core::{PaymentMode, SaleLineRequest, ValidationError};
use aurum_db::Database;

use crate::error::{EngineError, EngineResult};
use crate::sale_writer::{SaleReceipt, SaleWriter};

const COLUMNS: [&str; 4] = ["customer_phone", "product_sku", "quantity", "payment_mode"];

/// One sale to import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRow {
    pub customer_phone: String,
    pub product_sku: String,
    pub quantity: i64,
    pub payment_mode: String,
}

/// Result of an import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub created_count: usize,
    pub error_count: usize,
    pub errors: Vec<String>,
}

impl ImportSummary {
    fn record_error(&mut self, message: String) {
        warn!(error = %message, "Import row failed");
        self.error_count += 1;
        self.errors.push(message);
    }

    /// Rows seen.
    pub fn total(&self) -> usize {
        self.created_count + self.error_count
    }
}

// =============================================================================
// Uploaded File Guard
// =============================================================================

/// An uploaded file that is deleted when the guard drops.
///
/// The importer takes the guard by value, so the file goes away on every
/// exit path: success, row failures, unreadable header, or a panic.
#[derive(Debug)]
pub struct UploadedFile {
    path: PathBuf,
}

impl UploadedFile {
    /// Takes ownership of an existing file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        UploadedFile { path: path.into() }
    }

    /// Copies `src` into the temp directory and owns the copy, leaving the
    /// original untouched.
    pub fn stage_copy(src: &Path) -> io::Result<Self> {
        let mut original = std::fs::File::open(src)?;
        let mut temp = tempfile::Builder::new()
            .prefix("aurum-upload-")
            .suffix(".csv")
            .tempfile()?;
        io::copy(&mut original, temp.as_file_mut())?;

        // The guard deletes it from here on.
        let staged = temp.into_temp_path().keep()?;
        debug!(src = %src.display(), staged = %staged.display(), "Staged upload");
        Ok(UploadedFile { path: staged })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UploadedFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed uploaded file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove uploaded file"),
        }
    }
}

// =============================================================================
// Importer
// =============================================================================

/// Drives [`SaleWriter`] once per imported row.
///
/// Storage failures are logged in full but reported in the summary only as
/// "storage failure" unless `debug` is set.
#[derive(Debug, Clone)]
pub struct BulkImporter {
    db: Database,
    writer: SaleWriter,
    debug: bool,
}

impl BulkImporter {
    pub fn new(writer: SaleWriter) -> Self {
        BulkImporter {
            db: writer.database().clone(),
            writer,
            debug: false,
        }
    }

    /// Includes storage error detail in row messages.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Imports already-parsed rows.
    pub async fn import_sales(&self, rows: &[ImportRow]) -> ImportSummary {
        self.run(rows.iter().cloned().map(Ok)).await
    }

    /// Parses an uploaded CSV and imports its rows.
    ///
    /// A missing or unreadable file, or a header without the expected
    /// columns, fails the whole import with `Validation`. Everything after
    /// the header is reported per row. The file is deleted either way.
    pub async fn import_sales_csv(&self, upload: UploadedFile) -> EngineResult<ImportSummary> {
        info!(path = %upload.path().display(), "Importing sales CSV");

        let bytes = tokio::fs::read(upload.path())
            .await
            .map_err(|e| file_error(format!("cannot read upload: {e}")))?;

        let rows = parse_csv(&bytes)?;
        let summary = self.run(rows.into_iter()).await;

        drop(upload);
        Ok(summary)
    }

    async fn run<I>(&self, rows: I) -> ImportSummary
    where
        I: Iterator<Item = Result<ImportRow, String>>,
    {
        let mut summary = ImportSummary::default();

        for (index, row) in rows.enumerate() {
            let row_number = index + 1;
            let row = match row {
                Ok(row) => row,
                Err(reason) => {
                    summary.record_error(format!("Row {row_number}: {reason}"));
                    continue;
                }
            };

            match self.import_row(&row).await {
                Ok(receipt) => {
                    debug!(row = row_number, invoice_number = %receipt.invoice_number, "Row imported");
                    summary.created_count += 1;
                }
                Err(e) => summary.record_error(self.row_error(row_number, &row, e)),
            }
        }

        info!(
            created = summary.created_count,
            failed = summary.error_count,
            "Import finished"
        );
        summary
    }

    fn row_error(&self, row_number: usize, row: &ImportRow, err: EngineError) -> String {
        let prefix = format!(
            "Row {row_number} (phone {}, sku {})",
            row.customer_phone, row.product_sku
        );

        match err {
            EngineError::PersistenceFailure(e) => {
                error!(
                    row = row_number,
                    phone = %row.customer_phone,
                    sku = %row.product_sku,
                    error = %e,
                    "Storage failure while importing row"
                );
                if self.debug {
                    format!("{prefix}: storage failure: {e}")
                } else {
                    format!("{prefix}: storage failure")
                }
            }
            EngineError::Domain(e) => format!("{prefix}: {e}"),
        }
    }

    async fn import_row(&self, row: &ImportRow) -> EngineResult<SaleReceipt> {
        let payment_mode: PaymentMode = row.payment_mode.parse()?;
        let phone = row.customer_phone.trim();
        let sku = row.product_sku.trim();

        let customer = self
            .db
            .customers()
            .get_by_phone(phone)
            .await?
            .ok_or_else(|| EngineError::not_found("Customer", phone))?;

        let product = self
            .db
            .products()
            .get_by_sku(sku)
            .await?
            .ok_or_else(|| EngineError::not_found("Product", sku))?;

        self.writer
            .create_sale(
                &customer.id,
                &[SaleLineRequest::new(product.id, row.quantity)],
                payment_mode,
            )
            .await
    }
}

fn file_error(reason: String) -> EngineError {
    ValidationError::InvalidFormat {
        field: "file".to_string(),
        reason,
    }
    .into()
}

/// Splits a CSV upload into rows. Per-record problems stay in the row slot
/// so they are reported with their row number.
fn parse_csv(bytes: &[u8]) -> EngineResult<Vec<Result<ImportRow, String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| file_error(format!("unreadable header: {e}")))?
        .clone();

    let mut positions = [0usize; 4];
    for (slot, column) in positions.iter_mut().zip(COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(column))
            .ok_or_else(|| file_error(format!("missing column '{column}'")))?;
    }
    let [phone_at, sku_at, quantity_at, mode_at] = positions;

    let rows: Vec<Result<ImportRow, String>> = reader
        .records()
        .map(|record| -> Result<ImportRow, String> {
            let record = record.map_err(|e| format!("malformed record: {e}"))?;
            let field = |at: usize| record.get(at).unwrap_or("").to_string();

            let quantity_raw = field(quantity_at);
            let quantity = quantity_raw
                .parse::<i64>()
                .map_err(|_| format!("invalid quantity '{quantity_raw}'"))?;

            Ok(ImportRow {
                customer_phone: field(phone_at),
                product_sku: field(sku_at),
                quantity,
                payment_mode: field(mode_at),
            })
        })
        .collect();

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{memory_writer, seed_customer, seed_product};

    fn row(phone: &str, sku: &str, quantity: i64, mode: &str) -> ImportRow {
        ImportRow {
            customer_phone: phone.to_string(),
            product_sku: sku.to_string(),
            quantity,
            payment_mode: mode.to_string(),
        }
    }

    async fn importer() -> (BulkImporter, Database) {
        let writer = memory_writer().await;
        let db = writer.database().clone();
        seed_customer(&db, "9000000001").await;
        seed_customer(&db, "9000000002").await;
        seed_product(&db, "RING-22K", 5, 10_000).await;
        seed_product(&db, "CHAIN-18K", 1, 20_000).await;
        (BulkImporter::new(writer), db)
    }

    #[tokio::test]
    async fn test_bad_row_does_not_stop_import() {
        let (importer, db) = importer().await;

        let summary = importer
            .import_sales(&[
                row("9000000001", "RING-22K", 1, "cash"),
                row("9000000002", "NO-SUCH-SKU", 1, "card"),
                row("9000000002", "RING-22K", 2, "upi"),
            ])
            .await;

        assert_eq!(summary.created_count, 2);
        assert_eq!(summary.error_count, 1);
        assert_eq!(summary.total(), 3);
        assert!(summary.errors[0].starts_with("Row 2"));
        assert!(summary.errors[0].contains("NO-SUCH-SKU"));

        let ring = db.products().get_by_sku("RING-22K").await.unwrap().unwrap();
        assert_eq!(ring.stock_quantity, 2);
        assert_eq!(db.sales().count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_each_failure_kind_is_reported() {
        let (importer, db) = importer().await;

        let summary = importer
            .import_sales(&[
                row("9999999999", "RING-22K", 1, "cash"),
                row("9000000001", "RING-22K", 1, "cheque"),
                row("9000000001", "CHAIN-18K", 3, "cash"),
                row("9000000001", "RING-22K", 0, "cash"),
                row("9000000001", "CHAIN-18K", 1, "Bank Transfer"),
            ])
            .await;

        assert_eq!(summary.created_count, 1);
        assert_eq!(summary.error_count, 4);
        assert!(summary.errors[0].contains("9999999999"));
        assert!(summary.errors[1].contains("payment_mode"));
        assert!(summary.errors[2].contains("Insufficient stock for CHAIN-18K"));
        assert!(summary.errors[3].starts_with("Row 4"));

        let chain = db.products().get_by_sku("CHAIN-18K").await.unwrap().unwrap();
        assert_eq!(chain.stock_quantity, 0);
    }

    #[tokio::test]
    async fn test_csv_import_deletes_file() {
        let (importer, db) = importer().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.csv");
        std::fs::write(
            &path,
            "customer_phone, product_sku, quantity, payment_mode\n\
             9000000001, RING-22K, 2, cash\n\
             9000000002, RING-22K, two, card\n\
             9000000002, CHAIN-18K\n\
             9000000002, CHAIN-18K, 1, UPI\n",
        )
        .unwrap();

        let summary = importer
            .import_sales_csv(UploadedFile::new(&path))
            .await
            .unwrap();

        assert_eq!(summary.created_count, 2);
        assert_eq!(summary.error_count, 2);
        assert!(summary.errors[0].contains("invalid quantity 'two'"));
        assert!(summary.errors[1].starts_with("Row 3"));
        assert!(!path.exists());

        let ring = db.products().get_by_sku("RING-22K").await.unwrap().unwrap();
        assert_eq!(ring.stock_quantity, 3);
    }

    #[tokio::test]
    async fn test_csv_columns_in_any_order() {
        let (importer, _db) = importer().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.csv");
        std::fs::write(
            &path,
            "payment_mode,quantity,product_sku,customer_phone\ncash,1,RING-22K,9000000001\n",
        )
        .unwrap();

        let summary = importer
            .import_sales_csv(UploadedFile::new(&path))
            .await
            .unwrap();
        assert_eq!(summary.created_count, 1);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_bad_header_fails_and_deletes_file() {
        let (importer, db) = importer().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.csv");
        std::fs::write(&path, "phone,sku,qty\n9000000001,RING-22K,1\n").unwrap();

        let err = importer
            .import_sales_csv(UploadedFile::new(&path))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("customer_phone"));
        assert!(!path.exists());
        assert_eq!(db.sales().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let (importer, _db) = importer().await;
        let dir = tempfile::tempdir().unwrap();

        let err = importer
            .import_sales_csv(UploadedFile::new(dir.path().join("gone.csv")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_storage_failure_detail_hidden() {
        let (importer, db) = importer().await;
        sqlx::query(
            "CREATE TRIGGER reject_sales BEFORE INSERT ON sale_transactions \
             BEGIN SELECT RAISE(ABORT, 'disk image malformed at page 42'); END",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let rows = [row("9000000001", "RING-22K", 1, "cash")];

        let summary = importer.import_sales(&rows).await;
        assert_eq!(summary.error_count, 1);
        assert_eq!(
            summary.errors[0],
            "Row 1 (phone 9000000001, sku RING-22K): storage failure"
        );

        let ring = db.products().get_by_sku("RING-22K").await.unwrap().unwrap();
        assert_eq!(ring.stock_quantity, 5);

        let summary = importer.with_debug(true).import_sales(&rows).await;
        assert!(summary.errors[0].contains("page 42"));
    }

    #[test]
    fn test_stage_copy_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("export.csv");
        std::fs::write(&original, "customer_phone,product_sku,quantity,payment_mode\n").unwrap();

        let staged = UploadedFile::stage_copy(&original).unwrap();
        let staged_path = staged.path().to_path_buf();
        assert!(staged_path.exists());

        assert_ne!(staged_path, original);
        assert_eq!(
            std::fs::read_to_string(&staged_path).unwrap(),
            std::fs::read_to_string(&original).unwrap()
        );

        drop(staged);
        assert!(!staged_path.exists());
        assert!(original.exists());

        assert!(UploadedFile::stage_copy(&dir.path().join("missing.csv")).is_err());
    }
}
