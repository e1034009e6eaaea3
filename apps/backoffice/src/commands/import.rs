//! # Import Command

use tracing::{debug, info};

use aurum_engine::{ImportSummary, UploadedFile};

use super::ImportArgs;
use crate::context::Context;
use crate::error::{ApiError, ApiResult};

/// Imports a CSV of sales.
///
/// Without `--consume` the file is staged to a temporary copy first, so the
/// operator's export survives; the copy is always removed.
pub async fn run(args: ImportArgs, ctx: &Context) -> ApiResult<ImportSummary> {
    debug!(path = %args.path.display(), consume = args.consume, "import command");

    let upload = if args.consume {
        UploadedFile::new(&args.path)
    } else {
        UploadedFile::stage_copy(&args.path).map_err(|e| {
            ApiError::validation(format!("Cannot read {}: {e}", args.path.display()))
        })?
    };

    let summary = ctx
        .importer()
        .import_sales_csv(upload)
        .await
        .map_err(|e| ctx.fail(e))?;

    info!(
        created = summary.created_count,
        failed = summary.error_count,
        "Import complete"
    );
    Ok(summary)
}
