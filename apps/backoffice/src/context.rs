//! Command execution context: loaded config plus an open database.

use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};
use tracing::info;

use aurum_db::Database;
use aurum_engine::{
    BulkImporter, EngineConfig, EngineError, LoyaltyLedger, RateService, SaleWriter,
};

use crate::error::{ApiError, ApiResult};

/// Everything a command needs.
pub struct Context {
    pub config: EngineConfig,
    pub db: Database,
}

impl Context {
    /// Loads config (file, env), applies the `--db` override and opens the
    /// database, running migrations.
    pub async fn load(config_path: Option<PathBuf>, db_override: Option<PathBuf>) -> Result<Self> {
        let mut config = EngineConfig::load(config_path).context("Failed to load configuration")?;
        if let Some(path) = db_override {
            config.database.path = path;
        }

        if let Some(parent) = config.database.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create data directory {}", parent.display())
                })?;
            }
        }

        let db = Database::new(config.db_config())
            .await
            .with_context(|| format!("Failed to open {}", config.database.path.display()))?;
        if !db.health_check().await {
            bail!("Database {} is not answering queries", config.database.path.display());
        }
        info!(path = %config.database.path.display(), "Database ready");

        Ok(Context { config, db })
    }

    pub fn new(config: EngineConfig, db: Database) -> Self {
        Context { config, db }
    }

    pub fn sale_writer(&self) -> SaleWriter {
        SaleWriter::from_config(self.db.clone(), &self.config)
    }

    pub fn ledger(&self) -> LoyaltyLedger {
        LoyaltyLedger::new(self.db.clone())
    }

    pub fn importer(&self) -> BulkImporter {
        BulkImporter::new(self.sale_writer()).with_debug(self.config.app.debug)
    }

    pub fn rates(&self) -> ApiResult<RateService> {
        RateService::from_config(self.db.clone(), &self.config).map_err(|e| self.fail(e))
    }

    /// Maps an engine error for output, honouring `app.debug`.
    pub fn fail(&self, err: EngineError) -> ApiError {
        ApiError::from_engine(err, self.config.app.debug)
    }

    /// Accepts a customer id or phone number and returns the id.
    ///
    /// Unknown keys are passed through so the engine reports `NotFound`.
    pub async fn resolve_customer(&self, key: &str) -> ApiResult<String> {
        let key = key.trim();
        let customers = self.db.customers();

        if customers
            .exists(key)
            .await
            .map_err(|e| self.fail(e.into()))?
        {
            return Ok(key.to_string());
        }

        match customers
            .get_by_phone(key)
            .await
            .map_err(|e| self.fail(e.into()))?
        {
            Some(customer) => Ok(customer.id),
            None => Ok(key.to_string()),
        }
    }
}
