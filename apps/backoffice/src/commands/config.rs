//! # Config Command

use std::path::PathBuf;

use serde::Serialize;
use tracing::info;

use aurum_engine::{ConfigError, EngineConfig};

use super::InitConfigArgs;
use crate::error::{ApiError, ApiResult, ErrorCode};

#[derive(Debug, Clone, Serialize)]
pub struct InitConfigResponse {
    pub path: PathBuf,
}

/// Writes a default `aurum.toml` to `config_path` or the platform config dir.
///
/// Runs without opening the database.
pub fn init(args: InitConfigArgs, config_path: Option<PathBuf>) -> ApiResult<InitConfigResponse> {
    let path = config_path
        .or_else(EngineConfig::default_config_path)
        .ok_or(ConfigError::NoPath)?;

    if path.exists() && !args.force {
        return Err(ApiError::new(
            ErrorCode::ConfigError,
            format!("{} already exists (use --force to overwrite)", path.display()),
        ));
    }

    EngineConfig::default().save(Some(path.clone()))?;
    info!(path = %path.display(), "Default config written");

    Ok(InitConfigResponse { path })
}
