// crates/forge-migrations/src/config.rs
// ============================================================================
// Module: Migration Configuration
// Description: TOML configuration for migration runs.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: forge-store-sqlite, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with a `[store]` table describing
//! the `SQLite` database and an optional `[batch]` table controlling page
//! size. The path is taken from the caller, then from
//! `FORGE_MIGRATION_CONFIG`, then defaults to `forge-migrations.toml`.
//! Oversized, non-UTF-8, or out-of-range configuration is rejected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::num::NonZeroU64;
use std::path::Path;
use std::path::PathBuf;

use forge_store_sqlite::SqliteStoreConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::batch::DEFAULT_BATCH_SIZE;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "forge-migrations.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "FORGE_MIGRATION_CONFIG";
/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Largest accepted page size.
pub const MAX_BATCH_SIZE: u64 = 10_000;

// ============================================================================
// SECTION: Config Types
// ============================================================================

/// Page size settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    /// Subjects recomputed per transaction.
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

impl BatchConfig {
    /// Returns the validated page size.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the size is zero or above
    /// [`MAX_BATCH_SIZE`].
    pub fn batch_size(&self) -> Result<NonZeroU64, ConfigError> {
        if self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::Invalid(format!(
                "batch.batch_size out of range: {} (max {MAX_BATCH_SIZE})",
                self.batch_size
            )));
        }
        NonZeroU64::new(self.batch_size).ok_or_else(|| {
            ConfigError::Invalid("batch.batch_size must be greater than zero".to_string())
        })
    }
}

/// Returns the default page size.
const fn default_batch_size() -> u64 {
    DEFAULT_BATCH_SIZE.get()
}

/// Migration run configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationConfig {
    /// `SQLite` store settings.
    pub store: SqliteStoreConfig,
    /// Page size settings.
    #[serde(default)]
    pub batch: BatchConfig,
}

impl MigrationConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate().map_err(|err| ConfigError::Invalid(format!("store: {err}")))?;
        self.batch.batch_size()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the caller or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates config path length and component limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    if path.to_string_lossy().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}
