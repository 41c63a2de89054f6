// crates/forge-migrations/src/error.rs
// ============================================================================
// Module: Migration Errors
// Description: Errors for built-in migrations and configured runs.
// Purpose: Separate definition mistakes from store failures.
// Dependencies: forge-db, forge-store-sqlite, thiserror
// ============================================================================

//! ## Overview
//! [`MigrationError`] is returned by the built-in migrations: either the
//! recompute rule itself is malformed, or the batch run failed.
//! [`RunError`] adds the configuration and engine setup failures of a
//! configured run against `SQLite`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use forge_db::IdentifierError;
use forge_store_sqlite::SqliteStoreError;
use thiserror::Error;

use crate::batch::BatchError;
use crate::config::ConfigError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Built-in migration failure.
#[derive(Debug, Error)]
pub enum MigrationError<E> {
    /// The recompute rule names an invalid table or column.
    #[error("invalid migration definition")]
    Definition(#[from] IdentifierError),
    /// The batch run failed.
    #[error(transparent)]
    Batch(#[from] BatchError<E>),
}

/// Configured migration run failure.
#[derive(Debug, Error)]
pub enum RunError {
    /// Configuration could not be loaded or validated.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The `SQLite` engine could not be opened.
    #[error("opening migration store failed")]
    Store(#[from] SqliteStoreError),
    /// The migration failed.
    #[error(transparent)]
    Migration(#[from] MigrationError<SqliteStoreError>),
}
