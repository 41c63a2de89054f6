// crates/forge-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Session Engine
// Description: SQLite-backed Engine and Session implementations.
// Purpose: Give migrations an exclusive, transaction-aware connection.
// Dependencies: forge-db, rusqlite, serde, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`SqliteEngine`] validates the store configuration once and then opens a
//! fresh connection for every [`SqliteSession`]. Transactions are explicit
//! (`BEGIN`/`COMMIT`/`ROLLBACK`) and tracked through the connection's
//! autocommit flag, so a second `begin` on the same session reports
//! [`DbError::AlreadyInTransaction`]. Dropping a session rolls back any open
//! transaction before the connection closes. Statements interrupted through
//! [`SqliteSession::interrupt_handle`] surface as [`DbError::Cancelled`].
//!
//! The engine opens only databases that already exist and applies the
//! journal and sync pragmas only when they are configured.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use forge_db::DbError;
use forge_db::Engine;
use forge_db::Identifier;
use forge_db::PageQuery;
use forge_db::Session;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::InterruptHandle;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use rusqlite::params_from_iter;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode.
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode.
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` engine.
///
/// # Invariants
/// - `path` must name an existing database file; it is never created.
/// - `busy_timeout_ms` is interpreted as milliseconds.
/// - Unset pragmas leave the database's own settings untouched. The journal
///   mode is persisted in the database file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode, applied only when set.
    #[serde(default)]
    pub journal_mode: Option<SqliteStoreMode>,
    /// `SQLite` sync mode, applied only when set.
    #[serde(default)]
    pub sync_mode: Option<SqliteSyncMode>,
}

impl SqliteStoreConfig {
    /// Creates a config for `path` that leaves the database pragmas as found.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: None,
            sync_mode: None,
        }
    }

    /// Validates the configured store path.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Invalid`] when the path is empty, too long,
    /// or names a directory.
    pub fn validate(&self) -> Result<(), SqliteStoreError> {
        validate_store_path(&self.path)
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Classified data-access failures are carried as [`DbError`] and exposed
///   as the error `source`.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Classified data-access error, exposed as the `source`.
    #[error("sqlite store access error")]
    Access(#[from] DbError),
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Invalid store usage or data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl SqliteStoreError {
    /// Returns the classified data-access error, if any.
    #[must_use]
    pub const fn as_db_error(&self) -> Option<&DbError> {
        match self {
            Self::Access(error) => Some(error),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for SqliteStoreError {
    fn from(error: rusqlite::Error) -> Self {
        if error.sqlite_error_code() == Some(ErrorCode::OperationInterrupted) {
            return Self::Access(DbError::cancelled(format_args!(
                "sqlite statement interrupted: {error}"
            )));
        }
        Self::Db(error.to_string())
    }
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// `SQLite` engine that opens one connection per session.
#[derive(Debug, Clone)]
pub struct SqliteEngine {
    /// Validated store configuration.
    config: SqliteStoreConfig,
}

impl SqliteEngine {
    /// Validates `config` and opens one connection to the existing database file.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is invalid or the database
    /// cannot be opened.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        config.validate()?;
        if !config.path.exists() {
            return Err(SqliteStoreError::Io(format!(
                "store database does not exist: {}",
                config.path.display()
            )));
        }
        let connection = open_connection(&config)?;
        connection.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(Self {
            config,
        })
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Opens a session on a new connection.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the connection cannot be opened.
    pub fn open_session(&self) -> Result<SqliteSession, SqliteStoreError> {
        Ok(SqliteSession {
            connection: open_connection(&self.config)?,
        })
    }
}

impl Engine for SqliteEngine {
    type Session = SqliteSession;

    fn new_session(&self) -> Result<SqliteSession, SqliteStoreError> {
        self.open_session()
    }
}

// ============================================================================
// SECTION: Session
// ============================================================================

/// Exclusive `SQLite` connection with explicit transaction control.
///
/// # Invariants
/// - At most one transaction is open at a time.
/// - An open transaction is rolled back when the session is dropped.
pub struct SqliteSession {
    /// Owned connection.
    connection: Connection,
}

impl SqliteSession {
    /// Returns a handle that interrupts statements running on this session.
    ///
    /// The handle may be moved to another thread.
    #[must_use]
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.connection.get_interrupt_handle()
    }

    /// Reads `column` of the row whose `id_column` equals `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotExist`] (as [`SqliteStoreError::Access`]) naming
    /// `table` when no row matches, or [`SqliteStoreError`] when the read
    /// fails.
    pub fn load_i64(
        &mut self,
        table: &Identifier,
        id_column: &Identifier,
        column: &Identifier,
        id: i64,
    ) -> Result<i64, SqliteStoreError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            column.quoted(),
            table.quoted(),
            id_column.quoted()
        );
        let value: Option<i64> = self
            .connection
            .prepare_cached(&sql)?
            .query_row(params![id], |row| row.get(0))
            .optional()?;
        value.ok_or_else(|| DbError::not_exist(table.as_str(), id).into())
    }

    /// Fails unless a transaction is open.
    fn require_transaction(&self, action: &str) -> Result<(), SqliteStoreError> {
        if self.connection.is_autocommit() {
            return Err(SqliteStoreError::Invalid(format!("{action} without an open transaction")));
        }
        Ok(())
    }
}

impl Session for SqliteSession {
    type Error = SqliteStoreError;

    fn find_ids(&mut self, query: &PageQuery) -> Result<Vec<i64>, SqliteStoreError> {
        let mut values = Vec::with_capacity(3);
        if let Some(filter) = &query.filter {
            values.push(filter.value);
        }
        values.push(to_sql_integer(query.limit, "limit")?);
        values.push(to_sql_integer(query.offset, "offset")?);
        let mut stmt = self.connection.prepare_cached(&query.to_sql())?;
        let rows = stmt.query_map(params_from_iter(values), |row| row.get::<_, i64>(0))?;
        let ids = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn begin(&mut self) -> Result<(), SqliteStoreError> {
        if !self.connection.is_autocommit() {
            return Err(DbError::AlreadyInTransaction.into());
        }
        self.connection.execute_batch("BEGIN")?;
        Ok(())
    }

    fn execute(&mut self, statement: &str, params: &[i64]) -> Result<usize, SqliteStoreError> {
        let mut stmt = self.connection.prepare_cached(statement)?;
        Ok(stmt.execute(params_from_iter(params))?)
    }

    fn commit(&mut self) -> Result<(), SqliteStoreError> {
        self.require_transaction("commit")?;
        self.connection.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), SqliteStoreError> {
        self.require_transaction("rollback")?;
        self.connection.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        !self.connection.is_autocommit()
    }
}

impl Drop for SqliteSession {
    fn drop(&mut self) {
        if self.connection.is_autocommit() {
            return;
        }
        if let Err(err) = self.connection.execute_batch("ROLLBACK") {
            warn!(error = %err, "sqlite session rollback on release failed");
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Converts a page bound into an `SQLite` integer.
fn to_sql_integer(value: u64, name: &str) -> Result<i64, SqliteStoreError> {
    i64::try_from(value)
        .map_err(|_| SqliteStoreError::Invalid(format!("page {name} out of range: {value}")))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    if path.display().to_string().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    if path
        .components()
        .any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH)
    {
        return Err(SqliteStoreError::Invalid(
            "store path contains an overlong component".to_string(),
        ));
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with the configured pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)?;
    connection.execute_batch("PRAGMA foreign_keys = ON;")?;
    if let Some(mode) = config.journal_mode {
        connection.execute_batch(&format!("PRAGMA journal_mode = {};", mode.pragma_value()))?;
    }
    if let Some(mode) = config.sync_mode {
        connection.execute_batch(&format!("PRAGMA synchronous = {};", mode.pragma_value()))?;
    }
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    Ok(connection)
}
