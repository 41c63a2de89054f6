// crates/forge-db/src/session.rs
// ============================================================================
// Module: Session Interfaces
// Description: Backend-agnostic session and engine contracts.
// Purpose: Define the read/write/transaction surface used by migrations.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! An [`Engine`] hands out [`Session`]s. A session owns one connection to the
//! store for as long as the caller holds it and is released when dropped;
//! dropping a session with an open transaction must roll that transaction
//! back. Table and column names are carried as validated [`Identifier`]s and
//! always rendered quoted, so statements built from them never splice raw
//! caller text into SQL.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum length of a table or column identifier.
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

// ============================================================================
// SECTION: Identifiers
// ============================================================================

/// Identifier validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Identifier was empty.
    #[error("sql identifier must not be empty")]
    Empty,
    /// Identifier exceeded [`MAX_IDENTIFIER_LENGTH`].
    #[error("sql identifier exceeds {max} characters")]
    TooLong {
        /// Maximum accepted length.
        max: usize,
    },
    /// Identifier contained characters outside `[A-Za-z0-9_]` or began with a
    /// digit.
    #[error("sql identifier is not a plain name: {0}")]
    Invalid(String),
}

/// Validated table or column name.
///
/// # Invariants
/// - Matches `[A-Za-z_][A-Za-z0-9_]*` and is at most
///   [`MAX_IDENTIFIER_LENGTH`] bytes long.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    /// Validates and wraps an identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when `name` is not a plain SQL name.
    pub fn new(name: impl Into<String>) -> Result<Self, IdentifierError> {
        let name = name.into();
        validate_identifier(&name)?;
        Ok(Self(name))
    }

    /// Returns the bare identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the identifier wrapped in double quotes.
    #[must_use]
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<&str> for Identifier {
    type Error = IdentifierError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Checks that `name` is a plain SQL identifier.
///
/// # Errors
///
/// Returns [`IdentifierError`] when `name` is empty, too long, or contains
/// anything other than ASCII letters, digits and underscores.
pub fn validate_identifier(name: &str) -> Result<(), IdentifierError> {
    let Some(first) = name.chars().next() else {
        return Err(IdentifierError::Empty);
    };
    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(IdentifierError::TooLong {
            max: MAX_IDENTIFIER_LENGTH,
        });
    }
    if first.is_ascii_digit()
        || !name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
    {
        return Err(IdentifierError::Invalid(name.to_string()));
    }
    Ok(())
}

// ============================================================================
// SECTION: Page Query
// ============================================================================

/// Equality predicate on one integer column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    /// Filtered column.
    pub column: Identifier,
    /// Required value.
    pub value: i64,
}

impl Filter {
    /// Creates an equality filter.
    #[must_use]
    pub const fn eq(column: Identifier, value: i64) -> Self {
        Self {
            column,
            value,
        }
    }
}

/// Identifier-only page read, ordered by ascending identifier.
///
/// # Invariants
/// - Only `id_column` is selected.
/// - Rows are ordered by `id_column` ascending so offsets are deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    /// Scanned table.
    pub table: Identifier,
    /// Integer identifier column.
    pub id_column: Identifier,
    /// Optional population filter.
    pub filter: Option<Filter>,
    /// Maximum rows returned.
    pub limit: u64,
    /// Rows skipped before the page starts.
    pub offset: u64,
}

impl PageQuery {
    /// Renders the page read with positional parameters.
    ///
    /// Parameters, in order: the filter value (when present), `limit`, then
    /// `offset`.
    #[must_use]
    pub fn to_sql(&self) -> String {
        let id_column = self.id_column.quoted();
        let mut sql = format!("SELECT {id_column} FROM {}", self.table.quoted());
        let mut next_param = 1;
        if let Some(filter) = &self.filter {
            sql.push_str(&format!(" WHERE {} = ?{next_param}", filter.column.quoted()));
            next_param += 1;
        }
        sql.push_str(&format!(
            " ORDER BY {id_column} ASC LIMIT ?{next_param} OFFSET ?{}",
            next_param + 1
        ));
        sql
    }
}

// ============================================================================
// SECTION: Session
// ============================================================================

/// One exclusive connection to the store.
///
/// Implementations must roll back an open transaction when dropped.
pub trait Session {
    /// Session error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reads one page of identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`Session::Error`] when the read fails.
    fn find_ids(&mut self, query: &PageQuery) -> Result<Vec<i64>, Self::Error>;

    /// Opens a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Session::Error`] when a transaction is already open or the
    /// store rejects the request.
    fn begin(&mut self) -> Result<(), Self::Error>;

    /// Executes a parameterized write and returns the affected row count.
    ///
    /// # Errors
    ///
    /// Returns [`Session::Error`] when the statement fails.
    fn execute(&mut self, statement: &str, params: &[i64]) -> Result<usize, Self::Error>;

    /// Commits the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Session::Error`] when no transaction is open or the commit
    /// fails.
    fn commit(&mut self) -> Result<(), Self::Error>;

    /// Rolls back the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Session::Error`] when no transaction is open or the rollback
    /// fails.
    fn rollback(&mut self) -> Result<(), Self::Error>;

    /// Returns true while a transaction is open.
    fn in_transaction(&self) -> bool;
}

/// Source of sessions.
pub trait Engine {
    /// Session type handed out by this engine.
    type Session: Session;

    /// Opens a new session.
    ///
    /// # Errors
    ///
    /// Returns the session error type when the connection cannot be opened.
    fn new_session(&self) -> Result<Self::Session, <Self::Session as Session>::Error>;
}

impl<T: Engine> Engine for &T {
    type Session = T::Session;

    fn new_session(&self) -> Result<Self::Session, <Self::Session as Session>::Error> {
        (**self).new_session()
    }
}
