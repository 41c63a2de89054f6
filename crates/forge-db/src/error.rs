// crates/forge-db/src/error.rs
// ============================================================================
// Module: Data Access Errors
// Description: Closed taxonomy of data-access errors and their predicates.
// Purpose: Let every layer classify not-found, cancellation, feature and
//          transaction-state failures without string matching.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! [`DbError`] is the closed set of classified data-access errors. Each
//! variant renders a fixed, human-readable message and maps to exactly one
//! [`DbErrorKind`]. Classification is a structural downcast via
//! [`classify`]; arbitrary error values simply classify as `None`.
//!
//! [`NotExist`] always names [`NOT_FOUND`] as its `source`, so callers that
//! only care about "something was not found" can walk the error chain with
//! [`is_not_found`] without knowing the concrete resource.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::error::Error as StdError;
use std::fmt;
use std::iter;

use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Resource name rendered when a [`NotExist`] error does not name one.
pub const DEFAULT_RESOURCE: &str = "record";

/// Shared error returned when a transaction-scoped operation is requested on
/// a session that already has a transaction open.
pub const ALREADY_IN_TRANSACTION: DbError = DbError::AlreadyInTransaction;

/// Process-wide generic not-found sentinel.
pub static NOT_FOUND: NotFound = NotFound;

// ============================================================================
// SECTION: Sentinel
// ============================================================================

/// Resource-agnostic "not found" error.
///
/// # Invariants
/// - Stateless; every [`NotExist`] reports the same [`NOT_FOUND`] instance as
///   its `source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("resource does not exist")]
pub struct NotFound;

// ============================================================================
// SECTION: Not Exist
// ============================================================================

/// A requested entity does not exist.
///
/// # Invariants
/// - `id == 0` means no instance of `resource` exists at all.
/// - `id != 0` means the instance with that identifier is absent.
/// - An empty `resource` renders as [`DEFAULT_RESOURCE`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotExist {
    /// Resource name, possibly empty.
    pub resource: String,
    /// Missing identifier, or zero when unset.
    pub id: i64,
}

impl NotExist {
    /// Creates a not-exist error for a specific resource instance.
    #[must_use]
    pub fn new(resource: impl Into<String>, id: i64) -> Self {
        Self {
            resource: resource.into(),
            id,
        }
    }

    /// Creates a collection-level not-exist error (no identifier).
    #[must_use]
    pub fn resource(resource: impl Into<String>) -> Self {
        Self::new(resource, 0)
    }

    /// Returns the resource name used when rendering the message.
    #[must_use]
    pub fn resource_name(&self) -> &str {
        if self.resource.is_empty() { DEFAULT_RESOURCE } else { &self.resource }
    }
}

impl fmt::Display for NotExist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id == 0 {
            write!(f, "{} does not exist", self.resource_name())
        } else {
            write!(f, "{} does not exist [id: {}]", self.resource_name(), self.id)
        }
    }
}

impl StdError for NotExist {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&NOT_FOUND)
    }
}

// ============================================================================
// SECTION: Taxonomy
// ============================================================================

/// Discriminant for [`DbError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbErrorKind {
    /// A transaction is already open on the session.
    AlreadyInTransaction,
    /// The enclosing operation was cancelled.
    Cancelled,
    /// An optional subsystem is administratively disabled.
    FeatureDisabled,
    /// A requested entity does not exist.
    NotExist,
}

/// Classified data-access errors.
///
/// # Invariants
/// - Exactly one [`DbErrorKind`] applies to each value.
/// - Messages are fixed at construction and never re-rendered lazily.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DbError {
    /// A transaction-scoped operation was requested inside a transaction.
    #[error("database connection has already been in a transaction")]
    AlreadyInTransaction,
    /// The enclosing context was cancelled mid-operation.
    #[error("Cancelled: {message}")]
    Cancelled {
        /// Rendered cancellation message.
        message: String,
    },
    /// Remote shell access is disabled.
    #[error("SSH is disabled")]
    SshDisabled,
    /// A requested entity does not exist.
    #[error(transparent)]
    NotExist(NotExist),
}

impl DbError {
    /// Builds a cancellation error, rendering `message` immediately.
    ///
    /// Accepts plain strings as well as `format_args!` output.
    #[must_use]
    pub fn cancelled(message: impl fmt::Display) -> Self {
        Self::Cancelled {
            message: message.to_string(),
        }
    }

    /// Builds a not-exist error for `resource` and `id` (zero when unset).
    #[must_use]
    pub fn not_exist(resource: impl Into<String>, id: i64) -> Self {
        Self::NotExist(NotExist::new(resource, id))
    }

    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> DbErrorKind {
        match self {
            Self::AlreadyInTransaction => DbErrorKind::AlreadyInTransaction,
            Self::Cancelled {
                ..
            } => DbErrorKind::Cancelled,
            Self::SshDisabled => DbErrorKind::FeatureDisabled,
            Self::NotExist(_) => DbErrorKind::NotExist,
        }
    }
}

impl From<NotExist> for DbError {
    fn from(error: NotExist) -> Self {
        Self::NotExist(error)
    }
}

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Classifies `err` by its concrete type.
///
/// Only the value itself is inspected; use [`find_db_error`] to search the
/// `source` chain.
#[must_use]
pub fn classify(err: &(dyn StdError + 'static)) -> Option<DbErrorKind> {
    if let Some(db_error) = err.downcast_ref::<DbError>() {
        return Some(db_error.kind());
    }
    err.is::<NotExist>().then_some(DbErrorKind::NotExist)
}

/// Returns true when `err` is [`DbError::AlreadyInTransaction`].
#[must_use]
pub fn is_already_in_transaction(err: &(dyn StdError + 'static)) -> bool {
    classify(err) == Some(DbErrorKind::AlreadyInTransaction)
}

/// Returns true when `err` is [`DbError::Cancelled`].
#[must_use]
pub fn is_cancelled(err: &(dyn StdError + 'static)) -> bool {
    classify(err) == Some(DbErrorKind::Cancelled)
}

/// Returns true when `err` is [`DbError::SshDisabled`].
#[must_use]
pub fn is_ssh_disabled(err: &(dyn StdError + 'static)) -> bool {
    classify(err) == Some(DbErrorKind::FeatureDisabled)
}

/// Returns true when `err` is a [`NotExist`], bare or wrapped in [`DbError`].
#[must_use]
pub fn is_not_exist(err: &(dyn StdError + 'static)) -> bool {
    classify(err) == Some(DbErrorKind::NotExist)
}

/// Returns the first [`DbError`] found in the `source` chain of `err`.
#[must_use]
pub fn find_db_error<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a DbError> {
    chain(err).find_map(|cause| cause.downcast_ref::<DbError>())
}

/// Returns true when the `source` chain of `err` reaches [`NOT_FOUND`].
#[must_use]
pub fn is_not_found(err: &(dyn StdError + 'static)) -> bool {
    chain(err).any(|cause| cause.is::<NotFound>())
}

/// Iterates `err` followed by each of its sources.
fn chain<'a>(
    err: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    iter::successors(Some(err), |&cause| cause.source())
}
