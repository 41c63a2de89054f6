// crates/forge-migrations/src/batch.rs
// ============================================================================
// Module: Batch Recompute Executor
// Description: Paged, per-page transactional recomputation of a derived column.
// Purpose: Rewrite a denormalized value across a large table with bounded
//          locks and memory.
// Dependencies: forge-db, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`BatchRecompute`] walks the subject table in pages of `batch_size`
//! identifiers, ordered by identifier and selected by an optional equality
//! filter. Each non-empty page is recomputed inside its own transaction with
//! one `UPDATE ... SET column = (SELECT aggregate ...)` per subject, then
//! committed before the next page is read. The first failing step aborts the
//! run; pages already committed stay committed and the failing page is
//! released uncommitted with the session.
//!
//! Pages are addressed by offset. Rows deleted ahead of the cursor while a
//! run is in progress shift later pages and can cause subjects to be
//! skipped; re-running is safe because recomputation is idempotent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::num::NonZeroU64;

use forge_db::Engine;
use forge_db::Filter;
use forge_db::Identifier;
use forge_db::PageQuery;
use forge_db::Session;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Page size used by the built-in migrations.
pub const DEFAULT_BATCH_SIZE: NonZeroU64 = match NonZeroU64::new(100) {
    Some(size) => size,
    None => NonZeroU64::MIN,
};

/// Error type produced by the sessions of engine `E`.
pub type SessionError<E> = <<E as Engine>::Session as Session>::Error;

// ============================================================================
// SECTION: Recompute Rule
// ============================================================================

/// Aggregate computed over the related table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregate {
    /// Number of related rows.
    Count,
    /// Sum of an integer column over related rows; zero when none exist.
    Sum(Identifier),
}

impl Aggregate {
    /// Renders the aggregate expression.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::Count => "COUNT(*)".to_string(),
            Self::Sum(column) => format!("COALESCE(SUM({}), 0)", column.quoted()),
        }
    }
}

/// Related table the derived value is aggregated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateSource {
    /// Related table.
    pub table: Identifier,
    /// Column in the related table that references the subject identifier.
    pub key_column: Identifier,
    /// Aggregate applied to the matching rows.
    pub aggregate: Aggregate,
}

/// Derived column to recompute and the population it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecomputeSpec {
    /// Subject table.
    pub table: Identifier,
    /// Integer identifier column of the subject table.
    pub id_column: Identifier,
    /// Derived column rewritten for every subject.
    pub column: Identifier,
    /// Optional population filter.
    pub filter: Option<Filter>,
    /// Source of the derived value.
    pub source: AggregateSource,
}

impl RecomputeSpec {
    /// Returns the identifier-only page read starting at `offset`.
    #[must_use]
    pub fn page_query(&self, limit: u64, offset: u64) -> PageQuery {
        PageQuery {
            table: self.table.clone(),
            id_column: self.id_column.clone(),
            filter: self.filter.clone(),
            limit,
            offset,
        }
    }

    /// Renders the single-statement recompute for one subject.
    ///
    /// The statement takes the subject identifier as `?1`.
    #[must_use]
    pub fn update_sql(&self) -> String {
        format!(
            "UPDATE {} SET {} = (SELECT {} FROM {} WHERE {} = ?1) WHERE {} = ?1",
            self.table.quoted(),
            self.column.quoted(),
            self.source.aggregate.to_sql(),
            self.source.table.quoted(),
            self.source.key_column.quoted(),
            self.id_column.quoted()
        )
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Step of a run that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStep {
    /// Opening the session.
    Open,
    /// Reading a page of identifiers.
    Fetch,
    /// Opening the page transaction.
    Begin,
    /// Recomputing one subject.
    Write,
    /// Committing the page transaction.
    Commit,
}

impl BatchStep {
    /// Returns a stable label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Fetch => "fetch",
            Self::Begin => "begin",
            Self::Write => "write",
            Self::Commit => "commit",
        }
    }
}

/// Batch recompute failure.
///
/// # Invariants
/// - `source` is the session error exactly as the session returned it, and
///   the message names only the failing step.
/// - `offset` names the page that was not committed.
#[derive(Debug, Error)]
pub enum BatchError<E> {
    /// The session could not be opened.
    #[error("opening recompute session failed")]
    Open {
        /// Session error.
        source: E,
    },
    /// A page read failed.
    #[error("reading page at offset {offset} failed")]
    Fetch {
        /// Page offset.
        offset: u64,
        /// Session error.
        source: E,
    },
    /// The page transaction could not be opened.
    #[error("opening transaction for page at offset {offset} failed")]
    Begin {
        /// Page offset.
        offset: u64,
        /// Session error.
        source: E,
    },
    /// Recomputing a subject failed.
    #[error("recomputing subject {subject_id} in page at offset {offset} failed")]
    Write {
        /// Page offset.
        offset: u64,
        /// Subject whose write failed.
        subject_id: i64,
        /// Session error.
        source: E,
    },
    /// The page transaction could not be committed.
    #[error("committing page at offset {offset} failed")]
    Commit {
        /// Page offset.
        offset: u64,
        /// Session error.
        source: E,
    },
}

impl<E> BatchError<E> {
    /// Returns the failing step.
    #[must_use]
    pub const fn step(&self) -> BatchStep {
        match self {
            Self::Open {
                ..
            } => BatchStep::Open,
            Self::Fetch {
                ..
            } => BatchStep::Fetch,
            Self::Begin {
                ..
            } => BatchStep::Begin,
            Self::Write {
                ..
            } => BatchStep::Write,
            Self::Commit {
                ..
            } => BatchStep::Commit,
        }
    }

    /// Returns the offset of the page that failed, if a page was involved.
    #[must_use]
    pub const fn offset(&self) -> Option<u64> {
        match self {
            Self::Open {
                ..
            } => None,
            Self::Fetch {
                offset, ..
            }
            | Self::Begin {
                offset, ..
            }
            | Self::Write {
                offset, ..
            }
            | Self::Commit {
                offset, ..
            } => Some(*offset),
        }
    }

    /// Returns the session error.
    #[must_use]
    pub const fn session_error(&self) -> &E {
        match self {
            Self::Open {
                source,
            }
            | Self::Fetch {
                source, ..
            }
            | Self::Begin {
                source, ..
            }
            | Self::Write {
                source, ..
            }
            | Self::Commit {
                source, ..
            } => source,
        }
    }

    /// Returns the session error, discarding the step context.
    #[must_use]
    pub fn into_source(self) -> E {
        match self {
            Self::Open {
                source,
            }
            | Self::Fetch {
                source, ..
            }
            | Self::Begin {
                source, ..
            }
            | Self::Write {
                source, ..
            }
            | Self::Commit {
                source, ..
            } => source,
        }
    }
}

// ============================================================================
// SECTION: Executor
// ============================================================================

/// Totals for a completed run, used for logging.
#[derive(Debug, Default)]
struct RunTotals {
    /// Committed pages.
    pages: u64,
    /// Recomputed subjects.
    rows: u64,
}

/// Paged recompute of one derived column.
///
/// # Invariants
/// - Pages are visited in increasing offset order; a page is committed before
///   the next one is read.
/// - One session is held for the whole run and released on every exit path.
#[derive(Debug, Clone)]
pub struct BatchRecompute<E> {
    /// Session source.
    engine: E,
    /// Recompute rule and population.
    spec: RecomputeSpec,
    /// Subjects per page.
    batch_size: NonZeroU64,
}

impl<E: Engine> BatchRecompute<E> {
    /// Wires an executor for `spec` over `engine`.
    #[must_use]
    pub const fn new(engine: E, spec: RecomputeSpec, batch_size: NonZeroU64) -> Self {
        Self {
            engine,
            spec,
            batch_size,
        }
    }

    /// Returns the recompute rule.
    #[must_use]
    pub const fn spec(&self) -> &RecomputeSpec {
        &self.spec
    }

    /// Returns the page size.
    #[must_use]
    pub const fn batch_size(&self) -> NonZeroU64 {
        self.batch_size
    }

    /// Recomputes the derived column for every subject.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError`] for the first step that fails. Earlier pages
    /// remain committed; the failing page is not.
    pub fn run(&self) -> Result<(), BatchError<SessionError<E>>> {
        info!(
            table = self.spec.table.as_str(),
            column = self.spec.column.as_str(),
            batch_size = self.batch_size.get(),
            "starting batch recompute"
        );
        match self.run_pages() {
            Ok(totals) => {
                debug!(
                    table = self.spec.table.as_str(),
                    column = self.spec.column.as_str(),
                    pages = totals.pages,
                    rows = totals.rows,
                    "batch recompute finished"
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    table = self.spec.table.as_str(),
                    column = self.spec.column.as_str(),
                    step = err.step().as_str(),
                    offset = err.offset(),
                    error = %err,
                    source = %err.session_error(),
                    "batch recompute aborted"
                );
                Err(err)
            }
        }
    }

    /// Runs the page loop on one session.
    fn run_pages(&self) -> Result<RunTotals, BatchError<SessionError<E>>> {
        let mut session = self.engine.new_session().map_err(|source| BatchError::Open {
            source,
        })?;
        let update_sql = self.spec.update_sql();
        let step = self.batch_size.get();
        let mut totals = RunTotals::default();
        let mut offset = 0_u64;
        loop {
            let ids = session.find_ids(&self.spec.page_query(step, offset)).map_err(|source| {
                BatchError::Fetch {
                    offset,
                    source,
                }
            })?;
            if ids.is_empty() {
                return Ok(totals);
            }
            session.begin().map_err(|source| BatchError::Begin {
                offset,
                source,
            })?;
            for &subject_id in &ids {
                session.execute(&update_sql, &[subject_id]).map_err(|source| {
                    BatchError::Write {
                        offset,
                        subject_id,
                        source,
                    }
                })?;
            }
            session.commit().map_err(|source| BatchError::Commit {
                offset,
                source,
            })?;
            let rows = u64::try_from(ids.len()).unwrap_or(u64::MAX);
            debug!(offset, rows, "committed recompute page");
            totals.pages += 1;
            totals.rows = totals.rows.saturating_add(rows);
            offset = offset.saturating_add(step);
        }
    }
}
