// crates/forge-migrations/src/stars.rs
// ============================================================================
// Module: User Star Recount
// Description: Recomputes the denormalized star count of every user.
// Purpose: Repair `user.num_stars` drift against the `star` table.
// Dependencies: forge-db, forge-store-sqlite, tracing
// ============================================================================

//! ## Overview
//! Individual users (`type = 0`) cache how many repositories they starred in
//! `user.num_stars`. This migration recounts the `star` rows referencing each
//! user through `star.uid` and rewrites the cached value page by page.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::num::NonZeroU64;

use forge_db::Engine;
use forge_db::Filter;
use forge_db::Identifier;
use forge_db::IdentifierError;
use forge_store_sqlite::SqliteEngine;
use tracing::debug;

use crate::batch::Aggregate;
use crate::batch::AggregateSource;
use crate::batch::BatchRecompute;
use crate::batch::DEFAULT_BATCH_SIZE;
use crate::batch::RecomputeSpec;
use crate::batch::SessionError;
use crate::config::MigrationConfig;
use crate::error::MigrationError;
use crate::error::RunError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `user.type` value of individual (non-organisation) accounts.
pub const USER_TYPE_INDIVIDUAL: i64 = 0;

// ============================================================================
// SECTION: Migration
// ============================================================================

/// Returns the recompute rule for `user.num_stars`.
///
/// # Errors
///
/// Returns [`IdentifierError`] if a built-in name fails validation.
pub fn user_stars_spec() -> Result<RecomputeSpec, IdentifierError> {
    Ok(RecomputeSpec {
        table: Identifier::new("user")?,
        id_column: Identifier::new("id")?,
        column: Identifier::new("num_stars")?,
        filter: Some(Filter::eq(Identifier::new("type")?, USER_TYPE_INDIVIDUAL)),
        source: AggregateSource {
            table: Identifier::new("star")?,
            key_column: Identifier::new("uid")?,
            aggregate: Aggregate::Count,
        },
    })
}

/// Recounts stars for every individual user, 100 users per transaction.
///
/// # Errors
///
/// Returns [`MigrationError`] when the run fails; see
/// [`BatchRecompute::run`].
pub fn recalculate_user_stars<E: Engine>(
    engine: E,
) -> Result<(), MigrationError<SessionError<E>>> {
    recalculate_user_stars_with(engine, DEFAULT_BATCH_SIZE)
}

/// Recounts stars for every individual user with an explicit page size.
///
/// # Errors
///
/// Returns [`MigrationError`] when the run fails; see
/// [`BatchRecompute::run`].
pub fn recalculate_user_stars_with<E: Engine>(
    engine: E,
    batch_size: NonZeroU64,
) -> Result<(), MigrationError<SessionError<E>>> {
    BatchRecompute::new(engine, user_stars_spec()?, batch_size).run()?;
    debug!("recalculate stars number for all users finished");
    Ok(())
}

/// Loads `config`, opens its `SQLite` store, and recounts user stars.
///
/// # Errors
///
/// Returns [`RunError`] when the configuration is invalid, the store cannot
/// be opened, or the migration fails.
pub fn recalculate_user_stars_from_config(config: &MigrationConfig) -> Result<(), RunError> {
    config.validate()?;
    let batch_size = config.batch.batch_size()?;
    let engine = SqliteEngine::new(config.store.clone())?;
    recalculate_user_stars_with(&engine, batch_size)?;
    Ok(())
}
