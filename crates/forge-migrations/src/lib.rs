// crates/forge-migrations/src/lib.rs
// ============================================================================
// Module: Forge Migrations Library
// Description: Batched data migrations over the forge-db session contracts.
// Purpose: Recompute denormalized columns without one giant transaction.
// Dependencies: crate::{batch, config, error, stars}
// ============================================================================

//! ## Overview
//! Data migrations that rewrite derived values across whole tables. The
//! generic [`BatchRecompute`] executor pages through the subject table and
//! commits one transaction per page; [`recalculate_user_stars`] wires it up
//! for the `user.num_stars` cache. Runs can be configured from TOML through
//! [`MigrationConfig`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod batch;
pub mod config;
pub mod error;
pub mod stars;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use batch::Aggregate;
pub use batch::AggregateSource;
pub use batch::BatchError;
pub use batch::BatchRecompute;
pub use batch::BatchStep;
pub use batch::DEFAULT_BATCH_SIZE;
pub use batch::RecomputeSpec;
pub use batch::SessionError;
pub use config::BatchConfig;
pub use config::CONFIG_ENV_VAR;
pub use config::ConfigError;
pub use config::MAX_BATCH_SIZE;
pub use config::MigrationConfig;
pub use error::MigrationError;
pub use error::RunError;
pub use stars::USER_TYPE_INDIVIDUAL;
pub use stars::recalculate_user_stars;
pub use stars::recalculate_user_stars_from_config;
pub use stars::recalculate_user_stars_with;
pub use stars::user_stars_spec;
