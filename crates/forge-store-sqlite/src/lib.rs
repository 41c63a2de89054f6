// crates/forge-store-sqlite/src/lib.rs
// ============================================================================
// Module: Forge SQLite Store
// Description: SQLite backend for the forge-db session contracts.
// Purpose: Provide the production Engine/Session used by migrations.
// Dependencies: forge-db, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`forge_db::Engine`]. Each session owns
//! its own connection, tracks transaction state explicitly, and maps
//! interrupted statements and nested transactions onto the shared
//! [`forge_db::DbError`] taxonomy.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteEngine;
pub use store::SqliteSession;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
