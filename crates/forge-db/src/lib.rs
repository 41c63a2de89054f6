// crates/forge-db/src/lib.rs
// ============================================================================
// Module: Forge DB Library
// Description: Public API surface for the data-access layer contracts.
// Purpose: Expose the error taxonomy and session interfaces.
// Dependencies: crate::{error, session}
// ============================================================================

//! ## Overview
//! `forge-db` holds the pieces every storage backend and every caller of the
//! data-access layer share: the classified [`DbError`] taxonomy with its
//! predicates, and the [`Engine`]/[`Session`] contracts that migrations drive.
//! It carries no backend of its own.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod error;
pub mod session;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use error::ALREADY_IN_TRANSACTION;
pub use error::DEFAULT_RESOURCE;
pub use error::DbError;
pub use error::DbErrorKind;
pub use error::NOT_FOUND;
pub use error::NotExist;
pub use error::NotFound;
pub use error::classify;
pub use error::find_db_error;
pub use error::is_already_in_transaction;
pub use error::is_cancelled;
pub use error::is_not_exist;
pub use error::is_not_found;
pub use error::is_ssh_disabled;
pub use session::Engine;
pub use session::Filter;
pub use session::Identifier;
pub use session::IdentifierError;
pub use session::MAX_IDENTIFIER_LENGTH;
pub use session::PageQuery;
pub use session::Session;
pub use session::validate_identifier;
