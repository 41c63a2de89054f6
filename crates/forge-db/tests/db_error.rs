// crates/forge-db/tests/db_error.rs
// ============================================================================
// Module: Data Access Error Tests
// Description: Message rendering, classification, and unwrap behavior.
// Purpose: Pin the exact user-visible strings and the kind predicates.
// ============================================================================

//! ## Overview
//! Covers every [`DbError`] kind:
//! - Fixed message strings and the `record` fallback for unnamed resources
//! - Predicates match only their own kind and reject foreign errors
//! - `NotExist` unwraps to the shared not-found sentinel, bare or wrapped

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::error::Error;
use std::fmt;
use std::io;

use forge_db::ALREADY_IN_TRANSACTION;
use forge_db::DbError;
use forge_db::DbErrorKind;
use forge_db::NOT_FOUND;
use forge_db::NotExist;
use forge_db::NotFound;
use forge_db::classify;
use forge_db::find_db_error;
use forge_db::is_already_in_transaction;
use forge_db::is_cancelled;
use forge_db::is_not_exist;
use forge_db::is_not_found;
use forge_db::is_ssh_disabled;
use proptest::prelude::*;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn every_kind() -> Vec<DbError> {
    vec![
        DbError::AlreadyInTransaction,
        DbError::cancelled("context deadline exceeded"),
        DbError::SshDisabled,
        DbError::not_exist("user", 42),
    ]
}

type Predicate = fn(&(dyn Error + 'static)) -> bool;

fn predicates() -> [(DbErrorKind, Predicate); 4] {
    [
        (DbErrorKind::AlreadyInTransaction, is_already_in_transaction),
        (DbErrorKind::Cancelled, is_cancelled),
        (DbErrorKind::FeatureDisabled, is_ssh_disabled),
        (DbErrorKind::NotExist, is_not_exist),
    ]
}

/// Wrapper that names a [`DbError`] as its source.
#[derive(Debug)]
struct Wrapped(DbError);

impl fmt::Display for Wrapped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loading repository: {}", self.0)
    }
}

impl Error for Wrapped {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

/// Outer layer that names another error as its source.
#[derive(Debug)]
struct Context(Wrapped);

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handling request: {}", self.0)
    }
}

impl Error for Context {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

// ============================================================================
// SECTION: Messages
// ============================================================================

#[test]
fn fixed_messages_render_verbatim() {
    assert_eq!(
        DbError::AlreadyInTransaction.to_string(),
        "database connection has already been in a transaction"
    );
    assert_eq!(DbError::SshDisabled.to_string(), "SSH is disabled");
    assert_eq!(ALREADY_IN_TRANSACTION, DbError::AlreadyInTransaction);
}

#[test]
fn cancelled_renders_message_at_construction() {
    let page = 3;
    let error = DbError::cancelled(format_args!("migration interrupted at page {page}"));
    assert_eq!(error.to_string(), "Cancelled: migration interrupted at page 3");
    let DbError::Cancelled {
        message,
    } = &error
    else {
        panic!("expected cancelled, got {error:?}");
    };
    assert_eq!(message, "migration interrupted at page 3");
    assert_eq!(error.clone().to_string(), error.to_string());
}

#[test]
fn not_exist_renders_with_and_without_id() {
    assert_eq!(DbError::not_exist("repository", 0).to_string(), "repository does not exist");
    assert_eq!(
        DbError::not_exist("repository", 17).to_string(),
        "repository does not exist [id: 17]"
    );
    assert_eq!(NotExist::resource("team").to_string(), "team does not exist");
}

#[test]
fn not_exist_falls_back_to_record() {
    assert_eq!(NotExist::default().to_string(), "record does not exist");
    assert_eq!(NotExist::new("", -5).to_string(), "record does not exist [id: -5]");
    assert_eq!(NotExist::new("", 9).resource_name(), "record");
}

// ============================================================================
// SECTION: Classification
// ============================================================================

#[test]
fn each_predicate_matches_only_its_kind() {
    for error in every_kind() {
        for (kind, predicate) in predicates() {
            assert_eq!(predicate(&error), error.kind() == kind, "{kind:?} vs {error}");
        }
        assert_eq!(classify(&error), Some(error.kind()));
    }
}

#[test]
fn foreign_errors_classify_as_none() {
    let io_error = io::Error::other("disk full");
    assert_eq!(classify(&io_error), None);
    assert_eq!(classify(&NOT_FOUND), None);
    for (_, predicate) in predicates() {
        assert!(!predicate(&io_error));
        assert!(!predicate(&NotFound));
    }
}

#[test]
fn absent_error_matches_no_predicate() {
    let absent: Option<&(dyn Error + 'static)> = None;
    for (_, predicate) in predicates() {
        assert!(!absent.is_some_and(predicate));
    }
}

#[test]
fn bare_not_exist_classifies_as_not_exist() {
    let error = NotExist::new("issue", 8);
    assert!(is_not_exist(&error));
    assert!(!is_cancelled(&error));
    assert_eq!(DbError::from(error).kind(), DbErrorKind::NotExist);
}

#[test]
fn predicates_do_not_walk_the_chain() {
    let wrapped = Wrapped(DbError::cancelled("shutdown"));
    assert!(!is_cancelled(&wrapped));
    let found = find_db_error(&wrapped).expect("db error in chain");
    assert!(is_cancelled(found));
}

// ============================================================================
// SECTION: Unwrap
// ============================================================================

#[test]
fn not_exist_unwraps_to_sentinel() {
    let error = DbError::not_exist("user", 5);
    let source = error.source().expect("not-exist source");
    assert!(source.is::<NotFound>());
    assert_eq!(source.to_string(), "resource does not exist");
    assert!(is_not_found(&error));
    assert!(is_not_found(&Wrapped(error)));
}

#[test]
fn chain_walk_reaches_errors_several_layers_down() {
    let nested = Context(Wrapped(DbError::not_exist("repository", 9)));
    let found = find_db_error(&nested).expect("db error two layers down");
    assert_eq!(found.to_string(), "repository does not exist [id: 9]");
    assert!(is_not_found(&nested));
    assert!(!is_not_exist(&nested));
    let cancelled = Context(Wrapped(DbError::cancelled("deadline")));
    assert!(is_cancelled(find_db_error(&cancelled).expect("db error in chain")));
    assert!(!is_not_found(&cancelled));
}

#[test]
fn other_kinds_do_not_unwrap_to_sentinel() {
    for error in every_kind().into_iter().filter(|error| error.kind() != DbErrorKind::NotExist) {
        assert!(error.source().is_none());
        assert!(!is_not_found(&error));
    }
}

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    #[test]
    fn not_exist_message_names_resource_and_id(resource in "[a-z_]{0,16}", id in any::<i64>()) {
        let message = NotExist::new(resource.clone(), id).to_string();
        let expected_name = if resource.is_empty() { "record" } else { resource.as_str() };
        prop_assert!(message.starts_with(expected_name));
        prop_assert_eq!(message.contains(&format!("[id: {id}]")), id != 0);
    }

    #[test]
    fn not_exist_always_unwraps_to_sentinel(resource in ".{0,16}", id in any::<i64>()) {
        let error = DbError::not_exist(resource, id);
        prop_assert!(error.source().is_some_and(|source| source.is::<NotFound>()));
        prop_assert!(is_not_found(&error));
    }
}
