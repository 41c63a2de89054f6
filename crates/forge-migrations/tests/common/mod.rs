// crates/forge-migrations/tests/common/mod.rs
// ============================================================================
// Module: Scripted Session Fixtures
// Description: In-memory Engine/Session that records every call.
// Purpose: Assert step ordering and inject failures without a database.
// ============================================================================

#![allow(
    dead_code,
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Shared fixtures are not used by every test binary."
)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use forge_db::DbError;
use forge_db::Engine;
use forge_db::Identifier;
use forge_db::PageQuery;
use forge_db::Session;
use rusqlite::Connection;
use rusqlite::params;
use thiserror::Error;

// ============================================================================
// SECTION: Scripted Engine
// ============================================================================

/// Observable session calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open,
    Fetch { offset: u64, limit: u64, returned: usize },
    Begin,
    Write(i64),
    Commit,
    Release { in_transaction: bool },
}

/// Failure injected into the scripted session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Open,
    Fetch { offset: u64 },
    Begin { page: usize },
    Write { id: i64 },
    Commit { page: usize },
    Cancel { id: i64 },
}

/// Scripted session error.
#[derive(Debug, Error)]
pub enum FakeError {
    #[error("injected {0} failure")]
    Injected(&'static str),
    #[error("scripted session access error")]
    Access(#[source] DbError),
}

/// Shared state of a scripted engine and its sessions.
#[derive(Debug, Default)]
pub struct Store {
    pub events: Vec<Event>,
    /// Number of committed recomputes per subject.
    pub committed: BTreeMap<i64, u32>,
    pub open_sessions: usize,
}

/// Engine over a fixed, sorted population of subject ids.
#[derive(Debug, Clone)]
pub struct ScriptedEngine {
    pub ids: Vec<i64>,
    pub fault: Option<Fault>,
    pub store: Rc<RefCell<Store>>,
}

impl ScriptedEngine {
    pub fn new(ids: Vec<i64>) -> Self {
        Self {
            ids,
            fault: None,
            store: Rc::new(RefCell::new(Store::default())),
        }
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = Some(fault);
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.store.borrow().events.clone()
    }

    pub fn committed(&self) -> BTreeMap<i64, u32> {
        self.store.borrow().committed.clone()
    }

    pub fn open_sessions(&self) -> usize {
        self.store.borrow().open_sessions
    }

    /// Offsets of every page read, in order.
    pub fn fetch_offsets(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Fetch {
                    offset, ..
                } => Some(offset),
                _ => None,
            })
            .collect()
    }

    /// Sizes of every page read, in order.
    pub fn page_sizes(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Fetch {
                    returned, ..
                } => Some(returned),
                _ => None,
            })
            .collect()
    }

    pub fn commits(&self) -> usize {
        self.events().iter().filter(|event| **event == Event::Commit).count()
    }
}

impl Engine for ScriptedEngine {
    type Session = ScriptedSession;

    fn new_session(&self) -> Result<ScriptedSession, FakeError> {
        if self.fault == Some(Fault::Open) {
            return Err(FakeError::Injected("open"));
        }
        let mut store = self.store.borrow_mut();
        store.events.push(Event::Open);
        store.open_sessions += 1;
        drop(store);
        Ok(ScriptedSession {
            ids: self.ids.clone(),
            fault: self.fault,
            store: Rc::clone(&self.store),
            pending: None,
            pages_begun: 0,
        })
    }
}

/// Session over a [`ScriptedEngine`] population.
pub struct ScriptedSession {
    ids: Vec<i64>,
    fault: Option<Fault>,
    store: Rc<RefCell<Store>>,
    /// Writes staged by the open transaction.
    pending: Option<Vec<i64>>,
    pages_begun: usize,
}

impl ScriptedSession {
    fn record(&self, event: Event) {
        self.store.borrow_mut().events.push(event);
    }
}

impl Session for ScriptedSession {
    type Error = FakeError;

    fn find_ids(&mut self, query: &PageQuery) -> Result<Vec<i64>, FakeError> {
        if self.fault
            == Some(Fault::Fetch {
                offset: query.offset,
            })
        {
            return Err(FakeError::Injected("fetch"));
        }
        let page: Vec<i64> = self
            .ids
            .iter()
            .copied()
            .skip(usize::try_from(query.offset).unwrap())
            .take(usize::try_from(query.limit).unwrap())
            .collect();
        self.record(Event::Fetch {
            offset: query.offset,
            limit: query.limit,
            returned: page.len(),
        });
        Ok(page)
    }

    fn begin(&mut self) -> Result<(), FakeError> {
        if self.pending.is_some() {
            return Err(FakeError::Access(DbError::AlreadyInTransaction));
        }
        self.pages_begun += 1;
        if self.fault
            == Some(Fault::Begin {
                page: self.pages_begun,
            })
        {
            return Err(FakeError::Injected("begin"));
        }
        self.pending = Some(Vec::new());
        self.record(Event::Begin);
        Ok(())
    }

    fn execute(&mut self, statement: &str, params: &[i64]) -> Result<usize, FakeError> {
        assert!(statement.starts_with("UPDATE "), "unexpected statement {statement}");
        let [id] = params else {
            panic!("expected one parameter, got {params:?}");
        };
        if self.fault
            == Some(Fault::Write {
                id: *id,
            })
        {
            return Err(FakeError::Injected("write"));
        }
        if self.fault
            == Some(Fault::Cancel {
                id: *id,
            })
        {
            return Err(FakeError::Access(DbError::cancelled(format_args!(
                "request context done while recomputing {id}"
            ))));
        }
        let pending = self.pending.as_mut().expect("write outside transaction");
        pending.push(*id);
        self.record(Event::Write(*id));
        Ok(1)
    }

    fn commit(&mut self) -> Result<(), FakeError> {
        if self.fault
            == Some(Fault::Commit {
                page: self.pages_begun,
            })
        {
            return Err(FakeError::Injected("commit"));
        }
        let pending = self.pending.take().expect("commit outside transaction");
        let mut store = self.store.borrow_mut();
        for id in pending {
            *store.committed.entry(id).or_default() += 1;
        }
        store.events.push(Event::Commit);
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), FakeError> {
        self.pending.take().map(|_| ()).ok_or(FakeError::Injected("rollback"))
    }

    fn in_transaction(&self) -> bool {
        self.pending.is_some()
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        let in_transaction = self.pending.take().is_some();
        let mut store = self.store.borrow_mut();
        store.open_sessions -= 1;
        store.events.push(Event::Release {
            in_transaction,
        });
    }
}

// ============================================================================
// SECTION: SQLite Fixtures
// ============================================================================

pub fn ident(name: &str) -> Identifier {
    Identifier::new(name).expect("valid identifier")
}

/// Creates the `user` and `star` tables.
pub fn create_schema(path: &Path) {
    let connection = Connection::open(path).unwrap();
    connection
        .execute_batch(
            "CREATE TABLE user (
                id INTEGER PRIMARY KEY,
                type INTEGER NOT NULL DEFAULT 0,
                num_stars INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE star (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uid INTEGER NOT NULL,
                repo_id INTEGER NOT NULL
            );",
        )
        .unwrap();
}

/// Inserts users 1..=count. Every user `id` starred `id % 7` repositories and
/// carries a stale cached count of 999.
pub fn seed_users_with_stars(path: &Path, count: i64) {
    let mut connection = Connection::open(path).unwrap();
    let tx = connection.transaction().unwrap();
    for id in 1 ..= count {
        tx.execute("INSERT INTO user (id, type, num_stars) VALUES (?1, 0, 999)", params![id])
            .unwrap();
        for repo_id in 0 .. id % 7 {
            tx.execute("INSERT INTO star (uid, repo_id) VALUES (?1, ?2)", params![id, repo_id])
                .unwrap();
        }
    }
    tx.commit().unwrap();
}

/// Returns `(id, num_stars)` for every user, ordered by id.
pub fn cached_stars(path: &Path) -> Vec<(i64, i64)> {
    let connection = Connection::open(path).unwrap();
    let mut stmt = connection.prepare("SELECT id, num_stars FROM user ORDER BY id").unwrap();
    stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}
