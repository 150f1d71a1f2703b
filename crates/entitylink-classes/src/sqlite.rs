//! A durable [`EquivalenceClassStore`] backed by SQLite.
//!
//! Reads and writes are served from an in-memory union-find
//! ([`crate::memory::MemoryClassStore`]) kept live across the whole session;
//! `commit()` periodically materializes it into a `(id, class_id)` table,
//! per the design note that "the durable backend can periodically
//! materialize canonical ids" rather than hit disk on every `add_link`.

use std::path::Path;

use rusqlite::{Connection, params};

use entitylink_core::error::BackingStoreError;

use crate::memory::MemoryClassStore;
use crate::EquivalenceClassStore;

pub struct SqliteClassStore {
    conn: Connection,
    live: MemoryClassStore,
}

impl SqliteClassStore {
    /// Open (or create) the class-store database at `path`, reloading any
    /// previously materialized classes into the in-memory union-find.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened, migrated, or read.
    pub fn open(path: &Path) -> Result<Self, BackingStoreError> {
        let conn = Connection::open(path).map_err(|e| BackingStoreError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_connection(conn)
    }

    /// An in-memory class-store database, for tests.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub fn open_in_memory() -> Result<Self, BackingStoreError> {
        let conn = Connection::open_in_memory().map_err(|e| BackingStoreError::OpenFailed {
            path: "<memory>".into(),
            reason: e.to_string(),
        })?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, BackingStoreError> {
        migrate(&conn)?;
        let mut live = MemoryClassStore::new();
        reload(&conn, &mut live)?;
        Ok(Self { conn, live })
    }

    /// Release the underlying connection explicitly, surfacing any error
    /// instead of letting it vanish into a `Drop` impl (§5 "Resource
    /// release"). Does not flush pending in-memory links — call
    /// [`EquivalenceClassStore::commit`] first.
    ///
    /// # Errors
    /// Returns an error if SQLite reports a failure while closing the
    /// connection.
    pub fn close(self) -> Result<(), BackingStoreError> {
        self.conn.close().map_err(|(_, e)| BackingStoreError::OperationFailed {
            operation: "close".into(),
            reason: e.to_string(),
        })
    }
}

fn migrate(conn: &Connection) -> Result<(), BackingStoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS class_links (
            id TEXT PRIMARY KEY,
            class_id INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS class_links_by_class ON class_links(class_id);",
    )
    .map_err(to_operation_failed("migrate"))
}

fn reload(conn: &Connection, live: &mut MemoryClassStore) -> Result<(), BackingStoreError> {
    let mut stmt = conn
        .prepare("SELECT id, class_id FROM class_links ORDER BY class_id")
        .map_err(to_operation_failed("reload"))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
        .map_err(to_operation_failed("reload"))?;

    let mut current_class: Option<i64> = None;
    let mut anchor: Option<String> = None;
    for row in rows {
        let (id, class_id) = row.map_err(to_operation_failed("reload"))?;
        match (&current_class, &anchor) {
            (Some(c), Some(a)) if *c == class_id => {
                live.add_link(a, &id)?;
            }
            _ => {
                current_class = Some(class_id);
                anchor = Some(id);
            }
        }
    }
    Ok(())
}

impl EquivalenceClassStore for SqliteClassStore {
    fn add_link(&mut self, id1: &str, id2: &str) -> Result<(), BackingStoreError> {
        self.live.add_link(id1, id2)
    }

    fn class_of(&self, id: &str) -> Result<Vec<String>, BackingStoreError> {
        self.live.class_of(id)
    }

    fn commit(&mut self) -> Result<(), BackingStoreError> {
        let classes = self.live.all_classes();
        let tx = self.conn.transaction().map_err(to_operation_failed("commit"))?;
        tx.execute("DELETE FROM class_links", []).map_err(to_operation_failed("commit"))?;
        {
            let mut insert = tx
                .prepare("INSERT INTO class_links (id, class_id) VALUES (?1, ?2)")
                .map_err(to_operation_failed("commit"))?;
            for (class_id, members) in classes.iter().enumerate() {
                for id in members {
                    insert
                        .execute(params![id, class_id as i64])
                        .map_err(to_operation_failed("commit"))?;
                }
            }
        }
        tx.commit().map_err(to_operation_failed("commit"))
    }
}

fn to_operation_failed(operation: &'static str) -> impl Fn(rusqlite::Error) -> BackingStoreError {
    move |e| BackingStoreError::OperationFailed {
        operation: operation.into(),
        reason: e.to_string(),
    }
}
