//! A durable, FTS5-backed [`InvertedIndex`] (§4.4).
//!
//! Schema:
//! - `doc_values(doc_id, property, value)` — every property value for every
//!   indexed record, used both to reconstruct candidates for scoring and to
//!   serve identity lookups (plain equality, never analyzed).
//! - `doc_tokens` — an FTS5 virtual table of analyzed tokens for every
//!   property, used for ranked retrieval. Identity lookups never touch it.
//!
//! `index()` only stages rows in memory; `commit()` opens one write
//! transaction and applies everything at once. SQLite's own transactions are
//! connection-scoped (a connection always sees its own uncommitted writes),
//! so staging in Rust rather than in an open SQL transaction is what gives
//! `commit()` its atomic, no-partial-visibility guarantee.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, instrument};

use entitylink_core::error::{BackingStoreError, EntityLinkError};
use entitylink_core::model::{Configuration, PropertyRole, Record};

use crate::token::{analyze, escape, identity_token};
use crate::{Hit, InvertedIndex, Occur};

/// A record staged for the next `commit()`, along with the identity
/// property names resolved from the `Configuration` passed to `index()` —
/// resolved eagerly so `commit()` knows, per property, whether to skip
/// analysis without needing the config again.
struct PendingDoc {
    doc_id: String,
    record: Record,
    identity_properties: std::collections::BTreeSet<String>,
}

/// A durable inverted index backed by a SQLite database with FTS5.
pub struct SqliteIndex {
    conn: Connection,
    pending: Vec<PendingDoc>,
}

impl SqliteIndex {
    /// Open (or create) the index database at `path` and ensure its schema.
    ///
    /// # Errors
    /// Returns `BackingStoreError::OpenFailed` if the database cannot be
    /// opened or migrated.
    pub fn open(path: &Path) -> Result<Self, BackingStoreError> {
        let conn = Connection::open(path).map_err(|e| BackingStoreError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_connection(conn)
    }

    /// An in-memory index database, mainly for tests that want real SQL
    /// semantics without a file on disk.
    ///
    /// # Errors
    /// Returns `BackingStoreError::OpenFailed` if schema creation fails.
    pub fn open_in_memory() -> Result<Self, BackingStoreError> {
        let conn = Connection::open_in_memory().map_err(|e| BackingStoreError::OpenFailed {
            path: "<memory>".into(),
            reason: e.to_string(),
        })?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, BackingStoreError> {
        configure(&conn)?;
        migrate(&conn)?;
        Ok(Self {
            conn,
            pending: Vec::new(),
        })
    }

    /// Release the underlying connection explicitly, surfacing any flush
    /// error instead of letting it vanish into a `Drop` impl (§5 "Resource
    /// release"). Safe to skip — an unclosed `SqliteIndex` still releases
    /// its handle on drop, just without a place to report failure.
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

    fn term_hits(&self, property: &str, tokens: &[String]) -> Result<Vec<Hit>, BackingStoreError> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let query = tokens.iter().map(|t| escape(t)).collect::<Vec<_>>().join(" OR ");
        let mut stmt = self
            .conn
            .prepare(
                "SELECT doc_id, -bm25(doc_tokens) AS score FROM doc_tokens \
                 WHERE doc_tokens MATCH ?1 AND property = ?2",
            )
            .map_err(to_operation_failed("lookup"))?;
        let rows = stmt
            .query_map(params![query, property], |row| {
                Ok(Hit {
                    doc_id: row.get(0)?,
                    score: row.get(1)?,
                })
            })
            .map_err(to_operation_failed("lookup"))?;
        let mut hits = Vec::new();
        for row in rows {
            hits.push(row.map_err(to_operation_failed("lookup"))?);
        }
        Ok(hits)
    }
}

fn configure(conn: &Connection) -> Result<(), BackingStoreError> {
    conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
        .map_err(|e| BackingStoreError::OperationFailed {
            operation: "configure".into(),
            reason: e.to_string(),
        })
}

fn migrate(conn: &Connection) -> Result<(), BackingStoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS doc_values (
            doc_id TEXT NOT NULL,
            property TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (doc_id, property, value)
        );
        CREATE INDEX IF NOT EXISTS doc_values_by_property_value ON doc_values(property, value);

        CREATE VIRTUAL TABLE IF NOT EXISTS doc_tokens USING fts5(
            doc_id UNINDEXED,
            property UNINDEXED,
            body,
            tokenize = 'unicode61'
        );",
    )
    .map_err(|e| BackingStoreError::OperationFailed {
        operation: "migrate".into(),
        reason: e.to_string(),
    })
}

impl InvertedIndex for SqliteIndex {
    #[instrument(skip(self, record, config), fields(doc_id = doc_id))]
    fn index(&mut self, doc_id: &str, record: &Record, config: &Configuration) -> Result<(), BackingStoreError> {
        let identity_properties = config
            .properties
            .iter()
            .filter(|property| property.role == PropertyRole::Identity)
            .map(|property| property.name.clone())
            .collect();
        self.pending.push(PendingDoc {
            doc_id: doc_id.to_string(),
            record: record.clone(),
            identity_properties,
        });
        Ok(())
    }

    #[instrument(skip(self))]
    fn commit(&mut self) -> Result<(), BackingStoreError> {
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return Ok(());
        }
        debug!(staged = pending.len(), "committing staged documents");

        let tx = self.conn.transaction().map_err(to_operation_failed("commit"))?;
        {
            let mut insert_value = tx
                .prepare("INSERT OR IGNORE INTO doc_values (doc_id, property, value) VALUES (?1, ?2, ?3)")
                .map_err(to_operation_failed("commit"))?;
            let mut insert_token = tx
                .prepare("INSERT INTO doc_tokens (doc_id, property, body) VALUES (?1, ?2, ?3)")
                .map_err(to_operation_failed("commit"))?;

            for doc in &pending {
                for property in doc.record.field_names() {
                    let is_identity = doc.identity_properties.contains(property);
                    for value in doc.record.values(property) {
                        insert_value
                            .execute(params![doc.doc_id, property, value])
                            .map_err(to_operation_failed("commit"))?;
                        if is_identity {
                            continue;
                        }
                        for token in analyze(value) {
                            insert_token
                                .execute(params![doc.doc_id, property, token])
                                .map_err(to_operation_failed("commit"))?;
                        }
                    }
                }
            }
        }
        tx.commit().map_err(to_operation_failed("commit"))
    }

    fn lookup_field(&self, property: &str, value: &str, limit: usize) -> Result<Vec<Hit>, BackingStoreError> {
        let mut exact_stmt = self
            .conn
            .prepare("SELECT doc_id FROM doc_values WHERE property = ?1 AND value = ?2")
            .map_err(to_operation_failed("lookup_field"))?;
        let exact_rows = exact_stmt
            .query_map(params![property, value], |row| row.get::<_, String>(0))
            .map_err(to_operation_failed("lookup_field"))?;
        let mut exact = Vec::new();
        for row in exact_rows {
            exact.push(row.map_err(to_operation_failed("lookup_field"))?);
        }
        if !exact.is_empty() {
            let mut hits: Vec<Hit> = exact.into_iter().map(|doc_id| Hit { doc_id, score: 1.0 }).collect();
            hits.truncate(limit);
            return Ok(hits);
        }

        let tokens = analyze(value);
        let mut hits = self.term_hits(property, &tokens)?;
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    fn lookup_record(
        &self,
        terms: &[(String, Occur, Vec<String>)],
        limit: usize,
    ) -> Result<Vec<Hit>, BackingStoreError> {
        use std::collections::{BTreeMap, BTreeSet};

        let mut required_hits: Option<BTreeSet<String>> = None;
        let mut combined_scores: BTreeMap<String, f64> = BTreeMap::new();

        for (property, occur, tokens) in terms {
            let term_hits = self.term_hits(property, tokens)?;
            if *occur == Occur::Required {
                let matched: BTreeSet<String> = term_hits.iter().map(|h| h.doc_id.clone()).collect();
                required_hits = Some(match required_hits {
                    Some(existing) => existing.intersection(&matched).cloned().collect(),
                    None => matched,
                });
            }
            for hit in term_hits {
                *combined_scores.entry(hit.doc_id).or_insert(0.0) += hit.score;
            }
        }

        let mut hits: Vec<Hit> = combined_scores
            .into_iter()
            .filter(|(doc_id, _)| required_hits.as_ref().is_none_or(|req| req.contains(doc_id)))
            .map(|(doc_id, score)| Hit { doc_id, score })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    fn find_by_id(&self, identity_property: &str, id_value: &str) -> Result<Option<String>, BackingStoreError> {
        self.conn
            .query_row(
                "SELECT doc_id FROM doc_values WHERE property = ?1 AND value = ?2 LIMIT 1",
                params![identity_property, identity_token(id_value)],
                |row| row.get(0),
            )
            .optional()
            .map_err(to_operation_failed("find_by_id"))
    }

    fn get_record(&self, doc_id: &str) -> Result<Option<Record>, EntityLinkError> {
        let mut stmt = self
            .conn
            .prepare("SELECT property, value FROM doc_values WHERE doc_id = ?1")
            .map_err(to_operation_failed("get_record"))?;
        let rows = stmt
            .query_map(params![doc_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(to_operation_failed("get_record"))?;

        let mut record = Record::new();
        let mut any = false;
        for row in rows {
            let (property, value) = row.map_err(to_operation_failed("get_record"))?;
            record.push(property, value);
            any = true;
        }
        Ok(if any { Some(record) } else { None })
    }
}

fn to_operation_failed(operation: &'static str) -> impl Fn(rusqlite::Error) -> BackingStoreError {
    move |e| BackingStoreError::OperationFailed {
        operation: operation.into(),
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entitylink_core::model::{ComparatorRef, LookupBehaviour, Property, PropertyRole};

    fn config() -> Configuration {
        Configuration {
            properties: vec![
                Property {
                    name: "ssn".into(),
                    role: PropertyRole::Identity,
                    lookup_behaviour: LookupBehaviour::Required,
                    comparator: ComparatorRef::ExactMatch,
                    high_probability: 0.95,
                    low_probability: 0.05,
                },
                Property {
                    name: "name".into(),
                    role: PropertyRole::Lookup,
                    lookup_behaviour: LookupBehaviour::Required,
                    comparator: ComparatorRef::WeightedLevenshtein,
                    high_probability: 0.9,
                    low_probability: 0.1,
                },
            ],
            threshold: 0.9,
            maybe_threshold: 0.7,
            path: None,
            max_search_hits: 10_000,
            min_relevance: 0.0,
            expansion_factor: 1.0,
        }
    }

    #[test]
    fn identity_lookup_is_exact() {
        let config = config();
        let mut index = SqliteIndex::open_in_memory().unwrap();
        let mut record = Record::new();
        record.push("ssn", "123-45-6789");
        record.push("name", "John Smith");
        index.index("doc-1", &record, &config).unwrap();
        index.commit().unwrap();

        assert_eq!(
            index.find_by_id("ssn", "123-45-6789").unwrap(),
            Some("doc-1".to_string())
        );
        assert_eq!(index.find_by_id("ssn", "000-00-0000").unwrap(), None);
    }

    #[test]
    fn writes_are_invisible_until_commit() {
        let config = config();
        let mut index = SqliteIndex::open_in_memory().unwrap();
        let mut record = Record::new();
        record.push("ssn", "999-99-9999");
        index.index("doc-1", &record, &config).unwrap();
        assert_eq!(index.find_by_id("ssn", "999-99-9999").unwrap(), None);
        index.commit().unwrap();
        assert_eq!(
            index.find_by_id("ssn", "999-99-9999").unwrap(),
            Some("doc-1".to_string())
        );
    }

    #[test]
    fn lookup_field_finds_tokenized_matches() {
        let config = config();
        let mut index = SqliteIndex::open_in_memory().unwrap();
        let mut record = Record::new();
        record.push("name", "John Smith");
        index.index("doc-1", &record, &config).unwrap();
        index.commit().unwrap();

        let hits = index.lookup_field("name", "smith", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_id, "doc-1");
    }

    #[test]
    fn lookup_field_returns_every_doc_sharing_an_exact_value() {
        let config = config();
        let mut index = SqliteIndex::open_in_memory().unwrap();
        let mut a = Record::new();
        a.push("ssn", "111-11-1111");
        a.push("name", "John Smith");
        index.index("doc-a", &a, &config).unwrap();
        let mut b = Record::new();
        b.push("ssn", "222-22-2222");
        b.push("name", "John Smith");
        index.index("doc-b", &b, &config).unwrap();
        index.commit().unwrap();

        let hits = index.lookup_field("name", "John Smith", 10).unwrap();
        let mut doc_ids: Vec<&str> = hits.iter().map(|h| h.doc_id.as_str()).collect();
        doc_ids.sort_unstable();
        assert_eq!(doc_ids, vec!["doc-a", "doc-b"]);
        assert!(hits.iter().all(|h| h.score == 1.0));
    }

    #[test]
    fn lookup_field_exact_match_respects_limit() {
        let config = config();
        let mut index = SqliteIndex::open_in_memory().unwrap();
        for id in ["doc-a", "doc-b", "doc-c"] {
            let mut record = Record::new();
            record.push("name", "John Smith");
            index.index(id, &record, &config).unwrap();
        }
        index.commit().unwrap();

        let hits = index.lookup_field("name", "John Smith", 2).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn identity_properties_are_not_tokenized() {
        let config = config();
        let mut index = SqliteIndex::open_in_memory().unwrap();
        let mut record = Record::new();
        record.push("ssn", "111-11-1111");
        index.index("doc-1", &record, &config).unwrap();
        index.commit().unwrap();

        // "111" would match if the identity value had been split into word
        // tokens by `analyze()`; it must not be, since `ssn` is an identity
        // property.
        let hits = index.lookup_field("ssn", "111", 10).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn get_record_reconstructs_every_stored_value() {
        let config = config();
        let mut index = SqliteIndex::open_in_memory().unwrap();
        let mut record = Record::new();
        record.push("name", "John Smith");
        record.push("ssn", "1");
        index.index("doc-1", &record, &config).unwrap();
        index.commit().unwrap();

        let reconstructed = index.get_record("doc-1").unwrap().unwrap();
        assert!(reconstructed.has("name", "John Smith"));
        assert!(reconstructed.has("ssn", "1"));
    }

    #[test]
    fn lookup_record_combines_required_and_optional_terms() {
        let config = config();
        let mut index = SqliteIndex::open_in_memory().unwrap();
        let mut a = Record::new();
        a.push("name", "John Smith");
        index.index("doc-a", &a, &config).unwrap();
        let mut b = Record::new();
        b.push("name", "Jane Doe");
        index.index("doc-b", &b, &config).unwrap();
        index.commit().unwrap();

        let hits = index
            .lookup_record(
                &[("name".to_string(), Occur::Required, vec!["smith".to_string()])],
                10,
            )
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_id, "doc-a");
    }
}
