#![forbid(unsafe_code)]
//! The inverted-index abstract contract (component C5) and the adaptive
//! retrieval-limit tracker (component C6).
//!
//! Two implementations of [`InvertedIndex`] are provided: [`memory::MemoryIndex`]
//! for tests and small in-process runs, and [`sqlite::SqliteIndex`], a durable
//! FTS5-backed store for everything else.

pub mod memory;
pub mod sqlite;
pub mod token;
pub mod tracker;

use entitylink_core::error::{BackingStoreError, EntityLinkError};
use entitylink_core::model::{Configuration, Record};

/// A single retrieval hit: the indexed document's id and a relevance score.
///
/// Scores are the index's native ranking signal and are only meaningfully
/// comparable against other hits from the same query — they are not a
/// calibrated probability.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub doc_id: String,
    pub score: f64,
}

/// How a lookup property's tokens combine into a compound query (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
    /// All tokens from this property must match.
    Required,
    /// Any token from this property may match.
    Optional,
}

/// The abstract contract every backing store for matching must satisfy.
///
/// Implementations must honor the visibility contract: writes made by
/// [`InvertedIndex::index`] are not observable to any lookup method until
/// [`InvertedIndex::commit`] returns — and that transition is atomic with
/// respect to concurrent lookups.
pub trait InvertedIndex {
    /// Analyze and stage a record under `doc_id`. Not visible to lookups
    /// until the next [`InvertedIndex::commit`].
    ///
    /// # Errors
    /// Returns an error if the record cannot be staged.
    fn index(&mut self, doc_id: &str, record: &Record, config: &Configuration) -> Result<(), BackingStoreError>;

    /// Make every staged `index` call visible to lookups, atomically.
    ///
    /// # Errors
    /// Returns an error if the commit fails.
    fn commit(&mut self) -> Result<(), BackingStoreError>;

    /// Ranked lookup against a single property's analyzed tokens.
    ///
    /// # Errors
    /// Returns an error if the underlying query fails.
    fn lookup_field(&self, property: &str, value: &str, limit: usize) -> Result<Vec<Hit>, BackingStoreError>;

    /// Compound lookup over a record's lookup properties (§4.4): `required`
    /// properties combine conjunctively, `optional` ones disjunctively.
    ///
    /// # Errors
    /// Returns an error if the underlying query fails.
    fn lookup_record(
        &self,
        terms: &[(String, Occur, Vec<String>)],
        limit: usize,
    ) -> Result<Vec<Hit>, BackingStoreError>;

    /// Exact-match retrieval by any identity property's value.
    ///
    /// # Errors
    /// Returns an error if the underlying query fails.
    fn find_by_id(&self, identity_property: &str, id_value: &str) -> Result<Option<String>, BackingStoreError>;

    /// Reconstruct the stored field values for `doc_id`, for scoring
    /// candidates retrieved by a lookup.
    ///
    /// # Errors
    /// Returns a corrupt-index error if the stored rows cannot be
    /// reassembled into a [`Record`], or a backing-store error if the
    /// underlying read fails.
    fn get_record(&self, doc_id: &str) -> Result<Option<Record>, EntityLinkError>;
}

pub use tracker::QueryResultTracker;
