#![forbid(unsafe_code)]
//! The equivalence-class store (component C8, §4.10): a union-find-style
//! structure mapping external record identifiers to integer class ids, with
//! incremental link insertion and class merging.

pub mod memory;
pub mod sqlite;

use entitylink_core::error::BackingStoreError;

/// `addLink`/`classOf`/`commit` contract (§4.10). Implementations must
/// serialize all writes — this store is not safe for concurrent mutation.
pub trait EquivalenceClassStore {
    /// Link `id1` and `id2` into the same class, applying the state
    /// transition table of §4.10 (allocate / assign / no-op / merge).
    ///
    /// # Errors
    /// Returns an error if the underlying store cannot be updated.
    fn add_link(&mut self, id1: &str, id2: &str) -> Result<(), BackingStoreError>;

    /// All ids that currently share a class with `id`, including `id`
    /// itself. An id that has never been linked forms a class of one.
    ///
    /// # Errors
    /// Returns an error if the underlying store cannot be read.
    fn class_of(&self, id: &str) -> Result<Vec<String>, BackingStoreError>;

    /// Flush any buffered mutations to durable storage.
    ///
    /// # Errors
    /// Returns an error if the flush fails.
    fn commit(&mut self) -> Result<(), BackingStoreError>;
}

pub use memory::MemoryClassStore;
pub use sqlite::SqliteClassStore;
