//! A path-compressed, in-memory union-find (§9 design notes: "an in-memory
//! implementation should use a path-compressed union-find for O(α(n)) per
//! operation").
//!
//! Class membership is tracked alongside the union-find parent array via
//! small-to-large merging: every root keeps the full set of ids in its
//! class, and a union splices the smaller set into the larger one. This
//! keeps `class_of` O(1) instead of requiring a linear scan over every known
//! id on every call.

use std::collections::{BTreeSet, HashMap};

use entitylink_core::error::BackingStoreError;
use tracing::debug;

use crate::EquivalenceClassStore;

#[derive(Debug, Default)]
pub struct MemoryClassStore {
    index_of: HashMap<String, usize>,
    ids: Vec<String>,
    parent: Vec<usize>,
    members: HashMap<usize, BTreeSet<String>>,
}

impl MemoryClassStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure(&mut self, id: &str) -> usize {
        if let Some(&idx) = self.index_of.get(id) {
            return idx;
        }
        let idx = self.ids.len();
        self.ids.push(id.to_string());
        self.parent.push(idx);
        self.members.insert(idx, BTreeSet::from([id.to_string()]));
        self.index_of.insert(id.to_string(), idx);
        idx
    }

    fn find(&mut self, idx: usize) -> usize {
        if self.parent[idx] != idx {
            let root = self.find(self.parent[idx]);
            self.parent[idx] = root;
        }
        self.parent[idx]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        let (small, large) = if self.members[&ra].len() <= self.members[&rb].len() {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent[small] = large;
        let moved = self.members.remove(&small).unwrap_or_default();
        debug!(merged = moved.len(), "merging equivalence classes");
        self.members.get_mut(&large).expect("root must have a member set").extend(moved);
    }
}

impl EquivalenceClassStore for MemoryClassStore {
    fn add_link(&mut self, id1: &str, id2: &str) -> Result<(), BackingStoreError> {
        let a = self.ensure(id1);
        let b = self.ensure(id2);
        self.union(a, b);
        Ok(())
    }

    fn class_of(&self, id: &str) -> Result<Vec<String>, BackingStoreError> {
        let Some(&idx) = self.index_of.get(id) else {
            return Ok(vec![id.to_string()]);
        };
        // Read-only find, without path compression, to keep this method &self.
        let mut root = idx;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        Ok(self.members.get(&root).map(|set| set.iter().cloned().collect()).unwrap_or_default())
    }

    fn commit(&mut self) -> Result<(), BackingStoreError> {
        Ok(())
    }
}

impl MemoryClassStore {
    /// Every distinct class currently known, as sorted member-id lists, in a
    /// deterministic (by smallest member id) order. Used by durable backends
    /// to materialize a full snapshot.
    #[must_use]
    pub fn all_classes(&self) -> Vec<Vec<String>> {
        let mut classes: Vec<Vec<String>> = self
            .members
            .values()
            .map(|set| set.iter().cloned().collect())
            .collect();
        classes.sort();
        classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_id_forms_a_class_of_one() {
        let store = MemoryClassStore::new();
        assert_eq!(store.class_of("a").unwrap(), vec!["a".to_string()]);
    }

    #[test]
    fn linking_two_unseen_ids_forms_a_class_of_two() {
        let mut store = MemoryClassStore::new();
        store.add_link("a", "b").unwrap();
        assert_eq!(store.class_of("a").unwrap(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(store.class_of("b").unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn linking_a_seen_id_to_an_unseen_one_extends_the_class() {
        let mut store = MemoryClassStore::new();
        store.add_link("a", "b").unwrap();
        store.add_link("a", "c").unwrap();
        assert_eq!(
            store.class_of("c").unwrap(),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn linking_two_ids_in_the_same_class_is_a_no_op() {
        let mut store = MemoryClassStore::new();
        store.add_link("a", "b").unwrap();
        store.add_link("a", "b").unwrap();
        assert_eq!(store.class_of("a").unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn linking_two_different_classes_merges_them() {
        let mut store = MemoryClassStore::new();
        store.add_link("a", "b").unwrap();
        store.add_link("c", "d").unwrap();
        store.add_link("b", "c").unwrap();
        let class = store.class_of("a").unwrap();
        assert_eq!(class, vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()]);
        assert_eq!(store.class_of("d").unwrap(), class);
    }

    #[test]
    fn classes_equal_connected_components_after_arbitrary_links() {
        let mut store = MemoryClassStore::new();
        let edges = [("a", "b"), ("c", "d"), ("e", "f"), ("b", "c"), ("f", "a")];
        for (x, y) in edges {
            store.add_link(x, y).unwrap();
        }
        // a-b-c-d and e-f-a are now one connected component of 6 nodes.
        let class = store.class_of("d").unwrap();
        assert_eq!(class.len(), 6);
        for id in ["a", "b", "c", "d", "e", "f"] {
            assert_eq!(store.class_of(id).unwrap(), class);
        }
    }
}
