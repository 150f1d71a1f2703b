//! An in-process, non-durable [`InvertedIndex`] implementation used by tests
//! and by callers who have no need for persistence across runs.

use std::collections::{BTreeMap, BTreeSet};

use entitylink_core::error::{BackingStoreError, EntityLinkError};
use entitylink_core::model::{Configuration, PropertyRole, Record};

use crate::token::{analyze, identity_token};
use crate::{Hit, InvertedIndex, Occur};

#[derive(Debug, Clone, Default)]
struct Doc {
    values: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Debug, Default)]
struct Staged {
    docs: BTreeMap<String, Doc>,
    postings: BTreeMap<(String, String), BTreeSet<String>>,
    identity: BTreeMap<(String, String), String>,
}

/// Postings are `(property, token) -> doc_ids`; identity fields are stored
/// untokenized so lookups against them are exact matches.
///
/// Writes analyze eagerly (at `index` time) into a staging area and only
/// become visible to lookups once `commit` merges the staging area into the
/// live maps — this is what gives `commit` its atomic-visibility property
/// without needing a second pass over raw records.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    docs: BTreeMap<String, Doc>,
    postings: BTreeMap<(String, String), BTreeSet<String>>,
    identity: BTreeMap<(String, String), String>,
    staged: Staged,
}

impl MemoryIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn score_overlap(&self, property: &str, tokens: &[String]) -> BTreeMap<String, f64> {
        let mut scores: BTreeMap<String, f64> = BTreeMap::new();
        for token in tokens {
            if let Some(docs) = self.postings.get(&(property.to_string(), token.clone())) {
                for doc_id in docs {
                    *scores.entry(doc_id.clone()).or_insert(0.0) += 1.0;
                }
            }
        }
        scores
    }
}

impl InvertedIndex for MemoryIndex {
    fn index(&mut self, doc_id: &str, record: &Record, config: &Configuration) -> Result<(), BackingStoreError> {
        let mut doc = Doc::default();
        for field in record.field_names() {
            let values: BTreeSet<String> = record.values(field).map(str::to_string).collect();
            doc.values.insert(field.to_string(), values);
        }
        self.staged.docs.insert(doc_id.to_string(), doc);

        for property in &config.properties {
            if !record.has_value(&property.name) {
                continue;
            }
            for value in record.values(&property.name) {
                if property.role == PropertyRole::Identity {
                    self.staged
                        .identity
                        .insert((property.name.clone(), identity_token(value).to_string()), doc_id.to_string());
                } else {
                    for token in analyze(value) {
                        self.staged
                            .postings
                            .entry((property.name.clone(), token))
                            .or_default()
                            .insert(doc_id.to_string());
                    }
                }
            }
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), BackingStoreError> {
        let staged = std::mem::take(&mut self.staged);
        self.docs.extend(staged.docs);
        for (key, doc_ids) in staged.postings {
            self.postings.entry(key).or_default().extend(doc_ids);
        }
        self.identity.extend(staged.identity);
        Ok(())
    }

    fn lookup_field(&self, property: &str, value: &str, limit: usize) -> Result<Vec<Hit>, BackingStoreError> {
        let tokens = analyze(value);
        let mut scores = self.score_overlap(property, &tokens);
        if let Some(doc_id) = self.identity.get(&(property.to_string(), identity_token(value).to_string())) {
            scores.insert(doc_id.clone(), f64::from(i32::MAX));
        }
        let mut hits: Vec<Hit> = scores
            .into_iter()
            .map(|(doc_id, score)| Hit { doc_id, score })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    fn lookup_record(
        &self,
        terms: &[(String, Occur, Vec<String>)],
        limit: usize,
    ) -> Result<Vec<Hit>, BackingStoreError> {
        let mut required_hits: Option<BTreeSet<String>> = None;
        let mut combined_scores: BTreeMap<String, f64> = BTreeMap::new();

        for (property, occur, tokens) in terms {
            let scores = self.score_overlap(property, tokens);
            if *occur == Occur::Required {
                let matched: BTreeSet<String> = scores.keys().cloned().collect();
                required_hits = Some(match required_hits {
                    Some(existing) => existing.intersection(&matched).cloned().collect(),
                    None => matched,
                });
            }
            for (doc_id, score) in scores {
                *combined_scores.entry(doc_id).or_insert(0.0) += score;
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
        Ok(self
            .identity
            .get(&(identity_property.to_string(), id_value.to_string()))
            .cloned())
    }

    fn get_record(&self, doc_id: &str) -> Result<Option<Record>, EntityLinkError> {
        Ok(self.docs.get(doc_id).map(|doc| {
            let mut record = Record::new();
            for (property, values) in &doc.values {
                for value in values {
                    record.push(property, value);
                }
            }
            record
        }))
    }
}
