//! The matching engine (component C7): deduplication mode (§4.6) and
//! record-linkage mode (§4.9).

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, instrument};

use entitylink_core::error::EntityLinkError;
use entitylink_core::model::{Configuration, Property, Record};
use entitylink_classes::EquivalenceClassStore;
use entitylink_index::{InvertedIndex, QueryResultTracker};
use entitylink_strings::ComparatorRegistry;

use crate::combiner::{best_raw_score, combine};
use crate::sink::MatchSink;

/// A per-property "useful candidate" streak beyond which the index is
/// assumed to have stopped returning relevant hits (§4.6.2a). Hard-coded
/// per the source behavior; the original notes this as needing to become
/// configurable.
const MISSED_HIT_CUTOFF: usize = 10;

/// Classification of a combined probability against a configuration's
/// thresholds (§4.6.c).
#[derive(Debug, Clone, Copy, PartialEq)]
enum Verdict {
    Match,
    Maybe,
    NoMatch,
}

fn classify(config: &Configuration, probability: f64) -> Verdict {
    if probability > config.threshold {
        Verdict::Match
    } else if probability > config.maybe_threshold {
        Verdict::Maybe
    } else {
        Verdict::NoMatch
    }
}

/// Owns the comparator registry and configuration for one matching run.
/// Indexes, trackers, and class stores are passed in explicitly by the
/// caller rather than held as fields: `InvertedIndex::lookup_field` and
/// friends take `&self`, so a `&mut dyn InvertedIndex` parameter can still
/// be reborrowed immutably from inside a tracker closure without an
/// aliasing conflict — holding it as a field behind a second mutable
/// borrow would not.
pub struct MatchingEngine<'a> {
    config: &'a Configuration,
    registry: &'a ComparatorRegistry,
}

impl<'a> MatchingEngine<'a> {
    #[must_use]
    pub fn new(config: &'a Configuration, registry: &'a ComparatorRegistry) -> Self {
        Self { config, registry }
    }

    fn identity_properties(&self) -> Vec<Property> {
        self.config.properties.iter().filter(|p| p.is_identity()).cloned().collect()
    }

    /// Whether `candidate` is known-same as `record` via §4.8's identity
    /// check. Known-same pairs are excluded from probabilistic scoring
    /// entirely: identity-property equality already determines the
    /// verdict, so there's nothing left for the Bayesian combiner to
    /// decide.
    fn is_known_same(&self, record: &Record, candidate: &Record) -> bool {
        let identity_properties = self.identity_properties();
        record.shares_identity_with(candidate, &identity_properties)
    }

    /// Deduplication mode (§4.6): index the whole batch, commit once, then
    /// score every record against candidates drawn from the now-fully-visible
    /// index (including itself and its batch-mates).
    ///
    /// # Errors
    /// Returns an error if indexing, a lookup, or a comparator fails.
    #[instrument(skip_all, fields(batch_size = records.len()))]
    pub fn run_deduplication(
        &self,
        index: &mut dyn InvertedIndex,
        tracker: &mut QueryResultTracker,
        classes: &mut dyn EquivalenceClassStore,
        records: &[(String, Record)],
        sink: &mut dyn MatchSink,
    ) -> Result<(), EntityLinkError> {
        for (doc_id, record) in records {
            index.index(doc_id, record, self.config)?;
        }
        index.commit()?;
        debug!(batch_size = records.len(), "batch committed, scoring begins");

        for (doc_id, record) in records {
            let candidates = self.generate_candidates_dedup(index, tracker, doc_id, record)?;
            self.score_and_classify_dedup(index, classes, doc_id, record, &candidates, sink)?;
        }
        Ok(())
    }

    /// Record-linkage mode (§4.9): score a probe against an already-indexed
    /// reference corpus, with no self-insertion and at most one verdict
    /// emitted.
    ///
    /// # Errors
    /// Returns an error if a lookup or a comparator fails.
    #[instrument(skip_all, fields(probe_id = probe_id))]
    pub fn run_linkage(
        &self,
        index: &dyn InvertedIndex,
        tracker: &mut QueryResultTracker,
        classes: &mut dyn EquivalenceClassStore,
        probe_id: &str,
        probe: &Record,
        sink: &mut dyn MatchSink,
    ) -> Result<(), EntityLinkError> {
        let candidates = self.generate_candidates_linkage(index, tracker, probe)?;

        let mut best: Option<(String, Record, f64)> = None;
        for candidate_id in candidates {
            let Some(candidate_record) = index.get_record(&candidate_id)? else {
                continue;
            };
            if self.is_known_same(probe, &candidate_record) {
                continue;
            }
            let probability = combine(self.config, self.registry, probe, &candidate_record)?;
            if best.as_ref().is_none_or(|(_, _, p)| probability > *p) {
                best = Some((candidate_id, candidate_record, probability));
            }
        }

        match best {
            Some((candidate_id, candidate_record, probability)) => {
                match classify(self.config, probability) {
                    Verdict::Match => {
                        debug!(probe_id, %candidate_id, probability, "linkage match, linking classes");
                        sink.on_match(probe, &candidate_record, probability);
                        classes.add_link(probe_id, &candidate_id)?;
                    }
                    Verdict::Maybe => sink.on_maybe(probe, &candidate_record, probability),
                    Verdict::NoMatch => sink.on_no_match(probe),
                }
            }
            None => sink.on_no_match(probe),
        }
        Ok(())
    }

    /// Per-property candidate gathering shared by both modes: one
    /// `lookup_field` query per value the record holds for the property,
    /// merged by doc id keeping each id's best score, ordered by
    /// descending score.
    fn ordered_hits_for_property(
        &self,
        index: &dyn InvertedIndex,
        tracker: &mut QueryResultTracker,
        property: &Property,
        record: &Record,
    ) -> Result<Vec<String>, EntityLinkError> {
        let mut merged: BTreeMap<String, f64> = BTreeMap::new();
        for value in record.values(&property.name) {
            let hits = tracker.run(|limit| index.lookup_field(&property.name, value, limit))?;
            for hit in hits {
                merged
                    .entry(hit.doc_id)
                    .and_modify(|score| *score = score.max(hit.score))
                    .or_insert(hit.score);
            }
        }
        let mut ordered: Vec<(String, f64)> = merged.into_iter().collect();
        ordered.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        Ok(ordered.into_iter().map(|(doc_id, _)| doc_id).collect())
    }

    /// Candidate generation for deduplication mode (§4.6.2a): the "10
    /// missed hits" cutoff. `useful` is checked and the streak is reset
    /// before the break test, so a hit that clears the bar on the same
    /// iteration it is observed resets the streak immediately rather than
    /// one iteration late.
    fn generate_candidates_dedup(
        &self,
        index: &mut dyn InvertedIndex,
        tracker: &mut QueryResultTracker,
        self_id: &str,
        record: &Record,
    ) -> Result<BTreeSet<String>, EntityLinkError> {
        let mut accumulated: BTreeSet<String> = BTreeSet::new();
        for property in self.config.lookup_properties() {
            let ordered = self.ordered_hits_for_property(index, tracker, property, record)?;
            let mut ix = 0usize;
            let mut lastmatch = 0usize;
            for doc_id in ordered {
                if doc_id == self_id {
                    continue;
                }
                ix += 1;

                let useful = if accumulated.contains(&doc_id) {
                    true
                } else {
                    match index.get_record(&doc_id)? {
                        Some(candidate_record) => {
                            best_raw_score(self.registry, property, record, &candidate_record)?
                                .is_some_and(|score| score > 0.5)
                        }
                        None => false,
                    }
                };

                if useful {
                    lastmatch = ix;
                    accumulated.insert(doc_id);
                }
                if ix - lastmatch > MISSED_HIT_CUTOFF {
                    break;
                }
            }
        }
        Ok(accumulated)
    }

    /// Candidate generation for record-linkage mode (§4.9): the plain union
    /// of every lookup property's hits, with no early-termination
    /// heuristic.
    fn generate_candidates_linkage(
        &self,
        index: &dyn InvertedIndex,
        tracker: &mut QueryResultTracker,
        record: &Record,
    ) -> Result<BTreeSet<String>, EntityLinkError> {
        let mut accumulated = BTreeSet::new();
        for property in self.config.lookup_properties() {
            let ordered = self.ordered_hits_for_property(index, tracker, property, record)?;
            accumulated.extend(ordered);
        }
        Ok(accumulated)
    }

    fn score_and_classify_dedup(
        &self,
        index: &mut dyn InvertedIndex,
        classes: &mut dyn EquivalenceClassStore,
        self_id: &str,
        record: &Record,
        candidates: &BTreeSet<String>,
        sink: &mut dyn MatchSink,
    ) -> Result<(), EntityLinkError> {
        let mut reported_any = false;
        for candidate_id in candidates {
            if candidate_id == self_id {
                continue;
            }
            let Some(candidate_record) = index.get_record(candidate_id)? else {
                continue;
            };
            if self.is_known_same(record, &candidate_record) {
                continue;
            }

            let probability = combine(self.config, self.registry, record, &candidate_record)?;
            match classify(self.config, probability) {
                Verdict::Match => {
                    debug!(self_id, %candidate_id, probability, "dedup match, linking classes");
                    sink.on_match(record, &candidate_record, probability);
                    classes.add_link(self_id, candidate_id)?;
                    reported_any = true;
                }
                Verdict::Maybe => {
                    sink.on_maybe(record, &candidate_record, probability);
                    reported_any = true;
                }
                Verdict::NoMatch => {}
            }
        }
        if !reported_any {
            sink.on_no_match(record);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entitylink_classes::MemoryClassStore;
    use entitylink_core::model::{ComparatorRef, LookupBehaviour, PropertyRole};
    use entitylink_index::memory::MemoryIndex;
    use entitylink_index::InvertedIndex as _;

    use crate::sink::CollectingSink;

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
                    high_probability: 0.95,
                    low_probability: 0.1,
                },
            ],
            threshold: 0.85,
            maybe_threshold: 0.7,
            path: None,
            max_search_hits: 10_000,
            min_relevance: 0.0,
            expansion_factor: 1.0,
        }
    }

    fn record(ssn: Option<&str>, name: &str) -> Record {
        let mut r = Record::new();
        if let Some(ssn) = ssn {
            r.push("ssn", ssn);
        }
        r.push("name", name);
        r
    }

    #[test]
    fn deduplication_matches_near_duplicates_and_suppresses_identity_pairs() {
        let config = config();
        let registry = ComparatorRegistry::new();
        let engine = MatchingEngine::new(&config, &registry);

        let mut index = MemoryIndex::new();
        let mut tracker = QueryResultTracker::new(config.max_search_hits, config.min_relevance);
        let mut classes = MemoryClassStore::new();
        let mut sink = CollectingSink::default();

        let records = vec![
            ("r1".to_string(), record(Some("111-11-1111"), "John Smith")),
            ("r2".to_string(), record(Some("222-22-2222"), "John Smyth")),
            ("r3".to_string(), record(Some("111-11-1111"), "John Smith")),
            ("r4".to_string(), record(Some("333-33-3333"), "Completely Different")),
        ];

        engine
            .run_deduplication(&mut index, &mut tracker, &mut classes, &records, &mut sink)
            .unwrap();

        // r1 and r3 share an identity value, so they're never scored against
        // each other at all.
        assert!(!sink
            .matches
            .iter()
            .any(|(a, b, _)| (a.has("ssn", "111-11-1111") && b.has("ssn", "111-11-1111"))));

        // r1 and r2 are close enough on name to at least clear "maybe".
        let r1_vs_r2 = sink
            .matches
            .iter()
            .chain(sink.maybes.iter())
            .any(|(a, b, _)| {
                (a.has("name", "John Smith") && b.has("name", "John Smyth"))
                    || (a.has("name", "John Smyth") && b.has("name", "John Smith"))
            });
        assert!(r1_vs_r2);
    }

    #[test]
    fn linkage_mode_emits_at_most_one_verdict_per_probe() {
        let config = config();
        let registry = ComparatorRegistry::new();
        let engine = MatchingEngine::new(&config, &registry);

        let mut index = MemoryIndex::new();
        let mut tracker = QueryResultTracker::new(config.max_search_hits, config.min_relevance);
        let mut classes = MemoryClassStore::new();
        let mut sink = CollectingSink::default();

        let reference = vec![
            ("ref-1".to_string(), record(Some("555-55-5555"), "Alice Cooper")),
            ("ref-2".to_string(), record(Some("666-66-6666"), "Alice Copper")),
        ];
        for (doc_id, rec) in &reference {
            index.index(doc_id, rec, &config).unwrap();
        }
        index.commit().unwrap();

        let probe = record(None, "Alice Cooper");
        engine
            .run_linkage(&index, &mut tracker, &mut classes, "probe-1", &probe, &mut sink)
            .unwrap();

        assert_eq!(sink.matches.len() + sink.maybes.len() + sink.no_matches.len(), 1);
    }

    #[test]
    fn a_record_with_no_candidates_is_reported_as_no_match() {
        let config = config();
        let registry = ComparatorRegistry::new();
        let engine = MatchingEngine::new(&config, &registry);

        let mut index = MemoryIndex::new();
        let mut tracker = QueryResultTracker::new(config.max_search_hits, config.min_relevance);
        let mut classes = MemoryClassStore::new();
        let mut sink = CollectingSink::default();

        let records = vec![("solo".to_string(), record(Some("777-77-7777"), "Unique Name"))];
        engine
            .run_deduplication(&mut index, &mut tracker, &mut classes, &records, &mut sink)
            .unwrap();

        assert_eq!(sink.no_matches.len(), 1);
        assert!(sink.matches.is_empty());
        assert!(sink.maybes.is_empty());
    }
}
