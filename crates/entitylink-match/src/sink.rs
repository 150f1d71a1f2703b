//! The match sink (§6): the three-callback output contract the matching
//! engine drives a batch through.

use entitylink_core::model::Record;

/// Receives classification verdicts as the matching engine produces them.
///
/// `on_match`/`on_maybe` report a scored pair; `on_no_match` reports a
/// record for which no candidate cleared `maybe_threshold` (including the
/// case where candidate generation produced no candidates at all).
/// Probabilities passed to `on_match`/`on_maybe` lie in `(0.5, 1]`.
pub trait MatchSink {
    fn on_match(&mut self, r1: &Record, r2: &Record, probability: f64);
    fn on_maybe(&mut self, r1: &Record, r2: &Record, probability: f64);
    fn on_no_match(&mut self, r: &Record);
}

/// A [`MatchSink`] that simply records every verdict it receives, for tests
/// and small embeddings that don't need a custom sink.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub matches: Vec<(Record, Record, f64)>,
    pub maybes: Vec<(Record, Record, f64)>,
    pub no_matches: Vec<Record>,
}

impl MatchSink for CollectingSink {
    fn on_match(&mut self, r1: &Record, r2: &Record, probability: f64) {
        self.matches.push((r1.clone(), r2.clone(), probability));
    }

    fn on_maybe(&mut self, r1: &Record, r2: &Record, probability: f64) {
        self.maybes.push((r1.clone(), r2.clone(), probability));
    }

    fn on_no_match(&mut self, r: &Record) {
        self.no_matches.push(r.clone());
    }
}
