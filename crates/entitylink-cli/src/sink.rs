//! A [`MatchSink`] that writes one JSON object per verdict to stdout,
//! resolving the matched [`Record`]s back to the caller-supplied ids they
//! were read under.

use entitylink_core::model::Record;
use entitylink_match::MatchSink;
use serde_json::json;

use crate::records::id_of;

/// Prints `{"verdict": "match"|"maybe"|"no_match", ...}` lines to stdout.
/// Holds every batch it may need to resolve a scored [`Record`] back into
/// the id it was read under: deduplication mode searches one batch,
/// record-linkage mode searches both the probe batch and the reference
/// corpus.
pub struct PrintingSink<'a> {
    sources: Vec<&'a [(String, Record)]>,
}

impl<'a> PrintingSink<'a> {
    #[must_use]
    pub fn new(sources: Vec<&'a [(String, Record)]>) -> Self {
        Self { sources }
    }

    fn id_of(&self, record: &Record) -> String {
        self.sources
            .iter()
            .find_map(|batch| id_of(batch, record))
            .unwrap_or("<unknown>")
            .to_string()
    }
}

impl MatchSink for PrintingSink<'_> {
    fn on_match(&mut self, r1: &Record, r2: &Record, probability: f64) {
        println!(
            "{}",
            json!({
                "verdict": "match",
                "a": self.id_of(r1),
                "b": self.id_of(r2),
                "probability": probability,
            })
        );
    }

    fn on_maybe(&mut self, r1: &Record, r2: &Record, probability: f64) {
        println!(
            "{}",
            json!({
                "verdict": "maybe",
                "a": self.id_of(r1),
                "b": self.id_of(r2),
                "probability": probability,
            })
        );
    }

    fn on_no_match(&mut self, r: &Record) {
        println!(
            "{}",
            json!({
                "verdict": "no_match",
                "a": self.id_of(r),
            })
        );
    }
}
