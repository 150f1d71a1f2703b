#![forbid(unsafe_code)]
//! The matching engine (component C7) and the Bayesian combiner
//! (component C9): deduplication and record-linkage over records drawn
//! from an [`entitylink_index::InvertedIndex`], with confirmed matches
//! folded into an [`entitylink_classes::EquivalenceClassStore`].

pub mod combiner;
pub mod engine;
pub mod sink;

pub use combiner::combine;
pub use engine::MatchingEngine;
pub use sink::{CollectingSink, MatchSink};
