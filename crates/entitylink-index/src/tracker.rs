//! The adaptive retrieval-limit estimator (component C6, §4.5).
//!
//! A self-tuning admission control for index retrieval depth: rather than
//! fixing a result-count cap up front, the tracker watches how many hits
//! recent queries actually produced (after relevance filtering) and grows
//! the limit it requests toward that observed demand.

use entitylink_core::error::BackingStoreError;
use tracing::debug;

use crate::Hit;

const INITIAL_LIMIT: usize = 100;
const EXPANSION_MULTIPLIER: usize = 5;
const RING_LEN: usize = 10;

/// Owned per-matcher helper maintaining the retrieval limit passed to the
/// underlying search (§4.5). Not thread-safe; confine to a single matcher.
#[derive(Debug)]
pub struct QueryResultTracker {
    current_limit: usize,
    max_search_hits: usize,
    min_relevance: f64,
    expansion_factor: f64,
    ring: Vec<usize>,
    write_pos: usize,
    pushes: u64,
}

impl QueryResultTracker {
    /// A tracker with `expansionFactor` defaulted to 1.0.
    #[must_use]
    pub fn new(max_search_hits: usize, min_relevance: f64) -> Self {
        Self::with_expansion_factor(max_search_hits, min_relevance, 1.0)
    }

    #[must_use]
    pub fn with_expansion_factor(max_search_hits: usize, min_relevance: f64, expansion_factor: f64) -> Self {
        let max_search_hits = max_search_hits.max(1);
        Self {
            current_limit: INITIAL_LIMIT.min(max_search_hits),
            max_search_hits,
            min_relevance,
            expansion_factor: expansion_factor.max(1.0),
            ring: Vec::with_capacity(RING_LEN),
            write_pos: 0,
            pushes: 0,
        }
    }

    #[must_use]
    pub fn current_limit(&self) -> usize {
        self.current_limit
    }

    /// Run one logical lookup through the tracker's admission-control loop
    /// (§4.5 steps 1-5): `query` is invoked with a retrieval limit, retried
    /// with an expanded limit if it saturated, then the results are
    /// relevance-filtered and the post-filter count fed back into the ring
    /// buffer.
    pub fn run(
        &mut self,
        mut query: impl FnMut(usize) -> Result<Vec<Hit>, BackingStoreError>,
    ) -> Result<Vec<Hit>, BackingStoreError> {
        let mut limit = self.current_limit.min(self.max_search_hits);
        loop {
            let hits = query(limit)?;
            let saturated = hits.len() == limit && limit < self.max_search_hits;
            if saturated {
                let expanded = limit.saturating_mul(EXPANSION_MULTIPLIER).min(self.max_search_hits);
                if expanded > limit {
                    self.current_limit = expanded;
                    limit = expanded;
                    continue;
                }
            }
            let filtered: Vec<Hit> = hits.into_iter().filter(|h| h.score >= self.min_relevance).collect();
            self.record(filtered.len());
            return Ok(filtered);
        }
    }

    /// Feed one query's post-filter hit count into the ring buffer,
    /// expanding `currentLimit` each time the buffer wraps (§4.5 step 5).
    fn record(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        if self.ring.len() < RING_LEN {
            self.ring.push(count);
        } else {
            self.ring[self.write_pos] = count;
        }
        self.write_pos = (self.write_pos + 1) % RING_LEN;
        self.pushes += 1;

        if self.pushes % RING_LEN as u64 == 0 {
            #[allow(clippy::cast_precision_loss)]
            let mean = self.ring.iter().sum::<usize>() as f64 / self.ring.len() as f64;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let expanded = (mean * self.expansion_factor).round() as usize;
            let next = self.current_limit.max(expanded).min(self.max_search_hits);
            if next != self.current_limit {
                debug!(from = self.current_limit, to = next, mean, "expanding retrieval limit");
            }
            self.current_limit = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hits(n: usize, score: f64) -> Vec<Hit> {
        (0..n)
            .map(|i| Hit {
                doc_id: i.to_string(),
                score,
            })
            .collect()
    }

    #[test]
    fn starts_at_the_initial_limit_capped_by_max_search_hits() {
        let tracker = QueryResultTracker::new(50, 0.0);
        assert_eq!(tracker.current_limit(), 50);
        let tracker = QueryResultTracker::new(1000, 0.0);
        assert_eq!(tracker.current_limit(), 100);
    }

    #[test]
    fn expands_on_a_saturated_query_up_to_the_ceiling() {
        let mut tracker = QueryResultTracker::new(1000, 0.0);
        let mut calls = Vec::new();
        let result = tracker
            .run(|limit| {
                calls.push(limit);
                if limit == 100 {
                    Ok(hits(100, 1.0))
                } else {
                    Ok(hits(37, 1.0))
                }
            })
            .unwrap();
        assert_eq!(calls, vec![100, 500]);
        assert_eq!(result.len(), 37);
    }

    #[test]
    fn filters_hits_below_min_relevance() {
        let mut tracker = QueryResultTracker::new(1000, 0.5);
        let result = tracker
            .run(|_| {
                Ok(vec![
                    Hit { doc_id: "a".into(), score: 0.9 },
                    Hit { doc_id: "b".into(), score: 0.1 },
                ])
            })
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].doc_id, "a");
    }

    #[test]
    fn ring_buffer_wrap_expands_current_limit_to_the_observed_mean() {
        let mut tracker = QueryResultTracker::new(1000, 0.0);
        for _ in 0..10 {
            tracker.run(|_| Ok(hits(200, 1.0))).unwrap();
        }
        assert!(tracker.current_limit() >= 200);
    }

    #[test]
    fn zero_hit_queries_do_not_pollute_the_ring() {
        let mut tracker = QueryResultTracker::new(1000, 0.0);
        for _ in 0..20 {
            tracker.run(|_| Ok(Vec::new())).unwrap();
        }
        assert_eq!(tracker.current_limit(), 100);
    }
}
