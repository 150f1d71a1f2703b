//! The comparator registry (component C3): a polymorphic dispatch point
//! from a [`ComparatorRef`] to an actual `(string, string) -> [0,1]`
//! function, with a small closed set of built-ins and an open door for
//! user-supplied comparators registered by name.

use std::collections::BTreeMap;
use std::sync::Arc;

use entitylink_core::error::ComparatorError;
use entitylink_core::ComparatorRef;

use crate::cost_model::WeightCostModel;
use crate::kernels::{weighted_similarity, optimized_distance};

/// A string comparator: `f(a,b) -> [0,1]`, required to satisfy `f(s,s)=1`
/// and `f(a,b)=f(b,a)`.
pub trait Comparator: Send + Sync {
    /// Stable name, used in diagnostics.
    fn name(&self) -> &str;

    /// Whether this comparator expects tokenized/analyzed input.
    fn is_tokenized(&self) -> bool {
        false
    }

    /// Compare two values, returning a raw score clamped into `[0,1]`.
    ///
    /// Implementations must never return a value outside `[0,1]`; this is
    /// enforced by [`ComparatorRegistry::compare`], which wraps every
    /// dispatch and raises [`ComparatorError::OutOfRange`] on violation.
    fn compare(&self, a: &str, b: &str) -> f64;
}

/// Exact string equality, scored `1.0` or `0.0`.
#[derive(Debug, Default)]
pub struct ExactMatchComparator;

impl Comparator for ExactMatchComparator {
    fn name(&self) -> &str {
        "exact_match"
    }

    fn compare(&self, a: &str, b: &str) -> f64 {
        f64::from(u8::from(a == b))
    }
}

/// Weighted Levenshtein (§4.1/§4.2), clamped to `[0,1]` to satisfy the
/// comparator contract — the unclamped raw value is available via
/// [`crate::kernels::weighted_similarity`] for callers that need it (e.g.
/// the "known rough edge" scenario S3).
#[derive(Debug, Default)]
pub struct WeightedLevenshteinComparator;

impl Comparator for WeightedLevenshteinComparator {
    fn name(&self) -> &str {
        "weighted_levenshtein"
    }

    fn compare(&self, a: &str, b: &str) -> f64 {
        weighted_similarity(a, b, WeightCostModel).clamp(0.0, 1.0)
    }
}

/// Unit-cost Levenshtein, normalized by `max(|a|,|b|)` and clamped to
/// `[0,1]`. Distinct from [`optimized_distance`], which is an internal
/// fast-reject test, not a registered comparator.
#[derive(Debug, Default)]
pub struct UnitLevenshteinComparator;

impl Comparator for UnitLevenshteinComparator {
    fn name(&self) -> &str {
        "unit_levenshtein"
    }

    fn compare(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        let max_len = a.chars().count().max(b.chars().count());
        if max_len == 0 {
            return 1.0;
        }
        // optimized_distance is only a lower bound once it early-terminates;
        // for an exact comparator score we need the unbounded unit distance.
        let d = unit_distance_exact(a, b);
        (1.0 - d / max_len as f64).clamp(0.0, 1.0)
    }
}

fn unit_distance_exact(a: &str, b: &str) -> f64 {
    // Re-run without the early-termination cutoff so the comparator always
    // reports the true distance rather than a lower bound.
    let d = optimized_distance(a, b);
    let min_len = a.chars().count().min(b.chars().count());
    if d > min_len as f64 / 2.0 {
        // The fast path bailed out with a lower bound; fall back to the
        // full weighted kernel with unit costs to get the exact value.
        weighted_distance_unit_cost(a, b)
    } else {
        d
    }
}

fn weighted_distance_unit_cost(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let m = b.len();
    let mut row: Vec<f64> = (0..=m).map(|j| j as f64).collect();
    for (i, &ai) in a.iter().enumerate() {
        let mut diag = row[0];
        row[0] = (i + 1) as f64;
        for j in 0..m {
            let up = row[j + 1];
            let del = up + 1.0;
            let ins = row[j] + 1.0;
            let sub = if ai == b[j] { diag } else { diag + 1.0 };
            diag = up;
            row[j + 1] = del.min(ins).min(sub);
        }
    }
    row[m]
}

/// Resolves [`ComparatorRef`]s to [`Comparator`] implementations.
pub struct ComparatorRegistry {
    custom: BTreeMap<String, Arc<dyn Comparator>>,
}

impl Default for ComparatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ComparatorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            custom: BTreeMap::new(),
        }
    }

    /// Register a user-supplied comparator under a name, so
    /// `ComparatorRef::Custom(name)` resolves to it.
    pub fn register(&mut self, name: impl Into<String>, comparator: Arc<dyn Comparator>) {
        self.custom.insert(name.into(), comparator);
    }

    /// Resolve a [`ComparatorRef`] and run the comparison, enforcing the
    /// `[0,1]` contract (§4.3): out-of-range results are a programming
    /// error and surfaced as `ComparatorError::OutOfRange`.
    pub fn compare(&self, reference: &ComparatorRef, a: &str, b: &str) -> Result<f64, ComparatorError> {
        let (name, score) = match reference {
            ComparatorRef::ExactMatch => {
                ("exact_match", ExactMatchComparator.compare(a, b))
            }
            ComparatorRef::WeightedLevenshtein => (
                "weighted_levenshtein",
                WeightedLevenshteinComparator.compare(a, b),
            ),
            ComparatorRef::UnitLevenshtein => {
                ("unit_levenshtein", UnitLevenshteinComparator.compare(a, b))
            }
            ComparatorRef::Custom(name) => {
                let comparator = self.custom.get(name).ok_or_else(|| ComparatorError::Failed {
                    comparator: name.clone(),
                    a: a.into(),
                    b: b.into(),
                    reason: "no comparator registered under this name".into(),
                })?;
                (name.as_str(), comparator.compare(a, b))
            }
        };

        if !(0.0..=1.0).contains(&score) || score.is_nan() {
            return Err(ComparatorError::OutOfRange {
                comparator: name.into(),
                score,
                a: a.into(),
                b: b.into(),
            });
        }
        Ok(score)
    }
}
