//! Edit-distance kernels (component C2).
//!
//! Two DP kernels, both computed with a single one-dimensional backing
//! buffer (plus one scalar holding the running diagonal) for locality —
//! never a naive `Vec<Vec<f64>>` matrix:
//!
//! - [`weighted_distance`] / [`weighted_similarity`]: full Wagner-Fischer DP
//!   over [`WeightCostModel`] costs.
//! - [`optimized_distance`]: unit-cost DP with an early-termination
//!   "definitely too far" cutoff, used to cheaply reject distant pairs.

use crate::cost_model::WeightCostModel;

/// Weighted edit distance between `s1` and `s2` under `model`.
///
/// Operates on a single row buffer of length `|s2|+1`, updated in place;
/// the value that would sit diagonally up-left of the cell being computed
/// is kept in a scalar rather than a second row.
#[must_use]
pub fn weighted_distance(s1: &str, s2: &str, model: WeightCostModel) -> f64 {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    let m = b.len();

    let mut row = vec![0.0_f64; m + 1];
    for (j, &bj) in b.iter().enumerate() {
        row[j + 1] = row[j] + model.insert_cost(bj);
    }

    for &ai in &a {
        let mut diag = row[0];
        row[0] += model.delete_cost(ai);
        for j in 0..m {
            let bj = b[j];
            let up = row[j + 1];
            let del = up + model.delete_cost(ai);
            let ins = row[j] + model.insert_cost(bj);
            let sub = if ai == bj {
                diag
            } else {
                diag + model.substitute_cost(ai, bj)
            };
            diag = up;
            row[j + 1] = del.min(ins).min(sub);
        }
    }
    row[m]
}

/// Weighted-Levenshtein similarity: `1 - distance / min(|s1|, |s2|)`.
///
/// Shortcut: `s1 == s2` returns `1.0` without building the DP table. For
/// very different-length inputs this can yield a raw value below `0`
/// (§4.2/§4.1 of the spec) — this function does **not** clamp; callers that
/// need a comparator satisfying the `[0,1]` contract must clamp themselves
/// (see [`crate::registry`]).
#[must_use]
pub fn weighted_similarity(s1: &str, s2: &str, model: WeightCostModel) -> f64 {
    if s1 == s2 {
        return 1.0;
    }
    let min_len = s1.chars().count().min(s2.chars().count());
    if min_len == 0 {
        return 0.0;
    }
    1.0 - weighted_distance(s1, s2, model) / min_len as f64
}

/// Unit-cost edit distance with early termination.
///
/// After computing each diagonal cell `(i,i)` (only reachable while
/// `i <= |s2|`), if its value exceeds `min(|s1|,|s2|)/2` this returns that
/// cell's value immediately — a lower bound on the true distance, not an
/// exact answer. Callers that only need to know "could this possibly be
/// within 0.5 similarity" can treat any returned value above the threshold
/// as a rejection.
///
/// Known rough edge carried over from the reference behavior: the cutoff is
/// only evaluated on steps where `i == j`, so for strongly non-square
/// inputs some termination opportunities are skipped.
#[must_use]
pub fn optimized_distance(s1: &str, s2: &str) -> f64 {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    let (n, m) = (a.len(), b.len());
    let threshold = n.min(m) as f64 / 2.0;

    let mut row: Vec<f64> = (0..=m).map(|j| j as f64).collect();

    for (i, &ai) in a.iter().enumerate() {
        let mut diag = row[0];
        row[0] = (i + 1) as f64;
        for j in 0..m {
            let bj = b[j];
            let up = row[j + 1];
            let del = up + 1.0;
            let ins = row[j] + 1.0;
            let sub = if ai == bj { diag } else { diag + 1.0 };
            diag = up;
            row[j + 1] = del.min(ins).min(sub);
        }
        let i1 = i + 1;
        if i1 <= m && row[i1] > threshold {
            return row[i1];
        }
    }
    row[m]
}
