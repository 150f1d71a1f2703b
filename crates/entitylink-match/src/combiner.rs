//! The Bayesian combiner (component C9, §4.7): folds per-property
//! comparator scores into a single match probability via the odds form of
//! Bayes' rule.

use entitylink_core::error::EntityLinkError;
use entitylink_core::model::{Configuration, Record};
use entitylink_strings::ComparatorRegistry;

const PRIOR: f64 = 0.5;

/// Combined match probability between `r1` and `r2` under `config`,
/// starting from a flat `0.5` prior and folding in one update per scoring
/// property (every non-identity property with a non-empty value on both
/// sides).
///
/// Update order does not affect the result: the odds-form update is
/// associative-commutative, so properties may be folded in any order.
pub fn combine(config: &Configuration, registry: &ComparatorRegistry, r1: &Record, r2: &Record) -> Result<f64, EntityLinkError> {
    let mut p = PRIOR;
    for property in &config.properties {
        if !property.participates_in_scoring() {
            continue;
        }
        let Some(raw) = best_raw_score(registry, property, r1, r2)? else {
            continue;
        };
        let s = property.remap(raw).clamp(0.0, 1.0);
        p = update(p, s);
    }
    Ok(p)
}

/// The best-of-pairs raw comparator score (§4.7) for one property across
/// every `(v1, v2)` combination of its values on `r1` and `r2`. `None` if
/// either side has no value for the property.
pub(crate) fn best_raw_score(
    registry: &ComparatorRegistry,
    property: &entitylink_core::model::Property,
    r1: &Record,
    r2: &Record,
) -> Result<Option<f64>, EntityLinkError> {
    let mut best: Option<f64> = None;
    for a in r1.values(&property.name) {
        for b in r2.values(&property.name) {
            let raw = registry.compare(&property.comparator, a, b)?;
            best = Some(best.map_or(raw, |current: f64| current.max(raw)));
        }
    }
    Ok(best)
}

/// One step of the odds-form Bayes update: `p <- (p*s) / (p*s + (1-p)*(1-s))`.
///
/// `s == 0.5` leaves `p` unchanged (no evidence either way). `s == 0` or
/// `s == 1` saturate `p` to `0` or `1` directly rather than running the
/// general formula, which would otherwise divide by zero once `p` has
/// already saturated from an earlier update.
fn update(p: f64, s: f64) -> f64 {
    if (s - 0.5).abs() < f64::EPSILON {
        return p;
    }
    if s <= 0.0 {
        return 0.0;
    }
    if s >= 1.0 {
        return 1.0;
    }
    (p * s) / (p * s + (1.0 - p) * (1.0 - s))
}
