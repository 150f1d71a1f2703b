//! The Record & Property data model (component C4).
//!
//! A [`Record`] is an unordered bag of named, multi-valued string fields.
//! Identity is never structural — only the values of properties tagged
//! [`PropertyRole::Identity`] identify a record instance (see
//! [`Record::shares_identity_with`]).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// A semi-structured record: `fieldName -> set of non-empty strings`.
///
/// Empty strings are semantically absent and are filtered out on insert, so
/// a field that only ever received empty values simply never appears.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: BTreeMap<String, BTreeSet<String>>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value to a field, dropping it silently if it is empty.
    pub fn push(&mut self, field: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        if value.is_empty() {
            return self;
        }
        self.fields.entry(field.into()).or_default().insert(value);
        self
    }

    /// All non-empty values recorded for `field`, in sorted order.
    #[must_use]
    pub fn values(&self, field: &str) -> impl Iterator<Item = &str> {
        self.fields
            .get(field)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Whether `field` has at least one non-empty value.
    #[must_use]
    pub fn has_value(&self, field: &str) -> bool {
        self.fields.get(field).is_some_and(|set| !set.is_empty())
    }

    /// Whether `field` holds exactly `value` among its values.
    #[must_use]
    pub fn has(&self, field: &str, value: &str) -> bool {
        self.fields.get(field).is_some_and(|set| set.contains(value))
    }

    /// The names of fields present on this record.
    #[must_use]
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Identity check (§4.8): two records are "the same" if they share at
    /// least one value on at least one identity property.
    #[must_use]
    pub fn shares_identity_with(&self, other: &Record, identity_properties: &[Property]) -> bool {
        identity_properties.iter().any(|p| {
            let Some(mine) = self.fields.get(&p.name) else {
                return false;
            };
            let Some(theirs) = other.fields.get(&p.name) else {
                return false;
            };
            mine.intersection(theirs).next().is_some()
        })
    }
}

// ---------------------------------------------------------------------------
// Property
// ---------------------------------------------------------------------------

/// Role a property plays in the configuration. Non-exclusive in practice:
/// a `Lookup` property also participates in scoring unless it is pure
/// `Identity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyRole {
    Identity,
    Lookup,
    Compare,
}

/// Whether a lookup property's tokens join the compound candidate query
/// conjunctively (`Required`) or disjunctively (`Optional`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupBehaviour {
    Required,
    Optional,
}

/// A reference to a registered comparator, resolved against the registry in
/// `entitylink-strings`. Kept as a tagged reference (rather than an `impl
/// Comparator`) here so the data model has no dependency on the comparator
/// crate: a small closed set of built-ins, plus an open door for
/// user-supplied ones by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "name")]
pub enum ComparatorRef {
    /// Exact string equality, scored 1.0 or 0.0.
    ExactMatch,
    /// Weighted Levenshtein (§4.1/§4.2).
    WeightedLevenshtein,
    /// Unit-cost Levenshtein normalized to `[0,1]` (no early termination —
    /// that variant is an internal rejection test, not a public
    /// comparator).
    UnitLevenshtein,
    /// A caller-supplied comparator, looked up by name at registry
    /// construction time.
    Custom(String),
}

/// A property descriptor (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub role: PropertyRole,
    #[serde(default = "default_lookup_behaviour")]
    pub lookup_behaviour: LookupBehaviour,
    pub comparator: ComparatorRef,
    /// Raw score 1.0 remaps to this probability.
    #[serde(default = "default_high_probability")]
    pub high_probability: f64,
    /// Raw score 0.0 remaps to this probability.
    #[serde(default = "default_low_probability")]
    pub low_probability: f64,
}

const fn default_lookup_behaviour() -> LookupBehaviour {
    LookupBehaviour::Optional
}

const fn default_high_probability() -> f64 {
    0.99
}

const fn default_low_probability() -> f64 {
    0.1
}

impl Property {
    /// Linearly remap a raw comparator score in `[0,1]` onto
    /// `[low_probability, high_probability]`.
    #[must_use]
    pub fn remap(&self, raw_score: f64) -> f64 {
        self.low_probability + raw_score * (self.high_probability - self.low_probability)
    }

    #[must_use]
    pub fn is_lookup(&self) -> bool {
        matches!(self.role, PropertyRole::Lookup)
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        matches!(self.role, PropertyRole::Identity)
    }

    /// Whether this property participates in Bayesian scoring: any role
    /// other than pure identity.
    #[must_use]
    pub fn participates_in_scoring(&self) -> bool {
        !self.is_identity()
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// An ordered set of properties plus classification thresholds and
/// retrieval-tuning options (§3, §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub properties: Vec<Property>,
    pub threshold: f64,
    pub maybe_threshold: f64,
    /// Filesystem path for an on-disk index; absent means an in-memory
    /// index is used.
    #[serde(default)]
    pub path: Option<std::path::PathBuf>,
    /// Hard ceiling on retrieval depth per query.
    #[serde(default = "default_max_search_hits")]
    pub max_search_hits: usize,
    /// Drop index hits whose native score falls below this.
    #[serde(default)]
    pub min_relevance: f64,
    /// `QueryResultTracker`'s ring-buffer expansion multiplier (§4.5).
    #[serde(default = "default_expansion_factor")]
    pub expansion_factor: f64,
}

const fn default_max_search_hits() -> usize {
    10_000
}

const fn default_expansion_factor() -> f64 {
    1.0
}

impl Configuration {
    /// Validate the threshold ordering invariant and property-name
    /// uniqueness, per §3 and §7.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.5..=1.0).contains(&self.threshold) || !(0.5..=1.0).contains(&self.maybe_threshold) {
            return Err(ConfigError::InvalidThresholds {
                threshold: self.threshold,
                maybe_threshold: self.maybe_threshold,
                reason: "both thresholds must lie in (0.5, 1]".into(),
            });
        }
        if self.threshold < self.maybe_threshold {
            return Err(ConfigError::InvalidThresholds {
                threshold: self.threshold,
                maybe_threshold: self.maybe_threshold,
                reason: "threshold must be >= maybe_threshold".into(),
            });
        }

        let mut seen = BTreeSet::new();
        for p in &self.properties {
            if !seen.insert(p.name.as_str()) {
                return Err(ConfigError::DuplicateProperty {
                    name: p.name.clone(),
                });
            }
        }

        if self.max_search_hits == 0 {
            return Err(ConfigError::InvalidThresholds {
                threshold: self.threshold,
                maybe_threshold: self.maybe_threshold,
                reason: "max_search_hits must be at least 1".into(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    #[must_use]
    pub fn identity_properties(&self) -> Vec<&Property> {
        self.properties.iter().filter(|p| p.is_identity()).collect()
    }

    #[must_use]
    pub fn lookup_properties(&self) -> Vec<&Property> {
        self.properties.iter().filter(|p| p.is_lookup()).collect()
    }

    /// Look up a property by name, returning `ConfigError::UndeclaredProperty`
    /// if it is not part of this configuration. Used to validate records
    /// against the configuration before indexing or scoring.
    pub fn require_property(&self, name: &str) -> Result<&Property, ConfigError> {
        self.property(name)
            .ok_or_else(|| ConfigError::UndeclaredProperty { name: name.into() })
    }
}
