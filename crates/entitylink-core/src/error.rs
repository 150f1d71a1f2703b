//! Error types for entitylink.
//!
//! Every error explains what went wrong, why, and (where there's a sensible
//! fix) how to recover. Errors are grouped into the four kinds named by the
//! spec's error-handling design and carry stable machine-readable codes.
//!
//! # Error Code Ranges
//!
//! | Range | Category           |
//! |-------|--------------------|
//! | E1xxx | Configuration      |
//! | E2xxx | Comparator         |
//! | E5xxx | Backing store I/O  |
//! | E6xxx | Corrupt index      |

use std::path::PathBuf;

/// Top-level error type for all entitylink operations.
///
/// Every variant delegates to a category-specific error enum that carries
/// contextual details. None of these are retried or swallowed internally —
/// the core surfaces them verbatim to the caller.
#[derive(Debug, thiserror::Error)]
pub enum EntityLinkError {
    /// A record references an undeclared property, or a threshold is out of
    /// range.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A comparator produced a value outside `[0,1]` or failed while
    /// comparing two values.
    #[error(transparent)]
    Comparator(#[from] ComparatorError),

    /// I/O against the inverted index or equivalence-class store failed.
    #[error(transparent)]
    BackingStore(#[from] BackingStoreError),

    /// The backing index reported an internal inconsistency.
    #[error(transparent)]
    CorruptIndex(#[from] CorruptIndexError),
}

impl EntityLinkError {
    /// Machine-readable error code (e.g. `"E1003"`).
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(e) => e.error_code(),
            Self::Comparator(e) => e.error_code(),
            Self::BackingStore(e) => e.error_code(),
            Self::CorruptIndex(e) => e.error_code(),
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Configuration loading and validation failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be parsed as TOML.
    #[error(
        "Error: Failed to parse configuration at {path}\nCause: {reason}\nFix: Check the TOML syntax of the properties and thresholds."
    )]
    ParseFailed {
        /// Path to the config file, or `"<inline>"` for in-memory config.
        path: String,
        /// Parse error description.
        reason: String,
    },

    /// A record referenced a property name that is not declared in the
    /// configuration.
    #[error(
        "Error: Undeclared property '{name}'\nCause: The property is not part of the loaded configuration\nFix: Add a [[properties]] entry named '{name}', or remove it from the record."
    )]
    UndeclaredProperty {
        /// The offending property name.
        name: String,
    },

    /// A threshold is outside the valid `(0.5, 1]` range, or
    /// `threshold < maybeThreshold`.
    #[error(
        "Error: Invalid threshold configuration (threshold={threshold}, maybe_threshold={maybe_threshold})\nCause: {reason}\nFix: Both thresholds must lie in (0.5, 1] and threshold must be >= maybe_threshold."
    )]
    InvalidThresholds {
        /// The configured match threshold.
        threshold: f64,
        /// The configured maybe threshold.
        maybe_threshold: f64,
        /// Why the pair is invalid.
        reason: String,
    },

    /// Two properties in the same configuration share a name.
    #[error(
        "Error: Duplicate property name '{name}'\nCause: Property names must be unique within a configuration\nFix: Rename one of the conflicting [[properties]] entries."
    )]
    DuplicateProperty {
        /// The duplicated name.
        name: String,
    },
}

impl ConfigError {
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ParseFailed { .. } => "E1001",
            Self::UndeclaredProperty { .. } => "E1002",
            Self::InvalidThresholds { .. } => "E1003",
            Self::DuplicateProperty { .. } => "E1004",
        }
    }
}

// ---------------------------------------------------------------------------
// ComparatorError
// ---------------------------------------------------------------------------

/// A comparator violated its contract.
#[derive(Debug, thiserror::Error)]
pub enum ComparatorError {
    /// A comparator returned a value outside `[0,1]`.
    #[error(
        "Error: Comparator '{comparator}' returned out-of-range score {score} for ({a:?}, {b:?})\nCause: Comparator implementations must return a value in [0,1]\nFix: This is a programming error in the comparator, not recoverable at this call site."
    )]
    OutOfRange {
        /// Name of the offending comparator.
        comparator: String,
        /// The out-of-range value produced.
        score: f64,
        /// First offending value (diagnostic).
        a: String,
        /// Second offending value (diagnostic).
        b: String,
    },

    /// A comparator panicked or otherwise failed while comparing two
    /// values.
    #[error(
        "Error: Comparator '{comparator}' failed comparing ({a:?}, {b:?})\nCause: {reason}\nFix: Inspect the comparator implementation; this is fatal to the current operation."
    )]
    Failed {
        /// Name of the offending comparator.
        comparator: String,
        /// First offending value (diagnostic).
        a: String,
        /// Second offending value (diagnostic).
        b: String,
        /// Description of the failure.
        reason: String,
    },
}

impl ComparatorError {
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::OutOfRange { .. } => "E2001",
            Self::Failed { .. } => "E2002",
        }
    }
}

// ---------------------------------------------------------------------------
// BackingStoreError
// ---------------------------------------------------------------------------

/// I/O failures against the inverted index or the equivalence-class store.
#[derive(Debug, thiserror::Error)]
pub enum BackingStoreError {
    /// The on-disk index or class-store path could not be opened.
    #[error(
        "Error: Failed to open backing store at {path}\nCause: {reason}\nFix: Check that the path is writable and not locked by another process."
    )]
    OpenFailed {
        /// Path that failed to open.
        path: PathBuf,
        /// Underlying cause.
        reason: String,
    },

    /// A read or write against the backing store failed.
    #[error("Error: Backing store operation '{operation}' failed\nCause: {reason}")]
    OperationFailed {
        /// Name of the operation that failed (e.g. `"index"`, `"commit"`,
        /// `"lookup"`, `"add_link"`).
        operation: String,
        /// Underlying cause, preserved verbatim.
        reason: String,
    },
}

impl BackingStoreError {
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::OpenFailed { .. } => "E5001",
            Self::OperationFailed { .. } => "E5002",
        }
    }
}

// ---------------------------------------------------------------------------
// CorruptIndexError
// ---------------------------------------------------------------------------

/// The backing index reported an internal inconsistency.
#[derive(Debug, thiserror::Error)]
#[error(
    "Error: Corrupt index ({context})\nCause: {reason}\nFix: No automatic recovery; rebuild the index from source records."
)]
pub struct CorruptIndexError {
    /// Where the inconsistency was detected (e.g. `"commit"`, `"lookup"`).
    pub context: String,
    /// Description of the inconsistency.
    pub reason: String,
}

impl CorruptIndexError {
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        "E6001"
    }
}
