//! Error types for named caches.
//!
//! - [`ConfigError`]: the definitions handed to the manager are unusable
//!   (missing or duplicate names, broken invariants, cycles, bad input).
//! - [`BuildError`]: a resolved definition could not be turned into an engine.
//! - [`CacheError`]: everything a caller of the manager or a cache can see.

use thiserror::Error;

/// A broken definition invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("caches cannot have both a maximum size and maximum weight >= 0")]
    SizeAndWeight,

    #[error("caches cannot have both soft and weak reference values at the same time")]
    SoftAndWeakValues,

    #[error("caches cannot have a maximum weight without a weigher")]
    WeightWithoutWeigher,
}

/// Fatal configuration problems, reported during initialization.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("all cache definitions must have names set")]
    MissingName,

    /// Each entry is rendered as `name [xN]`.
    #[error("found duplicate cache definition names: {0}")]
    DuplicateNames(String),

    #[error("invalid definition for cache '{name}': {reason}")]
    Invalid { name: String, reason: Violation },

    #[error("cannot resolve cache definitions, base chain never terminates for: {}", names.join(", "))]
    Cycle { names: Vec<String> },

    #[error("malformed cache settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("environment variable {var} has an invalid value: {value:?}")]
    Env { var: &'static str, value: String },
}

/// The engine rejected a resolved definition.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("weigher '{weigher}' is not registered")]
    WeigherNotFound { weigher: String },

    #[error("component '{weigher}' must implement {expected}, found {found}")]
    NotAWeigher {
        weigher: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("weigher '{weigher}' requires a maximum weight")]
    WeigherWithoutMaximumWeight { weigher: String },

    #[error("{0} is not supported by the cache engine")]
    Unsupported(&'static str),
}

/// Errors surfaced by the manager and by individual caches.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("could not create cache '{name}'")]
    Build {
        name: String,
        #[source]
        source: BuildError,
    },

    #[error("cached value in '{cache}' is not of required type {expected}")]
    TypeMismatch {
        cache: String,
        expected: &'static str,
    },
}
