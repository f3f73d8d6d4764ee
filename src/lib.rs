//! Named caches - lookup-by-name in-memory caches configured through
//! inheritable definitions.
//!
//! ## Architecture
//!
//! - `config` - Manager settings (serde, JSON, environment)
//! - `cache` - Definitions, inheritance resolution, the manager and the
//!   Moka-backed caches it hands out
//! - `error` - Configuration, construction and runtime errors

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{
    Base, CacheDefinition, CacheKey, CacheManager, CacheStats, CacheValue, Components,
    EffectiveDefinition, NamedCache, ValueWrapper, Weigher,
};
pub use config::CacheSettings;
pub use error::{BuildError, CacheError, ConfigError, Violation};
