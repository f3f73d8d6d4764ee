//! Cache module - named caches built on Moka.
//!
//! ## Architecture
//!
//! - `CacheDefinition` - raw, inheritable description of one cache
//! - `resolver` - turns definitions into `EffectiveDefinition`s, following
//!   base definitions and rejecting cycles
//! - `CacheManager` - concurrent registry holding one `NamedCache` per name
//! - `NamedCache` - a Moka cache holding type-erased, possibly absent values
//! - `Components` - named weighers that definitions refer to
//!
//! ## Usage
//!
//! ```rust
//! use named_caches::{CacheDefinition, CacheManager, CacheSettings, Components};
//!
//! let settings = CacheSettings::new(vec![
//!     CacheDefinition::new("sessions").maximum_size(10_000),
//!     CacheDefinition::new("admin-sessions").base("sessions").maximum_size(100),
//! ]);
//! let manager: CacheManager<String> = CacheManager::new(settings, Components::new())?;
//!
//! let sessions = manager.get_cache("admin-sessions")?.expect("configured");
//! let token = sessions.get_or_compute(&"alice".to_string(), || Some(42_u64));
//! assert_eq!(token.and_then(|t| t.downcast_ref::<u64>().copied()), Some(42));
//! # Ok::<(), named_caches::CacheError>(())
//! ```

use std::any::Any;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

mod definition;
mod registry;
pub mod resolver;
mod stats;
mod typed;
mod weigher;

pub use definition::{Base, CacheDefinition, EffectiveDefinition};
pub use registry::CacheManager;
pub use stats::CacheStats;
pub use typed::{NamedCache, ValueWrapper};
pub use weigher::{Components, Weigher};

/// A cached value of any type.
pub type CacheValue = Arc<dyn Any + Send + Sync>;

/// Bounds every cache key satisfies.
pub trait CacheKey: Hash + Eq + Clone + Debug + Send + Sync + 'static {}

impl<T> CacheKey for T where T: Hash + Eq + Clone + Debug + Send + Sync + 'static {}
