//! Weighers and the component registry they are resolved from.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::CacheValue;
use crate::error::BuildError;

/// Computes the weight of a cache entry for caches bounded by maximum weight.
///
/// `value` is `None` for entries that cache an absent value.
pub trait Weigher<K>: Send + Sync + 'static {
    fn weigh(&self, key: &K, value: Option<&CacheValue>) -> u32;
}

impl<K, F> Weigher<K> for F
where
    F: Fn(&K, Option<&CacheValue>) -> u32 + Send + Sync + 'static,
{
    fn weigh(&self, key: &K, value: Option<&CacheValue>) -> u32 {
        self(key, value)
    }
}

impl<K> std::fmt::Debug for dyn Weigher<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Weigher")
    }
}

/// Named components that definitions refer to, such as weighers.
///
/// Components are stored type-erased. Resolving a weigher checks that the
/// registered component really is a weigher for the requested key type.
#[derive(Default)]
pub struct Components {
    entries: HashMap<String, ComponentEntry>,
}

struct ComponentEntry {
    component: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Components {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a weigher for caches keyed by `K`.
    #[must_use]
    pub fn with_weigher<K, W>(mut self, name: impl Into<String>, weigher: W) -> Self
    where
        K: 'static,
        W: Weigher<K>,
    {
        let weigher: Arc<dyn Weigher<K>> = Arc::new(weigher);
        self.insert(name.into(), weigher);
        self
    }

    /// Register an arbitrary component.
    #[must_use]
    pub fn with_component<T>(mut self, name: impl Into<String>, component: T) -> Self
    where
        T: Any + Send + Sync,
    {
        self.insert(name.into(), component);
        self
    }

    fn insert<T: Any + Send + Sync>(&mut self, name: String, component: T) {
        debug!("Registering component '{}' ({})", name, type_name::<T>());
        self.entries.insert(
            name,
            ComponentEntry {
                component: Box::new(component),
                type_name: type_name::<T>(),
            },
        );
    }

    /// Look up the weigher registered under `name`.
    pub fn weigher<K: 'static>(&self, name: &str) -> Result<Arc<dyn Weigher<K>>, BuildError> {
        let entry = self.entries.get(name).ok_or_else(|| BuildError::WeigherNotFound {
            weigher: name.to_owned(),
        })?;

        entry
            .component
            .downcast_ref::<Arc<dyn Weigher<K>>>()
            .cloned()
            .ok_or_else(|| BuildError::NotAWeigher {
                weigher: name.to_owned(),
                expected: type_name::<dyn Weigher<K>>(),
                found: entry.type_name,
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for Components {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(name, entry)| (name, entry.type_name)))
            .finish()
    }
}
