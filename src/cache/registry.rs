//! Cache manager - central registry for all named caches.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::{debug, info, trace};

use super::{CacheKey, Components, EffectiveDefinition, NamedCache, resolver};
use crate::config::CacheSettings;
use crate::error::CacheError;

/// Central registry of named caches.
///
/// Every configured cache, and the default cache, is created up front. Other
/// names are created from the default definition on first lookup, but only
/// when the settings allow it.
///
/// ## Example
///
/// ```rust
/// use named_caches::{CacheDefinition, CacheManager, CacheSettings, Components};
///
/// let settings = CacheSettings::new(vec![CacheDefinition::new("users").maximum_size(1_000)]);
/// let manager: CacheManager<u64> = CacheManager::new(settings, Components::new())?;
///
/// let users = manager.get_cache("users")?.expect("configured");
/// users.put(7, Some("alice".to_string()));
/// # Ok::<(), named_caches::CacheError>(())
/// ```
pub struct CacheManager<K>
where
    K: CacheKey,
{
    caches: DashMap<String, Arc<NamedCache<K>>>,
    definitions: HashMap<String, EffectiveDefinition>,
    default_cache_name: String,
    can_create_default_caches: AtomicBool,
    components: Components,
    created: AtomicU64,
}

impl<K> CacheManager<K>
where
    K: CacheKey,
{
    /// Resolve `settings` and create every configured cache.
    ///
    /// Fails on the first definition that cannot be resolved or built.
    pub fn new(settings: CacheSettings, components: Components) -> Result<Self, CacheError> {
        let default = settings.default_definition();
        let definitions = resolver::resolve(&settings.caches, &default)?;

        let manager = Self {
            caches: DashMap::with_capacity(definitions.len()),
            definitions,
            default_cache_name: settings.default_cache_name,
            can_create_default_caches: AtomicBool::new(settings.can_create_default_caches),
            components,
            created: AtomicU64::new(0),
        };

        // definitions always include the default cache
        for (name, definition) in &manager.definitions {
            let cache = manager.build(definition.clone())?;
            manager.caches.insert(name.clone(), cache);
            debug!("Created and stored cache '{}'", name);
        }

        info!(
            "Cache manager initialized with {} caches (default '{}', on-demand creation: {})",
            manager.caches.len(),
            manager.default_cache_name,
            manager.can_create_default_caches(),
        );
        Ok(manager)
    }

    fn build(&self, definition: EffectiveDefinition) -> Result<Arc<NamedCache<K>>, CacheError> {
        let name = definition.name.clone();
        let cache = NamedCache::build(definition, &self.components)
            .map_err(|source| CacheError::Build { name, source })?;
        self.created.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(cache))
    }

    fn default_definition(&self) -> &EffectiveDefinition {
        // the resolver always resolves the default definition
        &self.definitions[&self.default_cache_name]
    }

    /// Get the cache registered under `name`.
    ///
    /// Unknown names give `Ok(None)` unless on-demand creation is enabled, in
    /// which case a cache is created from the matching definition, or the
    /// default one. Concurrent lookups of the same new name create it once
    /// and all receive the same instance.
    pub fn get_cache(&self, name: &str) -> Result<Option<Arc<NamedCache<K>>>, CacheError> {
        if let Some(existing) = self.caches.get(name) {
            trace!("Cache '{}' already existed; returning it", name);
            return Ok(Some(Arc::clone(existing.value())));
        }

        if !self.can_create_default_caches() {
            trace!("Cannot create new caches, and couldn't find one for '{}'", name);
            return Ok(None);
        }

        let cache = self
            .caches
            .entry(name.to_owned())
            .or_try_insert_with(|| {
                let template = self
                    .definitions
                    .get(name)
                    .unwrap_or_else(|| self.default_definition());
                debug!("Creating new cache '{}' based on '{}'", name, template.name);
                self.build(template.renamed(name))
            })?;
        Ok(Some(Arc::clone(cache.value())))
    }

    /// Names of all registered caches.
    pub fn cache_names(&self) -> HashSet<String> {
        self.caches.iter().map(|entry| entry.key().clone()).collect()
    }

    /// All registered caches.
    pub fn caches(&self) -> Vec<Arc<NamedCache<K>>> {
        self.caches.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    /// The effective definition configured for `name`, if any.
    pub fn definition(&self, name: &str) -> Option<&EffectiveDefinition> {
        self.definitions.get(name)
    }

    /// Check if a cache with the given name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    /// Remove a cache from the registry.
    ///
    /// Returns `true` if the cache was removed. Handles to the cache stay usable.
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.caches.remove(name).is_some();
        if removed {
            debug!("Removed cache: {}", name);
        }
        removed
    }

    /// Number of cache engines built so far, including caches since removed.
    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Get the number of registered caches.
    pub fn len(&self) -> usize {
        self.caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    pub fn default_cache_name(&self) -> &str {
        &self.default_cache_name
    }

    pub fn can_create_default_caches(&self) -> bool {
        self.can_create_default_caches.load(Ordering::Acquire)
    }

    /// Allow or forbid on-demand creation of unconfigured caches.
    pub fn set_can_create_default_caches(&self, enabled: bool) {
        self.can_create_default_caches.store(enabled, Ordering::Release);
    }
}

impl<K> std::fmt::Debug for CacheManager<K>
where
    K: CacheKey,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("cache_count", &self.caches.len())
            .field("cache_names", &self.cache_names())
            .field("default_cache_name", &self.default_cache_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheDefinition;
    use crate::error::{BuildError, ConfigError};

    fn manager(settings: CacheSettings) -> CacheManager<String> {
        CacheManager::new(settings, Components::new()).unwrap()
    }

    #[test]
    fn default_cache_always_exists() {
        let manager = manager(CacheSettings::default());
        assert!(manager.get_cache("default").unwrap().is_some());
        assert_eq!(manager.cache_names(), HashSet::from(["default".to_string()]));
    }

    #[test]
    fn default_cache_is_built_once() {
        let configured = manager(CacheSettings::new(vec![CacheDefinition::new("default")]));
        assert_eq!(configured.created_count(), 1);

        let implicit = manager(CacheSettings::new(vec![CacheDefinition::new("a")]));
        assert_eq!(implicit.created_count(), 2);
        assert!(implicit.contains("default"));
    }

    #[test]
    fn configured_caches_are_created_eagerly() {
        let manager = manager(CacheSettings::new(vec![
            CacheDefinition::new("a"),
            CacheDefinition::new("b").maximum_size(10),
        ]));

        let names = manager.cache_names();
        assert_eq!(names.len(), 3);
        assert!(names.contains("a") && names.contains("b") && names.contains("default"));
        assert_eq!(manager.caches().len(), 3);
    }

    #[test]
    fn unknown_cache_is_absent_without_on_demand_creation() {
        let manager = manager(CacheSettings::default());
        assert!(manager.get_cache("some-value").unwrap().is_none());
        assert!(!manager.contains("some-value"));
    }

    #[test]
    fn unknown_cache_is_created_from_default() {
        let settings = CacheSettings::new(vec![CacheDefinition::new("default").maximum_size(5)])
            .can_create_default_caches(true);
        let manager = manager(settings);

        let cache = manager.get_cache("some-value").unwrap().unwrap();
        assert_eq!(cache.name(), "some-value");
        assert_eq!(cache.definition().maximum_size, Some(5));
        assert!(manager.contains("some-value"));
    }

    #[test]
    fn lookups_return_the_same_instance() {
        let manager = manager(CacheSettings::default().can_create_default_caches(true));
        let first = manager.get_cache("x").unwrap().unwrap();
        let second = manager.get_cache("x").unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn removed_configured_cache_is_recreated_from_its_definition() {
        let manager = manager(
            CacheSettings::new(vec![CacheDefinition::new("sized").maximum_size(42)])
                .can_create_default_caches(true),
        );
        assert!(manager.remove("sized"));
        assert!(!manager.remove("sized"));

        let cache = manager.get_cache("sized").unwrap().unwrap();
        assert_eq!(cache.definition().maximum_size, Some(42));
    }

    #[test]
    fn on_demand_creation_can_be_toggled() {
        let manager = manager(CacheSettings::default());
        manager.set_can_create_default_caches(true);
        assert!(manager.get_cache("late").unwrap().is_some());

        manager.set_can_create_default_caches(false);
        assert!(manager.get_cache("later").unwrap().is_none());
        // already created caches are still served
        assert!(manager.get_cache("late").unwrap().is_some());
    }

    #[test]
    fn build_failure_names_the_cache() {
        let settings = CacheSettings::new(vec![
            CacheDefinition::new("weighted").maximum_weight(10).weigher("missing"),
        ]);
        let err = CacheManager::<String>::new(settings, Components::new()).unwrap_err();

        match err {
            CacheError::Build { name, source } => {
                assert_eq!(name, "weighted");
                assert!(matches!(source, BuildError::WeigherNotFound { .. }));
            }
            other => panic!("expected build error, got {other:?}"),
        }
    }

    #[test]
    fn resolution_failure_aborts_initialization() {
        let settings = CacheSettings::new(vec![
            CacheDefinition::new("a").base("b"),
            CacheDefinition::new("b").base("a"),
        ]);
        let err = CacheManager::<String>::new(settings, Components::new()).unwrap_err();
        assert!(matches!(err, CacheError::Config(ConfigError::Cycle { .. })));
    }

    #[test]
    fn unsupported_default_definition_aborts_initialization() {
        let settings = CacheSettings::new(vec![CacheDefinition::new("default").weak_keys(true)]);
        let err = CacheManager::<String>::new(settings, Components::new()).unwrap_err();
        assert!(matches!(err, CacheError::Build { name, .. } if name == "default"));
    }
}
