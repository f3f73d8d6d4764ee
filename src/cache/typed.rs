//! Named cache wrapper around Moka.

use std::any::{Any, type_name};
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use tracing::trace;

use super::stats::{CacheStats, StatsCounter};
use super::{CacheKey, CacheValue, Components, EffectiveDefinition};
use crate::error::{BuildError, CacheError};

/// Moka refuses expirations longer than this.
const MAX_EXPIRY: Duration = Duration::from_secs(1000 * 365 * 24 * 3600);

/// What the engine actually stores. Moka has no notion of a cached absent
/// value, so `None` goes in as `Null` and comes back out as `None`.
#[derive(Debug, Clone)]
enum Slot {
    Null,
    Value(CacheValue),
}

impl Slot {
    fn mask(value: Option<CacheValue>) -> Self {
        value.map_or(Self::Null, Self::Value)
    }

    fn unmask(self) -> Option<CacheValue> {
        match self {
            Self::Null => None,
            Self::Value(value) => Some(value),
        }
    }

    fn as_value(&self) -> Option<&CacheValue> {
        match self {
            Self::Null => None,
            Self::Value(value) => Some(value),
        }
    }
}

/// A cache hit. The contained value is `None` when an absent value was cached.
#[derive(Debug, Clone)]
pub struct ValueWrapper(Option<CacheValue>);

impl ValueWrapper {
    pub fn get(&self) -> Option<&CacheValue> {
        self.0.as_ref()
    }

    pub fn into_inner(self) -> Option<CacheValue> {
        self.0
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    /// Borrow the cached value as `T`, if it is one.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_ref()?.downcast_ref::<T>()
    }
}

/// One named cache.
///
/// Values are type-erased so caches of any value type can live in the same
/// manager. Absent values can be cached and are told apart from misses.
pub struct NamedCache<K>
where
    K: CacheKey,
{
    name: Arc<str>,
    definition: EffectiveDefinition,
    inner: Cache<K, Slot>,
    stats: Option<Arc<StatsCounter>>,
}

impl<K> NamedCache<K>
where
    K: CacheKey,
{
    /// Build the engine described by `definition`.
    ///
    /// Unset fields keep the engine's defaults.
    pub fn build(
        definition: EffectiveDefinition,
        components: &Components,
    ) -> Result<Self, BuildError> {
        trace!("Creating cache '{}' from: {:?}", definition.name, definition);

        if definition.weak_keys == Some(true) {
            return Err(BuildError::Unsupported("weak keys"));
        }
        if definition.weak_values == Some(true) {
            return Err(BuildError::Unsupported("weak values"));
        }
        if definition.soft_values == Some(true) {
            return Err(BuildError::Unsupported("soft values"));
        }

        let mut builder = Cache::builder().name(&definition.name);

        if let Some(initial_capacity) = definition.initial_capacity {
            builder = builder.initial_capacity(usize::try_from(initial_capacity).unwrap_or(0));
        }
        if let Some(maximum_size) = definition.maximum_size {
            builder = builder.max_capacity(u64::try_from(maximum_size).unwrap_or(0));
        }
        if let Some(maximum_weight) = definition.maximum_weight {
            builder = builder.max_capacity(u64::try_from(maximum_weight).unwrap_or(0));
        }
        if let Some(ttl) = definition.expire_after_write {
            if ttl > MAX_EXPIRY {
                return Err(BuildError::Unsupported("expire-after-write beyond 1000 years"));
            }
            builder = builder.time_to_live(ttl);
        }
        if let Some(tti) = definition.expire_after_access {
            if tti > MAX_EXPIRY {
                return Err(BuildError::Unsupported("expire-after-access beyond 1000 years"));
            }
            builder = builder.time_to_idle(tti);
        }
        if let Some(name) = &definition.weigher {
            if definition.maximum_weight.is_none() {
                return Err(BuildError::WeigherWithoutMaximumWeight {
                    weigher: name.clone(),
                });
            }
            let weigher = components.weigher::<K>(name)?;
            builder = builder.weigher(move |key: &K, slot: &Slot| weigher.weigh(key, slot.as_value()));
        }

        let stats = (definition.statistics == Some(true)).then(|| Arc::new(StatsCounter::default()));
        if let Some(stats) = &stats {
            let stats = Arc::clone(stats);
            builder = builder.eviction_listener(move |_key, _slot, cause| {
                if cause.was_evicted() {
                    stats.record_eviction();
                }
            });
        }

        Ok(Self {
            name: definition.name.as_str().into(),
            definition,
            inner: builder.build(),
            stats,
        })
    }

    /// Get the name of this cache.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The definition this cache was built from.
    pub fn definition(&self) -> &EffectiveDefinition {
        &self.definition
    }

    /// The underlying engine.
    pub fn native_cache(&self) -> &Cache<K, impl Clone + Send + Sync + 'static> {
        &self.inner
    }

    fn lookup(&self, key: &K) -> Option<Slot> {
        let slot = self.inner.get(key);
        match &slot {
            Some(_) => {
                trace!("Cache '{}' hit for key {:?}", self.name, key);
                self.record(StatsCounter::record_hit);
            }
            None => {
                trace!("Cache '{}' miss for key {:?}", self.name, key);
                self.record(StatsCounter::record_miss);
            }
        }
        slot
    }

    fn record(&self, event: impl FnOnce(&StatsCounter)) {
        if let Some(stats) = &self.stats {
            event(stats);
        }
    }

    /// Get a value from the cache.
    ///
    /// Returns `None` on a miss and `Some` with an empty wrapper when an
    /// absent value is cached.
    pub fn get(&self, key: &K) -> Option<ValueWrapper> {
        self.lookup(key).map(|slot| ValueWrapper(slot.unmask()))
    }

    /// Get a value and downcast it to `T`.
    ///
    /// Misses and cached absent values both give `Ok(None)`.
    pub fn get_as<T>(&self, key: &K) -> Result<Option<Arc<T>>, CacheError>
    where
        T: Any + Send + Sync,
    {
        let Some(value) = self.lookup(key).and_then(Slot::unmask) else {
            return Ok(None);
        };
        value.downcast::<T>().map(Some).map_err(|_| CacheError::TypeMismatch {
            cache: self.name.to_string(),
            expected: type_name::<T>(),
        })
    }

    /// Get a value, computing and caching it on a miss.
    ///
    /// Concurrent callers missing on the same key wait for a single call of
    /// `compute` and all see its result.
    pub fn get_or_compute<V, F>(&self, key: &K, compute: F) -> Option<CacheValue>
    where
        V: Any + Send + Sync,
        F: FnOnce() -> Option<V>,
    {
        let mut loaded = false;
        let slot = self.inner.get_with_by_ref(key, || {
            loaded = true;
            Slot::mask(compute().map(|v| Arc::new(v) as CacheValue))
        });

        if loaded {
            trace!("Cache '{}' miss for key {:?}; computed", self.name, key);
            self.record(|stats| {
                stats.record_miss();
                stats.record_load(true);
            });
        } else {
            trace!("Cache '{}' hit for key {:?}", self.name, key);
            self.record(StatsCounter::record_hit);
        }
        slot.unmask()
    }

    /// Like [`get_or_compute`](Self::get_or_compute), for computations that
    /// can fail. A failure is handed to every waiting caller and nothing is
    /// cached.
    pub fn try_get_or_compute<V, E, F>(&self, key: &K, compute: F) -> Result<Option<CacheValue>, Arc<E>>
    where
        V: Any + Send + Sync,
        E: Send + Sync + 'static,
        F: FnOnce() -> Result<Option<V>, E>,
    {
        let mut loaded = false;
        let result = self.inner.try_get_with_by_ref(key, || {
            loaded = true;
            compute().map(|value| Slot::mask(value.map(|v| Arc::new(v) as CacheValue)))
        });

        if loaded {
            trace!("Cache '{}' miss for key {:?}; compute succeeded: {}", self.name, key, result.is_ok());
            self.record(|stats| {
                stats.record_miss();
                stats.record_load(result.is_ok());
            });
        } else if result.is_ok() {
            trace!("Cache '{}' hit for key {:?}", self.name, key);
            self.record(StatsCounter::record_hit);
        }
        result.map(Slot::unmask)
    }

    /// Insert a value, replacing whatever was cached. `None` caches an absent value.
    pub fn put<V>(&self, key: K, value: Option<V>)
    where
        V: Any + Send + Sync,
    {
        self.put_value(key, value.map(|v| Arc::new(v) as CacheValue));
    }

    /// Insert an already type-erased value.
    pub fn put_value(&self, key: K, value: Option<CacheValue>) {
        trace!("Cache '{}' updated with key {:?}", self.name, key);
        self.inner.insert(key, Slot::mask(value));
        self.record(StatsCounter::record_put);
    }

    /// Insert a value unless one is cached already.
    ///
    /// Returns the existing value untouched, or `None` if the new value was stored.
    pub fn put_if_absent<V>(&self, key: K, value: Option<V>) -> Option<ValueWrapper>
    where
        V: Any + Send + Sync,
    {
        let value = value.map(|v| Arc::new(v) as CacheValue);
        let entry = self.inner.entry(key).or_insert_with(|| Slot::mask(value));

        if entry.is_fresh() {
            trace!("Cache '{}' miss for key {:?}; updated", self.name, entry.key());
            self.record(StatsCounter::record_put);
            return None;
        }
        trace!("Cache '{}' hit for key {:?}; kept existing value", self.name, entry.key());
        Some(ValueWrapper(entry.into_value().unmask()))
    }

    /// Remove a key from the cache.
    pub fn evict(&self, key: &K) {
        self.inner.invalidate(key);
        trace!("Cache '{}' invalidated key {:?}", self.name, key);
    }

    /// Remove a key, reporting whether it was cached.
    pub fn evict_if_present(&self, key: &K) -> bool {
        let present = self.inner.remove(key).is_some();
        trace!("Cache '{}' evict key {:?}; was present: {}", self.name, key, present);
        present
    }

    /// Remove all entries from the cache.
    pub fn clear(&self) {
        self.inner.invalidate_all();
        trace!("Cache '{}' invalidated all keys", self.name);
    }

    /// Remove all entries, reporting whether the cache was empty beforehand.
    pub fn invalidate(&self) -> bool {
        let was_empty = self.is_empty();
        self.inner.invalidate_all();
        trace!("Cache '{}' invalidated all keys; was empty: {}", self.name, was_empty);
        was_empty
    }

    /// Check if a key is cached, without touching statistics or idle timers.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    /// Check for entries after flushing pending writes and removals.
    pub fn is_empty(&self) -> bool {
        self.inner.run_pending_tasks();
        self.inner.entry_count() == 0
    }

    /// Get the number of entries in the cache.
    ///
    /// Note: This may lag behind recent writes until pending maintenance runs.
    pub fn estimated_size(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Run the engine's pending maintenance (evictions, expirations, size updates).
    pub fn clean_up(&self) {
        self.inner.run_pending_tasks();
    }

    /// Current counters, if this cache records statistics.
    pub fn stats(&self) -> Option<CacheStats> {
        self.stats.as_ref().map(|stats| stats.snapshot())
    }
}

impl<K> std::fmt::Debug for NamedCache<K>
where
    K: CacheKey,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedCache")
            .field("name", &self.name)
            .field("entry_count", &self.inner.entry_count())
            .finish()
    }
}
