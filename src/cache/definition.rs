//! Cache definitions.
//!
//! A [`CacheDefinition`] is the raw, mutable description of a cache as it
//! comes out of configuration. Every field is optional so a definition can
//! inherit whatever it leaves unset from its [`Base`]. The resolver turns
//! definitions into [`EffectiveDefinition`]s, which are never mutated again.

use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::Violation;

/// Where a definition inherits its unset fields from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Option<String>")]
pub enum Base {
    /// Inherit from the default definition.
    #[default]
    Implicit,
    /// Inherit nothing.
    None,
    /// Inherit from the definition with this name.
    Named(String),
}

impl From<Option<String>> for Base {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(name) => Self::Named(name),
            None => Self::None,
        }
    }
}

/// Raw description of a single cache.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CacheDefinition {
    /// Unique name of the cache. Required.
    pub name: Option<String>,

    /// Definition to inherit unset fields from.
    #[serde(alias = "base-definition")]
    pub base: Base,

    pub initial_capacity: Option<i32>,

    /// Maximum number of entries. Mutually exclusive with `maximum_weight`.
    pub maximum_size: Option<i64>,

    /// Maximum total weight of all entries. Requires `weigher`.
    pub maximum_weight: Option<i64>,

    /// Entries expire once they have not been read or written for this long.
    #[serde(deserialize_with = "non_negative_secs")]
    pub expire_after_access: Option<Duration>,

    /// Entries expire this long after they were last written.
    #[serde(deserialize_with = "non_negative_secs")]
    pub expire_after_write: Option<Duration>,

    pub weak_keys: Option<bool>,
    pub weak_values: Option<bool>,
    pub soft_values: Option<bool>,

    /// Name of a weigher registered in [`Components`](super::Components).
    pub weigher: Option<String>,

    /// Record hit, miss, load and eviction counts.
    pub statistics: Option<bool>,
}

impl CacheDefinition {
    /// Create a definition with the given name and nothing else set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn base(mut self, base: impl Into<String>) -> Self {
        self.base = Base::Named(base.into());
        self
    }

    /// Do not inherit from anything, not even the default definition.
    #[must_use]
    pub fn no_base(mut self) -> Self {
        self.base = Base::None;
        self
    }

    #[must_use]
    pub fn initial_capacity(mut self, initial_capacity: i32) -> Self {
        self.initial_capacity = Some(initial_capacity);
        self
    }

    #[must_use]
    pub fn maximum_size(mut self, maximum_size: i64) -> Self {
        self.maximum_size = Some(maximum_size);
        self
    }

    #[must_use]
    pub fn maximum_weight(mut self, maximum_weight: i64) -> Self {
        self.maximum_weight = Some(maximum_weight);
        self
    }

    #[must_use]
    pub fn expire_after_access(mut self, duration: Duration) -> Self {
        self.expire_after_access = Some(duration);
        self
    }

    #[must_use]
    pub fn expire_after_write(mut self, duration: Duration) -> Self {
        self.expire_after_write = Some(duration);
        self
    }

    #[must_use]
    pub fn weak_keys(mut self, enabled: bool) -> Self {
        self.weak_keys = Some(enabled);
        self
    }

    #[must_use]
    pub fn weak_values(mut self, enabled: bool) -> Self {
        self.weak_values = Some(enabled);
        self
    }

    #[must_use]
    pub fn soft_values(mut self, enabled: bool) -> Self {
        self.soft_values = Some(enabled);
        self
    }

    #[must_use]
    pub fn weigher(mut self, weigher: impl Into<String>) -> Self {
        self.weigher = Some(weigher.into());
        self
    }

    #[must_use]
    pub fn statistics(mut self, enabled: bool) -> Self {
        self.statistics = Some(enabled);
        self
    }

    /// Bring the numeric fields into range.
    ///
    /// Negative capacities and sizes collapse to `-1`, which still counts as
    /// set for inheritance. A negative weight becomes unset. When both a
    /// positive initial capacity and a positive maximum size are present, the
    /// initial capacity never exceeds the maximum size.
    pub fn normalize(&mut self) {
        self.initial_capacity = self.initial_capacity.map(|v| v.max(-1));
        self.maximum_size = self.maximum_size.map(|v| v.max(-1));
        self.maximum_weight = self.maximum_weight.filter(|v| *v >= 0);

        if let (Some(init), Some(max)) = (self.initial_capacity, self.maximum_size) {
            if init > 0 && max > 0 && i64::from(init) > max {
                // max < init <= i32::MAX, so the conversion is lossless
                self.initial_capacity = i32::try_from(max).ok();
            }
        }
    }

    /// Fill every unset field from `base`. Fields set here are never touched.
    pub fn inherit_from(&mut self, base: &CacheDefinition) {
        fn fill<T: Clone>(field: &mut Option<T>, base: &Option<T>) {
            if field.is_none() {
                field.clone_from(base);
            }
        }

        fill(&mut self.initial_capacity, &base.initial_capacity);
        fill(&mut self.maximum_size, &base.maximum_size);
        fill(&mut self.maximum_weight, &base.maximum_weight);
        fill(&mut self.expire_after_access, &base.expire_after_access);
        fill(&mut self.expire_after_write, &base.expire_after_write);
        fill(&mut self.weak_keys, &base.weak_keys);
        fill(&mut self.weak_values, &base.weak_values);
        fill(&mut self.soft_values, &base.soft_values);
        fill(&mut self.weigher, &base.weigher);
        fill(&mut self.statistics, &base.statistics);
    }

    /// Check the invariants that hold between fields.
    pub fn validate(&self) -> Result<(), Violation> {
        let weight_set = is_non_negative(self.maximum_weight);
        if weight_set && is_non_negative(self.maximum_size) {
            return Err(Violation::SizeAndWeight);
        }
        if self.soft_values == Some(true) && self.weak_values == Some(true) {
            return Err(Violation::SoftAndWeakValues);
        }
        if weight_set && self.weigher.is_none() {
            return Err(Violation::WeightWithoutWeigher);
        }
        Ok(())
    }
}

fn is_non_negative(value: Option<i64>) -> bool {
    value.is_some_and(|v| v >= 0)
}

/// Durations are configured in (possibly fractional) seconds. Negative values
/// clamp to zero.
fn non_negative_secs<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(secs) = Option::<f64>::deserialize(deserializer)? else {
        return Ok(None);
    };
    Duration::try_from_secs_f64(secs.max(0.0))
        .map(Some)
        .map_err(serde::de::Error::custom)
}

/// Fully resolved, immutable definition of one cache.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveDefinition {
    pub name: String,
    pub initial_capacity: Option<i32>,
    pub maximum_size: Option<i64>,
    pub maximum_weight: Option<i64>,
    pub expire_after_access: Option<Duration>,
    pub expire_after_write: Option<Duration>,
    pub weak_keys: Option<bool>,
    pub weak_values: Option<bool>,
    pub soft_values: Option<bool>,
    pub weigher: Option<String>,
    pub statistics: Option<bool>,
}

impl EffectiveDefinition {
    pub(crate) fn from_resolved(name: String, def: CacheDefinition) -> Self {
        Self {
            name,
            initial_capacity: def.initial_capacity,
            maximum_size: def.maximum_size,
            maximum_weight: def.maximum_weight,
            expire_after_access: def.expire_after_access,
            expire_after_write: def.expire_after_write,
            weak_keys: def.weak_keys,
            weak_values: def.weak_values,
            soft_values: def.soft_values,
            weigher: def.weigher,
            statistics: def.statistics,
        }
    }

    /// The same settings under another name, used for caches created on demand.
    #[must_use]
    pub fn renamed(&self, name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..self.clone()
        }
    }
}
