//! Cache manager settings.
//!
//! Settings can be deserialized from any serde format, read from a JSON
//! document, or loaded from environment variables.

use std::env;

use serde::Deserialize;

use crate::cache::CacheDefinition;
use crate::error::ConfigError;

/// Everything the manager needs to know about its caches.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CacheSettings {
    /// Explicitly configured caches. Names must be unique.
    pub caches: Vec<CacheDefinition>,

    /// Create caches for unconfigured names on first lookup.
    pub can_create_default_caches: bool,

    /// Name of the default cache. A configured cache with this name replaces
    /// the built-in default definition.
    pub default_cache_name: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            caches: Vec::new(),
            can_create_default_caches: false,
            default_cache_name: "default".to_string(),
        }
    }
}

impl CacheSettings {
    pub fn new(caches: Vec<CacheDefinition>) -> Self {
        Self {
            caches,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn can_create_default_caches(mut self, enabled: bool) -> Self {
        self.can_create_default_caches = enabled;
        self
    }

    #[must_use]
    pub fn default_cache_name(mut self, name: impl Into<String>) -> Self {
        self.default_cache_name = name.into();
        self
    }

    /// Parse settings from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load settings from environment variables, reading `.env` first.
    ///
    /// - `CACHE_DEFINITIONS`: JSON array of cache definitions
    /// - `CACHE_CAN_CREATE_DEFAULT_CACHES`: `true` or `false`
    /// - `CACHE_DEFAULT_CACHE_NAME`: name of the default cache
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load settings from whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut settings = Self::default();

        if let Some(json) = lookup("CACHE_DEFINITIONS") {
            settings.caches = serde_json::from_str(&json)?;
        }

        if let Some(value) = lookup("CACHE_CAN_CREATE_DEFAULT_CACHES") {
            settings.can_create_default_caches = match value.trim().to_lowercase().as_str() {
                "true" => true,
                "false" => false,
                _ => {
                    return Err(ConfigError::Env {
                        var: "CACHE_CAN_CREATE_DEFAULT_CACHES",
                        value,
                    });
                }
            };
        }

        if let Some(name) = lookup("CACHE_DEFAULT_CACHE_NAME") {
            let name = name.trim();
            if name.is_empty() {
                return Err(ConfigError::Env {
                    var: "CACHE_DEFAULT_CACHE_NAME",
                    value: name.to_string(),
                });
            }
            settings.default_cache_name = name.to_string();
        }

        Ok(settings)
    }

    /// The definition configured for `name`. The default cache name always
    /// maps to the default definition.
    pub fn find_definition(&self, name: &str) -> Option<CacheDefinition> {
        if name == self.default_cache_name {
            return Some(self.default_definition());
        }
        self.caches
            .iter()
            .find(|def| def.name.as_deref() == Some(name))
            .cloned()
    }

    /// The configured default definition, or an empty one without a base.
    pub fn default_definition(&self) -> CacheDefinition {
        self.caches
            .iter()
            .find(|def| def.name.as_deref() == Some(self.default_cache_name.as_str()))
            .cloned()
            .unwrap_or_else(|| CacheDefinition::new(self.default_cache_name.clone()).no_base())
    }
}
