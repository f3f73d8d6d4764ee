//! Definition inheritance.
//!
//! Definitions are resolved in passes over a worklist. A definition can be
//! resolved once its base is resolved; a pass that resolves nothing means the
//! remaining definitions wait on each other forever.

use std::collections::{HashMap, HashSet};

use tracing::{trace, warn};

use super::definition::{Base, CacheDefinition, EffectiveDefinition};
use crate::error::ConfigError;

/// A definition still waiting for its base.
struct Pending {
    name: String,
    parent: Option<String>,
    def: CacheDefinition,
}

/// Resolve every definition in `definitions`, plus `default`, into its
/// effective form.
///
/// `default` is what [`Base::Implicit`] points at. If a definition with the
/// same name is part of `definitions`, that one is used instead. A base that
/// names an unknown definition falls back to the default with a warning.
pub fn resolve(
    definitions: &[CacheDefinition],
    default: &CacheDefinition,
) -> Result<HashMap<String, EffectiveDefinition>, ConfigError> {
    check_names(definitions)?;
    let default_name = default.name.as_deref().ok_or(ConfigError::MissingName)?;

    let mut raw: Vec<CacheDefinition> = definitions.to_vec();
    if !raw.iter().any(|d| d.name.as_deref() == Some(default_name)) {
        raw.push(default.clone());
    }

    let known: HashSet<String> = raw.iter().filter_map(|d| d.name.clone()).collect();
    let mut pending: Vec<Pending> = raw
        .into_iter()
        .filter_map(|mut def| {
            let name = def.name.clone()?;
            def.normalize();
            let parent = parent_of(&name, &def.base, default_name, &known);
            Some(Pending { name, parent, def })
        })
        .collect();

    let mut resolved: HashMap<String, CacheDefinition> = HashMap::with_capacity(pending.len());

    while !pending.is_empty() {
        let before = pending.len();
        let mut waiting = Vec::with_capacity(before);

        for Pending { name, parent, mut def } in pending {
            match parent.as_deref() {
                None => {}
                Some(parent) => match resolved.get(parent) {
                    Some(base) => def.inherit_from(base),
                    None => {
                        trace!("Skipping '{}' until '{}' is resolved", name, parent);
                        waiting.push(Pending { name, parent: Some(parent.to_owned()), def });
                        continue;
                    }
                },
            }

            def.normalize();
            def.validate()
                .map_err(|reason| ConfigError::Invalid { name: name.clone(), reason })?;
            trace!("Resolved cache definition '{}': {:?}", name, def);
            resolved.insert(name, def);
        }

        if waiting.len() == before {
            let mut names: Vec<String> = waiting.into_iter().map(|p| p.name).collect();
            names.sort();
            return Err(ConfigError::Cycle { names });
        }
        pending = waiting;
    }

    Ok(resolved
        .into_iter()
        .map(|(name, def)| {
            let effective = EffectiveDefinition::from_resolved(name.clone(), def);
            (name, effective)
        })
        .collect())
}

/// Name of the definition `name` inherits from, if any.
fn parent_of(
    name: &str,
    base: &Base,
    default_name: &str,
    known: &HashSet<String>,
) -> Option<String> {
    // the default definition is the root of implicit inheritance
    let implicit = (name != default_name).then(|| default_name.to_owned());

    match base {
        Base::None => None,
        Base::Implicit => implicit,
        Base::Named(parent) if known.contains(parent) => Some(parent.clone()),
        Base::Named(parent) => {
            warn!(
                "No base definition '{}' found for cache '{}'. Defaulting to default cache definition (named '{}') instead.",
                parent, name, default_name
            );
            implicit
        }
    }
}

/// Every definition needs a name and no name may appear twice.
fn check_names(definitions: &[CacheDefinition]) -> Result<(), ConfigError> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for def in definitions {
        let name = def.name.as_deref().ok_or(ConfigError::MissingName)?;
        *counts.entry(name).or_default() += 1;
    }

    let mut duplicates: Vec<String> = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(name, count)| format!("{name} [x{count}]"))
        .collect();
    if duplicates.is_empty() {
        return Ok(());
    }
    duplicates.sort();
    Err(ConfigError::DuplicateNames(duplicates.join(", ")))
}
