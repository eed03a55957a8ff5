//! Build-string hashing.
//!
//! The hash input is the output's used parameters plus `force_use_keys`,
//! minus parameters already carried by a legacy tag (`py311`, `np126`),
//! minus `ignore_version` and `force_ignore_keys`, minus `ignore_build_only_deps`
//! whose package appears in neither host nor run. A lone `target_platform`
//! counts as empty. Keys are serialized sorted, so parameter declaration
//! order never affects the result.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::trace;

use super::Configuration;
use crate::consts::{LEGACY_BUILD_STRING_KEYS, TARGET_PLATFORM};
use crate::util::hash::{BuildHash, Hashable};
use crate::variant::{ParameterSpace, VariantValue};

#[derive(Serialize)]
struct HashContents<'a>(&'a BTreeMap<String, VariantValue>);

impl Hashable for HashContents<'_> {}

/// Legacy tags as `(parameter, tag)` for every language the output both uses
/// and lists in host or run.
fn legacy_tags(config: &Configuration) -> Vec<(&'static str, String)> {
  let names = config.requirements.host_and_run_names();
  LEGACY_BUILD_STRING_KEYS
    .iter()
    .filter(|(_, package, _)| names.contains(package))
    .filter_map(|(param, _, tag)| {
      let value = config.used.get(param)?.to_string();
      let digits: String = value.split('.').take(2).collect();
      Some((*param, format!("{}{}", tag, digits)))
    })
    .collect()
}

/// The conventional prefix, e.g. `np126py311`.
pub fn legacy_prefix(config: &Configuration) -> String {
  legacy_tags(config).into_iter().map(|(_, tag)| tag).collect()
}

/// Package a parameter refers to: the legacy name for tagged languages,
/// otherwise the parameter with `_` spelled `-`.
fn package_for(param: &str) -> String {
  LEGACY_BUILD_STRING_KEYS
    .iter()
    .find(|(key, _, _)| *key == param)
    .map_or_else(|| param.replace('_', "-"), |(_, package, _)| package.to_string())
}

/// The parameters and values that feed the hash.
pub fn hash_input(config: &Configuration, space: &ParameterSpace) -> BTreeMap<String, VariantValue> {
  let encoded: BTreeSet<&str> = legacy_tags(config).into_iter().map(|(param, _)| param).collect();
  let ignore_version = space.ignore_version();
  let host_and_run = config.requirements.host_and_run_names();
  let build_only: BTreeSet<String> = space
    .ignore_build_only_deps()
    .into_iter()
    .filter(|param| {
      let package = package_for(param);
      !host_and_run.contains(package.as_str()) && !host_and_run.contains(param.as_str())
    })
    .collect();

  let mut keys: BTreeSet<&String> = config.used.keys().collect();
  keys.extend(
    space
      .force_use_keys()
      .iter()
      .chain(config.force_use_keys.iter())
      .filter(|k| config.variant.contains_key(k)),
  );
  keys.retain(|k| {
    !encoded.contains(k.as_str())
      && !ignore_version.contains(*k)
      && !build_only.contains(*k)
      && !space.force_ignore_keys().contains(*k)
      && !config.force_ignore_keys.contains(*k)
  });

  if keys.len() == 1 && keys.iter().all(|k| k.as_str() == TARGET_PLATFORM) {
    keys.clear();
  }

  keys
    .into_iter()
    .filter_map(|k| {
      let value = config.variant.get(k).or_else(|| config.used.get(k))?;
      Some((k.clone(), value.clone()))
    })
    .collect()
}

/// Compute the build-string hash, or `None` when nothing feeds it.
pub fn hash(config: &Configuration, space: &ParameterSpace) -> Option<BuildHash> {
  let input = hash_input(config, space);
  if input.is_empty() {
    return None;
  }
  match HashContents(&input).compute_hash() {
    Ok(hash) => {
      trace!(name = %config.name, inputs = input.len(), hash = %hash, "computed build hash");
      Some(hash)
    }
    Err(err) => {
      tracing::warn!(name = %config.name, error = %err, "failed to serialize hash input");
      None
    }
  }
}

/// `<legacy tags><h + hash>_<number>`, or just the number when both are empty.
pub fn compose_build_string(prefix: &str, hash: Option<&BuildHash>, number: u64) -> String {
  let mut head = prefix.to_string();
  if let Some(hash) = hash {
    head.push('h');
    head.push_str(&hash.0);
  }
  if head.is_empty() {
    number.to_string()
  } else {
    format!("{}_{}", head, number)
  }
}

/// Fill in `hash` and `build_string`. An explicit build string wins over the computed one.
pub fn assign_build_string(config: &mut Configuration, space: &ParameterSpace, explicit: Option<&str>) {
  config.hash = hash(config, space);
  config.build_string = match explicit {
    Some(explicit) => explicit.to_string(),
    None => compose_build_string(&legacy_prefix(config), config.hash.as_ref(), config.build_number),
  };
}
