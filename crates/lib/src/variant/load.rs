//! Loading and merging layered variant configuration.
//!
//! Layers are applied in order; a key in a later layer replaces the earlier
//! candidate list wholesale. Zip groups and force lists are unioned, extend
//! keys are merged.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::consts::{
  BUILTIN_EXTEND_KEYS, EXTEND_KEYS, FORCE_IGNORE_KEYS, FORCE_USE_KEYS, PIN_RUN_AS_BUILD, RECIPE_VARIANTS_FILE,
  TARGET_PLATFORM, VARIANT_CONFIG_ENV, ZIP_KEYS,
};

use super::types::{ParameterSpace, VariantValue, ZipGroup};

/// Errors raised while reading or merging variant configuration.
#[derive(Debug, thiserror::Error)]
pub enum VariantConfigError {
  #[error("failed to read variant config {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse variant config {name}: {source}")]
  Parse {
    name: String,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("variant config {name} must be a mapping of parameter names to values")]
  NotAMapping { name: String },

  #[error("invalid variant configuration:\n  {}", .problems.join("\n  "))]
  Invalid { problems: Vec<String> },

  #[error("invalid variant override '{0}': expected key=value[,value...]")]
  InvalidOverride(String),

  #[error("cannot select on unknown parameter '{0}'")]
  UnknownParameter(String),

  #[error("selection {key}={values} matches none of the candidate values")]
  EmptySelection { key: String, values: String },
}

/// One source of variant configuration (defaults, a file, CLI overrides).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigLayer {
  /// Where the layer came from, for diagnostics.
  pub name: String,
  pub entries: Vec<(String, VariantValue)>,
}

impl ConfigLayer {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      entries: Vec::new(),
    }
  }

  pub fn with(mut self, key: impl Into<String>, value: VariantValue) -> Self {
    self.entries.push((key.into(), value));
    self
  }

  /// Parse a YAML mapping, keeping the document's key order.
  pub fn from_yaml_str(name: impl Into<String>, text: &str) -> Result<Self, VariantConfigError> {
    let name = name.into();
    let doc: serde_yaml::Value = serde_yaml::from_str(text).map_err(|source| VariantConfigError::Parse {
      name: name.clone(),
      source,
    })?;

    let mapping = match doc {
      serde_yaml::Value::Mapping(m) => m,
      serde_yaml::Value::Null => serde_yaml::Mapping::new(),
      _ => return Err(VariantConfigError::NotAMapping { name }),
    };

    let mut entries = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
      let Some(key) = key.as_str().map(str::to_string) else {
        return Err(VariantConfigError::NotAMapping { name });
      };
      if value.is_null() || value.as_sequence().is_some_and(|seq| seq.is_empty()) {
        warn!(layer = %name, key = %key, "ignoring variant key with no value");
        continue;
      }
      let value: VariantValue = serde_yaml::from_value(value).map_err(|source| VariantConfigError::Parse {
        name: name.clone(),
        source,
      })?;
      entries.push((key, value));
    }

    Ok(Self { name, entries })
  }

  pub fn from_file(path: &Path) -> Result<Self, VariantConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| VariantConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_yaml_str(path.display().to_string(), &text)
  }

  /// A single layer from `key=v1,v2` overrides.
  pub fn from_overrides(overrides: &[(String, Vec<VariantValue>)]) -> Self {
    let entries = overrides
      .iter()
      .map(|(key, values)| (key.clone(), VariantValue::List(values.clone())))
      .collect();
    Self {
      name: "command line".to_string(),
      entries,
    }
  }

  /// Built-in defaults: the target platform and the python run pin.
  pub fn defaults(target_platform: &str) -> Self {
    let python_pin = VariantValue::Map(BTreeMap::from([
      ("min_pin".to_string(), VariantValue::from("x.x")),
      ("max_pin".to_string(), VariantValue::from("x.x")),
    ]));
    ConfigLayer::new("defaults")
      .with(TARGET_PLATFORM, VariantValue::from(target_platform))
      .with(
        PIN_RUN_AS_BUILD,
        VariantValue::Map(BTreeMap::from([("python".to_string(), python_pin)])),
      )
  }
}

/// Parse `key=v1,v2` into a key and its candidate values.
pub fn parse_override(raw: &str) -> Result<(String, Vec<VariantValue>), VariantConfigError> {
  let Some((key, values)) = raw.split_once('=') else {
    return Err(VariantConfigError::InvalidOverride(raw.to_string()));
  };
  let key = key.trim();
  let values: Vec<VariantValue> = values
    .split(',')
    .map(str::trim)
    .filter(|v| !v.is_empty())
    .map(VariantValue::from)
    .collect();
  if key.is_empty() || values.is_empty() {
    return Err(VariantConfigError::InvalidOverride(raw.to_string()));
  }
  Ok((key.to_string(), values))
}

/// Collect the layers for one recipe directory in stacking order.
///
/// Order: defaults, the global file named by `PKGMATRIX_VARIANT_CONFIG`, the
/// recipe's `variants.yaml`, each explicit file, then command-line overrides.
pub fn discover_layers(
  recipe_dir: &Path,
  target_platform: &str,
  files: &[PathBuf],
  overrides: &[(String, Vec<VariantValue>)],
) -> Result<Vec<ConfigLayer>, VariantConfigError> {
  let mut layers = vec![ConfigLayer::defaults(target_platform)];

  if let Ok(global) = std::env::var(VARIANT_CONFIG_ENV) {
    let path = PathBuf::from(global);
    if path.is_file() {
      debug!(path = %path.display(), "loading global variant config");
      layers.push(ConfigLayer::from_file(&path)?);
    } else {
      warn!(path = %path.display(), "global variant config not found, skipping");
    }
  }

  let recipe_variants = recipe_dir.join(RECIPE_VARIANTS_FILE);
  if recipe_variants.is_file() {
    layers.push(ConfigLayer::from_file(&recipe_variants)?);
  }

  for file in files {
    layers.push(ConfigLayer::from_file(file)?);
  }

  if !overrides.is_empty() {
    layers.push(ConfigLayer::from_overrides(overrides));
  }

  Ok(layers)
}

/// Merge layers into a single parameter space.
///
/// All detected problems are reported together.
pub fn load(layers: &[ConfigLayer]) -> Result<ParameterSpace, VariantConfigError> {
  let mut problems = Vec::new();

  let mut extend_keys: BTreeSet<String> = BUILTIN_EXTEND_KEYS.iter().map(|k| k.to_string()).collect();
  for layer in layers {
    for (key, value) in &layer.entries {
      if key == EXTEND_KEYS {
        extend_keys.extend(string_list(value, &layer.name, key, &mut problems));
      }
    }
  }

  let mut space = ParameterSpace::default();

  for layer in layers {
    for (key, value) in &layer.entries {
      match key.as_str() {
        EXTEND_KEYS => {}
        ZIP_KEYS => {
          for group in zip_groups(value, &layer.name, &mut problems) {
            if !space.zip_groups.iter().any(|g| g.same_members(&group)) {
              space.zip_groups.push(group);
            }
          }
        }
        FORCE_USE_KEYS => {
          let keys = string_list(value, &layer.name, key, &mut problems);
          space.force_use_keys.extend(keys);
        }
        FORCE_IGNORE_KEYS => {
          let keys = string_list(value, &layer.name, key, &mut problems);
          space.force_ignore_keys.extend(keys);
        }
        _ if extend_keys.contains(key) => {
          let merged = match space.extend.remove(key) {
            Some(existing) => merge_extend(existing, value.clone()),
            None => value.clone(),
          };
          space.extend.insert(key.clone(), merged);
        }
        _ => {
          if key.contains('-') {
            problems.push(format!(
              "'{}' in {}: parameter names cannot contain '-', use '_' instead",
              key, layer.name
            ));
            continue;
          }
          let candidates = value.clone().into_candidates();
          if candidates.is_empty() {
            warn!(layer = %layer.name, key = %key, "ignoring parameter with no candidates");
            continue;
          }
          match space.params.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = candidates,
            None => space.params.push((key.clone(), candidates)),
          }
        }
      }
    }
  }

  validate_zip_groups(&space, &extend_keys, &mut problems);

  if !problems.is_empty() {
    return Err(VariantConfigError::Invalid { problems });
  }

  debug!(
    parameters = space.params.len(),
    zip_groups = space.zip_groups.len(),
    "loaded parameter space"
  );
  Ok(space)
}

fn validate_zip_groups(space: &ParameterSpace, extend_keys: &BTreeSet<String>, problems: &mut Vec<String>) {
  let mut seen: BTreeMap<&str, String> = BTreeMap::new();

  for group in &space.zip_groups {
    let mut lengths = Vec::new();
    for member in group.members() {
      if let Some(previous) = seen.insert(member.as_str(), group.name())
        && previous != group.name()
      {
        problems.push(format!(
          "'{}' is a member of more than one zip group ([{}] and [{}])",
          member,
          previous,
          group.name()
        ));
      }
      if extend_keys.contains(member) {
        problems.push(format!("'{}' cannot be both a zip key and an extend key", member));
      }
      match space.values(member) {
        Some(values) => lengths.push((member, values.len())),
        None => problems.push(format!(
          "zip group [{}] references '{}', which is not a defined parameter",
          group.name(),
          member
        )),
      }
    }

    if let Some((_, first)) = lengths.first()
      && lengths.iter().any(|(_, len)| len != first)
    {
      let detail: Vec<String> = lengths.iter().map(|(m, len)| format!("{}={}", m, len)).collect();
      problems.push(format!(
        "zip group [{}] has mismatched candidate counts ({})",
        group.name(),
        detail.join(", ")
      ));
    }
  }
}

fn string_list(value: &VariantValue, layer: &str, key: &str, problems: &mut Vec<String>) -> Vec<String> {
  match value {
    VariantValue::String(s) => vec![s.clone()],
    VariantValue::List(items) => {
      let mut out = Vec::with_capacity(items.len());
      for item in items {
        match item.as_str() {
          Some(s) => out.push(s.to_string()),
          None => problems.push(format!("'{}' in {} must be a list of parameter names", key, layer)),
        }
      }
      out
    }
    _ => {
      problems.push(format!("'{}' in {} must be a list of parameter names", key, layer));
      Vec::new()
    }
  }
}

/// Accepts a list of lists of names, or a single flat list as one group.
fn zip_groups(value: &VariantValue, layer: &str, problems: &mut Vec<String>) -> Vec<ZipGroup> {
  let invalid = || format!("zip_keys in {} must be a list of lists of parameter names", layer);

  let VariantValue::List(items) = value else {
    problems.push(invalid());
    return Vec::new();
  };

  if items.iter().all(|i| matches!(i, VariantValue::String(_))) {
    let names = items.iter().filter_map(|i| i.as_str().map(str::to_string)).collect();
    return vec![ZipGroup(names)];
  }

  let mut groups = Vec::new();
  for item in items {
    match item {
      VariantValue::List(names) if names.iter().all(|n| n.as_str().is_some()) => {
        groups.push(ZipGroup(names.iter().filter_map(|n| n.as_str().map(str::to_string)).collect()));
      }
      _ => {
        problems.push(invalid());
        return Vec::new();
      }
    }
  }
  groups
}

/// Lists are unioned in order, maps merged key by key, scalars replaced.
fn merge_extend(existing: VariantValue, incoming: VariantValue) -> VariantValue {
  match (existing, incoming) {
    (VariantValue::List(mut old), VariantValue::List(new)) => {
      for item in new {
        if !old.contains(&item) {
          old.push(item);
        }
      }
      VariantValue::List(old)
    }
    (VariantValue::Map(mut old), VariantValue::Map(new)) => {
      old.extend(new);
      VariantValue::Map(old)
    }
    (_, incoming) => incoming,
  }
}

impl ParameterSpace {
  /// Restrict the space to the listed candidate values of `key`.
  ///
  /// For a zipped key whole rows are kept or dropped so that the other
  /// members stay aligned. Values are compared by their display form.
  pub fn select(&mut self, key: &str, wanted: &[VariantValue]) -> Result<(), VariantConfigError> {
    let wanted: BTreeSet<String> = wanted.iter().map(|v| v.to_string()).collect();
    let empty = || VariantConfigError::EmptySelection {
      key: key.to_string(),
      values: wanted.iter().cloned().collect::<Vec<_>>().join(","),
    };

    let values = self
      .values(key)
      .ok_or_else(|| VariantConfigError::UnknownParameter(key.to_string()))?;
    let keep: Vec<bool> = values.iter().map(|v| wanted.contains(&v.to_string())).collect();
    if !keep.iter().any(|k| *k) {
      return Err(empty());
    }

    let members: Vec<String> = match self.zip_group_of(key) {
      Some(group) => group.members().to_vec(),
      None => vec![key.to_string()],
    };

    for (name, candidates) in self.params.iter_mut() {
      if !members.contains(name) {
        continue;
      }
      let mut row = 0;
      candidates.retain(|_| {
        let retained = keep.get(row).copied().unwrap_or(false);
        row += 1;
        retained
      });
    }

    debug!(key = %key, rows = keep.iter().filter(|k| **k).count(), "selected variant subspace");
    Ok(())
  }
}
