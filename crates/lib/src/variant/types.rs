//! Core variant types: values, assignments, zip groups and the parameter space.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::consts::{IGNORE_BUILD_ONLY_DEPS, IGNORE_VERSION, PIN_RUN_AS_BUILD};

/// A candidate value of a variant parameter.
///
/// Variant files may carry scalars or structured values. Versions should be
/// quoted in YAML so that `3.10` stays a string rather than becoming `3.1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariantValue {
  Boolean(bool),
  Integer(i64),
  Float(f64),
  String(String),
  List(Vec<VariantValue>),
  Map(BTreeMap<String, VariantValue>),
}

impl VariantValue {
  pub fn as_str(&self) -> Option<&str> {
    match self {
      VariantValue::String(s) => Some(s),
      _ => None,
    }
  }

  /// Wrap scalars into a single-element list; lists pass through.
  pub fn into_candidates(self) -> Vec<VariantValue> {
    match self {
      VariantValue::List(items) => items,
      other => vec![other],
    }
  }
}

impl fmt::Display for VariantValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      VariantValue::Boolean(b) => write!(f, "{}", b),
      VariantValue::Integer(i) => write!(f, "{}", i),
      VariantValue::Float(x) => write!(f, "{}", x),
      VariantValue::String(s) => write!(f, "{}", s),
      VariantValue::List(_) | VariantValue::Map(_) => {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        write!(f, "{}", json)
      }
    }
  }
}

impl From<&str> for VariantValue {
  fn from(value: &str) -> Self {
    VariantValue::String(value.to_string())
  }
}

impl From<String> for VariantValue {
  fn from(value: String) -> Self {
    VariantValue::String(value)
  }
}

impl From<i64> for VariantValue {
  fn from(value: i64) -> Self {
    VariantValue::Integer(value)
  }
}

impl From<bool> for VariantValue {
  fn from(value: bool) -> Self {
    VariantValue::Boolean(value)
  }
}

/// One row of the expanded matrix: parameter name to a single value.
///
/// Keys are kept sorted so that display and serialization never depend on
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Assignment(BTreeMap<String, VariantValue>);

impl Assignment {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, key: &str) -> Option<&VariantValue> {
    self.0.get(key)
  }

  pub fn contains_key(&self, key: &str) -> bool {
    self.0.contains_key(key)
  }

  pub fn insert(&mut self, key: impl Into<String>, value: VariantValue) {
    self.0.insert(key.into(), value);
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &VariantValue)> {
    self.0.iter()
  }

  pub fn keys(&self) -> impl Iterator<Item = &String> {
    self.0.keys()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Restrict this assignment to the given keys. Keys without a value are dropped.
  pub fn project<'a>(&self, keys: impl IntoIterator<Item = &'a String>) -> Assignment {
    let mut projected = Assignment::new();
    for key in keys {
      if let Some(value) = self.0.get(key) {
        projected.insert(key.clone(), value.clone());
      }
    }
    projected
  }

  /// True when both assignments hold equal values for every key they share.
  pub fn agrees_with(&self, other: &Assignment) -> bool {
    self
      .0
      .iter()
      .all(|(key, value)| other.get(key).is_none_or(|theirs| theirs == value))
  }

  pub fn into_inner(self) -> BTreeMap<String, VariantValue> {
    self.0
  }
}

impl fmt::Display for Assignment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.0.is_empty() {
      return write!(f, "<empty>");
    }
    let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    write!(f, "{}", parts.join(", "))
  }
}

impl FromIterator<(String, VariantValue)> for Assignment {
  fn from_iter<T: IntoIterator<Item = (String, VariantValue)>>(iter: T) -> Self {
    Assignment(iter.into_iter().collect())
  }
}

/// Parameters whose values are selected in lockstep.
///
/// Members keep the order in which they were declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZipGroup(pub Vec<String>);

impl ZipGroup {
  /// Group name, the members joined by commas.
  pub fn name(&self) -> String {
    self.0.join(",")
  }

  pub fn members(&self) -> &[String] {
    &self.0
  }

  pub fn contains(&self, key: &str) -> bool {
    self.0.iter().any(|m| m == key)
  }

  /// Same membership regardless of order.
  pub fn same_members(&self, other: &ZipGroup) -> bool {
    let a: BTreeSet<&String> = self.0.iter().collect();
    let b: BTreeSet<&String> = other.0.iter().collect();
    a == b
  }
}

/// Lower and upper pin expressions, e.g. `x.x` / `x`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinExpression {
  pub min_pin: Option<String>,
  pub max_pin: Option<String>,
}

/// The merged variant configuration of one build invocation.
///
/// Parameters keep their declaration order; that order alone decides the
/// order of the expanded matrix.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParameterSpace {
  pub(crate) params: Vec<(String, Vec<VariantValue>)>,
  pub(crate) zip_groups: Vec<ZipGroup>,
  /// Merged pass-through keys (`pin_run_as_build`, `ignore_version`, user extend keys).
  pub(crate) extend: BTreeMap<String, VariantValue>,
  pub(crate) force_use_keys: BTreeSet<String>,
  pub(crate) force_ignore_keys: BTreeSet<String>,
}

impl ParameterSpace {
  pub fn params(&self) -> impl Iterator<Item = (&String, &Vec<VariantValue>)> {
    self.params.iter().map(|(k, v)| (k, v))
  }

  pub fn keys(&self) -> impl Iterator<Item = &String> {
    self.params.iter().map(|(k, _)| k)
  }

  pub fn values(&self, key: &str) -> Option<&[VariantValue]> {
    self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_slice())
  }

  pub fn contains(&self, key: &str) -> bool {
    self.params.iter().any(|(k, _)| k == key)
  }

  pub fn len(&self) -> usize {
    self.params.len()
  }

  pub fn is_empty(&self) -> bool {
    self.params.is_empty()
  }

  pub fn zip_groups(&self) -> &[ZipGroup] {
    &self.zip_groups
  }

  pub fn zip_group_of(&self, key: &str) -> Option<&ZipGroup> {
    self.zip_groups.iter().find(|g| g.contains(key))
  }

  pub fn extend_value(&self, key: &str) -> Option<&VariantValue> {
    self.extend.get(key)
  }

  pub fn force_use_keys(&self) -> &BTreeSet<String> {
    &self.force_use_keys
  }

  pub fn force_ignore_keys(&self) -> &BTreeSet<String> {
    &self.force_ignore_keys
  }

  /// Parameters excluded from the hash through `ignore_version`.
  pub fn ignore_version(&self) -> BTreeSet<String> {
    self.extend_names(IGNORE_VERSION)
  }

  /// Parameters that stay out of the hash while their package is only a
  /// build tool (absent from host and run).
  pub fn ignore_build_only_deps(&self) -> BTreeSet<String> {
    self.extend_names(IGNORE_BUILD_ONLY_DEPS)
  }

  fn extend_names(&self, key: &str) -> BTreeSet<String> {
    match self.extend.get(key) {
      Some(VariantValue::List(items)) => items.iter().map(|v| v.to_string()).collect(),
      Some(VariantValue::String(s)) => BTreeSet::from([s.clone()]),
      _ => BTreeSet::new(),
    }
  }

  /// Pin applied to a bare run requirement of `package`, if configured.
  ///
  /// Accepts either `{min_pin, max_pin}` or a single expression used for both.
  pub fn pin_run_as_build(&self, package: &str) -> Option<PinExpression> {
    let Some(VariantValue::Map(pins)) = self.extend.get(PIN_RUN_AS_BUILD) else {
      return None;
    };
    let normalized = normalize_key(package);
    let (_, entry) = pins.iter().find(|(name, _)| normalize_key(name) == normalized)?;
    match entry {
      VariantValue::Map(m) => Some(PinExpression {
        min_pin: m.get("min_pin").map(|v| v.to_string()),
        max_pin: m.get("max_pin").map(|v| v.to_string()),
      }),
      VariantValue::String(expr) => Some(PinExpression {
        min_pin: Some(expr.clone()),
        max_pin: Some(expr.clone()),
      }),
      _ => None,
    }
  }
}

/// Compare package and parameter names regardless of `-`/`_`.
pub fn normalize_key(name: &str) -> String {
  name.replace('-', "_")
}

#[cfg(test)]
mod tests {
  use super::*;

  mod variant_value {
    use super::*;

    #[test]
    fn display_scalars() {
      assert_eq!(VariantValue::from("3.11").to_string(), "3.11");
      assert_eq!(VariantValue::Integer(2).to_string(), "2");
      assert_eq!(VariantValue::Boolean(true).to_string(), "true");
    }

    #[test]
    fn display_structured_as_json() {
      let value = VariantValue::List(vec![VariantValue::from("a"), VariantValue::Integer(1)]);
      assert_eq!(value.to_string(), r#"["a",1]"#);
    }

    #[test]
    fn scalar_becomes_single_candidate() {
      assert_eq!(VariantValue::from("x").into_candidates(), vec![VariantValue::from("x")]);
    }

    #[test]
    fn unquoted_yaml_version_is_a_float() {
      let value: VariantValue = serde_yaml::from_str("3.10").unwrap();
      assert_eq!(value, VariantValue::Float(3.1));
      let value: VariantValue = serde_yaml::from_str("'3.10'").unwrap();
      assert_eq!(value, VariantValue::from("3.10"));
    }
  }

  mod assignment {
    use super::*;

    fn sample() -> Assignment {
      [
        ("python".to_string(), VariantValue::from("3.11")),
        ("c_compiler".to_string(), VariantValue::from("gcc")),
      ]
      .into_iter()
      .collect()
    }

    #[test]
    fn display_is_sorted() {
      assert_eq!(sample().to_string(), "c_compiler=gcc, python=3.11");
      assert_eq!(Assignment::new().to_string(), "<empty>");
    }

    #[test]
    fn project_keeps_only_requested_keys() {
      let keys = vec!["python".to_string(), "missing".to_string()];
      let projected = sample().project(&keys);
      assert_eq!(projected.len(), 1);
      assert_eq!(projected.get("python"), Some(&VariantValue::from("3.11")));
    }

    #[test]
    fn agrees_on_shared_keys_only() {
      let mut other = Assignment::new();
      other.insert("python", VariantValue::from("3.11"));
      other.insert("numpy", VariantValue::from("1.26"));
      assert!(sample().agrees_with(&other));

      other.insert("python", VariantValue::from("3.12"));
      assert!(!sample().agrees_with(&other));
    }
  }

  mod parameter_space {
    use super::*;

    #[test]
    fn pin_run_as_build_accepts_both_shapes() {
      let mut space = ParameterSpace::default();
      let mut pins = BTreeMap::new();
      pins.insert(
        "python".to_string(),
        VariantValue::Map(BTreeMap::from([
          ("min_pin".to_string(), VariantValue::from("x.x")),
          ("max_pin".to_string(), VariantValue::from("x.x")),
        ])),
      );
      pins.insert("r-base".to_string(), VariantValue::from("x.x"));
      space.extend.insert(PIN_RUN_AS_BUILD.to_string(), VariantValue::Map(pins));

      let python = space.pin_run_as_build("python").unwrap();
      assert_eq!(python.max_pin.as_deref(), Some("x.x"));
      let r = space.pin_run_as_build("r_base").unwrap();
      assert_eq!(r.min_pin.as_deref(), Some("x.x"));
      assert!(space.pin_run_as_build("numpy").is_none());
    }

    #[test]
    fn ignore_version_reads_list() {
      let mut space = ParameterSpace::default();
      space.extend.insert(
        IGNORE_VERSION.to_string(),
        VariantValue::List(vec![VariantValue::from("numpy")]),
      );
      assert_eq!(space.ignore_version(), BTreeSet::from(["numpy".to_string()]));
    }
  }
}
