//! The result of planning a run.
//!
//! A [`Manifest`] lists every finalized [`Configuration`] in dependency order,
//! the parallel waves they can be built in, and every per-configuration failure
//! collected along the way.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::build::Configuration;
use crate::variant::Assignment;

/// What stage a collected failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
  Render,
  UnresolvedPin,
  CyclicPin,
  PinCompatible,
  Resolve,
}

/// A failure isolated to one matrix point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationFailure {
  pub recipe: String,
  pub assignment: Assignment,
  pub kind: FailureKind,
  pub message: String,
}

impl fmt::Display for ConfigurationFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} [{}]: {}", self.recipe, self.assignment, self.message)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
  /// Configurations in dependency order.
  pub configurations: Vec<Configuration>,
  /// Indices into `configurations`, grouped into waves that can build in parallel.
  #[serde(default)]
  pub waves: Vec<Vec<usize>>,
  #[serde(default)]
  pub failures: Vec<ConfigurationFailure>,
}

impl Manifest {
  pub fn is_success(&self) -> bool {
    self.failures.is_empty()
  }

  pub fn filenames(&self) -> Vec<String> {
    self.configurations.iter().map(Configuration::filename).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::variant::VariantValue;

  #[test]
  fn failure_display_includes_assignment() {
    let mut assignment = Assignment::new();
    assignment.insert("python", VariantValue::from("3.12"));
    let failure = ConfigurationFailure {
      recipe: "foo".to_string(),
      assignment,
      kind: FailureKind::Render,
      message: "undefined variant parameter 'cuda'".to_string(),
    };
    assert_eq!(
      failure.to_string(),
      "foo [python=3.12]: undefined variant parameter 'cuda'"
    );
  }

  #[test]
  fn manifest_success_tracks_failures() {
    let mut manifest = Manifest::default();
    assert!(manifest.is_success());
    manifest.failures.push(ConfigurationFailure {
      recipe: "foo".to_string(),
      assignment: Assignment::new(),
      kind: FailureKind::Resolve,
      message: "boom".to_string(),
    });
    assert!(!manifest.is_success());
  }
}
