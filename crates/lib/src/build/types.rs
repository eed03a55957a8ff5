use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::recipe::{Environment, PackageSpec, TestSection};
use crate::util::hash::BuildHash;
use crate::variant::Assignment;

/// Requirement lists after pins, variant binding and run-exports are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRequirements {
  pub build: Vec<PackageSpec>,
  pub host: Vec<PackageSpec>,
  pub run: Vec<PackageSpec>,
}

impl ResolvedRequirements {
  pub fn get(&self, env: Environment) -> &[PackageSpec] {
    match env {
      Environment::Build => &self.build,
      Environment::Host => &self.host,
      Environment::Run => &self.run,
    }
  }

  pub fn iter(&self) -> impl Iterator<Item = (Environment, &PackageSpec)> {
    [Environment::Build, Environment::Host, Environment::Run]
      .into_iter()
      .flat_map(move |env| self.get(env).iter().map(move |spec| (env, spec)))
  }

  /// Names listed in host or run.
  pub fn host_and_run_names(&self) -> BTreeSet<&str> {
    self
      .host
      .iter()
      .chain(self.run.iter())
      .map(|spec| spec.name.as_str())
      .collect()
  }
}

/// Run-exports an output hands to its consumers, fully resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRunExports {
  #[serde(default)]
  pub weak: Vec<PackageSpec>,
  #[serde(default)]
  pub strong: Vec<PackageSpec>,
}

/// A finalized unit of work: one output with resolved requirements and build string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
  /// Recipe the configuration was expanded from.
  pub recipe: String,
  pub name: String,
  pub version: String,
  pub build_number: u64,
  pub build_string: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub hash: Option<BuildHash>,
  /// Full assignment of the matrix point.
  pub variant: Assignment,
  /// The assignment restricted to parameters this output used.
  pub used: Assignment,
  pub requirements: ResolvedRequirements,
  #[serde(default)]
  pub run_exports: ResolvedRunExports,
  #[serde(default)]
  pub force_use_keys: BTreeSet<String>,
  #[serde(default)]
  pub force_ignore_keys: BTreeSet<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub script: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub noarch: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub test: Option<TestSection>,
  /// Synthesized package depending on every sibling output.
  #[serde(default)]
  pub metapackage: bool,
  /// Filenames of configurations that must be built first.
  #[serde(default)]
  pub depends_on: Vec<String>,
}

impl Configuration {
  /// A configuration with empty requirements and no build string yet.
  pub fn new(recipe: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
    Self {
      recipe: recipe.into(),
      name: name.into(),
      version: version.into(),
      build_number: 0,
      build_string: String::new(),
      hash: None,
      variant: Assignment::new(),
      used: Assignment::new(),
      requirements: ResolvedRequirements::default(),
      run_exports: ResolvedRunExports::default(),
      force_use_keys: BTreeSet::new(),
      force_ignore_keys: BTreeSet::new(),
      script: None,
      noarch: None,
      test: None,
      metapackage: false,
      depends_on: Vec::new(),
    }
  }

  /// Artifact filename stem: `name-version-build_string`.
  pub fn filename(&self) -> String {
    format!("{}-{}-{}", self.name, self.version, self.build_string)
  }

  /// The exact spec other packages use to pin this one.
  pub fn exact_spec(&self) -> PackageSpec {
    PackageSpec::new(&self.name)
      .with_version(&self.version)
      .with_build(&self.build_string)
  }
}

impl fmt::Display for Configuration {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.filename())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn filename_joins_identity() {
    let mut config = Configuration::new("foo", "libfoo", "1.2.3");
    config.build_string = "h1a2b3c4_0".to_string();
    assert_eq!(config.filename(), "libfoo-1.2.3-h1a2b3c4_0");
    assert_eq!(config.exact_spec().to_string(), "libfoo 1.2.3 h1a2b3c4_0");
  }

  #[test]
  fn host_and_run_names_skip_build() {
    let reqs = ResolvedRequirements {
      build: vec![PackageSpec::new("gcc")],
      host: vec![PackageSpec::new("python")],
      run: vec![PackageSpec::new("zlib")],
    };
    let names = reqs.host_and_run_names();
    assert!(names.contains("python"));
    assert!(names.contains("zlib"));
    assert!(!names.contains("gcc"));
  }
}
