use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::render::UsedParameterSet;

/// A match spec: `name [version-constraint [build-string]]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageSpec {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub build: Option<String>,
}

impl PackageSpec {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      version: None,
      build: None,
    }
  }

  pub fn with_version(mut self, version: impl Into<String>) -> Self {
    self.version = Some(version.into());
    self
  }

  pub fn with_build(mut self, build: impl Into<String>) -> Self {
    self.build = Some(build.into());
    self
  }

  /// Parse `name`, `name 1.2`, `name >=1.2,<2 h1234_0` or `name>=1.2`.
  pub fn parse(text: &str) -> Option<Self> {
    let text = text.trim();
    if text.is_empty() {
      return None;
    }
    let split_at = text
      .find(|c: char| c.is_whitespace() || matches!(c, '<' | '>' | '=' | '!' | '~'))
      .unwrap_or(text.len());
    let (name, rest) = text.split_at(split_at);
    if name.is_empty() {
      return None;
    }
    let mut rest = rest.split_whitespace();
    Some(Self {
      name: name.to_string(),
      version: rest.next().map(str::to_string),
      build: rest.next().map(str::to_string),
    })
  }

  /// A spec with no version or build constraint.
  pub fn is_bare(&self) -> bool {
    self.version.is_none() && self.build.is_none()
  }
}

impl fmt::Display for PackageSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name)?;
    if let Some(version) = &self.version {
      write!(f, " {}", version)?;
    }
    if let Some(build) = &self.build {
      write!(f, " {}", build)?;
    }
    Ok(())
  }
}

/// Place/range arguments shared by `pin_subpackage` and `pin_compatible`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinArgs {
  #[serde(default)]
  pub exact: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub min_pin: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_pin: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub lower_bound: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub upper_bound: Option<String>,
}

/// One requirement entry as written in a rendered document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DependencySpec {
  Package(PackageSpec),
  /// Pin against another output of the same recipe.
  PinSubpackage { name: String, pin: PinArgs },
  /// Pin against the version resolved for `name` in host or build.
  PinCompatible { name: String, pin: PinArgs },
}

impl DependencySpec {
  pub fn package(text: &str) -> Option<Self> {
    PackageSpec::parse(text).map(DependencySpec::Package)
  }

  pub fn name(&self) -> &str {
    match self {
      DependencySpec::Package(spec) => &spec.name,
      DependencySpec::PinSubpackage { name, .. } | DependencySpec::PinCompatible { name, .. } => name,
    }
  }
}

impl fmt::Display for DependencySpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DependencySpec::Package(spec) => write!(f, "{}", spec),
      DependencySpec::PinSubpackage { name, pin } => {
        write!(f, "pin_subpackage({}{})", name, if pin.exact { ", exact" } else { "" })
      }
      DependencySpec::PinCompatible { name, pin } => {
        write!(f, "pin_compatible({}{})", name, if pin.exact { ", exact" } else { "" })
      }
    }
  }
}

/// The three requirement environments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
  Build,
  Host,
  Run,
}

impl Environment {
  pub fn as_str(&self) -> &'static str {
    match self {
      Environment::Build => "build",
      Environment::Host => "host",
      Environment::Run => "run",
    }
  }
}

impl fmt::Display for Environment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirements {
  #[serde(default)]
  pub build: Vec<DependencySpec>,
  #[serde(default)]
  pub host: Vec<DependencySpec>,
  #[serde(default)]
  pub run: Vec<DependencySpec>,
}

impl Requirements {
  pub fn get(&self, env: Environment) -> &[DependencySpec] {
    match env {
      Environment::Build => &self.build,
      Environment::Host => &self.host,
      Environment::Run => &self.run,
    }
  }

  pub fn get_mut(&mut self, env: Environment) -> &mut Vec<DependencySpec> {
    match env {
      Environment::Build => &mut self.build,
      Environment::Host => &mut self.host,
      Environment::Run => &mut self.run,
    }
  }

  pub fn iter(&self) -> impl Iterator<Item = (Environment, &DependencySpec)> {
    [Environment::Build, Environment::Host, Environment::Run]
      .into_iter()
      .flat_map(move |env| self.get(env).iter().map(move |spec| (env, spec)))
  }
}

/// Declared run-exports of an output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunExportDecl {
  #[serde(default)]
  pub weak: Vec<DependencySpec>,
  #[serde(default)]
  pub strong: Vec<DependencySpec>,
}

impl RunExportDecl {
  pub fn is_empty(&self) -> bool {
    self.weak.is_empty() && self.strong.is_empty()
  }
}

/// Build section of a document or an output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOptions {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub number: Option<u64>,
  /// Explicit build string; disables the computed one.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub string: Option<String>,
  #[serde(default)]
  pub skip: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub script: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub noarch: Option<String>,
  #[serde(default)]
  pub run_exports: RunExportDecl,
  #[serde(default)]
  pub ignore_run_exports: Vec<String>,
  #[serde(default)]
  pub ignore_run_exports_from: Vec<String>,
  #[serde(default)]
  pub force_use_keys: Vec<String>,
  #[serde(default)]
  pub force_ignore_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSection {
  #[serde(default)]
  pub requires: Vec<String>,
  #[serde(default)]
  pub commands: Vec<String>,
  #[serde(default)]
  pub imports: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageIdentity {
  pub name: String,
  pub version: String,
}

/// One buildable artifact declared by a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
  /// `None` means the output declared no requirements section at all.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub requirements: Option<Requirements>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub build: Option<BuildOptions>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub test: Option<TestSection>,
  /// Parameters read while this output was rendered, including document-level reads.
  #[serde(default)]
  pub used: UsedParameterSet,
}

/// A recipe rendered for one assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedDocument {
  pub package: PackageIdentity,
  #[serde(default)]
  pub source: Vec<BTreeMap<String, String>>,
  #[serde(default)]
  pub build: BuildOptions,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub requirements: Option<Requirements>,
  #[serde(default)]
  pub outputs: Vec<Output>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub test: Option<TestSection>,
  #[serde(default)]
  pub about: BTreeMap<String, String>,
}

impl RenderedDocument {
  pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
    Self {
      package: PackageIdentity {
        name: name.into(),
        version: version.into(),
      },
      source: Vec::new(),
      build: BuildOptions::default(),
      requirements: None,
      outputs: Vec::new(),
      test: None,
      about: BTreeMap::new(),
    }
  }

  pub fn has_explicit_outputs(&self) -> bool {
    !self.outputs.is_empty()
  }

  /// Outputs to finalize, in declaration order.
  ///
  /// A document without explicit outputs yields itself as the single output.
  /// An explicit output with no requirements section inherits the document's
  /// requirements; otherwise every environment is taken from the output.
  pub fn effective_outputs(&self, document_used: &UsedParameterSet) -> Vec<Output> {
    if self.outputs.is_empty() {
      return vec![Output {
        name: self.package.name.clone(),
        version: Some(self.package.version.clone()),
        requirements: self.requirements.clone(),
        build: Some(self.build.clone()),
        test: self.test.clone(),
        used: document_used.clone(),
      }];
    }

    self
      .outputs
      .iter()
      .map(|output| {
        let mut output = output.clone();
        if output.version.is_none() {
          output.version = Some(self.package.version.clone());
        }
        if output.requirements.is_none() {
          output.requirements = self.requirements.clone();
        }
        output
      })
      .collect()
  }
}
