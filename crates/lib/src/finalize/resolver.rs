//! The dependency resolver boundary and its implementations.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::recipe::{Environment, PackageSpec};
use crate::version::{self, Version};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
  /// Applies only when the source is a host dependency.
  Weak,
  /// Applies when the source is a build or host dependency.
  Strong,
}

/// Installing `source` at build/host time adds `target` to the consumer's run list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunExport {
  pub source: String,
  pub strength: Strength,
  pub target: PackageSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
  #[error("no package satisfies '{spec}' in the {env} environment")]
  NotFound { spec: String, env: Environment },

  #[error("resolver failed: {0}")]
  Backend(String),
}

impl ResolveError {
  pub fn is_not_found(&self) -> bool {
    matches!(self, ResolveError::NotFound { .. })
  }
}

/// Picks concrete versions and reports run-exports of existing packages.
pub trait DependencyResolver {
  /// The version that would be installed for `spec` in `env`.
  fn resolve_version(&self, spec: &PackageSpec, env: Environment) -> Result<String, ResolveError>;

  /// Run-exports declared by `name` at `version`. Unknown packages export nothing.
  fn run_exports_of(&self, name: &str, version: &str) -> Result<Vec<RunExport>, ResolveError>;
}

/// Resolver that knows no packages.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyResolver;

impl DependencyResolver for EmptyResolver {
  fn resolve_version(&self, spec: &PackageSpec, env: Environment) -> Result<String, ResolveError> {
    Err(ResolveError::NotFound {
      spec: spec.to_string(),
      env,
    })
  }

  fn run_exports_of(&self, _name: &str, _version: &str) -> Result<Vec<RunExport>, ResolveError> {
    Ok(Vec::new())
  }
}

/// Memoizes another resolver for the duration of one run.
pub struct ResolverCache<'a> {
  inner: &'a dyn DependencyResolver,
  versions: RefCell<HashMap<(PackageSpec, Environment), Result<String, ResolveError>>>,
  exports: RefCell<HashMap<(String, String), Result<Vec<RunExport>, ResolveError>>>,
}

impl<'a> ResolverCache<'a> {
  pub fn new(inner: &'a dyn DependencyResolver) -> Self {
    Self {
      inner,
      versions: RefCell::new(HashMap::new()),
      exports: RefCell::new(HashMap::new()),
    }
  }

  /// Number of distinct queries answered so far.
  pub fn len(&self) -> usize {
    self.versions.borrow().len() + self.exports.borrow().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl DependencyResolver for ResolverCache<'_> {
  fn resolve_version(&self, spec: &PackageSpec, env: Environment) -> Result<String, ResolveError> {
    let key = (spec.clone(), env);
    if let Some(cached) = self.versions.borrow().get(&key) {
      return cached.clone();
    }
    let result = self.inner.resolve_version(spec, env);
    trace!(spec = %spec, env = %env, ok = result.is_ok(), "resolved version");
    self.versions.borrow_mut().insert(key, result.clone());
    result
  }

  fn run_exports_of(&self, name: &str, version: &str) -> Result<Vec<RunExport>, ResolveError> {
    let key = (name.to_string(), version.to_string());
    if let Some(cached) = self.exports.borrow().get(&key) {
      return cached.clone();
    }
    let result = self.inner.run_exports_of(name, version);
    self.exports.borrow_mut().insert(key, result.clone());
    result
  }
}

#[derive(Debug, Error)]
pub enum IndexError {
  #[error("failed to read package index {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse package index {path}: {message}")]
  Parse { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRunExports {
  #[serde(default)]
  pub weak: Vec<String>,
  #[serde(default)]
  pub strong: Vec<String>,
}

/// One previously built package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
  pub version: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub build: Option<String>,
  #[serde(default)]
  pub run_exports: IndexRunExports,
}

/// File-backed resolver over previously built packages.
///
/// ```yaml
/// packages:
///   zlib:
///     - version: "1.3.1"
///       run_exports:
///         weak: ["zlib >=1.3.1,<2.0a0"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageIndex {
  #[serde(default)]
  pub packages: BTreeMap<String, Vec<IndexRecord>>,
}

impl PackageIndex {
  pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(text)
  }

  pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(text)
  }

  /// Load an index file. `.json` files are read as JSON, anything else as YAML.
  pub fn from_file(path: &Path) -> Result<Self, IndexError> {
    let text = std::fs::read_to_string(path).map_err(|source| IndexError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    let parse_err = |message: String| IndexError::Parse {
      path: path.to_path_buf(),
      message,
    };
    let index = match path.extension().and_then(|e| e.to_str()) {
      Some("json") => Self::from_json_str(&text).map_err(|e| parse_err(e.to_string()))?,
      _ => Self::from_yaml_str(&text).map_err(|e| parse_err(e.to_string()))?,
    };
    debug!(path = %path.display(), packages = index.packages.len(), "loaded package index");
    Ok(index)
  }

  pub fn insert(&mut self, name: impl Into<String>, record: IndexRecord) {
    self.packages.entry(name.into()).or_default().push(record);
  }

  fn candidates<'s>(&'s self, spec: &'s PackageSpec) -> impl Iterator<Item = &'s IndexRecord> + 's {
    self
      .packages
      .get(&spec.name)
      .into_iter()
      .flatten()
      .filter(move |record| match &spec.version {
        Some(constraint) => version::matches(&record.version, constraint),
        None => true,
      })
      .filter(move |record| match (&spec.build, &record.build) {
        (Some(wanted), Some(build)) => wanted == build,
        (Some(_), None) => false,
        (None, _) => true,
      })
  }
}

impl DependencyResolver for PackageIndex {
  fn resolve_version(&self, spec: &PackageSpec, env: Environment) -> Result<String, ResolveError> {
    self
      .candidates(spec)
      .max_by(|a, b| Version::parse(&a.version).cmp(&Version::parse(&b.version)))
      .map(|record| record.version.clone())
      .ok_or_else(|| ResolveError::NotFound {
        spec: spec.to_string(),
        env,
      })
  }

  fn run_exports_of(&self, name: &str, version: &str) -> Result<Vec<RunExport>, ResolveError> {
    let Some(record) = self
      .packages
      .get(name)
      .and_then(|records| records.iter().find(|r| r.version == version))
    else {
      return Ok(Vec::new());
    };

    let mut exports = Vec::new();
    for (strength, specs) in [
      (Strength::Weak, &record.run_exports.weak),
      (Strength::Strong, &record.run_exports.strong),
    ] {
      for text in specs {
        match PackageSpec::parse(text) {
          Some(target) => exports.push(RunExport {
            source: name.to_string(),
            strength,
            target,
          }),
          None => warn!(package = %name, export = %text, "ignoring malformed run-export"),
        }
      }
    }
    Ok(exports)
  }
}
