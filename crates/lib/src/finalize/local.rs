use crate::build::Configuration;
use crate::recipe::PackageSpec;
use crate::variant::Assignment;
use crate::version;

use super::resolver::{RunExport, Strength};

/// Configurations finalized earlier in the run.
///
/// Consulted before the resolver so that a recipe can depend on an output
/// of another recipe that has not been built yet.
#[derive(Debug, Clone, Default)]
pub struct LocalPackages {
  packages: Vec<Configuration>,
}

impl LocalPackages {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&mut self, config: Configuration) {
    self.packages.push(config);
  }

  pub fn contains(&self, name: &str) -> bool {
    self.packages.iter().any(|c| c.name == name)
  }

  pub fn len(&self) -> usize {
    self.packages.len()
  }

  pub fn is_empty(&self) -> bool {
    self.packages.is_empty()
  }

  /// The configuration `spec` refers to for a consumer built with `variant`.
  ///
  /// Among several matching variants, the first one whose assignment agrees
  /// with the consumer's on shared parameters wins, else the first match.
  pub fn select(&self, spec: &PackageSpec, variant: &Assignment) -> Option<&Configuration> {
    let mut candidates = self.packages.iter().filter(|c| {
      c.name == spec.name
        && spec
          .version
          .as_deref()
          .is_none_or(|constraint| version::matches(&c.version, constraint))
        && spec.build.as_deref().is_none_or(|build| build == c.build_string)
    });
    let first = candidates.next()?;
    if first.variant.agrees_with(variant) {
      return Some(first);
    }
    candidates.find(|c| c.variant.agrees_with(variant)).or(Some(first))
  }
}

/// Run-exports a finalized configuration hands to its consumers.
pub fn run_exports_of(config: &Configuration) -> Vec<RunExport> {
  let weak = config.run_exports.weak.iter().map(|t| (Strength::Weak, t));
  let strong = config.run_exports.strong.iter().map(|t| (Strength::Strong, t));
  weak
    .chain(strong)
    .map(|(strength, target)| RunExport {
      source: config.name.clone(),
      strength,
      target: target.clone(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::variant::VariantValue;

  fn lib(python: &str, build: &str) -> Configuration {
    let mut config = Configuration::new("lib", "libfoo", "1.2.3");
    config.build_string = build.to_string();
    config.variant.insert("python", VariantValue::from(python));
    config
  }

  fn variant(python: &str) -> Assignment {
    [("python".to_string(), VariantValue::from(python))].into_iter().collect()
  }

  #[test]
  fn prefers_agreeing_variant() {
    let mut local = LocalPackages::new();
    local.register(lib("3.11", "ha_0"));
    local.register(lib("3.12", "hb_0"));
    let picked = local.select(&PackageSpec::new("libfoo"), &variant("3.12")).unwrap();
    assert_eq!(picked.build_string, "hb_0");
  }

  #[test]
  fn falls_back_to_first_match() {
    let mut local = LocalPackages::new();
    local.register(lib("3.11", "ha_0"));
    let picked = local.select(&PackageSpec::new("libfoo"), &variant("3.13")).unwrap();
    assert_eq!(picked.build_string, "ha_0");
  }

  #[test]
  fn constraint_must_match() {
    let mut local = LocalPackages::new();
    local.register(lib("3.11", "ha_0"));
    let spec = PackageSpec::new("libfoo").with_version(">=2");
    assert!(local.select(&spec, &Assignment::new()).is_none());
    let spec = PackageSpec::new("libfoo").with_version("1.2.3").with_build("hx_0");
    assert!(local.select(&spec, &Assignment::new()).is_none());
  }

  #[test]
  fn exports_keep_strength() {
    let mut config = lib("3.11", "ha_0");
    config.run_exports.weak.push(PackageSpec::new("libfoo").with_version(">=1.2.3,<2.0a0"));
    config.run_exports.strong.push(PackageSpec::new("libfoo-rt"));
    let exports = run_exports_of(&config);
    assert_eq!(exports.len(), 2);
    assert_eq!(exports[0].strength, Strength::Weak);
    assert_eq!(exports[1].strength, Strength::Strong);
    assert_eq!(exports[1].source, "libfoo");
  }
}
