//! Requirement finalization.
//!
//! Turns one expanded variant into a [`Configuration`] per output: pins are
//! evaluated, versions resolved, run-exports propagated from direct build and
//! host dependencies, and the build string assigned.

mod local;
mod resolver;

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tracing::{debug, trace};

pub use local::{LocalPackages, run_exports_of};
pub use resolver::*;

use crate::build::hash::assign_build_string;
use crate::build::{Configuration, ResolvedRequirements, ResolvedRunExports};
use crate::consts::{DEFAULT_MAX_PIN, DEFAULT_MIN_PIN};
use crate::expand::ExpandedVariant;
use crate::manifest::FailureKind;
use crate::plan::{close_cycle, stable_toposort};
use crate::recipe::{BuildOptions, DependencySpec, Environment, Output, PackageSpec, PinArgs};
use crate::variant::{Assignment, ParameterSpace};
use crate::version::apply_pin_expressions;

#[derive(Debug, Error)]
pub enum FinalizeError {
  #[error("output '{output}' pins '{target}', but the recipe has no such output")]
  UnresolvedPin { output: String, target: String },

  #[error("outputs pin each other exactly: {}", cycle.join(" -> "))]
  CyclicPin { cycle: Vec<String> },

  #[error("output '{output}' uses pin_compatible('{package}'), but '{package}' is not a host or build requirement")]
  PinCompatible { output: String, package: String },

  #[error("output '{output}': {source}")]
  Resolve {
    output: String,
    #[source]
    source: ResolveError,
  },
}

impl FinalizeError {
  pub fn kind(&self) -> FailureKind {
    match self {
      FinalizeError::UnresolvedPin { .. } => FailureKind::UnresolvedPin,
      FinalizeError::CyclicPin { .. } => FailureKind::CyclicPin,
      FinalizeError::PinCompatible { .. } => FailureKind::PinCompatible,
      FinalizeError::Resolve { .. } => FailureKind::Resolve,
    }
  }
}

/// Outputs of the document being finalized.
#[derive(Default)]
struct Siblings {
  declared: BTreeMap<String, String>,
  finalized: BTreeMap<String, Configuration>,
}

/// Per-output view used while resolving requirement entries.
struct OutputScope<'s> {
  output: &'s str,
  variant: &'s Assignment,
  siblings: &'s Siblings,
  /// The output itself once its build string is known.
  this: Option<&'s Configuration>,
}

impl OutputScope<'_> {
  fn resolve_error(&self, source: ResolveError) -> FinalizeError {
    FinalizeError::Resolve {
      output: self.output.to_string(),
      source,
    }
  }
}

pub struct Finalizer<'a> {
  space: &'a ParameterSpace,
  resolver: &'a dyn DependencyResolver,
  local: &'a LocalPackages,
}

impl<'a> Finalizer<'a> {
  pub fn new(space: &'a ParameterSpace, resolver: &'a dyn DependencyResolver, local: &'a LocalPackages) -> Self {
    Self { space, resolver, local }
  }

  /// Finalize every output of `variant`, in declaration order, followed by
  /// the implicit metapackage when one is needed.
  pub fn finalize(&self, recipe: &str, variant: &ExpandedVariant) -> Result<Vec<Configuration>, FinalizeError> {
    let document = &variant.document;
    let outputs: Vec<Output> = document
      .effective_outputs(&variant.used)
      .into_iter()
      .filter(|output| {
        let skip = output.build.as_ref().is_some_and(|b| b.skip);
        if skip {
          debug!(recipe = %recipe, output = %output.name, assignment = %variant.assignment, "output skipped");
        }
        !skip
      })
      .collect();

    let order = finalize_order(&outputs)?;

    let mut siblings = Siblings {
      declared: outputs
        .iter()
        .map(|o| {
          let version = o.version.clone().unwrap_or_else(|| document.package.version.clone());
          (o.name.clone(), version)
        })
        .collect(),
      finalized: BTreeMap::new(),
    };

    let mut slots: Vec<Option<Configuration>> = vec![None; outputs.len()];
    for idx in order {
      let config = self.finalize_output(recipe, variant, &outputs[idx], &siblings)?;
      trace!(recipe = %recipe, output = %config.filename(), "finalized output");
      siblings.finalized.insert(config.name.clone(), config.clone());
      slots[idx] = Some(config);
    }

    let mut configs: Vec<Configuration> = slots.into_iter().flatten().collect();
    if let Some(meta) = self.metapackage(recipe, variant, &configs) {
      configs.push(meta);
    }
    Ok(configs)
  }

  fn finalize_output(
    &self,
    recipe: &str,
    variant: &ExpandedVariant,
    output: &Output,
    siblings: &Siblings,
  ) -> Result<Configuration, FinalizeError> {
    let document = &variant.document;
    let options = output.build.clone().unwrap_or_default();
    let version = output
      .version
      .clone()
      .unwrap_or_else(|| document.package.version.clone());

    let mut config = Configuration::new(recipe, &output.name, version);
    config.variant = variant.assignment.clone();
    config.used = variant.assignment.project(&output.used);
    config.build_number = options.number.or(document.build.number).unwrap_or(0);
    config.force_use_keys = union(&options.force_use_keys, &document.build.force_use_keys);
    config.force_ignore_keys = union(&options.force_ignore_keys, &document.build.force_ignore_keys);
    config.script = options.script.clone();
    config.noarch = options.noarch.clone();
    config.test = output.test.clone();

    let requirements = output.requirements.clone().unwrap_or_default();
    let scope = OutputScope {
      output: &output.name,
      variant: &variant.assignment,
      siblings,
      this: None,
    };

    let mut build = Vec::with_capacity(requirements.build.len());
    for dep in &requirements.build {
      let spec = self.resolve_dep(dep, &scope, &build, &[])?;
      build.push(spec);
    }

    let mut host = Vec::with_capacity(requirements.host.len());
    for dep in &requirements.host {
      let spec = self.resolve_dep(dep, &scope, &build, &host)?;
      host.push(spec);
    }

    let mut run = Vec::with_capacity(requirements.run.len());
    for dep in &requirements.run {
      let mut spec = self.resolve_dep(dep, &scope, &build, &host)?;
      if spec.is_bare()
        && let Some(pin) = self.space.pin_run_as_build(&spec.name)
        && let Some(version) = self.source_version(&spec.name, &scope, &build, &host)?
      {
        spec.version = Some(apply_pin_expressions(
          &version,
          pin.min_pin.as_deref(),
          pin.max_pin.as_deref(),
        ));
      }
      run.push(spec);
    }
    run.extend(self.propagate_run_exports(&options, &document.build, &scope, &build, &host)?);

    config.requirements = ResolvedRequirements {
      build: dedupe(build),
      host: dedupe(host),
      run: dedupe(run),
    };
    assign_build_string(&mut config, self.space, options.string.as_deref());

    let run_exports = {
      let scope = OutputScope {
        output: scope.output,
        variant: scope.variant,
        siblings: scope.siblings,
        this: Some(&config),
      };
      let build = &config.requirements.build;
      let host = &config.requirements.host;
      let mut resolved = ResolvedRunExports::default();
      for dep in &options.run_exports.weak {
        resolved.weak.push(self.resolve_dep(dep, &scope, build, host)?);
      }
      for dep in &options.run_exports.strong {
        resolved.strong.push(self.resolve_dep(dep, &scope, build, host)?);
      }
      resolved
    };
    config.run_exports = ResolvedRunExports {
      weak: dedupe(run_exports.weak),
      strong: dedupe(run_exports.strong),
    };

    Ok(config)
  }

  fn resolve_dep(
    &self,
    dep: &DependencySpec,
    scope: &OutputScope<'_>,
    build: &[PackageSpec],
    host: &[PackageSpec],
  ) -> Result<PackageSpec, FinalizeError> {
    match dep {
      DependencySpec::Package(spec) => Ok(spec.clone()),

      DependencySpec::PinSubpackage { name, pin } => {
        let unresolved = || FinalizeError::UnresolvedPin {
          output: scope.output.to_string(),
          target: name.clone(),
        };
        let target = if name == scope.output {
          scope.this
        } else {
          scope.siblings.finalized.get(name)
        };

        if pin.exact {
          return target.map(Configuration::exact_spec).ok_or_else(unresolved);
        }
        let version = target
          .map(|t| t.version.clone())
          .or_else(|| scope.siblings.declared.get(name).cloned())
          .ok_or_else(unresolved)?;
        Ok(PackageSpec::new(name).with_version(pin_range(&version, pin)))
      }

      DependencySpec::PinCompatible { name, pin } => {
        let source = host
          .iter()
          .find(|s| &s.name == name)
          .map(|s| (s, Environment::Host))
          .or_else(|| build.iter().find(|s| &s.name == name).map(|s| (s, Environment::Build)));
        let Some((source, env)) = source else {
          return Err(FinalizeError::PinCompatible {
            output: scope.output.to_string(),
            package: name.clone(),
          });
        };

        let version = self.resolved_version(source, env, scope)?.ok_or_else(|| {
          scope.resolve_error(ResolveError::NotFound {
            spec: source.to_string(),
            env,
          })
        })?;

        if pin.exact {
          let mut spec = PackageSpec::new(name).with_version(&version);
          if let Some(local) = self.local_config(source, scope) {
            spec = spec.with_build(&local.build_string);
          }
          return Ok(spec);
        }
        Ok(PackageSpec::new(name).with_version(pin_range(&version, pin)))
      }
    }
  }

  /// A sibling or earlier-finalized configuration satisfying `spec`.
  fn local_config<'s>(&'s self, spec: &PackageSpec, scope: &'s OutputScope<'_>) -> Option<&'s Configuration> {
    scope
      .siblings
      .finalized
      .get(&spec.name)
      .or_else(|| self.local.select(spec, scope.variant))
  }

  /// The version `spec` resolves to, or `None` when nothing knows it.
  ///
  /// A spec constrained to a plain version (`python 3.11`) stands for itself.
  fn resolved_version(
    &self,
    spec: &PackageSpec,
    env: Environment,
    scope: &OutputScope<'_>,
  ) -> Result<Option<String>, FinalizeError> {
    if let Some(config) = self.local_config(spec, scope) {
      return Ok(Some(config.version.clone()));
    }
    if let Some(version) = scope.siblings.declared.get(&spec.name) {
      return Ok(Some(version.clone()));
    }
    match self.resolver.resolve_version(spec, env) {
      Ok(version) => Ok(Some(version)),
      Err(err) if err.is_not_found() => Ok(plain_version(spec)),
      Err(err) => Err(scope.resolve_error(err)),
    }
  }

  /// Version of `name` as listed in host, else build.
  fn source_version(
    &self,
    name: &str,
    scope: &OutputScope<'_>,
    build: &[PackageSpec],
    host: &[PackageSpec],
  ) -> Result<Option<String>, FinalizeError> {
    let source = host
      .iter()
      .find(|s| s.name == name)
      .map(|s| (s, Environment::Host))
      .or_else(|| build.iter().find(|s| s.name == name).map(|s| (s, Environment::Build)));
    match source {
      Some((spec, env)) => self.resolved_version(spec, env, scope),
      None => Ok(None),
    }
  }

  fn run_exports_for(
    &self,
    spec: &PackageSpec,
    env: Environment,
    scope: &OutputScope<'_>,
  ) -> Result<Vec<RunExport>, FinalizeError> {
    if let Some(config) = self.local_config(spec, scope) {
      return Ok(run_exports_of(config));
    }
    if scope.siblings.declared.contains_key(&spec.name) {
      return Ok(Vec::new());
    }
    let version = match self.resolver.resolve_version(spec, env) {
      Ok(version) => version,
      Err(err) if err.is_not_found() => {
        trace!(spec = %spec, env = %env, "no run-exports for unresolved package");
        return Ok(Vec::new());
      }
      Err(err) => return Err(scope.resolve_error(err)),
    };
    self
      .resolver
      .run_exports_of(&spec.name, &version)
      .map_err(|err| scope.resolve_error(err))
  }

  /// Strong exports of build dependencies and all exports of host
  /// dependencies, one hop only.
  fn propagate_run_exports(
    &self,
    options: &BuildOptions,
    document: &BuildOptions,
    scope: &OutputScope<'_>,
    build: &[PackageSpec],
    host: &[PackageSpec],
  ) -> Result<Vec<PackageSpec>, FinalizeError> {
    let ignore_from: BTreeSet<&String> = options
      .ignore_run_exports_from
      .iter()
      .chain(&document.ignore_run_exports_from)
      .collect();
    let ignore: BTreeSet<&String> = options
      .ignore_run_exports
      .iter()
      .chain(&document.ignore_run_exports)
      .collect();

    let mut exported = Vec::new();
    for (env, specs) in [(Environment::Build, build), (Environment::Host, host)] {
      for spec in specs {
        if spec.name == scope.output || ignore_from.contains(&spec.name) {
          continue;
        }
        for export in self.run_exports_for(spec, env, scope)? {
          if export.strength == Strength::Weak && env == Environment::Build {
            continue;
          }
          if ignore.contains(&export.target.name) {
            trace!(output = %scope.output, export = %export.target, "ignoring run-export");
            continue;
          }
          exported.push(export.target);
        }
      }
    }
    Ok(exported)
  }

  /// A package named like the document that depends on every output, when
  /// explicit outputs exist and none of them carries the document's name.
  fn metapackage(&self, recipe: &str, variant: &ExpandedVariant, outputs: &[Configuration]) -> Option<Configuration> {
    let document = &variant.document;
    if !document.has_explicit_outputs() || outputs.is_empty() || outputs.iter().any(|c| c.name == document.package.name)
    {
      return None;
    }

    let mut config = Configuration::new(recipe, &document.package.name, &document.package.version);
    config.variant = variant.assignment.clone();
    let used: BTreeSet<&String> = outputs.iter().flat_map(|c| c.used.keys()).collect();
    config.used = variant.assignment.project(used);
    config.build_number = document.build.number.unwrap_or(0);
    config.metapackage = true;
    config.requirements.run = outputs.iter().map(Configuration::exact_spec).collect();
    assign_build_string(&mut config, self.space, document.build.string.as_deref());

    debug!(recipe = %recipe, package = %config.filename(), "synthesized metapackage");
    Some(config)
  }
}

/// Finalize one expanded variant with no earlier-finalized packages.
pub fn finalize(
  recipe: &str,
  variant: &ExpandedVariant,
  space: &ParameterSpace,
  resolver: &dyn DependencyResolver,
) -> Result<Vec<Configuration>, FinalizeError> {
  let local = LocalPackages::new();
  Finalizer::new(space, resolver, &local).finalize(recipe, variant)
}

/// Order in which the outputs of one document are finalized.
///
/// Exact `pin_subpackage` targets must come first and may not form a cycle.
/// Plain build/host references to sibling outputs also order, so their
/// run-exports are known, unless that would introduce a cycle.
fn finalize_order(outputs: &[Output]) -> Result<Vec<usize>, FinalizeError> {
  let index: BTreeMap<&str, usize> = outputs.iter().enumerate().map(|(i, o)| (o.name.as_str(), i)).collect();
  let mut exact = Vec::new();
  let mut soft = Vec::new();

  for (consumer, output) in outputs.iter().enumerate() {
    let requirements = output
      .requirements
      .iter()
      .flat_map(|r| r.iter().map(|(env, dep)| (Some(env), dep)));
    let exports = output
      .build
      .iter()
      .flat_map(|b| b.run_exports.weak.iter().chain(&b.run_exports.strong))
      .map(|dep| (None, dep));

    for (env, dep) in requirements.chain(exports) {
      match dep {
        DependencySpec::PinSubpackage { name, pin } => {
          if *name == output.name {
            continue;
          }
          let Some(&target) = index.get(name.as_str()) else {
            return Err(FinalizeError::UnresolvedPin {
              output: output.name.clone(),
              target: name.clone(),
            });
          };
          if pin.exact {
            exact.push((target, consumer));
          }
        }
        DependencySpec::Package(spec) if matches!(env, Some(Environment::Build | Environment::Host)) => {
          if spec.name != output.name
            && let Some(&target) = index.get(spec.name.as_str())
          {
            soft.push((target, consumer));
          }
        }
        _ => {}
      }
    }
  }

  let exact_order = stable_toposort(outputs.len(), &exact).map_err(|cycle| FinalizeError::CyclicPin {
    cycle: close_cycle(cycle.into_iter().map(|i| outputs[i].name.clone()).collect()),
  })?;

  let all: Vec<(usize, usize)> = exact.iter().chain(&soft).copied().collect();
  Ok(stable_toposort(outputs.len(), &all).unwrap_or(exact_order))
}

/// Apply a pin to `version`. Explicit bounds replace the computed ones.
pub fn pin_range(version: &str, pin: &PinArgs) -> String {
  let lower = match &pin.lower_bound {
    Some(bound) => format!(">={}", bound),
    None => apply_pin_expressions(version, Some(pin.min_pin.as_deref().unwrap_or(DEFAULT_MIN_PIN)), None),
  };
  let upper = match &pin.upper_bound {
    Some(bound) => format!("<{}", bound),
    None => apply_pin_expressions(version, None, Some(pin.max_pin.as_deref().unwrap_or(DEFAULT_MAX_PIN))),
  };
  [lower, upper]
    .into_iter()
    .filter(|b| !b.is_empty())
    .collect::<Vec<_>>()
    .join(",")
}

/// A version constraint that names exactly one version.
fn plain_version(spec: &PackageSpec) -> Option<String> {
  let version = spec.version.as_deref()?;
  let plain = !version.is_empty()
    && version
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_'));
  plain.then(|| version.to_string())
}

/// Keep first-seen order, drop exact duplicates, and drop a bare name when
/// a constrained spec for the same package is present.
pub fn dedupe(specs: Vec<PackageSpec>) -> Vec<PackageSpec> {
  let constrained: BTreeSet<String> = specs
    .iter()
    .filter(|s| !s.is_bare())
    .map(|s| s.name.clone())
    .collect();
  let mut out: Vec<PackageSpec> = Vec::with_capacity(specs.len());
  for spec in specs {
    if spec.is_bare() && constrained.contains(&spec.name) {
      continue;
    }
    if !out.contains(&spec) {
      out.push(spec);
    }
  }
  out
}

fn union(a: &[String], b: &[String]) -> BTreeSet<String> {
  a.iter().chain(b).cloned().collect()
}
