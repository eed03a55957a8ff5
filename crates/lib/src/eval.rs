//! Recipe evaluation.
//!
//! Drives the whole pipeline for a set of recipes: load each recipe's
//! parameter space, expand it through the renderer, finalize every surviving
//! variant in recipe-dependency order and order the result into a
//! [`Manifest`].

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::build::Configuration;
use crate::consts::RECIPE_FILE;
use crate::expand::{ExpansionResult, expand};
use crate::finalize::{
  DependencyResolver, EmptyResolver, Finalizer, IndexError, LocalPackages, PackageIndex, ResolverCache,
};
use crate::lua::LuaRenderer;
use crate::manifest::{ConfigurationFailure, Manifest};
use crate::plan::{self, OrderError, close_cycle, stable_toposort};
use crate::recipe::{DependencySpec, Environment};
use crate::render::{RenderError, Renderer};
use crate::variant::{ParameterSpace, VariantConfigError, VariantValue, discover_layers, load};

/// Failures that abort the whole run.
#[derive(Debug, Error)]
pub enum EvalError {
  #[error("recipe {recipe}: {source}")]
  Config {
    recipe: String,
    #[source]
    source: VariantConfigError,
  },

  #[error(transparent)]
  Order(#[from] OrderError),

  #[error("no {} found under {}", RECIPE_FILE, .0.display())]
  RecipeNotFound(PathBuf),

  #[error("failed to read {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Index(#[from] IndexError),

  #[error(transparent)]
  Recipe(#[from] RenderError),
}

/// Command-line style knobs shared by every recipe of a run.
#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
  /// Extra variant files, applied after the recipe's own `variants.yaml`.
  pub variant_files: Vec<PathBuf>,
  /// `key=v1,v2` overrides, applied last.
  pub overrides: Vec<(String, Vec<VariantValue>)>,
  /// Restrict the matrix to these values after loading.
  pub selections: Vec<(String, Vec<VariantValue>)>,
  /// Defaults to the host platform.
  pub target_platform: Option<String>,
  /// Index of previously built packages.
  pub index: Option<PathBuf>,
}

impl EvalOptions {
  pub fn target_platform(&self) -> String {
    self
      .target_platform
      .clone()
      .or_else(crate::platform::current_subdir)
      .unwrap_or_else(|| "noarch".to_string())
  }
}

/// One recipe ready to expand.
pub struct RecipeInput {
  pub name: String,
  pub space: ParameterSpace,
  pub renderer: Box<dyn Renderer>,
}

/// A recipe's expanded matrix, before finalization.
pub struct RecipeExpansion {
  pub name: String,
  pub space: ParameterSpace,
  pub result: ExpansionResult,
}

/// Plan a run over already loaded recipes.
///
/// Per-configuration failures are collected into the manifest. Only a
/// dependency cycle between recipes or configurations aborts.
pub fn build_plan(recipes: &[RecipeInput], resolver: &dyn DependencyResolver) -> Result<Manifest, EvalError> {
  let expansions: Vec<ExpansionResult> = recipes
    .iter()
    .map(|recipe| expand(&recipe.name, &recipe.space, recipe.renderer.as_ref()))
    .collect();

  let names: Vec<&str> = recipes.iter().map(|r| r.name.as_str()).collect();
  let order = recipe_order(&names, &expansions)?;

  let cache = ResolverCache::new(resolver);
  let mut local = LocalPackages::new();
  let mut failures: Vec<ConfigurationFailure> = Vec::new();
  let mut configs: Vec<Configuration> = Vec::new();

  for idx in order {
    let recipe = &recipes[idx];
    let expansion = &expansions[idx];
    failures.extend(expansion.failures.iter().cloned());

    for variant in &expansion.variants {
      let finalized = Finalizer::new(&recipe.space, &cache, &local).finalize(&recipe.name, variant);
      match finalized {
        Ok(finalized) => {
          for config in finalized {
            local.register(config.clone());
            configs.push(config);
          }
        }
        Err(err) => {
          warn!(recipe = %recipe.name, assignment = %variant.assignment, error = %err, "finalization failed");
          failures.push(ConfigurationFailure {
            recipe: recipe.name.clone(),
            assignment: variant.assignment.clone(),
            kind: err.kind(),
            message: err.to_string(),
          });
        }
      }
    }
  }

  let mut seen = BTreeSet::new();
  let before = configs.len();
  configs.retain(|c| seen.insert(c.filename()));
  if configs.len() < before {
    debug!(collapsed = before - configs.len(), "collapsed configurations with equal filenames");
  }

  let plan = plan::order(configs)?;
  info!(
    configurations = plan.configurations.len(),
    waves = plan.waves().len(),
    failures = failures.len(),
    "planned build"
  );
  Ok(plan.into_manifest(failures))
}

/// Order recipes so that a recipe whose build or host requirements name an
/// output of another recipe comes after it.
fn recipe_order(names: &[&str], expansions: &[ExpansionResult]) -> Result<Vec<usize>, EvalError> {
  let produced: Vec<BTreeSet<&str>> = expansions
    .iter()
    .map(|expansion| {
      expansion
        .variants
        .iter()
        .flat_map(|v| {
          std::iter::once(v.document.package.name.as_str()).chain(v.document.outputs.iter().map(|o| o.name.as_str()))
        })
        .collect()
    })
    .collect();

  let mut edges = Vec::new();
  for (consumer, expansion) in expansions.iter().enumerate() {
    let consumed: BTreeSet<&str> = expansion
      .variants
      .iter()
      .flat_map(|v| {
        v.document
          .requirements
          .iter()
          .chain(v.document.outputs.iter().filter_map(|o| o.requirements.as_ref()))
      })
      .flat_map(|reqs| reqs.iter())
      .filter(|(env, _)| matches!(env, Environment::Build | Environment::Host))
      .filter_map(|(_, dep)| match dep {
        DependencySpec::Package(spec) => Some(spec.name.as_str()),
        _ => None,
      })
      .collect();

    for (producer, outputs) in produced.iter().enumerate() {
      if producer != consumer && !consumed.is_disjoint(outputs) {
        edges.push((producer, consumer));
      }
    }
  }

  stable_toposort(names.len(), &edges).map_err(|cycle| {
    EvalError::Order(OrderError::CyclicDependency {
      cycle: close_cycle(cycle.into_iter().map(|i| names[i].to_string()).collect()),
    })
  })
}

/// Recipe directories named by `paths`.
///
/// A path may be a `recipe.lua` file, a directory holding one, or a tree that
/// is searched for them.
pub fn discover_recipe_dirs(paths: &[PathBuf]) -> Result<Vec<PathBuf>, EvalError> {
  let mut dirs = Vec::new();
  for path in paths {
    if path.is_file() && path.file_name().is_some_and(|n| n == RECIPE_FILE) {
      dirs.push(path.parent().unwrap_or(Path::new(".")).to_path_buf());
      continue;
    }
    if path.join(RECIPE_FILE).is_file() {
      dirs.push(path.clone());
      continue;
    }
    if !path.is_dir() {
      return Err(EvalError::RecipeNotFound(path.clone()));
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
      let entry = entry.map_err(|err| {
        let path = err.path().unwrap_or(path).to_path_buf();
        EvalError::Io {
          path,
          source: err.into(),
        }
      })?;
      if entry.file_type().is_file() && entry.file_name() == RECIPE_FILE {
        found.push(entry.path().parent().unwrap_or(path).to_path_buf());
      }
    }
    if found.is_empty() {
      return Err(EvalError::RecipeNotFound(path.clone()));
    }
    dirs.extend(found);
  }
  Ok(dirs)
}

fn recipe_name(dir: &Path) -> String {
  dir
    .canonicalize()
    .ok()
    .as_deref()
    .and_then(Path::file_name)
    .or_else(|| dir.file_name())
    .map(|n| n.to_string_lossy().to_string())
    .unwrap_or_else(|| dir.display().to_string())
}

/// Load every recipe under `paths` with its layered parameter space.
pub fn load_recipes(paths: &[PathBuf], options: &EvalOptions) -> Result<Vec<RecipeInput>, EvalError> {
  let target_platform = options.target_platform();
  let mut recipes = Vec::new();

  for dir in discover_recipe_dirs(paths)? {
    let name = recipe_name(&dir);
    let config_err = |source| EvalError::Config {
      recipe: name.clone(),
      source,
    };

    let layers = discover_layers(&dir, &target_platform, &options.variant_files, &options.overrides)
      .map_err(config_err)?;
    let mut space = load(&layers).map_err(config_err)?;
    for (key, values) in &options.selections {
      space.select(key, values).map_err(config_err)?;
    }

    let renderer = LuaRenderer::from_dir(&dir)?;
    debug!(recipe = %name, parameters = space.len(), layers = layers.len(), "loaded recipe");
    recipes.push(RecipeInput {
      name,
      space,
      renderer: Box::new(renderer),
    });
  }
  Ok(recipes)
}

/// Expand every recipe under `paths` without finalizing.
pub fn expand_recipes(paths: &[PathBuf], options: &EvalOptions) -> Result<Vec<RecipeExpansion>, EvalError> {
  Ok(
    load_recipes(paths, options)?
      .into_iter()
      .map(|recipe| {
        let result = expand(&recipe.name, &recipe.space, recipe.renderer.as_ref());
        RecipeExpansion {
          name: recipe.name,
          space: recipe.space,
          result,
        }
      })
      .collect(),
  )
}

/// Plan a run over the recipes under `paths`.
pub fn evaluate_recipes(paths: &[PathBuf], options: &EvalOptions) -> Result<Manifest, EvalError> {
  let recipes = load_recipes(paths, options)?;
  info!(recipes = recipes.len(), target_platform = %options.target_platform(), "evaluating recipes");

  match &options.index {
    Some(path) => {
      let index = PackageIndex::from_file(path)?;
      build_plan(&recipes, &index)
    }
    None => build_plan(&recipes, &EmptyResolver),
  }
}
