//! Variant matrix expansion.
//!
//! Enumerates the cross product of a [`ParameterSpace`], renders every point,
//! and collapses points that agree on the parameters the render actually used.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, trace};

use crate::manifest::{ConfigurationFailure, FailureKind};
use crate::recipe::{DependencySpec, Environment, RenderedDocument, Requirements};
use crate::render::{Rendered, Renderer, UsedParameterSet};
use crate::variant::{Assignment, ParameterSpace, VariantValue, normalize_key};

/// One surviving point of the matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedVariant {
  /// Position of the point in the raw cross product.
  pub index: usize,
  /// The full assignment the document was rendered with.
  pub assignment: Assignment,
  pub document: RenderedDocument,
  pub used: UsedParameterSet,
}

impl ExpandedVariant {
  /// The assignment restricted to used parameters. Two points with equal
  /// projections yield the same configuration.
  pub fn used_assignment(&self) -> Assignment {
    self.assignment.project(&self.used)
  }
}

#[derive(Debug, Clone, Default)]
pub struct ExpansionResult {
  pub variants: Vec<ExpandedVariant>,
  pub failures: Vec<ConfigurationFailure>,
  /// Size of the cross product before rendering.
  pub raw_points: usize,
  /// Points dropped as infeasible or by `build.skip`.
  pub skipped: usize,
}

impl ExpansionResult {
  /// Used parameters whose value differs between surviving variants.
  pub fn loop_vars(&self) -> Vec<String> {
    let mut seen: BTreeMap<&String, Vec<&VariantValue>> = BTreeMap::new();
    for variant in &self.variants {
      for name in &variant.used {
        if let Some(value) = variant.assignment.get(name) {
          let values = seen.entry(name).or_default();
          if !values.contains(&value) {
            values.push(value);
          }
        }
      }
    }
    seen
      .into_iter()
      .filter(|(_, values)| values.len() > 1)
      .map(|(name, _)| name.clone())
      .collect()
  }
}

/// One axis of the matrix: a free parameter or a whole zip group.
type Dimension = Vec<Vec<(String, VariantValue)>>;

fn dimensions(space: &ParameterSpace) -> Vec<Dimension> {
  let mut dims = Vec::new();
  let mut placed_groups = BTreeSet::new();

  for (key, values) in space.params() {
    let Some(group) = space.zip_group_of(key) else {
      dims.push(values.iter().map(|v| vec![(key.clone(), v.clone())]).collect());
      continue;
    };
    if !placed_groups.insert(group.name()) {
      continue;
    }

    let columns: Vec<(&String, &[VariantValue])> = group
      .members()
      .iter()
      .filter_map(|m| space.values(m).map(|values| (m, values)))
      .collect();
    let rows = columns.iter().map(|(_, values)| values.len()).min().unwrap_or(0);
    dims.push(
      (0..rows)
        .map(|row| {
          columns
            .iter()
            .map(|(member, values)| ((*member).clone(), values[row].clone()))
            .collect()
        })
        .collect(),
    );
  }
  dims
}

/// Every point of the cross product, in declaration order with the last
/// dimension varying fastest. An empty space yields one empty assignment.
pub fn raw_points(space: &ParameterSpace) -> Vec<Assignment> {
  let mut points = vec![Assignment::new()];
  for dim in dimensions(space) {
    let mut next = Vec::with_capacity(points.len() * dim.len());
    for point in &points {
      for row in &dim {
        let mut point = point.clone();
        for (key, value) in row {
          point.insert(key.clone(), value.clone());
        }
        next.push(point);
      }
    }
    points = next;
  }
  points
}

/// Expand `space` by rendering every point with `renderer`.
///
/// Failures are isolated to their point and collected; infeasible points
/// (undefined optional parameter) and skipped builds are dropped silently.
pub fn expand(recipe: &str, space: &ParameterSpace, renderer: &dyn Renderer) -> ExpansionResult {
  let points = raw_points(space);
  let mut result = ExpansionResult {
    raw_points: points.len(),
    ..Default::default()
  };
  let mut seen = BTreeSet::new();

  for (index, assignment) in points.into_iter().enumerate() {
    let Rendered { mut document, mut used } = match renderer.render(&assignment) {
      Ok(rendered) => rendered,
      Err(err) if err.is_infeasible() => {
        debug!(recipe = %recipe, assignment = %assignment, error = %err, "skipping infeasible point");
        result.skipped += 1;
        continue;
      }
      Err(err) => {
        result.failures.push(ConfigurationFailure {
          recipe: recipe.to_string(),
          assignment,
          kind: FailureKind::Render,
          message: err.to_string(),
        });
        continue;
      }
    };

    if document.build.skip {
      info!(recipe = %recipe, assignment = %assignment, "build.skip set, dropping point");
      result.skipped += 1;
      continue;
    }

    bind_variant_requirements(&mut document, &mut used, &assignment);

    let projected = assignment.project(&used);
    let key = serde_json::to_string(&projected).unwrap_or_else(|_| projected.to_string());
    if !seen.insert(key) {
      trace!(recipe = %recipe, assignment = %assignment, "collapsed duplicate point");
      continue;
    }

    result.variants.push(ExpandedVariant {
      index,
      assignment,
      document,
      used,
    });
  }

  debug!(
    recipe = %recipe,
    points = result.raw_points,
    variants = result.variants.len(),
    skipped = result.skipped,
    failures = result.failures.len(),
    "expanded variant matrix"
  );
  result
}

/// Pin bare build/host requirements named like a parameter to its value.
/// Returns the parameters that were bound.
fn bind_requirements(requirements: &mut Requirements, assignment: &Assignment) -> Vec<String> {
  let mut bound = Vec::new();
  for env in [Environment::Build, Environment::Host] {
    for dep in requirements.get_mut(env) {
      let DependencySpec::Package(spec) = dep else {
        continue;
      };
      if !spec.is_bare() {
        continue;
      }
      let key = normalize_key(&spec.name);
      let Some(value) = assignment.get(&key) else {
        continue;
      };
      if matches!(value, VariantValue::List(_) | VariantValue::Map(_)) {
        continue;
      }
      spec.version = Some(value.to_string());
      bound.push(key);
    }
  }
  bound
}

fn bind_variant_requirements(document: &mut RenderedDocument, used: &mut UsedParameterSet, assignment: &Assignment) {
  if let Some(requirements) = document.requirements.as_mut() {
    for key in bind_requirements(requirements, assignment) {
      used.insert(key.clone());
      for output in document.outputs.iter_mut().filter(|o| o.requirements.is_none()) {
        output.used.insert(key.clone());
      }
    }
  }

  for output in &mut document.outputs {
    let Some(requirements) = output.requirements.as_mut() else {
      continue;
    };
    for key in bind_requirements(requirements, assignment) {
      used.insert(key.clone());
      output.used.insert(key);
    }
  }
}
