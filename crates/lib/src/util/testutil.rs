//! Fixtures shared by unit tests.

use crate::expand::ExpandedVariant;
use crate::finalize::PackageIndex;
use crate::recipe::{DependencySpec, Output, PinArgs, RenderedDocument, Requirements};
use crate::render::UsedParameterSet;
use crate::variant::{Assignment, ConfigLayer, ParameterSpace, VariantValue, load};

pub fn assignment_of(pairs: &[(&str, &str)]) -> Assignment {
  pairs
    .iter()
    .map(|(k, v)| (k.to_string(), VariantValue::from(*v)))
    .collect()
}

/// Load a single-layer parameter space.
pub fn space_from_yaml(yaml: &str) -> ParameterSpace {
  let layer = ConfigLayer::from_yaml_str("test", yaml).expect("valid yaml");
  load(&[layer]).expect("valid parameter space")
}

pub fn index_from_yaml(yaml: &str) -> PackageIndex {
  PackageIndex::from_yaml_str(yaml).expect("valid index")
}

pub fn deps(specs: &[&str]) -> Vec<DependencySpec> {
  specs.iter().filter_map(|s| DependencySpec::package(s)).collect()
}

pub fn requirements(build: &[&str], host: &[&str], run: &[&str]) -> Requirements {
  Requirements {
    build: deps(build),
    host: deps(host),
    run: deps(run),
  }
}

/// A single-output document with the given host requirements.
pub fn document_with_host(name: &str, host: &[&str]) -> RenderedDocument {
  let mut document = RenderedDocument::new(name, "1.0");
  document.requirements = Some(requirements(&[], host, &[]));
  document
}

pub fn output(name: &str, requirements: Option<Requirements>) -> Output {
  Output {
    name: name.to_string(),
    version: None,
    requirements,
    build: None,
    test: None,
    used: UsedParameterSet::new(),
  }
}

pub fn pin_subpackage(name: &str, exact: bool) -> DependencySpec {
  DependencySpec::PinSubpackage {
    name: name.to_string(),
    pin: PinArgs {
      exact,
      ..Default::default()
    },
  }
}

pub fn pin_compatible(name: &str, args: PinArgs) -> DependencySpec {
  DependencySpec::PinCompatible {
    name: name.to_string(),
    pin: args,
  }
}

/// Wrap a document as if the expander produced it from `assignment`, with
/// every output having read `used`.
pub fn expanded(mut document: RenderedDocument, assignment: Assignment, used: &[&str]) -> ExpandedVariant {
  let used: UsedParameterSet = used.iter().copied().collect();
  for output in &mut document.outputs {
    output.used.extend(&used);
  }
  ExpandedVariant {
    index: 0,
    assignment,
    document,
    used,
  }
}
