//! Helpers for building recipe inputs from inline Lua.

use std::path::Path;

use pkgmatrix_lib::eval::{RecipeInput, build_plan};
use pkgmatrix_lib::finalize::{DependencyResolver, EmptyResolver, PackageIndex};
use pkgmatrix_lib::lua::LuaRenderer;
use pkgmatrix_lib::manifest::Manifest;
use pkgmatrix_lib::variant::{ConfigLayer, ParameterSpace, load};

pub fn space(yaml: &str) -> ParameterSpace {
  let layers = vec![
    ConfigLayer::defaults("linux-64"),
    ConfigLayer::from_yaml_str("test", yaml).unwrap(),
  ];
  load(&layers).unwrap()
}

pub fn recipe(name: &str, variants: &str, source: &str) -> RecipeInput {
  RecipeInput {
    name: name.to_string(),
    space: space(variants),
    renderer: Box::new(LuaRenderer::from_source(&Path::new("/recipes").join(name), source)),
  }
}

pub fn plan(recipes: &[RecipeInput]) -> Manifest {
  build_plan(recipes, &EmptyResolver).unwrap()
}

pub fn plan_with(recipes: &[RecipeInput], resolver: &dyn DependencyResolver) -> Manifest {
  build_plan(recipes, resolver).unwrap()
}

pub fn index(yaml: &str) -> PackageIndex {
  PackageIndex::from_yaml_str(yaml).unwrap()
}
