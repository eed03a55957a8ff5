//! Conversion of the table returned by `recipe.lua` into a [`RenderedDocument`].
//!
//! Outputs may be tables or functions returning tables. Parameters read while
//! an output function runs are attributed to that output only.

use std::collections::BTreeMap;

use mlua::prelude::*;

use super::state::RenderState;
use crate::consts::{PIN_COMPATIBLE_TYPE, PIN_SUBPACKAGE_TYPE};
use crate::recipe::{
  BuildOptions, DependencySpec, Output, PackageIdentity, PinArgs, RenderedDocument, Requirements, RunExportDecl,
  TestSection,
};
use crate::render::RenderError;

fn invalid(message: impl Into<String>) -> RenderError {
  RenderError::InvalidDocument(message.into())
}

fn get_table(t: &LuaTable, key: &str) -> Result<Option<LuaTable>, RenderError> {
  match t.get::<LuaValue>(key)? {
    LuaValue::Nil => Ok(None),
    LuaValue::Table(table) => Ok(Some(table)),
    other => Err(invalid(format!("'{}' must be a table, got {}", key, other.type_name()))),
  }
}

fn string_list(t: &LuaTable, key: &str) -> Result<Vec<String>, RenderError> {
  match t.get::<LuaValue>(key)? {
    LuaValue::Nil => Ok(Vec::new()),
    LuaValue::String(s) => Ok(vec![s.to_str()?.to_string()]),
    LuaValue::Table(items) => Ok(items.sequence_values::<String>().collect::<LuaResult<Vec<_>>>()?),
    other => Err(invalid(format!("'{}' must be a list of strings, got {}", key, other.type_name()))),
  }
}

fn dependency(value: LuaValue) -> Result<DependencySpec, RenderError> {
  match value {
    LuaValue::String(s) => {
      let text = s.to_str()?.to_string();
      DependencySpec::package(&text).ok_or_else(|| invalid(format!("invalid dependency '{}'", text)))
    }
    LuaValue::Table(t) => {
      let type_name = t
        .metatable()
        .and_then(|mt| mt.get::<String>("__type").ok())
        .unwrap_or_default();
      let name: String = t.get("name")?;
      let pin = PinArgs {
        exact: t.get::<Option<bool>>("exact")?.unwrap_or(false),
        min_pin: t.get("min_pin")?,
        max_pin: t.get("max_pin")?,
        lower_bound: t.get("lower_bound")?,
        upper_bound: t.get("upper_bound")?,
      };
      match type_name.as_str() {
        PIN_SUBPACKAGE_TYPE => Ok(DependencySpec::PinSubpackage { name, pin }),
        PIN_COMPATIBLE_TYPE => Ok(DependencySpec::PinCompatible { name, pin }),
        _ => Err(invalid(format!("dependency table for '{}' is not a pin expression", name))),
      }
    }
    other => Err(invalid(format!("dependency must be a string or pin, got {}", other.type_name()))),
  }
}

fn dependency_list(t: &LuaTable, key: &str) -> Result<Vec<DependencySpec>, RenderError> {
  let Some(items) = get_table(t, key)? else {
    return Ok(Vec::new());
  };
  items
    .sequence_values::<LuaValue>()
    .map(|value| dependency(value?))
    .collect()
}

fn requirements(t: &LuaTable) -> Result<Option<Requirements>, RenderError> {
  let Some(reqs) = get_table(t, "requirements")? else {
    return Ok(None);
  };
  Ok(Some(Requirements {
    build: dependency_list(&reqs, "build")?,
    host: dependency_list(&reqs, "host")?,
    run: dependency_list(&reqs, "run")?,
  }))
}

/// `run_exports` is either `{ weak = {...}, strong = {...} }` or a plain list of weak exports.
fn run_exports(t: &LuaTable) -> Result<RunExportDecl, RenderError> {
  let Some(exports) = get_table(t, "run_exports")? else {
    return Ok(RunExportDecl::default());
  };
  if exports.raw_len() > 0 {
    return Ok(RunExportDecl {
      weak: dependency_list(t, "run_exports")?,
      strong: Vec::new(),
    });
  }
  Ok(RunExportDecl {
    weak: dependency_list(&exports, "weak")?,
    strong: dependency_list(&exports, "strong")?,
  })
}

fn build_options(t: &LuaTable) -> Result<Option<BuildOptions>, RenderError> {
  let Some(build) = get_table(t, "build")? else {
    return Ok(None);
  };
  Ok(Some(BuildOptions {
    number: build.get("number")?,
    string: build.get("string")?,
    skip: build.get::<Option<bool>>("skip")?.unwrap_or(false),
    script: build.get("script")?,
    noarch: build.get("noarch")?,
    run_exports: run_exports(&build)?,
    ignore_run_exports: string_list(&build, "ignore_run_exports")?,
    ignore_run_exports_from: string_list(&build, "ignore_run_exports_from")?,
    force_use_keys: string_list(&build, "force_use_keys")?,
    force_ignore_keys: string_list(&build, "force_ignore_keys")?,
  }))
}

fn test_section(t: &LuaTable) -> Result<Option<TestSection>, RenderError> {
  let Some(test) = get_table(t, "test")? else {
    return Ok(None);
  };
  Ok(Some(TestSection {
    requires: string_list(&test, "requires")?,
    commands: string_list(&test, "commands")?,
    imports: string_list(&test, "imports")?,
  }))
}

fn string_map(t: &LuaTable) -> Result<BTreeMap<String, String>, RenderError> {
  let mut map = BTreeMap::new();
  for pair in t.pairs::<String, String>() {
    let (k, v) = pair?;
    map.insert(k, v);
  }
  Ok(map)
}

fn output(t: &LuaTable) -> Result<Output, RenderError> {
  let name: Option<String> = t.get("name")?;
  let name = name.ok_or_else(|| invalid("every output needs a name"))?;
  Ok(Output {
    name,
    version: t.get("version")?,
    requirements: requirements(t)?,
    build: build_options(t)?,
    test: test_section(t)?,
    used: Default::default(),
  })
}

/// Convert the value returned by the recipe script.
pub fn document_from_lua(value: LuaValue, state: &RenderState) -> Result<RenderedDocument, RenderError> {
  let LuaValue::Table(root) = value else {
    return Err(invalid("recipe must return a table"));
  };

  let package = get_table(&root, "package")?.ok_or_else(|| invalid("missing 'package' section"))?;
  let name: Option<String> = package.get("name")?;
  let version: Option<String> = package.get("version")?;
  let package = PackageIdentity {
    name: name.ok_or_else(|| invalid("package.name is required"))?,
    version: version.ok_or_else(|| invalid("package.version is required"))?,
  };

  let mut source = Vec::new();
  if let Some(sources) = get_table(&root, "source")? {
    if sources.raw_len() > 0 {
      for entry in sources.sequence_values::<LuaTable>() {
        source.push(string_map(&entry?)?);
      }
    } else {
      source.push(string_map(&sources)?);
    }
  }

  let mut outputs = Vec::new();
  let mut scoped = Vec::new();
  if let Some(declared) = get_table(&root, "outputs")? {
    for entry in declared.sequence_values::<LuaValue>() {
      match entry? {
        LuaValue::Table(t) => {
          outputs.push(output(&t)?);
          scoped.push(Default::default());
        }
        LuaValue::Function(f) => {
          state.begin_output();
          let result = f.call::<LuaTable>(());
          let used = state.end_output();
          outputs.push(output(&result?)?);
          scoped.push(used);
        }
        other => {
          return Err(invalid(format!("outputs must be tables or functions, got {}", other.type_name())));
        }
      }
    }
  }

  let document_used = state.document_used();
  for (output, own) in outputs.iter_mut().zip(scoped) {
    output.used = document_used.clone();
    output.used.extend(&own);
  }

  let mut about = BTreeMap::new();
  if let Some(t) = get_table(&root, "about")? {
    about = string_map(&t)?;
  }

  Ok(RenderedDocument {
    package,
    source,
    build: build_options(&root)?.unwrap_or_default(),
    requirements: requirements(&root)?,
    outputs,
    test: test_section(&root)?,
    about,
  })
}
