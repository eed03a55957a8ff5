//! Global Lua values available to recipe scripts.
//!
//! - `variant` - read-only view of the current assignment; every read is recorded
//! - `has_variant(name)` - whether a parameter is defined
//! - `optional(names)` - mark parameters whose absence makes a point infeasible
//! - `pin_subpackage(name, opts)` - pin against another output of this recipe
//! - `pin_compatible(name, opts)` - pin against a resolved host/build package
//! - `compiler(lang)` - compiler package for the target platform
//! - `recipe.dir` - directory of the recipe being rendered

use std::path::Path;
use std::rc::Rc;

use mlua::prelude::*;

use super::state::RenderState;
use crate::consts::{PIN_COMPATIBLE_TYPE, PIN_SUBPACKAGE_TYPE, TARGET_PLATFORM};
use crate::platform::Platform;
use crate::variant::VariantValue;

/// Convert a variant value into the equivalent Lua value.
pub fn variant_value_to_lua(lua: &Lua, value: &VariantValue) -> LuaResult<LuaValue> {
  match value {
    VariantValue::Boolean(b) => Ok(LuaValue::Boolean(*b)),
    VariantValue::Integer(i) => Ok(LuaValue::Integer(*i)),
    VariantValue::Float(x) => Ok(LuaValue::Number(*x)),
    VariantValue::String(s) => Ok(LuaValue::String(lua.create_string(s)?)),
    VariantValue::List(items) => {
      let table = lua.create_table()?;
      for (i, item) in items.iter().enumerate() {
        table.set(i + 1, variant_value_to_lua(lua, item)?)?;
      }
      Ok(LuaValue::Table(table))
    }
    VariantValue::Map(map) => {
      let table = lua.create_table()?;
      for (k, v) in map {
        table.set(k.as_str(), variant_value_to_lua(lua, v)?)?;
      }
      Ok(LuaValue::Table(table))
    }
  }
}

/// Register all recipe globals in the Lua runtime.
pub fn register_globals(lua: &Lua, state: Rc<RenderState>, recipe_dir: &Path) -> LuaResult<()> {
  let globals = lua.globals();

  globals.set("variant", create_variant_proxy(lua, state.clone())?)?;

  let has_state = state.clone();
  let has_variant = lua.create_function(move |_, name: String| Ok(has_state.is_defined(&name)))?;
  globals.set("has_variant", has_variant)?;

  let optional_state = state.clone();
  let optional = lua.create_function(move |_, names: LuaValue| {
    match names {
      LuaValue::String(s) => optional_state.mark_optional(s.to_str()?.to_string()),
      LuaValue::Table(t) => {
        for name in t.sequence_values::<String>() {
          optional_state.mark_optional(name?);
        }
      }
      other => {
        return Err(LuaError::external(format!(
          "optional() expects a name or a list of names, got {}",
          other.type_name()
        )));
      }
    }
    Ok(())
  })?;
  globals.set("optional", optional)?;

  globals.set("pin_subpackage", create_pin_function(lua, PIN_SUBPACKAGE_TYPE)?)?;
  globals.set("pin_compatible", create_pin_function(lua, PIN_COMPATIBLE_TYPE)?)?;
  globals.set("compiler", create_compiler_function(lua, state)?)?;

  let recipe = lua.create_table()?;
  recipe.set("dir", recipe_dir.to_string_lossy().to_string())?;
  globals.set("recipe", recipe)?;

  Ok(())
}

fn create_variant_proxy(lua: &Lua, state: Rc<RenderState>) -> LuaResult<LuaTable> {
  let proxy = lua.create_table()?;
  let mt = lua.create_table()?;

  let index = lua.create_function(move |lua, (_, key): (LuaTable, String)| match state.lookup(&key) {
    Some(value) => variant_value_to_lua(lua, &value),
    None => Err(LuaError::external(format!("undefined variant parameter '{}'", key))),
  })?;
  mt.set("__index", index)?;

  let newindex = lua.create_function(|_, (_, key, _): (LuaTable, String, LuaValue)| -> LuaResult<()> {
    Err(LuaError::external(format!(
      "variant is read-only: cannot assign to '{}'",
      key
    )))
  })?;
  mt.set("__newindex", newindex)?;
  mt.set("__type", "Variant")?;

  proxy.set_metatable(Some(mt))?;
  Ok(proxy)
}

/// `pin_subpackage` / `pin_compatible` return a marker table read back by the converter.
fn create_pin_function(lua: &Lua, type_name: &'static str) -> LuaResult<LuaFunction> {
  lua.create_function(move |lua, (name, opts): (String, Option<LuaTable>)| {
    let pin = lua.create_table()?;
    pin.set("name", name)?;
    if let Some(opts) = opts {
      for key in ["exact", "min_pin", "max_pin", "lower_bound", "upper_bound"] {
        let value: LuaValue = opts.get(key)?;
        pin.set(key, value)?;
      }
    }
    let mt = lua.create_table()?;
    mt.set("__type", type_name)?;
    pin.set_metatable(Some(mt))?;
    Ok(pin)
  })
}

fn create_compiler_function(lua: &Lua, state: Rc<RenderState>) -> LuaResult<LuaFunction> {
  lua.create_function(move |_, language: String| {
    let target = state
      .lookup_quiet(TARGET_PLATFORM)
      .map(|v| v.to_string())
      .or_else(crate::platform::current_subdir)
      .ok_or_else(|| LuaError::external("cannot determine target platform"))?;

    let compiler = match state.lookup_quiet(&format!("{}_compiler", language)) {
      Some(value) => value.to_string(),
      None => Platform::from_subdir(&target)
        .or_else(Platform::current)
        .map(|p| p.default_compiler(&language))
        .unwrap_or_else(|| language.clone()),
    };

    let mut spec = format!("{}_{}", compiler, target);
    if let Some(version) = state.lookup_quiet(&format!("{}_compiler_version", language)) {
      spec.push(' ');
      spec.push_str(&version.to_string());
    }
    Ok(spec)
  })
}
