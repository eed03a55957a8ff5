use std::path::Path;
use std::rc::Rc;

use mlua::prelude::*;

use super::globals;
use super::state::RenderState;

/// Create a fresh Lua runtime for one render.
///
/// The recipe directory is prepended to `package.path` so recipes can
/// `require` helper modules that sit next to them.
pub fn create_runtime(state: Rc<RenderState>, recipe_dir: &Path) -> LuaResult<Lua> {
  let lua = Lua::new();
  let package = lua.globals().get::<LuaTable>("package")?;
  let package_path = package.get::<String>("path")?;
  let dir = recipe_dir.to_string_lossy();
  package.set("path", format!("{dir}/?.lua;{dir}/?/init.lua;{package_path}"))?;

  globals::register_globals(&lua, state, recipe_dir)?;

  Ok(lua)
}

/// Evaluate recipe source, naming the chunk after its file for error messages.
pub fn eval_source(lua: &Lua, source: &str, path: &Path) -> LuaResult<LuaValue> {
  lua
    .load(source)
    .set_name(format!("@{}", path.display()))
    .eval::<LuaValue>()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::variant::Assignment;

  #[test]
  fn recipe_dir_is_on_package_path() -> LuaResult<()> {
    let temp = tempfile::TempDir::new().map_err(LuaError::external)?;
    std::fs::write(temp.path().join("helpers.lua"), "return { answer = 42 }").map_err(LuaError::external)?;

    let lua = create_runtime(Rc::new(RenderState::new(Assignment::new())), temp.path())?;
    let answer: i64 = lua.load("return require('helpers').answer").eval()?;
    assert_eq!(answer, 42);
    Ok(())
  }

  #[test]
  fn errors_name_the_recipe_file() -> LuaResult<()> {
    let lua = create_runtime(Rc::new(RenderState::new(Assignment::new())), Path::new("."))?;
    let err = eval_source(&lua, "error('boom')", Path::new("/recipes/zlib/recipe.lua")).unwrap_err();
    assert!(err.to_string().contains("recipe.lua"), "{}", err);
    Ok(())
  }
}
