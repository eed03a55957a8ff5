//! The Lua recipe renderer.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::trace;

use super::convert::document_from_lua;
use super::runtime::{create_runtime, eval_source};
use super::state::RenderState;
use crate::consts::RECIPE_FILE;
use crate::recipe::RenderedDocument;
use crate::render::{RenderError, Rendered, Renderer};
use crate::variant::Assignment;

/// Renders a `recipe.lua` script, tracking which parameters it reads.
///
/// The script source is read once; each render runs it in a new Lua state.
#[derive(Debug, Clone)]
pub struct LuaRenderer {
  path: PathBuf,
  dir: PathBuf,
  source: String,
}

impl LuaRenderer {
  /// Load `recipe.lua` from a recipe directory.
  pub fn from_dir(dir: &Path) -> Result<Self, RenderError> {
    let path = dir.join(RECIPE_FILE);
    let source = std::fs::read_to_string(&path).map_err(|source| RenderError::Io {
      path: path.clone(),
      source,
    })?;
    Ok(Self {
      path,
      dir: dir.to_path_buf(),
      source,
    })
  }

  pub fn from_source(dir: &Path, source: impl Into<String>) -> Self {
    Self {
      path: dir.join(RECIPE_FILE),
      dir: dir.to_path_buf(),
      source: source.into(),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn render_document(&self, state: &Rc<RenderState>) -> Result<RenderedDocument, RenderError> {
    let lua = create_runtime(state.clone(), &self.dir)?;
    let value = eval_source(&lua, &self.source, &self.path)?;
    document_from_lua(value, state)
  }
}

impl Renderer for LuaRenderer {
  fn render(&self, assignment: &Assignment) -> Result<Rendered, RenderError> {
    let state = Rc::new(RenderState::new(assignment.clone()));

    match self.render_document(&state) {
      Ok(document) => {
        let used = state.all_used();
        trace!(recipe = %self.path.display(), used = used.len(), "rendered recipe");
        Ok(Rendered { document, used })
      }
      Err(err) => match state.take_undefined() {
        Some(name) => Err(RenderError::UndefinedVariable {
          optional: state.is_optional(&name),
          name,
        }),
        None => Err(err),
      },
    }
  }
}
