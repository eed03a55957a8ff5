//! The renderer boundary.
//!
//! A [`Renderer`] turns one [`Assignment`] into a [`RenderedDocument`] and
//! reports which parameters it looked up while doing so. Renderers must not
//! keep state between calls; the expander calls them once per matrix point.

use std::collections::BTreeSet;
use std::path::PathBuf;

use mlua::prelude::*;
use serde::{Deserialize, Serialize};

use crate::recipe::RenderedDocument;
use crate::variant::Assignment;

/// Parameter names whose value was read during a render.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsedParameterSet(BTreeSet<String>);

impl UsedParameterSet {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, name: impl Into<String>) -> bool {
    self.0.insert(name.into())
  }

  pub fn contains(&self, name: &str) -> bool {
    self.0.contains(name)
  }

  pub fn extend(&mut self, other: &UsedParameterSet) {
    self.0.extend(other.0.iter().cloned());
  }

  pub fn iter(&self) -> impl Iterator<Item = &String> {
    self.0.iter()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl<'a> IntoIterator for &'a UsedParameterSet {
  type Item = &'a String;
  type IntoIter = std::collections::btree_set::Iter<'a, String>;

  fn into_iter(self) -> Self::IntoIter {
    self.0.iter()
  }
}

impl<S: Into<String>> FromIterator<S> for UsedParameterSet {
  fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
    UsedParameterSet(iter.into_iter().map(Into::into).collect())
  }
}

/// Result of a single render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
  pub document: RenderedDocument,
  /// Union of every parameter read anywhere in the document.
  pub used: UsedParameterSet,
}

/// Errors produced while rendering one assignment.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
  /// The recipe read a parameter the assignment does not define.
  #[error("undefined variant parameter '{name}'")]
  UndefinedVariable { name: String, optional: bool },

  #[error("lua error: {0}")]
  Lua(#[from] LuaError),

  #[error("invalid recipe document: {0}")]
  InvalidDocument(String),

  #[error("failed to read recipe {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl RenderError {
  /// An undefined read of a parameter the recipe marked optional.
  pub fn is_infeasible(&self) -> bool {
    matches!(self, RenderError::UndefinedVariable { optional: true, .. })
  }
}

pub trait Renderer {
  /// Render the recipe for one assignment.
  fn render(&self, assignment: &Assignment) -> Result<Rendered, RenderError>;
}

impl<F> Renderer for F
where
  F: Fn(&Assignment) -> Result<Rendered, RenderError>,
{
  fn render(&self, assignment: &Assignment) -> Result<Rendered, RenderError> {
    self(assignment)
  }
}
