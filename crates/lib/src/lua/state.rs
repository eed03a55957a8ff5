//! Per-render bookkeeping shared between the Lua globals and the renderer.

use std::cell::RefCell;
use std::collections::BTreeSet;

use crate::render::UsedParameterSet;
use crate::variant::{Assignment, VariantValue};

/// State of one render pass. A fresh instance is created for every call.
#[derive(Debug, Default)]
pub struct RenderState {
  assignment: Assignment,
  document_used: RefCell<UsedParameterSet>,
  /// Reads attributed to the output currently being evaluated, if any.
  output_scope: RefCell<Option<UsedParameterSet>>,
  scoped_total: RefCell<UsedParameterSet>,
  optional: RefCell<BTreeSet<String>>,
  undefined: RefCell<Option<String>>,
}

impl RenderState {
  pub fn new(assignment: Assignment) -> Self {
    Self {
      assignment,
      ..Default::default()
    }
  }

  fn record(&self, name: &str) {
    let mut scope = self.output_scope.borrow_mut();
    match scope.as_mut() {
      Some(used) => {
        used.insert(name);
        self.scoped_total.borrow_mut().insert(name);
      }
      None => {
        self.document_used.borrow_mut().insert(name);
      }
    }
  }

  /// Read a parameter, recording the lookup. A missing key is remembered so the
  /// failed render can be reported as an undefined variable.
  pub fn lookup(&self, name: &str) -> Option<VariantValue> {
    self.record(name);
    let value = self.assignment.get(name).cloned();
    if value.is_none() {
      self.undefined.borrow_mut().get_or_insert_with(|| name.to_string());
    }
    value
  }

  /// Read a parameter that may legitimately be absent. Only present keys are recorded.
  pub fn lookup_quiet(&self, name: &str) -> Option<VariantValue> {
    let value = self.assignment.get(name).cloned();
    if value.is_some() {
      self.record(name);
    }
    value
  }

  pub fn is_defined(&self, name: &str) -> bool {
    self.record(name);
    self.assignment.contains_key(name)
  }

  pub fn mark_optional(&self, name: impl Into<String>) {
    self.optional.borrow_mut().insert(name.into());
  }

  pub fn is_optional(&self, name: &str) -> bool {
    self.optional.borrow().contains(name)
  }

  pub fn take_undefined(&self) -> Option<String> {
    self.undefined.borrow_mut().take()
  }

  pub fn begin_output(&self) {
    *self.output_scope.borrow_mut() = Some(UsedParameterSet::new());
  }

  pub fn end_output(&self) -> UsedParameterSet {
    self.output_scope.borrow_mut().take().unwrap_or_default()
  }

  /// Reads made outside any output function.
  pub fn document_used(&self) -> UsedParameterSet {
    self.document_used.borrow().clone()
  }

  /// Every read made during the render.
  pub fn all_used(&self) -> UsedParameterSet {
    let mut all = self.document_used.borrow().clone();
    all.extend(&self.scoped_total.borrow());
    all
  }
}
