//! Rendered recipe documents.
//!
//! A recipe renders, for one assignment, into a [`RenderedDocument`]: the
//! package identity, build options, requirement lists and any explicit outputs.

mod types;

pub use types::*;
