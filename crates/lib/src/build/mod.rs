//! Finalized build configurations and their build strings.
//!
//! # Submodules
//!
//! - [`hash`] - build-string hash and legacy language tags

pub mod hash;
mod types;

pub use types::*;
