//! Planning results.

mod types;

pub use types::*;
