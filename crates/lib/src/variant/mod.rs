//! Variant parameter space.
//!
//! - [`types`] - values, assignments, zip groups and the merged space
//! - [`load`] - layered configuration loading, merging and subspace selection

pub mod load;
pub mod types;

pub use load::{ConfigLayer, VariantConfigError, discover_layers, load, parse_override};
pub use types::{Assignment, ParameterSpace, PinExpression, VariantValue, ZipGroup, normalize_key};
