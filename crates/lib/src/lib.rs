//! pkgmatrix-lib: variant expansion and planning for package builds
//!
//! Given recipes and layered variant configuration, this crate computes every
//! concrete build configuration, finalizes its requirements and build string,
//! and orders the result into a build plan:
//! - `variant`: layered parameter spaces, zip groups and pin expressions
//! - `expand`: the cross product, pruned and deduplicated by used parameters
//! - `finalize`: pins, run-exports and build strings per output
//! - `plan`: dependency ordering into parallel waves
//! - `eval`: the whole pipeline over recipe directories

pub mod build;
pub mod consts;
pub mod eval;
pub mod expand;
pub mod finalize;
pub mod lua;
pub mod manifest;
pub mod plan;
pub mod platform;
pub mod recipe;
pub mod render;
pub mod util;
pub mod variant;
pub mod version;
