//! End-to-end tests of the planning pipeline with Lua recipes.

mod common;
mod matrix_tests;
mod requirements_tests;
