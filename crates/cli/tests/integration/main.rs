//! CLI integration tests over recipe fixtures.

mod common;
mod outputs_tests;
mod render_tests;
mod variants_tests;
