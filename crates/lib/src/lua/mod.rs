//! Lua recipe rendering.
//!
//! Recipes are Lua scripts returning a table. This module provides the
//! execution environment and the [`Renderer`](crate::render::Renderer)
//! implementation built on it.
//!
//! # Submodules
//!
//! - [`globals`] - Lua globals (`variant`, `pin_subpackage()`, `compiler()`, ...)
//! - [`state`] - per-render usage tracking
//! - [`convert`] - recipe table to [`RenderedDocument`](crate::recipe::RenderedDocument)
//! - [`renderer`] - the [`LuaRenderer`]
//! - [`runtime`] - Lua VM creation

pub mod convert;
pub mod globals;
pub mod renderer;
pub mod runtime;
pub mod state;

pub use renderer::LuaRenderer;
