//! beet-lib: the beet build pipeline
//!
//! This crate provides the core of beet:
//! - `Project`: a build configuration and the sessions opened from it
//! - `Context`: the state every plugin reads and mutates during a build
//! - `Plugin`: native or Lua callables applied at most once per build
//! - `ModuleLoader`: the injectable seam between textual plugin references and code

pub mod cache;
pub mod context;
pub mod loader;
pub mod lua;
pub mod pack;
pub mod plugin;
pub mod plugins;
pub mod project;
pub mod template;
pub mod util;
