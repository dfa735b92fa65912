//! Embedded Lua support.
//!
//! Project plugins are Lua modules. This module provides the Lua execution
//! environment they run in.
//!
//! # Submodules
//!
//! - [`context`] - The build context exposed to Lua plugins as userdata
//! - [`loaders`] - Module search path, file-backed `require`, and eviction
//! - [`runtime`] - [`LuaLoader`](runtime::LuaLoader), the production module loader

pub mod context;
pub mod loaders;
pub mod runtime;
