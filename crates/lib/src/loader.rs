//! The module loader seam.
//!
//! Textual plugin references are resolved against project-local code through a
//! [`ModuleLoader`]. The loader owns process-wide state (the module search path
//! and the registry of loaded modules), so build sessions receive it explicitly
//! instead of reaching for a global. Production code uses
//! [`LuaLoader`](crate::lua::runtime::LuaLoader); tests substitute a fake.

use std::path::{Path, PathBuf};

use mlua::prelude::*;
use thiserror::Error;

use crate::plugin::Plugin;

#[derive(Debug, Error)]
pub enum LoaderError {
  #[error("lua error: {0}")]
  Lua(#[from] LuaError),

  #[error("{} is not on the module search path", .0.display())]
  NotRegistered(PathBuf),

  #[error("{} cannot be put on the module search path (contains ';' or '?')", .0.display())]
  UnsupportedPath(PathBuf),
}

pub trait ModuleLoader {
  /// Add a directory to the module search path.
  fn register(&self, path: &Path) -> Result<(), LoaderError>;

  /// Remove a directory previously added with [`ModuleLoader::register`].
  fn unregister(&self, path: &Path) -> Result<(), LoaderError>;

  /// Forget every loaded module whose backing file lies under `prefix`, so
  /// the next import runs the module's code again. Returns the evicted names.
  fn evict(&self, prefix: &Path) -> Result<Vec<String>, LoaderError>;

  /// Resolve a locator to a plugin. `default_member` names the entry point to
  /// use when the locator names a module without naming a member.
  fn import(&self, locator: &str, default_member: &str) -> anyhow::Result<Plugin>;
}
