//! Shared helpers for library integration tests.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use beet_lib::context::Context;
use beet_lib::lua::runtime::LuaLoader;
use beet_lib::project::{Project, ProjectError};
use tempfile::TempDir;

/// A project directory in a temporary location.
pub struct ProjectDir {
  pub temp: TempDir,
}

impl ProjectDir {
  /// Create a project whose `beet.json` holds `config`.
  pub fn with_config(config: &str) -> Self {
    let dir = Self { temp: TempDir::new().unwrap() };
    dir.write_file("beet.json", config);
    dir
  }

  pub fn path(&self) -> &Path {
    self.temp.path()
  }

  pub fn config_path(&self) -> PathBuf {
    self.temp.path().join("beet.json")
  }

  /// Write a file relative to the project directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn project(&self) -> Project {
    Project::from_config(&self.config_path()).unwrap()
  }

  /// Build the project once with `loader`.
  pub fn build_with(&self, loader: &Rc<LuaLoader>) -> Result<Context, ProjectError> {
    self.project().build(loader.clone())
  }
}

pub fn lua_loader() -> Rc<LuaLoader> {
  Rc::new(LuaLoader::with_builtins().unwrap())
}
