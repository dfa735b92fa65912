//! Test utilities for beet-lib.
//!
//! [`FakeLoader`] stands in for the Lua-backed module loader and records every
//! call made to it. [`TestProject`] wraps a project rooted in a temporary
//! directory and opens sessions against it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::anyhow;
use tempfile::TempDir;

use crate::loader::{LoaderError, ModuleLoader};
use crate::plugin::{Plugin, PluginError};
use crate::project::{Project, Session};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderCall {
  Register(PathBuf),
  Unregister(PathBuf),
  Evict(PathBuf),
}

type Failure = Box<dyn Fn() -> PluginError>;

/// In-memory module loader.
///
/// Locators resolve to plugins defined with [`FakeLoader::define`]; anything
/// else fails to import.
#[derive(Default)]
pub struct FakeLoader {
  plugins: RefCell<HashMap<String, Plugin>>,
  failures: RefCell<HashMap<String, Failure>>,
  imports: RefCell<Vec<(String, String)>>,
  calls: RefCell<Vec<LoaderCall>>,
  registered: RefCell<Vec<PathBuf>>,
}

impl FakeLoader {
  pub fn define(&self, locator: &str, plugin: Plugin) {
    self.plugins.borrow_mut().insert(locator.to_string(), plugin);
  }

  /// Make imports of `locator` fail with the error built by `make`.
  pub fn fail_with(&self, locator: &str, make: impl Fn() -> PluginError + 'static) {
    self.failures.borrow_mut().insert(locator.to_string(), Box::new(make));
  }

  /// Every `(locator, default_member)` pair passed to `import`.
  pub fn imports(&self) -> Vec<(String, String)> {
    self.imports.borrow().clone()
  }

  pub fn calls(&self) -> Vec<LoaderCall> {
    self.calls.borrow().clone()
  }

  /// Directories currently on the fake search path.
  pub fn registered(&self) -> Vec<PathBuf> {
    self.registered.borrow().clone()
  }
}

impl ModuleLoader for FakeLoader {
  fn register(&self, path: &Path) -> Result<(), LoaderError> {
    self.calls.borrow_mut().push(LoaderCall::Register(path.to_path_buf()));
    self.registered.borrow_mut().push(path.to_path_buf());
    Ok(())
  }

  fn unregister(&self, path: &Path) -> Result<(), LoaderError> {
    self.calls.borrow_mut().push(LoaderCall::Unregister(path.to_path_buf()));
    let mut registered = self.registered.borrow_mut();
    match registered.iter().rposition(|p| p == path) {
      Some(pos) => {
        registered.remove(pos);
        Ok(())
      }
      None => Err(LoaderError::NotRegistered(path.to_path_buf())),
    }
  }

  fn evict(&self, prefix: &Path) -> Result<Vec<String>, LoaderError> {
    self.calls.borrow_mut().push(LoaderCall::Evict(prefix.to_path_buf()));
    Ok(Vec::new())
  }

  fn import(&self, locator: &str, default_member: &str) -> anyhow::Result<Plugin> {
    self
      .imports
      .borrow_mut()
      .push((locator.to_string(), default_member.to_string()));

    if let Some(make) = self.failures.borrow().get(locator) {
      return Err(make().into());
    }
    self
      .plugins
      .borrow()
      .get(locator)
      .cloned()
      .ok_or_else(|| anyhow!("no module named `{locator}`"))
  }
}

/// A default project rooted in a temporary directory.
pub struct TestProject {
  pub temp: TempDir,
  pub project: Project,
}

impl TestProject {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let project = Project::new(temp.path());
    Self { temp, project }
  }

  /// Open a session with an empty [`FakeLoader`].
  pub fn session(&self) -> Session {
    self.session_with(FakeLoader::default())
  }

  pub fn session_with(&self, loader: FakeLoader) -> Session {
    self.session_with_loader(Rc::new(loader))
  }

  pub fn session_with_loader(&self, loader: Rc<dyn ModuleLoader>) -> Session {
    self.project.context(loader).unwrap()
  }
}
