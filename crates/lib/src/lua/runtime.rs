use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context as _, anyhow, bail};
use mlua::prelude::*;
use tracing::debug;

use crate::loader::{LoaderError, ModuleLoader};
use crate::lua::loaders;
use crate::plugin::Plugin;
use crate::plugins;

/// [`ModuleLoader`] backed by an embedded Lua VM.
///
/// Project directories are put on `package.path`; plugin locators are dotted
/// module names resolved with `require`. Native plugins can be defined under
/// a locator and take precedence over Lua modules of the same name.
pub struct LuaLoader {
  lua: Lua,
  builtins: RefCell<HashMap<String, Plugin>>,
}

impl LuaLoader {
  /// Create a loader with a fresh Lua VM and no built-in plugins.
  pub fn new() -> LuaResult<Self> {
    let lua = Lua::new();
    loaders::install_loaders(&lua)?;
    Ok(Self {
      lua,
      builtins: RefCell::new(HashMap::new()),
    })
  }

  /// Create a loader with the built-in plugins defined.
  pub fn with_builtins() -> LuaResult<Self> {
    let loader = Self::new()?;
    plugins::register_builtins(&loader);
    Ok(loader)
  }

  pub fn lua(&self) -> &Lua {
    &self.lua
  }

  /// Make `plugin` importable under `locator`.
  pub fn define(&self, locator: &str, plugin: Plugin) {
    self.builtins.borrow_mut().insert(locator.to_string(), plugin);
  }

  fn require(&self, modname: &str) -> anyhow::Result<LuaValue> {
    let require: LuaFunction = self.lua.globals().get("require")?;
    let loaded = require.call::<LuaValue>(modname).map_err(anyhow::Error::from);
    loaded.with_context(|| format!("failed to load module `{modname}`"))
  }

  fn member(&self, module: &str, table: &LuaTable, member: &str) -> anyhow::Result<Plugin> {
    match table.get::<LuaValue>(member)? {
      LuaValue::Function(func) => Ok(Plugin::lua(&self.lua, &format!("{module}.{member}"), func)),
      LuaValue::Nil => bail!("module `{module}` has no member `{member}`"),
      other => bail!("`{module}.{member}` is a {}, not a function", other.type_name()),
    }
  }
}

impl ModuleLoader for LuaLoader {
  fn register(&self, path: &Path) -> Result<(), LoaderError> {
    // `;` separates package.path entries and `?` stands for the module name.
    if path.to_string_lossy().contains([';', '?']) {
      return Err(LoaderError::UnsupportedPath(path.to_path_buf()));
    }
    loaders::add_search_path(&self.lua, path)?;
    debug!(path = %path.display(), "added module search path");
    Ok(())
  }

  fn unregister(&self, path: &Path) -> Result<(), LoaderError> {
    if !loaders::remove_search_path(&self.lua, path)? {
      return Err(LoaderError::NotRegistered(path.to_path_buf()));
    }
    debug!(path = %path.display(), "removed module search path");
    Ok(())
  }

  fn evict(&self, prefix: &Path) -> Result<Vec<String>, LoaderError> {
    Ok(loaders::evict_modules(&self.lua, prefix)?)
  }

  fn import(&self, locator: &str, default_member: &str) -> anyhow::Result<Plugin> {
    let builtin = self.builtins.borrow().get(locator).cloned();
    if let Some(plugin) = builtin {
      return Ok(plugin);
    }

    if loaders::module_exists(&self.lua, locator)? {
      return match self.require(locator)? {
        LuaValue::Function(func) => Ok(Plugin::lua(&self.lua, locator, func)),
        LuaValue::Table(table) => self.member(locator, &table, default_member),
        other => Err(anyhow!("module `{locator}` returned a {}, not a plugin", other.type_name())),
      };
    }

    let Some((parent, member)) = locator.rsplit_once('.') else {
      bail!("no module named `{locator}`");
    };
    if !loaders::module_exists(&self.lua, parent)? {
      bail!("no module named `{parent}` (while importing `{locator}`)");
    }

    match self.require(parent)? {
      LuaValue::Table(table) => self.member(parent, &table, member),
      other => bail!("module `{parent}` returned a {}, cannot take `{member}` from it", other.type_name()),
    }
  }
}
