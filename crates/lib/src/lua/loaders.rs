//! Lua module loading for project plugins.
//!
//! Plugin modules are plain Lua files found through `package.path`. We hook into
//! `package.searchers[2]` (the Lua file searcher) with a function that:
//! 1. Uses Lua's built-in `package.searchpath` for path resolution
//! 2. Records which file backs each module name
//! 3. Loads the file with a `__dir` variable pointing at its directory
//!
//! `require` keeps its own caching in `package.loaded`. The file index lets
//! [`evict_modules`] drop every cached module that came from a given directory.

use std::fs;
use std::path::{Path, PathBuf};

use mlua::prelude::*;

/// Registry key of the table mapping module names to their backing files.
const MODULE_FILES_KEY: &str = "__beet_module_files";

/// Load and run a Lua file with `__dir` set to its directory.
///
/// The chunk gets its own environment table that reads and writes through to
/// `_G`, so globals assigned by the file stay visible to other modules.
pub fn load_file_with_dir(lua: &Lua, path: &Path) -> LuaResult<LuaValue> {
  let canonical_path = dunce::canonicalize(path)
    .map_err(|e| LuaError::external(format!("cannot resolve '{}': {}", path.display(), e)))?;

  let content = fs::read_to_string(&canonical_path)
    .map_err(|e| LuaError::external(format!("cannot read '{}': {}", canonical_path.display(), e)))?;

  let dir = canonical_path
    .parent()
    .unwrap_or(Path::new("."))
    .to_string_lossy()
    .into_owned();

  let env = lua.create_table()?;
  env.set("__dir", dir)?;

  let mt = lua.create_table()?;
  mt.set("__index", lua.globals())?;
  mt.set("__newindex", lua.globals())?;
  env.set_metatable(Some(mt))?;

  lua
    .load(&content)
    .set_name(format!("@{}", canonical_path.display()))
    .set_environment(env)
    .eval::<LuaValue>()
}

fn module_files(lua: &Lua) -> LuaResult<LuaTable> {
  match lua.named_registry_value::<Option<LuaTable>>(MODULE_FILES_KEY)? {
    Some(table) => Ok(table),
    None => {
      let table = lua.create_table()?;
      lua.set_named_registry_value(MODULE_FILES_KEY, table.clone())?;
      Ok(table)
    }
  }
}

/// Find the file backing `modname` on `package.path`, if any.
pub fn search_module(lua: &Lua, modname: &str) -> LuaResult<Option<PathBuf>> {
  let package: LuaTable = lua.globals().get("package")?;
  let path: String = package.get("path")?;
  let searchpath: LuaFunction = package.get("searchpath")?;

  // searchpath returns (filepath) on success or (nil, errmsg) on failure
  let (found, _): (Option<String>, Option<String>) = searchpath.call((modname, path))?;
  Ok(found.map(PathBuf::from))
}

/// Whether `modname` is loaded, preloaded, or found on `package.path`.
pub fn module_exists(lua: &Lua, modname: &str) -> LuaResult<bool> {
  let package: LuaTable = lua.globals().get("package")?;
  let loaded: LuaTable = package.get("loaded")?;
  let preload: LuaTable = package.get("preload")?;

  if !loaded.get::<LuaValue>(modname)?.is_nil() || !preload.get::<LuaValue>(modname)?.is_nil() {
    return Ok(true);
  }
  Ok(search_module(lua, modname)?.is_some())
}

fn create_lua_searcher(lua: &Lua) -> LuaResult<LuaFunction> {
  lua.create_function(|lua, modname: String| {
    let Some(filepath) = search_module(lua, &modname)? else {
      let errmsg = format!("\n\tno file for module '{}'", modname);
      return Ok((LuaValue::Nil, errmsg));
    };

    let canonical = dunce::canonicalize(&filepath).unwrap_or_else(|_| filepath.clone());
    module_files(lua)?.set(modname.as_str(), canonical.to_string_lossy().into_owned())?;

    let loader = lua.create_function(move |lua, _: LuaMultiValue| load_file_with_dir(lua, &canonical))?;
    Ok((LuaValue::Function(loader), filepath.to_string_lossy().into_owned()))
  })
}

/// Replace `package.searchers[2]` with the indexing file searcher.
pub fn install_loaders(lua: &Lua) -> LuaResult<()> {
  let package: LuaTable = lua.globals().get("package")?;
  let searchers: LuaTable = package.get("searchers")?;
  searchers.set(2, create_lua_searcher(lua)?)?;
  module_files(lua)?;
  Ok(())
}

fn search_entries(dir: &Path) -> [String; 2] {
  let dir = dir.display();
  [format!("{dir}/?.lua"), format!("{dir}/?/init.lua")]
}

/// Append `dir` to `package.path`.
pub fn add_search_path(lua: &Lua, dir: &Path) -> LuaResult<()> {
  let package: LuaTable = lua.globals().get("package")?;
  let path: String = package.get("path")?;

  let added = search_entries(dir).join(";");
  let path = if path.is_empty() { added } else { format!("{path};{added}") };
  package.set("path", path)
}

/// Remove the entries added by [`add_search_path`] for `dir`.
///
/// Returns `false` when `dir` was not on the path.
pub fn remove_search_path(lua: &Lua, dir: &Path) -> LuaResult<bool> {
  let package: LuaTable = lua.globals().get("package")?;
  let path: String = package.get("path")?;

  let mut entries: Vec<&str> = path.split(';').collect();
  let mut removed = false;
  for target in search_entries(dir) {
    if let Some(pos) = entries.iter().rposition(|e| *e == target) {
      entries.remove(pos);
      removed = true;
    }
  }

  if removed {
    package.set("path", entries.join(";"))?;
  }
  Ok(removed)
}

/// Drop every loaded module whose file lies under `prefix`.
///
/// The next `require` of an evicted module runs its file again. Returns the
/// evicted module names, sorted.
pub fn evict_modules(lua: &Lua, prefix: &Path) -> LuaResult<Vec<String>> {
  let files = module_files(lua)?;
  let loaded: LuaTable = lua.globals().get::<LuaTable>("package")?.get("loaded")?;

  let mut evicted = Vec::new();
  for pair in files.pairs::<String, String>() {
    let (modname, file) = pair?;
    if Path::new(&file).starts_with(prefix) {
      evicted.push(modname);
    }
  }
  evicted.sort();

  for modname in &evicted {
    loaded.set(modname.as_str(), LuaValue::Nil)?;
    files.set(modname.as_str(), LuaValue::Nil)?;
  }
  Ok(evicted)
}
