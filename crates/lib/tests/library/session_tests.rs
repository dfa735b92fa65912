//! Tests for session setup, teardown, and module isolation between builds.

use std::rc::Rc;

use beet_lib::lua::runtime::LuaLoader;
use beet_lib::plugins::PRELUDE;
use beet_lib::project::Project;
use mlua::prelude::*;
use serde_json::json;

use super::common::{ProjectDir, lua_loader};

fn package_path(loader: &LuaLoader) -> LuaResult<String> {
  loader.lua().globals().get::<LuaTable>("package")?.get("path")
}

const VERSIONED: &str = r#"
LOADS = (LOADS or 0) + 1
local loads = LOADS
return function(ctx)
  ctx:set_meta("version", VERSION_MARKER)
  ctx:set_meta("loads", loads)
end
"#;

fn versioned(version: u32) -> String {
  VERSIONED.replace("VERSION_MARKER", &version.to_string())
}

#[test]
fn modified_modules_reload_in_the_next_session() {
  let dir = ProjectDir::with_config(r#"{ "pipeline": ["plugins.versioned"] }"#);
  dir.write_file("plugins/versioned.lua", &versioned(1));
  let loader = lua_loader();

  let first = dir.build_with(&loader).unwrap();
  assert_eq!(first.meta["version"], json!(1));
  assert_eq!(first.meta["loads"], json!(1));

  dir.write_file("plugins/versioned.lua", &versioned(2));

  let second = dir.build_with(&loader).unwrap();
  assert_eq!(second.meta["version"], json!(2));
  assert_eq!(second.meta["loads"], json!(2));
}

#[test]
fn modules_stay_cached_within_a_session() {
  let dir = ProjectDir::with_config(r#"{ "pipeline": ["plugins.versioned", "reload"] }"#);
  dir.write_file("plugins/versioned.lua", &versioned(1));
  dir.write_file("reload.lua", r#"return function(ctx) ctx:apply("plugins.versioned", true) end"#);

  let ctx = dir.build_with(&lua_loader()).unwrap();
  assert_eq!(ctx.meta["loads"], json!(1));
}

#[test]
fn search_path_is_restored_after_builds() -> LuaResult<()> {
  let dir = ProjectDir::with_config(r#"{ "pipeline": ["ok"] }"#);
  dir.write_file("ok.lua", "return function(ctx) end");
  let loader = lua_loader();
  let before = package_path(&loader)?;

  dir.build_with(&loader).unwrap();
  assert_eq!(package_path(&loader)?, before);
  Ok(())
}

#[test]
fn failed_builds_still_release_the_session() -> LuaResult<()> {
  let dir = ProjectDir::with_config(r#"{ "pipeline": ["fails"] }"#);
  dir.write_file("fails.lua", "return function(ctx) error('nope') end");
  let loader = lua_loader();
  let before = package_path(&loader)?;

  assert!(dir.build_with(&loader).is_err());
  assert_eq!(package_path(&loader)?, before);

  let still_loaded: bool = loader.lua().load("return package.loaded['fails'] ~= nil").eval()?;
  assert!(!still_loaded);
  Ok(())
}

#[test]
fn projects_do_not_see_each_others_modules() {
  let first = ProjectDir::with_config(r#"{ "pipeline": ["shared_name"] }"#);
  first.write_file("shared_name.lua", r#"return function(ctx) ctx:set_meta("from", "first") end"#);
  let second = ProjectDir::with_config(r#"{ "pipeline": ["shared_name"] }"#);
  second.write_file("shared_name.lua", r#"return function(ctx) ctx:set_meta("from", "second") end"#);
  let loader = lua_loader();

  assert_eq!(first.build_with(&loader).unwrap().meta["from"], json!("first"));
  assert_eq!(second.build_with(&loader).unwrap().meta["from"], json!("second"));
}

#[test]
fn cache_lives_in_the_project_directory() {
  let dir = ProjectDir::with_config(r#"{ "pipeline": ["remember"] }"#);
  dir.write_file("remember.lua", r#"return function(ctx) ctx:set_meta("cache", ctx:cache_dir("lectern")) end"#);

  let ctx = dir.build_with(&lua_loader()).unwrap();
  let root = dunce::canonicalize(dir.path()).unwrap().join(Project::CACHE_DIRECTORY);
  assert!(ctx.cache.is_closed());
  assert_eq!(ctx.cache.path(), root);
  assert_eq!(ctx.meta["cache"], json!(root.join("lectern").display().to_string()));
  assert!(root.join("lectern").is_dir());
}

#[test]
fn output_directory_is_created() {
  let dir = ProjectDir::with_config(r#"{ "meta": { "output_directory": "build/out" } }"#);
  let ctx = dir.build_with(&lua_loader()).unwrap();
  assert!(ctx.output_directory.is_dir());
  assert!(ctx.output_directory.ends_with("build/out"));
}

mod prelude {
  use super::*;

  #[test]
  fn inserted_by_default() {
    let dir = ProjectDir::with_config(r#"{ "pipeline": ["a"] }"#);
    let names: Vec<String> = dir.project().pipeline.iter().map(ToString::to_string).collect();
    assert_eq!(names, vec![PRELUDE, "a"]);
  }

  #[test]
  fn omitted_when_disabled() {
    let dir = ProjectDir::with_config(r#"{ "prelude": false, "pipeline": ["a"] }"#);
    let names: Vec<String> = dir.project().pipeline.iter().map(ToString::to_string).collect();
    assert_eq!(names, vec!["a"]);
  }

  #[test]
  fn build_without_loader_builtins_fails_on_prelude() {
    let dir = ProjectDir::with_config("{}");
    let loader = Rc::new(LuaLoader::new().unwrap());
    assert!(dir.project().build(loader).is_err());
  }
}
