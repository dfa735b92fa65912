//! The context as seen from Lua plugins.
//!
//! Lua plugins receive the [`Context`] as userdata. Errors that must reach the
//! caller unchanged (aborts, and failures of nested `ctx:apply` calls) go
//! through [`plugin::raise`]; everything else becomes a plain Lua error that
//! the invoking plugin reports as its own failure.

use std::str::FromStr;

use mlua::prelude::*;
use serde_json::Value;

use crate::context::Context;
use crate::pack::{File, FileType};
use crate::plugin::{self, Plugin, PluginError, PluginSpec};

fn spec_from_lua(lua: &Lua, value: LuaValue) -> LuaResult<PluginSpec> {
  match value {
    LuaValue::String(locator) => Ok(PluginSpec::Path(locator.to_str()?.to_string())),
    LuaValue::Function(func) => {
      let name = format!("lua function {:p}", func.to_pointer());
      Ok(PluginSpec::Plugin(Plugin::lua(lua, &name, func)))
    }
    other => Err(LuaError::external(format!(
      "expected a plugin locator or function, got {}",
      other.type_name()
    ))),
  }
}

/// Item content: strings are kept verbatim, tables are written out as JSON.
fn content_from_lua(lua: &Lua, value: LuaValue) -> LuaResult<String> {
  match value {
    LuaValue::String(s) => Ok(s.to_str()?.to_string()),
    LuaValue::Table(_) => {
      let json: Value = lua.from_value(value)?;
      serde_json::to_string_pretty(&json).map_err(LuaError::external)
    }
    other => Err(LuaError::external(format!("expected string or table content, got {}", other.type_name()))),
  }
}

fn file_type(name: &str) -> LuaResult<FileType> {
  FileType::from_str(name).map_err(LuaError::external)
}

impl LuaUserData for Context {
  fn add_fields<F: LuaUserDataFields<Self>>(fields: &mut F) {
    fields.add_field_method_get("directory", |_, this| Ok(this.directory.display().to_string()));
    fields.add_field_method_get("output_directory", |_, this| {
      Ok(this.output_directory.display().to_string())
    });
    fields.add_field_method_get("current_time", |_, this| Ok(this.current_time.to_rfc3339()));
    fields.add_field_method_get("beet_default", |_, this| Ok(this.beet_default.clone()));
  }

  fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
    // `apply` and `override` run Lua code that calls back into them, and
    // mutable methods reject re-entry. They borrow the context per call instead.
    methods.add_function("apply", |lua, (ud, value, force): (LuaAnyUserData, LuaValue, Option<bool>)| {
      let spec = spec_from_lua(lua, value)?;
      let mut this = ud.borrow_mut::<Context>()?;
      this
        .apply(spec, force.unwrap_or(false))
        .map_err(|err| plugin::raise(&mut this, err))
    });

    methods.add_method_mut("push", |lua, this, value: LuaValue| {
      let spec = spec_from_lua(lua, value)?;
      this.pipeline.push_back(spec);
      Ok(())
    });

    methods.add_method_mut("push_front", |lua, this, value: LuaValue| {
      let spec = spec_from_lua(lua, value)?;
      this.pipeline.push_front(spec);
      Ok(())
    });

    methods.add_method("get_meta", |lua, this, key: String| match this.meta.get(&key) {
      Some(value) => lua.to_value(value),
      None => Ok(LuaValue::Nil),
    });

    methods.add_method_mut("set_meta", |lua, this, (key, value): (String, LuaValue)| {
      if value.is_nil() {
        this.meta.remove(&key);
      } else {
        this.meta.insert(key, lua.from_value(value)?);
      }
      Ok(())
    });

    methods.add_function("override", |lua, (ud, options, func): (LuaAnyUserData, LuaTable, LuaFunction)| {
      let mut entries = Vec::new();
      for pair in options.pairs::<String, LuaValue>() {
        let (key, value) = pair?;
        entries.push((key, lua.from_value::<Value>(value)?));
      }

      let mut this = ud.borrow_mut::<Context>()?;
      let mut scoped = this.override_meta(entries);
      lua.scope(|scope| {
        let userdata = scope.create_userdata_ref_mut(&mut *scoped)?;
        func.call::<LuaMultiValue>(userdata)
      })
    });

    methods.add_method_mut("generate", |lua, this, (type_name, content): (String, LuaValue)| {
      let file = File::new(file_type(&type_name)?, content_from_lua(lua, content)?);
      this.generate(file).map_err(LuaError::external)
    });

    methods.add_method_mut("generate_name", |_, this, template: String| {
      this.generate_name(&template).map_err(LuaError::external)
    });

    methods.add_method_mut("add", |lua, this, (type_name, name, content): (String, String, LuaValue)| {
      let file = File::new(file_type(&type_name)?, content_from_lua(lua, content)?);
      let pack = this.pack_for(file.file_type).map_err(LuaError::external)?;
      pack.insert(name, file);
      Ok(())
    });

    methods.add_method_mut("cache_dir", |_, this, name: String| {
      let cache = this.cache.get(&name).map_err(LuaError::external)?;
      Ok(cache.directory.display().to_string())
    });

    methods.add_method_mut("abort", |_, this, message: String| -> LuaResult<()> {
      Err(plugin::raise(this, PluginError::aborted(message)))
    });
  }
}
