//! Built-in plugins.

use anyhow::bail;
use serde_json::Value;

use crate::context::Context;
use crate::lua::runtime::LuaLoader;
use crate::plugin::Plugin;

/// Locator of the bootstrap plugin inserted at the front of configured pipelines.
pub const PRELUDE: &str = "beet.prelude";

/// Apply every plugin listed under `meta.require`, in order.
pub fn prelude() -> Plugin {
  Plugin::native(PRELUDE, |ctx: &mut Context| {
    let required = match ctx.meta.get("require") {
      None | Some(Value::Null) => return Ok(()),
      Some(Value::Array(items)) => items
        .iter()
        .map(|item| match item {
          Value::String(locator) => Ok(locator.clone()),
          other => bail!("meta.require entries must be strings, got {other}"),
        })
        .collect::<anyhow::Result<Vec<_>>>()?,
      Some(other) => bail!("meta.require must be a list of plugin locators, got {other}"),
    };

    for locator in required {
      ctx.apply(locator, false)?;
    }
    Ok(())
  })
}

/// Define the built-in plugins on `loader`.
pub fn register_builtins(loader: &LuaLoader) {
  loader.define(PRELUDE, prelude());
}
