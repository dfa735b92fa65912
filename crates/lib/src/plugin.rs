//! Plugins and plugin references.
//!
//! A [`Plugin`] is a callable unit that receives the build [`Context`]. It is
//! either a native Rust closure or a Lua function loaded from project code.
//! Pipelines hold [`PluginSpec`]s, which are either a plugin or a textual
//! locator (`"pkg.mod"`) that the [`ModuleLoader`] turns into one.
//!
//! Every plugin has a [`PluginId`], a stable identity token used by
//! [`Context::apply`] to invoke each plugin at most once per build. Identity is
//! reference identity, never value equality: two clones of one plugin share an
//! id, two closures with identical code do not.

use std::error::Error as StdError;
use std::fmt;
use std::rc::Rc;

use mlua::prelude::*;
use thiserror::Error;

use crate::context::Context;
use crate::loader::ModuleLoader;

/// Signature of native plugin bodies.
pub type PluginFn = dyn Fn(&mut Context) -> anyhow::Result<()>;

/// Errors surfaced by plugin resolution and invocation.
#[derive(Debug, Error)]
pub enum PluginError {
  /// A textual plugin reference could not be resolved.
  #[error("failed to import plugin `{locator}`")]
  Import {
    locator: String,
    #[source]
    source: anyhow::Error,
  },

  /// A resolved plugin failed while running.
  #[error("plugin `{plugin}` failed")]
  Failed {
    plugin: String,
    #[source]
    source: anyhow::Error,
  },

  /// Raised on purpose by a plugin to stop the build with a message.
  #[error("{message}")]
  Aborted { message: String },
}

impl PluginError {
  pub fn aborted(message: impl Into<String>) -> Self {
    Self::Aborted {
      message: message.into(),
    }
  }

  /// The error and all of its causes, joined with `: `.
  pub fn chain_message(&self) -> String {
    let mut message = self.to_string();
    let mut source = self.source();
    while let Some(err) = source {
      message.push_str(": ");
      message.push_str(&err.to_string());
      source = err.source();
    }
    message
  }
}

/// Stable identity of a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PluginId(usize);

#[derive(Clone)]
enum Body {
  Native(Rc<PluginFn>),
  Lua { lua: Lua, func: LuaFunction },
}

#[derive(Clone)]
pub struct Plugin {
  name: Rc<str>,
  body: Body,
}

impl Plugin {
  /// Wrap a Rust closure as a plugin.
  pub fn native<F>(name: &str, func: F) -> Self
  where
    F: Fn(&mut Context) -> anyhow::Result<()> + 'static,
  {
    Self {
      name: Rc::from(name),
      body: Body::Native(Rc::new(func)),
    }
  }

  /// Wrap a Lua function as a plugin.
  pub fn lua(lua: &Lua, name: &str, func: LuaFunction) -> Self {
    Self {
      name: Rc::from(name),
      body: Body::Lua {
        lua: lua.clone(),
        func,
      },
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn id(&self) -> PluginId {
    match &self.body {
      Body::Native(func) => PluginId(Rc::as_ptr(func) as *const () as usize),
      Body::Lua { func, .. } => PluginId(func.to_pointer() as usize),
    }
  }

  /// Run the plugin against the context.
  ///
  /// Errors that are already [`PluginError`]s come back unchanged. Anything
  /// else is reported as [`PluginError::Failed`] naming this plugin, with the
  /// plugin's own error as the source.
  pub(crate) fn invoke(&self, ctx: &mut Context) -> Result<(), PluginError> {
    match &self.body {
      Body::Native(func) => func(ctx).map_err(|err| match err.downcast::<PluginError>() {
        Ok(err) => err,
        Err(source) => PluginError::Failed {
          plugin: self.name.to_string(),
          source,
        },
      }),
      Body::Lua { lua, func } => {
        // An outer Lua frame may still hold a caught error it will rethrow.
        let outer = ctx.raised.take();
        let result = lua.scope(|scope| {
          let userdata = scope.create_userdata_ref_mut(&mut *ctx)?;
          func.call::<()>(userdata)
        });
        let raised = std::mem::replace(&mut ctx.raised, outer);

        match result {
          Ok(()) => Ok(()),
          Err(err) => match raised {
            Some(raised) if carries_raised(&err) => Err(raised),
            _ => Err(PluginError::Failed {
              plugin: self.name.to_string(),
              source: err.into(),
            }),
          },
        }
      }
    }
  }
}

impl fmt::Debug for Plugin {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Plugin").field("name", &self.name).field("id", &self.id()).finish()
  }
}

/// Marker carried through Lua when a context method fails with a [`PluginError`].
///
/// The error itself is parked on the context so it can cross the Lua boundary
/// without being re-wrapped.
#[derive(Debug, Error)]
#[error("{0}")]
pub(crate) struct Raised(pub(crate) String);

/// Park `err` on the context and return the Lua error that stands in for it.
pub(crate) fn raise(ctx: &mut Context, err: PluginError) -> LuaError {
  let message = err.chain_message();
  ctx.raised = Some(err);
  LuaError::external(Raised(message))
}

fn carries_raised(err: &LuaError) -> bool {
  match err {
    LuaError::CallbackError { cause, .. } => carries_raised(cause),
    LuaError::WithContext { cause, .. } => carries_raised(cause),
    LuaError::ExternalError(inner) => inner.downcast_ref::<Raised>().is_some(),
    _ => false,
  }
}

/// A reference to a plugin: the plugin itself, or a locator resolving to one.
#[derive(Debug, Clone)]
pub enum PluginSpec {
  Plugin(Plugin),
  Path(String),
}

impl fmt::Display for PluginSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PluginSpec::Plugin(plugin) => f.write_str(plugin.name()),
      PluginSpec::Path(locator) => f.write_str(locator),
    }
  }
}

impl From<Plugin> for PluginSpec {
  fn from(plugin: Plugin) -> Self {
    PluginSpec::Plugin(plugin)
  }
}

impl From<&str> for PluginSpec {
  fn from(locator: &str) -> Self {
    PluginSpec::Path(locator.to_string())
  }
}

impl From<String> for PluginSpec {
  fn from(locator: String) -> Self {
    PluginSpec::Path(locator)
  }
}

/// Turn a plugin reference into a callable plugin.
///
/// Plugins are returned as-is. Locators are handed to the loader along with the
/// default entry-point name; loader failures become [`PluginError::Import`]
/// unless the loader already produced a [`PluginError`].
pub fn resolve(spec: &PluginSpec, loader: &dyn ModuleLoader, default_member: &str) -> Result<Plugin, PluginError> {
  match spec {
    PluginSpec::Plugin(plugin) => Ok(plugin.clone()),
    PluginSpec::Path(locator) => loader
      .import(locator, default_member)
      .map_err(|err| match err.downcast::<PluginError>() {
        Ok(err) => err,
        Err(source) => PluginError::Import {
          locator: locator.clone(),
          source,
        },
      }),
  }
}
