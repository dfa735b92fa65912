//! The build context threaded through every plugin.
//!
//! A [`Context`] is created by [`Project::context`](crate::project::Project::context)
//! at the start of a build session and holds everything plugins can see or
//! change: project metadata, the two output packs, the cache, and the queue of
//! plugins still to run.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::rc::Rc;

use chrono::{DateTime, Local};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::cache::MultiCache;
use crate::loader::ModuleLoader;
use crate::pack::{File, FileType, Pack, PackKind};
use crate::plugin::{self, Plugin, PluginError, PluginId, PluginSpec};
use crate::template::{self, TemplateError, Value as TemplateValue, Variables};

/// Name template used by [`Context::generate`] when `meta.generate_template` is unset.
pub const DEFAULT_GENERATE_TEMPLATE: &str = "beet:generated/{type}_{id:08X}";

#[derive(Debug, Error)]
pub enum ContextError {
  #[error("no pack accepts items of type '{0}'")]
  NoPackFor(FileType),

  #[error("meta.generate_template must be a string, got {0}")]
  InvalidGenerateTemplate(Value),

  #[error(transparent)]
  Template(#[from] TemplateError),
}

pub struct Context {
  pub directory: PathBuf,
  pub output_directory: PathBuf,
  /// Deep copy of the project metadata; changes never reach the project.
  pub meta: Map<String, Value>,
  pub cache: MultiCache,
  pub assets: Pack,
  pub data: Pack,
  /// Plugins not applied yet. The engine pops from the front; plugins may push anywhere.
  pub pipeline: VecDeque<PluginSpec>,
  /// Every plugin invoked so far. Holding the plugin keeps its identity unique for the session.
  pub applied_plugins: HashMap<PluginId, Plugin>,
  pub beet_default: String,
  pub current_time: DateTime<Local>,
  pub counters: HashMap<String, u64>,
  pub(crate) loader: Rc<dyn ModuleLoader>,
  pub(crate) raised: Option<PluginError>,
}

impl fmt::Debug for Context {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Context")
      .field("directory", &self.directory)
      .field("output_directory", &self.output_directory)
      .field("meta", &self.meta)
      .field("assets", &self.assets)
      .field("data", &self.data)
      .field("pipeline", &self.pipeline)
      .field("applied_plugins", &self.applied_plugins.len())
      .finish_non_exhaustive()
  }
}

impl Context {
  pub fn packs(&self) -> [&Pack; 2] {
    [&self.assets, &self.data]
  }

  pub fn pack_mut(&mut self, kind: PackKind) -> &mut Pack {
    match kind {
      PackKind::Resource => &mut self.assets,
      PackKind::Data => &mut self.data,
    }
  }

  /// The pack that holds items of `file_type`.
  pub fn pack_for(&mut self, file_type: FileType) -> Result<&mut Pack, ContextError> {
    let kind = self
      .packs()
      .into_iter()
      .find(|pack| pack.accepts(file_type))
      .map(|pack| pack.kind)
      .ok_or(ContextError::NoPackFor(file_type))?;
    Ok(self.pack_mut(kind))
  }

  pub fn loader(&self) -> &dyn ModuleLoader {
    self.loader.as_ref()
  }

  pub fn is_applied(&self, plugin: &Plugin) -> bool {
    self.applied_plugins.contains_key(&plugin.id())
  }

  /// Resolve and run a plugin.
  ///
  /// A plugin that already ran in this session is skipped unless `force` is
  /// set. The plugin is recorded before it runs, so a plugin that applies
  /// itself (directly or through a cycle) does not recurse.
  pub fn apply(&mut self, spec: impl Into<PluginSpec>, force: bool) -> Result<(), PluginError> {
    let spec = spec.into();
    let plugin = plugin::resolve(&spec, self.loader.as_ref(), &self.beet_default)?;
    let id = plugin.id();

    if self.applied_plugins.contains_key(&id) && !force {
      debug!(plugin = plugin.name(), "plugin already applied");
      return Ok(());
    }

    self.applied_plugins.insert(id, plugin.clone());
    debug!(plugin = plugin.name(), force, "applying plugin");
    plugin.invoke(self)
  }

  /// Temporarily override metadata keys.
  ///
  /// Keys that already existed get their previous value back when the
  /// returned guard is dropped, whether the scope ends normally, through `?`,
  /// or by unwinding. Keys that did not exist before keep the override value.
  pub fn override_meta<I, K>(&mut self, options: I) -> MetaOverride<'_>
  where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
  {
    let mut backup = Map::new();
    for (key, value) in options {
      let key = key.into();
      if !backup.contains_key(&key)
        && let Some(previous) = self.meta.get(&key)
      {
        backup.insert(key.clone(), previous.clone());
      }
      self.meta.insert(key, value);
    }
    MetaOverride { ctx: self, backup }
  }

  /// Add an item to the pack that accepts its type under a fresh generated name.
  pub fn generate(&mut self, file: File) -> Result<String, ContextError> {
    let file_type = file.file_type;
    self.pack_for(file_type)?;

    let template = match self.meta.get("generate_template") {
      None => DEFAULT_GENERATE_TEMPLATE.to_string(),
      Some(Value::String(template)) => template.clone(),
      Some(other) => return Err(ContextError::InvalidGenerateTemplate(other.clone())),
    };

    let name = self.generate_name(&template.replace("{type}", file_type.type_name()))?;
    self.pack_for(file_type)?.insert(name.clone(), file);
    Ok(name)
  }

  /// Bump the counter for `template` and render it with the new value as `{id}`.
  ///
  /// The first name for a template uses id 1.
  pub fn generate_name(&mut self, template: &str) -> Result<String, TemplateError> {
    let counter = self.counters.entry(template.to_string()).or_insert(0);
    *counter += 1;

    let mut vars = Variables::new();
    vars.insert("id".to_string(), TemplateValue::Int(*counter));
    template::render(template, &vars)
  }
}

/// Scope guard returned by [`Context::override_meta`].
pub struct MetaOverride<'a> {
  ctx: &'a mut Context,
  backup: Map<String, Value>,
}

impl Deref for MetaOverride<'_> {
  type Target = Context;

  fn deref(&self) -> &Context {
    &*self.ctx
  }
}

impl DerefMut for MetaOverride<'_> {
  fn deref_mut(&mut self) -> &mut Context {
    &mut *self.ctx
  }
}

impl Drop for MetaOverride<'_> {
  fn drop(&mut self) {
    let backup = std::mem::take(&mut self.backup);
    self.ctx.meta.extend(backup);
  }
}
