//! Project descriptors, build sessions, and the pipeline engine.
//!
//! A [`Project`] is the user-authored configuration of a build. Every call to
//! [`Project::context`] opens a [`Session`]: it prepares the output directory,
//! puts the project directory on the module search path, opens the cache, and
//! hands out a fresh [`Context`]. Closing the session (explicitly with
//! [`Session::finish`] or implicitly on drop) releases the cache, takes the
//! project directory off the search path, and evicts every module loaded from
//! it, so the next session imports project plugins fresh.
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use std::rc::Rc;
//! use beet_lib::lua::runtime::LuaLoader;
//! use beet_lib::project::Project;
//!
//! let project = Project::from_config(Path::new("beet.json"))?;
//! let ctx = project.build(Rc::new(LuaLoader::with_builtins()?))?;
//! println!("{} data pack items", ctx.data.len());
//! ```

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io;
use std::ops::{Deref, DerefMut};
use std::path::{self, Path, PathBuf};
use std::rc::Rc;
use std::sync::LazyLock;

use chrono::Local;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{CacheError, MultiCache};
use crate::context::Context;
use crate::loader::{LoaderError, ModuleLoader};
use crate::pack::{DATA_PACK_FORMAT, Pack, PackKind, RESOURCE_PACK_FORMAT};
use crate::plugin::{PluginError, PluginSpec};
use crate::plugins::PRELUDE;
use crate::template::{self, TemplateError, Variables};

static NON_ALPHANUMERIC: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

#[derive(Debug, Error)]
pub enum ProjectError {
  #[error("failed to read config {path}: {source}")]
  ReadConfig {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid config {path}: {source}")]
  ParseJson {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("invalid config {path}: {source}")]
  ParseYaml {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("meta.{key} must be {expected}")]
  InvalidMeta { key: &'static str, expected: &'static str },

  #[error("I/O error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid {field} template: {source}")]
  Template {
    field: &'static str,
    #[source]
    source: TemplateError,
  },

  #[error(transparent)]
  Loader(#[from] LoaderError),

  #[error(transparent)]
  Cache(#[from] CacheError),

  #[error(transparent)]
  Plugin(#[from] PluginError),
}

impl ProjectError {
  fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
    Self::Io {
      path: path.into(),
      source,
    }
  }
}

/// Naming, format, and packaging options of one pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackOptions {
  pub name: String,
  pub description: String,
  pub format: u32,
  pub zipped: bool,
}

impl PackOptions {
  fn new(name: &str, format: u32) -> Self {
    Self {
      name: name.to_string(),
      description: "{description}\n\nVersion {version}\nBy {author}".to_string(),
      format,
      zipped: false,
    }
  }
}

/// On-disk shape of `beet.json` / `beet.yml`.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct ProjectConfig {
  name: String,
  description: String,
  author: String,
  version: String,
  meta: Map<String, Value>,
  pipeline: Vec<String>,
  prelude: bool,
}

impl Default for ProjectConfig {
  fn default() -> Self {
    Self {
      name: "Untitled".to_string(),
      description: "Generated by beet".to_string(),
      author: "Unknown".to_string(),
      version: "0.0.0".to_string(),
      meta: Map::new(),
      pipeline: Vec::new(),
      prelude: true,
    }
  }
}

#[derive(Debug, Clone)]
pub struct Project {
  pub name: String,
  pub description: String,
  pub author: String,
  pub version: String,
  pub directory: PathBuf,
  pub pipeline: Vec<PluginSpec>,
  pub meta: Map<String, Value>,
  pub output_directory: String,
  pub resource_pack: PackOptions,
  pub data_pack: PackOptions,
}

impl Project {
  /// Directory holding the multi-cache, relative to the project directory.
  pub const CACHE_DIRECTORY: &'static str = ".beet_cache";

  /// Entry point looked up in a plugin module when a locator names only the module.
  pub const BEET_DEFAULT: &'static str = "beet_default";

  /// Config file names looked up when none is given, in order.
  pub const CONFIG_FILES: [&'static str; 3] = ["beet.json", "beet.yml", "beet.yaml"];

  /// A project with default settings and an empty pipeline.
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    let defaults = ProjectConfig::default();
    Self {
      name: defaults.name,
      description: defaults.description,
      author: defaults.author,
      version: defaults.version,
      directory: directory.into(),
      pipeline: Vec::new(),
      meta: Map::new(),
      output_directory: "generated".to_string(),
      resource_pack: PackOptions::new("{normalized_name}_resources", RESOURCE_PACK_FORMAT),
      data_pack: PackOptions::new("{normalized_name}", DATA_PACK_FORMAT),
    }
  }

  /// Find the config file of the project in `directory`.
  pub fn find_config(directory: &Path) -> Option<PathBuf> {
    Self::CONFIG_FILES
      .iter()
      .map(|name| directory.join(name))
      .find(|path| path.is_file())
  }

  /// Load a project from a JSON or YAML config file.
  ///
  /// The project directory is the directory containing the config. Unless the
  /// config sets `prelude: false`, the built-in prelude plugin is inserted at
  /// the front of the pipeline. Pack and output options found under `meta`
  /// replace the defaults when they are set to a non-empty value.
  pub fn from_config(config_file: &Path) -> Result<Self, ProjectError> {
    let config_path = dunce::canonicalize(config_file).map_err(|source| ProjectError::ReadConfig {
      path: config_file.to_path_buf(),
      source,
    })?;
    let contents = fs::read_to_string(&config_path).map_err(|source| ProjectError::ReadConfig {
      path: config_path.clone(),
      source,
    })?;

    let config: ProjectConfig = match config_path.extension().and_then(|ext| ext.to_str()) {
      Some("yml" | "yaml") => serde_yaml::from_str(&contents).map_err(|source| ProjectError::ParseYaml {
        path: config_path.clone(),
        source,
      })?,
      _ => serde_json::from_str(&contents).map_err(|source| ProjectError::ParseJson {
        path: config_path.clone(),
        source,
      })?,
    };

    let mut pipeline: Vec<PluginSpec> = config.pipeline.into_iter().map(PluginSpec::Path).collect();
    if config.prelude {
      pipeline.insert(0, PluginSpec::from(PRELUDE));
    }

    let directory = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
    let mut project = Project::new(directory);
    project.name = config.name;
    project.description = config.description;
    project.author = config.author;
    project.version = config.version;
    project.pipeline = pipeline;
    project.meta = config.meta;
    project.promote_meta()?;

    debug!(path = %config_path.display(), name = %project.name, "loaded project config");
    Ok(project)
  }

  fn promote_meta(&mut self) -> Result<(), ProjectError> {
    let meta = &self.meta;
    if let Some(value) = text(meta, "output_directory")? {
      self.output_directory = value;
    }

    let packs = [
      (
        &mut self.resource_pack,
        ["resource_pack_name", "resource_pack_description", "resource_pack_format", "resource_pack_zipped"],
      ),
      (
        &mut self.data_pack,
        ["data_pack_name", "data_pack_description", "data_pack_format", "data_pack_zipped"],
      ),
    ];
    for (options, [name_key, description_key, format_key, zipped_key]) in packs {
      if let Some(value) = text(meta, name_key)? {
        options.name = value;
      }
      if let Some(value) = text(meta, description_key)? {
        options.description = value;
      }
      if let Some(value) = number(meta, format_key)? {
        options.format = value;
      }
      if let Some(value) = flag(meta, zipped_key)? {
        options.zipped = value;
      }
    }
    Ok(())
  }

  /// Variables available to pack name and description templates.
  pub fn variables(&self) -> Variables {
    let normalized_name = NON_ALPHANUMERIC.replace_all(&self.name.to_lowercase(), "_").into_owned();
    [
      ("name", self.name.clone()),
      ("description", self.description.clone()),
      ("author", self.author.clone()),
      ("version", self.version.clone()),
      ("normalized_name", normalized_name),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value.into()))
    .collect()
  }

  /// Pack options with their name and description templates rendered.
  pub fn rendered_packs(&self) -> Result<[(PackKind, PackOptions); 2], ProjectError> {
    let vars = self.variables();
    let render = |field: &'static str, input: &str| {
      template::render(input, &vars).map_err(|source| ProjectError::Template { field, source })
    };

    let resource = PackOptions {
      name: render("resource_pack_name", &self.resource_pack.name)?,
      description: render("resource_pack_description", &self.resource_pack.description)?,
      ..self.resource_pack.clone()
    };
    let data = PackOptions {
      name: render("data_pack_name", &self.data_pack.name)?,
      description: render("data_pack_description", &self.data_pack.description)?,
      ..self.data_pack.clone()
    };
    Ok([(PackKind::Resource, resource), (PackKind::Data, data)])
  }

  /// Open a build session.
  ///
  /// The session owns the context and releases its resources when it is
  /// finished or dropped, on every exit path.
  pub fn context(&self, loader: Rc<dyn ModuleLoader>) -> Result<Session, ProjectError> {
    let absolute = path::absolute(&self.directory).map_err(|source| ProjectError::io(&self.directory, source))?;
    let requested_output = absolute.join(&self.output_directory);
    fs::create_dir_all(&requested_output).map_err(|source| ProjectError::io(&requested_output, source))?;

    let directory = dunce::canonicalize(&absolute).map_err(|source| ProjectError::io(&absolute, source))?;
    let output_directory = directory.join(&self.output_directory);

    let [(_, resource), (_, data)] = self.rendered_packs()?;
    let assets = Pack::new(PackKind::Resource, resource.name, resource.description, resource.format, resource.zipped);
    let data = Pack::new(PackKind::Data, data.name, data.description, data.format, data.zipped);

    loader.register(&directory)?;

    let cache = match MultiCache::open(directory.join(Self::CACHE_DIRECTORY)) {
      Ok(cache) => cache,
      Err(err) => {
        release_modules(loader.as_ref(), &directory);
        return Err(err.into());
      }
    };

    info!(project = %self.name, directory = %directory.display(), "opened build session");

    let context = Context {
      directory: directory.clone(),
      output_directory,
      meta: self.meta.clone(),
      cache,
      assets,
      data,
      pipeline: VecDeque::from(self.pipeline.clone()),
      applied_plugins: HashMap::new(),
      beet_default: Self::BEET_DEFAULT.to_string(),
      current_time: Local::now(),
      counters: HashMap::new(),
      loader,
      raised: None,
    };

    Ok(Session {
      context: Some(context),
      path_entry: directory,
    })
  }

  /// Run the pipeline to completion and return the finished context.
  ///
  /// Plugins are applied in queue order. Plugins added to the queue while the
  /// pipeline runs are applied too. The first failing plugin aborts the build;
  /// the session is still closed.
  pub fn build(&self, loader: Rc<dyn ModuleLoader>) -> Result<Context, ProjectError> {
    let mut session = self.context(loader)?;

    while let Some(spec) = session.pipeline.pop_front() {
      session.apply(spec, false)?;
    }

    let ctx = session.finish()?;
    info!(project = %self.name, applied = ctx.applied_plugins.len(), "build finished");
    Ok(ctx)
  }
}

/// Treat `null`, `false`, `0`, `""`, `[]` and `{}` as unset.
fn truthy<'a>(meta: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
  meta.get(key).filter(|value| match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64() != Some(0.0),
    Value::String(s) => !s.is_empty(),
    Value::Array(items) => !items.is_empty(),
    Value::Object(map) => !map.is_empty(),
  })
}

fn text(meta: &Map<String, Value>, key: &'static str) -> Result<Option<String>, ProjectError> {
  match truthy(meta, key) {
    None => Ok(None),
    Some(Value::String(s)) => Ok(Some(s.clone())),
    Some(_) => Err(ProjectError::InvalidMeta { key, expected: "a string" }),
  }
}

fn number(meta: &Map<String, Value>, key: &'static str) -> Result<Option<u32>, ProjectError> {
  match truthy(meta, key) {
    None => Ok(None),
    Some(value) => value
      .as_u64()
      .and_then(|n| u32::try_from(n).ok())
      .map(Some)
      .ok_or(ProjectError::InvalidMeta {
        key,
        expected: "a positive integer",
      }),
  }
}

fn flag(meta: &Map<String, Value>, key: &'static str) -> Result<Option<bool>, ProjectError> {
  match truthy(meta, key) {
    None => Ok(None),
    Some(Value::Bool(b)) => Ok(Some(*b)),
    Some(_) => Err(ProjectError::InvalidMeta { key, expected: "a boolean" }),
  }
}

/// Take `directory` off the search path and evict its modules, logging failures.
fn release_modules(loader: &dyn ModuleLoader, directory: &Path) -> Option<LoaderError> {
  let mut first_error = None;

  if let Err(err) = loader.unregister(directory) {
    warn!(directory = %directory.display(), error = %err, "failed to remove project from module search path");
    first_error.get_or_insert(err);
  }

  match loader.evict(directory) {
    Ok(evicted) => debug!(count = evicted.len(), modules = ?evicted, "evicted project modules"),
    Err(err) => {
      warn!(directory = %directory.display(), error = %err, "failed to evict project modules");
      first_error.get_or_insert(err);
    }
  }

  first_error
}

/// An open build session.
///
/// Dereferences to the session's [`Context`]. Dropping the session closes it;
/// use [`Session::finish`] to close it explicitly, observe teardown errors,
/// and keep the finished context.
pub struct Session {
  context: Option<Context>,
  path_entry: PathBuf,
}

impl Session {
  /// Close the session and return its context.
  ///
  /// The cache in the returned context has been closed.
  pub fn finish(mut self) -> Result<Context, ProjectError> {
    let mut ctx = self.context.take().expect("session context is present until finish");
    teardown(&mut ctx, &self.path_entry)?;
    Ok(ctx)
  }
}

/// Close the cache, then release the project's modules.
///
/// Every step runs even when an earlier one fails; the first error is returned.
fn teardown(ctx: &mut Context, directory: &Path) -> Result<(), ProjectError> {
  let cache_result = ctx.cache.close();
  if let Err(err) = &cache_result {
    warn!(error = %err, "failed to close cache");
  }
  let loader_error = release_modules(ctx.loader.as_ref(), directory);
  info!(directory = %directory.display(), "closed build session");

  cache_result?;
  match loader_error {
    Some(err) => Err(err.into()),
    None => Ok(()),
  }
}

impl Deref for Session {
  type Target = Context;

  fn deref(&self) -> &Context {
    self.context.as_ref().expect("session context is present until finish")
  }
}

impl DerefMut for Session {
  fn deref_mut(&mut self) -> &mut Context {
    self.context.as_mut().expect("session context is present until finish")
  }
}

impl Drop for Session {
  fn drop(&mut self) {
    if let Some(ctx) = self.context.as_mut() {
      // Failures are already logged.
      let _ = teardown(ctx, &self.path_entry);
    }
  }
}
