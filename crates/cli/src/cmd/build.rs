//! Implementation of the `beet build` command.

use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{Context as _, Result};
use serde::Serialize;
use tracing::info;

use beet_lib::context::Context;
use beet_lib::lua::runtime::LuaLoader;
use beet_lib::pack::Pack;

use super::load_project;
use crate::output::{OutputFormat, format_duration, print_json, print_stat, print_success};

#[derive(Debug, Serialize)]
struct PackSummary {
  kind: &'static str,
  name: String,
  items: usize,
  zipped: bool,
}

impl From<&Pack> for PackSummary {
  fn from(pack: &Pack) -> Self {
    Self {
      kind: pack.kind.as_str(),
      name: pack.name.clone(),
      items: pack.len(),
      zipped: pack.zipped,
    }
  }
}

#[derive(Debug, Serialize)]
struct BuildSummary {
  project: String,
  applied_plugins: usize,
  output_directory: String,
  packs: Vec<PackSummary>,
  duration_ms: u128,
}

impl BuildSummary {
  fn new(project: &str, ctx: &Context, elapsed: Duration) -> Self {
    Self {
      project: project.to_string(),
      applied_plugins: ctx.applied_plugins.len(),
      output_directory: ctx.output_directory.display().to_string(),
      packs: ctx.packs().into_iter().map(PackSummary::from).collect(),
      duration_ms: elapsed.as_millis(),
    }
  }
}

/// Execute the build command.
///
/// Loads the project, runs its pipeline once with a fresh Lua loader, and
/// prints what the build produced.
pub fn cmd_build(config: Option<&Path>, project_dir: &Path, output: OutputFormat) -> Result<()> {
  let start = Instant::now();

  let project = load_project(config, project_dir)?;
  let loader = LuaLoader::with_builtins().context("Failed to create Lua runtime")?;
  let ctx = project
    .build(Rc::new(loader))
    .with_context(|| format!("Build of '{}' failed", project.name))?;

  let elapsed = start.elapsed();
  info!(project = %project.name, elapsed = ?elapsed, "build complete");
  let summary = BuildSummary::new(&project.name, &ctx, elapsed);

  if output.is_json() {
    print_json(&summary)?;
  } else {
    println!();
    print_success(&format!("Built {}", summary.project));
    print_stat("Plugins applied", &summary.applied_plugins.to_string());
    for pack in &summary.packs {
      print_stat(pack.kind, &format!("{} ({} items)", pack.name, pack.items));
    }
    print_stat("Output", &summary.output_directory);
    print_stat("Duration", &format_duration(elapsed));
  }

  Ok(())
}
