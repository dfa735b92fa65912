mod build;
mod cache;
mod info;

use std::path::Path;

use anyhow::{Context, Result};
use beet_lib::project::Project;

pub use build::cmd_build;
pub use cache::cmd_cache_clear;
pub use info::cmd_info;

/// Load the project from an explicit config path or the project directory.
fn load_project(config: Option<&Path>, project_dir: &Path) -> Result<Project> {
  let config_path = match config {
    Some(path) => path.to_path_buf(),
    None => Project::find_config(project_dir).with_context(|| {
      format!(
        "No project config ({}) found in {}",
        Project::CONFIG_FILES.join(", "),
        project_dir.display()
      )
    })?,
  };

  Project::from_config(&config_path).with_context(|| format!("Failed to load {}", config_path.display()))
}
