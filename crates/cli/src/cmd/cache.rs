//! Implementation of the `beet cache` commands.

use std::path::Path;

use anyhow::{Context, Result};

use beet_lib::cache::MultiCache;
use beet_lib::project::Project;

use crate::output::{print_info, print_success};

pub fn cmd_cache_clear(project_dir: &Path) -> Result<()> {
  let directory = dunce::canonicalize(project_dir)
    .with_context(|| format!("Project directory not found: {}", project_dir.display()))?;
  let cache_path = directory.join(Project::CACHE_DIRECTORY);

  if MultiCache::clear(&cache_path)? {
    print_success(&format!("Cleared {}", cache_path.display()));
  } else {
    print_info("No cache to clear");
  }

  Ok(())
}
