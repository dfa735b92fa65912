//! Implementation of the `beet info` command.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use beet_lib::project::PackOptions;

use super::load_project;
use crate::output::{OutputFormat, print_info, print_json, print_stat, symbols};

#[derive(Debug, Serialize)]
struct ProjectInfo {
  name: String,
  description: String,
  author: String,
  version: String,
  directory: String,
  output_directory: String,
  pipeline: Vec<String>,
  resource_pack: PackOptions,
  data_pack: PackOptions,
}

/// Print the project as a build would see it, with pack templates rendered.
pub fn cmd_info(config: Option<&Path>, project_dir: &Path, output: OutputFormat) -> Result<()> {
  let project = load_project(config, project_dir)?;
  let [(_, resource_pack), (_, data_pack)] = project.rendered_packs()?;

  let info = ProjectInfo {
    name: project.name.clone(),
    description: project.description.clone(),
    author: project.author.clone(),
    version: project.version.clone(),
    directory: project.directory.display().to_string(),
    output_directory: project.directory.join(&project.output_directory).display().to_string(),
    pipeline: project.pipeline.iter().map(ToString::to_string).collect(),
    resource_pack,
    data_pack,
  };

  if output.is_json() {
    return print_json(&info);
  }

  print_info(&format!("{} v{} by {}", info.name, info.version, info.author));
  print_stat("Directory", &info.directory);
  print_stat("Output", &info.output_directory);
  print_stat("Resource pack", &info.resource_pack.name);
  print_stat("Data pack", &info.data_pack.name);
  if info.pipeline.is_empty() {
    print_stat("Pipeline", "(empty)");
  } else {
    print_stat("Pipeline", &info.pipeline.join(&format!(" {} ", symbols::ARROW)));
  }

  Ok(())
}
