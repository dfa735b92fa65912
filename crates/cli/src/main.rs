mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::output::OutputFormat;

/// beet - Minecraft resource pack and data pack build pipeline
#[derive(Parser)]
#[command(name = "beet")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run the project pipeline once
  Build {
    /// Path to the project config (default: beet.json, beet.yml or beet.yaml in the project directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Project directory
    #[arg(short, long, default_value = ".")]
    project: PathBuf,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value_t)]
    format: OutputFormat,
  },

  /// Show the resolved project configuration without running plugins
  Info {
    /// Path to the project config (default: beet.json, beet.yml or beet.yaml in the project directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Project directory
    #[arg(short, long, default_value = ".")]
    project: PathBuf,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value_t)]
    format: OutputFormat,
  },

  /// Manage the project cache
  Cache {
    #[command(subcommand)]
    command: CacheCommands,
  },
}

#[derive(Subcommand)]
enum CacheCommands {
  /// Delete the project cache directory
  Clear {
    /// Project directory
    #[arg(short, long, default_value = ".")]
    project: PathBuf,
  },
}

fn init_tracing(verbose: bool) {
  let filter = if verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
  };

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  match cli.command {
    Commands::Build {
      config,
      project,
      format,
    } => cmd::cmd_build(config.as_deref(), &project, format),
    Commands::Info {
      config,
      project,
      format,
    } => cmd::cmd_info(config.as_deref(), &project, format),
    Commands::Cache { command } => match command {
      CacheCommands::Clear { project } => cmd::cmd_cache_clear(&project),
    },
  }
}
