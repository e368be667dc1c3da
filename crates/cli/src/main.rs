mod cmd;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::output::OutputFormat;

/// graft - assemble package sources into a content-addressed build graph
#[derive(Parser)]
#[command(name = "graft")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Assemble the sources of a spec and show the graph that would be submitted
  Plan {
    /// Path to the spec file
    spec: String,
  },

  /// List the sources of a spec and where each one ends up
  Sources {
    /// Path to the spec file
    spec: String,
  },
}

fn init_tracing(verbose: bool) {
  let default = if verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
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
    Commands::Plan { spec } => cmd::cmd_plan(&spec, cli.output),
    Commands::Sources { spec } => cmd::cmd_sources(&spec, cli.output),
  }
}
