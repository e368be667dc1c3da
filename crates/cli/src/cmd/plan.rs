//! Implementation of the `graft plan` command.
//!
//! Runs the source pipeline for a spec against a recording backend and shows
//! the graph that would be submitted, without executing anything.

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use graft_lib::backend::RecordingBackend;
use graft_lib::progress::StatusDisplay;
use graft_lib::source::{DefaultResolver, PipelineConfig, handle_sources, output_paths};

use super::load_spec;
use crate::output::{OutputFormat, op_kind, print_json, print_stat, print_success, truncate_hash};

pub fn cmd_plan(file: &str, format: OutputFormat) -> Result<()> {
  let spec = load_spec(file)?;
  let config = PipelineConfig::from_env();
  debug!(?config, "pipeline config");

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let (reference, events) = rt
    .block_on(async {
      let display = StatusDisplay::spawn();
      let backend = RecordingBackend::new().with_status(display.sender());

      let cancel = CancellationToken::new();
      let on_interrupt = cancel.clone();
      tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
          on_interrupt.cancel();
        }
      });

      let result = handle_sources(&backend, &spec, &DefaultResolver, &config, &cancel).await;
      drop(backend);
      let events = display.finish().await;
      result.map(|(reference, _)| (reference, events))
    })
    .with_context(|| format!("Failed to assemble sources: {}", file))?;

  let definition = &reference.definition;
  if format.is_json() {
    return print_json(definition);
  }

  let artifacts = output_paths(&spec)?;
  print_success(&format!("Plan: {}", truncate_hash(&reference.id)));
  print_stat("Sources", &spec.sources.len().to_string());
  print_stat("Artifacts", &artifacts.len().to_string());
  print_stat("Operations", &definition.len().to_string());
  print_stat("Destination", &config.sources_dir);
  debug!(events, "status events");

  println!();
  for entry in &definition.ops {
    let name = definition.name_of(&entry.digest).unwrap_or("");
    println!(
      "  {} {:<6} {}",
      truncate_hash(&entry.digest.0),
      op_kind(&entry.op),
      name
    );
  }

  Ok(())
}
