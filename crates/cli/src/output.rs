//! CLI output formatting utilities.
//!
//! Provides consistent formatting for terminal output including colored status
//! messages and short digests.

use anyhow::Context;
use clap::ValueEnum;
use graft_lib::state::Op;
use owo_colors::{OwoColorize, Stream};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
}

/// Strip the algorithm prefix from a digest and keep the first 12 characters.
pub fn truncate_hash(hash: &str) -> &str {
  let hex = hash.split_once(':').map(|(_, hex)| hex).unwrap_or(hash);
  let len = hex.len().min(12);
  &hex[..len]
}

/// One-word label for a graph operation.
pub fn op_kind(op: &Op) -> &'static str {
  match op {
    Op::Source(_) => "source",
    Op::Exec(_) => "exec",
    Op::File(_) => "file",
    Op::Merge(_) => "merge",
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
