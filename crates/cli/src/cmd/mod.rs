mod plan;
mod sources;

pub use plan::cmd_plan;
pub use sources::cmd_sources;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use graft_lib::spec::Spec;

/// Read and validate a spec file. `.json` files are parsed as JSON, anything
/// else as YAML.
fn load_spec(file: &str) -> Result<Spec> {
  let path = Path::new(file);
  let content = fs::read_to_string(path).with_context(|| format!("Failed to read spec: {}", file))?;

  let spec = match path.extension().and_then(|e| e.to_str()) {
    Some("json") => Spec::from_json(&content),
    _ => Spec::from_yaml(&content),
  }
  .with_context(|| format!("Failed to parse spec: {}", file))?;

  spec.validate().with_context(|| format!("Invalid spec: {}", file))?;
  Ok(spec)
}
