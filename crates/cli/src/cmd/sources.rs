//! Implementation of the `graft sources` command.

use anyhow::Result;
use owo_colors::{OwoColorize, Stream};

use graft_lib::source::output_paths;

use super::load_spec;
use crate::output::{OutputFormat, print_info, print_json, symbols};

pub fn cmd_sources(file: &str, format: OutputFormat) -> Result<()> {
  let spec = load_spec(file)?;
  let paths = output_paths(&spec)?;

  if format.is_json() {
    let items: Vec<_> = spec
      .sources
      .iter()
      .map(|(name, source)| {
        serde_json::json!({
          "name": name,
          "reference": source.reference(),
          "dir": source.is_dir(),
          "patches": spec.patches_for(name),
          "output": paths.get(name.as_str()),
        })
      })
      .collect();
    return print_json(&items);
  }

  print_info(&format!("{} source(s)", spec.sources.len()));
  for (name, source) in &spec.sources {
    let dest = match paths.get(name.as_str()) {
      Some(path) => path.clone(),
      None => "(patch)".to_string(),
    };
    println!(
      "  {} {} {}",
      name.if_supports_color(Stream::Stdout, |s| s.bold()),
      symbols::ARROW,
      dest
    );
    println!(
      "      {}",
      source.reference().if_supports_color(Stream::Stdout, |s| s.dimmed())
    );
    for patch in spec.patches_for(name) {
      println!("      + {}", patch);
    }
  }

  Ok(())
}
