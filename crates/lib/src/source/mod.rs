//! Package source assembly.
//!
//! Turns the sources declared in a [`Spec`](crate::spec::Spec) into one
//! filesystem under the sources directory:
//!
//! 1. resolve every source with a [`SourceResolver`]
//! 2. apply each source's patch chain in declared order ([`apply_patches`])
//! 3. archive directory sources as `<name>.tar.gz` ([`normalize`])
//! 4. merge and submit ([`handle_sources`])
//!
//! Sources only referenced as patches are consumed by step 2 and do not
//! appear in the output.

mod archive;
mod patch;
mod pipeline;
mod resolve;
mod types;

pub use archive::{archive, normalize};
pub use patch::{apply_patch, apply_patches};
pub use pipeline::{
  PackageSource, handle_sources, merge_sources, output_path, output_paths, sources_to_states,
};
pub use resolve::{DefaultResolver, SourceResolver};
pub use types::*;

/// Quote `s` for use as a single `sh` word.
pub(crate) fn shell_quote(s: &str) -> String {
  format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn quotes_single_quotes() {
    assert_eq!(shell_quote("fix.patch"), "'fix.patch'");
    assert_eq!(shell_quote("it's"), r"'it'\''s'");
  }
}
