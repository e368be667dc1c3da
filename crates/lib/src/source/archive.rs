//! Archive normalizer.
//!
//! Directory sources are shipped as gzip'd tarballs. Compression writes to a
//! fixed staging file and only a second, cheap command moves it to the
//! requested name, so renaming an output never invalidates the cached
//! compression step.

use crate::consts::ARCHIVE_STAGING_FILE;
use crate::state::{Exec, Mount, OpMetadata, State, StateError};

use super::shell_quote;
use super::types::PipelineConfig;

/// Where the archived state is mounted inside the tar worker.
const ARCHIVE_SRC_MOUNT: &str = "/src";

/// Split `dest` into its directory (`.` if none) and file name.
fn split_dest(dest: &str) -> (&str, &str) {
  let dest = dest.trim_end_matches('/');
  match dest.rsplit_once('/') {
    Some(("", name)) => ("/", name),
    Some((dir, name)) => (dir, name),
    None => (".", dest),
  }
}

/// Join `dir` under `base`, treating `.` as `base` itself.
fn join(base: &str, dir: &str) -> String {
  let dir = dir.trim_matches('/');
  if dir.is_empty() || dir == "." {
    base.to_string()
  } else {
    format!("{}/{}", base.trim_end_matches('/'), dir)
  }
}

/// Tar and gzip the full contents of `src` into a state holding only `dest`.
pub fn archive(src: &State, dest: &str, config: &PipelineConfig, metadata: &OpMetadata) -> Result<State, StateError> {
  let (dir, name) = split_dest(dest);
  let out_dir = join(&config.archive_base, dir);

  let compressed = State::image_with(&config.tar_image, metadata.clone()).run(
    Exec::shell(&format!(
      "tar -C {} -cvzf {} .",
      ARCHIVE_SRC_MOUNT, ARCHIVE_STAGING_FILE
    ))
    .with_mount(Mount::readonly(ARCHIVE_SRC_MOUNT, src.clone()))
    .with_metadata(metadata.clone()),
  );

  let moved = compressed.run(
    Exec::shell(&format!(
      "mkdir -p {dir} && mv {} {dir}/{}",
      ARCHIVE_STAGING_FILE,
      shell_quote(name),
      dir = shell_quote(&out_dir),
    ))
    .with_mount(Mount::new(&config.archive_base, State::scratch()))
    .with_metadata(metadata.clone()),
  );

  moved.get_mount(&config.archive_base)
}

/// Archive directory sources to `dest`; file sources pass through unchanged.
pub fn normalize(
  state: State,
  is_dir: bool,
  dest: &str,
  config: &PipelineConfig,
  metadata: &OpMetadata,
) -> Result<State, StateError> {
  if is_dir {
    archive(&state, dest, config, metadata)
  } else {
    Ok(state)
  }
}
