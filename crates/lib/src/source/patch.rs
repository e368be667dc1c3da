//! Patch engine.
//!
//! Patches are applied one at a time, left to right, each on top of the
//! previous result. Order is part of the result: the same patches in a
//! different order produce a different graph.

use crate::state::{CopyOptions, Exec, Mount, OpMetadata, State};

use super::types::PipelineConfig;
use super::shell_quote;

/// Where the source is copied inside the patch worker.
const PATCH_WORKDIR: &str = "/src";

/// Where the patch source is mounted inside the patch worker.
const PATCH_MOUNT: &str = "/patch";

/// Apply patch file `patch_name` from `patch` to `source`.
///
/// The source is copied into a fresh worker root, `patch -p1` runs with the
/// patch state mounted read-only, and only the patched tree is copied out so
/// nothing from the worker image leaks into the result. A patch that does not
/// apply cleanly fails the command and with it the whole build.
pub fn apply_patch(
  source: &State,
  patch: &State,
  patch_name: &str,
  config: &PipelineConfig,
  metadata: &OpMetadata,
) -> State {
  let worker = State::image_with(&config.patch_image, metadata.clone())
    .copy(
      source,
      "/",
      PATCH_WORKDIR,
      CopyOptions::contents_only(),
      metadata.clone(),
    )
    .run(
      Exec::shell(&format!(
        "cd {} && patch -p1 < ../patch/{}",
        PATCH_WORKDIR,
        shell_quote(patch_name)
      ))
      .with_mount(Mount::readonly(PATCH_MOUNT, patch.clone()))
      .with_metadata(metadata.clone()),
    );

  State::scratch().copy(
    &worker.root(),
    PATCH_WORKDIR,
    "/",
    CopyOptions::contents_only(),
    metadata.clone(),
  )
}

/// Fold [`apply_patch`] over `patches` in the given order.
///
/// `metadata` is called with each patch name to label that step.
pub fn apply_patches<'a>(
  source: State,
  patches: impl IntoIterator<Item = (&'a str, &'a State)>,
  config: &PipelineConfig,
  metadata: impl Fn(&str) -> OpMetadata,
) -> State {
  patches.into_iter().fold(source, |state, (name, patch)| {
    apply_patch(&state, patch, name, config, &metadata(name))
  })
}
