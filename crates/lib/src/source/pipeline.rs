//! Source pipeline orchestration.
//!
//! Resolve every source, apply patch chains, archive directory sources, then
//! merge the results under the sources directory and submit the graph. Each
//! stage walks sources in sorted name order so the emitted graph is identical
//! for identical specs.

use std::collections::BTreeMap;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::archive::normalize;
use super::patch::apply_patches;
use super::resolve::SourceResolver;
use super::types::{PipelineConfig, PipelineError};
use crate::backend::{self, Backend, BackendError, Reference, SolveRequest};
use crate::progress::ProgressGroup;
use crate::spec::{Source, Spec, SpecError};
use crate::state::{ImageConfig, OpMetadata, State, merge_at_path};

/// A fully resolved, patched and normalized source, ready to be merged.
#[derive(Debug, Clone)]
pub struct PackageSource {
  pub name: String,
  /// Path of the source relative to the sources directory.
  pub path: String,
  pub state: State,
}

/// Final path of source `name` under the sources directory.
pub fn output_path(name: &str, source: &Source) -> String {
  if source.is_dir() {
    format!("{}.tar.gz", name)
  } else {
    name.to_string()
  }
}

/// Final paths of every merged source, keyed by source name.
///
/// Sources only consumed as patches are left out. Two sources landing on the
/// same path, or one landing inside the path of another, is an error.
pub fn output_paths(spec: &Spec) -> Result<BTreeMap<&str, String>, PipelineError> {
  let patch_only = spec.patch_sources();
  let mut owners: BTreeMap<String, &str> = BTreeMap::new();
  let mut paths = BTreeMap::new();

  for name in spec.sorted_source_names() {
    if patch_only.contains(name) {
      continue;
    }
    let path = output_path(name, &spec.sources[name]);
    if let Some(first) = owners.insert(path.clone(), name) {
      return Err(PipelineError::OutputCollision {
        path,
        first: first.to_string(),
        second: name.to_string(),
      });
    }
    paths.insert(name, path);
  }

  for (path, name) in &owners {
    let parents = path.match_indices('/').map(|(i, _)| &path[..i]);
    if let Some((parent_path, parent)) = parents.filter_map(|p| owners.get_key_value(p)).next() {
      return Err(PipelineError::OutputNested {
        parent: parent.to_string(),
        parent_path: parent_path.clone(),
        child: name.to_string(),
        child_path: path.clone(),
      });
    }
  }

  Ok(paths)
}

fn ensure_live(cancel: &CancellationToken) -> Result<(), PipelineError> {
  if cancel.is_cancelled() {
    return Err(PipelineError::Cancelled);
  }
  Ok(())
}

/// Turn every source of `spec` into its final state.
///
/// Patch states are always taken from the resolution stage, so a source used
/// as a patch is applied unpatched even if it has patches of its own. Any
/// failure aborts the whole run.
pub async fn sources_to_states(
  spec: &Spec,
  resolver: &dyn SourceResolver,
  config: &PipelineConfig,
  cancel: &CancellationToken,
) -> Result<Vec<PackageSource>, PipelineError> {
  spec.validate()?;
  let paths = output_paths(spec)?;

  let mut resolved: BTreeMap<&str, State> = BTreeMap::new();
  for name in spec.sorted_source_names() {
    let source = &spec.sources[name];
    let group = ProgressGroup::new(format!("Add spec source: {} {}", name, source.reference()));
    debug!(source = %name, reference = %source.reference(), "resolving source");

    let result = tokio::select! {
      biased;
      _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
      result = resolver.resolve(spec, name, source, &group) => result,
    };
    let state = result.map_err(|source| PipelineError::Resolve {
      name: name.to_string(),
      source,
    })?;
    resolved.insert(name, state);
  }

  ensure_live(cancel)?;

  let mut patched: BTreeMap<&str, State> = BTreeMap::new();
  for name in spec.sorted_source_names() {
    let source = &spec.sources[name];
    let state = resolved[name].clone();
    let patch_names = spec.patches_for(name);
    if patch_names.is_empty() {
      patched.insert(name, state);
      continue;
    }

    let mut patches = Vec::with_capacity(patch_names.len());
    for patch in patch_names {
      let patch_state = resolved.get(patch.as_str()).ok_or_else(|| SpecError::UnknownPatch {
        source_name: name.to_string(),
        patch: patch.clone(),
      })?;
      patches.push((patch.as_str(), patch_state));
    }

    debug!(source = %name, patches = ?patch_names, "applying patches");
    let group = ProgressGroup::new(format!("Patch spec source: {} {}", name, source.reference()));
    let reference = source.reference();
    let state = apply_patches(state, patches, config, |patch| {
      OpMetadata::named(format!("Patch spec source: {} {} with {}", name, reference, patch)).with_progress_group(&group)
    });
    patched.insert(name, state);
  }

  ensure_live(cancel)?;

  let mut out = Vec::with_capacity(paths.len());
  for (name, path) in paths {
    let source = &spec.sources[name];
    let group = ProgressGroup::new(format!("Tar spec source if needed: {} {}", name, source.reference()));
    let metadata = OpMetadata::named(format!("Tar spec source if needed: {} {}", name, source.reference()))
      .with_progress_group(&group);

    let state = patched[name].clone();
    let state = normalize(state, source.is_dir(), &path, config, &metadata).map_err(|source| {
      PipelineError::Archive {
        name: name.to_string(),
        source,
      }
    })?;

    out.push(PackageSource {
      name: name.to_string(),
      path,
      state,
    });
  }

  Ok(out)
}

/// Merge `sources` into a fresh filesystem under the sources directory.
pub fn merge_sources(sources: &[PackageSource], config: &PipelineConfig) -> State {
  let states: Vec<State> = sources.iter().map(|s| s.state.clone()).collect();
  merge_at_path(
    &State::scratch(),
    &states,
    &config.sources_dir,
    OpMetadata::named(format!("Merge spec sources into {}", config.sources_dir)),
  )
}

/// Assemble the sources of `spec` and submit them to `backend`.
///
/// Returns the single result reference and an empty image config.
pub async fn handle_sources(
  backend: &dyn Backend,
  spec: &Spec,
  resolver: &dyn SourceResolver,
  config: &PipelineConfig,
  cancel: &CancellationToken,
) -> Result<(Reference, ImageConfig), PipelineError> {
  let sources = sources_to_states(spec, resolver, config, cancel).await?;
  let definition = merge_sources(&sources, config)
    .marshal()
    .map_err(PipelineError::Marshal)?;

  info!(
    sources = sources.len(),
    ops = definition.len(),
    dest = %config.sources_dir,
    "submitting merged sources"
  );

  let result = backend::solve(backend, SolveRequest::from_definition(definition), cancel)
    .await
    .map_err(|e| match e {
      BackendError::Cancelled => PipelineError::Cancelled,
      e => PipelineError::Submit(e),
    })?;
  let reference = result.single_ref()?.clone();

  info!(reference = %reference.id, "sources ready");
  Ok((reference, ImageConfig::default()))
}
