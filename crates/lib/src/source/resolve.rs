//! Source resolution.
//!
//! A [`SourceResolver`] turns a declared source into its initial filesystem
//! state. The pipeline only depends on the trait; [`DefaultResolver`] maps each
//! descriptor kind onto a leaf graph vertex and leaves fetching to the backend.

use async_trait::async_trait;

use super::types::ResolveError;
use crate::consts::LOCAL_NAME_CONTEXT;
use crate::progress::ProgressGroup;
use crate::spec::{InlineSource, Source, Spec};
use crate::state::{CopyOptions, LocalOptions, OpMetadata, State};

#[async_trait]
pub trait SourceResolver: Send + Sync {
  /// Produce the initial state of source `name`.
  ///
  /// Every vertex created should carry `group` so the batch shows up
  /// together in progress output.
  async fn resolve(&self, spec: &Spec, name: &str, source: &Source, group: &ProgressGroup) -> Result<State, ResolveError>;
}

/// Resolves sources into graph leaves without contacting the backend.
///
/// - `image`: the image filesystem, or the contents of `path` within it
/// - `git`: the checkout at `commit`
/// - `http`: a single file named after the source
/// - `context`: the client directory `name` (default `context`)
/// - `inline`: a single file named after the source, or a directory of files
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResolver;

#[async_trait]
impl SourceResolver for DefaultResolver {
  async fn resolve(&self, _spec: &Spec, name: &str, source: &Source, group: &ProgressGroup) -> Result<State, ResolveError> {
    let metadata = OpMetadata::named(format!("Add spec source: {} {}", name, source.reference())).with_progress_group(group);

    let state = match source {
      Source::Image { reference, path } => {
        let image = State::image_with(reference, metadata.clone());
        match path.as_deref() {
          Some(path) if path != "/" => State::scratch().copy(&image, path, "/", CopyOptions::contents_only(), metadata),
          _ => image,
        }
      }
      Source::Git {
        url,
        commit,
        keep_git_dir,
      } => State::git(url, commit, *keep_git_dir, metadata),
      Source::Http { url, digest } => State::http(url, name, digest.as_deref(), metadata),
      Source::Context {
        name: local_name,
        includes,
        excludes,
      } => {
        let opts = LocalOptions {
          include_patterns: includes.clone(),
          exclude_patterns: excludes.clone(),
        };
        State::local(local_name.as_deref().unwrap_or(LOCAL_NAME_CONTEXT), &opts, metadata)?
      }
      Source::Inline(InlineSource::File(file)) => {
        State::scratch().mkfile(name, file.permissions, file.contents.clone().into_bytes(), metadata)
      }
      Source::Inline(InlineSource::Dir(files)) => files.iter().fold(State::scratch(), |state, (file_name, file)| {
        state.mkfile(file_name, file.permissions, file.contents.clone().into_bytes(), metadata.clone())
      }),
    };

    Ok(state)
  }
}
