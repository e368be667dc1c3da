use thiserror::Error;

use crate::backend::{BackendError, ResultError};
use crate::consts::{
  DEFAULT_ARCHIVE_BASE, DEFAULT_PATCH_IMAGE, DEFAULT_SOURCES_DIR, DEFAULT_TAR_IMAGE, PATCH_IMAGE_ENV, TAR_IMAGE_ENV,
};
use crate::spec::SpecError;
use crate::state::StateError;

/// Errors from a source resolver.
#[derive(Debug, Error)]
pub enum ResolveError {
  #[error("state error: {0}")]
  State(#[from] StateError),

  #[error("backend error: {0}")]
  Backend(#[from] BackendError),

  #[error("unsupported source: {0}")]
  Unsupported(String),
}

/// Errors from assembling package sources.
///
/// Every per-source failure carries the offending source name.
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("invalid spec: {0}")]
  InvalidSpec(#[from] SpecError),

  #[error("failed to resolve source '{name}': {source}")]
  Resolve {
    name: String,
    #[source]
    source: ResolveError,
  },

  #[error("failed to archive source '{name}': {source}")]
  Archive {
    name: String,
    #[source]
    source: StateError,
  },

  #[error("sources '{first}' and '{second}' both produce '{path}'")]
  OutputCollision {
    path: String,
    first: String,
    second: String,
  },

  #[error("source '{child}' produces '{child_path}' inside '{parent_path}' produced by '{parent}'")]
  OutputNested {
    parent: String,
    parent_path: String,
    child: String,
    child_path: String,
  },

  #[error("failed to marshal merged sources: {0}")]
  Marshal(#[source] StateError),

  #[error("backend rejected merged sources: {0}")]
  Submit(#[source] BackendError),

  #[error(transparent)]
  Result(#[from] ResultError),

  #[error("source assembly cancelled")]
  Cancelled,
}

/// Images and paths used when assembling package sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
  /// Image providing `sh` and `tar` for archiving directory sources.
  pub tar_image: String,
  /// Image providing `sh` and `patch` for applying patches.
  pub patch_image: String,
  /// Directory every source is merged into.
  pub sources_dir: String,
  /// Mount the archive step writes tarballs under.
  pub archive_base: String,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      tar_image: DEFAULT_TAR_IMAGE.to_string(),
      patch_image: DEFAULT_PATCH_IMAGE.to_string(),
      sources_dir: DEFAULT_SOURCES_DIR.to_string(),
      archive_base: DEFAULT_ARCHIVE_BASE.to_string(),
    }
  }
}

impl PipelineConfig {
  /// Defaults, with the tool images overridable through the environment.
  pub fn from_env() -> Self {
    let mut config = Self::default();
    if let Some(image) = non_empty_env(TAR_IMAGE_ENV) {
      config.tar_image = image;
    }
    if let Some(image) = non_empty_env(PATCH_IMAGE_ENV) {
      config.patch_image = image;
    }
    config
  }
}

fn non_empty_env(name: &str) -> Option<String> {
  std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  #[serial]
  fn from_env_uses_defaults() {
    temp_env::with_vars_unset([TAR_IMAGE_ENV, PATCH_IMAGE_ENV], || {
      assert_eq!(PipelineConfig::from_env(), PipelineConfig::default());
    });
  }

  #[test]
  #[serial]
  fn from_env_overrides_images() {
    temp_env::with_vars(
      [
        (TAR_IMAGE_ENV, Some("registry.local/tar:1")),
        (PATCH_IMAGE_ENV, Some("")),
      ],
      || {
        let config = PipelineConfig::from_env();
        assert_eq!(config.tar_image, "registry.local/tar:1");
        assert_eq!(config.patch_image, DEFAULT_PATCH_IMAGE);
        assert_eq!(config.sources_dir, DEFAULT_SOURCES_DIR);
      },
    );
  }
}
