use std::collections::BTreeMap;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::backend::{self, Backend, BackendError, ResultError, SolveRequest, SolveResult};
use crate::consts::{CONTEXT_OPT_PREFIX, IMAGE_CONFIG_KEY, INPUT_METADATA_OPT_PREFIX, INPUT_REF_PREFIX};
use crate::state::{Definition, StateError};

/// Errors from a nested build function.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error(transparent)]
  Backend(#[from] BackendError),

  #[error("failed to prepare build: {0}")]
  State(#[from] StateError),
}

/// Errors from composing build requests.
///
/// Every variant that concerns an injected input carries its id.
#[derive(Debug, Error)]
pub enum ComposeError {
  #[error("nested build for input '{id}' failed: {source}")]
  Build {
    id: String,
    #[source]
    source: BuildError,
  },

  #[error("nested build for input '{id}' cancelled")]
  Cancelled { id: String },

  #[error("invalid result for input '{id}': {source}")]
  Result {
    id: String,
    #[source]
    source: ResultError,
  },

  #[error("failed to convert input '{id}': {source}")]
  State {
    id: String,
    #[source]
    source: StateError,
  },

  #[error("failed to encode metadata for input '{id}': {source}")]
  Metadata {
    id: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to encode spec: {0}")]
  Spec(#[from] serde_yaml::Error),
}

/// A build that can be run against the backend as a nested step of another.
#[async_trait]
pub trait BuildFunc: Send + Sync {
  async fn build(&self, backend: &dyn Backend, cancel: &CancellationToken) -> Result<SolveResult, BuildError>;
}

/// A request is a build function that submits itself.
#[async_trait]
impl BuildFunc for SolveRequest {
  async fn build(&self, backend: &dyn Backend, cancel: &CancellationToken) -> Result<SolveResult, BuildError> {
    Ok(backend::solve(backend, self.clone(), cancel).await?)
  }
}

/// The result of a nested build, ready to be registered on a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectedInput {
  pub id: String,
  pub definition: Definition,
  /// Serialized image configuration reported by the nested build.
  pub image_config: Option<Vec<u8>>,
}

impl InjectedInput {
  /// Register this input on `req`.
  ///
  /// Adds the input definition under `id`, maps the named context `id` to
  /// it, and, when an image config is present, passes it along as the
  /// input's metadata.
  pub fn apply(&self, req: SolveRequest) -> Result<SolveRequest, ComposeError> {
    let mut req = req
      .with_input(self.id.clone(), self.definition.clone())
      .with_opt(
        format!("{}{}", CONTEXT_OPT_PREFIX, self.id),
        format!("{}{}", INPUT_REF_PREFIX, self.id),
      );

    if let Some(config) = &self.image_config {
      let metadata = BTreeMap::from([(IMAGE_CONFIG_KEY, STANDARD.encode(config))]);
      let encoded = serde_json::to_string(&metadata).map_err(|source| ComposeError::Metadata {
        id: self.id.clone(),
        source,
      })?;
      req = req.with_opt(format!("{}{}", INPUT_METADATA_OPT_PREFIX, self.id), encoded);
    }

    Ok(req)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::state::State;

  fn input(image_config: Option<&[u8]>) -> InjectedInput {
    InjectedInput {
      id: "frontend".to_string(),
      definition: State::image("busybox:latest").marshal().unwrap(),
      image_config: image_config.map(<[u8]>::to_vec),
    }
  }

  #[test]
  fn apply_without_metadata_maps_context_only() {
    let req = input(None).apply(SolveRequest::for_frontend("dockerfile.v0")).unwrap();

    assert_eq!(req.opt("context:frontend"), Some("input:frontend"));
    assert_eq!(req.opt("input-metadata:frontend"), None);
    assert_eq!(req.frontend_opts.len(), 1);
    assert!(req.frontend_inputs.contains_key("frontend"));
  }

  #[test]
  fn apply_with_metadata_encodes_image_config() {
    let config = br#"{"os":"linux"}"#;
    let req = input(Some(config)).apply(SolveRequest::for_frontend("dockerfile.v0")).unwrap();

    assert_eq!(req.opt("context:frontend"), Some("input:frontend"));
    let raw = req.opt("input-metadata:frontend").unwrap();
    let parsed: BTreeMap<String, String> = serde_json::from_str(raw).unwrap();
    assert_eq!(STANDARD.decode(&parsed[IMAGE_CONFIG_KEY]).unwrap(), config.to_vec());
  }

  #[test]
  fn apply_keeps_existing_options() {
    let req = SolveRequest::for_frontend("dockerfile.v0").with_opt("target", "rpm");
    let req = input(None).apply(req).unwrap();
    assert_eq!(req.opt("target"), Some("rpm"));
  }
}
