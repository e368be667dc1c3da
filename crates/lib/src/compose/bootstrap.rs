//! Building the frontend from the local project and routing requests
//! through it.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::types::{BuildError, BuildFunc, ComposeError};
use super::inject_input;
use crate::backend::{self, Backend, SolveRequest, SolveResult};
use crate::consts::{
  CONTEXT_EXCLUDES_ENV, DEFAULT_DESCRIPTOR_FILE, DESCRIPTOR_FRONTEND, GATEWAY_FRONTEND, GATEWAY_SOURCE_OPT,
  LOCAL_NAME_CONTEXT, LOCAL_NAME_DESCRIPTOR,
};
use crate::spec::Spec;
use crate::state::{LocalOptions, OpMetadata, State};

/// How the local frontend build reads the project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
  /// Exclude patterns applied to the main build context.
  pub excludes: Vec<String>,
  /// Descriptor file fetched on its own, never filtered by `excludes`.
  pub descriptor_file: String,
}

impl Default for BootstrapConfig {
  fn default() -> Self {
    Self {
      excludes: Vec::new(),
      descriptor_file: DEFAULT_DESCRIPTOR_FILE.to_string(),
    }
  }
}

impl BootstrapConfig {
  /// Defaults, with context excludes read from the environment.
  pub fn from_env() -> Self {
    let excludes = std::env::var(CONTEXT_EXCLUDES_ENV)
      .map(|v| {
        v.split(',')
          .map(str::trim)
          .filter(|p| !p.is_empty())
          .map(String::from)
          .collect()
      })
      .unwrap_or_default();
    Self {
      excludes,
      ..Self::default()
    }
  }
}

/// Builds the frontend image from the local project with the descriptor
/// frontend.
#[derive(Debug, Clone, Default)]
pub struct LocalFrontend {
  config: BootstrapConfig,
}

impl LocalFrontend {
  pub fn new(config: BootstrapConfig) -> Self {
    Self { config }
  }

  /// The nested request: the filtered context plus the descriptor file.
  ///
  /// The descriptor gets its own local fetch because the context excludes
  /// may well exclude the descriptor itself.
  pub fn request(&self) -> Result<SolveRequest, BuildError> {
    let context = State::local(
      LOCAL_NAME_CONTEXT,
      &LocalOptions {
        include_patterns: Vec::new(),
        exclude_patterns: self.config.excludes.clone(),
      },
      OpMetadata::named("load build context"),
    )?
    .marshal()?;

    let descriptor = State::local(
      LOCAL_NAME_DESCRIPTOR,
      &LocalOptions {
        include_patterns: vec![self.config.descriptor_file.clone()],
        exclude_patterns: Vec::new(),
      },
      OpMetadata::named(format!("load {}", self.config.descriptor_file)),
    )?
    .marshal()?;

    Ok(SolveRequest::for_frontend(DESCRIPTOR_FRONTEND)
      .with_input(LOCAL_NAME_CONTEXT, context)
      .with_input(LOCAL_NAME_DESCRIPTOR, descriptor))
  }
}

#[async_trait]
impl BuildFunc for LocalFrontend {
  async fn build(&self, backend: &dyn Backend, cancel: &CancellationToken) -> Result<SolveResult, BuildError> {
    let req = self.request()?;
    Ok(backend::solve(backend, req, cancel).await?)
  }
}

/// Build the frontend locally, inject it under `id` and route `req` through it.
///
/// Whatever frontend and `source` option `req` held before are replaced.
pub async fn with_local_frontend(
  backend: &dyn Backend,
  req: SolveRequest,
  id: &str,
  config: BootstrapConfig,
  cancel: &CancellationToken,
) -> Result<SolveRequest, ComposeError> {
  let req = inject_input(backend, &LocalFrontend::new(config), id, req, cancel).await?;
  info!(%id, "routing request through locally built frontend");
  Ok(req.with_frontend(GATEWAY_FRONTEND).with_opt(GATEWAY_SOURCE_OPT, id))
}

/// Provide `spec` to the frontend as its build context and descriptor.
///
/// The spec is written as YAML to the descriptor file of an otherwise empty
/// filesystem, registered under both local names.
pub fn with_spec_inputs(spec: &Spec, req: SolveRequest) -> Result<SolveRequest, ComposeError> {
  let data = serde_yaml::to_string(spec)?;
  let definition = State::scratch()
    .mkfile(DEFAULT_DESCRIPTOR_FILE, 0o644, data.into_bytes(), OpMetadata::default())
    .marshal()
    .map_err(|source| ComposeError::State {
      id: LOCAL_NAME_CONTEXT.to_string(),
      source,
    })?;

  Ok(req
    .with_input(LOCAL_NAME_CONTEXT, definition.clone())
    .with_input(LOCAL_NAME_DESCRIPTOR, definition))
}
