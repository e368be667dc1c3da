//! Build request composition.
//!
//! A nested build can feed another build: [`inject_input`] runs a
//! [`BuildFunc`], takes its single result and registers it on a target
//! [`SolveRequest`] as a named input the downstream frontend can reference
//! as a build context. [`with_local_frontend`] uses this to build the
//! frontend from the local project and route a request through it.

mod bootstrap;
mod types;

pub use bootstrap::{BootstrapConfig, LocalFrontend, with_local_frontend, with_spec_inputs};
pub use types::*;

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, warn};

use crate::backend::{Backend, BackendError, SolveRequest};

/// Run `func` and prepare its result for injection under `id`.
///
/// The result must hold exactly one reference. An image config in the result
/// metadata is attached to the state and carried along.
pub async fn build_input(
  backend: &dyn Backend,
  func: &dyn BuildFunc,
  id: &str,
  cancel: &CancellationToken,
) -> Result<InjectedInput, ComposeError> {
  let span = info_span!("build_input", %id);
  let result = build_input_inner(backend, func, id, cancel).instrument(span).await;
  if let Err(e) = &result {
    warn!(%id, error = %e, "failed to build input");
  }
  result
}

async fn build_input_inner(
  backend: &dyn Backend,
  func: &dyn BuildFunc,
  id: &str,
  cancel: &CancellationToken,
) -> Result<InjectedInput, ComposeError> {
  let built = tokio::select! {
    biased;
    _ = cancel.cancelled() => Err(BuildError::Backend(BackendError::Cancelled)),
    result = func.build(backend, cancel) => result,
  };
  let result = built.map_err(|source| match source {
    BuildError::Backend(BackendError::Cancelled) => ComposeError::Cancelled { id: id.to_string() },
    source => ComposeError::Build {
      id: id.to_string(),
      source,
    },
  })?;

  let reference = result.single_ref().map_err(|source| ComposeError::Result {
    id: id.to_string(),
    source,
  })?;
  let mut state = reference.to_state().map_err(|source| ComposeError::Result {
    id: id.to_string(),
    source,
  })?;

  let image_config = result.image_config().map(<[u8]>::to_vec);
  if let Some(config) = &image_config {
    state = state.with_image_config(config).map_err(|source| ComposeError::State {
      id: id.to_string(),
      source,
    })?;
  }

  let definition = state.marshal().map_err(|source| ComposeError::State {
    id: id.to_string(),
    source,
  })?;
  debug!(
    reference = %reference.id,
    ops = definition.len(),
    has_image_config = image_config.is_some(),
    "built input"
  );

  Ok(InjectedInput {
    id: id.to_string(),
    definition,
    image_config,
  })
}

/// Run `func` and register its result on `req` under `id`.
pub async fn inject_input(
  backend: &dyn Backend,
  func: &dyn BuildFunc,
  id: &str,
  req: SolveRequest,
  cancel: &CancellationToken,
) -> Result<SolveRequest, ComposeError> {
  build_input(backend, func, id, cancel).await?.apply(req)
}
