//! Execution backend protocol.
//!
//! The backend is an external service: it accepts a graph definition or a
//! frontend request, schedules and caches the work, and answers with result
//! references plus metadata. This crate only speaks its request/response
//! protocol through the [`Backend`] trait.
//!
//! Every round-trip goes through [`solve`], which validates the request and
//! abandons it as soon as the caller's [`CancellationToken`] fires.

mod recording;
mod types;

pub use recording::RecordingBackend;
pub use types::*;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A request/response connection to the execution backend.
#[async_trait]
pub trait Backend: Send + Sync {
  async fn solve(&self, req: SolveRequest) -> Result<SolveResult, BackendError>;
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for std::sync::Arc<B> {
  async fn solve(&self, req: SolveRequest) -> Result<SolveResult, BackendError> {
    (**self).solve(req).await
  }
}

/// Submit `req`, giving up with [`BackendError::Cancelled`] once `cancel` fires.
pub async fn solve(
  backend: &dyn Backend,
  req: SolveRequest,
  cancel: &CancellationToken,
) -> Result<SolveResult, BackendError> {
  req.validate()?;
  if cancel.is_cancelled() {
    return Err(BackendError::Cancelled);
  }

  debug!(
    frontend = %req.frontend,
    inputs = req.frontend_inputs.len(),
    ops = req.definition.as_ref().map(|d| d.len()).unwrap_or(0),
    "submitting solve request"
  );

  tokio::select! {
    biased;
    _ = cancel.cancelled() => Err(BackendError::Cancelled),
    result = backend.solve(req) => result,
  }
}
