//! A backend that records requests instead of executing them.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::{Backend, BackendError, Reference, SolveRequest, SolveResult};
use crate::progress::{SolveStatus, StatusSender};

/// Records every request it receives.
///
/// Queued results (see [`push_result`](Self::push_result)) are returned first,
/// in order. Without a queued result, a raw graph submission is answered with
/// a single reference to the submitted definition, and a frontend request
/// fails. Used for dry-run planning and in tests.
#[derive(Default)]
pub struct RecordingBackend {
  requests: Mutex<Vec<SolveRequest>>,
  queued: Mutex<VecDeque<Result<SolveResult, String>>>,
  status: Option<StatusSender>,
}

impl RecordingBackend {
  pub fn new() -> Self {
    Self::default()
  }

  /// Stream a started and a completed event per submitted op to `tx`.
  pub fn with_status(mut self, tx: StatusSender) -> Self {
    self.status = Some(tx);
    self
  }

  pub fn push_result(&self, result: SolveResult) {
    self.queued.lock().push_back(Ok(result));
  }

  pub fn push_failure(&self, message: &str) {
    self.queued.lock().push_back(Err(message.to_string()));
  }

  /// All requests received so far, in order.
  pub fn requests(&self) -> Vec<SolveRequest> {
    self.requests.lock().clone()
  }

  fn report(&self, req: &SolveRequest) {
    let (Some(tx), Some(def)) = (&self.status, &req.definition) else {
      return;
    };
    for entry in &def.ops {
      let name = def.name_of(&entry.digest).unwrap_or_default().to_string();
      for completed in [false, true] {
        // A closed display only means nobody is watching.
        let _ = tx.send(SolveStatus {
          vertex: entry.digest.clone(),
          name: name.clone(),
          cached: false,
          completed,
          error: None,
        });
      }
    }
  }
}

#[async_trait]
impl Backend for RecordingBackend {
  async fn solve(&self, req: SolveRequest) -> Result<SolveResult, BackendError> {
    self.requests.lock().push(req.clone());
    self.report(&req);

    if let Some(queued) = self.queued.lock().pop_front() {
      return queued.map_err(BackendError::Solve);
    }

    match req.definition {
      Some(definition) => {
        let id = definition
          .output
          .as_ref()
          .map(|out| out.digest.hex().to_string())
          .unwrap_or_else(|| "scratch".to_string());
        debug!(%id, ops = definition.len(), "recorded graph submission");
        Ok(SolveResult::single(Reference { id, definition }))
      }
      None => Err(BackendError::Solve(format!(
        "no result queued for frontend '{}'",
        req.frontend
      ))),
    }
  }
}
