//! Progress grouping and status display.
//!
//! A [`ProgressGroup`] correlates a batch of graph operations (all vertices
//! that resolve one source, one source's patch chain, ...) in progress
//! output. Groups live in vertex metadata and never take part in digests, so
//! fresh ids do not disturb cache keys.
//!
//! [`StatusDisplay`] is the single consumer of the status events a backend
//! streams while it solves.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::util::hash::Digest;

/// Identity and label for a batch of graph operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressGroup {
  pub id: String,
  pub name: String,
  /// Weak groups are only shown when at least one of their vertices runs.
  pub weak: bool,
}

impl ProgressGroup {
  /// Create a group with a freshly generated id.
  ///
  /// Every call yields a new id; callers create one per logical batch.
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      id: uuid::Uuid::new_v4().simple().to_string(),
      name: name.into(),
      weak: false,
    }
  }
}

/// A status update for one vertex, streamed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolveStatus {
  pub vertex: Digest,
  pub name: String,
  pub cached: bool,
  pub completed: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

pub type StatusSender = mpsc::UnboundedSender<SolveStatus>;

/// Drains backend status events and logs them.
///
/// The display owns the only receiver. The channel closes when [`finish`]
/// drops the display's sender and every clone handed out by [`sender`] has
/// been dropped.
///
/// [`finish`]: StatusDisplay::finish
/// [`sender`]: StatusDisplay::sender
pub struct StatusDisplay {
  tx: StatusSender,
  handle: JoinHandle<usize>,
}

impl StatusDisplay {
  /// Spawn the consumer task. Must be called from within a tokio runtime.
  pub fn spawn() -> Self {
    let (tx, mut rx) = mpsc::unbounded_channel::<SolveStatus>();
    let handle = tokio::spawn(async move {
      let mut seen = 0usize;
      while let Some(status) = rx.recv().await {
        seen += 1;
        match (&status.error, status.completed) {
          (Some(error), _) => warn!(vertex = %status.vertex, name = %status.name, %error, "vertex failed"),
          (None, true) => info!(
            vertex = %status.vertex,
            name = %status.name,
            cached = status.cached,
            "vertex done"
          ),
          (None, false) => debug!(vertex = %status.vertex, name = %status.name, "vertex started"),
        }
      }
      seen
    });
    Self { tx, handle }
  }

  /// A sender to hand to a backend.
  pub fn sender(&self) -> StatusSender {
    self.tx.clone()
  }

  /// Close the channel and wait for the consumer to drain it.
  ///
  /// Returns the number of status events seen.
  pub async fn finish(self) -> usize {
    let Self { tx, handle } = self;
    drop(tx);
    match handle.await {
      Ok(seen) => seen,
      Err(e) => {
        warn!(error = %e, "status display task failed");
        0
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::hash::hash_bytes;

  #[test]
  fn progress_groups_get_fresh_ids() {
    let a = ProgressGroup::new("Add spec source: main");
    let b = ProgressGroup::new("Add spec source: main");
    assert_ne!(a.id, b.id);
    assert_eq!(a.name, b.name);
    assert!(!a.weak);
  }

  #[tokio::test]
  async fn status_display_drains_every_event() {
    let display = StatusDisplay::spawn();
    let tx = display.sender();
    for completed in [false, true] {
      tx.send(SolveStatus {
        vertex: hash_bytes(b"v"),
        name: "tar".to_string(),
        cached: false,
        completed,
        error: None,
      })
      .unwrap();
    }
    drop(tx);

    assert_eq!(display.finish().await, 2);
  }

  #[tokio::test]
  async fn status_display_finishes_without_events() {
    let display = StatusDisplay::spawn();
    assert_eq!(display.finish().await, 0);
  }
}
