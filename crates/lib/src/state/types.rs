use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::progress::ProgressGroup;
use crate::util::hash::Digest;

/// Metadata key holding a vertex's human readable name.
pub const CUSTOM_NAME_KEY: &str = "llb.customname";

/// A graph operation.
///
/// Operations refer to their inputs by index into the owning vertex's input
/// list. A missing index (`None`) means the input is the empty filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
  /// Materialize external content (image, git, http, local directory).
  Source(SourceOp),
  /// Run a command over a set of mounts.
  Exec(ExecOp),
  /// Apply a single file action on top of a base filesystem.
  File(FileOp),
  /// Layer inputs on top of each other; later inputs win on overlap.
  Merge(MergeOp),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceOp {
  pub identifier: String,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub attrs: BTreeMap<String, String>,
}

impl SourceOp {
  pub fn new(identifier: impl Into<String>) -> Self {
    Self {
      identifier: identifier.into(),
      attrs: BTreeMap::new(),
    }
  }

  pub fn with_attr(mut self, key: &str, value: impl Into<String>) -> Self {
    self.attrs.insert(key.to_string(), value.into());
    self
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecMeta {
  pub args: Vec<String>,
  /// `KEY=value` pairs, sorted by key.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub env: Vec<String>,
  pub cwd: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MountSpec {
  pub input: Option<usize>,
  pub dest: String,
  /// Output index of this mount; read-only mounts produce no output.
  pub output: Option<usize>,
  #[serde(default)]
  pub readonly: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecOp {
  pub meta: ExecMeta,
  /// The first mount is always the root filesystem at `/`.
  pub mounts: Vec<MountSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileOp {
  pub base: Option<usize>,
  pub action: FileAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileAction {
  Copy {
    input: Option<usize>,
    src: String,
    dest: String,
    /// Copy the contents of `src` rather than `src` itself.
    #[serde(default)]
    contents_only: bool,
    #[serde(default)]
    create_dest_path: bool,
  },
  Mkfile {
    path: String,
    mode: u32,
    data: Vec<u8>,
  },
  Mkdir {
    path: String,
    mode: u32,
    #[serde(default)]
    make_parents: bool,
  },
  Rm {
    path: String,
    #[serde(default)]
    allow_not_found: bool,
  },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MergeOp {
  pub inputs: Vec<usize>,
}

/// Vertex metadata that does not contribute to the vertex digest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpMetadata {
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub description: BTreeMap<String, String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub progress_group: Option<ProgressGroup>,
}

impl OpMetadata {
  pub fn named(name: impl Into<String>) -> Self {
    Self::default().with_name(name)
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.description.insert(CUSTOM_NAME_KEY.to_string(), name.into());
    self
  }

  pub fn with_progress_group(mut self, group: &ProgressGroup) -> Self {
    self.progress_group = Some(group.clone());
    self
  }

  pub fn name(&self) -> Option<&str> {
    self.description.get(CUSTOM_NAME_KEY).map(String::as_str)
  }

  pub fn is_empty(&self) -> bool {
    self.description.is_empty() && self.progress_group.is_none()
  }
}

/// Reference to one output of a marshaled vertex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputRef {
  pub digest: Digest,
  pub index: usize,
}

/// An in-memory graph vertex. Vertices are shared and never mutated.
#[derive(Debug)]
pub struct Vertex {
  pub(crate) op: Op,
  pub(crate) inputs: Vec<Edge>,
  pub(crate) metadata: OpMetadata,
}

impl Vertex {
  pub fn op(&self) -> &Op {
    &self.op
  }

  pub fn metadata(&self) -> &OpMetadata {
    &self.metadata
  }
}

#[derive(Debug, Clone)]
pub struct Edge {
  pub(crate) vertex: Arc<Vertex>,
  pub(crate) index: usize,
}

/// Errors from composing, marshaling or reconstructing graph states.
#[derive(Debug, Error)]
pub enum StateError {
  #[error("failed to serialize op: {0}")]
  Serialize(#[from] serde_json::Error),

  #[error("op {op} references unknown input {input}")]
  MissingInput { op: Digest, input: Digest },

  #[error("op digest mismatch: recorded {recorded}, computed {computed}")]
  DigestMismatch { recorded: Digest, computed: Digest },

  #[error("definition output {0} is not one of its ops")]
  UnknownOutput(Digest),

  #[error("no writable mount at {0}")]
  UnknownMount(String),

  #[error("invalid image config: {0}")]
  InvalidImageConfig(String),
}
