//! Serialized graph definitions.
//!
//! A [`Definition`] is the flat, content-addressed form of a [`State`]: every
//! reachable vertex appears exactly once, dependencies before dependents, keyed
//! by its digest. This is what gets handed to the execution backend.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::State;
use super::types::{Edge, Op, OpMetadata, OutputRef, StateError, Vertex};
use crate::util::hash::{Digest, Hashable};

/// A single marshaled vertex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpEntry {
  pub digest: Digest,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub inputs: Vec<OutputRef>,
  pub op: Op,
}

/// A marshaled build graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
  /// Ops in dependency-first order.
  pub ops: Vec<OpEntry>,
  /// Per-op metadata; never part of a digest.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub metadata: BTreeMap<Digest, OpMetadata>,
  /// The state's output. `None` is the empty filesystem.
  pub output: Option<OutputRef>,
}

/// What a vertex digest covers: its op and its inputs, nothing else.
#[derive(Serialize)]
struct DigestInput<'a> {
  inputs: &'a [OutputRef],
  op: &'a Op,
}

impl Hashable for DigestInput<'_> {}

impl Definition {
  pub fn get(&self, digest: &Digest) -> Option<&OpEntry> {
    self.ops.iter().find(|entry| &entry.digest == digest)
  }

  /// The op producing the definition's output.
  pub fn output_op(&self) -> Option<&OpEntry> {
    self.output.as_ref().and_then(|out| self.get(&out.digest))
  }

  pub fn len(&self) -> usize {
    self.ops.len()
  }

  pub fn is_empty(&self) -> bool {
    self.ops.is_empty()
  }

  /// Human readable name recorded for an op, if any.
  pub fn name_of(&self, digest: &Digest) -> Option<&str> {
    self.metadata.get(digest).and_then(OpMetadata::name)
  }
}

#[derive(Default)]
struct Marshaller {
  ops: Vec<OpEntry>,
  metadata: BTreeMap<Digest, OpMetadata>,
  emitted: HashSet<Digest>,
  memo: HashMap<*const Vertex, Digest>,
}

impl Marshaller {
  fn visit(&mut self, vertex: &Arc<Vertex>) -> Result<Digest, StateError> {
    let key = Arc::as_ptr(vertex);
    if let Some(digest) = self.memo.get(&key) {
      return Ok(digest.clone());
    }

    let mut inputs = Vec::with_capacity(vertex.inputs.len());
    for edge in &vertex.inputs {
      let digest = self.visit(&edge.vertex)?;
      inputs.push(OutputRef {
        digest,
        index: edge.index,
      });
    }

    let digest = DigestInput {
      inputs: &inputs,
      op: &vertex.op,
    }
    .compute_hash()?;

    // Structurally equal vertices collapse into one op; the first metadata wins.
    if self.emitted.insert(digest.clone()) {
      if !vertex.metadata.is_empty() {
        self.metadata.insert(digest.clone(), vertex.metadata.clone());
      }
      self.ops.push(OpEntry {
        digest: digest.clone(),
        inputs,
        op: vertex.op.clone(),
      });
    }

    self.memo.insert(key, digest.clone());
    Ok(digest)
  }
}

pub(crate) fn marshal(state: &State) -> Result<Definition, StateError> {
  let mut marshaller = Marshaller::default();
  let output = match &state.output {
    Some(edge) => Some(OutputRef {
      digest: marshaller.visit(&edge.vertex)?,
      index: edge.index,
    }),
    None => None,
  };

  Ok(Definition {
    ops: marshaller.ops,
    metadata: marshaller.metadata,
    output,
  })
}

pub(crate) fn unmarshal(def: &Definition) -> Result<State, StateError> {
  let mut vertices: HashMap<&Digest, Arc<Vertex>> = HashMap::with_capacity(def.ops.len());

  for entry in &def.ops {
    let computed = DigestInput {
      inputs: &entry.inputs,
      op: &entry.op,
    }
    .compute_hash()?;
    if computed != entry.digest {
      return Err(StateError::DigestMismatch {
        recorded: entry.digest.clone(),
        computed,
      });
    }

    let mut inputs = Vec::with_capacity(entry.inputs.len());
    for input in &entry.inputs {
      let vertex = vertices.get(&input.digest).ok_or_else(|| StateError::MissingInput {
        op: entry.digest.clone(),
        input: input.digest.clone(),
      })?;
      inputs.push(Edge {
        vertex: Arc::clone(vertex),
        index: input.index,
      });
    }

    vertices.insert(
      &entry.digest,
      Arc::new(Vertex {
        op: entry.op.clone(),
        inputs,
        metadata: def.metadata.get(&entry.digest).cloned().unwrap_or_default(),
      }),
    );
  }

  let output = match &def.output {
    Some(out) => {
      let vertex = vertices
        .get(&out.digest)
        .ok_or_else(|| StateError::UnknownOutput(out.digest.clone()))?;
      Some(Edge {
        vertex: Arc::clone(vertex),
        index: out.index,
      })
    }
    None => None,
  };

  Ok(State::from_output(output))
}
