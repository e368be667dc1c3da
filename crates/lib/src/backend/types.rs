use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::IMAGE_CONFIG_KEY;
use crate::state::{Definition, State, StateError};

/// Errors from submitting a request to the execution backend.
#[derive(Debug, Error)]
pub enum BackendError {
  /// The backend refused or failed the request.
  #[error("solve failed: {0}")]
  Solve(String),

  /// The request holds both a frontend and a direct definition, or neither.
  #[error("invalid solve request: {0}")]
  InvalidRequest(String),

  /// The enclosing build was cancelled while the request was in flight.
  #[error("solve cancelled")]
  Cancelled,
}

/// Errors from reading a solve result.
#[derive(Debug, Error)]
pub enum ResultError {
  #[error("expected exactly one result reference, got {0}")]
  NotSingleRef(usize),

  #[error("failed to convert reference {id} to a state: {source}")]
  ToState {
    id: String,
    #[source]
    source: StateError,
  },
}

/// A request for the execution backend.
///
/// Either a raw graph submission (`definition` set, `frontend` empty) or a
/// frontend invocation (`frontend` set, plus options and named inputs). The
/// builder methods keep these two shapes exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolveRequest {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub frontend: String,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub frontend_opts: BTreeMap<String, String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub frontend_inputs: BTreeMap<String, Definition>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub definition: Option<Definition>,
}

impl SolveRequest {
  /// A raw graph submission.
  pub fn from_definition(definition: Definition) -> Self {
    Self {
      definition: Some(definition),
      ..Self::default()
    }
  }

  /// A frontend invocation with no options or inputs yet.
  pub fn for_frontend(frontend: &str) -> Self {
    Self::default().with_frontend(frontend)
  }

  /// Route the request through `frontend`, dropping any direct definition.
  pub fn with_frontend(mut self, frontend: &str) -> Self {
    self.frontend = frontend.to_string();
    self.definition = None;
    self
  }

  pub fn with_opt(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.frontend_opts.insert(key.into(), value.into());
    self
  }

  pub fn with_input(mut self, id: impl Into<String>, definition: Definition) -> Self {
    self.frontend_inputs.insert(id.into(), definition);
    self
  }

  pub fn is_frontend(&self) -> bool {
    !self.frontend.is_empty()
  }

  pub fn opt(&self, key: &str) -> Option<&str> {
    self.frontend_opts.get(key).map(String::as_str)
  }

  pub fn validate(&self) -> Result<(), BackendError> {
    match (self.is_frontend(), self.definition.is_some()) {
      (true, true) => Err(BackendError::InvalidRequest(format!(
        "frontend '{}' set together with a definition",
        self.frontend
      ))),
      (false, false) => Err(BackendError::InvalidRequest(
        "neither a frontend nor a definition".to_string(),
      )),
      (false, true) if !self.frontend_opts.is_empty() || !self.frontend_inputs.is_empty() => Err(
        BackendError::InvalidRequest("frontend options or inputs without a frontend".to_string()),
      ),
      _ => Ok(()),
    }
  }
}

/// A handle to a solved filesystem held by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
  pub id: String,
  /// The graph that produced this reference.
  pub definition: Definition,
}

impl Reference {
  pub fn to_state(&self) -> Result<State, ResultError> {
    State::from_definition(&self.definition).map_err(|source| ResultError::ToState {
      id: self.id.clone(),
      source,
    })
  }
}

/// What the backend returns for a solve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolveResult {
  pub refs: Vec<Reference>,
  pub metadata: BTreeMap<String, Vec<u8>>,
}

impl SolveResult {
  pub fn single(reference: Reference) -> Self {
    Self {
      refs: vec![reference],
      metadata: BTreeMap::new(),
    }
  }

  pub fn with_metadata(mut self, key: &str, value: Vec<u8>) -> Self {
    self.metadata.insert(key.to_string(), value);
    self
  }

  /// The only reference of this result.
  pub fn single_ref(&self) -> Result<&Reference, ResultError> {
    match self.refs.as_slice() {
      [reference] => Ok(reference),
      refs => Err(ResultError::NotSingleRef(refs.len())),
    }
  }

  /// The serialized image configuration, if the result carries one.
  pub fn image_config(&self) -> Option<&[u8]> {
    self.metadata.get(IMAGE_CONFIG_KEY).map(Vec::as_slice)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn reference(id: &str) -> Reference {
    Reference {
      id: id.to_string(),
      definition: State::image("busybox:latest").marshal().unwrap(),
    }
  }

  #[test]
  fn with_frontend_drops_definition() {
    let req = SolveRequest::from_definition(Definition::default()).with_frontend("gateway.v0");
    assert!(req.definition.is_none());
    assert!(req.is_frontend());
    req.validate().unwrap();
  }

  #[test]
  fn validate_rejects_both_shapes() {
    let mut req = SolveRequest::for_frontend("gateway.v0");
    req.definition = Some(Definition::default());
    assert!(matches!(req.validate(), Err(BackendError::InvalidRequest(_))));
  }

  #[test]
  fn validate_rejects_empty_request() {
    assert!(SolveRequest::default().validate().is_err());
  }

  #[test]
  fn validate_rejects_options_without_frontend() {
    let req = SolveRequest::from_definition(Definition::default()).with_opt("source", "x");
    assert!(req.validate().is_err());
  }

  #[test]
  fn single_ref_requires_exactly_one() {
    assert!(matches!(
      SolveResult::default().single_ref(),
      Err(ResultError::NotSingleRef(0))
    ));

    let two = SolveResult {
      refs: vec![reference("a"), reference("b")],
      metadata: BTreeMap::new(),
    };
    assert!(matches!(two.single_ref(), Err(ResultError::NotSingleRef(2))));

    let one = SolveResult::single(reference("a"));
    assert_eq!(one.single_ref().unwrap().id, "a");
  }

  #[test]
  fn reference_converts_to_state() {
    let state = reference("a").to_state().unwrap();
    assert!(!state.is_scratch());
  }

  #[test]
  fn image_config_lookup() {
    let result = SolveResult::single(reference("a")).with_metadata(IMAGE_CONFIG_KEY, b"{}".to_vec());
    assert_eq!(result.image_config(), Some(&b"{}"[..]));
    assert_eq!(SolveResult::single(reference("a")).image_config(), None);
  }
}
