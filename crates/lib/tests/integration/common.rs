//! Shared helpers for library integration tests.

use std::path::PathBuf;

use graft_lib::backend::RecordingBackend;
use graft_lib::source::{DefaultResolver, PipelineConfig, handle_sources};
use graft_lib::spec::Spec;
use graft_lib::state::{Definition, ExecOp, Op};
use tokio_util::sync::CancellationToken;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Load a spec fixture.
pub fn load_spec(name: &str) -> Spec {
  let content =
    std::fs::read_to_string(fixture_path(name)).unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", name, e));
  Spec::from_yaml(&content).unwrap_or_else(|e| panic!("Failed to parse fixture {}: {}", name, e))
}

/// Run the source pipeline against a recording backend and return the
/// submitted definition.
pub async fn submitted_definition(spec: &Spec) -> Definition {
  let backend = RecordingBackend::new();
  handle_sources(
    &backend,
    spec,
    &DefaultResolver,
    &PipelineConfig::default(),
    &CancellationToken::new(),
  )
  .await
  .expect("pipeline succeeds");

  let requests = backend.requests();
  assert_eq!(requests.len(), 1, "exactly one submission");
  requests[0].definition.clone().expect("graph submission")
}

/// The shell script of every exec op, in definition order.
pub fn scripts(def: &Definition) -> Vec<String> {
  def
    .ops
    .iter()
    .filter_map(|entry| match &entry.op {
      Op::Exec(ExecOp { meta, .. }) => meta.args.last().cloned(),
      _ => None,
    })
    .collect()
}

/// Source identifiers in definition order.
pub fn source_identifiers(def: &Definition) -> Vec<String> {
  def
    .ops
    .iter()
    .filter_map(|entry| match &entry.op {
      Op::Source(op) => Some(op.identifier.clone()),
      _ => None,
    })
    .collect()
}

/// Assert that two definitions describe the same graph.
///
/// Op metadata carries freshly generated progress group ids, so only ops
/// and output are compared.
pub fn assert_same_graph(a: &Definition, b: &Definition) {
  assert_eq!(a.ops, b.ops);
  assert_eq!(a.output, b.output);
}
