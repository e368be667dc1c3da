use graft_lib::backend::{self, RecordingBackend, Reference, SolveRequest, SolveResult};
use graft_lib::compose::{BootstrapConfig, with_local_frontend, with_spec_inputs};
use graft_lib::consts::{DEFAULT_FRONTEND_INPUT_ID, IMAGE_CONFIG_KEY};
use graft_lib::state::State;
use tokio_util::sync::CancellationToken;

use super::common::load_spec;

const FRONTEND_CONFIG: &[u8] = br#"{"os":"linux","config":{"Entrypoint":["/frontend"]}}"#;

#[tokio::test]
async fn bootstrapped_spec_build() {
  let backend = RecordingBackend::new();
  backend.push_result(
    SolveResult::single(Reference {
      id: "frontend".to_string(),
      definition: State::image("graft/frontend:dev").marshal().unwrap(),
    })
    .with_metadata(IMAGE_CONFIG_KEY, FRONTEND_CONFIG.to_vec()),
  );
  let cancel = CancellationToken::new();

  let spec = load_spec("patched.yaml");
  let req = with_spec_inputs(&spec, SolveRequest::for_frontend("dockerfile.v0")).unwrap();
  let req = with_local_frontend(&backend, req, DEFAULT_FRONTEND_INPUT_ID, BootstrapConfig::default(), &cancel)
    .await
    .unwrap();

  assert_eq!(req.frontend, "gateway.v0");
  assert_eq!(req.opt("source"), Some("graft-frontend"));
  assert_eq!(req.opt("context:graft-frontend"), Some("input:graft-frontend"));
  assert!(req.opt("input-metadata:graft-frontend").is_some());
  let inputs: Vec<&str> = req.frontend_inputs.keys().map(String::as_str).collect();
  assert_eq!(inputs, vec!["context", "dockerfile", "graft-frontend"]);

  // The composed request is a valid frontend request.
  backend.push_result(SolveResult::default());
  backend::solve(&backend, req, &cancel).await.unwrap();

  let requests = backend.requests();
  assert_eq!(requests.len(), 2);
  assert_eq!(requests[0].frontend, "dockerfile.v0");
  assert_eq!(requests[1].frontend, "gateway.v0");
}

#[tokio::test]
async fn failed_bootstrap_leaves_nothing_submitted() {
  let backend = RecordingBackend::new();
  backend.push_failure("cannot read Dockerfile");

  let err = with_local_frontend(
    &backend,
    SolveRequest::for_frontend("dockerfile.v0"),
    DEFAULT_FRONTEND_INPUT_ID,
    BootstrapConfig::default(),
    &CancellationToken::new(),
  )
  .await
  .unwrap_err();

  assert!(err.to_string().contains("graft-frontend"));
  assert_eq!(backend.requests().len(), 1);
}
