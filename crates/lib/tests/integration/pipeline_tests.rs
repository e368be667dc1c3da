use std::time::Duration;

use async_trait::async_trait;
use graft_lib::backend::RecordingBackend;
use graft_lib::progress::ProgressGroup;
use graft_lib::source::{
  PipelineConfig, PipelineError, ResolveError, SourceResolver, handle_sources, output_paths,
};
use graft_lib::spec::{Source, Spec};
use graft_lib::state::{FileAction, Op, State};
use tokio_util::sync::CancellationToken;

use super::common::{assert_same_graph, load_spec, scripts, source_identifiers, submitted_definition};

#[tokio::test]
async fn patched_directory_source_is_the_only_artifact() {
  let spec = load_spec("patched.yaml");
  let def = submitted_definition(&spec).await;

  assert_eq!(
    scripts(&def),
    vec![
      "cd /src && patch -p1 < ../patch/'fix'",
      "tar -C /src -cvzf /tmp/st .",
      "mkdir -p '/tmp/out' && mv /tmp/st '/tmp/out'/'main.tar.gz'",
    ]
  );

  // A single artifact means no merge vertex: the output is the copy into /SOURCES.
  match &def.output_op().unwrap().op {
    Op::File(op) => assert!(matches!(
      &op.action,
      FileAction::Copy { dest, create_dest_path: true, .. } if dest == "/SOURCES"
    )),
    other => panic!("expected copy into /SOURCES, got {:?}", other),
  }
  assert!(!def.ops.iter().any(|e| matches!(e.op, Op::Merge(_))));
}

#[tokio::test]
async fn output_paths_skip_patch_sources() {
  let spec = load_spec("patched.yaml");
  let paths = output_paths(&spec).unwrap();
  assert_eq!(paths.len(), 1);
  assert_eq!(paths["main"], "main.tar.gz");
}

#[tokio::test]
async fn declaration_order_does_not_matter() {
  let ordered = submitted_definition(&load_spec("ordered.yaml")).await;
  let reversed = submitted_definition(&load_spec("reversed.yaml")).await;
  assert_same_graph(&ordered, &reversed);

  let ids = source_identifiers(&ordered);
  let alpha = ids.iter().position(|id| id.contains("alpha.git")).unwrap();
  let beta = ids.iter().position(|id| id.contains("golang")).unwrap();
  assert!(alpha < beta, "alpha must be emitted before beta: {:?}", ids);
}

#[tokio::test]
async fn patches_apply_in_declared_order() {
  let spec = load_spec("two_patches.yaml");
  let def = submitted_definition(&spec).await;

  let patch_scripts: Vec<String> = scripts(&def).into_iter().filter(|s| s.contains("patch -p1")).collect();
  assert_eq!(
    patch_scripts,
    vec![
      "cd /src && patch -p1 < ../patch/'p1'",
      "cd /src && patch -p1 < ../patch/'p2'",
    ]
  );

  let mut swapped = spec.clone();
  swapped
    .patches
    .insert("main".to_string(), vec!["p2".to_string(), "p1".to_string()]);
  let swapped_def = submitted_definition(&swapped).await;

  assert_ne!(def.output, swapped_def.output);
}

#[tokio::test]
async fn repeated_runs_submit_identical_graphs() {
  let spec = load_spec("two_patches.yaml");
  assert_same_graph(&submitted_definition(&spec).await, &submitted_definition(&spec).await);
}

/// Never finishes resolving.
struct HangingResolver;

#[async_trait]
impl SourceResolver for HangingResolver {
  async fn resolve(&self, _: &Spec, _: &str, _: &Source, _: &ProgressGroup) -> Result<State, ResolveError> {
    std::future::pending().await
  }
}

#[tokio::test]
async fn cancellation_aborts_resolution() {
  let backend = RecordingBackend::new();
  let cancel = CancellationToken::new();
  let trigger = cancel.clone();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(10)).await;
    trigger.cancel();
  });

  let err = handle_sources(
    &backend,
    &load_spec("patched.yaml"),
    &HangingResolver,
    &PipelineConfig::default(),
    &cancel,
  )
  .await
  .unwrap_err();

  assert!(matches!(err, PipelineError::Cancelled));
  assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn custom_tool_images_are_used() {
  let config = PipelineConfig {
    tar_image: "registry.local/tar:1".to_string(),
    patch_image: "registry.local/patch:1".to_string(),
    ..PipelineConfig::default()
  };
  let backend = RecordingBackend::new();
  handle_sources(
    &backend,
    &load_spec("patched.yaml"),
    &graft_lib::source::DefaultResolver,
    &config,
    &CancellationToken::new(),
  )
  .await
  .unwrap();

  let def = backend.requests()[0].definition.clone().unwrap();
  let ids = source_identifiers(&def);
  assert!(ids.contains(&"docker-image://registry.local/tar:1".to_string()));
  assert!(ids.contains(&"docker-image://registry.local/patch:1".to_string()));
  assert!(!ids.iter().any(|id| id.contains("busybox")));
}
