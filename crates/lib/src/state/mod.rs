//! Filesystem state algebra.
//!
//! A [`State`] describes a filesystem snapshot as a node in a build graph.
//! States are immutable: every operation returns a new state that shares (and
//! keeps alive) the vertices it was built from. Nothing is executed here; a
//! state is marshaled into a [`Definition`] and submitted to the execution
//! backend.
//!
//! # Operations
//!
//! - [`State::image`], [`State::git`], [`State::http`], [`State::local`] - leaf sources
//! - [`State::run`] - run a command over mounts, yielding an [`ExecState`]
//! - [`State::copy`], [`State::mkfile`], [`State::mkdir`], [`State::rm`] - file actions
//! - [`State::merge`], [`merge_at_path`] - layer states on top of each other
//!
//! # Merge precedence
//!
//! Merges are order sensitive only where inputs overlap: the later input's
//! paths win.

mod definition;
mod image;
mod types;

pub use definition::{Definition, OpEntry};
pub use image::{ImageConfig, RuntimeConfig};
pub use types::*;

use std::collections::BTreeMap;
use std::sync::Arc;

/// Environment and identity that later exec operations inherit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateMeta {
  pub env: BTreeMap<String, String>,
  pub cwd: Option<String>,
  pub user: Option<String>,
  pub image_config: Option<ImageConfig>,
}

/// An immutable filesystem snapshot in the build graph.
#[derive(Debug, Clone, Default)]
pub struct State {
  output: Option<Edge>,
  meta: Arc<StateMeta>,
}

/// Options for [`State::copy`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyOptions {
  pub contents_only: bool,
  pub create_dest_path: bool,
}

impl CopyOptions {
  pub fn contents_only() -> Self {
    Self {
      contents_only: true,
      create_dest_path: false,
    }
  }

  pub fn create_dest_path(mut self) -> Self {
    self.create_dest_path = true;
    self
  }
}

/// Options for [`State::local`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalOptions {
  pub include_patterns: Vec<String>,
  pub exclude_patterns: Vec<String>,
}

/// A mount for an exec operation.
#[derive(Debug, Clone)]
pub struct Mount {
  dest: String,
  source: State,
  readonly: bool,
}

impl Mount {
  pub fn new(dest: &str, source: State) -> Self {
    Self {
      dest: dest.to_string(),
      source,
      readonly: false,
    }
  }

  pub fn readonly(dest: &str, source: State) -> Self {
    Self {
      dest: dest.to_string(),
      source,
      readonly: true,
    }
  }
}

/// A command to run with [`State::run`].
#[derive(Debug, Clone, Default)]
pub struct Exec {
  args: Vec<String>,
  mounts: Vec<Mount>,
  metadata: OpMetadata,
}

impl Exec {
  pub fn new(args: Vec<String>) -> Self {
    Self {
      args,
      ..Self::default()
    }
  }

  /// Run `cmd` through `sh -c`.
  pub fn shell(cmd: &str) -> Self {
    Self::new(vec!["sh".to_string(), "-c".to_string(), cmd.to_string()])
  }

  pub fn with_mount(mut self, mount: Mount) -> Self {
    self.mounts.push(mount);
    self
  }

  pub fn with_metadata(mut self, metadata: OpMetadata) -> Self {
    self.metadata = metadata;
    self
  }
}

/// The result of [`State::run`]: the root filesystem plus any writable mounts.
#[derive(Debug, Clone)]
pub struct ExecState {
  vertex: Arc<Vertex>,
  meta: Arc<StateMeta>,
  outputs: Vec<(String, usize)>,
}

impl ExecState {
  /// The root filesystem after the command ran.
  pub fn root(&self) -> State {
    State {
      output: Some(Edge {
        vertex: Arc::clone(&self.vertex),
        index: 0,
      }),
      meta: Arc::clone(&self.meta),
    }
  }

  /// The contents of the writable mount at `dest` after the command ran.
  pub fn get_mount(&self, dest: &str) -> Result<State, StateError> {
    let index = self
      .outputs
      .iter()
      .find(|(mount, _)| mount == dest)
      .map(|(_, index)| *index)
      .ok_or_else(|| StateError::UnknownMount(dest.to_string()))?;
    Ok(State {
      output: Some(Edge {
        vertex: Arc::clone(&self.vertex),
        index,
      }),
      meta: Arc::clone(&self.meta),
    })
  }

  /// Run another command on top of this one's root filesystem.
  pub fn run(&self, exec: Exec) -> ExecState {
    self.root().run(exec)
  }
}

/// Collects vertex inputs, skipping the empty filesystem.
#[derive(Default)]
struct Inputs(Vec<Edge>);

impl Inputs {
  fn add(&mut self, state: &State) -> Option<usize> {
    let edge = state.output.clone()?;
    self.0.push(edge);
    Some(self.0.len() - 1)
  }
}

impl State {
  /// The empty filesystem.
  pub fn scratch() -> Self {
    Self::default()
  }

  pub(crate) fn from_output(output: Option<Edge>) -> Self {
    Self {
      output,
      meta: Arc::default(),
    }
  }

  fn with_vertex(&self, op: Op, inputs: Inputs, metadata: OpMetadata, index: usize) -> Self {
    Self {
      output: Some(Edge {
        vertex: Arc::new(Vertex {
          op,
          inputs: inputs.0,
          metadata,
        }),
        index,
      }),
      meta: Arc::clone(&self.meta),
    }
  }

  /// A leaf state materialized by the backend from `op`.
  pub fn source(op: SourceOp, metadata: OpMetadata) -> Self {
    Self::scratch().with_vertex(Op::Source(op), Inputs::default(), metadata, 0)
  }

  pub fn image(reference: &str) -> Self {
    Self::image_with(reference, OpMetadata::default())
  }

  pub fn image_with(reference: &str, metadata: OpMetadata) -> Self {
    Self::source(SourceOp::new(format!("docker-image://{}", reference)), metadata)
  }

  pub fn git(url: &str, commit: &str, keep_git_dir: bool, metadata: OpMetadata) -> Self {
    let mut op = SourceOp::new(format!("git://{}#{}", url, commit));
    if keep_git_dir {
      op = op.with_attr("git.keepgitdir", "true");
    }
    Self::source(op, metadata)
  }

  /// A single file downloaded from `url` and saved as `filename`.
  pub fn http(url: &str, filename: &str, checksum: Option<&str>, metadata: OpMetadata) -> Self {
    let mut op = SourceOp::new(url).with_attr("http.filename", filename);
    if let Some(checksum) = checksum {
      op = op.with_attr("http.checksum", checksum);
    }
    Self::source(op, metadata)
  }

  /// A directory synced from the client under the local name `name`.
  pub fn local(name: &str, opts: &LocalOptions, metadata: OpMetadata) -> Result<Self, StateError> {
    let mut op = SourceOp::new(format!("local://{}", name));
    if !opts.include_patterns.is_empty() {
      op = op.with_attr("local.includepattern", serde_json::to_string(&opts.include_patterns)?);
    }
    if !opts.exclude_patterns.is_empty() {
      op = op.with_attr("local.excludepatterns", serde_json::to_string(&opts.exclude_patterns)?);
    }
    Ok(Self::source(op, metadata))
  }

  pub fn is_scratch(&self) -> bool {
    self.output.is_none()
  }

  pub fn meta(&self) -> &StateMeta {
    &self.meta
  }

  pub fn image_config(&self) -> Option<&ImageConfig> {
    self.meta.image_config.as_ref()
  }

  /// The vertex producing this state, if it is not scratch.
  pub fn vertex(&self) -> Option<&Vertex> {
    self.output.as_ref().map(|edge| edge.vertex.as_ref())
  }

  /// Run a command with this state as the root filesystem.
  pub fn run(&self, exec: Exec) -> ExecState {
    let Exec { args, mounts, metadata } = exec;

    let mut inputs = Inputs::default();
    let mut specs = vec![MountSpec {
      input: inputs.add(self),
      dest: "/".to_string(),
      output: Some(0),
      readonly: false,
    }];
    let mut outputs = vec![("/".to_string(), 0)];

    for mount in &mounts {
      let output = if mount.readonly {
        None
      } else {
        outputs.push((mount.dest.clone(), outputs.len()));
        Some(outputs.len() - 1)
      };
      specs.push(MountSpec {
        input: inputs.add(&mount.source),
        dest: mount.dest.clone(),
        output,
        readonly: mount.readonly,
      });
    }

    let op = Op::Exec(ExecOp {
      meta: ExecMeta {
        args,
        env: self.meta.env.iter().map(|(k, v)| format!("{}={}", k, v)).collect(),
        cwd: self.meta.cwd.clone().unwrap_or_else(|| "/".to_string()),
        user: self.meta.user.clone(),
      },
      mounts: specs,
    });

    ExecState {
      vertex: Arc::new(Vertex {
        op,
        inputs: inputs.0,
        metadata,
      }),
      meta: Arc::clone(&self.meta),
      outputs,
    }
  }

  /// Copy `src_path` from `src` to `dest_path` on top of this state.
  pub fn copy(&self, src: &State, src_path: &str, dest_path: &str, opts: CopyOptions, metadata: OpMetadata) -> Self {
    let mut inputs = Inputs::default();
    let base = inputs.add(self);
    let input = inputs.add(src);
    let action = FileAction::Copy {
      input,
      src: src_path.to_string(),
      dest: dest_path.to_string(),
      contents_only: opts.contents_only,
      create_dest_path: opts.create_dest_path,
    };
    self.with_vertex(Op::File(FileOp { base, action }), inputs, metadata, 0)
  }

  pub fn mkfile(&self, path: &str, mode: u32, data: Vec<u8>, metadata: OpMetadata) -> Self {
    self.file_action(
      FileAction::Mkfile {
        path: path.to_string(),
        mode,
        data,
      },
      metadata,
    )
  }

  pub fn mkdir(&self, path: &str, mode: u32, metadata: OpMetadata) -> Self {
    self.file_action(
      FileAction::Mkdir {
        path: path.to_string(),
        mode,
        make_parents: true,
      },
      metadata,
    )
  }

  fn file_action(&self, action: FileAction, metadata: OpMetadata) -> Self {
    let mut inputs = Inputs::default();
    let base = inputs.add(self);
    self.with_vertex(Op::File(FileOp { base, action }), inputs, metadata, 0)
  }

  /// Layer `states` in order; later states win where paths overlap.
  ///
  /// Scratch states contribute nothing and are dropped. A single remaining
  /// state is returned as is.
  pub fn merge(states: &[State], metadata: OpMetadata) -> State {
    let layers: Vec<&State> = states.iter().filter(|s| !s.is_scratch()).collect();
    match layers.as_slice() {
      [] => State::scratch(),
      [only] => (*only).clone(),
      [first, ..] => {
        let mut inputs = Inputs::default();
        let indexes = layers.iter().filter_map(|s| inputs.add(s)).collect();
        first.with_vertex(Op::Merge(MergeOp { inputs: indexes }), inputs, metadata, 0)
      }
    }
  }

  /// Attach a serialized OCI image configuration to this state.
  ///
  /// The config's environment, working directory and user become the
  /// defaults for commands run on the returned state.
  pub fn with_image_config(&self, data: &[u8]) -> Result<State, StateError> {
    let config = ImageConfig::from_bytes(data)?;

    let mut meta = (*self.meta).clone();
    for (key, value) in config.env_pairs() {
      meta.env.insert(key.to_string(), value.to_string());
    }
    if let Some(dir) = &config.config.working_dir {
      meta.cwd = Some(dir.clone());
    }
    if let Some(user) = &config.config.user {
      meta.user = Some(user.clone());
    }
    meta.image_config = Some(config);

    Ok(State {
      output: self.output.clone(),
      meta: Arc::new(meta),
    })
  }

  pub fn marshal(&self) -> Result<Definition, StateError> {
    definition::marshal(self)
  }

  pub fn from_definition(def: &Definition) -> Result<State, StateError> {
    definition::unmarshal(def)
  }
}

/// Merge `states` into `base`, each placed under `dest`.
///
/// Each state is first copied into an empty filesystem at `dest` (creating
/// parent directories) so that the merge itself only layers whole trees.
pub fn merge_at_path(base: &State, states: &[State], dest: &str, metadata: OpMetadata) -> State {
  let mut layers = Vec::with_capacity(states.len() + 1);
  layers.push(base.clone());
  for state in states {
    if dest.is_empty() || dest == "/" {
      layers.push(state.clone());
    } else {
      layers.push(State::scratch().copy(
        state,
        "/",
        dest,
        CopyOptions::contents_only().create_dest_path(),
        metadata.clone(),
      ));
    }
  }
  State::merge(&layers, metadata)
}
