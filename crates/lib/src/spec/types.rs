use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default permissions for inline files.
pub const DEFAULT_INLINE_FILE_MODE: u32 = 0o644;

/// Errors from loading or validating a spec.
#[derive(Debug, Error)]
pub enum SpecError {
  #[error("failed to parse spec as yaml: {0}")]
  Yaml(#[from] serde_yaml::Error),

  #[error("failed to parse spec as json: {0}")]
  Json(#[from] serde_json::Error),

  #[error("patches declared for unknown source '{0}'")]
  UnknownPatchedSource(String),

  #[error("source '{source_name}' references unknown patch '{patch}'")]
  UnknownPatch { source_name: String, patch: String },

  #[error("source '{0}' lists itself as a patch")]
  SelfPatch(String),
}

/// The root package spec.
///
/// Both maps are [`BTreeMap`]s, so iterating them always yields source names
/// in lexicographic order regardless of declaration order. Graph operations
/// must be emitted in that order to keep backend cache keys stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spec {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub name: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub version: String,
  #[serde(default)]
  pub sources: BTreeMap<String, Source>,
  /// Source name -> ordered patch names. Order is significant.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub patches: BTreeMap<String, Vec<String>>,
}

impl Spec {
  pub fn from_yaml(data: &str) -> Result<Self, SpecError> {
    Ok(serde_yaml::from_str(data)?)
  }

  pub fn from_json(data: &str) -> Result<Self, SpecError> {
    Ok(serde_json::from_str(data)?)
  }

  /// Check that every patch list and every patch name refers to a declared source.
  pub fn validate(&self) -> Result<(), SpecError> {
    for (source_name, patches) in &self.patches {
      if !self.sources.contains_key(source_name) {
        return Err(SpecError::UnknownPatchedSource(source_name.clone()));
      }
      for patch in patches {
        if patch == source_name {
          return Err(SpecError::SelfPatch(source_name.clone()));
        }
        if !self.sources.contains_key(patch) {
          return Err(SpecError::UnknownPatch {
            source_name: source_name.clone(),
            patch: patch.clone(),
          });
        }
      }
    }
    Ok(())
  }

  /// Source names in the order graph operations are emitted.
  pub fn sorted_source_names(&self) -> Vec<&str> {
    self.sources.keys().map(String::as_str).collect()
  }

  /// Ordered patch list of `name`; empty if it has none.
  pub fn patches_for(&self, name: &str) -> &[String] {
    self.patches.get(name).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Names of sources consumed as patches by some other source.
  pub fn patch_sources(&self) -> BTreeSet<&str> {
    self.patches.values().flatten().map(String::as_str).collect()
  }
}

/// A declarative reference to externally fetchable content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
  /// A container image, or a path within one.
  Image {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<String>,
  },
  Git {
    url: String,
    commit: String,
    #[serde(default)]
    keep_git_dir: bool,
  },
  /// A single file downloaded over http(s).
  Http {
    url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    digest: Option<String>,
  },
  /// A directory provided by the client with the build request.
  Context {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    includes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    excludes: Vec<String>,
  },
  /// Content written directly in the spec.
  Inline(InlineSource),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InlineSource {
  File(InlineFile),
  Dir(BTreeMap<String, InlineFile>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineFile {
  pub contents: String,
  #[serde(default = "default_inline_mode")]
  pub permissions: u32,
}

fn default_inline_mode() -> u32 {
  DEFAULT_INLINE_FILE_MODE
}

impl Source {
  /// Identity string used in logs and progress group names.
  pub fn reference(&self) -> String {
    match self {
      Source::Image { reference, .. } => reference.clone(),
      Source::Git { url, commit, .. } => format!("{}#{}", url, commit),
      Source::Http { url, .. } => url.clone(),
      Source::Context { name, .. } => format!(
        "context://{}",
        name.as_deref().unwrap_or(crate::consts::LOCAL_NAME_CONTEXT)
      ),
      Source::Inline(InlineSource::File(_)) => "inline://file".to_string(),
      Source::Inline(InlineSource::Dir(_)) => "inline://dir".to_string(),
    }
  }

  /// Whether the source materializes as a directory rather than a single file.
  pub fn is_dir(&self) -> bool {
    match self {
      Source::Http { .. } | Source::Inline(InlineSource::File(_)) => false,
      Source::Image { .. } | Source::Git { .. } | Source::Context { .. } | Source::Inline(InlineSource::Dir(_)) => true,
    }
  }
}
