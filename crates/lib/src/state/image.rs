//! OCI image configuration attached to states.

use serde::{Deserialize, Deserializer, Serialize};

use super::types::StateError;

/// The subset of an OCI image configuration that affects how later
/// operations on a state run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageConfig {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub architecture: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub os: Option<String>,
  #[serde(default)]
  pub config: RuntimeConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RuntimeConfig {
  #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_default")]
  pub env: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub working_dir: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub user: Option<String>,
}

/// Image builders emit `null` for empty lists.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Default + Deserialize<'de>,
{
  Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ImageConfig {
  pub fn from_bytes(data: &[u8]) -> Result<Self, StateError> {
    serde_json::from_slice(data).map_err(|e| StateError::InvalidImageConfig(e.to_string()))
  }

  /// Environment entries split into `(key, value)` pairs.
  ///
  /// Entries without `=` are kept with an empty value.
  pub fn env_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
    self
      .config
      .env
      .iter()
      .map(|entry| entry.split_once('=').unwrap_or((entry.as_str(), "")))
  }
}
