//! Content digests for graph operations.
//!
//! Every vertex in a build graph is identified by a [`Digest`] of its
//! serialized operation and the digests of its inputs. Two structurally equal
//! vertices always hash to the same digest, which is what keeps the execution
//! backend's cache keys stable across runs and machines.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

pub type HashError = serde_json::Error;

/// Prefix of every digest string.
pub const DIGEST_ALGORITHM: &str = "sha256";

/// A content-addressed digest identifying a graph vertex.
///
/// # Format
///
/// `sha256:` followed by 64 lowercase hexadecimal characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Digest(pub String);

impl Digest {
  /// Hex portion of the digest, without the algorithm prefix.
  pub fn hex(&self) -> &str {
    self
      .0
      .strip_prefix(DIGEST_ALGORITHM)
      .and_then(|s| s.strip_prefix(':'))
      .unwrap_or(&self.0)
  }
}

impl std::fmt::Display for Digest {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

pub trait Hashable: Serialize {
  fn compute_hash(&self) -> Result<Digest, HashError> {
    let serialized = serde_json::to_vec(self)?;
    Ok(hash_bytes(&serialized))
  }
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> Digest {
  let mut hasher = Sha256::new();
  hasher.update(data);
  Digest(format!("{}:{}", DIGEST_ALGORITHM, hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Serialize)]
  struct Sample {
    name: String,
    args: Vec<String>,
  }

  impl Hashable for Sample {}

  fn sample(args: &[&str]) -> Sample {
    Sample {
      name: "tar".to_string(),
      args: args.iter().map(|s| s.to_string()).collect(),
    }
  }

  #[test]
  fn hash_is_deterministic() {
    let a = sample(&["-c", "-f"]).compute_hash().unwrap();
    let b = sample(&["-c", "-f"]).compute_hash().unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn hash_changes_when_order_differs() {
    let a = sample(&["-c", "-f"]).compute_hash().unwrap();
    let b = sample(&["-f", "-c"]).compute_hash().unwrap();
    assert_ne!(a, b);
  }

  #[test]
  fn digest_format() {
    let digest = hash_bytes(b"hello");
    assert!(digest.0.starts_with("sha256:"));
    assert_eq!(digest.hex().len(), 64);
    assert_eq!(
      digest.hex(),
      "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    );
  }
}
