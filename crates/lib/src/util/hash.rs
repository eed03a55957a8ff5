//! Hashing utilities for build-string differentiation.
//!
//! This module provides:
//! - `BuildHash`: the truncated digest appended to build strings
//! - `Hashable`: JSON-serialize then SHA-256 any serializable value

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::consts::HASH_LENGTH;

pub type HashError = serde_json::Error;

/// A short digest distinguishing configurations that share name, version and build number.
///
/// The hash is a 7-character truncated SHA-256 of the JSON-serialized hash input.
///
/// # Format
///
/// The hash is a lowercase hexadecimal string, e.g., `"3f2a9c1"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildHash(pub String);

impl std::fmt::Display for BuildHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

pub trait Hashable: Serialize {
  fn compute_hash(&self) -> Result<BuildHash, HashError> {
    let serialized = serde_json::to_string(self)?;
    let full = hash_bytes(serialized.as_bytes());
    Ok(BuildHash(full[..HASH_LENGTH].to_string()))
  }
}

/// Full lowercase hex SHA-256 of arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(data);
  hex::encode(hasher.finalize())
}
