pub mod blob;
pub mod solidity;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest as Sha2Digest, Sha256};
use thiserror::Error;

use crate::domain::RepoIdentity;

pub use blob::{FsBlobStore, MemoryBlobStore};
pub use solidity::SolidityCache;

/// SHA-256 digest of file bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Compute the SHA-256 digest of `data`.
    pub fn compute(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hash);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex().chars().take(12).collect::<String>())
    }
}

impl FromStr for Digest {
    type Err = CacheError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| CacheError::InvalidDigest(s.to_string()))?;
        if bytes.len() != 32 {
            return Err(CacheError::InvalidDigest(s.to_string()));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl Serialize for Digest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors from cache and blob store operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("blob not found: {0:?}")]
    NotFound(PathBuf),

    #[error("invalid digest hex: {0}")]
    InvalidDigest(String),

    #[error("corrupt cache index: {0}")]
    Index(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// Key-value blob persistence. Paths are relative to the store root.
pub trait BlobStore: Send + Sync {
    fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    fn exists(&self, path: &Path) -> bool;

    /// Where a relative path ends up, as reported to callers.
    fn locate(&self, path: &Path) -> PathBuf;

    /// Fail early when the store cannot accept writes.
    fn check_writable(&self) -> Result<()> {
        Ok(())
    }
}

/// One downloaded `.sol` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolidityCacheEntry {
    pub repo_identity: RepoIdentity,
    pub local_path: PathBuf,
    pub content_hash: Digest,
    pub size_bytes: u64,
    pub updated_at: DateTime<Utc>,
}
