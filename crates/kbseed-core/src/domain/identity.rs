//! Stable identity of a cached Solidity file.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// `(repository, path)` pair identifying a Solidity source independently of
/// when it was downloaded.
///
/// Serialized as `"<repository>:<path>"`, e.g. `"owner/repo:contracts/Vault.sol"`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoIdentity {
    repository: String,
    path: String,
}

impl RepoIdentity {
    pub fn new(repository: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            repository: repository.into().trim_matches('/').to_string(),
            path: path.trim_start_matches('/').to_string(),
        }
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// File name component of the path.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

impl fmt::Display for RepoIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.path)
    }
}

impl fmt::Debug for RepoIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RepoIdentity({})", self)
    }
}

impl FromStr for RepoIdentity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((repo, path)) if !repo.is_empty() && !path.is_empty() => {
                Ok(Self::new(repo, path))
            }
            _ => Err(format!("invalid repo identity: {s}")),
        }
    }
}

impl Serialize for RepoIdentity {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RepoIdentity {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_fromstr_roundtrip() {
        let id = RepoIdentity::new("owner/repo", "contracts/Vault.sol");
        let s = id.to_string();
        assert_eq!(s, "owner/repo:contracts/Vault.sol");
        let parsed: RepoIdentity = s.parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn normalizes_slashes() {
        let id = RepoIdentity::new("/owner/repo/", "/src/A.sol");
        assert_eq!(id.repository(), "owner/repo");
        assert_eq!(id.path(), "src/A.sol");
        assert_eq!(id.file_name(), "A.sol");
    }

    #[test]
    fn fromstr_rejects_missing_path() {
        assert!("owner/repo".parse::<RepoIdentity>().is_err());
        assert!("owner/repo:".parse::<RepoIdentity>().is_err());
    }
}
