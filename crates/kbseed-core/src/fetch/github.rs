//! GitHub repository fetcher.
//!
//! Lists the repository tree through the REST API, keeps `.sol` blobs under
//! the requested subpath and downloads each one into the [`SolidityCache`].
//! A single failed download is logged and counted; it does not fail the
//! artifact. A repository with no Solidity files is a successful, empty
//! fetch.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use super::{FetchOutcome, Fetcher, HttpClient, Metadata, RawDocument, RawPayload, SourceFile};
use crate::cache::{CacheError, SolidityCache};
use crate::classify::GithubTarget;
use crate::domain::{FetchError, RepoIdentity, SourceKind};

pub const GITHUB_API: &str = "https://api.github.com";
pub const GITHUB_RAW: &str = "https://raw.githubusercontent.com";
const FALLBACK_BRANCH: &str = "main";

#[derive(Debug, Deserialize)]
struct RepoInfo {
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitTree {
    #[serde(default)]
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

pub struct GithubFetcher {
    http: Arc<dyn HttpClient>,
    cache: Arc<SolidityCache>,
}

impl GithubFetcher {
    pub fn new(http: Arc<dyn HttpClient>, cache: Arc<SolidityCache>) -> Self {
        Self { http, cache }
    }

    /// Repository default branch, or `main` when the API cannot tell us.
    async fn default_branch(&self, target: &GithubTarget) -> String {
        let url = format!("{GITHUB_API}/repos/{}/{}", target.owner, target.repo);
        let branch = match self.http.get(&url).await {
            Ok(resp) if resp.is_success() => resp
                .json::<RepoInfo>()
                .ok()
                .and_then(|info| info.default_branch),
            Ok(resp) => {
                debug!(url = %url, status = resp.status, "repository lookup failed");
                None
            }
            Err(e) => {
                debug!(url = %url, error = %e, "repository lookup failed");
                None
            }
        };
        branch.unwrap_or_else(|| FALLBACK_BRANCH.to_string())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        Ok(self.http.get(url).await?.error_for_status(url)?.body)
    }
}

fn under_subpath(path: &str, subpath: &str) -> bool {
    subpath.is_empty()
        || path == subpath
        || path
            .strip_prefix(subpath)
            .map(|rest| rest.starts_with('/'))
            .unwrap_or(false)
}

fn raw_url(target: &GithubTarget, branch: &str, path: &str) -> String {
    let candidate = format!("{GITHUB_RAW}/{}/{}/{branch}/{path}", target.owner, target.repo);
    // Url::parse percent-encodes spaces and other unsafe path characters.
    Url::parse(&candidate)
        .map(|u| u.to_string())
        .unwrap_or(candidate)
}

#[async_trait]
impl Fetcher for GithubFetcher {
    fn kind(&self) -> SourceKind {
        SourceKind::GithubRepo
    }

    async fn try_fetch(&self, origin: &str) -> Result<FetchOutcome, FetchError> {
        let target = GithubTarget::parse(origin)
            .ok_or_else(|| FetchError::InvalidOrigin(origin.to_string()))?;
        let branch = match &target.branch {
            Some(b) => b.clone(),
            None => self.default_branch(&target).await,
        };

        let tree_url = format!(
            "{GITHUB_API}/repos/{}/{}/git/trees/{branch}?recursive=1",
            target.owner, target.repo
        );
        let tree: GitTree = self
            .http
            .get(&tree_url)
            .await?
            .error_for_status(&tree_url)?
            .json()?;
        if tree.truncated {
            warn!(origin = %origin, "repository tree truncated by the API; listing is partial");
        }

        let sol_paths: Vec<String> = tree
            .tree
            .into_iter()
            .filter(|e| e.kind == "blob" && e.path.ends_with(".sol"))
            .filter(|e| under_subpath(&e.path, &target.subpath))
            .map(|e| e.path)
            .collect();
        debug!(origin = %origin, branch = %branch, count = sol_paths.len(), "solidity files listed");

        let repository = target.repository();
        let mut fetched: Vec<(RepoIdentity, Vec<u8>)> = Vec::with_capacity(sol_paths.len());
        let mut download_errors = 0usize;

        for path in &sol_paths {
            let url = raw_url(&target, &branch, path);
            match self.download(&url).await {
                Ok(bytes) => fetched.push((RepoIdentity::new(repository.as_str(), path.as_str()), bytes)),
                Err(e) => {
                    warn!(url = %url, error = %e, "solidity download failed");
                    download_errors += 1;
                }
            }
        }

        // Blob and index writes are blocking file I/O.
        let cache = Arc::clone(&self.cache);
        let (fetched, local_paths) = tokio::task::spawn_blocking(move || {
            let paths = cache.put_many(&fetched);
            (fetched, paths)
        })
        .await
        .map_err(|e| {
            FetchError::Cache(CacheError::Io(std::io::Error::other(format!("cache worker: {e}"))))
        })?;
        let local_paths = local_paths?;

        let downloaded: Vec<Value> = local_paths
            .iter()
            .map(|p| Value::from(p.display().to_string()))
            .collect();
        let files: Vec<SourceFile> = fetched
            .into_iter()
            .map(|(identity, bytes)| SourceFile {
                path: identity.to_string(),
                code: String::from_utf8_lossy(&bytes).into_owned(),
            })
            .collect();

        info!(
            origin = %origin,
            listed = sol_paths.len(),
            downloaded = files.len(),
            errors = download_errors,
            "github repository ingested"
        );

        let mut metadata = Metadata::new();
        metadata.insert("owner".into(), Value::from(target.owner.as_str()));
        metadata.insert("repo".into(), Value::from(target.repo.as_str()));
        metadata.insert("branch".into(), Value::from(branch.as_str()));
        metadata.insert("subpath".into(), Value::from(target.subpath.as_str()));
        metadata.insert("sol_files".into(), Value::from(sol_paths.len()));
        metadata.insert("downloaded_files".into(), Value::Array(downloaded));
        metadata.insert("download_errors".into(), Value::from(download_errors));
        metadata.insert("title".into(), Value::from(format!("{repository}@{branch}")));

        let doc = RawDocument::new(RawPayload::Solidity(files)).with_metadata(metadata);
        Ok(FetchOutcome::Fetched(doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryBlobStore;
    use crate::fakes::StaticHttpClient;
    use serde_json::json;

    fn cache() -> Arc<SolidityCache> {
        Arc::new(SolidityCache::open(Arc::new(MemoryBlobStore::new())).unwrap())
    }

    fn tree(paths: &[(&str, &str)]) -> Value {
        json!({
            "tree": paths.iter().map(|(p, t)| json!({"path": p, "type": t})).collect::<Vec<_>>(),
            "truncated": false
        })
    }

    #[tokio::test]
    async fn downloads_sol_files_under_subpath() {
        let http = StaticHttpClient::new()
            .with_json(&format!("{GITHUB_API}/repos/o/r"), &json!({"default_branch": "dev"}))
            .with_json(
                &format!("{GITHUB_API}/repos/o/r/git/trees/dev?recursive=1"),
                &tree(&[
                    ("contracts", "tree"),
                    ("contracts/A.sol", "blob"),
                    ("contracts/lib/B.sol", "blob"),
                    ("contractsX/C.sol", "blob"),
                    ("README.md", "blob"),
                ]),
            )
            .with_body(&format!("{GITHUB_RAW}/o/r/dev/contracts/A.sol"), b"contract A {}".to_vec())
            .with_body(&format!("{GITHUB_RAW}/o/r/dev/contracts/lib/B.sol"), b"contract B {}".to_vec());
        let cache = cache();
        let fetcher = GithubFetcher::new(Arc::new(http), cache.clone());

        let outcome = fetcher.fetch("https://github.com/o/r/tree/dev/contracts").await;
        let FetchOutcome::Fetched(doc) = outcome else {
            panic!("expected fetched, got {outcome:?}");
        };
        let RawPayload::Solidity(files) = &doc.payload else {
            panic!("expected solidity payload");
        };
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "o/r:contracts/A.sol");
        assert_eq!(files[1].code, "contract B {}");
        assert_eq!(doc.metadata["branch"], "dev");
        assert_eq!(doc.metadata["sol_files"], 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn repository_is_cached_with_one_index_write() {
        let mut http = StaticHttpClient::new().with_json(
            &format!("{GITHUB_API}/repos/o/r/git/trees/main?recursive=1"),
            &tree(&[("A.sol", "blob"), ("B.sol", "blob"), ("C.sol", "blob")]),
        );
        for name in ["A", "B", "C"] {
            http = http.with_body(
                &format!("{GITHUB_RAW}/o/r/main/{name}.sol"),
                format!("contract {name} {{}}").into_bytes(),
            );
        }
        let store = Arc::new(MemoryBlobStore::new());
        let cache = Arc::new(SolidityCache::open(store.clone()).unwrap());
        let fetcher = GithubFetcher::new(Arc::new(http), cache.clone());

        let FetchOutcome::Fetched(doc) = fetcher.fetch("https://github.com/o/r/tree/main").await else {
            panic!("expected fetched");
        };
        assert_eq!(doc.metadata["downloaded_files"].as_array().unwrap().len(), 3);
        assert_eq!(store.write_count(), 4, "three blobs, one index");
        assert_eq!(cache.len(), 3);
    }

    #[tokio::test]
    async fn zero_sol_files_is_ok_and_empty() {
        let http = StaticHttpClient::new()
            .with_json(&format!("{GITHUB_API}/repos/o/docs"), &json!({"default_branch": "main"}))
            .with_json(
                &format!("{GITHUB_API}/repos/o/docs/git/trees/main?recursive=1"),
                &tree(&[("README.md", "blob")]),
            );
        let fetcher = GithubFetcher::new(Arc::new(http), cache());

        match fetcher.fetch("https://github.com/o/docs").await {
            FetchOutcome::Fetched(doc) => {
                assert_eq!(doc.payload, RawPayload::Solidity(Vec::new()));
                assert_eq!(doc.metadata["sol_files"], 0);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_download_is_counted_not_fatal() {
        let http = StaticHttpClient::new()
            .with_json(
                &format!("{GITHUB_API}/repos/o/r/git/trees/main?recursive=1"),
                &tree(&[("A.sol", "blob"), ("B.sol", "blob")]),
            )
            .with_body(&format!("{GITHUB_RAW}/o/r/main/A.sol"), b"contract A {}".to_vec());
        // No repo info route: the default branch falls back to `main`.
        let fetcher = GithubFetcher::new(Arc::new(http), cache());

        match fetcher.fetch("https://github.com/o/r").await {
            FetchOutcome::Fetched(doc) => {
                assert_eq!(doc.metadata["download_errors"], 1);
                assert_eq!(doc.metadata["downloaded_files"].as_array().unwrap().len(), 1);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn encoded_subpath_matches_tree_entries() {
        let http = StaticHttpClient::new()
            .with_json(
                &format!("{GITHUB_API}/repos/o/r/git/trees/main?recursive=1"),
                &tree(&[("My Contracts/A.sol", "blob"), ("Other/B.sol", "blob")]),
            )
            .with_body(&format!("{GITHUB_RAW}/o/r/main/My%20Contracts/A.sol"), b"contract A {}".to_vec());
        let cache = cache();
        let fetcher = GithubFetcher::new(Arc::new(http), cache.clone());

        match fetcher.fetch("https://github.com/o/r/tree/main/My%20Contracts").await {
            FetchOutcome::Fetched(doc) => {
                assert_eq!(doc.metadata["subpath"], "My Contracts");
                assert_eq!(doc.metadata["sol_files"], 1);
                assert_eq!(doc.metadata["download_errors"], 0);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn tree_listing_failure_is_failed() {
        let http = StaticHttpClient::new().with_status(
            &format!("{GITHUB_API}/repos/o/gone/git/trees/main?recursive=1"),
            404,
        );
        let fetcher = GithubFetcher::new(Arc::new(http), cache());
        assert_eq!(
            fetcher.fetch("https://github.com/o/gone/tree/main").await,
            FetchOutcome::failed("HTTP 404")
        );
    }

    #[test]
    fn subpath_matching_respects_segments() {
        assert!(under_subpath("a/b.sol", ""));
        assert!(under_subpath("contracts/A.sol", "contracts"));
        assert!(under_subpath("contracts/A.sol", "contracts/A.sol"));
        assert!(!under_subpath("contractsX/A.sol", "contracts"));
    }

    #[test]
    fn raw_url_encodes_spaces() {
        let t = GithubTarget::parse("https://github.com/o/r").unwrap();
        assert_eq!(
            raw_url(&t, "main", "My Contracts/A.sol"),
            "https://raw.githubusercontent.com/o/r/main/My%20Contracts/A.sol"
        );
    }
}
