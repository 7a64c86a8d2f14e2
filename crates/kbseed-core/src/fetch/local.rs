use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use super::extract::extract_pdf;
use super::{FetchOutcome, Fetcher, Metadata, PdfExtractor, RawDocument, RawPayload, ReadableExtractor, SourceFile};
use crate::cache::SolidityCache;
use crate::domain::{FetchError, RepoIdentity, SourceKind};

/// Repository name used for cache identities of local `.sol` files.
pub const LOCAL_REPOSITORY: &str = "local";

/// Files on the local filesystem, dispatched by extension.
pub struct LocalFileFetcher {
    readable: Arc<dyn ReadableExtractor>,
    pdf: Arc<dyn PdfExtractor>,
    cache: Arc<SolidityCache>,
}

impl LocalFileFetcher {
    pub fn new(
        readable: Arc<dyn ReadableExtractor>,
        pdf: Arc<dyn PdfExtractor>,
        cache: Arc<SolidityCache>,
    ) -> Self {
        Self { readable, pdf, cache }
    }
}

/// Filesystem path for a `file://` URL or a plain path.
pub fn local_path(origin: &str) -> Result<PathBuf, FetchError> {
    let origin = origin.trim();
    if origin.starts_with("file://") {
        let url = Url::parse(origin).map_err(|_| FetchError::InvalidOrigin(origin.to_string()))?;
        return url
            .to_file_path()
            .map_err(|_| FetchError::InvalidOrigin(origin.to_string()));
    }
    Ok(PathBuf::from(origin))
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

#[async_trait]
impl Fetcher for LocalFileFetcher {
    fn kind(&self) -> SourceKind {
        SourceKind::LocalFile
    }

    async fn try_fetch(&self, origin: &str) -> Result<FetchOutcome, FetchError> {
        let path = local_path(origin)?;
        let bytes = tokio::fs::read(&path).await?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut metadata = Metadata::new();
        metadata.insert("path".into(), Value::from(path.display().to_string()));
        metadata.insert("file_name".into(), Value::from(file_name.as_str()));
        metadata.insert("size_bytes".into(), Value::from(bytes.len()));

        let payload = match extension(&path).as_str() {
            "md" | "markdown" => RawPayload::Markdown(String::from_utf8_lossy(&bytes).into_owned()),
            "html" | "htm" => RawPayload::Html(self.readable.extract(&bytes)?),
            "pdf" => RawPayload::Text(extract_pdf(self.pdf.clone(), bytes).await?),
            "sol" => {
                let identity = RepoIdentity::new(LOCAL_REPOSITORY, path.display().to_string());
                let cached = self.cache.put(&identity, &bytes)?;
                metadata.insert(
                    "downloaded_files".into(),
                    Value::Array(vec![Value::from(cached.display().to_string())]),
                );
                RawPayload::Solidity(vec![SourceFile {
                    path: identity.to_string(),
                    code: String::from_utf8_lossy(&bytes).into_owned(),
                }])
            }
            _ => RawPayload::Text(String::from_utf8_lossy(&bytes).into_owned()),
        };

        if !file_name.is_empty() {
            metadata.entry("title".into()).or_insert(Value::from(file_name));
        }
        let doc = RawDocument::new(payload).with_metadata(metadata);
        Ok(FetchOutcome::Fetched(doc))
    }
}
