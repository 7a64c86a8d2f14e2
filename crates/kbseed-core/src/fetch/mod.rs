//! Source-specific fetchers.
//!
//! One fetcher per [`SourceKind`], all implementing [`Fetcher`]. A fetcher
//! never lets an error escape: [`Fetcher::fetch`] converts any
//! [`FetchError`] raised by [`Fetcher::try_fetch`] into
//! [`FetchOutcome::Failed`] with the error text preserved.

pub mod extract;
pub mod github;
pub mod gdocs;
pub mod local;
pub mod pdf;
pub mod slite;
pub mod transport;
pub mod web;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::cache::SolidityCache;
use crate::domain::{FetchError, SourceKind};

pub use extract::{PdfExtractor, PdfTextExtractor, Readable, ReadableExtractor, ScraperExtractor};
pub use github::GithubFetcher;
pub use gdocs::GoogleDocFetcher;
pub use local::LocalFileFetcher;
pub use pdf::PdfFetcher;
pub use slite::SliteFetcher;
pub use transport::{HttpClient, HttpResponse, ReqwestHttpClient};
pub use web::{HtmlFetcher, MarkdownFetcher};

/// Source-specific descriptive fields.
pub type Metadata = BTreeMap<String, Value>;

/// One Solidity file delivered by a fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Display identity, e.g. `owner/repo:contracts/A.sol`.
    pub path: String,
    pub code: String,
}

/// Raw content before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    Html(Readable),
    Markdown(String),
    Text(String),
    Solidity(Vec<SourceFile>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub payload: RawPayload,
    pub metadata: Metadata,
}

impl RawDocument {
    pub fn new(payload: RawPayload) -> Self {
        Self {
            payload,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata.extend(metadata);
        self
    }
}

/// Result of fetching one origin.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Fetched(RawDocument),
    /// Expected, recoverable condition such as an access wall.
    Skipped { reason: String, metadata: Metadata },
    Failed { reason: String, metadata: Metadata },
}

impl FetchOutcome {
    pub fn skipped(reason: impl Into<String>, metadata: Metadata) -> Self {
        Self::Skipped {
            reason: reason.into(),
            metadata,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
            metadata: Metadata::new(),
        }
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn try_fetch(&self, origin: &str) -> Result<FetchOutcome, FetchError>;

    /// Fetch `origin`; errors become [`FetchOutcome::Failed`].
    async fn fetch(&self, origin: &str) -> FetchOutcome {
        match self.try_fetch(origin).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(origin = %origin, kind = %self.kind(), error = %err, "fetch failed");
                FetchOutcome::failed(err.to_string())
            }
        }
    }
}

/// Shared collaborators handed to every fetcher.
#[derive(Clone)]
pub struct Collaborators {
    pub http: Arc<dyn HttpClient>,
    pub readable: Arc<dyn ReadableExtractor>,
    pub pdf: Arc<dyn PdfExtractor>,
    pub cache: Arc<SolidityCache>,
}

impl Collaborators {
    /// Production extractors over the given HTTP client and cache.
    pub fn new(http: Arc<dyn HttpClient>, cache: Arc<SolidityCache>) -> Self {
        Self {
            http,
            readable: Arc::new(ScraperExtractor::new()),
            pdf: Arc::new(PdfTextExtractor::new()),
            cache,
        }
    }

    pub fn with_readable(mut self, readable: Arc<dyn ReadableExtractor>) -> Self {
        self.readable = readable;
        self
    }

    pub fn with_pdf(mut self, pdf: Arc<dyn PdfExtractor>) -> Self {
        self.pdf = pdf;
        self
    }
}

/// The closed set of fetchers, selected by source kind.
pub struct FetcherSet {
    html: HtmlFetcher,
    markdown: MarkdownFetcher,
    pdf: PdfFetcher,
    github: GithubFetcher,
    google_doc: GoogleDocFetcher,
    slite: SliteFetcher,
    local: LocalFileFetcher,
}

impl FetcherSet {
    pub fn new(c: &Collaborators) -> Self {
        Self {
            html: HtmlFetcher::new(c.http.clone(), c.readable.clone()),
            markdown: MarkdownFetcher::new(c.http.clone()),
            pdf: PdfFetcher::new(c.http.clone(), c.pdf.clone()),
            github: GithubFetcher::new(c.http.clone(), c.cache.clone()),
            google_doc: GoogleDocFetcher::new(c.http.clone()),
            slite: SliteFetcher::new(c.http.clone(), c.readable.clone()),
            local: LocalFileFetcher::new(c.readable.clone(), c.pdf.clone(), c.cache.clone()),
        }
    }

    /// `None` only for [`SourceKind::Unclassified`].
    pub fn for_kind(&self, kind: SourceKind) -> Option<&dyn Fetcher> {
        match kind {
            SourceKind::Html => Some(&self.html),
            SourceKind::Markdown => Some(&self.markdown),
            SourceKind::Pdf => Some(&self.pdf),
            SourceKind::GithubRepo => Some(&self.github),
            SourceKind::GoogleDoc => Some(&self.google_doc),
            SourceKind::Slite => Some(&self.slite),
            SourceKind::LocalFile => Some(&self.local),
            SourceKind::Unclassified => None,
        }
    }
}

/// Metadata common to every HTTP-backed fetch.
pub(crate) fn response_metadata(resp: &HttpResponse) -> Metadata {
    let mut meta = Metadata::new();
    meta.insert("http_status".into(), Value::from(resp.status));
    if let Some(ct) = &resp.content_type {
        meta.insert("content_type".into(), Value::from(ct.as_str()));
    }
    if !resp.final_url.is_empty() {
        meta.insert("final_url".into(), Value::from(resp.final_url.as_str()));
    }
    meta
}
