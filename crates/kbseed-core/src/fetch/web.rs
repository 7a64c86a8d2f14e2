use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{
    response_metadata, FetchOutcome, Fetcher, HttpClient, RawDocument, RawPayload,
    ReadableExtractor,
};
use crate::domain::{FetchError, SourceKind};

fn is_markdown_type(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| {
            let ct = ct.to_ascii_lowercase();
            ct.starts_with("text/markdown") || ct.starts_with("text/x-markdown")
        })
        .unwrap_or(false)
}

/// Generic web page: readable text plus `<pre>` blocks.
pub struct HtmlFetcher {
    http: Arc<dyn HttpClient>,
    readable: Arc<dyn ReadableExtractor>,
}

impl HtmlFetcher {
    pub fn new(http: Arc<dyn HttpClient>, readable: Arc<dyn ReadableExtractor>) -> Self {
        Self { http, readable }
    }
}

#[async_trait]
impl Fetcher for HtmlFetcher {
    fn kind(&self) -> SourceKind {
        SourceKind::Html
    }

    async fn try_fetch(&self, origin: &str) -> Result<FetchOutcome, FetchError> {
        let resp = self.http.get(origin).await?.error_for_status(origin)?;
        let metadata = response_metadata(&resp);

        if is_markdown_type(resp.content_type.as_deref()) {
            debug!(origin = %origin, "served as markdown");
            let doc = RawDocument::new(RawPayload::Markdown(resp.text())).with_metadata(metadata);
            return Ok(FetchOutcome::Fetched(doc));
        }

        let readable = self.readable.extract(&resp.body)?;
        let doc = RawDocument::new(RawPayload::Html(readable)).with_metadata(metadata);
        Ok(FetchOutcome::Fetched(doc))
    }
}

/// Raw Markdown file.
pub struct MarkdownFetcher {
    http: Arc<dyn HttpClient>,
}

impl MarkdownFetcher {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Fetcher for MarkdownFetcher {
    fn kind(&self) -> SourceKind {
        SourceKind::Markdown
    }

    async fn try_fetch(&self, origin: &str) -> Result<FetchOutcome, FetchError> {
        let resp = self.http.get(origin).await?.error_for_status(origin)?;
        let metadata = response_metadata(&resp);
        let doc = RawDocument::new(RawPayload::Markdown(resp.text())).with_metadata(metadata);
        Ok(FetchOutcome::Fetched(doc))
    }
}
