use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::extract::extract_pdf;
use super::{response_metadata, FetchOutcome, Fetcher, HttpClient, PdfExtractor, RawDocument, RawPayload};
use crate::domain::{FetchError, SourceKind};

/// Remote PDF, reduced to its text layer.
pub struct PdfFetcher {
    http: Arc<dyn HttpClient>,
    extractor: Arc<dyn PdfExtractor>,
}

impl PdfFetcher {
    pub fn new(http: Arc<dyn HttpClient>, extractor: Arc<dyn PdfExtractor>) -> Self {
        Self { http, extractor }
    }
}

#[async_trait]
impl Fetcher for PdfFetcher {
    fn kind(&self) -> SourceKind {
        SourceKind::Pdf
    }

    async fn try_fetch(&self, origin: &str) -> Result<FetchOutcome, FetchError> {
        let resp = self.http.get(origin).await?.error_for_status(origin)?;
        let mut metadata = response_metadata(&resp);
        metadata.insert("size_bytes".into(), Value::from(resp.body.len()));

        let text = extract_pdf(self.extractor.clone(), resp.body).await?;
        let doc = RawDocument::new(RawPayload::Text(text)).with_metadata(metadata);
        Ok(FetchOutcome::Fetched(doc))
    }
}
