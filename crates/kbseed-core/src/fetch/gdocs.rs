use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;
use url::Url;

use super::{response_metadata, FetchOutcome, Fetcher, HttpClient, HttpResponse, Metadata, RawDocument, RawPayload};
use crate::classify::google_doc_id;
use crate::domain::{reasons, FetchError, SourceKind};

/// Google Docs, exported as plain text.
///
/// Permission walls are expected and become `skipped` with reason
/// `auth_required`; every other non-success status is a failure.
pub struct GoogleDocFetcher {
    http: Arc<dyn HttpClient>,
}

impl GoogleDocFetcher {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    pub fn export_url(doc_id: &str) -> String {
        format!("https://docs.google.com/document/d/{doc_id}/export?format=txt")
    }
}

fn requires_auth(resp: &HttpResponse) -> bool {
    if matches!(resp.status, 401 | 403) {
        return true;
    }
    Url::parse(&resp.final_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.eq_ignore_ascii_case("accounts.google.com")))
        .unwrap_or(false)
}

#[async_trait]
impl Fetcher for GoogleDocFetcher {
    fn kind(&self) -> SourceKind {
        SourceKind::GoogleDoc
    }

    async fn try_fetch(&self, origin: &str) -> Result<FetchOutcome, FetchError> {
        let url = Url::parse(origin.trim()).map_err(|_| FetchError::InvalidOrigin(origin.to_string()))?;
        let doc_id = google_doc_id(&url).ok_or_else(|| FetchError::InvalidOrigin(origin.to_string()))?;
        let export = Self::export_url(&doc_id);

        let mut metadata = Metadata::new();
        metadata.insert("doc_id".into(), Value::from(doc_id.as_str()));
        metadata.insert("export_url".into(), Value::from(export.as_str()));

        let resp = self.http.get(&export).await?;
        metadata.extend(response_metadata(&resp));
        if requires_auth(&resp) {
            info!(origin = %origin, status = resp.status, "google doc requires authentication");
            return Ok(FetchOutcome::skipped(reasons::AUTH_REQUIRED, metadata));
        }

        let resp = resp.error_for_status(&export)?;
        let doc = RawDocument::new(RawPayload::Text(resp.text())).with_metadata(metadata);
        Ok(FetchOutcome::Fetched(doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::StaticHttpClient;

    const DOC: &str = "https://docs.google.com/document/d/abc123/edit";

    fn export() -> String {
        GoogleDocFetcher::export_url("abc123")
    }

    #[tokio::test]
    async fn exported_text_is_fetched() {
        let http = StaticHttpClient::new().with_body(&export(), b"Protocol overview".to_vec());
        let fetcher = GoogleDocFetcher::new(Arc::new(http));
        match fetcher.fetch(DOC).await {
            FetchOutcome::Fetched(doc) => {
                assert_eq!(doc.payload, RawPayload::Text("Protocol overview".into()));
                assert_eq!(doc.metadata["doc_id"], "abc123");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn forbidden_is_skipped_auth_required() {
        for status in [401, 403] {
            let http = StaticHttpClient::new().with_status(&export(), status);
            let fetcher = GoogleDocFetcher::new(Arc::new(http));
            match fetcher.fetch(DOC).await {
                FetchOutcome::Skipped { reason, .. } => assert_eq!(reason, "auth_required"),
                other => panic!("unexpected outcome for {status}: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn login_redirect_is_skipped_auth_required() {
        let http = StaticHttpClient::new().with_response(
            &export(),
            HttpResponse::new(200, "<html>Sign in</html>")
                .with_final_url("https://accounts.google.com/ServiceLogin?continue=x"),
        );
        let fetcher = GoogleDocFetcher::new(Arc::new(http));
        assert!(matches!(
            fetcher.fetch(DOC).await,
            FetchOutcome::Skipped { reason, .. } if reason == reasons::AUTH_REQUIRED
        ));
    }

    #[tokio::test]
    async fn server_error_is_failed() {
        let http = StaticHttpClient::new().with_status(&export(), 500);
        let fetcher = GoogleDocFetcher::new(Arc::new(http));
        assert_eq!(fetcher.fetch(DOC).await, FetchOutcome::failed("HTTP 500"));
    }
}
