use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use url::Url;

use super::{response_metadata, FetchOutcome, Fetcher, HttpClient, HttpResponse, RawDocument, RawPayload, Readable, ReadableExtractor};
use crate::domain::{reasons, FetchError, SourceKind};

const LOGIN_MARKERS: [&str; 4] = ["log in", "login", "sign in", "sign-in"];

/// Slite pages. Private notes answer with 401/403 or a login page and are
/// recorded as `skipped` with reason `restricted`. If the restriction check
/// itself cannot complete the artifact is `failed`.
pub struct SliteFetcher {
    http: Arc<dyn HttpClient>,
    readable: Arc<dyn ReadableExtractor>,
}

impl SliteFetcher {
    pub fn new(http: Arc<dyn HttpClient>, readable: Arc<dyn ReadableExtractor>) -> Self {
        Self { http, readable }
    }
}

fn landed_on_login(resp: &HttpResponse) -> bool {
    Url::parse(&resp.final_url)
        .map(|u| {
            let path = u.path().to_ascii_lowercase();
            path.contains("/login") || path.contains("/signin") || path.contains("/sign-in")
        })
        .unwrap_or(false)
}

fn is_login_wall(readable: &Readable) -> bool {
    let title = readable.title.as_deref().unwrap_or_default().to_ascii_lowercase();
    let has_marker = LOGIN_MARKERS.iter().any(|m| title.contains(m));
    has_marker && (title.contains("slite") || readable.text.to_ascii_lowercase().contains("slite"))
}

#[async_trait]
impl Fetcher for SliteFetcher {
    fn kind(&self) -> SourceKind {
        SourceKind::Slite
    }

    async fn try_fetch(&self, origin: &str) -> Result<FetchOutcome, FetchError> {
        let resp = self.http.get(origin).await?;
        let metadata = response_metadata(&resp);

        if matches!(resp.status, 401 | 403) || landed_on_login(&resp) {
            info!(origin = %origin, status = resp.status, "slite page is restricted");
            return Ok(FetchOutcome::skipped(reasons::RESTRICTED, metadata));
        }

        let resp = resp.error_for_status(origin)?;
        let readable = self.readable.extract(&resp.body)?;
        if is_login_wall(&readable) {
            info!(origin = %origin, "slite login wall detected");
            return Ok(FetchOutcome::skipped(reasons::RESTRICTED, metadata));
        }

        let doc = RawDocument::new(RawPayload::Html(readable)).with_metadata(metadata);
        Ok(FetchOutcome::Fetched(doc))
    }
}
