//! In-memory fakes for the collaborator traits (testing only).
//!
//! `StaticHttpClient` answers from a URL table, `FailingExtractor` always
//! errors, `RecordingSink` keeps what the orchestrator hands it.
//! [`MemoryBlobStore`] lives in the cache module and is re-exported here.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{Artifact, FetchError, KbseedError, Result};
use crate::fetch::{HttpClient, HttpResponse, Readable, ReadableExtractor};
use crate::ingest::ArtifactSink;

pub use crate::cache::MemoryBlobStore;

#[derive(Debug, Clone)]
enum Route {
    Response(HttpResponse),
    TransportError(String),
}

/// HTTP client that serves canned responses. Unknown URLs get a 404.
#[derive(Debug, Default)]
pub struct StaticHttpClient {
    routes: HashMap<String, Route>,
    delays: HashMap<String, Duration>,
    requests: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StaticHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, url: &str, mut response: HttpResponse) -> Self {
        if response.final_url.is_empty() {
            response.final_url = url.to_string();
        }
        self.routes.insert(url.to_string(), Route::Response(response));
        self
    }

    pub fn with_body(self, url: &str, body: Vec<u8>) -> Self {
        self.with_response(url, HttpResponse::new(200, body))
    }

    pub fn with_html(self, url: &str, html: &str) -> Self {
        self.with_response(url, HttpResponse::new(200, html).with_content_type("text/html; charset=utf-8"))
    }

    pub fn with_json(self, url: &str, value: &serde_json::Value) -> Self {
        self.with_response(
            url,
            HttpResponse::new(200, value.to_string()).with_content_type("application/json"),
        )
    }

    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.with_response(url, HttpResponse::new(status, Vec::new()))
    }

    pub fn with_transport_error(mut self, url: &str, message: &str) -> Self {
        self.routes
            .insert(url.to_string(), Route::TransportError(message.to_string()));
        self
    }

    /// Hold the response for `delay` before answering.
    pub fn with_delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    /// URLs requested so far, in request order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Highest number of requests that were in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl HttpClient for StaticHttpClient {
    async fn get(&self, url: &str) -> std::result::Result<HttpResponse, FetchError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(url.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }

        match self.routes.get(url) {
            Some(Route::Response(resp)) => Ok(resp.clone()),
            Some(Route::TransportError(message)) => Err(FetchError::transport(url, message)),
            None => Ok(HttpResponse::new(404, Vec::new()).with_final_url(url)),
        }
    }
}

/// Readable-text extractor that always fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingExtractor;

impl ReadableExtractor for FailingExtractor {
    fn extract(&self, _html: &[u8]) -> std::result::Result<Readable, FetchError> {
        Err(FetchError::Extraction("extractor unavailable".to_string()))
    }
}

/// Sink that records every artifact it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<(usize, Artifact)>>,
}

impl RecordingSink {
    /// Input indices in completion order.
    pub fn indices(&self) -> Vec<usize> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(i, _)| *i)
            .collect()
    }

    pub fn artifacts(&self) -> Vec<Artifact> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, a)| a.clone())
            .collect()
    }
}

impl ArtifactSink for RecordingSink {
    fn record(&self, index: usize, artifact: &Artifact) -> Result<()> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((index, artifact.clone()));
        Ok(())
    }
}

/// Sink whose writes always fail, for fatal-path tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingSink;

impl ArtifactSink for FailingSink {
    fn record(&self, index: usize, _artifact: &Artifact) -> Result<()> {
        Err(KbseedError::Persist {
            what: format!("artifact {index}"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_client_routes_and_logs() {
        let http = StaticHttpClient::new()
            .with_body("https://a.test", b"A".to_vec())
            .with_transport_error("https://b.test", "boom");

        assert_eq!(http.get("https://a.test").await.unwrap().body, b"A");
        assert!(http.get("https://b.test").await.is_err());
        assert_eq!(http.get("https://c.test").await.unwrap().status, 404);
        assert_eq!(
            http.requests(),
            vec!["https://a.test", "https://b.test", "https://c.test"]
        );
        assert_eq!(http.max_in_flight(), 1);
    }

    #[test]
    fn failing_sink_is_persist_error() {
        let a = Artifact::failed(crate::domain::SourceKind::Html, "x", "y", Default::default());
        assert!(matches!(FailingSink.record(0, &a), Err(KbseedError::Persist { .. })));
    }
}
