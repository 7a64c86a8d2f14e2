//! HTTP collaborator used by every network fetcher.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::domain::FetchError;

/// A fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    /// URL after redirects.
    pub final_url: String,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: None,
            final_url: String::new(),
            body: body.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_final_url(mut self, url: impl Into<String>) -> Self {
        self.final_url = url.into();
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        serde_json::from_slice(&self.body).map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// Fail with [`FetchError::Status`] unless the status is 2xx.
    pub fn error_for_status(self, url: &str) -> Result<Self, FetchError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(FetchError::Status {
                status: self.status,
                url: url.to_string(),
            })
        }
    }
}

/// `get(url) -> bytes`, failing only on transport errors.
///
/// Non-2xx statuses are returned as responses; fetchers decide what they mean.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError>;
}

/// `reqwest`-backed client.
pub struct ReqwestHttpClient {
    client: reqwest::Client,
    github_token: Option<String>,
}

impl ReqwestHttpClient {
    pub fn new(
        timeout: Duration,
        user_agent: &str,
        github_token: Option<String>,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError::transport("<client>", e))?;

        Ok(Self {
            client,
            github_token,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, FetchError> {
        Self::new(
            Duration::from_secs(config.http_timeout_secs),
            &config.user_agent,
            config.github_token.clone(),
        )
    }

    fn wants_github_auth(url: &str) -> bool {
        url.starts_with("https://api.github.com/")
            || url.starts_with("https://raw.githubusercontent.com/")
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        debug!(url = %url, "HTTP GET");
        let mut request = self.client.get(url);
        if let Some(token) = &self.github_token {
            if Self::wants_github_auth(url) {
                request = request.bearer_auth(token);
            }
        }

        let response = request.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "HTTP request failed");
            FetchError::transport(url, e)
        })?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::transport(url, e))?
            .to_vec();

        Ok(HttpResponse {
            status,
            content_type,
            final_url,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_for_status_maps_non_success() {
        let ok = HttpResponse::new(200, "hi").error_for_status("https://x.test");
        assert!(ok.is_ok());

        let err = HttpResponse::new(404, "")
            .error_for_status("https://x.test")
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert_eq!(err.to_string(), "HTTP 404");
    }

    #[test]
    fn json_decode_error_is_fetch_error() {
        let resp = HttpResponse::new(200, "not json");
        let err = resp.json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn github_auth_only_for_github_hosts() {
        assert!(ReqwestHttpClient::wants_github_auth(
            "https://api.github.com/repos/o/r"
        ));
        assert!(ReqwestHttpClient::wants_github_auth(
            "https://raw.githubusercontent.com/o/r/main/A.sol"
        ));
        assert!(!ReqwestHttpClient::wants_github_auth("https://example.com/"));
    }
}
