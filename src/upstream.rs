//! Round-trips to the upstream video API.
//!
//! Every call is a single attempt bounded by a timeout. Failed calls are
//! never retried.

use crate::error::UpstreamError;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// Longest upstream error body kept in an error message.
const MAX_ERROR_BODY_CHARS: usize = 1024;

/// The upstream operations the proxy relies on: send a request, get the raw
/// document or a failure.
#[async_trait]
pub trait UpstreamGateway: Send + Sync {
    async fn search(&self, params: &BTreeMap<String, String>) -> Result<String, UpstreamError>;

    async fn video_details(
        &self,
        video_id: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<String, UpstreamError>;
}

/// HTTP gateway appending the configured credential to every call.
#[derive(Clone, Debug)]
pub struct HttpUpstream {
    client: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl HttpUpstream {
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout,
        })
    }

    fn endpoint<'a>(
        &self,
        path: &str,
        params: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Url, UpstreamError> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|e| UpstreamError::InvalidUrl(format!("{}/{}: {}", self.base_url, path, e)))?;
        url.query_pairs_mut()
            .extend_pairs(params)
            .append_pair("key", &self.api_key);
        Ok(url)
    }

    fn classify(&self, e: reqwest::Error) -> UpstreamError {
        if e.is_timeout() {
            UpstreamError::Timeout(self.timeout)
        } else {
            // Strip the URL: it carries the credential
            UpstreamError::Transport(e.without_url().to_string())
        }
    }

    /// One GET, no retry. Non-2xx responses become [`UpstreamError::Status`].
    async fn fetch_once(&self, operation: &str, url: Url) -> Result<String, UpstreamError> {
        info!("Calling upstream {} ({})", operation, url.path());

        let response = self.client.get(url).send().await.map_err(|e| {
            let err = self.classify(e);
            warn!("Upstream {} failed: {}", operation, err);
            err
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            warn!("Upstream {} returned {}", operation, status);
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl UpstreamGateway for HttpUpstream {
    async fn search(&self, params: &BTreeMap<String, String>) -> Result<String, UpstreamError> {
        let url = self.endpoint(
            "search",
            params.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        )?;
        self.fetch_once("search", url).await
    }

    async fn video_details(
        &self,
        video_id: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<String, UpstreamError> {
        let pairs = std::iter::once(("id", video_id))
            .chain(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        let url = self.endpoint("videos", pairs)?;
        self.fetch_once("videos", url).await
    }
}
