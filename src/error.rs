use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single round-trip to the upstream API.
///
/// Carries owned strings rather than the transport error so one outcome can
/// be cloned to every caller waiting on the same in-flight request.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum UpstreamError {
    #[error("upstream request timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream transport error: {0}")]
    Transport(String),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid upstream URL: {0}")]
    InvalidUrl(String),
}

/// Cache store backend failure.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache record serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

#[cfg(feature = "valkey")]
impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Crate-level error type, rendered as an upstream-shaped JSON error envelope.
#[derive(Debug, Clone, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match &self {
            ProxyError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": {
                        "code": 401,
                        "message": message,
                        "status": "UNAUTHORIZED",
                    }
                })),
            )
                .into_response(),
            _ => {
                let status = match &self {
                    ProxyError::MissingParameter(_) => StatusCode::BAD_REQUEST,
                    ProxyError::NotFound(_) => StatusCode::NOT_FOUND,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (
                    status,
                    Json(json!({ "error": { "message": self.to_string() } })),
                )
                    .into_response()
            }
        }
    }
}

/// Result alias used by handlers and the orchestrator.
pub type Result<T> = std::result::Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn upstream_failure_maps_to_500_envelope() {
        let err = ProxyError::from(UpstreamError::Status {
            status: 403,
            body: "quotaExceeded".to_string(),
        });
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(resp).await;
        let message = json["error"]["message"].as_str().unwrap();
        assert!(message.contains("403"));
        assert!(message.contains("quotaExceeded"));
    }

    #[tokio::test]
    async fn missing_parameter_maps_to_400() {
        let resp = ProxyError::MissingParameter("id").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert_eq!(json["error"]["message"], "Required parameter: id");
    }

    #[tokio::test]
    async fn unauthorized_carries_status_marker() {
        let resp = ProxyError::Unauthorized("missing key".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(resp).await;
        assert_eq!(json["error"]["code"], 401);
        assert_eq!(json["error"]["status"], "UNAUTHORIZED");
    }

    #[test]
    fn timeout_message_names_duration() {
        assert_eq!(
            UpstreamError::Timeout(Duration::from_secs(10)).to_string(),
            "upstream request timed out after 10s"
        );
    }
}
