//! Upstream-compatible `search` and `videos` endpoints.

use crate::{
    error::Result,
    metrics,
    proxy::{ProxyResponse, ResponseSource},
    request::{SearchRequest, VideoRequest},
    server::state::AppState,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::time::Instant;
use tracing::info;

/// Names the response source: hit, stale, upstream, reconstructed or empty.
pub const X_CACHE: &str = "x-cache";

const CONTENT_TYPE: &str = "content-type";
const JSON: &str = "application/json";

pub async fn search(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> Response {
    let start = Instant::now();
    let request = SearchRequest::from_query(params);
    info!("Search request: q={:?}", request.q);

    let result = state.proxy.search(&request).await;
    finish("search", start, result)
}

pub async fn videos(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> Response {
    let start = Instant::now();
    let result = match VideoRequest::from_query(params) {
        Ok(request) => {
            info!("Video details request: id={}", request.id);
            state.proxy.video_details(&request).await
        }
        Err(e) => Err(e),
    };
    finish("videos", start, result)
}

fn finish(endpoint: &'static str, start: Instant, result: Result<ProxyResponse>) -> Response {
    let response = match result {
        Ok(document) => document_response(document),
        Err(e) => e.into_response(),
    };
    metrics::record_request(endpoint, response.status().as_u16());
    metrics::record_duration(endpoint, start);
    response
}

/// "No data available" is a 204 with `{}`; everything else the document as-is.
fn document_response(document: ProxyResponse) -> Response {
    let source = document.source.as_str();
    if document.source == ResponseSource::Empty {
        return (
            StatusCode::NO_CONTENT,
            [(CONTENT_TYPE, JSON), (X_CACHE, source)],
            "{}",
        )
            .into_response();
    }

    (
        StatusCode::OK,
        [(CONTENT_TYPE, JSON), (X_CACHE, source)],
        document.body,
    )
        .into_response()
}
