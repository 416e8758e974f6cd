use crate::server::state::AppState;
use axum::{Json, extract::State};
use serde_json::{Value, json};

pub const SERVICE_NAME: &str = "YouTube Proxy API";

/// Static status document; reports whether upstream is reachable at all.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let upstream = if state.proxy.upstream_configured() {
        "live"
    } else {
        "local-only"
    };

    Json(json!({
        "status": "UP",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "upstream": upstream,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}
