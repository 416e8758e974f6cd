//! Bulk cache maintenance.

use crate::{error::Result, server::state::AppState};
use axum::{Json, extract::State};
use serde_json::{Value, json};
use tracing::{info, warn};

/// Clear both stores.
pub async fn clear_all(State(state): State<AppState>) -> Result<Json<Value>> {
    warn!("Clearing all cached search results and videos");

    let searches = state.searches.clear().await?;
    let videos = state.videos.clear().await?;
    info!("Cache cleared: {} search results, {} videos", searches, videos);

    Ok(Json(json!({
        "message": "Cache cleared",
        "searchResultsDeleted": searches,
        "videosDeleted": videos,
    })))
}

pub async fn clear_searches(State(state): State<AppState>) -> Result<Json<Value>> {
    warn!("Clearing cached search results");

    let deleted = state.searches.clear().await?;
    info!("Search cache cleared: {} records", deleted);

    Ok(Json(json!({
        "message": "Search cache cleared",
        "deleted": deleted,
    })))
}

pub async fn clear_videos(State(state): State<AppState>) -> Result<Json<Value>> {
    warn!("Clearing cached videos");

    let deleted = state.videos.clear().await?;
    info!("Video cache cleared: {} records", deleted);

    Ok(Json(json!({
        "message": "Video cache cleared",
        "deleted": deleted,
    })))
}
