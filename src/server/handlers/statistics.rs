use crate::{
    error::{ProxyError, Result},
    server::state::AppState,
    stats::{self, DEFAULT_TOP_VIEWED_LIMIT, Summary, TopViewed, VideoDetail, VideoRow},
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

pub async fn video(
    Path(video_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<VideoDetail>> {
    info!("Statistics requested for video {}", video_id);

    let entry = state
        .videos
        .get(&video_id)
        .await?
        .ok_or_else(|| ProxyError::NotFound(format!("video {video_id}")))?;
    Ok(Json(VideoDetail::from_entry(&entry, Utc::now())))
}

pub async fn videos(State(state): State<AppState>) -> Result<Json<Vec<VideoRow>>> {
    let entries = state.videos.all().await?;
    info!("Statistics requested for all {} videos", entries.len());
    Ok(Json(stats::video_rows(&entries, Utc::now())))
}

#[derive(Debug, Deserialize)]
pub struct TopViewedParams {
    limit: Option<usize>,
}

pub async fn top_viewed(
    Query(params): Query<TopViewedParams>,
    State(state): State<AppState>,
) -> Result<Json<Vec<TopViewed>>> {
    let limit = params.limit.unwrap_or(DEFAULT_TOP_VIEWED_LIMIT);
    info!("Top {} viewed videos requested", limit);

    let entries = state.videos.all().await?;
    Ok(Json(stats::top_viewed(&entries, limit, Utc::now())))
}

pub async fn summary(State(state): State<AppState>) -> Result<Json<Summary>> {
    let entries = state.videos.all().await?;
    Ok(Json(stats::summary(&entries, Utc::now())))
}
