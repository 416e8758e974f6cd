//! Read-only views over stored video records.

use crate::cache::{CacheRecord, VideoCacheEntry};
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const DEFAULT_TOP_VIEWED_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Counters {
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub comment_count: Option<u64>,
    pub favorite_count: Option<u64>,
}

/// Everything stored about one video.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetail {
    pub video_id: String,
    pub title: Option<String>,
    pub channel_title: Option<String>,
    pub published_at: Option<String>,
    pub duration: Option<String>,
    pub thumbnail_url: Option<String>,
    pub statistics: Counters,
    pub cached: bool,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub expired: bool,
}

impl VideoDetail {
    pub fn from_entry(entry: &VideoCacheEntry, now: DateTime<Utc>) -> Self {
        Self {
            video_id: entry.video_id.clone(),
            title: entry.title.clone(),
            channel_title: entry.channel_title.clone(),
            published_at: entry.published_at.clone(),
            duration: entry.duration.clone(),
            thumbnail_url: entry.thumbnail_url.clone(),
            statistics: Counters {
                view_count: entry.view_count,
                like_count: entry.like_count,
                comment_count: entry.comment_count,
                favorite_count: entry.favorite_count,
            },
            cached: true,
            cached_at: entry.created_at,
            expires_at: entry.expires_at,
            expired: entry.is_expired_at(now),
        }
    }
}

/// One row of the all-videos listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRow {
    pub video_id: String,
    pub title: Option<String>,
    pub channel_title: Option<String>,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub comment_count: Option<u64>,
    pub thumbnail_url: Option<String>,
    pub duration: Option<String>,
    pub cached_at: DateTime<Utc>,
    pub expired: bool,
}

pub fn video_rows(entries: &[VideoCacheEntry], now: DateTime<Utc>) -> Vec<VideoRow> {
    entries
        .iter()
        .map(|v| VideoRow {
            video_id: v.video_id.clone(),
            title: v.title.clone(),
            channel_title: v.channel_title.clone(),
            view_count: v.view_count,
            like_count: v.like_count,
            comment_count: v.comment_count,
            thumbnail_url: v.thumbnail_url.clone(),
            duration: v.duration.clone(),
            cached_at: v.created_at,
            expired: v.is_expired_at(now),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopViewed {
    pub video_id: String,
    pub title: Option<String>,
    pub channel_title: Option<String>,
    pub view_count: u64,
    pub like_count: Option<u64>,
    pub thumbnail_url: Option<String>,
}

/// Unexpired videos with a known view count, most viewed first.
pub fn top_viewed(entries: &[VideoCacheEntry], limit: usize, now: DateTime<Utc>) -> Vec<TopViewed> {
    let mut ranked: Vec<(u64, &VideoCacheEntry)> = entries
        .iter()
        .filter(|v| !v.is_expired_at(now))
        .filter_map(|v| v.view_count.map(|views| (views, v)))
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0));

    ranked
        .into_iter()
        .take(limit)
        .map(|(views, v)| TopViewed {
            video_id: v.video_id.clone(),
            title: v.title.clone(),
            channel_title: v.channel_title.clone(),
            view_count: views,
            like_count: v.like_count,
            thumbnail_url: v.thumbnail_url.clone(),
        })
        .collect()
}

/// Totals over the video store. Engagement sums cover unexpired records only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_cached_videos: u64,
    pub valid_cached_videos: u64,
    pub expired_cached_videos: u64,
    pub total_views: u64,
    pub total_likes: u64,
    pub total_comments: u64,
}

pub fn summary(entries: &[VideoCacheEntry], now: DateTime<Utc>) -> Summary {
    let mut summary = Summary {
        total_cached_videos: entries.len() as u64,
        ..Summary::default()
    };

    for v in entries {
        if v.is_expired_at(now) {
            summary.expired_cached_videos += 1;
            continue;
        }
        summary.valid_cached_videos += 1;
        summary.total_views = summary
            .total_views
            .saturating_add(v.view_count.unwrap_or(0));
        summary.total_likes = summary
            .total_likes
            .saturating_add(v.like_count.unwrap_or(0));
        summary.total_comments = summary
            .total_comments
            .saturating_add(v.comment_count.unwrap_or(0));
    }
    summary
}
