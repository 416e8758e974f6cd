//! Synthesized search responses for degraded mode.
//!
//! When upstream is unreachable and no cached search exists, a best-effort
//! response is assembled from previously stored video records. The result is
//! explicitly partial: no pagination, counts reflect only what was matched.

use crate::cache::{VideoCacheEntry, VideoStore};
use crate::error::StoreError;
use crate::fingerprint::normalize;
use serde_json::{Value, json};
use tracing::{debug, info};

/// Upstream's own default page size.
pub const DEFAULT_MAX_RESULTS: usize = 5;

pub const SEARCH_LIST_KIND: &str = "youtube#searchListResponse";
pub const VIDEO_LIST_KIND: &str = "youtube#videoListResponse";

/// Envelope etag marking a synthesized response.
pub const RECONSTRUCTED_ETAG: &str = "reconstructed-from-db";
/// Envelope etag marking a "no data available" response.
pub const NO_DATA_ETAG: &str = "no-data-available";

/// Builds search responses from stored video records.
#[derive(Clone)]
pub struct Reconstructor {
    videos: VideoStore,
}

impl Reconstructor {
    pub fn new(videos: VideoStore) -> Self {
        Self { videos }
    }

    /// Reconstruct a search response for `query_text`, or `None` when the
    /// query is blank or nothing matches.
    pub async fn reconstruct(
        &self,
        query_text: Option<&str>,
        max_results: Option<&str>,
    ) -> Result<Option<Value>, StoreError> {
        let Some(query) = query_text.map(normalize).filter(|q| !q.is_empty()) else {
            debug!("No query text, skipping reconstruction");
            return Ok(None);
        };
        let limit = parse_max_results(max_results);

        let records = self.videos.all().await?;
        let matches = find_matches(&records, &query, limit);
        if matches.is_empty() {
            info!("No stored videos match '{}'", query);
            return Ok(None);
        }

        info!(
            "Reconstructed search for '{}' from {} stored videos (partial, no pagination)",
            query,
            matches.len()
        );
        Ok(Some(search_document(&matches)))
    }
}

/// `maxResults` from the request, defaulting when absent or unparsable.
fn parse_max_results(raw: Option<&str>) -> usize {
    raw.and_then(|v| v.trim().parse().ok())
        .unwrap_or(DEFAULT_MAX_RESULTS)
}

fn field_matches(field: Option<&str>, query: &str) -> bool {
    field.is_some_and(|text| normalize(text).contains(query))
}

/// Records whose title, description or channel title contains `query`
/// (already normalized), newest first, at most `limit`.
///
/// The sort is stable: records with equal or missing `published_at` keep
/// the store's order.
pub fn find_matches<'a>(
    records: &'a [VideoCacheEntry],
    query: &str,
    limit: usize,
) -> Vec<&'a VideoCacheEntry> {
    let mut matches: Vec<&VideoCacheEntry> = records
        .iter()
        .filter(|v| {
            field_matches(v.title.as_deref(), query)
                || field_matches(v.description.as_deref(), query)
                || field_matches(v.channel_title.as_deref(), query)
        })
        .collect();

    // ISO 8601 timestamps order correctly as strings
    matches.sort_by(|a, b| {
        let a = a.published_at.as_deref().unwrap_or("");
        let b = b.published_at.as_deref().unwrap_or("");
        b.cmp(a)
    });
    matches.truncate(limit);
    matches
}

/// Upstream-shaped search response for `videos`.
pub fn search_document(videos: &[&VideoCacheEntry]) -> Value {
    let items: Vec<Value> = videos.iter().map(|v| search_item(v)).collect();
    json!({
        "kind": SEARCH_LIST_KIND,
        "etag": RECONSTRUCTED_ETAG,
        "pageInfo": {
            "totalResults": items.len(),
            "resultsPerPage": items.len(),
        },
        "items": items,
    })
}

fn search_item(video: &VideoCacheEntry) -> Value {
    let text = |field: &Option<String>| field.clone().unwrap_or_default();

    let mut snippet = json!({
        "publishedAt": text(&video.published_at),
        "channelId": text(&video.channel_id),
        "title": text(&video.title),
        "description": text(&video.description),
        "channelTitle": text(&video.channel_title),
    });
    if let Some(url) = &video.thumbnail_url {
        snippet["thumbnails"] = json!({
            "default": { "url": url },
            "medium": { "url": url },
            "high": { "url": url },
        });
    }

    json!({
        "kind": "youtube#searchResult",
        "etag": "reconstructed",
        "id": {
            "kind": "youtube#video",
            "videoId": video.video_id,
        },
        "snippet": snippet,
    })
}

/// Schema-valid list response with no items.
pub fn empty_document(kind: &str) -> Value {
    json!({
        "kind": kind,
        "etag": NO_DATA_ETAG,
        "pageInfo": {
            "totalResults": 0,
            "resultsPerPage": 0,
        },
        "items": [],
    })
}
