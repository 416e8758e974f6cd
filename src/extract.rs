//! Typed, best-effort extraction of metadata from upstream documents.
//!
//! Each substructure (`snippet`, `statistics`, `contentDetails`, envelope
//! fields) is deserialized on its own, so one malformed block only loses
//! its own fields. Extraction never fails: it reports
//! [`Extraction::Partial`] with the fields it could read.

use crate::cache::{SearchCacheEntry, VideoCacheEntry};
use crate::request::SearchRequest;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

/// Outcome of a non-fatal extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction<T> {
    Complete(T),
    Partial { fields: T, reason: String },
}

impl<T> Extraction<T> {
    fn from_issues(fields: T, issues: Vec<String>) -> Self {
        if issues.is_empty() {
            Extraction::Complete(fields)
        } else {
            Extraction::Partial {
                fields,
                reason: issues.join("; "),
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Extraction::Complete(_))
    }

    pub fn fields(&self) -> &T {
        match self {
            Extraction::Complete(fields) | Extraction::Partial { fields, .. } => fields,
        }
    }

    pub fn into_fields(self) -> T {
        match self {
            Extraction::Complete(fields) | Extraction::Partial { fields, .. } => fields,
        }
    }

    /// Log a partial outcome at `warn` and return the fields either way.
    pub fn logged(self, context: &str) -> T {
        if let Extraction::Partial { reason, .. } = &self {
            warn!("Partial metadata extraction for {}: {}", context, reason);
        }
        self.into_fields()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: Option<String>,
    description: Option<String>,
    channel_id: Option<String>,
    channel_title: Option<String>,
    published_at: Option<String>,
    category_id: Option<String>,
    thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnail {
    url: Option<String>,
}

impl Thumbnails {
    /// First available URL by quality: high, then medium, then default.
    fn best_url(self) -> Option<String> {
        [self.high, self.medium, self.default]
            .into_iter()
            .flatten()
            .find_map(|t| t.url)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    #[serde(default)]
    view_count: Value,
    #[serde(default)]
    like_count: Value,
    #[serde(default)]
    comment_count: Value,
    #[serde(default)]
    favorite_count: Value,
}

#[derive(Debug, Default, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchEnvelope {
    next_page_token: Option<String>,
    prev_page_token: Option<String>,
    region_code: Option<String>,
    page_info: Option<PageInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    total_results: Option<u64>,
}

/// Upstream counts arrive as decimal strings; numbers are accepted too.
/// Anything else reads as zero.
fn count(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Deserialize `parent[name]`, recording an issue instead of failing.
fn section<T: DeserializeOwned>(parent: &Value, name: &str, issues: &mut Vec<String>) -> Option<T> {
    let raw = parent.get(name)?;
    if raw.is_null() {
        return None;
    }
    match serde_json::from_value(raw.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            issues.push(format!("malformed {name}: {e}"));
            None
        }
    }
}

fn parse_document(document: &str, issues: &mut Vec<String>) -> Value {
    match serde_json::from_str(document) {
        Ok(root) => root,
        Err(e) => {
            issues.push(format!("document is not valid JSON: {e}"));
            Value::Null
        }
    }
}

fn items(root: &Value, issues: &mut Vec<String>) -> Vec<Value> {
    match root.get("items") {
        Some(Value::Array(items)) => items.clone(),
        Some(_) => {
            issues.push("items is not an array".to_string());
            Vec::new()
        }
        None => Vec::new(),
    }
}

fn keep_some(slot: &mut Option<String>, value: Option<String>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Video statistics, each defaulting to zero when absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoStatistics {
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub favorite_count: u64,
}

/// Fields read from the first item of a `videos` response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
    pub published_at: Option<String>,
    pub category: Option<String>,
    pub thumbnail_url: Option<String>,
    /// `None` when the response carried no statistics block
    pub statistics: Option<VideoStatistics>,
    pub duration: Option<String>,
}

impl VideoMetadata {
    /// Copy every extracted field onto `entry`; unset fields are left alone.
    pub fn apply_to(self, entry: &mut VideoCacheEntry) {
        keep_some(&mut entry.title, self.title);
        keep_some(&mut entry.description, self.description);
        keep_some(&mut entry.channel_id, self.channel_id);
        keep_some(&mut entry.channel_title, self.channel_title);
        keep_some(&mut entry.published_at, self.published_at);
        keep_some(&mut entry.category, self.category);
        keep_some(&mut entry.thumbnail_url, self.thumbnail_url);
        keep_some(&mut entry.duration, self.duration);

        if let Some(stats) = self.statistics {
            entry.view_count = Some(stats.view_count);
            entry.like_count = Some(stats.like_count);
            entry.comment_count = Some(stats.comment_count);
            entry.favorite_count = Some(stats.favorite_count);
        }
    }
}

/// Extract metadata from the first item of a `videos` response.
pub fn extract_video(document: &str) -> Extraction<VideoMetadata> {
    let mut issues = Vec::new();
    let root = parse_document(document, &mut issues);
    let mut meta = VideoMetadata::default();

    let Some(item) = items(&root, &mut issues).into_iter().next() else {
        return Extraction::from_issues(meta, issues);
    };

    if let Some(snippet) = section::<Snippet>(&item, "snippet", &mut issues) {
        meta.title = snippet.title;
        meta.description = snippet.description;
        meta.channel_id = snippet.channel_id;
        meta.channel_title = snippet.channel_title;
        meta.published_at = snippet.published_at;
        meta.category = snippet.category_id;
        meta.thumbnail_url = snippet.thumbnails.and_then(Thumbnails::best_url);
    }

    if let Some(stats) = section::<Statistics>(&item, "statistics", &mut issues) {
        meta.statistics = Some(VideoStatistics {
            view_count: count(&stats.view_count),
            like_count: count(&stats.like_count),
            comment_count: count(&stats.comment_count),
            favorite_count: count(&stats.favorite_count),
        });
    }

    if let Some(details) = section::<ContentDetails>(&item, "contentDetails", &mut issues) {
        meta.duration = details.duration;
    }

    Extraction::from_issues(meta, issues)
}

/// Search metadata persisted alongside a cached search response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchMetadata {
    pub query_text: Option<String>,
    pub order_by: Option<String>,
    pub result_type_filter: Option<String>,
    pub requested_max_results: Option<u32>,
    pub next_page_token: Option<String>,
    pub prev_page_token: Option<String>,
    pub total_results: Option<u64>,
    pub region_code: Option<String>,
}

impl SearchMetadata {
    pub fn apply_to(self, entry: &mut SearchCacheEntry) {
        entry.query_text = self.query_text;
        entry.order_by = self.order_by;
        entry.result_type_filter = self.result_type_filter;
        entry.requested_max_results = self.requested_max_results;
        entry.next_page_token = self.next_page_token;
        entry.prev_page_token = self.prev_page_token;
        entry.total_results = self.total_results;
        entry.region_code = self.region_code;
    }
}

/// Request-side fields come from `request`, paging fields from the response.
pub fn extract_search_meta(document: &str, request: &SearchRequest) -> Extraction<SearchMetadata> {
    let mut issues = Vec::new();

    let requested_max_results = request.requested_max_results();
    if requested_max_results.is_none()
        && let Some(raw) = &request.max_results
    {
        issues.push(format!("maxResults is not a number: {raw}"));
    }

    let mut meta = SearchMetadata {
        query_text: request.q.clone(),
        order_by: request.order.clone(),
        result_type_filter: request.result_type.clone(),
        requested_max_results,
        ..SearchMetadata::default()
    };

    let root = parse_document(document, &mut issues);
    if root.is_object() {
        match serde_json::from_value::<SearchEnvelope>(root) {
            Ok(envelope) => {
                meta.next_page_token = envelope.next_page_token;
                meta.prev_page_token = envelope.prev_page_token;
                meta.region_code = envelope.region_code;
                meta.total_results = envelope.page_info.and_then(|p| p.total_results);
            }
            Err(e) => issues.push(format!("malformed search envelope: {e}")),
        }
    }

    Extraction::from_issues(meta, issues)
}

/// Snippet fields of one video found in a search response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchItem {
    pub video_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
    pub published_at: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl SearchItem {
    /// Copy snippet fields onto `entry`. Statistics and the raw document are
    /// never touched.
    pub fn apply_to(self, entry: &mut VideoCacheEntry) {
        keep_some(&mut entry.title, self.title);
        keep_some(&mut entry.description, self.description);
        keep_some(&mut entry.channel_id, self.channel_id);
        keep_some(&mut entry.channel_title, self.channel_title);
        keep_some(&mut entry.published_at, self.published_at);
        keep_some(&mut entry.thumbnail_url, self.thumbnail_url);
    }
}

/// `id` is `{"videoId": ...}` for search results; a bare string is accepted too.
fn item_video_id(item: &Value) -> Option<String> {
    let id = match item.get("id")? {
        Value::String(s) => s.clone(),
        Value::Object(obj) => obj.get("videoId")?.as_str()?.to_string(),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}

/// Extract every video item from a `search` response. Channel and
/// playlist results are skipped.
pub fn extract_search_items(document: &str) -> Extraction<Vec<SearchItem>> {
    let mut issues = Vec::new();
    let root = parse_document(document, &mut issues);

    let mut found = Vec::new();
    for item in items(&root, &mut issues) {
        let Some(video_id) = item_video_id(&item) else {
            continue;
        };
        let mut search_item = SearchItem {
            video_id,
            ..SearchItem::default()
        };
        if let Some(snippet) = section::<Snippet>(&item, "snippet", &mut issues) {
            search_item.title = snippet.title;
            search_item.description = snippet.description;
            search_item.channel_id = snippet.channel_id;
            search_item.channel_title = snippet.channel_title;
            search_item.published_at = snippet.published_at;
            search_item.thumbnail_url = snippet.thumbnails.and_then(Thumbnails::best_url);
        }
        found.push(search_item);
    }

    Extraction::from_issues(found, issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;

    fn video_doc() -> String {
        json!({
            "kind": "youtube#videoListResponse",
            "items": [{
                "id": "dQw4w9WgXcQ",
                "snippet": {
                    "title": "Never Gonna Give You Up",
                    "description": "Official video",
                    "channelId": "UCuAXFkgsw1L7xaCfnd5JJOw",
                    "channelTitle": "Rick Astley",
                    "publishedAt": "2009-10-25T06:57:33Z",
                    "categoryId": "10",
                    "thumbnails": {
                        "default": { "url": "https://i.ytimg.com/default.jpg" },
                        "medium": { "url": "https://i.ytimg.com/medium.jpg" },
                        "high": { "url": "https://i.ytimg.com/high.jpg" }
                    }
                },
                "statistics": {
                    "viewCount": "1500000000",
                    "likeCount": "17000000",
                    "commentCount": "2300000",
                    "favoriteCount": "0"
                },
                "contentDetails": { "duration": "PT3M33S" }
            }]
        })
        .to_string()
    }

    #[test]
    fn extracts_full_video_metadata() {
        let extraction = extract_video(&video_doc());
        assert!(extraction.is_complete());

        let meta = extraction.into_fields();
        assert_eq!(meta.title.as_deref(), Some("Never Gonna Give You Up"));
        assert_eq!(meta.channel_title.as_deref(), Some("Rick Astley"));
        assert_eq!(meta.category.as_deref(), Some("10"));
        assert_eq!(meta.thumbnail_url.as_deref(), Some("https://i.ytimg.com/high.jpg"));
        assert_eq!(meta.duration.as_deref(), Some("PT3M33S"));

        let stats = meta.statistics.unwrap();
        assert_eq!(stats.view_count, 1_500_000_000);
        assert_eq!(stats.like_count, 17_000_000);
        assert_eq!(stats.comment_count, 2_300_000);
        assert_eq!(stats.favorite_count, 0);
    }

    #[test]
    fn missing_like_count_defaults_to_zero() {
        let doc = json!({
            "items": [{ "statistics": { "viewCount": "42" } }]
        })
        .to_string();

        let extraction = extract_video(&doc);
        assert!(extraction.is_complete());
        let stats = extraction.into_fields().statistics.unwrap();
        assert_eq!(stats.view_count, 42);
        assert_eq!(stats.like_count, 0);
    }

    #[test]
    fn numeric_counts_are_accepted() {
        let doc = json!({
            "items": [{ "statistics": { "viewCount": 7, "likeCount": "not-a-number" } }]
        })
        .to_string();

        let stats = extract_video(&doc).into_fields().statistics.unwrap();
        assert_eq!(stats.view_count, 7);
        assert_eq!(stats.like_count, 0);
    }

    #[test]
    fn thumbnail_priority_falls_back_to_medium_then_default() {
        let doc = json!({
            "items": [{ "snippet": { "thumbnails": {
                "default": { "url": "d.jpg" },
                "medium": { "url": "m.jpg" }
            }}}]
        })
        .to_string();
        assert_eq!(
            extract_video(&doc).into_fields().thumbnail_url.as_deref(),
            Some("m.jpg")
        );

        let doc = json!({
            "items": [{ "snippet": { "thumbnails": { "default": { "url": "d.jpg" } } } }]
        })
        .to_string();
        assert_eq!(
            extract_video(&doc).into_fields().thumbnail_url.as_deref(),
            Some("d.jpg")
        );
    }

    #[test]
    fn malformed_snippet_keeps_other_sections() {
        let doc = json!({
            "items": [{
                "snippet": "not an object",
                "statistics": { "viewCount": "5" },
                "contentDetails": { "duration": "PT1M" }
            }]
        })
        .to_string();

        let extraction = extract_video(&doc);
        assert!(!extraction.is_complete());
        let meta = extraction.into_fields();
        assert!(meta.title.is_none());
        assert_eq!(meta.statistics.unwrap().view_count, 5);
        assert_eq!(meta.duration.as_deref(), Some("PT1M"));
    }

    #[test]
    fn invalid_json_is_partial_not_fatal() {
        let extraction = extract_video("<html>quota page</html>");
        match extraction {
            Extraction::Partial { fields, reason } => {
                assert_eq!(fields, VideoMetadata::default());
                assert!(reason.contains("not valid JSON"));
            }
            Extraction::Complete(_) => panic!("expected partial extraction"),
        }
    }

    #[test]
    fn empty_items_yields_no_fields() {
        let extraction = extract_video(r#"{"items":[]}"#);
        assert!(extraction.is_complete());
        assert_eq!(extraction.into_fields(), VideoMetadata::default());
    }

    #[test]
    fn apply_leaves_unset_fields_alone() {
        let mut entry = VideoCacheEntry::new("abc".into(), Duration::from_secs(60));
        entry.title = Some("Existing".into());
        entry.view_count = Some(10);

        VideoMetadata {
            channel_title: Some("Channel".into()),
            ..VideoMetadata::default()
        }
        .apply_to(&mut entry);

        assert_eq!(entry.title.as_deref(), Some("Existing"));
        assert_eq!(entry.channel_title.as_deref(), Some("Channel"));
        assert_eq!(entry.view_count, Some(10));
    }

    fn search_request(pairs: &[(&str, &str)]) -> SearchRequest {
        SearchRequest::from_query(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        )
    }

    #[test]
    fn search_meta_mixes_request_and_response() {
        let doc = json!({
            "nextPageToken": "CAUQAA",
            "regionCode": "IT",
            "pageInfo": { "totalResults": 1000000, "resultsPerPage": 5 },
            "items": []
        })
        .to_string();
        let request = search_request(&[
            ("q", "spring boot"),
            ("order", "viewCount"),
            ("type", "video"),
            ("maxResults", "5"),
        ]);

        let extraction = extract_search_meta(&doc, &request);
        assert!(extraction.is_complete());
        let meta = extraction.into_fields();
        assert_eq!(meta.query_text.as_deref(), Some("spring boot"));
        assert_eq!(meta.order_by.as_deref(), Some("viewCount"));
        assert_eq!(meta.result_type_filter.as_deref(), Some("video"));
        assert_eq!(meta.requested_max_results, Some(5));
        assert_eq!(meta.next_page_token.as_deref(), Some("CAUQAA"));
        assert_eq!(meta.prev_page_token, None);
        assert_eq!(meta.region_code.as_deref(), Some("IT"));
        assert_eq!(meta.total_results, Some(1_000_000));
    }

    #[test]
    fn unparsable_max_results_is_left_unset() {
        let request = search_request(&[("q", "rust"), ("maxResults", "ten")]);
        let extraction = extract_search_meta(r#"{"items":[]}"#, &request);
        assert!(!extraction.is_complete());
        let meta = extraction.into_fields();
        assert_eq!(meta.requested_max_results, None);
        assert_eq!(meta.query_text.as_deref(), Some("rust"));
    }

    #[test]
    fn search_items_skip_non_video_results() {
        let doc = json!({
            "items": [
                {
                    "id": { "kind": "youtube#video", "videoId": "v1" },
                    "snippet": {
                        "title": "Rust in 100 seconds",
                        "channelTitle": "Fireship",
                        "publishedAt": "2021-09-01T00:00:00Z",
                        "thumbnails": { "default": { "url": "v1.jpg" } }
                    }
                },
                { "id": { "kind": "youtube#channel", "channelId": "UC123" } },
                { "id": "v2" }
            ]
        })
        .to_string();

        let items = extract_search_items(&doc).into_fields();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].video_id, "v1");
        assert_eq!(items[0].title.as_deref(), Some("Rust in 100 seconds"));
        assert_eq!(items[0].thumbnail_url.as_deref(), Some("v1.jpg"));
        assert_eq!(items[1].video_id, "v2");
        assert!(items[1].title.is_none());
    }

    #[test]
    fn search_item_apply_never_touches_statistics() {
        let mut entry = VideoCacheEntry::new("v1".into(), Duration::from_secs(60));
        entry.view_count = Some(99);
        entry.raw_response_document = Some("{}".into());

        SearchItem {
            video_id: "v1".into(),
            title: Some("New title".into()),
            ..SearchItem::default()
        }
        .apply_to(&mut entry);

        assert_eq!(entry.title.as_deref(), Some("New title"));
        assert_eq!(entry.view_count, Some(99));
        assert_eq!(entry.raw_response_document.as_deref(), Some("{}"));
    }
}
