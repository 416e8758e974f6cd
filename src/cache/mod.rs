//! Persistent cache records and the store contract the proxy depends on.
//!
//! Two stores are used: search results keyed by request fingerprint, and
//! video records keyed by video id. Records are never evicted on expiry;
//! an expired record is "stale" and still usable in degraded mode.

mod memory;
#[cfg(feature = "valkey")]
mod valkey;

pub use memory::MemoryStore;
#[cfg(feature = "valkey")]
pub use valkey::ValkeyStore;

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::sync::Arc;
use std::time::Duration;

/// A record stored under a unique key with a store-assigned identity.
pub trait CacheRecord: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Store namespace, used by backends that share one keyspace.
    const KIND: &'static str;

    fn cache_key(&self) -> &str;
    fn id(&self) -> Option<u64>;
    fn set_id(&mut self, id: u64);
    fn expires_at(&self) -> DateTime<Utc>;

    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at()
    }

    fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Key/value persistence for one record type.
///
/// `upsert` keeps the identity of an existing record under the same key and
/// assigns a fresh one otherwise. Concurrent upserts of one key are
/// last-write-wins.
#[async_trait]
pub trait CacheStore<E: CacheRecord>: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<E>, StoreError>;

    /// Insert or replace, returning the record as stored (with its id).
    async fn upsert(&self, entry: E) -> Result<E, StoreError>;

    /// Every record, in creation order.
    async fn all(&self) -> Result<Vec<E>, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;

    /// Remove every record, returning how many were deleted.
    async fn clear(&self) -> Result<u64, StoreError>;
}

pub type SearchStore = Arc<dyn CacheStore<SearchCacheEntry>>;
pub type VideoStore = Arc<dyn CacheStore<VideoCacheEntry>>;

/// Convert a configured lifetime into a chrono delta, never shorter than one second.
fn lifetime(ttl: Duration) -> TimeDelta {
    TimeDelta::from_std(ttl)
        .unwrap_or_else(|_| TimeDelta::hours(24))
        .max(TimeDelta::seconds(1))
}

/// Cached upstream search response plus the metadata extracted from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCacheEntry {
    pub id: Option<u64>,
    /// Request fingerprint
    pub key: String,
    pub raw_response_document: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub query_text: Option<String>,
    pub order_by: Option<String>,
    pub result_type_filter: Option<String>,
    pub requested_max_results: Option<u32>,
    pub next_page_token: Option<String>,
    pub prev_page_token: Option<String>,
    pub total_results: Option<u64>,
    pub region_code: Option<String>,
}

impl SearchCacheEntry {
    pub fn new(key: String, raw_response_document: String, ttl: Duration) -> Self {
        Self::created_at(key, raw_response_document, ttl, Utc::now())
    }

    pub fn created_at(
        key: String,
        raw_response_document: String,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            key,
            raw_response_document,
            created_at: now,
            expires_at: now + lifetime(ttl),
            query_text: None,
            order_by: None,
            result_type_filter: None,
            requested_max_results: None,
            next_page_token: None,
            prev_page_token: None,
            total_results: None,
            region_code: None,
        }
    }
}

impl CacheRecord for SearchCacheEntry {
    const KIND: &'static str = "search";

    fn cache_key(&self) -> &str {
        &self.key
    }

    fn id(&self) -> Option<u64> {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = Some(id);
    }

    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

/// Everything known about one video.
///
/// Records discovered through a search carry snippet fields only: no raw
/// document and no statistics until a details call fills them in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoCacheEntry {
    pub id: Option<u64>,
    pub video_id: String,
    pub raw_response_document: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
    pub thumbnail_url: Option<String>,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub comment_count: Option<u64>,
    pub favorite_count: Option<u64>,
    /// ISO 8601 duration, e.g. `PT15M33S`
    pub duration: Option<String>,
    /// ISO 8601 timestamp, compared lexicographically
    pub published_at: Option<String>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl VideoCacheEntry {
    pub fn new(video_id: String, ttl: Duration) -> Self {
        Self::created_at(video_id, ttl, Utc::now())
    }

    pub fn created_at(video_id: String, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            video_id,
            raw_response_document: None,
            title: None,
            description: None,
            channel_id: None,
            channel_title: None,
            thumbnail_url: None,
            view_count: None,
            like_count: None,
            comment_count: None,
            favorite_count: None,
            duration: None,
            published_at: None,
            category: None,
            created_at: now,
            expires_at: now + lifetime(ttl),
        }
    }
}

impl CacheRecord for VideoCacheEntry {
    const KIND: &'static str = "video";

    fn cache_key(&self) -> &str {
        &self.video_id
    }

    fn id(&self) -> Option<u64> {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = Some(id);
    }

    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[test]
    fn default_lifetime_boundaries() {
        let t = Utc::now();
        let entry = SearchCacheEntry::created_at("k".into(), "{}".into(), DAY, t);

        assert!(entry.expires_at > entry.created_at);
        assert!(!entry.is_expired_at(t + TimeDelta::hours(23) + TimeDelta::minutes(59)));
        assert!(!entry.is_expired_at(t + TimeDelta::hours(24)));
        assert!(entry.is_expired_at(t + TimeDelta::hours(24) + TimeDelta::seconds(1)));
    }

    #[test]
    fn video_entry_uses_same_lifetime_rule() {
        let t = Utc::now();
        let entry = VideoCacheEntry::created_at("abc".into(), DAY, t);
        assert!(!entry.is_expired_at(t + TimeDelta::hours(23) + TimeDelta::minutes(59)));
        assert!(entry.is_expired_at(t + TimeDelta::hours(24) + TimeDelta::seconds(1)));
    }

    #[test]
    fn lifetime_is_settable_per_record() {
        let t = Utc::now();
        let entry = VideoCacheEntry::created_at("abc".into(), Duration::from_secs(60), t);
        assert_eq!(entry.expires_at - entry.created_at, TimeDelta::seconds(60));
    }

    #[test]
    fn zero_lifetime_still_expires_after_creation() {
        let t = Utc::now();
        let entry = SearchCacheEntry::created_at("k".into(), "{}".into(), Duration::ZERO, t);
        assert!(entry.expires_at > entry.created_at);
    }

    #[test]
    fn new_video_entry_has_no_statistics() {
        let entry = VideoCacheEntry::new("abc".into(), DAY);
        assert_eq!(entry.cache_key(), "abc");
        assert!(entry.view_count.is_none());
        assert!(entry.raw_response_document.is_none());
        assert!(entry.id().is_none());
        assert!(!entry.is_expired());
    }
}
