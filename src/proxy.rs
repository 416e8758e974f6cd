//! Cache-and-fallback decisions for the two proxied operations.
//!
//! Per request: fresh cache entry wins; otherwise, with upstream configured,
//! fetch (one call per key at a time), persist and return; without upstream,
//! fall back to the stale entry, then to a reconstruction from stored video
//! records, then to an empty list envelope.

use crate::cache::{
    CacheRecord, CacheStore, SearchCacheEntry, SearchStore, VideoCacheEntry, VideoStore,
};
use crate::error::{ProxyError, UpstreamError};
use crate::extract::{extract_search_items, extract_search_meta, extract_video};
use crate::fingerprint::fingerprint;
use crate::metrics;
use crate::reconstruct::{Reconstructor, SEARCH_LIST_KIND, VIDEO_LIST_KIND, empty_document};
use crate::request::{SearchRequest, VideoRequest};
use crate::singleflight::SingleFlight;
use crate::upstream::UpstreamGateway;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Where a response body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// Unexpired cache entry
    Hit,
    /// Expired entry served because upstream is unavailable
    Stale,
    /// Fresh upstream fetch
    Upstream,
    /// Synthesized from stored video records
    Reconstructed,
    /// No data anywhere: empty list envelope
    Empty,
}

impl ResponseSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseSource::Hit => "hit",
            ResponseSource::Stale => "stale",
            ResponseSource::Upstream => "upstream",
            ResponseSource::Reconstructed => "reconstructed",
            ResponseSource::Empty => "empty",
        }
    }
}

/// A response document and its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyResponse {
    pub body: String,
    pub source: ResponseSource,
}

impl ProxyResponse {
    fn new(body: String, source: ResponseSource) -> Self {
        Self { body, source }
    }
}

type FetchResult = Result<String, UpstreamError>;

/// The proxy core. Holds no configuration: upstream presence and record
/// lifetime are fixed at construction.
#[derive(Clone)]
pub struct ProxyService {
    searches: SearchStore,
    videos: VideoStore,
    upstream: Option<Arc<dyn UpstreamGateway>>,
    reconstructor: Reconstructor,
    cache_ttl: Duration,
    flights: SingleFlight<FetchResult>,
}

impl ProxyService {
    /// `upstream` is `None` when no credential is configured or local-data-only
    /// mode is on.
    pub fn new(
        searches: SearchStore,
        videos: VideoStore,
        upstream: Option<Arc<dyn UpstreamGateway>>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            reconstructor: Reconstructor::new(Arc::clone(&videos)),
            searches,
            videos,
            upstream,
            cache_ttl,
            flights: SingleFlight::new(),
        }
    }

    pub fn upstream_configured(&self) -> bool {
        self.upstream.is_some()
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<ProxyResponse, ProxyError> {
        let params = request.params();
        let key = fingerprint(&params);
        let cached = lookup(&self.searches, &key).await;

        if let Some(entry) = &cached
            && !entry.is_expired()
        {
            info!("Search cache HIT for {}", key);
            let body = entry.raw_response_document.clone();
            return Ok(self.outcome("search", body, ResponseSource::Hit));
        }

        let Some(upstream) = &self.upstream else {
            return Ok(self.degraded_search(request, cached).await);
        };

        info!("Search cache MISS for {}, calling upstream", key);
        let previous_id = cached.and_then(|e| e.id);
        let body = self
            .flights
            .run(&format!("search:{key}"), || {
                self.fetch_search(upstream.as_ref(), request, &params, &key, previous_id)
            })
            .await
            .inspect_err(|e| {
                error!("Upstream search failed: {}", e);
                metrics::record_upstream_error("search");
            })?;

        Ok(self.outcome("search", body, ResponseSource::Upstream))
    }

    pub async fn video_details(&self, request: &VideoRequest) -> Result<ProxyResponse, ProxyError> {
        let video_id = request.id.as_str();
        // Search-derived records have no document to serve
        let cached = lookup(&self.videos, video_id)
            .await
            .filter(|e| e.raw_response_document.is_some());

        if let Some(entry) = &cached
            && !entry.is_expired()
            && let Some(body) = &entry.raw_response_document
        {
            info!("Video cache HIT for {}", video_id);
            return Ok(self.outcome("videos", body.clone(), ResponseSource::Hit));
        }

        let Some(upstream) = &self.upstream else {
            if let Some(body) = cached.and_then(|e| e.raw_response_document) {
                info!("Upstream unavailable, serving stale video {}", video_id);
                return Ok(self.outcome("videos", body, ResponseSource::Stale));
            }
            info!("Upstream unavailable and no data for video {}", video_id);
            return Ok(self.outcome(
                "videos",
                empty_document(VIDEO_LIST_KIND).to_string(),
                ResponseSource::Empty,
            ));
        };

        info!("Video cache MISS for {}, calling upstream", video_id);
        let body = self
            .flights
            .run(&format!("video:{video_id}"), || {
                self.fetch_video(upstream.as_ref(), video_id, &request.extra)
            })
            .await
            .inspect_err(|e| {
                error!("Upstream video details for {} failed: {}", video_id, e);
                metrics::record_upstream_error("videos");
            })?;

        Ok(self.outcome("videos", body, ResponseSource::Upstream))
    }

    fn outcome(
        &self,
        operation: &'static str,
        body: String,
        source: ResponseSource,
    ) -> ProxyResponse {
        metrics::record_cache_outcome(operation, source.as_str());
        ProxyResponse::new(body, source)
    }

    async fn degraded_search(
        &self,
        request: &SearchRequest,
        cached: Option<SearchCacheEntry>,
    ) -> ProxyResponse {
        if let Some(entry) = cached {
            info!("Upstream unavailable, serving stale search {}", entry.key);
            return self.outcome("search", entry.raw_response_document, ResponseSource::Stale);
        }

        let reconstructed = self
            .reconstructor
            .reconstruct(request.q.as_deref(), request.max_results.as_deref())
            .await
            .unwrap_or_else(|e| {
                warn!("Reconstruction skipped, video store unavailable: {}", e);
                None
            });

        match reconstructed {
            Some(document) => {
                self.outcome("search", document.to_string(), ResponseSource::Reconstructed)
            }
            None => {
                info!("Upstream unavailable and nothing to reconstruct, returning empty result");
                self.outcome(
                    "search",
                    empty_document(SEARCH_LIST_KIND).to_string(),
                    ResponseSource::Empty,
                )
            }
        }
    }

    async fn fetch_search(
        &self,
        upstream: &dyn UpstreamGateway,
        request: &SearchRequest,
        params: &BTreeMap<String, String>,
        key: &str,
        previous_id: Option<u64>,
    ) -> FetchResult {
        let raw = upstream.search(params).await?;

        let mut entry = SearchCacheEntry::new(key.to_string(), raw.clone(), self.cache_ttl);
        entry.id = previous_id;
        extract_search_meta(&raw, request)
            .logged("search metadata")
            .apply_to(&mut entry);
        if let Err(e) = self.searches.upsert(entry).await {
            error!("Failed to cache search {}: {}", key, e);
        }

        self.remember_search_items(&raw).await;
        Ok(raw)
    }

    /// Upsert a snippet-only video record for every video in a search result.
    async fn remember_search_items(&self, raw: &str) {
        let items = extract_search_items(raw).logged("search items");
        let count = items.len();

        for item in items {
            let mut record = match self.videos.get(&item.video_id).await {
                Ok(Some(existing)) => existing,
                Ok(None) => VideoCacheEntry::new(item.video_id.clone(), self.cache_ttl),
                Err(e) => {
                    warn!("Skipping video {} from search: {}", item.video_id, e);
                    continue;
                }
            };
            item.apply_to(&mut record);
            if let Err(e) = self.videos.upsert(record).await {
                warn!("Failed to store video from search: {}", e);
            }
        }
        debug!("Recorded {} videos from search result", count);
    }

    async fn fetch_video(
        &self,
        upstream: &dyn UpstreamGateway,
        video_id: &str,
        params: &BTreeMap<String, String>,
    ) -> FetchResult {
        let raw = upstream.video_details(video_id, params).await?;

        let previous_id = match self.videos.get(video_id).await {
            Ok(existing) => existing.and_then(|e| e.id),
            Err(_) => None,
        };
        let mut entry = VideoCacheEntry::new(video_id.to_string(), self.cache_ttl);
        entry.id = previous_id;
        entry.raw_response_document = Some(raw.clone());
        extract_video(&raw)
            .logged("video details")
            .apply_to(&mut entry);

        if let Err(e) = self.videos.upsert(entry).await {
            error!("Failed to cache video {}: {}", video_id, e);
        }
        Ok(raw)
    }
}

/// Read through a store, treating a backend failure as a miss.
async fn lookup<E: CacheRecord>(store: &Arc<dyn CacheStore<E>>, key: &str) -> Option<E> {
    match store.get(key).await {
        Ok(entry) => entry,
        Err(e) => {
            warn!("{} cache read failed, treating as miss: {}", E::KIND, e);
            None
        }
    }
}
