use crate::{
    cache::{MemoryStore, SearchCacheEntry, SearchStore, VideoCacheEntry, VideoStore},
    config::{CacheStoreType, Config},
    error::{ProxyError, Result},
    proxy::ProxyService,
    server::guard::AccessGuard,
    upstream::{HttpUpstream, UpstreamGateway},
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Cache-and-fallback core
    pub proxy: ProxyService,
    /// Search results store, also used for maintenance
    pub searches: SearchStore,
    /// Video records store, also used for statistics and maintenance
    pub videos: VideoStore,
    /// Client key check and rate limiting
    pub guard: AccessGuard,
    pub metrics: PrometheusHandle,
    pub started_at: Instant,
}

impl AppState {
    /// Build state from configuration, connecting the configured stores.
    pub async fn new(config: Config) -> Result<Self> {
        let (searches, videos) = open_stores(&config).await?;
        Self::with_stores(config, searches, videos)
    }

    /// Build state over existing stores.
    pub fn with_stores(config: Config, searches: SearchStore, videos: VideoStore) -> Result<Self> {
        let upstream: Option<Arc<dyn UpstreamGateway>> = match &config.upstream_api_key {
            Some(key) if config.upstream_configured() => {
                info!("Upstream live at {}", config.upstream_base_url);
                Some(Arc::new(HttpUpstream::new(
                    &config.upstream_base_url,
                    key.clone(),
                    config.upstream_timeout(),
                )?))
            }
            _ => {
                info!("Upstream not configured, serving local data only");
                None
            }
        };

        let proxy = ProxyService::new(
            Arc::clone(&searches),
            Arc::clone(&videos),
            upstream,
            config.cache_ttl(),
        );
        let guard = AccessGuard::new(&config.access_keys, config.rate_limit_rpm);

        Ok(Self {
            config: Arc::new(config),
            proxy,
            searches,
            videos,
            guard,
            metrics: crate::metrics::init(),
            started_at: Instant::now(),
        })
    }
}

async fn open_stores(config: &Config) -> Result<(SearchStore, VideoStore)> {
    match config.cache_store {
        CacheStoreType::Memory => {
            info!("Using in-memory cache store");
            let searches: SearchStore = Arc::new(MemoryStore::<SearchCacheEntry>::new());
            let videos: VideoStore = Arc::new(MemoryStore::<VideoCacheEntry>::new());
            Ok((searches, videos))
        }
        #[cfg(feature = "valkey")]
        CacheStoreType::Valkey => {
            use crate::cache::ValkeyStore;

            let url = config
                .valkey_url
                .as_deref()
                .ok_or_else(|| ProxyError::Config("VALKEY_URL is required".to_string()))?;
            let searches: SearchStore =
                Arc::new(ValkeyStore::<SearchCacheEntry>::connect(url).await?);
            let videos: VideoStore =
                Arc::new(ValkeyStore::<VideoCacheEntry>::connect(url).await?);
            info!("Using Valkey cache store at {}", url);
            Ok((searches, videos))
        }
        #[cfg(not(feature = "valkey"))]
        CacheStoreType::Valkey => Err(ProxyError::Config(
            "CACHE_STORE=valkey requires building with the `valkey` feature".to_string(),
        )),
    }
}
