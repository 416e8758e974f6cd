use std::env;
use std::time::Duration;

/// Default upstream API root.
pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Default lifetime of a cached record: 24 hours.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 24 * 60 * 60;

/// Default bound on a single upstream round-trip.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;

/// Cache store backend selection
#[derive(Clone, Debug, PartialEq)]
pub enum CacheStoreType {
    Memory,
    Valkey,
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub is_dev: bool,
    /// Root URL of the upstream API (`/search` and `/videos` are appended)
    pub upstream_base_url: String,
    /// Upstream credential. `None` puts the proxy in degraded mode.
    pub upstream_api_key: Option<String>,
    /// Serve from cache and reconstruction only, even when a credential is set
    pub local_data_only: bool,
    /// Per-call upstream timeout in seconds
    pub upstream_timeout_secs: u64,
    /// Lifetime of new and refreshed cache records in seconds
    pub cache_ttl_secs: u64,
    /// Cache store backend
    pub cache_store: CacheStoreType,
    /// Valkey/Redis URL (used when cache_store = Valkey)
    pub valkey_url: Option<String>,
    /// Per-client requests per minute, 0 disables rate limiting
    pub rate_limit_rpm: u32,
    /// Client keys accepted on proxied routes, empty means open access
    pub access_keys: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    /// In DEV mode, provides sensible defaults. In PROD mode, PORT is required.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let is_dev = env::var("DEV_MODE")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        let port = if is_dev {
            env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?
        } else {
            env::var("PORT")
                .map_err(|_| "PORT is required in production")?
                .parse()?
        };

        let upstream_base_url = env::var("UPSTREAM_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_UPSTREAM_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        // Blank credentials count as absent
        let upstream_api_key = env::var("UPSTREAM_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        let local_data_only = env::var("LOCAL_DATA_ONLY")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        let upstream_timeout_secs = env::var("UPSTREAM_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|secs: &u64| *secs > 0)
            .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS);

        let cache_ttl_secs = env::var("CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|secs: &u64| *secs > 0)
            .unwrap_or(DEFAULT_CACHE_TTL_SECS);

        let cache_store = match env::var("CACHE_STORE")
            .unwrap_or_else(|_| "memory".to_string())
            .to_lowercase()
            .as_str()
        {
            "valkey" | "redis" => CacheStoreType::Valkey,
            _ => CacheStoreType::Memory,
        };
        let valkey_url = env::var("VALKEY_URL").ok();
        if cache_store == CacheStoreType::Valkey && valkey_url.is_none() {
            return Err("VALKEY_URL is required when CACHE_STORE=valkey".into());
        }

        let rate_limit_rpm = env::var("RATE_LIMIT_RPM")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .unwrap_or(0);

        let access_keys = env::var("ACCESS_KEYS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Config {
            port,
            is_dev,
            upstream_base_url,
            upstream_api_key,
            local_data_only,
            upstream_timeout_secs,
            cache_ttl_secs,
            cache_store,
            valkey_url,
            rate_limit_rpm,
            access_keys,
        })
    }

    /// Whether requests may reach the upstream API at all.
    pub fn upstream_configured(&self) -> bool {
        !self.local_data_only && self.upstream_api_key.is_some()
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serialize all env-var tests to prevent races between parallel test threads.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ALL_VARS: &[&str] = &[
        "DEV_MODE",
        "PORT",
        "UPSTREAM_BASE_URL",
        "UPSTREAM_API_KEY",
        "LOCAL_DATA_ONLY",
        "UPSTREAM_TIMEOUT_SECS",
        "CACHE_TTL_SECS",
        "CACHE_STORE",
        "VALKEY_URL",
        "RATE_LIMIT_RPM",
        "ACCESS_KEYS",
    ];

    /// Set env vars, run `f`, then restore original state.
    ///
    /// Every variable in `ALL_VARS` not listed in `set` is removed first.
    fn with_env(set: &[(&str, &str)], f: impl FnOnce()) {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());

        let saved: Vec<(&str, Option<String>)> =
            ALL_VARS.iter().map(|k| (*k, env::var(k).ok())).collect();

        for k in ALL_VARS {
            // SAFETY: serialized by ENV_LOCK, no other thread touches env vars concurrently.
            unsafe { env::remove_var(k) };
        }
        for (k, v) in set {
            unsafe { env::set_var(k, v) };
        }

        f();

        for (k, old) in saved {
            match old {
                Some(v) => unsafe { env::set_var(k, v) },
                None => unsafe { env::remove_var(k) },
            }
        }
    }

    #[test]
    fn dev_mode_uses_defaults() {
        with_env(&[("DEV_MODE", "true")], || {
            let config = Config::from_env().expect("should succeed in dev mode");
            assert!(config.is_dev);
            assert_eq!(config.port, 3000);
            assert_eq!(config.upstream_base_url, DEFAULT_UPSTREAM_BASE_URL);
            assert_eq!(config.upstream_api_key, None);
            assert_eq!(config.cache_ttl_secs, DEFAULT_CACHE_TTL_SECS);
            assert_eq!(config.upstream_timeout_secs, DEFAULT_UPSTREAM_TIMEOUT_SECS);
            assert_eq!(config.cache_store, CacheStoreType::Memory);
            assert_eq!(config.rate_limit_rpm, 0);
            assert!(config.access_keys.is_empty());
            assert!(!config.upstream_configured());
        });
    }

    #[test]
    fn prod_mode_requires_port() {
        with_env(&[], || {
            assert!(
                Config::from_env().is_err(),
                "Should fail without PORT in prod mode"
            );
        });
    }

    #[test]
    fn api_key_enables_upstream() {
        with_env(&[("DEV_MODE", "true"), ("UPSTREAM_API_KEY", "abc")], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.upstream_api_key.as_deref(), Some("abc"));
            assert!(config.upstream_configured());
        });
    }

    #[test]
    fn blank_api_key_counts_as_absent() {
        with_env(&[("DEV_MODE", "true"), ("UPSTREAM_API_KEY", "   ")], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.upstream_api_key, None);
            assert!(!config.upstream_configured());
        });
    }

    #[test]
    fn local_data_only_overrides_api_key() {
        with_env(
            &[
                ("DEV_MODE", "true"),
                ("UPSTREAM_API_KEY", "abc"),
                ("LOCAL_DATA_ONLY", "true"),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert!(!config.upstream_configured());
            },
        );
    }

    #[test]
    fn trailing_slash_trimmed_from_base_url() {
        with_env(
            &[
                ("DEV_MODE", "true"),
                ("UPSTREAM_BASE_URL", "http://localhost:9000/v3/"),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.upstream_base_url, "http://localhost:9000/v3");
            },
        );
    }

    #[test]
    fn zero_timeout_falls_back_to_default() {
        with_env(
            &[("DEV_MODE", "true"), ("UPSTREAM_TIMEOUT_SECS", "0")],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.upstream_timeout(), Duration::from_secs(10));
            },
        );
    }

    #[test]
    fn cache_ttl_parsed() {
        with_env(&[("DEV_MODE", "true"), ("CACHE_TTL_SECS", "600")], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.cache_ttl(), Duration::from_secs(600));
        });
    }

    #[test]
    fn valkey_store_requires_url() {
        with_env(&[("DEV_MODE", "true"), ("CACHE_STORE", "valkey")], || {
            assert!(Config::from_env().is_err());
        });
    }

    #[test]
    fn cache_store_redis_alias() {
        with_env(
            &[
                ("DEV_MODE", "true"),
                ("CACHE_STORE", "redis"),
                ("VALKEY_URL", "redis://127.0.0.1:6379"),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.cache_store, CacheStoreType::Valkey);
            },
        );
    }

    #[test]
    fn access_keys_split_and_trimmed() {
        with_env(
            &[("DEV_MODE", "true"), ("ACCESS_KEYS", " alpha, beta ,,")],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.access_keys, vec!["alpha", "beta"]);
            },
        );
    }
}
