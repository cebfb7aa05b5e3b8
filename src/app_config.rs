// Centralized configuration for the scan orchestration core
// Load ALL env vars ONCE at startup; components receive their slice by value

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Global configuration loaded once, used by the binary
pub static CONFIG: Lazy<AppConfig> = Lazy::new(|| {
    dotenv::dotenv().ok();

    AppConfig::from_env().expect("Failed to load configuration")
});

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub rust_log: String,
    pub feeds: FeedConfig,
    pub verdict_cache: VerdictCacheConfig,
    pub scan_queue: ScanQueueConfig,
}

/// Local threat feed locations and thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub enabled: bool,
    pub feed_dir: PathBuf,
    pub openphish_path: PathBuf,
    pub urlhaus_path: PathBuf,
    pub phishtank_path: PathBuf,
    pub sans_path: PathBuf,
    pub certpl_path: PathBuf,
    pub top_domains_path: PathBuf,
    /// Minimum SANS record score kept in the suspicious-domain set
    pub sans_score_min: f64,
}

impl FeedConfig {
    /// All feeds under one directory with their default file names
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            enabled: true,
            feed_dir: dir.to_path_buf(),
            openphish_path: dir.join("openphish.txt"),
            urlhaus_path: dir.join("urlhaus.txt"),
            phishtank_path: dir.join("phishtank.txt"),
            sans_path: dir.join("sans-domains.txt"),
            certpl_path: dir.join("certpl-domains.txt"),
            top_domains_path: dir.join("majestic-top-domains.txt"),
            sans_score_min: 3.0,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self::with_dir(Path::new("storage").join("feeds"))
    }
}

/// In-memory verdict cache sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictCacheConfig {
    pub ttl_seconds: u64,
    pub max_keys: usize,
    pub stats_interval_seconds: u64,
}

impl Default for VerdictCacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 3600,
            max_keys: 10_000,
            stats_interval_seconds: 60,
        }
    }
}

/// In-process scan queue limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanQueueConfig {
    pub concurrency: usize,
    /// Admissions per group chat per window
    pub rate_limit: u32,
    pub rate_window_ms: i64,
    /// Window during which a repeat URL in the same chat is suppressed
    pub lineage_ttl_ms: i64,
    /// Cooldown between "scan failed" notices for one message
    pub failure_reply_ttl_ms: i64,
    /// Entries visited per map on each pruning pass
    pub prune_batch_size: usize,
}

impl Default for ScanQueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            rate_limit: 60,
            rate_window_ms: 3_600_000,
            lineage_ttl_ms: 30 * 24 * 3_600_000,
            failure_reply_ttl_ms: 30 * 60_000,
            prune_batch_size: 500,
        }
    }
}

impl ScanQueueConfig {
    /// Pruning runs at most this often
    pub fn prune_interval_ms(&self) -> i64 {
        60_000.min(self.lineage_ttl_ms).min(self.rate_window_ms)
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Helper function to get optional env var with default
        let get_or_default = |key: &str, default: &str| -> String {
            env::var(key).unwrap_or_else(|_| default.to_string())
        };

        let parse_u64_or_default = |key: &str, default: &str| -> Result<u64, ConfigError> {
            get_or_default(key, default).trim().parse().map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), "not a valid u64".to_string())
            })
        };

        let parse_positive = |key: &str, default: &str| -> Result<u64, ConfigError> {
            let value = parse_u64_or_default(key, default)?;
            if value == 0 {
                return Err(ConfigError::InvalidValue(
                    key.to_string(),
                    "must be at least 1".to_string(),
                ));
            }
            Ok(value)
        };

        let parse_seconds_as_ms = |key: &str, default: &str| -> Result<i64, ConfigError> {
            let seconds = parse_positive(key, default)?;
            i64::try_from(seconds)
                .ok()
                .and_then(|s| s.checked_mul(1000))
                .ok_or_else(|| {
                    ConfigError::InvalidValue(key.to_string(), "too large in milliseconds".to_string())
                })
        };

        let parse_bool_or_default = |key: &str, default: &str| -> bool {
            get_or_default(key, default).to_lowercase() == "true"
        };

        let path_or = |key: &str, default: PathBuf| -> PathBuf {
            env::var(key).map(PathBuf::from).unwrap_or(default)
        };

        // Feeds
        let feed_dir = path_or("LOCAL_FEED_DIR", Path::new("storage").join("feeds"));
        let defaults = FeedConfig::with_dir(&feed_dir);
        let sans_score_min = get_or_default("SANS_SCORE_MIN", "3")
            .trim()
            .parse::<f64>()
            .map_err(|_| {
                ConfigError::InvalidValue("SANS_SCORE_MIN".to_string(), "not a number".to_string())
            })?;

        let feeds = FeedConfig {
            enabled: parse_bool_or_default("LOCAL_FEEDS_ENABLED", "true"),
            openphish_path: path_or("OPENPHISH_LOCAL_PATH", defaults.openphish_path),
            urlhaus_path: path_or("URLHAUS_LOCAL_PATH", defaults.urlhaus_path),
            phishtank_path: path_or("PHISHTANK_LOCAL_PATH", defaults.phishtank_path),
            sans_path: path_or("SANS_LOCAL_PATH", defaults.sans_path),
            certpl_path: path_or("CERTPL_LOCAL_PATH", defaults.certpl_path),
            top_domains_path: path_or("TOP_DOMAINS_LOCAL_PATH", defaults.top_domains_path),
            feed_dir,
            sans_score_min,
        };

        // Verdict cache
        let verdict_cache = VerdictCacheConfig {
            ttl_seconds: parse_positive("VERDICT_CACHE_TTL_SECONDS", "3600")?,
            max_keys: parse_positive("VERDICT_CACHE_MAX_KEYS", "10000")? as usize,
            stats_interval_seconds: parse_positive("VERDICT_CACHE_STATS_INTERVAL_SECONDS", "60")?,
        };

        // Scan queue
        let rate_limit = parse_positive("WA_PER_GROUP_HOURLY_LIMIT", "60")?;
        let scan_queue = ScanQueueConfig {
            concurrency: parse_positive("SCAN_CONCURRENCY", "10")? as usize,
            rate_limit: u32::try_from(rate_limit).map_err(|_| {
                ConfigError::InvalidValue(
                    "WA_PER_GROUP_HOURLY_LIMIT".to_string(),
                    "not a valid u32".to_string(),
                )
            })?,
            rate_window_ms: parse_seconds_as_ms("WA_RATE_WINDOW_SECONDS", "3600")?,
            lineage_ttl_ms: parse_seconds_as_ms("WA_MESSAGE_LINEAGE_TTL_SECONDS", "2592000")?,
            failure_reply_ttl_ms: parse_seconds_as_ms("WA_FAILURE_REPLY_TTL_SECONDS", "1800")?,
            prune_batch_size: 500,
        };

        Ok(Self {
            rust_log: get_or_default("RUST_LOG", "info"),
            feeds,
            verdict_cache,
            scan_queue,
        })
    }
}

/// Get the global configuration instance
pub fn config() -> &'static AppConfig {
    &CONFIG
}
