// In-memory verdict cache
// Bounded LRU storage with per-entry expiry. Reads use `peek` so the eviction
// order stays the insertion order: the oldest-inserted key leaves first.

use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::app_config::VerdictCacheConfig;
use crate::models::verdict::CachedVerdict;
use crate::utils::clock::Clock;

// =============================================================================
// DATA STRUCTURES
// =============================================================================

#[derive(Debug, Clone)]
struct CacheEntry {
    verdict: CachedVerdict,
    /// `None` never expires
    expires_at: Option<i64>,
}

impl CacheEntry {
    fn is_live(&self, now: i64) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

struct CacheState {
    entries: LruCache<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

/// Snapshot of cache effectiveness
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub keys: usize,
    pub hits: u64,
    pub misses: u64,
    /// Percentage with two decimals; 0 before the first read
    pub hit_rate: f64,
}

// =============================================================================
// VERDICT CACHE
// =============================================================================

pub struct VerdictCache {
    default_ttl_seconds: u64,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState>,
}

impl VerdictCache {
    pub fn new(config: &VerdictCacheConfig, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(config.max_keys).unwrap_or(NonZeroUsize::MIN);
        Self {
            default_ttl_seconds: config.ttl_seconds,
            clock,
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// Insert or overwrite `key`. A TTL of 0 keeps the entry until it is
    /// evicted or deleted. Returns false when the expiry cannot be
    /// represented; the cache is left unchanged in that case.
    pub async fn set(&self, key: &str, verdict: CachedVerdict, ttl_override: Option<u64>) -> bool {
        let ttl_seconds = ttl_override.unwrap_or(self.default_ttl_seconds);
        let expires_at = if ttl_seconds == 0 {
            None
        } else {
            let expiry = i64::try_from(ttl_seconds)
                .ok()
                .and_then(|secs| secs.checked_mul(1000))
                .and_then(|ms| self.clock.now_ms().checked_add(ms));
            let Some(expiry) = expiry else {
                warn!(key, ttl_seconds, "Verdict cache TTL out of range");
                return false;
            };
            Some(expiry)
        };

        let mut state = self.state.lock().await;
        if let Some((evicted, _)) = state.entries.push(key.to_string(), CacheEntry { verdict, expires_at }) {
            if evicted != key {
                debug!(evicted = %evicted, "Verdict cache at capacity, evicted oldest entry");
            }
        }
        true
    }

    /// Fetch a live verdict, counting the read as a hit or a miss
    pub async fn get(&self, key: &str) -> Option<CachedVerdict> {
        let now = self.clock.now_ms();
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let live = match state.entries.peek(key) {
            Some(entry) if entry.is_live(now) => Some(entry.verdict.clone()),
            Some(_) => {
                state.entries.pop(key);
                None
            },
            None => None,
        };

        match live {
            Some(_) => state.hits += 1,
            None => state.misses += 1,
        }
        live
    }

    /// Existence check that leaves the hit and miss counters alone
    pub async fn has(&self, key: &str) -> bool {
        let now = self.clock.now_ms();
        let state = self.state.lock().await;
        state.entries.peek(key).is_some_and(|entry| entry.is_live(now))
    }

    /// Remove `key`; returns how many entries were removed
    pub async fn delete(&self, key: &str) -> usize {
        let mut state = self.state.lock().await;
        usize::from(state.entries.pop(key).is_some())
    }

    /// Remove every entry and reset the counters
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.entries.clear();
        state.hits = 0;
        state.misses = 0;
    }

    pub async fn get_stats(&self) -> CacheStats {
        let now = self.clock.now_ms();
        let state = self.state.lock().await;

        let keys = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_live(now))
            .count();
        let reads = state.hits + state.misses;
        let hit_rate = if reads == 0 {
            0.0
        } else {
            (state.hits as f64 / reads as f64 * 10_000.0).round() / 100.0
        };

        CacheStats {
            keys,
            hits: state.hits,
            misses: state.misses,
            hit_rate,
        }
    }

    /// Absolute expiry of `key` in epoch milliseconds; 0 for an entry that
    /// never expires
    pub async fn get_ttl(&self, key: &str) -> Option<i64> {
        let now = self.clock.now_ms();
        let state = self.state.lock().await;
        state
            .entries
            .peek(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.expires_at.unwrap_or(0))
    }
}

/// Periodically log cache statistics until the returned task is aborted
pub fn spawn_stats_logger(cache: Arc<VerdictCache>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // First tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            let stats = cache.get_stats().await;
            debug!(
                keys = stats.keys,
                hits = stats.hits,
                misses = stats.misses,
                hit_rate = stats.hit_rate,
                "Verdict cache stats"
            );
        }
    })
}
