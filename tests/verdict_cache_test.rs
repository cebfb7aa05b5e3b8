// Verdict cache and local scorer tests
// TTL behavior is driven by a manual clock; no sleeping

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use wbscan_core::{
    spawn_stats_logger, CachedVerdict, FeedConfig, LocalFeedEngine, LocalFeedScorer, ManualClock,
    VerdictCache, VerdictCacheConfig, VerdictLevel,
};

fn config(ttl_seconds: u64, max_keys: usize) -> VerdictCacheConfig {
    VerdictCacheConfig {
        ttl_seconds,
        max_keys,
        stats_interval_seconds: 60,
    }
}

fn malicious() -> CachedVerdict {
    CachedVerdict {
        verdict: VerdictLevel::Malicious,
        confidence: 1.0,
        timestamp: 0,
        sources: Some(vec!["Known phishing (OpenPhish)".to_string()]),
    }
}

#[tokio::test]
async fn test_expired_entry_absent_without_sweep() {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let cache = VerdictCache::new(&config(3600, 100), clock.clone());

    assert!(cache.set("url-hash", malicious(), None).await);
    assert_eq!(cache.get("url-hash").await, Some(malicious()));
    assert_eq!(cache.get_ttl("url-hash").await, Some(1_700_003_600_000));

    clock.advance(3_600_000);
    assert_eq!(cache.get("url-hash").await, None);

    let stats = cache.get_stats().await;
    assert_eq!((stats.hits, stats.misses), (1, 1));
    assert_eq!(stats.hit_rate, 50.0);
}

#[tokio::test]
async fn test_ttl_override_and_overwrite() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = VerdictCache::new(&config(3600, 100), clock.clone());

    cache.set("k", malicious(), Some(10)).await;
    assert_eq!(cache.get_ttl("k").await, Some(10_000));

    let mut benign = malicious();
    benign.verdict = VerdictLevel::Benign;
    cache.set("k", benign.clone(), None).await;
    assert_eq!(cache.get_ttl("k").await, Some(3_600_000));
    assert_eq!(cache.get("k").await, Some(benign));
}

#[tokio::test]
async fn test_zero_ttl_override_outlives_default_ttl() {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let cache = VerdictCache::new(&config(60, 100), clock.clone());

    assert!(cache.set("pinned", malicious(), Some(0)).await);
    assert!(cache.set("default", malicious(), None).await);

    clock.advance(365 * 24 * 3_600_000);
    assert!(cache.get("default").await.is_none());
    assert_eq!(cache.get("pinned").await, Some(malicious()));
    assert_eq!(cache.get_ttl("pinned").await, Some(0));
    assert_eq!(cache.delete("pinned").await, 1);
}

#[tokio::test]
async fn test_capacity_evicts_in_insertion_order() {
    let cache = VerdictCache::new(&config(3600, 3), Arc::new(ManualClock::new(0)));
    for key in ["a", "b", "c"] {
        cache.set(key, malicious(), None).await;
    }
    for key in ["a", "a", "b"] {
        assert!(cache.get(key).await.is_some());
    }

    cache.set("d", malicious(), None).await;
    cache.set("e", malicious(), None).await;

    assert!(!cache.has("a").await);
    assert!(!cache.has("b").await);
    assert!(cache.has("c").await);
    assert_eq!(cache.get_stats().await.keys, 3);
    assert_eq!(cache.get_stats().await.hits, 3);
}

#[tokio::test(start_paused = true)]
async fn test_stats_logger_runs_until_aborted() {
    let cache = Arc::new(VerdictCache::new(&config(60, 10), Arc::new(ManualClock::new(0))));
    let handle = spawn_stats_logger(cache.clone(), Duration::from_secs(60));

    tokio::time::sleep(Duration::from_secs(150)).await;
    assert!(!handle.is_finished());

    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());
}

#[tokio::test]
async fn test_local_scorer_caches_by_url_hash() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("openphish.txt"), "https://phish.test/login\n").unwrap();

    let clock = Arc::new(ManualClock::new(0));
    let engine = Arc::new(LocalFeedEngine::new(FeedConfig::with_dir(dir.path())));
    let cache = Arc::new(VerdictCache::new(&config(3600, 100), clock.clone()));
    let scorer = LocalFeedScorer::new(engine, cache.clone(), clock);

    let first = scorer.assess("https://PHISH.test/login#x").await;
    assert_eq!(first.final_url, "https://phish.test/login");
    assert_eq!(first.verdict.level, VerdictLevel::Malicious);
    assert_eq!(first.verdict.reasons, vec!["Known phishing (OpenPhish)".to_string()]);
    assert!(first.signals.is_some());

    // Feed removal does not matter once the verdict is cached
    fs::remove_file(dir.path().join("openphish.txt")).unwrap();
    let second = scorer.assess("https://phish.test/login").await;
    assert_eq!(second.verdict, first.verdict);
    assert!(second.signals.is_none());

    let stats = cache.get_stats().await;
    assert_eq!((stats.hits, stats.misses), (1, 1));
}

#[tokio::test]
async fn test_local_scorer_benign_without_feeds() {
    let clock = Arc::new(ManualClock::new(0));
    let engine = Arc::new(LocalFeedEngine::new(FeedConfig::with_dir("/nonexistent/feeds")));
    let cache = Arc::new(VerdictCache::new(&config(3600, 100), clock.clone()));
    let scorer = LocalFeedScorer::new(engine, cache, clock);

    let assessment = scorer.assess("https://example.com").await;
    assert_eq!(assessment.verdict.level, VerdictLevel::Benign);
    assert!(assessment.verdict.reasons.is_empty());
}
