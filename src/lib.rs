// Library exports for the WhatsApp link-scanning core
// Local threat feeds, the verdict cache and the in-process scan queue

pub mod app_config;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use app_config::{AppConfig, ConfigError, FeedConfig, ScanQueueConfig, VerdictCacheConfig, CONFIG};
pub use models::{
    CachedVerdict, JobHandle, LocalFeedSignals, MessageContent, ScanJob, ScanOptions, ScoredUrl,
    SendOptions, SendResult, TyposquatMatch, TyposquatMethod, Verdict, VerdictLevel,
};
pub use services::{
    format_group_verdict, spawn_stats_logger, CacheStats, InProcessScanQueue, LocalFeedEngine,
    LocalFeedScorer, MessagingAdapter, QueueCollaborators, QueueError, ScanError,
    ScanQueueMetrics, Scorer, VerdictCache,
};
pub use utils::{Clock, ManualClock, SystemClock};
