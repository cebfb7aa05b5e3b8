// Services module for the scan orchestration core
// Feed matching, verdict caching and the scan queue

pub mod feeds;
pub mod local_scorer;
pub mod scan_queue;
pub mod verdict_cache;
pub mod verdict_message;

// Re-export commonly used services
pub use feeds::{FeedError, LocalFeedEngine, TopDomains};
pub use local_scorer::{Assessment, LocalFeedScorer};
pub use scan_queue::metrics::{gather_metrics, ScanQueueMetrics};
pub use scan_queue::{
    InProcessScanQueue, MessagingAdapter, QueueCollaborators, QueueError, QueueStats, ScanError,
    Scorer, VerdictFormatter,
};
pub use verdict_cache::{spawn_stats_logger, CacheStats, VerdictCache};
pub use verdict_message::{format_failure_notice, format_group_verdict};
