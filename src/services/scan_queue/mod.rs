// In-process scan queue
// Admits chat URL scan requests (dedup, then per-group rate limit), runs them
// FIFO under a concurrency cap and replies with the verdict. A failing job is
// isolated at its own boundary and produces at most one throttled notice per
// message.

pub mod cursor_map;
pub mod metrics;

use async_trait::async_trait;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::app_config::ScanQueueConfig;
use crate::models::scan::{
    JobHandle, MessageContent, ScanJob, ScanOptions, ScoredUrl, SendOptions, SendResult,
};
use crate::models::verdict::VerdictLevel;
use crate::services::verdict_message::{format_failure_notice, format_group_verdict};
use crate::utils::clock::{Clock, SystemClock};
use cursor_map::CursorMap;
use metrics::{ScanQueueMetrics, SCAN_QUEUE_METRICS};

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Failure of one job, caught at the job boundary
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Scan failed: {0}")]
    Scorer(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Scan task aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Queue closed")]
    Closed,

    #[error("Invalid queue configuration: {0}")]
    InvalidConfig(String),
}

// =============================================================================
// COLLABORATORS
// =============================================================================

/// Produces a verdict for one URL
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, url: &str, options: &ScanOptions) -> Result<ScoredUrl, ScanError>;
}

/// Delivers chat messages
#[async_trait]
pub trait MessagingAdapter: Send + Sync {
    async fn send_message(
        &self,
        chat_id: &str,
        content: MessageContent,
        options: SendOptions,
    ) -> Result<SendResult, ScanError>;
}

/// Renders `(level, reasons, final_url)` into reply text
pub type VerdictFormatter = Arc<dyn Fn(VerdictLevel, &[String], &str) -> String + Send + Sync>;

/// Everything the queue calls out to
#[derive(Clone)]
pub struct QueueCollaborators {
    pub scorer: Arc<dyn Scorer>,
    pub adapter: Arc<dyn MessagingAdapter>,
    pub formatter: VerdictFormatter,
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<ScanQueueMetrics>,
}

impl QueueCollaborators {
    /// Group-verdict formatting, the system clock and the shared metrics
    pub fn new(scorer: Arc<dyn Scorer>, adapter: Arc<dyn MessagingAdapter>) -> Self {
        Self {
            scorer,
            adapter,
            formatter: Arc::new(format_group_verdict),
            clock: Arc::new(SystemClock),
            metrics: Arc::clone(&SCAN_QUEUE_METRICS),
        }
    }

    pub fn with_formatter(mut self, formatter: VerdictFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<ScanQueueMetrics>) -> Self {
        self.metrics = metrics;
        self
    }
}

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    window_start: i64,
    count: u32,
}

/// Queue occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub queued: usize,
    pub in_flight: usize,
    pub dedup_entries: usize,
    pub rate_windows: usize,
    pub failure_notices: usize,
    pub closed: bool,
}

#[derive(Default)]
struct QueueState {
    closed: bool,
    pending: VecDeque<JobHandle>,
    in_flight: usize,
    /// `chat:urlHash` -> lineage expiry
    seen_urls: CursorMap<i64>,
    /// chat -> current fixed window
    rate_windows: CursorMap<RateWindow>,
    /// `chat:messageId` -> notice cooldown expiry
    failure_notices: CursorMap<i64>,
    last_prune_ms: i64,
    last_id_ms: i64,
    id_seq: u64,
}

impl QueueState {
    fn next_job_id(&mut self, now: i64, salt: &str) -> String {
        if now == self.last_id_ms {
            self.id_seq += 1;
        } else {
            self.last_id_ms = now;
            self.id_seq = 0;
        }
        format!("local:{}:{}:{}", now, salt, to_base36(self.id_seq))
    }

    fn is_duplicate(&mut self, now: i64, job: &ScanJob, lineage_ttl_ms: i64) -> bool {
        let key = job.dedup_key();
        if self.seen_urls.get(&key).is_some_and(|expiry| *expiry > now) {
            return true;
        }
        self.seen_urls.insert(key, now.saturating_add(lineage_ttl_ms));
        false
    }

    fn is_rate_limited(&mut self, now: i64, job: &ScanJob, config: &ScanQueueConfig) -> bool {
        if !job.is_group {
            return false;
        }

        if let Some(window) = self.rate_windows.get_mut(&job.chat_id) {
            if now - window.window_start <= config.rate_window_ms {
                if window.count >= config.rate_limit {
                    return true;
                }
                window.count += 1;
                return false;
            }
        }

        self.rate_windows.insert(
            job.chat_id.clone(),
            RateWindow {
                window_start: now,
                count: 1,
            },
        );
        false
    }

    fn should_send_failure_notice(&mut self, now: i64, job: &ScanJob, cooldown_ms: i64) -> bool {
        let key = job.notice_key();
        if self.failure_notices.get(&key).is_some_and(|expiry| *expiry > now) {
            return false;
        }
        self.failure_notices.insert(key, now.saturating_add(cooldown_ms));
        true
    }

    /// Amortized cleanup of expired admission state, at most once per interval
    fn maybe_prune(&mut self, now: i64, config: &ScanQueueConfig) {
        if now - self.last_prune_ms < config.prune_interval_ms() {
            return;
        }
        self.last_prune_ms = now;

        let budget = config.prune_batch_size;
        let window_ms = config.rate_window_ms;
        let removed = self.seen_urls.prune(budget, |expiry| *expiry <= now)
            + self.failure_notices.prune(budget, |expiry| *expiry <= now)
            + self
                .rate_windows
                .prune(budget, |window| now - window.window_start > window_ms);

        if removed > 0 {
            debug!(removed, "Pruned expired scan queue entries");
        }
    }

    fn clear(&mut self) {
        self.pending.clear();
        self.seen_urls.clear();
        self.rate_windows.clear();
        self.failure_notices.clear();
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

fn random_salt() -> String {
    use rand::Rng;

    let bytes: [u8; 8] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

// =============================================================================
// QUEUE
// =============================================================================

struct QueueInner {
    config: ScanQueueConfig,
    scan_options: ScanOptions,
    collaborators: QueueCollaborators,
    salt: String,
    state: Mutex<QueueState>,
}

/// Cheap to clone; clones share one queue
#[derive(Clone)]
pub struct InProcessScanQueue {
    inner: Arc<QueueInner>,
}

impl InProcessScanQueue {
    pub fn new(
        config: ScanQueueConfig,
        scan_options: ScanOptions,
        collaborators: QueueCollaborators,
    ) -> Result<Self, QueueError> {
        if config.concurrency < 1 {
            return Err(QueueError::InvalidConfig("concurrency must be >= 1".to_string()));
        }
        if config.rate_limit < 1 {
            return Err(QueueError::InvalidConfig("rate limit must be >= 1".to_string()));
        }
        if config.rate_window_ms < 1 {
            return Err(QueueError::InvalidConfig("rate window must be >= 1ms".to_string()));
        }

        Ok(Self {
            inner: Arc::new(QueueInner {
                config,
                scan_options,
                collaborators,
                salt: random_salt(),
                state: Mutex::new(QueueState::default()),
            }),
        })
    }

    /// Submit one URL for scanning.
    ///
    /// Duplicate and rate-limited requests are dropped silently but still
    /// receive a handle. Only a closed queue is an error.
    pub async fn add(&self, job_name: &str, job: ScanJob) -> Result<JobHandle, QueueError> {
        let inner = &self.inner;
        let config = &inner.config;
        let now = inner.collaborators.clock.now_ms();

        // Admission runs under one lock with no await in between
        let mut state = inner.state.lock().await;
        if state.closed {
            return Err(QueueError::Closed);
        }

        state.maybe_prune(now, config);
        let id = state.next_job_id(now, &inner.salt);

        if state.is_duplicate(now, &job, config.lineage_ttl_ms) {
            debug!(url = %job.url, chat_id = %job.chat_id, "Skipping duplicate scan request");
            return Ok(JobHandle { id, data: job });
        }

        if state.is_rate_limited(now, &job, config) {
            warn!(chat_id = %job.chat_id, "Rate limit reached for chat; dropping scan request");
            return Ok(JobHandle { id, data: job });
        }

        let handle = JobHandle { id, data: job };
        debug!(job_id = %handle.id, job_name, "Scan job queued");
        state.pending.push_back(handle.clone());
        drain(inner, &mut state);

        Ok(handle)
    }

    /// Stop admitting jobs and discard queued ones. Running jobs finish on
    /// their own and are not awaited.
    pub async fn close(&self) {
        let mut state = self.inner.state.lock().await;
        state.closed = true;
        let discarded = state.pending.len();
        state.clear();
        info!(discarded, in_flight = state.in_flight, "Scan queue closed");
    }

    pub async fn stats(&self) -> QueueStats {
        let state = self.inner.state.lock().await;
        QueueStats {
            queued: state.pending.len(),
            in_flight: state.in_flight,
            dedup_entries: state.seen_urls.len(),
            rate_windows: state.rate_windows.len(),
            failure_notices: state.failure_notices.len(),
            closed: state.closed,
        }
    }
}

/// Start queued jobs until the concurrency cap is reached
fn drain(inner: &Arc<QueueInner>, state: &mut QueueState) {
    while !state.closed && state.in_flight < inner.config.concurrency {
        let Some(handle) = state.pending.pop_front() else {
            return;
        };
        state.in_flight += 1;
        tokio::spawn(run_job(Arc::clone(inner), handle));
    }
}

async fn run_job(inner: Arc<QueueInner>, handle: JobHandle) {
    // A panicking scorer or adapter surfaces here as a JoinError
    let outcome = match tokio::spawn(process(Arc::clone(&inner), handle.data.clone())).await {
        Ok(result) => result,
        Err(e) => Err(ScanError::Aborted(e.to_string())),
    };

    if let Err(e) = outcome {
        inner.collaborators.metrics.verdict_failures.inc();
        error!(
            job_id = %handle.id,
            chat_id = %handle.data.chat_id,
            url = %handle.data.url,
            error = %e,
            "Scan job failed"
        );
        send_failure_notice(&inner, &handle.data).await;
    }

    let mut state = inner.state.lock().await;
    state.in_flight = state.in_flight.saturating_sub(1);
    drain(&inner, &mut state);
}

async fn process(inner: Arc<QueueInner>, job: ScanJob) -> Result<(), ScanError> {
    let collaborators = &inner.collaborators;
    let started = collaborators.clock.now_ms();

    let scored = collaborators.scorer.score(&job.url, &inner.scan_options).await?;
    let text = (collaborators.formatter)(scored.verdict.level, &scored.verdict.reasons, &scored.final_url);

    let sent = collaborators
        .adapter
        .send_message(
            &job.chat_id,
            MessageContent::text(text),
            SendOptions {
                quoted_message_id: Some(job.message_id.clone()),
            },
        )
        .await?;
    if !sent.success {
        return Err(ScanError::Delivery("Failed to send verdict message".to_string()));
    }

    let latency_ms = (collaborators.clock.now_ms() - started).max(0);
    collaborators.metrics.observe_delivery(latency_ms);
    info!(
        chat_id = %job.chat_id,
        url = %job.url,
        verdict = %scored.verdict.level,
        latency_ms,
        "Verdict dispatched"
    );
    Ok(())
}

async fn send_failure_notice(inner: &QueueInner, job: &ScanJob) {
    let now = inner.collaborators.clock.now_ms();
    let allowed = inner
        .state
        .lock()
        .await
        .should_send_failure_notice(now, job, inner.config.failure_reply_ttl_ms);
    if !allowed {
        debug!(chat_id = %job.chat_id, message_id = %job.message_id, "Failure notice suppressed");
        return;
    }

    let result = inner
        .collaborators
        .adapter
        .send_message(
            &job.chat_id,
            MessageContent::text(format_failure_notice(&job.url)),
            SendOptions {
                quoted_message_id: Some(job.message_id.clone()),
            },
        )
        .await;

    match result {
        Ok(sent) if sent.success => {},
        Ok(_) => warn!(chat_id = %job.chat_id, url = %job.url, "Failed to send scan failure reply"),
        Err(e) => warn!(chat_id = %job.chat_id, url = %job.url, error = %e, "Failed to send scan failure reply"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(chat: &str, hash: &str, group: bool) -> ScanJob {
        ScanJob {
            url: format!("https://{}.test", hash),
            url_hash: hash.to_string(),
            chat_id: chat.to_string(),
            message_id: format!("m-{}", hash),
            is_group: group,
        }
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn test_job_ids_sequence_within_millisecond() {
        let mut state = QueueState::default();
        assert_eq!(state.next_job_id(5, "salt"), "local:5:salt:0");
        assert_eq!(state.next_job_id(5, "salt"), "local:5:salt:1");
        assert_eq!(state.next_job_id(6, "salt"), "local:6:salt:0");
    }

    #[test]
    fn test_dedup_expires_after_lineage_ttl() {
        let mut state = QueueState::default();
        let j = job("c", "h", false);
        assert!(!state.is_duplicate(0, &j, 100));
        assert!(state.is_duplicate(99, &j, 100));
        assert!(!state.is_duplicate(100, &j, 100));
    }

    #[test]
    fn test_rate_window_is_fixed() {
        let config = ScanQueueConfig {
            rate_limit: 2,
            rate_window_ms: 1000,
            ..Default::default()
        };
        let mut state = QueueState::default();
        let j = job("group", "h", true);

        assert!(!state.is_rate_limited(0, &j, &config));
        assert!(!state.is_rate_limited(10, &j, &config));
        assert!(state.is_rate_limited(20, &j, &config));
        // Dropping does not extend the window
        assert!(state.is_rate_limited(1000, &j, &config));
        assert!(!state.is_rate_limited(1001, &j, &config));

        let direct = job("direct", "h", false);
        for now in 0..10 {
            assert!(!state.is_rate_limited(now, &direct, &config));
        }
        assert!(state.rate_windows.get("direct").is_none());
    }

    #[test]
    fn test_prune_respects_interval_and_liveness() {
        let config = ScanQueueConfig {
            lineage_ttl_ms: 100,
            rate_window_ms: 100,
            failure_reply_ttl_ms: 100,
            ..Default::default()
        };
        let mut state = QueueState::default();
        state.is_duplicate(0, &job("c", "old", true), config.lineage_ttl_ms);
        state.is_rate_limited(0, &job("c", "old", true), &config);
        state.should_send_failure_notice(0, &job("c", "old", true), config.failure_reply_ttl_ms);
        state.is_duplicate(150, &job("c", "new", true), config.lineage_ttl_ms);

        // Interval has not elapsed since the initial prune mark
        state.maybe_prune(50, &config);
        assert_eq!(state.seen_urls.len(), 2);

        state.maybe_prune(150, &config);
        assert_eq!(state.seen_urls.len(), 1);
        assert!(state.seen_urls.get("c:new").is_some());
        assert!(state.rate_windows.is_empty());
        assert!(state.failure_notices.is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        struct Never;

        #[async_trait]
        impl Scorer for Never {
            async fn score(&self, _: &str, _: &ScanOptions) -> Result<ScoredUrl, ScanError> {
                Err(ScanError::Scorer("unused".to_string()))
            }
        }

        #[async_trait]
        impl MessagingAdapter for Never {
            async fn send_message(
                &self,
                _: &str,
                _: MessageContent,
                _: SendOptions,
            ) -> Result<SendResult, ScanError> {
                Ok(SendResult { success: true })
            }
        }

        let collaborators = QueueCollaborators::new(Arc::new(Never), Arc::new(Never));
        for config in [
            ScanQueueConfig { concurrency: 0, ..Default::default() },
            ScanQueueConfig { rate_limit: 0, ..Default::default() },
            ScanQueueConfig { rate_window_ms: 0, ..Default::default() },
        ] {
            assert!(matches!(
                InProcessScanQueue::new(config, ScanOptions::default(), collaborators.clone()),
                Err(QueueError::InvalidConfig(_))
            ));
        }
    }
}
