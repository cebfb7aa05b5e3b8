// Scan queue instruments
// Verdict delivery counters and latency. Queues record into the process-wide
// set registered with the default Prometheus registry unless handed their own.

use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Registry, TextEncoder};
use std::sync::Arc;
use tracing::warn;

const LATENCY_BUCKETS: [f64; 7] = [0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 40.0];

pub struct ScanQueueMetrics {
    /// Verdict replies delivered to a chat
    pub verdicts_sent: Counter,
    /// Jobs that failed to score or deliver
    pub verdict_failures: Counter,
    /// Seconds from scan start to delivered verdict
    pub verdict_latency: Histogram,
}

impl ScanQueueMetrics {
    /// Unregistered instruments
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            verdicts_sent: Counter::new(
                "wbscan_wa_verdict_messages_sent_total",
                "Verdict messages sent back to WhatsApp chats",
            )?,
            verdict_failures: Counter::new(
                "wbscan_wa_verdict_messages_failed_total",
                "Failed attempts to send verdict messages",
            )?,
            verdict_latency: Histogram::with_opts(
                HistogramOpts::new(
                    "wbscan_wa_verdict_delivery_latency_seconds",
                    "Latency between scan start and WhatsApp delivery",
                )
                .buckets(LATENCY_BUCKETS.to_vec()),
            )?,
        })
    }

    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.verdicts_sent.clone()))?;
        registry.register(Box::new(self.verdict_failures.clone()))?;
        registry.register(Box::new(self.verdict_latency.clone()))?;
        Ok(())
    }

    pub(crate) fn observe_delivery(&self, latency_ms: i64) {
        self.verdicts_sent.inc();
        self.verdict_latency.observe(latency_ms.max(0) as f64 / 1000.0);
    }
}

lazy_static! {
    /// Instruments shared by every queue built with default collaborators
    pub static ref SCAN_QUEUE_METRICS: Arc<ScanQueueMetrics> = {
        let metrics = ScanQueueMetrics::new().expect("scan queue metric definitions are valid");
        if let Err(e) = metrics.register(prometheus::default_registry()) {
            warn!(error = %e, "Scan queue metrics not registered");
        }
        Arc::new(metrics)
    };
}

/// Encode everything in the default registry in the Prometheus text format
pub fn gather_metrics() -> prometheus::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
