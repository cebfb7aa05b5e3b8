// Scorer backed only by the local feeds
// Categorical verdicts from feed listings, memoized in the verdict cache by URL hash

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::models::scan::{ScanOptions, ScoredUrl};
use crate::models::signals::LocalFeedSignals;
use crate::models::verdict::{CachedVerdict, Verdict, VerdictLevel};
use crate::services::feeds::LocalFeedEngine;
use crate::services::scan_queue::{ScanError, Scorer};
use crate::services::verdict_cache::VerdictCache;
use crate::utils::clock::Clock;
use crate::utils::url_normalizer::{normalize_url, url_hash};

/// Result of one local assessment
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub final_url: String,
    pub verdict: Verdict,
    /// Absent when the verdict came from the cache
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signals: Option<LocalFeedSignals>,
}

/// Human readable reasons for each matched signal
pub fn reasons_for(signals: &LocalFeedSignals) -> Vec<String> {
    let mut reasons = Vec::new();
    if signals.openphish_listed {
        reasons.push("Known phishing (OpenPhish)".to_string());
    }
    if signals.urlhaus_listed {
        reasons.push("Known malware distribution (URLhaus)".to_string());
    }
    if signals.phishtank_listed {
        reasons.push("Verified phishing (Phishtank)".to_string());
    }
    if signals.cert_pl_listed {
        reasons.push("Listed as dangerous (CERT Polska)".to_string());
    }
    if signals.suspicious_domain_listed {
        reasons.push("Domain listed in suspicious activity feed".to_string());
    }
    if let (Some(target), Some(method)) = (&signals.typo_squat_target, signals.typo_squat_method) {
        reasons.push(format!("Possible typosquat of {} ({})", target, method));
    }
    reasons
}

/// Blocklist hit is malicious, heuristics alone are suspicious
pub fn level_for(signals: &LocalFeedSignals) -> VerdictLevel {
    if signals.has_blocklist_hit() {
        VerdictLevel::Malicious
    } else if signals.suspicious_domain_listed || signals.typo_squat_target.is_some() {
        VerdictLevel::Suspicious
    } else {
        VerdictLevel::Benign
    }
}

pub struct LocalFeedScorer {
    engine: Arc<LocalFeedEngine>,
    cache: Arc<VerdictCache>,
    clock: Arc<dyn Clock>,
}

impl LocalFeedScorer {
    pub fn new(engine: Arc<LocalFeedEngine>, cache: Arc<VerdictCache>, clock: Arc<dyn Clock>) -> Self {
        Self { engine, cache, clock }
    }

    pub async fn assess(&self, url: &str) -> Assessment {
        let final_url = normalize_url(url).unwrap_or_else(|| url.to_string());
        let key = url_hash(&final_url);

        if let Some(cached) = self.cache.get(&key).await {
            debug!(url = %final_url, verdict = %cached.verdict, "Verdict cache hit");
            return Assessment {
                final_url,
                verdict: Verdict {
                    level: cached.verdict,
                    reasons: cached.sources.unwrap_or_default(),
                },
                signals: None,
            };
        }

        let signals = self.engine.lookup_signals(&final_url);
        let verdict = Verdict {
            level: level_for(&signals),
            reasons: reasons_for(&signals),
        };

        // Listings are authoritative; heuristics and silence are not
        let confidence = if signals.has_blocklist_hit() {
            1.0
        } else if signals.is_empty() {
            0.0
        } else {
            0.5
        };
        let cached = CachedVerdict {
            verdict: verdict.level,
            confidence,
            timestamp: self.clock.now_ms(),
            sources: Some(verdict.reasons.clone()),
        };
        self.cache.set(&key, cached, None).await;

        Assessment {
            final_url,
            verdict,
            signals: Some(signals),
        }
    }
}

#[async_trait]
impl Scorer for LocalFeedScorer {
    async fn score(&self, url: &str, _options: &ScanOptions) -> Result<ScoredUrl, ScanError> {
        let assessment = self.assess(url).await;
        Ok(ScoredUrl {
            final_url: assessment.final_url,
            verdict: assessment.verdict,
        })
    }
}
