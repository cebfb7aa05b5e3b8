// Local threat-feed engine
// Matches URLs and domains against offline intelligence feeds (OpenPhish,
// URLhaus, Phishtank, CERT Polska, SANS suspicious domains) and detects
// typosquats of popular domains. Lookups never fail: a missing or broken
// feed simply contributes no signal.

pub mod cache;
pub mod parsers;
pub mod typosquat;

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::debug;

use crate::app_config::FeedConfig;
use crate::models::signals::LocalFeedSignals;
use crate::utils::url_normalizer::{
    hostname_of, is_ip_literal, normalize_url, registrable_domain, split_first_label,
};

pub use cache::{FeedCaches, FeedSnapshot, SharedSnapshot};
pub use typosquat::TopDomains;

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Why a feed contributed nothing; never escapes `lookup_signals`
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Feed unavailable: {0}")]
    Io(#[from] std::io::Error),

    #[error("Feed parse error: {0}")]
    Parse(String),
}

// =============================================================================
// FEED ENGINE
// =============================================================================

pub struct LocalFeedEngine {
    config: FeedConfig,
    caches: Mutex<FeedCaches>,
}

impl LocalFeedEngine {
    pub fn new(config: FeedConfig) -> Self {
        Self {
            config,
            caches: Mutex::new(FeedCaches::default()),
        }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    fn caches(&self) -> MutexGuard<'_, FeedCaches> {
        // Snapshots are swapped whole, so a panicked holder cannot leave one half-written
        self.caches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop all parsed snapshots
    pub fn reset(&self) {
        self.caches().reset();
    }

    /// Bring every snapshot up to date with the files on disk
    fn refresh_all(&self) -> FeedCaches {
        let cfg = &self.config;
        let min_score = cfg.sans_score_min;
        let mut guard = self.caches();
        let caches = &mut *guard;

        caches.openphish = cache::refresh("openphish", &caches.openphish, &cfg.openphish_path, |raw| {
            Ok(parsers::parse_url_feed(raw))
        });
        caches.urlhaus = cache::refresh("urlhaus", &caches.urlhaus, &cfg.urlhaus_path, |raw| {
            Ok(parsers::parse_url_feed(raw))
        });
        caches.phishtank = cache::refresh("phishtank", &caches.phishtank, &cfg.phishtank_path, |raw| {
            Ok(parsers::parse_url_feed(raw))
        });
        caches.certpl = cache::refresh("certpl", &caches.certpl, &cfg.certpl_path, |raw| {
            Ok(parsers::parse_domain_feed(raw))
        });
        caches.sans = cache::refresh("sans", &caches.sans, &cfg.sans_path, |raw| {
            parsers::parse_sans_domains(raw, min_score)
        });
        caches.top_domains = cache::refresh("top-domains", &caches.top_domains, &cfg.top_domains_path, |raw| {
            Ok(TopDomains::parse(raw))
        });

        FeedCaches {
            openphish: caches.openphish.clone(),
            urlhaus: caches.urlhaus.clone(),
            phishtank: caches.phishtank.clone(),
            certpl: caches.certpl.clone(),
            sans: caches.sans.clone(),
            top_domains: caches.top_domains.clone(),
        }
    }

    /// Report which local feeds list `final_url` and whether its host
    /// imitates a popular domain
    pub fn lookup_signals(&self, final_url: &str) -> LocalFeedSignals {
        let mut signals = LocalFeedSignals::default();
        if !self.config.enabled {
            return signals;
        }

        let normalized = normalize_url(final_url).unwrap_or_else(|| final_url.to_string());
        let hostname = hostname_of(&normalized).unwrap_or_default();

        let feeds = self.refresh_all();

        signals.openphish_listed = url_listed(&feeds.openphish, &normalized);
        signals.urlhaus_listed = url_listed(&feeds.urlhaus, &normalized);
        signals.phishtank_listed = url_listed(&feeds.phishtank, &normalized);

        if !hostname.is_empty() {
            if let Some(certpl) = &feeds.certpl {
                signals.cert_pl_listed = suffix_walk(&hostname)
                    .iter()
                    .any(|candidate| certpl.entries.contains(candidate));
            }

            if let Some(sans) = &feeds.sans {
                signals.suspicious_domain_listed = sans.entries.contains(&hostname);
            }

            if let Some(top) = &feeds.top_domains {
                if let Some(found) = top.entries.find_typosquat(&hostname) {
                    signals.set_typosquat(found);
                }
            }
        }

        if !signals.is_empty() {
            debug!(url = %normalized, ?signals, "Local feed match");
        }
        signals
    }
}

fn url_listed(snapshot: &SharedSnapshot<HashSet<String>>, url: &str) -> bool {
    snapshot.as_ref().is_some_and(|s| s.entries.contains(url))
}

/// Hostname and each parent domain down to the registrable domain:
/// `a.b.c.com` yields `a.b.c.com`, `b.c.com`, `c.com`. IP literals yield
/// only themselves.
pub fn suffix_walk(hostname: &str) -> Vec<String> {
    let hostname = hostname.trim_end_matches('.');
    if is_ip_literal(hostname) {
        return vec![hostname.to_string()];
    }
    let Some(registrable) = registrable_domain(hostname) else {
        return vec![hostname.to_string()];
    };

    let mut walk = Vec::new();
    let mut current = hostname;
    loop {
        walk.push(current.to_string());
        if current == registrable || current.len() <= registrable.len() {
            break;
        }
        match split_first_label(current) {
            Some((_, parent)) => current = parent,
            None => break,
        }
    }
    walk
}
