// Parsers for the on-disk feed formats
// Every parser produces a set of normalized entries; unusable lines are skipped

use serde::Deserialize;
use std::collections::HashSet;

use super::FeedError;
use crate::utils::url_normalizer::{normalize_domain, normalize_url};

// =============================================================================
// URL AND DOMAIN LISTS
// =============================================================================

fn content_lines(raw: &str) -> impl Iterator<Item = &str> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// One URL per line (openphish, urlhaus, phishtank)
pub fn parse_url_feed(raw: &str) -> HashSet<String> {
    content_lines(raw).filter_map(normalize_url).collect()
}

/// One domain per line (CERT Polska); extra columns after whitespace are ignored
pub fn parse_domain_feed(raw: &str) -> HashSet<String> {
    content_lines(raw)
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(normalize_domain)
        .collect()
}

// =============================================================================
// SANS SCORED DOMAINS
// =============================================================================

/// Loosely typed JSON field: feeds disagree on whether scores are numbers or strings
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Field {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl Field {
    fn as_text(&self) -> Option<&str> {
        match self {
            Field::Text(text) => Some(text),
            _ => None,
        }
    }

    fn as_score(&self) -> Option<f64> {
        let score = match self {
            Field::Number(n) => *n,
            Field::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    0.0
                } else {
                    text.parse().ok()?
                }
            },
            Field::Other(_) => return None,
        };
        score.is_finite().then_some(score)
    }
}

/// One record of the suspicious-domains feed
#[derive(Debug, Default, Deserialize)]
struct SansRecord {
    domainname: Option<Field>,
    domain: Option<Field>,
    name: Option<Field>,
    fqdn: Option<Field>,
    host: Option<Field>,
    score: Option<Field>,
    risk: Option<Field>,
    risk_score: Option<Field>,
    r: Option<Field>,
}

type FieldAccessor = fn(&SansRecord) -> Option<&Field>;

/// Domain aliases in priority order; the first one that normalizes wins
const DOMAIN_FIELDS: [FieldAccessor; 5] = [
    |r| r.domainname.as_ref(),
    |r| r.domain.as_ref(),
    |r| r.name.as_ref(),
    |r| r.fqdn.as_ref(),
    |r| r.host.as_ref(),
];

/// Score aliases in priority order; the first one present decides
const SCORE_FIELDS: [FieldAccessor; 4] = [
    |r| r.score.as_ref(),
    |r| r.risk.as_ref(),
    |r| r.risk_score.as_ref(),
    |r| r.r.as_ref(),
];

impl SansRecord {
    fn resolved_domain(&self) -> Option<String> {
        DOMAIN_FIELDS
            .iter()
            .find_map(|field| field(self).and_then(Field::as_text).and_then(normalize_domain))
    }

    fn resolved_score(&self) -> f64 {
        SCORE_FIELDS
            .iter()
            .find_map(|field| field(self))
            .and_then(Field::as_score)
            .unwrap_or(0.0)
    }
}

fn records_from_value(value: serde_json::Value) -> Vec<SansRecord> {
    let items = match value {
        serde_json::Value::Array(items) => items,
        other @ serde_json::Value::Object(_) => vec![other],
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect()
}

fn records_from_lines(raw: &str) -> Vec<SansRecord> {
    content_lines(raw)
        .filter(|line| line.starts_with('{'))
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect()
}

/// Parse the suspicious-domains feed.
///
/// Accepts a JSON array, a single JSON object, newline-delimited JSON or a
/// plain domain-per-line list. Plain lines always pass the score threshold.
/// A malformed JSON array is a parse error for the whole feed.
pub fn parse_sans_domains(raw: &str, min_score: f64) -> Result<HashSet<String>, FeedError> {
    let trimmed = raw.trim();
    let mut domains = HashSet::new();
    if trimmed.is_empty() {
        return Ok(domains);
    }

    let records = if trimmed.starts_with('[') {
        let value = serde_json::from_str(trimmed)
            .map_err(|e| FeedError::Parse(format!("invalid JSON array: {}", e)))?;
        records_from_value(value)
    } else if trimmed.starts_with('{') {
        match serde_json::from_str(trimmed) {
            Ok(value) => records_from_value(value),
            Err(_) => records_from_lines(trimmed),
        }
    } else {
        for line in content_lines(trimmed).filter(|line| !line.starts_with('{')) {
            if let Some(domain) = normalize_domain(line) {
                domains.insert(domain);
            }
        }
        records_from_lines(trimmed)
    };

    for record in records {
        if record.resolved_score() < min_score {
            continue;
        }
        if let Some(domain) = record.resolved_domain() {
            domains.insert(domain);
        }
    }

    Ok(domains)
}

// =============================================================================
// TESTS
// =============================================================================
