// Verdict model shared by the scorer, verdict cache and message formatting

use serde::{Deserialize, Serialize};
use std::fmt;

/// Threat level attached to a scanned URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictLevel {
    Benign,
    Suspicious,
    Malicious,
}

impl VerdictLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictLevel::Benign => "benign",
            VerdictLevel::Suspicious => "suspicious",
            VerdictLevel::Malicious => "malicious",
        }
    }
}

impl fmt::Display for VerdictLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scorer output: level plus the human readable reasons behind it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub level: VerdictLevel,
    pub reasons: Vec<String>,
}

/// Verdict as stored in the in-memory verdict cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedVerdict {
    pub verdict: VerdictLevel,
    pub confidence: f32, // 0.0-1.0
    pub timestamp: i64,  // epoch ms when computed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_level_serializes_lowercase() {
        let json = serde_json::to_string(&VerdictLevel::Malicious).unwrap();
        assert_eq!(json, "\"malicious\"");
        let parsed: VerdictLevel = serde_json::from_str("\"suspicious\"").unwrap();
        assert_eq!(parsed, VerdictLevel::Suspicious);
        assert_eq!(VerdictLevel::Benign.to_string(), "benign");
    }
}
