// Signals produced by the local threat-feed engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Edit that turns a popular domain into the observed typosquat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TyposquatMethod {
    #[serde(rename = "missing-char")]
    MissingChar,
    #[serde(rename = "hyphen")]
    Hyphen,
    #[serde(rename = "extra-char")]
    ExtraChar,
    #[serde(rename = "swap")]
    Swap,
}

impl TyposquatMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TyposquatMethod::MissingChar => "missing-char",
            TyposquatMethod::Hyphen => "hyphen",
            TyposquatMethod::ExtraChar => "extra-char",
            TyposquatMethod::Swap => "swap",
        }
    }
}

impl fmt::Display for TyposquatMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected typosquat: the popular domain it imitates and how
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TyposquatMatch {
    pub target: String,
    pub method: TyposquatMethod,
}

/// Per-feed hits for one URL. Absent feeds leave their flag unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalFeedSignals {
    pub openphish_listed: bool,
    pub urlhaus_listed: bool,
    pub phishtank_listed: bool,
    pub cert_pl_listed: bool,
    pub suspicious_domain_listed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typo_squat_target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typo_squat_method: Option<TyposquatMethod>,
}

impl LocalFeedSignals {
    /// True when any hard blocklist (URL feeds or CERT Polska) matched
    pub fn has_blocklist_hit(&self) -> bool {
        self.openphish_listed || self.urlhaus_listed || self.phishtank_listed || self.cert_pl_listed
    }

    pub fn is_empty(&self) -> bool {
        !self.has_blocklist_hit()
            && !self.suspicious_domain_listed
            && self.typo_squat_target.is_none()
    }

    pub(crate) fn set_typosquat(&mut self, found: TyposquatMatch) {
        self.typo_squat_target = Some(found.target);
        self.typo_squat_method = Some(found.method);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signals_serialize_camel_case() {
        let mut signals = LocalFeedSignals {
            cert_pl_listed: true,
            ..Default::default()
        };
        signals.set_typosquat(TyposquatMatch {
            target: "google.com".to_string(),
            method: TyposquatMethod::MissingChar,
        });

        let json = serde_json::to_value(&signals).unwrap();
        assert_eq!(json["certPlListed"], true);
        assert_eq!(json["typoSquatTarget"], "google.com");
        assert_eq!(json["typoSquatMethod"], "missing-char");
        assert!(signals.has_blocklist_hit());
        assert!(!signals.is_empty());
    }

    #[test]
    fn test_default_signals_are_empty() {
        let signals = LocalFeedSignals::default();
        assert!(signals.is_empty());
        let json = serde_json::to_value(&signals).unwrap();
        assert!(json.get("typoSquatTarget").is_none());
    }
}
