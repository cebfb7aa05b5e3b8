// Scan job model and the collaborator payloads exchanged by the scan queue

use serde::{Deserialize, Serialize};

use crate::models::verdict::Verdict;

// =============================================================================
// JOB DATA
// =============================================================================

/// One URL to evaluate inside one chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanJob {
    pub url: String,
    pub url_hash: String,
    pub chat_id: String,
    pub message_id: String,
    #[serde(default)]
    pub is_group: bool,
}

impl ScanJob {
    /// Dedup key: one entry per URL per chat
    pub fn dedup_key(&self) -> String {
        format!("{}:{}", self.chat_id, self.url_hash)
    }

    /// Failure-notice key: one notice per message
    pub fn notice_key(&self) -> String {
        format!("{}:{}", self.chat_id, self.message_id)
    }
}

/// Handle returned to the submitter, whether or not the job was admitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobHandle {
    pub id: String,
    pub data: ScanJob,
}

/// Fixed options forwarded to the scorer for every job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOptions {
    pub follow_redirects: bool,
    pub max_redirects: u32,
    pub timeout_ms: u64,
    pub enable_external_enrichers: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            follow_redirects: false,
            max_redirects: 3,
            timeout_ms: 4000,
            enable_external_enrichers: false,
        }
    }
}

/// Scorer result for one URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredUrl {
    pub final_url: String,
    pub verdict: Verdict,
}

// =============================================================================
// MESSAGING PAYLOADS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
}

/// Outgoing chat message body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub text: String,
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Text,
            text: text.into(),
        }
    }
}

/// Delivery options; replies quote the message that carried the URL
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOptions {
    pub quoted_message_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResult {
    pub success: bool,
}
