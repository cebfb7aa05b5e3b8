pub mod scan;
pub mod signals;
pub mod verdict;

// Re-export common types
pub use scan::{
    JobHandle, MessageContent, MessageKind, ScanJob, ScanOptions, ScoredUrl, SendOptions,
    SendResult,
};
pub use signals::{LocalFeedSignals, TyposquatMatch, TyposquatMethod};
pub use verdict::{CachedVerdict, Verdict, VerdictLevel};
