// Utility modules for the scan orchestration core

pub mod clock;
pub mod url_normalizer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use url_normalizer::{normalize_domain, normalize_url, registrable_domain, url_hash};
