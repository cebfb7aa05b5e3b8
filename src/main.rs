// Offline link checker
// Scores each URL argument against the local feeds and prints the result as JSON

use anyhow::{bail, Context};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wbscan_core::app_config;
use wbscan_core::{LocalFeedEngine, LocalFeedScorer, SystemClock, VerdictCache};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wbscan_core=info,wbscan=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let urls: Vec<String> = std::env::args().skip(1).collect();
    if urls.is_empty() {
        bail!("usage: wbscan <url>...");
    }

    let config = app_config::config();
    info!(feed_dir = %config.feeds.feed_dir.display(), enabled = config.feeds.enabled, "Loading local feeds");

    let clock = Arc::new(SystemClock);
    let engine = Arc::new(LocalFeedEngine::new(config.feeds.clone()));
    let cache = Arc::new(VerdictCache::new(&config.verdict_cache, clock.clone()));
    let scorer = LocalFeedScorer::new(engine, cache, clock);

    for url in &urls {
        let assessment = scorer.assess(url).await;
        let line = serde_json::to_string(&assessment).context("Failed to serialize result")?;
        println!("{}", line);
    }

    Ok(())
}
