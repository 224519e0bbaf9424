//! # Ark Full Feed
//!
//! Turns The Ark Newspaper's summary-only RSS feed into a full-content feed.
//! Each item's article page is fetched, its body extracted and cleaned, its
//! figures and captions collected, and the result written back out as an
//! RSS 2.0 document with `content:encoded`, `media:content` and Dublin Core
//! elements.
//!
//! ## Usage
//!
//! ```sh
//! ark_full_feed -o public/full_feed.xml
//! RUST_LOG=debug ark_full_feed -c ark.yaml --captions-json public/captions.json
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Indexing**: Fetch and parse the upstream feed (fatal on failure)
//! 2. **Fetching**: Download each article page, in feed order
//! 3. **Extraction**: Body via a selector fallback chain, figures and captions
//! 4. **Cleaning**: Repair garbled punctuation, dedupe, drop boilerplate, bound length
//! 5. **Output**: Assemble and serialize the feed, write it atomically

use chrono::Utc;
use clap::Parser;
use std::error::Error;
use std::path::Path;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cleaning;
mod cli;
mod config;
mod error;
mod extraction;
mod fetch;
mod models;
mod outputs;
mod pipeline;
mod sources;
mod utils;

use cli::Cli;
use config::{ChannelOverrides, Config};
use fetch::{HttpFetcher, RetryFetch};
use models::ChannelMeta;
use outputs::{json, rss};
use pipeline::Enricher;
use utils::write_atomically;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("ark_full_feed starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // ---- Config ----
    let mut config = Config::load(args.config.as_deref())?;
    args.apply_overrides(&mut config);
    info!(feed_url = %config.feed_url, max_chars = config.max_chars, "Effective configuration");

    let enricher = Enricher::from_config(&config)?;
    let fetcher = RetryFetch::from_settings(HttpFetcher::new(&config.fetch)?, &config.fetch);

    // ---- Index upstream feed ----
    let source_items = match sources::index_articles(&fetcher, &config.feed_url).await {
        Ok(items) => items,
        Err(e) => {
            error!(url = %config.feed_url, error = %e, "Could not read upstream feed; nothing written");
            return Err(e.into());
        }
    };
    if source_items.is_empty() {
        warn!("Upstream feed has no items with links");
    }

    // ---- Enrich items ----
    let run = pipeline::enrich_items(&fetcher, &enricher, &source_items).await;

    // ---- Assemble and write ----
    let channel = resolve_channel(args.seed_from.as_deref(), &config.channel).await;
    let feed = rss::assemble(&run.items, &run.contents, &run.media_by_link, channel, Utc::now());
    let document = rss::serialize(&feed)?;

    if let Err(e) = write_atomically(&args.output, &document).await {
        error!(path = %args.output.display(), error = %e, "Failed writing feed document");
        return Err(e.into());
    }
    info!(path = %args.output.display(), items = feed.items.len(), bytes = document.len(), "Wrote full-content feed");

    if let Some(path) = &args.captions_json {
        if let Err(e) = json::write_captions(&run.media_by_link, path).await {
            error!(path = %path.display(), error = %e, "Failed to write caption map");
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        items = run.items.len(),
        with_content = run.with_content(),
        with_media = run.with_media(),
        failed_fetches = run.failed_fetches,
        "Execution complete"
    );

    Ok(())
}

/// Channel metadata for this run: built-in defaults, then whatever a previous
/// document carried, then the config file's `channel` section.
async fn resolve_channel(seed_from: Option<&Path>, overrides: &ChannelOverrides) -> ChannelMeta {
    let mut channel = ChannelMeta::default();

    if let Some(path) = seed_from {
        match tokio::fs::read(path).await {
            Ok(bytes) => match sources::seed_channel_meta(&bytes, channel.clone()) {
                Ok(seeded) => {
                    info!(path = %path.display(), title = %seeded.title, "Seeded channel metadata");
                    channel = seeded;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Seed document unreadable; using defaults"),
            },
            Err(e) => warn!(path = %path.display(), error = %e, "Seed document missing; using defaults"),
        }
    }

    overrides.apply(channel)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREVIOUS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>The Ark (Full Text, archived)</title>
    <link>https://archive.example/news</link>
    <description>Seeded description</description>
    <language>en-gb</language>
  </channel>
</rss>"#;

    #[tokio::test]
    async fn test_channel_precedence_defaults_seed_overrides() {
        let dir = std::env::temp_dir().join(format!("ark_full_feed-seed-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let seed = dir.join("previous.xml");
        tokio::fs::write(&seed, PREVIOUS).await.unwrap();

        let overrides = ChannelOverrides {
            title: Some("The Ark Newspaper".to_string()),
            ..Default::default()
        };
        let channel = resolve_channel(Some(&seed), &overrides).await;

        // config override beats the seed
        assert_eq!(channel.title, "The Ark Newspaper");
        // seed beats the defaults
        assert_eq!(channel.description, "Seeded description");
        assert_eq!(channel.language, "en-gb");
        // untouched by either
        assert_eq!(channel.generator, ChannelMeta::default().generator);

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_missing_seed_falls_back_to_defaults() {
        let missing = std::env::temp_dir().join("ark_full_feed-no-such-seed.xml");
        let channel = resolve_channel(Some(&missing), &ChannelOverrides::default()).await;
        assert_eq!(channel, ChannelMeta::default());
    }
}
