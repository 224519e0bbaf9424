//! Reading the upstream feed and previously published output.
//!
//! Dialect handling (RSS 0.9x/1.0/2.0, Atom, JSON Feed) is left to
//! `feed-rs`; this module only maps its model onto [`SourceItem`] and
//! [`ChannelMeta`].

use feed_rs::model::{Entry, Feed};
use feed_rs::parser;
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::fetch::FetchAsync;
use crate::models::{ChannelMeta, SourceItem};

/// Fetch and parse the upstream feed. Any failure here is fatal to the run.
///
/// # Arguments
///
/// * `fetcher` - Used for the single feed request
/// * `feed_url` - Upstream RSS or Atom document
///
/// # Returns
///
/// Items with a link, in feed order.
///
/// # Errors
///
/// Returns the fetch error, or [`crate::error::FeedError::FeedParse`] when
/// the body is not a feed.
#[instrument(level = "info", skip(fetcher))]
pub async fn index_articles<F: FetchAsync>(fetcher: &F, feed_url: &str) -> Result<Vec<SourceItem>> {
    let body = fetcher.fetch(feed_url).await?;
    let items = parse_source_feed(body.as_bytes())?;
    info!(count = items.len(), source = feed_url, "Indexed upstream feed items");
    Ok(items)
}

/// Parse feed bytes into source items, in feed order. Entries without a
/// link cannot be enriched and are skipped.
pub fn parse_source_feed(bytes: &[u8]) -> Result<Vec<SourceItem>> {
    let feed = parser::parse(bytes)?;
    let items = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let item = source_item(entry);
            if item.is_none() {
                warn!("Skipping feed entry without a link");
            }
            item
        })
        .collect();
    Ok(items)
}

fn source_item(entry: Entry) -> Option<SourceItem> {
    let link = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref().is_none_or(|rel| rel == "alternate"))
        .or_else(|| entry.links.first())
        .map(|l| l.href.trim().to_string())
        .filter(|href| !href.is_empty())?;

    let guid = Some(entry.id.trim().to_string()).filter(|id| !id.is_empty() && !is_generated_id(id));

    Some(SourceItem {
        title: entry.title.map(|t| t.content).unwrap_or_default(),
        description: entry.summary.map(|t| t.content).unwrap_or_default(),
        guid,
        published_at: entry.published.or(entry.updated),
        creator: entry
            .authors
            .into_iter()
            .map(|p| p.name.trim().to_string())
            .find(|name| !name.is_empty()),
        categories: entry
            .categories
            .into_iter()
            .map(|c| c.label.unwrap_or(c.term).trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
        link,
    })
}

/// `feed-rs` invents a hex digest id for entries that carry none; those are
/// not worth publishing as an identifier.
fn is_generated_id(id: &str) -> bool {
    matches!(id.len(), 32 | 64) && id.chars().all(|c| c.is_ascii_hexdigit())
}

/// Channel metadata from a previously published output document. Fields the
/// old document lacks keep the values from `defaults`.
pub fn seed_channel_meta(bytes: &[u8], defaults: ChannelMeta) -> Result<ChannelMeta> {
    let feed = parser::parse(bytes)?;
    Ok(merge_channel(feed, defaults))
}

fn merge_channel(feed: Feed, defaults: ChannelMeta) -> ChannelMeta {
    let self_link = feed
        .links
        .iter()
        .find(|l| l.rel.as_deref() == Some("self"))
        .map(|l| l.href.clone());
    let site_link = feed
        .links
        .iter()
        .find(|l| l.rel.as_deref() != Some("self"))
        .map(|l| l.href.clone());

    ChannelMeta {
        title: feed.title.map(|t| t.content).unwrap_or(defaults.title),
        link: site_link.unwrap_or(defaults.link),
        description: feed.description.map(|t| t.content).unwrap_or(defaults.description),
        language: feed.language.unwrap_or(defaults.language),
        generator: defaults.generator,
        self_link: self_link.unwrap_or(defaults.self_link),
    }
}
