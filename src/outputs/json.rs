//! JSON sidecar of the per-run media-caption map.
//!
//! The map is keyed by article link and lists every image found for that
//! article, in page order. Downstream tooling that only needs captions can
//! read this instead of parsing the feed.
//!
//! ```json
//! {
//!   "https://example.com/a1": [
//!     { "url": "https://...", "caption": "The ferry leaving the dock", "medium": "image" }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{info, instrument};

use crate::error::Result;
use crate::models::MediaItem;
use crate::utils::write_atomically;

/// Render the caption map as pretty JSON with links in sorted order.
pub fn captions_to_json(media_by_link: &HashMap<String, Vec<MediaItem>>) -> Result<String> {
    let sorted: BTreeMap<&String, &Vec<MediaItem>> = media_by_link
        .iter()
        .filter(|(_, media)| !media.is_empty())
        .collect();
    Ok(serde_json::to_string_pretty(&sorted)?)
}

/// Write the caption map to `path` atomically.
///
/// # Arguments
///
/// * `media_by_link` - Images per article link for this run
/// * `path` - Destination; the parent directory is created if missing
///
/// # Errors
///
/// Returns an error if serialization or the file write fails. The previous
/// file, if any, is left in place.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_captions(media_by_link: &HashMap<String, Vec<MediaItem>>, path: &Path) -> Result<()> {
    let json = captions_to_json(media_by_link)?;
    write_atomically(path, json.as_bytes()).await?;
    info!(articles = media_by_link.len(), "Wrote caption map");
    Ok(())
}
