//! Output generation.
//!
//! - [`rss`]: assembles and serializes the enriched feed document
//! - [`json`]: writes the per-run media-caption map as a sidecar file
//!
//! # Output Structure
//!
//! ```text
//! output/
//! ├── full_feed.xml     # enriched RSS 2.0 document
//! └── captions.json     # optional, link -> [MediaItem]
//! ```
//!
//! Both files are written to a temporary sibling first and renamed into
//! place, so readers never see a half-written document.

pub mod json;
pub mod rss;
