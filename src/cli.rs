//! Command-line interface definitions for the full-content feed generator.
//!
//! Every option is optional; with no arguments the program reads the
//! built-in upstream feed and writes `output/full_feed.xml`.

use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;

/// Command-line arguments.
///
/// CLI values win over the config file, which wins over built-in defaults.
///
/// # Examples
///
/// ```sh
/// # Defaults
/// ark_full_feed
///
/// # Custom output and a config file
/// ark_full_feed -o public/full_feed.xml -c ark.yaml
///
/// # Keep channel metadata from the last published document
/// ark_full_feed --seed-from public/full_feed.xml --captions-json public/captions.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Upstream RSS feed to enrich
    #[arg(long, env = "ARK_FEED_URL")]
    pub feed_url: Option<String>,

    /// Path of the enriched RSS document
    #[arg(short, long, default_value = "output/full_feed.xml")]
    pub output: PathBuf,

    /// Optional path to config.yaml file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Target length of each item's content, in characters
    #[arg(long)]
    pub max_chars: Option<usize>,

    /// Previously generated document to copy channel metadata from
    #[arg(long)]
    pub seed_from: Option<PathBuf>,

    /// Also write the media-caption map as JSON to this path
    #[arg(long)]
    pub captions_json: Option<PathBuf>,
}

impl Cli {
    /// Apply the CLI's overrides on top of a loaded config.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(url) = &self.feed_url {
            config.feed_url = url.clone();
        }
        if let Some(max) = self.max_chars {
            config.max_chars = max;
        }
    }
}
