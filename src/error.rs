//! Error types for the feed enrichment pipeline.
//!
//! Only a few of these are fatal to a run: failing to read the upstream
//! feed, a broken configuration file, and failing to write the output.
//! Everything that goes wrong while handling a single article is logged
//! and absorbed by the pipeline.

/// Error type for every fallible operation in the crate.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The HTTP request itself failed (DNS, TLS, connection reset, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    /// The upstream (or seed) document is not a feed we can read.
    #[error("feed parsing failed: {0}")]
    FeedParse(#[from] feed_rs::parser::ParseFeedError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing the output document failed.
    #[error("XML serialization failed: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// A boilerplate or media-id pattern did not compile.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// A configured CSS selector did not parse.
    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Result type alias used across the crate.
pub type Result<T> = std::result::Result<T, FeedError>;
