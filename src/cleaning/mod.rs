//! Text cleanup applied to everything taken from the source site.
//!
//! - [`normalizer`]: repairs mis-encoded punctuation, entities and spacing
//! - [`boilerplate`]: recognizes subscription, footer and legal text
//! - [`dedup`]: drops sentences and paragraphs the site's templates repeat

pub mod boilerplate;
pub mod dedup;
pub mod normalizer;
