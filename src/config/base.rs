//! `[base]` section configuration.
//!
//! Site-wide metadata consumed by the renderer and the aggregates.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[base]` section in folio.toml - basic site metadata.
///
/// # Example
/// ```toml
/// [base]
/// title = "My Blog"
/// description = "Notes on Rust and other things"
/// author = "Alice"
/// url = "https://myblog.com"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct BaseConfig {
    /// Site title, used by the index and as the feed title.
    pub title: String,

    /// Default site description: feed subtitle and fallback entry summary.
    pub description: String,

    /// Author name passed to templates and the feed.
    #[serde(default = "defaults::base::author")]
    #[educe(Default = defaults::base::author())]
    pub author: String,

    /// Base URL for absolute links in sitemap/feed. Required for `build`.
    #[serde(default = "defaults::base::url")]
    #[educe(Default = defaults::base::url())]
    pub url: Option<String>,
}

impl BaseConfig {
    /// Base URL without a trailing slash (empty when unset).
    pub fn base_url(&self) -> &str {
        self.url.as_deref().unwrap_or_default().trim_end_matches('/')
    }
}
