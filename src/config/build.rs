//! `[build]` section configuration.
//!
//! Contains paths, the render command, templates and aggregate outputs.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the aggregates read document metadata from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataSource {
    /// Thread the parsed front-matter straight through (default).
    #[default]
    Frontmatter,
    /// Scrape the rendered HTML on disk.
    Rendered,
}

/// `[build]` section in folio.toml - build pipeline configuration.
///
/// # Example
/// ```toml
/// [build]
/// content = "content"
/// output = "public"
/// posts = "posts"
/// jobs = 4
///
/// [build.render]
/// command = ["pandoc"]
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Project root directory (usually set via CLI `--root`).
    #[serde(default = "defaults::build::root")]
    #[educe(Default = defaults::build::root())]
    pub root: Option<PathBuf>,

    /// Content source directory (Markdown files and co-located assets).
    #[serde(default = "defaults::build::content")]
    #[educe(Default = defaults::build::content())]
    pub content: PathBuf,

    /// Build output directory.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Static assets directory, copied to the output root.
    #[serde(default = "defaults::build::assets")]
    #[educe(Default = defaults::build::assets())]
    pub assets: PathBuf,

    /// Posts directory, relative to `content`.
    #[serde(default = "defaults::build::posts")]
    #[educe(Default = defaults::build::posts())]
    pub posts: PathBuf,

    /// Metadata source for index/sitemap/feed.
    #[serde(default)]
    pub metadata: MetadataSource,

    /// Worker threads for rendering (default: number of CPUs).
    #[serde(default = "defaults::build::jobs")]
    #[educe(Default = defaults::build::jobs())]
    pub jobs: Option<usize>,

    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub templates: TemplatesConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub sitemap: SitemapConfig,

    #[serde(default)]
    pub feed: FeedConfig,
}

// ============================================================================
// Sub-configurations
// ============================================================================

/// `[build.render]` section - the external Markdown renderer.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct RenderConfig {
    /// Render command and leading arguments
    #[serde(default = "defaults::build::render::command")]
    #[educe(Default = defaults::build::render::command())]
    pub command: Vec<String>,

    /// Extra arguments appended before the per-document ones
    #[serde(default = "defaults::build::render::args")]
    #[educe(Default = defaults::build::render::args())]
    pub args: Vec<String>,
}

/// `[build.templates]` section
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct TemplatesConfig {
    #[serde(default = "defaults::build::templates::post")]
    #[educe(Default = defaults::build::templates::post())]
    pub post: PathBuf,

    #[serde(default = "defaults::build::templates::page")]
    #[educe(Default = defaults::build::templates::page())]
    pub page: PathBuf,

    #[serde(default = "defaults::build::templates::index")]
    #[educe(Default = defaults::build::templates::index())]
    pub index: PathBuf,

    /// Shared files every rendered document depends on (headers, styles).
    #[serde(default)]
    pub partials: Vec<PathBuf>,
}

/// `[build.index]` section
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct IndexConfig {
    /// Output path of the listing page.
    #[serde(default = "defaults::build::index::path")]
    #[educe(Default = defaults::build::index::path())]
    pub path: PathBuf,
}

/// `[build.sitemap]` section
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SitemapConfig {
    #[serde(default = "defaults::build::sitemap::path")]
    #[educe(Default = defaults::build::sitemap::path())]
    pub path: PathBuf,
}

/// `[build.feed]` section
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct FeedConfig {
    #[serde(default = "defaults::build::feed::path")]
    #[educe(Default = defaults::build::feed::path())]
    pub path: PathBuf,
}

// ============================================================================
// Tests
// ============================================================================
