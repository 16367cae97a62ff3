//! Content store: the immutable per-build snapshot of source files.
//!
//! Discovery walks the content and assets directories once at build start.
//! Nothing later in the build looks at the filesystem for new sources.
//!
//! ```text
//! content/
//! ├── about.md                 Page
//! ├── images/logo.png          asset (copied)
//! └── posts/
//!     ├── 2021-01-01-hello.md  Post
//!     └── 2020/06/01/summer.md Post
//! ```

pub mod frontmatter;

pub use frontmatter::FrontMatter;

use crate::{config::SiteConfig, error::BuildError};
use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// Files to ignore during directory traversal
const IGNORED_FILES: &[&str] = &[".DS_Store"];

/// Extensions handed to the renderer; anything else is copied verbatim.
const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Page,
    Post,
}

/// A Markdown source with its parsed front-matter.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Absolute source path
    pub source: PathBuf,
    /// Path relative to the content root (identity)
    pub relative: PathBuf,
    pub kind: Kind,
    pub front: FrontMatter,
    /// Body with the front-matter block removed
    pub body: String,
}

impl SourceDocument {
    /// Read and parse one document.
    ///
    /// Posts without a `date` take it from their path when possible.
    pub fn load(source: PathBuf, relative: PathBuf, kind: Kind) -> Result<Self> {
        let text = fs::read_to_string(&source)
            .with_context(|| format!("Failed to read {}", source.display()))?;
        let (yaml, body) = frontmatter::split(&text);

        let mut front = FrontMatter::parse(yaml.unwrap_or_default()).map_err(|e| {
            BuildError::FrontMatter {
                path: source.clone(),
                source: e,
            }
        })?;
        if kind == Kind::Post && front.date.is_none() {
            front.date = frontmatter::date_from_path(&relative);
        }

        Ok(Self {
            source,
            relative,
            kind,
            front,
            body: body.to_owned(),
        })
    }

    /// Output HTML path mirroring the source tree.
    pub fn output_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(&self.relative).with_extension("html")
    }

    /// Canonical absolute URL of the rendered document.
    pub fn url(&self, base_url: &str) -> String {
        url_for(base_url, &self.relative.with_extension("html"))
    }
}

/// A file copied verbatim to `output_dir/relative`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub source: PathBuf,
    pub relative: PathBuf,
}

/// Everything discovered at build start.
#[derive(Debug, Default)]
pub struct ContentSnapshot {
    /// Sorted by relative path.
    pub documents: Vec<SourceDocument>,
    /// Sorted by source path.
    pub assets: Vec<Asset>,
}

impl ContentSnapshot {
    /// Walk the content and assets directories and parse every document.
    pub fn discover(config: &SiteConfig) -> Result<Self> {
        let content = &config.build.content;
        let output = &config.build.output;
        let posts = config.posts_dir();
        if !content.is_dir() {
            bail!("Content directory `{}` does not exist", content.display());
        }

        let mut markdown = Vec::new();
        let mut assets = Vec::new();
        for path in collect_all_files(content)? {
            if path.starts_with(output) {
                continue;
            }
            let relative = path.strip_prefix(content)?.to_path_buf();
            if is_markdown(&path) {
                let kind = if path.starts_with(&posts) {
                    Kind::Post
                } else {
                    Kind::Page
                };
                markdown.push((path, relative, kind));
            } else {
                assets.push(Asset {
                    source: path,
                    relative,
                });
            }
        }

        let asset_dir = &config.build.assets;
        if asset_dir.is_dir() {
            for path in collect_all_files(asset_dir)? {
                let relative = path.strip_prefix(asset_dir)?.to_path_buf();
                assets.push(Asset {
                    source: path,
                    relative,
                });
            }
        }

        let mut documents = markdown
            .into_par_iter()
            .map(|(source, relative, kind)| SourceDocument::load(source, relative, kind))
            .collect::<Result<Vec<_>>>()?;
        documents.sort_by(|a, b| a.relative.cmp(&b.relative));
        assets.sort_by(|a, b| a.source.cmp(&b.source));

        Ok(Self { documents, assets })
    }

    pub fn posts(&self) -> impl Iterator<Item = &SourceDocument> {
        self.documents.iter().filter(|d| d.kind == Kind::Post)
    }
}

/// Collect all files from a directory recursively, in walk order.
///
/// Any unreadable entry fails the whole walk.
pub fn collect_all_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        let name = entry.file_name().to_str().unwrap_or_default();
        if entry.file_type().is_file() && !IGNORED_FILES.contains(&name) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MARKDOWN_EXTENSIONS.contains(&ext))
}

/// Join a site-relative path onto the base URL, percent-encoding segments.
pub fn url_for(base_url: &str, relative: &Path) -> String {
    let path = relative
        .iter()
        .map(|segment| urlencoding::encode(&segment.to_string_lossy()).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("{}/{path}", base_url.trim_end_matches('/'))
}
