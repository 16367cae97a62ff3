//! Per-document compilation.
//!
//! | Module      | Purpose                                      |
//! |-------------|----------------------------------------------|
//! | `render`    | `Renderer` trait and the command renderer    |
//! | `extract`   | Metadata scraping from rendered HTML         |
//!
//! This module turns a [`SourceDocument`] into its output file and an
//! [`Artifact`] describing it.

pub mod extract;
pub mod render;

use crate::{
    config::{MetadataSource, SiteConfig},
    content::{Asset, ContentSnapshot, FrontMatter, Kind, SourceDocument},
    error::BuildError,
    utils::fs::write_atomic,
};
use anyhow::{Context, Result};
use render::{RenderJob, Renderer};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// A rendered document as seen by the aggregators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub output: PathBuf,
    /// Canonical absolute URL
    pub url: String,
    /// Absolute source path, used in error messages
    pub source: PathBuf,
    /// Source path relative to the content root, used for tie-breaking
    pub relative: PathBuf,
    pub kind: Kind,
    pub meta: FrontMatter,
}

impl Artifact {
    /// Describe `doc` using its own front-matter.
    pub fn from_document(doc: &SourceDocument, config: &SiteConfig) -> Self {
        Self {
            output: doc.output_path(&config.build.output),
            url: doc.url(&config.base.base_url()),
            source: doc.source.clone(),
            relative: doc.relative.clone(),
            kind: doc.kind,
            meta: doc.front.clone(),
        }
    }

    /// Describe `doc` by scraping its rendered output on disk.
    pub fn from_rendered(doc: &SourceDocument, config: &SiteConfig) -> Result<Self> {
        let mut artifact = Self::from_document(doc, config);
        let html = fs::read_to_string(&artifact.output)
            .with_context(|| format!("Failed to read {}", artifact.output.display()))?;
        artifact.meta = extract::extract(&html, doc.kind, &artifact.output)?;
        Ok(artifact)
    }
}

/// Artifacts for every document, in snapshot order.
///
/// Reads the rendered HTML when `[build] metadata = "rendered"`. Sequential,
/// since it runs under the aggregate cache lock on a pool worker.
pub fn collect_artifacts(snapshot: &ContentSnapshot, config: &SiteConfig) -> Result<Vec<Artifact>> {
    match config.build.metadata {
        MetadataSource::Frontmatter => Ok(snapshot
            .documents
            .iter()
            .map(|doc| Artifact::from_document(doc, config))
            .collect()),
        MetadataSource::Rendered => snapshot
            .documents
            .iter()
            .map(|doc| Artifact::from_rendered(doc, config))
            .collect(),
    }
}

/// Template used for a document of `kind`.
pub fn template_for(kind: Kind, config: &SiteConfig) -> &Path {
    match kind {
        Kind::Post => &config.build.templates.post,
        Kind::Page => &config.build.templates.page,
    }
}

/// Render `doc` and write its output.
///
/// A failing render leaves any previous output untouched.
pub fn render_document(
    doc: &SourceDocument,
    config: &SiteConfig,
    renderer: &dyn Renderer,
) -> Result<bool> {
    let base_url = config.base.base_url();
    let canonical = doc.url(&base_url);
    let job = RenderJob {
        body: &doc.body,
        template: template_for(doc.kind, config),
        front: &doc.front,
        canonical: &canonical,
        site_title: &config.base.title,
        site_url: &base_url,
    };

    let html = renderer
        .render(&job)
        .map_err(|e| BuildError::render(&doc.source, e))?;
    write_atomic(&doc.output_path(&config.build.output), &html)?;
    Ok(true)
}

/// Copy an asset to `output_dir`, mirroring its relative path.
pub fn copy_asset(asset: &Asset, output_dir: &Path) -> Result<bool> {
    let bytes = fs::read(&asset.source)
        .with_context(|| format!("Failed to read {}", asset.source.display()))?;
    write_atomic(&output_dir.join(&asset.relative), &bytes)?;
    Ok(true)
}
