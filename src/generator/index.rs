//! Index page: a Markdown listing rendered through the index template.
//!
//! ```markdown
//! ## Posts
//!
//! - 2021-01-01 [Hello](https://example.com/posts/hello.html) *rust, blog*
//!
//! ## Pages
//!
//! - [About](https://example.com/about.html): Who writes this
//! ```

use super::Listing;
use crate::{
    compiler::render::{RenderJob, Renderer},
    config::SiteConfig,
    content::{FrontMatter, frontmatter::DATE_FORMAT, url_for},
    error::BuildError,
};
use anyhow::Result;
use std::fmt::Write;

/// Markdown body of the index page.
pub fn markdown(listing: &Listing<'_>) -> String {
    let mut md = String::with_capacity(256 + 128 * (listing.posts.len() + listing.pages.len()));

    if !listing.posts.is_empty() {
        md.push_str("## Posts\n\n");
        for post in &listing.posts {
            let _ = write!(
                md,
                "- {} [{}]({})",
                post.published.format(DATE_FORMAT),
                escape_markdown(post.title),
                post.artifact.url
            );
            let tags = &post.artifact.meta.tags;
            if !tags.is_empty() {
                let _ = write!(md, " *{}*", escape_markdown(&tags.join(", ")));
            }
            md.push('\n');
        }
        md.push('\n');
    }

    if !listing.pages.is_empty() {
        md.push_str("## Pages\n\n");
        for page in &listing.pages {
            let _ = write!(md, "- [{}]({})", escape_markdown(page.title), page.artifact.url);
            if let Some(excerpt) = &page.artifact.meta.excerpt {
                let _ = write!(md, ": {}", escape_markdown(excerpt));
            }
            md.push('\n');
        }
    }

    md
}

/// Render the index page through `[build.templates] index`.
pub fn render(listing: &Listing<'_>, config: &SiteConfig, renderer: &dyn Renderer) -> Result<Vec<u8>> {
    let index_path = &config.build.index.path;
    let base_url = config.base.base_url();
    let relative = index_path
        .strip_prefix(&config.build.output)
        .unwrap_or(index_path);
    let canonical = url_for(&base_url, relative);

    let front = FrontMatter {
        title: Some(config.base.title.clone()),
        excerpt: Some(config.base.description.clone()).filter(|d| !d.is_empty()),
        ..Default::default()
    };
    let body = markdown(listing);
    let job = RenderJob {
        body: &body,
        template: &config.build.templates.index,
        front: &front,
        canonical: &canonical,
        site_title: &config.base.title,
        site_url: &base_url,
    };

    let html = renderer
        .render(&job)
        .map_err(|e| BuildError::render(&config.build.templates.index, e))?;
    Ok(html)
}

/// Backslash-escape characters with Markdown meaning.
fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(
            c,
            '\\' | '`' | '*' | '_' | '[' | ']' | '(' | ')' | '#' | '<' | '>' | '!' | '|' | '~'
        ) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
