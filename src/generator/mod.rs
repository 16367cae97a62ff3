//! Aggregate outputs derived from every rendered document.
//!
//! | Module    | Output        |
//! |-----------|---------------|
//! | `index`   | `index.html`  |
//! | `sitemap` | `sitemap.xml` |
//! | `feed`    | `feed.xml`    |
//!
//! The artifacts are collected once per build and shared by all three. Each
//! aggregate orders them through a [`Listing`], which also validates them.

pub mod feed;
pub mod index;
pub mod sitemap;

use crate::{
    compiler::Artifact,
    content::Kind,
    error::BuildError,
};
use chrono::NaiveDate;
use std::cmp::Reverse;

/// A post with its required fields resolved.
#[derive(Debug, Clone, Copy)]
pub struct PostEntry<'a> {
    pub artifact: &'a Artifact,
    pub title: &'a str,
    pub published: NaiveDate,
    /// Explicit update date, else `published`.
    pub updated: NaiveDate,
}

#[derive(Debug, Clone, Copy)]
pub struct PageEntry<'a> {
    pub artifact: &'a Artifact,
    pub title: &'a str,
}

/// Posts newest first, then pages by title.
///
/// Ties on publish date or title are broken by source path.
#[derive(Debug, Default)]
pub struct Listing<'a> {
    pub posts: Vec<PostEntry<'a>>,
    pub pages: Vec<PageEntry<'a>>,
}

impl<'a> Listing<'a> {
    /// Validate and order `artifacts`.
    ///
    /// Every document needs a title and every post a publish date.
    pub fn new(artifacts: &'a [Artifact]) -> Result<Self, BuildError> {
        let mut listing = Self::default();
        for artifact in artifacts {
            let missing = |field| BuildError::Aggregate {
                path: artifact.source.clone(),
                field,
            };
            let title = artifact
                .meta
                .title
                .as_deref()
                .ok_or_else(|| missing("title"))?;

            match artifact.kind {
                Kind::Post => {
                    let published = artifact.meta.date.ok_or_else(|| missing("publish date"))?;
                    listing.posts.push(PostEntry {
                        artifact,
                        title,
                        published,
                        updated: artifact.meta.updated.unwrap_or(published),
                    });
                }
                Kind::Page => listing.pages.push(PageEntry { artifact, title }),
            }
        }

        listing
            .posts
            .sort_by_key(|p| (Reverse(p.published), &p.artifact.relative));
        listing
            .pages
            .sort_by_key(|p| (p.title, &p.artifact.relative));
        Ok(listing)
    }

    /// Most recent post update, if there are posts.
    pub fn last_updated(&self) -> Option<NaiveDate> {
        self.posts.iter().map(|p| p.updated).max()
    }
}
