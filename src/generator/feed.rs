//! Atom feed generation.
//!
//! Feed-level `<updated>` is the newest entry update, so an unchanged post
//! set always produces the same bytes.

use super::{Listing, PostEntry};
use crate::{config::SiteConfig, content::url_for};
use anyhow::{Context, Result};
use atom_syndication::{Category, Entry, Feed, Link, Person, Text};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};

/// Build the Atom XML for every post in `listing`.
pub fn build(listing: &Listing<'_>, config: &SiteConfig) -> Result<String> {
    let base_url = config.base.base_url();
    let feed_path = &config.build.feed.path;
    let feed_url = url_for(
        &base_url,
        feed_path
            .strip_prefix(&config.build.output)
            .unwrap_or(feed_path),
    );
    let site_url = format!("{base_url}/");

    let mut feed = Feed::default();
    feed.set_title(config.base.title.as_str());
    if !config.base.description.is_empty() {
        feed.set_subtitle(Text::plain(config.base.description.as_str()));
    }
    feed.set_id(site_url.as_str());
    feed.set_updated(to_datetime(listing.last_updated().unwrap_or_default()));
    feed.set_authors(vec![Person {
        name: config.base.author.clone(),
        ..Default::default()
    }]);
    feed.set_links(vec![
        Link {
            href: site_url,
            rel: "alternate".into(),
            mime_type: Some("text/html".into()),
            ..Default::default()
        },
        Link {
            href: feed_url,
            rel: "self".into(),
            mime_type: Some("application/atom+xml".into()),
            ..Default::default()
        },
    ]);
    feed.set_entries(
        listing
            .posts
            .iter()
            .map(|post| entry(post, config))
            .collect::<Vec<_>>(),
    );

    let xml = feed
        .write_to(Vec::new())
        .context("Failed to serialize Atom feed")?;
    String::from_utf8(xml).context("Atom feed is not valid UTF-8")
}

fn entry(post: &PostEntry<'_>, config: &SiteConfig) -> Entry {
    let meta = &post.artifact.meta;
    let url = &post.artifact.url;

    let mut entry = Entry::default();
    entry.set_title(post.title);
    entry.set_id(url.as_str());
    entry.set_links(vec![Link {
        href: url.clone(),
        rel: "alternate".into(),
        mime_type: Some("text/html".into()),
        ..Default::default()
    }]);
    entry.set_published(Some(to_datetime(post.published)));
    entry.set_updated(to_datetime(post.updated));
    entry.set_categories(
        meta.tags
            .iter()
            .map(|tag| Category {
                term: tag.clone(),
                ..Default::default()
            })
            .collect::<Vec<_>>(),
    );

    let summary = meta
        .excerpt
        .as_deref()
        .unwrap_or(config.base.description.as_str());
    if !summary.is_empty() {
        entry.set_summary(Some(Text::plain(summary)));
    }
    entry
}

/// Midnight UTC. `NaiveDate::default()` is 1970-01-01.
fn to_datetime(date: NaiveDate) -> DateTime<FixedOffset> {
    date.and_time(NaiveTime::MIN).and_utc().fixed_offset()
}
