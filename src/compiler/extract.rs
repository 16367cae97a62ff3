//! Read document metadata back out of rendered HTML.
//!
//! | Field     | Marker                                                |
//! |-----------|-------------------------------------------------------|
//! | title     | first `<h1>`                                          |
//! | published | `<time class="published" datetime="YYYY-MM-DD">`      |
//! | updated   | `<time class="updated" datetime="YYYY-MM-DD">`        |
//! | tags      | element with `class="tags"`, comma separated          |
//! | excerpt   | `<meta name="description" content="...">`             |

use crate::{
    content::{FrontMatter, Kind, frontmatter::parse_date},
    error::BuildError,
};
use chrono::NaiveDate;
use quick_xml::escape::unescape;
use regex::Regex;
use std::{path::Path, sync::LazyLock};

static RE_H1: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[hH]1\b[^>]*>(.*?)</[hH]1\s*>").unwrap());
static RE_OPEN_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([a-zA-Z][a-zA-Z0-9]*)\b([^>]*)>").unwrap());
static RE_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});
static RE_ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Extract metadata from a rendered document.
///
/// `path` only names the artifact in errors. A title is always required,
/// a publish date only for posts.
pub fn extract(html: &str, kind: Kind, path: &Path) -> Result<FrontMatter, BuildError> {
    let missing = |field| BuildError::Extract {
        path: path.to_path_buf(),
        field,
    };

    let title = RE_H1
        .captures(html)
        .map(|caps| text_content(&caps[1]))
        .filter(|title| !title.is_empty())
        .ok_or_else(|| missing("title"))?;

    let date = time_marker(html, "published");
    if kind == Kind::Post && date.is_none() {
        return Err(missing("published date"));
    }

    Ok(FrontMatter {
        title: Some(title),
        date,
        updated: time_marker(html, "updated"),
        tags: tags(html),
        excerpt: description(html),
    })
}

/// Opening tags as `(name, attributes, end offset)`.
fn open_tags(html: &str) -> impl Iterator<Item = (&str, &str, usize)> {
    RE_OPEN_TAG.captures_iter(html).filter_map(|caps| {
        let whole = caps.get(0)?;
        Some((caps.get(1)?.as_str(), caps.get(2)?.as_str(), whole.end()))
    })
}

fn attr(attrs: &str, name: &str) -> Option<String> {
    RE_ATTR.captures_iter(attrs).find_map(|caps| {
        if &caps[1] != name {
            return None;
        }
        let value = caps.get(2).or_else(|| caps.get(3))?.as_str();
        Some(unescape_or_raw(value))
    })
}

fn has_class(attrs: &str, class: &str) -> bool {
    attr(attrs, "class").is_some_and(|value| value.split_whitespace().any(|c| c == class))
}

fn time_marker(html: &str, class: &str) -> Option<NaiveDate> {
    let (_, attrs, _) =
        open_tags(html).find(|(name, attrs, _)| *name == "time" && has_class(attrs, class))?;
    parse_date(&attr(attrs, "datetime")?)
}

/// Element boundaries inside the tags element count as separators too, so
/// `<li>a</li><li>b</li>` and `a, b` read the same.
fn tags(html: &str) -> Vec<String> {
    let Some((name, _, start)) = open_tags(html).find(|(_, attrs, _)| has_class(attrs, "tags"))
    else {
        return Vec::new();
    };
    let rest = &html[start..];
    let inner = rest.find(&format!("</{name}")).map_or(rest, |end| &rest[..end]);

    RE_ANY_TAG
        .replace_all(inner, ",")
        .split(',')
        .map(text_content)
        .filter(|tag| !tag.is_empty())
        .collect()
}

fn description(html: &str) -> Option<String> {
    open_tags(html)
        .filter(|(name, _, _)| *name == "meta")
        .find(|(_, attrs, _)| attr(attrs, "name").as_deref() == Some("description"))
        .and_then(|(_, attrs, _)| attr(attrs, "content"))
        .map(|content| content.trim().to_owned())
        .filter(|content| !content.is_empty())
}

/// Strip markup, unescape entities, collapse whitespace.
fn text_content(fragment: &str) -> String {
    let stripped = RE_ANY_TAG.replace_all(fragment, "");
    unescape_or_raw(&stripped)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// HTML-only entities such as `&nbsp;` are not XML; keep the raw text then.
fn unescape_or_raw(text: &str) -> String {
    unescape(text).map_or_else(|_| text.to_owned(), |s| s.into_owned())
}
