//! YAML front-matter parsing.
//!
//! ```text
//! ---
//! title: Hello, world
//! date: 2021-01-01
//! updated: 2021-02-14
//! tags: [rust, blog]
//! excerpt: First post.
//! ---
//! Body text...
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};
use std::path::Path;

/// Date format shared by front-matter, sitemap and index.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Metadata attached to a source document.
///
/// Every field is optional at parse time; required fields are enforced by
/// the consumers (aggregators) so the error can name the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    pub title: Option<String>,

    /// Publish date
    #[serde(deserialize_with = "deserialize_date")]
    pub date: Option<NaiveDate>,

    /// Last-modified date
    #[serde(alias = "lastmod", alias = "modified", deserialize_with = "deserialize_date")]
    pub updated: Option<NaiveDate>,

    #[serde(deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,

    #[serde(alias = "description")]
    pub excerpt: Option<String>,
}

impl FrontMatter {
    /// Parse a YAML block. An empty block yields empty front-matter.
    pub fn parse(yaml: &str) -> Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }

    /// Explicit update date, else the publish date.
    pub fn last_modified(&self) -> Option<NaiveDate> {
        self.updated.or(self.date)
    }
}

/// Split `text` into its front-matter block and body.
///
/// The block must open on the first line with `---` and close with a line
/// that is exactly `---` or `...`. Without both delimiters the whole text is
/// body.
pub fn split(text: &str) -> (Option<&str>, &str) {
    let Some(rest) = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    else {
        return (None, text);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed == "---" || trimmed == "..." {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(yaml), body);
        }
        offset += line.len();
    }

    (None, text)
}

/// Derive a publish date from a post path.
///
/// Recognizes a `YYYY-MM-DD-slug.md` file name or a `YYYY/MM/DD/slug.md`
/// directory chain.
pub fn date_from_path(relative: &Path) -> Option<NaiveDate> {
    let stem = relative.file_stem()?.to_str()?;
    if let Some(prefix) = stem.get(..10)
        && let Ok(date) = NaiveDate::parse_from_str(prefix, DATE_FORMAT)
    {
        return Some(date);
    }

    let parts: Vec<&str> = relative
        .parent()?
        .iter()
        .filter_map(|c| c.to_str())
        .collect();
    match parts.as_slice() {
        [.., y, m, d] if y.len() == 4 => {
            NaiveDate::parse_from_str(&format!("{y}-{m}-{d}"), DATE_FORMAT).ok()
        }
        _ => None,
    }
}

/// Parse `2021-01-01` or a full timestamp such as `2021-01-01T10:00:00Z`,
/// keeping only the date. Anything else after the date is rejected.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        return Some(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.date_naive());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|timestamp| timestamp.date())
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    parse_date(&raw)
        .map(Some)
        .ok_or_else(|| D::Error::custom(format!("invalid date `{}`", raw.trim())))
}

/// Tags may be a YAML list or a comma-separated string.
fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tags {
        List(Vec<String>),
        Csv(String),
    }

    let tags = match Option::<Tags>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Tags::List(list)) => list,
        Some(Tags::Csv(csv)) => csv.split(',').map(str::to_owned).collect(),
    };
    Ok(tags
        .into_iter()
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty())
        .collect())
}
