//! Sitemap generation.
//!
//! One `<url>` per post and page. Posts carry `<lastmod>`.
//!
//! # Sitemap Format
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
//!   <url>
//!     <loc>https://example.com/posts/hello.html</loc>
//!     <lastmod>2021-01-01</lastmod>
//!   </url>
//! </urlset>
//! ```

use super::Listing;
use crate::content::frontmatter::DATE_FORMAT;
use quick_xml::escape::escape;
use std::fmt::Write;

/// XML namespace for sitemap
const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Single URL entry in the sitemap
struct UrlEntry<'a> {
    loc: &'a str,
    /// YYYY-MM-DD
    lastmod: Option<String>,
}

/// Build the sitemap XML for `listing`, posts first.
pub fn build(listing: &Listing<'_>) -> String {
    let posts = listing.posts.iter().map(|post| UrlEntry {
        loc: &post.artifact.url,
        lastmod: Some(post.updated.format(DATE_FORMAT).to_string()),
    });
    let pages = listing.pages.iter().map(|page| UrlEntry {
        loc: &page.artifact.url,
        lastmod: None,
    });
    into_xml(posts.chain(pages))
}

fn into_xml<'a>(urls: impl Iterator<Item = UrlEntry<'a>>) -> String {
    let mut xml = String::with_capacity(4096);

    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    let _ = writeln!(xml, r#"<urlset xmlns="{SITEMAP_NS}">"#);

    for entry in urls {
        xml.push_str("  <url>\n");
        let _ = writeln!(xml, "    <loc>{}</loc>", escape(entry.loc));
        if let Some(lastmod) = entry.lastmod {
            let _ = writeln!(xml, "    <lastmod>{lastmod}</lastmod>");
        }
        xml.push_str("  </url>\n");
    }

    xml.push_str("</urlset>\n");
    xml
}

// ============================================================================
// Tests
// ============================================================================
