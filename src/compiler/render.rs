//! Markdown to HTML rendering through an external command.
//!
//! The default collaborator is pandoc:
//!
//! ```text
//! pandoc --from markdown --to html5 \
//!     --template templates/post.html \
//!     -M title=Hello -M date=2021-01-01 -M tags=rust -M tags=blog \
//!     -M canonical=https://example.com/posts/hello.html ...
//!     < body.md > hello.html
//! ```

use crate::{
    config::SiteConfig,
    content::{FrontMatter, frontmatter::DATE_FORMAT},
    utils::exec::exec_with_stdin,
};
use anyhow::Result;
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

/// Everything one render needs. The output is a pure function of these.
#[derive(Debug, Clone, Copy)]
pub struct RenderJob<'a> {
    pub body: &'a str,
    pub template: &'a Path,
    pub front: &'a FrontMatter,
    pub canonical: &'a str,
    pub site_title: &'a str,
    pub site_url: &'a str,
}

impl RenderJob<'_> {
    /// Template variables as `key=value` pairs, in a stable order.
    ///
    /// `updated` falls back to the publish date; `tags` repeats per tag.
    pub fn variables(&self) -> Vec<(&'static str, String)> {
        let front = self.front;
        let mut vars = Vec::new();
        if let Some(title) = &front.title {
            vars.push(("title", title.clone()));
        }
        if let Some(date) = front.date {
            vars.push(("date", date.format(DATE_FORMAT).to_string()));
        }
        if let Some(updated) = front.last_modified() {
            vars.push(("updated", updated.format(DATE_FORMAT).to_string()));
        }
        vars.extend(front.tags.iter().map(|tag| ("tags", tag.clone())));
        if let Some(excerpt) = &front.excerpt {
            vars.push(("excerpt", excerpt.clone()));
        }
        vars.push(("canonical", self.canonical.to_owned()));
        vars.push(("site-title", self.site_title.to_owned()));
        vars.push(("site-url", self.site_url.to_owned()));
        vars
    }
}

/// Turns one document into HTML bytes.
pub trait Renderer: Sync {
    fn render(&self, job: &RenderJob<'_>) -> Result<Vec<u8>>;
}

/// Runs `[build.render] command` once per document.
#[derive(Debug, Clone)]
pub struct PandocRenderer {
    root: PathBuf,
    command: Vec<String>,
    args: Vec<String>,
}

impl PandocRenderer {
    pub fn new(config: &SiteConfig) -> Self {
        Self {
            root: config.get_root().to_path_buf(),
            command: config.build.render.command.clone(),
            args: config.build.render.args.clone(),
        }
    }

    fn build_args(&self, job: &RenderJob<'_>) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.args.iter().map(OsString::from).collect();
        args.push("--template".into());
        args.push(job.template.into());
        for (key, value) in job.variables() {
            args.push("-M".into());
            args.push(format!("{key}={value}").into());
        }
        args
    }
}

impl Renderer for PandocRenderer {
    fn render(&self, job: &RenderJob<'_>) -> Result<Vec<u8>> {
        let args = self.build_args(job);
        let output = exec_with_stdin(Some(&self.root), &self.command, &args, job.body.as_bytes())?;
        Ok(output.stdout)
    }
}

/// In-process renderer for tests.
///
/// Emits the same markers a real template would, so the extractor can read
/// them back.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct FakeRenderer {
    /// Fail every document whose body contains this text.
    pub fail_on: Option<String>,
    pub calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl Renderer for FakeRenderer {
    fn render(&self, job: &RenderJob<'_>) -> Result<Vec<u8>> {
        use std::fmt::Write;
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        if let Some(needle) = &self.fail_on
            && job.body.contains(needle.as_str())
        {
            anyhow::bail!("render error: found `{needle}`");
        }

        let template = job.template.file_name().unwrap_or_default().to_string_lossy();
        let mut html = format!("<!-- {template} -->\n");
        let front = job.front;
        if let Some(excerpt) = &front.excerpt {
            writeln!(html, r#"<meta name="description" content="{excerpt}">"#)?;
        }
        if let Some(title) = &front.title {
            writeln!(html, "<h1>{title}</h1>")?;
        }
        if let Some(date) = front.date {
            writeln!(html, r#"<time class="published" datetime="{date}">{date}</time>"#)?;
        }
        if let Some(updated) = front.updated {
            writeln!(html, r#"<time class="updated" datetime="{updated}">{updated}</time>"#)?;
        }
        if !front.tags.is_empty() {
            writeln!(html, r#"<p class="tags">{}</p>"#, front.tags.join(", "))?;
        }
        writeln!(html, r#"<link rel="canonical" href="{}">"#, job.canonical)?;
        html.push_str(job.body);
        Ok(html.into_bytes())
    }
}
