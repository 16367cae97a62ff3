//! Site building orchestration.
//!
//! # Architecture
//!
//! ```text
//! build_site()
//!     │
//!     ├── ContentSnapshot::discover()  ──► documents + assets (read once)
//!     │
//!     ├── plan()                       ──► one BuildTarget per output file
//!     │
//!     ├── DependencyGraph::new()       ──► duplicate / missing / cycle checks
//!     │
//!     └── DependencyGraph::execute()
//!             │
//!             ├── level 0: Document, Asset   (stale only)
//!             └── level 1: Index, Sitemap, Feed (always, written if changed)
//! ```

use crate::{
    compiler::{self, Artifact, collect_artifacts, render::Renderer},
    config::SiteConfig,
    content::ContentSnapshot,
    generator::{Listing, feed, index, sitemap},
    graph::{BuildReport, BuildTarget, DependencyGraph, Outcome},
    log,
    utils::fs::{remove_dir_all, write_if_changed},
};
use anyhow::{Result, anyhow, bail};
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

/// What a target does when it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Render `snapshot.documents[i]`
    Document(usize),
    /// Copy `snapshot.assets[i]`
    Asset(usize),
    Index,
    Sitemap,
    Feed,
}

/// Build the whole site, re-rendering only stale documents.
pub fn build_site(config: &SiteConfig, renderer: &dyn Renderer) -> Result<BuildReport> {
    let snapshot = ContentSnapshot::discover(config)?;
    let posts = snapshot.posts().count();
    log!(
        "build";
        "{} posts, {} pages, {} assets",
        posts,
        snapshot.documents.len() - posts,
        snapshot.assets.len()
    );

    let graph = DependencyGraph::new(plan(&snapshot, config))?;
    log!("build"; "{} targets in {} levels", graph.len(), graph.levels().count());
    let cache = ArtifactCache::default();
    let report = graph.execute(config.build.jobs, |target| {
        run(target, &snapshot, config, renderer, &cache)
    })?;

    log!(
        "build";
        "done: {} rendered, {} unchanged, {} up to date",
        report.count(Outcome::Rendered),
        report.count(Outcome::Unchanged),
        report.count(Outcome::Fresh)
    );
    Ok(report)
}

/// Declare every output of the site.
///
/// Documents depend on their source, template, partials and the config
/// file. Aggregates depend on every document output, so they run last.
pub fn plan(snapshot: &ContentSnapshot, config: &SiteConfig) -> Vec<BuildTarget<Action>> {
    let build = &config.build;
    let mut shared: Vec<PathBuf> = build.templates.partials.clone();
    if config.config_path.is_file() {
        shared.push(config.config_path.clone());
    }

    let mut targets = Vec::with_capacity(snapshot.documents.len() + snapshot.assets.len() + 3);
    let mut documents = Vec::with_capacity(snapshot.documents.len());

    for (i, doc) in snapshot.documents.iter().enumerate() {
        let output = doc.output_path(&build.output);
        let mut deps = vec![
            doc.source.clone(),
            compiler::template_for(doc.kind, config).to_path_buf(),
        ];
        deps.extend(shared.iter().cloned());
        documents.push(output.clone());
        targets.push(
            BuildTarget::new(output, deps, Action::Document(i))
                .labeled(doc.source.display().to_string()),
        );
    }

    for (i, asset) in snapshot.assets.iter().enumerate() {
        targets.push(
            BuildTarget::new(
                build.output.join(&asset.relative),
                vec![asset.source.clone()],
                Action::Asset(i),
            )
            .labeled(asset.source.display().to_string()),
        );
    }

    let mut index_deps = documents.clone();
    index_deps.push(build.templates.index.clone());
    index_deps.extend(shared);
    targets.push(
        BuildTarget::new(build.index.path.clone(), index_deps, Action::Index)
            .always()
            .labeled("index aggregate"),
    );
    targets.push(
        BuildTarget::new(build.sitemap.path.clone(), documents.clone(), Action::Sitemap)
            .always()
            .labeled("sitemap aggregate"),
    );
    targets.push(
        BuildTarget::new(build.feed.path.clone(), documents, Action::Feed)
            .always()
            .labeled("feed aggregate"),
    );

    targets
}

/// Artifacts shared by the aggregates of one build, collected on first use.
#[derive(Debug, Default)]
struct ArtifactCache(Mutex<Option<Arc<Vec<Artifact>>>>);

impl ArtifactCache {
    fn get(&self, snapshot: &ContentSnapshot, config: &SiteConfig) -> Result<Arc<Vec<Artifact>>> {
        let mut slot = self
            .0
            .lock()
            .map_err(|_| anyhow!("artifact cache lock poisoned"))?;
        if let Some(artifacts) = slot.as_ref() {
            return Ok(Arc::clone(artifacts));
        }
        let artifacts = Arc::new(collect_artifacts(snapshot, config)?);
        *slot = Some(Arc::clone(&artifacts));
        Ok(artifacts)
    }
}

fn run(
    target: &BuildTarget<Action>,
    snapshot: &ContentSnapshot,
    config: &SiteConfig,
    renderer: &dyn Renderer,
    cache: &ArtifactCache,
) -> Result<bool> {
    match target.action {
        Action::Document(i) => {
            let doc = &snapshot.documents[i];
            log!("render"; "{}", doc.relative.display());
            compiler::render_document(doc, config, renderer)
        }
        Action::Asset(i) => {
            let asset = &snapshot.assets[i];
            log!("assets"; "{}", asset.relative.display());
            compiler::copy_asset(asset, &config.build.output)
        }
        Action::Index | Action::Sitemap | Action::Feed => {
            let artifacts = cache.get(snapshot, config)?;
            let listing = Listing::new(&artifacts)?;
            let (module, bytes) = match target.action {
                Action::Index => ("index", index::render(&listing, config, renderer)?),
                Action::Sitemap => ("sitemap", sitemap::build(&listing).into_bytes()),
                _ => ("feed", feed::build(&listing, config)?.into_bytes()),
            };

            let written = write_if_changed(&target.output, &bytes)?;
            if written {
                log!(module; "{}", file_name(&target.output));
            }
            Ok(written)
        }
    }
}

/// Remove the output directory.
///
/// Refuses when the output directory contains the project root or the
/// content directory.
pub fn clean_site(config: &SiteConfig) -> Result<()> {
    let output = &config.build.output;
    if config.get_root().starts_with(output) || config.build.content.starts_with(output) {
        bail!(
            "Refusing to clean `{}`: it contains the project or its content",
            output.display()
        );
    }

    if remove_dir_all(output)? {
        log!("clean"; "removed {}", output.display());
    } else {
        log!("clean"; "nothing to remove");
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compiler::render::FakeRenderer,
        config::MetadataSource,
        error::BuildError,
    };
    use std::{
        fs,
        sync::atomic::Ordering,
        time::{Duration, SystemTime},
    };
    use tempfile::TempDir;

    const POSTS: &[(&str, &str)] = &[
        ("2020-01-01-first.md", "First"),
        ("2020-06-01-summer.md", "Summer"),
        ("2021-01-01-new-year.md", "New Year"),
    ];

    fn write(path: &Path, text: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn site() -> (TempDir, SiteConfig) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for name in ["post", "page", "index"] {
            write(&root.join(format!("templates/{name}.html")), "$body$");
        }
        write(&root.join("folio.toml"), "");
        for (file, title) in POSTS {
            write(
                &root.join("content/posts").join(file),
                &format!("---\ntitle: {title}\ntags: [notes]\n---\n{title} body\n"),
            );
        }
        write(
            &root.join("content/about.md"),
            "---\ntitle: About\nexcerpt: Who writes this\n---\nMe.\n",
        );
        write(&root.join("assets/style.css"), "body {}");

        let mut config = SiteConfig::default();
        config.base.title = "Blog".into();
        config.base.description = "Notes".into();
        config.base.url = Some("https://example.com".into());
        config.build.jobs = Some(2);
        config.normalize(root);
        config.config_path = config.get_root().join("folio.toml");
        (dir, config)
    }

    fn output(config: &SiteConfig, relative: &str) -> PathBuf {
        config.build.output.join(relative)
    }

    fn read(config: &SiteConfig, relative: &str) -> String {
        fs::read_to_string(output(config, relative)).unwrap()
    }

    fn mtime(path: &Path) -> SystemTime {
        fs::metadata(path).unwrap().modified().unwrap()
    }

    #[test]
    fn test_plan_declares_every_output() {
        let (_dir, config) = site();
        let snapshot = ContentSnapshot::discover(&config).unwrap();
        let targets = plan(&snapshot, &config);

        let actions: Vec<_> = targets.iter().map(|t| t.action).collect();
        assert_eq!(
            actions,
            vec![
                Action::Document(0),
                Action::Document(1),
                Action::Document(2),
                Action::Document(3),
                Action::Asset(0),
                Action::Index,
                Action::Sitemap,
                Action::Feed,
            ]
        );

        let about = &targets[0];
        assert_eq!(about.output, output(&config, "about.html"));
        assert!(about.deps.contains(&config.build.templates.page));
        assert!(about.deps.contains(&config.config_path));

        // aggregates wait for every document
        let index = &targets[5];
        assert!(index.deps.contains(&output(&config, "posts/2020-06-01-summer.html")));
        assert!(index.deps.contains(&config.build.templates.index));
    }

    #[test]
    fn test_full_build() {
        let (_dir, config) = site();
        let report = build_site(&config, &FakeRenderer::default()).unwrap();

        assert_eq!(report.count(Outcome::Rendered), 8);
        assert_eq!(read(&config, "style.css"), "body {}");
        assert!(read(&config, "posts/2020-01-01-first.html").contains("<h1>First</h1>"));

        let index = read(&config, "index.html");
        let new_year = index.find("[New Year]").unwrap();
        let summer = index.find("[Summer]").unwrap();
        let first = index.find("[First]").unwrap();
        assert!(new_year < summer && summer < first);
        assert!(index.contains("- [About](https://example.com/about.html): Who writes this"));

        let feed = read(&config, "feed.xml");
        let new_year = feed.find(">New Year</title>").unwrap();
        let summer = feed.find(">Summer</title>").unwrap();
        let first = feed.find(">First</title>").unwrap();
        assert!(new_year < summer && summer < first);

        let sitemap = read(&config, "sitemap.xml");
        assert!(sitemap.contains("<lastmod>2020-06-01</lastmod>"));
        assert_eq!(sitemap.matches("<url>").count(), 4);
    }

    #[test]
    fn test_rebuild_without_changes_touches_nothing() {
        let (_dir, config) = site();
        build_site(&config, &FakeRenderer::default()).unwrap();
        let files = ["posts/2020-01-01-first.html", "style.css", "index.html", "feed.xml"];
        let before: Vec<_> = files.iter().map(|f| mtime(&output(&config, f))).collect();
        let feed = read(&config, "feed.xml");

        let renderer = FakeRenderer::default();
        let report = build_site(&config, &renderer).unwrap();

        assert_eq!(report.count(Outcome::Rendered), 0);
        assert_eq!(report.count(Outcome::Fresh), 5);
        assert_eq!(report.count(Outcome::Unchanged), 3);
        // only the index goes through the renderer again
        assert_eq!(renderer.calls.load(Ordering::Relaxed), 1);
        let after: Vec<_> = files.iter().map(|f| mtime(&output(&config, f))).collect();
        assert_eq!(before, after);
        assert_eq!(read(&config, "feed.xml"), feed);
    }

    #[test]
    fn test_touching_one_post_rerenders_only_it() {
        let (_dir, config) = site();
        build_site(&config, &FakeRenderer::default()).unwrap();

        let source = config.posts_dir().join("2020-06-01-summer.md");
        write(&source, "---\ntitle: Summer\ntags: [notes]\n---\nEdited body\n");
        let future = SystemTime::now() + Duration::from_secs(10);
        fs::File::options()
            .write(true)
            .open(&source)
            .unwrap()
            .set_modified(future)
            .unwrap();

        let report = build_site(&config, &FakeRenderer::default()).unwrap();

        let summer = output(&config, "posts/2020-06-01-summer.html");
        let rendered: Vec<_> = report.rendered().collect();
        assert_eq!(rendered, vec![summer.as_path()]);
        for aggregate in ["index.html", "sitemap.xml", "feed.xml"] {
            assert_ne!(report.outcome(&output(&config, aggregate)), Some(Outcome::Fresh));
        }
        assert_eq!(
            report.outcome(&output(&config, "posts/2020-01-01-first.html")),
            Some(Outcome::Fresh)
        );
        assert!(read(&config, "posts/2020-06-01-summer.html").contains("Edited body"));
    }

    #[test]
    fn test_template_change_rerenders_its_documents() {
        let (_dir, config) = site();
        build_site(&config, &FakeRenderer::default()).unwrap();

        let template = &config.build.templates.page;
        fs::File::options()
            .write(true)
            .open(template)
            .unwrap()
            .set_modified(SystemTime::now() + Duration::from_secs(10))
            .unwrap();

        let report = build_site(&config, &FakeRenderer::default()).unwrap();
        let rendered: Vec<_> = report.rendered().collect();
        assert_eq!(rendered, vec![output(&config, "about.html").as_path()]);
    }

    #[test]
    fn test_render_failure_aborts_before_aggregates() {
        let (_dir, config) = site();
        let renderer = FakeRenderer {
            fail_on: Some("Summer body".into()),
            ..Default::default()
        };

        let err = build_site(&config, &renderer).unwrap_err();

        let err = err.downcast_ref::<BuildError>().unwrap();
        assert!(err.to_string().contains("2020-06-01-summer.md"));
        assert!(!output(&config, "posts/2020-06-01-summer.html").exists());
        assert!(!output(&config, "index.html").exists());
        assert!(!output(&config, "feed.xml").exists());
    }

    #[test]
    fn test_missing_template_writes_nothing() {
        let (_dir, config) = site();
        fs::remove_file(&config.build.templates.post).unwrap();

        let err = build_site(&config, &FakeRenderer::default()).unwrap_err();

        let err = err.downcast_ref::<BuildError>().unwrap();
        assert!(matches!(err, BuildError::MissingDependency { .. }));
        assert!(!config.build.output.exists());
    }

    #[test]
    fn test_untitled_post_fails_aggregation() {
        let (_dir, config) = site();
        write(&config.posts_dir().join("2022-02-02-untitled.md"), "No front-matter.\n");

        let err = build_site(&config, &FakeRenderer::default()).unwrap_err();

        let err = err.downcast_ref::<BuildError>().unwrap();
        assert!(matches!(err, BuildError::Aggregate { field: "title", .. }));
        assert!(err.to_string().contains("2022-02-02-untitled.md"));
        assert!(!output(&config, "sitemap.xml").exists());
    }

    #[test]
    fn test_rendered_metadata_matches_front_matter() {
        let (_dir, mut config) = site();
        build_site(&config, &FakeRenderer::default()).unwrap();
        let index = read(&config, "index.html");
        let feed = read(&config, "feed.xml");
        let sitemap = read(&config, "sitemap.xml");

        config.build.metadata = MetadataSource::Rendered;
        build_site(&config, &FakeRenderer::default()).unwrap();

        assert_eq!(read(&config, "index.html"), index);
        assert_eq!(read(&config, "feed.xml"), feed);
        assert_eq!(read(&config, "sitemap.xml"), sitemap);
    }

    #[test]
    fn test_missing_content_dir_fails_build() {
        let (_dir, mut config) = site();
        config.build.content = config.get_root().join("contnet");

        let err = build_site(&config, &FakeRenderer::default()).unwrap_err();
        assert!(err.to_string().contains("contnet"));
        assert!(!output(&config, "sitemap.xml").exists());
    }

    #[test]
    fn test_page_clashing_with_index_names_both_targets() {
        let (_dir, config) = site();
        write(&config.build.content.join("index.md"), "---\ntitle: Home\n---\n");

        let err = build_site(&config, &FakeRenderer::default()).unwrap_err();
        let err = err.downcast_ref::<BuildError>().unwrap();
        assert!(matches!(err, BuildError::DuplicateOutput { .. }));
        let message = err.to_string();
        assert!(message.contains("index.md"));
        assert!(message.contains("index aggregate"));
    }

    #[test]
    fn test_aggregates_share_one_artifact_list() {
        let (_dir, mut config) = site();
        build_site(&config, &FakeRenderer::default()).unwrap();
        config.build.metadata = MetadataSource::Rendered;
        let snapshot = ContentSnapshot::discover(&config).unwrap();

        let cache = ArtifactCache::default();
        let first = cache.get(&snapshot, &config).unwrap();
        // a second lookup must not read the rendered pages again
        fs::remove_file(output(&config, "about.html")).unwrap();
        let second = cache.get(&snapshot, &config).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn test_clean_site() {
        let (_dir, config) = site();
        build_site(&config, &FakeRenderer::default()).unwrap();
        assert!(config.build.output.exists());

        clean_site(&config).unwrap();
        assert!(!config.build.output.exists());
        // a second clean is a no-op
        clean_site(&config).unwrap();
    }

    #[test]
    fn test_clean_refuses_project_root() {
        let (_dir, mut config) = site();
        config.build.output = config.get_root().to_path_buf();

        assert!(clean_site(&config).is_err());
        assert!(config.get_root().join("folio.toml").exists());
    }
}
