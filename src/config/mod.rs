//! Site configuration management for `folio.toml`.
//!
//! # Sections
//!
//! | Section            | Purpose                                        |
//! |--------------------|------------------------------------------------|
//! | `[base]`           | Site metadata (title, description, author, url)|
//! | `[build]`          | Paths, posts directory, metadata source, jobs  |
//! | `[build.render]`   | External Markdown renderer command             |
//! | `[build.templates]`| Post/page/index templates and shared partials  |
//! | `[build.index]`, `[build.sitemap]`, `[build.feed]` | Aggregate output paths |
//!
//! # Example
//!
//! ```toml
//! [base]
//! title = "My Blog"
//! description = "A personal blog"
//! url = "https://example.com"
//!
//! [build]
//! content = "content"
//! output = "public"
//!
//! [build.templates]
//! partials = ["templates/header.html"]
//! ```

mod base;
mod build;
pub mod defaults;
mod error;

pub use base::BaseConfig;
pub use build::{BuildConfig, MetadataSource};
pub use error::ConfigError;

use crate::cli::{Cli, Commands};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Root configuration structure representing folio.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Basic site information
    #[serde(default)]
    pub base: BaseConfig,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::Toml)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        let mut config = Self::from_str(&content)?;
        config.config_path = path.to_path_buf();
        Ok(config)
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        self.build.root.as_deref().unwrap_or(Path::new("./"))
    }

    /// Set the root directory path
    pub fn set_root(&mut self, path: &Path) {
        self.build.root = Some(path.to_path_buf())
    }

    /// Directory holding posts; everything else under `content` is a page.
    pub fn posts_dir(&self) -> PathBuf {
        self.build.content.join(&self.build.posts)
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &Cli) {
        let root = cli
            .root
            .clone()
            .unwrap_or_else(|| self.get_root().to_owned());

        Self::update_option(&mut self.build.content, cli.content.as_ref());
        Self::update_option(&mut self.build.output, cli.output.as_ref());
        if cli.jobs.is_some() {
            self.build.jobs = cli.jobs;
        }

        if let Commands::Build {
            base_url: Some(url),
        } = &cli.command
        {
            self.base.url = Some(url.clone());
        }

        self.config_path = Self::normalize_path(&root.join(&cli.config));
        self.normalize(&root);
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Resolve every configured path against `root` and make it absolute.
    ///
    /// Aggregate output paths are resolved against the output directory.
    pub fn normalize(&mut self, root: &Path) {
        let root = Self::normalize_path(root);
        self.set_root(&root);

        let build = &mut self.build;
        build.content = Self::normalize_path(&root.join(&build.content));
        build.output = Self::normalize_path(&root.join(&build.output));
        build.assets = Self::normalize_path(&root.join(&build.assets));

        let templates = &mut build.templates;
        templates.post = Self::normalize_path(&root.join(&templates.post));
        templates.page = Self::normalize_path(&root.join(&templates.page));
        templates.index = Self::normalize_path(&root.join(&templates.index));
        for partial in &mut templates.partials {
            *partial = Self::normalize_path(&root.join(&*partial));
        }

        build.index.path = build.output.join(&build.index.path);
        build.sitemap.path = build.output.join(&build.sitemap.path);
        build.feed.path = build.output.join(&build.feed.path);
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Validate configuration before a build.
    pub fn validate(&self) -> Result<()> {
        match self.base.url.as_deref() {
            None => bail!(ConfigError::Validation(
                "[base.url] is required for sitemap and feed generation".into()
            )),
            Some(url) if !url.starts_with("http") => bail!(ConfigError::Validation(
                "[base.url] must start with http:// or https://".into()
            )),
            Some(_) => {}
        }

        if self.build.jobs == Some(0) {
            bail!(ConfigError::Validation(
                "[build.jobs] must be at least 1".into()
            ));
        }

        if self.build.posts.is_absolute() {
            bail!(ConfigError::Validation(
                "[build.posts] must be relative to [build.content]".into()
            ));
        }

        Self::check_command_installed("[build.render.command]", &self.build.render.command)?;

        Ok(())
    }

    /// Check if a command is installed and available
    fn check_command_installed(field: &str, command: &[String]) -> Result<()> {
        let Some(cmd) = command.first() else {
            bail!(ConfigError::Validation(format!(
                "{field} must have at least one element"
            )));
        };

        which::which(cmd)
            .with_context(|| format!("`{cmd}` not found. Please install it first."))?;

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
