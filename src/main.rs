//! Folio - an incremental static site builder for Markdown blogs.

mod build;
mod cli;
mod compiler;
mod config;
mod content;
mod error;
mod generator;
mod graph;
mod utils;

use anyhow::Result;
use build::{build_site, clean_site};
use clap::Parser;
use cli::{Cli, Commands};
use compiler::render::PandocRenderer;
use config::{ConfigError, SiteConfig};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Build { .. } => {
            let renderer = PandocRenderer::new(&config);
            build_site(&config, &renderer).map(|_| ())
        }
        Commands::Clean => clean_site(&config),
    }
}

/// Load configuration, apply CLI overrides and validate for `build`.
fn load_config(cli: &Cli) -> Result<SiteConfig> {
    let root = cli.root.as_deref().unwrap_or(Path::new("./"));
    let config_path = root.join(&cli.config);
    if !config_path.is_file() {
        return Err(ConfigError::NotFound(config_path).into());
    }

    let mut config = SiteConfig::from_path(&config_path)?;
    config.update_with_cli(cli);

    if cli.is_build() {
        config.validate()?;
    }

    Ok(config)
}
