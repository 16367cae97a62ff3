//! Build error taxonomy.
//!
//! | Kind          | Variants                                          | Raised by       |
//! |---------------|---------------------------------------------------|-----------------|
//! | Configuration | `Cycle`, `MissingDependency`, `DuplicateOutput`   | graph building  |
//! | Content       | `FrontMatter`                                     | discovery       |
//! | Render        | `Render`                                          | target actions  |
//! | Extraction    | `Extract`                                         | html scraping   |
//! | Aggregation   | `Aggregate`                                       | index/sitemap/feed |
//!
//! Every variant names the offending path.

use std::path::{Path, PathBuf};
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("dependency cycle between targets: {}", join_paths(.0))]
    Cycle(Vec<PathBuf>),

    #[error("target `{}` depends on missing file `{}`", target.display(), dependency.display())]
    MissingDependency { target: PathBuf, dependency: PathBuf },

    #[error("output `{}` is declared by both `{first}` and `{second}`", output.display())]
    DuplicateOutput {
        output: PathBuf,
        first: String,
        second: String,
    },

    #[error("invalid front-matter in `{}`", path.display())]
    FrontMatter {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to render `{}`", path.display())]
    Render {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("`{}` has no {field} marker", path.display())]
    Extract { path: PathBuf, field: &'static str },

    #[error("cannot aggregate `{}`: missing {field}", path.display())]
    Aggregate { path: PathBuf, field: &'static str },
}

impl BuildError {
    pub fn render(path: &Path, source: impl Into<BoxError>) -> Self {
        Self::Render {
            path: path.to_path_buf(),
            source: source.into(),
        }
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("`{}`", p.display()))
        .collect::<Vec<_>>()
        .join(" -> ")
}
