//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// [base] Section Defaults
// ============================================================================

pub mod base {
    pub fn url() -> Option<String> {
        None
    }

    pub fn author() -> String {
        "<YOUR_NAME>".into()
    }
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn root() -> Option<PathBuf> {
        None
    }

    pub fn content() -> PathBuf {
        "content".into()
    }

    pub fn output() -> PathBuf {
        "public".into()
    }

    pub fn assets() -> PathBuf {
        "assets".into()
    }

    pub fn posts() -> PathBuf {
        "posts".into()
    }

    pub fn jobs() -> Option<usize> {
        None
    }

    pub mod render {
        pub fn command() -> Vec<String> {
            vec!["pandoc".into()]
        }

        pub fn args() -> Vec<String> {
            ["--from", "markdown", "--to", "html5"]
                .into_iter()
                .map(Into::into)
                .collect()
        }
    }

    pub mod templates {
        use std::path::PathBuf;

        pub fn post() -> PathBuf {
            "templates/post.html".into()
        }

        pub fn page() -> PathBuf {
            "templates/page.html".into()
        }

        pub fn index() -> PathBuf {
            "templates/index.html".into()
        }
    }

    pub mod index {
        use std::path::PathBuf;

        pub fn path() -> PathBuf {
            "index.html".into()
        }
    }

    pub mod sitemap {
        use std::path::PathBuf;

        pub fn path() -> PathBuf {
            "sitemap.xml".into()
        }
    }

    pub mod feed {
        use std::path::PathBuf;

        pub fn path() -> PathBuf {
            "feed.xml".into()
        }
    }
}
