//! Artifact publishing
//!
//! Artifacts are exposed read-only under a fixed URL prefix. The public URL of
//! an artifact is derived from its file name alone.

use std::path::{Path, PathBuf};

use axum::Router;
use tower_http::services::ServeDir;

use crate::config::Config;

/// Maps artifact paths to public URLs and serves the outputs area
#[derive(Debug, Clone)]
pub struct Publisher {
    public_url: String,
    url_prefix: String,
    outputs_dir: PathBuf,
}

impl Publisher {
    pub fn new(
        public_url: impl Into<String>,
        url_prefix: impl Into<String>,
        outputs_dir: impl Into<PathBuf>,
    ) -> Self {
        let public_url = public_url.into().trim_end_matches('/').to_owned();
        let url_prefix = format!("/{}", url_prefix.into().trim_matches('/'));
        Self {
            public_url,
            url_prefix,
            outputs_dir: outputs_dir.into(),
        }
    }

    /// Publisher for the configured base URL and prefix over `outputs_dir`
    pub fn from_config(config: &Config, outputs_dir: impl Into<PathBuf>) -> Self {
        Self::new(&config.public_url, &config.url_prefix, outputs_dir)
    }

    /// URL prefix, with a leading and no trailing slash
    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    pub fn outputs_dir(&self) -> &Path {
        &self.outputs_dir
    }

    /// Absolute URL for an artifact
    ///
    /// Returns `None` if the path has no UTF-8 file name.
    pub fn url_for(&self, artifact: &Path) -> Option<String> {
        let name = artifact.file_name()?.to_str()?;
        Some(format!("{}{}/{name}", self.public_url, self.url_prefix))
    }

    /// Read-only static route for the outputs area
    ///
    /// Only `GET` and `HEAD` are answered; directories are never listed and
    /// content types are inferred from the file extension.
    pub fn router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let files = ServeDir::new(&self.outputs_dir).append_index_html_on_directories(false);
        Router::new().nest_service(&self.url_prefix, files)
    }
}
