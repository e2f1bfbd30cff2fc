//! Integration tests for vizexec
//!
//! Execution tests stand `sh` in for both interpreters, so they only run on
//! Unix. A test script receives the artifact path as `$1`.

use std::path::Path;

use tempfile::TempDir;
use vizexec::{Config, Runner, Workspace};

mod config_loading;
#[cfg(unix)]
mod http_api;
#[cfg(unix)]
mod pipeline;

/// Config with `sh` as the interpreter for every language
pub(crate) fn sh_config(timeout: Option<f64>) -> Config {
    let mut config = Config::default();
    config.timeout = timeout;
    config.languages.python.command = vec!["sh".to_owned()];
    config.languages.r.command = vec!["sh".to_owned()];
    config
}

/// Runner over fresh scripts and outputs areas in a temporary directory
pub(crate) async fn test_runner(config: Config) -> (TempDir, Runner) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let workspace = Workspace::prepare(&dir.path().join("scripts"), &dir.path().join("visualizations"))
        .await
        .expect("failed to prepare workspace");
    (dir, Runner::new(config, workspace))
}

/// Names of the entries in a directory
pub(crate) fn entries(path: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()))
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
