//! Filesystem areas for staged scripts and artifacts
//!
//! Every submission gets a [`SubmissionId`]. Its script is staged as
//! `scripts_dir/script_<id>.<ext>` for exactly one execution and its artifact
//! is expected at `outputs_dir/plot_<id>.<ext>`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::{Config, FileExtension};

/// Errors that occur while preparing or staging into the workspace
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to prepare directory {path}: {source}")]
    Prepare {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to stage script at {path}: {source}")]
    Stage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Unique identifier of one submission
///
/// A millisecond timestamp followed by a random token. The timestamp keeps
/// names ordered by creation, the token keeps submissions within the same
/// millisecond apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubmissionId(String);

impl SubmissionId {
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        Self(format!("{millis}-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A script written to the scripts area for a single execution
///
/// # Cleanup
///
/// Pass the script to [`Workspace::release`] once the interpreter has exited.
/// If it is dropped without being released (for example when the request
/// future is cancelled), `Drop` removes the file best-effort and logs a
/// warning.
#[derive(Debug)]
pub struct StagedScript {
    id: SubmissionId,
    path: PathBuf,
    len: usize,
    released: bool,
}

impl StagedScript {
    /// Identifier of the owning submission
    pub fn id(&self) -> &SubmissionId {
        &self.id
    }

    /// Path of the staged file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of bytes staged
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for StagedScript {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        warn!(
            id = %self.id,
            path = %self.path.display(),
            "staged script dropped without release, removing"
        );
        // Blocking, but a single unlink on the rare unreleased path
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %self.path.display(), error = %e, "best-effort script removal failed");
        }
    }
}

/// Scripts and outputs areas
#[derive(Debug, Clone)]
pub struct Workspace {
    scripts_dir: PathBuf,
    outputs_dir: PathBuf,
}

impl Workspace {
    /// Create a workspace over the given directories without touching disk
    pub fn new(scripts_dir: impl Into<PathBuf>, outputs_dir: impl Into<PathBuf>) -> Self {
        Self {
            scripts_dir: scripts_dir.into(),
            outputs_dir: outputs_dir.into(),
        }
    }

    /// Create both areas if needed and resolve them to absolute paths
    ///
    /// Interpreters receive absolute paths so that they do not depend on
    /// their working directory.
    #[instrument]
    pub async fn prepare(scripts_dir: &Path, outputs_dir: &Path) -> Result<Self, WorkspaceError> {
        let scripts_dir = prepare_dir(scripts_dir).await?;
        let outputs_dir = prepare_dir(outputs_dir).await?;
        debug!(?scripts_dir, ?outputs_dir, "workspace ready");
        Ok(Self::new(scripts_dir, outputs_dir))
    }

    /// Prepare the areas named in the configuration
    pub async fn from_config(config: &Config) -> Result<Self, WorkspaceError> {
        Self::prepare(&config.scripts_dir, &config.outputs_dir).await
    }

    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }

    pub fn outputs_dir(&self) -> &Path {
        &self.outputs_dir
    }

    /// Allocate a fresh submission identifier
    pub fn allocate(&self) -> SubmissionId {
        SubmissionId::generate()
    }

    /// Path a script for `id` is staged at
    pub fn script_path(&self, id: &SubmissionId, extension: &FileExtension) -> PathBuf {
        self.scripts_dir.join(format!("script_{id}.{extension}"))
    }

    /// Path the interpreter is expected to write the artifact to
    ///
    /// The file is not created here.
    pub fn artifact_path(&self, id: &SubmissionId, extension: &FileExtension) -> PathBuf {
        self.outputs_dir.join(format!("plot_{id}.{extension}"))
    }

    /// Write `code` verbatim to a new script file and flush it to disk
    #[instrument(skip(self, code), fields(len = code.len()))]
    pub async fn stage(
        &self,
        id: &SubmissionId,
        code: &[u8],
        extension: &FileExtension,
    ) -> Result<StagedScript, WorkspaceError> {
        let path = self.script_path(id, extension);
        let stage_err = |source| WorkspaceError::Stage {
            path: path.clone(),
            source,
        };

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(stage_err)?;

        // From here on the guard owns the file and removes it on any error
        let staged = StagedScript {
            id: id.clone(),
            path: path.clone(),
            len: code.len(),
            released: false,
        };

        file.write_all(code).await.map_err(stage_err)?;
        file.sync_all().await.map_err(stage_err)?;

        debug!(?path, "staged script");
        Ok(staged)
    }

    /// Delete a staged script
    ///
    /// Never fails: a deletion error is logged and otherwise ignored.
    #[instrument(skip(self, script), fields(id = %script.id))]
    pub async fn release(&self, mut script: StagedScript) {
        script.released = true;
        match tokio::fs::remove_file(&script.path).await {
            Ok(()) => debug!(path = ?script.path, "released staged script"),
            Err(e) => warn!(
                path = %script.path.display(),
                error = %e,
                "failed to remove staged script"
            ),
        }
    }

    /// Delete artifacts whose modification time is older than `max_age`
    ///
    /// Returns the number of files removed. Entries that cannot be inspected
    /// or removed are logged and skipped.
    #[instrument(skip(self))]
    pub async fn sweep_outputs(&self, max_age: Duration) -> Result<usize, WorkspaceError> {
        let now = SystemTime::now();
        let mut removed = 0;

        let mut entries = tokio::fs::read_dir(&self.outputs_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!(?path, error = %e, "cannot inspect artifact");
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < max_age {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(?path, ?age, "swept artifact");
                    removed += 1;
                }
                Err(e) => warn!(?path, error = %e, "failed to sweep artifact"),
            }
        }

        Ok(removed)
    }
}

async fn prepare_dir(path: &Path) -> Result<PathBuf, WorkspaceError> {
    let prepare_err = |source| WorkspaceError::Prepare {
        path: path.to_path_buf(),
        source,
    };
    tokio::fs::create_dir_all(path).await.map_err(prepare_err)?;
    tokio::fs::canonicalize(path).await.map_err(prepare_err)
}
