//! Workspace lifecycle: allocation, staging and removal

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::workspace::{WorkspaceError, guard};

/// A uniquely named directory owned by a single request
///
/// # Cleanup
///
/// Call [`cleanup()`](Self::cleanup) once the request is finished. If the
/// workspace is dropped before that (a panic, or the owning future being
/// cancelled), `Drop` removes whatever is left synchronously.
#[derive(Debug)]
pub struct Workspace {
    /// Random 128-bit identifier
    id: Uuid,

    /// `<base>/<id>`
    root: PathBuf,

    /// Every path created inside the workspace, in creation order
    artifacts: Vec<PathBuf>,

    /// Whether cleanup already ran
    cleaned: bool,
}

impl Workspace {
    /// Allocate a workspace under `base` without touching the filesystem
    pub fn new(base: impl AsRef<Path>) -> Self {
        let id = Uuid::new_v4();
        let root = base.as_ref().join(id.to_string());
        Self {
            id,
            root,
            artifacts: Vec::new(),
            cleaned: false,
        }
    }

    /// Get the workspace ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Get the path to the workspace directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Paths recorded so far
    pub fn artifacts(&self) -> &[PathBuf] {
        &self.artifacts
    }

    /// Check if cleanup already ran
    pub fn is_cleaned(&self) -> bool {
        self.cleaned
    }

    /// Where the toolchain should place the built executable
    pub fn executable_path(&self) -> PathBuf {
        self.root.join(format!("__{}", self.id))
    }

    /// Resolve an untrusted filename inside this workspace
    pub fn resolve(&self, name: &str) -> Result<PathBuf, WorkspaceError> {
        guard::resolve(name, &self.root)
    }

    /// Record a path created inside the workspace so cleanup removes it
    pub fn record(&mut self, path: PathBuf) {
        if !self.artifacts.contains(&path) {
            self.artifacts.push(path);
        }
    }

    /// Write `files` into the workspace.
    ///
    /// Every name is validated before the directory is created, so an invalid
    /// name leaves nothing behind. Returns the absolute paths written, in the
    /// iteration order of `files`.
    #[instrument(skip(self, files), fields(workspace = %self.id, files = files.len()))]
    pub async fn stage(
        &mut self,
        files: &BTreeMap<String, String>,
    ) -> Result<Vec<PathBuf>, WorkspaceError> {
        let resolved = guard::resolve_all(files.keys().map(String::as_str), &self.root)?;

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(WorkspaceError::io(&self.root))?;

        let mut written = Vec::with_capacity(resolved.len());
        for (path, content) in resolved.into_iter().zip(files.values()) {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(WorkspaceError::io(parent))?;
            }

            tokio::fs::write(&path, content.as_bytes())
                .await
                .map_err(WorkspaceError::io(&path))?;
            debug!(?path, len = content.len(), "staged file");

            self.record(path.clone());
            written.push(path);
        }

        Ok(written)
    }

    /// Remove every recorded artifact, then the workspace directory.
    ///
    /// Failures are logged and swallowed. Calling this more than once is a
    /// no-op.
    #[instrument(skip(self), fields(workspace = %self.id))]
    pub async fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;

        for artifact in std::mem::take(&mut self.artifacts) {
            match tokio::fs::remove_file(&artifact).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(?artifact, "artifact already gone");
                }
                Err(e) => warn!(?artifact, error = %e, "failed to remove artifact"),
            }
        }

        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => debug!("workspace removed"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(root = %self.root.display(), error = %e, "failed to remove workspace"),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.cleaned {
            return;
        }
        if self.artifacts.is_empty() && !self.root.exists() {
            return;
        }

        warn!(
            workspace = %self.id,
            root = %self.root.display(),
            "workspace dropped without cleanup, removing synchronously"
        );

        for artifact in &self.artifacts {
            if let Err(e) = std::fs::remove_file(artifact)
                && e.kind() != ErrorKind::NotFound
            {
                warn!(?artifact, error = %e, "failed to remove artifact");
            }
        }
        if let Err(e) = std::fs::remove_dir_all(&self.root)
            && e.kind() != ErrorKind::NotFound
        {
            warn!(root = %self.root.display(), error = %e, "failed to remove workspace");
        }
        self.cleaned = true;
    }
}
