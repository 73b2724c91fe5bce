//! Per-request workspaces
//!
//! A workspace is a freshly named directory under the configured root that
//! holds the staged source files and the built executable for exactly one
//! request. Every filename is checked by [`guard`] before anything touches
//! the disk, and [`Workspace::cleanup`] removes everything that was created.

use std::path::PathBuf;

use thiserror::Error;

pub use crate::workspace::guard::{is_allowed_name, resolve, resolve_all};
pub use crate::workspace::lifecycle::Workspace;

pub mod guard;
mod lifecycle;

/// Errors that occur while staging a workspace
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("{0}")]
    InvalidPath(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WorkspaceError {
    pub(crate) fn invalid_path(name: &str) -> Self {
        Self::InvalidPath(format!("Filename '{name}' is not a valid path."))
    }

    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
