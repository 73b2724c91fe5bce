//! Filename validation for untrusted submissions
//!
//! Names are checked against a character whitelist and then resolved
//! lexically against the workspace root. The resolved path must be a strict
//! descendant of the root.

use std::path::{Component, Path, PathBuf};

use crate::types::MAX_NAME_LEN;
use crate::workspace::WorkspaceError;

/// Check that a filename only uses `[A-Za-z0-9_.- /]` and fits the length limit
pub fn is_allowed_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().count() <= MAX_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | ' ' | '/'))
}

/// Resolve `name` against `root`, rejecting anything that does not land
/// strictly inside it.
///
/// `root` is expected to be absolute and free of `.`/`..` components.
pub fn resolve(name: &str, root: &Path) -> Result<PathBuf, WorkspaceError> {
    if !is_allowed_name(name) {
        return Err(WorkspaceError::invalid_path(name));
    }

    let mut resolved = root.to_path_buf();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !resolved.pop() {
                    return Err(WorkspaceError::invalid_path(name));
                }
            }
            // An absolute name would replace the root entirely
            Component::RootDir | Component::Prefix(_) => {
                return Err(WorkspaceError::invalid_path(name));
            }
        }
    }

    if resolved == root || !resolved.starts_with(root) {
        return Err(WorkspaceError::invalid_path(name));
    }

    Ok(resolved)
}

/// Resolve every name, failing on the first invalid one
pub fn resolve_all<'a, I>(names: I, root: &Path) -> Result<Vec<PathBuf>, WorkspaceError>
where
    I: IntoIterator<Item = &'a str>,
{
    names.into_iter().map(|name| resolve(name, root)).collect()
}
