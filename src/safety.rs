//! Workspace boundary for change targets.

use std::ffi::OsStr;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Directory names a change may never write into, at any depth.
const PROTECTED_DIRS: &[&str] = &[".git"];

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("{file} resolves outside the workspace {}", .workspace.display())]
    OutsideWorkspace { file: String, workspace: PathBuf },

    #[error("{file} is inside the protected '{dir}' directory")]
    ForbiddenPath { file: String, dir: &'static str },

    #[error("cannot resolve {}: {source}", .path.display())]
    Resolve { path: PathBuf, source: io::Error },
}

impl SafetyError {
    /// The target simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SafetyError::Resolve { source, .. } if source.kind() == io::ErrorKind::NotFound
        )
    }
}

/// Resolves batch paths against one canonical workspace root.
#[derive(Debug, Clone)]
pub struct WorkspaceGuard {
    root: PathBuf,
}

impl WorkspaceGuard {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let root = root.as_ref();
        let root = root.canonicalize().map_err(|source| SafetyError::Resolve {
            path: root.to_path_buf(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn workspace_root(&self) -> &Path {
        &self.root
    }

    /// Canonical path of an existing `file` under the root.
    ///
    /// `..` components and symlinks are resolved before the prefix check, so
    /// neither can leave the workspace.
    pub fn resolve(&self, file: &str) -> Result<PathBuf, SafetyError> {
        let joined = self.root.join(file);
        let canonical = joined
            .canonicalize()
            .map_err(|source| SafetyError::Resolve {
                path: joined.clone(),
                source,
            })?;

        let Ok(relative) = canonical.strip_prefix(&self.root) else {
            return Err(SafetyError::OutsideWorkspace {
                file: file.to_string(),
                workspace: self.root.clone(),
            });
        };

        if let Some(dir) = protected_component(relative) {
            return Err(SafetyError::ForbiddenPath {
                file: file.to_string(),
                dir,
            });
        }

        Ok(canonical)
    }
}

fn protected_component(relative: &Path) -> Option<&'static str> {
    relative.components().find_map(|component| match component {
        Component::Normal(name) => PROTECTED_DIRS
            .iter()
            .copied()
            .find(|dir| name == OsStr::new(dir)),
        _ => None,
    })
}
