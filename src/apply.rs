//! Patch application: resolves each change against the current content of its
//! file and splices in the replacement.
//!
//! Changes run strictly in batch order. A file touched by an earlier change is
//! read from the in-memory buffer, so later snippets see earlier edits. Each
//! change fails on its own; the rest of the batch still runs.

use crate::change::{Change, ChangeSet};
use crate::config::PolicyConfig;
use crate::edit::{atomic_write, splice, Splice};
use crate::locate::{LineHint, SnippetLocator};
use crate::policy::{PolicyValidator, PolicyViolation};
use crate::report::{ApplyReport, ChangeOutcome, ChangeStatus, FailureKind};
use crate::safety::{SafetyError, WorkspaceGuard};
use similar::TextDiff;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Write every successful edit back to disk.
    Write,
    /// Resolve and splice in memory only.
    DryRun,
}

/// Why a single change could not be applied.
#[derive(Error, Debug)]
pub enum ChangeError {
    #[error("Original code not found in {file}{}", hint_suffix(.hint))]
    SnippetNotFound {
        file: String,
        hint: Option<LineHint>,
    },

    #[error("File not found: {file}")]
    FileNotFound { file: String },

    #[error("Refusing change: {source}")]
    Unsafe { file: String, source: SafetyError },

    #[error("Error processing {file}: {source}")]
    Io {
        file: String,
        source: std::io::Error,
    },
}

fn hint_suffix(hint: &Option<LineHint>) -> String {
    match hint {
        Some(hint) => format!(" (closest line {}: {:?})", hint.line_number, hint.text),
        None => String::new(),
    }
}

impl ChangeError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ChangeError::SnippetNotFound { .. } => FailureKind::SnippetNotFound,
            ChangeError::FileNotFound { .. } => FailureKind::FileNotFound,
            ChangeError::Unsafe {
                source: SafetyError::ForbiddenPath { .. },
                ..
            } => FailureKind::ForbiddenPath,
            ChangeError::Unsafe { .. } => FailureKind::OutsideWorkspace,
            ChangeError::Io { .. } => FailureKind::Io,
        }
    }

    fn from_safety(file: &str, error: SafetyError) -> Self {
        let file = file.to_string();
        match error {
            error if error.is_not_found() => ChangeError::FileNotFound { file },
            SafetyError::Resolve { source, .. } => ChangeError::Io { file, source },
            source => ChangeError::Unsafe { file, source },
        }
    }
}

#[derive(Debug)]
struct FileBuffer {
    path: PathBuf,
    /// Path as first written in the batch.
    file: String,
    original: String,
    current: String,
}

/// Before/after content of one file touched by a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileChange<'a> {
    pub path: &'a Path,
    pub file: &'a str,
    pub original: &'a str,
    pub updated: &'a str,
}

impl FileChange<'_> {
    /// Unified diff of the file, `a/` and `b/` prefixed.
    pub fn unified_diff(&self) -> String {
        TextDiff::from_lines(self.original, self.updated)
            .unified_diff()
            .context_radius(3)
            .header(&format!("a/{}", self.file), &format!("b/{}", self.file))
            .to_string()
    }
}

/// Applies change sets inside one workspace.
#[derive(Debug)]
pub struct PatchApplier {
    guard: WorkspaceGuard,
    mode: ApplyMode,
    buffers: Vec<FileBuffer>,
}

impl PatchApplier {
    pub fn new(workspace_root: impl AsRef<Path>, mode: ApplyMode) -> Result<Self, SafetyError> {
        Ok(Self {
            guard: WorkspaceGuard::new(workspace_root)?,
            mode,
            buffers: Vec::new(),
        })
    }

    pub fn mode(&self) -> ApplyMode {
        self.mode
    }

    pub fn workspace_root(&self) -> &Path {
        self.guard.workspace_root()
    }

    /// Apply every change in order. Does not validate policy; use
    /// [`apply_change_set`] for the gated path.
    pub fn apply(&mut self, changes: &ChangeSet) -> ApplyReport {
        let mut report = ApplyReport::new();

        for (index, change) in changes.iter().enumerate() {
            let status = match self.apply_change(change) {
                Ok(status) => {
                    tracing::debug!(index, file = %change.file, ?status, "change processed");
                    status
                }
                Err(error) => {
                    tracing::warn!(index, file = %change.file, %error, "change failed");
                    ChangeStatus::Failed {
                        kind: error.kind(),
                        message: error.to_string(),
                    }
                }
            };

            report.record(ChangeOutcome {
                index,
                file: change.file.clone(),
                status,
            });
        }

        report
    }

    fn apply_change(&mut self, change: &Change) -> Result<ChangeStatus, ChangeError> {
        let path = self
            .guard
            .resolve(&change.file)
            .map_err(|error| ChangeError::from_safety(&change.file, error))?;

        let idx = self.buffer_for(&path, &change.file)?;
        let mode = self.mode;
        let buffer = &mut self.buffers[idx];

        let locator = SnippetLocator::new(&buffer.current);
        let outcome = locator.locate(&change.original);
        let Some(found) = outcome.located() else {
            return Err(ChangeError::SnippetNotFound {
                file: change.file.clone(),
                hint: locator.closest_line(&change.original),
            });
        };
        let recovered = outcome.is_recovered();

        let Splice::Applied(updated) = splice(&buffer.current, found, &change.fixed) else {
            return Ok(ChangeStatus::Unchanged);
        };

        if mode == ApplyMode::Write {
            atomic_write(&path, updated.as_bytes()).map_err(|source| ChangeError::Io {
                file: change.file.clone(),
                source,
            })?;
        }

        buffer.current = updated;
        Ok(ChangeStatus::Applied { recovered })
    }

    /// Index of the buffer for `path`, reading it from disk on first use.
    fn buffer_for(&mut self, path: &Path, file: &str) -> Result<usize, ChangeError> {
        if let Some(idx) = self.buffers.iter().position(|b| b.path == path) {
            return Ok(idx);
        }

        let content = fs::read_to_string(path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => ChangeError::FileNotFound {
                file: file.to_string(),
            },
            _ => ChangeError::Io {
                file: file.to_string(),
                source,
            },
        })?;

        self.buffers.push(FileBuffer {
            path: path.to_path_buf(),
            file: file.to_string(),
            original: content.clone(),
            current: content,
        });
        Ok(self.buffers.len() - 1)
    }

    /// Files whose content differs from what was read at first touch.
    pub fn file_changes(&self) -> Vec<FileChange<'_>> {
        self.buffers
            .iter()
            .filter(|b| b.original != b.current)
            .map(|b| FileChange {
                path: &b.path,
                file: &b.file,
                original: &b.original,
                updated: &b.current,
            })
            .collect()
    }
}

/// Validate `changes` against `policy`, then apply them.
///
/// A policy violation returns before any file is read or written.
pub fn apply_change_set(
    changes: &ChangeSet,
    policy: &PolicyConfig,
    applier: &mut PatchApplier,
) -> Result<ApplyReport, PolicyViolation> {
    PolicyValidator::new(policy).validate(changes)?;
    Ok(applier.apply(changes))
}
