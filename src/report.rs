//! Per-change outcomes and the batch-level result built from them.

use crate::policy::ValidationOutcome;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;

/// Failure classes surfaced per change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SnippetNotFound,
    FileNotFound,
    OutsideWorkspace,
    ForbiddenPath,
    Io,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::SnippetNotFound => "snippet not found",
            FailureKind::FileNotFound => "file not found",
            FailureKind::OutsideWorkspace => "outside workspace",
            FailureKind::ForbiddenPath => "protected path",
            FailureKind::Io => "I/O error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChangeStatus {
    /// Replacement written (or staged, in dry-run mode).
    Applied { recovered: bool },
    /// The resolved text already equals the replacement.
    Unchanged,
    Failed { kind: FailureKind, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeOutcome {
    /// Position of the change in the batch.
    pub index: usize,
    pub file: String,
    #[serde(flatten)]
    pub status: ChangeStatus,
}

impl ChangeOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self.status, ChangeStatus::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileTally {
    pub succeeded: usize,
    pub failed: usize,
}

/// Aggregate of every change outcome in a run.
///
/// The batch succeeds only if every change did. Successful changes are never
/// rolled back because a sibling failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    outcomes: Vec<ChangeOutcome>,
}

impl ApplyReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: ChangeOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[ChangeOutcome] {
        &self.outcomes
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn is_success(&self) -> bool {
        self.succeeded() == self.total()
    }

    /// `(file, reason)` for every failed change, in batch order.
    pub fn failures(&self) -> Vec<(&str, &str)> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.status {
                ChangeStatus::Failed { message, .. } => Some((o.file.as_str(), message.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Files with at least one failure, deduplicated, in batch order.
    pub fn failed_files(&self) -> Vec<&str> {
        let mut files: Vec<&str> = Vec::new();
        for (file, _) in self.failures() {
            if !files.contains(&file) {
                files.push(file);
            }
        }
        files
    }

    /// Success/failure counts per file, in first-seen order.
    pub fn file_tallies(&self) -> Vec<(&str, FileTally)> {
        let mut tallies: Vec<(&str, FileTally)> = Vec::new();
        for outcome in &self.outcomes {
            let idx = match tallies.iter().position(|(f, _)| *f == outcome.file) {
                Some(idx) => idx,
                None => {
                    tallies.push((outcome.file.as_str(), FileTally::default()));
                    tallies.len() - 1
                }
            };
            if outcome.is_success() {
                tallies[idx].1.succeeded += 1;
            } else {
                tallies[idx].1.failed += 1;
            }
        }
        tallies
    }
}

impl Serialize for ApplyReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Failure<'a> {
            file: &'a str,
            reason: &'a str,
        }

        let failures: Vec<Failure<'_>> = self
            .failures()
            .into_iter()
            .map(|(file, reason)| Failure { file, reason })
            .collect();

        let mut state = serializer.serialize_struct("ApplyReport", 5)?;
        state.serialize_field("total", &self.total())?;
        state.serialize_field("succeeded", &self.succeeded())?;
        state.serialize_field("success", &self.is_success())?;
        state.serialize_field("failures", &failures)?;
        state.serialize_field("outcomes", &self.outcomes)?;
        state.end()
    }
}

/// Machine-readable status of one invocation, for pipeline consumers.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatus {
    pub validation: ValidationOutcome,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ApplyReport>,
    pub success: bool,
}

impl RunStatus {
    pub fn rejected(validation: ValidationOutcome, dry_run: bool) -> Self {
        Self {
            validation,
            dry_run,
            report: None,
            success: false,
        }
    }

    pub fn completed(validation: ValidationOutcome, report: ApplyReport, dry_run: bool) -> Self {
        let success = validation.passed && report.is_success();
        Self {
            validation,
            dry_run,
            report: Some(report),
            success,
        }
    }
}
