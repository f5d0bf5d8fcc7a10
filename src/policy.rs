//! Policy gate run over a whole change set before any file is opened.
//!
//! Rules are checked in a fixed order and the first failure wins, so the
//! reported reason is reproducible for a given batch and policy.

use crate::change::{ChangeSet, ChangeSetIssue};
use crate::config::PolicyConfig;
use serde::Serialize;
use thiserror::Error;

/// Reason a change set was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    #[error("No changes found")]
    EmptyChangeSet,

    #[error("Invalid change: {0}")]
    InvalidChange(ChangeSetIssue),

    #[error("Forbidden pattern detected: {description}")]
    ForbiddenPattern { description: String, file: String },

    #[error("Too many files affected: {count} (max: {max})")]
    TooManyFiles { count: usize, max: usize },

    #[error("Too many lines changed: {delta} (max: {max})")]
    TooManyLines { delta: usize, max: usize },

    #[error("File extension not allowed: {file}")]
    ExtensionNotAllowed { file: String },
}

/// Pass/fail plus the single reason shown to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    pub passed: bool,
    pub reason: String,
}

impl ValidationOutcome {
    pub const PASSED_REASON: &'static str = "All checks passed";

    pub fn passed() -> Self {
        Self {
            passed: true,
            reason: Self::PASSED_REASON.to_string(),
        }
    }

    pub fn rejected(violation: &PolicyViolation) -> Self {
        Self {
            passed: false,
            reason: violation.to_string(),
        }
    }
}

impl From<&Result<(), PolicyViolation>> for ValidationOutcome {
    fn from(result: &Result<(), PolicyViolation>) -> Self {
        match result {
            Ok(()) => Self::passed(),
            Err(violation) => Self::rejected(violation),
        }
    }
}

/// Checks change sets against one [`PolicyConfig`].
#[derive(Debug, Clone)]
pub struct PolicyValidator<'a> {
    policy: &'a PolicyConfig,
}

impl<'a> PolicyValidator<'a> {
    pub fn new(policy: &'a PolicyConfig) -> Self {
        Self { policy }
    }

    /// Run every rule in order. Pure: no filesystem access.
    pub fn validate(&self, changes: &ChangeSet) -> Result<(), PolicyViolation> {
        if changes.is_empty() {
            return Err(PolicyViolation::EmptyChangeSet);
        }

        if let Some(issue) = changes.blank_field_issues().into_iter().next() {
            return Err(PolicyViolation::InvalidChange(issue));
        }

        self.check_forbidden_patterns(changes)?;
        self.check_file_count(changes)?;
        self.check_line_delta(changes)?;
        self.check_extensions(changes)?;

        tracing::debug!(changes = changes.len(), "change set passed policy");
        Ok(())
    }

    // Pattern-major: the first configured pattern that matches any change
    // decides the reason. Only `fixed` is screened.
    fn check_forbidden_patterns(&self, changes: &ChangeSet) -> Result<(), PolicyViolation> {
        for pattern in &self.policy.forbidden_patterns {
            for change in changes {
                if pattern.is_match(&change.fixed) {
                    return Err(PolicyViolation::ForbiddenPattern {
                        description: pattern.description().to_string(),
                        file: change.file.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_file_count(&self, changes: &ChangeSet) -> Result<(), PolicyViolation> {
        let count = changes.distinct_files().len();
        let max = self.policy.max_files_per_change_set;
        if count > max {
            return Err(PolicyViolation::TooManyFiles { count, max });
        }
        Ok(())
    }

    fn check_line_delta(&self, changes: &ChangeSet) -> Result<(), PolicyViolation> {
        let delta = changes.total_line_delta();
        let max = self.policy.max_line_delta;
        if delta > max {
            return Err(PolicyViolation::TooManyLines { delta, max });
        }
        Ok(())
    }

    fn check_extensions(&self, changes: &ChangeSet) -> Result<(), PolicyViolation> {
        match changes.iter().find(|c| !self.policy.allows_file(&c.file)) {
            Some(change) => Err(PolicyViolation::ExtensionNotAllowed {
                file: change.file.clone(),
            }),
            None => Ok(()),
        }
    }
}
