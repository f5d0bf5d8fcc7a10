//! Autofix Patcher: policy-gated application of generated code fixes
//!
//! Takes a batch of `{file, original, fixed}` snippet pairs produced by an
//! upstream generator, checks the whole batch against a [`PolicyConfig`],
//! and only then locates each snippet in its file and substitutes the fix.
//!
//! # Pipeline
//!
//! [`ChangeSet`] → [`PolicyValidator`] (gate) → [`SnippetLocator`] (per
//! change) → [`PatchApplier`] (mutates files) → [`ApplyReport`].
//!
//! # Safety
//!
//! - The policy gate runs once over the full batch before any file is opened
//! - Only the first occurrence of a resolved snippet is replaced
//! - Every splice targets a span located in the current buffer
//! - Whole-file atomic writes (tempfile + fsync + rename)
//! - Workspace boundary enforcement
//!
//! # Example
//!
//! ```no_run
//! use autofix_patcher::{apply_change_set, ApplyMode, Change, ChangeSet, PatchApplier, PolicyConfig};
//!
//! let changes = ChangeSet::new(vec![Change::new("Sources/App.swift", "doA()", "doB()")]);
//! let policy = PolicyConfig::default();
//! let mut applier = PatchApplier::new(".", ApplyMode::Write).expect("workspace exists");
//!
//! match apply_change_set(&changes, &policy, &mut applier) {
//!     Ok(report) => println!("{}/{} applied", report.succeeded(), report.total()),
//!     Err(violation) => eprintln!("rejected: {violation}"),
//! }
//! ```

pub mod apply;
pub mod change;
pub mod config;
pub mod edit;
pub mod locate;
pub mod policy;
pub mod report;
pub mod safety;
pub mod secrets;

// Re-exports
pub use apply::{apply_change_set, ApplyMode, ChangeError, FileChange, PatchApplier};
pub use change::{
    load_document, parse_document, Change, ChangeSet, ChangeSetError, ChangeSetIssue,
    FixDocument,
};
pub use config::{load_or_default, ConfigError, ForbiddenPattern, PolicyConfig};
pub use edit::{atomic_write, splice, Splice};
pub use locate::{LocateOutcome, Located, SnippetLocator};
pub use policy::{PolicyValidator, PolicyViolation, ValidationOutcome};
pub use report::{ApplyReport, ChangeOutcome, ChangeStatus, FailureKind, RunStatus};
pub use safety::{SafetyError, WorkspaceGuard};
pub use secrets::{SecretFinding, SecretScanner};
