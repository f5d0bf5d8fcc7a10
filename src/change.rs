//! Change model: the proposed edits submitted as one batch.
//!
//! A [`FixDocument`] is what the upstream generation step emits. It is parsed
//! and checked at the boundary ([`FixDocument::validate`]) so that malformed
//! input fails fast, before the policy gate or any file access.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// One proposed edit: replace `original` with `fixed` inside `file`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Workspace-relative path of the target file.
    pub file: String,
    /// Snippet expected to exist in the file.
    pub original: String,
    /// Replacement text. Empty means deletion.
    pub fixed: String,
}

impl Change {
    pub fn new(
        file: impl Into<String>,
        original: impl Into<String>,
        fixed: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            original: original.into(),
            fixed: fixed.into(),
        }
    }

    /// Absolute difference between the line counts of `fixed` and `original`.
    pub fn line_delta(&self) -> usize {
        line_count(&self.fixed).abs_diff(line_count(&self.original))
    }
}

/// Number of `'\n'`-separated segments; `""` counts as one line.
pub fn line_count(text: &str) -> usize {
    text.split('\n').count()
}

/// Ordered batch of changes. Order matters: changes to the same file are
/// applied against progressively mutated content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new(changes: Vec<Change>) -> Self {
        Self { changes }
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.changes.iter()
    }

    /// Distinct target paths, as written in the batch.
    pub fn distinct_files(&self) -> BTreeSet<&str> {
        self.changes.iter().map(|c| c.file.as_str()).collect()
    }

    /// Sum of per-change absolute line deltas.
    pub fn total_line_delta(&self) -> usize {
        self.changes.iter().map(Change::line_delta).sum()
    }

    /// Changes whose `file` or `original` is blank. `fixed` may be empty.
    pub fn blank_field_issues(&self) -> Vec<ChangeSetIssue> {
        let mut issues = Vec::new();
        for (index, change) in self.changes.iter().enumerate() {
            if change.file.trim().is_empty() {
                issues.push(ChangeSetIssue::BlankField {
                    index,
                    field: "file",
                });
            }
            if change.original.trim().is_empty() {
                issues.push(ChangeSetIssue::BlankField {
                    index,
                    field: "original",
                });
            }
        }
        issues
    }

    /// Target paths in first-seen order.
    pub fn files_in_order(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.changes
            .iter()
            .map(|c| c.file.as_str())
            .filter(|f| seen.insert(*f))
            .collect()
    }
}

impl From<Vec<Change>> for ChangeSet {
    fn from(changes: Vec<Change>) -> Self {
        Self::new(changes)
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

/// The batch document as produced upstream.
///
/// Only `changes` is interpreted. `summary`, `confidence` and any other
/// top-level keys are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixDocument {
    pub changes: ChangeSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl FixDocument {
    /// Check required fields. Collects every issue instead of stopping at the
    /// first one.
    pub fn validate(&self) -> Result<(), ChangeSetIssues> {
        ChangeSetIssues::check(self.changes.blank_field_issues())
    }
}

const REQUIRED_FIELDS: &[&str] = &["file", "original", "fixed"];

/// Structural problems in a parsed but not yet typed document.
fn missing_fields(value: &Value) -> Vec<ChangeSetIssue> {
    let Some(changes) = value.get("changes").and_then(Value::as_array) else {
        return vec![ChangeSetIssue::MissingChanges];
    };

    let mut issues = Vec::new();
    for (index, entry) in changes.iter().enumerate() {
        for &field in REQUIRED_FIELDS {
            if !entry.get(field).is_some_and(Value::is_string) {
                issues.push(ChangeSetIssue::MissingField { index, field });
            }
        }
    }
    issues
}

#[derive(Debug, Clone)]
pub struct ChangeSetIssues {
    pub issues: Vec<ChangeSetIssue>,
}

impl ChangeSetIssues {
    fn check(issues: Vec<ChangeSetIssue>) -> Result<(), Self> {
        if issues.is_empty() {
            Ok(())
        } else {
            Err(Self { issues })
        }
    }
}

impl fmt::Display for ChangeSetIssues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ChangeSetIssues {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSetIssue {
    /// No top-level `changes` list.
    MissingChanges,
    /// A required field is absent or not a string.
    MissingField { index: usize, field: &'static str },
    BlankField { index: usize, field: &'static str },
}

impl fmt::Display for ChangeSetIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeSetIssue::MissingChanges => write!(f, "document has no 'changes' list"),
            ChangeSetIssue::MissingField { index, field } => {
                write!(f, "change #{index} is missing a string '{field}' field")
            }
            ChangeSetIssue::BlankField { index, field } => {
                write!(f, "change #{index} has a blank '{field}' field")
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum ChangeSetError {
    #[error("failed to read change batch from {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The input is not JSON at all.
    #[error("failed to parse change batch: {0}")]
    Json(#[from] serde_json::Error),

    /// Well-formed JSON whose values do not fit the document types.
    #[error("malformed change batch: {0}")]
    Schema(serde_json::Error),

    #[error("invalid change batch: {0}")]
    Invalid(#[from] ChangeSetIssues),
}

impl ChangeSetError {
    /// The input could not be read or is not JSON, as opposed to a readable
    /// batch that failed validation.
    pub fn is_unreadable(&self) -> bool {
        matches!(self, ChangeSetError::Io { .. } | ChangeSetError::Json(_))
    }
}

/// Parse and validate a batch document from JSON text.
///
/// Missing or blank required fields are collected into
/// [`ChangeSetError::Invalid`] rather than surfacing as a parse error.
pub fn parse_document(input: &str) -> Result<FixDocument, ChangeSetError> {
    let value: Value = serde_json::from_str(input)?;
    ChangeSetIssues::check(missing_fields(&value))?;

    let document: FixDocument = serde_json::from_value(value).map_err(ChangeSetError::Schema)?;
    document.validate()?;
    Ok(document)
}

/// Read, parse and validate a batch document from disk.
pub fn load_document(path: impl AsRef<Path>) -> Result<FixDocument, ChangeSetError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ChangeSetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_count_matches_newline_segments() {
        assert_eq!(line_count(""), 1);
        assert_eq!(line_count("a"), 1);
        assert_eq!(line_count("a\n"), 2);
        assert_eq!(line_count("a\nb\nc"), 3);
    }

    #[test]
    fn test_line_delta_is_absolute() {
        let grow = Change::new("a.swift", "x", "x\ny\nz");
        let shrink = Change::new("a.swift", "x\ny\nz", "x");
        assert_eq!(grow.line_delta(), 2);
        assert_eq!(shrink.line_delta(), 2);
    }

    #[test]
    fn test_parse_document_with_metadata_passthrough() {
        let json = r#"{
            "summary": "fix crash",
            "confidence": 0.8,
            "issue": 42,
            "changes": [
                {"file": "A.swift", "original": "doA()", "fixed": "doB()"}
            ]
        }"#;

        let doc = parse_document(json).unwrap();
        assert_eq!(doc.changes.len(), 1);
        assert_eq!(doc.summary.as_deref(), Some("fix crash"));
        assert_eq!(doc.confidence, Some(serde_json::json!(0.8)));
        assert_eq!(doc.extra.get("issue"), Some(&serde_json::json!(42)));

        let round = serde_json::to_value(&doc).unwrap();
        assert_eq!(round["issue"], 42);
    }

    #[test]
    fn test_parse_document_missing_fixed_is_invalid_not_unreadable() {
        let json = r#"{"changes": [{"file": "A.swift", "original": "doA()"}]}"#;
        let err = parse_document(json).unwrap_err();
        assert!(!err.is_unreadable());
        let ChangeSetError::Invalid(issues) = err else {
            panic!("expected validation failure");
        };
        assert_eq!(
            issues.issues,
            vec![ChangeSetIssue::MissingField {
                index: 0,
                field: "fixed"
            }]
        );
    }

    #[test]
    fn test_parse_document_missing_changes_and_non_string_fields() {
        let err = parse_document(r#"{"summary": "x"}"#).unwrap_err();
        assert!(err.to_string().contains("no 'changes' list"));

        let json = r#"{"changes": [{"file": 3, "fixed": "y"}, "oops"]}"#;
        let ChangeSetError::Invalid(issues) = parse_document(json).unwrap_err() else {
            panic!("expected validation failure");
        };
        assert_eq!(issues.issues.len(), 5);
        assert_eq!(
            issues.issues[0],
            ChangeSetIssue::MissingField {
                index: 0,
                field: "file"
            }
        );
    }

    #[test]
    fn test_syntax_error_is_unreadable() {
        let err = parse_document("{ not json").unwrap_err();
        assert!(matches!(err, ChangeSetError::Json(_)));
        assert!(err.is_unreadable());
    }

    #[test]
    fn test_blank_field_issues_on_change_set() {
        let set = ChangeSet::new(vec![
            Change::new("A.swift", "x", ""),
            Change::new("A.swift", "  ", "y"),
        ]);
        assert_eq!(
            set.blank_field_issues(),
            vec![ChangeSetIssue::BlankField {
                index: 1,
                field: "original"
            }]
        );
    }

    #[test]
    fn test_parse_document_blank_fields_collects_all_issues() {
        let json = r#"{"changes": [
            {"file": " ", "original": "x", "fixed": ""},
            {"file": "B.swift", "original": "\n", "fixed": "y"}
        ]}"#;

        let err = parse_document(json).unwrap_err();
        let ChangeSetError::Invalid(issues) = err else {
            panic!("expected validation failure");
        };
        assert_eq!(
            issues.issues,
            vec![
                ChangeSetIssue::BlankField {
                    index: 0,
                    field: "file"
                },
                ChangeSetIssue::BlankField {
                    index: 1,
                    field: "original"
                },
            ]
        );
    }

    #[test]
    fn test_empty_fixed_is_allowed() {
        let json = r#"{"changes": [{"file": "A.swift", "original": "x()", "fixed": ""}]}"#;
        assert!(parse_document(json).is_ok());
    }

    #[test]
    fn test_empty_change_list_passes_boundary_validation() {
        let doc = parse_document(r#"{"changes": []}"#).unwrap();
        assert!(doc.changes.is_empty());
    }

    #[test]
    fn test_distinct_files_and_order() {
        let set = ChangeSet::new(vec![
            Change::new("b.swift", "1", "2"),
            Change::new("a.swift", "1", "2"),
            Change::new("b.swift", "3", "4"),
        ]);
        assert_eq!(set.distinct_files().len(), 2);
        assert_eq!(set.files_in_order(), vec!["b.swift", "a.swift"]);
    }
}
