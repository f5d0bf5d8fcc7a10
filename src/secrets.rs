//! Credential detection over text and directory trees.
//!
//! Complements the policy gate: the gate screens proposed replacements, this
//! scans what is already on disk (e.g. from a pre-commit hook).

use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const BUILTIN_DETECTORS: &[(&str, &str)] = &[
    (r"(?i)gh[opsu]_[A-Za-z0-9]{36}", "GitHub Token"),
    (
        r"(?i)github_pat_[A-Za-z0-9]{22}_[A-Za-z0-9]{59}",
        "GitHub Personal Access Token",
    ),
    (r"(?i)sk-[A-Za-z0-9]{48}", "OpenAI/Anthropic API Key"),
    (r"(?i)sk-ant-api[0-9]{2}-[A-Za-z0-9\-_]{95}", "Anthropic API Key"),
    (
        r#"(?i)api[_-]?key["']?\s*[:=]\s*["'][A-Za-z0-9\-_]{20,}["']"#,
        "API Key",
    ),
    (r#"(?i)token["']?\s*[:=]\s*["'][A-Za-z0-9\-_]{20,}["']"#, "Token"),
    (r#"(?i)secret["']?\s*[:=]\s*["'][A-Za-z0-9\-_]{20,}["']"#, "Secret"),
];

/// Path components never descended into or scanned.
const EXCLUDED_NAMES: &[&str] = &[
    ".git",
    ".env.example",
    "__pycache__",
    ".pytest_cache",
    "node_modules",
    "build",
    "dist",
];

const BINARY_SUFFIXES: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".pdf", ".zip"];

const EXCERPT_LIMIT: usize = 100;

#[derive(Debug, Clone)]
struct Detector {
    kind: &'static str,
    regex: Regex,
}

/// One suspicious line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretFinding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// 1-based.
    pub line: usize,
    pub kind: &'static str,
    /// Trimmed line, truncated.
    pub excerpt: String,
}

#[derive(Debug, Clone)]
pub struct SecretScanner {
    detectors: Vec<Detector>,
}

impl Default for SecretScanner {
    fn default() -> Self {
        let detectors = BUILTIN_DETECTORS
            .iter()
            .map(|&(pattern, kind)| Detector {
                kind,
                regex: Regex::new(pattern).expect("built-in secret detector is a valid regex"),
            })
            .collect();
        Self { detectors }
    }
}

impl SecretScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every (line, detector) hit in `text`.
    pub fn scan_text(&self, text: &str) -> Vec<SecretFinding> {
        let mut findings = Vec::new();
        for (idx, line) in text.split('\n').enumerate() {
            for detector in &self.detectors {
                if detector.regex.is_match(line) {
                    findings.push(SecretFinding {
                        path: None,
                        line: idx + 1,
                        kind: detector.kind,
                        excerpt: line.trim().chars().take(EXCERPT_LIMIT).collect(),
                    });
                }
            }
        }
        findings
    }

    pub fn scan_file(&self, path: &Path) -> Vec<SecretFinding> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "could not read file, skipping");
                return Vec::new();
            }
        };

        let text = String::from_utf8_lossy(&bytes);
        self.scan_text(&text)
            .into_iter()
            .map(|finding| SecretFinding {
                path: Some(path.to_path_buf()),
                ..finding
            })
            .collect()
    }

    /// Scan a file, or every eligible file under a directory.
    pub fn scan_tree(&self, root: &Path) -> Vec<SecretFinding> {
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_excluded(entry.path()));

        let mut findings = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    tracing::warn!(%error, "skipping unreadable directory entry");
                    continue;
                }
            };
            if entry.file_type().is_file() && !is_binary(entry.path()) {
                findings.extend(self.scan_file(entry.path()));
            }
        }
        findings
    }
}

fn is_excluded(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| EXCLUDED_NAMES.contains(&name))
}

fn is_binary(path: &Path) -> bool {
    let name = path.to_string_lossy().to_lowercase();
    BINARY_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}
