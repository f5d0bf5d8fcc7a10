use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const DEFAULT_MAX_FILES_PER_CHANGE_SET: usize = 3;
pub const DEFAULT_MAX_LINE_DELTA: usize = 100;
pub const DEFAULT_FORBIDDEN_PATTERN: &str = "password|secret|token";
pub const DEFAULT_FORBIDDEN_DESCRIPTION: &str = "credential-like keyword";
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[".swift"];

/// On-disk policy layout. Every key is optional; missing keys fall back to
/// the matching [`PolicyConfig::default`] field.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct PolicyDocument {
    #[serde(default)]
    pub auto_fix_config: LimitsSection,
    #[serde(default)]
    pub forbidden_code_patterns: Option<Vec<PatternEntry>>,
    #[serde(default)]
    pub allowed_file_extensions: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct LimitsSection {
    #[serde(default)]
    pub max_files_per_fix: Option<usize>,
    #[serde(default)]
    pub max_lines_per_fix: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct PatternEntry {
    pub pattern: String,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub description: Option<String>,
}

impl PolicyDocument {
    /// Compile the document into a usable policy. Fails on the first invalid
    /// regular expression.
    pub fn compile(self) -> Result<PolicyConfig, regex::Error> {
        let defaults = PolicyConfig::default();

        let forbidden_patterns = match self.forbidden_code_patterns {
            Some(entries) => entries
                .into_iter()
                .map(ForbiddenPattern::from_entry)
                .collect::<Result<Vec<_>, _>>()?,
            None => defaults.forbidden_patterns,
        };

        let allowed_extensions = match self.allowed_file_extensions {
            Some(exts) => exts.into_iter().collect(),
            None => defaults.allowed_extensions,
        };

        Ok(PolicyConfig {
            max_files_per_change_set: self
                .auto_fix_config
                .max_files_per_fix
                .unwrap_or(defaults.max_files_per_change_set),
            max_line_delta: self
                .auto_fix_config
                .max_lines_per_fix
                .unwrap_or(defaults.max_line_delta),
            forbidden_patterns,
            allowed_extensions,
        })
    }
}

/// Limits and forbidden-content rules gating a change set.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    pub max_files_per_change_set: usize,
    /// Upper bound on the summed absolute line-count differences.
    pub max_line_delta: usize,
    /// Screened against `fixed` text, in order.
    pub forbidden_patterns: Vec<ForbiddenPattern>,
    /// Suffixes such as `.swift`.
    pub allowed_extensions: BTreeSet<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        let credential = ForbiddenPattern::new(
            DEFAULT_FORBIDDEN_PATTERN,
            false,
            Some(DEFAULT_FORBIDDEN_DESCRIPTION.to_string()),
        )
        .expect("built-in forbidden pattern is a valid regex");

        Self {
            max_files_per_change_set: DEFAULT_MAX_FILES_PER_CHANGE_SET,
            max_line_delta: DEFAULT_MAX_LINE_DELTA,
            forbidden_patterns: vec![credential],
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl PolicyConfig {
    /// Whether `file` ends with one of the allowed suffixes.
    pub fn allows_file(&self, file: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|ext| file.ends_with(ext.as_str()))
    }
}

/// A compiled forbidden-content rule.
#[derive(Debug, Clone)]
pub struct ForbiddenPattern {
    pattern: String,
    case_sensitive: bool,
    description: Option<String>,
    regex: Regex,
}

impl ForbiddenPattern {
    pub fn new(
        pattern: impl Into<String>,
        case_sensitive: bool,
        description: Option<String>,
    ) -> Result<Self, regex::Error> {
        let pattern = pattern.into();
        let regex = if case_sensitive {
            Regex::new(&pattern)?
        } else {
            Regex::new(&format!("(?i){pattern}"))?
        };
        Ok(Self {
            pattern,
            case_sensitive,
            description,
            regex,
        })
    }

    fn from_entry(entry: PatternEntry) -> Result<Self, regex::Error> {
        Self::new(entry.pattern, entry.case_sensitive, entry.description)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Human-readable label; the raw pattern when no description was given.
    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.pattern)
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}
