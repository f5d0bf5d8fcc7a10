use crate::config::schema::{PolicyConfig, PolicyDocument};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Serialization of a policy document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyFormat {
    Json,
    Toml,
}

impl PolicyFormat {
    /// `.toml` files are TOML, everything else is treated as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => PolicyFormat::Toml,
            _ => PolicyFormat::Json,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Json {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Pattern {
        path: Option<PathBuf>,
        source: regex::Error,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = Some(path.to_path_buf());
        match self {
            ConfigError::Json { path: None, source } => ConfigError::Json { path, source },
            ConfigError::Toml { path: None, source } => ConfigError::Toml { path, source },
            ConfigError::Pattern { path: None, source } => ConfigError::Pattern { path, source },
            other => other,
        }
    }

    fn location(path: &Option<PathBuf>) -> String {
        match path {
            Some(path) => format!(" ({})", path.display()),
            None => String::new(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(
                    f,
                    "failed to read policy from {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::Json { path, source } => write!(
                f,
                "failed to parse policy JSON{}: {}",
                Self::location(path),
                source
            ),
            ConfigError::Toml { path, source } => write!(
                f,
                "failed to parse policy TOML{}: {}",
                Self::location(path),
                source
            ),
            ConfigError::Pattern { path, source } => write!(
                f,
                "invalid forbidden pattern in policy{}: {}",
                Self::location(path),
                source
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Json { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Pattern { source, .. } => Some(source),
        }
    }
}

pub fn load_from_str(input: &str, format: PolicyFormat) -> Result<PolicyConfig, ConfigError> {
    let document: PolicyDocument = match format {
        PolicyFormat::Json => serde_json::from_str(input)
            .map_err(|source| ConfigError::Json { path: None, source })?,
        PolicyFormat::Toml => toml_edit::de::from_str(input)
            .map_err(|source| ConfigError::Toml { path: None, source })?,
    };
    document
        .compile()
        .map_err(|source| ConfigError::Pattern { path: None, source })
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<PolicyConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents, PolicyFormat::from_path(path)).map_err(|error| error.with_path(path))
}

/// Load the policy at `path`, or the built-in defaults.
///
/// A missing path yields the defaults quietly. Any load error is logged and
/// also yields the defaults; policy problems are never fatal.
pub fn load_or_default(path: Option<&Path>) -> PolicyConfig {
    let Some(path) = path else {
        tracing::debug!("no policy document given, using built-in defaults");
        return PolicyConfig::default();
    };

    match load_from_path(path) {
        Ok(policy) => {
            tracing::debug!(path = %path.display(), "loaded policy document");
            policy
        }
        Err(error) => {
            tracing::warn!(%error, "falling back to built-in policy defaults");
            PolicyConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON_POLICY: &str = r#"{
        "auto_fix_config": {"max_files_per_fix": 5, "max_lines_per_fix": 20},
        "forbidden_code_patterns": [
            {"pattern": "fatalError", "case_sensitive": true, "description": "crash call"}
        ],
        "allowed_file_extensions": [".swift", ".m"]
    }"#;

    #[test]
    fn test_load_json_policy() {
        let policy = load_from_str(JSON_POLICY, PolicyFormat::Json).unwrap();
        assert_eq!(policy.max_files_per_change_set, 5);
        assert_eq!(policy.max_line_delta, 20);
        assert_eq!(policy.forbidden_patterns[0].description(), "crash call");
        assert!(policy.forbidden_patterns[0].case_sensitive());
        assert!(policy.allows_file("legacy/Bridge.m"));
    }

    #[test]
    fn test_load_toml_policy() {
        let toml = r#"
allowed_file_extensions = [".rs"]

[auto_fix_config]
max_lines_per_fix = 10

[[forbidden_code_patterns]]
pattern = "unsafe"
description = "unsafe block"
"#;
        let policy = load_from_str(toml, PolicyFormat::Toml).unwrap();
        assert_eq!(policy.max_files_per_change_set, 3);
        assert_eq!(policy.max_line_delta, 10);
        assert!(policy.forbidden_patterns[0].is_match("UNSAFE { }"));
        assert!(policy.allows_file("src/lib.rs"));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            PolicyFormat::from_path(Path::new("rules.toml")),
            PolicyFormat::Toml
        );
        assert_eq!(
            PolicyFormat::from_path(Path::new("safety_rules.json")),
            PolicyFormat::Json
        );
    }

    #[test]
    fn test_malformed_file_error_carries_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("safety_rules.json");
        fs::write(&path, "{ not json").unwrap();

        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Json { path: Some(_), .. }));
        assert!(err.to_string().contains("safety_rules.json"));
    }

    #[test]
    fn test_load_or_default_recovers_from_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        let policy = load_or_default(Some(&missing));
        assert_eq!(policy.max_files_per_change_set, 3);

        let bad_regex = dir.path().join("bad.json");
        fs::write(
            &bad_regex,
            r#"{"forbidden_code_patterns": [{"pattern": "[oops"}]}"#,
        )
        .unwrap();
        let policy = load_or_default(Some(&bad_regex));
        assert_eq!(policy.max_line_delta, 100);
        assert_eq!(policy.forbidden_patterns.len(), 1);
    }
}
