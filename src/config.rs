use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read-only settings shared by every file analysis of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct AnalyzerConfig {
    /// Encoding label understood by `encoding_rs` (`UTF-8`, `ISO-8859-1`, ...).
    pub encoding: String,
    /// Treat `<?` as an opening tag.
    pub short_open_tag: bool,
    pub file_suffixes: Vec<String>,
    /// Functions whose first argument is a PCRE pattern.
    pub regex_functions: Vec<String>,
    /// Path fragments excluded from discovery.
    pub exclusions: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            encoding: "UTF-8".to_string(),
            short_open_tag: false,
            file_suffixes: ["php", "php3", "php4", "php5", "phtml", "inc"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            regex_functions: [
                "preg_match",
                "preg_match_all",
                "preg_replace",
                "preg_replace_callback",
                "preg_replace_callback_array",
                "preg_split",
                "preg_grep",
                "preg_filter",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            exclusions: Vec::new(),
        }
    }
}

impl AnalyzerConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn is_regex_function(&self, name: &str) -> bool {
        self.regex_functions
            .iter()
            .any(|f| f.eq_ignore_ascii_case(name))
    }

    pub fn accepts_file(&self, path: &Path) -> bool {
        let suffix_ok = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.file_suffixes.iter().any(|s| s.eq_ignore_ascii_case(ext)));
        let text = path.to_string_lossy();
        suffix_ok && !self.exclusions.iter().any(|ex| text.contains(ex.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = AnalyzerConfig::from_json(r#"{"short_open_tag": true}"#).unwrap();
        assert!(config.short_open_tag);
        assert_eq!(config.encoding, "UTF-8");
        assert!(config.is_regex_function("PREG_MATCH"));
    }

    #[test]
    fn file_filter_uses_suffix_and_exclusions() {
        let config = AnalyzerConfig {
            exclusions: vec!["vendor/".to_string()],
            ..AnalyzerConfig::default()
        };
        assert!(config.accepts_file(Path::new("src/index.php")));
        assert!(!config.accepts_file(Path::new("vendor/lib/a.php")));
        assert!(!config.accepts_file(Path::new("README.md")));
    }
}
