//! Import configuration.
//!
//! Defaults are usable as-is. [`ImportConfig::from_env`] overlays
//! `CASELOAD_*` environment variables (a `.env` file is read first).
//!
//! | Variable                  | Field            |
//! |---------------------------|------------------|
//! | `CASELOAD_STORE_DIR`      | `store_dir`      |
//! | `CASELOAD_BASELINE`       | `baseline_path`  |
//! | `CASELOAD_RULES`          | `rules_path`     |
//! | `CASELOAD_DELIMITER`      | `delimiter`      |
//! | `CASELOAD_PORT`           | `port`           |
//! | `CASELOAD_DEFAULT_OFFICER`| `defaults.investigation_officer` |

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Directory holding the persisted snapshots (relative to current dir).
pub const DEFAULT_STORE_DIR: &str = ".caseload";

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3000;

/// Fallback values for optional row fields left blank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FieldDefaults {
    pub scenario: String,
    pub investigation_officer: String,
    pub branch_code: String,
    pub transaction_period: String,
    pub beneficiary: String,
    pub transaction_channel: String,
}

impl Default for FieldDefaults {
    fn default() -> Self {
        Self {
            scenario: "Not specified".to_string(),
            investigation_officer: "Unassigned".to_string(),
            branch_code: "N/A".to_string(),
            transaction_period: "N/A".to_string(),
            beneficiary: "Unknown".to_string(),
            transaction_channel: "N/A".to_string(),
        }
    }
}

/// Settings for the import pipeline and its outer surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Directory of the JSON case store.
    pub store_dir: PathBuf,
    /// Optional read-only baseline case set (JSON array of cases).
    pub baseline_path: Option<PathBuf>,
    /// Optional JSON file replacing the built-in classifier tables.
    pub rules_path: Option<PathBuf>,
    /// Force a delimiter instead of detecting it.
    pub delimiter: Option<char>,
    /// HTTP server port.
    pub port: u16,
    /// Fallbacks for blank optional fields.
    pub defaults: FieldDefaults,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
            baseline_path: None,
            rules_path: None,
            delimiter: None,
            port: DEFAULT_PORT,
            defaults: FieldDefaults::default(),
        }
    }
}

impl ImportConfig {
    /// Defaults overlaid with `CASELOAD_*` environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::default().overlay(|key| env::var(key).ok())
    }

    /// Apply overrides from a key lookup. Unparseable values are ignored.
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = get("CASELOAD_STORE_DIR") {
            self.store_dir = PathBuf::from(dir);
        }
        if let Some(path) = get("CASELOAD_BASELINE") {
            self.baseline_path = Some(PathBuf::from(path));
        }
        if let Some(path) = get("CASELOAD_RULES") {
            self.rules_path = Some(PathBuf::from(path));
        }
        if let Some(delim) = get("CASELOAD_DELIMITER") {
            self.delimiter = parse_delimiter(&delim);
        }
        if let Some(port) = get("CASELOAD_PORT").and_then(|p| p.trim().parse().ok()) {
            self.port = port;
        }
        if let Some(officer) = get("CASELOAD_DEFAULT_OFFICER") {
            self.defaults.investigation_officer = officer;
        }
        self
    }
}

/// Accepts a literal single character or the names `tab`/`\t`.
pub fn parse_delimiter(raw: &str) -> Option<char> {
    match raw {
        "tab" | "\\t" | "\t" => Some('\t'),
        _ => {
            let mut chars = raw.trim().chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(c),
                _ => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ImportConfig::default();
        assert_eq!(config.store_dir, PathBuf::from(".caseload"));
        assert_eq!(config.port, 3000);
        assert!(config.delimiter.is_none());
        assert_eq!(config.defaults.investigation_officer, "Unassigned");
    }

    #[test]
    fn test_overlay() {
        let vars: HashMap<&str, &str> = [
            ("CASELOAD_STORE_DIR", "/var/lib/caseload"),
            ("CASELOAD_DELIMITER", "tab"),
            ("CASELOAD_PORT", "8080"),
            ("CASELOAD_DEFAULT_OFFICER", "Sana Tariq"),
        ]
        .into_iter()
        .collect();

        let config = ImportConfig::default().overlay(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.store_dir, PathBuf::from("/var/lib/caseload"));
        assert_eq!(config.delimiter, Some('\t'));
        assert_eq!(config.port, 8080);
        assert_eq!(config.defaults.investigation_officer, "Sana Tariq");
    }

    #[test]
    fn test_bad_port_is_ignored() {
        let config = ImportConfig::default()
            .overlay(|k| (k == "CASELOAD_PORT").then(|| "http".to_string()));
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter(";"), Some(';'));
        assert_eq!(parse_delimiter("\\t"), Some('\t'));
        assert_eq!(parse_delimiter(";;"), None);
    }
}
