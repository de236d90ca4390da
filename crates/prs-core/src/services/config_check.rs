use std::fmt;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::models::ServiceConfig;
use crate::services::config_store::unknown_keys;

const SECTIONS: &[&str] = &["service", "pangolin", "port_range", "docker"];

/// Errors block startup; warnings are advisory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ConfigReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ConfigReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.errors.is_empty() {
            writeln!(f, "Configuration validation failed:")?;
            for error in &self.errors {
                writeln!(f, "  - {error}")?;
            }
        }
        if !self.warnings.is_empty() {
            writeln!(f, "Configuration warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "  - {warning}")?;
            }
        }
        match (self.errors.is_empty(), self.warnings.is_empty()) {
            (true, true) => writeln!(f, "Configuration is valid"),
            (true, false) => writeln!(f, "Configuration is valid (with warnings)"),
            _ => Ok(()),
        }
    }
}

/// Inspect a raw configuration document the way an operator would before
/// deploying it: invariant violations plus missing sections and files.
pub fn inspect(raw: &str) -> ConfigReport {
    let mut report = ConfigReport::default();

    let document: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            report.errors.push(format!("invalid JSON: {e}"));
            return report;
        }
    };
    let Some(sections) = document.as_object() else {
        report
            .errors
            .push("configuration must be a JSON object".to_string());
        return report;
    };
    for section in SECTIONS {
        if !sections.contains_key(*section) {
            report
                .warnings
                .push(format!("section '{section}' is missing; defaults apply"));
        }
    }

    let config = match ServiceConfig::deserialize(&document) {
        Ok(c) => c,
        Err(e) => {
            report.errors.push(e.to_string());
            return report;
        }
    };
    if let Ok(known) = serde_json::to_value(&config) {
        for key in unknown_keys(&document, &known) {
            report.warnings.push(format!("unknown key '{key}' is ignored"));
        }
    }
    report.errors.extend(config.violations());
    report.warnings.extend(environment_warnings(&config));
    report
}

fn environment_warnings(config: &ServiceConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    let directory = config.pangolin_directory();
    if !directory.exists() {
        warnings.push(format!(
            "pangolin directory does not exist: {}",
            directory.display()
        ));
    } else {
        for (label, path) in [
            ("compose file", config.compose_file_path()),
            ("settings file", config.settings_file_path()),
        ] {
            if !Path::new(&path).exists() {
                warnings.push(format!("{label} not found: {}", path.display()));
            }
        }
    }
    if config.port_range.min < 1024 {
        warnings.push(format!(
            "port_range.min ({}) is in the privileged range below 1024",
            config.port_range.min
        ));
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_json_is_an_error() {
        let report = inspect("{ nope");
        assert!(!report.is_valid());
        assert!(report.errors[0].starts_with("invalid JSON"));
    }

    #[test]
    fn missing_sections_are_warnings() {
        let report = inspect("{}");
        assert!(report.is_valid());
        assert!(report
            .warnings
            .iter()
            .any(|w| w == "section 'docker' is missing; defaults apply"));
    }

    #[test]
    fn unknown_keys_warn() {
        let report = inspect(r#"{ "port_range": { "minimum": 51000 } }"#);
        assert!(report.is_valid());
        assert!(report
            .warnings
            .iter()
            .any(|w| w == "unknown key 'port_range.minimum' is ignored"));
    }

    #[test]
    fn inverted_range_is_an_error() {
        let report = inspect(r#"{ "port_range": { "min": 2000, "max": 1500 } }"#);
        assert!(!report.is_valid());
        assert!(report.errors.iter().any(|e| e.contains("less than")));
    }

    #[test]
    fn low_port_and_missing_files_warn() {
        let dir = tempfile::tempdir().unwrap();
        let raw = serde_json::json!({
            "pangolin": { "directory": dir.path() },
            "port_range": { "min": 80, "max": 2000 }
        })
        .to_string();
        let report = inspect(&raw);
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.starts_with("compose file not found")));
        assert!(report.warnings.iter().any(|w| w.starts_with("settings file not found")));
        assert!(report.warnings.iter().any(|w| w.contains("privileged")));
    }

    #[test]
    fn display_lists_errors_then_warnings() {
        let report = ConfigReport {
            errors: vec!["bad".into()],
            warnings: vec!["meh".into()],
        };
        assert_eq!(
            report.to_string(),
            "Configuration validation failed:\n  - bad\nConfiguration warnings:\n  - meh\n"
        );
    }
}
