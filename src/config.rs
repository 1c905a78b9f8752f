// src/config.rs
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consolidate::merge::AnnotationJoinPolicy;
use crate::utils::error::ConfigError;

/// Header words used to classify table columns. Matching is substring-based
/// against upper-cased text, so every entry must be upper case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderVocabulary {
    pub code: Vec<String>,
    pub voltage: Vec<String>,
    pub installation: Vec<String>,
    pub period_from: Vec<String>,
    pub month_start: Vec<String>,
    /// Accented forms that identify the end column on their own.
    pub period_until: Vec<String>,
    /// Unaccented forms, only trusted next to a closing month.
    pub period_until_ascii: Vec<String>,
    pub month_end: Vec<String>,
    pub peak: Vec<String>,
    pub off_peak: Vec<String>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Default for HeaderVocabulary {
    fn default() -> Self {
        Self {
            code: words(&["COD", "ONS", "CODE"]),
            voltage: words(&["TENSÃO", "TENSAO", "KV", "VOLTAGE"]),
            installation: words(&["INSTALACAO", "INSTALAÇÃO", "INSTALLATION"]),
            period_from: words(&["DE", "FROM"]),
            month_start: words(&["JAN", "JANEIRO", "JANUARY"]),
            period_until: words(&["ATÉ", "UNTIL"]),
            period_until_ascii: words(&["ATE", "TO"]),
            month_end: words(&["DEZ", "DEZEMBRO", "DEC", "DECEMBER"]),
            peak: words(&["PONTA", "PEAK"]),
            off_peak: words(&["FORA", "OFF", "NON"]),
        }
    }
}

/// Settings shared by every stage of an extraction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Regional marker every site code starts with (e.g. "SP").
    pub site_prefix: String,
    /// Demand years, in column order.
    pub years: Vec<u16>,
    /// Token that identifies a MUST table header row.
    pub table_marker: String,
    /// Typical kV ratings used when the voltage column has to be guessed.
    pub known_voltages: Vec<String>,
    /// Only footnotes from this table block are linked; `None` links every block.
    pub annotation_table: Option<String>,
    /// Table number whose footnotes are attached during consolidation.
    pub merge_table: u32,
    /// Stop reading a document after the first table that yields records.
    pub first_table_only: bool,
    pub join_policy: AnnotationJoinPolicy,
    pub vocabulary: HeaderVocabulary,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            site_prefix: "SP".to_string(),
            years: vec![2025, 2026, 2027, 2028],
            table_marker: "MUST".to_string(),
            known_voltages: words(&["138", "230", "88", "500"]),
            annotation_table: Some("1".to_string()),
            merge_table: 1,
            first_table_only: true,
            join_policy: AnnotationJoinPolicy::default(),
            vocabulary: HeaderVocabulary::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads a JSON config file; missing keys keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: PipelineConfig = serde_json::from_str(&raw).map_err(|e| ConfigError::File {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        tracing::debug!("Loaded pipeline config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site_prefix.is_empty() || !self.site_prefix.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ConfigError::Invalid(format!(
                "site prefix must be upper-case ASCII letters, got '{}'",
                self.site_prefix
            )));
        }
        if self.years.is_empty() {
            return Err(ConfigError::Invalid("at least one demand year is required".to_string()));
        }
        if self.table_marker.trim().is_empty() {
            return Err(ConfigError::Invalid("table marker cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn year_tokens(&self) -> Vec<String> {
        self.years.iter().map(|y| y.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.year_tokens(), vec!["2025", "2026", "2027", "2028"]);
        assert_eq!(config.annotation_table.as_deref(), Some("1"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "years": [2029, 2030], "first_table_only": false }}"#).unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.years, vec![2029, 2030]);
        assert!(!config.first_table_only);
        assert_eq!(config.site_prefix, "SP", "Unspecified keys should keep defaults");
        assert_eq!(config.vocabulary, HeaderVocabulary::default());
    }

    #[test]
    fn test_rejects_lowercase_prefix() {
        let config = PipelineConfig { site_prefix: "sp".to_string(), ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_empty_years() {
        let config = PipelineConfig { years: vec![], ..Default::default() };
        assert!(config.validate().is_err());
    }
}
