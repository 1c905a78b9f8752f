// src/extractors/patterns.rs
use regex::Regex;

use crate::utils::error::ConfigError;

/// Site-code patterns derived from the regional prefix. Built once per run
/// and shared by the row extractor and the annotation linker.
#[derive(Debug, Clone)]
pub struct SitePatterns {
    prefix: String,
    /// First grid cell of a data row, e.g. `SPXXX-138`.
    valid_code: Regex,
    /// Start of a data row in linearized page text.
    row_start: Regex,
    /// Whole data row in linearized page text.
    data_row: Regex,
}

impl SitePatterns {
    pub fn new(prefix: &str) -> Result<Self, ConfigError> {
        let p = regex::escape(prefix);
        let code = format!(r"{}[A-Z0-9\s-]+(?:--?[A-Z])?", p);
        Ok(Self {
            prefix: prefix.to_string(),
            valid_code: Regex::new(&format!(r"^{}[A-Z0-9\-]+", p))?,
            row_start: Regex::new(&format!(r"^({})\s+.*", code))?,
            data_row: Regex::new(&format!(
                concat!(
                    r"^(?P<code>{})\s+",
                    r"(?P<installation>.*?)\s+",
                    r"(?P<voltage>\d{{2,3}})\s+",
                    r"(?P<period_start>\d{{1,2}}/[A-Za-z]{{3}})\s+",
                    r"(?P<period_end>\d{{1,2}}/[A-Za-z]{{3}})\s+",
                    r"(?P<must_data>.*)",
                ),
                code
            ))?,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn is_site_code(&self, cell: &str) -> bool {
        self.valid_code.is_match(cell.trim())
    }

    pub fn is_row_start(&self, line: &str) -> bool {
        self.row_start.is_match(line)
    }

    pub fn data_row(&self) -> &Regex {
        &self.data_row
    }
}

impl Default for SitePatterns {
    fn default() -> Self {
        // "SP" is a fixed, valid prefix
        Self::new("SP").expect("default site patterns compile")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_code_prefix() {
        let patterns = SitePatterns::default();
        assert!(patterns.is_site_code("SPXXX-138"));
        assert!(patterns.is_site_code(" SPABC "));
        assert!(!patterns.is_site_code("SP"), "Prefix alone is not a code");
        assert!(!patterns.is_site_code("RJXXX-138"));
        assert!(!patterns.is_site_code("Cód ONS"));
    }

    #[test]
    fn test_custom_prefix() {
        let patterns = SitePatterns::new("RJ").unwrap();
        assert!(patterns.is_site_code("RJXXX-138"));
        assert!(!patterns.is_site_code("SPXXX-138"));
        assert_eq!(patterns.prefix(), "RJ");
    }

    #[test]
    fn test_data_row_captures() {
        let patterns = SitePatterns::default();
        let caps = patterns
            .data_row()
            .captures("SPXXX-138 Site A 138 1/Jan 31/Dez 47,000(B) 12,000")
            .unwrap();
        assert_eq!(&caps["code"], "SPXXX-138");
        assert_eq!(&caps["installation"], "Site A");
        assert_eq!(&caps["voltage"], "138");
        assert_eq!(&caps["period_start"], "1/Jan");
        assert_eq!(&caps["period_end"], "31/Dez");
        assert_eq!(&caps["must_data"], "47,000(B) 12,000");
    }

    #[test]
    fn test_row_start() {
        let patterns = SitePatterns::default();
        assert!(patterns.is_row_start("SPXXX-138 Site A"));
        assert!(!patterns.is_row_start("(A) - note"));
        assert!(!patterns.is_row_start("SPXXX-138"), "Row start needs trailing content");
    }
}
