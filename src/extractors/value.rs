// src/extractors/value.rs
use once_cell::sync::Lazy;
use regex::Regex;

use crate::documents::models::clean_cell;

// Value followed by footnote letters in parentheses at the very end, e.g. "47,000(B)"
static TRAILING_ANNOTATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*?)\(([A-Z]+)\)$").expect("Failed to compile TRAILING_ANNOTATION_RE")
});

/// Splits a demand cell into its value and trailing footnote letters.
///
/// Never fails: empty or `nan` cells (any case, as in [`clean_cell`]) give
/// `("", "")`, cells without a trailing `(LETTERS)` give `(cell, "")`.
/// Number formatting is left alone.
pub fn split(cell: &str) -> (String, String) {
    let text = clean_cell(cell);
    if text.is_empty() {
        return (String::new(), String::new());
    }

    if let Some(caps) = TRAILING_ANNOTATION_RE.captures(&text) {
        return (caps[1].trim().to_string(), caps[2].trim().to_string());
    }
    (text, String::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(value: &str, annotation: &str) -> String {
        if annotation.is_empty() {
            value.to_string()
        } else {
            format!("{}({})", value, annotation)
        }
    }

    fn pair(a: &str, b: &str) -> (String, String) {
        (a.to_string(), b.to_string())
    }

    #[test]
    fn test_split_cases() {
        assert_eq!(split("47,000(B)"), pair("47,000", "B"));
        assert_eq!(split(""), pair("", ""));
        assert_eq!(split("nan"), pair("", ""));
        assert_eq!(split(" NaN "), pair("", ""));
        assert_eq!(split("NAN"), pair("", ""));
        assert_eq!(split("100"), pair("100", ""));
        assert_eq!(split(" 12,5 (AB) "), pair("12,5", "AB"));
        assert_eq!(split("(C)"), pair("", "C"));
    }

    #[test]
    fn test_split_ignores_non_trailing_or_lowercase() {
        assert_eq!(split("10(b)"), pair("10(b)", ""));
        assert_eq!(split("(A) 10"), pair("(A) 10", ""));
        assert_eq!(split("10(A1)"), pair("10(A1)", ""));
    }

    #[test]
    fn test_join_reconstructs_cell() {
        for cell in ["44,100(BR)", "47,000(B)", "100", "-"] {
            let (value, annotation) = split(cell);
            assert_eq!(join(&value, &annotation), cell, "round trip failed for {}", cell);
        }
    }
}
