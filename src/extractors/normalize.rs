// src/extractors/normalize.rs
//! Clean-up of company names (from file names) and site codes (from cells).

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

pub const UNKNOWN_COMPANY: &str = "UNKNOWN";

// File names written by earlier runs carry one of these in front.
const OUTPUT_PREFIXES: [&str; 2] = ["saida_anotacoes_", "sheet_"];

// --- Regex Patterns (Lazy Static) ---

// Contract prefix, e.g. "CUST-2002-025-41"
static CONTRACT_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^CUST-\d{4}-\d{2,4}-\d{2,3}").expect("Failed to compile CONTRACT_PREFIX_RE")
});

static LEADING_SEPARATORS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\s_-]+").expect("Failed to compile LEADING_SEPARATORS_RE")
});

// Everything from the first stopword on is revision noise ("minuta", "recon", a year...)
static STOPWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[\s_-]*(?:minuta|reconciled|recon|draft|final|(?:19|20)\d{2})")
        .expect("Failed to compile STOPWORD_RE")
});

static SEPARATOR_RUN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[_\s]+").expect("Failed to compile SEPARATOR_RUN_RE")
});

static SITE_CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Z]{2,}[A-Z0-9]*)(?:\s*-?\s*(\d{2,3}))?").expect("Failed to compile SITE_CODE_RE")
});

/// Derives a clean, upper-case company name from a source file name.
///
/// `CUST-2002-025-41 - SUL SUDESTE_minuta_recon_2025_28_final.xlsx` becomes
/// `SUL SUDESTE`. Returns [`UNKNOWN_COMPANY`] when nothing is left.
pub fn extract_company(filename: &str) -> String {
    let path = Path::new(filename);
    let mut name: &str = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);

    for prefix in OUTPUT_PREFIXES {
        if let Some(rest) = name.strip_prefix(prefix) {
            name = rest;
        }
    }

    if let Some(m) = CONTRACT_PREFIX_RE.find(name) {
        name = &name[m.end()..];
    }
    let name = LEADING_SEPARATORS_RE.replace(name, "");

    let head = match STOPWORD_RE.find(&name) {
        Some(m) => &name[..m.start()],
        None => &name[..],
    };
    let cleaned = SEPARATOR_RUN_RE.replace_all(head, " ").trim().to_uppercase();

    if cleaned.is_empty() {
        UNKNOWN_COMPANY.to_string()
    } else {
        cleaned
    }
}

/// Normalizes a site code to `PREFIX-SUFFIX` (or just `PREFIX`).
///
/// `None` and the literal `nan` yield `None`. Text that does not look like a
/// code at all comes back trimmed and upper-cased.
pub fn normalize_site_code(raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    let text = raw.trim().to_uppercase();
    if text == "NAN" {
        return None;
    }

    let Some(caps) = SITE_CODE_RE.captures(&text) else {
        return Some(text);
    };
    let prefix = &caps[1];
    Some(match caps.get(2) {
        Some(suffix) => format!("{}-{}", prefix, suffix.as_str()),
        None => prefix.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_company_full_name() {
        assert_eq!(
            extract_company("CUST-2002-025-41 - SUL SUDESTE_minuta_recon_2025_28_final.xlsx"),
            "SUL SUDESTE"
        );
    }

    #[test]
    fn test_extract_company_variants() {
        assert_eq!(extract_company("saida_anotacoes_CUST-2002-114-64_ CPFL_Paulista.xlsx"), "CPFL PAULISTA");
        assert_eq!(extract_company("CUST-2002-123-41 - JAGUARI - RECON 2025-2028.pdf"), "JAGUARI");
        assert_eq!(extract_company("docs/CUST-2002-001-01_Elektro Draft.pdf"), "ELEKTRO");
        assert_eq!(extract_company("Neoenergia_reconciled.json"), "NEOENERGIA");
    }

    #[test]
    fn test_extract_company_unknown() {
        assert_eq!(extract_company("CUST-2002-025-41.pdf"), UNKNOWN_COMPANY);
        assert_eq!(extract_company("2025_final.pdf"), UNKNOWN_COMPANY);
        assert_eq!(extract_company(""), UNKNOWN_COMPANY);
    }

    #[test]
    fn test_normalize_site_code() {
        assert_eq!(normalize_site_code(Some("SPXXX-138")).as_deref(), Some("SPXXX-138"));
        assert_eq!(normalize_site_code(Some("  spxxx - 88 ")).as_deref(), Some("SPXXX-88"));
        assert_eq!(normalize_site_code(Some("SPABC")).as_deref(), Some("SPABC"));
        assert_eq!(normalize_site_code(Some("12")).as_deref(), Some("12"));
        assert_eq!(normalize_site_code(None), None);
        assert_eq!(normalize_site_code(Some("nan")), None);
    }

    #[test]
    fn test_normalize_site_code_is_idempotent() {
        let samples = [
            "SPXXX-138", "SPXXX138", "spabc 230", "SPX-1234", "AB12-34", "  x ", "",
            "SPXXX-138 ITAPETI", "Cód ONS", "SP", "12-AB", "SPA--B",
        ];
        for sample in samples {
            let once = normalize_site_code(Some(sample));
            let twice = normalize_site_code(once.as_deref());
            assert_eq!(once, twice, "normalize_site_code not idempotent for {:?}", sample);
        }
    }
}
