// src/extractors/linker.rs
//! Links footnote letters found in data rows to their definitions.
//!
//! Works on the linearized page text rather than on grids: the footnote
//! definitions sit in free paragraphs under each table, not in cells.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::extractors::patterns::SitePatterns;

// "Tabela 01 - Montante de Uso..." / "Table 1 - ..."
static TABLE_START_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:Tabela|Table)\s+([0-9A-Z.]+)\s*-\s*(.*)").expect("Failed to compile TABLE_START_RE")
});

// "(B) - subject to reconciliation"
static DEFINITION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\(([A-Z])\)\s*-\s*(.*)").expect("Failed to compile DEFINITION_RE")
});

static LETTER_REF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(([A-Z])\)").expect("Failed to compile LETTER_REF_RE")
});

/// Footnote letter -> full text, for one table block.
pub type AnnotationDefinitions = BTreeMap<char, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedAnnotationRecord {
    /// Table id as printed, e.g. "01".
    pub table_id: String,
    pub site_code: String,
    pub installation: String,
    pub letter: char,
    pub annotation: String,
    #[serde(default)]
    pub source_document: String,
}

impl LinkedAnnotationRecord {
    /// Numeric table id ("01" -> 1); `None` for ids like "A.1".
    pub fn table_number(&self) -> Option<u32> {
        self.table_id.trim().parse().ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkOutcome {
    pub records: Vec<LinkedAnnotationRecord>,
    pub blocks_seen: usize,
    pub blocks_linked: usize,
    pub blocks_without_definitions: usize,
    /// Merged data rows the structured row pattern did not match.
    pub unmatched_rows: usize,
}

/// Compares table ids ignoring leading zeros, so "01" selects "1".
pub fn table_id_matches(id: &str, wanted: &str) -> bool {
    fn canonical(s: &str) -> &str {
        let t = s.trim().trim_start_matches('0');
        if t.is_empty() && !s.trim().is_empty() { "0" } else { t }
    }
    canonical(id).eq_ignore_ascii_case(canonical(wanted))
}

struct TableBlock<'t> {
    id: String,
    title: String,
    lines: &'t [&'t str],
}

pub struct AnnotationLinker<'a> {
    patterns: &'a SitePatterns,
    only_table: Option<String>,
}

impl<'a> AnnotationLinker<'a> {
    /// `only_table` restricts linking to one table block; `None` links all.
    pub fn new(patterns: &'a SitePatterns, only_table: Option<String>) -> Self {
        Self { patterns, only_table }
    }

    pub fn link(&self, raw_text: &str) -> LinkOutcome {
        let lines: Vec<&str> = raw_text.lines().collect();
        let blocks = split_blocks(&lines);
        let mut outcome = LinkOutcome::default();

        if blocks.is_empty() {
            tracing::warn!("No 'Table NN - title' lines found in document text");
            return outcome;
        }

        for block in blocks {
            outcome.blocks_seen += 1;
            if let Some(wanted) = &self.only_table {
                if !table_id_matches(&block.id, wanted) {
                    tracing::debug!("Skipping table {} ({}): only table {} is linked", block.id, block.title, wanted);
                    continue;
                }
            }
            tracing::debug!("Linking annotations in table {}: {}", block.id, block.title);

            let definitions = extract_definitions(block.lines);
            if definitions.is_empty() {
                tracing::info!("Table {} has no footnote definitions", block.id);
                outcome.blocks_without_definitions += 1;
                continue;
            }
            outcome.blocks_linked += 1;

            for row in self.merge_wrapped_rows(block.lines) {
                let Some(caps) = self.patterns.data_row().captures(&row) else {
                    outcome.unmatched_rows += 1;
                    tracing::trace!("Row did not match data layout: {}", row);
                    continue;
                };

                let letters: BTreeSet<char> = LETTER_REF_RE
                    .captures_iter(&caps["must_data"])
                    .filter_map(|c| c[1].chars().next())
                    .collect();

                for letter in letters {
                    if let Some(text) = definitions.get(&letter) {
                        outcome.records.push(LinkedAnnotationRecord {
                            table_id: block.id.clone(),
                            site_code: caps["code"].to_string(),
                            installation: caps["installation"].trim().to_string(),
                            letter,
                            annotation: text.clone(),
                            source_document: String::new(),
                        });
                    }
                }
            }
        }

        tracing::debug!("Linked {} footnote(s) across {} table block(s)", outcome.records.len(), outcome.blocks_linked);
        outcome
    }

    /// Joins data rows the PDF wrapped across several lines.
    fn merge_wrapped_rows(&self, lines: &[&str]) -> Vec<String> {
        let mut merged = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            let line = lines[i].trim();
            if !self.patterns.is_row_start(line) {
                i += 1;
                continue;
            }

            let mut row = line.to_string();
            let mut j = i + 1;
            while let Some(next) = lines.get(j).map(|l| l.trim()) {
                if next.is_empty()
                    || TABLE_START_RE.is_match(next)
                    || DEFINITION_RE.is_match(next)
                    || self.patterns.is_row_start(next)
                {
                    break;
                }
                row.push(' ');
                row.push_str(next);
                j += 1;
            }
            merged.push(row);
            i = j;
        }
        merged
    }
}

fn split_blocks<'t>(lines: &'t [&'t str]) -> Vec<TableBlock<'t>> {
    let starts: Vec<(usize, String, String)> = lines
        .iter()
        .enumerate()
        .filter_map(|(i, line)| {
            TABLE_START_RE
                .captures(line)
                .map(|c| (i, c[1].to_string(), c[2].trim().to_string()))
        })
        .collect();

    starts
        .iter()
        .enumerate()
        .map(|(n, (start, id, title))| {
            let end = starts.get(n + 1).map_or(lines.len(), |next| next.0);
            TableBlock { id: id.clone(), title: title.clone(), lines: &lines[*start..end] }
        })
        .collect()
}

/// Reads `(X) - text` definitions; continuation lines are appended until a
/// blank line or the next definition. A repeated letter replaces the earlier text.
pub fn extract_definitions(lines: &[&str]) -> AnnotationDefinitions {
    let mut definitions = AnnotationDefinitions::new();
    let mut i = 0;
    while i < lines.len() {
        let Some(caps) = DEFINITION_RE.captures(lines[i].trim()) else {
            i += 1;
            continue;
        };
        let Some(letter) = caps[1].chars().next() else {
            i += 1;
            continue;
        };
        let mut text = caps[2].trim().to_string();

        let mut j = i + 1;
        while let Some(next) = lines.get(j).map(|l| l.trim()) {
            if next.is_empty() || DEFINITION_RE.is_match(next) {
                break;
            }
            text.push(' ');
            text.push_str(next);
            j += 1;
        }

        if definitions.insert(letter, text).is_some() {
            tracing::debug!("Footnote ({}) defined more than once; keeping the last definition", letter);
        }
        i = j;
    }
    definitions
}
