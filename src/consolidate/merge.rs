// src/consolidate/merge.rs
use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::extractors::linker::LinkedAnnotationRecord;
use crate::extractors::normalize::{extract_company, normalize_site_code};
use crate::extractors::rows::DataRecord;

const ANNOTATION_SEPARATOR: &str = "; ";

/// What to do when several footnotes match one site code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationJoinPolicy {
    /// Distinct texts, in footnote-letter order, joined with "; ".
    #[default]
    Concatenate,
    /// Only the text of the lowest footnote letter.
    FirstMatch,
}

impl FromStr for AnnotationJoinPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "concatenate" => Ok(Self::Concatenate),
            "first_match" | "first" => Ok(Self::FirstMatch),
            other => Err(format!("unknown join policy '{}' (expected concatenate or first-match)", other)),
        }
    }
}

/// A table row with its company and attached general footnote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedRecord {
    pub company: String,
    /// The source row, `site_code` already normalized.
    pub record: DataRecord,
    pub general_annotation: Option<String>,
}

impl ConsolidatedRecord {
    pub fn site_code(&self) -> &str {
        &self.record.site_code
    }

    /// Spreadsheet view: company, the record's columns, then the footnote.
    pub fn flat_row(&self) -> Vec<(String, String)> {
        let mut row = vec![("company".to_string(), self.company.clone())];
        row.extend(self.record.flat_row());
        row.push((
            "general_annotation".to_string(),
            self.general_annotation.clone().unwrap_or_default(),
        ));
        row
    }
}

/// Join key for both sides of the merge.
pub fn merge_key(site_code: &str) -> String {
    normalize_site_code(Some(site_code))
        .map(|code| code.trim().to_uppercase())
        .unwrap_or_default()
}

pub struct ConsolidationMerger {
    annotation_table: u32,
    policy: AnnotationJoinPolicy,
}

impl ConsolidationMerger {
    pub fn new(annotation_table: u32, policy: AnnotationJoinPolicy) -> Self {
        Self { annotation_table, policy }
    }

    /// Left-joins table rows to the footnotes of `annotation_table` on the
    /// normalized site code. Every input row appears exactly once.
    pub fn merge(
        &self,
        table_records: &[DataRecord],
        annotation_records: &[LinkedAnnotationRecord],
    ) -> Vec<ConsolidatedRecord> {
        let mut by_code: HashMap<String, Vec<&LinkedAnnotationRecord>> = HashMap::new();
        let mut kept = 0;
        for note in annotation_records
            .iter()
            .filter(|n| n.table_number() == Some(self.annotation_table))
        {
            by_code.entry(merge_key(&note.site_code)).or_default().push(note);
            kept += 1;
        }
        tracing::debug!(
            "Merging {} record(s) with {} of {} footnote link(s) from table {}",
            table_records.len(),
            kept,
            annotation_records.len(),
            self.annotation_table
        );

        let mut matched = 0;
        let merged: Vec<ConsolidatedRecord> = table_records
            .iter()
            .map(|record| {
                let key = merge_key(&record.site_code);
                let general_annotation = by_code.get(&key).and_then(|notes| self.collapse(notes));
                if general_annotation.is_some() {
                    matched += 1;
                }
                let mut record = record.clone();
                record.site_code = key;
                ConsolidatedRecord {
                    company: extract_company(&record.source_document),
                    record,
                    general_annotation,
                }
            })
            .collect();

        tracing::debug!("{} of {} record(s) received a general annotation", matched, merged.len());
        merged
    }

    fn collapse(&self, notes: &[&LinkedAnnotationRecord]) -> Option<String> {
        let mut ordered: Vec<&LinkedAnnotationRecord> = notes.to_vec();
        ordered.sort_by_key(|n| n.letter);

        match self.policy {
            AnnotationJoinPolicy::FirstMatch => ordered.first().map(|n| n.annotation.clone()),
            AnnotationJoinPolicy::Concatenate => {
                let mut texts: Vec<&str> = Vec::new();
                for note in ordered {
                    if !texts.contains(&note.annotation.as_str()) {
                        texts.push(&note.annotation);
                    }
                }
                if texts.is_empty() {
                    None
                } else {
                    Some(texts.join(ANNOTATION_SEPARATOR))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str, doc: &str) -> DataRecord {
        DataRecord {
            table_number: 1,
            site_code: code.to_string(),
            source_document: doc.to_string(),
            ..Default::default()
        }
    }

    fn note(table: &str, code: &str, letter: char, text: &str) -> LinkedAnnotationRecord {
        LinkedAnnotationRecord {
            table_id: table.to_string(),
            site_code: code.to_string(),
            installation: String::new(),
            letter,
            annotation: text.to_string(),
            source_document: String::new(),
        }
    }

    #[test]
    fn test_left_join_cardinality() {
        let merger = ConsolidationMerger::new(1, AnnotationJoinPolicy::Concatenate);
        let records = vec![
            record("SPAAA-138", "CUST-2002-025-41 - SUL SUDESTE_minuta.pdf"),
            record("SPBBB 88", "CUST-2002-025-41 - SUL SUDESTE_minuta.pdf"),
            record("SPCCC-230", "CUST-2002-114-64_ CPFL_Paulista.pdf"),
        ];
        let notes = vec![
            note("01", "SPAAA-138", 'B', "subject to reconciliation"),
            note("1", "SPBBB-88", 'A', "pending"),
            note("02", "SPCCC-230", 'A', "ignored: wrong table"),
        ];

        let merged = merger.merge(&records, &notes);
        assert_eq!(merged.len(), records.len(), "Every record appears exactly once");
        assert_eq!(merged[0].general_annotation.as_deref(), Some("subject to reconciliation"));
        assert_eq!(merged[0].company, "SUL SUDESTE");
        assert_eq!(merged[1].site_code(), "SPBBB-88", "Codes are normalized before joining");
        assert_eq!(merged[1].general_annotation.as_deref(), Some("pending"));
        assert_eq!(merged[2].general_annotation, None, "Only table 1 footnotes are attached");
        assert_eq!(merged[2].company, "CPFL PAULISTA");
    }

    #[test]
    fn test_multiple_footnotes_collapse() {
        let records = vec![record("SPAAA-138", "x.pdf")];
        let notes = vec![
            note("01", "SPAAA-138", 'C', "third"),
            note("01", "SPAAA-138", 'A', "first"),
            note("01", "SPAAA-138", 'B', "first"),
        ];

        let concat = ConsolidationMerger::new(1, AnnotationJoinPolicy::Concatenate).merge(&records, &notes);
        assert_eq!(concat.len(), 1);
        assert_eq!(concat[0].general_annotation.as_deref(), Some("first; third"));

        let first = ConsolidationMerger::new(1, AnnotationJoinPolicy::FirstMatch).merge(&records, &notes);
        assert_eq!(first[0].general_annotation.as_deref(), Some("first"));
    }

    #[test]
    fn test_configurable_annotation_table() {
        let records = vec![record("SPCCC-230", "x.pdf")];
        let notes = vec![note("02", "SPCCC-230", 'A', "second table")];
        let merged = ConsolidationMerger::new(2, AnnotationJoinPolicy::default()).merge(&records, &notes);
        assert_eq!(merged[0].general_annotation.as_deref(), Some("second table"));
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("first-match".parse::<AnnotationJoinPolicy>(), Ok(AnnotationJoinPolicy::FirstMatch));
        assert_eq!("Concatenate".parse::<AnnotationJoinPolicy>(), Ok(AnnotationJoinPolicy::Concatenate));
        assert!("merge".parse::<AnnotationJoinPolicy>().is_err());
    }

    #[test]
    fn test_flat_row_ends_with_annotation() {
        let merged = ConsolidatedRecord {
            company: "ACME".to_string(),
            record: record("SPAAA", "x.pdf"),
            general_annotation: None,
        };
        let row = merged.flat_row();
        assert_eq!(row.first().unwrap(), &("company".to_string(), "ACME".to_string()));
        assert_eq!(row.last().unwrap(), &("general_annotation".to_string(), String::new()));
    }
}
