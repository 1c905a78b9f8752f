// src/storage/mod.rs
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::consolidate::{ConsolidatedRecord, RelationalTables};
use crate::pipeline::{DocumentExtraction, RunReport};
use crate::utils::error::StorageError;

/// Turns `(column, value)` pairs into a JSON object that keeps column order.
fn row_object(row: Vec<(String, String)>) -> Value {
    Value::Object(row.into_iter().map(|(k, v)| (k, Value::String(v))).collect::<Map<_, _>>())
}

/// Directory-safe form of a company name.
fn company_dir_name(company: &str) -> String {
    let name: String = company
        .chars()
        .map(|c| if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let name = name.trim();
    if name.is_empty() {
        "UNKNOWN".to_string()
    } else {
        name.to_string()
    }
}

/// Sole writer of run outputs under one base directory.
pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates the base directory if it doesn't exist.
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(StorageError::IoError)?;
        }
        Ok(Self { base_dir: base_path })
    }

    pub fn company_dir(&self, company: &str) -> PathBuf {
        self.base_dir.join(company_dir_name(company))
    }

    /// `<company>/debug/<document stem>`, one per source document.
    pub fn debug_dir(&self, company: &str, document: &str) -> PathBuf {
        let stem = Path::new(document)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| document.to_string());
        self.company_dir(company).join("debug").join(stem)
    }

    fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<PathBuf, StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(StorageError::IoError)?;
        }
        let body = serde_json::to_string_pretty(value).map_err(|e| StorageError::SerializationError(e.to_string()))?;
        fs::write(path, body).map_err(StorageError::IoError)?;
        tracing::debug!("Wrote {}", path.display());
        Ok(path.to_path_buf())
    }

    /// Writes `records.json` and `annotations.json` per company. Documents of
    /// the same company are written together.
    pub fn save_extractions(&self, extractions: &[DocumentExtraction]) -> Result<Vec<PathBuf>, StorageError> {
        let mut by_company: BTreeMap<&str, Vec<&DocumentExtraction>> = BTreeMap::new();
        for extraction in extractions {
            by_company.entry(extraction.company.as_str()).or_default().push(extraction);
        }

        let mut dirs = Vec::new();
        for (company, docs) in by_company {
            let dir = self.company_dir(company);
            let records: Vec<Value> = docs
                .iter()
                .flat_map(|d| d.records.iter())
                .map(|r| {
                    let mut row = vec![("source_document".to_string(), r.source_document.clone())];
                    row.extend(r.flat_row());
                    row_object(row)
                })
                .collect();
            let annotations: Vec<_> = docs.iter().flat_map(|d| d.annotations.iter()).collect();

            self.write_json(&dir.join("records.json"), &records)?;
            self.write_json(&dir.join("annotations.json"), &annotations)?;
            tracing::info!(
                "Saved {} record(s) and {} footnote link(s) for {} to {}",
                records.len(),
                annotations.len(),
                company,
                dir.display()
            );
            dirs.push(dir);
        }
        Ok(dirs)
    }

    /// One flat object per consolidated row, columns in spreadsheet order.
    pub fn save_consolidated(&self, records: &[ConsolidatedRecord]) -> Result<PathBuf, StorageError> {
        let rows: Vec<Value> = records.iter().map(|r| row_object(r.flat_row())).collect();
        let path = self.write_json(&self.base_dir.join("consolidated.json"), &rows)?;
        tracing::info!("Saved {} consolidated row(s) to {}", rows.len(), path.display());
        Ok(path)
    }

    pub fn save_relational(&self, tables: &RelationalTables) -> Result<PathBuf, StorageError> {
        let dir = self.base_dir.join("relational");
        self.write_json(&dir.join("companies.json"), &tables.companies)?;
        self.write_json(&dir.join("sites.json"), &tables.sites)?;
        self.write_json(&dir.join("demand_values.json"), &tables.demand_values)?;
        tracing::info!("Saved relational tables to {}", dir.display());
        Ok(dir)
    }

    /// Counts, failures and timestamp of the run.
    pub fn save_run_meta(&self, report: &RunReport, consolidated: usize) -> Result<PathBuf, StorageError> {
        let documents: Vec<Value> = report
            .extractions
            .iter()
            .map(|e| {
                serde_json::json!({
                    "document": e.document,
                    "company": e.company,
                    "records": e.records.len(),
                    "annotations": e.annotations.len(),
                    "tables_seen": e.tables.len(),
                    "duplicates_removed": e.duplicates_removed,
                    "annotation_blocks": e.annotation_blocks,
                    "unmatched_annotation_rows": e.unmatched_annotation_rows,
                })
            })
            .collect();
        let failures: Vec<Value> = report
            .failures
            .iter()
            .map(|f| serde_json::json!({ "document": f.document, "error": f.error }))
            .collect();

        let unmatched: usize = report.extractions.iter().map(|e| e.unmatched_annotation_rows).sum();
        let metadata = serde_json::json!({
            "documents_processed": report.extractions.len(),
            "documents_failed": report.failures.len(),
            "consolidated_records": consolidated,
            "unmatched_annotation_rows": unmatched,
            "documents": documents,
            "failures": failures,
            "extraction_timestamp": chrono::Utc::now().to_rfc3339(),
        });
        self.write_json(&self.base_dir.join("run_meta.json"), &metadata)
    }
}
