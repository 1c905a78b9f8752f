// src/extractors/rows.rs
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::documents::RawGrid;
use crate::extractors::columns::{ColumnMap, ColumnMapper};
use crate::extractors::patterns::SitePatterns;
use crate::extractors::value;

const MIN_TABLE_ROWS: usize = 3;
// Voltage rescue only looks at the leading (identity) columns
const VOLTAGE_RESCUE_COLS: usize = 5;

static DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("Failed to compile DIGITS_RE"));

// --- Data Structures ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct YearDemand {
    pub year: u16,
    pub peak_value: String,
    pub peak_annotation: String,
    pub off_peak_value: String,
    pub off_peak_annotation: String,
}

/// One site row of a MUST table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataRecord {
    pub table_number: u32,
    pub site_code: String,
    pub voltage_kv: String,
    pub period_start: String,
    pub period_end: String,
    pub years: Vec<YearDemand>,
    /// File the record was read from; set by the pipeline runner.
    #[serde(default)]
    pub source_document: String,
}

impl DataRecord {
    /// Spreadsheet view: fixed columns then four columns per year.
    pub fn flat_row(&self) -> Vec<(String, String)> {
        let mut row = vec![
            ("table_number".to_string(), self.table_number.to_string()),
            ("site_code".to_string(), self.site_code.clone()),
            ("voltage_kv".to_string(), self.voltage_kv.clone()),
            ("period_start".to_string(), self.period_start.clone()),
            ("period_end".to_string(), self.period_end.clone()),
        ];
        for y in &self.years {
            row.push((format!("{}_peak_value", y.year), y.peak_value.clone()));
            row.push((format!("{}_peak_annotation", y.year), y.peak_annotation.clone()));
            row.push((format!("{}_off_peak_value", y.year), y.off_peak_value.clone()));
            row.push((format!("{}_off_peak_annotation", y.year), y.off_peak_annotation.clone()));
        }
        row
    }
}

/// Why a table produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableSkip {
    TooFewRows,
    NoHeaderRow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedTable {
    pub header_row: usize,
    pub column_map: ColumnMap,
    pub records: Vec<DataRecord>,
    /// Rows after the header that were not site rows (sub-headers, notes, blanks).
    pub rejected_rows: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableExtraction {
    Skipped(TableSkip),
    Extracted(ExtractedTable),
}

// --- Extractor ---

pub struct TableRowExtractor<'a> {
    config: &'a PipelineConfig,
    patterns: &'a SitePatterns,
    mapper: ColumnMapper<'a>,
}

impl<'a> TableRowExtractor<'a> {
    pub fn new(config: &'a PipelineConfig, patterns: &'a SitePatterns) -> Self {
        Self { config, patterns, mapper: ColumnMapper::new(config) }
    }

    pub fn mapper(&self) -> &ColumnMapper<'a> {
        &self.mapper
    }

    /// Finds the header, infers the column map and reads every site row.
    pub fn extract(&self, grid: &RawGrid, table_number: u32) -> TableExtraction {
        if grid.row_count() < MIN_TABLE_ROWS {
            tracing::debug!("Table {} has only {} row(s), skipping", table_number, grid.row_count());
            return TableExtraction::Skipped(TableSkip::TooFewRows);
        }

        let Some(header_row) = self.mapper.locate_header(grid) else {
            tracing::debug!("Table {}: no header row mentioning '{}' and a year", table_number, self.config.table_marker);
            return TableExtraction::Skipped(TableSkip::NoHeaderRow);
        };

        let column_map = self.mapper.infer(grid, header_row);
        tracing::debug!("Table {}: header at row {}, columns {:?}", table_number, header_row, column_map);
        TableExtraction::Extracted(self.extract_with_map(grid, header_row, column_map, table_number))
    }

    /// Reads site rows below `header_row` using an already inferred map.
    pub fn extract_with_map(
        &self,
        grid: &RawGrid,
        header_row: usize,
        column_map: ColumnMap,
        table_number: u32,
    ) -> ExtractedTable {
        let mut records = Vec::new();
        let mut rejected_rows = 0;

        for row in grid.rows().iter().skip(header_row + 1) {
            match self.build_record(row, &column_map, table_number) {
                Some(record) => records.push(record),
                None => rejected_rows += 1,
            }
        }

        tracing::debug!("Table {}: {} record(s), {} row(s) skipped", table_number, records.len(), rejected_rows);
        ExtractedTable { header_row, column_map, records, rejected_rows }
    }

    fn build_record(&self, row: &[String], map: &ColumnMap, table_number: u32) -> Option<DataRecord> {
        let first = row.first()?;
        if !self.patterns.is_site_code(first) {
            return None;
        }
        // Header words can pull the code column onto an installation name; the first cell is already a code.
        let site_code = match row.get(map.code) {
            Some(cell) if self.patterns.is_site_code(cell) => cell,
            mapped => {
                tracing::trace!("Code column holds {:?}; using first cell '{}'", mapped, first);
                first
            }
        };

        let cell = |idx: usize| row.get(idx).cloned().unwrap_or_default();
        let years = map
            .years
            .iter()
            .map(|(&year, cols)| {
                let (peak_value, peak_annotation) = value::split(&cell(cols.peak));
                let (off_peak_value, off_peak_annotation) = value::split(&cell(cols.off_peak));
                YearDemand { year, peak_value, peak_annotation, off_peak_value, off_peak_annotation }
            })
            .collect();

        Some(DataRecord {
            table_number,
            site_code: site_code.trim().to_string(),
            voltage_kv: self.extract_voltage(row, map.voltage),
            period_start: cell(map.period_start),
            period_end: cell(map.period_end),
            years,
            source_document: String::new(),
        })
    }

    /// Mapped column first; if it has no digits, the first leading cell that
    /// looks like a voltage (`KV` or a typical rating). Empty when none does.
    fn extract_voltage(&self, row: &[String], voltage_col: usize) -> String {
        if let Some(digits) = row.get(voltage_col).and_then(|c| DIGITS_RE.find(c)) {
            return digits.as_str().to_string();
        }

        row.iter()
            .take(VOLTAGE_RESCUE_COLS)
            .map(|cell| cell.to_uppercase())
            .filter(|cell| cell.contains("KV") || self.config.known_voltages.iter().any(|v| cell.contains(v.as_str())))
            .find_map(|cell| DIGITS_RE.find(&cell).map(|m| m.as_str().to_string()))
            .unwrap_or_default()
    }
}

#[cfg(test)]
impl DataRecord {
    pub fn year(&self, year: u16) -> Option<&YearDemand> {
        self.years.iter().find(|y| y.year == year)
    }
}

#[cfg(test)]
impl TableExtraction {
    pub fn records(&self) -> &[DataRecord] {
        match self {
            TableExtraction::Extracted(t) => &t.records,
            TableExtraction::Skipped(_) => &[],
        }
    }

    pub fn into_records(self) -> Vec<DataRecord> {
        match self {
            TableExtraction::Extracted(t) => t.records,
            TableExtraction::Skipped(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> RawGrid {
        RawGrid::new(1, rows.iter().map(|r| r.iter().copied()))
    }

    #[test]
    fn test_too_few_rows() {
        let config = PipelineConfig::default();
        let patterns = SitePatterns::default();
        let extractor = TableRowExtractor::new(&config, &patterns);
        let g = grid(&[&["header1", "MUST", "2025"], &["SPXXX-138", "Site A", "138"]]);
        assert_eq!(extractor.extract(&g, 1), TableExtraction::Skipped(TableSkip::TooFewRows));
        assert!(extractor.extract(&g, 1).records().is_empty());
    }

    #[test]
    fn test_no_header_row() {
        let config = PipelineConfig::default();
        let patterns = SitePatterns::default();
        let extractor = TableRowExtractor::new(&config, &patterns);
        let g = grid(&[&["a"], &["SPXXX-138"], &["SPYYY-88"]]);
        assert_eq!(extractor.extract(&g, 1), TableExtraction::Skipped(TableSkip::NoHeaderRow));
    }

    #[test]
    fn test_extracts_site_rows_with_annotations() {
        let config = PipelineConfig::default();
        let patterns = SitePatterns::default();
        let extractor = TableRowExtractor::new(&config, &patterns);
        let g = grid(&[
            &["header1", "MUST", "2025"],
            &["SPXXX-138", "Site A", "138", "1/Jan", "31/Dec", "47,000(B)", "12,000"],
            &["(B) - subject to reconciliation", "", "", "", "", "", ""],
        ]);

        let TableExtraction::Extracted(table) = extractor.extract(&g, 1) else {
            panic!("expected an extracted table");
        };
        assert_eq!(table.header_row, 0);
        assert_eq!(table.rejected_rows, 1, "Footnote row should be skipped");
        assert_eq!(table.records.len(), 1);

        let record = &table.records[0];
        assert_eq!(record.site_code, "SPXXX-138");
        assert_eq!(record.voltage_kv, "138");
        assert_eq!(record.period_start, "1/Jan");
        assert_eq!(record.period_end, "31/Dec");
        let y2025 = record.year(2025).unwrap();
        assert_eq!(y2025.peak_value, "47,000");
        assert_eq!(y2025.peak_annotation, "B");
        assert_eq!(y2025.off_peak_value, "12,000");
        assert_eq!(y2025.off_peak_annotation, "");
        let y2028 = record.year(2028).unwrap();
        assert!(y2028.peak_value.is_empty(), "Columns past the grid read as empty");
    }

    #[test]
    fn test_never_emits_invalid_site_codes() {
        let config = PipelineConfig::default();
        let patterns = SitePatterns::default();
        let extractor = TableRowExtractor::new(&config, &patterns);
        let g = grid(&[
            &["Cód ONS", "Instalação", "Tensão (kV)", "De", "Até", "MUST 2025 Ponta", "MUST 2025 Fora Ponta"],
            &["SPAAA-138", "Alpha", "138 kV", "1/Jan", "31/Dez", "1", "2"],
            &["", "Merged", "", "", "", "", ""],
            &["Total", "", "", "", "", "3", "4"],
            &["RJZZZ-230", "Other", "230", "1/Jan", "31/Dez", "5", "6"],
            &["SPBBB-88", "Beta", "88", "1/Jan", "31/Dez", "7(A)", "8"],
        ]);
        let records = extractor.extract(&g, 2).into_records();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| patterns.is_site_code(&r.site_code)));
        assert!(records.iter().all(|r| r.table_number == 2));
        assert_eq!(records[0].voltage_kv, "138");
        assert_eq!(records[1].year(2025).unwrap().peak_annotation, "A");
    }

    #[test]
    fn test_installation_names_do_not_hide_site_rows() {
        let config = PipelineConfig::default();
        let patterns = SitePatterns::default();
        let extractor = TableRowExtractor::new(&config, &patterns);
        let g = grid(&[
            &["Cód ONS", "Instalação", "Tensão (kV)", "De", "Até", "MUST 2025 Ponta", "MUST 2025 Fora Ponta"],
            &["SPAAA-138", "Esperança", "138", "1/Jan", "31/Dez", "10", "11"],
            &["SPBBB-88", "Conselheiro", "88", "1/Jan", "31/Dez", "20(A)", "21"],
        ]);
        // "ESPERANÇA" carries the prefix and "CONSELHEIRO" carries "ONS"
        let TableExtraction::Extracted(table) = extractor.extract(&g, 1) else {
            panic!("expected an extracted table");
        };
        assert_eq!(table.column_map.code, 1);
        assert_eq!(table.rejected_rows, 0);
        let codes: Vec<&str> = table.records.iter().map(|r| r.site_code.as_str()).collect();
        assert_eq!(codes, vec!["SPAAA-138", "SPBBB-88"]);
        assert_eq!(table.records[1].year(2025).unwrap().peak_annotation, "A");
    }

    #[test]
    fn test_voltage_rescue() {
        let config = PipelineConfig::default();
        let patterns = SitePatterns::default();
        let extractor = TableRowExtractor::new(&config, &patterns);
        let row: Vec<String> = ["SPAAA", "Alpha 230 kV", "-", "1/Jan"].iter().map(|s| s.to_string()).collect();
        assert_eq!(extractor.extract_voltage(&row, 2), "230");

        let row: Vec<String> = ["SPAAA", "Alpha", "-"].iter().map(|s| s.to_string()).collect();
        assert_eq!(extractor.extract_voltage(&row, 2), "");
        assert_eq!(extractor.extract_voltage(&row, 40), "", "Out-of-range column is tolerated");
    }

    #[test]
    fn test_flat_row_columns() {
        let record = DataRecord {
            table_number: 1,
            site_code: "SPXXX-138".to_string(),
            years: vec![YearDemand { year: 2025, peak_value: "1".to_string(), ..Default::default() }],
            ..Default::default()
        };
        let keys: Vec<String> = record.flat_row().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                "table_number", "site_code", "voltage_kv", "period_start", "period_end",
                "2025_peak_value", "2025_peak_annotation", "2025_off_peak_value", "2025_off_peak_annotation",
            ]
        );
    }
}
