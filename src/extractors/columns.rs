// src/extractors/columns.rs
//! Header-text heuristics that decide which grid column holds which field.
//!
//! Table templates differ between documents, so every lookup has a
//! positional fallback and the resulting [`ColumnMap`] is always usable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{HeaderVocabulary, PipelineConfig};
use crate::documents::RawGrid;

// --- Positional fallbacks ---
const DEFAULT_CODE_COL: usize = 0;
const DEFAULT_VOLTAGE_COL: usize = 2;
const DEFAULT_PERIOD_START_COL: usize = 3;
const DEFAULT_PERIOD_END_COL: usize = 4;
const DEFAULT_FIRST_DEMAND_COL: usize = 5;

// How far around the header row column text is gathered
const WINDOW_ROWS_BEFORE: usize = 1;
const WINDOW_ROWS_AFTER: usize = 2;

// Voltage guessing looks at this many leading columns and data rows
const VOLTAGE_SCAN_COLS: usize = 5;
const VOLTAGE_SAMPLE_ROWS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearColumns {
    pub peak: usize,
    pub off_peak: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMap {
    pub code: usize,
    pub voltage: usize,
    pub period_start: usize,
    pub period_end: usize,
    pub years: BTreeMap<u16, YearColumns>,
}

// Partial result of header classification, before fallbacks.
#[derive(Debug, Default)]
struct Detected {
    code: Option<usize>,
    voltage: Option<usize>,
    period_start: Option<usize>,
    period_end: Option<usize>,
    peak: BTreeMap<u16, usize>,
    off_peak: BTreeMap<u16, usize>,
}

fn mentions(text: &str, markers: &[String]) -> bool {
    markers.iter().any(|m| text.contains(m.as_str()))
}

pub struct ColumnMapper<'a> {
    config: &'a PipelineConfig,
    code_markers: Vec<String>,
}

impl<'a> ColumnMapper<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        // The site prefix itself shows up in the code column's data cells.
        let mut code_markers = config.vocabulary.code.clone();
        code_markers.push(config.site_prefix.clone());
        Self { config, code_markers }
    }

    fn vocabulary(&self) -> &HeaderVocabulary {
        &self.config.vocabulary
    }

    /// Whether any of the first rows mentions the table marker at all.
    pub fn is_must_table(&self, grid: &RawGrid, rows_to_check: usize) -> bool {
        let marker = self.config.table_marker.to_uppercase();
        (0..grid.row_count().min(rows_to_check)).any(|idx| grid.row_text_upper(idx).contains(&marker))
    }

    /// First row mentioning both the table marker and one of the demand years.
    pub fn locate_header(&self, grid: &RawGrid) -> Option<usize> {
        let marker = self.config.table_marker.to_uppercase();
        let years = self.config.year_tokens();
        (0..grid.row_count()).find(|&idx| {
            let text = grid.row_text_upper(idx);
            text.contains(&marker) && years.iter().any(|y| text.contains(y.as_str()))
        })
    }

    /// Maps semantic fields to columns. Never fails: anything the headers do
    /// not reveal falls back to its conventional position.
    pub fn infer(&self, grid: &RawGrid, header_row: usize) -> ColumnMap {
        let detected = self.classify_columns(grid, header_row);
        tracing::trace!("Header classification: {:?}", detected);

        let voltage = detected
            .voltage
            .or_else(|| self.guess_voltage_column(grid, header_row))
            .unwrap_or(DEFAULT_VOLTAGE_COL);

        let years = self
            .config
            .years
            .iter()
            .enumerate()
            .map(|(i, &year)| {
                let peak = detected
                    .peak
                    .get(&year)
                    .copied()
                    .unwrap_or(DEFAULT_FIRST_DEMAND_COL + i * 2);
                let off_peak = detected
                    .off_peak
                    .get(&year)
                    .copied()
                    .unwrap_or(DEFAULT_FIRST_DEMAND_COL + i * 2 + 1);
                (year, YearColumns { peak, off_peak })
            })
            .collect();

        ColumnMap {
            code: detected.code.unwrap_or(DEFAULT_CODE_COL),
            voltage,
            period_start: detected.period_start.unwrap_or(DEFAULT_PERIOD_START_COL),
            period_end: detected.period_end.unwrap_or(DEFAULT_PERIOD_END_COL),
            years,
        }
    }

    /// Upper-cased text of one column over the rows around the header.
    fn column_window_text(&self, grid: &RawGrid, header_row: usize, col: usize) -> String {
        let first = header_row.saturating_sub(WINDOW_ROWS_BEFORE);
        let last = (header_row + WINDOW_ROWS_AFTER).min(grid.row_count().saturating_sub(1));
        (first..=last)
            .filter_map(|row| grid.cell(row, col))
            .map(|cell| cell.to_uppercase())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn classify_columns(&self, grid: &RawGrid, header_row: usize) -> Detected {
        let vocab = self.vocabulary();
        let mut detected = Detected::default();

        for col in 0..grid.column_count() {
            let text = self.column_window_text(grid, header_row, col);

            // Later columns overwrite earlier ones, one basic field per column.
            if mentions(&text, &self.code_markers) {
                detected.code = Some(col);
            } else if mentions(&text, &vocab.voltage) && !mentions(&text, &vocab.installation) {
                detected.voltage = Some(col);
            } else if mentions(&text, &vocab.period_from) && mentions(&text, &vocab.month_start) {
                detected.period_start = Some(col);
            } else if mentions(&text, &vocab.period_until)
                || (mentions(&text, &vocab.period_until_ascii) && mentions(&text, &vocab.month_end))
            {
                detected.period_end = Some(col);
            }

            for &year in &self.config.years {
                if !text.contains(&year.to_string()) {
                    continue;
                }
                let peak = mentions(&text, &vocab.peak);
                let off_peak = mentions(&text, &vocab.off_peak);
                if peak && !off_peak {
                    detected.peak.insert(year, col);
                } else if peak && off_peak {
                    detected.off_peak.insert(year, col);
                }
            }
        }
        detected
    }

    /// Looks for a typical kV rating in the first data rows.
    fn guess_voltage_column(&self, grid: &RawGrid, header_row: usize) -> Option<usize> {
        let rows = (header_row + 1)..grid.row_count().min(header_row + 1 + VOLTAGE_SAMPLE_ROWS);
        (0..grid.column_count().min(VOLTAGE_SCAN_COLS)).find(|&col| {
            rows.clone().any(|row| {
                grid.cell(row, col).is_some_and(|cell| {
                    self.config.known_voltages.iter().any(|v| cell.contains(v.as_str()))
                })
            })
        })
    }
}
