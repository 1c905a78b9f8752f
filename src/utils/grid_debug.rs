// src/utils/grid_debug.rs
use std::fs;
use std::path::{Path, PathBuf};

use crate::documents::RawGrid;
use crate::extractors::patterns::SitePatterns;
use crate::pipeline::runner::{DocumentExtraction, TableReport};
use crate::utils::error::AppError;

// Long cells are cut so a grid stays readable in a terminal
const MAX_CELL_WIDTH: usize = 28;

fn clip(cell: &str) -> String {
    if cell.chars().count() <= MAX_CELL_WIDTH {
        cell.to_string()
    } else {
        let mut clipped: String = cell.chars().take(MAX_CELL_WIDTH - 1).collect();
        clipped.push('~');
        clipped
    }
}

/// Renders a grid as aligned text. The header row is marked `H`, rows below
/// it that start with a site code `+`.
pub fn render_grid(grid: &RawGrid, header_row: Option<usize>, patterns: &SitePatterns) -> String {
    let rows: Vec<Vec<String>> = grid.rows().iter().map(|r| r.iter().map(|c| clip(c)).collect()).collect();
    let mut widths = vec![0; grid.column_count()];
    for row in &rows {
        for (col, cell) in row.iter().enumerate() {
            widths[col] = widths[col].max(cell.chars().count());
        }
    }

    let mut out = String::new();
    for (idx, row) in rows.iter().enumerate() {
        let marker = match header_row {
            Some(h) if h == idx => "H",
            Some(h) if idx > h && row.first().is_some_and(|c| patterns.is_site_code(c)) => "+",
            _ => " ",
        };
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(col, cell)| format!("{:<width$}", cell, width = widths[col]))
            .collect();
        out.push_str(&format!("{} | {}\n", marker, cells.join(" | ").trim_end()));
    }
    out
}

fn table_heading(report: &TableReport) -> String {
    match &report.skipped {
        Some(reason) if report.records == 0 => {
            format!("=== Table {} (page {}): skipped, {} ===", report.table_number, report.page, reason)
        }
        _ => format!(
            "=== Table {} (page {}): {} record(s), {} row(s) skipped ===",
            report.table_number, report.page, report.records, report.rejected_rows
        ),
    }
}

/// Renders every captured grid with its outcome. Tables the run never got to
/// (after the first MUST table) are listed as not processed.
pub fn render_tables(extraction: &DocumentExtraction, patterns: &SitePatterns) -> String {
    let Some(capture) = &extraction.debug else {
        return String::new();
    };

    let mut out = format!("# {}\n\n", extraction.document);
    for (i, grid) in capture.grids.iter().enumerate() {
        let report = extraction.tables.get(i);
        match report {
            Some(report) => out.push_str(&table_heading(report)),
            None => out.push_str(&format!("=== Table {} (page {}): not processed ===", i + 1, grid.page)),
        }
        out.push('\n');
        out.push_str(&render_grid(grid, report.and_then(|r| r.header_row), patterns));
        out.push('\n');
    }
    out
}

/// Writes `tables.txt` and `raw_text.txt` for one document into `dir`.
pub fn save_debug_dump(dir: &Path, extraction: &DocumentExtraction, patterns: &SitePatterns) -> Result<PathBuf, AppError> {
    let Some(capture) = &extraction.debug else {
        return Err(AppError::Processing(format!("No debug capture for {}", extraction.document)));
    };
    fs::create_dir_all(dir)?;

    let tables_path = dir.join("tables.txt");
    fs::write(&tables_path, render_tables(extraction, patterns))?;
    fs::write(dir.join("raw_text.txt"), &capture.text)?;

    tracing::info!("Saved debug dump to {}", dir.display());
    Ok(tables_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::runner::DebugCapture;
    use tempfile::TempDir;

    fn sample_grid() -> RawGrid {
        RawGrid::new(
            8,
            vec![
                vec!["header1", "MUST", "2025"],
                vec!["SPXXX-138", "Site A", "47,000(B)"],
                vec!["Total", "", "47,000"],
            ],
        )
    }

    fn extraction(debug: Option<DebugCapture>) -> DocumentExtraction {
        DocumentExtraction {
            document: "doc.json".to_string(),
            company: "DOC".to_string(),
            records: Vec::new(),
            annotations: Vec::new(),
            tables: vec![TableReport {
                table_number: 1,
                page: 8,
                header_row: Some(0),
                records: 1,
                rejected_rows: 1,
                skipped: None,
            }],
            duplicates_removed: 0,
            annotation_blocks: 0,
            unmatched_annotation_rows: 0,
            debug,
        }
    }

    #[test]
    fn test_render_grid_marks_rows() {
        let text = render_grid(&sample_grid(), Some(0), &SitePatterns::default());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("H | header1"));
        assert!(lines[1].starts_with("+ | SPXXX-138"));
        assert!(lines[2].starts_with("  | Total"));
    }

    #[test]
    fn test_long_cells_are_clipped() {
        let long = "x".repeat(40);
        let grid = RawGrid::new(1, vec![vec![long.as_str()]]);
        let text = render_grid(&grid, None, &SitePatterns::default());
        assert!(text.trim_end().ends_with('~'));
        assert!(text.len() < 40);
    }

    #[test]
    fn test_save_debug_dump() {
        let dir = TempDir::new().unwrap();
        let capture = DebugCapture { grids: vec![sample_grid(), sample_grid()], text: "Table 1 - x".to_string() };
        let path = save_debug_dump(&dir.path().join("debug"), &extraction(Some(capture)), &SitePatterns::default()).unwrap();

        let tables = fs::read_to_string(path).unwrap();
        assert!(tables.contains("=== Table 1 (page 8): 1 record(s), 1 row(s) skipped ==="));
        assert!(tables.contains("=== Table 2 (page 8): not processed ==="));
        let raw = fs::read_to_string(dir.path().join("debug").join("raw_text.txt")).unwrap();
        assert_eq!(raw, "Table 1 - x");
    }

    #[test]
    fn test_missing_capture_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(save_debug_dump(dir.path(), &extraction(None), &SitePatterns::default()).is_err());
    }
}
