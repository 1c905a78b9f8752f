// src/documents/models.rs
use serde::{Deserialize, Serialize};

/// Normalizes one raw cell: trims it and maps the literal `nan` to empty.
pub fn clean_cell(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("nan") {
        String::new()
    } else {
        trimmed.to_string()
    }
}

/// One table as detected on a page: rows x columns of text cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawGrid {
    pub page: u32,
    rows: Vec<Vec<String>>,
}

impl RawGrid {
    /// Builds a rectangular grid, cleaning every cell and padding short rows.
    pub fn new<R, C>(page: u32, rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        let mut rows: Vec<Vec<String>> = rows
            .into_iter()
            .map(|row| row.into_iter().map(|cell| clean_cell(cell.as_ref())).collect())
            .collect();
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in rows.iter_mut() {
            row.resize(width, String::new());
        }
        Self { page, rows }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row(&self, idx: usize) -> Option<&[String]> {
        self.rows.get(idx).map(Vec::as_slice)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// Bounds-checked cell access.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row).and_then(|r| r.get(col)).map(String::as_str)
    }

    /// Upper-cased, space-joined text of a row.
    pub fn row_text_upper(&self, idx: usize) -> String {
        self.row(idx)
            .map(|r| r.join(" ").to_uppercase())
            .unwrap_or_default()
    }
}

// --- Bundle format written by the external table detector ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentBundle {
    #[serde(default)]
    pub pages: Vec<BundlePage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BundlePage {
    pub number: u32,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub tables: Vec<Vec<Vec<String>>>,
}

impl BundlePage {
    pub fn grids(&self) -> impl Iterator<Item = RawGrid> + '_ {
        self.tables.iter().map(|t| RawGrid::new(self.number, t))
    }
}
