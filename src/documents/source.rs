// src/documents/source.rs
use std::fs;
use std::path::{Path, PathBuf};

use lopdf::Document;

use crate::documents::models::{DocumentBundle, RawGrid};
use crate::documents::pages::PageRange;
use crate::utils::error::SourceError;

const SIDECAR_SUFFIX: &str = ".tables.json";

/// Gives the pipeline the two views of a document it needs: detected table
/// grids and linearized page text.
pub trait DocumentSource: Send + Sync {
    /// File name used for logging and for deriving the company.
    fn name(&self) -> &str;

    fn grids(&self, pages: &PageRange) -> Result<Vec<RawGrid>, SourceError>;

    fn text(&self, pages: &PageRange) -> Result<String, SourceError>;
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn read_bundle(path: &Path) -> Result<DocumentBundle, SourceError> {
    let raw = fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| SourceError::Bundle {
        path: path.display().to_string(),
        source,
    })
}

fn bundle_grids(bundle: &DocumentBundle, pages: &PageRange) -> Vec<RawGrid> {
    bundle
        .pages
        .iter()
        .filter(|p| pages.contains(p.number))
        .flat_map(|p| p.grids())
        .collect()
}

// --- JSON bundle (tables and text already extracted) ---

pub struct BundleDocument {
    name: String,
    bundle: DocumentBundle,
}

impl BundleDocument {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let bundle = read_bundle(path)?;
        tracing::debug!("Loaded bundle {} with {} page(s)", path.display(), bundle.pages.len());
        Ok(Self { name: file_name(path), bundle })
    }

    pub fn from_bundle(name: impl Into<String>, bundle: DocumentBundle) -> Self {
        Self { name: name.into(), bundle }
    }
}

impl DocumentSource for BundleDocument {
    fn name(&self) -> &str {
        &self.name
    }

    fn grids(&self, pages: &PageRange) -> Result<Vec<RawGrid>, SourceError> {
        Ok(bundle_grids(&self.bundle, pages))
    }

    fn text(&self, pages: &PageRange) -> Result<String, SourceError> {
        let mut text = String::new();
        for page in self.bundle.pages.iter().filter(|p| pages.contains(p.number)) {
            if !page.text.is_empty() {
                text.push_str(&page.text);
                text.push('\n');
            }
        }
        Ok(text)
    }
}

// --- PDF (text via lopdf, grids from a sidecar bundle) ---

pub struct PdfDocument {
    name: String,
    path: PathBuf,
    sidecar: PathBuf,
}

impl PdfDocument {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let sidecar = path.with_file_name(format!("{}{}", stem, SIDECAR_SUFFIX));
        Self { name: file_name(&path), path, sidecar }
    }
}

impl DocumentSource for PdfDocument {
    fn name(&self) -> &str {
        &self.name
    }

    fn grids(&self, pages: &PageRange) -> Result<Vec<RawGrid>, SourceError> {
        if !self.sidecar.exists() {
            tracing::warn!(
                "No table sidecar {} for {}; no grids available",
                self.sidecar.display(),
                self.name
            );
            return Ok(Vec::new());
        }
        let bundle = read_bundle(&self.sidecar)?;
        Ok(bundle_grids(&bundle, pages))
    }

    fn text(&self, pages: &PageRange) -> Result<String, SourceError> {
        let document = Document::load(&self.path).map_err(|source| SourceError::Pdf {
            path: self.path.display().to_string(),
            source,
        })?;

        let mut text = String::new();
        for page_number in document.get_pages().keys().copied().filter(|n| pages.contains(*n)) {
            match document.extract_text(&[page_number]) {
                Ok(page_text) => {
                    text.push_str(&page_text);
                    text.push('\n');
                }
                // One unreadable page should not sink the document.
                Err(e) => tracing::warn!("Skipping page {} of {}: {}", page_number, self.name, e),
            }
        }
        tracing::debug!("Extracted {} chars of text from {}", text.len(), self.name);
        Ok(text)
    }
}

/// Opens a single document by extension.
pub fn open_document(path: &Path) -> Result<Box<dyn DocumentSource>, SourceError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => Ok(Box::new(PdfDocument::new(path))),
        "json" => Ok(Box::new(BundleDocument::open(path)?)),
        _ => Err(SourceError::Unsupported(path.display().to_string())),
    }
}

/// Lists `.pdf` and `.json` documents in `dir`, sorted by file name.
/// Table sidecars belong to their PDF and are not listed.
pub fn discover_documents(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let entries = fs::read_dir(dir).map_err(|source| SourceError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            let name = file_name(p).to_lowercase();
            !name.ends_with(SIDECAR_SUFFIX) && (name.ends_with(".pdf") || name.ends_with(".json"))
        })
        .collect();
    paths.sort_by_key(|p| file_name(p));
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::models::BundlePage;

    fn sample_bundle() -> DocumentBundle {
        DocumentBundle {
            pages: vec![
                BundlePage {
                    number: 7,
                    text: "intro".to_string(),
                    tables: vec![vec![vec!["x".to_string()]]],
                },
                BundlePage {
                    number: 8,
                    text: "Tabela 01 - MUST".to_string(),
                    tables: vec![vec![vec!["a".to_string(), "b".to_string()]]],
                },
            ],
        }
    }

    #[test]
    fn test_bundle_respects_page_range() {
        let doc = BundleDocument::from_bundle("doc.json", sample_bundle());
        let range = PageRange::parse("8").unwrap();

        let grids = doc.grids(&range).unwrap();
        assert_eq!(grids.len(), 1);
        assert_eq!(grids[0].page, 8);

        let text = doc.text(&range).unwrap();
        assert_eq!(text, "Tabela 01 - MUST\n");
        assert_eq!(doc.text(&PageRange::All).unwrap(), "intro\nTabela 01 - MUST\n");
    }

    #[test]
    fn test_discover_skips_sidecars_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "a.json", "b.tables.json", "notes.txt"] {
            fs::write(dir.path().join(name), "{}").unwrap();
        }
        let found: Vec<String> = discover_documents(dir.path())
            .unwrap()
            .iter()
            .map(|p| file_name(p))
            .collect();
        assert_eq!(found, vec!["a.json", "b.pdf"]);
    }

    #[test]
    fn test_pdf_without_sidecar_has_no_grids() {
        let dir = tempfile::tempdir().unwrap();
        let doc = PdfDocument::new(dir.path().join("missing.pdf"));
        assert!(doc.grids(&PageRange::All).unwrap().is_empty());
        assert!(matches!(doc.text(&PageRange::All), Err(SourceError::Pdf { .. })));
    }

    #[test]
    fn test_pdf_reads_sidecar_grids() {
        let dir = tempfile::tempdir().unwrap();
        let sidecar = serde_json::to_string(&sample_bundle()).unwrap();
        fs::write(dir.path().join("contract.tables.json"), sidecar).unwrap();

        let doc = PdfDocument::new(dir.path().join("contract.pdf"));
        assert_eq!(doc.name(), "contract.pdf");
        assert_eq!(doc.grids(&PageRange::All).unwrap().len(), 2);
    }

    #[test]
    fn test_open_rejects_unknown_extension() {
        assert!(matches!(
            open_document(Path::new("notes.txt")),
            Err(SourceError::Unsupported(_))
        ));
    }
}
