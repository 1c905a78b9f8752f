// src/pipeline/runner.rs
use std::collections::HashSet;
use std::fmt;

use tokio::sync::mpsc;

use crate::config::PipelineConfig;
use crate::documents::{DocumentSource, PageRange, RawGrid};
use crate::extractors::linker::{AnnotationLinker, LinkedAnnotationRecord};
use crate::extractors::normalize::extract_company;
use crate::extractors::patterns::SitePatterns;
use crate::extractors::rows::{DataRecord, TableExtraction, TableRowExtractor, TableSkip};
use crate::pipeline::worker::CancelFlag;
use crate::utils::AppError;

// A MUST table announces itself within its first rows
const MUST_MARKER_ROWS: usize = 5;

/// Progress lines reported while a run is in flight.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    DocumentStarted { document: String, index: usize, total: usize },
    TablesFound { document: String, count: usize },
    TableSkipped { document: String, table_number: u32, page: u32, reason: String },
    TableProcessed { document: String, table_number: u32, page: u32, records: usize, rejected: usize },
    AnnotationsLinked {
        document: String,
        links: usize,
        blocks_seen: usize,
        blocks_without_definitions: usize,
        unmatched_rows: usize,
    },
    DocumentFinished { document: String, records: usize, annotations: usize },
    DocumentFailed { document: String, error: String },
}

impl Progress {
    /// Emits the event through `tracing` at a level matching its severity.
    pub fn log(&self) {
        match self {
            Progress::DocumentFailed { .. } => tracing::error!("{}", self),
            Progress::DocumentFinished { records: 0, .. } => tracing::warn!("{}", self),
            Progress::TableSkipped { .. } => tracing::debug!("{}", self),
            _ => tracing::info!("{}", self),
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Progress::DocumentStarted { document, index, total } => {
                write!(f, "[{}/{}] Processing {}", index, total, document)
            }
            Progress::TablesFound { document, count } => write!(f, "{}: {} table(s) found", document, count),
            Progress::TableSkipped { document, table_number, page, reason } => {
                write!(f, "{}: table {} (page {}) skipped: {}", document, table_number, page, reason)
            }
            Progress::TableProcessed { document, table_number, page, records, rejected } => write!(
                f,
                "{}: table {} (page {}) gave {} record(s), {} row(s) skipped",
                document, table_number, page, records, rejected
            ),
            Progress::AnnotationsLinked { document, links, blocks_seen, blocks_without_definitions, unmatched_rows } => {
                write!(
                    f,
                    "{}: {} footnote link(s) from {} table block(s), {} without definitions, {} row(s) not matched",
                    document, links, blocks_seen, blocks_without_definitions, unmatched_rows
                )
            }
            Progress::DocumentFinished { document, records: 0, .. } => {
                write!(f, "{}: no MUST records found (document read without errors)", document)
            }
            Progress::DocumentFinished { document, records, annotations } => {
                write!(f, "{}: finished with {} record(s), {} footnote link(s)", document, records, annotations)
            }
            Progress::DocumentFailed { document, error } => write!(f, "{}: failed: {}", document, error),
        }
    }
}

/// Where a runner reports progress.
pub trait ProgressSink {
    fn report(&self, event: Progress);
}

impl ProgressSink for mpsc::UnboundedSender<Progress> {
    fn report(&self, event: Progress) {
        // A dropped receiver only means nobody is watching any more.
        let _ = self.send(event);
    }
}

/// What happened to one grid of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct TableReport {
    pub table_number: u32,
    pub page: u32,
    pub header_row: Option<usize>,
    pub records: usize,
    pub rejected_rows: usize,
    pub skipped: Option<String>,
}

/// Raw inputs kept for the debug dump.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DebugCapture {
    pub grids: Vec<RawGrid>,
    pub text: String,
}

/// Everything extracted from one document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentExtraction {
    pub document: String,
    pub company: String,
    pub records: Vec<DataRecord>,
    pub annotations: Vec<LinkedAnnotationRecord>,
    pub tables: Vec<TableReport>,
    pub duplicates_removed: usize,
    /// Table blocks found in the page text, linked or not.
    pub annotation_blocks: usize,
    /// Text rows that start with a site code but did not fit the row layout.
    pub unmatched_annotation_rows: usize,
    pub debug: Option<DebugCapture>,
}

/// Drops repeated records, keeping the first occurrence.
fn dedupe_records(records: Vec<DataRecord>) -> (Vec<DataRecord>, usize) {
    let before = records.len();
    let mut seen = HashSet::new();
    let unique: Vec<DataRecord> = records.into_iter().filter(|r| seen.insert(r.clone())).collect();
    let removed = before - unique.len();
    (unique, removed)
}

pub struct DocumentRunner<'a> {
    config: &'a PipelineConfig,
    patterns: &'a SitePatterns,
    capture_debug: bool,
}

impl<'a> DocumentRunner<'a> {
    pub fn new(config: &'a PipelineConfig, patterns: &'a SitePatterns) -> Self {
        Self { config, patterns, capture_debug: false }
    }

    pub fn with_debug_capture(mut self, enabled: bool) -> Self {
        self.capture_debug = enabled;
        self
    }

    /// Runs both extraction streams over one document.
    ///
    /// Only failures of the document source are errors; tables and rows that
    /// do not parse are skipped and counted. Cancellation is honoured between
    /// tables.
    pub fn run(
        &self,
        source: &dyn DocumentSource,
        pages: &PageRange,
        cancel: &CancelFlag,
        sink: &dyn ProgressSink,
    ) -> Result<DocumentExtraction, AppError> {
        let document = source.name().to_string();
        let grids = source.grids(pages)?;
        sink.report(Progress::TablesFound { document: document.clone(), count: grids.len() });

        let extractor = TableRowExtractor::new(self.config, self.patterns);
        let mut records = Vec::new();
        let mut tables = Vec::new();

        for (i, grid) in grids.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled(0));
            }
            let table_number = i as u32 + 1;
            let mut report = TableReport {
                table_number,
                page: grid.page,
                header_row: None,
                records: 0,
                rejected_rows: 0,
                skipped: None,
            };

            let skip_reason = if !extractor.mapper().is_must_table(grid, MUST_MARKER_ROWS) {
                Some(format!("no '{}' marker in the first rows", self.config.table_marker))
            } else {
                match extractor.extract(grid, table_number) {
                    TableExtraction::Skipped(TableSkip::TooFewRows) => Some("fewer than 3 rows".to_string()),
                    TableExtraction::Skipped(TableSkip::NoHeaderRow) => Some("no header row".to_string()),
                    TableExtraction::Extracted(table) => {
                        report.header_row = Some(table.header_row);
                        report.records = table.records.len();
                        report.rejected_rows = table.rejected_rows;
                        records.extend(table.records);
                        if report.records == 0 {
                            Some(format!("no rows starting with '{}'", self.patterns.prefix()))
                        } else {
                            None
                        }
                    }
                }
            };

            match &skip_reason {
                Some(reason) => sink.report(Progress::TableSkipped {
                    document: document.clone(),
                    table_number,
                    page: grid.page,
                    reason: reason.clone(),
                }),
                None => sink.report(Progress::TableProcessed {
                    document: document.clone(),
                    table_number,
                    page: grid.page,
                    records: report.records,
                    rejected: report.rejected_rows,
                }),
            }
            report.skipped = skip_reason;
            let produced = report.records > 0;
            tables.push(report);

            if produced && self.config.first_table_only {
                tracing::debug!("{}: stopping after first MUST table", document);
                break;
            }
        }

        let (mut records, duplicates_removed) = dedupe_records(records);
        if duplicates_removed > 0 {
            tracing::info!("{}: removed {} duplicate record(s)", document, duplicates_removed);
        }
        for record in records.iter_mut() {
            record.source_document = document.clone();
        }

        if cancel.is_cancelled() {
            return Err(AppError::Cancelled(0));
        }
        let text = source.text(pages)?;
        let linker = AnnotationLinker::new(self.patterns, self.config.annotation_table.clone());
        let outcome = linker.link(&text);
        sink.report(Progress::AnnotationsLinked {
            document: document.clone(),
            links: outcome.records.len(),
            blocks_seen: outcome.blocks_seen,
            blocks_without_definitions: outcome.blocks_without_definitions,
            unmatched_rows: outcome.unmatched_rows,
        });
        if outcome.unmatched_rows > 0 {
            tracing::warn!(
                "{}: {} site row(s) in the text did not match the expected layout; their footnotes are not linked",
                document,
                outcome.unmatched_rows
            );
        }
        let mut annotations = outcome.records;
        for note in annotations.iter_mut() {
            note.source_document = document.clone();
        }

        sink.report(Progress::DocumentFinished {
            document: document.clone(),
            records: records.len(),
            annotations: annotations.len(),
        });

        let debug = self.capture_debug.then(|| DebugCapture { grids, text });
        Ok(DocumentExtraction {
            company: extract_company(&document),
            document,
            records,
            annotations,
            tables,
            duplicates_removed,
            annotation_blocks: outcome.blocks_seen,
            unmatched_annotation_rows: outcome.unmatched_rows,
            debug,
        })
    }
}
