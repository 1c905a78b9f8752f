// src/pipeline/worker.rs
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::PipelineConfig;
use crate::consolidate::{ConsolidatedRecord, ConsolidationMerger};
use crate::documents::{open_document, PageRange};
use crate::extractors::linker::LinkedAnnotationRecord;
use crate::extractors::patterns::SitePatterns;
use crate::extractors::rows::DataRecord;
use crate::pipeline::runner::{DocumentExtraction, DocumentRunner, Progress, ProgressSink};
use crate::utils::AppError;

/// Shared stop request, checked between documents and between tables.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentJob {
    pub path: PathBuf,
    pub pages: PageRange,
}

/// Pairs documents with page ranges. No ranges means every page of every
/// document; otherwise there must be exactly one range per document.
pub fn build_jobs(documents: Vec<PathBuf>, page_ranges: &[String]) -> Result<Vec<DocumentJob>, AppError> {
    let ranges: Vec<PageRange> = page_ranges
        .iter()
        .map(|r| PageRange::parse(r))
        .collect::<Result<_, _>>()?;

    match ranges.len() {
        0 => Ok(documents.into_iter().map(|path| DocumentJob { path, pages: PageRange::All }).collect()),
        n if n == documents.len() => Ok(documents
            .into_iter()
            .zip(ranges)
            .map(|(path, pages)| DocumentJob { path, pages })
            .collect()),
        n => Err(AppError::Config(format!(
            "{} page range(s) given for {} document(s); give none or one per document",
            n,
            documents.len()
        ))),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentFailure {
    pub document: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub extractions: Vec<DocumentExtraction>,
    pub failures: Vec<DocumentFailure>,
}

impl RunReport {
    pub fn records(&self) -> Vec<DataRecord> {
        self.extractions.iter().flat_map(|e| e.records.iter().cloned()).collect()
    }

    pub fn annotations(&self) -> Vec<LinkedAnnotationRecord> {
        self.extractions.iter().flat_map(|e| e.annotations.iter().cloned()).collect()
    }

    /// Joins every extracted row with the footnotes of the merge table.
    pub fn consolidate(&self, config: &PipelineConfig) -> Vec<ConsolidatedRecord> {
        ConsolidationMerger::new(config.merge_table, config.join_policy).merge(&self.records(), &self.annotations())
    }
}

/// Runs the extraction off the async executor.
pub struct PipelineWorker {
    pub progress: mpsc::UnboundedReceiver<Progress>,
    cancel: CancelFlag,
    handle: JoinHandle<Result<RunReport, AppError>>,
}

impl PipelineWorker {
    /// Starts processing `jobs` on a blocking thread. Fails early only when
    /// the configuration is unusable.
    pub fn spawn(jobs: Vec<DocumentJob>, config: PipelineConfig, capture_debug: bool) -> Result<Self, AppError> {
        config.validate()?;
        let patterns = SitePatterns::new(&config.site_prefix)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancelFlag::default();
        let flag = cancel.clone();

        let handle = tokio::task::spawn_blocking(move || {
            let runner = DocumentRunner::new(&config, &patterns).with_debug_capture(capture_debug);
            run_jobs(&runner, &jobs, &flag, &tx)
        });

        Ok(Self { progress: rx, cancel, handle })
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Waits for the run to end. Progress not yet received is dropped.
    pub async fn finish(self) -> Result<RunReport, AppError> {
        self.handle
            .await
            .map_err(|e| AppError::Processing(format!("Extraction worker stopped unexpectedly: {}", e)))?
    }
}

fn run_jobs(
    runner: &DocumentRunner<'_>,
    jobs: &[DocumentJob],
    cancel: &CancelFlag,
    sink: &dyn ProgressSink,
) -> Result<RunReport, AppError> {
    let mut report = RunReport::default();
    let total = jobs.len();

    for (i, job) in jobs.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled(i));
        }
        let document = job
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| job.path.display().to_string());
        sink.report(Progress::DocumentStarted { document: document.clone(), index: i + 1, total });

        let result = open_document(&job.path)
            .map_err(AppError::from)
            .and_then(|source| runner.run(source.as_ref(), &job.pages, cancel, sink));

        match result {
            Ok(extraction) => report.extractions.push(extraction),
            Err(AppError::Cancelled(_)) => return Err(AppError::Cancelled(i)),
            Err(e) => {
                sink.report(Progress::DocumentFailed { document: document.clone(), error: e.to_string() });
                report.failures.push(DocumentFailure { document, error: e.to_string() });
            }
        }
    }

    if report.extractions.is_empty() && !report.failures.is_empty() {
        return Err(AppError::Processing(format!(
            "All {} document(s) failed to process",
            report.failures.len()
        )));
    }
    Ok(report)
}
