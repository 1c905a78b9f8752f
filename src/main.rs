// src/main.rs
mod config;
mod consolidate;
mod documents;
mod extractors;
mod pipeline;
mod storage;
mod utils;

use std::path::PathBuf;

use clap::Parser;
use config::PipelineConfig;
use consolidate::{AnnotationJoinPolicy, RelationalTables};
use documents::discover_documents;
use extractors::SitePatterns;
use pipeline::{build_jobs, PipelineWorker};
use storage::StorageManager;
use utils::AppError;

/// Extracts contracted transmission-usage (MUST) tables and their footnotes
/// from contract PDFs and consolidates them per site.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the contract documents (.pdf with optional .tables.json sidecar, or .json bundles)
    #[arg(short, long, default_value = "./input")]
    input_dir: PathBuf,

    /// Output directory for extracted content
    #[arg(short, long, default_value = "./output")]
    output_dir: String,

    /// Page range per document, in discovery order ("8-16", "1,3,5-7", "all")
    #[arg(short, long = "pages")]
    pages: Vec<String>,

    /// JSON config file; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only link footnotes of this table id (default "1")
    #[arg(long)]
    annotation_table: Option<String>,

    /// Link footnotes of every table
    #[arg(long, conflicts_with = "annotation_table")]
    all_annotation_tables: bool,

    /// Table whose footnotes are attached to the consolidated rows
    #[arg(long)]
    merge_table: Option<u32>,

    /// Regional site-code prefix, e.g. SP
    #[arg(long)]
    site_prefix: Option<String>,

    /// Demand years, comma separated
    #[arg(long, value_delimiter = ',')]
    years: Option<Vec<u16>>,

    /// Read every MUST table instead of stopping after the first one with rows
    #[arg(long)]
    all_tables: bool,

    /// How several footnotes on one site are combined: concatenate or first-match
    #[arg(long)]
    join_policy: Option<AnnotationJoinPolicy>,

    /// Debug mode - save rendered grids and raw page text per document
    #[arg(short, long)]
    debug: bool,
}

/// Config file (or defaults) with command-line overrides applied.
fn build_config(args: &Args) -> Result<PipelineConfig, AppError> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(prefix) = &args.site_prefix {
        config.site_prefix = prefix.trim().to_uppercase();
    }
    if let Some(years) = &args.years {
        config.years = years.clone();
    }
    if args.all_annotation_tables {
        config.annotation_table = None;
    } else if let Some(table) = &args.annotation_table {
        config.annotation_table = Some(table.clone());
    }
    if let Some(table) = args.merge_table {
        config.merge_table = table;
    }
    if args.all_tables {
        config.first_table_only = false;
    }
    if let Some(policy) = args.join_policy {
        config.join_policy = policy;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging("info");

    // 2. Parse CLI Arguments and settle the configuration
    let args = Args::parse();
    tracing::info!("Starting processing for args: {:?}", args);
    let config = build_config(&args)?;
    tracing::debug!("Pipeline config: {:?}", config);

    // 3. Initialize storage
    let storage = StorageManager::new(&args.output_dir)?;

    // 4. Find documents and pair them with page ranges
    let documents = discover_documents(&args.input_dir)?;
    tracing::info!("Found {} document(s) in {}", documents.len(), args.input_dir.display());
    if documents.is_empty() {
        tracing::warn!("Nothing to process in {}", args.input_dir.display());
    }
    let jobs = build_jobs(documents, &args.pages)?;

    // 5. Run the extraction in the background, relaying progress
    let mut worker = PipelineWorker::spawn(jobs, config.clone(), args.debug)?;
    let cancel = worker.cancel_flag();
    loop {
        tokio::select! {
            event = worker.progress.recv() => match event {
                Some(event) => event.log(),
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                tracing::warn!("Interrupt received; stopping after the current table");
                cancel.cancel();
            }
        }
    }
    let report = match worker.finish().await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Processing failed: {}", e);
            return Err(e);
        }
    };

    // 6. Save per-company outputs
    storage.save_extractions(&report.extractions)?;
    if args.debug {
        let patterns = SitePatterns::new(&config.site_prefix)?;
        for extraction in &report.extractions {
            let dir = storage.debug_dir(&extraction.company, &extraction.document);
            if let Err(e) = utils::grid_debug::save_debug_dump(&dir, extraction, &patterns) {
                tracing::warn!("Failed to save debug dump for {}: {}", extraction.document, e);
            }
        }
    }

    // 7. Consolidate and break down for the review database
    let consolidated = report.consolidate(&config);
    storage.save_consolidated(&consolidated)?;
    let relational = RelationalTables::from_consolidated(&consolidated);
    storage.save_relational(&relational)?;
    let meta_path = storage.save_run_meta(&report, consolidated.len())?;
    tracing::info!("Saved run metadata to {}", meta_path.display());

    if consolidated.is_empty() {
        tracing::warn!("No MUST records were extracted from any document");
    }
    tracing::info!(
        "Processing finished. Success: {} document(s), Failures: {}, Records: {}",
        report.extractions.len(),
        report.failures.len(),
        consolidated.len()
    );

    Ok(())
}
