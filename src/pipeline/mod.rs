// src/pipeline/mod.rs
pub mod runner;
pub mod worker;

#[allow(unused_imports)]
pub use runner::{DocumentExtraction, DocumentRunner, Progress, ProgressSink};
pub use worker::{build_jobs, PipelineWorker, RunReport};
