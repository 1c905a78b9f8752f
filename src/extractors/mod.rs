// src/extractors/mod.rs
pub mod columns;
pub mod linker;
pub mod normalize;
pub mod patterns;
pub mod rows;
pub mod value;

// Re-export key extraction types for convenience
#[allow(unused_imports)]
pub use columns::{ColumnMap, ColumnMapper, YearColumns};
#[allow(unused_imports)]
pub use linker::{AnnotationLinker, LinkOutcome, LinkedAnnotationRecord};
pub use patterns::SitePatterns;
#[allow(unused_imports)]
pub use rows::{DataRecord, TableExtraction, TableRowExtractor, TableSkip, YearDemand};
