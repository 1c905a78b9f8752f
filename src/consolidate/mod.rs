// src/consolidate/mod.rs
pub mod merge;
pub mod relational;

pub use merge::{AnnotationJoinPolicy, ConsolidatedRecord, ConsolidationMerger};
pub use relational::RelationalTables;
