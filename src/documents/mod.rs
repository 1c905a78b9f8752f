// src/documents/mod.rs
pub mod models;
pub mod pages;
pub mod source;

pub use models::RawGrid;
pub use pages::PageRange;
pub use source::{discover_documents, open_document, DocumentSource};
