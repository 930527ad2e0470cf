//! Knowledge-base retrieval on top of the Dify transport.
//!
//! Datasets and documents are fetched one page window at a time, or walked
//! page by page for whole-collection access. Segments are always presented in
//! `position` order regardless of the order the service returned them in.

pub mod client;
pub mod pagination;
pub mod segments;
pub mod upload;

pub use client::KnowledgeClient;
pub use pagination::{total_pages, PageRequest, PageResult};
pub use segments::{LocatedSegment, SegmentTarget, SortedSegments};
pub use upload::{translate_upload_error, UploadOptions};
