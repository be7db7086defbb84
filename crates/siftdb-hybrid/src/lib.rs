//! siftdb-hybrid
//!
//! Combines the vector and lexical indices behind one `SearchService`:
//! document ingestion through the full parse/chunk/embed pipeline, and
//! weighted score fusion at query time.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod engine;
pub mod fusion;
pub mod service;

pub use engine::HybridSearchEngine;
pub use service::SearchService;
