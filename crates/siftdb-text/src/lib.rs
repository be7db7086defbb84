//! siftdb-text
//!
//! Tantivy-based lexical indexing and BM25 search over collection-scoped
//! indices. See the `index` module for the write/query surface.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod index;
pub mod schema;

pub use index::{LexicalHit, LexicalIndex};
