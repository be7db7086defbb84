//! siftdb-vector
//!
//! LanceDB-backed persistent nearest-neighbor storage, one table per
//! collection, with dimension/model bookkeeping in a meta table.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod schema;
pub mod store;

pub use store::{CollectionMeta, VectorHit, VectorRecord, VectorStore};
