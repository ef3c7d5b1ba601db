//! Document store module
//!
//! A small file-backed document store and the WRITE/READ workloads the
//! benchmark measures against it.

pub mod document;
pub mod workload;

// Re-export commonly used types
pub use document::{Document, DocumentCollection, DocumentStore};
pub use workload::{StoreReadBenchmark, StoreWorkloads, StoreWriteBenchmark};
