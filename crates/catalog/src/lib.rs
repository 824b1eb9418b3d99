//! The library catalog and the processed-cache.
//!
//! The catalog (`library_index.json`) is the source of truth: an ordered list
//! of library releases whose `requires` field this tool rewrites. The
//! processed-cache (`cached_results.json`) only records which libraries have
//! already been attempted, so an interrupted batch can pick up where it left
//! off. Every write goes through [`write_json_atomic`].

pub mod error;
mod models;
mod store;

pub use crate::models::{Catalog, LibraryRecord, ProcessedCache};
pub use crate::store::{Store, write_json_atomic};
