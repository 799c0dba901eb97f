//! Storage layer - tuples, page formats and heap files.
//!
//! This module handles persistent storage:
//! - [`tuple`] - Schemas, fields and tuples
//! - [`page`] - The slotted [`HeapPage`](page::HeapPage) codec
//! - [`HeapFile`] - One table's pages on disk, plus insert/delete/scan

mod heap_file;
pub mod page;
pub mod tuple;

pub use heap_file::{HeapFile, HeapFileIterator};
