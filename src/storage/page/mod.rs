//! Page layout.
//!
//! This module contains:
//! - [`HeapPage`] - A slotted page of fixed-width tuples with an occupancy bitmap

mod heap_page;

pub use heap_page::HeapPage;
