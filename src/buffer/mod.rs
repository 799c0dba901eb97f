//! Buffer pool management.
//!
//! The buffer pool is the in-memory cache layer between heap files and the
//! code that reads and writes tuples. It manages a fixed pool of frames, each
//! holding one decoded page, and is the transaction boundary: pages are
//! locked through it and flushed or reverted when a transaction completes.
//!
//! # Components
//! - [`BufferPool`] - The main page cache
//! - [`Frame`] - A slot in the buffer pool holding a page + metadata
//! - [`PageReadGuard`] / [`PageWriteGuard`] / [`PageGuard`] - RAII guards for page access
//! - [`BufferPoolStats`] - Performance statistics
//! - [`replacer`] - LRU eviction order

mod buffer_pool;
mod frame;
mod page_guard;
pub mod replacer;
mod stats;

pub use buffer_pool::BufferPool;
pub use frame::Frame;
pub use page_guard::{PageGuard, PageReadGuard, PageWriteGuard};
pub use stats::{BufferPoolStats, StatsSnapshot};
