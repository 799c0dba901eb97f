//! heapdb - a disk-backed heap storage core with page-level two-phase locking.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                             heapdb                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │       Buffer Pool (buffer/)                             │    │
//! │  │   BufferPool + Frame + LruReplacer + page guards        │    │
//! │  │   commit = flush dirty pages, abort = re-read from disk │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │           ↓ lock / release                  ↓ load / flush      │
//! │  ┌──────────────────────────┐   ┌──────────────────────────┐    │
//! │  │ Concurrency (concurrency/)│  │  Storage (storage/)      │    │
//! │  │ LockManager: S/X per page │  │  HeapFile → HeapPage     │    │
//! │  │ TransactionId             │  │  → Tuple / TupleDesc     │    │
//! │  └──────────────────────────┘   └──────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, TableId, RecordId, Error, config)
//! - [`buffer`] - Buffer pool, frames, guards and the LRU replacer
//! - [`storage`] - Heap files, page codec, tuples and schemas
//! - [`concurrency`] - Transaction ids and the page lock manager
//!
//! # Quick Start
//! ```no_run
//! use std::sync::Arc;
//! use heapdb::{BufferPool, Field, HeapFile, TransactionId, Tuple, TupleDesc, Type};
//!
//! let desc = Arc::new(TupleDesc::with_names(&[Type::Int, Type::String], &["id", "name"]));
//! let file = Arc::new(HeapFile::open("people.dat", desc.clone())?);
//!
//! let pool = BufferPool::with_capacity(50);
//! pool.register_file(file.clone())?;
//!
//! let tid = TransactionId::new();
//! let mut t = Tuple::new(desc, vec![Field::Int(1), Field::string("ada")])?;
//! pool.insert_tuple(tid, file.id(), &mut t)?;
//!
//! for tuple in file.iter(&pool, tid) {
//!     println!("{}", tuple?);
//! }
//! pool.transaction_complete(tid, true)?;
//! # Ok::<(), heapdb::Error>(())
//! ```

pub mod buffer;
pub mod common;
pub mod concurrency;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::{DEFAULT_PAGE_SIZE, STRING_LEN};
pub use common::{BufferPoolConfig, Error, FrameId, PageId, RecordId, Result, TableId};

pub use buffer::{
    BufferPool, BufferPoolStats, PageGuard, PageReadGuard, PageWriteGuard, StatsSnapshot,
};
pub use concurrency::{LockManager, LockMode, TransactionId};
pub use storage::page::HeapPage;
pub use storage::tuple::{Field, Op, Tuple, TupleDesc, Type};
pub use storage::{HeapFile, HeapFileIterator};
