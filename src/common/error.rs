//! Error types for heapdb.

use thiserror::Error;

use crate::common::{PageId, TableId};
use crate::concurrency::TransactionId;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in heapdb.
///
/// A denied lock is not an error at the lock manager level (`acquire` returns
/// `false`); it only becomes [`Error::LockTimeout`] once the buffer pool gives
/// up retrying. A page beyond the end of a heap file is likewise a normal
/// `Ok(None)` from `HeapFile::read_page` and only becomes
/// [`Error::PageNotFound`] when a caller actually needs that page.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist on disk.
    #[error("{0} not found")]
    PageNotFound(PageId),

    /// A record id that does not address a stored tuple.
    ///
    /// This indicates a protocol violation by the caller, e.g. deleting the
    /// same tuple twice.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Tuple does not match the schema of the page or file it is stored in.
    #[error("Tuple schema does not match table schema")]
    SchemaMismatch,

    /// No free slot left on the page.
    #[error("{0} has no empty slots")]
    PageFull(PageId),

    /// A page image of the wrong length was handed to the codec.
    #[error("Invalid page image: expected {expected} bytes, got {actual}")]
    InvalidPageImage { expected: usize, actual: usize },

    /// A heap file was registered with a pool using another page size.
    #[error("Invalid page size: expected {expected}, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },

    /// A page of this size has no room for a single tuple of the schema.
    #[error("A {page_size}-byte page cannot hold a {tuple_size}-byte tuple")]
    PageTooSmall { page_size: usize, tuple_size: usize },

    /// The buffer pool has no heap file for this table.
    #[error("Unknown table {0}")]
    UnknownTable(TableId),

    /// Buffer pool has no free frames and cannot evict any pages.
    ///
    /// This happens when every resident page is pinned by a guard or held
    /// under an exclusive lock.
    #[error("Buffer pool exhausted: all resident pages are pinned")]
    PoolExhausted,

    /// Attempted to discard a page that is still pinned.
    #[error("{0} is pinned")]
    PagePinned(PageId),

    /// A lock could not be acquired before the configured timeout.
    ///
    /// The caller is expected to abort the transaction.
    #[error("{tid} timed out waiting for a lock on {page_id}")]
    LockTimeout { tid: TransactionId, page_id: PageId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PageNotFound(PageId::new(TableId(7), 42));
        assert_eq!(format!("{}", err), "Page(7:42) not found");

        let err = Error::PageTooSmall { page_size: 4, tuple_size: 8 };
        assert_eq!(format!("{}", err), "A 4-byte page cannot hold a 8-byte tuple");

        let err = Error::PoolExhausted;
        assert_eq!(
            format!("{}", err),
            "Buffer pool exhausted: all resident pages are pinned"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        match err {
            Error::Io(_) => {} // Success
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_io_error_has_source() {
        use std::error::Error as _;

        let err: Error = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        assert!(err.source().is_some());
        assert!(Error::SchemaMismatch.source().is_none());
    }

    #[test]
    fn test_result_type_alias() {
        fn might_fail() -> Result<u32> {
            Ok(42)
        }

        assert_eq!(might_fail().unwrap(), 42);
    }
}
