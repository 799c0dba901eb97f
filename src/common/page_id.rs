//! Table and page identifier types.

use std::fmt;
use std::path::Path;

/// Identifies a table, and therefore the heap file that stores it.
///
/// Heap files derive their id from a CRC32 of their absolute path, so the same
/// file always maps to the same table id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u32);

impl TableId {
    /// Derive a stable table id from a file path.
    ///
    /// Relative paths are resolved against the current directory first so
    /// that two spellings of the same file agree.
    pub fn from_path(path: &Path) -> Self {
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        TableId(crc32fast::hash(absolute.as_os_str().as_encoded_bytes()))
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Table({})", self.0)
    }
}

/// Identifies a page on disk: (table, page number).
///
/// Page `n` of a table lives at byte offset `n * page_size` of its heap file.
///
/// # Example
/// ```
/// use heapdb::{PageId, TableId};
///
/// let page_id = PageId::new(TableId(1), 42);
/// assert_eq!(page_id.table_id, TableId(1));
/// assert_eq!(page_id.page_no, 42);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    pub table_id: TableId,
    pub page_no: u32,
}

impl PageId {
    /// Create a new PageId.
    #[inline]
    pub fn new(table_id: TableId, page_no: u32) -> Self {
        PageId { table_id, page_no }
    }

    /// Byte offset of this page within its heap file.
    #[inline]
    pub fn offset(&self, page_size: usize) -> u64 {
        (self.page_no as u64) * (page_size as u64)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page({}:{})", self.table_id.0, self.page_no)
    }
}
