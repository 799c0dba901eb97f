//! Heap File - one table stored as a flat file of pages.
//!
//! The [`HeapFile`] handles all direct file operations for a table:
//! - Reading and writing pages by page number
//! - Appending new empty pages
//! - First-fit tuple insertion and targeted deletion (through the buffer pool)
//! - Sequential scans via [`HeapFileIterator`]

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::buffer::BufferPool;
use crate::common::config::DEFAULT_PAGE_SIZE;
use crate::common::{Error, PageId, RecordId, Result, TableId};
use crate::concurrency::TransactionId;
use crate::storage::page::HeapPage;
use crate::storage::tuple::{Tuple, TupleDesc};

/// The on-disk pages of one table.
///
/// # File Layout
/// The table is stored as a single file with pages laid out sequentially, with
/// no file header and no schema (the schema is supplied at open time):
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0   page_size  2×page_size  ...  N×page_size
/// ```
///
/// A partially written trailing page is not counted by
/// [`num_pages`](Self::num_pages); the next [`allocate_page`](Self::allocate_page)
/// overwrites it.
///
/// # Thread Safety
/// The file handle sits behind a mutex, so concurrent reads and writes of
/// *different* pages are safe. Consistency of a single page across
/// transactions is the lock manager's job, not this type's.
pub struct HeapFile {
    path: PathBuf,
    file: Mutex<File>,
    table_id: TableId,
    desc: Arc<TupleDesc>,
    page_size: usize,
    #[cfg(test)]
    fail_writes: AtomicBool,
}

impl HeapFile {
    /// Open (or create) the heap file at `path` with the default page size.
    ///
    /// The table id is derived from the file's absolute path.
    pub fn open<P: AsRef<Path>>(path: P, desc: Arc<TupleDesc>) -> Result<Self> {
        let table_id = TableId::from_path(path.as_ref());
        Self::open_with(path, desc, table_id, DEFAULT_PAGE_SIZE)
    }

    /// Open (or create) the heap file at `path` with an explicit table id and
    /// page size.
    ///
    /// # Errors
    /// - `Error::PageTooSmall` if a page of `page_size` bytes has no slot for
    ///   a tuple of `desc` (including a zero page size or an empty schema)
    /// - `Error::Io` if the file cannot be opened
    pub fn open_with<P: AsRef<Path>>(
        path: P,
        desc: Arc<TupleDesc>,
        table_id: TableId,
        page_size: usize,
    ) -> Result<Self> {
        if HeapPage::slots_for(page_size, desc.byte_size()) == 0 {
            return Err(Error::PageTooSmall {
                page_size,
                tuple_size: desc.byte_size(),
            });
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        debug!(path = %path.as_ref().display(), %table_id, page_size, "opened heap file");

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            file: Mutex::new(file),
            table_id,
            desc,
            page_size,
            #[cfg(test)]
            fail_writes: AtomicBool::new(false),
        })
    }

    /// Make every following [`write_page`](Self::write_page) fail with an
    /// I/O error until reset.
    #[cfg(test)]
    pub(crate) fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    #[inline]
    pub fn id(&self) -> TableId {
        self.table_id
    }

    #[inline]
    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of complete pages in the file.
    pub fn num_pages(&self) -> Result<u32> {
        let len = self.file.lock().metadata()?.len();
        Ok((len / self.page_size as u64) as u32)
    }

    /// Read and decode a page directly from disk, bypassing the buffer pool.
    ///
    /// Returns `Ok(None)` if the page lies beyond the last complete page.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if `page_id` belongs to another table
    /// - `Error::Io` if the seek or read fails
    pub fn read_page(&self, page_id: PageId) -> Result<Option<HeapPage>> {
        if page_id.table_id != self.table_id {
            return Err(Error::PageNotFound(page_id));
        }

        let mut data = vec![0u8; self.page_size];
        {
            let mut file = self.file.lock();
            let len = file.metadata()?.len();
            let offset = page_id.offset(self.page_size);
            if offset + self.page_size as u64 > len {
                return Ok(None);
            }

            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut data)?;
        }

        trace!(%page_id, "read page");
        HeapPage::new(page_id, self.desc.clone(), &data, self.page_size).map(Some)
    }

    /// Write a page image in place, growing the file if necessary.
    ///
    /// # Errors
    /// - `Error::InvalidPageSize` if the page was built for another page size
    /// - `Error::Io` if the seek or write fails
    pub fn write_page(&self, page: &HeapPage) -> Result<()> {
        if page.id().table_id != self.table_id {
            return Err(Error::PageNotFound(page.id()));
        }
        if page.page_size() != self.page_size {
            return Err(Error::InvalidPageSize {
                expected: self.page_size,
                actual: page.page_size(),
            });
        }

        #[cfg(test)]
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("injected write failure").into());
        }

        let data = page.page_data();
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(page.id().offset(self.page_size)))?;
        file.write_all(&data)?;
        file.sync_all()?;

        trace!(page_id = %page.id(), "wrote page");
        Ok(())
    }

    /// Append an empty page and return its id.
    ///
    /// Counting the pages and writing the new one happen under the file lock,
    /// so concurrent callers always get distinct pages.
    pub fn allocate_page(&self) -> Result<PageId> {
        let mut file = self.file.lock();
        let page_no = (file.metadata()?.len() / self.page_size as u64) as u32;
        let page_id = PageId::new(self.table_id, page_no);

        file.seek(SeekFrom::Start(page_id.offset(self.page_size)))?;
        file.write_all(&HeapPage::empty_page_data(self.page_size))?;
        file.sync_all()?;

        debug!(%page_id, "allocated page");
        Ok(page_id)
    }

    /// Insert `tuple` into the first page with a free slot, on behalf of `tid`.
    ///
    /// Pages are probed in order under a shared lock; the probe lock on a full
    /// page is released again unless `tid` already held it. The page that
    /// takes the tuple is locked exclusively and marked dirty. When every page
    /// is full a new empty page is appended and used.
    ///
    /// On success the tuple's record id is set and the modified page ids are
    /// returned.
    pub fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageId>> {
        if **tuple.tuple_desc() != *self.desc {
            return Err(Error::SchemaMismatch);
        }

        for page_no in 0..self.num_pages()? {
            let page_id = PageId::new(self.table_id, page_no);
            let held_before = pool.holds_lock(tid, page_id);

            let has_room = match pool.fetch_page_read(tid, page_id) {
                Ok(page) => page.num_empty_slots() > 0,
                Err(Error::PageNotFound(_)) => {
                    if !held_before {
                        pool.release_lock(tid, page_id);
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };

            if has_room {
                let mut page = pool.fetch_page_write(tid, page_id)?;
                if page.num_empty_slots() > 0 {
                    let rid = page.insert_tuple(tuple)?;
                    tuple.set_record_id(Some(rid));
                    trace!(%tid, %rid, "inserted tuple");
                    return Ok(vec![page_id]);
                }
            } else if !held_before {
                pool.release_lock(tid, page_id);
            }
        }

        let page_id = self.allocate_page()?;
        let mut page = pool.fetch_page_write(tid, page_id)?;
        let rid = page.insert_tuple(tuple)?;
        tuple.set_record_id(Some(rid));
        trace!(%tid, %rid, "inserted tuple into new page");

        Ok(vec![page_id])
    }

    /// Delete `tuple` from the slot its record id points at.
    ///
    /// # Errors
    /// - `Error::InvalidRecord` if the tuple has no record id, belongs to
    ///   another table, or its slot is already empty
    /// - `Error::PageNotFound` if the page does not exist
    pub fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageId>> {
        let rid = self.stored_record_id(tuple)?;

        let mut page = pool.fetch_page_write(tid, rid.page_id)?;
        // Validate through a shared borrow so a rejected delete leaves the page clean
        page.check_occupied(rid)?;
        page.delete_tuple(rid)?;
        tuple.set_record_id(None);
        trace!(%tid, %rid, "deleted tuple");

        Ok(vec![rid.page_id])
    }

    /// Overwrite the stored tuple at `tuple`'s record id with its current
    /// field values.
    pub fn update_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageId>> {
        if **tuple.tuple_desc() != *self.desc {
            return Err(Error::SchemaMismatch);
        }
        let rid = self.stored_record_id(tuple)?;

        let mut page = pool.fetch_page_write(tid, rid.page_id)?;
        page.check_occupied(rid)?;
        page.update_tuple(rid, tuple)?;
        trace!(%tid, %rid, "updated tuple");

        Ok(vec![rid.page_id])
    }

    fn stored_record_id(&self, tuple: &Tuple) -> Result<RecordId> {
        let rid = tuple
            .record_id()
            .ok_or_else(|| Error::InvalidRecord("tuple has no record id".to_string()))?;
        if rid.page_id.table_id != self.table_id {
            return Err(Error::InvalidRecord(format!(
                "{} does not belong to {}",
                rid, self.table_id
            )));
        }
        if rid.page_id.page_no >= self.num_pages()? {
            return Err(Error::PageNotFound(rid.page_id));
        }
        Ok(rid)
    }

    /// Scan every tuple of the table on behalf of `tid`, page by page.
    ///
    /// Pages are read through `pool` under shared locks.
    pub fn iter<'a>(&'a self, pool: &'a BufferPool, tid: TransactionId) -> HeapFileIterator<'a> {
        HeapFileIterator {
            file: self,
            pool,
            tid,
            next_page: 0,
            current: Vec::new().into_iter(),
            open: true,
        }
    }
}

/// Lazy sequential scan over a [`HeapFile`].
///
/// Yields the occupied tuples of page 0 in slot order, then page 1, and so on
/// until the file's page count is reached. Pages that cannot be found are
/// skipped. The tuples of one page are copied out before yielding, so no page
/// latch is held between calls to `next`.
pub struct HeapFileIterator<'a> {
    file: &'a HeapFile,
    pool: &'a BufferPool,
    tid: TransactionId,
    next_page: u32,
    current: std::vec::IntoIter<Tuple>,
    open: bool,
}

impl HeapFileIterator<'_> {
    /// Restart the scan from page 0. Also reopens a closed iterator.
    pub fn rewind(&mut self) {
        self.next_page = 0;
        self.current = Vec::new().into_iter();
        self.open = true;
    }

    /// Stop the scan; `next` returns `None` until [`rewind`](Self::rewind).
    pub fn close(&mut self) {
        self.current = Vec::new().into_iter();
        self.open = false;
    }

    fn fail(&mut self, err: Error) -> Option<Result<Tuple>> {
        self.close();
        Some(Err(err))
    }
}

impl Iterator for HeapFileIterator<'_> {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.open {
            return None;
        }

        loop {
            if let Some(tuple) = self.current.next() {
                return Some(Ok(tuple));
            }

            let num_pages = match self.file.num_pages() {
                Ok(n) => n,
                Err(e) => return self.fail(e),
            };
            if self.next_page >= num_pages {
                return None;
            }

            let page_id = PageId::new(self.file.id(), self.next_page);
            self.next_page += 1;

            match self.pool.fetch_page_read(self.tid, page_id) {
                Ok(page) => {
                    self.current = page.iter().cloned().collect::<Vec<_>>().into_iter();
                }
                Err(Error::PageNotFound(_)) => continue,
                Err(e) => return self.fail(e),
            }
        }
    }
}
