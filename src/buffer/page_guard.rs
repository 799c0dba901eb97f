//! RAII guards for page access.
//!
//! These guards provide safe access to pages in the buffer pool:
//! - [`PageReadGuard`] - Shared read access (multiple allowed)
//! - [`PageWriteGuard`] - Exclusive write access (marks dirty once mutated)
//! - [`PageGuard`] - Either of the two, as returned by `BufferPool::get_page`
//!
//! All guards unpin the page when dropped. They do not release the
//! transaction's page lock; that happens at `transaction_complete`.

use std::ops::{Deref, DerefMut};

use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard};

use crate::common::{FrameId, PageId};
use crate::concurrency::{LockMode, TransactionId};
use crate::storage::page::HeapPage;

use super::buffer_pool::BufferPool;

/// Guard for read-only page access.
///
/// Multiple `PageReadGuard`s can exist for the same page simultaneously.
/// The page is automatically unpinned when the guard is dropped.
///
/// # Example
/// ```ignore
/// let page = pool.fetch_page_read(tid, page_id)?;
/// let free = page.num_empty_slots(); // Deref to &HeapPage
/// // guard drops here, page unpinned
/// ```
pub struct PageReadGuard<'a> {
    pool: &'a BufferPool,
    frame_id: FrameId,
    page_id: PageId,
    page: MappedRwLockReadGuard<'a, HeapPage>,
}

impl<'a> PageReadGuard<'a> {
    pub(crate) fn new(
        pool: &'a BufferPool,
        frame_id: FrameId,
        page_id: PageId,
        page: MappedRwLockReadGuard<'a, HeapPage>,
    ) -> Self {
        Self {
            pool,
            frame_id,
            page_id,
            page,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = HeapPage;

    #[inline]
    fn deref(&self) -> &HeapPage {
        &self.page
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        self.pool.unpin_page_internal(self.frame_id, None);
    }
}

/// Guard for exclusive write access to a page.
///
/// Only one `PageWriteGuard` can exist for a page at a time. If the page was
/// borrowed mutably through the guard, the frame is marked dirty on behalf of
/// the guard's transaction when it drops. Either way the page is unpinned.
pub struct PageWriteGuard<'a> {
    pool: &'a BufferPool,
    frame_id: FrameId,
    page_id: PageId,
    tid: TransactionId,
    page: MappedRwLockWriteGuard<'a, HeapPage>,
    modified: bool,
}

impl<'a> PageWriteGuard<'a> {
    pub(crate) fn new(
        pool: &'a BufferPool,
        frame_id: FrameId,
        page_id: PageId,
        tid: TransactionId,
        page: MappedRwLockWriteGuard<'a, HeapPage>,
    ) -> Self {
        Self {
            pool,
            frame_id,
            page_id,
            tid,
            page,
            modified: false,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// The transaction the page will be marked dirty for.
    #[inline]
    pub fn transaction_id(&self) -> TransactionId {
        self.tid
    }

    /// Whether the page has been borrowed mutably through this guard.
    #[inline]
    pub fn is_modified(&self) -> bool {
        self.modified
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = HeapPage;

    #[inline]
    fn deref(&self) -> &HeapPage {
        &self.page
    }
}

impl DerefMut for PageWriteGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut HeapPage {
        self.modified = true;
        &mut self.page
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        // Runs before the page latch is released, so a concurrent flush that
        // takes the latch next always sees the dirty mark.
        let dirtied_by = self.modified.then_some(self.tid);
        self.pool.unpin_page_internal(self.frame_id, dirtied_by);
    }
}

/// A page guard in the mode it was requested with.
pub enum PageGuard<'a> {
    Read(PageReadGuard<'a>),
    Write(PageWriteGuard<'a>),
}

impl PageGuard<'_> {
    #[inline]
    pub fn page_id(&self) -> PageId {
        match self {
            PageGuard::Read(g) => g.page_id(),
            PageGuard::Write(g) => g.page_id(),
        }
    }

    /// The lock mode this guard was obtained under.
    #[inline]
    pub fn mode(&self) -> LockMode {
        match self {
            PageGuard::Read(_) => LockMode::Shared,
            PageGuard::Write(_) => LockMode::Exclusive,
        }
    }

    /// Mutable access, only for guards obtained in exclusive mode.
    pub fn as_mut(&mut self) -> Option<&mut HeapPage> {
        match self {
            PageGuard::Read(_) => None,
            PageGuard::Write(g) => Some(&mut **g),
        }
    }
}

impl Deref for PageGuard<'_> {
    type Target = HeapPage;

    fn deref(&self) -> &HeapPage {
        match self {
            PageGuard::Read(g) => &**g,
            PageGuard::Write(g) => &**g,
        }
    }
}
