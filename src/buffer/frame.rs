//! Frame - a slot in the buffer pool.
//!
//! A [`Frame`] holds a [`HeapPage`] plus metadata needed for buffer management:
//! - Which page is loaded (if any)
//! - Pin count for reference counting
//! - Which transaction last dirtied the page, if it is dirty

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageId;
use crate::concurrency::TransactionId;
use crate::storage::page::HeapPage;

/// A frame in the buffer pool.
///
/// The buffer pool allocates a fixed number of frames at startup and indexes
/// them by [`FrameId`](crate::common::FrameId).
///
/// # Thread Safety
/// All fields use interior mutability for safe concurrent access:
/// - `page`: `RwLock`, the page latch (readers share, one writer)
/// - `page_id`: `Mutex` for safe updates
/// - `pin_count`: `AtomicU32` for lock-free reference counting
/// - `dirtied_by`: `Mutex`; `Some(tid)` means dirty
pub struct Frame {
    /// The cached page, `None` while the frame is free.
    page: RwLock<Option<HeapPage>>,

    /// Which page is currently loaded, or None if frame is empty.
    page_id: Mutex<Option<PageId>>,

    /// Number of live guards on this frame.
    pin_count: AtomicU32,

    /// Transaction that last modified the page since it was loaded or flushed.
    dirtied_by: Mutex<Option<TransactionId>>,
}

impl Frame {
    /// Create a new empty frame.
    pub fn new() -> Self {
        Self {
            page: RwLock::new(None),
            page_id: Mutex::new(None),
            pin_count: AtomicU32::new(0),
            dirtied_by: Mutex::new(None),
        }
    }

    // ========================================================================
    // Page access (RwLock)
    // ========================================================================

    /// Acquire read latch on the page slot.
    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, Option<HeapPage>> {
        self.page.read()
    }

    /// Acquire write latch on the page slot.
    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Option<HeapPage>> {
        self.page.write()
    }

    // ========================================================================
    // Page ID management
    // ========================================================================

    #[inline]
    pub fn page_id(&self) -> Option<PageId> {
        *self.page_id.lock()
    }

    #[inline]
    pub fn set_page_id(&self, page_id: Option<PageId>) {
        *self.page_id.lock() = page_id;
    }

    // ========================================================================
    // Pin count operations (Atomic)
    // ========================================================================

    /// Increment the pin count. Returns the new pin count.
    #[inline]
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrement the pin count. Returns the new pin count.
    ///
    /// # Panics
    /// Panics if pin count is already 0.
    #[inline]
    pub fn unpin(&self) -> u32 {
        let old = self.pin_count.fetch_sub(1, Ordering::AcqRel);
        assert!(old > 0, "pin count underflow");
        old - 1
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    // ========================================================================
    // Dirty tracking
    // ========================================================================

    /// Record that `tid` modified the page.
    #[inline]
    pub fn mark_dirty(&self, tid: TransactionId) {
        *self.dirtied_by.lock() = Some(tid);
    }

    #[inline]
    pub fn clear_dirty(&self) {
        *self.dirtied_by.lock() = None;
    }

    /// The transaction that dirtied the page, or `None` if the page is clean.
    #[inline]
    pub fn dirtied_by(&self) -> Option<TransactionId> {
        *self.dirtied_by.lock()
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirtied_by().is_some()
    }

    /// Check if the frame is empty (no page loaded).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.page_id().is_none()
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}
