//! Buffer Pool - the page cache and transaction boundary.
//!
//! The [`BufferPool`] provides:
//! - Page caching between heap files and memory
//! - Page-level two-phase locking through a shared [`LockManager`]
//! - LRU eviction that never steals pages from running writers
//! - Commit (flush) and abort (re-read from disk) of a transaction's pages

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, trace, warn};

use crate::buffer::replacer::LruReplacer;
use crate::buffer::{BufferPoolStats, Frame, PageGuard, PageReadGuard, PageWriteGuard};
use crate::common::{BufferPoolConfig, Error, FrameId, PageId, Result, TableId};
use crate::concurrency::{LockManager, LockMode, TransactionId};
use crate::storage::page::HeapPage;
use crate::storage::tuple::Tuple;
use crate::storage::HeapFile;

/// A fixed number of page frames shared by all transactions.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                        BufferPool                           │
/// │  ┌──────────────┐  ┌───────────────────────────────────┐    │
/// │  │ page_table   │  │        frames: Vec<Frame>         │    │
/// │  │PageId → Fid  │─▶│  [Frame0] [Frame1] [Frame2] ...   │    │
/// │  └──────────────┘  └───────────────────────────────────┘    │
/// │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐       │
/// │  │  free_list   │  │   replacer   │  │    files     │       │
/// │  │ Vec<FrameId> │  │ LruReplacer  │  │TableId → Heap│       │
/// │  └──────────────┘  └──────────────┘  └──────────────┘       │
/// │  ┌──────────────────────────┐                               │
/// │  │ lock_manager: Arc<..>    │                               │
/// │  └──────────────────────────┘                               │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - `page_table`: `RwLock`, many readers, few writers
/// - `free_list`, `replacer`: `Mutex`, always modified
/// - `load_latch`: `Mutex<()>` serializing cache misses, eviction and discard
/// - `files`: `RwLock`, written only on registration
/// - `frames`: no lock, fixed size, each Frame has internal locks
/// - `stats`: no lock, all atomic counters
///
/// # Eviction policy
/// The victim is the least recently used frame that is unpinned and whose page
/// is not exclusively locked by any transaction. A page written by a running
/// transaction therefore stays in memory until that transaction completes,
/// unless it gives the lock up early with [`release_lock`](Self::release_lock).
///
/// # Usage
/// ```
/// use std::sync::Arc;
/// use heapdb::{BufferPool, Field, HeapFile, TransactionId, Tuple, TupleDesc, Type};
///
/// let dir = tempfile::tempdir()?;
/// let desc = Arc::new(TupleDesc::new(&[Type::Int]));
/// let file = Arc::new(HeapFile::open(dir.path().join("t.dat"), desc.clone())?);
///
/// let pool = BufferPool::with_capacity(8);
/// pool.register_file(file.clone())?;
///
/// let tid = TransactionId::new();
/// let mut t = Tuple::new(desc, vec![Field::Int(7)])?;
/// pool.insert_tuple(tid, file.id(), &mut t)?;
/// pool.transaction_complete(tid, true)?;
///
/// assert_eq!(file.num_pages()?, 1);
/// # Ok::<(), heapdb::Error>(())
/// ```
pub struct BufferPool {
    /// Fixed pool of frames allocated at startup.
    frames: Vec<Frame>,

    /// Maps page IDs to frame IDs.
    page_table: RwLock<HashMap<PageId, FrameId>>,

    /// Stack of free frame IDs (LIFO for cache locality).
    free_list: Mutex<Vec<FrameId>>,

    /// Recency order of resident frames.
    replacer: Mutex<LruReplacer>,

    /// At most one page load (and eviction) in flight.
    load_latch: Mutex<()>,

    /// Heap file of each table the pool can load pages for.
    files: RwLock<HashMap<TableId, Arc<HeapFile>>>,

    lock_manager: Arc<LockManager>,

    stats: BufferPoolStats,

    config: BufferPoolConfig,
}

impl BufferPool {
    /// Create a buffer pool with `config.capacity` frames.
    ///
    /// # Panics
    /// Panics if the capacity is 0.
    pub fn new(config: BufferPoolConfig, lock_manager: Arc<LockManager>) -> Self {
        assert!(config.capacity > 0, "capacity must be > 0");

        let frames: Vec<Frame> = (0..config.capacity).map(|_| Frame::new()).collect();
        let free_list: Vec<FrameId> = (0..config.capacity).rev().map(FrameId::new).collect();

        debug!(
            capacity = config.capacity,
            page_size = config.page_size,
            "created buffer pool"
        );

        Self {
            frames,
            page_table: RwLock::new(HashMap::new()),
            free_list: Mutex::new(free_list),
            replacer: Mutex::new(LruReplacer::new()),
            load_latch: Mutex::new(()),
            files: RwLock::new(HashMap::new()),
            lock_manager,
            stats: BufferPoolStats::new(),
            config,
        }
    }

    /// Pool with `capacity` frames, default settings and its own lock manager.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(BufferPoolConfig::new(capacity), Arc::new(LockManager::new()))
    }

    // ========================================================================
    // Public API: Table registry
    // ========================================================================

    /// Make `file`'s pages loadable through this pool.
    ///
    /// Registering the same table id again replaces the previous file.
    ///
    /// # Errors
    /// - `Error::InvalidPageSize` if the file uses another page size
    pub fn register_file(&self, file: Arc<HeapFile>) -> Result<()> {
        if file.page_size() != self.config.page_size {
            return Err(Error::InvalidPageSize {
                expected: self.config.page_size,
                actual: file.page_size(),
            });
        }

        debug!(table_id = %file.id(), path = %file.path().display(), "registered heap file");
        self.files.write().insert(file.id(), file);
        Ok(())
    }

    /// The heap file registered for `table_id`.
    pub fn file(&self, table_id: TableId) -> Result<Arc<HeapFile>> {
        self.files
            .read()
            .get(&table_id)
            .cloned()
            .ok_or(Error::UnknownTable(table_id))
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    // ========================================================================
    // Public API: Fetch pages
    // ========================================================================

    /// Lock `page_id` for `tid` in `mode` and return a guard on the cached page.
    ///
    /// See [`fetch_page_read`](Self::fetch_page_read) and
    /// [`fetch_page_write`](Self::fetch_page_write).
    pub fn get_page(
        &self,
        tid: TransactionId,
        page_id: PageId,
        mode: LockMode,
    ) -> Result<PageGuard<'_>> {
        match mode {
            LockMode::Shared => self.fetch_page_read(tid, page_id).map(PageGuard::Read),
            LockMode::Exclusive => self.fetch_page_write(tid, page_id).map(PageGuard::Write),
        }
    }

    /// Lock `page_id` shared for `tid` and return a read guard on it.
    ///
    /// Blocks while another transaction holds the page exclusively. If the
    /// page is not cached it is loaded from its heap file, possibly evicting
    /// another page.
    ///
    /// # Errors
    /// - `Error::LockTimeout` if the lock is not granted within the timeout
    /// - `Error::UnknownTable` if no heap file is registered for the page
    /// - `Error::PageNotFound` if the page doesn't exist on disk
    /// - `Error::PoolExhausted` if no frame can be evicted
    pub fn fetch_page_read(&self, tid: TransactionId, page_id: PageId) -> Result<PageReadGuard<'_>> {
        self.acquire_lock(tid, page_id, LockMode::Shared)?;
        let frame_id = self.fetch_frame(page_id)?;

        match RwLockReadGuard::try_map(self.frames[frame_id.0].page(), Option::as_ref) {
            Ok(page) => Ok(PageReadGuard::new(self, frame_id, page_id, page)),
            Err(_) => {
                self.unpin_page_internal(frame_id, None);
                Err(Error::PageNotFound(page_id))
            }
        }
    }

    /// Lock `page_id` exclusively for `tid` and return a write guard on it.
    ///
    /// A shared lock `tid` holds alone is upgraded. The caller must not hold a
    /// read guard on the same page while upgrading.
    ///
    /// # Errors
    /// Same as [`fetch_page_read`](Self::fetch_page_read).
    pub fn fetch_page_write(
        &self,
        tid: TransactionId,
        page_id: PageId,
    ) -> Result<PageWriteGuard<'_>> {
        self.acquire_lock(tid, page_id, LockMode::Exclusive)?;
        let frame_id = self.fetch_frame(page_id)?;

        match RwLockWriteGuard::try_map(self.frames[frame_id.0].page_mut(), Option::as_mut) {
            Ok(page) => Ok(PageWriteGuard::new(self, frame_id, page_id, tid, page)),
            Err(_) => {
                self.unpin_page_internal(frame_id, None);
                Err(Error::PageNotFound(page_id))
            }
        }
    }

    // ========================================================================
    // Public API: Tuple operations
    // ========================================================================

    /// Insert `tuple` into table `table_id` on behalf of `tid`.
    ///
    /// Returns the ids of the pages that were modified.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: TableId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageId>> {
        self.file(table_id)?.insert_tuple(self, tid, tuple)
    }

    /// Delete `tuple` from the table its record id points into.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &mut Tuple) -> Result<Vec<PageId>> {
        let rid = tuple
            .record_id()
            .ok_or_else(|| Error::InvalidRecord("tuple has no record id".to_string()))?;
        self.file(rid.page_id.table_id)?.delete_tuple(self, tid, tuple)
    }

    /// Overwrite the stored tuple at `tuple`'s record id.
    pub fn update_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<Vec<PageId>> {
        let rid = tuple
            .record_id()
            .ok_or_else(|| Error::InvalidRecord("tuple has no record id".to_string()))?;
        self.file(rid.page_id.table_id)?.update_tuple(self, tid, tuple)
    }

    // ========================================================================
    // Public API: Flush and discard
    // ========================================================================

    /// Write a specific page to its heap file if it is cached and dirty.
    ///
    /// The calling thread must not hold a write guard on the page.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        match self.resident_frame(page_id) {
            Some(frame_id) => self.flush_frame(frame_id),
            None => Ok(()),
        }
    }

    /// Write every dirty page to disk.
    ///
    /// This ignores transaction boundaries and is meant for shutdown and tests.
    pub fn flush_all_pages(&self) -> Result<()> {
        let frame_ids: Vec<FrameId> = self.page_table.read().values().copied().collect();

        for frame_id in frame_ids {
            self.flush_frame(frame_id)?;
        }

        Ok(())
    }

    /// Write every page last dirtied by `tid` to disk.
    pub fn flush_pages(&self, tid: TransactionId) -> Result<()> {
        for frame_id in self.frames_dirtied_by(tid) {
            self.flush_frame(frame_id)?;
        }
        Ok(())
    }

    /// Drop a page from the cache without writing it back.
    ///
    /// Unsaved changes to the page are lost. Does nothing if the page is not
    /// cached.
    ///
    /// # Errors
    /// - `Error::PagePinned` if a guard on the page is still alive
    pub fn discard_page(&self, page_id: PageId) -> Result<()> {
        let _load = self.load_latch.lock();

        let frame_id = {
            let mut pt = self.page_table.write();
            let Some(&frame_id) = pt.get(&page_id) else {
                return Ok(());
            };
            if self.frames[frame_id.0].is_pinned() {
                return Err(Error::PagePinned(page_id));
            }
            pt.remove(&page_id);
            frame_id
        };

        self.reset_frame(frame_id);
        self.free_list.lock().push(frame_id);

        debug!(%page_id, %frame_id, "discarded page");
        Ok(())
    }

    // ========================================================================
    // Public API: Transactions and locks
    // ========================================================================

    /// Finish transaction `tid`.
    ///
    /// On commit every page dirtied by `tid` is written to disk. On abort each
    /// such page is restored from its heap file; a page that was never written
    /// to disk is reset to an empty page. Afterwards all of `tid`'s locks are
    /// released.
    ///
    /// The calling thread must have dropped all of its page guards.
    ///
    /// # Errors
    /// I/O errors while flushing or re-reading pages. The transaction keeps
    /// its locks in that case.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> Result<()> {
        let dirty = self.frames_dirtied_by(tid);

        for &frame_id in &dirty {
            if commit {
                self.flush_frame(frame_id)?;
            } else {
                self.revert_frame(frame_id, tid)?;
            }
        }

        self.lock_manager.release_all(tid);

        debug!(%tid, commit, pages = dirty.len(), "transaction complete");
        Ok(())
    }

    /// Release `tid`'s lock on `page_id` before the transaction completes.
    ///
    /// This breaks two-phase locking; only use it for pages the transaction
    /// did not modify.
    pub fn release_lock(&self, tid: TransactionId, page_id: PageId) {
        self.lock_manager.release(tid, page_id);
    }

    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.lock_manager.holds_lock(tid, page_id)
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn config(&self) -> &BufferPoolConfig {
        &self.config
    }

    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    /// Number of frames in the pool.
    pub fn capacity(&self) -> usize {
        self.frames.len()
    }

    /// Number of pages currently cached.
    pub fn page_count(&self) -> usize {
        self.page_table.read().len()
    }

    pub fn free_frame_count(&self) -> usize {
        self.free_list.lock().len()
    }

    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.page_table.read().contains_key(&page_id)
    }

    /// Whether `page_id` is cached with changes not yet written to disk.
    pub fn is_dirty(&self, page_id: PageId) -> bool {
        self.resident_frame(page_id)
            .is_some_and(|fid| self.frames[fid.0].is_dirty())
    }

    // ========================================================================
    // Internal: Called by page guards on drop
    // ========================================================================

    /// Unpin a frame, first marking it dirty for `dirtied_by` if given.
    pub(crate) fn unpin_page_internal(&self, frame_id: FrameId, dirtied_by: Option<TransactionId>) {
        let frame = &self.frames[frame_id.0];

        if let Some(tid) = dirtied_by {
            frame.mark_dirty(tid);
        }
        frame.unpin();
    }

    // ========================================================================
    // Internal: Locking
    // ========================================================================

    /// Poll the lock manager until the lock is granted or the timeout passes.
    fn acquire_lock(&self, tid: TransactionId, page_id: PageId, mode: LockMode) -> Result<()> {
        let start = Instant::now();
        let mut waited = false;

        loop {
            if self.lock_manager.acquire(tid, page_id, mode) {
                return Ok(());
            }

            if !waited {
                waited = true;
                self.stats.lock_waits.fetch_add(1, Ordering::Relaxed);
                trace!(%tid, %page_id, %mode, "waiting for lock");
            }

            if let Some(timeout) = self.config.lock_timeout {
                if start.elapsed() >= timeout {
                    self.stats.lock_timeouts.fetch_add(1, Ordering::Relaxed);
                    warn!(%tid, %page_id, %mode, ?timeout, "lock wait timed out");
                    return Err(Error::LockTimeout { tid, page_id });
                }
            }

            thread::sleep(self.config.lock_retry_interval);
        }
    }

    // ========================================================================
    // Internal: Core fetch logic
    // ========================================================================

    fn resident_frame(&self, page_id: PageId) -> Option<FrameId> {
        self.page_table.read().get(&page_id).copied()
    }

    /// Pin `page_id`'s frame if it is cached.
    ///
    /// Pinning under the page table latch keeps the frame from being evicted
    /// between lookup and pin.
    fn pin_resident(&self, page_id: PageId) -> Option<FrameId> {
        let frame_id = {
            let pt = self.page_table.read();
            let frame_id = *pt.get(&page_id)?;
            self.frames[frame_id.0].pin();
            frame_id
        };

        self.replacer.lock().record_access(frame_id);
        self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
        Some(frame_id)
    }

    /// Bring `page_id` into the pool and pin it, returning its frame.
    fn fetch_frame(&self, page_id: PageId) -> Result<FrameId> {
        // Fast path: cache hit without touching the load latch
        if let Some(frame_id) = self.pin_resident(page_id) {
            return Ok(frame_id);
        }

        let _load = self.load_latch.lock();

        // Another thread may have loaded it while we waited
        if let Some(frame_id) = self.pin_resident(page_id) {
            return Ok(frame_id);
        }

        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
        let page = self.load_page(page_id)?;

        let frame_id = self.get_free_frame()?;
        let frame = &self.frames[frame_id.0];

        *frame.page_mut() = Some(page);
        frame.set_page_id(Some(page_id));
        frame.clear_dirty();
        frame.pin();

        self.page_table.write().insert(page_id, frame_id);
        self.replacer.lock().record_access(frame_id);

        trace!(%page_id, %frame_id, "loaded page");
        Ok(frame_id)
    }

    /// Read `page_id` from its heap file.
    fn load_page(&self, page_id: PageId) -> Result<HeapPage> {
        let page = self
            .file(page_id.table_id)?
            .read_page(page_id)?
            .ok_or(Error::PageNotFound(page_id))?;

        self.stats.pages_read.fetch_add(1, Ordering::Relaxed);
        Ok(page)
    }

    // ========================================================================
    // Internal: Frame allocation and eviction
    // ========================================================================

    /// Get a free frame, evicting if necessary. Caller holds the load latch.
    fn get_free_frame(&self) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.lock().pop() {
            return Ok(frame_id);
        }

        self.evict_page()
    }

    fn is_evictable(&self, frame_id: FrameId) -> bool {
        let frame = &self.frames[frame_id.0];
        !frame.is_pinned()
            && !frame
                .page_id()
                .is_some_and(|pid| self.lock_manager.is_exclusively_locked(pid))
    }

    /// Evict the least recently used evictable page and return its frame.
    ///
    /// A dirty victim is flushed first. If that flush fails the page stays
    /// cached and dirty.
    fn evict_page(&self) -> Result<FrameId> {
        loop {
            let frame_id = self
                .replacer
                .lock()
                .victim(|fid| self.is_evictable(fid))
                .ok_or(Error::PoolExhausted)?;

            let frame = &self.frames[frame_id.0];
            let Some(page_id) = frame.page_id() else {
                self.replacer.lock().remove(frame_id);
                return Ok(frame_id);
            };

            if frame.is_dirty() {
                self.flush_frame(frame_id)?;
            }

            {
                let mut pt = self.page_table.write();
                // Pinned or written again while we flushed; pick another one
                if frame.is_pinned() || frame.is_dirty() {
                    continue;
                }
                pt.remove(&page_id);
            }

            self.reset_frame(frame_id);
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);

            debug!(%page_id, %frame_id, "evicted page");
            return Ok(frame_id);
        }
    }

    /// Clear a frame that is no longer in the page table.
    fn reset_frame(&self, frame_id: FrameId) {
        let frame = &self.frames[frame_id.0];
        *frame.page_mut() = None;
        frame.set_page_id(None);
        frame.clear_dirty();
        self.replacer.lock().remove(frame_id);
    }

    // ========================================================================
    // Internal: Write-back and revert
    // ========================================================================

    fn frames_dirtied_by(&self, tid: TransactionId) -> Vec<FrameId> {
        self.page_table
            .read()
            .values()
            .copied()
            .filter(|fid| self.frames[fid.0].dirtied_by() == Some(tid))
            .collect()
    }

    /// Write a frame to disk if dirty.
    fn flush_frame(&self, frame_id: FrameId) -> Result<()> {
        let frame = &self.frames[frame_id.0];

        // Hold the page read latch across the write so no writer can slip a
        // change in between the write and clearing the dirty mark.
        let guard = frame.page();
        let Some(page) = guard.as_ref() else {
            return Ok(());
        };
        if !frame.is_dirty() {
            return Ok(());
        }

        self.file(page.id().table_id)?.write_page(page)?;
        frame.clear_dirty();
        self.stats.pages_written.fetch_add(1, Ordering::Relaxed);

        trace!(page_id = %page.id(), "flushed page");
        Ok(())
    }

    /// Replace a frame's page with its on-disk image.
    fn revert_frame(&self, frame_id: FrameId, tid: TransactionId) -> Result<()> {
        let frame = &self.frames[frame_id.0];
        let mut guard = frame.page_mut();
        let Some(page) = guard.as_mut() else {
            return Ok(());
        };

        let page_id = page.id();
        let file = self.file(page_id.table_id)?;
        *page = match file.read_page(page_id)? {
            Some(on_disk) => on_disk,
            None => HeapPage::empty(page_id, file.tuple_desc().clone(), file.page_size()),
        };
        frame.clear_dirty();
        self.stats.pages_reverted.fetch_add(1, Ordering::Relaxed);

        trace!(%tid, %page_id, "reverted page");
        Ok(())
    }
}
