//! Lock Manager - the page-level lock table.
//!
//! The [`LockManager`] grants shared and exclusive page locks for strict
//! two-phase locking. It never blocks: a conflicting request is answered with
//! `false` and the caller decides whether to retry or abort.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tracing::trace;

use crate::common::PageId;

use super::{Lock, LockMode, TransactionId};

/// Lock table state, always accessed under one mutex.
#[derive(Default)]
struct LockTable {
    /// Holders per page. A row is either one exclusive lock or any number of
    /// shared locks. Empty rows are removed.
    locks: HashMap<PageId, Vec<Lock>>,

    /// Reverse index so `release_all` does not scan the whole table.
    pages_by_txn: HashMap<TransactionId, HashSet<PageId>>,
}

impl LockTable {
    fn grant(&mut self, tid: TransactionId, page_id: PageId, mode: LockMode) {
        self.locks
            .entry(page_id)
            .or_default()
            .push(Lock::new(mode, tid));
        self.pages_by_txn.entry(tid).or_default().insert(page_id);
    }

    fn remove(&mut self, tid: TransactionId, page_id: PageId) -> bool {
        let Some(holders) = self.locks.get_mut(&page_id) else {
            return false;
        };
        let Some(pos) = holders.iter().position(|l| l.tid == tid) else {
            return false;
        };

        holders.remove(pos);
        if holders.is_empty() {
            self.locks.remove(&page_id);
        }
        true
    }
}

/// Outcome of a lock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Grant,
    Upgrade,
    AlreadyHeld,
    Deny,
}

/// Per-page shared/exclusive lock table.
///
/// # Thread Safety
/// Every method runs its whole read-modify-write under a single
/// `parking_lot::Mutex`; the critical sections are short and never do I/O.
///
/// # Deadlocks
/// There is no deadlock detection. Two transactions waiting on each other's
/// pages wait until one of them gives up; the
/// [`BufferPool`](crate::buffer::BufferPool) bounds that wait with its lock
/// timeout.
///
/// # Example
/// ```
/// use heapdb::{LockManager, LockMode, PageId, TableId, TransactionId};
///
/// let lm = LockManager::new();
/// let (t1, t2) = (TransactionId::new(), TransactionId::new());
/// let pid = PageId::new(TableId(1), 0);
///
/// assert!(lm.acquire(t1, pid, LockMode::Shared));
/// assert!(lm.acquire(t2, pid, LockMode::Shared));
/// assert!(!lm.acquire(t1, pid, LockMode::Exclusive));
///
/// lm.release(t2, pid);
/// assert!(lm.acquire(t1, pid, LockMode::Exclusive));
/// ```
#[derive(Default)]
pub struct LockManager {
    table: Mutex<LockTable>,
}

impl LockManager {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to lock `page_id` in `mode` for `tid`.
    ///
    /// Returns `true` if the lock is granted (or was already held in a mode
    /// that covers the request). Returns `false` on conflict, in which case
    /// the table is left untouched.
    ///
    /// A shared lock held alone by `tid` is upgraded to exclusive in place.
    pub fn acquire(&self, tid: TransactionId, page_id: PageId, mode: LockMode) -> bool {
        let mut table = self.table.lock();

        let holders = table.locks.get(&page_id).map(Vec::as_slice).unwrap_or(&[]);
        let decision = match holders {
            [] => Decision::Grant,
            [only] if only.tid == tid => {
                if only.mode.covers(mode) {
                    Decision::AlreadyHeld
                } else {
                    Decision::Upgrade
                }
            }
            [only] => {
                if only.mode == LockMode::Shared && mode == LockMode::Shared {
                    Decision::Grant
                } else {
                    Decision::Deny
                }
            }
            // Several holders: all shared.
            many => {
                if mode == LockMode::Exclusive {
                    Decision::Deny
                } else if many.iter().any(|l| l.tid == tid) {
                    Decision::AlreadyHeld
                } else {
                    Decision::Grant
                }
            }
        };

        match decision {
            Decision::Grant => table.grant(tid, page_id, mode),
            Decision::Upgrade => {
                if let Some(lock) = table.locks.get_mut(&page_id).and_then(|h| h.first_mut()) {
                    lock.mode = LockMode::Exclusive;
                }
            }
            Decision::AlreadyHeld | Decision::Deny => {}
        }

        let granted = decision != Decision::Deny;
        trace!(%tid, %page_id, %mode, ?decision, "lock request");
        granted
    }

    /// Release `tid`'s lock on `page_id`. Releasing an unheld lock is a no-op.
    pub fn release(&self, tid: TransactionId, page_id: PageId) {
        let mut table = self.table.lock();

        if table.remove(tid, page_id) {
            if let Some(pages) = table.pages_by_txn.get_mut(&tid) {
                pages.remove(&page_id);
                if pages.is_empty() {
                    table.pages_by_txn.remove(&tid);
                }
            }
            trace!(%tid, %page_id, "lock released");
        }
    }

    /// Release every lock held by `tid`. Used at commit and abort.
    pub fn release_all(&self, tid: TransactionId) {
        let mut table = self.table.lock();

        let Some(pages) = table.pages_by_txn.remove(&tid) else {
            return;
        };
        for page_id in &pages {
            table.remove(tid, *page_id);
        }
        trace!(%tid, count = pages.len(), "released all locks");
    }

    /// Whether `tid` holds any lock on `page_id`.
    ///
    /// Returns `false` for pages nobody has locked, so it is safe to call
    /// speculatively.
    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.lock_mode(tid, page_id).is_some()
    }

    /// The mode in which `tid` holds `page_id`, if any.
    pub fn lock_mode(&self, tid: TransactionId, page_id: PageId) -> Option<LockMode> {
        let table = self.table.lock();
        table
            .locks
            .get(&page_id)?
            .iter()
            .find(|l| l.tid == tid)
            .map(|l| l.mode)
    }

    /// Whether any transaction holds `page_id` exclusively.
    pub fn is_exclusively_locked(&self, page_id: PageId) -> bool {
        let table = self.table.lock();
        table
            .locks
            .get(&page_id)
            .is_some_and(|holders| holders.iter().any(|l| l.mode == LockMode::Exclusive))
    }

    /// Current holders of `page_id`.
    pub fn holders(&self, page_id: PageId) -> Vec<Lock> {
        let table = self.table.lock();
        table.locks.get(&page_id).cloned().unwrap_or_default()
    }

    /// Every page `tid` currently holds a lock on, in page order.
    pub fn locked_pages(&self, tid: TransactionId) -> Vec<PageId> {
        let table = self.table.lock();
        let mut pages: Vec<PageId> = table
            .pages_by_txn
            .get(&tid)
            .map(|pages| pages.iter().copied().collect())
            .unwrap_or_default();
        pages.sort();
        pages
    }
}
