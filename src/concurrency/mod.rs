//! Transaction identity and page-level two-phase locking.
//!
//! - [`TransactionId`] - Opaque, process-unique transaction token
//! - [`LockMode`] / [`Lock`] - Shared or exclusive hold on a page
//! - [`LockManager`] - Non-blocking lock table; callers retry on denial

mod lock;
mod lock_manager;
mod transaction;

pub use lock::{Lock, LockMode};
pub use lock_manager::LockManager;
pub use transaction::TransactionId;
