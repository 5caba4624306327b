//! # Basalt Storage Engine
//! The storage engine for the Cairn database.
//! This crate manages the on-disk and in-memory representation of data and
//! coordinates concurrent transactional access to it.

/// The buffer pool.
pub mod buffer_pool;
/// The table registry.
pub mod catalog;
/// Error types shared across the engine.
pub mod error;
/// The heap file, a page-oriented table store.
pub mod heap_file;
/// The lock manager for concurrency control.
pub mod lock_manager;
/// The page layout and data structures.
pub mod page;
/// The LRU page cache backing the buffer pool.
pub mod page_cache;
/// Transaction identifiers.
pub mod transaction;
/// Tuples, fields, and schemas.
pub mod tuple;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub use buffer_pool::{BufferPool, Permissions};
pub use error::{DbError, Result};
pub use page::{HeapPage, PageId, SharedPage};
pub use transaction::TransactionId;

/// The default size of a single page in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// A unique identifier for a table registered in the catalog.
pub type TableId = u32;

static PAGE_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_PAGE_SIZE);

/// The current size of a single page in bytes.
pub fn page_size() -> usize {
    PAGE_SIZE.load(Ordering::Acquire)
}

/// Overrides the page size. For tests only; pages written under a different
/// size become unreadable.
pub fn set_page_size(size: usize) {
    PAGE_SIZE.store(size, Ordering::Release);
}

/// Restores the default page size. For tests only.
pub fn reset_page_size() {
    PAGE_SIZE.store(DEFAULT_PAGE_SIZE, Ordering::Release);
}

pub fn debug_logs_enabled() -> bool {
    std::env::var_os("BASALT_DEBUG_LOG").is_some()
}

#[macro_export]
macro_rules! basalt_debug_log {
    ($($arg:tt)*) => {
        if $crate::debug_logs_enabled() {
            println!($($arg)*);
        }
    };
}

pub(crate) fn lock_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn read_recover<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn write_recover<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
