//! Manages page locks for concurrency control.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use crate::lock_recover;
use crate::page::PageId;
use crate::transaction::TransactionId;

/// How long a denied request waits before re-polling the lock table.
const RETRY_INTERVAL: Duration = Duration::from_millis(1);

/// Represents the two modes of locking a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// The holders of one page's lock. A page is either held exclusively by a
/// single transaction or shared by any number of them.
#[derive(Debug)]
enum PageLockState {
    Shared(HashSet<TransactionId>),
    Exclusive(TransactionId),
}

/// The main lock manager struct.
#[derive(Debug, Default)]
pub struct LockManager {
    /// Maps each locked page to its current holders.
    lock_table: Mutex<HashMap<PageId, PageLockState>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Polls for the lock until it is granted or `timeout` elapses, then
    /// reports failure. There is no waits-for graph: two transactions that
    /// block each other both run out their timeouts, and the callers abort.
    pub fn try_acquire(
        &self,
        pid: PageId,
        tid: TransactionId,
        mode: LockMode,
        timeout: Duration,
    ) -> bool {
        let start = Instant::now();
        loop {
            if start.elapsed() >= timeout {
                return false;
            }
            if self.acquire_once(pid, tid, mode) {
                return true;
            }
            thread::sleep(RETRY_INTERVAL);
        }
    }

    /// A single non-blocking evaluation of the request against the current
    /// holders.
    fn acquire_once(&self, pid: PageId, tid: TransactionId, mode: LockMode) -> bool {
        let mut table = lock_recover(&self.lock_table);
        match table.get_mut(&pid) {
            None => {
                let state = match mode {
                    LockMode::Shared => PageLockState::Shared(HashSet::from([tid])),
                    LockMode::Exclusive => PageLockState::Exclusive(tid),
                };
                table.insert(pid, state);
                return true;
            }
            // An exclusive holder covers any further request of its own.
            Some(PageLockState::Exclusive(holder)) => return *holder == tid,
            Some(PageLockState::Shared(holders)) => {
                if !holders.contains(&tid) {
                    return match mode {
                        LockMode::Shared => {
                            holders.insert(tid);
                            true
                        }
                        LockMode::Exclusive => false,
                    };
                }
                if mode == LockMode::Shared {
                    return true;
                }
                // Holding shared, wanting exclusive: upgrade only as the
                // sole holder.
                if holders.len() > 1 {
                    return false;
                }
            }
        }
        table.insert(pid, PageLockState::Exclusive(tid));
        true
    }

    /// Drops `tid`'s hold on the page. Returns whether anything was held.
    pub fn release(&self, pid: PageId, tid: TransactionId) -> bool {
        let mut table = lock_recover(&self.lock_table);
        let Some(state) = table.get_mut(&pid) else {
            return false;
        };
        let (released, empty) = match state {
            PageLockState::Exclusive(holder) => {
                let held = *holder == tid;
                (held, held)
            }
            PageLockState::Shared(holders) => {
                let held = holders.remove(&tid);
                (held, holders.is_empty())
            }
        };
        if empty {
            table.remove(&pid);
        }
        released
    }

    /// Releases every lock held by the transaction, atomically with respect
    /// to all other lock-table operations.
    pub fn unlock_all(&self, tid: TransactionId) {
        let mut table = lock_recover(&self.lock_table);
        table.retain(|_, state| match state {
            PageLockState::Exclusive(holder) => *holder != tid,
            PageLockState::Shared(holders) => {
                holders.remove(&tid);
                !holders.is_empty()
            }
        });
    }

    /// Whether the transaction currently holds any lock on the page.
    pub fn holds(&self, pid: PageId, tid: TransactionId) -> bool {
        let table = lock_recover(&self.lock_table);
        match table.get(&pid) {
            None => false,
            Some(PageLockState::Exclusive(holder)) => *holder == tid,
            Some(PageLockState::Shared(holders)) => holders.contains(&tid),
        }
    }

    #[cfg(test)]
    fn holder_count(&self, pid: PageId) -> usize {
        let table = lock_recover(&self.lock_table);
        match table.get(&pid) {
            None => 0,
            Some(PageLockState::Exclusive(_)) => 1,
            Some(PageLockState::Shared(holders)) => holders.len(),
        }
    }

    #[cfg(test)]
    fn is_exclusive(&self, pid: PageId) -> bool {
        let table = lock_recover(&self.lock_table);
        matches!(table.get(&pid), Some(PageLockState::Exclusive(_)))
    }
}
