//! Manages the buffer pool, a bounded cache of heap pages shared by every
//! transaction.
//!
//! Every page fetch is gated through the lock manager. Eviction is no-steal:
//! only clean pages leave the cache. Commit forces a transaction's dirty
//! pages to disk; abort restores their on-disk images.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use rand::Rng;

use crate::catalog::Catalog;
use crate::error::{DbError, Result};
use crate::lock_manager::{LockManager, LockMode};
use crate::lock_recover;
use crate::page::{PageId, SharedPage};
use crate::page_cache::PageCache;
use crate::transaction::TransactionId;
use crate::tuple::Tuple;
use crate::TableId;

/// Default number of pages the pool holds.
pub const DEFAULT_PAGES: usize = 50;

/// Bounds of the randomized per-request lock timeout, in milliseconds:
/// lower inclusive, upper exclusive.
const LOCK_TIMEOUT_MIN_MS: u64 = 1000;
const LOCK_TIMEOUT_MAX_MS: u64 = 3000;

/// The access level a transaction requests on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permissions {
    ReadOnly,
    ReadWrite,
}

pub struct BufferPool {
    catalog: Arc<Catalog>,
    cache: Mutex<PageCache>,
    lock_manager: LockManager,
}

impl BufferPool {
    /// Creates a pool that caches up to `capacity` pages.
    pub fn new(capacity: usize, catalog: Arc<Catalog>) -> Self {
        BufferPool {
            catalog,
            cache: Mutex::new(PageCache::new(capacity)),
            lock_manager: LockManager::new(),
        }
    }

    /// Fetches a page on behalf of `tid`, locking it first. `ReadOnly`
    /// requests take a shared lock, `ReadWrite` an exclusive one. Blocks
    /// until the lock is granted or a randomized timeout in [1000, 3000) ms
    /// expires, then fails with `TransactionAborted`.
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permissions,
    ) -> Result<SharedPage> {
        let mode = match perm {
            Permissions::ReadOnly => LockMode::Shared,
            Permissions::ReadWrite => LockMode::Exclusive,
        };
        let timeout = Duration::from_millis(
            rand::thread_rng().gen_range(LOCK_TIMEOUT_MIN_MS..LOCK_TIMEOUT_MAX_MS),
        );
        if !self.lock_manager.try_acquire(pid, tid, mode, timeout) {
            crate::basalt_debug_log!("[BufferPool::get_page] {} timed out locking {}", tid, pid);
            return Err(DbError::TransactionAborted);
        }
        let mut cache = lock_recover(&self.cache);
        if let Some(page) = cache.get(&pid) {
            return Ok(page);
        }
        self.load_page_locked(&mut cache, pid)
    }

    /// Loads a page from its heap file into the cache, evicting first when
    /// the cache is full.
    fn load_page_locked(&self, cache: &mut PageCache, pid: PageId) -> Result<SharedPage> {
        crate::basalt_debug_log!("[BufferPool::load_page] miss on {}", pid);
        let file = self.catalog.file(pid.table_id)?;
        let page = Arc::new(RwLock::new(file.read_page(pid)?));
        if cache.is_full() {
            Self::evict_page_locked(cache)?;
        }
        cache.put(pid, Arc::clone(&page));
        Ok(page)
    }

    /// Discards the least recently used clean page. Dirty pages are never
    /// evicted; a cache full of them is an error.
    fn evict_page_locked(cache: &mut PageCache) -> Result<()> {
        let victim = cache
            .rev_iter()
            .find(|(_, page)| page.read().unwrap().dirtier().is_none())
            .map(|(pid, _)| *pid);
        match victim {
            Some(pid) => {
                crate::basalt_debug_log!("[BufferPool::evict_page] evicting {}", pid);
                cache.remove(&pid);
                Ok(())
            }
            None => Err(DbError::Db("All pages are dirty in buffer pool".to_string())),
        }
    }

    /// Makes room for `pid` if needed, then caches `page` under it,
    /// replacing any prior entry.
    fn cache_page_locked(cache: &mut PageCache, pid: PageId, page: SharedPage) -> Result<()> {
        if cache.is_full() && !cache.contains(&pid) {
            Self::evict_page_locked(cache)?;
        }
        cache.put(pid, page);
        Ok(())
    }

    /// Adds a tuple to the table. The heap file re-enters `get_page` with
    /// `ReadWrite` to lock the target page; every page the insert touched is
    /// stamped dirty with `tid` and re-cached.
    pub fn insert_tuple(&self, tid: TransactionId, table_id: TableId, tuple: Tuple) -> Result<()> {
        let file = self.catalog.file(table_id)?;
        let pages = file.insert_tuple(self, tid, tuple)?;
        let mut cache = lock_recover(&self.cache);
        for page in pages {
            page.write().unwrap().mark_dirty(Some(tid));
            let pid = page.read().unwrap().id();
            Self::cache_page_locked(&mut cache, pid, page)?;
        }
        Ok(())
    }

    /// Removes the tuple named by its record id. Dirtied pages are written
    /// through to disk immediately and still stamped dirty.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<()> {
        let record_id = tuple
            .record_id()
            .ok_or_else(|| DbError::Db("tuple has no record id to delete".to_string()))?;
        let file = self.catalog.file(record_id.pid.table_id)?;
        let pages = file.delete_tuple(self, tid, tuple)?;
        let mut cache = lock_recover(&self.cache);
        for page in pages {
            file.write_page(&page.read().unwrap())?;
            page.write().unwrap().mark_dirty(Some(tid));
            let pid = page.read().unwrap().id();
            Self::cache_page_locked(&mut cache, pid, page)?;
        }
        Ok(())
    }

    /// Commits or aborts the transaction. Commit forces its dirty pages to
    /// disk; abort restores their on-disk images. Page I/O failures are
    /// reported but never keep the locks from being released.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) {
        let outcome = if commit {
            self.flush_pages(tid)
        } else {
            self.reload_pages(tid)
        };
        if let Err(err) = outcome {
            eprintln!("error completing transaction {}: {}", tid, err);
        }
        self.lock_manager.unlock_all(tid);
    }

    /// Writes every page dirtied by `tid` through to its heap file and
    /// clears the dirty stamp.
    pub fn flush_pages(&self, tid: TransactionId) -> Result<()> {
        let cache = lock_recover(&self.cache);
        for (_, page) in cache.iter() {
            if page.read().unwrap().dirtier() == Some(tid) {
                self.flush_page(page)?;
            }
        }
        Ok(())
    }

    /// Writes every dirty page through to disk. Undermines no-steal while
    /// writers are still running; callers use it at quiescent points.
    pub fn flush_all_pages(&self) -> Result<()> {
        let cache = lock_recover(&self.cache);
        for (_, page) in cache.iter() {
            if page.read().unwrap().dirtier().is_some() {
                self.flush_page(page)?;
            }
        }
        Ok(())
    }

    fn flush_page(&self, page: &SharedPage) -> Result<()> {
        let pid = page.read().unwrap().id();
        crate::basalt_debug_log!("[BufferPool::flush_page] flushing {}", pid);
        let file = self.catalog.file(pid.table_id)?;
        file.write_page(&page.read().unwrap())?;
        page.write().unwrap().mark_dirty(None);
        Ok(())
    }

    /// Discards and reloads every page dirtied by `tid`, restoring the
    /// images the transaction started from.
    fn reload_pages(&self, tid: TransactionId) -> Result<()> {
        let mut cache = lock_recover(&self.cache);
        let stale: Vec<PageId> = cache
            .iter()
            .filter(|(_, page)| page.read().unwrap().dirtier() == Some(tid))
            .map(|(pid, _)| *pid)
            .collect();
        for pid in stale {
            crate::basalt_debug_log!("[BufferPool::reload_pages] restoring {}", pid);
            cache.remove(&pid);
            self.load_page_locked(&mut cache, pid)?;
        }
        Ok(())
    }

    /// Drops the page from the cache without touching its locks or the disk.
    pub fn discard_page(&self, pid: PageId) {
        lock_recover(&self.cache).remove(&pid);
    }

    /// Whether `tid` holds any lock on the page.
    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.lock_manager.holds(pid, tid)
    }

    /// Releases one page lock without completing the transaction. This
    /// breaks two-phase locking; only callers that never read the page's
    /// data may use it.
    pub fn unsafe_release_page(&self, tid: TransactionId, pid: PageId) {
        self.lock_manager.release(pid, tid);
    }

    /// Number of pages currently cached.
    pub fn cached_pages(&self) -> usize {
        lock_recover(&self.cache).len()
    }

    /// Whether the page is currently cached.
    pub fn contains_page(&self, pid: PageId) -> bool {
        lock_recover(&self.cache).contains(&pid)
    }
}
