use std::num::NonZeroUsize;

use lru::LruCache;

use crate::page::{PageId, SharedPage};

/// A bounded map from page id to cached page with LRU recency tracking.
/// Not independently thread-safe; the buffer pool serializes access to it.
pub struct PageCache {
    entries: LruCache<PageId, SharedPage>,
}

impl PageCache {
    /// A cache holding at most `capacity` pages (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        PageCache {
            entries: LruCache::new(capacity),
        }
    }

    /// Returns the cached page and promotes it to most recently used.
    pub fn get(&mut self, pid: &PageId) -> Option<SharedPage> {
        self.entries.get(pid).cloned()
    }

    /// Inserts or refreshes an entry. On a full cache this drops the least
    /// recently used entry and inserts the new one in a single step. The
    /// buffer pool evicts ahead of every insert, so that path only runs for
    /// callers that bypass it.
    pub fn put(&mut self, pid: PageId, page: SharedPage) {
        self.entries.put(pid, page);
    }

    pub fn remove(&mut self, pid: &PageId) -> Option<SharedPage> {
        self.entries.pop(pid)
    }

    pub fn contains(&self, pid: &PageId) -> bool {
        self.entries.contains(pid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Entries from most to least recently used; the order flush and reload
    /// walk the cache in.
    pub fn iter(&self) -> impl Iterator<Item = (&PageId, &SharedPage)> {
        self.entries.iter()
    }

    /// Entries from least to most recently used; the order eviction scans.
    pub fn rev_iter(&self) -> impl Iterator<Item = (&PageId, &SharedPage)> {
        self.entries.iter().rev()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::HeapPage;
    use crate::tuple::{FieldType, Schema};
    use serial_test::serial;
    use std::sync::{Arc, RwLock};

    fn page(n: u32) -> (PageId, SharedPage) {
        let pid = PageId::new(1, n);
        let schema = Schema::from_types(&[FieldType::Int]);
        (pid, Arc::new(RwLock::new(HeapPage::empty(pid, schema))))
    }

    fn lru_order(cache: &PageCache) -> Vec<u32> {
        cache.rev_iter().map(|(pid, _)| pid.page_no).collect()
    }

    #[test]
    #[serial]
    fn get_promotes_to_most_recently_used() {
        let mut cache = PageCache::new(3);
        for n in 0..3 {
            let (pid, p) = page(n);
            cache.put(pid, p);
        }
        assert_eq!(lru_order(&cache), vec![0, 1, 2]);

        cache.get(&PageId::new(1, 0));
        assert_eq!(lru_order(&cache), vec![1, 2, 0]);
    }

    #[test]
    #[serial]
    fn put_refreshes_an_existing_entry() {
        let mut cache = PageCache::new(3);
        for n in 0..3 {
            let (pid, p) = page(n);
            cache.put(pid, p);
        }
        let (pid, replacement) = page(0);
        cache.put(pid, replacement);
        assert_eq!(cache.len(), 3);
        assert_eq!(lru_order(&cache), vec![1, 2, 0]);
    }

    #[test]
    #[serial]
    fn put_on_a_full_cache_evicts_the_lru_entry_and_inserts() {
        let mut cache = PageCache::new(2);
        let (pid0, p0) = page(0);
        let (pid1, p1) = page(1);
        let (pid2, p2) = page(2);
        cache.put(pid0, p0);
        cache.put(pid1, p1);
        assert!(cache.is_full());

        cache.put(pid2, p2);
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&pid0));
        assert!(cache.contains(&pid1));
        assert!(cache.contains(&pid2));
    }

    #[test]
    #[serial]
    fn remove_frees_capacity() {
        let mut cache = PageCache::new(2);
        let (pid0, p0) = page(0);
        let (pid1, p1) = page(1);
        cache.put(pid0, p0);
        cache.put(pid1, p1);

        assert!(cache.remove(&pid0).is_some());
        assert!(cache.remove(&pid0).is_none());
        assert!(!cache.is_full());
        assert_eq!(cache.len(), 1);
    }
}
