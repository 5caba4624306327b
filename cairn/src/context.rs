use std::sync::Arc;

use basalt::buffer_pool::{BufferPool, DEFAULT_PAGES};
use basalt::catalog::Catalog;

/// The shared runtime of one database instance: the catalog and the buffer
/// pool built over it. Constructed once and passed explicitly to whatever
/// needs it.
pub struct Context {
    catalog: Arc<Catalog>,
    buffer_pool: Arc<BufferPool>,
}

impl Context {
    /// A context whose pool caches the default number of pages.
    pub fn new() -> Self {
        Self::with_pool_capacity(DEFAULT_PAGES)
    }

    /// A context with an explicit pool capacity; small capacities exercise
    /// eviction.
    pub fn with_pool_capacity(capacity: usize) -> Self {
        let catalog = Arc::new(Catalog::new());
        let buffer_pool = Arc::new(BufferPool::new(capacity, Arc::clone(&catalog)));
        Context {
            catalog,
            buffer_pool,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.buffer_pool
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
