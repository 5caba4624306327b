use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::{DbError, Result};
use crate::heap_file::HeapFile;
use crate::tuple::Schema;
use crate::{read_recover, write_recover, TableId};

/// The table registry: resolves table ids to heap files and schemas.
pub struct Catalog {
    tables: RwLock<HashMap<TableId, Arc<HeapFile>>>,
    names: RwLock<HashMap<String, TableId>>,
    next_table_id: AtomicU32,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog {
            tables: RwLock::new(HashMap::new()),
            names: RwLock::new(HashMap::new()),
            next_table_id: AtomicU32::new(100),
        }
    }

    /// Opens a heap file for `name` at `path` and registers it under a
    /// fresh table id.
    pub fn add_table<P: AsRef<Path>>(
        &self,
        name: &str,
        schema: Schema,
        path: P,
    ) -> Result<TableId> {
        let table_id = self.next_table_id.fetch_add(1, Ordering::SeqCst);
        let file = Arc::new(HeapFile::open(path, table_id, schema)?);
        write_recover(&self.tables).insert(table_id, file);
        write_recover(&self.names).insert(name.to_string(), table_id);
        crate::basalt_debug_log!("[Catalog::add_table] '{}' registered as table {}", name, table_id);
        Ok(table_id)
    }

    /// The heap file backing `table_id`.
    pub fn file(&self, table_id: TableId) -> Result<Arc<HeapFile>> {
        read_recover(&self.tables)
            .get(&table_id)
            .cloned()
            .ok_or(DbError::TableNotFound(table_id))
    }

    pub fn schema(&self, table_id: TableId) -> Result<Schema> {
        Ok(self.file(table_id)?.schema().clone())
    }

    pub fn table_id(&self, name: &str) -> Option<TableId> {
        read_recover(&self.names).get(name).copied()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
