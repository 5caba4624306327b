use std::collections::VecDeque;
use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::buffer_pool::{BufferPool, Permissions};
use crate::error::{DbError, Result};
use crate::lock_recover;
use crate::page::{HeapPage, PageId, SharedPage};
use crate::transaction::TransactionId;
use crate::tuple::{Schema, Tuple};
use crate::{page_size, TableId};

/// A page-oriented table store backed by a single file. Page `n` lives at
/// byte offset `n * page_size`.
pub struct HeapFile {
    file: Mutex<File>,
    /// Serializes tail-page allocation so two inserters cannot create the
    /// same page.
    append: Mutex<()>,
    table_id: TableId,
    schema: Schema,
}

impl HeapFile {
    pub fn open<P: AsRef<Path>>(path: P, table_id: TableId, schema: Schema) -> Result<Self> {
        let path_ref = path.as_ref();
        crate::basalt_debug_log!("[HeapFile::open] table {} at {:?}", table_id, path_ref);
        if let Some(parent) = path_ref.parent() {
            create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path_ref)?;
        Ok(HeapFile {
            file: Mutex::new(file),
            append: Mutex::new(()),
            table_id,
            schema,
        })
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Number of whole pages currently in the backing file.
    pub fn num_pages(&self) -> Result<usize> {
        let file = lock_recover(&self.file);
        let len = file.metadata()?.len();
        Ok((len / page_size() as u64) as usize)
    }

    /// Reads one page from disk. The page must already exist in the file.
    pub fn read_page(&self, pid: PageId) -> Result<HeapPage> {
        crate::basalt_debug_log!("[HeapFile::read_page] {}", pid);
        if pid.table_id != self.table_id {
            return Err(DbError::Db(format!(
                "page {} does not belong to table {}",
                pid, self.table_id
            )));
        }
        let mut file = lock_recover(&self.file);
        let len = file.metadata()?.len();
        let offset = pid.page_no as u64 * page_size() as u64;
        if offset + page_size() as u64 > len {
            return Err(DbError::Db(format!(
                "page {} is beyond the end of the file",
                pid
            )));
        }
        file.seek(SeekFrom::Start(offset))?;
        let mut data = vec![0u8; page_size()];
        file.read_exact(&mut data)?;
        drop(file);
        HeapPage::parse(pid, self.schema.clone(), &data)
    }

    /// Writes one page image to disk and syncs it.
    pub fn write_page(&self, page: &HeapPage) -> Result<()> {
        crate::basalt_debug_log!("[HeapFile::write_page] {}", page.id());
        let data = page.page_data();
        let mut file = lock_recover(&self.file);
        let offset = page.id().page_no as u64 * page_size() as u64;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&data)?;
        file.sync_all()?;
        Ok(())
    }

    /// Adds the tuple to the last page, growing the file by one empty page
    /// when that page is absent or full. The target page is fetched through
    /// the pool with `ReadWrite`, so the insert holds its exclusive lock.
    /// Returns the pages the insert dirtied.
    pub fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: Tuple,
    ) -> Result<Vec<SharedPage>> {
        let _append = lock_recover(&self.append);
        if self.num_pages()? == 0 {
            self.write_page(&HeapPage::empty(
                PageId::new(self.table_id, 0),
                self.schema.clone(),
            ))?;
        }
        let tail = PageId::new(self.table_id, self.num_pages()? as u32 - 1);
        let mut page = pool.get_page(tid, tail, Permissions::ReadWrite)?;
        if page.read().unwrap().empty_slot_count() == 0 {
            let fresh = PageId::new(self.table_id, self.num_pages()? as u32);
            self.write_page(&HeapPage::empty(fresh, self.schema.clone()))?;
            page = pool.get_page(tid, fresh, Permissions::ReadWrite)?;
        }
        page.write().unwrap().insert_tuple(tuple)?;
        Ok(vec![page])
    }

    /// Removes the tuple named by its record id from its page. Returns the
    /// pages the delete dirtied.
    pub fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<SharedPage>> {
        let record_id = tuple
            .record_id()
            .ok_or_else(|| DbError::Db("tuple has no record id".to_string()))?;
        let page = pool.get_page(tid, record_id.pid, Permissions::ReadWrite)?;
        page.write().unwrap().delete_tuple(tuple)?;
        Ok(vec![page])
    }

    /// A pull cursor over every tuple of the table, in page order. The
    /// cursor takes a shared lock on each page as it advances.
    pub fn cursor(self: &Arc<Self>, pool: Arc<BufferPool>, tid: TransactionId) -> HeapFileCursor {
        HeapFileCursor {
            file: Arc::clone(self),
            pool,
            tid,
            page_no: 0,
            pending: VecDeque::new(),
            opened: false,
        }
    }
}

/// Cursor state for a full-table scan.
pub struct HeapFileCursor {
    file: Arc<HeapFile>,
    pool: Arc<BufferPool>,
    tid: TransactionId,
    page_no: u32,
    pending: VecDeque<Tuple>,
    opened: bool,
}

impl HeapFileCursor {
    /// Positions the cursor before the first tuple.
    pub fn open(&mut self) -> Result<()> {
        self.page_no = 0;
        self.pending.clear();
        self.opened = true;
        if self.file.num_pages()? > 0 {
            self.load_page(0)?;
        }
        Ok(())
    }

    fn load_page(&mut self, page_no: u32) -> Result<()> {
        let pid = PageId::new(self.file.table_id(), page_no);
        let page = self.pool.get_page(self.tid, pid, Permissions::ReadOnly)?;
        let guard = page.read().unwrap();
        self.pending = guard.iter().cloned().collect();
        self.page_no = page_no;
        Ok(())
    }

    /// The next tuple, or `None` once the table is exhausted.
    pub fn next(&mut self) -> Result<Option<Tuple>> {
        if !self.opened {
            return Err(DbError::Db("cursor is not open".to_string()));
        }
        loop {
            if let Some(tuple) = self.pending.pop_front() {
                return Ok(Some(tuple));
            }
            let next_page = self.page_no + 1;
            if next_page as usize >= self.file.num_pages()? {
                return Ok(None);
            }
            self.load_page(next_page)?;
        }
    }

    /// Restarts the scan from the first page.
    pub fn rewind(&mut self) -> Result<()> {
        if !self.opened {
            return Err(DbError::Db("cursor is not open".to_string()));
        }
        self.open()
    }

    /// Closes the cursor; `next` fails until it is reopened.
    pub fn close(&mut self) {
        self.opened = false;
        self.pending.clear();
    }
}
