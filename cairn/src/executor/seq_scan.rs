use std::sync::Arc;

use basalt::error::Result;
use basalt::heap_file::HeapFileCursor;
use basalt::transaction::TransactionId;
use basalt::tuple::{Schema, Tuple};
use basalt::TableId;

use crate::context::Context;
use crate::executor::OpIterator;

/// A full-table scan in page order, locking each page `Shared` as it goes.
pub struct SeqScan {
    schema: Schema,
    cursor: HeapFileCursor,
}

impl SeqScan {
    pub fn new(ctx: &Context, tid: TransactionId, table_id: TableId) -> Result<Self> {
        let file = ctx.catalog().file(table_id)?;
        let schema = file.schema().clone();
        let cursor = file.cursor(Arc::clone(ctx.buffer_pool()), tid);
        Ok(SeqScan { schema, cursor })
    }
}

impl OpIterator for SeqScan {
    fn open(&mut self) -> Result<()> {
        self.cursor.open()
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        self.cursor.next()
    }

    fn rewind(&mut self) -> Result<()> {
        self.cursor.rewind()
    }

    fn close(&mut self) {
        self.cursor.close();
    }

    fn schema(&self) -> Schema {
        self.schema.clone()
    }
}
