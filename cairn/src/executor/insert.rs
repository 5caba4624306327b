use basalt::error::{DbError, Result};
use basalt::transaction::TransactionId;
use basalt::tuple::{Field, FieldType, Schema, Tuple};
use basalt::TableId;

use crate::context::Context;
use crate::executor::OpIterator;

/// Drains its child into a table, then yields exactly one single-integer
/// tuple holding the number of rows inserted. Further calls yield nothing.
pub struct Insert<'a> {
    ctx: &'a Context,
    tid: TransactionId,
    child: Box<dyn OpIterator + 'a>,
    table_id: TableId,
    opened: bool,
    fetched: bool,
}

impl<'a> Insert<'a> {
    /// Fails when the child's tuple layout does not match the target table.
    pub fn new(
        ctx: &'a Context,
        tid: TransactionId,
        child: Box<dyn OpIterator + 'a>,
        table_id: TableId,
    ) -> Result<Self> {
        let table_schema = ctx.catalog().schema(table_id)?;
        if !table_schema.same_layout(&child.schema()) {
            return Err(DbError::Db(
                "child layout does not match the target table".to_string(),
            ));
        }
        Ok(Insert {
            ctx,
            tid,
            child,
            table_id,
            opened: false,
            fetched: false,
        })
    }
}

impl OpIterator for Insert<'_> {
    fn open(&mut self) -> Result<()> {
        self.child.open()?;
        self.opened = true;
        self.fetched = false;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        if !self.opened {
            return Err(DbError::Db("operator is not open".to_string()));
        }
        if self.fetched {
            return Ok(None);
        }
        let mut count = 0;
        while let Some(tuple) = self.child.next()? {
            self.ctx
                .buffer_pool()
                .insert_tuple(self.tid, self.table_id, tuple)?;
            count += 1;
        }
        crate::cairn_debug_log!("[Insert] wrote {} tuples into table {}", count, self.table_id);
        self.fetched = true;
        Ok(Some(Tuple::new(vec![Field::Int(count)])))
    }

    fn rewind(&mut self) -> Result<()> {
        self.child.rewind()?;
        self.fetched = false;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.opened = false;
    }

    fn schema(&self) -> Schema {
        Schema::from_types(&[FieldType::Int])
    }
}
