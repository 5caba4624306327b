//! Pull-based query operators.
//!
//! Operators implement [`OpIterator`]: an explicit `open` materializes
//! state, `next` pulls one tuple at a time, `rewind` restarts the stream,
//! and `close` drops the state again.

use basalt::error::{DbError, Result};
use basalt::tuple::{Schema, Tuple};

pub mod aggregate;
pub mod insert;
pub mod predicate;
pub mod seq_scan;

pub use aggregate::{AggregateOp, IntegerAggregator, StringAggregator};
pub use insert::Insert;
pub use predicate::{Op, Predicate};
pub use seq_scan::SeqScan;

/// A pull cursor over tuples.
pub trait OpIterator {
    /// Materializes the operator's state. `next` fails until this runs.
    fn open(&mut self) -> Result<()>;
    /// The next tuple, or `None` once the stream is exhausted.
    fn next(&mut self) -> Result<Option<Tuple>>;
    /// Restarts the stream from the beginning.
    fn rewind(&mut self) -> Result<()>;
    /// Releases the operator's state.
    fn close(&mut self);
    /// The layout of the tuples this operator produces.
    fn schema(&self) -> Schema;
}

/// An operator that yields a fixed list of in-memory tuples; the leaf under
/// inserts and a convenient source in tests.
pub struct TupleIterator {
    schema: Schema,
    tuples: Vec<Tuple>,
    cursor: usize,
    opened: bool,
}

impl TupleIterator {
    pub fn new(schema: Schema, tuples: Vec<Tuple>) -> Self {
        TupleIterator {
            schema,
            tuples,
            cursor: 0,
            opened: false,
        }
    }
}

impl OpIterator for TupleIterator {
    fn open(&mut self) -> Result<()> {
        self.cursor = 0;
        self.opened = true;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        if !self.opened {
            return Err(DbError::Db("operator is not open".to_string()));
        }
        let next = self.tuples.get(self.cursor).cloned();
        if next.is_some() {
            self.cursor += 1;
        }
        Ok(next)
    }

    fn rewind(&mut self) -> Result<()> {
        if !self.opened {
            return Err(DbError::Db("operator is not open".to_string()));
        }
        self.cursor = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.opened = false;
    }

    fn schema(&self) -> Schema {
        self.schema.clone()
    }
}
