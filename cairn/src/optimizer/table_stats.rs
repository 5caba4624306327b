use std::sync::Arc;

use basalt::error::Result;
use basalt::transaction::TransactionId;
use basalt::tuple::Field;
use basalt::TableId;

use crate::context::Context;
use crate::executor::predicate::Op;
use crate::optimizer::IntHistogram;

/// Histogram buckets per column.
const NUM_HIST_BINS: usize = 100;

/// Per-table statistics: page and tuple counts plus one histogram per
/// integer column. Text columns carry no histogram.
pub struct TableStats {
    num_pages: usize,
    num_tuples: usize,
    io_cost_per_page: usize,
    histograms: Vec<Option<IntHistogram>>,
}

impl TableStats {
    /// Scans the table twice under `tid`: once for per-column minima and
    /// maxima, once to fill the histograms.
    pub fn new(
        ctx: &Context,
        tid: TransactionId,
        table_id: TableId,
        io_cost_per_page: usize,
    ) -> Result<Self> {
        let file = ctx.catalog().file(table_id)?;
        let column_count = file.schema().len();
        let mut bounds: Vec<Option<(i32, i32)>> = vec![None; column_count];
        let mut num_tuples = 0;

        let mut cursor = file.cursor(Arc::clone(ctx.buffer_pool()), tid);
        cursor.open()?;
        while let Some(tuple) = cursor.next()? {
            num_tuples += 1;
            for (index, field) in tuple.fields().iter().enumerate() {
                if let Field::Int(v) = field {
                    let (lo, hi) = bounds[index].get_or_insert((*v, *v));
                    *lo = (*lo).min(*v);
                    *hi = (*hi).max(*v);
                }
            }
        }

        let mut histograms: Vec<Option<IntHistogram>> = bounds
            .iter()
            .map(|range| range.map(|(lo, hi)| IntHistogram::new(NUM_HIST_BINS, lo, hi)))
            .collect();

        cursor.rewind()?;
        while let Some(tuple) = cursor.next()? {
            for (index, field) in tuple.fields().iter().enumerate() {
                if let Field::Int(v) = field {
                    if let Some(histogram) = histograms[index].as_mut() {
                        histogram.add_value(*v);
                    }
                }
            }
        }
        cursor.close();

        crate::cairn_debug_log!(
            "[TableStats] table {}: {} tuples over {} pages",
            table_id,
            num_tuples,
            file.num_pages()?
        );
        Ok(TableStats {
            num_pages: file.num_pages()?,
            num_tuples,
            io_cost_per_page,
            histograms,
        })
    }

    /// The cost of a full scan: every page read once.
    pub fn estimate_scan_cost(&self) -> f64 {
        (self.num_pages * self.io_cost_per_page) as f64
    }

    /// Expected result cardinality for a predicate of the given selectivity.
    pub fn estimate_table_cardinality(&self, selectivity: f64) -> usize {
        (self.num_tuples as f64 * selectivity) as usize
    }

    pub fn num_tuples(&self) -> usize {
        self.num_tuples
    }

    /// Selectivity of `column <op> v`, or `None` for columns without a
    /// histogram.
    pub fn estimate_selectivity(&self, column: usize, op: Op, v: i32) -> Option<f64> {
        self.histograms
            .get(column)?
            .as_ref()
            .map(|histogram| histogram.estimate_selectivity(op, v))
    }

    pub fn avg_selectivity(&self, column: usize) -> Option<f64> {
        self.histograms
            .get(column)?
            .as_ref()
            .map(|histogram| histogram.avg_selectivity())
    }
}
