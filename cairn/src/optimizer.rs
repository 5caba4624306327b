//! Selectivity estimation for single-column predicates.

pub mod histogram;
pub mod table_stats;

pub use histogram::IntHistogram;
pub use table_stats::TableStats;
