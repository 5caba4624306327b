#![allow(dead_code)]

use std::sync::Arc;

use basalt::buffer_pool::BufferPool;
use basalt::catalog::Catalog;
use basalt::tuple::{Field, FieldType, Schema, Tuple};
use basalt::TableId;
use tempfile::TempDir;

/// A scratch database: one catalog, one two-integer-column table, one pool.
pub struct Scratch {
    pub dir: TempDir,
    pub catalog: Arc<Catalog>,
    pub pool: Arc<BufferPool>,
    pub table_id: TableId,
}

pub fn setup(pool_capacity: usize) -> Scratch {
    let dir = TempDir::new().unwrap();
    let catalog = Arc::new(Catalog::new());
    let schema = Schema::from_types(&[FieldType::Int, FieldType::Int]);
    let table_id = catalog
        .add_table("t", schema, dir.path().join("t.tbl"))
        .unwrap();
    let pool = Arc::new(BufferPool::new(pool_capacity, Arc::clone(&catalog)));
    Scratch {
        dir,
        catalog,
        pool,
        table_id,
    }
}

pub fn int_pair(a: i32, b: i32) -> Tuple {
    Tuple::new(vec![Field::Int(a), Field::Int(b)])
}
