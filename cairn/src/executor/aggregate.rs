use std::collections::hash_map::Entry;
use std::collections::HashMap;

use basalt::error::{DbError, Result};
use basalt::tuple::{Field, FieldType, Schema, Tuple};

use crate::executor::TupleIterator;

/// The aggregation functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

#[derive(Debug, Clone, Copy)]
struct GroupState {
    value: i32,
    count: i32,
}

/// Computes one aggregate over `Int` fields, optionally grouped by another
/// field. Tuples stream in through `merge`; `results` yields `(group,
/// value)` pairs, or a single `(value)` when ungrouped.
pub struct IntegerAggregator {
    group: Option<(usize, FieldType)>,
    field: usize,
    op: AggregateOp,
    groups: HashMap<Option<Field>, GroupState>,
}

impl IntegerAggregator {
    /// `group` names the group-by field and its type, or `None` for one
    /// ungrouped aggregate.
    pub fn new(group: Option<(usize, FieldType)>, field: usize, op: AggregateOp) -> Self {
        IntegerAggregator {
            group,
            field,
            op,
            groups: HashMap::new(),
        }
    }

    /// Folds one tuple into its group.
    pub fn merge(&mut self, tuple: &Tuple) -> Result<()> {
        let value = match tuple.field(self.field) {
            Some(Field::Int(v)) => *v,
            _ => return Err(DbError::Db("aggregate field is not an integer".to_string())),
        };
        let key = self.group_key(tuple)?;
        match self.groups.entry(key) {
            Entry::Occupied(mut entry) => {
                let state = entry.get_mut();
                state.count += 1;
                state.value = match self.op {
                    AggregateOp::Min => state.value.min(value),
                    AggregateOp::Max => state.value.max(value),
                    AggregateOp::Sum | AggregateOp::Avg => state.value + value,
                    AggregateOp::Count => state.value + 1,
                };
            }
            Entry::Vacant(entry) => {
                entry.insert(GroupState {
                    value: match self.op {
                        AggregateOp::Count => 1,
                        _ => value,
                    },
                    count: 1,
                });
            }
        }
        Ok(())
    }

    fn group_key(&self, tuple: &Tuple) -> Result<Option<Field>> {
        match self.group {
            Some((index, _)) => tuple
                .field(index)
                .cloned()
                .map(Some)
                .ok_or_else(|| DbError::Db("group-by field is missing".to_string())),
            None => Ok(None),
        }
    }

    /// A cursor over the aggregate rows computed so far.
    pub fn results(&self) -> TupleIterator {
        let rows = self
            .groups
            .iter()
            .map(|(key, state)| {
                let value = match self.op {
                    AggregateOp::Avg => state.value / state.count,
                    _ => state.value,
                };
                match key {
                    Some(group) => Tuple::new(vec![group.clone(), Field::Int(value)]),
                    None => Tuple::new(vec![Field::Int(value)]),
                }
            })
            .collect();
        TupleIterator::new(results_schema(self.group), rows)
    }
}

/// Counts `Text` fields, optionally grouped. `Count` is the only supported
/// function over text.
pub struct StringAggregator {
    group: Option<(usize, FieldType)>,
    field: usize,
    counts: HashMap<Option<Field>, i32>,
}

impl StringAggregator {
    pub fn new(
        group: Option<(usize, FieldType)>,
        field: usize,
        op: AggregateOp,
    ) -> Result<Self> {
        if op != AggregateOp::Count {
            return Err(DbError::Db(
                "string aggregates support only COUNT".to_string(),
            ));
        }
        Ok(StringAggregator {
            group,
            field,
            counts: HashMap::new(),
        })
    }

    pub fn merge(&mut self, tuple: &Tuple) -> Result<()> {
        match tuple.field(self.field) {
            Some(Field::Text(_)) => {}
            _ => return Err(DbError::Db("aggregate field is not text".to_string())),
        }
        let key = match self.group {
            Some((index, _)) => Some(
                tuple
                    .field(index)
                    .cloned()
                    .ok_or_else(|| DbError::Db("group-by field is missing".to_string()))?,
            ),
            None => None,
        };
        *self.counts.entry(key).or_insert(0) += 1;
        Ok(())
    }

    pub fn results(&self) -> TupleIterator {
        let rows = self
            .counts
            .iter()
            .map(|(key, count)| match key {
                Some(group) => Tuple::new(vec![group.clone(), Field::Int(*count)]),
                None => Tuple::new(vec![Field::Int(*count)]),
            })
            .collect();
        TupleIterator::new(results_schema(self.group), rows)
    }
}

fn results_schema(group: Option<(usize, FieldType)>) -> Schema {
    match group {
        Some((_, group_type)) => Schema::from_types(&[group_type, FieldType::Int]),
        None => Schema::from_types(&[FieldType::Int]),
    }
}
