use basalt::tuple::{Field, Tuple};

/// Comparison operators over field values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEq,
    LessThan,
    LessThanOrEq,
}

impl Op {
    /// Applies the comparison to an ordered pair of values.
    pub fn apply(&self, left: &Field, right: &Field) -> bool {
        match self {
            Op::Equals => left == right,
            Op::NotEquals => left != right,
            Op::GreaterThan => left > right,
            Op::GreaterThanOrEq => left >= right,
            Op::LessThan => left < right,
            Op::LessThanOrEq => left <= right,
        }
    }
}

/// A single-field comparison against a constant operand.
#[derive(Debug, Clone)]
pub struct Predicate {
    field: usize,
    op: Op,
    operand: Field,
}

impl Predicate {
    pub fn new(field: usize, op: Op, operand: Field) -> Self {
        Predicate { field, op, operand }
    }

    pub fn field(&self) -> usize {
        self.field
    }

    pub fn op(&self) -> Op {
        self.op
    }

    pub fn operand(&self) -> &Field {
        &self.operand
    }

    /// Whether the tuple satisfies the comparison. Tuples without the named
    /// field do not.
    pub fn filter(&self, tuple: &Tuple) -> bool {
        tuple
            .field(self.field)
            .map(|field| self.op.apply(field, &self.operand))
            .unwrap_or(false)
    }
}
