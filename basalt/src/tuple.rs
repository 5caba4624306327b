use std::fmt;

use crate::page::PageId;

/// On-disk width of a text field's character payload.
pub const STRING_SIZE: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Int,
    Text,
}

impl FieldType {
    /// The fixed number of bytes a field of this type occupies on a page.
    pub fn byte_len(&self) -> usize {
        match self {
            FieldType::Int => 4,
            FieldType::Text => 4 + STRING_SIZE,
        }
    }
}

/// A single field value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Int(i32),
    Text(String),
}

impl Field {
    pub fn field_type(&self) -> FieldType {
        match self {
            Field::Int(_) => FieldType::Int,
            Field::Text(_) => FieldType::Text,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::Text(s) => write!(f, "{}", s),
        }
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: FieldType,
}

/// The layout of a tuple: an ordered list of columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<ColumnDef>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Schema { columns }
    }

    /// A schema with synthesized column names, for intermediate results.
    pub fn from_types(types: &[FieldType]) -> Self {
        let columns = types
            .iter()
            .enumerate()
            .map(|(index, data_type)| ColumnDef {
                name: format!("col{}", index),
                data_type: *data_type,
            })
            .collect();
        Schema { columns }
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn data_type(&self, index: usize) -> Option<FieldType> {
        self.columns.get(index).map(|column| column.data_type)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    /// Total on-disk bytes of one tuple with this layout.
    pub fn tuple_bytes(&self) -> usize {
        self.columns
            .iter()
            .map(|column| column.data_type.byte_len())
            .sum()
    }

    /// Whether two schemas describe the same field layout, names aside.
    pub fn same_layout(&self, other: &Schema) -> bool {
        self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(other.columns.iter())
                .all(|(a, b)| a.data_type == b.data_type)
    }
}

/// The location of a stored tuple: its page and slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub pid: PageId,
    pub slot: u16,
}

/// A row of field values, stamped with its storage location once stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    pub fn new(fields: Vec<Field>) -> Self {
        Tuple {
            fields,
            record_id: None,
        }
    }

    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    pub fn set_field(&mut self, index: usize, value: Field) {
        self.fields[index] = value;
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    /// Whether this tuple's field types line up with the schema.
    pub fn matches(&self, schema: &Schema) -> bool {
        self.fields.len() == schema.len()
            && self
                .fields
                .iter()
                .zip(schema.columns().iter())
                .all(|(field, column)| field.field_type() == column.data_type)
    }
}
