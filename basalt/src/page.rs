use std::fmt;
use std::sync::{Arc, RwLock};

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{DbError, Result};
use crate::transaction::TransactionId;
use crate::tuple::{Field, FieldType, RecordId, Schema, Tuple, STRING_SIZE};
use crate::{page_size, TableId};

/// A unique identifier for a page: the owning table and the page's position
/// in that table's file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId {
    pub table_id: TableId,
    pub page_no: u32,
}

impl PageId {
    pub fn new(table_id: TableId, page_no: u32) -> Self {
        PageId { table_id, page_no }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table_id, self.page_no)
    }
}

/// A page shared between the cache and the transactions reading or writing it.
pub type SharedPage = Arc<RwLock<HeapPage>>;

/// A slotted heap page: a slot-occupancy bitmap followed by fixed-width
/// tuple slots, zero-padded to the page size.
#[derive(Debug, Clone)]
pub struct HeapPage {
    pid: PageId,
    schema: Schema,
    tuples: Vec<Option<Tuple>>,
    dirtier: Option<TransactionId>,
}

impl HeapPage {
    /// Number of tuple slots a page of this layout holds. Each slot costs
    /// its tuple bytes plus one occupancy bit.
    pub fn slots_per_page(schema: &Schema) -> usize {
        (page_size() * 8) / (schema.tuple_bytes() * 8 + 1)
    }

    fn header_bytes(schema: &Schema) -> usize {
        Self::slots_per_page(schema).div_ceil(8)
    }

    /// A fresh page with every slot empty.
    pub fn empty(pid: PageId, schema: Schema) -> Self {
        let slots = Self::slots_per_page(&schema);
        HeapPage {
            pid,
            schema,
            tuples: vec![None; slots],
            dirtier: None,
        }
    }

    /// Decodes a page from its on-disk image.
    pub fn parse(pid: PageId, schema: Schema, data: &[u8]) -> Result<Self> {
        if data.len() != page_size() {
            return Err(DbError::Db(format!(
                "page image is {} bytes, expected {}",
                data.len(),
                page_size()
            )));
        }
        let slots = Self::slots_per_page(&schema);
        let header_len = Self::header_bytes(&schema);
        let header = &data[..header_len];
        let mut buf = &data[header_len..];
        let mut tuples = Vec::with_capacity(slots);
        for slot in 0..slots {
            if header[slot / 8] & (1 << (slot % 8)) != 0 {
                let mut tuple = Self::decode_tuple(&schema, &mut buf)?;
                tuple.set_record_id(Some(RecordId {
                    pid,
                    slot: slot as u16,
                }));
                tuples.push(Some(tuple));
            } else {
                buf.advance(schema.tuple_bytes());
                tuples.push(None);
            }
        }
        Ok(HeapPage {
            pid,
            schema,
            tuples,
            dirtier: None,
        })
    }

    fn decode_tuple(schema: &Schema, buf: &mut &[u8]) -> Result<Tuple> {
        let mut fields = Vec::with_capacity(schema.len());
        for column in schema.columns() {
            match column.data_type {
                FieldType::Int => fields.push(Field::Int(buf.get_i32())),
                FieldType::Text => {
                    let len = buf.get_u32() as usize;
                    if len > STRING_SIZE {
                        return Err(DbError::Db(format!(
                            "text field length {} exceeds {}",
                            len, STRING_SIZE
                        )));
                    }
                    let mut raw = vec![0u8; STRING_SIZE];
                    buf.copy_to_slice(&mut raw);
                    raw.truncate(len);
                    let text = String::from_utf8(raw)
                        .map_err(|_| DbError::Db("text field is not valid utf-8".to_string()))?;
                    fields.push(Field::Text(text));
                }
            }
        }
        Ok(Tuple::new(fields))
    }

    /// Re-encodes the page into its on-disk image.
    pub fn page_data(&self) -> Vec<u8> {
        let header_len = Self::header_bytes(&self.schema);
        let mut header = vec![0u8; header_len];
        let mut body = BytesMut::with_capacity(page_size());
        for (slot, tuple) in self.tuples.iter().enumerate() {
            match tuple {
                Some(tuple) => {
                    header[slot / 8] |= 1 << (slot % 8);
                    Self::encode_tuple(tuple, &mut body);
                }
                None => body.put_bytes(0, self.schema.tuple_bytes()),
            }
        }
        let mut data = Vec::with_capacity(page_size());
        data.extend_from_slice(&header);
        data.extend_from_slice(&body);
        data.resize(page_size(), 0);
        data
    }

    fn encode_tuple(tuple: &Tuple, buf: &mut BytesMut) {
        for field in tuple.fields() {
            match field {
                Field::Int(v) => buf.put_i32(*v),
                Field::Text(s) => {
                    let raw = s.as_bytes();
                    let len = raw.len().min(STRING_SIZE);
                    buf.put_u32(len as u32);
                    buf.put_slice(&raw[..len]);
                    buf.put_bytes(0, STRING_SIZE - len);
                }
            }
        }
    }

    /// The zeroed image of a page with no occupied slots.
    pub fn empty_page_data() -> Vec<u8> {
        vec![0; page_size()]
    }

    pub fn id(&self) -> PageId {
        self.pid
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The transaction that dirtied the in-memory copy, if any.
    pub fn dirtier(&self) -> Option<TransactionId> {
        self.dirtier
    }

    /// Stamps or clears the dirty mark.
    pub fn mark_dirty(&mut self, dirtier: Option<TransactionId>) {
        self.dirtier = dirtier;
    }

    pub fn slot_count(&self) -> usize {
        self.tuples.len()
    }

    pub fn empty_slot_count(&self) -> usize {
        self.tuples.iter().filter(|slot| slot.is_none()).count()
    }

    /// Stores the tuple in the first empty slot and stamps its record id.
    pub fn insert_tuple(&mut self, mut tuple: Tuple) -> Result<RecordId> {
        if !tuple.matches(&self.schema) {
            return Err(DbError::Db(
                "tuple layout does not match the page schema".to_string(),
            ));
        }
        let slot = self
            .tuples
            .iter()
            .position(|slot| slot.is_none())
            .ok_or_else(|| DbError::Db(format!("no empty slot on page {}", self.pid)))?;
        let record_id = RecordId {
            pid: self.pid,
            slot: slot as u16,
        };
        tuple.set_record_id(Some(record_id));
        self.tuples[slot] = Some(tuple);
        Ok(record_id)
    }

    /// Clears the slot named by the tuple's record id.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> Result<()> {
        let record_id = tuple
            .record_id()
            .ok_or_else(|| DbError::Db("tuple has no record id".to_string()))?;
        if record_id.pid != self.pid {
            return Err(DbError::Db(format!(
                "tuple belongs to page {}, not {}",
                record_id.pid, self.pid
            )));
        }
        let slot = record_id.slot as usize;
        if slot >= self.tuples.len() || self.tuples[slot].is_none() {
            return Err(DbError::Db(format!(
                "slot {} on page {} is already empty",
                record_id.slot, self.pid
            )));
        }
        self.tuples[slot] = None;
        Ok(())
    }

    /// The occupied tuples of this page, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.tuples.iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::ColumnDef;
    use serial_test::serial;

    fn int_pair_schema() -> Schema {
        Schema::new(vec![
            ColumnDef {
                name: "a".to_string(),
                data_type: FieldType::Int,
            },
            ColumnDef {
                name: "b".to_string(),
                data_type: FieldType::Int,
            },
        ])
    }

    fn int_pair(a: i32, b: i32) -> Tuple {
        Tuple::new(vec![Field::Int(a), Field::Int(b)])
    }

    #[test]
    #[serial]
    fn encode_parse_preserves_slots_and_record_ids() {
        let pid = PageId::new(1, 0);
        let schema = int_pair_schema();
        let mut page = HeapPage::empty(pid, schema.clone());
        page.insert_tuple(int_pair(1, 10)).unwrap();
        let doomed = {
            let rid = page.insert_tuple(int_pair(2, 20)).unwrap();
            let mut t = int_pair(2, 20);
            t.set_record_id(Some(rid));
            t
        };
        page.insert_tuple(int_pair(3, 30)).unwrap();
        page.delete_tuple(&doomed).unwrap();

        let parsed = HeapPage::parse(pid, schema, &page.page_data()).unwrap();
        let tuples: Vec<_> = parsed.iter().collect();
        assert_eq!(tuples.len(), 2);
        assert_eq!(tuples[0].field(0), Some(&Field::Int(1)));
        assert_eq!(tuples[1].field(0), Some(&Field::Int(3)));
        // Slot 1 was freed, so its record id should not resurface.
        assert_eq!(tuples[0].record_id().unwrap().slot, 0);
        assert_eq!(tuples[1].record_id().unwrap().slot, 2);
    }

    #[test]
    #[serial]
    fn text_fields_survive_the_codec() {
        let schema = Schema::new(vec![
            ColumnDef {
                name: "id".to_string(),
                data_type: FieldType::Int,
            },
            ColumnDef {
                name: "name".to_string(),
                data_type: FieldType::Text,
            },
        ]);
        let pid = PageId::new(7, 3);
        let mut page = HeapPage::empty(pid, schema.clone());
        page.insert_tuple(Tuple::new(vec![
            Field::Int(42),
            Field::Text("pebble".to_string()),
        ]))
        .unwrap();

        let parsed = HeapPage::parse(pid, schema, &page.page_data()).unwrap();
        let tuple = parsed.iter().next().unwrap();
        assert_eq!(tuple.field(1), Some(&Field::Text("pebble".to_string())));
    }

    #[test]
    #[serial]
    fn insert_fails_once_every_slot_is_full() {
        let schema = int_pair_schema();
        let mut page = HeapPage::empty(PageId::new(1, 0), schema.clone());
        let slots = HeapPage::slots_per_page(&schema);
        for i in 0..slots {
            page.insert_tuple(int_pair(i as i32, 0)).unwrap();
        }
        assert_eq!(page.empty_slot_count(), 0);
        assert!(matches!(
            page.insert_tuple(int_pair(-1, -1)),
            Err(DbError::Db(_))
        ));
        // Freeing one slot makes room again, and the free slot is reused.
        let first = page.iter().next().unwrap().clone();
        page.delete_tuple(&first).unwrap();
        let rid = page.insert_tuple(int_pair(-1, -1)).unwrap();
        assert_eq!(rid.slot, 0);
    }

    #[test]
    #[serial]
    fn delete_rejects_foreign_and_empty_slots() {
        let schema = int_pair_schema();
        let mut page = HeapPage::empty(PageId::new(1, 0), schema.clone());
        let rid = page.insert_tuple(int_pair(1, 1)).unwrap();

        let mut unstored = int_pair(5, 5);
        assert!(matches!(page.delete_tuple(&unstored), Err(DbError::Db(_))));

        unstored.set_record_id(Some(RecordId {
            pid: PageId::new(2, 0),
            slot: 0,
        }));
        assert!(matches!(page.delete_tuple(&unstored), Err(DbError::Db(_))));

        let mut stored = int_pair(1, 1);
        stored.set_record_id(Some(rid));
        page.delete_tuple(&stored).unwrap();
        assert!(matches!(page.delete_tuple(&stored), Err(DbError::Db(_))));
    }

    #[test]
    #[serial]
    fn empty_page_parses_to_no_tuples() {
        let schema = int_pair_schema();
        let page =
            HeapPage::parse(PageId::new(1, 0), schema, &HeapPage::empty_page_data()).unwrap();
        assert_eq!(page.iter().count(), 0);
        assert_eq!(page.empty_slot_count(), page.slot_count());
        assert!(page.dirtier().is_none());
    }
}
