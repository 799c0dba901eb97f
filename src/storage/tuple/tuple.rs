//! Tuples: one row of a table.

use std::fmt;
use std::sync::Arc;

use crate::common::{Error, RecordId, Result};

use super::{Field, TupleDesc};

/// An ordered list of fields matching a [`TupleDesc`].
///
/// A tuple read from or inserted into a heap file carries the [`RecordId`] of
/// the slot it occupies; deleting it clears the id again.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use heapdb::{Field, Tuple, TupleDesc, Type};
///
/// let td = Arc::new(TupleDesc::new(&[Type::Int, Type::String]));
/// let t = Tuple::new(td, vec![Field::Int(1), Field::string("one")]).unwrap();
/// assert_eq!(t.field(0), Some(&Field::Int(1)));
/// assert!(t.record_id().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct Tuple {
    desc: Arc<TupleDesc>,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Build a tuple, checking the fields against the schema.
    ///
    /// Strings longer than [`STRING_LEN`](crate::STRING_LEN) bytes are
    /// truncated on a char boundary, so the tuple always equals its decoded
    /// encoding.
    pub fn new(desc: Arc<TupleDesc>, fields: Vec<Field>) -> Result<Self> {
        let matches = fields.len() == desc.num_fields()
            && fields
                .iter()
                .enumerate()
                .all(|(i, f)| desc.field_type(i) == Some(f.field_type()));
        if !matches {
            return Err(Error::SchemaMismatch);
        }

        Ok(Self {
            desc,
            fields: fields.into_iter().map(Field::into_stored).collect(),
            record_id: None,
        })
    }

    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn field(&self, i: usize) -> Option<&Field> {
        self.fields.get(i)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Replace field `i`. The new value must have the column's type.
    pub fn set_field(&mut self, i: usize, field: Field) -> Result<()> {
        if self.desc.field_type(i) != Some(field.field_type()) {
            return Err(Error::SchemaMismatch);
        }
        self.fields[i] = field.into_stored();
        Ok(())
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    /// Fixed-width encoding of all fields, `desc.byte_size()` bytes long.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.desc.byte_size());
        for field in &self.fields {
            field.encode(&mut out);
        }
        out
    }

    /// Decode one tuple from the front of `data`.
    pub fn decode(desc: Arc<TupleDesc>, data: &[u8]) -> Result<Self> {
        let mut fields = Vec::with_capacity(desc.num_fields());
        let mut offset = 0;
        for item in desc.items() {
            let width = item.field_type.byte_len();
            let bytes = data.get(offset..offset + width).ok_or_else(|| {
                Error::InvalidRecord(format!(
                    "tuple needs {} bytes, got {}",
                    desc.byte_size(),
                    data.len()
                ))
            })?;
            fields.push(Field::decode(item.field_type, bytes)?);
            offset += width;
        }

        Ok(Self {
            desc,
            fields: fields.into_iter().map(Field::into_stored).collect(),
            record_id: None,
        })
    }
}

/// Tuples compare by value; the record id is ignored.
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.desc == other.desc && self.fields == other.fields
    }
}

impl Eq for Tuple {}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, "\t")?;
            }
            write!(f, "{}", field)?;
        }
        Ok(())
    }
}
