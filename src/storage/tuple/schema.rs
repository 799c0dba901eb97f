//! Column types and table schemas.

use std::fmt;

use crate::common::config::STRING_LEN;

/// Primitive column type. Every type has a fixed on-disk width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// 32-bit signed integer, big-endian on disk.
    Int,
    /// UTF-8 string of at most [`STRING_LEN`] bytes.
    ///
    /// Stored as a 4-byte big-endian length followed by `STRING_LEN`
    /// zero-padded payload bytes.
    String,
}

impl Type {
    /// Width of a value of this type on disk, in bytes.
    pub const fn byte_len(self) -> usize {
        match self {
            Type::Int => 4,
            Type::String => 4 + STRING_LEN,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "INT"),
            Type::String => write!(f, "STRING"),
        }
    }
}

/// One column of a [`TupleDesc`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TdItem {
    pub field_type: Type,
    pub field_name: Option<String>,
}

/// Schema of a table: an ordered list of typed, optionally named columns.
///
/// Two schemas are equal when their type sequences are equal; column names do
/// not take part in the comparison.
///
/// # Example
/// ```
/// use heapdb::{TupleDesc, Type};
///
/// let td = TupleDesc::with_names(&[Type::Int, Type::String], &["id", "name"]);
/// assert_eq!(td.num_fields(), 2);
/// assert_eq!(td.byte_size(), 4 + 132);
/// assert_eq!(td.index_of("name"), Some(1));
/// assert_eq!(td, TupleDesc::new(&[Type::Int, Type::String]));
/// ```
#[derive(Debug, Clone, Eq)]
pub struct TupleDesc {
    items: Vec<TdItem>,
}

impl TupleDesc {
    /// Schema with anonymous columns.
    pub fn new(types: &[Type]) -> Self {
        Self {
            items: types
                .iter()
                .map(|&field_type| TdItem {
                    field_type,
                    field_name: None,
                })
                .collect(),
        }
    }

    /// Schema with named columns. Extra names are ignored; missing names stay
    /// anonymous.
    pub fn with_names(types: &[Type], names: &[&str]) -> Self {
        Self {
            items: types
                .iter()
                .enumerate()
                .map(|(i, &field_type)| TdItem {
                    field_type,
                    field_name: names.get(i).map(|n| n.to_string()),
                })
                .collect(),
        }
    }

    /// Concatenate two schemas, `a`'s columns first.
    pub fn merge(a: &TupleDesc, b: &TupleDesc) -> TupleDesc {
        Self {
            items: a.items.iter().chain(&b.items).cloned().collect(),
        }
    }

    pub fn num_fields(&self) -> usize {
        self.items.len()
    }

    pub fn field_type(&self, i: usize) -> Option<Type> {
        self.items.get(i).map(|item| item.field_type)
    }

    pub fn field_name(&self, i: usize) -> Option<&str> {
        self.items.get(i)?.field_name.as_deref()
    }

    /// Index of the first column named `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.field_name.as_deref() == Some(name))
    }

    pub fn items(&self) -> &[TdItem] {
        &self.items
    }

    /// Width of one encoded tuple in bytes.
    pub fn byte_size(&self) -> usize {
        self.items.iter().map(|item| item.field_type.byte_len()).sum()
    }

    /// Whether both schemas have the same ordered column types.
    pub fn is_compatible(&self, other: &TupleDesc) -> bool {
        self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(&other.items)
                .all(|(a, b)| a.field_type == b.field_type)
    }
}

impl PartialEq for TupleDesc {
    fn eq(&self, other: &Self) -> bool {
        self.is_compatible(other)
    }
}

impl fmt::Display for TupleDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(
                f,
                "{}({})",
                item.field_type,
                item.field_name.as_deref().unwrap_or("null")
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_len() {
        assert_eq!(Type::Int.byte_len(), 4);
        assert_eq!(Type::String.byte_len(), 132);
    }

    #[test]
    fn test_names_do_not_affect_equality() {
        let a = TupleDesc::with_names(&[Type::Int, Type::Int], &["a", "b"]);
        let b = TupleDesc::with_names(&[Type::Int, Type::Int], &["x", "y"]);
        let c = TupleDesc::new(&[Type::Int, Type::String]);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(!a.is_compatible(&TupleDesc::new(&[Type::Int])));
    }

    #[test]
    fn test_merge() {
        let a = TupleDesc::with_names(&[Type::Int], &["id"]);
        let b = TupleDesc::with_names(&[Type::String, Type::Int], &["name", "age"]);
        let merged = TupleDesc::merge(&a, &b);

        assert_eq!(merged.num_fields(), 3);
        assert_eq!(merged.field_type(1), Some(Type::String));
        assert_eq!(merged.field_name(2), Some("age"));
        assert_eq!(merged.byte_size(), a.byte_size() + b.byte_size());
    }

    #[test]
    fn test_lookup() {
        let td = TupleDesc::with_names(&[Type::Int, Type::Int], &["a"]);
        assert_eq!(td.index_of("a"), Some(0));
        assert_eq!(td.index_of("b"), None);
        assert_eq!(td.field_name(1), None);
        assert_eq!(td.field_type(5), None);
    }

    #[test]
    fn test_display() {
        let td = TupleDesc::with_names(&[Type::Int, Type::String], &["id"]);
        assert_eq!(format!("{}", td), "INT(id), STRING(null)");
    }
}
