//! Typed scalar values.

use std::cmp::Ordering;
use std::fmt;

use crate::common::config::STRING_LEN;
use crate::common::{Error, Result};

use super::Type;

/// Comparison operators understood by [`Field::compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEq,
    LessThan,
    LessThanOrEq,
    /// Substring match for strings; plain equality for integers.
    Like,
}

/// A single typed value.
///
/// Ordering is only defined between values of the same type; comparing an
/// `Int` with a `String` yields `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Int(i32),
    String(String),
}

impl Field {
    /// Build a string field, truncating to [`STRING_LEN`] bytes on a char
    /// boundary.
    pub fn string(s: impl Into<String>) -> Self {
        let mut s = s.into();
        s.truncate(stored_len(&s));
        Field::String(s)
    }

    /// This value as it will be stored: strings longer than [`STRING_LEN`]
    /// bytes are cut on a char boundary, everything else is unchanged.
    pub fn into_stored(self) -> Self {
        match self {
            Field::String(s) if s.len() > STRING_LEN => Field::string(s),
            other => other,
        }
    }

    pub fn field_type(&self) -> Type {
        match self {
            Field::Int(_) => Type::Int,
            Field::String(_) => Type::String,
        }
    }

    /// Evaluate `self <op> other`. Values of different types never match.
    pub fn compare(&self, op: Op, other: &Field) -> bool {
        if let (Op::Like, Field::String(a), Field::String(b)) = (op, self, other) {
            return a.contains(b.as_str());
        }

        let Some(ord) = self.partial_cmp(other) else {
            return false;
        };
        match op {
            Op::Equals | Op::Like => ord == Ordering::Equal,
            Op::NotEquals => ord != Ordering::Equal,
            Op::GreaterThan => ord == Ordering::Greater,
            Op::GreaterThanOrEq => ord != Ordering::Less,
            Op::LessThan => ord == Ordering::Less,
            Op::LessThanOrEq => ord != Ordering::Greater,
        }
    }

    /// Append the fixed-width encoding of this value to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Field::Int(v) => out.extend_from_slice(&v.to_be_bytes()),
            Field::String(s) => {
                let bytes = &s.as_bytes()[..stored_len(s)];
                out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                out.extend_from_slice(bytes);
                out.resize(out.len() + STRING_LEN - bytes.len(), 0);
            }
        }
    }

    /// Decode a value of `field_type` from the front of `data`.
    ///
    /// `data` must hold at least `field_type.byte_len()` bytes.
    pub fn decode(field_type: Type, data: &[u8]) -> Result<Field> {
        if data.len() < field_type.byte_len() {
            return Err(Error::InvalidRecord(format!(
                "{} field needs {} bytes, got {}",
                field_type,
                field_type.byte_len(),
                data.len()
            )));
        }

        match field_type {
            Type::Int => Ok(Field::Int(i32::from_be_bytes([
                data[0], data[1], data[2], data[3],
            ]))),
            Type::String => {
                let len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
                if len > STRING_LEN {
                    return Err(Error::InvalidRecord(format!(
                        "string length {} exceeds {}",
                        len, STRING_LEN
                    )));
                }
                let payload = &data[4..4 + len];
                let s = std::str::from_utf8(payload)
                    .map_err(|e| Error::InvalidRecord(format!("string is not UTF-8: {}", e)))?;
                Ok(Field::String(s.to_string()))
            }
        }
    }
}

/// Length of the longest prefix of `s` that fits in [`STRING_LEN`] bytes and
/// ends on a char boundary.
fn stored_len(s: &str) -> usize {
    if s.len() <= STRING_LEN {
        return s.len();
    }
    let mut end = STRING_LEN;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}

impl PartialOrd for Field {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Field::Int(a), Field::Int(b)) => Some(a.cmp(b)),
            (Field::String(a), Field::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::String(s) => write!(f, "{}", s),
        }
    }
}
