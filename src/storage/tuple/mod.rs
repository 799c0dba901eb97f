//! Fixed-schema tuples.
//!
//! - [`Type`] / [`TupleDesc`] - Column types and table schema
//! - [`Field`] / [`Op`] - Typed scalar values and their comparisons
//! - [`Tuple`] - One row, optionally tagged with its [`RecordId`](crate::RecordId)

mod field;
mod schema;
#[allow(clippy::module_inception)]
mod tuple;

pub use field::{Field, Op};
pub use schema::{TdItem, TupleDesc, Type};
pub use tuple::Tuple;
