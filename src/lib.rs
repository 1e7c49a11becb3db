//! `deltacol` is a columnar binary value codec: it packs a sparse,
//! logically-indexed sequence of small typed scalars (as a host
//! document format would store one field across many records) into a
//! single byte stream of literals, skips, copy-runs, and delta-runs.
//!
//! For the wire format and algorithm this crate implements, see
//! [`Column`] (the decode side) and [`ColumnBuilder`] (the encode
//! side). A host format supplies an [`ElementSchema`] (value widths per
//! type tag) and its own [`Element`] view, or uses [`RawElement`] as
//! this crate does in its own tests.

pub use builder::ColumnBuilder;
pub use column::{
  Column, ColumnCodecConfig, ElementSchema, InstructionCursor, SUBTYPE_COLUMN, TYPE_BINARY_SUBTYPED,
};
pub use constants::{
  DEFAULT_MAX_USER_SIZE, EOO, MAX_ELEM_SIZE, MAX_LITERAL_VALUE_SIZE, MAX_RAWDATA_SIZE, V_MAX,
};
pub use element::{Element, RawElement};
pub use errors::{ColumnError, ColumnResult, ErrorKind};
pub use instruction::Instruction;
pub use iter::ColumnIter;

mod builder;
mod column;
mod constants;
mod delta_store;
mod element;
mod errors;
mod instruction;
mod iter;

pub mod schema;
