//! A small, fixed-width [`ElementSchema`] used by this crate's own
//! tests so the codec is exercisable without a full host document
//! format. Type tags and widths loosely mirror a conventional
//! self-describing binary document format's scalar types; a real host
//! supplies its own.

use crate::column::ElementSchema;
use crate::errors::{ColumnError, ColumnResult};

pub const TYPE_DOUBLE: u8 = 0x01;
pub const TYPE_BOOL: u8 = 0x08;
pub const TYPE_DATETIME: u8 = 0x09;
pub const TYPE_INT32: u8 = 0x10;
pub const TYPE_INT64: u8 = 0x12;
/// Deliberately wider than `V_MAX` so literal-fallback (spec §8
/// scenario 5) has a type tag to exercise.
pub const TYPE_DECIMAL128: u8 = 0x13;

pub struct DemoSchema;

impl ElementSchema for DemoSchema {
  fn value_width(&self, type_tag: u8) -> ColumnResult<usize> {
    match type_tag {
      TYPE_BOOL => Ok(1),
      TYPE_INT32 => Ok(4),
      TYPE_DOUBLE | TYPE_DATETIME | TYPE_INT64 => Ok(8),
      TYPE_DECIMAL128 => Ok(16),
      other => Err(ColumnError::corruption(format!(
        "DemoSchema has no registered value width for type tag {other}"
      ))),
    }
  }
}
