//! The "element format" contract of spec §6.2: a minimal read-only view
//! over one encoded scalar, plus a concrete implementation the codec can
//! be exercised and tested against standalone.
//!
//! A host document format supplies its own element view meeting this
//! contract (type byte, empty field name, up to
//! [`MAX_LITERAL_VALUE_SIZE`] value bytes); this crate never parses a
//! full document, only the handful of bytes a column's literal slots and
//! delta store need.

use crate::constants::{EOO, MAX_LITERAL_VALUE_SIZE, MAX_RAWDATA_SIZE, VALUE_OFFSET};
use crate::errors::{ColumnError, ColumnResult};

/// The minimal contract the codec requires of a host's scalar element
/// view (spec §6.2). `RawElement` is this crate's own implementation,
/// used for every literal and delta-materialized slot a `Column`
/// produces.
pub trait Element: Copy + Eq {
  /// The element's type tag; `0` denotes end-of-sequence.
  fn type_tag(&self) -> u8;
  /// Number of value bytes. Only values of `0..=V_MAX` bytes ever
  /// participate in delta compression; wider values (e.g. a 128-bit
  /// decimal) still round-trip, they just always encode as a literal.
  fn valuesize(&self) -> usize;
  /// The value bytes themselves, little-endian for any delta-compressible type.
  fn value(&self) -> &[u8];
  /// `1 (type) + 1 (empty name) + valuesize()`.
  fn size(&self) -> usize {
    VALUE_OFFSET + self.valuesize()
  }
  fn is_eoo(&self) -> bool {
    self.type_tag() == EOO
  }
  /// True iff both elements share a type and identical value bytes.
  /// Per spec §9, this is never true when either side is EOO — an
  /// absent position can never be "copied".
  fn binary_equal_values(&self, other: &Self) -> bool;
}

/// A small, stack-resident element: type byte, implicit empty name, and
/// up to [`MAX_LITERAL_VALUE_SIZE`] value bytes. This is the codec's own
/// concrete element type, returned by every literal parse and every
/// delta application.
///
/// Representing elements by value rather than by reference sidesteps
/// the pointer-stability bookkeeping the spec's delta store describes
/// (§4.2, §9 "back-references and shared mutation"): a `RawElement` is
/// `Copy` and small, so "stable addresses" becomes "every consumer gets
/// its own valid copy" rather than an arena of pinned slots. See
/// DESIGN.md for the full rationale.
#[derive(Clone, Copy, Debug, Eq)]
pub struct RawElement {
  buf: [u8; MAX_LITERAL_VALUE_SIZE],
  len: u8,
  type_tag: u8,
}

impl PartialEq for RawElement {
  fn eq(&self, other: &Self) -> bool {
    self.type_tag == other.type_tag && self.value() == other.value()
  }
}

impl RawElement {
  /// The canonical end-of-sequence element: type `EOO`, no value.
  pub const fn eoo() -> Self {
    RawElement {
      buf: [0; MAX_LITERAL_VALUE_SIZE],
      len: 0,
      type_tag: EOO,
    }
  }

  /// Builds an element from a type byte and up to
  /// [`MAX_LITERAL_VALUE_SIZE`] value bytes. A value wider than that is
  /// rejected outright; everything `MAX_LITERAL_VALUE_SIZE` bytes or
  /// narrower round-trips, whether or not it is wide enough to ever
  /// participate in delta compression (that is `V_MAX`, checked
  /// separately by the delta store).
  pub fn new(type_tag: u8, value: &[u8]) -> ColumnResult<Self> {
    if value.len() > MAX_LITERAL_VALUE_SIZE {
      return Err(ColumnError::invalid_argument(format!(
        "value of {} bytes exceeds this element view's {}-byte limit",
        value.len(),
        MAX_LITERAL_VALUE_SIZE
      )));
    }
    let mut buf = [0u8; MAX_LITERAL_VALUE_SIZE];
    buf[..value.len()].copy_from_slice(value);
    Ok(RawElement {
      buf,
      len: value.len() as u8,
      type_tag,
    })
  }

  /// Parses one element (type byte + empty name + value bytes) from the
  /// head of `bytes`, given the value's width. Returns the element and
  /// the number of bytes consumed (`VALUE_OFFSET + valuesize`).
  ///
  /// The element format contract (§6.2) fixes `nameLen == 1`: exactly
  /// one `NUL` byte for the empty name. A non-empty name is a
  /// structural error (invariant 3).
  pub fn parse(bytes: &[u8], valuesize: usize) -> ColumnResult<(Self, usize)> {
    let total = VALUE_OFFSET + valuesize;
    if bytes.len() < total {
      return Err(ColumnError::corruption(
        "element truncated: fewer bytes than its declared size",
      ));
    }
    let type_tag = bytes[0];
    if bytes[1] != 0 {
      return Err(ColumnError::corruption(
        "column element has a non-empty field name",
      ));
    }
    let value = &bytes[VALUE_OFFSET..total];
    let elem = Self::new(type_tag, value)?;
    Ok((elem, total))
  }

  /// Writes `type + 0x00 (empty name) + value` into `out`.
  pub fn append_to(&self, out: &mut Vec<u8>) {
    out.push(self.type_tag);
    out.push(0);
    out.extend_from_slice(self.value());
  }

  pub fn rawdata(&self) -> [u8; MAX_RAWDATA_SIZE] {
    let mut out = [0u8; MAX_RAWDATA_SIZE];
    out[0] = self.type_tag;
    out[2..2 + self.value().len()].copy_from_slice(self.value());
    out
  }

  /// The value interpreted as a little-endian `u64`, zero-extended.
  /// Only meaningful when `valuesize() <= 8`; wider values are truncated
  /// to their low 8 bytes rather than panicking, since callers outside
  /// the delta store (which already checks width against `V_MAX` before
  /// calling this) have no such guarantee.
  pub fn value_u64(&self) -> u64 {
    let mut bytes = [0u8; 8];
    let n = (self.len as usize).min(8);
    bytes[..n].copy_from_slice(&self.value()[..n]);
    u64::from_le_bytes(bytes)
  }
}

impl Element for RawElement {
  fn type_tag(&self) -> u8 {
    self.type_tag
  }

  fn valuesize(&self) -> usize {
    self.len as usize
  }

  fn value(&self) -> &[u8] {
    &self.buf[..self.len as usize]
  }

  fn binary_equal_values(&self, other: &Self) -> bool {
    if self.is_eoo() || other.is_eoo() {
      return false;
    }
    self == other
  }
}
