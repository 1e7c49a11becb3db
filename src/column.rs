//! The column view (spec §4.3): wraps one binary-subtyped element of
//! the enclosing document format, validates the wire invariants in
//! O(1), and owns the delta store shared by every iterator over it.

use std::cell::Cell;

use crate::constants::{DEFAULT_MAX_USER_SIZE, EOO, V_MAX};
use crate::delta_store::DeltaStore;
use crate::element::RawElement;
use crate::errors::{ColumnError, ColumnResult};
use crate::instruction::Instruction;
use crate::iter::ColumnIter;

/// The type tag a host document format assigns to "binary, subtyped"
/// elements. This and [`SUBTYPE_COLUMN`] are the two tags a host wraps
/// a column in; a real host format supplies its own values for these,
/// this crate's constants are the ones its own tests wrap against.
pub const TYPE_BINARY_SUBTYPED: u8 = 0x05;
/// The binary subtype reserved for columns.
pub const SUBTYPE_COLUMN: u8 = 0x06;

/// Maps a literal's type tag to the fixed number of value bytes that
/// type occupies on the wire. A column's bytes never encode a value's
/// width explicitly (spec §3's `Element.size = 1 + 1 + valuesize`
/// depends on the host knowing `valuesize` from `type` alone) — this is
/// the remainder of the §6.2 "thin element abstraction" contract a host
/// supplies, beyond the [`Element`](crate::element::Element) trait
/// itself.
pub trait ElementSchema {
  fn value_width(&self, type_tag: u8) -> ColumnResult<usize>;
}

/// The two host-supplied knobs spec.md §6.3 and §9 leave to the host: the
/// payload size ceiling (`MAX_USER_SIZE`), and how wide a value this codec
/// will attempt to delta-compress before always falling back to a literal.
/// `value_width_limit` can only narrow [`V_MAX`], never widen it — `Column`
/// and `ColumnBuilder` both reject a wider one at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnCodecConfig {
  pub max_user_size: usize,
  pub value_width_limit: usize,
}

impl Default for ColumnCodecConfig {
  fn default() -> Self {
    ColumnCodecConfig {
      max_user_size: DEFAULT_MAX_USER_SIZE,
      value_width_limit: V_MAX,
    }
  }
}

impl ColumnCodecConfig {
  pub fn new(max_user_size: usize, value_width_limit: usize) -> ColumnResult<Self> {
    if value_width_limit > V_MAX {
      return Err(ColumnError::invalid_argument(format!(
        "value_width_limit {value_width_limit} exceeds V_MAX={V_MAX}"
      )));
    }
    Ok(ColumnCodecConfig {
      max_user_size,
      value_width_limit,
    })
  }
}

/// A cursor into a column's instruction stream, handed to an iterator
/// alongside the initial literal by [`Column::initial_literal`]. This is
/// the "friend access" design note (§9) rendered as an owned value
/// instead of C++-style private-member friendship: the iterator holds
/// this cursor, not a reference into `Column`'s internals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstructionCursor<'a> {
  payload: &'a [u8],
  pos: usize,
}

impl<'a> InstructionCursor<'a> {
  pub(crate) fn new(payload: &'a [u8], pos: usize) -> Self {
    InstructionCursor { payload, pos }
  }

  pub fn position(&self) -> usize {
    self.pos
  }

  pub fn at_terminator(&self) -> bool {
    self.payload.get(self.pos) == Some(&EOO)
  }

  /// Parses the next instruction, advancing past its own bytes (but
  /// not past any literal element bytes that follow it).
  pub fn parse_instruction(&mut self) -> ColumnResult<Instruction> {
    if self.at_terminator() {
      return Err(ColumnError::corruption(
        "attempted to parse an instruction at the column terminator",
      ));
    }
    let (instr, consumed) = Instruction::parse(&self.payload[self.pos..])?;
    self.pos += consumed;
    Ok(instr)
  }

  /// Reads the name+value tail of a literal whose type tag was just
  /// consumed as an instruction's op byte, given that type's value
  /// width. Returns the assembled element.
  pub fn read_literal_tail(&mut self, type_tag: u8, valuesize: usize) -> ColumnResult<RawElement> {
    let rest = &self.payload[self.pos..];
    if rest.len() < 1 + valuesize {
      return Err(ColumnError::corruption(
        "literal element truncated before its declared value width",
      ));
    }
    if rest[0] != 0 {
      return Err(ColumnError::corruption(
        "column element has a non-empty field name",
      ));
    }
    let elem = RawElement::new(type_tag, &rest[1..1 + valuesize])?;
    self.pos += 1 + valuesize;
    Ok(elem)
  }
}

/// A column: an ordered, sparse sequence of small typed scalar
/// elements, encoded as the bytes of one binary-subtyped element
/// (spec §3, §4.3).
pub struct Column<'a> {
  /// `initial-literal instruction* EOO`, or empty for a column wrapping
  /// a bare `EOO` host element (spec §8 scenario 2).
  payload: &'a [u8],
  delta_store: DeltaStore,
  cached_n_fields: Cell<Option<usize>>,
  config: ColumnCodecConfig,
}

impl<'a> Column<'a> {
  /// Wraps a host element using the default [`ColumnCodecConfig`], with
  /// `max_user_size` overridden to `max_user_size`. Equivalent to
  /// `wrap_with_config` with `value_width_limit: V_MAX`.
  pub fn wrap(
    type_tag: u8,
    subtype: u8,
    payload: &'a [u8],
    max_user_size: usize,
  ) -> ColumnResult<Self> {
    Self::wrap_with_config(
      type_tag,
      subtype,
      payload,
      ColumnCodecConfig {
        max_user_size,
        ..ColumnCodecConfig::default()
      },
    )
  }

  /// Wraps a host element. `type_tag == EOO` yields the empty column;
  /// otherwise `type_tag`/`subtype` must match
  /// [`TYPE_BINARY_SUBTYPED`]/[`SUBTYPE_COLUMN`], `payload.len()` must
  /// not exceed `config.max_user_size`, and `payload` must end in exactly
  /// one `EOO` byte (invariants 1-2).
  pub fn wrap_with_config(
    type_tag: u8,
    subtype: u8,
    payload: &'a [u8],
    config: ColumnCodecConfig,
  ) -> ColumnResult<Self> {
    if type_tag == EOO {
      if !payload.is_empty() {
        return Err(ColumnError::corruption(
          "EOO host element cannot carry column payload bytes",
        ));
      }
      return Ok(Column {
        payload,
        delta_store: DeltaStore::new(),
        cached_n_fields: Cell::new(Some(0)),
        config,
      });
    }
    if type_tag != TYPE_BINARY_SUBTYPED {
      return Err(ColumnError::corruption(format!(
        "expected binary-subtyped element, got type {type_tag}"
      )));
    }
    if subtype != SUBTYPE_COLUMN {
      return Err(ColumnError::corruption(format!(
        "expected column subtype {SUBTYPE_COLUMN}, got {subtype}"
      )));
    }
    if payload.len() > config.max_user_size {
      return Err(ColumnError::corruption(format!(
        "column payload of {} bytes exceeds max_user_size {}",
        payload.len(),
        config.max_user_size
      )));
    }
    if payload.last() != Some(&EOO) {
      return Err(ColumnError::corruption(
        "column payload does not end in an EOO terminator",
      ));
    }
    Ok(Column {
      payload,
      delta_store: DeltaStore::new(),
      cached_n_fields: Cell::new(None),
      config,
    })
  }

  pub fn config(&self) -> ColumnCodecConfig {
    self.config
  }

  pub fn is_empty(&self) -> bool {
    self.payload.is_empty()
  }

  /// Size of the wrapped host element. For a non-empty column this is
  /// the payload's length (instruction stream plus terminator); for an
  /// empty column the wrapped host element is the bare `EOO` byte
  /// itself, so `objsize() == 1` (spec §8 scenario 2).
  pub fn objsize(&self) -> usize {
    if self.payload.is_empty() {
      1
    } else {
      self.payload.len()
    }
  }

  pub(crate) fn delta_store(&self) -> &DeltaStore {
    &self.delta_store
  }

  /// A cursor positioned just past the initial literal, alongside that
  /// literal itself — the starting state an iterator's `begin()` needs.
  pub(crate) fn initial_literal<S: ElementSchema>(
    &self,
    schema: &S,
  ) -> ColumnResult<Option<(RawElement, InstructionCursor<'a>)>> {
    if self.payload.is_empty() {
      return Ok(None);
    }
    let type_tag = self.payload[0];
    if type_tag == EOO {
      return Err(ColumnError::corruption(
        "non-empty column payload begins with EOO instead of a literal",
      ));
    }
    let valuesize = schema.value_width(type_tag)?;
    let (elem, consumed) = RawElement::parse(self.payload, valuesize)?;
    Ok(Some((elem, InstructionCursor::new(self.payload, consumed))))
  }

  /// Begins a forward iterator over this column.
  pub fn iter<'b, S: ElementSchema>(&'b self, schema: &'b S) -> ColumnResult<ColumnIter<'a, 'b, S>> {
    ColumnIter::begin(self, schema)
  }

  /// Number of emitted (non-gap) positions, computed once and cached
  /// (spec §4.3 `nFields()`, plus the caching this crate's SPEC_FULL
  /// adds since a column's bytes never mutate after wrapping).
  pub fn n_fields<S: ElementSchema>(&self, schema: &S) -> ColumnResult<usize> {
    if let Some(n) = self.cached_n_fields.get() {
      return Ok(n);
    }
    let n = self.iter(schema)?.count_checked()?;
    self.cached_n_fields.set(Some(n));
    Ok(n)
  }

  /// A textual dump of the instruction stream, one line per instruction
  /// (spec §4.1): a testing aid, never a production interface. Walks the
  /// stream exactly as `ColumnIter` does but renders instructions instead
  /// of decoding values, stopping at the terminator.
  #[cfg(test)]
  pub(crate) fn disassemble<S: ElementSchema>(&self, schema: &S) -> ColumnResult<Vec<String>> {
    if self.payload.is_empty() {
      return Ok(Vec::new());
    }
    let (initial, mut cursor) = self
      .initial_literal(schema)?
      .expect("non-empty column payload always has an initial literal");
    let mut lines = vec![format!(
      "InitialLiteral(type={}, size={})",
      initial.type_tag(),
      initial.size()
    )];
    while !cursor.at_terminator() {
      let instr = cursor.parse_instruction()?;
      if let Instruction::Literal0 { type_tag } | Instruction::Literal1 { type_tag } = instr {
        let width = schema.value_width(type_tag)?;
        cursor.read_literal_tail(type_tag, width)?;
      }
      lines.push(instr.to_string());
    }
    Ok(lines)
  }

  /// Returns the element at logical index `i`, or `RawElement::eoo()`
  /// if `i` lies in a gap or beyond the end of the column.
  pub fn get<S: ElementSchema>(&self, index: usize, schema: &S) -> ColumnResult<RawElement> {
    let mut it = self.iter(schema)?;
    match it.find(|res| matches!(res, Ok((i, _)) if *i == index)) {
      Some(Ok((_, elem))) => Ok(elem),
      Some(Err(e)) => Err(e),
      None => Ok(RawElement::eoo()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::builder::ColumnBuilder;
  use crate::element::Element;
  use crate::schema::{DemoSchema, TYPE_DOUBLE, TYPE_INT32};

  #[test]
  fn empty_host_element_is_empty_column() {
    let col = Column::wrap(EOO, 0, &[], 1024).unwrap();
    assert!(col.is_empty());
    assert_eq!(col.objsize(), 1);
    assert_eq!(col.n_fields(&DemoSchema).unwrap(), 0);
  }

  #[test]
  fn rejects_payload_without_terminator() {
    let payload = [0x01u8, 0, 1, 2, 3, 4, 5, 6, 7, 8];
    assert!(Column::wrap(TYPE_BINARY_SUBTYPED, SUBTYPE_COLUMN, &payload, 1024).is_err());
  }

  #[test]
  fn rejects_wrong_type_or_subtype() {
    let payload = [0x01u8, 0, 1, 2, 3, 4, 5, 6, 7, 8, EOO];
    assert!(Column::wrap(0x09, SUBTYPE_COLUMN, &payload, 1024).is_err());
    assert!(Column::wrap(TYPE_BINARY_SUBTYPED, 0x02, &payload, 1024).is_err());
  }

  #[test]
  fn rejects_oversized_payload() {
    let payload = [0x01u8, 0, 1, 2, 3, 4, 5, 6, 7, 8, EOO];
    assert!(Column::wrap(TYPE_BINARY_SUBTYPED, SUBTYPE_COLUMN, &payload, 4).is_err());
  }

  #[test]
  fn single_literal_column_has_one_field() {
    let payload = [0x01u8, 0, 1, 2, 3, 4, 5, 6, 7, 8, EOO];
    let col = Column::wrap(TYPE_BINARY_SUBTYPED, SUBTYPE_COLUMN, &payload, 1024).unwrap();
    assert_eq!(col.n_fields(&DemoSchema).unwrap(), 1);
    let elem = col.get(0, &DemoSchema).unwrap();
    assert_eq!(elem.type_tag(), 0x01);
    assert_eq!(elem.value(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    assert!(col.get(1, &DemoSchema).unwrap().is_eoo());
  }

  #[test]
  fn disassemble_one_line_per_instruction_plus_initial_literal() {
    // spec.md §8 scenario 6.
    let mut bytes = Vec::new();
    let mut builder = ColumnBuilder::new(&mut bytes);
    for i in 0..5 {
      builder
        .append(i, RawElement::new(TYPE_DOUBLE, &1.5f64.to_le_bytes()).unwrap())
        .unwrap();
    }
    builder
      .append(5, RawElement::new(TYPE_INT32, &7i32.to_le_bytes()).unwrap())
      .unwrap();
    builder.done().unwrap();

    let col = Column::wrap(TYPE_BINARY_SUBTYPED, SUBTYPE_COLUMN, &bytes, 1024).unwrap();
    let lines = col.disassemble(&DemoSchema).unwrap();
    assert!(lines[0].starts_with("InitialLiteral"));
    assert!(lines.iter().any(|l| l.starts_with("Copy")));
    assert!(lines.iter().any(|l| l.starts_with("Literal")));

    // Disassembling twice is deterministic.
    assert_eq!(lines, col.disassemble(&DemoSchema).unwrap());
  }
}
