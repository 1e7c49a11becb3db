//! The column iterator / decoder (spec §4.3): executes the instruction
//! stream, tracking the logical index and producing either a literal
//! element reference or a delta-store-materialized one.

use crate::column::{Column, ElementSchema, InstructionCursor};
use crate::element::RawElement;
use crate::errors::{ColumnError, ColumnResult};
use crate::instruction::Instruction;

/// A forward iterator over one [`Column`]. Borrows the column (and
/// through it, the shared delta store) for its lifetime; several
/// iterators may coexist over the same column, each assigning
/// `delta_index` in the order they individually advance (spec §5).
pub struct ColumnIter<'a, 'b, S: ElementSchema> {
  column: &'b Column<'a>,
  schema: &'b S,
  cur: RawElement,
  cursor: InstructionCursor<'a>,
  /// Positive = copies remaining; negative = deltas remaining; zero =
  /// need the next instruction.
  count: i64,
  index: usize,
  delta: u64,
  delta_index: usize,
  emitted_initial: bool,
  exhausted: bool,
}

impl<'a, 'b, S: ElementSchema> ColumnIter<'a, 'b, S> {
  pub(crate) fn begin(column: &'b Column<'a>, schema: &'b S) -> ColumnResult<Self> {
    match column.initial_literal(schema)? {
      None => Ok(ColumnIter {
        column,
        schema,
        cur: RawElement::eoo(),
        cursor: InstructionCursor::new(&[], 0),
        count: 0,
        index: 0,
        delta: 0,
        delta_index: 0,
        emitted_initial: true,
        exhausted: true,
      }),
      Some((cur, cursor)) => Ok(ColumnIter {
        column,
        schema,
        cur,
        cursor,
        // The initial literal is emitted by `next()`'s `emitted_initial`
        // fast path, not by `advance()`; starting `count` at 0 makes the
        // first `advance()` step straight to the next instruction instead
        // of re-emitting it at index 1.
        count: 0,
        index: 0,
        delta: 0,
        delta_index: 0,
        emitted_initial: false,
        exhausted: false,
      }),
    }
  }

  /// Position within the instruction stream, paired with `count` —
  /// together these are this iterator's comparable "structural
  /// position" (spec §4.3 equality).
  pub fn cursor_position(&self) -> (usize, i64) {
    (self.cursor.position(), self.count)
  }

  pub fn is_end(&self) -> bool {
    self.exhausted
  }

  fn step_instruction(&mut self) -> ColumnResult<()> {
    let instr = self.cursor.parse_instruction()?;
    match instr {
      Instruction::Literal0 { type_tag } | Instruction::Literal1 { type_tag } => {
        let valuesize = self.schema.value_width(type_tag)?;
        self.cur = self.cursor.read_literal_tail(type_tag, valuesize)?;
        self.count = 1;
        self.delta = 0;
      }
      Instruction::Skip { count } => {
        self.index = self
          .index
          .checked_add(count as usize)
          .ok_or_else(|| ColumnError::corruption("Skip instruction overflowed logical index"))?;
      }
      Instruction::Delta { count } => {
        self.count = -i64::try_from(count)
          .map_err(|_| ColumnError::corruption("Delta run count too large to represent"))?;
      }
      Instruction::Copy { count } => {
        self.count = i64::try_from(count)
          .map_err(|_| ColumnError::corruption("Copy run count too large to represent"))?;
      }
      Instruction::SetNegDelta { delta } => {
        self.delta = delta.wrapping_neg();
        self.cur = self.column.delta_store().apply_delta(
          self.delta_index,
          self.cur,
          self.delta,
          self.column.config().value_width_limit,
        )?;
        self.delta_index += 1;
        self.count = 1;
      }
      Instruction::SetDelta { delta } => {
        self.delta = delta;
        self.cur = self.column.delta_store().apply_delta(
          self.delta_index,
          self.cur,
          self.delta,
          self.column.config().value_width_limit,
        )?;
        self.delta_index += 1;
        self.count = 1;
      }
    }
    Ok(())
  }

  fn advance(&mut self) -> ColumnResult<Option<(usize, RawElement)>> {
    while self.count == 0 {
      if self.cursor.at_terminator() {
        self.exhausted = true;
        return Ok(None);
      }
      self.step_instruction()?;
    }
    self.index += 1;
    if self.count > 0 {
      self.count -= 1;
    } else {
      self.count += 1;
      self.cur = self.column.delta_store().apply_delta(
        self.delta_index,
        self.cur,
        self.delta,
        self.column.config().value_width_limit,
      )?;
      self.delta_index += 1;
    }
    Ok(Some((self.index, self.cur)))
  }

  /// A fast skip that collapses any remaining positive `count` (a
  /// pending `Copy` run) into a single index jump, then advances once
  /// more — useful when the caller does not care about repeated
  /// values.
  pub fn next_different(&mut self) -> Option<ColumnResult<(usize, RawElement)>> {
    if !self.emitted_initial {
      return self.next();
    }
    if self.exhausted {
      return None;
    }
    if self.count > 0 {
      self.index += self.count as usize;
      self.count = 0;
    }
    match self.advance() {
      Ok(Some(pair)) => Some(Ok(pair)),
      Ok(None) => None,
      Err(e) => {
        self.exhausted = true;
        Some(Err(e))
      }
    }
  }

  /// Consumes the iterator, returning the number of emitted positions
  /// (spec §4.3 `nFields()`).
  pub(crate) fn count_checked(mut self) -> ColumnResult<usize> {
    let mut n = 0usize;
    while let Some(item) = self.next() {
      item?;
      n += 1;
    }
    Ok(n)
  }
}

impl<'a, 'b, S: ElementSchema> Iterator for ColumnIter<'a, 'b, S> {
  type Item = ColumnResult<(usize, RawElement)>;

  fn next(&mut self) -> Option<Self::Item> {
    if !self.emitted_initial {
      self.emitted_initial = true;
      if self.exhausted {
        return None;
      }
      return Some(Ok((self.index, self.cur)));
    }
    if self.exhausted {
      return None;
    }
    match self.advance() {
      Ok(Some(pair)) => Some(Ok(pair)),
      Ok(None) => None,
      Err(e) => {
        self.exhausted = true;
        Some(Err(e))
      }
    }
  }
}
