//! The column builder / encoder (spec §4.4): consumes `(index, element)`
//! pairs in index order and emits the smallest of literal, copy-run,
//! delta-run, or set-delta.

use crate::column::ColumnCodecConfig;
use crate::constants::{EOO, V_MAX};
use crate::delta_store::DeltaStore;
use crate::element::{Element, RawElement};
use crate::errors::{ColumnError, ColumnResult};
use crate::instruction::Instruction;

/// Builds one column's payload into a caller-owned `Vec<u8>`.
///
/// This crate scopes the enclosing document format out of its core
/// (spec §1), so unlike the teacher's `BitWriter`/`Compressor`, which
/// back-patch a 32-bit compressed-body-size field belonging to their
/// own wire format, `ColumnBuilder` never reserves or back-patches a
/// length slot: the buffer it writes *is* the column payload of §6.1,
/// and any length-prefixing the enclosing format wants is that host's
/// concern, applied around these bytes.
pub struct ColumnBuilder<'a> {
  out: &'a mut Vec<u8>,
  last: Option<RawElement>,
  delta: u64,
  index: usize,
  /// Positive = deferred `Copy` count; negative = deferred `Delta` count.
  deferred: i64,
  finished: bool,
  value_width_limit: usize,
}

impl<'a> ColumnBuilder<'a> {
  pub fn new(out: &'a mut Vec<u8>) -> Self {
    Self::with_config(out, ColumnCodecConfig::default())
  }

  /// Builds a column honoring `config.value_width_limit` — a host that
  /// narrows this below [`V_MAX`] gets literals instead of set-delta
  /// instructions for any value wider than the limit, even though this
  /// codec could otherwise delta-compress it.
  pub fn with_config(out: &'a mut Vec<u8>, config: ColumnCodecConfig) -> Self {
    ColumnBuilder {
      out,
      last: None,
      delta: 0,
      index: 0,
      deferred: 0,
      finished: false,
      value_width_limit: config.value_width_limit.min(V_MAX),
    }
  }

  /// Like [`ColumnBuilder::new`], but reserves `additional` bytes up
  /// front, mirroring the teacher's pre-sized `BitWriter`/compressor
  /// buffers.
  pub fn with_capacity(out: &'a mut Vec<u8>, additional: usize) -> Self {
    out.reserve(additional);
    Self::new(out)
  }

  fn flush_deferrals(&mut self) {
    if self.deferred > 0 {
      Instruction::Copy {
        count: self.deferred as u64,
      }
      .append_to(self.out);
    } else if self.deferred < 0 {
      Instruction::Delta {
        count: (-self.deferred) as u64,
      }
      .append_to(self.out);
    }
    self.deferred = 0;
  }

  fn emit_literal(&mut self, elem: RawElement) -> ColumnResult<()> {
    // Validates the type tag is representable at all (spec §4.1); the
    // bytes written are `type + 0x00 + value` whether this is the
    // column's very first element or a later literal fallback — the
    // two are only distinguished by the decoder's position in the
    // stream, not by their encoding.
    Instruction::literal_for_type(elem.type_tag())?;
    elem.append_to(self.out);
    self.last = Some(elem);
    self.delta = 0;
    Ok(())
  }

  fn reopen_if_finished(&mut self) {
    if self.finished {
      debug_assert_eq!(self.out.last(), Some(&EOO));
      self.out.pop();
      self.finished = false;
    }
  }

  /// Appends the element at `target_index`. Indices must be
  /// non-decreasing across calls (spec §4.4's precondition); the very
  /// first call must target index 0, since the wire format's initial
  /// literal (§6.1) is unconditionally the column's logical index 0 and
  /// a column cannot represent a gap preceding it.
  pub fn append(&mut self, target_index: usize, elem: RawElement) -> ColumnResult<()> {
    self.reopen_if_finished();

    if target_index < self.index {
      return Err(ColumnError::invalid_argument(format!(
        "append index {target_index} precedes the builder's current index {}",
        self.index
      )));
    }
    if self.last.is_none() && target_index != 0 {
      return Err(ColumnError::invalid_argument(format!(
        "the first appended element must be at index 0, got {target_index}"
      )));
    }

    if target_index > self.index {
      self.flush_deferrals();
      Instruction::Skip {
        count: (target_index - self.index) as u64,
      }
      .append_to(self.out);
      self.index = target_index;
    }

    if let Some(last) = self.last {
      if elem.binary_equal_values(&last) {
        if self.deferred < 0 {
          self.flush_deferrals();
        }
        self.deferred += 1;
        self.index += 1;
        return Ok(());
      }

      if let Some(d) = DeltaStore::calculate_delta(&last, &elem, self.value_width_limit) {
        if d == self.delta {
          if self.deferred > 0 {
            self.flush_deferrals();
          }
          self.deferred -= 1;
          self.last = Some(elem);
          self.index += 1;
          return Ok(());
        }

        let positive = Instruction::SetDelta { delta: d };
        let negative = Instruction::SetNegDelta {
          delta: d.wrapping_neg(),
        };
        let chosen = if negative.size_bytes() < positive.size_bytes() {
          negative
        } else {
          positive
        };
        if chosen.size_bytes() < elem.size() {
          self.flush_deferrals();
          chosen.append_to(self.out);
          self.delta = d;
          self.last = Some(elem);
          self.index += 1;
          return Ok(());
        }
      }
    }

    self.flush_deferrals();
    self.emit_literal(elem)?;
    self.index += 1;
    Ok(())
  }

  /// Appends the `EOO` terminator and fixes up the buffer. Idempotent:
  /// a subsequent `append` transparently reopens the buffer.
  pub fn done(&mut self) -> ColumnResult<()> {
    if self.finished {
      return Ok(());
    }
    self.flush_deferrals();
    self.out.push(EOO);
    self.finished = true;
    Ok(())
  }

  /// The number of logical positions filled so far (including gaps).
  pub fn len(&self) -> usize {
    self.index
  }

  pub fn is_empty(&self) -> bool {
    self.index == 0
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::column::{Column, SUBTYPE_COLUMN, TYPE_BINARY_SUBTYPED};
  use crate::schema::{DemoSchema, TYPE_DECIMAL128, TYPE_DOUBLE, TYPE_INT32};

  fn encode(pairs: &[(usize, RawElement)]) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut builder = ColumnBuilder::new(&mut bytes);
    for (idx, elem) in pairs {
      builder.append(*idx, *elem).unwrap();
    }
    builder.done().unwrap();
    bytes
  }

  fn decode_all(bytes: &[u8]) -> ColumnResult<Vec<(usize, RawElement)>> {
    let col = Column::wrap(TYPE_BINARY_SUBTYPED, SUBTYPE_COLUMN, bytes, 1 << 20)?;
    col.iter(&DemoSchema)?.collect()
  }

  #[test]
  fn first_append_must_be_index_zero() {
    let mut bytes = Vec::new();
    let mut builder = ColumnBuilder::new(&mut bytes);
    let elem = RawElement::new(TYPE_INT32, &4i32.to_le_bytes()).unwrap();
    assert!(builder.append(3, elem).is_err());
  }

  #[test]
  fn rejects_non_monotonic_index() {
    let mut bytes = Vec::new();
    let mut builder = ColumnBuilder::new(&mut bytes);
    let elem = RawElement::new(TYPE_INT32, &4i32.to_le_bytes()).unwrap();
    builder.append(0, elem).unwrap();
    builder.append(5, elem).unwrap();
    assert!(builder.append(2, elem).is_err());
  }

  #[test]
  fn oversized_value_always_falls_back_to_literal() {
    // spec.md §8 scenario 5.
    let a = RawElement::new(TYPE_DECIMAL128, &[1; 16]).unwrap();
    let b = RawElement::new(TYPE_DECIMAL128, &[2; 16]).unwrap();
    let bytes = encode(&[(0, a), (1, b)]);
    let decoded = decode_all(&bytes).unwrap();
    assert_eq!(decoded, vec![(0, a), (1, b)]);
    // No SetDelta/SetNegDelta op byte (kind 5 or 6) should appear.
    for &byte in &bytes {
      if byte & 0x80 == 0 && byte != EOO {
        let kind = byte >> 4;
        assert_ne!(kind, 5);
        assert_ne!(kind, 6);
      }
    }
  }

  #[test]
  fn done_is_idempotent_and_append_reopens() {
    let mut bytes = Vec::new();
    let mut builder = ColumnBuilder::new(&mut bytes);
    let elem = RawElement::new(TYPE_INT32, &1i32.to_le_bytes()).unwrap();
    builder.append(0, elem).unwrap();
    builder.done().unwrap();
    builder.done().unwrap();
    assert_eq!(bytes.last(), Some(&EOO));

    builder.append(1, elem).unwrap();
    builder.done().unwrap();
    let decoded = decode_all(&bytes).unwrap();
    assert_eq!(decoded, vec![(0, elem), (1, elem)]);
  }

  #[test]
  fn size_never_exceeds_literal_plus_overhead() {
    // spec.md §8 "size monotonicity": never worse than literal encoding
    // plus the column's own (here: zero) header overhead.
    let mut pairs = Vec::new();
    for i in 0..50usize {
      let v = (i as f64) * 0.25;
      pairs.push((i, RawElement::new(TYPE_DOUBLE, &v.to_le_bytes()).unwrap()));
    }
    let bytes = encode(&pairs);
    let literal_upper_bound: usize = pairs.iter().map(|(_, e)| e.size()).sum::<usize>() + 1;
    assert!(bytes.len() <= literal_upper_bound);
    assert_eq!(decode_all(&bytes).unwrap(), pairs);
  }

  #[test]
  fn narrower_width_limit_forces_literal_instead_of_set_delta() {
    let a = RawElement::new(TYPE_INT32, &1i32.to_le_bytes()).unwrap();
    let b = RawElement::new(TYPE_INT32, &1_000_000i32.to_le_bytes()).unwrap();

    let mut wide = Vec::new();
    let mut builder = ColumnBuilder::new(&mut wide);
    builder.append(0, a).unwrap();
    builder.append(1, b).unwrap();
    builder.done().unwrap();

    let mut narrow = Vec::new();
    let config = crate::column::ColumnCodecConfig::new(1 << 20, 2).unwrap();
    let mut builder = ColumnBuilder::with_config(&mut narrow, config);
    builder.append(0, a).unwrap();
    builder.append(1, b).unwrap();
    builder.done().unwrap();

    // Both round-trip, but the narrow-limit encoding cannot use a
    // SetDelta/SetNegDelta instruction (kind 5 or 6) for the second value.
    assert_eq!(decode_all(&wide).unwrap(), vec![(0, a), (1, b)]);
    assert_eq!(decode_all(&narrow).unwrap(), vec![(0, a), (1, b)]);
    assert!(narrow.len() > wide.len());
  }

  #[test]
  fn gap_then_resume_round_trips() {
    let a = RawElement::new(TYPE_INT32, &1i32.to_le_bytes()).unwrap();
    let b = RawElement::new(TYPE_INT32, &2i32.to_le_bytes()).unwrap();
    let bytes = encode(&[(0, a), (5, b)]);
    let decoded = decode_all(&bytes).unwrap();
    assert_eq!(decoded, vec![(0, a), (5, b)]);
    let col = Column::wrap(TYPE_BINARY_SUBTYPED, SUBTYPE_COLUMN, &bytes, 1 << 20).unwrap();
    assert!(col.get(2, &DemoSchema).unwrap().is_eoo());
  }
}
