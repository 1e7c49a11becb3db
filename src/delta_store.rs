//! The delta-materialization store (spec §4.2): owns the decoded
//! elements produced by applying a delta to a prior element's value
//! bytes.
//!
//! Because [`RawElement`](crate::element::RawElement) is a small `Copy`
//! value type rather than a pointer into an arena, "owning" a
//! materialized element here just means recording its bytes once per
//! `delta_index`, so every iterator sharing a `Column` computes (and, on
//! replay, re-validates) the same bytes at the same index — spec
//! invariant 6, "for any two iterators over the same column, the n-th
//! delta application produces byte-identical output".

use std::cell::RefCell;

use crate::element::{Element, RawElement};
use crate::errors::{ColumnError, ColumnResult};

/// Append-only arena of elements produced by delta application.
/// Shared (via `&Column`) by every iterator over one column; grows
/// monotonically and never frees or reorders a slot.
#[derive(Debug, Default)]
pub struct DeltaStore {
  slots: RefCell<Vec<RawElement>>,
}

impl DeltaStore {
  pub fn new() -> Self {
    DeltaStore::default()
  }

  pub fn len(&self) -> usize {
    self.slots.borrow().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Computes `base.value + delta (mod 2^64)`, keeping `base`'s type
  /// and valuesize, and records or validates it at `delta_index`.
  ///
  /// `width_limit` is the host's configured delta-compressible width
  /// (spec §9; a `Column` threads its own `ColumnCodecConfig` value here),
  /// never more than [`V_MAX`](crate::constants::V_MAX).
  ///
  /// * `delta_index == len()`: appends a new slot.
  /// * `delta_index < len()`: asserts the stored bytes match (the
  ///   determinism invariant); a mismatch is a corrupted/non-deterministic
  ///   column and is reported as a typed error rather than a panic, so a
  ///   host embedding this codec over untrusted bytes can recover.
  /// * `delta_index > len()`: the column skipped a slot, which can only
  ///   happen if two iterators over the same column raced without
  ///   external synchronization (spec §5) — reported the same way.
  pub fn apply_delta(
    &self,
    delta_index: usize,
    base: RawElement,
    delta: u64,
    width_limit: usize,
  ) -> ColumnResult<RawElement> {
    if base.valuesize() == 0 || base.valuesize() > width_limit {
      return Err(ColumnError::corruption(format!(
        "cannot delta a value of {} bytes against a width limit of {width_limit}",
        base.valuesize()
      )));
    }
    let sum = base.value_u64().wrapping_add(delta);
    let result_bytes = sum.to_le_bytes();
    let materialized = RawElement::new(base.type_tag(), &result_bytes[..base.valuesize()])?;

    let mut slots = self.slots.borrow_mut();
    match delta_index.cmp(&slots.len()) {
      std::cmp::Ordering::Less => {
        let existing = slots[delta_index];
        if existing != materialized {
          return Err(ColumnError::corruption(format!(
            "delta store determinism violated at index {delta_index}: \
             expected {existing:?}, recomputed {materialized:?}"
          )));
        }
        Ok(existing)
      }
      std::cmp::Ordering::Equal => {
        slots.push(materialized);
        Ok(materialized)
      }
      std::cmp::Ordering::Greater => Err(ColumnError::corruption(format!(
        "delta store index {delta_index} skips ahead of current length {}",
        slots.len()
      ))),
    }
  }

  /// Returns a nonzero delta `d` such that
  /// `apply_delta(_, base, d) == modified`, or `None` when no delta is
  /// applicable: different types, mismatched or oversized valuesize, or
  /// the identity case (encoded as `Copy`, never as a zero delta).
  ///
  /// Takes `width_limit` rather than a `&self` since the builder calls
  /// this while deciding how to encode, before any `DeltaStore` exists.
  pub fn calculate_delta(base: &RawElement, modified: &RawElement, width_limit: usize) -> Option<u64> {
    if base.type_tag() != modified.type_tag() {
      return None;
    }
    if base.valuesize() != modified.valuesize() {
      return None;
    }
    if base.valuesize() == 0 || base.valuesize() > width_limit {
      return None;
    }
    let delta = modified.value_u64().wrapping_sub(base.value_u64());
    if delta == 0 {
      // Identity is `Copy`, not a delta.
      None
    } else {
      Some(delta)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const W: usize = crate::constants::V_MAX;

  #[test]
  fn apply_delta_appends_and_replays_deterministically() {
    let store = DeltaStore::new();
    let base = RawElement::new(0x01, &8u64.to_le_bytes()).unwrap();
    let first = store.apply_delta(0, base, 5, W).unwrap();
    assert_eq!(first.value_u64(), 13);
    assert_eq!(store.len(), 1);

    // Replaying the same index with the same inputs is fine.
    let replay = store.apply_delta(0, base, 5, W).unwrap();
    assert_eq!(replay, first);
  }

  #[test]
  fn apply_delta_detects_nondeterminism() {
    let store = DeltaStore::new();
    let base = RawElement::new(0x01, &8u64.to_le_bytes()).unwrap();
    store.apply_delta(0, base, 5, W).unwrap();
    // Same index, different delta: the store should refuse to silently
    // diverge from what it already committed.
    assert!(store.apply_delta(0, base, 6, W).is_err());
  }

  #[test]
  fn apply_delta_rejects_values_wider_than_the_configured_limit() {
    let store = DeltaStore::new();
    let base = RawElement::new(0x01, &8u64.to_le_bytes()).unwrap();
    assert!(store.apply_delta(0, base, 5, 4).is_err());
  }

  #[test]
  fn calculate_delta_overflow_wraps_mod_2_64() {
    let base = RawElement::new(0x11, &0xFFFF_FFFF_FFFF_FFF0u64.to_le_bytes()).unwrap();
    let modified = RawElement::new(0x11, &0x0000_0000_0000_0005u64.to_le_bytes()).unwrap();
    let delta = DeltaStore::calculate_delta(&base, &modified, W).unwrap();
    assert_eq!(delta, 0x15);

    let store = DeltaStore::new();
    let roundtrip = store.apply_delta(0, base, delta, W).unwrap();
    assert_eq!(roundtrip, modified);
  }

  #[test]
  fn calculate_delta_rejects_type_or_width_mismatch() {
    let a = RawElement::new(0x01, &1u64.to_le_bytes()).unwrap();
    let b = RawElement::new(0x02, &1u64.to_le_bytes()).unwrap();
    assert_eq!(DeltaStore::calculate_delta(&a, &b, W), None);

    let c = RawElement::new(0x01, &[1, 0, 0]).unwrap();
    assert_eq!(DeltaStore::calculate_delta(&a, &c, W), None);
  }

  #[test]
  fn calculate_delta_rejects_identity() {
    let a = RawElement::new(0x01, &7u64.to_le_bytes()).unwrap();
    assert_eq!(DeltaStore::calculate_delta(&a, &a, W), None);
  }

  #[test]
  fn calculate_delta_honors_a_narrower_width_limit() {
    let a = RawElement::new(0x01, &1u32.to_le_bytes()).unwrap();
    let b = RawElement::new(0x01, &2u32.to_le_bytes()).unwrap();
    assert_eq!(DeltaStore::calculate_delta(&a, &b, 4), Some(1));
    assert_eq!(DeltaStore::calculate_delta(&a, &b, 2), None);
  }
}
