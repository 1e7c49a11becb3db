use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};

/// The different kinds of errors this crate can return.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
  /// `Corruption` errors occur during decoding, indicating the column's
  /// byte stream is inconsistent or violates the wire format (missing
  /// terminator, a literal with a non-empty name, an instruction stream
  /// that would read past the terminator, a delta applied to an
  /// oversized value, ...).
  Corruption,
  /// `InvalidArgument` errors occur during encoding, indicating the
  /// caller violated a precondition of the builder (e.g. a
  /// non-monotonic index).
  InvalidArgument,
  /// `UnsupportedValue` is returned by delta-calculation helpers when
  /// the inputs are individually well-formed but cannot be
  /// delta-compressed (different types, oversized values). Callers
  /// that hit this fall back to a literal; it is not a failure of the
  /// column itself.
  UnsupportedValue,
}

/// The error type used in results for all `deltacol` functionality.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnError {
  pub kind: ErrorKind,
  pub message: String,
}

impl ColumnError {
  pub(crate) fn new<S: AsRef<str>>(kind: ErrorKind, message: S) -> Self {
    ColumnError {
      kind,
      message: message.as_ref().to_string(),
    }
  }

  pub(crate) fn corruption<S: AsRef<str>>(message: S) -> Self {
    Self::new(ErrorKind::Corruption, message)
  }

  pub(crate) fn invalid_argument<S: AsRef<str>>(message: S) -> Self {
    Self::new(ErrorKind::InvalidArgument, message)
  }

  pub(crate) fn unsupported_value<S: AsRef<str>>(message: S) -> Self {
    Self::new(ErrorKind::UnsupportedValue, message)
  }
}

impl Display for ColumnError {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "deltacol {:?} error: {}", self.kind, &self.message)
  }
}

impl Error for ColumnError {}

pub type ColumnResult<T> = Result<T, ColumnError>;
