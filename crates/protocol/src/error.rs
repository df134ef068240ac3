//! Structural errors raised while encoding or decoding NanoTDF bytes
//!
//! Every variant here is detected without touching key material, so callers
//! can reject corrupt envelopes before any cryptographic work is attempted.

use thiserror::Error;

/// Binary format errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("invalid magic number: {0:02X}{1:02X} (expected 4C31)")]
    InvalidMagic(u8, u8),

    #[error("unsupported NanoTDF version: 0x{0:02X}")]
    UnsupportedVersion(u8),

    #[error("truncated {field}: needed {needed} bytes, {available} available")]
    Truncated {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("{field} too long: {len} bytes (max {max})")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("{0} unexpected trailing bytes")]
    TrailingBytes(usize),
}

impl FormatError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        FormatError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}
