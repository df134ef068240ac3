//! Binary serialization infrastructure for NanoTDF
//!
//! All multi-byte integers use big-endian byte order. Reads go through
//! [`ByteReader`], which names the field being read so that a truncated
//! envelope reports exactly where it ran out of bytes.

use crate::error::FormatError;

pub mod traits;

pub use traits::{BinaryRead, BinaryWrite};

/// Largest value representable in a 24-bit length field
pub const MAX_U24: u32 = 0x00FF_FFFF;

/// Bounds-checked cursor over a byte slice
#[derive(Debug)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    /// Number of unread bytes
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    /// Current offset from the start of the input
    pub fn position(&self) -> usize {
        self.position
    }

    /// Read exactly `n` bytes
    pub fn read_bytes(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], FormatError> {
        if n > self.remaining() {
            return Err(FormatError::Truncated {
                field,
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.bytes[self.position..self.position + n];
        self.position += n;
        Ok(slice)
    }

    /// Read a fixed-size array
    pub fn read_array<const N: usize>(
        &mut self,
        field: &'static str,
    ) -> Result<[u8; N], FormatError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N, field)?);
        Ok(out)
    }

    pub fn read_u8(&mut self, field: &'static str) -> Result<u8, FormatError> {
        Ok(self.read_bytes(1, field)?[0])
    }

    pub fn read_u16_be(&mut self, field: &'static str) -> Result<u16, FormatError> {
        Ok(u16::from_be_bytes(self.read_array(field)?))
    }

    /// Read a u24 (big-endian, 3 bytes), returned as u32
    pub fn read_u24_be(&mut self, field: &'static str) -> Result<u32, FormatError> {
        let [a, b, c] = self.read_array::<3>(field)?;
        Ok(u32::from_be_bytes([0, a, b, c]))
    }

    /// Read a u16 length prefix followed by that many bytes
    ///
    /// The declared length is checked against `max` before the body is read,
    /// so an over-length field is reported as such even when the input is
    /// also too short to hold it.
    pub fn read_u16_prefixed(
        &mut self,
        field: &'static str,
        max: usize,
    ) -> Result<&'a [u8], FormatError> {
        let len = self.read_u16_be(field)? as usize;
        if len > max {
            return Err(FormatError::FieldTooLong { field, len, max });
        }
        self.read_bytes(len, field)
    }

    /// Fail unless every byte has been consumed
    pub fn finish(&self) -> Result<(), FormatError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(FormatError::TrailingBytes(n)),
        }
    }
}

pub fn write_u8(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

pub fn write_u16_be(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Write a u24 (big-endian, 3 bytes); only the lower 24 bits are allowed
pub fn write_u24_be(out: &mut Vec<u8>, value: u32, field: &'static str) -> Result<(), FormatError> {
    if value > MAX_U24 {
        return Err(FormatError::FieldTooLong {
            field,
            len: value as usize,
            max: MAX_U24 as usize,
        });
    }
    out.extend_from_slice(&value.to_be_bytes()[1..4]);
    Ok(())
}

/// Write a u16 length prefix followed by the bytes
pub fn write_u16_prefixed(
    out: &mut Vec<u8>,
    bytes: &[u8],
    field: &'static str,
    max: usize,
) -> Result<(), FormatError> {
    if bytes.len() > max {
        return Err(FormatError::FieldTooLong {
            field,
            len: bytes.len(),
            max,
        });
    }
    write_u16_be(out, bytes.len() as u16);
    out.extend_from_slice(bytes);
    Ok(())
}
