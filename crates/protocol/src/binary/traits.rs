//! Traits for binary serialization and deserialization

use super::ByteReader;
use crate::error::FormatError;

/// Trait for types that can be read from binary format
pub trait BinaryRead: Sized {
    /// Read this type from a byte reader
    fn read_from(reader: &mut ByteReader<'_>) -> Result<Self, FormatError>;
}

/// Trait for types that can be written to binary format
pub trait BinaryWrite {
    /// Append this type to the output buffer
    fn write_to(&self, out: &mut Vec<u8>) -> Result<(), FormatError>;

    /// Get the size in bytes when serialized
    fn serialized_size(&self) -> usize;
}
