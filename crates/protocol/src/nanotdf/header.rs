//! NanoTDF Header Structures

use crate::binary::{write_u8, BinaryRead, BinaryWrite, ByteReader};
use crate::error::FormatError;
use crate::nanotdf::{MAGIC_NUMBER, MAGIC_NUMBER_AND_VERSION, NANOTDF_VERSION};

/// Magic number and version (3 bytes)
/// "L1L" = 0x4C314C
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MagicNumberAndVersion {
    pub bytes: [u8; 3],
}

impl Default for MagicNumberAndVersion {
    fn default() -> Self {
        Self {
            bytes: MAGIC_NUMBER_AND_VERSION,
        }
    }
}

impl MagicNumberAndVersion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the magic number, then the version
    pub fn validate(&self) -> Result<(), FormatError> {
        if self.bytes[..2] != MAGIC_NUMBER {
            return Err(FormatError::InvalidMagic(self.bytes[0], self.bytes[1]));
        }
        if self.bytes[2] != NANOTDF_VERSION {
            return Err(FormatError::UnsupportedVersion(self.bytes[2]));
        }
        Ok(())
    }
}

impl BinaryRead for MagicNumberAndVersion {
    fn read_from(reader: &mut ByteReader<'_>) -> Result<Self, FormatError> {
        let magic = Self {
            bytes: reader.read_array("magic number and version")?,
        };
        magic.validate()?;
        Ok(magic)
    }
}

impl BinaryWrite for MagicNumberAndVersion {
    fn write_to(&self, out: &mut Vec<u8>) -> Result<(), FormatError> {
        out.extend_from_slice(&self.bytes);
        Ok(())
    }

    fn serialized_size(&self) -> usize {
        3
    }
}

/// Policy binding algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum BindingMode {
    /// HMAC-SHA256 keyed from the key-agreement secret
    #[default]
    Hmac = 0x00,
    /// ECDSA P-256 over SHA-256
    Ecdsa = 0x01,
}

impl BindingMode {
    pub fn from_byte(byte: u8) -> Result<Self, FormatError> {
        match byte {
            0x00 => Ok(BindingMode::Hmac),
            0x01 => Ok(BindingMode::Ecdsa),
            _ => Err(FormatError::invalid(
                "binding mode",
                format!("unknown tag 0x{byte:02X}"),
            )),
        }
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Size of the binding this mode produces
    pub fn binding_size(self) -> usize {
        match self {
            BindingMode::Hmac => 32,
            BindingMode::Ecdsa => 64,
        }
    }
}

/// Symmetric cipher for payload encryption
///
/// 64-bit GCM tags are not offered: the AES-GCM backend only supports
/// 96-128 bit tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum SymmetricCipher {
    /// AES-256-GCM with 96-bit authentication tag
    Aes256Gcm96 = 0x01,
    /// AES-256-GCM with 104-bit authentication tag
    Aes256Gcm104 = 0x02,
    /// AES-256-GCM with 112-bit authentication tag
    Aes256Gcm112 = 0x03,
    /// AES-256-GCM with 120-bit authentication tag
    Aes256Gcm120 = 0x04,
    /// AES-256-GCM with 128-bit authentication tag
    #[default]
    Aes256Gcm128 = 0x05,
}

impl SymmetricCipher {
    /// Parse from 4-bit value
    pub fn from_bits(bits: u8) -> Result<Self, FormatError> {
        match bits & 0x0F {
            0x01 => Ok(SymmetricCipher::Aes256Gcm96),
            0x02 => Ok(SymmetricCipher::Aes256Gcm104),
            0x03 => Ok(SymmetricCipher::Aes256Gcm112),
            0x04 => Ok(SymmetricCipher::Aes256Gcm120),
            0x05 => Ok(SymmetricCipher::Aes256Gcm128),
            other => Err(FormatError::invalid(
                "symmetric cipher",
                format!("unsupported value {other}"),
            )),
        }
    }

    pub fn to_bits(self) -> u8 {
        self as u8
    }

    /// Size of the authentication tag in bytes
    pub fn tag_size(self) -> usize {
        match self {
            SymmetricCipher::Aes256Gcm96 => 12,
            SymmetricCipher::Aes256Gcm104 => 13,
            SymmetricCipher::Aes256Gcm112 => 14,
            SymmetricCipher::Aes256Gcm120 => 15,
            SymmetricCipher::Aes256Gcm128 => 16,
        }
    }
}

/// Header config (1 byte bitfield)
///
/// ```text
/// ┌─────────────┬──────────┬──────────────────────┐
/// │USE_ECDSA(1b)│UNUSED(3b)│Symmetric Cipher (4b) │
/// └─────────────┴──────────┴──────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeaderConfig {
    pub binding_mode: BindingMode,
    pub symmetric_cipher: SymmetricCipher,
}

impl HeaderConfig {
    pub fn new(binding_mode: BindingMode, symmetric_cipher: SymmetricCipher) -> Self {
        Self {
            binding_mode,
            symmetric_cipher,
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self, FormatError> {
        if byte & 0x70 != 0 {
            return Err(FormatError::invalid(
                "header config",
                format!("reserved bits set in 0x{byte:02X}"),
            ));
        }
        let binding_mode = if byte & 0x80 != 0 {
            BindingMode::Ecdsa
        } else {
            BindingMode::Hmac
        };
        Ok(Self {
            binding_mode,
            symmetric_cipher: SymmetricCipher::from_bits(byte & 0x0F)?,
        })
    }

    pub fn to_byte(self) -> u8 {
        let ecdsa_bit = match self.binding_mode {
            BindingMode::Ecdsa => 0x80,
            BindingMode::Hmac => 0x00,
        };
        ecdsa_bit | self.symmetric_cipher.to_bits()
    }
}

impl BinaryRead for HeaderConfig {
    fn read_from(reader: &mut ByteReader<'_>) -> Result<Self, FormatError> {
        Self::from_byte(reader.read_u8("header config")?)
    }
}

impl BinaryWrite for HeaderConfig {
    fn write_to(&self, out: &mut Vec<u8>) -> Result<(), FormatError> {
        write_u8(out, self.to_byte());
        Ok(())
    }

    fn serialized_size(&self) -> usize {
        1
    }
}
