//! Resource Locator for NanoTDF
//!
//! Compact reference to the KAS endpoint an envelope's key is wrapped for.

use crate::binary::{write_u8, BinaryRead, BinaryWrite, ByteReader};
use crate::error::FormatError;

/// Maximum locator body length (1-byte length field)
pub const MAX_LOCATOR_BODY_LEN: usize = 255;

/// Protocol type for resource location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Protocol {
    Http = 0x0,
    Https = 0x1,
}

impl Protocol {
    pub fn from_byte(byte: u8) -> Result<Self, FormatError> {
        match byte {
            0x0 => Ok(Protocol::Http),
            0x1 => Ok(Protocol::Https),
            _ => Err(FormatError::invalid(
                "resource locator protocol",
                format!("unknown value 0x{byte:02X}"),
            )),
        }
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }

    pub fn scheme(self) -> &'static str {
        match self {
            Protocol::Http => "http://",
            Protocol::Https => "https://",
        }
    }
}

/// Resource Locator
///
/// ```text
/// ┌────────────────┬──────────────┬────────────┐
/// │ Protocol (1B)  │ Body Len (1B)│ Body (var) │
/// └────────────────┴──────────────┴────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceLocator {
    pub protocol: Protocol,
    /// Everything after the scheme, e.g. `kas.example.com/kas`
    pub body: String,
}

impl ResourceLocator {
    pub fn new(protocol: Protocol, body: impl Into<String>) -> Result<Self, FormatError> {
        let body = body.into();
        if body.is_empty() {
            return Err(FormatError::invalid("resource locator", "empty body"));
        }
        if body.len() > MAX_LOCATOR_BODY_LEN {
            return Err(FormatError::FieldTooLong {
                field: "resource locator",
                len: body.len(),
                max: MAX_LOCATOR_BODY_LEN,
            });
        }
        Ok(Self { protocol, body })
    }

    /// Create from an absolute `http://` or `https://` URL
    pub fn from_url(url: &str) -> Result<Self, FormatError> {
        if let Some(rest) = url.strip_prefix("http://") {
            Self::new(Protocol::Http, rest)
        } else if let Some(rest) = url.strip_prefix("https://") {
            Self::new(Protocol::Https, rest)
        } else {
            Err(FormatError::invalid(
                "resource locator",
                "URL must start with http:// or https://",
            ))
        }
    }

    pub fn to_url(&self) -> String {
        format!("{}{}", self.protocol.scheme(), self.body)
    }
}

impl BinaryRead for ResourceLocator {
    fn read_from(reader: &mut ByteReader<'_>) -> Result<Self, FormatError> {
        let protocol = Protocol::from_byte(reader.read_u8("resource locator protocol")?)?;
        let body_len = reader.read_u8("resource locator length")? as usize;
        let body = reader.read_bytes(body_len, "resource locator")?;
        let body = std::str::from_utf8(body)
            .map_err(|_| FormatError::invalid("resource locator", "body is not UTF-8"))?;
        Self::new(protocol, body)
    }
}

impl BinaryWrite for ResourceLocator {
    fn write_to(&self, out: &mut Vec<u8>) -> Result<(), FormatError> {
        if self.body.len() > MAX_LOCATOR_BODY_LEN {
            return Err(FormatError::FieldTooLong {
                field: "resource locator",
                len: self.body.len(),
                max: MAX_LOCATOR_BODY_LEN,
            });
        }
        write_u8(out, self.protocol.to_byte());
        write_u8(out, self.body.len() as u8);
        out.extend_from_slice(self.body.as_bytes());
        Ok(())
    }

    fn serialized_size(&self) -> usize {
        2 + self.body.len()
    }
}
