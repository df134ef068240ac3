//! NanoTDF envelope codec
//!
//! Parsing is purely structural: it checks the magic and version, every
//! length prefix, field maximums and trailing bytes, and never needs key
//! material. Binding verification and decryption happen afterwards.

use crate::binary::{write_u16_prefixed, write_u24_be, BinaryRead, BinaryWrite, ByteReader};
use crate::error::FormatError;
use crate::nanotdf::{
    header::{HeaderConfig, MagicNumberAndVersion},
    policy::PolicyDescriptor,
    resource_locator::ResourceLocator,
    MAX_BINDING_LEN, MAX_PAYLOAD_LENGTH, MAX_POLICY_LEN, MAX_WRAPPED_KEY_LEN, NONCE_LEN,
};

/// Encrypted payload section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
    pub tag: Vec<u8>,
}

impl Payload {
    fn write_to(&self, out: &mut Vec<u8>) -> Result<(), FormatError> {
        let length = self.ciphertext.len() + self.tag.len();
        let length = u32::try_from(length).unwrap_or(u32::MAX);
        write_u24_be(out, length, "payload")?;
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        Ok(())
    }

    fn read_from(reader: &mut ByteReader<'_>, tag_size: usize) -> Result<Self, FormatError> {
        let length = reader.read_u24_be("payload length")? as usize;
        if length < tag_size {
            return Err(FormatError::invalid(
                "payload length",
                format!("{length} is shorter than the {tag_size}-byte tag"),
            ));
        }
        let nonce = reader.read_array("payload nonce")?;
        let ciphertext = reader.read_bytes(length - tag_size, "payload ciphertext")?;
        let tag = reader.read_bytes(tag_size, "payload tag")?;
        Ok(Self {
            nonce,
            ciphertext: ciphertext.to_vec(),
            tag: tag.to_vec(),
        })
    }

    fn serialized_size(&self) -> usize {
        3 + NONCE_LEN + self.ciphertext.len() + self.tag.len()
    }
}

/// Complete NanoTDF envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub magic: MagicNumberAndVersion,
    pub kas: ResourceLocator,
    pub config: HeaderConfig,
    /// Serialized [`PolicyDescriptor`], exactly as covered by the binding
    pub policy: Vec<u8>,
    pub wrapped_key: Vec<u8>,
    pub binding: Vec<u8>,
    pub payload: Payload,
}

impl Envelope {
    /// Serialize to the NanoTDF binary layout
    pub fn to_bytes(&self) -> Result<Vec<u8>, FormatError> {
        let mut out = Vec::with_capacity(self.serialized_size());
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Structurally parse an envelope
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        let mut reader = ByteReader::new(bytes);
        let envelope = Self::read_from(&mut reader)?;
        reader.finish()?;
        Ok(envelope)
    }

    /// Decode the policy descriptor bytes
    pub fn policy_descriptor(&self) -> Result<PolicyDescriptor, FormatError> {
        PolicyDescriptor::from_bytes(&self.policy)
    }
}

impl BinaryRead for Envelope {
    fn read_from(reader: &mut ByteReader<'_>) -> Result<Self, FormatError> {
        let magic = MagicNumberAndVersion::read_from(reader)?;
        let kas = ResourceLocator::read_from(reader)?;
        let config = HeaderConfig::read_from(reader)?;

        let policy = reader.read_u16_prefixed("policy descriptor", MAX_POLICY_LEN)?;
        if policy.is_empty() {
            return Err(FormatError::invalid("policy descriptor", "empty"));
        }
        let wrapped_key = reader.read_u16_prefixed("wrapped key", MAX_WRAPPED_KEY_LEN)?;
        if wrapped_key.is_empty() {
            return Err(FormatError::invalid("wrapped key", "empty"));
        }
        let binding = reader.read_u16_prefixed("policy binding", MAX_BINDING_LEN)?;
        let expected = config.binding_mode.binding_size();
        if binding.len() != expected {
            return Err(FormatError::invalid(
                "policy binding",
                format!("{} bytes, expected {expected}", binding.len()),
            ));
        }

        let payload = Payload::read_from(reader, config.symmetric_cipher.tag_size())?;

        Ok(Self {
            magic,
            kas,
            config,
            policy: policy.to_vec(),
            wrapped_key: wrapped_key.to_vec(),
            binding: binding.to_vec(),
            payload,
        })
    }
}

impl BinaryWrite for Envelope {
    fn write_to(&self, out: &mut Vec<u8>) -> Result<(), FormatError> {
        if self.payload.tag.len() != self.config.symmetric_cipher.tag_size() {
            return Err(FormatError::invalid(
                "payload tag",
                format!(
                    "{} bytes, cipher expects {}",
                    self.payload.tag.len(),
                    self.config.symmetric_cipher.tag_size()
                ),
            ));
        }
        if self.payload.ciphertext.len() + self.payload.tag.len() > MAX_PAYLOAD_LENGTH as usize {
            return Err(FormatError::FieldTooLong {
                field: "payload",
                len: self.payload.ciphertext.len() + self.payload.tag.len(),
                max: MAX_PAYLOAD_LENGTH as usize,
            });
        }

        self.magic.write_to(out)?;
        self.kas.write_to(out)?;
        self.config.write_to(out)?;
        write_u16_prefixed(out, &self.policy, "policy descriptor", MAX_POLICY_LEN)?;
        write_u16_prefixed(out, &self.wrapped_key, "wrapped key", MAX_WRAPPED_KEY_LEN)?;
        write_u16_prefixed(out, &self.binding, "policy binding", MAX_BINDING_LEN)?;
        self.payload.write_to(out)
    }

    fn serialized_size(&self) -> usize {
        self.magic.serialized_size()
            + self.kas.serialized_size()
            + self.config.serialized_size()
            + 2
            + self.policy.len()
            + 2
            + self.wrapped_key.len()
            + 2
            + self.binding.len()
            + self.payload.serialized_size()
    }
}
