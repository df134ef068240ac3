//! Zeroizing cryptographic key types
//!
//! Key material never leaves these wrappers except through `as_slice`, and is
//! cleared from memory on drop.

use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES-256 data encryption key (32 bytes) that zeroizes on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DataKey(pub(crate) [u8; 32]);

impl DataKey {
    /// Create a data key from a 32-byte slice
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        Ok(DataKey(copy_32(bytes)?))
    }

    /// Generate a fresh random key from the OS RNG
    pub fn generate() -> Self {
        DataKey(crate::helpers::generate_key_32())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

/// HMAC-SHA256 policy binding key (32 bytes) that zeroizes on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct HmacKey(pub(crate) [u8; 32]);

impl HmacKey {
    /// Create an HMAC key from a 32-byte slice
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        Ok(HmacKey(copy_32(bytes)?))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

// Key bytes stay out of logs.
impl std::fmt::Debug for DataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DataKey(..)")
    }
}

impl std::fmt::Debug for HmacKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HmacKey(..)")
    }
}

fn copy_32(bytes: &[u8]) -> Result<[u8; 32], KeyError> {
    if bytes.len() != 32 {
        return Err(KeyError::InvalidLength {
            expected: 32,
            got: bytes.len(),
        });
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(bytes);
    Ok(key)
}

/// Key-related errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidLength { expected: usize, got: usize },
}
