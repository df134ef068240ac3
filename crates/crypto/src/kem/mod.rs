//! Key Encapsulation Mechanisms (KEM)
//!
//! Wrapping a DEK for a Key Access Service. The envelope orchestrator is
//! generic over [`KeyEncapsulation`], so alternative or instrumented
//! mechanisms can be swapped in without touching the envelope code.

use crate::types::{DataKey, HmacKey};
use thiserror::Error;

pub mod ec;

/// KEM-related errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KemError {
    #[error("Key wrapping failed: {0}")]
    WrapError(String),

    #[error("Key unwrapping failed: {0}")]
    UnwrapError(String),

    #[error("Invalid wrapped key: expected {expected} bytes, got {got}")]
    InvalidWrappedKey { expected: usize, got: usize },

    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Key derivation failed")]
    KeyDerivationFailed,
}

/// Opaque wrapped-key bytes as carried in the envelope header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedKey(Vec<u8>);

impl WrappedKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        WrappedKey(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[u8]> for WrappedKey {
    fn from(bytes: &[u8]) -> Self {
        WrappedKey(bytes.to_vec())
    }
}

/// Trait for key encapsulation mechanisms
///
/// A wrap also yields the HMAC policy binding key. Both sides can derive it
/// from the same key agreement, so a KAS can check an HMAC binding before it
/// releases anything.
pub trait KeyEncapsulation {
    /// Recipient (KAS) public key type
    type PublicKey;

    /// Recipient (KAS) private key type
    type PrivateKey;

    /// Wrap a DEK for the recipient
    fn wrap(
        &self,
        dek: &DataKey,
        public_key: &Self::PublicKey,
    ) -> Result<(WrappedKey, HmacKey), KemError>;

    /// Recover the DEK with the recipient's private key
    fn unwrap(
        &self,
        wrapped: &WrappedKey,
        private_key: &Self::PrivateKey,
    ) -> Result<DataKey, KemError>;

    /// Re-derive the HMAC policy binding key without unwrapping
    fn binding_key(
        &self,
        wrapped: &WrappedKey,
        private_key: &Self::PrivateKey,
    ) -> Result<HmacKey, KemError>;
}
