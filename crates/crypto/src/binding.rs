//! Policy binding
//!
//! Binds a policy descriptor to the wrapped key so neither can be swapped or
//! altered without detection. The binding covers
//! `policy descriptor bytes || wrapped key bytes`.
//!
//! - HMAC-SHA256 (32 bytes) keyed with the binding key derived during key
//!   wrapping. Verification is constant-time.
//! - ECDSA P-256 / SHA-256 (64 bytes, `r || s`) signed by the creator.

use crate::types::HmacKey;
use hmac::{Hmac, Mac};
use opentdf_nano_protocol::nanotdf::BindingMode;
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindingError {
    #[error("HMAC initialization failed")]
    InitFailed,

    #[error("ECDSA signing failed")]
    SigningFailed,
}

/// Key material used to produce a binding
#[derive(Clone)]
pub enum BindingKey {
    Ecdsa(SigningKey),
    Hmac(HmacKey),
}

impl BindingKey {
    pub fn mode(&self) -> BindingMode {
        match self {
            BindingKey::Ecdsa(_) => BindingMode::Ecdsa,
            BindingKey::Hmac(_) => BindingMode::Hmac,
        }
    }
}

impl std::fmt::Debug for BindingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindingKey::Ecdsa(_) => f.write_str("BindingKey::Ecdsa(..)"),
            BindingKey::Hmac(_) => f.write_str("BindingKey::Hmac(..)"),
        }
    }
}

/// Key material used to check a binding
#[derive(Debug, Clone)]
pub enum BindingVerifier {
    Ecdsa(VerifyingKey),
    Hmac(HmacKey),
}

impl BindingVerifier {
    pub fn mode(&self) -> BindingMode {
        match self {
            BindingVerifier::Ecdsa(_) => BindingMode::Ecdsa,
            BindingVerifier::Hmac(_) => BindingMode::Hmac,
        }
    }
}

fn bound_message(policy: &[u8], wrapped_key: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(policy.len() + wrapped_key.len());
    message.extend_from_slice(policy);
    message.extend_from_slice(wrapped_key);
    message
}

fn hmac(key: &HmacKey, message: &[u8]) -> Result<Vec<u8>, BindingError> {
    let mut mac =
        HmacSha256::new_from_slice(key.as_slice()).map_err(|_| BindingError::InitFailed)?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Compute the policy binding
pub fn sign(policy: &[u8], wrapped_key: &[u8], key: &BindingKey) -> Result<Vec<u8>, BindingError> {
    let message = bound_message(policy, wrapped_key);
    match key {
        BindingKey::Hmac(key) => hmac(key, &message),
        BindingKey::Ecdsa(key) => {
            let signature: Signature = key
                .try_sign(&message)
                .map_err(|_| BindingError::SigningFailed)?;
            Ok(signature.to_bytes().to_vec())
        }
    }
}

/// Check a policy binding
///
/// Returns `false` for any mismatch, including a binding of the wrong length
/// for the verifier's mode.
pub fn verify(
    policy: &[u8],
    wrapped_key: &[u8],
    binding: &[u8],
    verifier: &BindingVerifier,
) -> bool {
    if binding.len() != verifier.mode().binding_size() {
        return false;
    }
    let message = bound_message(policy, wrapped_key);
    match verifier {
        BindingVerifier::Hmac(key) => match hmac(key, &message) {
            Ok(expected) => expected.ct_eq(binding).into(),
            Err(_) => false,
        },
        BindingVerifier::Ecdsa(key) => match Signature::from_slice(binding) {
            Ok(signature) => key.verify(&message, &signature).is_ok(),
            Err(_) => false,
        },
    }
}
