//! Elliptic Curve Key Encapsulation for NanoTDF
//!
//! ECIES over P-256.
//!
//! # Protocol Flow
//!
//! 1. Generate an ephemeral P-256 key pair per wrap
//! 2. ECDH with the KAS public key → shared secret
//! 3. HKDF-SHA256 (NanoTDF salt) → wrapping key and HMAC binding key
//! 4. AES-256-GCM encrypt the DEK under the wrapping key
//!
//! Wrapped key layout:
//!
//! ```text
//! ephemeral public key (33, SEC1 compressed) | nonce (12) | encrypted DEK (32) | tag (16)
//! ```

use super::{KemError, KeyEncapsulation, WrappedKey};
use crate::helpers::{derive_key, generate_nonce, DEK_WRAP_INFO, POLICY_BINDING_INFO};
use crate::types::{DataKey, HmacKey};
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::Aes256Gcm;
use opentdf_nano_protocol::nanotdf::NONCE_LEN;
use p256::ecdh::{EphemeralSecret, SharedSecret};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use rand::rngs::OsRng;

/// SEC1 compressed P-256 point
pub const EPHEMERAL_KEY_LEN: usize = 33;

const TAG_LEN: usize = 16;

/// Total wrapped key length
pub const WRAPPED_KEY_LEN: usize = EPHEMERAL_KEY_LEN + NONCE_LEN + 32 + TAG_LEN;

/// ECDH key encapsulation mechanism on P-256
#[derive(Debug, Clone, Copy, Default)]
pub struct EcdhKem;

impl KeyEncapsulation for EcdhKem {
    type PublicKey = PublicKey;
    type PrivateKey = SecretKey;

    fn wrap(
        &self,
        dek: &DataKey,
        public_key: &PublicKey,
    ) -> Result<(WrappedKey, HmacKey), KemError> {
        let ephemeral = EphemeralSecret::random(&mut OsRng);
        let ephemeral_public = ephemeral.public_key().to_encoded_point(true);
        let shared_secret = ephemeral.diffie_hellman(public_key);

        let wrap_key = derive_key(shared_secret.raw_secret_bytes(), DEK_WRAP_INFO)
            .map_err(|_| KemError::KeyDerivationFailed)?;
        let binding_key = derive_key(shared_secret.raw_secret_bytes(), POLICY_BINDING_INFO)
            .map_err(|_| KemError::KeyDerivationFailed)?;

        let cipher = Aes256Gcm::new_from_slice(wrap_key.as_slice())
            .map_err(|e| KemError::WrapError(e.to_string()))?;
        let nonce = generate_nonce();
        let mut encrypted_dek = dek.as_slice().to_vec();
        let tag = cipher
            .encrypt_in_place_detached((&nonce).into(), b"", &mut encrypted_dek)
            .map_err(|e| KemError::WrapError(e.to_string()))?;

        let mut wrapped = Vec::with_capacity(WRAPPED_KEY_LEN);
        wrapped.extend_from_slice(ephemeral_public.as_bytes());
        wrapped.extend_from_slice(&nonce);
        wrapped.extend_from_slice(&encrypted_dek);
        wrapped.extend_from_slice(&tag);

        Ok((WrappedKey::new(wrapped), HmacKey(*binding_key)))
    }

    fn unwrap(&self, wrapped: &WrappedKey, private_key: &SecretKey) -> Result<DataKey, KemError> {
        let parts = WrappedParts::split(wrapped)?;
        let shared_secret = agree(private_key, parts.ephemeral_public)?;
        let wrap_key = derive_key(shared_secret.raw_secret_bytes(), DEK_WRAP_INFO)
            .map_err(|_| KemError::KeyDerivationFailed)?;

        let cipher = Aes256Gcm::new_from_slice(wrap_key.as_slice())
            .map_err(|e| KemError::UnwrapError(e.to_string()))?;
        let mut dek = zeroize::Zeroizing::new(parts.encrypted_dek.to_vec());
        cipher
            .decrypt_in_place_detached(parts.nonce.into(), b"", &mut *dek, parts.tag.into())
            .map_err(|_| KemError::UnwrapError("AES-GCM authentication failed".to_string()))?;

        DataKey::from_slice(&dek).map_err(|e| KemError::UnwrapError(e.to_string()))
    }

    fn binding_key(
        &self,
        wrapped: &WrappedKey,
        private_key: &SecretKey,
    ) -> Result<HmacKey, KemError> {
        let parts = WrappedParts::split(wrapped)?;
        let shared_secret = agree(private_key, parts.ephemeral_public)?;
        let key = derive_key(shared_secret.raw_secret_bytes(), POLICY_BINDING_INFO)
            .map_err(|_| KemError::KeyDerivationFailed)?;
        Ok(HmacKey(*key))
    }
}

struct WrappedParts<'a> {
    ephemeral_public: &'a [u8],
    nonce: &'a [u8; NONCE_LEN],
    encrypted_dek: &'a [u8],
    tag: &'a [u8; TAG_LEN],
}

impl<'a> WrappedParts<'a> {
    fn split(wrapped: &'a WrappedKey) -> Result<Self, KemError> {
        let bytes = wrapped.as_bytes();
        if bytes.len() != WRAPPED_KEY_LEN {
            return Err(KemError::InvalidWrappedKey {
                expected: WRAPPED_KEY_LEN,
                got: bytes.len(),
            });
        }
        let (ephemeral_public, rest) = bytes.split_at(EPHEMERAL_KEY_LEN);
        // SEC1 compressed points only
        if !matches!(ephemeral_public[0], 0x02 | 0x03) {
            return Err(KemError::InvalidPublicKey);
        }
        let (nonce, rest) = rest.split_at(NONCE_LEN);
        let (encrypted_dek, tag) = rest.split_at(32);
        let invalid = |_| KemError::InvalidWrappedKey {
            expected: WRAPPED_KEY_LEN,
            got: bytes.len(),
        };
        Ok(Self {
            ephemeral_public,
            nonce: nonce.try_into().map_err(invalid)?,
            encrypted_dek,
            tag: tag.try_into().map_err(invalid)?,
        })
    }
}

fn agree(private_key: &SecretKey, ephemeral_public: &[u8]) -> Result<SharedSecret, KemError> {
    let ephemeral =
        PublicKey::from_sec1_bytes(ephemeral_public).map_err(|_| KemError::InvalidPublicKey)?;
    Ok(p256::ecdh::diffie_hellman(
        private_key.to_nonzero_scalar(),
        ephemeral.as_affine(),
    ))
}
