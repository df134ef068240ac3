//! NanoTDF payload encryption
//!
//! AES-256-GCM with a 96-bit random nonce and a selectable tag length. The
//! aes-gcm crate only supports 96-128 bit tags, so those are the sizes offered.

use crate::helpers::generate_nonce;
use crate::types::DataKey;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use opentdf_nano_protocol::nanotdf::{SymmetricCipher, MAX_PAYLOAD_LENGTH, NONCE_LEN};
use thiserror::Error;
use typenum::{U12, U13, U14, U15, U16};

type Aes256Gcm96 = aes_gcm::AesGcm<aes::Aes256, U12, U12>;
type Aes256Gcm104 = aes_gcm::AesGcm<aes::Aes256, U12, U13>;
type Aes256Gcm112 = aes_gcm::AesGcm<aes::Aes256, U12, U14>;
type Aes256Gcm120 = aes_gcm::AesGcm<aes::Aes256, U12, U15>;
type Aes256Gcm128 = aes_gcm::AesGcm<aes::Aes256, U12, U16>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("Encryption failed")]
    EncryptionFailed,

    /// Wrong key, or ciphertext/tag/nonce altered
    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Invalid tag length: expected {expected}, got {actual}")]
    InvalidTagLength { expected: usize, actual: usize },

    #[error("Payload too large: {len} bytes (max {max})")]
    PayloadTooLarge { len: usize, max: usize },
}

/// Ciphertext with its nonce and detached tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedPayload {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
    pub tag: Vec<u8>,
}

/// Largest plaintext that fits the u24 payload length for `cipher`
pub fn max_plaintext_len(cipher: SymmetricCipher) -> usize {
    MAX_PAYLOAD_LENGTH as usize - cipher.tag_size()
}

/// Encrypt under a freshly generated DEK and nonce
pub fn encrypt(
    plaintext: &[u8],
    cipher: SymmetricCipher,
) -> Result<(DataKey, SealedPayload), CipherError> {
    let key = DataKey::generate();
    let sealed = encrypt_with_key(&key, plaintext, cipher)?;
    Ok((key, sealed))
}

/// Encrypt under an existing DEK with a fresh random nonce
pub fn encrypt_with_key(
    key: &DataKey,
    plaintext: &[u8],
    cipher: SymmetricCipher,
) -> Result<SealedPayload, CipherError> {
    let max = max_plaintext_len(cipher);
    if plaintext.len() > max {
        return Err(CipherError::PayloadTooLarge {
            len: plaintext.len(),
            max,
        });
    }

    let nonce = generate_nonce();
    let (ciphertext, tag) = match cipher {
        SymmetricCipher::Aes256Gcm96 => seal::<Aes256Gcm96>(key, &nonce, plaintext),
        SymmetricCipher::Aes256Gcm104 => seal::<Aes256Gcm104>(key, &nonce, plaintext),
        SymmetricCipher::Aes256Gcm112 => seal::<Aes256Gcm112>(key, &nonce, plaintext),
        SymmetricCipher::Aes256Gcm120 => seal::<Aes256Gcm120>(key, &nonce, plaintext),
        SymmetricCipher::Aes256Gcm128 => seal::<Aes256Gcm128>(key, &nonce, plaintext),
    }?;

    Ok(SealedPayload {
        nonce,
        ciphertext,
        tag,
    })
}

/// Decrypt and authenticate a sealed payload
pub fn decrypt(
    key: &DataKey,
    sealed: &SealedPayload,
    cipher: SymmetricCipher,
) -> Result<Vec<u8>, CipherError> {
    if sealed.tag.len() != cipher.tag_size() {
        return Err(CipherError::InvalidTagLength {
            expected: cipher.tag_size(),
            actual: sealed.tag.len(),
        });
    }

    match cipher {
        SymmetricCipher::Aes256Gcm96 => open::<Aes256Gcm96>(key, sealed),
        SymmetricCipher::Aes256Gcm104 => open::<Aes256Gcm104>(key, sealed),
        SymmetricCipher::Aes256Gcm112 => open::<Aes256Gcm112>(key, sealed),
        SymmetricCipher::Aes256Gcm120 => open::<Aes256Gcm120>(key, sealed),
        SymmetricCipher::Aes256Gcm128 => open::<Aes256Gcm128>(key, sealed),
    }
}

fn seal<C>(
    key: &DataKey,
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), CipherError>
where
    C: KeyInit + AeadInPlace<NonceSize = U12>,
{
    let cipher = C::new_from_slice(key.as_slice()).map_err(|_| CipherError::EncryptionFailed)?;
    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(nonce.into(), b"", &mut buffer)
        .map_err(|_| CipherError::EncryptionFailed)?;
    Ok((buffer, tag.to_vec()))
}

fn open<C>(key: &DataKey, sealed: &SealedPayload) -> Result<Vec<u8>, CipherError>
where
    C: KeyInit + AeadInPlace<NonceSize = U12>,
{
    let cipher =
        C::new_from_slice(key.as_slice()).map_err(|_| CipherError::AuthenticationFailed)?;
    let mut buffer = sealed.ciphertext.clone();
    cipher
        .decrypt_in_place_detached(
            (&sealed.nonce).into(),
            b"",
            &mut buffer,
            aes_gcm::aead::Tag::<C>::from_slice(&sealed.tag),
        )
        .map_err(|_| CipherError::AuthenticationFailed)?;
    Ok(buffer)
}
