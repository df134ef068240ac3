//! Cryptographic helper functions
//!
//! OS-backed randomness for keys and nonces, and the HKDF derivation shared
//! by key wrapping and policy binding.

use hkdf::Hkdf;
use opentdf_nano_protocol::nanotdf::{HKDF_SALT, NONCE_LEN};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use zeroize::Zeroizing;

/// HKDF info for the key that wraps the DEK
pub const DEK_WRAP_INFO: &[u8] = b"nanotdf:dek-wrap";

/// HKDF info for the HMAC policy binding key
pub const POLICY_BINDING_INFO: &[u8] = b"nanotdf:policy-binding";

/// Generate a random 96-bit nonce for AES-GCM
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Generate a random 32-byte key
pub fn generate_key_32() -> [u8; 32] {
    let mut key = [0u8; 32];
    OsRng.fill_bytes(&mut key);
    key
}

/// HKDF-SHA256 over an ECDH shared secret, salted with the NanoTDF salt
pub(crate) fn derive_key(
    shared_secret: &[u8],
    info: &[u8],
) -> Result<Zeroizing<[u8; 32]>, hkdf::InvalidLength> {
    let hkdf = Hkdf::<Sha256>::new(Some(&HKDF_SALT), shared_secret);
    let mut okm = Zeroizing::new([0u8; 32]);
    hkdf.expand(info, &mut *okm)?;
    Ok(okm)
}
