//! NanoTDF Cryptographic Operations
//!
//! - AES-256-GCM payload encryption with selectable tag length
//! - ECIES (P-256 ECDH + HKDF-SHA256 + AES-256-GCM) key wrapping
//! - HMAC-SHA256 and ECDSA P-256 policy binding
//! - Zeroizing key types that clear memory on drop
//!
//! # Security Features
//!
//! - **Zeroization**: DEKs, binding keys and derived secrets use `zeroize`
//! - **Constant-time comparison**: HMAC bindings are checked with `subtle::ConstantTimeEq`
//! - **Fresh randomness**: every encryption draws a new DEK and nonce, every
//!   wrap a new ephemeral key pair, all from the OS RNG
//!
//! # Example
//!
//! ```
//! use opentdf_nano_crypto::cipher::{decrypt, encrypt};
//! use opentdf_nano_protocol::SymmetricCipher;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (dek, sealed) = encrypt(b"sensitive information", SymmetricCipher::default())?;
//! let plaintext = decrypt(&dek, &sealed, SymmetricCipher::default())?;
//! assert_eq!(plaintext, b"sensitive information");
//! # Ok(())
//! # }
//! ```

pub mod binding;
pub mod cipher;
pub mod helpers;
pub mod kem;
pub mod types;

pub use binding::{BindingError, BindingKey, BindingVerifier};
pub use cipher::{CipherError, SealedPayload};
pub use helpers::{generate_key_32, generate_nonce};
pub use kem::ec::EcdhKem;
pub use kem::{KemError, KeyEncapsulation, WrappedKey};
pub use types::{DataKey, HmacKey, KeyError};

pub use p256;
