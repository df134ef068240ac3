//! NanoTDF Protocol Types
//!
//! ## Format Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Magic + Version "L1L"                  (3 B) │
//! │ KAS Resource Locator              (2 + n  B) │
//! │ Header Config (binding mode, cipher)   (1 B) │
//! │ Policy Descriptor   (u16 len + n ≤ 4096  B) │
//! │ Wrapped Key         (u16 len + n ≤ 256   B) │
//! │ Policy Binding      (u16 len + n ≤ 132   B) │
//! ├──────────────────────────────────────────────┤
//! │ Payload Length (ciphertext + tag)      (3 B) │
//! │ Nonce                                 (12 B) │
//! │ Ciphertext                             (n B) │
//! │ Authentication Tag                 (12-16 B) │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! All multi-byte integers are big-endian. A minimal envelope carries well
//! under 250 bytes of overhead.

pub mod envelope;
pub mod header;
pub mod policy;
pub mod resource_locator;

pub use envelope::{Envelope, Payload};
pub use header::{BindingMode, HeaderConfig, MagicNumberAndVersion, SymmetricCipher};
pub use policy::{PolicyDescriptor, PolicyExpression};
pub use resource_locator::{Protocol, ResourceLocator};

/// Magic number prefix ("L1")
pub const MAGIC_NUMBER: [u8; 2] = [0x4C, 0x31];

/// NanoTDF version byte ('L', v1.2)
pub const NANOTDF_VERSION: u8 = 0x4C;

/// Magic number + version = "L1L"
pub const MAGIC_NUMBER_AND_VERSION: [u8; 3] = [0x4C, 0x31, 0x4C];

/// HKDF salt for NanoTDF key derivation
/// SHA256(MAGIC_NUMBER + VERSION) = SHA256(0x4C314C)
pub const HKDF_SALT: [u8; 32] = [
    0x3d, 0xe3, 0xca, 0x1e, 0x50, 0xcf, 0x62, 0xd8, 0xb6, 0xab, 0xa6, 0x03, 0xa9, 0x6f, 0xca, 0x67,
    0x61, 0x38, 0x7a, 0x7a, 0xc8, 0x6c, 0x3d, 0x3a, 0xfe, 0x85, 0xae, 0x2d, 0x18, 0x12, 0xed, 0xfc,
];

/// AES-GCM nonce length
pub const NONCE_LEN: usize = 12;

/// Maximum serialized Policy Descriptor length
pub const MAX_POLICY_LEN: usize = 4096;

/// Maximum wrapped key length
pub const MAX_WRAPPED_KEY_LEN: usize = 256;

/// Maximum policy binding length (ECDSA P-521 r‖s)
pub const MAX_BINDING_LEN: usize = 132;

/// Maximum payload length (3 bytes = 16,777,215 bytes ~= 16 MB)
pub const MAX_PAYLOAD_LENGTH: u32 = 0x00FF_FFFF;
