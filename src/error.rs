//! Unified error type for the NanoTDF public API
//!
//! Internal crates keep their domain-specific errors (`FormatError`,
//! `CipherError`, `KemError`, ...) for precise handling. This type is what
//! SDK consumers see.
//!
//! # Example
//!
//! ```no_run
//! use opentdf_nano::NanoTdfError;
//!
//! fn open() -> Result<(), NanoTdfError> {
//!     // Every envelope and entitlement operation returns NanoTdfError
//!     Ok(())
//! }
//! ```

use opentdf_nano_crypto::{BindingError, CipherError, KemError};
use opentdf_nano_protocol::{AttributeError, FormatError};
use thiserror::Error;

/// Unified error type for all NanoTDF operations
///
/// # Error Categories
///
/// - **Caller input**: attribute, locator, key, policy, entity chain and
///   configuration errors. Fix the input; retrying will not help.
/// - **Envelope**: malformed bytes, binding mismatches and failed
///   authentication. `BindingMismatch` is a security event.
/// - **Dependencies**: the policy authority or key service could not be
///   reached. These are retryable.
#[derive(Debug, Error)]
pub enum NanoTdfError {
    #[error("Invalid attribute: {0}")]
    InvalidAttributeFormat(#[from] AttributeError),

    #[error("Invalid KAS locator '{url}': {reason}")]
    InvalidKasLocator { url: String, reason: String },

    #[error("Invalid KAS public key: {0}")]
    InvalidKasKey(String),

    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("Invalid entity chain: {0}")]
    InvalidEntityChain(String),

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(#[from] FormatError),

    /// Policy binding did not verify; the envelope was altered or forged
    #[error("Policy binding mismatch")]
    BindingMismatch,

    #[error("Envelope uses an ECDSA binding but no verifying key was supplied")]
    MissingVerifyingKey,

    /// Payload failed AEAD authentication
    #[error("Payload authentication failed")]
    AuthenticationFailed,

    #[error("Key unwrap failed: {0}")]
    UnwrapFailed(String),

    #[error("Payload too large: {len} bytes (max {max})")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("Entitlement resolution unavailable: {0}")]
    ResolutionUnavailable(String),

    #[error("Key service unavailable: {0}")]
    KeyServiceUnavailable(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl NanoTdfError {
    /// Returns true if the error is potentially retryable
    ///
    /// Only failures to reach the policy authority or key service qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ResolutionUnavailable(_) | Self::KeyServiceUnavailable(_)
        )
    }

    /// Returns true if the error should be treated as a tampering signal
    pub fn is_security_event(&self) -> bool {
        matches!(self, Self::BindingMismatch)
    }

    /// Returns a suggestion for resolving this error
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::InvalidAttributeFormat(e) => Some(e.hint()),
            Self::InvalidKasLocator { .. } => {
                Some("Use an absolute URL with an http:// or https:// scheme")
            }
            Self::MissingVerifyingKey => {
                Some("Supply the creator's ECDSA verifying key when opening the envelope")
            }
            Self::PayloadTooLarge { .. } => Some("Split the plaintext across several envelopes"),
            Self::ResolutionUnavailable(_) | Self::KeyServiceUnavailable(_) => {
                Some("Check connectivity to the platform and retry after a delay")
            }
            Self::Config(_) => Some(
                "Set OPENTDF_PLATFORM_ENDPOINT and either OPENTDF_ACCESS_TOKEN or \
                 OPENTDF_CLIENT_ID/OPENTDF_CLIENT_SECRET",
            ),
            _ => None,
        }
    }
}

impl From<CipherError> for NanoTdfError {
    fn from(err: CipherError) -> Self {
        match err {
            CipherError::AuthenticationFailed => Self::AuthenticationFailed,
            CipherError::PayloadTooLarge { len, max } => Self::PayloadTooLarge { len, max },
            other => Self::Crypto(other.to_string()),
        }
    }
}

impl From<KemError> for NanoTdfError {
    fn from(err: KemError) -> Self {
        match err {
            KemError::UnwrapError(_)
            | KemError::InvalidWrappedKey { .. }
            | KemError::InvalidPublicKey => Self::UnwrapFailed(err.to_string()),
            KemError::WrapError(_) | KemError::KeyDerivationFailed => Self::Crypto(err.to_string()),
        }
    }
}

impl From<BindingError> for NanoTdfError {
    fn from(err: BindingError) -> Self {
        Self::Crypto(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(NanoTdfError::ResolutionUnavailable("timeout".into()).is_retryable());
        assert!(NanoTdfError::KeyServiceUnavailable("503".into()).is_retryable());
        assert!(!NanoTdfError::BindingMismatch.is_retryable());
        assert!(!NanoTdfError::InvalidEntityChain("empty".into()).is_retryable());
    }

    #[test]
    fn test_security_event() {
        assert!(NanoTdfError::BindingMismatch.is_security_event());
        assert!(!NanoTdfError::AuthenticationFailed.is_security_event());
    }

    #[test]
    fn test_cipher_error_mapping() {
        assert!(matches!(
            NanoTdfError::from(CipherError::AuthenticationFailed),
            NanoTdfError::AuthenticationFailed
        ));
        assert!(matches!(
            NanoTdfError::from(CipherError::PayloadTooLarge { len: 10, max: 5 }),
            NanoTdfError::PayloadTooLarge { len: 10, max: 5 }
        ));
    }

    #[test]
    fn test_kem_error_mapping() {
        assert!(matches!(
            NanoTdfError::from(KemError::UnwrapError("tag".into())),
            NanoTdfError::UnwrapFailed(_)
        ));
        assert!(matches!(
            NanoTdfError::from(KemError::KeyDerivationFailed),
            NanoTdfError::Crypto(_)
        ));
    }

    #[test]
    fn test_error_display() {
        let err = NanoTdfError::from(FormatError::UnsupportedVersion(0x4D));
        assert!(err.to_string().starts_with("Malformed envelope"));
        assert!(err.suggestion().is_none());
    }
}
