//! NanoTDF envelope construction and opening
//!
//! # Process
//!
//! Creating an envelope runs in a fixed order, and any failure aborts with
//! nothing emitted:
//!
//! 1. Finalize the policy descriptor (tagged with the binding mode)
//! 2. Encrypt the plaintext under a fresh DEK and nonce
//! 3. Wrap the DEK for the KAS public key
//! 4. Bind the descriptor to the wrapped key (HMAC or ECDSA)
//!
//! Opening reverses it: structural parse, binding check, unwrap, decrypt.
//! No key operation happens before the bytes parse, and no unwrap happens
//! before the binding verifies.
//!
//! # Example
//!
//! ```no_run
//! use opentdf_nano::envelope::{open_envelope, NanoTdfBuilder};
//! use opentdf_nano::kas::{KasLocator, KasPublicKey};
//! use opentdf_nano::p256::SecretKey;
//!
//! # fn example(kas_private_key: SecretKey) -> Result<(), opentdf_nano::NanoTdfError> {
//! let locator = KasLocator::parse("https://kas.example.com/kas")?;
//! let kas_key = KasPublicKey::new(locator, kas_private_key.public_key(), None);
//!
//! let bytes = NanoTdfBuilder::new()
//!     .kas(kas_key)
//!     .attribute("https://example.com/attr/classification/value/secret")?
//!     .encrypt_to_bytes(b"hello")?;
//!
//! let plaintext = open_envelope(&bytes, &kas_private_key, None)?;
//! assert_eq!(plaintext, b"hello");
//! # Ok(())
//! # }
//! ```

use crate::entitlements::Entitlements;
use crate::error::NanoTdfError;
use crate::kas::{KasLocator, KasPublicKey};
use crate::policy::PolicyBuilder;
use opentdf_nano_crypto::binding::{self, BindingKey, BindingVerifier};
use opentdf_nano_crypto::cipher::{self, SealedPayload};
use opentdf_nano_crypto::{EcdhKem, KeyEncapsulation, WrappedKey};
use opentdf_nano_protocol::nanotdf::{HeaderConfig, MagicNumberAndVersion};
use opentdf_nano_protocol::{BindingMode, Envelope, Payload, PolicyDescriptor, SymmetricCipher};
use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::SecretKey;
use tracing::{debug, warn};

/// How the creator wants the policy bound
///
/// HMAC bindings are keyed from the key agreement with the KAS, so only the
/// KAS (and the creator) can check them. ECDSA bindings are checked with the
/// creator's verifying key.
#[derive(Clone, Default)]
pub enum BindingRequest {
    #[default]
    Hmac,
    Ecdsa(SigningKey),
}

impl BindingRequest {
    pub fn mode(&self) -> BindingMode {
        match self {
            BindingRequest::Hmac => BindingMode::Hmac,
            BindingRequest::Ecdsa(_) => BindingMode::Ecdsa,
        }
    }
}

impl std::fmt::Debug for BindingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindingRequest::Hmac => f.write_str("Hmac"),
            BindingRequest::Ecdsa(_) => f.write_str("Ecdsa(..)"),
        }
    }
}

/// Create an envelope for `kas` using ECIES over P-256
pub fn create_envelope(
    plaintext: &[u8],
    policy: &PolicyDescriptor,
    kas: &KasPublicKey,
    binding: BindingRequest,
    cipher: SymmetricCipher,
) -> Result<Envelope, NanoTdfError> {
    create_with(
        &EcdhKem,
        plaintext,
        policy,
        kas.locator(),
        kas.key(),
        binding,
        cipher,
    )
}

/// Create an envelope with any key encapsulation mechanism
pub fn create_with<K: KeyEncapsulation>(
    kem: &K,
    plaintext: &[u8],
    policy: &PolicyDescriptor,
    kas_locator: &KasLocator,
    kas_public_key: &K::PublicKey,
    binding: BindingRequest,
    cipher: SymmetricCipher,
) -> Result<Envelope, NanoTdfError> {
    let mode = binding.mode();
    let policy = policy.clone().with_binding_mode(mode);
    let policy_bytes = policy
        .to_bytes()
        .map_err(|e| NanoTdfError::InvalidPolicy(e.to_string()))?;

    let (dek, sealed) = cipher::encrypt(plaintext, cipher)?;
    debug!(
        policy_id = %policy.id(),
        plaintext_len = plaintext.len(),
        ?cipher,
        "payload encrypted"
    );

    let (wrapped_key, hmac_key) = kem.wrap(&dek, kas_public_key)?;
    drop(dek);

    let binding_key = match binding {
        BindingRequest::Hmac => BindingKey::Hmac(hmac_key),
        BindingRequest::Ecdsa(signing_key) => BindingKey::Ecdsa(signing_key),
    };
    let binding = binding::sign(&policy_bytes, wrapped_key.as_bytes(), &binding_key)?;
    debug!(policy_id = %policy.id(), ?mode, kas = %kas_locator, "policy bound");

    let SealedPayload {
        nonce,
        ciphertext,
        tag,
    } = sealed;
    Ok(Envelope {
        magic: MagicNumberAndVersion::new(),
        kas: kas_locator.resource_locator().clone(),
        config: HeaderConfig::new(mode, cipher),
        policy: policy_bytes,
        wrapped_key: wrapped_key.into_bytes(),
        binding,
        payload: Payload {
            nonce,
            ciphertext,
            tag,
        },
    })
}

/// Open an envelope with the KAS private key
///
/// `verifying_key` is required for ECDSA-bound envelopes and ignored for
/// HMAC-bound ones.
pub fn open_envelope(
    bytes: &[u8],
    kas_private_key: &SecretKey,
    verifying_key: Option<&VerifyingKey>,
) -> Result<Vec<u8>, NanoTdfError> {
    open_with(&EcdhKem, bytes, kas_private_key, verifying_key)
}

/// Open an envelope with any key encapsulation mechanism
pub fn open_with<K: KeyEncapsulation>(
    kem: &K,
    bytes: &[u8],
    kas_private_key: &K::PrivateKey,
    verifying_key: Option<&VerifyingKey>,
) -> Result<Vec<u8>, NanoTdfError> {
    let envelope = Envelope::from_bytes(bytes)?;
    let (_, plaintext) = open_parsed(kem, &envelope, kas_private_key, verifying_key)?;
    Ok(plaintext)
}

/// Verify, unwrap and decrypt an already-parsed envelope
///
/// Returns the authenticated policy descriptor along with the plaintext.
pub fn open_parsed<K: KeyEncapsulation>(
    kem: &K,
    envelope: &Envelope,
    kas_private_key: &K::PrivateKey,
    verifying_key: Option<&VerifyingKey>,
) -> Result<(PolicyDescriptor, Vec<u8>), NanoTdfError> {
    let wrapped_key = WrappedKey::from(envelope.wrapped_key.as_slice());
    verify_binding(kem, envelope, &wrapped_key, kas_private_key, verifying_key)?;

    let policy = envelope.policy_descriptor()?;
    let dek = kem.unwrap(&wrapped_key, kas_private_key)?;

    let sealed = SealedPayload {
        nonce: envelope.payload.nonce,
        ciphertext: envelope.payload.ciphertext.clone(),
        tag: envelope.payload.tag.clone(),
    };
    let plaintext = cipher::decrypt(&dek, &sealed, envelope.config.symmetric_cipher)?;
    debug!(policy_id = %policy.id(), plaintext_len = plaintext.len(), "envelope opened");
    Ok((policy, plaintext))
}

fn verify_binding<K: KeyEncapsulation>(
    kem: &K,
    envelope: &Envelope,
    wrapped_key: &WrappedKey,
    kas_private_key: &K::PrivateKey,
    verifying_key: Option<&VerifyingKey>,
) -> Result<(), NanoTdfError> {
    let mode = envelope.config.binding_mode;

    // The descriptor's leading byte repeats the header's binding mode.
    let tagged = envelope
        .policy
        .first()
        .and_then(|byte| BindingMode::from_byte(*byte).ok());
    if tagged != Some(mode) {
        return Err(binding_mismatch(envelope, "binding mode disagrees with header"));
    }

    let verifier = match mode {
        BindingMode::Hmac => match kem.binding_key(wrapped_key, kas_private_key) {
            Ok(key) => BindingVerifier::Hmac(key),
            Err(_) => return Err(binding_mismatch(envelope, "binding key underivable")),
        },
        BindingMode::Ecdsa => BindingVerifier::Ecdsa(
            verifying_key
                .cloned()
                .ok_or(NanoTdfError::MissingVerifyingKey)?,
        ),
    };

    if binding::verify(
        &envelope.policy,
        wrapped_key.as_bytes(),
        &envelope.binding,
        &verifier,
    ) {
        Ok(())
    } else {
        Err(binding_mismatch(envelope, "signature does not verify"))
    }
}

fn binding_mismatch(envelope: &Envelope, reason: &str) -> NanoTdfError {
    warn!(
        security_event = true,
        kas = %envelope.kas.to_url(),
        mode = ?envelope.config.binding_mode,
        reason,
        "policy binding mismatch"
    );
    NanoTdfError::BindingMismatch
}

/// Whether `entitlements` satisfy `policy` under the chain's rule
pub fn access_decision(policy: &PolicyDescriptor, entitlements: &Entitlements) -> bool {
    let held = entitlements.effective();
    let granted = policy.is_satisfied_by(&held);
    debug!(
        policy_id = %policy.id(),
        expression = ?policy.expression(),
        rule = ?entitlements.rule(),
        granted,
        "access decision"
    );
    granted
}

/// Ergonomic front for [`create_envelope`]
#[derive(Debug, Clone, Default)]
pub struct NanoTdfBuilder {
    kas: Option<KasPublicKey>,
    policy: PolicyBuilder,
    prebuilt_policy: Option<PolicyDescriptor>,
    binding: BindingRequest,
    cipher: SymmetricCipher,
}

impl NanoTdfBuilder {
    /// Defaults: open access, HMAC binding, 128-bit tag
    pub fn new() -> Self {
        Self::default()
    }

    /// KAS the DEK is wrapped for
    #[must_use]
    pub fn kas(mut self, kas: KasPublicKey) -> Self {
        self.kas = Some(kas);
        self
    }

    /// Require an attribute (all listed attributes are required unless
    /// [`any_of`](Self::any_of) is set)
    pub fn attribute(mut self, fqn: impl AsRef<str>) -> Result<Self, NanoTdfError> {
        self.policy = self.policy.attribute(fqn)?;
        Ok(self)
    }

    #[must_use]
    pub fn any_of(mut self) -> Self {
        self.policy = self.policy.any_of();
        self
    }

    #[must_use]
    pub fn dissem(mut self, target: impl Into<String>) -> Self {
        self.policy = self.policy.dissem(target);
        self
    }

    /// Use an already-built descriptor instead of the attributes given here
    #[must_use]
    pub fn policy(mut self, policy: PolicyDescriptor) -> Self {
        self.prebuilt_policy = Some(policy);
        self
    }

    /// Bind with ECDSA using the creator's signing key (default: HMAC)
    #[must_use]
    pub fn ecdsa_binding(mut self, signing_key: SigningKey) -> Self {
        self.binding = BindingRequest::Ecdsa(signing_key);
        self
    }

    #[must_use]
    pub fn hmac_binding(mut self) -> Self {
        self.binding = BindingRequest::Hmac;
        self
    }

    #[must_use]
    pub fn cipher(mut self, cipher: SymmetricCipher) -> Self {
        self.cipher = cipher;
        self
    }

    /// Encrypt `plaintext` into an envelope
    pub fn encrypt(self, plaintext: &[u8]) -> Result<Envelope, NanoTdfError> {
        let kas = self.kas.ok_or_else(|| NanoTdfError::InvalidKasLocator {
            url: String::new(),
            reason: "no KAS public key configured".to_string(),
        })?;
        let policy = match self.prebuilt_policy {
            Some(policy) => policy,
            None => self.policy.build()?,
        };
        create_envelope(plaintext, &policy, &kas, self.binding, self.cipher)
    }

    /// Encrypt `plaintext` and serialize the envelope
    pub fn encrypt_to_bytes(self, plaintext: &[u8]) -> Result<Vec<u8>, NanoTdfError> {
        Ok(self.encrypt(plaintext)?.to_bytes()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entitlements::ChainRule;
    use opentdf_nano_protocol::{Attribute, PolicyExpression};
    use rand::rngs::OsRng;
    use std::collections::{BTreeMap, BTreeSet};

    const SECRET: &str = "https://example.com/attr/classification/value/secret";

    fn kas() -> (SecretKey, KasPublicKey) {
        let secret = SecretKey::random(&mut OsRng);
        let locator = KasLocator::parse("https://kas.example.com/kas").unwrap();
        let public = KasPublicKey::new(locator, secret.public_key(), None);
        (secret, public)
    }

    #[test]
    fn test_builder_roundtrip_hmac() {
        let (kas_secret, kas_public) = kas();
        let bytes = NanoTdfBuilder::new()
            .kas(kas_public)
            .attribute(SECRET)
            .unwrap()
            .encrypt_to_bytes(b"hello nano")
            .unwrap();
        assert_eq!(&bytes[..3], b"L1L");
        assert_eq!(open_envelope(&bytes, &kas_secret, None).unwrap(), b"hello nano");
    }

    #[test]
    fn test_builder_roundtrip_ecdsa() {
        let (kas_secret, kas_public) = kas();
        let signing = SigningKey::random(&mut OsRng);
        let verifying = VerifyingKey::from(&signing);
        let envelope = NanoTdfBuilder::new()
            .kas(kas_public)
            .ecdsa_binding(signing)
            .cipher(SymmetricCipher::Aes256Gcm96)
            .encrypt(b"signed")
            .unwrap();
        assert_eq!(envelope.config.binding_mode, BindingMode::Ecdsa);
        assert_eq!(envelope.binding.len(), 64);
        assert_eq!(envelope.payload.tag.len(), 12);

        let bytes = envelope.to_bytes().unwrap();
        let opened = open_envelope(&bytes, &kas_secret, Some(&verifying)).unwrap();
        assert_eq!(opened, b"signed");
        assert!(matches!(
            open_envelope(&bytes, &kas_secret, None),
            Err(NanoTdfError::MissingVerifyingKey)
        ));
    }

    #[test]
    fn test_descriptor_tagged_with_binding_mode() {
        let (_, kas_public) = kas();
        let policy = PolicyBuilder::new()
            .binding_mode(BindingMode::Hmac)
            .build()
            .unwrap();
        let envelope = create_envelope(
            b"x",
            &policy,
            &kas_public,
            BindingRequest::Ecdsa(SigningKey::random(&mut OsRng)),
            SymmetricCipher::default(),
        )
        .unwrap();
        assert_eq!(
            envelope.policy_descriptor().unwrap().binding_mode(),
            BindingMode::Ecdsa
        );
    }

    #[test]
    fn test_oversized_descriptor_rejected_before_encryption() {
        let (_, kas_public) = kas();
        let attributes: BTreeSet<Attribute> = (0..200)
            .map(|i| {
                Attribute::parse(&format!(
                    "https://example.com/attr/project/value/codename-{i:04}"
                ))
                .unwrap()
            })
            .collect();
        let policy = PolicyDescriptor::new(
            uuid::Uuid::new_v4(),
            BindingMode::Hmac,
            PolicyExpression::AllOf,
            attributes,
            Vec::new(),
        )
        .unwrap();
        let err = create_envelope(
            b"x",
            &policy,
            &kas_public,
            BindingRequest::Hmac,
            SymmetricCipher::default(),
        )
        .unwrap_err();
        assert!(matches!(err, NanoTdfError::InvalidPolicy(_)));
    }

    #[test]
    fn test_missing_kas_rejected() {
        assert!(matches!(
            NanoTdfBuilder::new().encrypt(b"x"),
            Err(NanoTdfError::InvalidKasLocator { .. })
        ));
    }

    #[test]
    fn test_wrong_kas_key_cannot_open() {
        let (_, kas_public) = kas();
        let (other_secret, _) = kas();
        let bytes = NanoTdfBuilder::new()
            .kas(kas_public)
            .encrypt_to_bytes(b"x")
            .unwrap();
        // A different KAS derives a different HMAC key, so the binding fails first.
        assert!(matches!(
            open_envelope(&bytes, &other_secret, None),
            Err(NanoTdfError::BindingMismatch)
        ));
    }

    #[test]
    fn test_tampered_payload_fails_authentication() {
        let (kas_secret, kas_public) = kas();
        let mut envelope = NanoTdfBuilder::new()
            .kas(kas_public)
            .encrypt(b"payload")
            .unwrap();
        envelope.payload.ciphertext[0] ^= 0x01;
        let bytes = envelope.to_bytes().unwrap();
        assert!(matches!(
            open_envelope(&bytes, &kas_secret, None),
            Err(NanoTdfError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_open_parsed_returns_policy() {
        let (kas_secret, kas_public) = kas();
        let envelope = NanoTdfBuilder::new()
            .kas(kas_public)
            .attribute(SECRET)
            .unwrap()
            .dissem("bob@orga.com")
            .encrypt(b"payload")
            .unwrap();
        let (policy, plaintext) = open_parsed(&EcdhKem, &envelope, &kas_secret, None).unwrap();
        assert_eq!(plaintext, b"payload");
        assert_eq!(policy.dissem(), ["bob@orga.com".to_string()]);
    }

    #[test]
    fn test_access_decision() {
        let secret = Attribute::parse(SECRET).unwrap();
        let policy = crate::policy::build([SECRET]).unwrap();
        let open = crate::policy::build(Vec::<&str>::new()).unwrap();

        let mut by_entity = BTreeMap::new();
        by_entity.insert("user-bob".to_string(), BTreeSet::from([secret]));
        by_entity.insert("client".to_string(), BTreeSet::new());

        let intersection = Entitlements::new(by_entity.clone(), ChainRule::Intersection);
        let union = Entitlements::new(by_entity, ChainRule::Union);

        assert!(!access_decision(&policy, &intersection));
        assert!(access_decision(&policy, &union));
        assert!(access_decision(&open, &intersection));
        assert_eq!(open.expression(), PolicyExpression::Open);
    }
}
