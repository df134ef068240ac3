//! Common test utilities for NanoTDF integration tests
//!
//! Shared key material, instrumented KEM and subject-mapping stores.

#![allow(dead_code)]

use async_trait::async_trait;
use opentdf_nano::crypto::{DataKey, HmacKey, KemError, KeyEncapsulation, WrappedKey};
use opentdf_nano::crypto::EcdhKem;
use opentdf_nano::p256::pkcs8::{EncodePublicKey, LineEnding};
use opentdf_nano::p256::{PublicKey, SecretKey};
use opentdf_nano::{
    Attribute, InMemorySubjectMappings, KasLocator, KasPublicKey, NanoTdfError, SubjectCondition,
    SubjectMapping, SubjectMappingStore,
};
use rand::rngs::OsRng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const KAS_URL: &str = "https://kas.example.com/kas";

pub const TEST_PLAINTEXT: &[u8] = b"Hello, NanoTDF! This is a test of the compact envelope format.";

pub const SECRET_FQN: &str = "https://example.com/attr/classification/value/secret";
pub const USA_FQN: &str = "https://example.com/attr/country/value/usa";

pub fn attr(fqn: &str) -> Attribute {
    Attribute::parse(fqn).unwrap()
}

/// Fresh KAS key pair with its public half bound to [`KAS_URL`]
pub fn kas_keypair() -> (SecretKey, KasPublicKey) {
    let secret = SecretKey::random(&mut OsRng);
    let public = KasPublicKey::new(
        KasLocator::parse(KAS_URL).unwrap(),
        secret.public_key(),
        Some("e1".to_string()),
    );
    (secret, public)
}

pub fn public_key_pem(secret: &SecretKey) -> String {
    secret
        .public_key()
        .to_public_key_pem(LineEnding::LF)
        .unwrap()
}

/// Mappings for the platform's sample organizations
///
/// Everyone at orga.com is cleared for `secret`; `bob@orga.com` alone also
/// holds `usa`; the `tdf-client` application is cleared for `secret`.
pub fn sample_mappings() -> InMemorySubjectMappings {
    InMemorySubjectMappings::default()
        .with(SubjectMapping::new(
            attr(SECRET_FQN),
            SubjectCondition::EmailDomain("orga.com".into()),
        ))
        .with(SubjectMapping::new(
            attr(USA_FQN),
            SubjectCondition::EmailAddress("bob@orga.com".into()),
        ))
        .with(SubjectMapping::new(
            attr(SECRET_FQN),
            SubjectCondition::ClientId("tdf-client".into()),
        ))
}

/// [`EcdhKem`] that counts every call
#[derive(Debug, Default)]
pub struct CountingKem {
    inner: EcdhKem,
    wraps: AtomicUsize,
    unwraps: AtomicUsize,
    binding_keys: AtomicUsize,
}

impl CountingKem {
    pub fn total_calls(&self) -> usize {
        self.wraps.load(Ordering::SeqCst)
            + self.unwraps.load(Ordering::SeqCst)
            + self.binding_keys.load(Ordering::SeqCst)
    }

    pub fn unwraps(&self) -> usize {
        self.unwraps.load(Ordering::SeqCst)
    }
}

impl KeyEncapsulation for CountingKem {
    type PublicKey = PublicKey;
    type PrivateKey = SecretKey;

    fn wrap(
        &self,
        dek: &DataKey,
        public_key: &PublicKey,
    ) -> Result<(WrappedKey, HmacKey), KemError> {
        self.wraps.fetch_add(1, Ordering::SeqCst);
        self.inner.wrap(dek, public_key)
    }

    fn unwrap(&self, wrapped: &WrappedKey, private_key: &SecretKey) -> Result<DataKey, KemError> {
        self.unwraps.fetch_add(1, Ordering::SeqCst);
        self.inner.unwrap(wrapped, private_key)
    }

    fn binding_key(
        &self,
        wrapped: &WrappedKey,
        private_key: &SecretKey,
    ) -> Result<HmacKey, KemError> {
        self.binding_keys.fetch_add(1, Ordering::SeqCst);
        self.inner.binding_key(wrapped, private_key)
    }
}

/// Store that counts fetches and delegates to in-memory mappings
#[derive(Clone, Default)]
pub struct CountingStore {
    inner: InMemorySubjectMappings,
    pub fetches: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn new(inner: InMemorySubjectMappings) -> Self {
        Self {
            inner,
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubjectMappingStore for CountingStore {
    async fn subject_mappings(&self) -> Result<Vec<SubjectMapping>, NanoTdfError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.subject_mappings().await
    }
}

/// Store that answers only after a delay
pub struct SlowStore(pub Duration);

#[async_trait]
impl SubjectMappingStore for SlowStore {
    async fn subject_mappings(&self) -> Result<Vec<SubjectMapping>, NanoTdfError> {
        tokio::time::sleep(self.0).await;
        sample_mappings().subject_mappings().await
    }
}
