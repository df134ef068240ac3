//! NanoTDF envelopes and entitlement resolution
//!
//! - [`envelope`]: create and open compact, attribute-bound encrypted envelopes
//! - [`policy`]: build the Policy Descriptor an envelope is bound to
//! - [`kas`]: Key Access Service locators and public key retrieval
//! - [`entitlements`]: resolve an entity chain to the attributes it holds
//! - [`authorization`]: ask the platform's authorization service for entitlements
//! - [`config`]: platform endpoint and credentials
//!
//! The wire format lives in `opentdf-nano-protocol` and the cryptography in
//! `opentdf-nano-crypto`; both are re-exported here.

pub mod authorization;
pub mod config;
pub mod entitlements;
pub mod envelope;
pub mod error;
pub mod kas;
pub mod policy;
pub mod prelude;

pub use authorization::AuthorizationClient;
pub use config::{Credentials, PlatformConfig};
pub use entitlements::{
    ChainRule, EntitlementCache, EntitlementResolver, EntitlementSource, Entitlements, Entity,
    EntityChain, EntityClaim, InMemorySubjectMappings, SubjectCondition, SubjectMapping,
    SubjectMappingStore,
};
pub use envelope::{
    access_decision, create_envelope, create_with, open_envelope, open_parsed, open_with,
    BindingRequest, NanoTdfBuilder,
};
pub use error::NanoTdfError;
pub use kas::{KasClient, KasLocator, KasPublicKey};
pub use policy::PolicyBuilder;

pub use opentdf_nano_crypto as crypto;
pub use opentdf_nano_protocol as protocol;
pub use opentdf_nano_protocol::{
    Attribute, BindingMode, Envelope, PolicyDescriptor, PolicyExpression, SymmetricCipher,
};
pub use p256;
