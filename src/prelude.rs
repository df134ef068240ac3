//! NanoTDF Prelude
//!
//! Commonly used types in one import.
//!
//! # Example
//!
//! ```rust
//! use opentdf_nano::prelude::*;
//!
//! # fn example() -> Result<(), NanoTdfError> {
//! let policy = PolicyBuilder::new()
//!     .attribute("https://example.com/attr/classification/value/secret")?
//!     .build()?;
//! assert_eq!(policy.expression(), PolicyExpression::AllOf);
//! # Ok(())
//! # }
//! ```

pub use crate::authorization::AuthorizationClient;
pub use crate::config::{Credentials, PlatformConfig};
pub use crate::entitlements::{
    ChainRule, EntitlementCache, EntitlementResolver, EntitlementSource, Entitlements, Entity,
    EntityChain, EntityClaim, SubjectCondition, SubjectMapping, SubjectMappingStore,
};
pub use crate::envelope::{access_decision, open_envelope, BindingRequest, NanoTdfBuilder};
pub use crate::error::NanoTdfError;
pub use crate::kas::{KasClient, KasLocator, KasPublicKey};
pub use crate::policy::PolicyBuilder;

pub use opentdf_nano_crypto::KeyEncapsulation;
pub use opentdf_nano_protocol::{
    Attribute, BindingMode, Envelope, PolicyDescriptor, PolicyExpression, SymmetricCipher,
};
