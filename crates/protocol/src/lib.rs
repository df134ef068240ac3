//! NanoTDF Protocol Types
//!
//! This crate contains the data structures and binary codec for NanoTDF
//! envelopes:
//! - Attribute value FQNs
//! - Policy Descriptor wire format
//! - KAS resource locator and header bitfields
//! - Envelope serialization and structural parsing
//!
//! This crate contains NO cryptographic operations and NO I/O.

pub mod attribute;
pub mod binary;
pub mod error;
pub mod nanotdf;

pub use attribute::{Attribute, AttributeError};
pub use error::FormatError;
pub use nanotdf::{
    BindingMode, Envelope, HeaderConfig, Payload, PolicyDescriptor, PolicyExpression, Protocol,
    ResourceLocator, SymmetricCipher,
};
