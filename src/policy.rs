//! Policy Descriptor construction
//!
//! A descriptor names the attributes a requester must hold. An empty
//! attribute set produces an explicit open-access descriptor; `AnyOf` or
//! `AllOf` over nothing is never produced.
//!
//! # Example
//!
//! ```
//! use opentdf_nano::policy::PolicyBuilder;
//!
//! # fn example() -> Result<(), opentdf_nano::NanoTdfError> {
//! let policy = PolicyBuilder::new()
//!     .attribute("https://example.com/attr/classification/value/secret")?
//!     .dissem("bob@orga.com")
//!     .build()?;
//! assert_eq!(policy.attributes().len(), 1);
//! # Ok(())
//! # }
//! ```

use crate::error::NanoTdfError;
use opentdf_nano_protocol::{Attribute, BindingMode, PolicyDescriptor, PolicyExpression};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Build an `AllOf` descriptor from attribute FQNs, or an open-access
/// descriptor when there are none
pub fn build<I, S>(attributes: I) -> Result<PolicyDescriptor, NanoTdfError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    attributes
        .into_iter()
        .try_fold(PolicyBuilder::new(), |builder, fqn| builder.attribute(fqn))?
        .build()
}

/// Builder for [`PolicyDescriptor`]
#[derive(Debug, Clone, Default)]
pub struct PolicyBuilder {
    attributes: BTreeSet<Attribute>,
    any_of: bool,
    dissem: Vec<String>,
    binding_mode: BindingMode,
}

impl PolicyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute from its FQN, e.g.
    /// `https://example.com/attr/classification/value/secret`
    pub fn attribute(mut self, fqn: impl AsRef<str>) -> Result<Self, NanoTdfError> {
        self.attributes.insert(Attribute::parse(fqn.as_ref())?);
        Ok(self)
    }

    /// Add already-parsed attributes
    #[must_use]
    pub fn attributes(mut self, attributes: impl IntoIterator<Item = Attribute>) -> Self {
        self.attributes.extend(attributes);
        self
    }

    /// Require any one of the attributes instead of all of them
    #[must_use]
    pub fn any_of(mut self) -> Self {
        self.any_of = true;
        self
    }

    /// Add a dissemination target
    #[must_use]
    pub fn dissem(mut self, target: impl Into<String>) -> Self {
        self.dissem.push(target.into());
        self
    }

    /// Binding mode tag carried in the descriptor
    ///
    /// Envelope construction overrides this with the mode actually used.
    #[must_use]
    pub fn binding_mode(mut self, mode: BindingMode) -> Self {
        self.binding_mode = mode;
        self
    }

    /// Build with a fresh policy UUID
    pub fn build(self) -> Result<PolicyDescriptor, NanoTdfError> {
        let expression = match (self.attributes.is_empty(), self.any_of) {
            (true, false) => PolicyExpression::Open,
            (true, true) => {
                return Err(NanoTdfError::InvalidPolicy(
                    "any-of requires at least one attribute".to_string(),
                ))
            }
            (false, false) => PolicyExpression::AllOf,
            (false, true) => PolicyExpression::AnyOf,
        };

        let descriptor = PolicyDescriptor::new(
            Uuid::new_v4(),
            self.binding_mode,
            expression,
            self.attributes,
            self.dissem,
        )
        .map_err(|e| NanoTdfError::InvalidPolicy(e.to_string()))?;

        // Encoding enforces the descriptor size limit.
        descriptor
            .to_bytes()
            .map_err(|e| NanoTdfError::InvalidPolicy(e.to_string()))?;
        Ok(descriptor)
    }
}
