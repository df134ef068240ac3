//! Policy Descriptor
//!
//! The descriptor names the attribute values a requester must hold for the
//! KAS to release the envelope's key. It is serialized once, and the exact
//! bytes are what the policy binding covers, so a parsed envelope keeps the
//! raw bytes and decodes them on demand.
//!
//! ```text
//! ┌────────────┬──────────┬───────────┬─────────────────────┬──────────────────────┐
//! │Binding (1B)│UUID (16B)│Expr (1B)  │u16 n + n × (u16 FQN)│u16 m + m × (u16 str) │
//! └────────────┴──────────┴───────────┴─────────────────────┴──────────────────────┘
//!                                       attributes             dissemination
//! ```

use crate::attribute::Attribute;
use crate::binary::{write_u16_be, write_u16_prefixed, write_u8, ByteReader};
use crate::error::FormatError;
use crate::nanotdf::header::BindingMode;
use crate::nanotdf::MAX_POLICY_LEN;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Maximum length of a single attribute FQN or dissemination entry
pub const MAX_ENTRY_LEN: usize = 1024;

/// Boolean expression applied to the attribute set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PolicyExpression {
    /// No attributes required; anyone the KAS serves may open the envelope
    Open = 0x00,
    /// Every listed attribute is required
    AllOf = 0x01,
    /// At least one listed attribute is required
    AnyOf = 0x02,
}

impl PolicyExpression {
    pub fn from_byte(byte: u8) -> Result<Self, FormatError> {
        match byte {
            0x00 => Ok(PolicyExpression::Open),
            0x01 => Ok(PolicyExpression::AllOf),
            0x02 => Ok(PolicyExpression::AnyOf),
            _ => Err(FormatError::invalid(
                "policy expression",
                format!("unknown tag 0x{byte:02X}"),
            )),
        }
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Attribute policy carried in the envelope header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDescriptor {
    id: Uuid,
    binding_mode: BindingMode,
    expression: PolicyExpression,
    attributes: BTreeSet<Attribute>,
    dissem: Vec<String>,
}

impl PolicyDescriptor {
    /// Assemble a descriptor, enforcing that `Open` is used exactly when the
    /// attribute set is empty
    pub fn new(
        id: Uuid,
        binding_mode: BindingMode,
        expression: PolicyExpression,
        attributes: BTreeSet<Attribute>,
        dissem: Vec<String>,
    ) -> Result<Self, FormatError> {
        match (expression, attributes.is_empty()) {
            (PolicyExpression::Open, false) => {
                return Err(FormatError::invalid(
                    "policy expression",
                    "open-access policy cannot list attributes",
                ))
            }
            (PolicyExpression::AllOf | PolicyExpression::AnyOf, true) => {
                return Err(FormatError::invalid(
                    "policy expression",
                    "attribute expression requires at least one attribute",
                ))
            }
            _ => {}
        }
        for entry in &dissem {
            if entry.trim().is_empty() {
                return Err(FormatError::invalid("dissemination", "empty entry"));
            }
            if entry.len() > MAX_ENTRY_LEN {
                return Err(FormatError::FieldTooLong {
                    field: "dissemination",
                    len: entry.len(),
                    max: MAX_ENTRY_LEN,
                });
            }
        }
        Ok(Self {
            id,
            binding_mode,
            expression,
            attributes,
            dissem,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn binding_mode(&self) -> BindingMode {
        self.binding_mode
    }

    pub fn expression(&self) -> PolicyExpression {
        self.expression
    }

    pub fn attributes(&self) -> &BTreeSet<Attribute> {
        &self.attributes
    }

    pub fn dissem(&self) -> &[String] {
        &self.dissem
    }

    pub fn is_open_access(&self) -> bool {
        self.expression == PolicyExpression::Open
    }

    /// Copy of this descriptor with a different binding mode
    pub fn with_binding_mode(mut self, binding_mode: BindingMode) -> Self {
        self.binding_mode = binding_mode;
        self
    }

    /// Evaluate the expression against a set of held attributes
    pub fn is_satisfied_by(&self, held: &BTreeSet<Attribute>) -> bool {
        match self.expression {
            PolicyExpression::Open => true,
            PolicyExpression::AllOf => self.attributes.is_subset(held),
            PolicyExpression::AnyOf => !self.attributes.is_disjoint(held),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, FormatError> {
        let mut out = Vec::new();
        write_u8(&mut out, self.binding_mode.to_byte());
        out.extend_from_slice(self.id.as_bytes());
        write_u8(&mut out, self.expression.to_byte());

        write_count(&mut out, self.attributes.len(), "policy attributes")?;
        for attribute in &self.attributes {
            write_u16_prefixed(
                &mut out,
                attribute.fqn().as_bytes(),
                "policy attribute",
                MAX_ENTRY_LEN,
            )?;
        }

        write_count(&mut out, self.dissem.len(), "dissemination")?;
        for entry in &self.dissem {
            write_u16_prefixed(&mut out, entry.as_bytes(), "dissemination", MAX_ENTRY_LEN)?;
        }

        if out.len() > MAX_POLICY_LEN {
            return Err(FormatError::FieldTooLong {
                field: "policy descriptor",
                len: out.len(),
                max: MAX_POLICY_LEN,
            });
        }
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        let mut reader = ByteReader::new(bytes);
        let binding_mode = BindingMode::from_byte(reader.read_u8("policy binding mode")?)?;
        let id = Uuid::from_bytes(reader.read_array("policy id")?);
        let expression = PolicyExpression::from_byte(reader.read_u8("policy expression")?)?;

        let count = reader.read_u16_be("policy attributes")? as usize;
        let mut attributes = BTreeSet::new();
        for _ in 0..count {
            let raw = read_utf8(&mut reader, "policy attribute")?;
            let attribute = Attribute::parse(raw)
                .map_err(|e| FormatError::invalid("policy attribute", e.to_string()))?;
            if !attributes.insert(attribute) {
                return Err(FormatError::invalid(
                    "policy attribute",
                    format!("duplicate entry {raw}"),
                ));
            }
        }

        let count = reader.read_u16_be("dissemination")? as usize;
        let mut dissem = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            dissem.push(read_utf8(&mut reader, "dissemination")?.to_string());
        }

        reader.finish()?;
        Self::new(id, binding_mode, expression, attributes, dissem)
    }
}

fn write_count(out: &mut Vec<u8>, count: usize, field: &'static str) -> Result<(), FormatError> {
    let count = u16::try_from(count).map_err(|_| FormatError::FieldTooLong {
        field,
        len: count,
        max: u16::MAX as usize,
    })?;
    write_u16_be(out, count);
    Ok(())
}

fn read_utf8<'a>(reader: &mut ByteReader<'a>, field: &'static str) -> Result<&'a str, FormatError> {
    let raw = reader.read_u16_prefixed(field, MAX_ENTRY_LEN)?;
    std::str::from_utf8(raw).map_err(|_| FormatError::invalid(field, "not UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(fqns: &[&str]) -> BTreeSet<Attribute> {
        fqns.iter().map(|f| Attribute::parse(f).unwrap()).collect()
    }

    #[test]
    fn test_descriptor_roundtrip() {
        let descriptor = PolicyDescriptor::new(
            Uuid::new_v4(),
            BindingMode::Ecdsa,
            PolicyExpression::AllOf,
            attrs(&[
                "https://example.org/attr/classification/value/secret",
                "https://example.org/attr/country/value/usa",
            ]),
            vec!["bob@orga.com".to_string()],
        )
        .unwrap();

        let bytes = descriptor.to_bytes().unwrap();
        assert_eq!(bytes[0], BindingMode::Ecdsa.to_byte());
        assert_eq!(&bytes[1..17], descriptor.id().as_bytes());
        assert_eq!(bytes[17], PolicyExpression::AllOf.to_byte());

        let decoded = PolicyDescriptor::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, descriptor);
    }

    #[test]
    fn test_open_access_layout() {
        let descriptor = PolicyDescriptor::new(
            Uuid::nil(),
            BindingMode::Hmac,
            PolicyExpression::Open,
            BTreeSet::new(),
            Vec::new(),
        )
        .unwrap();
        let bytes = descriptor.to_bytes().unwrap();
        // mode + uuid + expression + two empty counts
        assert_eq!(bytes.len(), 1 + 16 + 1 + 2 + 2);
        assert_eq!(bytes[17], 0x00);
        assert!(PolicyDescriptor::from_bytes(&bytes).unwrap().is_open_access());
    }

    #[test]
    fn test_expression_attribute_consistency() {
        let some = attrs(&["https://example.org/attr/a/value/b"]);
        assert!(PolicyDescriptor::new(
            Uuid::nil(),
            BindingMode::Hmac,
            PolicyExpression::Open,
            some,
            vec![]
        )
        .is_err());
        assert!(PolicyDescriptor::new(
            Uuid::nil(),
            BindingMode::Hmac,
            PolicyExpression::AnyOf,
            BTreeSet::new(),
            vec![]
        )
        .is_err());
    }

    #[test]
    fn test_evaluation() {
        let required = attrs(&[
            "https://example.org/attr/a/value/1",
            "https://example.org/attr/b/value/2",
        ]);
        let held = attrs(&["https://example.org/attr/a/value/1"]);

        let all_of = PolicyDescriptor::new(
            Uuid::nil(),
            BindingMode::Hmac,
            PolicyExpression::AllOf,
            required.clone(),
            vec![],
        )
        .unwrap();
        assert!(!all_of.is_satisfied_by(&held));
        assert!(all_of.is_satisfied_by(&required));

        let any_of = PolicyDescriptor::new(
            Uuid::nil(),
            BindingMode::Hmac,
            PolicyExpression::AnyOf,
            required,
            vec![],
        )
        .unwrap();
        assert!(any_of.is_satisfied_by(&held));
        assert!(!any_of.is_satisfied_by(&BTreeSet::new()));
    }

    #[test]
    fn test_decode_rejects_trailing_and_truncated() {
        let descriptor = PolicyDescriptor::new(
            Uuid::new_v4(),
            BindingMode::Hmac,
            PolicyExpression::AnyOf,
            attrs(&["https://example.org/attr/a/value/b"]),
            vec![],
        )
        .unwrap();
        let mut bytes = descriptor.to_bytes().unwrap();

        assert!(matches!(
            PolicyDescriptor::from_bytes(&bytes[..bytes.len() - 3]),
            Err(FormatError::Truncated { .. })
        ));

        bytes.push(0);
        assert_eq!(
            PolicyDescriptor::from_bytes(&bytes),
            Err(FormatError::TrailingBytes(1))
        );
    }
}
