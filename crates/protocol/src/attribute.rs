//! Attribute value FQNs
//!
//! Envelope policies name attribute values by fully qualified name:
//!
//! - Namespace: `https://<namespace>`
//! - Attribute: `https://<namespace>/attr/<name>`
//! - Value: `https://<namespace>/attr/<name>/value/<value>`
//!
//! Only value FQNs can be placed in a policy. FQNs are case-insensitive and
//! are stored lower-cased, so two spellings of the same value compare equal
//! and collapse inside a set.
//!
//! ```
//! use opentdf_nano_protocol::Attribute;
//!
//! let attr = Attribute::parse("https://Example.com/attr/Classification/value/Secret")?;
//! assert_eq!(attr.namespace(), "example.com");
//! assert_eq!(attr.name(), "classification");
//! assert_eq!(attr.value(), "secret");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Attribute FQN parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeError {
    #[error("attribute FQN must use the https scheme: {fqn}")]
    NotHttps { fqn: String },

    #[error("attribute FQN missing /attr/<name>/value/<value> structure: {fqn}")]
    MissingAttrStructure { fqn: String },

    #[error("attribute FQN missing {component}: {fqn}")]
    MissingComponent {
        component: &'static str,
        fqn: String,
    },

    #[error("attribute FQN has an invalid {component} '{segment}': {fqn}")]
    InvalidSegment {
        component: &'static str,
        segment: String,
        fqn: String,
    },
}

impl AttributeError {
    /// Returns a hint for how to fix this error
    pub fn hint(&self) -> &'static str {
        match self {
            AttributeError::NotHttps { .. } => {
                "Use HTTPS scheme: https://example.com/attr/name/value/val"
            }
            AttributeError::MissingAttrStructure { .. } | AttributeError::MissingComponent { .. } => {
                "Attribute values take the form https://<namespace>/attr/<name>/value/<value>"
            }
            AttributeError::InvalidSegment { .. } => {
                "Segments may only contain letters, digits, '-', '_', '.', '~' and percent escapes"
            }
        }
    }
}

/// Fully qualified attribute value
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Attribute {
    namespace: String,
    name: String,
    value: String,
}

impl Attribute {
    /// Parse and normalize an attribute value FQN
    pub fn parse(fqn: &str) -> Result<Self, AttributeError> {
        let rest = match fqn.split_once("://") {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("https") => rest,
            _ => {
                return Err(AttributeError::NotHttps {
                    fqn: fqn.to_string(),
                })
            }
        };

        let (namespace, path) = rest.split_once('/').unwrap_or((rest, ""));
        if namespace.is_empty() {
            return Err(AttributeError::MissingComponent {
                component: "namespace",
                fqn: fqn.to_string(),
            });
        }
        check_namespace(namespace, fqn)?;

        let path = path
            .strip_prefix("attr/")
            .ok_or_else(|| AttributeError::MissingAttrStructure {
                fqn: fqn.to_string(),
            })?;
        let (name, value) =
            path.split_once("/value/")
                .ok_or_else(|| AttributeError::MissingComponent {
                    component: "value",
                    fqn: fqn.to_string(),
                })?;

        check_segment("name", name, fqn)?;
        check_segment("value", value, fqn)?;

        Ok(Self {
            namespace: namespace.to_ascii_lowercase(),
            name: name.to_ascii_lowercase(),
            value: value.to_ascii_lowercase(),
        })
    }

    /// Build from components, applying the same validation as [`Attribute::parse`]
    pub fn new(namespace: &str, name: &str, value: &str) -> Result<Self, AttributeError> {
        Self::parse(&format!("https://{namespace}/attr/{name}/value/{value}"))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// FQN of the attribute definition this value belongs to
    pub fn definition_fqn(&self) -> String {
        format!("https://{}/attr/{}", self.namespace, self.name)
    }

    /// Full value FQN
    pub fn fqn(&self) -> String {
        format!(
            "https://{}/attr/{}/value/{}",
            self.namespace, self.name, self.value
        )
    }
}

fn check_namespace(namespace: &str, fqn: &str) -> Result<(), AttributeError> {
    let valid = namespace
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        && !namespace.starts_with('.')
        && !namespace.ends_with('.');
    if valid {
        Ok(())
    } else {
        Err(AttributeError::InvalidSegment {
            component: "namespace",
            segment: namespace.to_string(),
            fqn: fqn.to_string(),
        })
    }
}

fn check_segment(component: &'static str, segment: &str, fqn: &str) -> Result<(), AttributeError> {
    if segment.is_empty() {
        return Err(AttributeError::MissingComponent {
            component,
            fqn: fqn.to_string(),
        });
    }
    let valid = segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~' | '%'));
    if valid {
        Ok(())
    } else {
        Err(AttributeError::InvalidSegment {
            component,
            segment: segment.to_string(),
            fqn: fqn.to_string(),
        })
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fqn())
    }
}

impl FromStr for Attribute {
    type Err = AttributeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Attribute {
    type Error = AttributeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Attribute> for String {
    fn from(attr: Attribute) -> Self {
        attr.fqn()
    }
}
