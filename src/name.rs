//! Qualified names
//!
//! Every attribute in the registry is addressed as `package:entity:attribute`.
//! The resolver (write path) and the annotator (read path) both go through
//! [`QualifiedName`], so the two always agree on addressing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{RegistryError, Result};

/// The reserved delimiter between the three parts of a qualified name
pub const DELIMITER: char = ':';

/// A `(package, entity, attribute)` triple
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedName {
    pub package: String,
    pub entity: String,
    pub attribute: String,
}

impl QualifiedName {
    pub fn new(
        package: impl Into<String>,
        entity: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        Self {
            package: package.into(),
            entity: entity.into(),
            attribute: attribute.into(),
        }
    }

    /// Join the three parts with [`DELIMITER`]
    pub fn encode(&self) -> String {
        encode(&self.package, &self.entity, &self.attribute)
    }

    /// Split an encoded name back into its parts.
    ///
    /// Fails with `InvalidReferenceFormat` unless the split yields exactly
    /// three non-empty parts after trimming.
    pub fn decode(encoded: &str) -> Result<Self> {
        let parts: Vec<&str> = encoded.split(DELIMITER).map(str::trim).collect();
        match parts.as_slice() {
            [package, entity, attribute]
                if !package.is_empty() && !entity.is_empty() && !attribute.is_empty() =>
            {
                Ok(Self::new(*package, *entity, *attribute))
            }
            _ => Err(RegistryError::InvalidReferenceFormat {
                reference: encoded.to_string(),
            }),
        }
    }
}

/// Build the canonical encoded form without allocating a `QualifiedName`
pub fn encode(package: &str, entity: &str, attribute: &str) -> String {
    format!("{package}{DELIMITER}{entity}{DELIMITER}{attribute}")
}

/// Check that a package, entity or attribute name can take part in a qualified name
pub fn validate_name(name: &str) -> Result<()> {
    let reason = if name.trim().is_empty() {
        Some("name must not be empty".to_string())
    } else if name.trim() != name {
        Some("name must not have leading or trailing whitespace".to_string())
    } else if name.contains(DELIMITER) {
        Some(format!("name must not contain '{DELIMITER}'"))
    } else {
        None
    };

    match reason {
        Some(reason) => Err(RegistryError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for QualifiedName {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}
