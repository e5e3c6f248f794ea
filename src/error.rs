//! Error types for the data model registry

use thiserror::Error;

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Data model registry errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Cannot find the package [{package}]")]
    PackageNotFound { package: String },

    #[error("Data model not found for package name=[{package}]")]
    DataModelNotFound { package: String },

    #[error("Refreshed data model for package [{package}] is same as existing latest one (version {version})")]
    NoChangeConflict { package: String, version: u32 },

    #[error("The reference name [{reference}] is illegal")]
    InvalidReferenceFormat { reference: String },

    #[error("Cannot find the reference target with package name: [{package}]{}", target_suffix(.entity, .attribute))]
    ReferenceTargetNotFound {
        package: String,
        entity: Option<String>,
        attribute: Option<String>,
    },

    #[error("Invalid name [{name}]: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Data model version {version} already exists for package [{package}]")]
    VersionConflict { package: String, version: u32 },

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Semver error: {0}")]
    Semver(#[from] semver::Error),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),
}

fn target_suffix(entity: &Option<String>, attribute: &Option<String>) -> String {
    let mut suffix = String::new();
    if let Some(entity) = entity {
        suffix.push_str(&format!(", entity name: [{}]", entity));
    }
    if let Some(attribute) = attribute {
        suffix.push_str(&format!(", attribute name: [{}]", attribute));
    }
    suffix
}

/// Fieldless classification of a [`RegistryError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PackageNotFound,
    DataModelNotFound,
    NoChangeConflict,
    InvalidReferenceFormat,
    ReferenceTargetNotFound,
    InvalidName,
    VersionConflict,
    ChecksumMismatch,
    Storage,
}

impl RegistryError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::PackageNotFound { .. } => ErrorKind::PackageNotFound,
            RegistryError::DataModelNotFound { .. } => ErrorKind::DataModelNotFound,
            RegistryError::NoChangeConflict { .. } => ErrorKind::NoChangeConflict,
            RegistryError::InvalidReferenceFormat { .. } => ErrorKind::InvalidReferenceFormat,
            RegistryError::ReferenceTargetNotFound { .. } => ErrorKind::ReferenceTargetNotFound,
            RegistryError::InvalidName { .. } => ErrorKind::InvalidName,
            RegistryError::VersionConflict { .. } => ErrorKind::VersionConflict,
            RegistryError::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            RegistryError::Storage(_)
            | RegistryError::Io(_)
            | RegistryError::Json(_)
            | RegistryError::Semver(_)
            | RegistryError::Git(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn target_not_found(
        package: &str,
        entity: Option<&str>,
        attribute: Option<&str>,
    ) -> Self {
        RegistryError::ReferenceTargetNotFound {
            package: package.to_string(),
            entity: entity.map(String::from),
            attribute: attribute.map(String::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_not_found_message_names_every_part() {
        let err = RegistryError::target_not_found("pkgA", Some("entityX"), None);
        let msg = err.to_string();
        assert!(msg.contains("pkgA"));
        assert!(msg.contains("entityX"));
        assert!(!msg.contains("attribute name"));

        let err = RegistryError::target_not_found("pkgA", Some("entityX"), Some("attrY"));
        assert!(err.to_string().contains("attrY"));
    }

    #[test]
    fn test_kind_classification() {
        let err = RegistryError::PackageNotFound { package: "p".into() };
        assert_eq!(err.kind(), ErrorKind::PackageNotFound);

        let err: RegistryError = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }
}
