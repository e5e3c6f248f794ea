//! Data model types
//!
//! Three layers live here:
//! - caller input ([`DataModelInput`]), as published by a package
//! - the validated but unresolved [`CandidateModel`]
//! - the immutable, resolved [`DataModel`] graph that gets persisted
//!
//! A data model owns all of its entities and attributes. References between
//! attributes are stored as [`ResolvedReference`] values (qualified name plus
//! attribute id), never as pointers into another graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::checksum::Checksum;
use crate::equality::ModelShape;
use crate::error::{RegistryError, Result};
use crate::name::{validate_name, QualifiedName};
use crate::version::{ModelVersion, PackageVersion};

/// Attribute data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Str,
    Int,
    Float,
    Text,
    Date,
    Datetime,
    Timestamp,
    Bool,
    /// Pointer to another attribute
    Ref,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Str => "str",
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::Text => "text",
            DataType::Date => "date",
            DataType::Datetime => "datetime",
            DataType::Timestamp => "timestamp",
            DataType::Bool => "bool",
            DataType::Ref => "ref",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        let data_type = match s.trim().to_ascii_lowercase().as_str() {
            "str" => DataType::Str,
            "int" => DataType::Int,
            "float" => DataType::Float,
            "text" => DataType::Text,
            "date" => DataType::Date,
            "datetime" => DataType::Datetime,
            "timestamp" => DataType::Timestamp,
            "bool" => DataType::Bool,
            "ref" => DataType::Ref,
            _ => {
                return Err(RegistryError::InvalidName {
                    name: s.to_string(),
                    reason: "unknown data type".to_string(),
                })
            }
        };
        Ok(data_type)
    }
}

// =============================================================================
// Packages (read-only view of the package lifecycle)
// =============================================================================

/// Lifecycle status of a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    #[default]
    Unregistered,
    Registered,
    Running,
    Stopped,
    Decommissioned,
}

/// A package known to the package lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: PackageVersion,
    #[serde(default)]
    pub status: PackageStatus,
}

impl Package {
    pub fn new(name: impl Into<String>, version: PackageVersion) -> Self {
        Self {
            name: name.into(),
            version,
            status: PackageStatus::default(),
        }
    }

    pub fn with_status(mut self, status: PackageStatus) -> Self {
        self.status = status;
        self
    }
}

// =============================================================================
// Caller input
// =============================================================================

/// A data model as published by a package
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataModelInput {
    pub package_name: String,
    /// Only honoured for the first data model of a package
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default)]
    pub entities: Vec<EntityInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityInput {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeInput {
    pub name: String,
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_package_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_entity_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_attribute_name: Option<String>,
}

impl DataModelInput {
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            version: None,
            entities: Vec::new(),
        }
    }

    pub fn with_entity(mut self, entity: EntityInput) -> Self {
        self.entities.push(entity);
        self
    }
}

impl EntityInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            description: None,
            attributes: Vec::new(),
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeInput) -> Self {
        self.attributes.push(attribute);
        self
    }
}

impl AttributeInput {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            description: None,
            ref_package_name: None,
            ref_entity_name: None,
            ref_attribute_name: None,
        }
    }

    /// A `ref` attribute pointing at `package:entity:attribute`
    pub fn reference(
        name: impl Into<String>,
        package: impl Into<String>,
        entity: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        Self {
            ref_package_name: Some(package.into()),
            ref_entity_name: Some(entity.into()),
            ref_attribute_name: Some(attribute.into()),
            ..Self::new(name, DataType::Ref)
        }
    }
}

// =============================================================================
// Candidate (validated, unresolved)
// =============================================================================

/// A data model built from caller input, not yet versioned or resolved
#[derive(Debug, Clone)]
pub struct CandidateModel {
    pub package_name: String,
    pub requested_version: Option<ModelVersion>,
    pub entities: Vec<CandidateEntity>,
}

#[derive(Debug, Clone)]
pub struct CandidateEntity {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub attributes: Vec<CandidateAttribute>,
}

#[derive(Debug, Clone)]
pub struct CandidateAttribute {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub data_type: DataType,
    /// Symbolic target as supplied by the caller; present only for `ref` attributes.
    /// Parts are trimmed but otherwise unchecked until resolution.
    pub ref_target: Option<QualifiedName>,
}

impl CandidateModel {
    /// Validate caller input and assign fresh identifiers
    pub fn materialize(input: DataModelInput) -> Result<Self> {
        validate_name(&input.package_name)?;

        let mut entity_names = HashSet::new();
        let mut entities = Vec::with_capacity(input.entities.len());

        for entity in input.entities {
            validate_name(&entity.name)?;
            if !entity_names.insert(entity.name.clone()) {
                return Err(RegistryError::InvalidName {
                    name: entity.name,
                    reason: format!("duplicate entity in package [{}]", input.package_name),
                });
            }

            let mut attribute_names = HashSet::new();
            let mut attributes = Vec::with_capacity(entity.attributes.len());
            for attribute in entity.attributes {
                validate_name(&attribute.name)?;
                if !attribute_names.insert(attribute.name.clone()) {
                    return Err(RegistryError::InvalidName {
                        name: attribute.name,
                        reason: format!("duplicate attribute in entity [{}]", entity.name),
                    });
                }

                let ref_target = (attribute.data_type == DataType::Ref).then(|| {
                    let part = |p: &Option<String>| p.as_deref().unwrap_or("").trim().to_string();
                    QualifiedName::new(
                        part(&attribute.ref_package_name),
                        part(&attribute.ref_entity_name),
                        part(&attribute.ref_attribute_name),
                    )
                });

                attributes.push(CandidateAttribute {
                    id: Uuid::new_v4(),
                    name: attribute.name,
                    description: attribute.description,
                    data_type: attribute.data_type,
                    ref_target,
                });
            }

            entities.push(CandidateEntity {
                id: Uuid::new_v4(),
                display_name: entity.display_name.unwrap_or_else(|| entity.name.clone()),
                name: entity.name,
                description: entity.description,
                attributes,
            });
        }

        Ok(Self {
            package_name: input.package_name,
            requested_version: input.version.map(ModelVersion::new),
            entities,
        })
    }

    /// Qualified name of one of this candidate's attributes
    pub fn qualified_name(&self, entity: &CandidateEntity, attribute: &CandidateAttribute) -> QualifiedName {
        QualifiedName::new(&self.package_name, &entity.name, &attribute.name)
    }
}

// =============================================================================
// Persisted graph
// =============================================================================

/// The attribute a `ref` attribute was bound to at registration time
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedReference {
    pub attribute_id: Uuid,
    pub target: QualifiedName,
    /// Version of the target package's data model at resolution time
    pub data_model_version: ModelVersion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_target: Option<QualifiedName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<ResolvedReference>,
}

impl Attribute {
    pub fn is_ref(&self) -> bool {
        self.data_type == DataType::Ref
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: Uuid,
    pub package_name: String,
    pub data_model_version: ModelVersion,
    pub name: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub attributes: Vec<Attribute>,
}

impl Entity {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn summary(&self) -> EntitySummary {
        EntitySummary {
            id: self.id,
            package_name: self.package_name.clone(),
            data_model_version: self.data_model_version,
            name: self.name.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// Identity of an entity, as used in reference annotations
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySummary {
    pub id: Uuid,
    pub package_name: String,
    pub data_model_version: ModelVersion,
    pub name: String,
    pub display_name: String,
}

/// One immutable, versioned snapshot of a package's schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataModel {
    pub id: Uuid,
    pub package_name: String,
    pub version: ModelVersion,
    pub created_at: DateTime<Utc>,
    /// Checksum of the structural shape, see [`ModelShape`]
    pub checksum: Checksum,
    pub entities: Vec<Entity>,
}

impl DataModel {
    /// Assemble a data model, computing its shape checksum
    pub fn new(package_name: impl Into<String>, version: ModelVersion, entities: Vec<Entity>) -> Result<Self> {
        let mut model = Self {
            id: Uuid::new_v4(),
            package_name: package_name.into(),
            version,
            created_at: Utc::now(),
            checksum: Checksum::from(String::new()),
            entities,
        };
        model.checksum = model.shape().checksum()?;
        Ok(model)
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Find an attribute by entity and attribute name
    pub fn attribute(&self, entity: &str, attribute: &str) -> Option<&Attribute> {
        self.entity(entity).and_then(|e| e.attribute(attribute))
    }

    pub fn shape(&self) -> ModelShape {
        ModelShape::of_model(self)
    }

    /// Recompute the shape checksum and compare it with the recorded one
    pub fn verify_checksum(&self) -> Result<()> {
        let actual = self.shape().checksum()?;
        if actual != self.checksum {
            return Err(RegistryError::ChecksumMismatch {
                expected: self.checksum.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn host_input() -> DataModelInput {
        DataModelInput::new("wecmdb").with_entity(
            EntityInput::new("host")
                .with_attribute(AttributeInput::new("id", DataType::Str))
                .with_attribute(AttributeInput::new("name", DataType::Str)),
        )
    }

    #[test]
    fn test_data_type_parsing() {
        assert_eq!("ref".parse::<DataType>().unwrap(), DataType::Ref);
        assert_eq!("STR".parse::<DataType>().unwrap(), DataType::Str);
        assert!("blob".parse::<DataType>().is_err());
        assert_eq!(DataType::Datetime.to_string(), "datetime");
    }

    #[test]
    fn test_input_deserializes_camel_case() {
        let input: DataModelInput = serde_json::from_value(serde_json::json!({
            "packageName": "wecmdb",
            "entities": [{
                "name": "ip",
                "displayName": "IP Address",
                "attributes": [
                    { "name": "host_id", "dataType": "ref",
                      "refPackageName": "wecmdb", "refEntityName": "host", "refAttributeName": "id" }
                ]
            }]
        }))
        .unwrap();
        assert_eq!(input.entities[0].display_name.as_deref(), Some("IP Address"));
        assert_eq!(input.entities[0].attributes[0].data_type, DataType::Ref);
        assert_eq!(input.entities[0].attributes[0].ref_entity_name.as_deref(), Some("host"));
    }

    #[test]
    fn test_materialize_defaults_display_name() {
        let candidate = CandidateModel::materialize(host_input()).unwrap();
        assert_eq!(candidate.entities[0].display_name, "host");
        assert_eq!(candidate.requested_version, None);
    }

    #[test]
    fn test_materialize_drops_ref_target_of_plain_attributes() {
        let mut attribute = AttributeInput::new("name", DataType::Str);
        attribute.ref_package_name = Some("wecmdb".into());
        let input = DataModelInput::new("wecmdb")
            .with_entity(EntityInput::new("host").with_attribute(attribute));
        let candidate = CandidateModel::materialize(input).unwrap();
        assert!(candidate.entities[0].attributes[0].ref_target.is_none());
    }

    #[test]
    fn test_materialize_trims_ref_target() {
        let input = DataModelInput::new("wecmdb").with_entity(
            EntityInput::new("ip")
                .with_attribute(AttributeInput::reference("host_id", " wecmdb", "host ", "id")),
        );
        let candidate = CandidateModel::materialize(input).unwrap();
        assert_eq!(
            candidate.entities[0].attributes[0].ref_target,
            Some(QualifiedName::new("wecmdb", "host", "id"))
        );
    }

    #[test]
    fn test_materialize_rejects_duplicates_and_bad_names() {
        let input = host_input().with_entity(EntityInput::new("host"));
        let err = CandidateModel::materialize(input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidName);

        let input = DataModelInput::new("wecmdb").with_entity(
            EntityInput::new("host")
                .with_attribute(AttributeInput::new("id", DataType::Str))
                .with_attribute(AttributeInput::new("id", DataType::Int)),
        );
        assert_eq!(CandidateModel::materialize(input).unwrap_err().kind(), ErrorKind::InvalidName);

        let input = DataModelInput::new("we:cmdb");
        assert_eq!(CandidateModel::materialize(input).unwrap_err().kind(), ErrorKind::InvalidName);
    }

    #[test]
    fn test_data_model_checksum_verification() {
        let entity = Entity {
            id: Uuid::new_v4(),
            package_name: "wecmdb".into(),
            data_model_version: ModelVersion::INITIAL,
            name: "host".into(),
            display_name: "Host".into(),
            description: None,
            attributes: vec![],
        };
        let mut model = DataModel::new("wecmdb", ModelVersion::INITIAL, vec![entity]).unwrap();
        assert!(model.verify_checksum().is_ok());

        model.entities[0].name = "server".into();
        let err = model.verify_checksum().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChecksumMismatch);
    }
}
