//! Structural equality of data models
//!
//! Two data models are equivalent when they declare the same entities, each
//! with the same attributes (name, data type, and symbolic target for `ref`
//! attributes). Identifiers, timestamps, display names, descriptions and
//! resolved references do not take part.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::checksum::Checksum;
use crate::model::{CandidateModel, DataModel, DataType};
use crate::name::QualifiedName;

/// Order-independent fingerprint of a data model's structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelShape {
    entities: BTreeMap<String, EntityShape>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct EntityShape {
    attributes: BTreeMap<String, AttributeShape>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct AttributeShape {
    data_type: DataType,
    #[serde(skip_serializing_if = "Option::is_none")]
    ref_target: Option<String>,
}

impl AttributeShape {
    fn new(data_type: DataType, ref_target: Option<&QualifiedName>) -> Self {
        Self {
            data_type,
            ref_target: ref_target
                .filter(|_| data_type == DataType::Ref)
                .map(QualifiedName::encode),
        }
    }
}

impl ModelShape {
    pub fn of_candidate(candidate: &CandidateModel) -> Self {
        let entities = candidate
            .entities
            .iter()
            .map(|entity| {
                let attributes = entity
                    .attributes
                    .iter()
                    .map(|a| (a.name.clone(), AttributeShape::new(a.data_type, a.ref_target.as_ref())))
                    .collect();
                (entity.name.clone(), EntityShape { attributes })
            })
            .collect();
        Self { entities }
    }

    pub fn of_model(model: &DataModel) -> Self {
        let entities = model
            .entities
            .iter()
            .map(|entity| {
                let attributes = entity
                    .attributes
                    .iter()
                    .map(|a| (a.name.clone(), AttributeShape::new(a.data_type, a.ref_target.as_ref())))
                    .collect();
                (entity.name.clone(), EntityShape { attributes })
            })
            .collect();
        Self { entities }
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// SHA256 over the canonical JSON form of this shape
    pub fn checksum(&self) -> serde_json::Result<Checksum> {
        Checksum::of(self)
    }
}

/// Whether a candidate declares nothing materially different from the latest persisted model
pub fn is_equivalent(candidate: &CandidateModel, latest: &DataModel) -> bool {
    ModelShape::of_candidate(candidate) == ModelShape::of_model(latest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttributeInput, DataModelInput, EntityInput};
    use crate::resolver::ReferenceResolver;
    use crate::store::MemoryStore;
    use crate::version::ModelVersion;

    fn candidate(entities: Vec<EntityInput>) -> CandidateModel {
        let mut input = DataModelInput::new("wecmdb");
        input.entities = entities;
        CandidateModel::materialize(input).unwrap()
    }

    fn host() -> EntityInput {
        EntityInput::new("host")
            .with_display_name("Host")
            .with_attribute(AttributeInput::new("id", DataType::Str))
            .with_attribute(AttributeInput::new("name", DataType::Str))
    }

    fn ip(target_attribute: &str) -> EntityInput {
        EntityInput::new("ip")
            .with_attribute(AttributeInput::new("id", DataType::Str))
            .with_attribute(AttributeInput::reference("host_id", "wecmdb", "host", target_attribute))
    }

    fn persisted(entities: Vec<EntityInput>) -> DataModel {
        let store = MemoryStore::new();
        ReferenceResolver::new(&store)
            .resolve(&candidate(entities), ModelVersion::INITIAL)
            .unwrap()
    }

    #[test]
    fn test_identical_models_are_equivalent() {
        let latest = persisted(vec![host(), ip("id")]);
        assert!(is_equivalent(&candidate(vec![host(), ip("id")]), &latest));
    }

    #[test]
    fn test_entity_and_attribute_order_is_ignored() {
        let latest = persisted(vec![host(), ip("id")]);
        let reordered = EntityInput::new("host")
            .with_attribute(AttributeInput::new("name", DataType::Str))
            .with_attribute(AttributeInput::new("id", DataType::Str));
        assert!(is_equivalent(&candidate(vec![ip("id"), reordered]), &latest));
    }

    #[test]
    fn test_display_name_is_ignored() {
        let latest = persisted(vec![host()]);
        let renamed = host().with_display_name("Physical Host");
        assert!(is_equivalent(&candidate(vec![renamed]), &latest));
    }

    #[test]
    fn test_added_entity_is_a_change() {
        let latest = persisted(vec![host()]);
        assert!(!is_equivalent(&candidate(vec![host(), ip("id")]), &latest));
    }

    #[test]
    fn test_changed_data_type_is_a_change() {
        let latest = persisted(vec![host()]);
        let changed = EntityInput::new("host")
            .with_attribute(AttributeInput::new("id", DataType::Int))
            .with_attribute(AttributeInput::new("name", DataType::Str));
        assert!(!is_equivalent(&candidate(vec![changed]), &latest));
    }

    #[test]
    fn test_changed_ref_target_is_a_change() {
        let latest = persisted(vec![host(), ip("id")]);
        assert!(!is_equivalent(&candidate(vec![host(), ip("name")]), &latest));
    }

    #[test]
    fn test_checksum_matches_for_equivalent_shapes() {
        let a = ModelShape::of_candidate(&candidate(vec![host(), ip("id")]));
        let b = ModelShape::of_candidate(&candidate(vec![ip("id"), host()]));
        assert_eq!(a.checksum().unwrap(), b.checksum().unwrap());
        assert_eq!(a.entity_count(), 2);
    }
}
