//! Reference resolution
//!
//! Turns a [`CandidateModel`] into an immutable, versioned [`DataModel`] in
//! which every `ref` attribute is bound to a concrete attribute.
//!
//! For each `ref` attribute the symbolic target is looked up first among the
//! candidate's own attributes, so references into the batch being registered
//! (including same-package self references) always bind to the in-flight
//! version. Anything else is decoded and looked up in the latest persisted
//! data model of the target package.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error};
use uuid::Uuid;

use crate::error::{RegistryError, Result};
use crate::model::{Attribute, CandidateModel, DataModel, Entity, ResolvedReference};
use crate::name::QualifiedName;
use crate::store::DataModelStore;
use crate::version::ModelVersion;

/// Resolves symbolic `ref` targets against a candidate and the store
pub struct ReferenceResolver<'a> {
    store: &'a dyn DataModelStore,
    /// Latest models fetched during this resolution, by package name
    latest: HashMap<String, Option<Arc<DataModel>>>,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(store: &'a dyn DataModelStore) -> Self {
        Self {
            store,
            latest: HashMap::new(),
        }
    }

    /// Build the resolved graph for `candidate` as data model `version`.
    ///
    /// Reads from the store but never writes to it.
    pub fn resolve(&mut self, candidate: &CandidateModel, version: ModelVersion) -> Result<DataModel> {
        // self name -> target name, for every `ref` attribute
        let mut symbolic: HashMap<String, String> = HashMap::new();
        // every attribute of the batch, by its own qualified name
        let mut in_batch: HashMap<String, (Uuid, QualifiedName)> = HashMap::new();

        for entity in &candidate.entities {
            for attribute in &entity.attributes {
                let self_name = candidate.qualified_name(entity, attribute);
                if let Some(target) = &attribute.ref_target {
                    symbolic.insert(self_name.encode(), target.encode());
                }
                in_batch.insert(self_name.encode(), (attribute.id, self_name));
            }
        }

        let mut entities = Vec::with_capacity(candidate.entities.len());
        for entity in &candidate.entities {
            let mut attributes = Vec::with_capacity(entity.attributes.len());
            for attribute in &entity.attributes {
                let self_name = candidate.qualified_name(entity, attribute).encode();
                let resolved = match symbolic.get(&self_name) {
                    Some(target) => Some(self.bind(&self_name, target, &in_batch, version)?),
                    None => None,
                };

                attributes.push(Attribute {
                    id: attribute.id,
                    name: attribute.name.clone(),
                    description: attribute.description.clone(),
                    data_type: attribute.data_type,
                    ref_target: attribute.ref_target.clone(),
                    resolved,
                });
            }

            entities.push(Entity {
                id: entity.id,
                package_name: candidate.package_name.clone(),
                data_model_version: version,
                name: entity.name.clone(),
                display_name: entity.display_name.clone(),
                description: entity.description.clone(),
                attributes,
            });
        }

        DataModel::new(candidate.package_name.clone(), version, entities)
    }

    fn bind(
        &mut self,
        self_name: &str,
        target: &str,
        in_batch: &HashMap<String, (Uuid, QualifiedName)>,
        version: ModelVersion,
    ) -> Result<ResolvedReference> {
        if let Some((attribute_id, name)) = in_batch.get(target) {
            debug!(attribute = self_name, target, "bound reference within the batch");
            return Ok(ResolvedReference {
                attribute_id: *attribute_id,
                target: name.clone(),
                data_model_version: version,
            });
        }

        let name = QualifiedName::decode(target).inspect_err(|err| error!("{err}"))?;

        let Some(model) = self.latest_model(&name.package)? else {
            return Err(not_found(&name.package, None, None));
        };
        let Some(entity) = model.entity(&name.entity) else {
            return Err(not_found(&name.package, Some(&name.entity), None));
        };
        let Some(attribute) = entity.attribute(&name.attribute) else {
            return Err(not_found(&name.package, Some(&name.entity), Some(&name.attribute)));
        };

        debug!(
            attribute = self_name,
            target,
            target_version = %model.version,
            "bound reference to persisted data model"
        );
        Ok(ResolvedReference {
            attribute_id: attribute.id,
            target: name.clone(),
            data_model_version: model.version,
        })
    }

    fn latest_model(&mut self, package: &str) -> Result<Option<Arc<DataModel>>> {
        if let Some(model) = self.latest.get(package) {
            return Ok(model.clone());
        }
        let model = self.store.latest_data_model(package)?;
        self.latest.insert(package.to_string(), model.clone());
        Ok(model)
    }
}

fn not_found(package: &str, entity: Option<&str>, attribute: Option<&str>) -> RegistryError {
    let err = RegistryError::target_not_found(package, entity, attribute);
    error!("{err}");
    err
}
