//! Reference annotations for read-side views
//!
//! Each entity view carries two advisory lists:
//! - `referenced_by`: entities whose resolved references point into this
//!   entity as of its package's current latest data model
//! - `referenced_to`: entities named by this entity's `ref` targets, looked
//!   up live in the target package's current latest data model
//!
//! Lookup misses are skipped, never reported as errors.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::model::{Attribute, DataModel, Entity, EntitySummary};
use crate::store::DataModelStore;
use crate::version::ModelVersion;

/// An entity of a latest data model, annotated with its references
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityView {
    pub id: Uuid,
    pub package_name: String,
    pub data_model_version: ModelVersion,
    pub name: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub attributes: Vec<Attribute>,
    pub referenced_by_entities: Vec<EntitySummary>,
    pub referenced_to_entities: Vec<EntitySummary>,
}

impl EntityView {
    fn new(entity: &Entity) -> Self {
        Self {
            id: entity.id,
            package_name: entity.package_name.clone(),
            data_model_version: entity.data_model_version,
            name: entity.name.clone(),
            display_name: entity.display_name.clone(),
            description: entity.description.clone(),
            attributes: entity.attributes.clone(),
            referenced_by_entities: Vec::new(),
            referenced_to_entities: Vec::new(),
        }
    }

    pub fn is_referenced_by(&self, package: &str, entity: &str) -> bool {
        self.referenced_by_entities
            .iter()
            .any(|e| e.package_name == package && e.name == entity)
    }

    pub fn refers_to(&self, package: &str, entity: &str) -> bool {
        self.referenced_to_entities
            .iter()
            .any(|e| e.package_name == package && e.name == entity)
    }
}

pub struct ReferenceAnnotator<'a> {
    store: &'a dyn DataModelStore,
    latest: HashMap<String, Option<Arc<DataModel>>>,
}

impl<'a> ReferenceAnnotator<'a> {
    pub fn new(store: &'a dyn DataModelStore) -> Self {
        Self {
            store,
            latest: HashMap::new(),
        }
    }

    /// Build annotated views for `entities`, preserving their order
    pub fn annotate<'e>(&mut self, entities: impl IntoIterator<Item = &'e Entity>) -> Vec<EntityView> {
        entities
            .into_iter()
            .map(|entity| {
                let mut view = EntityView::new(entity);
                view.referenced_by_entities = self.referenced_by(entity);
                view.referenced_to_entities = self.referenced_to(entity);
                view
            })
            .collect()
    }

    fn referenced_by(&mut self, entity: &Entity) -> Vec<EntitySummary> {
        let Some(latest) = self.latest_model(&entity.package_name) else {
            return Vec::new();
        };

        let referring = match self
            .store
            .find_referencing_attributes(&entity.package_name, &entity.name, latest.version)
        {
            Ok(referring) => referring,
            Err(err) => {
                warn!(package = %entity.package_name, entity = %entity.name, error = %err,
                    "skipping referenced-by annotation");
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        referring
            .into_iter()
            .map(|r| r.entity)
            .filter(|owner| !(owner.package_name == entity.package_name && owner.name == entity.name))
            .filter(|owner| seen.insert(owner.id))
            .collect()
    }

    fn referenced_to(&mut self, entity: &Entity) -> Vec<EntitySummary> {
        let mut seen = HashSet::new();
        let mut targets = Vec::new();

        for target in entity.attributes.iter().filter_map(|a| a.ref_target.as_ref()) {
            let Some(model) = self.latest_model(&target.package) else {
                continue;
            };
            if let Some(found) = model.entity(&target.entity) {
                if seen.insert(found.id) {
                    targets.push(found.summary());
                }
            }
        }
        targets
    }

    fn latest_model(&mut self, package: &str) -> Option<Arc<DataModel>> {
        if let Some(model) = self.latest.get(package) {
            return model.clone();
        }
        let model = match self.store.latest_data_model(package) {
            Ok(model) => model,
            Err(err) => {
                warn!(package, error = %err, "skipping annotation lookup");
                None
            }
        };
        self.latest.insert(package.to_string(), model.clone());
        model
    }
}
