//! Persistence collaborators
//!
//! The registry never touches storage directly. It reads packages through a
//! [`PackageCatalog`] and reads/writes data models through a [`DataModelStore`].
//! Two backends ship with the crate: [`MemoryStore`] and [`FileStore`].

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::sync::Arc;

use crate::error::Result;
use crate::model::{DataModel, EntitySummary, Package};
use crate::version::ModelVersion;

/// Read access to the package lifecycle
pub trait PackageCatalog: Send + Sync {
    /// Highest version of the named package, whatever its status
    fn latest_package(&self, name: &str) -> Result<Option<Package>>;

    /// Every distinct package name, in first-registered order
    fn package_names(&self) -> Result<Vec<String>>;
}

/// An attribute whose resolved reference points into a given entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencingAttribute {
    pub attribute_name: String,
    /// The entity owning the attribute
    pub entity: EntitySummary,
}

/// Storage of immutable data model graphs
pub trait DataModelStore: Send + Sync {
    /// The data model with the highest version for a package name
    fn latest_data_model(&self, package: &str) -> Result<Option<Arc<DataModel>>>;

    fn data_model(&self, package: &str, version: ModelVersion) -> Result<Option<Arc<DataModel>>>;

    /// All persisted versions for a package name, ascending
    fn versions(&self, package: &str) -> Result<Vec<ModelVersion>>;

    /// Persist a whole graph as one unit.
    ///
    /// Fails with `VersionConflict` if `(package_name, version)` is already taken;
    /// nothing of the graph is visible to readers in that case.
    fn save(&self, model: DataModel) -> Result<Arc<DataModel>>;

    /// Attributes in the latest data model of every package that are resolved
    /// to an attribute of `package:entity` as it existed in data model `version`.
    ///
    /// Superseded data models are not scanned.
    fn find_referencing_attributes(
        &self,
        package: &str,
        entity: &str,
        version: ModelVersion,
    ) -> Result<Vec<ReferencingAttribute>>;

    /// Every package name that has registered at least one data model
    fn package_names(&self) -> Result<Vec<String>>;
}

/// Scan data models for attributes resolved into `package:entity` at `version`.
/// Callers pass only the latest model of each package.
pub(crate) fn referencing_attributes<'a>(
    models: impl IntoIterator<Item = &'a DataModel>,
    package: &str,
    entity: &str,
    version: ModelVersion,
) -> Vec<ReferencingAttribute> {
    let mut found = Vec::new();
    for model in models {
        for owner in &model.entities {
            for attribute in &owner.attributes {
                let Some(resolved) = &attribute.resolved else {
                    continue;
                };
                if resolved.target.package == package
                    && resolved.target.entity == entity
                    && resolved.data_model_version == version
                {
                    found.push(ReferencingAttribute {
                        attribute_name: attribute.name.clone(),
                        entity: owner.summary(),
                    });
                }
            }
        }
    }
    found
}
