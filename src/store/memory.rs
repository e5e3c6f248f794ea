//! In-memory backend
//!
//! Every write replaces state under a single `RwLock`, so a saved graph is
//! either entirely visible to readers or not at all.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{referencing_attributes, DataModelStore, PackageCatalog, ReferencingAttribute};
use crate::error::{RegistryError, Result};
use crate::model::{DataModel, Package};
use crate::version::ModelVersion;

#[derive(Debug, Default)]
struct MemoryState {
    packages: Vec<Package>,
    /// Package names in the order their first data model was saved
    model_order: Vec<String>,
    models: BTreeMap<String, BTreeMap<ModelVersion, Arc<DataModel>>>,
}

/// Package catalog and data model store held in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a package version in the catalog
    pub fn add_package(&self, package: Package) -> Result<()> {
        let mut state = self.write()?;
        state
            .packages
            .retain(|p| !(p.name == package.name && p.version == package.version));
        state.packages.push(package);
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|_| RegistryError::Storage("Failed to acquire memory store lock".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|_| RegistryError::Storage("Failed to acquire memory store lock".to_string()))
    }
}

impl PackageCatalog for MemoryStore {
    fn latest_package(&self, name: &str) -> Result<Option<Package>> {
        let state = self.read()?;
        Ok(state
            .packages
            .iter()
            .filter(|p| p.name == name)
            .max_by(|a, b| a.version.cmp(&b.version))
            .cloned())
    }

    fn package_names(&self) -> Result<Vec<String>> {
        let state = self.read()?;
        let mut names: Vec<String> = Vec::new();
        for package in &state.packages {
            if !names.contains(&package.name) {
                names.push(package.name.clone());
            }
        }
        Ok(names)
    }
}

impl DataModelStore for MemoryStore {
    fn latest_data_model(&self, package: &str) -> Result<Option<Arc<DataModel>>> {
        let state = self.read()?;
        Ok(state
            .models
            .get(package)
            .and_then(|versions| versions.values().next_back())
            .cloned())
    }

    fn data_model(&self, package: &str, version: ModelVersion) -> Result<Option<Arc<DataModel>>> {
        let state = self.read()?;
        Ok(state
            .models
            .get(package)
            .and_then(|versions| versions.get(&version))
            .cloned())
    }

    fn versions(&self, package: &str) -> Result<Vec<ModelVersion>> {
        let state = self.read()?;
        Ok(state
            .models
            .get(package)
            .map(|versions| versions.keys().copied().collect())
            .unwrap_or_default())
    }

    fn save(&self, model: DataModel) -> Result<Arc<DataModel>> {
        let mut state = self.write()?;
        let package = model.package_name.clone();

        if state
            .models
            .get(&package)
            .is_some_and(|versions| versions.contains_key(&model.version))
        {
            return Err(RegistryError::VersionConflict {
                package,
                version: model.version.get(),
            });
        }

        if !state.model_order.contains(&package) {
            state.model_order.push(package.clone());
        }
        let model = Arc::new(model);
        state
            .models
            .entry(package)
            .or_default()
            .insert(model.version, Arc::clone(&model));
        Ok(model)
    }

    fn find_referencing_attributes(
        &self,
        package: &str,
        entity: &str,
        version: ModelVersion,
    ) -> Result<Vec<ReferencingAttribute>> {
        let state = self.read()?;
        let models = state
            .model_order
            .iter()
            .filter_map(|name| state.models.get(name))
            .filter_map(|versions| versions.values().next_back())
            .map(|m| m.as_ref());
        Ok(referencing_attributes(models, package, entity, version))
    }

    fn package_names(&self) -> Result<Vec<String>> {
        Ok(self.read()?.model_order.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::{Attribute, DataType, Entity, PackageStatus, ResolvedReference};
    use crate::name::QualifiedName;
    use crate::version::PackageVersion;
    use uuid::Uuid;

    fn empty_model(package: &str, version: u32) -> DataModel {
        DataModel::new(package, ModelVersion::new(version), vec![]).unwrap()
    }

    #[test]
    fn test_latest_package_uses_highest_version() {
        let store = MemoryStore::new();
        store.add_package(Package::new("wecmdb", PackageVersion::new(1, 10, 0))).unwrap();
        store
            .add_package(Package::new("wecmdb", PackageVersion::new(1, 9, 0)).with_status(PackageStatus::Running))
            .unwrap();
        store.add_package(Package::new("pkgA", PackageVersion::new(0, 1, 0))).unwrap();

        let latest = PackageCatalog::latest_package(&store, "wecmdb").unwrap().unwrap();
        assert_eq!(latest.version, PackageVersion::new(1, 10, 0));
        assert!(PackageCatalog::latest_package(&store, "missing").unwrap().is_none());
        assert_eq!(PackageCatalog::package_names(&store).unwrap(), vec!["wecmdb", "pkgA"]);
    }

    #[test]
    fn test_save_and_latest() {
        let store = MemoryStore::new();
        store.save(empty_model("wecmdb", 1)).unwrap();
        store.save(empty_model("wecmdb", 2)).unwrap();

        let latest = store.latest_data_model("wecmdb").unwrap().unwrap();
        assert_eq!(latest.version.get(), 2);
        assert_eq!(store.versions("wecmdb").unwrap(), vec![ModelVersion::new(1), ModelVersion::new(2)]);
        assert!(store.data_model("wecmdb", ModelVersion::new(1)).unwrap().is_some());
        assert!(store.latest_data_model("pkgA").unwrap().is_none());
    }

    #[test]
    fn test_referencing_scan_skips_superseded_models() {
        let store = MemoryStore::new();
        let target = QualifiedName::new("pkgA", "host", "id");
        let referrer = |version: u32| {
            let entity = Entity {
                id: Uuid::new_v4(),
                package_name: "pkgB".to_string(),
                data_model_version: ModelVersion::new(version),
                name: "app".to_string(),
                display_name: "app".to_string(),
                description: None,
                attributes: vec![Attribute {
                    id: Uuid::new_v4(),
                    name: "host".to_string(),
                    description: None,
                    data_type: DataType::Ref,
                    ref_target: Some(target.clone()),
                    resolved: Some(ResolvedReference {
                        attribute_id: Uuid::new_v4(),
                        target: target.clone(),
                        data_model_version: ModelVersion::INITIAL,
                    }),
                }],
            };
            DataModel::new("pkgB", ModelVersion::new(version), vec![entity]).unwrap()
        };
        store.save(referrer(1)).unwrap();
        store.save(referrer(2)).unwrap();

        let found = store
            .find_referencing_attributes("pkgA", "host", ModelVersion::INITIAL)
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].entity.data_model_version, ModelVersion::new(2));
    }

    #[test]
    fn test_save_rejects_taken_version() {
        let store = MemoryStore::new();
        store.save(empty_model("wecmdb", 1)).unwrap();
        let err = store.save(empty_model("wecmdb", 1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VersionConflict);
        assert_eq!(store.versions("wecmdb").unwrap().len(), 1);
    }
}
