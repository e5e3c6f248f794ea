//! Data Model Registry
//!
//! Registers new data model versions for packages and serves the read-side
//! views. Data models are append-only: republication always creates a new
//! version and never touches an old one.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::annotate::{EntityView, ReferenceAnnotator};
use crate::config::RegistrationConfig;
use crate::equality::is_equivalent;
use crate::error::{ErrorKind, RegistryError, Result};
use crate::lock::PackageLocks;
use crate::model::{CandidateModel, DataModel, DataModelInput};
use crate::resolver::ReferenceResolver;
use crate::store::{DataModelStore, PackageCatalog};
use crate::version::ModelVersion;

/// The data model registry
pub struct DataModelRegistry {
    catalog: Arc<dyn PackageCatalog>,
    store: Arc<dyn DataModelStore>,
    locks: PackageLocks,
    options: RegistrationConfig,
}

impl DataModelRegistry {
    pub fn new(catalog: Arc<dyn PackageCatalog>, store: Arc<dyn DataModelStore>) -> Self {
        Self::with_options(catalog, store, RegistrationConfig::default())
    }

    pub fn with_options(
        catalog: Arc<dyn PackageCatalog>,
        store: Arc<dyn DataModelStore>,
        options: RegistrationConfig,
    ) -> Self {
        Self {
            catalog,
            store,
            locks: PackageLocks::new(),
            options,
        }
    }

    /// Register a new data model version for a package.
    ///
    /// The version is `latest + 1`, or the requested/initial version for a
    /// package's first data model. Nothing is persisted unless every `ref`
    /// attribute resolves.
    pub fn register(&self, input: DataModelInput) -> Result<Arc<DataModel>> {
        let package = input.package_name.clone();
        if self.catalog.latest_package(&package)?.is_none() {
            error!("Cannot find the package [{}] while registering data model", package);
            return Err(RegistryError::PackageNotFound { package });
        }

        let candidate = CandidateModel::materialize(input)?;

        self.locks.with_lock(&package, || {
            let mut attempt = 0;
            loop {
                match self.register_locked(&candidate) {
                    Err(err) if err.kind() == ErrorKind::VersionConflict
                        && attempt < self.options.max_version_retries =>
                    {
                        attempt += 1;
                        warn!(package = %package, attempt, "{err}; retrying registration");
                    }
                    result => return result,
                }
            }
        })
    }

    fn register_locked(&self, candidate: &CandidateModel) -> Result<Arc<DataModel>> {
        let package = &candidate.package_name;
        let latest = self.store.latest_data_model(package)?;

        let version = match &latest {
            Some(latest) if is_equivalent(candidate, latest) => {
                error!("Refreshed data model for package [{}] is same as existing latest one", package);
                return Err(RegistryError::NoChangeConflict {
                    package: package.clone(),
                    version: latest.version.get(),
                });
            }
            Some(latest) => latest.version.next(),
            None => candidate
                .requested_version
                .unwrap_or(ModelVersion::new(self.options.initial_version)),
        };

        let model = ReferenceResolver::new(self.store.as_ref()).resolve(candidate, version)?;
        let saved = self.store.save(model)?;

        info!(
            package = %saved.package_name,
            version = %saved.version,
            entities = saved.entities.len(),
            "registered data model"
        );
        Ok(saved)
    }

    /// Latest data model of every package known to the catalog,
    /// one per package name, in catalog order
    pub fn all_data_models(&self) -> Result<Vec<Arc<DataModel>>> {
        let mut seen = HashSet::new();
        let mut models = Vec::new();
        for name in self.catalog.package_names()? {
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(model) = self.store.latest_data_model(&name)? {
                models.push(model);
            }
        }
        Ok(models)
    }

    /// Every entity of every package's latest data model, annotated
    pub fn overview(&self) -> Result<Vec<EntityView>> {
        let models = self.all_data_models()?;

        let mut seen = HashSet::new();
        let entities = models
            .iter()
            .flat_map(|model| model.entities.iter())
            .filter(|entity| seen.insert(entity.id));

        Ok(ReferenceAnnotator::new(self.store.as_ref()).annotate(entities))
    }

    /// Entities of one package's latest data model, annotated
    pub fn package_view(&self, package: &str) -> Result<Vec<EntityView>> {
        let model = self.data_model(package, None)?;
        Ok(ReferenceAnnotator::new(self.store.as_ref()).annotate(&model.entities))
    }

    /// The latest, or a specific, data model of a package
    pub fn data_model(&self, package: &str, version: Option<ModelVersion>) -> Result<Arc<DataModel>> {
        if self.catalog.latest_package(package)?.is_none() {
            warn!("Plugin package with name [{}] is not found", package);
            return Err(RegistryError::PackageNotFound {
                package: package.to_string(),
            });
        }

        let model = match version {
            Some(version) => self.store.data_model(package, version)?,
            None => self.store.latest_data_model(package)?,
        };
        model.ok_or_else(|| {
            error!("Data model not found for package name=[{}]", package);
            RegistryError::DataModelNotFound {
                package: package.to_string(),
            }
        })
    }

    /// Recompute the shape checksum of every persisted version of a package
    pub fn verify(&self, package: &str) -> Result<Vec<ModelVersion>> {
        let versions = self.store.versions(package)?;
        if versions.is_empty() {
            return Err(RegistryError::DataModelNotFound {
                package: package.to_string(),
            });
        }
        for version in &versions {
            if let Some(model) = self.store.data_model(package, *version)? {
                model.verify_checksum()?;
            }
        }
        Ok(versions)
    }

    /// Package names that have registered at least one data model
    pub fn registered_packages(&self) -> Result<Vec<String>> {
        self.store.package_names()
    }
}
