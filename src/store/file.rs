//! Filesystem backend
//!
//! ```text
//! <root>/
//! ├── packages.json
//! └── models/
//!     └── wecmdb/
//!         ├── v1/
//!         │   ├── data_model.json
//!         │   └── checksums.sha256
//!         └── v2/
//! ```
//!
//! A version directory is written under a hidden staging name and renamed
//! into place, so readers never see a partial graph. The rename also acts as
//! the `(package, version)` uniqueness constraint across processes.
//! Optionally every registration is committed and tagged in a Git repository
//! at the root.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use git2::{Commit, Repository, Signature};
use tracing::{debug, warn};

use super::{referencing_attributes, DataModelStore, PackageCatalog, ReferencingAttribute};
use crate::checksum::Checksum;
use crate::error::{RegistryError, Result};
use crate::model::{DataModel, Package};
use crate::version::ModelVersion;

const PACKAGES_FILE: &str = "packages.json";
const MODELS_DIR: &str = "models";
const MODEL_FILE: &str = "data_model.json";
const CHECKSUMS_FILE: &str = "checksums.sha256";

/// Package catalog and data model store on the local filesystem
pub struct FileStore {
    root: PathBuf,
    /// Loaded data models; safe to cache forever since versions are immutable
    cache: RwLock<HashMap<(String, ModelVersion), Arc<DataModel>>>,
    /// Serialises writers of `packages.json`
    packages_lock: Mutex<()>,
    history: Option<GitHistory>,
}

struct GitHistory {
    repo: Mutex<Repository>,
    author: String,
}

impl FileStore {
    /// Open an existing store or create a new one
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        fs::create_dir_all(root.join(MODELS_DIR))?;

        Ok(Self {
            root,
            cache: RwLock::new(HashMap::new()),
            packages_lock: Mutex::new(()),
            history: None,
        })
    }

    /// Commit and tag every saved data model in a Git repository at the root
    pub fn with_history(mut self, author: Option<&str>) -> Result<Self> {
        let repo = match Repository::open(&self.root) {
            Ok(repo) => repo,
            Err(_) => Repository::init(&self.root)?,
        };
        self.history = Some(GitHistory {
            repo: Mutex::new(repo),
            author: author.unwrap_or("Data Model Registry").to_string(),
        });
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Record a package version in `packages.json`
    pub fn add_package(&self, package: Package) -> Result<()> {
        self.package_dir(&package.name)?;
        let _guard = self
            .packages_lock
            .lock()
            .map_err(|_| RegistryError::Storage("Failed to acquire packages lock".to_string()))?;

        let mut packages = self.load_packages()?;
        packages.retain(|p| !(p.name == package.name && p.version == package.version));
        packages.push(package);

        let path = self.root.join(PACKAGES_FILE);
        let staging = self.root.join(format!(".{PACKAGES_FILE}.tmp"));
        fs::write(&staging, serde_json::to_string_pretty(&packages)?)?;
        fs::rename(&staging, &path)?;
        Ok(())
    }

    fn load_packages(&self) -> Result<Vec<Package>> {
        let path = self.root.join(PACKAGES_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn package_dir(&self, package: &str) -> Result<PathBuf> {
        if !is_dir_name(package) {
            return Err(RegistryError::InvalidName {
                name: package.to_string(),
                reason: "not usable as a directory name".to_string(),
            });
        }
        Ok(self.root.join(MODELS_DIR).join(package))
    }

    fn load(&self, package: &str, version: ModelVersion) -> Result<Option<Arc<DataModel>>> {
        // never stored, so nothing to find
        if !is_dir_name(package) {
            return Ok(None);
        }
        let key = (package.to_string(), version);
        if let Some(model) = self.cached(&key)? {
            return Ok(Some(model));
        }

        let version_dir = self.package_dir(package)?.join(version.dir_name());
        let model_path = version_dir.join(MODEL_FILE);
        if !model_path.exists() {
            return Ok(None);
        }

        let content = fs::read(&model_path)?;
        verify_file_checksum(&version_dir, &content)?;
        let model: Arc<DataModel> = Arc::new(serde_json::from_slice(&content)?);
        debug!(package, %version, "loaded data model from disk");

        self.cache
            .write()
            .map_err(|_| RegistryError::Storage("Failed to acquire cache lock".to_string()))?
            .insert(key, Arc::clone(&model));
        Ok(Some(model))
    }

    fn cached(&self, key: &(String, ModelVersion)) -> Result<Option<Arc<DataModel>>> {
        let cache = self
            .cache
            .read()
            .map_err(|_| RegistryError::Storage("Failed to acquire cache lock".to_string()))?;
        Ok(cache.get(key).cloned())
    }

    fn write_version(dir: &Path, model: &DataModel) -> Result<()> {
        let content = serde_json::to_string_pretty(model)?;
        fs::write(dir.join(MODEL_FILE), &content)?;

        let checksum = Checksum::from_bytes(content.as_bytes());
        fs::write(dir.join(CHECKSUMS_FILE), format!("{}  {}\n", checksum, MODEL_FILE))?;
        Ok(())
    }
}

fn verify_file_checksum(version_dir: &Path, content: &[u8]) -> Result<()> {
    let checksums_path = version_dir.join(CHECKSUMS_FILE);
    if !checksums_path.exists() {
        return Ok(());
    }
    let recorded = fs::read_to_string(&checksums_path)?;
    let expected = recorded
        .lines()
        .find_map(|line| line.strip_suffix(MODEL_FILE))
        .map(|c| c.trim().to_string())
        .unwrap_or_default();

    let actual = Checksum::from_bytes(content);
    if actual.as_str() != expected {
        return Err(RegistryError::ChecksumMismatch {
            expected,
            actual: actual.to_string(),
        });
    }
    Ok(())
}

impl GitHistory {
    fn record(&self, model: &DataModel) -> Result<()> {
        let repo = self
            .repo
            .lock()
            .map_err(|_| RegistryError::Storage("Failed to acquire git lock".to_string()))?;

        let mut index = repo.index()?;
        index.add_all(["models/*", PACKAGES_FILE].iter(), git2::IndexAddOption::DEFAULT, None)?;
        index.write()?;

        let oid = index.write_tree()?;
        let tree = repo.find_tree(oid)?;
        let sig = Signature::now(&self.author, "datamodels@registry.local")?;

        let parent_commit = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<&Commit> = parent_commit.iter().collect();

        let message = format!(
            "Register data model {} v{}",
            model.package_name, model.version
        );
        repo.commit(Some("HEAD"), &sig, &sig, &message, &tree, &parents)?;

        let obj = repo.revparse_single("HEAD")?;
        let tag = format!("{}/{}", model.package_name, model.version.dir_name());
        repo.tag(&tag, &obj, &sig, &message, false)?;
        Ok(())
    }
}

impl PackageCatalog for FileStore {
    fn latest_package(&self, name: &str) -> Result<Option<Package>> {
        Ok(self
            .load_packages()?
            .into_iter()
            .filter(|p| p.name == name)
            .max_by(|a, b| a.version.cmp(&b.version)))
    }

    fn package_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = Vec::new();
        for package in self.load_packages()? {
            if !names.contains(&package.name) {
                names.push(package.name);
            }
        }
        Ok(names)
    }
}

fn is_dir_name(package: &str) -> bool {
    !(package.is_empty() || package.starts_with('.') || package.contains(['/', '\\']))
}

impl DataModelStore for FileStore {
    fn latest_data_model(&self, package: &str) -> Result<Option<Arc<DataModel>>> {
        match self.versions(package)?.last() {
            Some(version) => self.load(package, *version),
            None => Ok(None),
        }
    }

    fn data_model(&self, package: &str, version: ModelVersion) -> Result<Option<Arc<DataModel>>> {
        self.load(package, version)
    }

    fn versions(&self, package: &str) -> Result<Vec<ModelVersion>> {
        if !is_dir_name(package) {
            return Ok(Vec::new());
        }
        let dir = self.package_dir(package)?;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(version) = entry.file_name().to_str().and_then(ModelVersion::from_dir_name) {
                versions.push(version);
            }
        }
        versions.sort();
        Ok(versions)
    }

    fn save(&self, model: DataModel) -> Result<Arc<DataModel>> {
        let package_dir = self.package_dir(&model.package_name)?;
        fs::create_dir_all(&package_dir)?;

        let conflict = || RegistryError::VersionConflict {
            package: model.package_name.clone(),
            version: model.version.get(),
        };

        let target = package_dir.join(model.version.dir_name());
        if target.exists() {
            return Err(conflict());
        }

        let staging = package_dir.join(format!(".staging-{}", model.id));
        fs::create_dir_all(&staging)?;
        if let Err(err) = Self::write_version(&staging, &model) {
            let _ = fs::remove_dir_all(&staging);
            return Err(err);
        }

        if let Err(err) = fs::rename(&staging, &target) {
            let _ = fs::remove_dir_all(&staging);
            if target.exists() {
                return Err(conflict());
            }
            return Err(err.into());
        }

        if let Some(history) = &self.history {
            if let Err(err) = history.record(&model) {
                warn!(package = %model.package_name, version = %model.version, error = %err,
                    "data model saved but not recorded in git history");
            }
        }

        let model = Arc::new(model);
        self.cache
            .write()
            .map_err(|_| RegistryError::Storage("Failed to acquire cache lock".to_string()))?
            .insert((model.package_name.clone(), model.version), Arc::clone(&model));
        Ok(model)
    }

    fn find_referencing_attributes(
        &self,
        package: &str,
        entity: &str,
        version: ModelVersion,
    ) -> Result<Vec<ReferencingAttribute>> {
        let mut models = Vec::new();
        for name in DataModelStore::package_names(self)? {
            if let Some(model) = self.latest_data_model(&name)? {
                models.push(model);
            }
        }
        Ok(referencing_attributes(
            models.iter().map(|m| m.as_ref()),
            package,
            entity,
            version,
        ))
    }

    fn package_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.root.join(MODELS_DIR))? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::version::PackageVersion;
    use tempfile::tempdir;

    fn empty_model(package: &str, version: u32) -> DataModel {
        DataModel::new(package, ModelVersion::new(version), vec![]).unwrap()
    }

    #[test]
    fn test_open_creates_layout() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.root().join(MODELS_DIR).is_dir());
        assert!(DataModelStore::package_names(&store).unwrap().is_empty());
    }

    #[test]
    fn test_packages_roundtrip_through_disk() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.add_package(Package::new("wecmdb", PackageVersion::new(1, 0, 0))).unwrap();
        store.add_package(Package::new("wecmdb", PackageVersion::new(1, 1, 0))).unwrap();

        let reopened = FileStore::open(dir.path()).unwrap();
        let latest = reopened.latest_package("wecmdb").unwrap().unwrap();
        assert_eq!(latest.version, PackageVersion::new(1, 1, 0));
        assert_eq!(PackageCatalog::package_names(&reopened).unwrap(), vec!["wecmdb"]);
    }

    #[test]
    fn test_save_is_visible_after_reopen() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.save(empty_model("wecmdb", 1)).unwrap();
        store.save(empty_model("wecmdb", 2)).unwrap();

        let reopened = FileStore::open(dir.path()).unwrap();
        let latest = reopened.latest_data_model("wecmdb").unwrap().unwrap();
        assert_eq!(latest.version.get(), 2);
        assert_eq!(reopened.versions("wecmdb").unwrap().len(), 2);
    }

    #[test]
    fn test_save_rejects_taken_version_and_leaves_no_staging() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.save(empty_model("wecmdb", 1)).unwrap();

        let err = store.save(empty_model("wecmdb", 1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VersionConflict);

        let leftovers: Vec<_> = fs::read_dir(dir.path().join(MODELS_DIR).join("wecmdb"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_tampered_file_fails_checksum() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.save(empty_model("wecmdb", 1)).unwrap();

        let model_path = dir.path().join(MODELS_DIR).join("wecmdb").join("v1").join(MODEL_FILE);
        let content = fs::read_to_string(&model_path).unwrap();
        fs::write(&model_path, content.replace("wecmdb", "wecmdc")).unwrap();

        let reopened = FileStore::open(dir.path()).unwrap();
        let err = reopened.latest_data_model("wecmdb").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChecksumMismatch);
    }

    #[test]
    fn test_path_like_package_names_are_never_stored() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        let err = store.save(empty_model("../escape", 1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidName);
        let err = store
            .add_package(Package::new(".hidden", PackageVersion::new(1, 0, 0)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidName);

        // reads treat them as unknown packages
        assert!(store.versions("../escape").unwrap().is_empty());
        assert!(store.latest_data_model("a\\b").unwrap().is_none());
        assert!(store.data_model(".hidden", ModelVersion::INITIAL).unwrap().is_none());
        assert!(!dir.path().join("escape").exists());
    }

    #[test]
    fn test_referencing_scan_reads_only_latest_models() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.save(empty_model("wecmdb", 1)).unwrap();
        store.save(empty_model("wecmdb", 2)).unwrap();

        // a corrupt superseded version is never loaded by the scan
        let old = dir.path().join(MODELS_DIR).join("wecmdb").join("v1").join(MODEL_FILE);
        fs::write(&old, "{}").unwrap();

        let reopened = FileStore::open(dir.path()).unwrap();
        let found = reopened
            .find_referencing_attributes("wecmdb", "host", ModelVersion::INITIAL)
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_git_history_commits_and_tags() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap().with_history(Some("tester")).unwrap();
        store.save(empty_model("wecmdb", 1)).unwrap();

        let repo = Repository::open(dir.path()).unwrap();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.message(), Some("Register data model wecmdb v1"));
        assert!(repo.revparse_single("refs/tags/wecmdb/v1").is_ok());
    }
}
