//! Data Model Registry
//!
//! A versioned, append-only registry of package data models. Each package
//! publishes a set of entities and attributes; republishing a changed model
//! produces a new immutable version. Attributes typed `ref` name a target
//! attribute symbolically (`package:entity:attribute`) and are bound to a
//! concrete attribute when the model is registered.
//!
//! ## Features
//!
//! - **Immutable Versions**: every registration creates a new data model, old ones are never mutated
//! - **No-op Detection**: republishing a structurally identical model is rejected
//! - **Reference Resolution**: `ref` attributes bind within the batch first, then to other packages' latest models
//! - **Reference Annotations**: entity views list who points at them and what they point at
//! - **Checksums**: SHA256 over each model's structural shape
//!
//! ## Architecture
//!
//! ```text
//! DataModelInput ──materialize──> CandidateModel
//!                                      │  equality check against latest
//!                                      │  version assignment (per-package lock)
//!                                      ▼
//!                              ReferenceResolver ──> DataModel ──save──> DataModelStore
//!
//! DataModelStore ──latest models──> ReferenceAnnotator ──> Vec<EntityView>
//! ```

pub mod annotate;
pub mod checksum;
pub mod config;
pub mod equality;
pub mod error;
pub mod lock;
pub mod model;
pub mod name;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod version;

pub use annotate::{EntityView, ReferenceAnnotator};
pub use checksum::Checksum;
pub use config::RegistryConfig;
pub use equality::{is_equivalent, ModelShape};
pub use error::{ErrorKind, RegistryError, Result};
pub use model::{
    Attribute, AttributeInput, DataModel, DataModelInput, DataType, Entity, EntityInput,
    EntitySummary, Package, PackageStatus, ResolvedReference,
};
pub use name::QualifiedName;
pub use registry::DataModelRegistry;
pub use store::{DataModelStore, FileStore, MemoryStore, PackageCatalog};
pub use version::{ModelVersion, PackageVersion};
