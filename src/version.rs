//! Versioning utilities
//!
//! Packages carry a semantic version owned by the package lifecycle;
//! data models carry a plain integer assigned by the registry.

use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Semantic version of a package (e.g., "v1.2.0")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageVersion(Version);

impl PackageVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(Version::new(major, minor, patch))
    }

    /// Parse a version string, tolerating a leading 'v' and a missing patch
    /// component ("v1.2" reads as 1.2.0)
    pub fn parse(version_str: &str) -> Result<Self, semver::Error> {
        let version_str = version_str.trim();
        let version_str = version_str.strip_prefix('v').unwrap_or(version_str);
        match Version::parse(version_str) {
            Ok(version) => Ok(Self(version)),
            Err(err) => {
                if version_str.matches('.').count() == 1 {
                    Version::parse(&format!("{version_str}.0")).map(Self)
                } else {
                    Err(err)
                }
            }
        }
    }

    pub fn semver(&self) -> &Version {
        &self.0
    }

    /// Get the tag string (e.g., "v1.2.3")
    pub fn tag_string(&self) -> String {
        format!("v{}", self.0)
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl FromStr for PackageVersion {
    type Err = semver::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PackageVersion {
    type Error = semver::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<PackageVersion> for String {
    fn from(v: PackageVersion) -> Self {
        v.tag_string()
    }
}

/// Integer version of a package's data model, strictly increasing per package name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelVersion(u32);

impl ModelVersion {
    /// The version given to a package's first data model unless the caller asks otherwise
    pub const INITIAL: ModelVersion = ModelVersion(1);

    pub fn new(version: u32) -> Self {
        Self(version)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// The version that follows this one
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Directory name for this version (e.g., "v3")
    pub fn dir_name(self) -> String {
        format!("v{}", self.0)
    }

    /// Parse a directory name produced by [`ModelVersion::dir_name`]
    pub fn from_dir_name(name: &str) -> Option<Self> {
        name.strip_prefix('v')?.parse().ok().map(Self)
    }
}

impl Default for ModelVersion {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ModelVersion {
    fn from(v: u32) -> Self {
        Self(v)
    }
}
