//! Nearest package.json lookup.
//!
//! Used for version inference of remote dependencies and for framework
//! peer dependency probes.

use super::dependency::DependencyKind;
use super::error::PkgError;
use crate::cache::{blocking, OnceMap};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The package.json file name.
pub const PACKAGE_JSON: &str = "package.json";

/// The subset of package.json the build reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
    /// Location of the file this was read from.
    #[serde(skip)]
    pub path: PathBuf,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub peer_dependencies: BTreeMap<String, String>,
}

impl PackageJson {
    /// Read and parse a package.json file.
    ///
    /// # Errors
    /// Returns `PKG_MANIFEST_READ_FAILED` if the file cannot be read and
    /// `PKG_MANIFEST_INVALID` if it is not a valid package.json object.
    pub fn read(path: &Path) -> Result<Self, PkgError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| PkgError::manifest_read(path, &e))?;
        Self::parse(path, &content)
    }

    /// Parse package.json content; `path` is used for error messages.
    ///
    /// # Errors
    /// Returns `PKG_MANIFEST_INVALID` on malformed content.
    pub fn parse(path: &Path, content: &str) -> Result<Self, PkgError> {
        let mut pkg: Self =
            serde_json::from_str(content).map_err(|e| PkgError::manifest_invalid(path, e))?;
        pkg.path = path.to_path_buf();
        Ok(pkg)
    }

    /// Find the declared version of `name`.
    ///
    /// `dependencies` wins over `peerDependencies`, which wins over
    /// `devDependencies`.
    #[must_use]
    pub fn find_dependency(&self, name: &str) -> Option<(DependencyKind, &str)> {
        if let Some(v) = self.dependencies.get(name) {
            return Some((DependencyKind::Prod, v));
        }
        if let Some(v) = self.peer_dependencies.get(name) {
            return Some((DependencyKind::Peer, v));
        }
        self.dev_dependencies
            .get(name)
            .map(|v| (DependencyKind::Dev, v.as_str()))
    }

    /// Whether `name` appears in any dependency list.
    #[must_use]
    pub fn has_dependency(&self, name: &str) -> bool {
        self.find_dependency(name).is_some()
    }
}

/// Walk from `start` up to the filesystem root looking for a package.json.
#[must_use]
pub fn find_nearest_package_json(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(PACKAGE_JSON);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Cache of nearest-package.json lookups keyed by start directory.
#[derive(Debug, Default)]
pub struct PackageJsonCache {
    nearest: OnceMap<PathBuf, Option<Arc<PackageJson>>>,
}

impl PackageJsonCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the nearest package.json at or above `dir`.
    ///
    /// # Errors
    /// Returns an error if the nearest package.json exists but cannot be
    /// read or parsed. Errors are not cached.
    pub async fn nearest(&self, dir: &Path) -> Result<Option<Arc<PackageJson>>, PkgError> {
        let key = jsrepo_util::path::normalize(dir);
        self.nearest
            .get_or_try_init(key.clone(), || {
                blocking(move || match find_nearest_package_json(&key) {
                    Some(path) => PackageJson::read(&path).map(|pkg| Some(Arc::new(pkg))),
                    None => Ok(None),
                })
            })
            .await
    }
}
