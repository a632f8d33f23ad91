//! Registry manifest: the output of a build.
//!
//! Serialization is deterministic: items keep declared order, files keep
//! declared order, dependency lists are sorted by name.

use crate::config::AddPolicy;
use crate::pkg::RemoteDependency;
use crate::transform::LocalImport;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Manifest error codes.
pub mod codes {
    pub const MANIFEST_FETCH_FAILED: &str = "MANIFEST_FETCH_FAILED";
    pub const MANIFEST_INVALID_JSON: &str = "MANIFEST_INVALID_JSON";
    pub const MANIFEST_SCHEMA_INVALID: &str = "MANIFEST_SCHEMA_INVALID";
}

/// Failure to consume a manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {message}")]
    ManifestFetch { path: String, message: String },

    #[error("manifest is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("manifest does not match the schema: {0}")]
    SchemaValidation(String),
}

impl ManifestError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ManifestFetch { .. } => codes::MANIFEST_FETCH_FAILED,
            Self::InvalidJson(_) => codes::MANIFEST_INVALID_JSON,
            Self::SchemaValidation(_) => codes::MANIFEST_SCHEMA_INVALID,
        }
    }
}

/// A package dependency: a bare name when unversioned.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ManifestDependency {
    Versioned { name: String, version: String },
    Unversioned(String),
}

impl ManifestDependency {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Versioned { name, .. } | Self::Unversioned(name) => name,
        }
    }

    #[must_use]
    pub fn version(&self) -> Option<&str> {
        match self {
            Self::Versioned { version, .. } => Some(version),
            Self::Unversioned(_) => None,
        }
    }
}

impl From<RemoteDependency> for ManifestDependency {
    fn from(dep: RemoteDependency) -> Self {
        match dep.version {
            Some(version) => Self::Versioned {
                name: dep.name,
                version,
            },
            None => Self::Unversioned(dep.name),
        }
    }
}

/// A local import of a file, mapped to the item that owns the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestLocalDependency {
    /// Specifier as written in the source.
    pub import: String,
    /// Owning item of the target file.
    pub item: String,
    /// Target file, as the `target` of that item's file entry.
    pub file: String,
}

/// One file of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestFile {
    /// Source path relative to the registry root, slash separated.
    pub path: String,
    /// Install path relative to the consumer directory of the item type.
    pub target: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub local_dependencies: Vec<ManifestLocalDependency>,
}

/// An installable registry item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestItem {
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub add: AddPolicy,
    pub files: Vec<ManifestFile>,
    #[serde(default)]
    pub registry_dependencies: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<ManifestDependency>,
    #[serde(default)]
    pub dev_dependencies: Vec<ManifestDependency>,
}

/// A built registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub items: Vec<ManifestItem>,
}

impl Manifest {
    /// Parse and validate a manifest.
    pub fn from_json(content: &str) -> Result<Self, ManifestError> {
        let manifest: Self = serde_json::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Read and validate a manifest file.
    pub fn read(path: &Path) -> Result<Self, ManifestError> {
        let content =
            jsrepo_util::fs::read_to_string_lossy(path).map_err(|e| ManifestError::ManifestFetch {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        Self::from_json(&content)
    }

    /// Pretty JSON with a trailing newline.
    pub fn to_json_pretty(&self) -> Result<String, ManifestError> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Content hash of the pretty JSON form.
    pub fn content_hash(&self) -> Result<String, ManifestError> {
        Ok(jsrepo_util::hash::content_hash(self.to_json_pretty()?.as_bytes()))
    }

    #[must_use]
    pub fn item(&self, name: &str) -> Option<&ManifestItem> {
        self.items.iter().find(|i| i.name == name)
    }

    /// Local imports of `file` in the form the import transformer takes.
    #[must_use]
    pub fn local_imports(&self, file: &ManifestFile) -> Vec<LocalImport> {
        file.local_dependencies
            .iter()
            .filter_map(|dep| {
                let item = self.item(&dep.item)?;
                Some(LocalImport {
                    import: dep.import.clone(),
                    item: dep.item.clone(),
                    item_type: item.item_type.clone(),
                    file: dep.file.clone(),
                })
            })
            .collect()
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ManifestError> {
        let invalid = |msg: String| Err(ManifestError::SchemaValidation(msg));

        if self.name.trim().is_empty() {
            return invalid("registry name is empty".to_string());
        }

        let mut names = HashSet::new();
        for item in &self.items {
            if item.name.trim().is_empty() {
                return invalid("an item has an empty name".to_string());
            }
            if !names.insert(item.name.as_str()) {
                return invalid(format!("duplicate item '{}'", item.name));
            }
        }

        for item in &self.items {
            for dep in &item.registry_dependencies {
                if !names.contains(dep.as_str()) {
                    return invalid(format!(
                        "item '{}' depends on unknown item '{dep}'",
                        item.name
                    ));
                }
            }
            for file in &item.files {
                for local in &file.local_dependencies {
                    if !names.contains(local.item.as_str()) {
                        return invalid(format!(
                            "{} imports '{}' from unknown item '{}'",
                            file.path, local.import, local.item
                        ));
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Manifest {
        Manifest {
            name: "@acme/registry".to_string(),
            version: Some("1.0.0".to_string()),
            items: vec![
                ManifestItem {
                    name: "logger".to_string(),
                    item_type: "lib".to_string(),
                    add: AddPolicy::WhenAdded,
                    files: vec![
                        ManifestFile {
                            path: "src/logger/index.ts".to_string(),
                            target: "logger/index.ts".to_string(),
                            local_dependencies: vec![ManifestLocalDependency {
                                import: "./stdout".to_string(),
                                item: "logger".to_string(),
                                file: "logger/stdout.ts".to_string(),
                            }],
                        },
                        ManifestFile {
                            path: "src/logger/stdout.ts".to_string(),
                            target: "logger/stdout.ts".to_string(),
                            local_dependencies: Vec::new(),
                        },
                    ],
                    registry_dependencies: Vec::new(),
                    dependencies: vec![ManifestDependency::Unversioned("chalk".to_string())],
                    dev_dependencies: vec![ManifestDependency::Versioned {
                        name: "picocolors".to_string(),
                        version: "catalog:".to_string(),
                    }],
                },
            ],
        }
    }

    #[test]
    fn test_dependency_serialization_forms() {
        let json = serde_json::to_value(sample()).unwrap();
        let item = &json["items"][0];
        assert_eq!(item["dependencies"], serde_json::json!(["chalk"]));
        assert_eq!(
            item["devDependencies"],
            serde_json::json!([{ "name": "picocolors", "version": "catalog:" }])
        );
        assert_eq!(item["type"], "lib");
        assert_eq!(item["add"], "when-added");
        assert!(item["files"][1].get("localDependencies").is_none());
    }

    #[test]
    fn test_round_trip_through_own_output() {
        let manifest = sample();
        let json = manifest.to_json_pretty().unwrap();
        assert!(json.ends_with('\n'));
        let parsed = Manifest::from_json(&json).unwrap();
        assert_eq!(parsed, manifest);
        assert_eq!(parsed.content_hash().unwrap(), manifest.content_hash().unwrap());
    }

    #[test]
    fn test_schema_validation() {
        let mut dup = sample();
        dup.items.push(dup.items[0].clone());
        let err = Manifest::from_json(&serde_json::to_string(&dup).unwrap()).unwrap_err();
        assert_eq!(err.code(), codes::MANIFEST_SCHEMA_INVALID);
        assert!(err.to_string().contains("duplicate item 'logger'"));

        let mut unknown = sample();
        unknown.items[0].registry_dependencies.push("ghost".to_string());
        assert!(unknown.validate().is_err());

        let err = Manifest::from_json("{ not json").unwrap_err();
        assert_eq!(err.code(), codes::MANIFEST_INVALID_JSON);

        let err = Manifest::from_json(r#"{ "name": "x" }"#).unwrap_err();
        assert_eq!(err.code(), codes::MANIFEST_INVALID_JSON);
    }

    #[test]
    fn test_read_missing_file() {
        let err = Manifest::read(Path::new("/definitely/not/here.json")).unwrap_err();
        assert_eq!(err.code(), codes::MANIFEST_FETCH_FAILED);
    }

    #[test]
    fn test_local_imports() {
        let manifest = sample();
        let imports = manifest.local_imports(&manifest.items[0].files[0]);
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].item_type, "lib");
        assert_eq!(imports[0].file, "logger/stdout.ts");
    }
}
