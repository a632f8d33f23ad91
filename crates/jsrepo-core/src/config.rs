//! Registry configuration (`jsrepo.json`).

use crate::build::CyclePolicy;
use crate::error::Error;
use crate::pkg::{VersionResolver, WorkspaceResolver};
use crate::transform::ItemPath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Config file name, looked up at the project root.
pub const CONFIG_FILE: &str = "jsrepo.json";

/// Default number of files processed concurrently during a build.
pub const DEFAULT_CONCURRENCY: usize = 16;

/// When an item is added to a consumer project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddPolicy {
    OnInit,
    OptionallyOnInit,
    WhenNeeded,
    #[default]
    WhenAdded,
}

/// Which version resolver rewrites protocol versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionResolverKind {
    #[default]
    None,
    /// npm/yarn/bun `workspaces` in package.json.
    Workspace,
    /// `pnpm-workspace.yaml`.
    Pnpm,
}

/// One registry item declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: String,
    /// Files or directories, relative to the project root.
    pub files: Vec<String>,
    #[serde(default)]
    pub add: AddPolicy,
}

/// Consumer-side location of an item type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathConfig {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// Contents of `jsrepo.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Registry roots; local imports must resolve inside one of them.
    /// Empty means the project root.
    #[serde(default)]
    pub dirs: Vec<String>,
    #[serde(default)]
    pub items: Vec<ItemConfig>,
    #[serde(default)]
    pub exclude_deps: Vec<String>,
    /// Item type to consumer directory, used when rewriting imports.
    #[serde(default)]
    pub paths: BTreeMap<String, PathConfig>,
    #[serde(default)]
    pub cycles: CyclePolicy,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub version_resolver: VersionResolverKind,
    #[serde(default = "default_true")]
    pub allow_tailwind_directives: bool,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_true() -> bool {
    true
}

impl RegistryConfig {
    /// Create an empty config for a registry called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            dirs: Vec::new(),
            items: Vec::new(),
            exclude_deps: Vec::new(),
            paths: BTreeMap::new(),
            cycles: CyclePolicy::default(),
            concurrency: DEFAULT_CONCURRENCY,
            version_resolver: VersionResolverKind::default(),
            allow_tailwind_directives: true,
        }
    }

    /// Load `jsrepo.json` from `root`.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(CONFIG_FILE);
        if !path.is_file() {
            return Err(Error::ConfigNotFound { start: root.to_path_buf() });
        }
        let content = std::fs::read_to_string(&path).map_err(|source| Error::ConfigRead {
            path: path.clone(),
            source,
        })?;
        Self::from_json(&path, &content)
    }

    /// Parse config text; `path` is only used in errors.
    pub fn from_json(path: &Path, content: &str) -> Result<Self, Error> {
        serde_json::from_str(content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Absolute registry roots.
    #[must_use]
    pub fn registry_dirs(&self, root: &Path) -> Vec<PathBuf> {
        if self.dirs.is_empty() {
            return vec![jsrepo_util::path::normalize(root)];
        }
        self.dirs
            .iter()
            .map(|d| jsrepo_util::path::normalize(&root.join(d)))
            .collect()
    }

    /// Consumer location for items of `item_type`, relative paths taken
    /// from `root`.
    #[must_use]
    pub fn item_path(&self, root: &Path, item_type: &str) -> Option<ItemPath> {
        self.paths.get(item_type).map(|p| ItemPath {
            path: jsrepo_util::path::normalize(&root.join(&p.path)),
            alias: p.alias.clone(),
        })
    }

    /// The configured version resolvers, in application order.
    #[must_use]
    pub fn version_resolvers(&self) -> Vec<Arc<dyn VersionResolver>> {
        match self.version_resolver {
            VersionResolverKind::None => Vec::new(),
            VersionResolverKind::Workspace => vec![Arc::new(WorkspaceResolver::package_json())],
            VersionResolverKind::Pnpm => vec![Arc::new(WorkspaceResolver::pnpm())],
        }
    }
}
