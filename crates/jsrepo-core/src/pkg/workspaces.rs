//! Workspace support for monorepos.
//!
//! Discovers the workspace root, its member packages and its version
//! catalogs. Two declaration styles are supported:
//! - `package.json` with a `workspaces` field (npm, yarn, bun)
//! - `pnpm-workspace.yaml` (pnpm)
//!
//! Glob patterns like `packages/*` are expanded to member directories;
//! `!`-prefixed patterns exclude directories.

use super::error::PkgError;
use super::package_json::PACKAGE_JSON;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The pnpm workspace declaration file.
pub const PNPM_WORKSPACE_YAML: &str = "pnpm-workspace.yaml";

/// Name of the default catalog.
pub const DEFAULT_CATALOG: &str = "default";

/// Which file declares the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceKind {
    /// `package.json` with a `workspaces` field.
    PackageJson,
    /// `pnpm-workspace.yaml`.
    Pnpm,
}

impl WorkspaceKind {
    /// Marker file name used in error messages.
    #[must_use]
    pub fn marker(&self) -> &'static str {
        match self {
            Self::PackageJson => "package.json with a \"workspaces\" field",
            Self::Pnpm => PNPM_WORKSPACE_YAML,
        }
    }

    fn is_root(self, dir: &Path) -> bool {
        match self {
            Self::PackageJson => std::fs::read_to_string(dir.join(PACKAGE_JSON))
                .ok()
                .and_then(|content| serde_json::from_str::<Value>(&content).ok())
                .is_some_and(|package| package.get("workspaces").is_some()),
            Self::Pnpm => dir.join(PNPM_WORKSPACE_YAML).is_file(),
        }
    }
}

/// A discovered workspace package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePackage {
    /// Package name from package.json
    pub name: String,
    /// Absolute path to the workspace directory
    pub path: PathBuf,
    /// Version from package.json
    pub version: String,
}

/// A single catalog: package name -> version range.
pub type Catalog = BTreeMap<String, String>;

/// Parsed workspace state: root, members and catalogs.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceState {
    /// Root directory of the monorepo
    pub root: PathBuf,
    /// Map of package name -> workspace info
    pub packages: BTreeMap<String, WorkspacePackage>,
    /// Catalogs by name; the default catalog is stored under `"default"`.
    pub catalogs: BTreeMap<String, Catalog>,
}

impl WorkspaceState {
    /// Get workspace package info by name.
    #[must_use]
    pub fn get_package(&self, name: &str) -> Option<&WorkspacePackage> {
        self.packages.get(name)
    }

    /// Get the workspace package located at `dir`.
    #[must_use]
    pub fn package_at(&self, dir: &Path) -> Option<&WorkspacePackage> {
        let dir = jsrepo_util::path::normalize(dir);
        self.packages
            .values()
            .find(|pkg| jsrepo_util::path::normalize(&pkg.path) == dir)
    }

    /// Names of all workspace packages, sorted.
    #[must_use]
    pub fn package_names(&self) -> Vec<&str> {
        self.packages.keys().map(String::as_str).collect()
    }

    /// Look up a catalog by name.
    #[must_use]
    pub fn catalog(&self, name: &str) -> Option<&Catalog> {
        self.catalogs.get(name)
    }

    /// Names of all declared catalogs, sorted.
    #[must_use]
    pub fn catalog_names(&self) -> Vec<&str> {
        self.catalogs.keys().map(String::as_str).collect()
    }
}

/// Find the workspace root by walking up the directory tree.
#[must_use]
pub fn find_workspace_root(start: &Path, kind: WorkspaceKind) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        if kind.is_root(&current) {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Locate and parse the workspace enclosing `cwd`.
///
/// # Errors
/// `WORKSPACE_NOT_FOUND` when no root exists between `cwd` and the
/// filesystem root; `WORKSPACE_INVALID` or `PKG_MANIFEST_*` when the
/// declaration is malformed.
pub fn discover_workspace(cwd: &Path, kind: WorkspaceKind) -> Result<WorkspaceState, PkgError> {
    let root = find_workspace_root(cwd, kind)
        .ok_or_else(|| PkgError::workspace_not_found(cwd, kind.marker()))?;
    load_workspace(&root, kind)
}

/// Parse the workspace declared at `root`.
///
/// # Errors
/// Returns an error if the declaration file cannot be read or parsed.
pub fn load_workspace(root: &Path, kind: WorkspaceKind) -> Result<WorkspaceState, PkgError> {
    let declaration = match kind {
        WorkspaceKind::PackageJson => read_package_json_declaration(root)?,
        WorkspaceKind::Pnpm => read_pnpm_declaration(root)?,
    };

    Ok(WorkspaceState {
        root: root.to_path_buf(),
        packages: discover_workspace_packages(root, &declaration.patterns)?,
        catalogs: declaration.catalogs,
    })
}

/// Patterns and catalogs from a workspace declaration file.
#[derive(Debug, Default)]
struct Declaration {
    patterns: Vec<String>,
    catalogs: BTreeMap<String, Catalog>,
}

fn read_package_json_declaration(root: &Path) -> Result<Declaration, PkgError> {
    let path = root.join(PACKAGE_JSON);
    let content = std::fs::read_to_string(&path).map_err(|e| PkgError::manifest_read(&path, &e))?;
    let package: Value =
        serde_json::from_str(&content).map_err(|e| PkgError::manifest_invalid(&path, e))?;

    let mut declaration = Declaration::default();

    // Workspaces can be an array or an object with "packages" field
    match package.get("workspaces") {
        Some(Value::Array(arr)) => {
            declaration.patterns = string_array(arr);
        }
        Some(Value::Object(obj)) => {
            if let Some(Value::Array(arr)) = obj.get("packages") {
                declaration.patterns = string_array(arr);
            }
            // bun: catalogs nested inside "workspaces"
            collect_json_catalogs(&path, obj.get("catalog"), obj.get("catalogs"), &mut declaration)?;
        }
        Some(_) => {
            return Err(PkgError::workspace_invalid(format!(
                "\"workspaces\" in {} must be an array or an object",
                path.display()
            )));
        }
        None => {}
    }

    // bun also accepts top-level catalogs
    collect_json_catalogs(
        &path,
        package.get("catalog"),
        package.get("catalogs"),
        &mut declaration,
    )?;

    Ok(declaration)
}

fn string_array(arr: &[Value]) -> Vec<String> {
    arr.iter()
        .filter_map(|v| v.as_str().map(String::from))
        .collect()
}

fn collect_json_catalogs(
    path: &Path,
    default: Option<&Value>,
    named: Option<&Value>,
    declaration: &mut Declaration,
) -> Result<(), PkgError> {
    let parse = |value: &Value| -> Result<Catalog, PkgError> {
        serde_json::from_value(value.clone()).map_err(|e| PkgError::manifest_invalid(path, e))
    };

    if let Some(value) = default {
        let catalog = parse(value)?;
        declaration
            .catalogs
            .entry(DEFAULT_CATALOG.to_string())
            .or_default()
            .extend(catalog);
    }
    if let Some(value) = named {
        let named: BTreeMap<String, Value> =
            serde_json::from_value(value.clone()).map_err(|e| PkgError::manifest_invalid(path, e))?;
        for (name, value) in named {
            let catalog = parse(&value)?;
            declaration.catalogs.entry(name).or_default().extend(catalog);
        }
    }
    Ok(())
}

/// Shape of `pnpm-workspace.yaml`.
#[derive(Debug, Default, Deserialize)]
struct PnpmWorkspaceFile {
    #[serde(default)]
    packages: Vec<String>,
    #[serde(default)]
    catalog: Option<Catalog>,
    #[serde(default)]
    catalogs: BTreeMap<String, Catalog>,
}

fn read_pnpm_declaration(root: &Path) -> Result<Declaration, PkgError> {
    let path = root.join(PNPM_WORKSPACE_YAML);
    let content = std::fs::read_to_string(&path).map_err(|e| PkgError::manifest_read(&path, &e))?;

    let file: PnpmWorkspaceFile = if content.trim().is_empty() {
        PnpmWorkspaceFile::default()
    } else {
        serde_yaml::from_str(&content).map_err(|e| PkgError::manifest_invalid(&path, e))?
    };

    let mut catalogs = file.catalogs;
    if let Some(default) = file.catalog {
        catalogs
            .entry(DEFAULT_CATALOG.to_string())
            .or_default()
            .extend(default);
    }

    Ok(Declaration {
        patterns: file.packages,
        catalogs,
    })
}

/// Expand glob patterns and discover workspace packages.
fn discover_workspace_packages(
    root: &Path,
    patterns: &[String],
) -> Result<BTreeMap<String, WorkspacePackage>, PkgError> {
    let mut packages = BTreeMap::new();

    let mut excludes = Vec::new();
    for pattern in patterns.iter().filter_map(|p| p.strip_prefix('!')) {
        let compiled = glob::Pattern::new(pattern.trim_start_matches("./")).map_err(|e| {
            PkgError::workspace_invalid(format!("invalid workspace pattern '!{pattern}': {e}"))
        })?;
        excludes.push(compiled);
    }

    for pattern in patterns.iter().filter(|p| !p.starts_with('!')) {
        let full_pattern = root.join(pattern.trim_start_matches("./"));
        let pattern_str = full_pattern.to_string_lossy();

        let entries = glob::glob(&pattern_str).map_err(|e| {
            PkgError::workspace_invalid(format!("invalid workspace pattern '{pattern}': {e}"))
        })?;

        for entry in entries.flatten() {
            let relative = entry.strip_prefix(root).unwrap_or(&entry);
            let relative = jsrepo_util::path::to_slash(relative);
            if excludes.iter().any(|p| p.matches(&relative)) {
                continue;
            }
            if let Some(pkg) = read_workspace_package(&entry)? {
                packages.insert(pkg.name.clone(), pkg);
            }
        }
    }

    Ok(packages)
}

/// Read package info from a workspace directory.
///
/// Directories without a package.json, or whose package.json has no name,
/// are not members.
fn read_workspace_package(dir: &Path) -> Result<Option<WorkspacePackage>, PkgError> {
    if !dir.is_dir() {
        return Ok(None);
    }

    let package_json_path = dir.join(PACKAGE_JSON);
    let Ok(content) = std::fs::read_to_string(&package_json_path) else {
        return Ok(None);
    };
    let package: Value = serde_json::from_str(&content)
        .map_err(|e| PkgError::manifest_invalid(&package_json_path, e))?;

    let Some(name) = package.get("name").and_then(Value::as_str) else {
        return Ok(None);
    };
    let version = package
        .get("version")
        .and_then(Value::as_str)
        .unwrap_or("0.0.0")
        .to_string();

    Ok(Some(WorkspacePackage {
        name: name.to_string(),
        path: dir.to_path_buf(),
        version,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::error::codes;
    use std::fs;
    use tempfile::tempdir;

    fn write_pkg(dir: &Path, name: &str, version: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(
            dir.join("package.json"),
            format!(r#"{{"name": "{name}", "version": "{version}"}}"#),
        )
        .unwrap();
    }

    #[test]
    fn test_detect_workspaces_array_format() {
        let root = tempdir().unwrap();
        fs::write(
            root.path().join("package.json"),
            r#"{"name": "monorepo", "workspaces": ["packages/*"]}"#,
        )
        .unwrap();
        write_pkg(&root.path().join("packages/my-lib"), "@myorg/my-lib", "1.0.0");

        let state = load_workspace(root.path(), WorkspaceKind::PackageJson).unwrap();
        assert_eq!(state.package_names(), vec!["@myorg/my-lib"]);
        assert_eq!(state.get_package("@myorg/my-lib").unwrap().version, "1.0.0");
    }

    #[test]
    fn test_detect_workspaces_object_format_with_bun_catalogs() {
        let root = tempdir().unwrap();
        fs::write(
            root.path().join("package.json"),
            r#"{
                "name": "monorepo",
                "workspaces": {
                    "packages": ["packages/*"],
                    "catalog": {"lodash": "^4.17.21"},
                    "catalogs": {"deps": {"react": "^18.0.0"}}
                }
            }"#,
        )
        .unwrap();
        write_pkg(&root.path().join("packages/utils"), "utils", "2.0.0");

        let state = load_workspace(root.path(), WorkspaceKind::PackageJson).unwrap();
        assert!(state.get_package("utils").is_some());
        assert_eq!(
            state.catalog(DEFAULT_CATALOG).unwrap().get("lodash").unwrap(),
            "^4.17.21"
        );
        assert_eq!(state.catalog("deps").unwrap().get("react").unwrap(), "^18.0.0");
    }

    #[test]
    fn test_pnpm_workspace_yaml() {
        let root = tempdir().unwrap();
        fs::write(
            root.path().join(PNPM_WORKSPACE_YAML),
            "packages:\n  - 'packages/*'\n  - '!packages/ignored'\ncatalog:\n  lodash: ^4.17.21\ncatalogs:\n  deps:\n    react: ^18.0.0\n",
        )
        .unwrap();
        write_pkg(&root.path().join("packages/core"), "@acme/core", "3.0.1");
        write_pkg(&root.path().join("packages/ignored"), "@acme/ignored", "1.0.0");
        fs::create_dir_all(root.path().join("packages/no-manifest")).unwrap();

        let state = load_workspace(root.path(), WorkspaceKind::Pnpm).unwrap();
        assert_eq!(state.package_names(), vec!["@acme/core"]);
        assert_eq!(state.catalog_names(), vec!["default", "deps"]);
    }

    #[test]
    fn test_empty_pnpm_workspace_yaml() {
        let root = tempdir().unwrap();
        fs::write(root.path().join(PNPM_WORKSPACE_YAML), "").unwrap();

        let state = load_workspace(root.path(), WorkspaceKind::Pnpm).unwrap();
        assert!(state.packages.is_empty());
        assert!(state.catalogs.is_empty());
    }

    #[test]
    fn test_invalid_pnpm_workspace_yaml() {
        let root = tempdir().unwrap();
        fs::write(root.path().join(PNPM_WORKSPACE_YAML), "packages: {oops").unwrap();

        let err = load_workspace(root.path(), WorkspaceKind::Pnpm).unwrap_err();
        assert_eq!(err.code(), codes::PKG_MANIFEST_INVALID);
    }

    #[test]
    fn test_find_workspace_root() {
        let root = tempdir().unwrap();
        fs::write(
            root.path().join("package.json"),
            r#"{"name": "monorepo", "workspaces": ["packages/*"]}"#,
        )
        .unwrap();
        let nested = root.path().join("packages").join("nested").join("deep");
        fs::create_dir_all(&nested).unwrap();
        // A nested package.json without workspaces is not a root
        fs::write(nested.join("package.json"), r#"{"name": "deep"}"#).unwrap();

        let found = find_workspace_root(&nested, WorkspaceKind::PackageJson).unwrap();
        assert_eq!(found, root.path());
    }

    #[test]
    fn test_package_at() {
        let root = tempdir().unwrap();
        fs::write(root.path().join(PNPM_WORKSPACE_YAML), "packages: ['packages/*']\n").unwrap();
        write_pkg(&root.path().join("packages/ui"), "@acme/ui", "0.4.0");

        let state = load_workspace(root.path(), WorkspaceKind::Pnpm).unwrap();
        let pkg = state
            .package_at(&root.path().join("packages/./ui"))
            .unwrap();
        assert_eq!(pkg.name, "@acme/ui");
    }
}
