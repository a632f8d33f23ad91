//! Package-level functionality.
//!
//! Provides utilities for:
//! - Classifying import specifiers and parsing package specifiers (name@version/path)
//! - Reading the nearest package.json
//! - Workspace and catalog discovery for monorepos
//! - Rewriting `workspace:` and `catalog:` protocol versions

pub mod dependency;
pub mod error;
pub mod package_json;
pub mod protocol;
pub mod spec;
pub mod workspaces;

pub use dependency::{DependencyKind, Ecosystem, RemoteDependency};
pub use error::{codes as pkg_codes, PkgError};
pub use package_json::{find_nearest_package_json, PackageJson, PackageJsonCache, PACKAGE_JSON};
pub use protocol::{
    catalog_name, VersionResolver, WorkspaceResolver, WorkspaceSpec, CATALOG_PREFIX,
    WORKSPACE_PREFIX,
};
pub use spec::{classify, is_http_url, is_node_builtin, parse_package_name, PackageSpecifier, SpecifierKind};
pub use workspaces::{
    discover_workspace, find_workspace_root, load_workspace, Catalog, WorkspaceKind,
    WorkspacePackage, WorkspaceState, DEFAULT_CATALOG, PNPM_WORKSPACE_YAML,
};
