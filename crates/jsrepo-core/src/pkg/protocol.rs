//! Version resolution for workspace-local protocols.
//!
//! Rewrites `workspace:` and `catalog:` versions of remote dependencies using
//! the enclosing monorepo:
//! - `workspace:*` / `workspace:` -> exact member version
//! - `workspace:^` / `workspace:~` -> caret / tilde range of the member version
//! - `workspace:./path` -> exact version of the member at that path
//! - `workspace:alias@spec` -> `npm:alias@<resolved spec>`
//! - `workspace:<literal>` -> the literal
//! - `catalog:` / `catalog:<name>` -> the catalog entry

use super::dependency::RemoteDependency;
use super::error::PkgError;
use super::workspaces::{discover_workspace, WorkspaceKind, WorkspaceState, DEFAULT_CATALOG};
use crate::cache::{blocking, OnceMap};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Prefix of the workspace protocol.
pub const WORKSPACE_PREFIX: &str = "workspace:";

/// Prefix of the catalog protocol.
pub const CATALOG_PREFIX: &str = "catalog:";

/// A post-processor that rewrites remote dependency versions.
///
/// Implementations must return dependencies they do not recognize unchanged.
#[async_trait]
pub trait VersionResolver: Send + Sync {
    /// Short name used in logs and config.
    fn name(&self) -> &'static str;

    /// Resolve `dep` for a package located at `cwd`.
    async fn resolve(&self, dep: RemoteDependency, cwd: &Path)
        -> Result<RemoteDependency, PkgError>;
}

/// How a `workspace:` suffix maps to the final version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceSpec {
    /// Empty or `*`: exact member version.
    Exact,
    /// `^`: caret range of the member version.
    Caret,
    /// `~`: tilde range of the member version.
    Tilde,
    /// `./dir` or `../dir`: exact version of the member at that path.
    Path(String),
    /// `name@spec`: aliased reference to another member.
    Alias { name: String, spec: Box<WorkspaceSpec> },
    /// Anything else, used as-is.
    Literal(String),
}

impl WorkspaceSpec {
    /// Parse the part of a version after `workspace:`.
    #[must_use]
    pub fn parse(suffix: &str) -> Self {
        match suffix {
            "" | "*" => Self::Exact,
            "^" => Self::Caret,
            "~" => Self::Tilde,
            s if s.starts_with("./") || s.starts_with("../") => Self::Path(s.to_string()),
            s => match alias_split(s) {
                Some((name, spec)) => Self::Alias {
                    name: name.to_string(),
                    spec: Box::new(Self::parse(spec)),
                },
                None => Self::Literal(s.to_string()),
            },
        }
    }

    /// Compose the final version from the member's exact version.
    #[must_use]
    pub fn compose(&self, exact: &str) -> String {
        match self {
            Self::Exact | Self::Path(_) => exact.to_string(),
            Self::Caret => format!("^{exact}"),
            Self::Tilde => format!("~{exact}"),
            Self::Alias { name, spec } => format!("npm:{name}@{}", spec.compose(exact)),
            Self::Literal(literal) => literal.clone(),
        }
    }

    /// Whether `compose` prefixes the member version with a range operator.
    #[must_use]
    pub fn builds_range(&self) -> bool {
        match self {
            Self::Caret | Self::Tilde => true,
            Self::Alias { spec, .. } => spec.builds_range(),
            Self::Exact | Self::Path(_) | Self::Literal(_) => false,
        }
    }
}

/// Split `name@spec`, where `name` may be scoped.
fn alias_split(s: &str) -> Option<(&str, &str)> {
    let at = s.get(1..)?.find('@')? + 1;
    let name = &s[..at];
    let first = name.trim_start_matches('@').chars().next()?;
    // `1.0.0`, `^1.2.0`, `>=2` are literals, not aliases
    if !(first.is_ascii_alphabetic() || name.starts_with('@')) {
        return None;
    }
    Some((name, &s[at + 1..]))
}

/// Which catalog a `catalog:` version refers to.
#[must_use]
pub fn catalog_name(version: &str) -> Option<&str> {
    let name = version.strip_prefix(CATALOG_PREFIX)?;
    Some(if name.is_empty() { DEFAULT_CATALOG } else { name })
}

/// Resolves `workspace:` and `catalog:` versions against a monorepo.
///
/// Workspace state is discovered at most once per normalized `cwd`.
/// Concurrent resolutions for one `cwd` share the discovery; failed
/// discoveries are retried on the next call.
#[derive(Debug)]
pub struct WorkspaceResolver {
    kind: WorkspaceKind,
    states: OnceMap<PathBuf, Arc<WorkspaceState>>,
    discoveries: AtomicUsize,
}

impl WorkspaceResolver {
    #[must_use]
    pub fn new(kind: WorkspaceKind) -> Self {
        Self {
            kind,
            states: OnceMap::new(),
            discoveries: AtomicUsize::new(0),
        }
    }

    /// Resolver for npm, yarn and bun workspaces (`package.json` `workspaces`).
    #[must_use]
    pub fn package_json() -> Self {
        Self::new(WorkspaceKind::PackageJson)
    }

    /// Resolver for pnpm workspaces (`pnpm-workspace.yaml`).
    #[must_use]
    pub fn pnpm() -> Self {
        Self::new(WorkspaceKind::Pnpm)
    }

    #[must_use]
    pub fn kind(&self) -> WorkspaceKind {
        self.kind
    }

    /// Number of filesystem discoveries performed so far.
    #[must_use]
    pub fn discovery_count(&self) -> usize {
        self.discoveries.load(Ordering::SeqCst)
    }

    /// Get the (cached) workspace state enclosing `cwd`.
    ///
    /// # Errors
    /// Returns `WORKSPACE_NOT_FOUND` or a parse error from discovery.
    pub async fn state(&self, cwd: &Path) -> Result<Arc<WorkspaceState>, PkgError> {
        let key = jsrepo_util::path::normalize(cwd);
        let kind = self.kind;
        self.states
            .get_or_try_init(key.clone(), || {
                self.discoveries.fetch_add(1, Ordering::SeqCst);
                blocking(move || discover_workspace(&key, kind).map(Arc::new))
            })
            .await
    }

    fn resolve_workspace(
        state: &WorkspaceState,
        dep: &RemoteDependency,
        suffix: &str,
        cwd: &Path,
    ) -> Result<String, PkgError> {
        let spec = WorkspaceSpec::parse(suffix);

        let exact = match &spec {
            WorkspaceSpec::Path(rel) => {
                let dir = jsrepo_util::path::normalize(&cwd.join(rel));
                let pkg = state.package_at(&dir).ok_or_else(|| {
                    PkgError::workspace_protocol_invalid(
                        &dep.name,
                        &format!("{WORKSPACE_PREFIX}{suffix}"),
                        &format!("no workspace package at {}", dir.display()),
                    )
                })?;
                pkg.version.clone()
            }
            WorkspaceSpec::Alias { name, .. } => state
                .get_package(name)
                .ok_or_else(|| PkgError::workspace_package_not_found(name, &state.package_names()))?
                .version
                .clone(),
            _ => state
                .get_package(&dep.name)
                .ok_or_else(|| {
                    PkgError::workspace_package_not_found(&dep.name, &state.package_names())
                })?
                .version
                .clone(),
        };

        if spec.builds_range() && semver::Version::parse(&exact).is_err() {
            return Err(PkgError::workspace_protocol_invalid(
                &dep.name,
                &format!("{WORKSPACE_PREFIX}{suffix}"),
                &format!("workspace version '{exact}' is not valid semver"),
            ));
        }

        Ok(spec.compose(&exact))
    }

    fn resolve_catalog(
        state: &WorkspaceState,
        dep: &RemoteDependency,
        catalog: &str,
    ) -> Result<String, PkgError> {
        let entries = state.catalog(catalog).ok_or_else(|| {
            PkgError::catalog_not_found(catalog, &dep.name, &state.catalog_names())
        })?;
        entries.get(&dep.name).cloned().ok_or_else(|| {
            let keys: Vec<&str> = entries.keys().map(String::as_str).collect();
            PkgError::catalog_package_not_found(&dep.name, catalog, &keys)
        })
    }
}

#[async_trait]
impl VersionResolver for WorkspaceResolver {
    fn name(&self) -> &'static str {
        match self.kind {
            WorkspaceKind::PackageJson => "workspace",
            WorkspaceKind::Pnpm => "pnpm",
        }
    }

    async fn resolve(
        &self,
        dep: RemoteDependency,
        cwd: &Path,
    ) -> Result<RemoteDependency, PkgError> {
        let Some(version) = dep.version.as_deref() else {
            return Ok(dep);
        };

        if let Some(suffix) = version.strip_prefix(WORKSPACE_PREFIX) {
            let state = self.state(cwd).await?;
            let resolved = Self::resolve_workspace(&state, &dep, suffix, cwd)?;
            return Ok(dep.with_version(resolved));
        }

        if let Some(catalog) = catalog_name(version) {
            let state = self.state(cwd).await?;
            let resolved = Self::resolve_catalog(&state, &dep, catalog)?;
            return Ok(dep.with_version(resolved));
        }

        Ok(dep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::error::codes;
    use crate::pkg::workspaces::PNPM_WORKSPACE_YAML;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn write_pkg(dir: &Path, name: &str, version: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(
            dir.join("package.json"),
            format!(r#"{{"name": "{name}", "version": "{version}"}}"#),
        )
        .unwrap();
    }

    /// pnpm monorepo with two members and two catalogs.
    fn pnpm_fixture() -> TempDir {
        let root = tempdir().unwrap();
        fs::write(
            root.path().join(PNPM_WORKSPACE_YAML),
            "packages:\n  - 'packages/*'\ncatalog:\n  lodash: ^4.17.21\ncatalogs:\n  deps:\n    react: ^18.0.0\n",
        )
        .unwrap();
        write_pkg(&root.path().join("packages/core"), "@acme/core", "3.0.1");
        write_pkg(&root.path().join("packages/utils"), "@acme/utils", "0.1.0");
        write_pkg(&root.path().join("packages/app"), "app", "1.0.0");
        root
    }

    async fn resolve(
        resolver: &WorkspaceResolver,
        cwd: &Path,
        name: &str,
        version: &str,
    ) -> Result<Option<String>, PkgError> {
        resolver
            .resolve(RemoteDependency::js(name, Some(version.to_string())), cwd)
            .await
            .map(|dep| dep.version)
    }

    #[test]
    fn test_workspace_spec_parse() {
        assert_eq!(WorkspaceSpec::parse(""), WorkspaceSpec::Exact);
        assert_eq!(WorkspaceSpec::parse("*"), WorkspaceSpec::Exact);
        assert_eq!(WorkspaceSpec::parse("^"), WorkspaceSpec::Caret);
        assert_eq!(WorkspaceSpec::parse("~"), WorkspaceSpec::Tilde);
        assert_eq!(
            WorkspaceSpec::parse("../core"),
            WorkspaceSpec::Path("../core".into())
        );
        assert_eq!(
            WorkspaceSpec::parse("1.0.0"),
            WorkspaceSpec::Literal("1.0.0".into())
        );
        assert_eq!(
            WorkspaceSpec::parse("^2.0.0"),
            WorkspaceSpec::Literal("^2.0.0".into())
        );
        assert_eq!(
            WorkspaceSpec::parse("@acme/core@^"),
            WorkspaceSpec::Alias {
                name: "@acme/core".into(),
                spec: Box::new(WorkspaceSpec::Caret)
            }
        );
    }

    #[test]
    fn test_catalog_name() {
        assert_eq!(catalog_name("catalog:"), Some("default"));
        assert_eq!(catalog_name("catalog:default"), Some("default"));
        assert_eq!(catalog_name("catalog:deps"), Some("deps"));
        assert_eq!(catalog_name("^1.0.0"), None);
    }

    #[tokio::test]
    async fn test_workspace_protocol_policies() {
        let root = pnpm_fixture();
        let cwd = root.path().join("packages/app");
        let resolver = WorkspaceResolver::pnpm();

        assert_eq!(
            resolve(&resolver, &cwd, "@acme/core", "workspace:*").await.unwrap(),
            Some("3.0.1".into())
        );
        assert_eq!(
            resolve(&resolver, &cwd, "@acme/core", "workspace:^").await.unwrap(),
            Some("^3.0.1".into())
        );
        assert_eq!(
            resolve(&resolver, &cwd, "@acme/utils", "workspace:~").await.unwrap(),
            Some("~0.1.0".into())
        );
        assert_eq!(
            resolve(&resolver, &cwd, "@acme/core", "workspace:1.0.0").await.unwrap(),
            Some("1.0.0".into())
        );
        assert_eq!(
            resolve(&resolver, &cwd, "@acme/core", "workspace:../core").await.unwrap(),
            Some("3.0.1".into())
        );
        assert_eq!(
            resolve(&resolver, &cwd, "core", "workspace:@acme/core@^").await.unwrap(),
            Some("npm:@acme/core@^3.0.1".into())
        );
    }

    #[tokio::test]
    async fn test_range_needs_semver_member_version() {
        let root = pnpm_fixture();
        write_pkg(&root.path().join("packages/nightly"), "nightly", "next");
        let resolver = WorkspaceResolver::pnpm();

        let err = resolve(&resolver, root.path(), "nightly", "workspace:^")
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::WORKSPACE_PROTOCOL_INVALID);
        assert!(err.message().contains("not valid semver"));
        assert_eq!(
            resolve(&resolver, root.path(), "nightly", "workspace:*").await.unwrap(),
            Some("next".into())
        );
    }

    #[tokio::test]
    async fn test_non_protocol_versions_unchanged() {
        let resolver = WorkspaceResolver::pnpm();
        let cwd = Path::new("/definitely/not/a/workspace");

        let dep = RemoteDependency::js("lodash", Some("^4.0.0".into()));
        assert_eq!(resolver.resolve(dep.clone(), cwd).await.unwrap(), dep);

        let unversioned = RemoteDependency::js("lodash", None);
        assert_eq!(
            resolver.resolve(unversioned.clone(), cwd).await.unwrap(),
            unversioned
        );
        assert_eq!(resolver.discovery_count(), 0);
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let root = pnpm_fixture();
        let resolver = WorkspaceResolver::pnpm();

        let once = resolver
            .resolve(
                RemoteDependency::js("@acme/core", Some("workspace:^".into())),
                root.path(),
            )
            .await
            .unwrap();
        let twice = resolver.resolve(once.clone(), root.path()).await.unwrap();
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_catalog_protocol() {
        let root = pnpm_fixture();
        let resolver = WorkspaceResolver::pnpm();

        assert_eq!(
            resolve(&resolver, root.path(), "lodash", "catalog:").await.unwrap(),
            Some("^4.17.21".into())
        );
        assert_eq!(
            resolve(&resolver, root.path(), "react", "catalog:deps").await.unwrap(),
            Some("^18.0.0".into())
        );

        let err = resolve(&resolver, root.path(), "react", "catalog:")
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::CATALOG_PACKAGE_NOT_FOUND);
        assert!(err.message().contains("'react' not found in catalog"));
        assert!(err.message().contains("lodash"));

        let err = resolve(&resolver, root.path(), "lodash", "catalog:deps")
            .await
            .unwrap_err();
        assert!(err.message().contains("'lodash' not found in catalog 'deps'"));

        let err = resolve(&resolver, root.path(), "react", "catalog:missing")
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::CATALOG_NOT_FOUND);
        assert!(err.message().contains("default, deps"));
    }

    #[tokio::test]
    async fn test_discovery_happens_once_per_cwd() {
        let root = pnpm_fixture();
        let resolver = WorkspaceResolver::pnpm();

        for (name, version) in [
            ("@acme/core", "workspace:*"),
            ("@acme/utils", "workspace:^"),
            ("lodash", "catalog:"),
            ("react", "catalog:deps"),
        ] {
            resolve(&resolver, root.path(), name, version).await.unwrap();
        }
        assert_eq!(resolver.discovery_count(), 1);

        // Same results on a second pass, still no new discovery
        assert_eq!(
            resolve(&resolver, root.path(), "@acme/core", "workspace:*").await.unwrap(),
            Some("3.0.1".into())
        );
        assert_eq!(resolver.discovery_count(), 1);
    }

    #[tokio::test]
    async fn test_workspace_package_not_found_lists_available() {
        let root = pnpm_fixture();
        let resolver = WorkspaceResolver::pnpm();

        let err = resolve(&resolver, root.path(), "@acme/missing", "workspace:*")
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::WORKSPACE_PACKAGE_NOT_FOUND);
        assert!(err.message().contains("@acme/core, @acme/utils, app"));
    }

    #[tokio::test]
    async fn test_workspace_root_not_found_is_retried() {
        let dir = tempdir().unwrap();
        let resolver = WorkspaceResolver::pnpm();

        let err = resolve(&resolver, dir.path(), "@acme/core", "workspace:*")
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::WORKSPACE_NOT_FOUND);
        assert!(err.message().contains("workspace root not found"));

        // Failure is not cached: creating the workspace makes the next call succeed
        fs::write(dir.path().join(PNPM_WORKSPACE_YAML), "packages: ['packages/*']\n").unwrap();
        write_pkg(&dir.path().join("packages/core"), "@acme/core", "3.0.1");
        assert_eq!(
            resolve(&resolver, dir.path(), "@acme/core", "workspace:*").await.unwrap(),
            Some("3.0.1".into())
        );
        assert_eq!(resolver.discovery_count(), 2);
    }

    #[tokio::test]
    async fn test_package_json_workspaces() {
        let root = tempdir().unwrap();
        fs::write(
            root.path().join("package.json"),
            r#"{"name": "monorepo", "workspaces": ["packages/*"], "catalog": {"lodash": "^4.17.21"}}"#,
        )
        .unwrap();
        write_pkg(&root.path().join("packages/core"), "@acme/core", "3.0.1");
        let resolver = WorkspaceResolver::package_json();

        assert_eq!(
            resolve(&resolver, root.path(), "@acme/core", "workspace:^").await.unwrap(),
            Some("^3.0.1".into())
        );
        assert_eq!(
            resolve(&resolver, root.path(), "lodash", "catalog:").await.unwrap(),
            Some("^4.17.21".into())
        );
        assert_eq!(resolver.name(), "workspace");
    }
}
