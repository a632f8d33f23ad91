//! Import resolver.
//!
//! Classifies each extracted specifier as a local file, a remote package or
//! unresolvable:
//! - local specifiers are probed on disk and must stay inside a registry
//!   directory
//! - bare specifiers go through tsconfig path aliases first, then become
//!   remote packages with a version inferred from the nearest package.json
//! - URLs are skipped
//!
//! Soft failures are warnings; hard failures are collected across all
//! specifiers of a file and returned together.

mod probe;
pub mod tsconfig;

pub use probe::{probe_file, PROBE_EXTENSIONS};
pub use tsconfig::{
    codes as tsconfig_codes, load_tsconfig, strip_jsonc, AliasMatch, TsConfig, TsConfigCache,
    TsConfigError, CONFIG_FILE_NAMES,
};

use crate::cache::blocking;
use crate::langs::ImportSpecifier;
use crate::pkg::{
    classify, is_node_builtin, parse_package_name, DependencyKind, PackageJsonCache, PkgError,
    RemoteDependency, SpecifierKind,
};
use jsrepo_util::path::normalize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Warning codes produced while resolving.
pub mod warning_codes {
    pub const UNRESOLVABLE_IMPORT: &str = "UNRESOLVABLE_IMPORT";
    pub const UNRESOLVABLE_DYNAMIC_IMPORT: &str = "UNRESOLVABLE_DYNAMIC_IMPORT";
    pub const INVALID_PACKAGE_NAME: &str = "INVALID_PACKAGE_NAME";
}

/// Error codes for hard resolution failures.
pub mod codes {
    pub const LOCAL_ESCAPE: &str = "LOCAL_ESCAPE";
}

/// Inputs for resolving the imports of one file.
#[derive(Debug, Clone)]
pub struct ResolveOptions<'a> {
    /// Absolute path of the importing file.
    pub file_path: &'a Path,
    /// Whether the file was declared through a directory entry.
    pub is_sub_dir: bool,
    /// Absolute registry roots local imports must stay within.
    pub dirs: &'a [PathBuf],
    /// Project root; the nearest package.json is looked up from here.
    pub cwd: &'a Path,
    /// Directory entry the file came from when `is_sub_dir` is set.
    pub containing_dir: Option<&'a Path>,
    /// Package names never reported as dependencies.
    pub do_not_install: HashSet<String>,
    /// Package names excluded by configuration.
    pub exclude_deps: &'a [String],
    pub tsconfig: &'a TsConfigCache,
    pub package_json: &'a PackageJsonCache,
}

/// A local import and the file it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDependency {
    /// The specifier as written.
    pub import: String,
    /// Normalized absolute path of the target.
    pub absolute_path: PathBuf,
    /// Owning registry item, filled in during aggregation.
    pub item: Option<String>,
}

/// Result of resolving one file's imports.
#[derive(Debug, Clone, Default)]
pub struct ResolvedImports {
    pub local: Vec<LocalDependency>,
    pub dependencies: Vec<RemoteDependency>,
    pub dev_dependencies: Vec<RemoteDependency>,
    pub warnings: Vec<ResolveWarning>,
}

impl ResolvedImports {
    fn push_remote(&mut self, kind: DependencyKind, dep: RemoteDependency) {
        let list = match kind {
            DependencyKind::Dev => &mut self.dev_dependencies,
            DependencyKind::Prod | DependencyKind::Peer => &mut self.dependencies,
        };
        match list.iter_mut().find(|d| d.name == dep.name) {
            Some(existing) => *existing = dep,
            None => list.push(dep),
        }
    }
}

/// Non-fatal resolution problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveWarning {
    UnresolvableImport {
        specifier: String,
        line: u32,
        reason: String,
    },
    InvalidPackageName {
        specifier: String,
        line: u32,
        error: String,
    },
    UnresolvableDynamicImport {
        expression: String,
        line: u32,
    },
}

impl ResolveWarning {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnresolvableImport { .. } => warning_codes::UNRESOLVABLE_IMPORT,
            Self::InvalidPackageName { .. } => warning_codes::INVALID_PACKAGE_NAME,
            Self::UnresolvableDynamicImport { .. } => warning_codes::UNRESOLVABLE_DYNAMIC_IMPORT,
        }
    }

    /// The specifier or expression the warning is about.
    #[must_use]
    pub fn subject(&self) -> &str {
        match self {
            Self::UnresolvableImport { specifier, .. }
            | Self::InvalidPackageName { specifier, .. } => specifier,
            Self::UnresolvableDynamicImport { expression, .. } => expression,
        }
    }

    #[must_use]
    pub fn line(&self) -> u32 {
        match self {
            Self::UnresolvableImport { line, .. }
            | Self::InvalidPackageName { line, .. }
            | Self::UnresolvableDynamicImport { line, .. } => *line,
        }
    }
}

impl fmt::Display for ResolveWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvableImport {
                specifier, reason, ..
            } => write!(f, "could not resolve '{specifier}': {reason}"),
            Self::InvalidPackageName {
                specifier, error, ..
            } => write!(f, "skipping '{specifier}': {error}"),
            Self::UnresolvableDynamicImport { expression, .. } => {
                write!(f, "dynamic import of `{expression}` cannot be resolved statically")
            }
        }
    }
}

/// Hard resolution failure.
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    #[error(
        "'{specifier}' in {} resolves to {}, which is outside every registry directory",
        file.display(),
        resolved.display()
    )]
    LocalEscape {
        specifier: String,
        file: PathBuf,
        resolved: PathBuf,
    },

    #[error(transparent)]
    TsConfig(#[from] TsConfigError),

    #[error(transparent)]
    Package(#[from] PkgError),
}

impl ResolveError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::LocalEscape { .. } => codes::LOCAL_ESCAPE,
            Self::TsConfig(e) => e.code(),
            Self::Package(e) => e.code(),
        }
    }
}

/// Resolve the imports of one file.
///
/// # Errors
/// Returns every hard failure (local escapes, unreadable tsconfig or
/// package.json) if at least one specifier failed; warnings are dropped in
/// that case.
pub async fn resolve_imports(
    specifiers: &[ImportSpecifier],
    opts: &ResolveOptions<'_>,
) -> Result<ResolvedImports, Vec<ResolveError>> {
    let mut resolved = ResolvedImports::default();
    let mut errors = Vec::new();
    let file_dir = opts
        .file_path
        .parent()
        .map_or_else(|| opts.cwd.to_path_buf(), Path::to_path_buf);

    // One tsconfig lookup per file; a failure is reported once and skips
    // the bare specifiers that needed it.
    let needs_tsconfig = specifiers
        .iter()
        .any(|s| classify(&s.raw) == SpecifierKind::Bare && !is_node_builtin(&s.raw));
    let tsconfig = if needs_tsconfig {
        match opts.tsconfig.nearest(&file_dir).await {
            Ok(config) => Some(config),
            Err(e) => {
                errors.push(ResolveError::from(e));
                None
            }
        }
    } else {
        None
    };

    for spec in specifiers {
        let outcome = match classify(&spec.raw) {
            SpecifierKind::Url => Ok(()),
            SpecifierKind::Local => {
                resolve_local(spec, file_dir.join(&spec.raw), opts, &mut resolved).await
            }
            SpecifierKind::Bare if is_node_builtin(&spec.raw) => Ok(()),
            SpecifierKind::Bare => match &tsconfig {
                Some(config) => resolve_bare(spec, config, opts, &mut resolved).await,
                None => Ok(()),
            },
        };
        if let Err(e) = outcome {
            errors.push(e);
        }
    }

    if errors.is_empty() {
        Ok(resolved)
    } else {
        Err(errors)
    }
}

async fn resolve_local(
    spec: &ImportSpecifier,
    target: PathBuf,
    opts: &ResolveOptions<'_>,
    resolved: &mut ResolvedImports,
) -> Result<(), ResolveError> {
    let probed = {
        let target = target.clone();
        blocking(move || probe_file(&target)).await
    };
    let Some(path) = probed else {
        resolved.warnings.push(ResolveWarning::UnresolvableImport {
            specifier: spec.raw.clone(),
            line: spec.line,
            reason: format!("{} does not exist", normalize(&target).display()),
        });
        return Ok(());
    };

    push_local(spec, path, opts, resolved)
}

fn push_local(
    spec: &ImportSpecifier,
    path: PathBuf,
    opts: &ResolveOptions<'_>,
    resolved: &mut ResolvedImports,
) -> Result<(), ResolveError> {
    if !is_within_registry(&path, opts) {
        return Err(ResolveError::LocalEscape {
            specifier: spec.raw.clone(),
            file: opts.file_path.to_path_buf(),
            resolved: path,
        });
    }

    if !resolved.local.iter().any(|l| l.absolute_path == path) {
        resolved.local.push(LocalDependency {
            import: spec.raw.clone(),
            absolute_path: path,
            item: None,
        });
    }
    Ok(())
}

fn is_within_registry(path: &Path, opts: &ResolveOptions<'_>) -> bool {
    if opts.dirs.iter().any(|dir| path.starts_with(normalize(dir))) {
        return true;
    }
    opts.is_sub_dir
        && opts
            .containing_dir
            .is_some_and(|dir| path.starts_with(normalize(dir)))
}

async fn resolve_bare(
    spec: &ImportSpecifier,
    tsconfig: &Arc<Option<TsConfig>>,
    opts: &ResolveOptions<'_>,
    resolved: &mut ResolvedImports,
) -> Result<(), ResolveError> {
    if let Some(config) = tsconfig.as_ref() {
        let alias = {
            let tsconfig = Arc::clone(tsconfig);
            let raw = spec.raw.clone();
            blocking(move || {
                tsconfig
                    .as_ref()
                    .as_ref()
                    .map_or(AliasMatch::NoMatch, |c| c.resolve_alias(&raw))
            })
            .await
        };
        match alias {
            AliasMatch::Resolved(path) => return push_local(spec, path, opts, resolved),
            AliasMatch::Unresolved { pattern } => {
                resolved.warnings.push(ResolveWarning::UnresolvableImport {
                    specifier: spec.raw.clone(),
                    line: spec.line,
                    reason: format!(
                        "matched path alias '{pattern}' in {} but no file exists",
                        config.path.display()
                    ),
                });
                return Ok(());
            }
            AliasMatch::NoMatch => {}
        }
    }

    let parsed = match parse_package_name(&spec.raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            resolved.warnings.push(ResolveWarning::InvalidPackageName {
                specifier: spec.raw.clone(),
                line: spec.line,
                error: e.message().to_string(),
            });
            return Ok(());
        }
    };

    if opts.do_not_install.contains(&parsed.name)
        || opts.exclude_deps.iter().any(|d| d == &parsed.name)
    {
        return Ok(());
    }

    if let Some(version) = parsed.version {
        resolved.push_remote(
            DependencyKind::Prod,
            RemoteDependency::js(parsed.name, Some(version)),
        );
        return Ok(());
    }

    let manifest = opts.package_json.nearest(opts.cwd).await?;
    let (kind, version) = manifest
        .as_deref()
        .and_then(|pkg| pkg.find_dependency(&parsed.name))
        .map_or((DependencyKind::Prod, None), |(kind, v)| {
            (kind, Some(v.to_string()))
        });
    resolved.push_remote(kind, RemoteDependency::js(parsed.name, version));
    Ok(())
}
