//! Registry build orchestrator.
//!
//! A build moves through these phases:
//! 1. Init: validate item declarations, expand directory entries, check
//!    the peer requirements of every plugin that will run
//! 2. PerFile: extract, resolve and version every file with bounded
//!    concurrency; results keep declared order
//! 3. Aggregate: map local targets back to their items and merge package
//!    dependencies per item
//! 4. CycleCheck: detect cycles between items
//!
//! Any hard failure aborts the build; no partial manifest is produced.
//! Warnings are delivered to a [`WarningHandler`] in declared file order.

pub mod codes;
pub mod graph;
pub mod warning;

pub use graph::{CyclePolicy, ItemGraph};
pub use warning::{Warning, WarningHandler};

use crate::cache::blocking;
use crate::config::RegistryConfig;
use crate::langs::{
    default_languages, resolve_dependencies, select_language, DependencyError, LangError,
    Language, LanguageOptions,
};
use crate::manifest::{Manifest, ManifestFile, ManifestItem, ManifestLocalDependency};
use crate::pkg::{PackageJsonCache, PkgError, RemoteDependency, VersionResolver};
use crate::resolver::{ResolveError, ResolveOptions, ResolvedImports, TsConfigCache};
use futures::{stream, StreamExt, TryStreamExt};
use jsrepo_util::path::{normalize, relative_path, to_slash};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Failure that aborts a build.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("item #{index} has an empty name")]
    EmptyItemName { index: usize },

    #[error("duplicate item name '{name}'")]
    DuplicateItem { name: String },

    #[error("item '{item}' declares no files")]
    NoFiles { item: String },

    #[error("item '{item}': {} does not exist", .file.display())]
    FileNotFound { item: String, file: PathBuf },

    #[error("item '{item}' has more than one file installed at '{target}'")]
    DuplicateTarget { item: String, target: String },

    #[error("{} is declared by both '{first}' and '{second}'", .file.display())]
    FileShared {
        file: PathBuf,
        first: String,
        second: String,
    },

    #[error("failed to read {}: {source}", .file.display())]
    FileRead {
        file: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    MissingPeer(LangError),

    #[error("{}: {source}", .file.display())]
    Lang {
        file: PathBuf,
        #[source]
        source: LangError,
    },

    #[error("failed to resolve imports of {}: {}", .file.display(), join_errors(.errors))]
    Resolve {
        file: PathBuf,
        errors: Vec<ResolveError>,
    },

    #[error("{}: cannot resolve version of '{dependency}': {source}", .file.display())]
    VersionResolution {
        file: PathBuf,
        dependency: String,
        #[source]
        source: PkgError,
    },

    #[error(transparent)]
    Package(#[from] PkgError),

    #[error("dependency cycle between items: {}", .cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },
}

impl BuildError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyItemName { .. } => codes::BUILD_ITEM_NAME_EMPTY,
            Self::DuplicateItem { .. } => codes::BUILD_ITEM_DUPLICATE,
            Self::NoFiles { .. } => codes::BUILD_ITEM_NO_FILES,
            Self::FileNotFound { .. } => codes::BUILD_FILE_NOT_FOUND,
            Self::DuplicateTarget { .. } => codes::BUILD_FILE_DUPLICATE,
            Self::FileShared { .. } => codes::BUILD_FILE_SHARED,
            Self::FileRead { .. } => codes::BUILD_FILE_READ_FAILED,
            Self::MissingPeer(e) | Self::Lang { source: e, .. } => e.code(),
            Self::Resolve { errors, .. } => match errors.as_slice() {
                [only] => only.code(),
                _ => codes::BUILD_RESOLVE_FAILED,
            },
            Self::VersionResolution { source, .. } => source.code(),
            Self::Package(e) => e.code(),
            Self::DependencyCycle { .. } => codes::BUILD_DEPENDENCY_CYCLE,
        }
    }
}

fn join_errors(errors: &[ResolveError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Plugins, version resolvers and caches shared by the files of a build.
pub struct BuildContext {
    pub languages: Vec<Box<dyn Language>>,
    pub version_resolvers: Vec<Arc<dyn VersionResolver>>,
    pub tsconfig: TsConfigCache,
    pub package_json: PackageJsonCache,
}

impl BuildContext {
    /// Default plugins and no version resolvers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            languages: default_languages(),
            version_resolvers: Vec::new(),
            tsconfig: TsConfigCache::new(),
            package_json: PackageJsonCache::new(),
        }
    }

    /// Default plugins and the version resolvers `config` selects.
    #[must_use]
    pub fn from_config(config: &RegistryConfig) -> Self {
        Self {
            version_resolvers: config.version_resolvers(),
            ..Self::new()
        }
    }

    pub fn with_version_resolver(mut self, resolver: Arc<dyn VersionResolver>) -> Self {
        self.version_resolvers.push(resolver);
        self
    }
}

impl Default for BuildContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A finished build.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub manifest: Manifest,
    pub warnings: Vec<Warning>,
}

/// Build the registry in `cwd` with a fresh context, collecting warnings.
pub async fn build(config: &RegistryConfig, cwd: &Path) -> Result<BuildOutput, BuildError> {
    let ctx = BuildContext::from_config(config);
    let mut warnings = Vec::new();
    let manifest = build_registry(config, cwd, &ctx, &mut warnings).await?;
    Ok(BuildOutput { manifest, warnings })
}

/// Build the registry declared by `config` rooted at `cwd`.
pub async fn build_registry(
    config: &RegistryConfig,
    cwd: &Path,
    ctx: &BuildContext,
    handler: &mut dyn WarningHandler,
) -> Result<Manifest, BuildError> {
    let root = dunce::canonicalize(cwd).unwrap_or_else(|_| normalize(cwd));
    let dirs = config.registry_dirs(&root);

    // Init
    let files = expand_items(config, &root)?;
    check_peers(ctx, &files, &root).await?;

    // PerFile
    let lang_opts = LanguageOptions {
        allow_tailwind_directives: config.allow_tailwind_directives,
    };
    let job = FileJob {
        config,
        ctx,
        root: &root,
        dirs: &dirs,
        lang_opts,
    };
    let outcomes: Vec<Option<ResolvedImports>> = stream::iter(files.iter())
        .map(|file| job.process(file))
        .buffered(config.concurrency.max(1))
        .try_collect()
        .await?;

    // Aggregate
    let (items, mut warnings) = aggregate(config, &files, outcomes);

    // CycleCheck
    let mut graph = ItemGraph::new();
    for item in &items {
        graph.add_node(item.name.clone());
        for dep in &item.registry_dependencies {
            graph.add_edge(item.name.clone(), dep.clone());
        }
    }
    let cycles = graph.find_cycles();
    if config.cycles == CyclePolicy::Error {
        if let Some(cycle) = cycles.into_iter().next() {
            return Err(BuildError::DependencyCycle { cycle });
        }
    } else {
        warnings.extend(cycles.into_iter().map(|cycle| {
            Warning::new(
                codes::DEPENDENCY_CYCLE,
                format!("dependency cycle between items: {}", cycle.join(" -> ")),
            )
        }));
    }

    // Done
    for warning in warnings {
        handler.on_warning(warning);
    }
    Ok(Manifest {
        name: config.name.clone(),
        version: config.version.clone(),
        items,
    })
}

/// One file of one item, after directory expansion.
#[derive(Debug, Clone)]
struct SourceFile {
    item: usize,
    absolute: PathBuf,
    /// Path relative to the project root, slash separated.
    relative: String,
    /// Install path relative to the item type's directory.
    target: String,
    /// The directory entry this file was expanded from.
    containing_dir: Option<PathBuf>,
}

fn expand_items(config: &RegistryConfig, root: &Path) -> Result<Vec<SourceFile>, BuildError> {
    let mut names = HashSet::new();
    let mut owners: HashMap<PathBuf, usize> = HashMap::new();
    let mut files = Vec::new();

    for (index, item) in config.items.iter().enumerate() {
        if item.name.trim().is_empty() {
            return Err(BuildError::EmptyItemName { index });
        }
        if !names.insert(item.name.as_str()) {
            return Err(BuildError::DuplicateItem {
                name: item.name.clone(),
            });
        }
        if item.files.is_empty() {
            return Err(BuildError::NoFiles {
                item: item.name.clone(),
            });
        }

        let mut targets = HashSet::new();
        for entry in &item.files {
            let absolute = normalize(&root.join(entry));
            let expanded: Vec<(PathBuf, String, Option<PathBuf>)> = if absolute.is_file() {
                let target = absolute
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                vec![(absolute.clone(), target, None)]
            } else if absolute.is_dir() {
                let dir_name = absolute
                    .file_name()
                    .map(PathBuf::from)
                    .unwrap_or_default();
                jsrepo_util::fs::list_files_sorted(&absolute)
                    .map_err(|source| BuildError::FileRead {
                        file: absolute.clone(),
                        source,
                    })?
                    .into_iter()
                    .map(|path| {
                        let path = normalize(&path);
                        let target = to_slash(&dir_name.join(relative_path(&absolute, &path)));
                        (path, target, Some(absolute.clone()))
                    })
                    .collect()
            } else {
                return Err(BuildError::FileNotFound {
                    item: item.name.clone(),
                    file: absolute,
                });
            };

            for (path, target, containing_dir) in expanded {
                if !targets.insert(target.clone()) {
                    return Err(BuildError::DuplicateTarget {
                        item: item.name.clone(),
                        target,
                    });
                }
                if let Some(&first) = owners.get(&path) {
                    return Err(BuildError::FileShared {
                        file: path,
                        first: config.items[first].name.clone(),
                        second: item.name.clone(),
                    });
                }
                owners.insert(path.clone(), index);
                files.push(SourceFile {
                    item: index,
                    relative: to_slash(&relative_path(root, &path)),
                    absolute: path,
                    target,
                    containing_dir,
                });
            }
        }
    }

    Ok(files)
}

/// Probe the peer requirement of every plugin that will handle a file.
async fn check_peers(
    ctx: &BuildContext,
    files: &[SourceFile],
    root: &Path,
) -> Result<(), BuildError> {
    let mut checked = BTreeSet::new();
    for file in files {
        let Some(lang) = select_language(&ctx.languages, &file.relative) else {
            continue;
        };
        if !checked.insert(lang.name()) {
            continue;
        }
        if let Some(requirement) = lang.peer_requirement() {
            let manifest = ctx.package_json.nearest(root).await?;
            requirement
                .check(manifest.as_deref())
                .map_err(BuildError::MissingPeer)?;
        }
    }
    Ok(())
}

/// Everything the per-file phase needs, borrowed from the build.
struct FileJob<'a> {
    config: &'a RegistryConfig,
    ctx: &'a BuildContext,
    root: &'a Path,
    dirs: &'a [PathBuf],
    lang_opts: LanguageOptions,
}

impl FileJob<'_> {
    /// `None` when no plugin handles the file.
    async fn process(&self, file: &SourceFile) -> Result<Option<ResolvedImports>, BuildError> {
        let Some(lang) = select_language(&self.ctx.languages, &file.relative) else {
            return Ok(None);
        };

        let path = file.absolute.clone();
        let code = blocking(move || jsrepo_util::fs::read_to_string_lossy(&path))
            .await
            .map_err(|source| BuildError::FileRead {
                file: file.absolute.clone(),
                source,
            })?;

        let opts = ResolveOptions {
            file_path: &file.absolute,
            is_sub_dir: file.containing_dir.is_some(),
            dirs: self.dirs,
            cwd: self.root,
            containing_dir: file.containing_dir.as_deref(),
            do_not_install: HashSet::new(),
            exclude_deps: &self.config.exclude_deps,
            tsconfig: &self.ctx.tsconfig,
            package_json: &self.ctx.package_json,
        };

        let mut resolved = resolve_dependencies(lang, &code, &self.lang_opts, &opts)
            .await
            .map_err(|e| match e {
                DependencyError::Lang(source) => BuildError::Lang {
                    file: PathBuf::from(&file.relative),
                    source,
                },
                DependencyError::Resolve(errors) => BuildError::Resolve {
                    file: PathBuf::from(&file.relative),
                    errors,
                },
            })?;

        resolved.dependencies = self.resolve_versions(file, resolved.dependencies).await?;
        resolved.dev_dependencies = self
            .resolve_versions(file, resolved.dev_dependencies)
            .await?;
        Ok(Some(resolved))
    }

    async fn resolve_versions(
        &self,
        file: &SourceFile,
        deps: Vec<RemoteDependency>,
    ) -> Result<Vec<RemoteDependency>, BuildError> {
        let mut out = Vec::with_capacity(deps.len());
        for mut dep in deps {
            for resolver in &self.ctx.version_resolvers {
                let name = dep.name.clone();
                dep = resolver.resolve(dep, self.root).await.map_err(|source| {
                    BuildError::VersionResolution {
                        file: PathBuf::from(&file.relative),
                        dependency: name,
                        source,
                    }
                })?;
            }
            out.push(dep);
        }
        Ok(out)
    }
}

/// Per-item accumulation during aggregation.
#[derive(Default)]
struct ItemAcc {
    files: Vec<ManifestFile>,
    dependencies: BTreeMap<String, RemoteDependency>,
    dev_dependencies: BTreeMap<String, RemoteDependency>,
    registry_dependencies: BTreeSet<String>,
}

fn aggregate(
    config: &RegistryConfig,
    files: &[SourceFile],
    outcomes: Vec<Option<ResolvedImports>>,
) -> (Vec<ManifestItem>, Vec<Warning>) {
    let owners: HashMap<&Path, &SourceFile> =
        files.iter().map(|f| (f.absolute.as_path(), f)).collect();
    let mut accs: Vec<ItemAcc> = config.items.iter().map(|_| ItemAcc::default()).collect();
    let mut warnings = Vec::new();

    for (file, outcome) in files.iter().zip(outcomes) {
        let item_name = &config.items[file.item].name;
        let acc = &mut accs[file.item];
        let mut manifest_file = ManifestFile {
            path: file.relative.clone(),
            target: file.target.clone(),
            local_dependencies: Vec::new(),
        };

        let Some(resolved) = outcome else {
            warnings.push(
                Warning::new(codes::FILE_SKIPPED, "no language plugin handles this file")
                    .with_file(&file.relative),
            );
            acc.files.push(manifest_file);
            continue;
        };

        for w in &resolved.warnings {
            warnings.push(Warning::from_resolve(w, &file.relative));
        }

        for local in resolved.local {
            let Some(target) = owners.get(local.absolute_path.as_path()) else {
                warnings.push(
                    Warning::new(
                        codes::UNOWNED_LOCAL_DEPENDENCY,
                        format!(
                            "'{}' resolves to {}, which no item declares",
                            local.import,
                            local.absolute_path.display()
                        ),
                    )
                    .with_file(&file.relative)
                    .with_specifier(&local.import),
                );
                continue;
            };
            let owner = &config.items[target.item].name;
            if owner != item_name {
                acc.registry_dependencies.insert(owner.clone());
            }
            manifest_file.local_dependencies.push(ManifestLocalDependency {
                import: local.import,
                item: owner.clone(),
                file: target.target.clone(),
            });
        }

        for dep in resolved.dependencies {
            acc.dependencies.insert(dep.name.clone(), dep);
        }
        for dep in resolved.dev_dependencies {
            acc.dev_dependencies.insert(dep.name.clone(), dep);
        }
        acc.files.push(manifest_file);
    }

    let items = config
        .items
        .iter()
        .zip(accs)
        .map(|(item, mut acc)| {
            let excluded = |name: &String| config.exclude_deps.contains(name);
            acc.dependencies.retain(|name, _| !excluded(name));
            acc.dev_dependencies
                .retain(|name, _| !excluded(name) && !acc.dependencies.contains_key(name));
            ManifestItem {
                name: item.name.clone(),
                item_type: item.item_type.clone(),
                add: item.add,
                files: acc.files,
                registry_dependencies: acc.registry_dependencies.into_iter().collect(),
                dependencies: acc.dependencies.into_values().map(Into::into).collect(),
                dev_dependencies: acc.dev_dependencies.into_values().map(Into::into).collect(),
            }
        })
        .collect();

    (items, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ItemConfig, VersionResolverKind};
    use crate::manifest::ManifestDependency;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::{tempdir, TempDir};

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn item(name: &str, item_type: &str, files: &[&str]) -> ItemConfig {
        ItemConfig {
            name: name.to_string(),
            item_type: item_type.to_string(),
            files: files.iter().map(|f| (*f).to_string()).collect(),
            add: crate::config::AddPolicy::default(),
        }
    }

    /// A logger item whose index imports `./stdout` and `picocolors`.
    fn logger_fixture() -> (TempDir, RegistryConfig) {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "package.json",
            r#"{ "name": "@acme/registry", "devDependencies": { "picocolors": "catalog:" } }"#,
        );
        write(
            root,
            "src/logger/index.ts",
            "import { write } from './stdout';\nimport pc from 'picocolors';\nexport const log = (m: string) => write(pc.cyan(m));\n",
        );
        write(
            root,
            "src/logger/stdout.ts",
            "export const write = (s: string) => process.stdout.write(s);\n",
        );

        let mut config = RegistryConfig::new("@acme/registry");
        config.dirs = vec!["src".to_string()];
        config.items = vec![item(
            "logger",
            "lib",
            &["src/logger/index.ts", "src/logger/stdout.ts"],
        )];
        (dir, config)
    }

    #[tokio::test]
    async fn test_local_and_catalog_dev_dependency() {
        let (dir, config) = logger_fixture();
        let out = build(&config, dir.path()).await.unwrap();

        let logger = &out.manifest.items[0];
        assert_eq!(logger.files.len(), 2);
        assert_eq!(logger.files[0].path, "src/logger/index.ts");
        assert_eq!(
            logger.files[0].local_dependencies,
            vec![ManifestLocalDependency {
                import: "./stdout".to_string(),
                item: "logger".to_string(),
                file: "stdout.ts".to_string(),
            }]
        );
        assert!(logger.registry_dependencies.is_empty());
        assert!(logger.dependencies.is_empty());
        assert_eq!(
            logger.dev_dependencies,
            vec![ManifestDependency::Versioned {
                name: "picocolors".to_string(),
                version: "catalog:".to_string(),
            }]
        );
        assert!(out.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_exclude_deps() {
        let (dir, mut config) = logger_fixture();
        config.exclude_deps = vec!["picocolors".to_string()];
        let out = build(&config, dir.path()).await.unwrap();
        assert!(out.manifest.items[0].dev_dependencies.is_empty());
        assert!(out.manifest.items[0].dependencies.is_empty());
    }

    #[tokio::test]
    async fn test_builds_are_byte_identical() {
        let (dir, config) = logger_fixture();
        let first = build(&config, dir.path()).await.unwrap();
        let second = build(&config, dir.path()).await.unwrap();
        assert_eq!(
            first.manifest.to_json_pretty().unwrap(),
            second.manifest.to_json_pretty().unwrap()
        );
    }

    #[tokio::test]
    async fn test_catalog_version_resolved_with_pnpm() {
        let (dir, mut config) = logger_fixture();
        write(
            dir.path(),
            "pnpm-workspace.yaml",
            "packages: []\ncatalog:\n  picocolors: ^1.1.1\n",
        );
        config.version_resolver = VersionResolverKind::Pnpm;

        let out = build(&config, dir.path()).await.unwrap();
        assert_eq!(
            out.manifest.items[0].dev_dependencies[0].version(),
            Some("^1.1.1")
        );
    }

    #[tokio::test]
    async fn test_registry_dependencies_and_dedup() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "package.json",
            r#"{ "name": "r", "dependencies": { "clsx": "^2.1.0" }, "devDependencies": { "clsx": "^1.0.0", "vitest": "^2.0.0" } }"#,
        );
        write(root, "src/utils.ts", "import clsx from 'clsx';\nexport const cn = clsx;\n");
        write(root, "src/icons.ts", "export const x = 1;\n");
        write(
            root,
            "src/button.ts",
            "import { cn } from './utils';\nimport { x } from './icons';\nimport { y } from './button-variants';\nimport clsx from 'clsx';\nimport 'vitest';\n",
        );
        write(root, "src/button-variants.ts", "export const y = 2;\n");
        write(root, "src/orphan-user.ts", "import './unowned';\n");
        write(root, "src/unowned.ts", "");

        let mut config = RegistryConfig::new("r");
        config.items = vec![
            item("button", "ui", &["src/button.ts", "src/button-variants.ts"]),
            item("utils", "lib", &["src/utils.ts"]),
            item("icons", "lib", &["src/icons.ts"]),
            item("orphan", "lib", &["src/orphan-user.ts"]),
        ];

        let out = build(&config, root).await.unwrap();
        let button = out.manifest.item("button").unwrap();
        assert_eq!(button.registry_dependencies, vec!["icons", "utils"]);
        assert_eq!(
            button.dependencies,
            vec![ManifestDependency::Versioned {
                name: "clsx".to_string(),
                version: "^2.1.0".to_string(),
            }]
        );
        assert_eq!(
            button.dev_dependencies,
            vec![ManifestDependency::Versioned {
                name: "vitest".to_string(),
                version: "^2.0.0".to_string(),
            }]
        );

        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].code, codes::UNOWNED_LOCAL_DEPENDENCY);
        assert_eq!(out.warnings[0].specifier.as_deref(), Some("./unowned"));
    }

    #[tokio::test]
    async fn test_cycles_warn_or_fail() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "src/a.ts", "import { b } from './b';\nexport const a = 1;\n");
        write(root, "src/b.ts", "import { a } from './a';\nexport const b = 2;\n");

        let mut config = RegistryConfig::new("r");
        config.items = vec![item("a", "lib", &["src/a.ts"]), item("b", "lib", &["src/b.ts"])];

        let out = build(&config, root).await.unwrap();
        let cycle_warnings: Vec<_> = out
            .warnings
            .iter()
            .filter(|w| w.code == codes::DEPENDENCY_CYCLE)
            .collect();
        assert_eq!(cycle_warnings.len(), 1);
        assert!(cycle_warnings[0].message.contains("a -> b -> a"));

        config.cycles = CyclePolicy::Error;
        let err = build(&config, root).await.unwrap_err();
        assert_eq!(err.code(), codes::BUILD_DEPENDENCY_CYCLE);
    }

    #[tokio::test]
    async fn test_init_validation() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "src/a.ts", "");

        let mut config = RegistryConfig::new("r");
        config.items = vec![item("a", "lib", &["src/a.ts"]), item("a", "lib", &["src/a.ts"])];
        assert_eq!(
            build(&config, root).await.unwrap_err().code(),
            codes::BUILD_ITEM_DUPLICATE
        );

        config.items = vec![item(" ", "lib", &["src/a.ts"])];
        assert_eq!(
            build(&config, root).await.unwrap_err().code(),
            codes::BUILD_ITEM_NAME_EMPTY
        );

        config.items = vec![item("a", "lib", &["src/missing.ts"])];
        let err = build(&config, root).await.unwrap_err();
        assert_eq!(err.code(), codes::BUILD_FILE_NOT_FOUND);
        assert!(err.to_string().contains("missing.ts"));

        config.items = vec![item("a", "lib", &["src/a.ts"]), item("b", "lib", &["src/a.ts"])];
        assert_eq!(
            build(&config, root).await.unwrap_err().code(),
            codes::BUILD_FILE_SHARED
        );
    }

    #[tokio::test]
    async fn test_unhandled_file_is_skipped() {
        let dir = tempdir().unwrap();
        write(dir.path(), "src/README.md", "# hi\n");

        let mut config = RegistryConfig::new("r");
        config.items = vec![item("docs", "doc", &["src/README.md"])];
        let out = build(&config, dir.path()).await.unwrap();
        assert_eq!(out.manifest.items[0].files[0].target, "README.md");
        assert_eq!(out.warnings[0].code, codes::FILE_SKIPPED);
    }

    #[tokio::test]
    async fn test_missing_peer_dependency() {
        let dir = tempdir().unwrap();
        write(dir.path(), "package.json", r#"{ "name": "r" }"#);
        write(dir.path(), "src/Button.svelte", "<script>\nlet x = 1;\n</script>\n");

        let mut config = RegistryConfig::new("r");
        config.items = vec![item("button", "ui", &["src/Button.svelte"])];
        let err = build(&config, dir.path()).await.unwrap_err();
        assert_eq!(err.code(), "MISSING_PEER_DEPENDENCY");
        assert!(err.to_string().contains("svelte"));
    }

    #[tokio::test]
    async fn test_directory_entry() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "blocks/login/form.ts", "import { s } from './shared';\n");
        write(root, "blocks/login/shared.ts", "export const s = 1;\n");

        let mut config = RegistryConfig::new("r");
        config.dirs = vec!["src".to_string()];
        config.items = vec![item("login", "block", &["blocks/login"])];

        let out = build(&config, root).await.unwrap();
        let login = &out.manifest.items[0];
        let targets: Vec<_> = login.files.iter().map(|f| f.target.as_str()).collect();
        assert_eq!(targets, vec!["login/form.ts", "login/shared.ts"]);
        assert_eq!(login.files[0].local_dependencies[0].file, "login/shared.ts");
    }

    #[tokio::test]
    async fn test_local_escape_fails_build() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "src/a.ts", "import '../outside';\n");
        write(root, "outside.ts", "");

        let mut config = RegistryConfig::new("r");
        config.dirs = vec!["src".to_string()];
        config.items = vec![item("a", "lib", &["src/a.ts"])];

        let err = build(&config, root).await.unwrap_err();
        assert_eq!(err.code(), "LOCAL_ESCAPE");
        assert!(err.to_string().contains("src/a.ts"));
    }

    #[tokio::test]
    async fn test_declared_order_survives_concurrency() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let mut names = Vec::new();
        for i in (0..24).rev() {
            let rel = format!("src/f{i:02}.ts");
            write(root, &rel, "export {};\n");
            names.push(rel);
        }

        let mut config = RegistryConfig::new("r");
        config.concurrency = 3;
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        config.items = vec![item("many", "lib", &refs)];

        let out = build(&config, root).await.unwrap();
        let paths: Vec<_> = out.manifest.items[0].files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(paths, names);
    }

    /// Holds each call open until `target` calls are in flight at once.
    struct Gate {
        target: usize,
        started: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl Gate {
        fn new(target: usize) -> Self {
            Self {
                target,
                started: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl VersionResolver for Gate {
        fn name(&self) -> &'static str {
            "gate"
        }

        async fn resolve(
            &self,
            dep: RemoteDependency,
            _cwd: &Path,
        ) -> Result<RemoteDependency, PkgError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            for _ in 0..10_000 {
                if self.started.load(Ordering::SeqCst) >= self.target {
                    break;
                }
                tokio::task::yield_now().await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(dep)
        }
    }

    async fn max_in_flight(concurrency: usize) -> usize {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "package.json", r#"{ "name": "r" }"#);
        let names: Vec<String> = ["c", "a", "b"]
            .iter()
            .map(|n| {
                let rel = format!("src/{n}.ts");
                write(root, &rel, "import { z } from 'zod';\n");
                rel
            })
            .collect();

        let mut config = RegistryConfig::new("r");
        config.concurrency = concurrency;
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        config.items = vec![item("many", "lib", &refs)];

        let gate = Arc::new(Gate::new(3));
        let ctx = BuildContext::new().with_version_resolver(gate.clone());
        let mut warnings = Vec::new();
        let manifest = build_registry(&config, root, &ctx, &mut warnings)
            .await
            .unwrap();
        let paths: Vec<_> = manifest.items[0].files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(paths, names);
        gate.max_in_flight.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_concurrency_bounds_overlapping_files() {
        assert_eq!(max_in_flight(1).await, 1);
        assert_eq!(max_in_flight(3).await, 3);
    }
}
