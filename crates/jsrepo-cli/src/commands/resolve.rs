//! `jsrepo resolve` command implementation.
//!
//! Resolves the imports of one file the same way a build would, without
//! mapping local files to items.

use super::{fail, load_config_or_default, runtime};
use jsrepo_core::build::codes::{BUILD_FILE_READ_FAILED, BUILD_RESOLVE_FAILED, FILE_SKIPPED};
use jsrepo_core::langs::{DependencyError, LanguageOptions};
use jsrepo_core::manifest::ManifestDependency;
use jsrepo_core::pkg::PackageJsonCache;
use jsrepo_core::resolver::TsConfigCache;
use jsrepo_core::{
    default_languages, resolve_dependencies, select_language, Language, RemoteDependency,
    ResolveOptions, VersionResolver,
};
use jsrepo_util::path::{relative_path, to_slash};
use miette::Result;
use std::collections::HashSet;
use std::path::Path;

/// Run the resolve command.
pub fn run(cwd: &Path, file: &Path, json: bool) -> Result<()> {
    let config = match load_config_or_default(cwd) {
        Ok(c) => c,
        Err(e) => return fail(json, e.code(), e),
    };

    let root = dunce::canonicalize(cwd).unwrap_or_else(|_| jsrepo_util::path::normalize(cwd));
    let absolute = jsrepo_util::path::normalize(&root.join(file));
    let display = to_slash(&relative_path(&root, &absolute));

    let languages = default_languages();
    let Some(lang) = select_language(&languages, &display) else {
        return fail(json, FILE_SKIPPED, format!("no language plugin handles {display}"));
    };

    let code = match jsrepo_util::fs::read_to_string_lossy(&absolute) {
        Ok(c) => c,
        Err(e) => return fail(json, BUILD_FILE_READ_FAILED, format!("{display}: {e}")),
    };

    let dirs = config.registry_dirs(&root);
    let tsconfig = TsConfigCache::new();
    let package_json = PackageJsonCache::new();
    let opts = ResolveOptions {
        file_path: &absolute,
        is_sub_dir: false,
        dirs: &dirs,
        cwd: &root,
        containing_dir: None,
        do_not_install: HashSet::new(),
        exclude_deps: &config.exclude_deps,
        tsconfig: &tsconfig,
        package_json: &package_json,
    };
    let lang_opts = LanguageOptions {
        allow_tailwind_directives: config.allow_tailwind_directives,
    };

    let rt = runtime()?;
    let resolved = match rt.block_on(resolve_dependencies(lang, &code, &lang_opts, &opts)) {
        Ok(r) => r,
        Err(DependencyError::Lang(e)) => return fail(json, e.code(), format!("{display}: {e}")),
        Err(DependencyError::Resolve(errors)) => {
            let code = match errors.as_slice() {
                [only] => only.code(),
                _ => BUILD_RESOLVE_FAILED,
            };
            let message = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return fail(json, code, format!("{display}: {message}"));
        }
    };

    let resolvers = config.version_resolvers();
    let resolve_versions = |deps: Vec<RemoteDependency>| {
        rt.block_on(async {
            let mut out = Vec::with_capacity(deps.len());
            for mut dep in deps {
                for resolver in &resolvers {
                    dep = resolver.resolve(dep, &root).await?;
                }
                out.push(ManifestDependency::from(dep));
            }
            Ok::<_, jsrepo_core::pkg::PkgError>(out)
        })
    };
    let (dependencies, dev_dependencies) = match resolve_versions(resolved.dependencies)
        .and_then(|deps| Ok((deps, resolve_versions(resolved.dev_dependencies)?)))
    {
        Ok(pair) => pair,
        Err(e) => return fail(json, e.code(), e.message()),
    };

    let local: Vec<_> = resolved
        .local
        .iter()
        .map(|l| (l.import.clone(), to_slash(&relative_path(&root, &l.absolute_path))))
        .collect();

    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": true,
                "file": display,
                "language": lang.name(),
                "local": local
                    .iter()
                    .map(|(import, path)| serde_json::json!({ "import": import, "path": path }))
                    .collect::<Vec<_>>(),
                "dependencies": dependencies,
                "devDependencies": dev_dependencies,
                "warnings": resolved
                    .warnings
                    .iter()
                    .map(|w| serde_json::json!({
                        "code": w.code(),
                        "message": w.to_string(),
                        "specifier": w.subject(),
                        "line": w.line()
                    }))
                    .collect::<Vec<_>>()
            })
        );
    } else {
        println!("{display} ({})", lang.name());
        for (import, path) in &local {
            println!("  local  {import} -> {path}");
        }
        for dep in &dependencies {
            println!("  dep    {}", format_dependency(dep));
        }
        for dep in &dev_dependencies {
            println!("  dev    {}", format_dependency(dep));
        }
        for w in &resolved.warnings {
            tracing::warn!(code = w.code(), specifier = w.subject(), line = w.line(), "{w}");
        }
    }

    Ok(())
}

fn format_dependency(dep: &ManifestDependency) -> String {
    match dep.version() {
        Some(version) => format!("{}@{version}", dep.name()),
        None => dep.name().to_string(),
    }
}
