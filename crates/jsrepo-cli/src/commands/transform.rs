//! `jsrepo transform` command implementation.
//!
//! Prints a registry file with its local imports rewritten for the
//! consumer layout configured in `paths`.

use super::{fail, load_config_or_default, runtime};
use jsrepo_core::build::codes::{BUILD_FILE_READ_FAILED, FILE_SKIPPED};
use jsrepo_core::manifest::ManifestFile;
use jsrepo_core::{
    build_registry, default_languages, select_language, transform_imports_counted, BuildContext,
    Manifest, TransformOptions, Warning,
};
use miette::Result;
use std::path::{Path, PathBuf};

/// The requested file is not declared by any item.
pub const FILE_NOT_IN_MANIFEST: &str = "FILE_NOT_IN_MANIFEST";

/// Transform command action.
#[derive(Debug, Clone)]
pub struct TransformAction {
    pub cwd: PathBuf,
    /// Registry file, as listed in the manifest.
    pub file: String,
    /// Consumer path the file is written to.
    pub target: PathBuf,
    /// Prebuilt manifest; built from `jsrepo.json` when absent.
    pub manifest: Option<PathBuf>,
}

/// Run the transform command.
pub fn run(action: TransformAction, json: bool) -> Result<()> {
    let config = match load_config_or_default(&action.cwd) {
        Ok(c) => c,
        Err(e) => return fail(json, e.code(), e),
    };
    let root = dunce::canonicalize(&action.cwd)
        .unwrap_or_else(|_| jsrepo_util::path::normalize(&action.cwd));

    let manifest = match &action.manifest {
        Some(path) => match Manifest::read(&root.join(path)) {
            Ok(m) => m,
            Err(e) => return fail(json, e.code(), e),
        },
        None => {
            let ctx = BuildContext::from_config(&config);
            let mut warnings: Vec<Warning> = Vec::new();
            let rt = runtime()?;
            match rt.block_on(build_registry(&config, &root, &ctx, &mut warnings)) {
                Ok(m) => {
                    tracing::debug!(warnings = warnings.len(), "built manifest in memory");
                    m
                }
                Err(e) => return fail(json, e.code(), e),
            }
        }
    };

    let wanted = normalize_manifest_path(&action.file);
    let Some(file) = find_file(&manifest, &wanted) else {
        return fail(
            json,
            FILE_NOT_IN_MANIFEST,
            format!("{wanted} is not declared by any item of {}", manifest.name),
        );
    };

    let languages = default_languages();
    let Some(lang) = select_language(&languages, &file.path) else {
        return fail(json, FILE_SKIPPED, format!("no language plugin handles {}", file.path));
    };

    let code = match jsrepo_util::fs::read_to_string_lossy(&root.join(&file.path)) {
        Ok(c) => c,
        Err(e) => return fail(json, BUILD_FILE_READ_FAILED, format!("{}: {e}", file.path)),
    };

    let target_path = if action.target.is_absolute() {
        action.target.clone()
    } else {
        root.join(&action.target)
    };
    let get_item_path = |_: &str, item_type: &str| config.item_path(&root, item_type);
    let opts = TransformOptions {
        target_path: &target_path,
        get_item_path: &get_item_path,
    };

    let imports = manifest.local_imports(file);
    let transformed = match transform_imports_counted(lang, &code, &imports, &opts) {
        Ok(t) => t,
        Err(e) => return fail(json, e.code(), e),
    };

    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": true,
                "file": file.path,
                "target": target_path.display().to_string(),
                "rewritten": transformed.replacements,
                "code": transformed.code
            })
        );
    } else {
        print!("{}", transformed.code);
    }

    Ok(())
}

/// Slash-separated, without a leading `./`.
fn normalize_manifest_path(file: &str) -> String {
    let slashed = file.replace('\\', "/");
    slashed.trim_start_matches("./").to_string()
}

fn find_file<'a>(manifest: &'a Manifest, path: &str) -> Option<&'a ManifestFile> {
    manifest
        .items
        .iter()
        .flat_map(|item| item.files.iter())
        .find(|f| f.path == path)
}
