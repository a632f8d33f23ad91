//! `jsrepo build` command implementation.

use super::{fail, load_config_or_default, runtime};
use jsrepo_core::{build_registry, BuildContext, Manifest, Warning, WarningHandler};
use miette::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Schema version of the `--json` build summary.
pub const BUILD_SCHEMA_VERSION: u32 = 1;

/// Build command action.
#[derive(Debug, Clone)]
pub struct BuildAction {
    pub cwd: PathBuf,
    /// Write the manifest here instead of printing it.
    pub output: Option<PathBuf>,
    pub concurrency: Option<usize>,
}

/// Forwards build warnings to the log and keeps them for the summary.
#[derive(Debug, Default)]
struct LogWarnings {
    warnings: Vec<Warning>,
}

impl WarningHandler for LogWarnings {
    fn on_warning(&mut self, warning: Warning) {
        let file = warning.file.as_deref().map(jsrepo_util::path::to_slash);
        tracing::warn!(
            code = warning.code,
            file = file.as_deref(),
            specifier = warning.specifier.as_deref(),
            line = warning.line,
            "{}",
            warning.message
        );
        self.warnings.push(warning);
    }
}

#[derive(Serialize)]
struct BuildResultJson {
    schema_version: u32,
    ok: bool,
    name: String,
    hash: String,
    counts: BuildCountsJson,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    manifest: Option<Manifest>,
    warnings: Vec<WarningJson>,
}

#[derive(Serialize)]
struct BuildCountsJson {
    items: usize,
    files: usize,
    warnings: usize,
}

#[derive(Serialize)]
struct WarningJson {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    specifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<u32>,
}

impl From<&Warning> for WarningJson {
    fn from(w: &Warning) -> Self {
        Self {
            code: w.code,
            message: w.message.clone(),
            file: w.file.as_deref().map(jsrepo_util::path::to_slash),
            specifier: w.specifier.clone(),
            line: w.line,
        }
    }
}

/// Run the build command.
pub fn run(action: BuildAction, json: bool) -> Result<()> {
    let mut config = match load_config_or_default(&action.cwd) {
        Ok(c) => c,
        Err(e) => return fail(json, e.code(), e),
    };
    if let Some(n) = action.concurrency {
        config.concurrency = n;
    }

    let ctx = BuildContext::from_config(&config);
    let mut handler = LogWarnings::default();
    tracing::debug!(items = config.items.len(), "building registry");

    let rt = runtime()?;
    let manifest = match rt.block_on(build_registry(&config, &action.cwd, &ctx, &mut handler)) {
        Ok(m) => m,
        Err(e) => return fail(json, e.code(), e),
    };

    let content = match manifest.to_json_pretty() {
        Ok(c) => c,
        Err(e) => return fail(json, e.code(), e),
    };
    let hash = jsrepo_util::hash::content_hash(content.as_bytes());

    let output = action.output.as_ref().map(|p| resolve_output(&action.cwd, p));
    if let Some(path) = &output {
        if let Err(e) = jsrepo_util::fs::atomic_write(path, content.as_bytes()) {
            let e = jsrepo_core::Error::from(e);
            return fail(json, e.code(), format!("{}: {e}", path.display()));
        }
        tracing::info!(path = %path.display(), "wrote manifest");
    }

    if json {
        let result = BuildResultJson {
            schema_version: BUILD_SCHEMA_VERSION,
            ok: true,
            name: manifest.name.clone(),
            hash,
            counts: BuildCountsJson {
                items: manifest.items.len(),
                files: manifest.items.iter().map(|i| i.files.len()).sum(),
                warnings: handler.warnings.len(),
            },
            output: output.as_ref().map(|p| p.display().to_string()),
            manifest: output.is_none().then_some(manifest),
            warnings: handler.warnings.iter().map(WarningJson::from).collect(),
        };
        match serde_json::to_string(&result) {
            Ok(s) => println!("{s}"),
            Err(e) => return fail(json, "INTERNAL_ERROR", e),
        }
    } else if let Some(path) = &output {
        println!(
            "Built {} item(s) into {} ({} warning(s))",
            manifest.items.len(),
            path.display(),
            handler.warnings.len()
        );
    } else {
        print!("{content}");
    }

    Ok(())
}

fn resolve_output(cwd: &Path, output: &Path) -> PathBuf {
    if output.is_absolute() {
        output.to_path_buf()
    } else {
        cwd.join(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsrepo_core::build::codes;

    #[test]
    fn test_log_warnings_collects() {
        let mut handler = LogWarnings::default();
        handler.on_warning(Warning::new(codes::FILE_SKIPPED, "no plugin").with_file("README.md"));
        assert_eq!(handler.warnings.len(), 1);

        let json = serde_json::to_value(WarningJson::from(&handler.warnings[0])).unwrap();
        assert_eq!(json["code"], "FILE_SKIPPED");
        assert_eq!(json["file"], "README.md");
        assert!(json.get("line").is_none());
    }

    #[test]
    fn test_resolve_output() {
        let cwd = Path::new("/project");
        assert_eq!(
            resolve_output(cwd, Path::new("dist/registry.json")),
            PathBuf::from("/project/dist/registry.json")
        );
        assert_eq!(
            resolve_output(cwd, Path::new("/tmp/out.json")),
            PathBuf::from("/tmp/out.json")
        );
    }
}
