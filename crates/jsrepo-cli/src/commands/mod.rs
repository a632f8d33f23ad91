//! Subcommand implementations.
//!
//! Every command prints exactly one JSON object to stdout in `--json` mode.
//! Failures print `{"ok": false, "error": {"code", "message"}}` and exit 1;
//! in human mode they are returned as a `miette` report.

pub mod build;
pub mod parse_spec;
pub mod resolve;
pub mod transform;
pub mod version;

use jsrepo_core::{RegistryConfig, CONFIG_FILE};
use miette::{IntoDiagnostic, MietteDiagnostic, Report, Result};
use std::path::Path;

/// Report a failure with a stable code.
pub fn fail(json: bool, code: &str, message: impl std::fmt::Display) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": false,
                "error": {
                    "code": code,
                    "message": message.to_string()
                }
            })
        );
        std::process::exit(1);
    }
    Err(Report::new(MietteDiagnostic::new(message.to_string()).with_code(code)))
}

/// Runtime for a single command.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .into_diagnostic()
}

/// Load `jsrepo.json` from `cwd`, or fall back to an unnamed registry
/// rooted at `cwd` when there is none.
pub fn load_config_or_default(cwd: &Path) -> Result<RegistryConfig, jsrepo_core::Error> {
    if cwd.join(CONFIG_FILE).is_file() {
        return RegistryConfig::load(cwd);
    }
    tracing::debug!(cwd = %cwd.display(), "no {CONFIG_FILE}, using defaults");
    let name = cwd
        .file_name()
        .map_or_else(|| "registry".to_string(), |n| n.to_string_lossy().into_owned());
    Ok(RegistryConfig::new(name))
}
