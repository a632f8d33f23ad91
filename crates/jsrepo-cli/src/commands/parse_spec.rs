//! `jsrepo parse-spec` command implementation.

use super::fail;
use jsrepo_core::parse_package_name;
use miette::Result;

/// Run the parse-spec command.
pub fn run(spec: &str, json: bool) -> Result<()> {
    let parsed = match parse_package_name(spec) {
        Ok(p) => p,
        Err(e) => return fail(json, e.code(), e.message()),
    };

    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": true,
                "name": parsed.name,
                "scope": parsed.scope(),
                "version": parsed.version,
                "path": parsed.path
            })
        );
    } else {
        println!("name:    {}", parsed.name);
        if let Some(version) = &parsed.version {
            println!("version: {version}");
        }
        if !parsed.path.is_empty() {
            println!("path:    {}", parsed.path);
        }
    }

    Ok(())
}
