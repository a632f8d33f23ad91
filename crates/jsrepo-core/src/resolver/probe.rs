//! Filesystem probing for local import targets.
//!
//! Probe order for a base path:
//! 1. the exact file
//! 2. `base` + each of [`PROBE_EXTENSIONS`]
//! 3. `.js`/`.jsx`/`.mjs`/`.cjs` swapped for their TypeScript counterparts
//! 4. `base/index` + each of [`PROBE_EXTENSIONS`]
//!
//! Returned paths are lexically normalized, never canonicalized, so they
//! compare equal to the normalized paths the build keys items by.

use jsrepo_util::path::normalize;
use std::path::{Path, PathBuf};

/// Extensions appended to extensionless specifiers, in priority order.
pub const PROBE_EXTENSIONS: &[&str] = &[
    ".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs", ".mts", ".cts", ".svelte", ".vue", ".json",
    ".css", ".scss",
];

/// Script extensions that TypeScript sources are imported under.
const TS_SUBSTITUTIONS: &[(&str, &[&str])] = &[
    (".js", &[".ts", ".tsx"]),
    (".jsx", &[".tsx"]),
    (".mjs", &[".mts"]),
    (".cjs", &[".cts"]),
];

/// Find the file a local specifier refers to.
#[must_use]
pub fn probe_file(base: &Path) -> Option<PathBuf> {
    let base = normalize(base);

    if base.is_file() {
        return Some(base);
    }

    for ext in PROBE_EXTENSIONS {
        let candidate = append_extension(&base, ext);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    let file_name = base.file_name()?.to_string_lossy().into_owned();
    for (from, to) in TS_SUBSTITUTIONS {
        if let Some(stem) = file_name.strip_suffix(from) {
            for ext in *to {
                let candidate = base.with_file_name(format!("{stem}{ext}"));
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
    }

    if base.is_dir() {
        for ext in PROBE_EXTENSIONS {
            let candidate = base.join(format!("index{ext}"));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }

    None
}

/// `button.component` + `.ts` is `button.component.ts`, not `button.ts`.
fn append_extension(base: &Path, ext: &str) -> PathBuf {
    let mut s = base.as_os_str().to_os_string();
    s.push(ext);
    PathBuf::from(s)
}
