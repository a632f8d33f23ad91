//! Import specifier classification and package specifier parsing.
//!
//! Parses bare specifiers like:
//! - `lodash`
//! - `lodash@4.17.21`
//! - `lodash/debounce`
//! - `@scope/pkg@2.1.0/lib/utils`

use super::error::PkgError;

/// Coarse classification of an import specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind {
    /// Relative or absolute filesystem path (`./x`, `../x`, `/x`).
    Local,
    /// Bare package specifier, possibly a path alias.
    Bare,
    /// Absolute `http://` or `https://` URL.
    Url,
}

/// Classify an import specifier.
#[must_use]
pub fn classify(specifier: &str) -> SpecifierKind {
    if specifier.starts_with('.') || specifier.starts_with('/') {
        SpecifierKind::Local
    } else if is_http_url(specifier) {
        SpecifierKind::Url
    } else {
        SpecifierKind::Bare
    }
}

/// Check whether a specifier is an absolute http(s) URL.
#[must_use]
pub fn is_http_url(specifier: &str) -> bool {
    specifier.starts_with("http://") || specifier.starts_with("https://")
}

/// A parsed bare specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpecifier {
    /// Full package name (e.g., "@scope/name" or "name"), never with a version.
    pub name: String,
    /// Pinned version or range following `@`, if any.
    pub version: Option<String>,
    /// Subpath after the name, either empty or starting with `/`.
    pub path: String,
}

impl PackageSpecifier {
    /// Scope without the `@` prefix, if scoped.
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.name
            .strip_prefix('@')
            .and_then(|rest| rest.split_once('/'))
            .map(|(scope, _)| scope)
    }
}

/// Parse a bare specifier into name, optional version and subpath.
///
/// # Errors
/// Returns `PKG_SPEC_INVALID` for an empty string, a bare `@`, a scope with
/// no package segment, an empty version, or a name with invalid characters.
/// The error message contains the original input.
pub fn parse_package_name(input: &str) -> Result<PackageSpecifier, PkgError> {
    if input.is_empty() {
        return Err(PkgError::spec_invalid(input, "empty specifier"));
    }

    // Split off the name segment: up to the second `/` when scoped.
    let (segment, path) = if let Some(rest) = input.strip_prefix('@') {
        let Some(slash) = rest.find('/') else {
            return Err(PkgError::spec_invalid(input, "missing package name after scope"));
        };
        if slash == 0 {
            return Err(PkgError::spec_invalid(input, "empty scope"));
        }
        let after_scope = &rest[slash + 1..];
        let end = after_scope.find('/').map_or(input.len(), |i| 1 + slash + 1 + i);
        (&input[..end], &input[end..])
    } else {
        let end = input.find('/').unwrap_or(input.len());
        (&input[..end], &input[end..])
    };

    // Version delimiter: an `@` after position 0.
    let (name, version) = match segment[1..].find('@') {
        Some(i) => {
            let at = i + 1;
            (&segment[..at], Some(&segment[at + 1..]))
        }
        None => (segment, None),
    };

    if let Some(scoped) = name.strip_prefix('@') {
        let Some((scope, pkg)) = scoped.split_once('/') else {
            return Err(PkgError::spec_invalid(input, "missing package name after scope"));
        };
        if pkg.is_empty() {
            return Err(PkgError::spec_invalid(input, "missing package name after scope"));
        }
        validate_name_part(input, scope)?;
        validate_name_part(input, pkg)?;
    } else {
        validate_name_part(input, name)?;
    }

    if version == Some("") {
        return Err(PkgError::spec_invalid(input, "empty version"));
    }

    Ok(PackageSpecifier {
        name: name.to_string(),
        version: version.map(str::to_string),
        path: path.to_string(),
    })
}

fn validate_name_part(input: &str, part: &str) -> Result<(), PkgError> {
    if part.is_empty() {
        return Err(PkgError::spec_invalid(input, "empty name"));
    }
    if part.starts_with('.') || part.starts_with('_') {
        return Err(PkgError::spec_invalid(
            input,
            "name cannot start with '.' or '_'",
        ));
    }
    if let Some(c) = part
        .chars()
        .find(|&c| !c.is_ascii_alphanumeric() && c != '-' && c != '_' && c != '.')
    {
        return Err(PkgError::spec_invalid(
            input,
            &format!("invalid character '{c}'"),
        ));
    }
    Ok(())
}

/// Node.js builtin modules that are never installable.
const NODE_BUILTINS: &[&str] = &[
    "assert", "async_hooks", "buffer", "child_process", "cluster", "console", "constants",
    "crypto", "dgram", "diagnostics_channel", "dns", "domain", "events", "fs", "http", "http2",
    "https", "inspector", "module", "net", "os", "path", "perf_hooks", "process", "punycode",
    "querystring", "readline", "repl", "stream", "string_decoder", "sys", "timers", "tls",
    "trace_events", "tty", "url", "util", "v8", "vm", "wasi", "worker_threads", "zlib",
];

/// Check whether a specifier refers to a Node.js builtin module.
///
/// Accepts `node:`-prefixed specifiers and builtin names with a subpath
/// (`fs/promises`).
#[must_use]
pub fn is_node_builtin(specifier: &str) -> bool {
    if specifier.starts_with("node:") {
        return true;
    }
    let root = specifier.split('/').next().unwrap_or(specifier);
    NODE_BUILTINS.contains(&root)
}
