//! Package error types.

use std::fmt;
use std::io;
use std::path::Path;

/// Package error codes.
pub mod codes {
    pub const PKG_SPEC_INVALID: &str = "PKG_SPEC_INVALID";
    pub const PKG_MANIFEST_INVALID: &str = "PKG_MANIFEST_INVALID";
    pub const PKG_MANIFEST_READ_FAILED: &str = "PKG_MANIFEST_READ_FAILED";
    pub const WORKSPACE_NOT_FOUND: &str = "WORKSPACE_NOT_FOUND";
    pub const WORKSPACE_INVALID: &str = "WORKSPACE_INVALID";
    pub const WORKSPACE_PACKAGE_NOT_FOUND: &str = "WORKSPACE_PACKAGE_NOT_FOUND";
    pub const WORKSPACE_PROTOCOL_INVALID: &str = "WORKSPACE_PROTOCOL_INVALID";
    pub const CATALOG_NOT_FOUND: &str = "CATALOG_NOT_FOUND";
    pub const CATALOG_PACKAGE_NOT_FOUND: &str = "CATALOG_PACKAGE_NOT_FOUND";
}

/// Package error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkgError {
    code: &'static str,
    message: String,
}

impl PkgError {
    /// Create a new error with the given code and message.
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Get the error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Get the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Invalid package name or specifier. The message always quotes the input.
    #[must_use]
    pub fn spec_invalid(input: &str, detail: &str) -> Self {
        Self::new(
            codes::PKG_SPEC_INVALID,
            format!("invalid package name '{input}': {detail}"),
        )
    }

    /// A package.json (or workspace file) could not be parsed.
    #[must_use]
    pub fn manifest_invalid(path: &Path, detail: impl fmt::Display) -> Self {
        Self::new(
            codes::PKG_MANIFEST_INVALID,
            format!("invalid manifest {}: {detail}", path.display()),
        )
    }

    /// A package.json (or workspace file) exists but could not be read.
    #[must_use]
    pub fn manifest_read(path: &Path, err: &io::Error) -> Self {
        Self::new(
            codes::PKG_MANIFEST_READ_FAILED,
            format!("failed to read {}: {err}", path.display()),
        )
    }

    /// No workspace root between `cwd` and the filesystem root.
    #[must_use]
    pub fn workspace_not_found(cwd: &Path, marker: &str) -> Self {
        Self::new(
            codes::WORKSPACE_NOT_FOUND,
            format!(
                "workspace root not found: no {marker} in {} or any parent directory",
                cwd.display()
            ),
        )
    }

    /// The workspace declaration itself is malformed.
    pub fn workspace_invalid(msg: impl Into<String>) -> Self {
        Self::new(codes::WORKSPACE_INVALID, msg)
    }

    /// A `workspace:` dependency names a package the workspace does not contain.
    #[must_use]
    pub fn workspace_package_not_found(name: &str, available: &[&str]) -> Self {
        Self::new(
            codes::WORKSPACE_PACKAGE_NOT_FOUND,
            format!(
                "workspace package not found: '{name}' (available: {})",
                list_or_none(available)
            ),
        )
    }

    /// A `workspace:` version that cannot be interpreted.
    #[must_use]
    pub fn workspace_protocol_invalid(name: &str, version: &str, detail: &str) -> Self {
        Self::new(
            codes::WORKSPACE_PROTOCOL_INVALID,
            format!("cannot resolve '{name}@{version}': {detail}"),
        )
    }

    /// A `catalog:<name>` reference to a catalog that is not declared.
    #[must_use]
    pub fn catalog_not_found(catalog: &str, dependency: &str, available: &[&str]) -> Self {
        Self::new(
            codes::CATALOG_NOT_FOUND,
            format!(
                "catalog '{catalog}' referenced by '{dependency}' not found (available: {})",
                list_or_none(available)
            ),
        )
    }

    /// The referenced catalog has no entry for the dependency.
    #[must_use]
    pub fn catalog_package_not_found(name: &str, catalog: &str, available: &[&str]) -> Self {
        Self::new(
            codes::CATALOG_PACKAGE_NOT_FOUND,
            format!(
                "package '{name}' not found in catalog '{catalog}' (available: {})",
                list_or_none(available)
            ),
        )
    }
}

fn list_or_none(items: &[&str]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

impl fmt::Display for PkgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PkgError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        let err = PkgError::spec_invalid("@scope/", "missing package name");
        assert_eq!(err.code(), codes::PKG_SPEC_INVALID);
        assert!(err.to_string().contains(codes::PKG_SPEC_INVALID));
        assert!(err.message().contains("@scope/"));
    }

    #[test]
    fn test_workspace_package_not_found_lists_alternatives() {
        let err = PkgError::workspace_package_not_found("@acme/ui", &["@acme/core", "@acme/utils"]);
        assert!(err.message().contains("@acme/core, @acme/utils"));

        let err = PkgError::workspace_package_not_found("@acme/ui", &[]);
        assert!(err.message().contains("available: none"));
    }

    #[test]
    fn test_catalog_package_not_found_names_package() {
        let err = PkgError::catalog_package_not_found("react", "default", &["lodash"]);
        assert_eq!(err.code(), codes::CATALOG_PACKAGE_NOT_FOUND);
        assert!(err.message().contains("'react' not found in catalog"));
    }

    #[test]
    fn test_error_codes_uppercase() {
        let all_codes = [
            codes::PKG_SPEC_INVALID,
            codes::PKG_MANIFEST_INVALID,
            codes::PKG_MANIFEST_READ_FAILED,
            codes::WORKSPACE_NOT_FOUND,
            codes::WORKSPACE_INVALID,
            codes::WORKSPACE_PACKAGE_NOT_FOUND,
            codes::WORKSPACE_PROTOCOL_INVALID,
            codes::CATALOG_NOT_FOUND,
            codes::CATALOG_PACKAGE_NOT_FOUND,
        ];

        for code in all_codes {
            assert!(
                code.chars().all(|c| c.is_uppercase() || c == '_'),
                "Error code '{code}' should be SCREAMING_SNAKE_CASE"
            );
        }
    }
}
