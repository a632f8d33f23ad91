//! Stable error and warning codes for registry builds.
//!
//! All codes are SCREAMING_SNAKE_CASE and stable across versions.

/// An item has an empty name.
pub const BUILD_ITEM_NAME_EMPTY: &str = "BUILD_ITEM_NAME_EMPTY";

/// Two items share a name.
pub const BUILD_ITEM_DUPLICATE: &str = "BUILD_ITEM_DUPLICATE";

/// An item declares no files.
pub const BUILD_ITEM_NO_FILES: &str = "BUILD_ITEM_NO_FILES";

/// A declared file or directory does not exist.
pub const BUILD_FILE_NOT_FOUND: &str = "BUILD_FILE_NOT_FOUND";

/// Two files of one item would be installed at the same path.
pub const BUILD_FILE_DUPLICATE: &str = "BUILD_FILE_DUPLICATE";

/// A file is declared by more than one item.
pub const BUILD_FILE_SHARED: &str = "BUILD_FILE_SHARED";

/// A source file could not be read.
pub const BUILD_FILE_READ_FAILED: &str = "BUILD_FILE_READ_FAILED";

/// One or more imports of a file failed to resolve.
pub const BUILD_RESOLVE_FAILED: &str = "BUILD_RESOLVE_FAILED";

/// Items depend on each other in a cycle and cycles are errors.
pub const BUILD_DEPENDENCY_CYCLE: &str = "BUILD_DEPENDENCY_CYCLE";

/// Warning: a file has no language plugin.
pub const FILE_SKIPPED: &str = "FILE_SKIPPED";

/// Warning: a local import points at a file no item declares.
pub const UNOWNED_LOCAL_DEPENDENCY: &str = "UNOWNED_LOCAL_DEPENDENCY";

/// Warning: items depend on each other in a cycle.
pub const DEPENDENCY_CYCLE: &str = "DEPENDENCY_CYCLE";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_codes_are_screaming_snake_case() {
        let codes = [
            BUILD_ITEM_NAME_EMPTY,
            BUILD_ITEM_DUPLICATE,
            BUILD_ITEM_NO_FILES,
            BUILD_FILE_NOT_FOUND,
            BUILD_FILE_DUPLICATE,
            BUILD_FILE_SHARED,
            BUILD_FILE_READ_FAILED,
            BUILD_RESOLVE_FAILED,
            BUILD_DEPENDENCY_CYCLE,
            FILE_SKIPPED,
            UNOWNED_LOCAL_DEPENDENCY,
            DEPENDENCY_CYCLE,
        ];

        for code in codes {
            assert!(
                code.chars().all(|c| c.is_uppercase() || c == '_'),
                "Code '{code}' should be SCREAMING_SNAKE_CASE"
            );
        }
    }
}
