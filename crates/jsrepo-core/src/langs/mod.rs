//! Language plugins.
//!
//! Each plugin recognizes a set of file names, extracts raw import
//! specifiers from source text and describes how those specifiers may be
//! rewritten. Plugins are selected first-match by file name; files no plugin
//! claims are skipped by the build.

mod css;
mod html;
mod js;
mod markup;
mod svelte;
mod vue;

pub use css::Css;
pub use html::Html;
pub use js::{scan_script, Js};
pub use svelte::Svelte;
pub use vue::Vue;

use crate::pkg::{Ecosystem, PackageJson};
use crate::resolver::{resolve_imports, ResolveError, ResolveOptions, ResolvedImports, ResolveWarning};
use crate::transform::{
    build_transforms, ImportSyntax, ImportTransform, TransformError, TransformTarget,
};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// How an import specifier was written in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportKind {
    /// `import x from "y"`, `import "y"`, `import type { T } from "y"`
    Static,
    /// `export { x } from "y"`, `export * from "y"`
    ReExport,
    /// `import("y")` with a literal argument
    Dynamic,
    /// `require("y")`
    Require,
    /// `<script src="y">`
    MarkupSrc,
    /// `<link rel="stylesheet" href="y">`
    MarkupHref,
    /// `@import`, `@use`, `@forward`
    StyleImport,
    /// Tailwind `@plugin`, `@config`, `@reference`
    StyleDirective,
}

impl ImportKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::ReExport => "re_export",
            Self::Dynamic => "dynamic",
            Self::Require => "require",
            Self::MarkupSrc => "markup_src",
            Self::MarkupHref => "markup_href",
            Self::StyleImport => "style_import",
            Self::StyleDirective => "style_directive",
        }
    }
}

/// Import specifier found in source code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpecifier {
    /// Specifier exactly as found.
    pub raw: String,
    pub kind: ImportKind,
    /// Line number (1-indexed, best-effort).
    pub line: u32,
}

impl ImportSpecifier {
    #[must_use]
    pub fn new(raw: impl Into<String>, kind: ImportKind, line: u32) -> Self {
        Self {
            raw: raw.into(),
            kind,
            line,
        }
    }
}

/// A dynamic `import()` whose argument is not a string literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicImport {
    /// Source text of the argument, trimmed.
    pub expression: String,
    pub line: u32,
}

/// Result of extracting imports from one source text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Specifiers in first-appearance order, deduplicated by `raw`.
    pub imports: Vec<ImportSpecifier>,
    /// Dynamic imports that cannot be resolved statically.
    pub unresolvable_dynamic: Vec<DynamicImport>,
}

impl Extraction {
    /// Append imports from another extraction, skipping duplicates.
    pub fn merge(&mut self, other: Extraction) {
        let mut seen: HashSet<String> = self.imports.iter().map(|i| i.raw.clone()).collect();
        for import in other.imports {
            if seen.insert(import.raw.clone()) {
                self.imports.push(import);
            }
        }
        self.unresolvable_dynamic.extend(other.unresolvable_dynamic);
    }

    /// Shift every line number by `offset` lines.
    #[must_use]
    pub fn offset_lines(mut self, offset: u32) -> Self {
        for import in &mut self.imports {
            import.line += offset;
        }
        for dynamic in &mut self.unresolvable_dynamic {
            dynamic.line += offset;
        }
        self
    }
}

/// Options affecting extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageOptions {
    /// Treat Tailwind `@plugin`, `@config` and `@reference` as imports.
    pub allow_tailwind_directives: bool,
}

impl Default for LanguageOptions {
    fn default() -> Self {
        Self {
            allow_tailwind_directives: true,
        }
    }
}

/// A package a plugin needs in the project to handle its files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerRequirement {
    pub package: &'static str,
    pub feature: &'static str,
}

impl PeerRequirement {
    /// Check the requirement against a project's package.json.
    ///
    /// # Errors
    /// Returns `MissingPeerDependency` when the package is not declared.
    pub fn check(&self, manifest: Option<&PackageJson>) -> Result<(), LangError> {
        if manifest.is_some_and(|pkg| pkg.has_dependency(self.package)) {
            Ok(())
        } else {
            Err(LangError::MissingPeerDependency {
                package: self.package.to_string(),
                feature: self.feature.to_string(),
            })
        }
    }
}

/// Language plugin errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LangError {
    #[error("missing peer dependency '{package}' required for {feature}")]
    MissingPeerDependency { package: String, feature: String },

    #[error("failed to parse {language} source: {message}")]
    Parse {
        language: &'static str,
        message: String,
    },
}

impl LangError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingPeerDependency { .. } => "MISSING_PEER_DEPENDENCY",
            Self::Parse { .. } => "LANG_PARSE_FAILED",
        }
    }
}

/// A source language the build understands.
pub trait Language: Send + Sync + fmt::Debug {
    /// Short, stable plugin name.
    fn name(&self) -> &'static str;

    /// Whether this plugin handles `file_name`.
    fn can_resolve_dependencies(&self, file_name: &str) -> bool;

    /// Extract raw import specifiers from source text.
    fn extract_imports(&self, code: &str, opts: &LanguageOptions)
        -> Result<Extraction, LangError>;

    /// Framework-intrinsic packages never reported as dependencies.
    fn do_not_install(&self) -> &'static [&'static str] {
        &[]
    }

    /// Package the project must declare for this plugin to run.
    fn peer_requirement(&self) -> Option<PeerRequirement> {
        None
    }

    /// Import positions this language writes specifiers in.
    fn import_syntaxes(&self) -> &'static [ImportSyntax];

    /// Build the rewrites that retarget `imports` in this language's source.
    ///
    /// # Errors
    /// Returns `Pattern` if a rewrite pattern fails to compile.
    fn transform_imports(
        &self,
        imports: &[TransformTarget],
    ) -> Result<Vec<ImportTransform>, TransformError> {
        build_transforms(self.import_syntaxes(), imports)
    }

    /// Whether dependencies from `ecosystem` can be installed for this language.
    fn can_install_dependencies(&self, ecosystem: Ecosystem) -> bool {
        ecosystem == Ecosystem::Js
    }
}

/// The built-in plugins in selection order.
#[must_use]
pub fn default_languages() -> Vec<Box<dyn Language>> {
    vec![
        Box::new(Js),
        Box::new(Css),
        Box::new(Html),
        Box::new(Svelte),
        Box::new(Vue),
    ]
}

/// Select the first plugin that handles `file_name`.
#[must_use]
pub fn select_language<'a>(
    languages: &'a [Box<dyn Language>],
    file_name: &str,
) -> Option<&'a dyn Language> {
    languages
        .iter()
        .find(|lang| lang.can_resolve_dependencies(file_name))
        .map(AsRef::as_ref)
}

/// Check whether `file_name` ends with one of `extensions` (case-insensitive).
pub(crate) fn has_extension(file_name: &str, extensions: &[&str]) -> bool {
    let lower = file_name.to_ascii_lowercase();
    extensions.iter().any(|ext| lower.ends_with(ext))
}

/// Extract the imports of `code` and resolve them.
///
/// The plugin's `do_not_install` list is added to the caller's exclusions;
/// non-literal dynamic imports become warnings.
///
/// # Errors
/// Returns a parse error from the plugin, or every hard resolution failure.
pub async fn resolve_dependencies(
    lang: &dyn Language,
    code: &str,
    lang_opts: &LanguageOptions,
    opts: &ResolveOptions<'_>,
) -> Result<ResolvedImports, DependencyError> {
    let extraction = lang.extract_imports(code, lang_opts)?;

    let mut do_not_install = opts.do_not_install.clone();
    do_not_install.extend(lang.do_not_install().iter().map(|s| (*s).to_string()));
    let opts = ResolveOptions {
        do_not_install,
        ..opts.clone()
    };

    let mut resolved = resolve_imports(&extraction.imports, &opts)
        .await
        .map_err(DependencyError::Resolve)?;
    resolved.warnings.extend(
        extraction
            .unresolvable_dynamic
            .into_iter()
            .map(|d| ResolveWarning::UnresolvableDynamicImport {
                expression: d.expression,
                line: d.line,
            }),
    );
    Ok(resolved)
}

/// Failure of `resolve_dependencies`.
#[derive(Error, Debug)]
pub enum DependencyError {
    #[error(transparent)]
    Lang(#[from] LangError),

    #[error("{} import(s) failed to resolve", .0.len())]
    Resolve(Vec<ResolveError>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_first_match() {
        let langs = default_languages();
        assert_eq!(select_language(&langs, "button.tsx").unwrap().name(), "javascript");
        assert_eq!(select_language(&langs, "styles.scss").unwrap().name(), "css");
        assert_eq!(select_language(&langs, "index.html").unwrap().name(), "html");
        assert_eq!(select_language(&langs, "Button.svelte").unwrap().name(), "svelte");
        assert_eq!(select_language(&langs, "Button.vue").unwrap().name(), "vue");
        assert!(select_language(&langs, "README.md").is_none());
        assert!(select_language(&langs, "logo.png").is_none());
    }

    #[test]
    fn test_exactly_one_plugin_per_file() {
        let langs = default_languages();
        for file in ["a.ts", "a.mjs", "a.cts", "a.css", "a.less", "a.htm", "a.svelte", "a.vue"] {
            let count = langs
                .iter()
                .filter(|l| l.can_resolve_dependencies(file))
                .count();
            assert_eq!(count, 1, "{file} should match exactly one plugin");
        }
    }

    #[test]
    fn test_merge_dedups() {
        let mut a = Extraction {
            imports: vec![ImportSpecifier::new("./a", ImportKind::Static, 1)],
            unresolvable_dynamic: vec![],
        };
        let b = Extraction {
            imports: vec![
                ImportSpecifier::new("./a", ImportKind::Static, 3),
                ImportSpecifier::new("./b", ImportKind::Static, 4),
            ],
            unresolvable_dynamic: vec![DynamicImport {
                expression: "name".into(),
                line: 5,
            }],
        };
        a.merge(b);
        let raws: Vec<_> = a.imports.iter().map(|i| i.raw.as_str()).collect();
        assert_eq!(raws, vec!["./a", "./b"]);
        assert_eq!(a.unresolvable_dynamic.len(), 1);
    }

    #[test]
    fn test_peer_requirement_check() {
        let req = PeerRequirement {
            package: "svelte",
            feature: "Svelte components",
        };
        let with = PackageJson::parse(
            std::path::Path::new("package.json"),
            r#"{"devDependencies": {"svelte": "^5.0.0"}}"#,
        )
        .unwrap();
        let without = PackageJson::default();

        assert!(req.check(Some(&with)).is_ok());
        let err = req.check(Some(&without)).unwrap_err();
        assert_eq!(
            err,
            LangError::MissingPeerDependency {
                package: "svelte".into(),
                feature: "Svelte components".into()
            }
        );
        assert!(err.to_string().contains("'svelte'"));
        assert!(req.check(None).is_err());
    }

    #[test]
    fn test_can_install_js_only() {
        for lang in default_languages() {
            assert!(lang.can_install_dependencies(Ecosystem::Js));
        }
    }
}
