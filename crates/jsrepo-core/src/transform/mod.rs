//! Import specifier rewriting for consumer projects.
//!
//! When an item is added to a consumer project, its files land in the
//! directory the consumer configured for the item's type. Imports that point
//! at other registry items are rewritten to the consumer's alias
//! (`$lib/components/ui/button`) or to a relative path from the file being
//! written.
//!
//! Rewriting is textual: each original specifier is matched only between
//! quote delimiters in an import position of the file's language.

use crate::langs::Language;
use jsrepo_util::path::{relative_path, to_slash};
use regex_lite::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extensions dropped from rewritten specifiers when the original omitted them.
const SCRIPT_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs", "mts", "cts"];

/// Positions in which a language writes import specifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportSyntax {
    /// `from "x"`, `import "x"`, `import("x")`, `require("x")`
    Script,
    /// `@import "x"`, `@import url(x)`, `@use "x"`, `@forward "x"` and Tailwind directives
    Stylesheet,
    /// `src="x"`, `href="x"`
    Markup,
}

/// An original specifier and what it should become.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformTarget {
    pub from: String,
    pub to: String,
}

/// A single pattern replacement.
#[derive(Debug, Clone)]
pub struct ImportTransform {
    pub pattern: Regex,
    pub replacement: String,
}

impl ImportTransform {
    /// Apply the replacement everywhere the pattern matches.
    #[must_use]
    pub fn apply(&self, code: &str) -> String {
        self.pattern
            .replace_all(code, self.replacement.as_str())
            .into_owned()
    }
}

impl ImportSyntax {
    /// Text leading up to the opening quote of a specifier.
    fn prefix(self) -> &'static str {
        match self {
            Self::Script => r"\bfrom\s*|\bimport\s*|\bimport\s*\(\s*|\brequire\s*\(\s*",
            Self::Stylesheet => {
                r"@(?:import|use|forward|plugin|config|reference)\s+(?:\([^)]*\)\s*)?(?:url\(\s*)?|,\s*"
            }
            Self::Markup => r"\b(?:src|href)\s*=\s*",
        }
    }

    fn quotes(self) -> &'static [char] {
        match self {
            Self::Script => &['"', '\'', '`'],
            Self::Stylesheet | Self::Markup => &['"', '\''],
        }
    }
}

/// Build the transforms rewriting each target in the given syntaxes.
///
/// Each quote kind gets its own pattern so a specifier only matches between
/// a matching pair.
///
/// # Errors
/// Returns `Pattern` if a rewrite pattern fails to compile.
pub fn build_transforms(
    syntaxes: &[ImportSyntax],
    targets: &[TransformTarget],
) -> Result<Vec<ImportTransform>, TransformError> {
    let mut transforms = Vec::new();

    for target in targets {
        let spec = regex_lite::escape(&target.from);
        let to = target.to.replace('$', "$$");

        for syntax in syntaxes {
            let prefix = syntax.prefix();
            for q in syntax.quotes() {
                transforms.push(compile(
                    format!("({prefix}){q}{spec}{q}"),
                    format!("${{1}}{q}{to}{q}"),
                )?);
            }

            if *syntax == ImportSyntax::Stylesheet {
                transforms.push(compile(
                    format!(r"(@import\s+url\(\s*){spec}(\s*\))"),
                    format!("${{1}}{to}${{2}}"),
                )?);
            }
        }
    }

    Ok(transforms)
}

fn compile(pattern: String, replacement: String) -> Result<ImportTransform, TransformError> {
    match Regex::new(&pattern) {
        Ok(regex) => Ok(ImportTransform {
            pattern: regex,
            replacement,
        }),
        Err(e) => Err(TransformError::Pattern {
            pattern,
            message: e.to_string(),
        }),
    }
}

/// Where the consumer keeps items of one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemPath {
    /// Directory items of this type are written to.
    pub path: PathBuf,
    /// Import alias pointing at `path`, if the consumer has one.
    pub alias: Option<String>,
}

/// A local import of one manifest file, with its owning item known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalImport {
    /// Specifier as written in the source.
    pub import: String,
    /// Owning item of the imported file.
    pub item: String,
    /// Type of the owning item.
    pub item_type: String,
    /// Imported file, relative to its item.
    pub file: String,
}

/// Options for [`transform_imports`].
pub struct TransformOptions<'a> {
    /// Path the transformed file will be written to.
    pub target_path: &'a Path,
    /// Consumer location for an item name and type.
    pub get_item_path: &'a dyn Fn(&str, &str) -> Option<ItemPath>,
}

/// Import transformation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("no path configured for item '{item}' of type '{item_type}' (imported as '{import}')")]
    NoItemPath {
        item: String,
        item_type: String,
        import: String,
    },

    #[error("invalid rewrite pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
}

impl TransformError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoItemPath { .. } => "TRANSFORM_NO_ITEM_PATH",
            Self::Pattern { .. } => "TRANSFORM_PATTERN_INVALID",
        }
    }
}

/// Compute the consumer-side specifier for one local import.
#[must_use]
pub fn rewrite_specifier(import: &LocalImport, item_path: &ItemPath, target_path: &Path) -> String {
    let spec = match &item_path.alias {
        Some(alias) => format!("{}/{}", alias.trim_end_matches('/'), import.file),
        None => {
            let target_dir = target_path.parent().unwrap_or(Path::new(""));
            let rel = to_slash(&relative_path(target_dir, &item_path.path.join(&import.file)));
            if rel.starts_with("../") {
                rel
            } else {
                format!("./{rel}")
            }
        }
    };
    match_extension_style(&import.import, &spec)
}

/// Make `spec` follow the extension conventions of `original`.
///
/// Script extensions are dropped (and a trailing `/index` with them) when
/// the original had none; a differing script extension is replaced with the
/// original's (`./x.js` importing `x.ts`).
fn match_extension_style(original: &str, spec: &str) -> String {
    let Some((stem, _)) = split_script_extension(spec) else {
        return spec.to_string();
    };

    match split_script_extension(original) {
        Some((_, original_ext)) => format!("{stem}.{original_ext}"),
        None => {
            let keeps_index = original.ends_with("/index") || original == "index";
            match stem.strip_suffix("/index") {
                Some(dir) if !keeps_index && !dir.is_empty() && dir != "." && dir != ".." => {
                    dir.to_string()
                }
                _ => stem.to_string(),
            }
        }
    }
}

fn split_script_extension(spec: &str) -> Option<(&str, &str)> {
    let (stem, ext) = spec.rsplit_once('.')?;
    if ext.contains('/') || !SCRIPT_EXTENSIONS.contains(&ext) {
        return None;
    }
    Some((stem, ext))
}

/// Rewritten source and how many specifiers were replaced in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    pub code: String,
    pub replacements: usize,
}

/// Rewrite the local imports of `code` for the consumer's layout.
///
/// # Errors
/// Returns `NoItemPath` when the consumer has no location for an imported
/// item's type.
pub fn transform_imports(
    lang: &dyn Language,
    code: &str,
    imports: &[LocalImport],
    opts: &TransformOptions<'_>,
) -> Result<String, TransformError> {
    transform_imports_counted(lang, code, imports, opts).map(|out| out.code)
}

/// Like [`transform_imports`], also counting the specifiers replaced.
///
/// # Errors
/// Same as [`transform_imports`].
pub fn transform_imports_counted(
    lang: &dyn Language,
    code: &str,
    imports: &[LocalImport],
    opts: &TransformOptions<'_>,
) -> Result<TransformOutput, TransformError> {
    let mut finals: Vec<String> = Vec::new();
    let mut targets: Vec<TransformTarget> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for import in imports {
        if !seen.insert(import.import.as_str()) {
            continue;
        }
        let item_path = (opts.get_item_path)(&import.item, &import.item_type).ok_or_else(|| {
            TransformError::NoItemPath {
                item: import.item.clone(),
                item_type: import.item_type.clone(),
                import: import.import.clone(),
            }
        })?;
        let rewritten = rewrite_specifier(import, &item_path, opts.target_path);

        // Two phases through placeholders so one rewrite never feeds another.
        targets.push(TransformTarget {
            from: import.import.clone(),
            to: placeholder(finals.len()),
        });
        finals.push(rewritten);
    }

    let mut out = code.to_string();
    for transform in lang.transform_imports(&targets)? {
        out = transform.apply(&out);
    }
    let mut replacements = 0;
    for (i, rewritten) in finals.iter().enumerate() {
        let marker = placeholder(i);
        replacements += out.matches(marker.as_str()).count();
        out = out.replace(&marker, rewritten);
    }
    Ok(TransformOutput {
        code: out,
        replacements,
    })
}

fn placeholder(index: usize) -> String {
    format!("\u{0}jsrepo-import-{index}\u{0}")
}
