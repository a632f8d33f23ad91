//! Stylesheet plugin (CSS, SCSS, Sass, Less).
//!
//! Recognized references:
//! - `@import "x"`, `@import url(x)`, `@import "a", "b"` (SCSS lists),
//!   `@import (reference) "x"` (Less options)
//! - SCSS `@use` and `@forward` (built-in `sass:` modules are skipped)
//! - Tailwind `@plugin`, `@config`, `@reference` when
//!   `allow_tailwind_directives` is set
//!
//! Absolute http(s) URLs are never reported.

use super::{
    has_extension, Extraction, ImportKind, ImportSpecifier, Language, LangError, LanguageOptions,
};
use crate::pkg::is_http_url;
use crate::transform::ImportSyntax;
use std::collections::HashSet;

/// Stylesheets.
#[derive(Debug, Clone, Copy, Default)]
pub struct Css;

impl Language for Css {
    fn name(&self) -> &'static str {
        "css"
    }

    fn can_resolve_dependencies(&self, file_name: &str) -> bool {
        has_extension(file_name, &[".css", ".scss", ".sass", ".less"])
    }

    fn extract_imports(
        &self,
        code: &str,
        opts: &LanguageOptions,
    ) -> Result<Extraction, LangError> {
        Ok(scan_stylesheet(code, opts.allow_tailwind_directives))
    }

    fn import_syntaxes(&self) -> &'static [ImportSyntax] {
        &[ImportSyntax::Stylesheet]
    }
}

/// Scan stylesheet source for import references.
#[must_use]
pub fn scan_stylesheet(source: &str, allow_tailwind_directives: bool) -> Extraction {
    let chars: Vec<char> = source.chars().collect();
    let len = chars.len();
    let mut out = Extraction::default();
    let mut seen = HashSet::new();
    let mut line: u32 = 1;
    let mut i = 0;

    let mut record = |raw: String, kind: ImportKind, line: u32, out: &mut Extraction| {
        if raw.is_empty() || is_http_url(&raw) || raw.starts_with("//") {
            return;
        }
        if seen.insert(raw.clone()) {
            out.imports.push(ImportSpecifier::new(raw, kind, line));
        }
    };

    while i < len {
        match chars[i] {
            '\n' => {
                line += 1;
                i += 1;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < len && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    if chars[i] == '\n' {
                        line += 1;
                    }
                    i += 1;
                }
                i = (i + 2).min(len);
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < len && chars[i] != '\n' {
                    i += 1;
                }
            }
            '"' | '\'' => {
                let _ = read_quoted(&chars, &mut i);
            }
            '@' => {
                let at_line = line;
                i += 1;
                let name_start = i;
                while i < len && (chars[i].is_ascii_alphanumeric() || chars[i] == '-') {
                    i += 1;
                }
                let name: String = chars[name_start..i].iter().collect::<String>().to_ascii_lowercase();

                match name.as_str() {
                    "import" => loop {
                        skip_ws(&chars, &mut i, &mut line);
                        // Less import options: @import (reference) "x";
                        if chars.get(i) == Some(&'(') {
                            while i < len && chars[i] != ')' {
                                i += 1;
                            }
                            i += 1;
                            skip_ws(&chars, &mut i, &mut line);
                        }
                        let Some(raw) = read_reference(&chars, &mut i) else {
                            break;
                        };
                        record(raw, ImportKind::StyleImport, at_line, &mut out);
                        skip_ws(&chars, &mut i, &mut line);
                        if chars.get(i) == Some(&',') {
                            i += 1;
                        } else {
                            break;
                        }
                    },
                    "use" | "forward" => {
                        skip_ws(&chars, &mut i, &mut line);
                        if let Some(raw) = read_quoted(&chars, &mut i) {
                            if !raw.starts_with("sass:") {
                                record(raw, ImportKind::StyleImport, at_line, &mut out);
                            }
                        }
                    }
                    "plugin" | "config" | "reference" if allow_tailwind_directives => {
                        skip_ws(&chars, &mut i, &mut line);
                        if let Some(raw) = read_quoted(&chars, &mut i) {
                            record(raw, ImportKind::StyleDirective, at_line, &mut out);
                        }
                    }
                    _ => {}
                }
            }
            _ => i += 1,
        }
    }

    out
}

fn skip_ws(chars: &[char], i: &mut usize, line: &mut u32) {
    while *i < chars.len() && chars[*i].is_whitespace() {
        if chars[*i] == '\n' {
            *line += 1;
        }
        *i += 1;
    }
}

/// Read a quoted string at `i`; leaves `i` after the closing quote.
fn read_quoted(chars: &[char], i: &mut usize) -> Option<String> {
    let quote = *chars.get(*i)?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    *i += 1;
    let start = *i;
    while *i < chars.len() && chars[*i] != quote {
        if chars[*i] == '\n' {
            return None;
        }
        if chars[*i] == '\\' {
            *i += 1;
        }
        *i += 1;
    }
    let value: String = chars[start..(*i).min(chars.len())].iter().collect();
    *i += 1;
    Some(value)
}

/// Read `"x"`, `'x'`, `url(x)` or `url("x")`.
fn read_reference(chars: &[char], i: &mut usize) -> Option<String> {
    if let Some(value) = read_quoted(chars, i) {
        return Some(value);
    }

    let is_url = "url(".chars().enumerate().all(|(j, c)| {
        chars
            .get(*i + j)
            .is_some_and(|actual| actual.eq_ignore_ascii_case(&c))
    });
    if !is_url {
        return None;
    }
    *i += 4;
    while *i < chars.len() && chars[*i] == ' ' {
        *i += 1;
    }

    let value = if let Some(quoted) = read_quoted(chars, i) {
        quoted
    } else {
        let start = *i;
        while *i < chars.len() && chars[*i] != ')' && !chars[*i].is_whitespace() {
            *i += 1;
        }
        chars[start..*i].iter().collect()
    };

    while *i < chars.len() && chars[*i] != ')' {
        *i += 1;
    }
    *i += 1;
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raws(source: &str, tailwind: bool) -> Vec<String> {
        scan_stylesheet(source, tailwind)
            .imports
            .into_iter()
            .map(|i| i.raw)
            .collect()
    }

    #[test]
    fn test_import_forms() {
        let source = r#"
@import "./base.css";
@import './theme.css' layer(theme);
@import url(./reset.css);
@import url("./print.css") print;
@import url(https://fonts.googleapis.com/css?family=Inter);
@import "http://cdn.example.com/x.css";
@import "tailwindcss";
"#;
        assert_eq!(
            raws(source, true),
            vec![
                "./base.css",
                "./theme.css",
                "./reset.css",
                "./print.css",
                "tailwindcss"
            ]
        );
    }

    #[test]
    fn test_scss_use_forward_and_lists() {
        let source = r#"
@use "sass:math";
@use "./variables" as vars;
@forward "./mixins";
@import "a", "b";
// @import "commented";
/* @use "also-commented"; */
.btn { width: math.div(10px, 2); }
"#;
        assert_eq!(
            raws(source, true),
            vec!["./variables", "./mixins", "a", "b"]
        );
    }

    #[test]
    fn test_less_import_options() {
        assert_eq!(
            raws(r#"@import (reference) "./mixins.less";"#, true),
            vec!["./mixins.less"]
        );
    }

    #[test]
    fn test_tailwind_directives_toggle() {
        let source = r#"
@import "tailwindcss";
@plugin "@tailwindcss/typography";
@config "./tailwind.config.js";
@reference "../app.css";
@theme { --color-primary: red; }
@apply font-bold;
"#;
        let enabled = scan_stylesheet(source, true);
        let raws_on: Vec<_> = enabled.imports.iter().map(|i| i.raw.as_str()).collect();
        assert_eq!(
            raws_on,
            vec![
                "tailwindcss",
                "@tailwindcss/typography",
                "./tailwind.config.js",
                "../app.css"
            ]
        );
        assert_eq!(enabled.imports[1].kind, ImportKind::StyleDirective);
        assert_eq!(enabled.imports[1].line, 3);

        assert_eq!(raws(source, false), vec!["tailwindcss"]);
    }

    #[test]
    fn test_strings_and_urls_elsewhere_ignored() {
        let source = r#"
.a::before { content: "@import 'nope'"; }
.b { background: url(./img.png); }
"#;
        assert!(raws(source, true).is_empty());
    }
}
