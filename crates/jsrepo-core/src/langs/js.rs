//! JavaScript/TypeScript import scanner.
//!
//! Scans source code for import, re-export, dynamic import and require
//! specifiers without full parsing. Comments and string literals are
//! skipped so specifiers are only taken from statement position.

use super::{
    has_extension, DynamicImport, Extraction, ImportKind, ImportSpecifier, Language, LangError,
    LanguageOptions,
};
use crate::transform::ImportSyntax;
use std::collections::HashSet;

/// File extensions handled by the script plugin.
pub const SCRIPT_EXTENSIONS: &[&str] = &[".js", ".ts", ".jsx", ".tsx", ".mjs", ".cjs", ".mts", ".cts"];

/// JavaScript and TypeScript.
#[derive(Debug, Clone, Copy, Default)]
pub struct Js;

impl Language for Js {
    fn name(&self) -> &'static str {
        "javascript"
    }

    fn can_resolve_dependencies(&self, file_name: &str) -> bool {
        has_extension(file_name, SCRIPT_EXTENSIONS)
    }

    fn extract_imports(
        &self,
        code: &str,
        _opts: &LanguageOptions,
    ) -> Result<Extraction, LangError> {
        Ok(scan_script(code))
    }

    fn import_syntaxes(&self) -> &'static [ImportSyntax] {
        &[ImportSyntax::Script]
    }
}

/// Scan script source for import specifiers.
///
/// Returns imports in first-appearance order, deduplicated by `raw`, plus
/// every dynamic `import()` whose argument is not a plain string.
#[must_use]
pub fn scan_script(source: &str) -> Extraction {
    let chars: Vec<char> = source.chars().collect();
    let mut scanner = Scanner {
        chars: &chars,
        i: 0,
        line: 1,
    };
    let mut out = Extraction::default();
    let mut seen = HashSet::new();

    while scanner.i < chars.len() {
        let c = chars[scanner.i];

        if c == '\n' {
            scanner.line += 1;
            scanner.i += 1;
            continue;
        }
        if scanner.skip_comment() {
            continue;
        }
        if c == '"' || c == '\'' {
            scanner.read_quoted();
            continue;
        }
        if c == '`' {
            scanner.skip_template();
            continue;
        }

        let start_line = scanner.line;
        let keyword = ["import", "export", "require"]
            .into_iter()
            .find(|kw| matches_keyword(&chars, scanner.i, kw));

        let Some(keyword) = keyword else {
            scanner.i += 1;
            continue;
        };

        let keyword_start = scanner.i;
        scanner.i += keyword.len();
        let found = match keyword {
            "import" => scanner.scan_import(),
            "export" => scanner.scan_export_from(),
            _ => scanner.scan_require_call(),
        };

        match found {
            Some(Found::Specifier(spec, kind)) => {
                if !spec.is_empty() && seen.insert(spec.clone()) {
                    out.imports.push(ImportSpecifier::new(spec, kind, start_line));
                }
            }
            Some(Found::NonLiteral(expression)) => {
                out.unresolvable_dynamic.push(DynamicImport {
                    expression,
                    line: start_line,
                });
            }
            None => {
                // Rescan right after the keyword; the statement may hold
                // another match (e.g. `import x = require("y")`).
                scanner.i = keyword_start + keyword.len();
                scanner.line = start_line;
            }
        }
    }

    out
}

enum Found {
    Specifier(String, ImportKind),
    NonLiteral(String),
}

enum Template {
    Literal(String),
    Interpolated,
}

struct Scanner<'a> {
    chars: &'a [char],
    i: usize,
    line: u32,
}

impl Scanner<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.i).copied()
    }

    fn at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.i + offset).copied()
    }

    /// Skip a comment starting at the cursor. Returns true if one was skipped.
    fn skip_comment(&mut self) -> bool {
        match (self.peek(), self.at(1)) {
            (Some('/'), Some('/')) => {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.i += 1;
                }
                true
            }
            (Some('/'), Some('*')) => {
                self.i += 2;
                while self.i < self.chars.len()
                    && !(self.chars[self.i] == '*' && self.at(1) == Some('/'))
                {
                    if self.chars[self.i] == '\n' {
                        self.line += 1;
                    }
                    self.i += 1;
                }
                self.i = (self.i + 2).min(self.chars.len());
                true
            }
            _ => false,
        }
    }

    /// Skip whitespace and comments.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some('\n') => {
                    self.line += 1;
                    self.i += 1;
                }
                Some(c) if c.is_whitespace() => self.i += 1,
                Some('/') if self.skip_comment() => {}
                _ => return,
            }
        }
    }

    /// Read a `"` or `'` string at the cursor. Returns `None` if unterminated.
    fn read_quoted(&mut self) -> Option<String> {
        let quote = self.peek()?;
        self.i += 1;
        let mut value = String::new();
        while let Some(c) = self.peek() {
            match c {
                '\\' => {
                    if let Some(next) = self.at(1) {
                        value.push(next);
                    }
                    self.i += 2;
                }
                '\n' => return None,
                c if c == quote => {
                    self.i += 1;
                    return Some(value);
                }
                c => {
                    value.push(c);
                    self.i += 1;
                }
            }
        }
        None
    }

    /// Read a template literal at the cursor.
    fn read_template(&mut self) -> Template {
        let start = self.i;
        self.i += 1;
        let mut interpolated = false;
        while let Some(c) = self.peek() {
            match c {
                '\\' => self.i += 2,
                '`' => {
                    self.i += 1;
                    break;
                }
                '$' if self.at(1) == Some('{') => {
                    interpolated = true;
                    self.i += 2;
                    self.skip_balanced('{', '}');
                }
                c => {
                    if c == '\n' {
                        self.line += 1;
                    }
                    self.i += 1;
                }
            }
        }
        let end = self.i.min(self.chars.len());
        if interpolated {
            Template::Interpolated
        } else {
            let inner_end = end.saturating_sub(1).max(start + 1);
            Template::Literal(self.chars[start + 1..inner_end].iter().collect())
        }
    }

    fn skip_template(&mut self) {
        let _ = self.read_template();
    }

    /// Skip to just past the `close` matching an already-consumed `open`.
    fn skip_balanced(&mut self, open: char, close: char) {
        let mut depth = 1usize;
        while let Some(c) = self.peek() {
            if self.skip_comment() {
                continue;
            }
            match c {
                '"' | '\'' => {
                    let _ = self.read_quoted();
                }
                '`' => self.skip_template(),
                '\n' => {
                    self.line += 1;
                    self.i += 1;
                }
                c if c == open => {
                    depth += 1;
                    self.i += 1;
                }
                c if c == close => {
                    self.i += 1;
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => self.i += 1,
            }
        }
    }

    /// Read a string literal (quoted, or a template without substitutions).
    fn read_string_literal(&mut self) -> Option<String> {
        match self.peek()? {
            '"' | '\'' => self.read_quoted(),
            '`' => match self.read_template() {
                Template::Literal(s) => Some(s),
                Template::Interpolated => None,
            },
            _ => None,
        }
    }

    /// After `import`: dynamic import, side-effect import or `... from "x"`.
    fn scan_import(&mut self) -> Option<Found> {
        self.skip_trivia();

        match self.peek()? {
            // import.meta
            '.' => None,
            '(' => {
                self.i += 1;
                Some(self.scan_dynamic_argument())
            }
            '"' | '\'' => self
                .read_quoted()
                .map(|spec| Found::Specifier(spec, ImportKind::Static)),
            _ => self
                .scan_until_from()
                .map(|spec| Found::Specifier(spec, ImportKind::Static)),
        }
    }

    /// Classify the argument of `import(`; the cursor is just past `(`.
    fn scan_dynamic_argument(&mut self) -> Found {
        self.skip_trivia();
        let arg_start = self.i;
        let arg_line = self.line;

        if matches!(self.peek(), Some('"' | '\'' | '`')) {
            if let Some(spec) = self.read_string_literal() {
                self.skip_trivia();
                if matches!(self.peek(), Some(')' | ',')) {
                    self.skip_balanced('(', ')');
                    return Found::Specifier(spec, ImportKind::Dynamic);
                }
            }
        }

        self.i = arg_start;
        self.line = arg_line;
        self.skip_balanced('(', ')');
        let arg_end = self.i.saturating_sub(1).max(arg_start);
        let expression: String = self.chars[arg_start..arg_end].iter().collect();
        Found::NonLiteral(expression.trim().to_string())
    }

    /// Scan an import clause up to `from "x"`.
    fn scan_until_from(&mut self) -> Option<String> {
        let limit = self.i + 1000;
        while self.i < self.chars.len() && self.i < limit {
            self.skip_trivia();
            let c = self.peek()?;

            if matches_keyword(self.chars, self.i, "from") {
                self.i += 4;
                self.skip_trivia();
                return match self.peek()? {
                    '"' | '\'' => self.read_quoted(),
                    _ => None,
                };
            }

            match c {
                '{' => {
                    self.i += 1;
                    self.skip_balanced('{', '}');
                }
                ';' | '=' | '(' | ')' | '"' | '\'' | '`' => return None,
                _ => self.i += 1,
            }
        }
        None
    }

    /// After `export`: `{ ... } from "x"` or `* [as ns] from "x"`.
    fn scan_export_from(&mut self) -> Option<Found> {
        self.skip_trivia();
        if matches_keyword(self.chars, self.i, "type") {
            self.i += 4;
            self.skip_trivia();
        }

        match self.peek()? {
            '{' => {
                self.i += 1;
                self.skip_balanced('{', '}');
            }
            '*' => {
                self.i += 1;
                self.skip_trivia();
                if matches_keyword(self.chars, self.i, "as") {
                    self.i += 2;
                    self.skip_trivia();
                    while self
                        .peek()
                        .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
                    {
                        self.i += 1;
                    }
                }
            }
            _ => return None,
        }

        self.skip_trivia();
        if !matches_keyword(self.chars, self.i, "from") {
            return None;
        }
        self.i += 4;
        self.skip_trivia();
        self.read_quoted()
            .map(|spec| Found::Specifier(spec, ImportKind::ReExport))
    }

    /// After `require`: `("x")`.
    fn scan_require_call(&mut self) -> Option<Found> {
        self.skip_trivia();
        if self.peek()? != '(' {
            return None;
        }
        self.i += 1;
        self.skip_trivia();
        let spec = self.read_string_literal()?;
        self.skip_trivia();
        if self.peek() == Some(')') {
            self.i += 1;
            Some(Found::Specifier(spec, ImportKind::Require))
        } else {
            None
        }
    }
}

/// Check if chars at position match a keyword (with word boundary).
///
/// A keyword preceded by `.` is a property access, not a keyword.
fn matches_keyword(chars: &[char], pos: usize, keyword: &str) -> bool {
    let len = keyword.chars().count();

    if pos + len > chars.len() {
        return false;
    }

    if pos > 0 {
        let prev = chars[pos - 1];
        if prev.is_alphanumeric() || prev == '_' || prev == '$' || prev == '.' {
            return false;
        }
    }

    if !keyword.chars().zip(&chars[pos..pos + len]).all(|(a, &b)| a == b) {
        return false;
    }

    !chars
        .get(pos + len)
        .is_some_and(|&c| c.is_alphanumeric() || c == '_' || c == '$')
}
