//! Minimal HTML-like tag walker shared by the markup and component plugins.
//!
//! Produces start tags with their attributes. `<script>` and `<style>`
//! bodies are captured verbatim. Comments, closing tags and declarations are
//! skipped.

use super::js::scan_script;
use super::{Extraction, ImportKind, ImportSpecifier, LangError};

/// A start tag found in markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Element {
    /// Lowercased tag name.
    pub name: String,
    pub attrs: Vec<(String, Option<String>)>,
    /// Line of the `<` (1-indexed).
    pub line: u32,
    /// Raw text body of `<script>` / `<style>` and the line it starts on.
    pub body: Option<(String, u32)>,
}

impl Element {
    /// Value of an attribute (names compared case-insensitively).
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.as_deref())
    }
}

/// Elements whose content is raw text rather than markup.
const RAW_TEXT: &[&str] = &["script", "style"];

/// Walk `source` and collect every start tag.
///
/// With `skip_expressions`, `{...}` blocks in text are skipped so template
/// expressions like `{a<b}` are not mistaken for tags.
pub(crate) fn elements(
    source: &str,
    language: &'static str,
    skip_expressions: bool,
) -> Result<Vec<Element>, LangError> {
    let chars: Vec<char> = source.chars().collect();
    let len = chars.len();
    let mut out = Vec::new();
    let mut i = 0;
    let mut line: u32 = 1;

    while i < len {
        let c = chars[i];

        if c == '\n' {
            line += 1;
            i += 1;
            continue;
        }

        if skip_expressions && c == '{' {
            i = skip_braces(&chars, i, &mut line);
            continue;
        }

        if c != '<' {
            i += 1;
            continue;
        }

        // Comments
        if starts_with(&chars, i, "<!--") {
            i += 4;
            while i < len && !starts_with(&chars, i, "-->") {
                if chars[i] == '\n' {
                    line += 1;
                }
                i += 1;
            }
            i = (i + 3).min(len);
            continue;
        }

        // Closing tags, doctype, processing instructions
        if matches!(chars.get(i + 1), Some('/' | '!' | '?')) {
            while i < len && chars[i] != '>' {
                if chars[i] == '\n' {
                    line += 1;
                }
                i += 1;
            }
            i += 1;
            continue;
        }

        if !chars.get(i + 1).is_some_and(char::is_ascii_alphabetic) {
            i += 1;
            continue;
        }

        let tag_line = line;
        i += 1;
        let name_start = i;
        while i < len && is_name_char(chars[i]) {
            i += 1;
        }
        let name: String = chars[name_start..i].iter().collect::<String>().to_ascii_lowercase();

        let (attrs, self_closing, end) = parse_attributes(&chars, i, &mut line);
        i = end;

        let mut element = Element {
            name,
            attrs,
            line: tag_line,
            body: None,
        };

        if !self_closing && RAW_TEXT.contains(&element.name.as_str()) {
            let close = format!("</{}", element.name);
            let body_start = i;
            let body_line = line;
            while i < len && !starts_with_ignore_case(&chars, i, &close) {
                if chars[i] == '\n' {
                    line += 1;
                }
                i += 1;
            }
            if i >= len {
                return Err(LangError::Parse {
                    language,
                    message: format!("unterminated <{}> on line {tag_line}", element.name),
                });
            }
            element.body = Some((chars[body_start..i].iter().collect(), body_line));
            while i < len && chars[i] != '>' {
                i += 1;
            }
            i += 1;
        }

        out.push(element);
    }

    Ok(out)
}

/// Union the imports of every `<script>` block of a component file.
///
/// A `src` attribute on `<script>` or `<style>` is recorded as a markup
/// reference.
pub(crate) fn extract_component(
    source: &str,
    language: &'static str,
    skip_expressions: bool,
) -> Result<Extraction, LangError> {
    let mut out = Extraction::default();

    for element in elements(source, language, skip_expressions)? {
        if element.name != "script" && element.name != "style" {
            continue;
        }
        if let Some(src) = element.attr("src") {
            out.merge(Extraction {
                imports: vec![ImportSpecifier::new(src, ImportKind::MarkupSrc, element.line)],
                unresolvable_dynamic: Vec::new(),
            });
        } else if element.name == "script" {
            if let Some((body, line)) = &element.body {
                out.merge(scan_script(body).offset_lines(line - 1));
            }
        }
    }

    Ok(out)
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.')
}

fn starts_with(chars: &[char], pos: usize, needle: &str) -> bool {
    needle
        .chars()
        .enumerate()
        .all(|(j, n)| chars.get(pos + j) == Some(&n))
}

fn starts_with_ignore_case(chars: &[char], pos: usize, needle: &str) -> bool {
    needle
        .chars()
        .enumerate()
        .all(|(j, n)| chars.get(pos + j).is_some_and(|c| c.eq_ignore_ascii_case(&n)))
}

/// Skip a balanced `{...}` block starting at `pos`; returns the index after it.
fn skip_braces(chars: &[char], pos: usize, line: &mut u32) -> usize {
    let mut depth = 0usize;
    let mut i = pos;
    while i < chars.len() {
        match chars[i] {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            '\n' => *line += 1,
            _ => {}
        }
        i += 1;
    }
    i
}

/// Parse attributes up to the end of a start tag.
///
/// Returns the attributes, whether the tag self-closes, and the index just
/// past the closing `>`.
fn parse_attributes(
    chars: &[char],
    start: usize,
    line: &mut u32,
) -> (Vec<(String, Option<String>)>, bool, usize) {
    let len = chars.len();
    let mut attrs = Vec::new();
    let mut i = start;

    let skip_ws = |i: &mut usize, line: &mut u32| {
        while *i < len && chars[*i].is_whitespace() {
            if chars[*i] == '\n' {
                *line += 1;
            }
            *i += 1;
        }
    };

    loop {
        skip_ws(&mut i, line);
        if i >= len {
            return (attrs, false, len);
        }
        match chars[i] {
            '>' => return (attrs, false, i + 1),
            '/' if chars.get(i + 1) == Some(&'>') => return (attrs, true, i + 2),
            '/' => {
                i += 1;
                continue;
            }
            '{' => {
                // Svelte shorthand attribute `{value}` or spread `{...props}`
                i = skip_braces(chars, i, line);
                continue;
            }
            _ => {}
        }

        let name_start = i;
        while i < len && !chars[i].is_whitespace() && !matches!(chars[i], '=' | '>' | '/') {
            i += 1;
        }
        let name: String = chars[name_start..i].iter().collect();

        skip_ws(&mut i, line);
        if i < len && chars[i] == '=' {
            i += 1;
            skip_ws(&mut i, line);
            let value = match chars.get(i) {
                Some(&q) if q == '"' || q == '\'' => {
                    i += 1;
                    let value_start = i;
                    while i < len && chars[i] != q {
                        if chars[i] == '\n' {
                            *line += 1;
                        }
                        i += 1;
                    }
                    let value: String = chars[value_start..i.min(len)].iter().collect();
                    i += 1;
                    value
                }
                Some('{') => {
                    let value_start = i;
                    i = skip_braces(chars, i, line);
                    chars[value_start..i].iter().collect()
                }
                _ => {
                    let value_start = i;
                    while i < len && !chars[i].is_whitespace() && chars[i] != '>' {
                        i += 1;
                    }
                    chars[value_start..i].iter().collect()
                }
            };
            attrs.push((name, Some(value)));
        } else {
            attrs.push((name, None));
        }
    }
}
