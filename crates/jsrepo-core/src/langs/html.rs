//! HTML plugin.

use super::js::scan_script;
use super::markup::{elements, Element};
use super::{
    has_extension, Extraction, ImportKind, ImportSpecifier, Language, LangError, LanguageOptions,
};
use crate::pkg::is_http_url;
use crate::transform::ImportSyntax;

/// Script `type` values that hold JavaScript.
const SCRIPT_TYPES: &[&str] = &["", "module", "text/javascript", "application/javascript"];

/// HTML documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct Html;

impl Language for Html {
    fn name(&self) -> &'static str {
        "html"
    }

    fn can_resolve_dependencies(&self, file_name: &str) -> bool {
        has_extension(file_name, &[".html", ".htm"])
    }

    fn extract_imports(
        &self,
        code: &str,
        _opts: &LanguageOptions,
    ) -> Result<Extraction, LangError> {
        let mut out = Extraction::default();

        for element in elements(code, self.name(), false)? {
            match element.name.as_str() {
                "script" => {
                    if let Some(src) = element.attr("src") {
                        push_reference(&mut out, src, ImportKind::MarkupSrc, element.line);
                    } else if is_javascript(&element) {
                        if let Some((body, line)) = &element.body {
                            out.merge(scan_script(body).offset_lines(line - 1));
                        }
                    }
                }
                "link" if is_stylesheet(&element) => {
                    if let Some(href) = element.attr("href") {
                        push_reference(&mut out, href, ImportKind::MarkupHref, element.line);
                    }
                }
                _ => {}
            }
        }

        Ok(out)
    }

    fn import_syntaxes(&self) -> &'static [ImportSyntax] {
        &[ImportSyntax::Markup, ImportSyntax::Script]
    }
}

/// Record a `src`/`href` reference unless it points off-site.
fn push_reference(out: &mut Extraction, value: &str, kind: ImportKind, line: u32) {
    let value = value.trim();
    if value.is_empty() || is_http_url(value) || value.starts_with("//") {
        return;
    }
    out.merge(Extraction {
        imports: vec![ImportSpecifier::new(value, kind, line)],
        unresolvable_dynamic: Vec::new(),
    });
}

fn is_javascript(element: &Element) -> bool {
    let ty = element.attr("type").unwrap_or("").trim().to_ascii_lowercase();
    SCRIPT_TYPES.contains(&ty.as_str())
}

fn is_stylesheet(element: &Element) -> bool {
    element.attr("rel").is_some_and(|rel| {
        rel.split_whitespace()
            .any(|r| r.eq_ignore_ascii_case("stylesheet"))
    })
}
