//! Locating operation literals inside cell source text.
//!
//! A literal is either the whole cell (GraphQL cells) or a tagged fragment
//! embedded in host-language source: tagged template strings for the
//! JavaScript family, `gql!`/`graphql!` macro invocations for Rust.

use proc_macro2::LineColumn;
use syn::parse::Parser;
use syn::spanned::Spanned;
use syn::visit::Visit;
use syn::{LitStr, Macro};

use super::types::SourceSpan;

/// Template tags recognized in JavaScript-family sources.
const TEMPLATE_TAGS: &[&str] = &["gql", "graphql"];

/// Comment marker tagging a plain template string as GraphQL.
const COMMENT_TAG: &str = "/* GraphQL */";

/// Macro names recognized in Rust sources.
const MACRO_TAGS: &[&str] = &["gql", "graphql"];

/// A located literal, not yet parsed as GraphQL.
#[derive(Debug, Clone)]
pub(crate) struct Literal {
    /// Span of the literal's content within the cell.
    pub span: SourceSpan,
    /// Literal content. Same byte length as `span` for GraphQL and template
    /// literals; escaped Rust strings may differ.
    pub text: String,
    /// Set when the host source itself could not be scanned.
    pub error: Option<String>,
}

/// Host languages the extractor knows how to scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HostLanguage {
    GraphQl,
    JavaScript,
    Rust,
    Other,
}

impl HostLanguage {
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "graphql" | "gql" => HostLanguage::GraphQl,
            "javascript" | "typescript" | "javascriptreact" | "typescriptreact" | "js" | "ts"
            | "jsx" | "tsx" => HostLanguage::JavaScript,
            "rust" | "rs" => HostLanguage::Rust,
            _ => HostLanguage::Other,
        }
    }
}

/// Find every literal in `text`, in source order.
pub(crate) fn locate_literals(text: &str, language: HostLanguage) -> Vec<Literal> {
    match language {
        HostLanguage::GraphQl => {
            if text.trim().is_empty() {
                Vec::new()
            } else {
                vec![Literal {
                    span: SourceSpan::new(0, text.len()),
                    text: text.to_string(),
                    error: None,
                }]
            }
        }
        HostLanguage::JavaScript => scan_tagged_templates(text),
        HostLanguage::Rust => scan_rust_macros(text),
        HostLanguage::Other => Vec::new(),
    }
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// If a tag starts at `i`, return the index just past it.
fn match_tag(bytes: &[u8], i: usize) -> Option<usize> {
    let rest = &bytes[i..];
    if rest.starts_with(COMMENT_TAG.as_bytes()) {
        return Some(i + COMMENT_TAG.len());
    }
    if i > 0 && is_ident_byte(bytes[i - 1]) {
        return None;
    }
    TEMPLATE_TAGS.iter().find_map(|tag| {
        let end = i + tag.len();
        let boundary = bytes.get(end).is_none_or(|b| !is_ident_byte(*b));
        (rest.starts_with(tag.as_bytes()) && boundary).then_some(end)
    })
}

fn scan_tagged_templates(text: &str) -> Vec<Literal> {
    let bytes = text.as_bytes();
    let mut literals = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if let Some(after_tag) = match_tag(bytes, i) {
            let mut j = after_tag;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            if bytes.get(j) == Some(&b'`') {
                let (literal, next) = read_template(bytes, j + 1);
                literals.push(literal);
                i = next;
                continue;
            }
        }
        i += 1;
    }

    literals
}

/// Read a template body starting at `start` (just past the opening backtick).
///
/// Returns the literal and the index just past the closing backtick.
/// `${...}` interpolations are blanked to spaces so offsets stay aligned.
fn read_template(bytes: &[u8], start: usize) -> (Literal, usize) {
    let mut blanked: Vec<(usize, usize)> = Vec::new();
    let mut i = start;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => {
                let mut content = bytes[start..i].to_vec();
                for (from, to) in blanked {
                    content[from - start..to - start].fill(b' ');
                }
                let literal = Literal {
                    span: SourceSpan::new(start, i),
                    text: String::from_utf8_lossy(&content).into_owned(),
                    error: None,
                };
                return (literal, i + 1);
            }
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                let open = i;
                let mut depth = 0usize;
                i += 1;
                while i < bytes.len() {
                    match bytes[i] {
                        b'{' => depth += 1,
                        b'}' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
                let close = (i + 1).min(bytes.len());
                blanked.push((open, close));
                i = close;
            }
            _ => i += 1,
        }
    }

    let literal = Literal {
        span: SourceSpan::new(start, bytes.len()),
        text: String::from_utf8_lossy(&bytes[start..]).into_owned(),
        error: Some("unterminated template literal".to_string()),
    };
    (literal, bytes.len())
}

/// Byte offsets of the start of each line.
pub(crate) fn line_starts(text: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(text.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

/// Convert a 1-based line / 0-based char column to a byte offset.
pub(crate) fn offset_of(text: &str, starts: &[usize], line: usize, column: usize) -> usize {
    let Some(&line_start) = starts.get(line.saturating_sub(1)) else {
        return text.len();
    };
    let line_text = &text[line_start..];
    let within = line_text
        .char_indices()
        .nth(column)
        .map(|(i, _)| i)
        .unwrap_or(line_text.len());
    line_start + within
}

/// Visitor collecting the string argument of tagged macros.
struct MacroCollector<'a> {
    source: &'a str,
    starts: Vec<usize>,
    literals: Vec<Literal>,
}

impl MacroCollector<'_> {
    fn offset(&self, pos: LineColumn) -> usize {
        offset_of(self.source, &self.starts, pos.line, pos.column)
    }

    fn push_lit(&mut self, lit: &LitStr) {
        let start = self.offset(lit.span().start());
        let end = self.offset(lit.span().end());
        let token = self.source.get(start..end).unwrap_or_default();

        // Strip `"`, `r"` or `r#"` and the matching suffix.
        let (content_start, content_end) = match token.find('"') {
            Some(quote) => {
                let hashes = if token.starts_with('r') { quote - 1 } else { 0 };
                (start + quote + 1, end.saturating_sub(1 + hashes))
            }
            None => (start, end),
        };

        self.literals.push(Literal {
            span: SourceSpan::new(content_start, content_end.max(content_start)),
            text: lit.value(),
            error: None,
        });
    }
}

impl<'ast> Visit<'ast> for MacroCollector<'_> {
    fn visit_macro(&mut self, mac: &'ast Macro) {
        let tagged = mac
            .path
            .segments
            .last()
            .is_some_and(|seg| MACRO_TAGS.iter().any(|tag| seg.ident == *tag));

        if tagged {
            match mac.parse_body::<LitStr>() {
                Ok(lit) => self.push_lit(&lit),
                Err(e) => {
                    let span = mac.span();
                    let start = self.offset(span.start());
                    let end = self.offset(span.end());
                    self.literals.push(Literal {
                        span: SourceSpan::new(start, end.max(start)),
                        text: String::new(),
                        error: Some(format!("expected a string literal: {}", e)),
                    });
                }
            }
        }

        syn::visit::visit_macro(self, mac);
    }
}

fn scan_rust_macros(text: &str) -> Vec<Literal> {
    let mut collector = MacroCollector {
        source: text,
        starts: line_starts(text),
        literals: Vec::new(),
    };

    // Cells are either whole files or bare statement lists.
    if let Ok(file) = syn::parse_file(text) {
        collector.visit_file(&file);
    } else {
        match syn::Block::parse_within.parse_str(text) {
            Ok(stmts) => {
                for stmt in &stmts {
                    collector.visit_stmt(stmt);
                }
            }
            Err(e) => {
                return vec![Literal {
                    span: SourceSpan::new(0, text.len()),
                    text: String::new(),
                    error: Some(format!("invalid Rust source: {}", e)),
                }];
            }
        }
    }

    collector.literals.sort_by_key(|l| l.span.start);
    collector.literals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graphql_cell_is_one_literal() {
        let text = "query { a }";
        let literals = locate_literals(text, HostLanguage::GraphQl);
        assert_eq!(literals.len(), 1);
        assert_eq!(literals[0].span, SourceSpan::new(0, text.len()));
    }

    #[test]
    fn test_blank_graphql_cell() {
        assert!(locate_literals("  \n\t", HostLanguage::GraphQl).is_empty());
    }

    #[test]
    fn test_tagged_templates() {
        let text = "const a = gql`{ a }`;\nconst b = graphql `{ b }`;\nconst c = /* GraphQL */ `{ c }`;";
        let literals = locate_literals(text, HostLanguage::JavaScript);
        assert_eq!(literals.len(), 3);
        assert_eq!(literals[0].text, "{ a }");
        assert_eq!(&text[literals[0].span.start..literals[0].span.end], "{ a }");
        assert_eq!(literals[1].text, "{ b }");
        assert_eq!(literals[2].text, "{ c }");
    }

    #[test]
    fn test_tag_requires_word_boundary() {
        let text = "const x = mygql`{ a }`; const y = gqlx`{ b }`;";
        assert!(locate_literals(text, HostLanguage::JavaScript).is_empty());
    }

    #[test]
    fn test_interpolation_blanked() {
        let text = "gql`{ a ${Frag} }`";
        let literals = locate_literals(text, HostLanguage::JavaScript);
        assert_eq!(literals[0].text, "{ a         }");
        assert_eq!(literals[0].text.len(), literals[0].span.len());
    }

    #[test]
    fn test_unterminated_template() {
        let text = "gql`{ a }`; gql`{ b ";
        let literals = locate_literals(text, HostLanguage::JavaScript);
        assert_eq!(literals.len(), 2);
        assert!(literals[0].error.is_none());
        assert!(literals[1].error.is_some());
    }

    #[test]
    fn test_rust_macros_in_file() {
        let text = "fn main() {\n    let q = gql!(r#\"{ a }\"#);\n    let m = graphql!(\"{ b }\");\n}\n";
        let literals = locate_literals(text, HostLanguage::Rust);
        assert_eq!(literals.len(), 2);
        assert_eq!(literals[0].text, "{ a }");
        assert_eq!(&text[literals[0].span.start..literals[0].span.end], "{ a }");
        assert_eq!(&text[literals[1].span.start..literals[1].span.end], "{ b }");
    }

    #[test]
    fn test_rust_statement_list() {
        let text = "let q = gql!(\"{ a }\");\nprintln!(\"{}\", q);";
        let literals = locate_literals(text, HostLanguage::Rust);
        assert_eq!(literals.len(), 1);
        assert_eq!(literals[0].text, "{ a }");
    }

    #[test]
    fn test_rust_macro_without_string() {
        let text = "let q = gql!(42);";
        let literals = locate_literals(text, HostLanguage::Rust);
        assert_eq!(literals.len(), 1);
        assert!(literals[0].error.is_some());
    }

    #[test]
    fn test_invalid_rust_source() {
        let literals = locate_literals("fn (", HostLanguage::Rust);
        assert_eq!(literals.len(), 1);
        assert!(literals[0].error.as_deref().unwrap().contains("invalid Rust source"));
    }

    #[test]
    fn test_offset_of_multibyte() {
        let text = "héllo\nwörld";
        let starts = line_starts(text);
        assert_eq!(offset_of(text, &starts, 2, 2), text.find("rld").unwrap());
    }

    #[test]
    fn test_other_language() {
        assert!(locate_literals("gql`{ a }`", HostLanguage::Other).is_empty());
        assert_eq!(HostLanguage::from_tag("TypeScript"), HostLanguage::JavaScript);
    }
}
