use camino::Utf8PathBuf;
use tree_sitter::{Node, Parser};

use crate::Language;
use crate::ast::{NodeKind, SourceUnit, Span, SyntaxNode};
use crate::error::ParseError;
use crate::{parser_c, parser_java, parser_rust};

/// Anonymous grammar tokens kept in the lowered tree as `Operator` leaves.
/// Every other anonymous token (keywords, punctuation) is dropped; its text
/// is still reproduced by splicing when a parent is rendered.
pub const OPERATOR_TOKENS: &[&str] = &[
    "+", "-", "*", "/", "%", "<", ">", "<=", ">=", "==", "!=", "&&", "||", "!", "~", "&", "|",
    "^", "<<", ">>", ">>>", "++", "--", "=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=",
    "<<=", ">>=", ">>>=",
];

pub fn grammar(language: Language) -> tree_sitter::Language {
    match language {
        Language::Java => parser_java::grammar(),
        Language::C => parser_c::grammar(),
        Language::Rust => parser_rust::grammar(),
    }
}

fn classify(language: Language, kind: &str, text: &str) -> NodeKind {
    match language {
        Language::Java => parser_java::node_kind(kind),
        Language::C => parser_c::node_kind(kind, text),
        Language::Rust => parser_rust::node_kind(kind),
    }
}

fn function_name(language: Language, node: Node, source: &str) -> Option<String> {
    match language {
        Language::Java => parser_java::function_name(node, source),
        Language::C => parser_c::function_name(node, source),
        Language::Rust => parser_rust::function_name(node, source),
    }
}

/// Call prefixes whose subtrees are not worth mutating (printing, logging).
pub fn default_skip_calls(language: Language) -> &'static [&'static str] {
    match language {
        Language::Java => parser_java::SKIP_CALLS,
        Language::C => parser_c::SKIP_CALLS,
        Language::Rust => parser_rust::SKIP_CALLS,
    }
}

/// Parse `text` into a [`SourceUnit`]. A tree containing ERROR or MISSING
/// nodes is rejected with the location of the first one.
pub fn parse(
    language: Language,
    path: impl Into<Utf8PathBuf>,
    text: &str,
) -> Result<SourceUnit, ParseError> {
    let path = path.into();
    let fail = |line: usize, column: usize, message: String| ParseError {
        path: path.clone(),
        line,
        column,
        message,
    };

    let mut parser = Parser::new();
    parser
        .set_language(&grammar(language))
        .map_err(|e| fail(1, 1, format!("{} grammar rejected: {}", language.name(), e)))?;
    let tree = parser
        .parse(text, None)
        .ok_or_else(|| fail(1, 1, "parser produced no tree".to_string()))?;
    let root = tree.root_node();

    if root.has_error() {
        let bad = first_error(root).unwrap_or(root);
        let pos = bad.start_position();
        let message = if bad.is_missing() {
            format!("missing '{}'", bad.kind())
        } else {
            let snippet: String = node_text(bad, text).chars().take(40).collect();
            format!("unexpected syntax near '{}'", snippet.trim())
        };
        return Err(fail(pos.row + 1, pos.column + 1, message));
    }

    Ok(SourceUnit {
        root: lower(root, text, language),
        path,
        language,
        text: text.to_string(),
    })
}

fn first_error(root: Node) -> Option<Node> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        let count = node.child_count();
        for i in (0..count).rev() {
            if let Some(child) = node.child(i) {
                if child.has_error() || child.is_missing() {
                    stack.push(child);
                }
            }
        }
    }
    None
}

fn node_text<'a>(node: Node<'a>, source: &'a str) -> &'a str {
    &source[node.start_byte()..node.end_byte()]
}

fn span_of(node: Node) -> Span {
    let start = node.start_position();
    let end = node.end_position();
    Span {
        start_byte: node.start_byte(),
        end_byte: node.end_byte(),
        start_line: start.row + 1,
        start_column: start.column + 1,
        end_line: end.row + 1,
        end_column: end.column + 1,
    }
}

fn lower(node: Node, source: &str, language: Language) -> SyntaxNode {
    let text = node_text(node, source);
    let kind = classify(language, node.kind(), text);
    let span = span_of(node);

    if kind.is_leaf_kind() || node.child_count() == 0 {
        return SyntaxNode {
            kind,
            grammar_kind: node.kind(),
            text: Some(text.to_string()),
            name: None,
            span,
            synthetic: false,
            children: Vec::new(),
        };
    }

    let mut children = Vec::new();
    let count = node.child_count();
    for i in 0..count {
        let Some(child) = node.child(i) else { continue };
        if child.is_extra() {
            continue;
        }
        if child.is_named() {
            children.push(lower(child, source, language));
        } else if OPERATOR_TOKENS.contains(&child.kind()) {
            children.push(SyntaxNode {
                kind: NodeKind::Operator,
                grammar_kind: child.kind(),
                text: Some(node_text(child, source).to_string()),
                name: None,
                span: span_of(child),
                synthetic: false,
                children: Vec::new(),
            });
        }
    }

    let name = if kind == NodeKind::Function {
        function_name(language, node, source)
    } else {
        None
    };

    // Only keywords and punctuation underneath: keep the text so `int` and
    // `long` still label differently.
    let text = children.is_empty().then(|| text.to_string());

    SyntaxNode {
        kind,
        grammar_kind: node.kind(),
        text,
        name,
        span,
        synthetic: false,
        children,
    }
}

/// Declared function names of `text`, or the parse error.
pub fn list_functions(language: Language, text: &str) -> Result<Vec<String>, ParseError> {
    Ok(parse(language, "<input>", text)?.functions())
}

pub(crate) fn field_text(node: Node, field: &str, source: &str) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| node_text(n, source).to_string())
}
