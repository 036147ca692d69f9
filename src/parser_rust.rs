use tree_sitter::Node;

use crate::ast::NodeKind;
use crate::parser::field_text;

pub const SKIP_CALLS: &[&str] = &[
    "println!",
    "eprintln!",
    "print!",
    "eprint!",
    "format!",
    "log::",
    "debug!",
    "info!",
    "warn!",
    "error!",
    "trace!",
];

pub fn grammar() -> tree_sitter::Language {
    tree_sitter_rust::LANGUAGE.into()
}

pub fn node_kind(kind: &str) -> NodeKind {
    match kind {
        "source_file" => NodeKind::Unit,
        "function_item" => NodeKind::Function,
        "block" => NodeKind::Block,
        "if_expression" => NodeKind::If,
        "while_expression" | "loop_expression" | "for_expression" => NodeKind::Loop,
        "return_expression" => NodeKind::Return,
        "expression_statement" => NodeKind::ExpressionStatement,
        "let_declaration" => NodeKind::Declaration,
        "binary_expression" => NodeKind::Binary,
        "unary_expression" => NodeKind::Unary,
        "assignment_expression" | "compound_assignment_expr" => NodeKind::Assignment,
        "parenthesized_expression" => NodeKind::Parenthesized,
        "call_expression" | "macro_invocation" => NodeKind::Call,
        "field_expression" => NodeKind::FieldAccess,
        "identifier" => NodeKind::Identifier,
        "integer_literal" => NodeKind::IntegerLiteral,
        "float_literal" => NodeKind::FloatLiteral,
        "boolean_literal" => NodeKind::BooleanLiteral,
        "string_literal" | "raw_string_literal" => NodeKind::StringLiteral,
        "char_literal" => NodeKind::CharLiteral,
        "break_expression" => NodeKind::Break,
        "continue_expression" => NodeKind::Continue,
        _ => NodeKind::Other,
    }
}

pub fn function_name(node: Node, source: &str) -> Option<String> {
    field_text(node, "name", source)
}
