use tree_sitter::Node;

use crate::ast::NodeKind;
use crate::parser::field_text;

pub const SKIP_CALLS: &[&str] = &[
    "System.out.",
    "System.err.",
    "log.",
    "LOG.",
    "logger.",
    "LOGGER.",
];

pub fn grammar() -> tree_sitter::Language {
    tree_sitter_java::LANGUAGE.into()
}

pub fn node_kind(kind: &str) -> NodeKind {
    match kind {
        "program" => NodeKind::Unit,
        "method_declaration" | "constructor_declaration" => NodeKind::Function,
        "block" | "constructor_body" => NodeKind::Block,
        "if_statement" => NodeKind::If,
        "while_statement" | "for_statement" | "enhanced_for_statement" | "do_statement" => {
            NodeKind::Loop
        }
        "return_statement" => NodeKind::Return,
        "expression_statement" => NodeKind::ExpressionStatement,
        "local_variable_declaration" => NodeKind::Declaration,
        "binary_expression" => NodeKind::Binary,
        "unary_expression" => NodeKind::Unary,
        "update_expression" => NodeKind::Update,
        "assignment_expression" => NodeKind::Assignment,
        "parenthesized_expression" => NodeKind::Parenthesized,
        "method_invocation" | "object_creation_expression" => NodeKind::Call,
        "field_access" => NodeKind::FieldAccess,
        "identifier" => NodeKind::Identifier,
        "decimal_integer_literal"
        | "hex_integer_literal"
        | "octal_integer_literal"
        | "binary_integer_literal" => NodeKind::IntegerLiteral,
        "decimal_floating_point_literal" | "hex_floating_point_literal" => NodeKind::FloatLiteral,
        "true" | "false" => NodeKind::BooleanLiteral,
        "string_literal" | "text_block" => NodeKind::StringLiteral,
        "character_literal" => NodeKind::CharLiteral,
        "null_literal" => NodeKind::NullLiteral,
        "break_statement" => NodeKind::Break,
        "continue_statement" => NodeKind::Continue,
        _ => NodeKind::Other,
    }
}

pub fn function_name(node: Node, source: &str) -> Option<String> {
    field_text(node, "name", source)
}
