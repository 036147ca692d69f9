use tree_sitter::Node;

use crate::ast::NodeKind;

pub const SKIP_CALLS: &[&str] = &["printf", "fprintf", "puts", "perror", "fputs"];

pub fn grammar() -> tree_sitter::Language {
    tree_sitter_c::LANGUAGE.into()
}

pub fn node_kind(kind: &str, text: &str) -> NodeKind {
    match kind {
        "translation_unit" => NodeKind::Unit,
        "function_definition" => NodeKind::Function,
        "compound_statement" => NodeKind::Block,
        "if_statement" => NodeKind::If,
        "while_statement" | "for_statement" | "do_statement" => NodeKind::Loop,
        "return_statement" => NodeKind::Return,
        "expression_statement" => NodeKind::ExpressionStatement,
        "declaration" => NodeKind::Declaration,
        "binary_expression" => NodeKind::Binary,
        "unary_expression" => NodeKind::Unary,
        "update_expression" => NodeKind::Update,
        "assignment_expression" => NodeKind::Assignment,
        "parenthesized_expression" => NodeKind::Parenthesized,
        "call_expression" => NodeKind::Call,
        "field_expression" => NodeKind::FieldAccess,
        "identifier" => NodeKind::Identifier,
        "number_literal" if is_float(text) => NodeKind::FloatLiteral,
        "number_literal" => NodeKind::IntegerLiteral,
        "true" | "false" => NodeKind::BooleanLiteral,
        "string_literal" | "concatenated_string" => NodeKind::StringLiteral,
        "char_literal" => NodeKind::CharLiteral,
        "null" => NodeKind::NullLiteral,
        "break_statement" => NodeKind::Break,
        "continue_statement" => NodeKind::Continue,
        _ => NodeKind::Other,
    }
}

fn is_float(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    if lower.starts_with("0x") {
        return lower.contains('.') || lower.contains('p');
    }
    lower.contains('.') || lower.contains('e')
}

/// C buries the name under nested declarators: `int *f(int)` is a
/// pointer_declarator wrapping a function_declarator wrapping `f`.
pub fn function_name(node: Node, source: &str) -> Option<String> {
    let mut current = node.child_by_field_name("declarator")?;
    loop {
        if current.kind() == "identifier" {
            return Some(source[current.start_byte()..current.end_byte()].to_string());
        }
        current = current.child_by_field_name("declarator")?;
    }
}
