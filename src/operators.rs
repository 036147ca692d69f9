use crate::Language;
use crate::ast::{NodeKind, SyntaxNode};
use crate::catalog::{MutationOperator, NodeContext};
use crate::error::OperatorError;

type Rewrites = Result<Vec<SyntaxNode>, OperatorError>;

/// `a < b` becomes `a > b`.
pub fn mirror_relational(op: &str) -> Option<&'static str> {
    match op {
        "<" => Some(">"),
        ">" => Some("<"),
        "<=" => Some(">="),
        ">=" => Some("<="),
        _ => None,
    }
}

pub fn shift_boundary(op: &str) -> Option<&'static str> {
    match op {
        "<" => Some("<="),
        "<=" => Some("<"),
        ">" => Some(">="),
        ">=" => Some(">"),
        _ => None,
    }
}

pub fn negate_comparison(op: &str) -> Option<&'static str> {
    match op {
        "==" => Some("!="),
        "!=" => Some("=="),
        "<" => Some(">="),
        "<=" => Some(">"),
        ">" => Some("<="),
        ">=" => Some("<"),
        _ => None,
    }
}

pub fn replace_arithmetic(op: &str) -> Option<&'static str> {
    match op {
        "+" => Some("-"),
        "-" => Some("+"),
        "*" => Some("/"),
        "/" => Some("*"),
        "%" => Some("/"),
        _ => None,
    }
}

pub fn swap_connector(op: &str) -> Option<&'static str> {
    match op {
        "&&" => Some("||"),
        "||" => Some("&&"),
        _ => None,
    }
}

pub fn swap_increment(op: &str) -> Option<&'static str> {
    match op {
        "++" => Some("--"),
        "--" => Some("++"),
        "+=" => Some("-="),
        "-=" => Some("+="),
        _ => None,
    }
}

/// C spells its booleans either way round depending on the header in use.
pub fn flip_boolean(text: &str) -> Option<&'static str> {
    match text {
        "true" => Some("false"),
        "false" => Some("true"),
        "TRUE" => Some("FALSE"),
        "FALSE" => Some("TRUE"),
        _ => None,
    }
}

fn binary_with(node: &SyntaxNode, table: fn(&str) -> Option<&'static str>) -> bool {
    node.kind == NodeKind::Binary && node.operator_text().and_then(table).is_some()
}

fn swap_operator(
    name: &str,
    node: &SyntaxNode,
    table: fn(&str) -> Option<&'static str>,
) -> Rewrites {
    let op = node
        .operator_text()
        .ok_or_else(|| failure(name, "node has no operator token"))?;
    let replacement = table(op).ok_or_else(|| failure(name, &format!("no rewrite for '{}'", op)))?;
    node.with_operator(replacement)
        .map(|n| vec![n])
        .ok_or_else(|| failure(name, "node has no operator token"))
}

fn failure(operator: &str, reason: &str) -> OperatorError {
    OperatorError {
        operator: operator.to_string(),
        reason: reason.to_string(),
    }
}

fn first_operand(node: &SyntaxNode) -> Option<&SyntaxNode> {
    node.operands().next()
}

fn is_unary(node: &SyntaxNode, op: &str) -> bool {
    node.kind == NodeKind::Unary && node.operator_text() == Some(op)
}

// --- relational, arithmetic and logical tokens ---

pub struct FlipRelational;

impl MutationOperator for FlipRelational {
    fn name(&self) -> &'static str {
        "flip_relational"
    }
    fn description(&self) -> &'static str {
        "Mirror a relational operator (a < b becomes a > b)"
    }
    fn matches(&self, node: &SyntaxNode, _ctx: &NodeContext) -> bool {
        binary_with(node, mirror_relational)
    }
    fn rewrite(&self, node: &SyntaxNode, _ctx: &NodeContext) -> Rewrites {
        swap_operator(self.name(), node, mirror_relational)
    }
}

pub struct ConditionalBoundary;

impl MutationOperator for ConditionalBoundary {
    fn name(&self) -> &'static str {
        "conditional_boundary"
    }
    fn description(&self) -> &'static str {
        "Shift a comparison boundary (< becomes <=)"
    }
    fn matches(&self, node: &SyntaxNode, _ctx: &NodeContext) -> bool {
        binary_with(node, shift_boundary)
    }
    fn rewrite(&self, node: &SyntaxNode, _ctx: &NodeContext) -> Rewrites {
        swap_operator(self.name(), node, shift_boundary)
    }
}

pub struct NegateConditional;

impl MutationOperator for NegateConditional {
    fn name(&self) -> &'static str {
        "negate_conditional"
    }
    fn description(&self) -> &'static str {
        "Negate a relational or equality comparison (== becomes !=)"
    }
    fn matches(&self, node: &SyntaxNode, _ctx: &NodeContext) -> bool {
        binary_with(node, negate_comparison)
    }
    fn rewrite(&self, node: &SyntaxNode, _ctx: &NodeContext) -> Rewrites {
        swap_operator(self.name(), node, negate_comparison)
    }
}

pub struct ArithmeticReplacement;

impl MutationOperator for ArithmeticReplacement {
    fn name(&self) -> &'static str {
        "arithmetic_replacement"
    }
    fn description(&self) -> &'static str {
        "Replace a binary arithmetic operator (+ becomes -)"
    }
    fn matches(&self, node: &SyntaxNode, _ctx: &NodeContext) -> bool {
        binary_with(node, replace_arithmetic)
    }
    fn rewrite(&self, node: &SyntaxNode, _ctx: &NodeContext) -> Rewrites {
        swap_operator(self.name(), node, replace_arithmetic)
    }
}

pub struct LogicalConnector;

impl MutationOperator for LogicalConnector {
    fn name(&self) -> &'static str {
        "logical_connector"
    }
    fn description(&self) -> &'static str {
        "Swap && and ||"
    }
    fn matches(&self, node: &SyntaxNode, _ctx: &NodeContext) -> bool {
        binary_with(node, swap_connector)
    }
    fn rewrite(&self, node: &SyntaxNode, _ctx: &NodeContext) -> Rewrites {
        swap_operator(self.name(), node, swap_connector)
    }
}

pub struct Increments;

impl MutationOperator for Increments {
    fn name(&self) -> &'static str {
        "increments"
    }
    fn description(&self) -> &'static str {
        "Turn increments into decrements and back (++ / --, += / -=)"
    }
    fn matches(&self, node: &SyntaxNode, _ctx: &NodeContext) -> bool {
        matches!(node.kind, NodeKind::Update | NodeKind::Assignment)
            && node.operator_text().and_then(swap_increment).is_some()
    }
    fn rewrite(&self, node: &SyntaxNode, _ctx: &NodeContext) -> Rewrites {
        swap_operator(self.name(), node, swap_increment)
    }
}

// --- unary operators ---

pub struct InvertNegative;

impl MutationOperator for InvertNegative {
    fn name(&self) -> &'static str {
        "invert_negative"
    }
    fn description(&self) -> &'static str {
        "Drop a unary minus (-x becomes x)"
    }
    fn matches(&self, node: &SyntaxNode, _ctx: &NodeContext) -> bool {
        is_unary(node, "-") && first_operand(node).is_some()
    }
    fn rewrite(&self, node: &SyntaxNode, _ctx: &NodeContext) -> Rewrites {
        first_operand(node)
            .map(|operand| vec![operand.clone()])
            .ok_or_else(|| failure(self.name(), "unary minus without operand"))
    }
}

pub struct RemoveNegation;

impl MutationOperator for RemoveNegation {
    fn name(&self) -> &'static str {
        "remove_negation"
    }
    fn description(&self) -> &'static str {
        "Drop a logical not (!x becomes x)"
    }
    fn matches(&self, node: &SyntaxNode, _ctx: &NodeContext) -> bool {
        is_unary(node, "!") && first_operand(node).is_some()
    }
    fn rewrite(&self, node: &SyntaxNode, _ctx: &NodeContext) -> Rewrites {
        first_operand(node)
            .map(|operand| vec![operand.clone()])
            .ok_or_else(|| failure(self.name(), "negation without operand"))
    }
}

// --- literals ---

pub struct NegateBoolean;

impl MutationOperator for NegateBoolean {
    fn name(&self) -> &'static str {
        "negate_boolean"
    }
    fn description(&self) -> &'static str {
        "Flip a boolean literal that is not returned directly"
    }
    fn matches(&self, node: &SyntaxNode, ctx: &NodeContext) -> bool {
        node.kind == NodeKind::BooleanLiteral
            && node.text().and_then(flip_boolean).is_some()
            && ctx.parent.is_none_or(|p| p.kind != NodeKind::Return)
    }
    fn rewrite(&self, node: &SyntaxNode, _ctx: &NodeContext) -> Rewrites {
        let flipped = node
            .text()
            .and_then(flip_boolean)
            .ok_or_else(|| failure(self.name(), "not a boolean literal"))?;
        Ok(vec![SyntaxNode::leaf(NodeKind::BooleanLiteral, flipped, node.span)])
    }
}

/// Wraps a literal in two negations. Never changes behaviour, so it is off
/// by default and only useful to audit the equivalence filter.
pub struct DoubleNegation;

impl MutationOperator for DoubleNegation {
    fn name(&self) -> &'static str {
        "double_negation"
    }
    fn description(&self) -> &'static str {
        "Wrap a boolean literal as !(!lit) (always equivalent)"
    }
    fn enabled_by_default(&self) -> bool {
        false
    }
    fn matches(&self, node: &SyntaxNode, _ctx: &NodeContext) -> bool {
        node.kind == NodeKind::BooleanLiteral
    }
    fn rewrite(&self, node: &SyntaxNode, _ctx: &NodeContext) -> Rewrites {
        let span = node.span;
        let bang = || SyntaxNode::leaf(NodeKind::Operator, "!", span);
        let inner = SyntaxNode::composite(NodeKind::Unary, vec![bang(), node.clone()], span);
        let paren = SyntaxNode::composite(NodeKind::Parenthesized, vec![inner], span);
        Ok(vec![SyntaxNode::composite(
            NodeKind::Unary,
            vec![bang(), paren],
            span,
        )])
    }
}

/// Splits `42u32` into `(42, "u32")`. Only plain decimal literals qualify;
/// a leading zero means octal in Java and C.
fn decimal_literal(text: &str) -> Option<(u64, &str)> {
    let digits_end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let (digits, suffix) = text.split_at(digits_end);
    if digits.is_empty() || (digits.len() > 1 && digits.starts_with('0')) {
        return None;
    }
    if !suffix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    if suffix.starts_with(|c: char| matches!(c, 'e' | 'E' | 'x' | 'X' | 'b' | 'B' | 'o')) {
        return None;
    }
    digits.parse().ok().map(|n| (n, suffix))
}

pub struct InlineConstant;

impl MutationOperator for InlineConstant {
    fn name(&self) -> &'static str {
        "inline_constant"
    }
    fn description(&self) -> &'static str {
        "Change an integer constant (0 to 1, 1 to 0 or 2, n to 0 or n+1)"
    }
    fn matches(&self, node: &SyntaxNode, _ctx: &NodeContext) -> bool {
        node.kind == NodeKind::IntegerLiteral && node.text().and_then(decimal_literal).is_some()
    }
    fn rewrite(&self, node: &SyntaxNode, _ctx: &NodeContext) -> Rewrites {
        let (value, suffix) = node
            .text()
            .and_then(decimal_literal)
            .ok_or_else(|| failure(self.name(), "not a decimal literal"))?;
        let values = match value {
            0 => vec![1],
            1 => vec![0, 2],
            n => {
                let next = n
                    .checked_add(1)
                    .ok_or_else(|| failure(self.name(), &format!("{} + 1 overflows", n)))?;
                vec![0, next]
            }
        };
        Ok(values
            .into_iter()
            .map(|v| {
                SyntaxNode::leaf(NodeKind::IntegerLiteral, format!("{}{}", v, suffix), node.span)
            })
            .collect())
    }
}

// --- statements ---

fn return_replacement(value: &SyntaxNode, language: Language) -> Option<SyntaxNode> {
    let text = value.text().unwrap_or("");
    let (kind, replacement) = match value.kind {
        NodeKind::BooleanLiteral => (NodeKind::BooleanLiteral, flip_boolean(text)?.to_string()),
        NodeKind::IntegerLiteral => {
            let replacement = if decimal_literal(text).is_some_and(|(n, _)| n == 0) {
                "1"
            } else {
                "0"
            };
            (NodeKind::IntegerLiteral, replacement.to_string())
        }
        NodeKind::FloatLiteral => {
            let zero = text.trim_end_matches(['f', 'F', 'd', 'D']).parse::<f64>() == Ok(0.0);
            (NodeKind::FloatLiteral, if zero { "1.0" } else { "0.0" }.to_string())
        }
        NodeKind::StringLiteral => (NodeKind::StringLiteral, "\"\"".to_string()),
        NodeKind::NullLiteral => return None,
        _ if language == Language::Rust => (NodeKind::Call, "Default::default()".to_string()),
        _ => return None,
    };
    Some(SyntaxNode::leaf(kind, replacement, value.span))
}

fn return_value(node: &SyntaxNode) -> Option<(usize, &SyntaxNode)> {
    node.children
        .iter()
        .enumerate()
        .find(|(_, c)| c.kind != NodeKind::Operator)
}

pub struct ReturnValues;

impl MutationOperator for ReturnValues {
    fn name(&self) -> &'static str {
        "return_values"
    }
    fn description(&self) -> &'static str {
        "Replace a returned value (true/false, 0/1, \"\", Default::default())"
    }
    fn matches(&self, node: &SyntaxNode, ctx: &NodeContext) -> bool {
        node.kind == NodeKind::Return
            && return_value(node).is_some_and(|(_, v)| return_replacement(v, ctx.language).is_some())
    }
    fn rewrite(&self, node: &SyntaxNode, ctx: &NodeContext) -> Rewrites {
        let (index, value) =
            return_value(node).ok_or_else(|| failure(self.name(), "return without value"))?;
        let replacement = return_replacement(value, ctx.language)
            .ok_or_else(|| failure(self.name(), "returned value has no replacement"))?;
        Ok(vec![node.with_child(index, replacement)])
    }
}

/// Rust's `if let` conditions bind names and cannot be replaced by a literal.
fn replaceable_condition(node: &SyntaxNode) -> bool {
    node.children
        .first()
        .is_some_and(|c| !matches!(c.grammar_kind, "let_condition" | "let_chain"))
}

pub struct RemoveConditional;

impl MutationOperator for RemoveConditional {
    fn name(&self) -> &'static str {
        "remove_conditional"
    }
    fn description(&self) -> &'static str {
        "Force an if condition to true, then to false"
    }
    fn matches(&self, node: &SyntaxNode, _ctx: &NodeContext) -> bool {
        node.kind == NodeKind::If && replaceable_condition(node)
    }
    fn rewrite(&self, node: &SyntaxNode, _ctx: &NodeContext) -> Rewrites {
        let condition = node
            .children
            .first()
            .ok_or_else(|| failure(self.name(), "if without condition"))?;
        let mut rewrites = Vec::with_capacity(2);
        for literal in ["true", "false"] {
            let replaced = if condition.kind == NodeKind::Parenthesized {
                let inner = condition
                    .children
                    .first()
                    .ok_or_else(|| failure(self.name(), "empty parenthesized condition"))?;
                let leaf = SyntaxNode::leaf(NodeKind::BooleanLiteral, literal, inner.span);
                condition.with_child(0, leaf)
            } else {
                SyntaxNode::leaf(NodeKind::BooleanLiteral, literal, condition.span)
            };
            rewrites.push(node.with_child(0, replaced));
        }
        Ok(rewrites)
    }
}

pub struct LoopBreak;

impl MutationOperator for LoopBreak {
    fn name(&self) -> &'static str {
        "loop_break"
    }
    fn description(&self) -> &'static str {
        "Turn continue into break"
    }
    fn matches(&self, node: &SyntaxNode, _ctx: &NodeContext) -> bool {
        node.kind == NodeKind::Continue
    }
    fn rewrite(&self, node: &SyntaxNode, ctx: &NodeContext) -> Rewrites {
        let original = ctx.slice(node);
        if !original.starts_with("continue") {
            return Err(failure(self.name(), "continue keyword not found"));
        }
        let replaced = original.replacen("continue", "break", 1);
        Ok(vec![SyntaxNode::leaf(NodeKind::Break, replaced, node.span)])
    }
}

pub struct BlockRemove;

impl MutationOperator for BlockRemove {
    fn name(&self) -> &'static str {
        "block_remove"
    }
    fn description(&self) -> &'static str {
        "Empty the body of an if"
    }
    fn matches(&self, node: &SyntaxNode, _ctx: &NodeContext) -> bool {
        node.kind == NodeKind::If
            && node
                .children
                .get(1)
                .is_some_and(|c| c.kind == NodeKind::Block && !c.children.is_empty())
    }
    fn rewrite(&self, node: &SyntaxNode, _ctx: &NodeContext) -> Rewrites {
        let block = node
            .children
            .get(1)
            .ok_or_else(|| failure(self.name(), "if without body"))?;
        let empty = SyntaxNode::composite(NodeKind::Block, Vec::new(), block.span);
        Ok(vec![node.with_child(1, empty)])
    }
}
