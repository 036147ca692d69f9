use camino::Utf8PathBuf;
use serde::Serialize;

use crate::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum NodeKind {
    Unit,
    Function,
    Block,
    If,
    Loop,
    Return,
    ExpressionStatement,
    Declaration,
    Binary,
    Unary,
    Update,
    Assignment,
    Parenthesized,
    Call,
    FieldAccess,
    Identifier,
    IntegerLiteral,
    FloatLiteral,
    BooleanLiteral,
    StringLiteral,
    CharLiteral,
    NullLiteral,
    Operator,
    Break,
    Continue,
    Other,
}

impl NodeKind {
    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Unit => "unit",
            NodeKind::Function => "function",
            NodeKind::Block => "block",
            NodeKind::If => "if",
            NodeKind::Loop => "loop",
            NodeKind::Return => "return",
            NodeKind::ExpressionStatement => "expression_statement",
            NodeKind::Declaration => "declaration",
            NodeKind::Binary => "binary",
            NodeKind::Unary => "unary",
            NodeKind::Update => "update",
            NodeKind::Assignment => "assignment",
            NodeKind::Parenthesized => "parenthesized",
            NodeKind::Call => "call",
            NodeKind::FieldAccess => "field_access",
            NodeKind::Identifier => "identifier",
            NodeKind::IntegerLiteral => "integer_literal",
            NodeKind::FloatLiteral => "float_literal",
            NodeKind::BooleanLiteral => "boolean_literal",
            NodeKind::StringLiteral => "string_literal",
            NodeKind::CharLiteral => "char_literal",
            NodeKind::NullLiteral => "null_literal",
            NodeKind::Operator => "operator",
            NodeKind::Break => "break",
            NodeKind::Continue => "continue",
            NodeKind::Other => "other",
        }
    }

    pub fn is_literal(self) -> bool {
        matches!(
            self,
            NodeKind::IntegerLiteral
                | NodeKind::FloatLiteral
                | NodeKind::BooleanLiteral
                | NodeKind::StringLiteral
                | NodeKind::CharLiteral
                | NodeKind::NullLiteral
        )
    }

    /// Kinds that are always lowered as leaves carrying their source text.
    pub fn is_leaf_kind(self) -> bool {
        self.is_literal() || matches!(self, NodeKind::Identifier | NodeKind::Operator)
    }
}

/// Byte range plus 1-based line/column of a node in its unit's text.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, serde::Deserialize,
)]
pub struct Span {
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl Span {
    pub fn contains(&self, other: &Span) -> bool {
        self.start_byte <= other.start_byte && other.end_byte <= self.end_byte
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start_byte < other.end_byte && other.start_byte < self.end_byte
    }

    pub fn len(&self) -> usize {
        self.end_byte - self.start_byte
    }

    pub fn is_empty(&self) -> bool {
        self.start_byte == self.end_byte
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    /// Raw grammar node name. Labels `Other` nodes structurally.
    pub grammar_kind: &'static str,
    /// Leaf text, exactly as it appears in the source for parsed leaves.
    pub text: Option<String>,
    /// Declared name, only set on `Function` nodes.
    pub name: Option<String>,
    pub span: Span,
    /// Produced by a rewrite rather than parsed. A synthetic node's span is
    /// the region of the original text it replaces.
    pub synthetic: bool,
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    pub fn leaf(kind: NodeKind, text: impl Into<String>, span: Span) -> Self {
        SyntaxNode {
            kind,
            grammar_kind: kind.name(),
            text: Some(text.into()),
            name: None,
            span,
            synthetic: true,
            children: Vec::new(),
        }
    }

    pub fn composite(kind: NodeKind, children: Vec<SyntaxNode>, span: Span) -> Self {
        SyntaxNode {
            kind,
            grammar_kind: kind.name(),
            text: None,
            name: None,
            span,
            synthetic: true,
            children,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Label used by the tree edit distance: kind plus leaf text.
    pub fn label(&self) -> String {
        let kind = match self.kind {
            NodeKind::Other => self.grammar_kind,
            k => k.name(),
        };
        match &self.text {
            Some(text) => format!("{}:{}", kind, text),
            None => kind.to_string(),
        }
    }

    /// The operator token of a binary/unary/update/assignment node.
    pub fn operator(&self) -> Option<&SyntaxNode> {
        self.children.iter().find(|c| c.kind == NodeKind::Operator)
    }

    pub fn operator_text(&self) -> Option<&str> {
        self.operator().and_then(|op| op.text())
    }

    /// Children that are not operator tokens.
    pub fn operands(&self) -> impl Iterator<Item = &SyntaxNode> {
        self.children.iter().filter(|c| c.kind != NodeKind::Operator)
    }

    /// A copy of this node with child `index` swapped out.
    pub fn with_child(&self, index: usize, child: SyntaxNode) -> SyntaxNode {
        let mut copy = self.clone();
        copy.children[index] = child;
        copy
    }

    /// A copy of this node with its operator token relabelled.
    pub fn with_operator(&self, replacement: &str) -> Option<SyntaxNode> {
        let index = self.children.iter().position(|c| c.kind == NodeKind::Operator)?;
        let op = &self.children[index];
        Some(self.with_child(
            index,
            SyntaxNode::leaf(NodeKind::Operator, replacement, op.span),
        ))
    }

    pub fn preorder(&self) -> Preorder<'_> {
        Preorder { stack: vec![self] }
    }

    pub fn size(&self) -> usize {
        self.preorder().count()
    }

    /// Text of this subtree. Parsed interior nodes splice their children's
    /// renderings into the original text so untouched formatting survives.
    pub fn render(&self, source: &str) -> String {
        let mut out = String::new();
        self.render_into(source, &mut out);
        out
    }

    fn render_into(&self, source: &str, out: &mut String) {
        if let Some(text) = &self.text {
            out.push_str(text);
            return;
        }
        if !self.synthetic {
            let mut cursor = self.span.start_byte;
            for child in &self.children {
                out.push_str(source.get(cursor..child.span.start_byte).unwrap_or(""));
                child.render_into(source, out);
                cursor = child.span.end_byte;
            }
            out.push_str(source.get(cursor..self.span.end_byte).unwrap_or(""));
            return;
        }
        match self.kind {
            NodeKind::Parenthesized => {
                out.push('(');
                for child in &self.children {
                    child.render_into(source, out);
                }
                out.push(')');
            }
            NodeKind::Unary | NodeKind::Update => {
                for child in &self.children {
                    child.render_into(source, out);
                }
            }
            NodeKind::Block if self.children.is_empty() => out.push_str("{}"),
            _ => {
                for (i, child) in self.children.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    child.render_into(source, out);
                }
            }
        }
    }
}

pub struct Preorder<'a> {
    stack: Vec<&'a SyntaxNode>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a SyntaxNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// One parsed compilation unit. Never mutated; mutants derive new text.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub path: Utf8PathBuf,
    pub language: Language,
    pub text: String,
    pub root: SyntaxNode,
}

impl SourceUnit {
    pub fn slice(&self, span: &Span) -> &str {
        self.text.get(span.start_byte..span.end_byte).unwrap_or("")
    }

    /// Names of all declared functions/methods, in source order.
    pub fn functions(&self) -> Vec<String> {
        self.root
            .preorder()
            .filter(|n| n.kind == NodeKind::Function)
            .filter_map(|n| n.name.clone())
            .collect()
    }

    pub fn find_function(&self, name: &str) -> Option<&SyntaxNode> {
        self.root
            .preorder()
            .find(|n| n.kind == NodeKind::Function && n.name.as_deref() == Some(name))
    }

    /// Up to `range` lines before and after the 1-based `line`.
    pub fn context(&self, line: usize, range: usize) -> (Vec<String>, Vec<String>) {
        let lines: Vec<&str> = self.text.lines().collect();
        let line_idx = line.saturating_sub(1).min(lines.len());
        let start = line_idx.saturating_sub(range);
        let end = (line_idx + range + 1).min(lines.len());
        let before: Vec<String> = lines[start..line_idx].iter().map(|s| s.to_string()).collect();
        let after: Vec<String> = if line_idx + 1 < end {
            lines[line_idx + 1..end].iter().map(|s| s.to_string()).collect()
        } else {
            vec![]
        };
        (before, after)
    }
}
