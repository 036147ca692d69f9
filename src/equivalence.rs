use std::collections::BTreeSet;
use std::path::Path;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::Language;
use crate::ast::{NodeKind, SyntaxNode};
use crate::error::{EngineError, Result};
use crate::mutants::{EquivalenceReason, Mutant, MutantStatus};
use crate::operators::flip_boolean;
use crate::ted;

fn is_not(node: &SyntaxNode) -> bool {
    node.kind == NodeKind::Unary && node.operator_text() == Some("!")
}

/// Whether `node` can only evaluate to 0/1 (or false/true).
fn is_boolean_valued(node: &SyntaxNode) -> bool {
    match node.kind {
        NodeKind::BooleanLiteral => true,
        NodeKind::Binary => matches!(
            node.operator_text(),
            Some("==" | "!=" | "<" | "<=" | ">" | ">=" | "&&" | "||")
        ),
        NodeKind::Unary => is_not(node),
        _ => false,
    }
}

/// Removes parentheses, folds `!true`/`!false` and collapses `!!e` where
/// that is an identity for `language`.
pub fn normalize(node: &SyntaxNode, language: Language) -> SyntaxNode {
    let children: Vec<SyntaxNode> = node
        .children
        .iter()
        .map(|c| normalize(c, language))
        .collect();

    if node.kind == NodeKind::Parenthesized {
        let mut operands = children.iter().filter(|c| c.kind != NodeKind::Operator);
        if let (Some(inner), None) = (operands.next(), operands.next()) {
            return inner.clone();
        }
    }

    let normalized = SyntaxNode {
        kind: node.kind,
        grammar_kind: node.grammar_kind,
        text: node.text.clone(),
        name: node.name.clone(),
        span: node.span,
        synthetic: node.synthetic,
        children,
    };

    if is_not(&normalized) {
        if let Some(operand) = normalized.operands().next() {
            if operand.kind == NodeKind::BooleanLiteral {
                if let Some(flipped) = operand.text().and_then(flip_boolean) {
                    return SyntaxNode::leaf(NodeKind::BooleanLiteral, flipped, node.span);
                }
            }
            if is_not(operand) {
                if let Some(inner) = operand.operands().next() {
                    if language.negation_is_involution() || is_boolean_valued(inner) {
                        return inner.clone();
                    }
                }
            }
        }
    }
    normalized
}

fn is_abstractable(node: &SyntaxNode) -> bool {
    node.is_leaf() && (node.kind == NodeKind::Identifier || node.kind.is_literal())
}

fn shape_into(node: &SyntaxNode, other: Option<&SyntaxNode>, out: &mut String) {
    if is_abstractable(node) {
        let same = other.is_some_and(|o| o.kind == node.kind && o.text == node.text);
        if same {
            out.push_str(node.kind.name());
            out.push_str(":_");
        } else {
            out.push_str(&node.label());
        }
        return;
    }
    out.push_str(&node.label());
    if node.children.is_empty() {
        return;
    }
    out.push('(');
    for (i, child) in node.children.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let counterpart = other.and_then(|o| o.children.get(i));
        shape_into(child, counterpart, out);
    }
    out.push(')');
}

/// Registry key of a mutant: operator plus both normalized trees, with
/// identifiers and literals that agree at the same position abstracted.
pub fn shape_key(operator: &str, original: &SyntaxNode, mutated: &SyntaxNode) -> String {
    let mut key = String::from(operator);
    key.push('|');
    shape_into(original, Some(mutated), &mut key);
    key.push('|');
    shape_into(mutated, Some(original), &mut key);
    key
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    version: u32,
    shapes: BTreeSet<String>,
}

const REGISTRY_VERSION: u32 = 1;

/// Shapes confirmed equivalent. Shared by all filtering threads.
#[derive(Debug, Default)]
pub struct EquivalenceRegistry {
    shapes: RwLock<BTreeSet<String>>,
}

impl EquivalenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a registry file. A missing file is an empty registry.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)?;
        let file: RegistryFile = serde_json::from_str(&content)?;
        if file.version != REGISTRY_VERSION {
            return Err(EngineError::Config(format!(
                "{}: unsupported registry version {}",
                path.display(),
                file.version
            )));
        }
        log::info!("Loaded {} equivalent shapes from {}", file.shapes.len(), path.display());
        Ok(Self {
            shapes: RwLock::new(file.shapes),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = RegistryFile {
            version: REGISTRY_VERSION,
            shapes: self.snapshot(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        let shapes = self.shapes.read().unwrap_or_else(|e| e.into_inner());
        shapes.contains(key)
    }

    /// Inserts `key` unless present. Returns whether it was new.
    pub fn insert(&self, key: String) -> bool {
        if self.contains(&key) {
            return false;
        }
        let mut shapes = self.shapes.write().unwrap_or_else(|e| e.into_inner());
        shapes.insert(key)
    }

    pub fn len(&self) -> usize {
        self.shapes.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> BTreeSet<String> {
        self.shapes.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

fn same_tree(a: &SyntaxNode, b: &SyntaxNode) -> bool {
    let mut stack = vec![(a, b)];
    while let Some((x, y)) = stack.pop() {
        if x.children.len() != y.children.len() || x.label() != y.label() {
            return false;
        }
        stack.extend(x.children.iter().zip(&y.children));
    }
    true
}

/// The smallest pair of subtrees holding every difference between `a` and
/// `b`: steps down while both roots agree and exactly one child pair
/// differs. Identical siblings contribute nothing to the distance, so only
/// this pair goes through the DP. `None` when the trees are identical.
pub fn differing_pair<'t>(
    mut a: &'t SyntaxNode,
    mut b: &'t SyntaxNode,
) -> Option<(&'t SyntaxNode, &'t SyntaxNode)> {
    loop {
        if a.children.len() != b.children.len() || a.label() != b.label() {
            return Some((a, b));
        }
        let mut differing = a
            .children
            .iter()
            .zip(&b.children)
            .filter(|(x, y)| !same_tree(x, y));
        match (differing.next(), differing.next()) {
            (None, _) => return None,
            (Some((x, y)), None) => {
                a = x;
                b = y;
            }
            (Some(_), Some(_)) => return Some((a, b)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Equivalent(EquivalenceReason),
    Schedule { distance: usize },
}

/// A mutant whose normalized replacement is at tree distance zero from the
/// normalized original cannot change behaviour and is never executed.
///
/// Registry keys are only ever recorded for distance-zero mutants, so a
/// key hit stands for a zero distance and is answered without computing
/// one. A key whose differing leaves never occur at distance zero can only
/// come from a registry file edited by hand.
pub struct EquivalenceFilter<'r> {
    registry: &'r EquivalenceRegistry,
}

impl<'r> EquivalenceFilter<'r> {
    pub fn new(registry: &'r EquivalenceRegistry) -> Self {
        Self { registry }
    }

    /// Decides a mutant without touching its status.
    pub fn classify(&self, mutant: &Mutant) -> Result<FilterDecision> {
        let replacement = mutant.replacement.as_ref().map_err(|e| e.clone())?;
        let original = normalize(&mutant.original, mutant.language);
        let mutated = normalize(replacement, mutant.language);
        let key = shape_key(&mutant.id.operator, &original, &mutated);

        if self.registry.contains(&key) {
            return Ok(FilterDecision::Equivalent(EquivalenceReason::RegistryMatch));
        }

        let distance = match differing_pair(&original, &mutated) {
            None => 0,
            Some((a, b)) => ted::distance(a, b),
        };
        if distance == 0 {
            if self.registry.insert(key) {
                log::debug!("New equivalent shape from {}", mutant.id);
            }
            return Ok(FilterDecision::Equivalent(EquivalenceReason::ZeroDistance));
        }
        Ok(FilterDecision::Schedule { distance })
    }

    /// Moves a generated mutant to `Equivalent` or `Scheduled`.
    pub fn apply(&self, mutant: &mut Mutant) -> Result<FilterDecision> {
        mutant.advance(MutantStatus::Filtered)?;
        let decision = self.classify(mutant)?;
        match decision {
            FilterDecision::Equivalent(_) => mutant.advance(MutantStatus::Equivalent)?,
            FilterDecision::Schedule { .. } => mutant.advance(MutantStatus::Scheduled)?,
        }
        Ok(decision)
    }
}
