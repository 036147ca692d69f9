use std::collections::VecDeque;

use crate::ast::{NodeKind, SourceUnit, SyntaxNode};
use crate::catalog::{Catalog, NodeContext};
use crate::error::OperatorError;
use crate::mutants::{Mutant, MutantId, MutantStatus};
use crate::parser;

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Only mutate inside this function or method.
    pub function: Option<String>,
    /// Calls whose text starts with one of these are left alone, subtree
    /// included. `None` means the language defaults.
    pub skip_call_prefixes: Option<Vec<String>>,
    /// Source lines recorded before and after each mutant.
    pub context_lines: usize,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            function: None,
            skip_call_prefixes: None,
            context_lines: 2,
        }
    }
}

/// The mutants of one unit. Nothing is computed until iterated, and every
/// iteration starts from scratch and yields the same sequence.
pub struct Mutants<'a> {
    unit: &'a SourceUnit,
    catalog: &'a Catalog,
    options: &'a GenerateOptions,
}

pub fn generate<'a>(
    unit: &'a SourceUnit,
    catalog: &'a Catalog,
    options: &'a GenerateOptions,
) -> Mutants<'a> {
    Mutants {
        unit,
        catalog,
        options,
    }
}

impl<'a> Mutants<'a> {
    pub fn iter(&self) -> MutantIter<'a> {
        let root = match &self.options.function {
            Some(name) => self.unit.find_function(name),
            None => Some(&self.unit.root),
        };
        let skip_calls = match &self.options.skip_call_prefixes {
            Some(prefixes) => prefixes.clone(),
            None => parser::default_skip_calls(self.unit.language)
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };
        MutantIter {
            unit: self.unit,
            catalog: self.catalog,
            context_lines: self.options.context_lines,
            skip_calls,
            stack: root.map(|r| (r, None)).into_iter().collect(),
            pending: VecDeque::new(),
        }
    }
}

impl<'a> IntoIterator for &Mutants<'a> {
    type Item = Mutant;
    type IntoIter = MutantIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct MutantIter<'a> {
    unit: &'a SourceUnit,
    catalog: &'a Catalog,
    context_lines: usize,
    skip_calls: Vec<String>,
    /// Pre-order work list: node plus its parent.
    stack: Vec<(&'a SyntaxNode, Option<&'a SyntaxNode>)>,
    pending: VecDeque<Mutant>,
}

impl<'a> MutantIter<'a> {
    fn is_skipped_call(&self, node: &SyntaxNode) -> bool {
        if node.kind != NodeKind::Call {
            return false;
        }
        let text = self.unit.slice(&node.span);
        self.skip_calls.iter().any(|p| text.starts_with(p.as_str()))
    }

    fn mutants_at(&mut self, node: &'a SyntaxNode, parent: Option<&'a SyntaxNode>) {
        let unit = self.unit;
        let ctx = NodeContext {
            language: unit.language,
            source: &unit.text,
            parent,
        };
        let catalog = self.catalog;
        let matches = catalog.operators_matching(node, &ctx);
        if matches.is_empty() {
            return;
        }
        let (context_before, context_after) =
            unit.context(node.span.start_line, self.context_lines);

        for m in matches {
            let operator = m.operator;
            let mutant = |index: usize,
                          replacement: Result<SyntaxNode, OperatorError>,
                          status: MutantStatus| Mutant {
                id: MutantId {
                    path: unit.path.clone(),
                    start_byte: node.span.start_byte,
                    end_byte: node.span.end_byte,
                    operator: operator.name().to_string(),
                    index,
                },
                language: unit.language,
                span: node.span,
                description: operator.description(),
                original: node.clone(),
                replacement,
                status,
                context_before: context_before.clone(),
                context_after: context_after.clone(),
            };
            match m.rewrites {
                Ok(rewrites) => {
                    for (index, rewrite) in rewrites.into_iter().enumerate() {
                        self.pending
                            .push_back(mutant(index, Ok(rewrite), MutantStatus::Generated));
                    }
                }
                Err(e) => {
                    log::debug!(
                        "{} failed at {}:{}: {}",
                        e.operator,
                        unit.path,
                        node.span.start_line,
                        e.reason
                    );
                    self.pending.push_back(mutant(0, Err(e), MutantStatus::Error));
                }
            }
        }
    }
}

impl<'a> Iterator for MutantIter<'a> {
    type Item = Mutant;

    fn next(&mut self) -> Option<Mutant> {
        loop {
            if let Some(mutant) = self.pending.pop_front() {
                return Some(mutant);
            }
            let (node, parent) = self.stack.pop()?;
            if self.is_skipped_call(node) {
                continue;
            }
            self.stack
                .extend(node.children.iter().rev().map(|c| (c, Some(node))));
            self.mutants_at(node, parent);
        }
    }
}
