use serde::{Deserialize, Serialize};

use crate::Language;
use crate::ast::SyntaxNode;
use crate::error::{EngineError, OperatorError, Result};
use crate::operators;

/// What an operator may know about a node besides its own subtree.
#[derive(Debug, Clone, Copy)]
pub struct NodeContext<'a> {
    pub language: Language,
    pub source: &'a str,
    pub parent: Option<&'a SyntaxNode>,
}

impl<'a> NodeContext<'a> {
    pub fn slice(&self, node: &SyntaxNode) -> &'a str {
        self.source
            .get(node.span.start_byte..node.span.end_byte)
            .unwrap_or("")
    }
}

pub trait MutationOperator: Send + Sync {
    /// Stable identifier used in configuration, ids and reports.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn enabled_by_default(&self) -> bool {
        true
    }

    fn matches(&self, node: &SyntaxNode, ctx: &NodeContext) -> bool;

    /// Replacement subtrees for a matched node, in a fixed order.
    fn rewrite(
        &self,
        node: &SyntaxNode,
        ctx: &NodeContext,
    ) -> std::result::Result<Vec<SyntaxNode>, OperatorError>;
}

/// How many rewrites a node may produce.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewritePolicy {
    /// Keep at most this many rewrites from each matching operator.
    pub max_rewrites_per_operator: Option<usize>,
    /// Only the first matching operator (registration order) mutates a node.
    pub exclusive_operators: bool,
}

pub struct OperatorMatch<'c> {
    pub operator: &'c dyn MutationOperator,
    pub rewrites: std::result::Result<Vec<SyntaxNode>, OperatorError>,
}

pub struct Catalog {
    operators: Vec<Box<dyn MutationOperator>>,
    policy: RewritePolicy,
}

impl Catalog {
    /// The default-enabled built-in operators.
    pub fn builtin() -> Catalog {
        let mut builder = CatalogBuilder::new();
        for op in builtin_operators() {
            if op.enabled_by_default() {
                builder = builder.register(op);
            }
        }
        builder.build()
    }

    /// Built-ins selected by name, in the order given. Unknown names are a
    /// configuration error.
    pub fn from_names(names: &[String], policy: RewritePolicy) -> Result<Catalog> {
        let mut available = builtin_operators();
        let mut builder = CatalogBuilder::new().policy(policy);
        let known = builtin_names();
        for name in names {
            if !known.contains(&name.as_str()) {
                return Err(EngineError::Config(format!("unknown operator '{}'", name)));
            }
            // Duplicates in the list were already taken out of `available`.
            if let Some(pos) = available.iter().position(|op| op.name() == name) {
                builder = builder.register(available.remove(pos));
            }
        }
        Ok(builder.build())
    }

    pub fn operators(&self) -> impl Iterator<Item = &dyn MutationOperator> {
        self.operators.iter().map(|op| op.as_ref())
    }

    pub fn get(&self, name: &str) -> Option<&dyn MutationOperator> {
        self.operators().find(|op| op.name() == name)
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    pub fn policy(&self) -> &RewritePolicy {
        &self.policy
    }

    /// Every matching operator with its rewrites, in registration order.
    pub fn operators_matching<'c>(
        &'c self,
        node: &SyntaxNode,
        ctx: &NodeContext,
    ) -> Vec<OperatorMatch<'c>> {
        let mut matches = Vec::new();
        for op in self.operators() {
            if !op.matches(node, ctx) {
                continue;
            }
            let rewrites = op.rewrite(node, ctx).map(|mut rewrites| {
                if let Some(max) = self.policy.max_rewrites_per_operator {
                    rewrites.truncate(max);
                }
                rewrites
            });
            matches.push(OperatorMatch {
                operator: op,
                rewrites,
            });
            if self.policy.exclusive_operators {
                break;
            }
        }
        matches
    }
}

#[derive(Default)]
pub struct CatalogBuilder {
    operators: Vec<Box<dyn MutationOperator>>,
    policy: RewritePolicy,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an operator. A second operator with an already registered name
    /// replaces nothing and is ignored.
    pub fn register(mut self, op: Box<dyn MutationOperator>) -> Self {
        if self.operators.iter().all(|o| o.name() != op.name()) {
            self.operators.push(op);
        }
        self
    }

    pub fn policy(mut self, policy: RewritePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> Catalog {
        Catalog {
            operators: self.operators,
            policy: self.policy,
        }
    }
}

/// All built-in operators in their canonical order.
pub fn builtin_operators() -> Vec<Box<dyn MutationOperator>> {
    vec![
        Box::new(operators::FlipRelational),
        Box::new(operators::ConditionalBoundary),
        Box::new(operators::NegateConditional),
        Box::new(operators::ArithmeticReplacement),
        Box::new(operators::LogicalConnector),
        Box::new(operators::Increments),
        Box::new(operators::InvertNegative),
        Box::new(operators::RemoveNegation),
        Box::new(operators::NegateBoolean),
        Box::new(operators::DoubleNegation),
        Box::new(operators::InlineConstant),
        Box::new(operators::ReturnValues),
        Box::new(operators::RemoveConditional),
        Box::new(operators::LoopBreak),
        Box::new(operators::BlockRemove),
    ]
}

pub fn builtin_names() -> Vec<&'static str> {
    builtin_operators().iter().map(|op| op.name()).collect()
}

/// Names of the built-ins that run when no operator list is configured.
pub fn default_names() -> Vec<String> {
    builtin_operators()
        .iter()
        .filter(|op| op.enabled_by_default())
        .map(|op| op.name().to_string())
        .collect()
}
