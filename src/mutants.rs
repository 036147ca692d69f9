use std::fmt;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::Language;
use crate::ast::{Span, SyntaxNode};
use crate::error::{EngineError, OperatorError, Result};
use crate::runner;

/// Identity of a mutant. Ordering is by unit path, then source position,
/// then operator and rewrite index, which is also the report order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MutantId {
    pub path: Utf8PathBuf,
    pub start_byte: usize,
    pub end_byte: usize,
    pub operator: String,
    pub index: usize,
}

impl fmt::Display for MutantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}..{}:{}#{}",
            self.path, self.start_byte, self.end_byte, self.operator, self.index
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutantStatus {
    Generated,
    Filtered,
    Scheduled,
    Running,
    Killed,
    Survived,
    Equivalent,
    Error,
}

impl MutantStatus {
    pub fn can_transition_to(self, to: MutantStatus) -> bool {
        use MutantStatus::*;
        matches!(
            (self, to),
            (Generated, Filtered)
                | (Generated, Error)
                | (Filtered, Equivalent)
                | (Filtered, Scheduled)
                | (Scheduled, Running)
                | (Scheduled, Survived)
                | (Scheduled, Error)
                | (Running, Killed)
                | (Running, Survived)
                | (Running, Error)
        )
    }
}

#[derive(Debug, Clone)]
pub struct Mutant {
    pub id: MutantId,
    pub language: Language,
    /// Span of the original node; the replacement is spliced in here.
    pub span: Span,
    pub description: &'static str,
    pub original: SyntaxNode,
    pub replacement: std::result::Result<SyntaxNode, OperatorError>,
    pub status: MutantStatus,
    pub context_before: Vec<String>,
    pub context_after: Vec<String>,
}

impl Mutant {
    pub fn line(&self) -> usize {
        self.span.start_line
    }

    pub fn column(&self) -> usize {
        self.span.start_column
    }

    pub fn advance(&mut self, to: MutantStatus) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(EngineError::IllegalTransition {
                mutant: self.id.to_string(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    pub fn original_text<'s>(&self, source: &'s str) -> &'s str {
        source
            .get(self.span.start_byte..self.span.end_byte)
            .unwrap_or("")
    }

    pub fn replacement_text(&self, source: &str) -> Option<String> {
        self.replacement.as_ref().ok().map(|r| r.render(source))
    }

    /// The whole unit text with this mutant applied.
    pub fn apply(&self, source: &str) -> std::result::Result<String, OperatorError> {
        let replacement = self.replacement.as_ref().map_err(Clone::clone)?;
        runner::apply_mutation(source, &self.span, &replacement.render(source)).ok_or_else(|| {
            OperatorError {
                operator: self.id.operator.clone(),
                reason: format!(
                    "span {}..{} does not fit the unit text",
                    self.span.start_byte, self.span.end_byte
                ),
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KillReason {
    TestFailure,
    CompileError,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurvivalReason {
    /// Covering tests ran and all passed.
    Tested,
    /// No test covers the mutated line; nothing was run.
    Untested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EquivalenceReason {
    ZeroDistance,
    RegistryMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Operator,
    Infra,
    Render,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "reason")]
pub enum Verdict {
    Killed(KillReason),
    Survived(SurvivalReason),
    Equivalent(EquivalenceReason),
    Error(ErrorKind),
}

impl Verdict {
    pub fn status(self) -> MutantStatus {
        match self {
            Verdict::Killed(_) => MutantStatus::Killed,
            Verdict::Survived(_) => MutantStatus::Survived,
            Verdict::Equivalent(_) => MutantStatus::Equivalent,
            Verdict::Error(_) => MutantStatus::Error,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Verdict::Killed(KillReason::TestFailure) => "killed",
            Verdict::Killed(KillReason::CompileError) => "killed (compile error)",
            Verdict::Killed(KillReason::Timeout) => "killed (timeout)",
            Verdict::Survived(SurvivalReason::Tested) => "survived",
            Verdict::Survived(SurvivalReason::Untested) => "survived (no covering tests)",
            Verdict::Equivalent(EquivalenceReason::ZeroDistance) => "equivalent",
            Verdict::Equivalent(EquivalenceReason::RegistryMatch) => "equivalent (known shape)",
            Verdict::Error(ErrorKind::Operator) => "error (operator)",
            Verdict::Error(ErrorKind::Infra) => "error (infrastructure)",
            Verdict::Error(ErrorKind::Render) => "error (render)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub test: String,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutantResult {
    pub id: MutantId,
    pub line: usize,
    pub column: usize,
    pub original: String,
    pub replacement: String,
    pub verdict: Verdict,
    pub tests_run: Vec<String>,
    pub outcomes: Vec<TestOutcome>,
    pub diagnostic: String,
    pub diff: String,
    pub context_before: Vec<String>,
    pub context_after: Vec<String>,
    pub duration_ms: u64,
}

impl MutantResult {
    pub fn new(mutant: &Mutant, source: &str, verdict: Verdict) -> Self {
        let diff = match mutant.apply(source) {
            Ok(mutated) => runner::generate_diff(source, &mutated),
            Err(_) => String::new(),
        };
        let diagnostic = match &mutant.replacement {
            Err(e) => e.to_string(),
            Ok(_) => String::new(),
        };
        MutantResult {
            id: mutant.id.clone(),
            line: mutant.line(),
            column: mutant.column(),
            original: mutant.original_text(source).to_string(),
            replacement: mutant.replacement_text(source).unwrap_or_default(),
            verdict,
            tests_run: Vec::new(),
            outcomes: Vec::new(),
            diagnostic,
            diff,
            context_before: mutant.context_before.clone(),
            context_after: mutant.context_after.clone(),
            duration_ms: 0,
        }
    }

    pub fn with_tests(mut self, tests: Vec<String>, outcomes: Vec<TestOutcome>) -> Self {
        self.tests_run = tests;
        self.outcomes = outcomes;
        self
    }

    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostic = diagnostic.into();
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}
