use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, ParseError, Result};
use crate::mutants::{MutantId, MutantResult, SurvivalReason, Verdict};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub killed: usize,
    pub survived: usize,
    pub survived_untested: usize,
    pub equivalent: usize,
    pub errors: usize,
    pub parse_errors: usize,
    pub mutation_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatorStats {
    pub total: usize,
    pub killed: usize,
    pub survived: usize,
    pub equivalent: usize,
    pub errors: usize,
    pub score: f64,
}

/// Killed over killed plus survived. Nothing to judge counts as perfect.
pub fn mutation_score(killed: usize, survived: usize) -> f64 {
    let denominator = killed + survived;
    if denominator == 0 {
        1.0
    } else {
        killed as f64 / denominator as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason")]
pub enum Completion {
    Complete,
    Cancelled,
    Aborted(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub completion: Completion,
    pub summary: Summary,
    pub operator_stats: BTreeMap<String, OperatorStats>,
    /// Sorted by mutant identity.
    pub results: Vec<MutantResult>,
    pub parse_failures: Vec<ParseError>,
    pub unclassified: Vec<MutantId>,
    pub duration_ms: u64,
}

impl Report {
    pub fn survivors(&self) -> impl Iterator<Item = &MutantResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.verdict, Verdict::Survived(_)))
    }
}

/// Accepts each mutant's result exactly once, in any order.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    results: BTreeMap<MutantId, MutantResult>,
    parse_failures: Vec<ParseError>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects a second result for the same mutant; the first one stays.
    pub fn record(&mut self, result: MutantResult) -> Result<()> {
        if self.results.contains_key(&result.id) {
            return Err(EngineError::DuplicateResult(result.id.to_string()));
        }
        self.results.insert(result.id.clone(), result);
        Ok(())
    }

    pub fn record_parse_failure(&mut self, error: ParseError) {
        self.parse_failures.push(error);
    }

    pub fn get(&self, id: &MutantId) -> Option<&MutantResult> {
        self.results.get(id)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            total: self.results.len(),
            parse_errors: self.parse_failures.len(),
            ..Summary::default()
        };
        for result in self.results.values() {
            match result.verdict {
                Verdict::Killed(_) => summary.killed += 1,
                Verdict::Survived(reason) => {
                    summary.survived += 1;
                    if reason == SurvivalReason::Untested {
                        summary.survived_untested += 1;
                    }
                }
                Verdict::Equivalent(_) => summary.equivalent += 1,
                Verdict::Error(_) => summary.errors += 1,
            }
        }
        summary.mutation_score = mutation_score(summary.killed, summary.survived);
        summary
    }

    pub fn operator_stats(&self) -> BTreeMap<String, OperatorStats> {
        let mut stats: BTreeMap<String, OperatorStats> = BTreeMap::new();
        for result in self.results.values() {
            let entry = stats.entry(result.id.operator.clone()).or_default();
            entry.total += 1;
            match result.verdict {
                Verdict::Killed(_) => entry.killed += 1,
                Verdict::Survived(_) => entry.survived += 1,
                Verdict::Equivalent(_) => entry.equivalent += 1,
                Verdict::Error(_) => entry.errors += 1,
            }
        }
        for entry in stats.values_mut() {
            entry.score = mutation_score(entry.killed, entry.survived);
        }
        stats
    }

    pub fn into_report(
        self,
        completion: Completion,
        mut unclassified: Vec<MutantId>,
        duration_ms: u64,
    ) -> Report {
        let summary = self.summary();
        let operator_stats = self.operator_stats();
        unclassified.sort();
        let mut parse_failures = self.parse_failures;
        parse_failures.sort_by(|a, b| a.path.cmp(&b.path));
        Report {
            completion,
            summary,
            operator_stats,
            results: self.results.into_values().collect(),
            parse_failures,
            unclassified,
            duration_ms,
        }
    }
}
