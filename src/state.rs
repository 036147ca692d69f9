use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::aggregator::{Completion, Report};
use crate::error::Result;
use crate::mutants::{SurvivalReason, Verdict};

pub const STATE_FILE: &str = ".mutscope-state.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub completion: Completion,
    pub score: f64,
    pub total: usize,
    pub killed: usize,
    pub survived: usize,
    pub survived_untested: usize,
    pub equivalent: usize,
    pub errors: usize,
    pub parse_errors: usize,
    pub unclassified: usize,
    pub duration_ms: u64,
    pub survived_mutants: Vec<SurvivedMutant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivedMutant {
    pub ref_id: String,
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub operator: String,
    pub original: String,
    pub replacement: String,
    /// No test covered the line, so nothing ran.
    pub untested: bool,
    pub tests_run: Vec<String>,
    pub diff: String,
    pub context_before: Vec<String>,
    pub context_after: Vec<String>,
}

impl RunResult {
    /// Survivors get refs `m1`, `m2`, … in report order.
    pub fn from_report(report: &Report) -> Self {
        let survived_mutants = report
            .survivors()
            .enumerate()
            .map(|(i, r)| SurvivedMutant {
                ref_id: format!("m{}", i + 1),
                file: r.id.path.to_string(),
                line: r.line,
                column: r.column,
                operator: r.id.operator.clone(),
                original: r.original.clone(),
                replacement: r.replacement.clone(),
                untested: r.verdict == Verdict::Survived(SurvivalReason::Untested),
                tests_run: r.tests_run.clone(),
                diff: r.diff.clone(),
                context_before: r.context_before.clone(),
                context_after: r.context_after.clone(),
            })
            .collect();

        let summary = &report.summary;
        RunResult {
            completion: report.completion.clone(),
            score: summary.mutation_score,
            total: summary.total,
            killed: summary.killed,
            survived: summary.survived,
            survived_untested: summary.survived_untested,
            equivalent: summary.equivalent,
            errors: summary.errors,
            parse_errors: summary.parse_errors,
            unclassified: report.unclassified.len(),
            duration_ms: report.duration_ms,
            survived_mutants,
        }
    }

    pub fn find(&self, mutant_ref: &str) -> Option<&SurvivedMutant> {
        let ref_id = mutant_ref.trim_start_matches('@');
        self.survived_mutants.iter().find(|m| m.ref_id == ref_id)
    }
}

pub fn state_path(dir: &Path) -> PathBuf {
    dir.join(STATE_FILE)
}

fn cwd() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

pub fn save_last_run(result: &RunResult) -> Result<()> {
    save_to_path(result, &state_path(&cwd()))
}

pub fn load_last_run() -> Option<RunResult> {
    load_from_path(&state_path(&cwd()))
}

pub fn save_to_path(result: &RunResult, path: &Path) -> Result<()> {
    let json = serde_json::to_string(result)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn load_from_path(path: &Path) -> Option<RunResult> {
    let data = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&data).ok()
}
