use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use camino::Utf8PathBuf;
use rayon::prelude::*;

use crate::aggregator::{Completion, Report, ResultAggregator};
use crate::ast::SourceUnit;
use crate::catalog::Catalog;
use crate::coverage::CoverageIndex;
use crate::equivalence::{EquivalenceFilter, EquivalenceRegistry, FilterDecision};
use crate::error::{EngineError, ParseError, Result};
use crate::generator::{self, GenerateOptions};
use crate::mutants::{ErrorKind, MutantResult, MutantStatus, Verdict};
use crate::parser;
use crate::runner::TestRunner;
use crate::scheduler::{CancelToken, Job, Scheduler, SchedulerConfig};
use crate::{Language, detect_language};

/// One input file, its path relative to the project root.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: Utf8PathBuf,
    pub language: Language,
    pub text: String,
}

/// Reads `files` and expresses their paths relative to `project_root`, the
/// form used in mutant ids, coverage lookups and worker copies.
pub fn load_sources(project_root: &Path, files: &[PathBuf]) -> Result<Vec<SourceFile>> {
    let root = project_root.canonicalize()?;
    let mut sources = Vec::with_capacity(files.len());
    for file in files {
        let language = detect_language(file).ok_or_else(|| {
            EngineError::Config(format!(
                "{}: unsupported file type (expected .java, .c, .h or .rs)",
                file.display()
            ))
        })?;
        let absolute = file.canonicalize()?;
        let relative = absolute.strip_prefix(&root).map_err(|_| {
            EngineError::Config(format!(
                "{} is outside the project root {}",
                file.display(),
                root.display()
            ))
        })?;
        let path = Utf8PathBuf::from_path_buf(relative.to_path_buf()).map_err(|p| {
            EngineError::Config(format!("{} is not valid UTF-8", p.display()))
        })?;
        let text = std::fs::read_to_string(&absolute)?;
        sources.push(SourceFile {
            path,
            language,
            text,
        });
    }
    Ok(sources)
}

/// The context of one run: everything is built up front and only borrowed.
pub struct Engine<'a> {
    pub catalog: &'a Catalog,
    pub registry: &'a EquivalenceRegistry,
    pub index: &'a CoverageIndex,
    pub runner: &'a dyn TestRunner,
    pub scheduler: SchedulerConfig,
    pub options: GenerateOptions,
    pub cancel: CancelToken,
}

struct UnitWork {
    decided: Vec<MutantResult>,
    jobs: Vec<Job>,
}

impl<'a> Engine<'a> {
    pub fn run(
        &self,
        files: &[SourceFile],
        on_result: &mut dyn FnMut(&MutantResult),
    ) -> Result<Report> {
        let start = Instant::now();
        let mut aggregator = ResultAggregator::new();

        let parsed: Vec<std::result::Result<SourceUnit, ParseError>> = files
            .par_iter()
            .map(|f| parser::parse(f.language, f.path.clone(), &f.text))
            .collect();
        let mut units = Vec::with_capacity(parsed.len());
        for outcome in parsed {
            match outcome {
                Ok(unit) => units.push(unit),
                Err(e) => {
                    log::warn!("Skipping unparseable unit {}", e);
                    aggregator.record_parse_failure(e);
                }
            }
        }
        log::info!("Parsed {} of {} units", units.len(), files.len());

        if let Some(function) = &self.options.function {
            units.retain(|u| u.find_function(function).is_some());
            if units.is_empty() {
                return Err(EngineError::Config(format!(
                    "function '{}' not found in any input file",
                    function
                )));
            }
        }

        let work: Vec<UnitWork> = units
            .par_iter()
            .map(|unit| self.prepare_unit(unit))
            .collect::<Result<_>>()?;

        let mut jobs = Vec::new();
        let mut equivalent = 0;
        for unit_work in work {
            for result in unit_work.decided {
                if matches!(result.verdict, Verdict::Equivalent(_)) {
                    equivalent += 1;
                }
                self.record(&mut aggregator, result, on_result);
            }
            jobs.extend(unit_work.jobs);
        }
        log::info!(
            "Generated {} mutants: {} equivalent pruned, {} scheduled",
            aggregator.len() + jobs.len(),
            equivalent,
            jobs.len()
        );

        let scheduler = Scheduler::new(&self.scheduler, self.index, self.runner, self.cancel.clone());
        let execution = scheduler.execute(jobs, &mut |result| {
            self.record(&mut aggregator, result, on_result)
        })?;

        let completion = match execution.aborted {
            Some(reason) => Completion::Aborted(reason),
            None if execution.cancelled => Completion::Cancelled,
            None => Completion::Complete,
        };
        let report = aggregator.into_report(
            completion,
            execution.unclassified,
            start.elapsed().as_millis() as u64,
        );
        log::info!(
            "Mutation score {:.1}% ({} killed, {} survived, {} equivalent, {} errors)",
            report.summary.mutation_score * 100.0,
            report.summary.killed,
            report.summary.survived,
            report.summary.equivalent,
            report.summary.errors
        );
        Ok(report)
    }

    /// Generates and filters one unit's mutants. Equivalent and broken
    /// mutants are decided here; the rest become jobs.
    fn prepare_unit(&self, unit: &SourceUnit) -> Result<UnitWork> {
        let filter = EquivalenceFilter::new(self.registry);
        let source = Arc::new(unit.text.clone());
        let mut work = UnitWork {
            decided: Vec::new(),
            jobs: Vec::new(),
        };

        for mut mutant in &generator::generate(unit, self.catalog, &self.options) {
            if mutant.status == MutantStatus::Error {
                work.decided.push(MutantResult::new(
                    &mutant,
                    &source,
                    Verdict::Error(ErrorKind::Operator),
                ));
                continue;
            }
            match filter.apply(&mut mutant)? {
                FilterDecision::Equivalent(reason) => {
                    work.decided
                        .push(MutantResult::new(&mutant, &source, Verdict::Equivalent(reason)));
                }
                FilterDecision::Schedule { .. } => work.jobs.push(Job {
                    mutant,
                    source: Arc::clone(&source),
                }),
            }
        }
        Ok(work)
    }

    fn record(
        &self,
        aggregator: &mut ResultAggregator,
        result: MutantResult,
        on_result: &mut dyn FnMut(&MutantResult),
    ) {
        on_result(&result);
        if let Err(e) = aggregator.record(result) {
            log::warn!("{}", e);
        }
    }
}
