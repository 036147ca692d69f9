use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::time::{Duration, Instant};

use crate::copy_tree::Workspace;
use crate::coverage::CoverageIndex;
use crate::error::{EngineError, InfraError, Result};
use crate::mutants::{
    ErrorKind, KillReason, Mutant, MutantId, MutantResult, MutantStatus, SurvivalReason, TestOutcome,
    Verdict,
};
use crate::runner::{RunOutcome, RunTarget, TestRunner};
use crate::safety::MutationGuard;

/// Stops dispatch of new mutants. Mutants already running finish normally.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceMode {
    /// Fresh temp directories, removed when the run ends.
    Temporary,
    /// `<root>/worker-N`, kept between runs.
    Persistent(PathBuf),
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub project_root: PathBuf,
    pub jobs: usize,
    pub timeout: Duration,
    pub infra_retries: u32,
    pub retry_backoff: Duration,
    pub workspace: WorkspaceMode,
    pub session_id: String,
}

/// A scheduled mutant plus the text of the unit it belongs to.
#[derive(Debug, Clone)]
pub struct Job {
    pub mutant: Mutant,
    pub source: Arc<String>,
}

#[derive(Debug, Default)]
pub struct ExecutionSummary {
    /// Mutants never dispatched because the run was cancelled or aborted.
    pub unclassified: Vec<MutantId>,
    pub cancelled: bool,
    pub aborted: Option<String>,
}

enum WorkerEvent {
    Finished(Box<MutantResult>),
    Aborted(String),
}

pub struct Scheduler<'a> {
    config: &'a SchedulerConfig,
    index: &'a CoverageIndex,
    runner: &'a dyn TestRunner,
    cancel: CancelToken,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        config: &'a SchedulerConfig,
        index: &'a CoverageIndex,
        runner: &'a dyn TestRunner,
        cancel: CancelToken,
    ) -> Self {
        Self {
            config,
            index,
            runner,
            cancel,
        }
    }

    /// Executes `jobs`, handing each verdict to `sink` as soon as it is
    /// known. Mutants no test covers are decided without running anything.
    pub fn execute(
        &self,
        jobs: Vec<Job>,
        sink: &mut dyn FnMut(MutantResult),
    ) -> Result<ExecutionSummary> {
        let mut queue = VecDeque::new();
        for mut job in jobs {
            let tests = self
                .index
                .tests_covering(job.mutant.id.path.as_str(), job.mutant.line());
            if tests.is_empty() {
                job.mutant.advance(MutantStatus::Survived)?;
                log::debug!("{}: no covering tests", job.mutant.id);
                sink(MutantResult::new(
                    &job.mutant,
                    &job.source,
                    Verdict::Survived(SurvivalReason::Untested),
                ));
            } else {
                queue.push_back((job, tests));
            }
        }

        if queue.is_empty() {
            return Ok(ExecutionSummary::default());
        }

        let workers = self.config.jobs.max(1).min(queue.len());
        log::info!("Running {} mutants on {} workers", queue.len(), workers);

        let queue = Mutex::new(queue);
        let halt = AtomicBool::new(false);
        let (tx, rx) = mpsc::channel::<WorkerEvent>();
        let mut aborted: Option<String> = None;

        std::thread::scope(|scope| {
            for worker in 0..workers {
                let tx = tx.clone();
                let queue = &queue;
                let halt = &halt;
                scope.spawn(move || self.worker_loop(worker, queue, halt, tx));
            }
            drop(tx);

            for event in rx {
                match event {
                    WorkerEvent::Finished(result) => sink(*result),
                    WorkerEvent::Aborted(reason) => {
                        log::error!("Stopping dispatch: {}", reason);
                        halt.store(true, Ordering::SeqCst);
                        aborted.get_or_insert(reason);
                    }
                }
            }
        });

        let remaining = queue.into_inner().unwrap_or_else(|e| e.into_inner());
        let unclassified: Vec<MutantId> =
            remaining.into_iter().map(|(job, _)| job.mutant.id).collect();
        let cancelled = aborted.is_none() && self.cancel.is_cancelled();
        if cancelled {
            log::warn!("Run cancelled with {} mutants left", unclassified.len());
        }
        Ok(ExecutionSummary {
            unclassified,
            cancelled,
            aborted,
        })
    }

    fn worker_loop(
        &self,
        worker: usize,
        queue: &Mutex<VecDeque<(Job, Vec<String>)>>,
        halt: &AtomicBool,
        tx: mpsc::Sender<WorkerEvent>,
    ) {
        let workspace = match self.open_workspace(worker) {
            Ok(ws) => ws,
            Err(e) => {
                let _ = tx.send(WorkerEvent::Aborted(e.to_string()));
                return;
            }
        };

        loop {
            if halt.load(Ordering::SeqCst) || self.cancel.is_cancelled() {
                return;
            }
            let next = queue.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
            let Some((job, tests)) = next else { return };

            match self.execute_one(&workspace, job, tests) {
                Ok(result) => {
                    let _ = tx.send(WorkerEvent::Finished(Box::new(result)));
                }
                Err(Fatal { result, error }) => {
                    if let Some(result) = result {
                        let _ = tx.send(WorkerEvent::Finished(Box::new(result)));
                    }
                    let _ = tx.send(WorkerEvent::Aborted(error.to_string()));
                    return;
                }
            }
        }
    }

    fn open_workspace(&self, worker: usize) -> Result<Workspace> {
        match &self.config.workspace {
            WorkspaceMode::Temporary => {
                Workspace::temporary(&self.config.project_root, &self.config.session_id, worker)
            }
            WorkspaceMode::Persistent(root) => {
                Workspace::persistent(&self.config.project_root, root, worker)
            }
        }
    }

    /// One mutant from `Scheduled` to its verdict. Only a failed restore
    /// comes back as an error; everything else is a verdict.
    fn execute_one(
        &self,
        workspace: &Workspace,
        job: Job,
        tests: Vec<String>,
    ) -> std::result::Result<MutantResult, Fatal> {
        let Job { mut mutant, source } = job;
        let start = Instant::now();
        mutant.advance(MutantStatus::Running).map_err(Fatal::bare)?;

        let mutated = match mutant.apply(&source) {
            Ok(text) => text,
            Err(e) => {
                mutant.advance(MutantStatus::Error).map_err(Fatal::bare)?;
                return Ok(MutantResult::new(&mutant, &source, Verdict::Error(ErrorKind::Render))
                    .with_diagnostic(e.to_string()));
            }
        };

        let file = workspace.map(Path::new(mutant.id.path.as_str()));
        let target = RunTarget {
            workdir: workspace.root(),
            file: &file,
        };

        let mut attempt = 0;
        let (verdict, outcomes, diagnostic) = loop {
            match self.run_guarded(&file, &mutated, &tests, &target) {
                Ok(Ok(outcome)) => break classify(outcome),
                Ok(Err(infra)) if attempt < self.config.infra_retries => {
                    attempt += 1;
                    let delay = self.backoff(attempt);
                    log::warn!(
                        "{}: {} (retry {}/{} in {:?})",
                        mutant.id,
                        infra,
                        attempt,
                        self.config.infra_retries,
                        delay
                    );
                    std::thread::sleep(delay);
                }
                Ok(Err(infra)) => {
                    break (Verdict::Error(ErrorKind::Infra), Vec::new(), infra.to_string());
                }
                Err(restore) => {
                    log::error!("{}", restore);
                    let _ = mutant.advance(MutantStatus::Error);
                    let verdict = Verdict::Error(ErrorKind::Infra);
                    let result = MutantResult::new(&mutant, &source, verdict)
                        .with_tests(tests, Vec::new())
                        .with_diagnostic(restore.to_string())
                        .with_duration(start.elapsed().as_millis() as u64);
                    return Err(Fatal {
                        result: Some(result),
                        error: restore,
                    });
                }
            }
        };

        mutant.advance(verdict.status()).map_err(Fatal::bare)?;
        log::debug!("{}: {}", mutant.id, verdict.label());
        Ok(MutantResult::new(&mutant, &source, verdict)
            .with_tests(tests, outcomes)
            .with_diagnostic(diagnostic)
            .with_duration(start.elapsed().as_millis() as u64))
    }

    /// Applies the mutant, runs the tests and restores the file. The outer
    /// error is a failed restore; the inner one a runner failure.
    fn run_guarded(
        &self,
        file: &Path,
        mutated: &str,
        tests: &[String],
        target: &RunTarget,
    ) -> Result<std::result::Result<RunOutcome, InfraError>> {
        let guard = match MutationGuard::acquire(file, mutated) {
            Ok(guard) => guard,
            Err(e @ EngineError::RestoreFailure { .. }) => return Err(e),
            Err(e) => {
                return Ok(Err(InfraError(format!(
                    "Failed to apply mutant to {}: {}",
                    file.display(),
                    e
                ))));
            }
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.runner.run(tests, target, self.config.timeout)
        }))
        .unwrap_or_else(|payload| {
            Err(InfraError(format!(
                "test runner panicked: {}",
                panic_message(&*payload)
            )))
        });

        guard.release()?;
        Ok(outcome)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.config.retry_backoff.as_millis() as u64 * u64::from(attempt);
        let jitter = if base > 1 { fastrand::u64(0..base / 2) } else { 0 };
        Duration::from_millis(base + jitter)
    }
}

struct Fatal {
    result: Option<MutantResult>,
    error: EngineError,
}

impl Fatal {
    fn bare(error: EngineError) -> Self {
        Fatal {
            result: None,
            error,
        }
    }
}

fn classify(outcome: RunOutcome) -> (Verdict, Vec<TestOutcome>, String) {
    match outcome {
        RunOutcome::TimedOut => (
            Verdict::Killed(KillReason::Timeout),
            Vec::new(),
            "timed out".to_string(),
        ),
        RunOutcome::CompileError(output) => {
            (Verdict::Killed(KillReason::CompileError), Vec::new(), output)
        }
        RunOutcome::Completed(outcomes) => {
            if outcomes.iter().all(|o| o.passed) {
                (Verdict::Survived(SurvivalReason::Tested), outcomes, String::new())
            } else {
                let failed: Vec<&str> = outcomes
                    .iter()
                    .filter(|o| !o.passed)
                    .map(|o| o.test.as_str())
                    .collect();
                let diagnostic = format!("failed: {}", failed.join(", "));
                (Verdict::Killed(KillReason::TestFailure), outcomes, diagnostic)
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
