use std::borrow::Cow;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use crate::ast::Span;
use crate::error::InfraError;
use crate::mutants::TestOutcome;

/// What a test run concluded, as far as the runner could tell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(Vec<TestOutcome>),
    CompileError(String),
    TimedOut,
}

impl RunOutcome {
    pub fn all_passed(&self) -> bool {
        matches!(self, RunOutcome::Completed(outcomes) if outcomes.iter().all(|o| o.passed))
    }
}

/// Where the mutated code lives for one run.
#[derive(Debug, Clone, Copy)]
pub struct RunTarget<'a> {
    /// Root of the worker's project copy; commands run here.
    pub workdir: &'a Path,
    /// The mutated file inside `workdir`.
    pub file: &'a Path,
}

pub trait TestRunner: Send + Sync {
    /// Runs exactly `tests` against `target`, giving up after `timeout`.
    fn run(
        &self,
        tests: &[String],
        target: &RunTarget,
        timeout: Duration,
    ) -> Result<RunOutcome, InfraError>;
}

/// Exit codes `sh` uses when the command itself could not be run.
const SHELL_NOT_EXECUTABLE: i32 = 126;
const SHELL_NOT_FOUND: i32 = 127;

const OUTPUT_TAIL: usize = 4000;

pub const DEFAULT_COMPILE_MARKERS: &[&str] = &[
    "COMPILATION ERROR",
    "Compilation failed",
    "could not compile",
    "compilation terminated",
    "undefined reference to",
];

/// Runs tests through `sh -c` using a command template.
///
/// `{tests}` expands to all selected ids joined by the separator and runs
/// once; `{test}` runs once per id. `{file}` is the mutated file.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    template: String,
    separator: String,
    compile_error_markers: Vec<String>,
    fail_fast: bool,
}

enum Execution {
    Exited { success: bool, code: Option<i32>, output: String },
    TimedOut,
}

impl CommandRunner {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            separator: ",".to_string(),
            compile_error_markers: DEFAULT_COMPILE_MARKERS.iter().map(|s| s.to_string()).collect(),
            fail_fast: true,
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_compile_error_markers(mut self, markers: Vec<String>) -> Self {
        self.compile_error_markers = markers;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn per_test(&self) -> bool {
        !self.template.contains("{tests}") && self.template.contains("{test}")
    }

    /// The shell commands for `tests`, each with the ids it covers. Ids and
    /// the file path are substituted as quoted shell words, so `$`, `*` or
    /// spaces in them reach the command unchanged.
    pub fn expand(
        &self,
        tests: &[String],
        file: &Path,
    ) -> Result<Vec<(String, Vec<String>)>, InfraError> {
        let file = file.to_string_lossy();
        let file = quote(&file)?;
        if self.per_test() {
            tests
                .iter()
                .map(|t| {
                    let cmd = self
                        .template
                        .replace("{test}", &quote(t)?)
                        .replace("{file}", &file);
                    Ok::<_, InfraError>((cmd, vec![t.clone()]))
                })
                .collect()
        } else {
            let quoted = tests
                .iter()
                .map(|t| quote(t))
                .collect::<Result<Vec<_>, _>>()?;
            let joined = quoted.join(self.separator.as_str());
            let cmd = self.template.replace("{tests}", &joined).replace("{file}", &file);
            Ok(vec![(cmd, tests.to_vec())])
        }
    }

    fn is_compile_error(&self, output: &str) -> bool {
        self.compile_error_markers
            .iter()
            .any(|m| !m.is_empty() && output.contains(m.as_str()))
    }

    fn execute(
        &self,
        command: &str,
        target: &RunTarget,
        deadline: Instant,
    ) -> Result<Execution, InfraError> {
        // Output goes to a file rather than a pipe so a chatty test can
        // never block on a full pipe while we poll.
        let mut log = tempfile::tempfile()
            .map_err(|e| InfraError(format!("Failed to create output file: {}", e)))?;
        let stdout = log
            .try_clone()
            .map_err(|e| InfraError(format!("Failed to share output file: {}", e)))?;
        let stderr = log
            .try_clone()
            .map_err(|e| InfraError(format!("Failed to share output file: {}", e)))?;

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(target.workdir)
            .env("MUTSCOPE_FILE", target.file)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        log::debug!("Running `{}` in {}", command, target.workdir.display());
        let mut child = cmd
            .spawn()
            .map_err(|e| InfraError(format!("Failed to run {}: {}", command, e)))?;

        let status = loop {
            match child.try_wait() {
                Ok(Some(exit_status)) => break exit_status,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        kill_tree(&mut child);
                        return Ok(Execution::TimedOut);
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(e) => {
                    kill_tree(&mut child);
                    return Err(InfraError(format!("Lost track of `{}`: {}", command, e)));
                }
            }
        };

        let mut output = String::new();
        log.seek(SeekFrom::Start(0))
            .and_then(|_| log.read_to_string(&mut output))
            .map_err(|e| InfraError(format!("Failed to read test output: {}", e)))?;

        Ok(Execution::Exited {
            success: status.success(),
            code: status.code(),
            output: tail(&output, OUTPUT_TAIL),
        })
    }
}

fn quote(word: &str) -> Result<Cow<'_, str>, InfraError> {
    shlex::try_quote(word)
        .map_err(|e| InfraError(format!("Cannot pass {:?} to the shell: {}", word, e)))
}

/// Kills the whole process group started for a command, then the shell.
fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        let _ = Command::new("kill")
            .arg("-KILL")
            .arg(format!("-{}", child.id()))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
    let _ = child.kill();
    let _ = child.wait();
}

fn tail(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

impl TestRunner for CommandRunner {
    fn run(
        &self,
        tests: &[String],
        target: &RunTarget,
        timeout: Duration,
    ) -> Result<RunOutcome, InfraError> {
        let deadline = Instant::now() + timeout;
        let mut outcomes = Vec::with_capacity(tests.len());

        for (command, covered) in self.expand(tests, target.file)? {
            match self.execute(&command, target, deadline)? {
                Execution::TimedOut => return Ok(RunOutcome::TimedOut),
                Execution::Exited { success, code, output } => {
                    if matches!(code, Some(SHELL_NOT_EXECUTABLE | SHELL_NOT_FOUND)) {
                        return Err(InfraError(format!(
                            "`{}` could not be executed: {}",
                            command,
                            output.trim()
                        )));
                    }
                    if !success && self.is_compile_error(&output) {
                        return Ok(RunOutcome::CompileError(output));
                    }
                    outcomes.extend(covered.into_iter().map(|test| TestOutcome {
                        test,
                        passed: success,
                    }));
                    if !success && self.fail_fast {
                        break;
                    }
                }
            }
        }
        Ok(RunOutcome::Completed(outcomes))
    }
}

/// `source` with `span` replaced. `None` if the span does not fit.
pub fn apply_mutation(source: &str, span: &Span, replacement: &str) -> Option<String> {
    let before = source.get(..span.start_byte)?;
    let after = source.get(span.end_byte..)?;
    let mut result = String::with_capacity(source.len() + replacement.len());
    result.push_str(before);
    result.push_str(replacement);
    result.push_str(after);
    Some(result)
}

pub fn generate_diff(original: &str, mutated: &str) -> String {
    use similar::TextDiff;
    let diff = TextDiff::from_lines(original, mutated);
    let mut output = String::new();
    for change in diff.iter_all_changes() {
        match change.tag() {
            similar::ChangeTag::Delete => {
                output.push_str(&format!("- {}", change));
            }
            similar::ChangeTag::Insert => {
                output.push_str(&format!("+ {}", change));
            }
            _ => {}
        }
    }
    output
}
