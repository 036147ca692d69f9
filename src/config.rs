use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::{self, RewritePolicy};
use crate::error::{EngineError, Result};
use crate::runner::DEFAULT_COMPILE_MARKERS;

pub const DEFAULT_CONFIG_FILE: &str = "mutscope.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Shell command template containing `{tests}` or `{test}`.
    #[serde(default)]
    pub test_command: String,
    #[serde(default = "default_separator")]
    pub test_separator: String,
    /// Per-mutant time limit.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    /// Operator names to run. Defaults to every default-enabled built-in.
    #[serde(default = "catalog::default_names")]
    pub operators: Vec<String>,
    #[serde(default)]
    pub max_rewrites_per_operator: Option<usize>,
    #[serde(default)]
    pub exclusive_operators: bool,
    #[serde(default = "default_infra_retries")]
    pub infra_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_compile_markers")]
    pub compile_error_markers: Vec<String>,
    #[serde(default = "default_fail_fast")]
    pub fail_fast: bool,
    #[serde(default)]
    pub equivalence_registry: Option<PathBuf>,
    /// Keep worker copies here between runs instead of in temp directories.
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,
    /// Overrides the per-language defaults when set.
    #[serde(default)]
    pub skip_call_prefixes: Option<Vec<String>>,
    /// JSON coverage record files.
    #[serde(default)]
    pub coverage: Vec<PathBuf>,
    /// Directories of per-test LCOV traces.
    #[serde(default)]
    pub lcov_dirs: Vec<PathBuf>,
}

fn default_separator() -> String {
    ",".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_infra_retries() -> u32 {
    1
}

fn default_retry_backoff_ms() -> u64 {
    250
}

fn default_compile_markers() -> Vec<String> {
    DEFAULT_COMPILE_MARKERS.iter().map(|s| s.to_string()).collect()
}

fn default_fail_fast() -> bool {
    true
}

fn anchor(path: &mut PathBuf, base: &Path) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            test_command: String::new(),
            test_separator: default_separator(),
            timeout_secs: default_timeout_secs(),
            jobs: default_jobs(),
            operators: catalog::default_names(),
            max_rewrites_per_operator: None,
            exclusive_operators: false,
            infra_retries: default_infra_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            compile_error_markers: default_compile_markers(),
            fail_fast: default_fail_fast(),
            equivalence_registry: None,
            workspace_root: None,
            skip_call_prefixes: None,
            coverage: Vec::new(),
            lcov_dirs: Vec::new(),
        }
    }
}

impl Settings {
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        serde_yaml::from_str(&content).map_err(|e| {
            EngineError::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// `path` if given, else `mutscope.yaml` in `dir` if present, else the
    /// defaults.
    pub fn discover(path: Option<&Path>, dir: &Path) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let candidate = dir.join(DEFAULT_CONFIG_FILE);
                if candidate.is_file() {
                    log::debug!("Using {}", candidate.display());
                    Self::load(&candidate)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let known = catalog::builtin_names();
        if let Some(unknown) = self.operators.iter().find(|op| !known.contains(&op.as_str())) {
            return Err(EngineError::Config(format!(
                "unknown operator '{}' (available: {})",
                unknown,
                known.join(", ")
            )));
        }
        if self.jobs == 0 {
            return Err(EngineError::Config("jobs must be at least 1".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(EngineError::Config("timeout_secs must be at least 1".to_string()));
        }
        if !self.test_command.contains("{tests}") && !self.test_command.contains("{test}") {
            return Err(EngineError::Config(format!(
                "test_command must contain {{tests}} or {{test}}: '{}'",
                self.test_command
            )));
        }
        if self.max_rewrites_per_operator == Some(0) {
            return Err(EngineError::Config(
                "max_rewrites_per_operator must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Paths written in the file are relative to `project_root`, not to the
    /// directory the tool was started from.
    pub fn resolve_paths(&mut self, project_root: &Path) -> Result<()> {
        if let Some(path) = &mut self.equivalence_registry {
            anchor(path, project_root);
        }
        if let Some(path) = &mut self.workspace_root {
            anchor(path, project_root);
        }
        for path in self.coverage.iter_mut().chain(self.lcov_dirs.iter_mut()) {
            anchor(path, project_root);
        }

        if let Some(workspace) = &self.workspace_root {
            let workspace = workspace.canonicalize().unwrap_or_else(|_| workspace.clone());
            let project = project_root
                .canonicalize()
                .unwrap_or_else(|_| project_root.to_path_buf());
            if workspace == project {
                return Err(EngineError::Config(format!(
                    "workspace_root must not be the project root itself: {}",
                    workspace.display()
                )));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn rewrite_policy(&self) -> RewritePolicy {
        RewritePolicy {
            max_rewrites_per_operator: self.max_rewrites_per_operator,
            exclusive_operators: self.exclusive_operators,
        }
    }
}
