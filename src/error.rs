use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A unit that could not be parsed. Reported, never swallowed: the unit is
/// excluded from mutation and the run carries on with the others.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{path}:{line}:{column}: {message}")]
pub struct ParseError {
    pub path: Utf8PathBuf,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// A rewrite that threw or produced output that cannot be rendered.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("operator '{operator}' failed: {reason}")]
pub struct OperatorError {
    pub operator: String,
    pub reason: String,
}

/// The test runner could not be started or crashed underneath us.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("test runner failure: {0}")]
pub struct InfraError(pub String);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Coverage parsing error: {0}")]
    Coverage(String),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Operator(#[from] OperatorError),

    #[error(transparent)]
    Infra(#[from] InfraError),

    #[error("Illegal status transition for {mutant}: {from:?} -> {to:?}")]
    IllegalTransition {
        mutant: String,
        from: crate::mutants::MutantStatus,
        to: crate::mutants::MutantStatus,
    },

    #[error("Result for {0} was already recorded")]
    DuplicateResult(String),

    #[error("Failed to restore {path} to its original content: {reason}")]
    RestoreFailure { path: Utf8PathBuf, reason: String },

    #[error("Workspace error: {0}")]
    Workspace(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
