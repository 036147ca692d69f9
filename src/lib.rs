pub mod aggregator;
pub mod ast;
pub mod catalog;
pub mod config;
pub mod copy_tree;
pub mod coverage;
pub mod equivalence;
pub mod error;
pub mod generator;
pub mod mutants;
pub mod operators;
pub mod output;
pub mod parser;
pub mod parser_c;
pub mod parser_java;
pub mod parser_rust;
pub mod pipeline;
pub mod runner;
pub mod safety;
pub mod scheduler;
pub mod state;
pub mod ted;

pub use error::{EngineError, Result};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Java,
    C,
    Rust,
}

impl Language {
    pub fn name(self) -> &'static str {
        match self {
            Language::Java => "java",
            Language::C => "c",
            Language::Rust => "rust",
        }
    }

    /// Whether `!!e` is always `e` in this language. In C `!` maps any
    /// non-zero value to 1, so double negation is only an identity on
    /// boolean-valued operands.
    pub fn negation_is_involution(self) -> bool {
        !matches!(self, Language::C)
    }
}

pub fn detect_language(path: &std::path::Path) -> Option<Language> {
    match path.extension()?.to_str()? {
        "java" => Some(Language::Java),
        "c" | "h" => Some(Language::C),
        "rs" => Some(Language::Rust),
        _ => None,
    }
}
