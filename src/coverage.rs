use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageRecord {
    pub unit: String,
    pub line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<u32>,
    pub tests: BTreeSet<String>,
}

/// `./src\Foo.java` and `src/Foo.java` name the same unit.
pub fn normalize_unit(path: &str) -> String {
    let mut unified = path.replace('\\', "/");
    while let Some(rest) = unified.strip_prefix("./") {
        unified = rest.to_string();
    }
    unified
}

/// Read-only after [`CoverageIndex::build`], so workers share it by
/// reference without locking.
#[derive(Debug, Default)]
pub struct CoverageIndex {
    lines: HashMap<(String, usize), BTreeSet<String>>,
    branches: HashMap<(String, usize, u32), BTreeSet<String>>,
}

impl CoverageIndex {
    pub fn build(records: impl IntoIterator<Item = CoverageRecord>) -> Self {
        let mut index = CoverageIndex::default();
        for record in records {
            let unit = normalize_unit(&record.unit);
            if let Some(branch) = record.branch {
                index
                    .branches
                    .entry((unit.clone(), record.line, branch))
                    .or_default()
                    .extend(record.tests.iter().cloned());
            }
            index
                .lines
                .entry((unit, record.line))
                .or_default()
                .extend(record.tests);
        }
        log::debug!("Coverage index holds {} covered lines", index.lines.len());
        index
    }

    /// Tests that execute `line` of `unit`, sorted. Empty when nothing does.
    pub fn tests_covering(&self, unit: &str, line: usize) -> Vec<String> {
        self.lines
            .get(&(normalize_unit(unit), line))
            .map(|tests| tests.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn tests_covering_branch(&self, unit: &str, line: usize, branch: u32) -> Vec<String> {
        self.branches
            .get(&(normalize_unit(unit), line, branch))
            .map(|tests| tests.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn covered_lines(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn units(&self) -> BTreeSet<&str> {
        self.lines.keys().map(|(unit, _)| unit.as_str()).collect()
    }
}

/// A JSON array of `{unit, line, branch?, tests}` records.
pub fn load_json(path: &Path) -> Result<Vec<CoverageRecord>> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| EngineError::Coverage(format!("{}: {}", path.display(), e)))
}

/// `path` below `root`, trying the resolved path when the literal one is
/// spelled through a symlink.
fn relative_to(path: &Path, root: &Path) -> Option<PathBuf> {
    if let Ok(relative) = path.strip_prefix(root) {
        return Some(relative.to_path_buf());
    }
    let resolved = path.canonicalize().ok()?;
    let root = root.canonicalize().ok()?;
    resolved.strip_prefix(&root).ok().map(Path::to_path_buf)
}

/// Covered lines of one test's LCOV trace. Absolute source paths under
/// `root` are made relative to it.
pub fn parse_lcov(content: &str, test: &str, root: Option<&Path>) -> Result<Vec<CoverageRecord>> {
    let file_pattern = Regex::new(r"^SF:(.+)$")?;
    let line_pattern = Regex::new(r"^DA:(\d+),(\d+)(?:,.*)?$")?;

    let mut records = Vec::new();
    let mut current_file: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();

        if let Some(captures) = file_pattern.captures(line) {
            let full_path = Path::new(&captures[1]);
            let relative = root
                .and_then(|r| relative_to(full_path, r))
                .unwrap_or_else(|| full_path.to_path_buf());
            current_file = Some(normalize_unit(&relative.to_string_lossy()));
            continue;
        }
        if line == "end_of_record" {
            current_file = None;
            continue;
        }

        if let Some(captures) = line_pattern.captures(line) {
            let Some(file) = &current_file else {
                return Err(EngineError::Coverage(format!(
                    "DA record outside of a source file in trace for {}",
                    test
                )));
            };
            let line_number: usize = captures[1]
                .parse()
                .map_err(|_| EngineError::Coverage("Invalid line number".to_string()))?;
            let hits: u64 = captures[2]
                .parse()
                .map_err(|_| EngineError::Coverage("Invalid hit count".to_string()))?;

            if hits > 0 {
                records.push(CoverageRecord {
                    unit: file.clone(),
                    line: line_number,
                    branch: None,
                    tests: BTreeSet::from([test.to_string()]),
                });
            }
        }
    }

    Ok(records)
}

/// One LCOV file per test: `<dir>/<test id>.info` (or `.lcov`).
pub fn load_lcov_dir(dir: &Path, root: Option<&Path>) -> Result<Vec<CoverageRecord>> {
    let mut paths: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("info" | "lcov")
            )
        })
        .collect();
    paths.sort();

    let mut records = Vec::new();
    for path in paths {
        let Some(test) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let content = fs::read_to_string(&path)?;
        records.extend(parse_lcov(&content, test, root)?);
    }
    log::info!("Read {} covered lines from {}", records.len(), dir.display());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lcov_keeps_hit_lines() {
        let trace = "SF:/work/proj/src/Max.java\nDA:1,5\nDA:2,0\nDA:3,10\nend_of_record\n";
        let records = parse_lcov(trace, "MaxTest#big", Some(Path::new("/work/proj"))).unwrap();
        let lines: Vec<usize> = records.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![1, 3]);
        assert!(records.iter().all(|r| r.unit == "src/Max.java"));
    }

    #[test]
    fn test_da_without_source_file_is_an_error() {
        assert!(parse_lcov("DA:1,1\n", "t", None).is_err());
    }
}
