use std::collections::BTreeSet;

use mutscope::coverage::{self, CoverageIndex, CoverageRecord};
use tempfile::TempDir;

fn record(unit: &str, line: usize, tests: &[&str]) -> CoverageRecord {
    CoverageRecord {
        unit: unit.to_string(),
        line,
        branch: None,
        tests: tests.iter().map(|t| t.to_string()).collect(),
    }
}

#[test]
fn index_answers_by_unit_and_line() {
    let index = CoverageIndex::build(vec![
        record("src/Max.java", 4, &["T3", "T1"]),
        record("src/Max.java", 5, &["T2"]),
    ]);
    assert_eq!(index.tests_covering("src/Max.java", 4), vec!["T1", "T3"]);
    assert_eq!(index.tests_covering("src/Max.java", 5), vec!["T2"]);
    assert!(index.tests_covering("src/Max.java", 6).is_empty());
    assert!(index.tests_covering("src/Min.java", 4).is_empty());
}

#[test]
fn records_for_the_same_line_merge() {
    let index = CoverageIndex::build(vec![
        record("a.c", 1, &["t1"]),
        record("a.c", 1, &["t2", "t1"]),
    ]);
    assert_eq!(index.tests_covering("a.c", 1), vec!["t1", "t2"]);
    assert_eq!(index.covered_lines(), 1);
}

#[test]
fn unit_paths_are_normalized() {
    let index = CoverageIndex::build(vec![record("./src\\lib.rs", 3, &["t"])]);
    assert_eq!(index.tests_covering("src/lib.rs", 3), vec!["t"]);
    assert_eq!(index.tests_covering("./src/lib.rs", 3), vec!["t"]);
    assert_eq!(index.units(), BTreeSet::from(["src/lib.rs"]));
}

#[test]
fn branch_records_are_also_line_records() {
    let mut branch = record("a.c", 7, &["t_true"]);
    branch.branch = Some(0);
    let index = CoverageIndex::build(vec![branch]);
    assert_eq!(index.tests_covering_branch("a.c", 7, 0), vec!["t_true"]);
    assert!(index.tests_covering_branch("a.c", 7, 1).is_empty());
    assert_eq!(index.tests_covering("a.c", 7), vec!["t_true"]);
}

#[test]
fn empty_index() {
    let index = CoverageIndex::build(Vec::new());
    assert!(index.is_empty());
    assert!(index.tests_covering("x", 1).is_empty());
}

// --- loading ---

#[test]
fn load_json_records() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("coverage.json");
    std::fs::write(
        &path,
        r#"[
            {"unit": "Max.java", "line": 3, "tests": ["MaxTest#big"]},
            {"unit": "Max.java", "line": 3, "branch": 1, "tests": ["MaxTest#small"]}
        ]"#,
    )
    .unwrap();
    let records = coverage::load_json(&path).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].branch, Some(1));

    let index = CoverageIndex::build(records);
    assert_eq!(index.tests_covering("Max.java", 3), vec!["MaxTest#big", "MaxTest#small"]);
}

#[test]
fn malformed_json_is_a_coverage_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("coverage.json");
    std::fs::write(&path, r#"[{"unit": "Max.java"}]"#).unwrap();
    let err = coverage::load_json(&path).unwrap_err();
    assert!(err.to_string().contains("Coverage"));
}

#[test]
fn lcov_directory_maps_files_to_tests() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("proj");
    let traces = dir.path().join("traces");
    std::fs::create_dir_all(&traces).unwrap();

    let sf = root.join("src").join("max.c");
    std::fs::write(
        traces.join("test_big.info"),
        format!("SF:{}\nDA:2,1\nDA:3,0\nend_of_record\n", sf.display()),
    )
    .unwrap();
    std::fs::write(
        traces.join("test_small.info"),
        format!("SF:{}\nDA:2,4\nDA:3,2\nend_of_record\n", sf.display()),
    )
    .unwrap();
    std::fs::write(traces.join("notes.txt"), "ignored").unwrap();

    let records = coverage::load_lcov_dir(&traces, Some(&root)).unwrap();
    let index = CoverageIndex::build(records);
    assert_eq!(index.tests_covering("src/max.c", 2), vec!["test_big", "test_small"]);
    assert_eq!(index.tests_covering("src/max.c", 3), vec!["test_small"]);
}
