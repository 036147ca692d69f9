use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use mutscope::Language;
use mutscope::ast::{NodeKind, SyntaxNode};
use mutscope::catalog::{Catalog, CatalogBuilder, MutationOperator, NodeContext, RewritePolicy};
use mutscope::error::OperatorError;
use mutscope::generator::{self, GenerateOptions};
use mutscope::mutants::{MutantId, MutantStatus};
use mutscope::parser;
use mutscope::ted;

const JAVA_MAX: &str = "public class Max {
    public static int max(int a, int b) {
        if (a > b) return a; else return b;
    }

    boolean positive(int x) {
        System.out.println(x + 1);
        return x > 0;
    }

    int count(int n) {
        int total = 0;
        for (int i = 0; i < n; i++) {
            if (i % 2 == 0) continue;
            total += i;
        }
        return total;
    }
}
";

fn ids(unit: &mutscope::ast::SourceUnit, catalog: &Catalog, options: &GenerateOptions) -> Vec<MutantId> {
    generator::generate(unit, catalog, options)
        .iter()
        .map(|m| m.id)
        .collect()
}

// --- enumeration ---

#[test]
fn generation_is_deterministic() {
    let unit = parser::parse(Language::Java, "Max.java", JAVA_MAX).unwrap();
    let catalog = Catalog::builtin();
    let options = GenerateOptions::default();
    let first = ids(&unit, &catalog, &options);
    let second = ids(&unit, &catalog, &options);
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn mutant_ids_are_unique() {
    let unit = parser::parse(Language::Java, "Max.java", JAVA_MAX).unwrap();
    let all = ids(&unit, &Catalog::builtin(), &GenerateOptions::default());
    let unique: HashSet<_> = all.iter().cloned().collect();
    assert_eq!(unique.len(), all.len());
}

#[test]
fn new_mutants_start_generated() {
    let unit = parser::parse(Language::Java, "Max.java", JAVA_MAX).unwrap();
    let options = GenerateOptions::default();
    for mutant in &generator::generate(&unit, &Catalog::builtin(), &options) {
        assert_eq!(mutant.status, MutantStatus::Generated);
        assert_eq!(mutant.id.path, "Max.java");
        assert_eq!(mutant.id.start_byte, mutant.span.start_byte);
    }
}

#[test]
fn function_filter_limits_mutants() {
    let unit = parser::parse(Language::Java, "Max.java", JAVA_MAX).unwrap();
    let options = GenerateOptions {
        function: Some("max".to_string()),
        ..GenerateOptions::default()
    };
    let catalog = Catalog::builtin();
    let mutants: Vec<_> = generator::generate(&unit, &catalog, &options).iter().collect();
    assert!(!mutants.is_empty());
    assert!(mutants.iter().all(|m| m.line() == 3));
}

#[test]
fn unknown_function_yields_nothing() {
    let unit = parser::parse(Language::Java, "Max.java", JAVA_MAX).unwrap();
    let options = GenerateOptions {
        function: Some("min".to_string()),
        ..GenerateOptions::default()
    };
    assert!(ids(&unit, &Catalog::builtin(), &options).is_empty());
}

#[test]
fn logging_calls_are_skipped() {
    let unit = parser::parse(Language::Java, "Max.java", JAVA_MAX).unwrap();
    let catalog = Catalog::from_names(
        &["arithmetic_replacement".to_string()],
        RewritePolicy::default(),
    )
    .unwrap();

    let skipped = ids(&unit, &catalog, &GenerateOptions::default());
    assert!(skipped.iter().all(|id| !unit.text[id.start_byte..id.end_byte].contains("x + 1")));

    let options = GenerateOptions {
        skip_call_prefixes: Some(Vec::new()),
        ..GenerateOptions::default()
    };
    let unskipped = ids(&unit, &catalog, &options);
    assert_eq!(unskipped.len(), skipped.len() + 1);
}

#[test]
fn context_lines_are_recorded() {
    let unit = parser::parse(Language::Java, "Max.java", JAVA_MAX).unwrap();
    let options = GenerateOptions {
        function: Some("max".to_string()),
        context_lines: 1,
        ..GenerateOptions::default()
    };
    let catalog = Catalog::builtin();
    let mutant = generator::generate(&unit, &catalog, &options)
        .iter()
        .next()
        .unwrap();
    assert_eq!(mutant.context_before, vec!["    public static int max(int a, int b) {"]);
    assert_eq!(mutant.context_after, vec!["    }"]);
}

// --- application ---

#[test]
fn every_mutant_reparses_and_leaves_other_functions_alone() {
    let unit = parser::parse(Language::Java, "Max.java", JAVA_MAX).unwrap();
    let functions = unit.functions();
    let options = GenerateOptions::default();

    for mutant in &generator::generate(&unit, &Catalog::builtin(), &options) {
        let mutated = mutant.apply(&unit.text).unwrap();
        assert_ne!(mutated, unit.text, "{}", mutant.id);
        let reparsed = parser::parse(Language::Java, "Max.java", &mutated)
            .unwrap_or_else(|e| panic!("{} does not parse: {}", mutant.id, e));

        for name in &functions {
            let before = unit.find_function(name).unwrap();
            if before.span.overlaps(&mutant.span) {
                continue;
            }
            let after = reparsed.find_function(name).unwrap();
            assert_eq!(ted::distance(before, after), 0, "{} touched {}", mutant.id, name);
        }
    }
}

#[test]
fn apply_splices_only_the_span() {
    let text = "int f(int a) { return a > 1; }\n";
    let unit = parser::parse(Language::C, "f.c", text).unwrap();
    let catalog =
        Catalog::from_names(&["flip_relational".to_string()], RewritePolicy::default()).unwrap();
    let options = GenerateOptions::default();
    let mutant = generator::generate(&unit, &catalog, &options)
        .iter()
        .next()
        .unwrap();
    assert_eq!(mutant.apply(text).unwrap(), "int f(int a) { return a < 1; }\n");
    assert_eq!(mutant.original_text(text), "a > 1");
}

// --- operator failures ---

#[test]
fn overflowing_constant_becomes_error_mutant() {
    let text = "fn f() -> u64 {\n    18446744073709551615\n}\n";
    let unit = parser::parse(Language::Rust, "f.rs", text).unwrap();
    let catalog =
        Catalog::from_names(&["inline_constant".to_string()], RewritePolicy::default()).unwrap();
    let options = GenerateOptions::default();
    let mutants: Vec<_> = generator::generate(&unit, &catalog, &options).iter().collect();
    assert_eq!(mutants.len(), 1);
    assert_eq!(mutants[0].status, MutantStatus::Error);
    assert!(mutants[0].replacement.is_err());
    assert!(mutants[0].replacement_text(text).is_none());
}

static REWRITE_CALLS: AtomicUsize = AtomicUsize::new(0);

struct CountingOperator;

impl MutationOperator for CountingOperator {
    fn name(&self) -> &'static str {
        "counting"
    }
    fn description(&self) -> &'static str {
        "Rename identifiers, counting calls"
    }
    fn matches(&self, node: &SyntaxNode, _ctx: &NodeContext) -> bool {
        node.kind == NodeKind::Identifier
    }
    fn rewrite(
        &self,
        node: &SyntaxNode,
        _ctx: &NodeContext,
    ) -> Result<Vec<SyntaxNode>, OperatorError> {
        REWRITE_CALLS.fetch_add(1, Ordering::SeqCst);
        Ok(vec![SyntaxNode::leaf(NodeKind::Identifier, "zz", node.span)])
    }
}

#[test]
fn generation_is_lazy() {
    let unit = parser::parse(Language::Java, "Max.java", JAVA_MAX).unwrap();
    let catalog = CatalogBuilder::new().register(Box::new(CountingOperator)).build();
    let options = GenerateOptions::default();
    let mutants = generator::generate(&unit, &catalog, &options);
    assert_eq!(REWRITE_CALLS.load(Ordering::SeqCst), 0);

    let mut iter = mutants.iter();
    assert!(iter.next().is_some());
    assert!(iter.next().is_some());
    assert_eq!(REWRITE_CALLS.load(Ordering::SeqCst), 2);

    let total = mutants.iter().count();
    assert!(total > 10);
}
