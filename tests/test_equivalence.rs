use mutscope::Language;
use mutscope::ast::{NodeKind, SourceUnit, SyntaxNode};
use mutscope::catalog::{Catalog, RewritePolicy};
use mutscope::equivalence::{self, EquivalenceFilter, EquivalenceRegistry, FilterDecision};
use mutscope::generator::{self, GenerateOptions};
use mutscope::mutants::{EquivalenceReason, Mutant, MutantStatus};
use mutscope::parser;
use tempfile::TempDir;

fn mutants(language: Language, text: &str, operator: &str) -> Vec<Mutant> {
    let unit = parser::parse(language, "T.java", text).unwrap();
    let catalog = Catalog::from_names(&[operator.to_string()], RewritePolicy::default()).unwrap();
    let options = GenerateOptions::default();
    generator::generate(&unit, &catalog, &options).iter().collect()
}

fn first_unary(unit: &SourceUnit) -> &SyntaxNode {
    unit.root
        .preorder()
        .find(|n| n.kind == NodeKind::Unary)
        .unwrap()
}

// --- normalization ---

#[test]
fn normalize_removes_parentheses() {
    let unit = parser::parse(Language::C, "t.c", "int f(int a) { return (a); }\n").unwrap();
    let paren = unit
        .root
        .preorder()
        .find(|n| n.kind == NodeKind::Parenthesized)
        .unwrap();
    let normalized = equivalence::normalize(paren, Language::C);
    assert_eq!(normalized.kind, NodeKind::Identifier);
    assert_eq!(normalized.text(), Some("a"));
}

#[test]
fn normalize_folds_negated_literals() {
    let unit =
        parser::parse(Language::Java, "T.java", "class T { boolean f() { return !true; } }").unwrap();
    let normalized = equivalence::normalize(first_unary(&unit), Language::Java);
    assert_eq!(normalized.kind, NodeKind::BooleanLiteral);
    assert_eq!(normalized.text(), Some("false"));
}

#[test]
fn double_negation_collapses_in_java() {
    let unit = parser::parse(
        Language::Java,
        "T.java",
        "class T { boolean f(boolean d) { return !!d; } }",
    )
    .unwrap();
    let normalized = equivalence::normalize(first_unary(&unit), Language::Java);
    assert_eq!(normalized.kind, NodeKind::Identifier);
    assert_eq!(normalized.text(), Some("d"));
}

#[test]
fn double_negation_of_c_integer_is_kept() {
    let unit = parser::parse(Language::C, "t.c", "int f(int x) { return !!x; }\n").unwrap();
    let normalized = equivalence::normalize(first_unary(&unit), Language::C);
    assert_eq!(normalized.kind, NodeKind::Unary);
}

#[test]
fn double_negation_of_c_comparison_collapses() {
    let unit =
        parser::parse(Language::C, "t.c", "int f(int a, int b) { return !!(a > b); }\n").unwrap();
    let normalized = equivalence::normalize(first_unary(&unit), Language::C);
    assert_eq!(normalized.kind, NodeKind::Binary);
    assert_eq!(normalized.operator_text(), Some(">"));
}

// --- filtering ---

#[test]
fn double_negated_literal_is_equivalent() {
    let registry = EquivalenceRegistry::new();
    let filter = EquivalenceFilter::new(&registry);
    let mut found = mutants(
        Language::Java,
        "class T { boolean f() { return true; } }",
        "double_negation",
    );
    assert_eq!(found.len(), 1);
    let mutant = &mut found[0];

    let decision = filter.apply(mutant).unwrap();
    assert_eq!(decision, FilterDecision::Equivalent(EquivalenceReason::ZeroDistance));
    assert_eq!(mutant.status, MutantStatus::Equivalent);
    assert_eq!(registry.len(), 1);
}

#[test]
fn zero_distance_shapes_are_recorded_once() {
    let registry = EquivalenceRegistry::new();
    let filter = EquivalenceFilter::new(&registry);
    let text = "class T { boolean f() { return true; } boolean g() { return true; } }";
    let decisions: Vec<FilterDecision> = mutants(Language::Java, text, "double_negation")
        .iter_mut()
        .map(|m| filter.apply(m).unwrap())
        .collect();
    assert_eq!(
        decisions,
        vec![
            FilterDecision::Equivalent(EquivalenceReason::ZeroDistance),
            FilterDecision::Equivalent(EquivalenceReason::RegistryMatch),
        ]
    );
    assert_eq!(registry.len(), 1);
}

fn long_if(statements: usize) -> String {
    let mut text = String::from("class T {\n    int f(int x) {\n        int n = 0;\n        if (x > 0) {\n");
    for i in 0..statements {
        text.push_str(&format!("            n = n + x * {};\n", i));
    }
    text.push_str("        }\n        return n;\n    }\n}\n");
    text
}

#[test]
fn removed_condition_is_measured_on_the_condition_only() {
    let registry = EquivalenceRegistry::new();
    let filter = EquivalenceFilter::new(&registry);
    let found = mutants(Language::Java, &long_if(300), "remove_conditional");
    assert_eq!(found.len(), 2);
    assert!(found[0].original.size() > 3000);

    let start = std::time::Instant::now();
    for mutant in &found {
        // `x > 0` against a bare literal: three deletes and a relabel.
        assert_eq!(
            filter.classify(mutant).unwrap(),
            FilterDecision::Schedule { distance: 4 }
        );
    }
    assert!(start.elapsed() < std::time::Duration::from_secs(5));
}

#[test]
fn emptied_block_is_scheduled() {
    let registry = EquivalenceRegistry::new();
    let filter = EquivalenceFilter::new(&registry);
    let found = mutants(Language::Java, &long_if(200), "block_remove");
    assert_eq!(found.len(), 1);
    assert!(matches!(
        filter.classify(&found[0]).unwrap(),
        FilterDecision::Schedule { distance } if distance > 200
    ));
}

#[test]
fn differing_pair_narrows_to_changed_subtree() {
    let found = mutants(
        Language::Java,
        "class T { int max(int a, int b) { if (a > b) return a; else return b; } }",
        "flip_relational",
    );
    let mutant = &found[0];
    let replacement = mutant.replacement.as_ref().unwrap();
    let (a, b) = equivalence::differing_pair(&mutant.original, replacement).unwrap();
    assert_eq!(a.text(), Some(">"));
    assert_eq!(b.text(), Some("<"));
    assert!(equivalence::differing_pair(&mutant.original, &mutant.original).is_none());
}

#[test]
fn registry_hit_skips_distance_on_large_subtree() {
    let registry = EquivalenceRegistry::new();
    let found = mutants(Language::Java, &long_if(300), "remove_conditional");
    let mutant = &found[0];
    let original = equivalence::normalize(&mutant.original, Language::Java);
    let mutated = equivalence::normalize(mutant.replacement.as_ref().unwrap(), Language::Java);
    registry.insert(equivalence::shape_key("remove_conditional", &original, &mutated));

    let filter = EquivalenceFilter::new(&registry);
    assert_eq!(
        filter.classify(mutant).unwrap(),
        FilterDecision::Equivalent(EquivalenceReason::RegistryMatch)
    );
}

#[test]
fn behaviour_changing_mutant_is_scheduled() {
    let registry = EquivalenceRegistry::new();
    let filter = EquivalenceFilter::new(&registry);
    let mut found = mutants(
        Language::Java,
        "class T { int max(int a, int b) { if (a > b) return a; else return b; } }",
        "flip_relational",
    );
    let mutant = &mut found[0];
    assert_eq!(
        filter.apply(mutant).unwrap(),
        FilterDecision::Schedule { distance: 1 }
    );
    assert_eq!(mutant.status, MutantStatus::Scheduled);
    assert!(registry.is_empty());
}

#[test]
fn every_default_operator_mutant_is_scheduled() {
    let registry = EquivalenceRegistry::new();
    let filter = EquivalenceFilter::new(&registry);
    let text = "class T {
    int f(int a, int b, boolean d) {
        int n = 5;
        if (a > b && !d) { n += 2; }
        while (n < 10) { n++; if (n == 7) continue; }
        return -n;
    }
}";
    let unit = parser::parse(Language::Java, "T.java", text).unwrap();
    let catalog = Catalog::builtin();
    let options = GenerateOptions::default();
    for mutant in &generator::generate(&unit, &catalog, &options) {
        let decision = filter.classify(&mutant).unwrap();
        assert!(
            matches!(decision, FilterDecision::Schedule { .. }),
            "{} was pruned",
            mutant.id
        );
    }
}

#[test]
fn registry_match_prunes_known_shape() {
    let registry = EquivalenceRegistry::new();
    let text = "class T { int max(int a, int b) { if (a > b) return a; else return b; } }";
    let mut found = mutants(Language::Java, text, "flip_relational");
    let mutant = &mut found[0];

    let original = equivalence::normalize(&mutant.original, Language::Java);
    let mutated = equivalence::normalize(mutant.replacement.as_ref().unwrap(), Language::Java);
    registry.insert(equivalence::shape_key("flip_relational", &original, &mutated));

    let filter = EquivalenceFilter::new(&registry);
    assert_eq!(
        filter.apply(mutant).unwrap(),
        FilterDecision::Equivalent(EquivalenceReason::RegistryMatch)
    );
}

#[test]
fn shape_key_abstracts_matching_names() {
    let text = "class T { boolean f(int a, int b, int c, int d) { return a > b || c > d; } }";
    let found = mutants(Language::Java, text, "flip_relational");
    assert_eq!(found.len(), 2);
    let keys: Vec<String> = found
        .iter()
        .map(|m| {
            let original = equivalence::normalize(&m.original, Language::Java);
            let mutated = equivalence::normalize(m.replacement.as_ref().unwrap(), Language::Java);
            equivalence::shape_key(&m.id.operator, &original, &mutated)
        })
        .collect();
    assert_eq!(keys[0], keys[1]);
    assert!(keys[0].starts_with("flip_relational|"));
    assert!(keys[0].contains("identifier:_"));
}

#[test]
fn operator_error_cannot_be_classified() {
    let registry = EquivalenceRegistry::new();
    let filter = EquivalenceFilter::new(&registry);
    let found = mutants(
        Language::Rust,
        "fn f() -> u64 { 18446744073709551615 }\n",
        "inline_constant",
    );
    assert!(filter.classify(&found[0]).is_err());
}

// --- registry persistence ---

#[test]
fn registry_round_trips_through_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("shapes.json");
    let registry = EquivalenceRegistry::new();
    assert!(registry.insert("op|a|b".to_string()));
    assert!(!registry.insert("op|a|b".to_string()));
    registry.insert("op|c|d".to_string());
    registry.save(&path).unwrap();

    let loaded = EquivalenceRegistry::load(&path).unwrap();
    assert_eq!(loaded.len(), 2);
    assert!(loaded.contains("op|a|b"));
    assert!(loaded.contains("op|c|d"));
}

#[test]
fn missing_registry_file_is_empty() {
    let dir = TempDir::new().unwrap();
    let loaded = EquivalenceRegistry::load(&dir.path().join("none.json")).unwrap();
    assert!(loaded.is_empty());
}

#[test]
fn unknown_registry_version_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("shapes.json");
    std::fs::write(&path, r#"{"version": 9, "shapes": []}"#).unwrap();
    assert!(EquivalenceRegistry::load(&path).is_err());
}

#[test]
fn registry_accepts_concurrent_inserts() {
    let registry = EquivalenceRegistry::new();
    std::thread::scope(|scope| {
        for t in 0..4 {
            let registry = &registry;
            scope.spawn(move || {
                for i in 0..50 {
                    registry.insert(format!("shape-{}", (t * 50 + i) % 120));
                }
            });
        }
    });
    assert_eq!(registry.len(), 120);
}
