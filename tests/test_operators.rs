use mutscope::Language;
use mutscope::ast::{NodeKind, SyntaxNode};
use mutscope::catalog::{
    self, Catalog, CatalogBuilder, MutationOperator, NodeContext, RewritePolicy,
};
use mutscope::error::OperatorError;
use mutscope::generator::{self, GenerateOptions};
use mutscope::operators;
use mutscope::parser;

fn java(body: &str) -> String {
    format!(
        "class T {{\n    Object f(int a, int b, int x, boolean done) {{\n        {}\n    }}\n}}\n",
        body
    )
}

fn c(body: &str) -> String {
    format!("int f(int a, int b, int c, int x) {{\n    {}\n}}\n", body)
}

fn rust(body: &str) -> String {
    format!("fn f(a: i32, b: i32, o: Option<i32>) -> i32 {{\n    {}\n}}\n", body)
}

fn rewrites_with(language: Language, text: &str, catalog: &Catalog) -> Vec<String> {
    let unit = parser::parse(language, "t", text).unwrap();
    let options = GenerateOptions::default();
    generator::generate(&unit, catalog, &options)
        .iter()
        .map(|m| m.replacement_text(&unit.text).unwrap())
        .collect()
}

fn rewrites(language: Language, text: &str, operator: &str) -> Vec<String> {
    let catalog = Catalog::from_names(&[operator.to_string()], RewritePolicy::default()).unwrap();
    rewrites_with(language, text, &catalog)
}

// --- relational and arithmetic ---

#[test]
fn flip_relational_mirrors() {
    assert_eq!(rewrites(Language::Java, &java("return x > 0;"), "flip_relational"), vec!["x < 0"]);
    assert_eq!(rewrites(Language::C, &c("return a <= b;"), "flip_relational"), vec!["a >= b"]);
}

#[test]
fn conditional_boundary_shifts() {
    assert_eq!(
        rewrites(Language::Java, &java("return x > 0;"), "conditional_boundary"),
        vec!["x >= 0"]
    );
    assert_eq!(
        rewrites(Language::Rust, &rust("if a < b { 1 } else { 2 }"), "conditional_boundary"),
        vec!["a <= b"]
    );
}

#[test]
fn negate_conditional_inverts() {
    assert_eq!(
        rewrites(Language::Java, &java("return x > 0;"), "negate_conditional"),
        vec!["x <= 0"]
    );
    assert_eq!(
        rewrites(Language::C, &c("return a == b;"), "negate_conditional"),
        vec!["a != b"]
    );
}

#[test]
fn equality_is_not_flipped() {
    assert!(rewrites(Language::C, &c("return a == b;"), "flip_relational").is_empty());
}

#[test]
fn arithmetic_replacement_visits_outer_first() {
    assert_eq!(
        rewrites(Language::C, &c("return a + b * c;"), "arithmetic_replacement"),
        vec!["a - b * c", "b / c"]
    );
}

#[test]
fn logical_connector_swaps() {
    assert_eq!(
        rewrites(Language::Java, &java("return done && a > b;"), "logical_connector"),
        vec!["done || a > b"]
    );
}

#[test]
fn increments_swap_direction() {
    assert_eq!(
        rewrites(Language::Java, &java("int i = 0; i++; i += 2; i = 3;"), "increments"),
        vec!["i--", "i -= 2"]
    );
}

// --- unary ---

#[test]
fn invert_negative_drops_minus() {
    assert_eq!(rewrites(Language::C, &c("return -x;"), "invert_negative"), vec!["x"]);
}

#[test]
fn remove_negation_drops_not() {
    assert_eq!(
        rewrites(Language::Java, &java("return !done;"), "remove_negation"),
        vec!["done"]
    );
    assert_eq!(
        rewrites(Language::Rust, &rust("if !o.is_some() { 1 } else { 2 }"), "remove_negation"),
        vec!["o.is_some()"]
    );
}

// --- literals ---

#[test]
fn negate_boolean_skips_returned_literals() {
    assert_eq!(
        rewrites(Language::Java, &java("boolean t = true; return false;"), "negate_boolean"),
        vec!["false"]
    );
}

#[test]
fn inline_constant_values() {
    assert_eq!(rewrites(Language::Java, &java("int y = 0;"), "inline_constant"), vec!["1"]);
    assert_eq!(rewrites(Language::Java, &java("int y = 1;"), "inline_constant"), vec!["0", "2"]);
    assert_eq!(rewrites(Language::Java, &java("int y = 5;"), "inline_constant"), vec!["0", "6"]);
    assert_eq!(
        rewrites(Language::Rust, &rust("let y = 10u32; 0"), "inline_constant"),
        vec!["0u32", "11u32", "1"]
    );
}

#[test]
fn inline_constant_leaves_hex_and_octal() {
    assert!(rewrites(Language::C, &c("return 0x10 + 017;"), "inline_constant").is_empty());
}

// --- statements ---

#[test]
fn return_values_by_literal_kind() {
    let cases = [
        ("return true;", "return false;"),
        ("return 0;", "return 1;"),
        ("return 7;", "return 0;"),
        ("return 2.5;", "return 0.0;"),
        ("return 0.0;", "return 1.0;"),
        ("return \"s\";", "return \"\";"),
    ];
    for (body, expected) in cases {
        assert_eq!(
            rewrites(Language::Java, &java(body), "return_values"),
            vec![expected],
            "{}",
            body
        );
    }
}

#[test]
fn return_values_skips_null_and_java_expressions() {
    assert!(rewrites(Language::Java, &java("return null;"), "return_values").is_empty());
    assert!(rewrites(Language::Java, &java("return a + b;"), "return_values").is_empty());
}

#[test]
fn return_values_uses_default_for_rust_expressions() {
    assert_eq!(
        rewrites(Language::Rust, &rust("return a + b;"), "return_values"),
        vec!["return Default::default()"]
    );
}

#[test]
fn remove_conditional_forces_both_ways() {
    assert_eq!(
        rewrites(Language::Java, &java("if (a > b) { x = 1; }"), "remove_conditional"),
        vec!["if (true) { x = 1; }", "if (false) { x = 1; }"]
    );
    assert_eq!(
        rewrites(Language::Rust, &rust("if a > b { 1 } else { 2 }"), "remove_conditional"),
        vec!["if true { 1 } else { 2 }", "if false { 1 } else { 2 }"]
    );
}

#[test]
fn remove_conditional_leaves_if_let() {
    assert!(
        rewrites(
            Language::Rust,
            &rust("if let Some(v) = o { v } else { 0 }"),
            "remove_conditional"
        )
        .is_empty()
    );
}

#[test]
fn loop_break_replaces_continue() {
    assert_eq!(
        rewrites(
            Language::Java,
            &java("for (int i = 0; i < a; i++) { if (done) continue; }"),
            "loop_break"
        ),
        vec!["break;"]
    );
    assert_eq!(
        rewrites(Language::Rust, &rust("loop { if a > b { continue; } }"), "loop_break"),
        vec!["break"]
    );
}

#[test]
fn block_remove_empties_if_body() {
    assert_eq!(
        rewrites(Language::C, &c("if (x) { a = 1; }"), "block_remove"),
        vec!["if (x) {}"]
    );
    assert!(rewrites(Language::C, &c("if (x) { }"), "block_remove").is_empty());
}

#[test]
fn double_negation_wraps_literal() {
    assert_eq!(
        rewrites(Language::Java, &java("return true;"), "double_negation"),
        vec!["!(!true)"]
    );
}

// --- tables ---

#[test]
fn token_tables_are_involutions_where_expected() {
    for op in ["<", ">", "<=", ">="] {
        let mirrored = operators::mirror_relational(op).unwrap();
        assert_eq!(operators::mirror_relational(mirrored), Some(op));
    }
    for op in ["==", "!=", "<", "<=", ">", ">="] {
        let negated = operators::negate_comparison(op).unwrap();
        assert_eq!(operators::negate_comparison(negated), Some(op));
    }
    assert_eq!(operators::flip_boolean("TRUE"), Some("FALSE"));
    assert_eq!(operators::flip_boolean("yes"), None);
}

// --- catalog ---

#[test]
fn builtin_catalog_excludes_disabled_operators() {
    let catalog = Catalog::builtin();
    assert_eq!(catalog.len(), catalog::builtin_names().len() - 1);
    assert!(catalog.get("double_negation").is_none());
    assert!(catalog.get("flip_relational").is_some());
    assert!(!catalog::default_names().contains(&"double_negation".to_string()));
}

#[test]
fn from_names_rejects_unknown() {
    let err = Catalog::from_names(&["nope".to_string()], RewritePolicy::default());
    assert!(err.is_err());
}

#[test]
fn from_names_keeps_order_and_drops_duplicates() {
    let names: Vec<String> = ["negate_boolean", "flip_relational", "negate_boolean"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let catalog = Catalog::from_names(&names, RewritePolicy::default()).unwrap();
    let order: Vec<&str> = catalog.operators().map(|op| op.name()).collect();
    assert_eq!(order, vec!["negate_boolean", "flip_relational"]);
}

#[test]
fn every_operator_has_a_unique_name_and_description() {
    let names = catalog::builtin_names();
    let mut unique = names.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), names.len());
    assert!(catalog::builtin_operators().iter().all(|op| !op.description().is_empty()));
}

#[test]
fn max_rewrites_truncates_each_operator() {
    let policy = RewritePolicy {
        max_rewrites_per_operator: Some(1),
        exclusive_operators: false,
    };
    let catalog = Catalog::from_names(&["inline_constant".to_string()], policy).unwrap();
    assert_eq!(rewrites_with(Language::Java, &java("int y = 5;"), &catalog), vec!["0"]);
}

#[test]
fn exclusive_operators_stop_at_first_match() {
    let names: Vec<String> = ["flip_relational", "conditional_boundary", "negate_conditional"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let independent = Catalog::from_names(&names, RewritePolicy::default()).unwrap();
    assert_eq!(
        rewrites_with(Language::Java, &java("return x > 0;"), &independent),
        vec!["x < 0", "x >= 0", "x <= 0"]
    );

    let policy = RewritePolicy {
        max_rewrites_per_operator: None,
        exclusive_operators: true,
    };
    let exclusive = Catalog::from_names(&names, policy).unwrap();
    assert_eq!(
        rewrites_with(Language::Java, &java("return x > 0;"), &exclusive),
        vec!["x < 0"]
    );
}

struct RenameIdentifiers;

impl MutationOperator for RenameIdentifiers {
    fn name(&self) -> &'static str {
        "rename_a"
    }
    fn description(&self) -> &'static str {
        "Rename a to b"
    }
    fn matches(&self, node: &SyntaxNode, _ctx: &NodeContext) -> bool {
        node.kind == NodeKind::Identifier && node.text() == Some("a")
    }
    fn rewrite(
        &self,
        node: &SyntaxNode,
        _ctx: &NodeContext,
    ) -> Result<Vec<SyntaxNode>, OperatorError> {
        Ok(vec![SyntaxNode::leaf(NodeKind::Identifier, "b", node.span)])
    }
}

#[test]
fn custom_operator_registration() {
    let catalog = CatalogBuilder::new()
        .register(Box::new(RenameIdentifiers))
        .register(Box::new(RenameIdentifiers))
        .build();
    assert_eq!(catalog.len(), 1);
    assert_eq!(rewrites_with(Language::C, &c("return a;"), &catalog), vec!["b", "b"]);
}
