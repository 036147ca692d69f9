use std::path::Path;

use mutscope::{Language, detect_language};

#[test]
fn detect_language_by_extension() {
    assert_eq!(detect_language(Path::new("src/Max.java")), Some(Language::Java));
    assert_eq!(detect_language(Path::new("max.c")), Some(Language::C));
    assert_eq!(detect_language(Path::new("include/max.h")), Some(Language::C));
    assert_eq!(detect_language(Path::new("src/lib.rs")), Some(Language::Rust));
}

#[test]
fn detect_language_rejects_unknown() {
    assert_eq!(detect_language(Path::new("main.py")), None);
    assert_eq!(detect_language(Path::new("Makefile")), None);
    assert_eq!(detect_language(Path::new("max.cpp")), None);
}

#[test]
fn language_names() {
    assert_eq!(Language::Java.name(), "java");
    assert_eq!(Language::C.name(), "c");
    assert_eq!(Language::Rust.name(), "rust");
    assert_eq!(serde_json::to_string(&Language::Rust).unwrap(), "\"rust\"");
}

#[test]
fn double_negation_is_identity_outside_c() {
    assert!(Language::Java.negation_is_involution());
    assert!(Language::Rust.negation_is_involution());
    assert!(!Language::C.negation_is_involution());
}
