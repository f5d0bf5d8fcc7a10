//! Integration tests for the validate → locate → apply pipeline
//!
//! Exercises the library end to end against real files in a temp workspace.

use autofix_patcher::config::{load_from_str, PolicyFormat};
use autofix_patcher::{
    apply_change_set, ApplyMode, ApplyReport, Change, ChangeSet, ChangeStatus, FailureKind,
    PatchApplier, PolicyConfig, PolicyViolation,
};
use proptest::prelude::*;
use std::fs;
use tempfile::TempDir;

fn workspace_with(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, content) in files {
        let path = dir.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    dir
}

fn read(dir: &TempDir, name: &str) -> String {
    fs::read_to_string(dir.path().join(name)).unwrap()
}

fn run(
    dir: &TempDir,
    policy: &PolicyConfig,
    changes: Vec<Change>,
) -> Result<ApplyReport, PolicyViolation> {
    let mut applier = PatchApplier::new(dir.path(), ApplyMode::Write).unwrap();
    apply_change_set(&ChangeSet::new(changes), policy, &mut applier)
}

#[test]
fn test_simple_substitution() {
    let dir = workspace_with(&[("Sources/Foo.swift", "func foo() {\n    doA()\n}\n")]);

    let report = run(
        &dir,
        &PolicyConfig::default(),
        vec![Change::new("Sources/Foo.swift", "doA()", "doB()")],
    )
    .unwrap();

    assert!(report.is_success());
    assert_eq!(read(&dir, "Sources/Foo.swift"), "func foo() {\n    doB()\n}\n");
}

#[test]
fn test_forbidden_fix_rejects_whole_batch() {
    let dir = workspace_with(&[
        ("A.swift", "let a = load()\n"),
        ("B.swift", "let b = load()\n"),
    ]);

    let result = run(
        &dir,
        &PolicyConfig::default(),
        vec![
            Change::new("A.swift", "let a = load()", "let a = reload()"),
            Change::new("B.swift", "let b = load()", "let apiSecret = \"hunter2\""),
        ],
    );

    assert!(matches!(result, Err(PolicyViolation::ForbiddenPattern { .. })));
    // Nothing was touched, including the harmless first change.
    assert!(read(&dir, "A.swift").contains("let a = load()"));
    assert!(read(&dir, "B.swift").contains("let b = load()"));
}

#[test]
fn test_file_count_limit_ignores_content_size() {
    let dir = workspace_with(&[
        ("A.swift", "a\n"),
        ("B.swift", "b\n"),
        ("C.swift", "c\n"),
        ("D.swift", "d\n"),
    ]);

    let result = run(
        &dir,
        &PolicyConfig::default(),
        ["A", "B", "C", "D"]
            .iter()
            .map(|n| Change::new(format!("{n}.swift"), n.to_lowercase(), n.to_string()))
            .collect(),
    );

    let err = result.unwrap_err();
    assert!(err.to_string().starts_with("Too many files affected"));
    assert_eq!(read(&dir, "A.swift"), "a\n");
}

#[test]
fn test_line_delta_limit() {
    let dir = workspace_with(&[("A.swift", "body()\n")]);
    let policy = load_from_str(
        r#"{"auto_fix_config": {"max_lines_per_fix": 2}}"#,
        PolicyFormat::Json,
    )
    .unwrap();

    let result = run(
        &dir,
        &policy,
        vec![Change::new("A.swift", "body()", "one()\ntwo()\nthree()\nfour()")],
    );

    let err = result.unwrap_err();
    assert_eq!(err.to_string(), "Too many lines changed: 3 (max: 2)");
    assert_eq!(read(&dir, "A.swift"), "body()\n");
}

#[test]
fn test_reformatted_snippet_is_recovered() {
    let original_file = "\
final class Loader {
    func load() {
        if cache.isEmpty {
            fetch(remote: true,
                  retries: 3)
        }
    }
}
";
    let dir = workspace_with(&[("Loader.swift", original_file)]);

    // The generator saw the call arguments on one line.
    let report = run(
        &dir,
        &PolicyConfig::default(),
        vec![Change::new(
            "Loader.swift",
            "if cache.isEmpty {\n  fetch(remote: true, retries: 3)\n}",
            "        if cache.isEmpty {\n            fetch(remote: false, retries: 3)\n        }",
        )],
    )
    .unwrap();

    assert_eq!(
        report.outcomes()[0].status,
        ChangeStatus::Applied { recovered: true }
    );
    assert_eq!(
        read(&dir, "Loader.swift"),
        "\
final class Loader {
    func load() {
        if cache.isEmpty {
            fetch(remote: false, retries: 3)
        }
    }
}
"
    );
}

#[test]
fn test_absent_snippet_reported_and_file_untouched() {
    let content = "func foo() {\n    doA()\n}\n";
    let dir = workspace_with(&[("Foo.swift", content)]);

    let report = run(
        &dir,
        &PolicyConfig::default(),
        vec![Change::new("Foo.swift", "doZ(42)", "doY(42)")],
    )
    .unwrap();

    assert!(!report.is_success());
    assert!(matches!(
        report.outcomes()[0].status,
        ChangeStatus::Failed {
            kind: FailureKind::SnippetNotFound,
            ..
        }
    ));
    assert_eq!(report.failed_files(), vec!["Foo.swift"]);
    assert_eq!(read(&dir, "Foo.swift"), content);
}

#[test]
fn test_rerun_reports_snippet_not_found() {
    let dir = workspace_with(&[
        ("A.swift", "struct A {\n    let value = compute()\n}\n"),
        ("B.swift", "enum B {\n    case legacy\n}\n"),
    ]);
    let changes = vec![
        Change::new("A.swift", "compute()", "computeFast()"),
        Change::new("B.swift", "case legacy", "case modern"),
    ];

    let first = run(&dir, &PolicyConfig::default(), changes.clone()).unwrap();
    assert!(first.is_success());
    let after_first = (read(&dir, "A.swift"), read(&dir, "B.swift"));

    let second = run(&dir, &PolicyConfig::default(), changes).unwrap();
    assert_eq!(second.succeeded(), 0);
    assert!(second.outcomes().iter().all(|o| matches!(
        o.status,
        ChangeStatus::Failed {
            kind: FailureKind::SnippetNotFound,
            ..
        }
    )));
    assert_eq!((read(&dir, "A.swift"), read(&dir, "B.swift")), after_first);
}

#[test]
fn test_duplicate_snippet_only_first_changed() {
    // Known limitation: identical snippets are not disambiguated.
    let dir = workspace_with(&[("A.swift", "retry()\nwork()\nretry()\n")]);

    run(
        &dir,
        &PolicyConfig::default(),
        vec![Change::new("A.swift", "retry()", "retryOnce()")],
    )
    .unwrap();

    assert_eq!(read(&dir, "A.swift"), "retryOnce()\nwork()\nretry()\n");
}

#[test]
fn test_partial_failure_keeps_applied_changes() {
    let dir = workspace_with(&[("A.swift", "alpha()\n"), ("B.swift", "beta()\n")]);

    let report = run(
        &dir,
        &PolicyConfig::default(),
        vec![
            Change::new("A.swift", "alpha()", "ALPHA()"),
            Change::new("B.swift", "gamma()", "GAMMA()"),
        ],
    )
    .unwrap();

    assert_eq!(report.total(), 2);
    assert_eq!(report.succeeded(), 1);
    assert_eq!(read(&dir, "A.swift"), "ALPHA()\n");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: with exact, unique snippets the result equals applying the
    /// substitutions to the original text in batch order.
    #[test]
    fn prop_exact_changes_apply_in_batch_order(
        (line_count, picks, multiline) in (3usize..40).prop_flat_map(|n| (
            Just(n),
            proptest::sample::subsequence((0..n).collect::<Vec<_>>(), 1..=n.min(8)).prop_shuffle(),
            proptest::collection::vec(any::<bool>(), n),
        ))
    ) {
        let content: String = (0..line_count)
            .map(|i| format!("    call_{i:03}(arg)\n"))
            .collect();
        let dir = workspace_with(&[("Gen.swift", content.as_str())]);

        let changes: Vec<Change> = picks
            .iter()
            .map(|&i| {
                let fixed = if multiline[i] {
                    format!("CALL_{i:03}(arg)\n    LOG_{i:03}()")
                } else {
                    format!("CALL_{i:03}(arg)")
                };
                Change::new("Gen.swift", format!("call_{i:03}(arg)"), fixed)
            })
            .collect();

        let mut expected = content.clone();
        for change in &changes {
            expected = expected.replacen(&change.original, &change.fixed, 1);
        }

        let report = run(&dir, &PolicyConfig::default(), changes).unwrap();
        prop_assert!(report.is_success());
        prop_assert_eq!(read(&dir, "Gen.swift"), expected);
    }
}
