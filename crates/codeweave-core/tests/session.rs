//! Mutation sessions: queueing, commit, reset and diffs on real files.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --package codeweave-core --test session
//! ```

mod common;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use codeweave_core::{
    ByteRange, CodebaseError, Enqueued, SessionLimits, SupportedLanguage, Threshold,
    TransactionError,
};
use common::{build, last_range_of, range_of, read, repo};
use pretty_assertions::assert_eq;

// ============================================================================
// Queueing
// ============================================================================

#[test]
fn test_overlapping_edits_conflict_before_commit() {
    let dir = repo(&[("a.py", "value = compute(1, 2)\n")]);
    let mut codebase = build(&dir);

    let call = range_of(&codebase, "a.py", "compute(1, 2)");
    codebase.edit_range("a.py", call, "compute(3, 4)").unwrap();

    let err = codebase
        .edit_range("a.py", range_of(&codebase, "a.py", "1, 2"), "5, 6")
        .unwrap_err();
    assert!(matches!(
        err,
        CodebaseError::Transaction(TransactionError::Conflict { .. })
    ));
    assert_eq!(codebase.pending_transactions(), 1);
}

#[test]
fn test_disjoint_edits_are_order_independent() {
    let source = "a = 1\nb = 2\n";
    let mut results = Vec::new();

    for reversed in [false, true] {
        let dir = repo(&[("m.py", source)]);
        let mut codebase = build(&dir);
        let mut edits = vec![
            (range_of(&codebase, "m.py", "1"), "10"),
            (range_of(&codebase, "m.py", "2"), "20"),
        ];
        if reversed {
            edits.reverse();
        }
        for (range, text) in edits {
            codebase.edit_range("m.py", range, text).unwrap();
        }
        codebase.commit().unwrap();
        results.push(read(dir.path(), "m.py"));
    }

    assert_eq!(results[0], "a = 10\nb = 20\n");
    assert_eq!(results[0], results[1]);
}

#[test]
fn test_out_of_bounds_edit_is_rejected() {
    let dir = repo(&[("a.py", "x = 1\n")]);
    let mut codebase = build(&dir);

    let err = codebase
        .edit_range("a.py", ByteRange::new(2, 100), "y")
        .unwrap_err();
    assert!(matches!(
        err.as_transaction_error(),
        Some(TransactionError::OutOfBounds { .. })
    ));
    assert_eq!(codebase.pending_transactions(), 0);
}

#[test]
fn test_edit_nested_in_remove_is_superseded() {
    let dir = repo(&[("a.py", "def gone():\n    return 1\n\n\ndef kept():\n    return 2\n")]);
    let mut codebase = build(&dir);

    let gone = codebase.get_function("gone").unwrap().id.clone();
    codebase.remove(&gone).unwrap();

    let inner = range_of(&codebase, "a.py", "return 1");
    assert_eq!(
        codebase.edit_range("a.py", inner, "return 42").unwrap(),
        Enqueued::Superseded
    );

    codebase.commit().unwrap();
    let text = read(dir.path(), "a.py");
    assert!(!text.contains("gone"));
    assert!(!text.contains("42"));
    assert!(text.contains("def kept():"));
    assert!(codebase.get_function("gone").is_none());
    assert!(codebase.get_function("kept").is_some());
}

#[test]
fn test_import_sharing_statement_cannot_be_removed() {
    let dir = repo(&[("a.py", "from os import path, sep\n")]);
    let mut codebase = build(&dir);

    let import = codebase.get_import("a.py", "sep").unwrap().id.clone();
    assert!(matches!(
        codebase.remove(&import),
        Err(CodebaseError::NotEditable { .. })
    ));
}

#[test]
fn test_insert_before_and_after_keep_indentation() {
    let dir = repo(&[("a.py", "class A:\n    def run(self):\n        pass\n")]);
    let mut codebase = build(&dir);

    let run = codebase.get_node("a.py:A:run").unwrap().id.clone();
    codebase.insert_before(&run, "@staticmethod").unwrap();
    codebase
        .insert_after(&run, "def stop(self):\n        pass")
        .unwrap();
    codebase.commit().unwrap();

    assert_eq!(
        read(dir.path(), "a.py"),
        "class A:\n    @staticmethod\n    def run(self):\n        pass\n    def stop(self):\n        pass\n"
    );
    assert!(codebase.get_node("a.py:A:stop").is_some());
}

#[test]
fn test_file_edit_is_minimized() {
    let dir = repo(&[("a.py", "x = 1\n")]);
    let mut codebase = build(&dir);

    // appending to the file does not conflict with an edit of its body
    codebase.edit("a.py", "x = 1\ny = 2\n").unwrap();
    codebase
        .edit_range("a.py", range_of(&codebase, "a.py", "1"), "3")
        .unwrap();
    codebase.commit().unwrap();

    assert_eq!(read(dir.path(), "a.py"), "x = 3\ny = 2\n");
}

// ============================================================================
// Commit and Reset
// ============================================================================

#[test]
fn test_reset_without_commit_restores_text() {
    let original = "def foo():\n    return 1\n";
    let dir = repo(&[("a.py", original)]);
    let mut codebase = build(&dir);

    let foo = codebase.get_function("foo").unwrap().id.clone();
    codebase.edit(&foo, "def foo():\n    return 2").unwrap();
    codebase.insert_after(&foo, "x = 3").unwrap();
    codebase.reset().unwrap();

    assert_eq!(codebase.pending_transactions(), 0);
    assert_eq!(read(dir.path(), "a.py"), original);
    assert_eq!(codebase.file_text("a.py"), Some(original));
}

#[test]
fn test_reset_after_commit_restores_snapshot() {
    let original = "def foo():\n    return 1\n";
    let dir = repo(&[("a.py", original)]);
    let mut codebase = build(&dir);
    let nodes_before = codebase.graph().node_count();

    let foo = codebase.get_function("foo").unwrap().id.clone();
    codebase.rename(&foo, "bar").unwrap();
    let summary = codebase.commit().unwrap();
    assert_eq!(summary.files, vec!["a.py".to_string()]);
    assert!(read(dir.path(), "a.py").contains("def bar"));

    let epoch = codebase.epoch();
    codebase.reset().unwrap();

    assert_eq!(read(dir.path(), "a.py"), original);
    assert!(codebase.get_function("foo").is_some());
    assert!(codebase.get_function("bar").is_none());
    assert_eq!(codebase.graph().node_count(), nodes_before);
    assert!(codebase.epoch() > epoch);
}

#[test]
fn test_checkpoint_moves_reset_baseline() {
    let dir = repo(&[("a.py", "x = 1\n")]);
    let mut codebase = build(&dir);

    codebase.edit("a.py", "x = 2\n").unwrap();
    codebase.commit().unwrap();
    codebase.checkpoint();
    assert_eq!(codebase.get_diff(), "");

    codebase.edit("a.py", "x = 3\n").unwrap();
    codebase.commit().unwrap();
    codebase.reset().unwrap();
    assert_eq!(read(dir.path(), "a.py"), "x = 2\n");
}

#[test]
fn test_remove_file_deletes_from_disk_and_graph() {
    let dir = repo(&[
        ("a.py", "def foo():\n    pass\n"),
        ("b.py", "from a import foo\n"),
    ]);
    let mut codebase = build(&dir);

    codebase.remove("a.py").unwrap();
    codebase.commit().unwrap();

    assert!(!dir.path().join("a.py").exists());
    assert!(codebase.get_file("a.py").is_none());
    let import = codebase.get_import("b.py", "foo").unwrap();
    assert!(codebase.resolved_symbol(&import.id).unwrap().is_external());

    let diff = codebase.get_diff();
    assert!(diff.contains("--- a/a.py"));
    assert!(diff.contains("+++ /dev/null"));

    codebase.reset().unwrap();
    assert_eq!(read(dir.path(), "a.py"), "def foo():\n    pass\n");
    let import = codebase.get_import("b.py", "foo").unwrap();
    assert_eq!(codebase.resolved_symbol(&import.id).unwrap().id, "a.py:foo");
}

#[test]
fn test_create_file_links_and_reset_deletes_it() {
    let dir = repo(&[("app.py", "from helpers import util\n")]);
    let mut codebase = build(&dir);
    assert!(codebase
        .resolved_symbol("app.py:<import>:util")
        .unwrap()
        .is_external());

    codebase
        .create_file("helpers.py", "def util():\n    pass\n")
        .unwrap();
    assert_eq!(
        codebase.resolved_symbol("app.py:<import>:util").unwrap().id,
        "helpers.py:util"
    );
    assert!(matches!(
        codebase.create_file("helpers.py", ""),
        Err(CodebaseError::FileExists(_))
    ));
    assert!(codebase.get_diff().contains("--- /dev/null"));

    codebase.reset().unwrap();
    assert!(!dir.path().join("helpers.py").exists());
    assert!(codebase.get_file("helpers.py").is_none());
}

#[test]
fn test_add_file_with_explicit_language() {
    let dir = repo(&[("main.ts", "import { old } from './legacy';\nold();\n")]);
    let mut codebase = build(&dir);

    let file = codebase
        .add_file("legacy.ts", "export function old(): number { return 1; }\n", SupportedLanguage::TypeScript)
        .unwrap();
    assert!(file.is_file());
    assert_eq!(
        codebase.resolved_symbol("main.ts:<import>:old").unwrap().id,
        "legacy.ts:old"
    );
    assert_eq!(codebase.usages("legacy.ts:old", codeweave_core::UsageType::ALL).unwrap().len(), 2);
}

// ============================================================================
// Limits
// ============================================================================

#[test]
fn test_commit_over_transaction_limit_writes_nothing() {
    let dir = repo(&[("a.py", "a = 1\nb = 2\n")]);
    let mut codebase = build(&dir);
    codebase.set_limits(SessionLimits {
        max_transactions: Some(1),
        max_duration: None,
    });

    codebase
        .edit_range("a.py", range_of(&codebase, "a.py", "1"), "10")
        .unwrap();
    let err = codebase
        .edit_range("a.py", range_of(&codebase, "a.py", "2"), "20")
        .unwrap_err();
    let err = err.as_transaction_error().unwrap();
    assert_eq!(err.threshold(), Some(Threshold::Count(1)));
    assert!(err.is_resource_limit());

    assert_eq!(read(dir.path(), "a.py"), "a = 1\nb = 2\n");
}

#[test]
fn test_commit_past_time_limit_keeps_queue() {
    let dir = repo(&[("a.py", "a = 1\n"), ("b.py", "b = 2\n")]);
    let mut codebase = build(&dir);
    codebase.set_limits(SessionLimits {
        max_transactions: None,
        max_duration: Some(Duration::ZERO),
    });

    codebase
        .edit_range("a.py", range_of(&codebase, "a.py", "1"), "10")
        .unwrap();
    codebase
        .edit_range("b.py", last_range_of(&codebase, "b.py", "2"), "20")
        .unwrap();

    let err = codebase.commit().unwrap_err();
    assert!(matches!(
        err.as_transaction_error(),
        Some(TransactionError::MaxPreviewTimeExceeded { .. })
    ));
    assert_eq!(codebase.pending_transactions(), 2);
    assert_eq!(read(dir.path(), "a.py"), "a = 1\n");

    codebase.set_limits(SessionLimits::default());
    let summary = codebase.commit().unwrap();
    assert_eq!(summary.files, vec!["a.py".to_string(), "b.py".to_string()]);
    assert_eq!(read(dir.path(), "b.py"), "b = 20\n");
}

/// Advances one minute every time the session reads it.
fn minute_per_read() -> Instant {
    static BASE: OnceLock<Instant> = OnceLock::new();
    static READS: AtomicU64 = AtomicU64::new(0);
    let base = *BASE.get_or_init(Instant::now);
    base + Duration::from_secs(60 * READS.fetch_add(1, Ordering::SeqCst))
}

#[test]
fn test_time_limit_mid_commit_keeps_earlier_files() {
    let dir = repo(&[
        ("a.py", "def foo():\n    pass\n"),
        ("b.py", "from a import foo\nx = 2\n"),
    ]);
    let mut codebase = build(&dir);
    let epoch = codebase.epoch();

    codebase
        .edit_range("a.py", range_of(&codebase, "a.py", "foo"), "bar")
        .unwrap();
    codebase
        .edit_range("b.py", range_of(&codebase, "b.py", "2"), "20")
        .unwrap();

    // clock restart reads 0s, a.py is checked at 60s, b.py at 120s
    codebase.set_limits(SessionLimits {
        max_transactions: None,
        max_duration: Some(Duration::from_secs(90)),
    });
    codebase.set_clock(minute_per_read);

    let err = codebase.commit().unwrap_err();
    assert!(matches!(
        err.as_transaction_error(),
        Some(TransactionError::MaxPreviewTimeExceeded { .. })
    ));

    assert_eq!(read(dir.path(), "a.py"), "def bar():\n    pass\n");
    assert_eq!(read(dir.path(), "b.py"), "from a import foo\nx = 2\n");
    assert!(codebase.epoch() > epoch);
    assert!(codebase.get_function("bar").is_some());
    assert!(codebase.get_function("foo").is_none());
    assert!(codebase
        .resolved_symbol("b.py:<import>:foo")
        .unwrap()
        .is_external());
    assert_eq!(codebase.pending_transactions(), 1);

    codebase.set_limits(SessionLimits::default());
    let summary = codebase.commit().unwrap();
    assert_eq!(summary.files, vec!["b.py".to_string()]);
    assert_eq!(read(dir.path(), "b.py"), "from a import foo\nx = 20\n");
}

#[test]
fn test_failed_write_keeps_transactions_queued() {
    let dir = repo(&[("a.py", "x = 1\n")]);
    let mut codebase = build(&dir);
    codebase
        .edit_range("a.py", range_of(&codebase, "a.py", "1"), "2")
        .unwrap();

    let path = dir.path().join("a.py");
    std::fs::remove_file(&path).unwrap();
    std::fs::create_dir(&path).unwrap();

    assert!(matches!(codebase.commit(), Err(CodebaseError::Io { .. })));
    assert_eq!(codebase.pending_transactions(), 1);
    assert_eq!(codebase.file_text("a.py"), Some("x = 1\n"));

    std::fs::remove_dir(&path).unwrap();
    codebase.commit().unwrap();
    assert_eq!(read(dir.path(), "a.py"), "x = 2\n");
}
