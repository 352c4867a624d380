//! Cross-file renames and dependency traversal.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --package codeweave-core --test refactor
//! ```

mod common;

use codeweave_core::{CodebaseError, UsageType};
use common::{build, read, repo};
use pretty_assertions::assert_eq;

// ============================================================================
// Rename
// ============================================================================

#[test]
fn test_rename_across_files_in_one_commit() {
    let dir = repo(&[
        ("x.py", "def foo():\n    pass\n"),
        ("y.py", "from x import foo\n\ndef main():\n    foo()\n"),
        ("z.py", "import x\n\nx.foo()\n"),
    ]);
    let mut codebase = build(&dir);

    let foo = codebase.get_function("foo").unwrap().id.clone();
    let edits = codebase.rename(&foo, "bar").unwrap();
    assert_eq!(edits, 4);

    let preview = codebase.preview_diff().unwrap();
    assert!(preview.contains("-from x import foo"));
    assert!(preview.contains("+from x import bar"));

    let summary = codebase.commit().unwrap();
    assert_eq!(summary.files, vec!["x.py", "y.py", "z.py"]);

    assert_eq!(read(dir.path(), "x.py"), "def bar():\n    pass\n");
    assert_eq!(
        read(dir.path(), "y.py"),
        "from x import bar\n\ndef main():\n    bar()\n"
    );
    assert_eq!(read(dir.path(), "z.py"), "import x\n\nx.bar()\n");

    assert!(codebase.get_function("foo").is_none());
    let bar = codebase.get_function("bar").unwrap();
    assert_eq!(bar.id, "x.py:bar");
    let import = codebase.get_import("y.py", "bar").unwrap();
    assert_eq!(codebase.resolved_symbol(&import.id).unwrap().id, "x.py:bar");

    let diff = codebase.get_diff();
    assert!(diff.contains("--- a/x.py"));
    assert!(diff.contains("+def bar():"));
}

#[test]
fn test_rename_keeps_aliased_local_names() {
    let dir = repo(&[
        ("x.py", "def foo():\n    pass\n"),
        ("y.py", "from x import foo as f\n\nf()\n"),
    ]);
    let mut codebase = build(&dir);

    codebase.rename("x.py:foo", "bar").unwrap();
    codebase.commit().unwrap();

    assert_eq!(read(dir.path(), "y.py"), "from x import bar as f\n\nf()\n");
}

#[test]
fn test_rename_typescript_export() {
    let dir = repo(&[
        ("lib.ts", "export function load() { return 1; }\n"),
        ("main.ts", "import { load } from './lib';\n\nload();\n"),
    ]);
    let mut codebase = build(&dir);

    codebase.rename("lib.ts:load", "fetchAll").unwrap();
    codebase.commit().unwrap();

    assert_eq!(
        read(dir.path(), "lib.ts"),
        "export function fetchAll() { return 1; }\n"
    );
    assert_eq!(
        read(dir.path(), "main.ts"),
        "import { fetchAll } from './lib';\n\nfetchAll();\n"
    );
}

#[test]
fn test_rename_rejects_bad_names_and_leaves_queue_empty() {
    let dir = repo(&[("x.py", "def foo():\n    pass\n")]);
    let mut codebase = build(&dir);

    assert!(matches!(
        codebase.rename("x.py:foo", "not valid"),
        Err(CodebaseError::InvalidName(_))
    ));
    assert!(matches!(
        codebase.rename("x.py", "y"),
        Err(CodebaseError::NotEditable { .. })
    ));
    assert!(matches!(
        codebase.rename("x.py:missing", "y"),
        Err(CodebaseError::NodeNotFound(_))
    ));
    assert_eq!(codebase.pending_transactions(), 0);
}

#[test]
fn test_rename_conflict_rolls_back() {
    let dir = repo(&[("x.py", "def foo():\n    pass\n\nfoo()\n")]);
    let mut codebase = build(&dir);

    let call = common::last_range_of(&codebase, "x.py", "foo()");
    codebase.edit_range("x.py", call, "foo(1)").unwrap();

    assert!(codebase.rename("x.py:foo", "bar").is_err());
    assert_eq!(codebase.pending_transactions(), 1);
}

// ============================================================================
// Dependencies
// ============================================================================

fn dependency_ids(codebase: &codeweave_core::Codebase, id: &str, depth: usize) -> Vec<String> {
    codebase
        .dependencies(id, depth, UsageType::ALL)
        .unwrap()
        .into_iter()
        .map(|n| n.id.clone())
        .collect()
}

#[test]
fn test_dependencies_grow_monotonically_to_fixpoint() {
    let dir = repo(&[
        ("a.py", "from b import second\n\ndef first():\n    return second()\n"),
        ("b.py", "from c import third\n\ndef second():\n    return third()\n"),
        ("c.py", "def third():\n    return 3\n"),
    ]);
    let codebase = build(&dir);

    let mut previous: Vec<String> = Vec::new();
    for depth in 0..6 {
        let current = dependency_ids(&codebase, "a.py:first", depth);
        assert!(current.starts_with(&previous), "depth {depth} dropped a dependency");
        previous = current;
    }
    assert_eq!(previous, vec!["b.py:second", "c.py:third"]);
    assert_eq!(dependency_ids(&codebase, "a.py:first", 1), vec!["b.py:second"]);
}

#[test]
fn test_mutual_dependencies_terminate() {
    let dir = repo(&[("m.py", "def a():\n    return b()\n\ndef b():\n    return a()\n")]);
    let codebase = build(&dir);
    let reachable = codebase.graph().node_count();

    for depth in [1, 2, 10, 1000] {
        let deps = dependency_ids(&codebase, "m.py:a", depth);
        assert_eq!(deps, vec!["m.py:b"]);
        assert!(deps.len() <= reachable);
    }
    assert_eq!(dependency_ids(&codebase, "m.py:b", 5), vec!["m.py:a"]);
}

#[test]
fn test_dependencies_skip_own_members() {
    let dir = repo(&[(
        "m.py",
        "def helper():\n    pass\n\nclass Service:\n    def run(self):\n        self.stop()\n        helper()\n\n    def stop(self):\n        pass\n",
    )]);
    let codebase = build(&dir);

    assert_eq!(dependency_ids(&codebase, "m.py:Service", 1), vec!["m.py:helper"]);
}
