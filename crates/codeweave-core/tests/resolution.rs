//! Graph construction and import resolution over fixture repositories.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --package codeweave-core --test resolution
//! ```

mod common;

use codeweave_core::{
    Codebase, EdgeType, HasName, PostInitValidationStatus, ResolvedTarget, SupportedLanguage,
    UsageType,
};
use common::{build, repo};
use pretty_assertions::assert_eq;

fn sorted_ids(codebase: &Codebase) -> Vec<String> {
    let mut ids = codebase.graph().node_ids();
    ids.sort();
    ids
}

#[test]
fn test_rebuild_is_idempotent() {
    let dir = repo(&[
        ("pkg/__init__.py", "from .models import User\n"),
        (
            "pkg/models.py",
            "class Base:\n    pass\n\nclass User(Base):\n    def save(self):\n        return helper()\n\ndef helper():\n    return 1\n",
        ),
        ("app.py", "from pkg import User\nimport os\n\ndef main():\n    User().save()\n    os.getcwd()\n"),
        ("web/index.ts", "export * from './routes';\n"),
        ("web/routes.ts", "export function route(path: string) { return path; }\n"),
        ("web/main.ts", "import { route } from './index';\nroute('/');\n"),
    ]);

    let first = build(&dir);
    let second = build(&dir);

    assert_eq!(sorted_ids(&first), sorted_ids(&second));
    assert_eq!(first.graph().edge_signature(), second.graph().edge_signature());
    assert_eq!(first.link_stats(), second.link_stats());

    let names = |c: &Codebase| -> Vec<String> { c.symbols().map(|n| n.name.clone()).collect() };
    assert_eq!(names(&first), names(&second));
}

#[test]
fn test_import_resolves_to_definition_and_usages_are_transitive() {
    let dir = repo(&[
        ("x.py", "def foo():\n    pass\n"),
        ("y.py", "from x import foo\n\ndef main():\n    foo()\n"),
    ]);
    let codebase = build(&dir);

    let foo = codebase.get_function("foo").expect("foo is defined");
    assert_eq!(foo.id, "x.py:foo");

    let import = codebase.get_import("y.py", "foo").expect("import exists");
    let resolved = codebase.resolved_symbol(&import.id).expect("import resolves");
    assert_eq!(resolved.id, foo.id);

    let usages = codebase.usages(&foo.id, UsageType::ALL).unwrap();
    let sites: Vec<(&str, UsageType)> = usages
        .iter()
        .map(|u| (u.usage_symbol.as_str(), u.usage_type))
        .collect();
    assert_eq!(
        sites,
        vec![
            ("y.py:<import>:foo", UsageType::DIRECT),
            ("y.py:main", UsageType::INDIRECT),
        ]
    );

    let users: Vec<&str> = codebase
        .symbol_usages(&foo.id, UsageType::INDIRECT)
        .unwrap()
        .into_iter()
        .map(|n| n.id.as_str())
        .collect();
    assert_eq!(users, vec!["y.py:main"]);
}

#[test]
fn test_aliased_import_usages() {
    let dir = repo(&[
        ("x.py", "def foo():\n    pass\n"),
        ("y.py", "from x import foo as f\n\nf()\n"),
    ]);
    let codebase = build(&dir);

    let usages = codebase.usages("x.py:foo", UsageType::ALIASED).unwrap();
    assert_eq!(usages.len(), 1);
    assert_eq!(usages[0].usage_symbol, "y.py");
    assert_eq!(
        usages[0].match_range.slice(codebase.file_text("y.py").unwrap()),
        "f"
    );
}

#[test]
fn test_circular_reexport_terminates() {
    let dir = repo(&[
        ("x.py", "from y import foo\n"),
        ("y.py", "from x import foo\n"),
    ]);
    let mut codebase = build(&dir);

    for (file, import_id) in [("x.py", "x.py:<import>:foo"), ("y.py", "y.py:<import>:foo")] {
        let resolution = codebase.resolve(import_id).unwrap();
        assert!(resolution.cyclic, "{file} should report the cycle");
        assert!(resolution.target.is_external());

        let terminal = codebase.resolved_symbol(import_id).expect("sentinel node");
        assert!(terminal.is_external());
    }
}

#[test]
fn test_resolve_is_cached_per_epoch() {
    let dir = repo(&[
        ("x.py", "def foo():\n    pass\n"),
        ("y.py", "from x import foo\n"),
    ]);
    let mut codebase = build(&dir);

    let first = codebase.resolve("y.py:<import>:foo").unwrap();
    let second = codebase.resolve("y.py:<import>:foo").unwrap();
    assert_eq!(first, second);
    assert_eq!(first.target, ResolvedTarget::Symbol("x.py:foo".into()));
    assert!(codebase.resolve("x.py:foo").is_err());
}

#[test]
fn test_tsconfig_path_alias() {
    let dir = repo(&[
        (
            "tsconfig.json",
            r#"{
  // aliases
  "compilerOptions": {
    "baseUrl": ".",
    "paths": { "@lib/*": ["src/lib/*"] },
  }
}"#,
        ),
        ("src/lib/util.ts", "export function helper() { return 1; }\n"),
        ("src/app.ts", "import { helper } from '@lib/util';\nhelper();\n"),
    ]);
    let codebase = build(&dir);

    let import = codebase.get_import("src/app.ts", "helper").unwrap();
    let resolved = codebase.resolved_symbol(&import.id).unwrap();
    assert_eq!(resolved.id, "src/lib/util.ts:helper");

    let usages = codebase.usages(&resolved.id, UsageType::INDIRECT).unwrap();
    assert_eq!(usages.len(), 1);
    assert_eq!(usages[0].file, "src/app.ts");
}

#[test]
fn test_subclass_edges_follow_imports() {
    let dir = repo(&[
        ("base.py", "class Base:\n    pass\n"),
        ("child.py", "from base import Base\n\nclass Child(Base):\n    pass\n"),
    ]);
    let codebase = build(&dir);

    let child = codebase.get_class("Child").unwrap();
    let bases: Vec<&str> = codebase
        .graph()
        .outgoing_edges(&child.id)
        .filter(|(_, data)| data.edge_type == EdgeType::SubclassOf)
        .map(|(node, _)| node.id.as_str())
        .collect();
    assert_eq!(bases, vec!["base.py:Base"]);
}

#[test]
fn test_iterators_and_lookups() {
    let dir = repo(&[
        ("a.py", "import os\n\nclass Outer:\n    class Inner:\n        def method(self):\n            pass\n\ndef top():\n    pass\n"),
        ("b.ts", "export class Widget {}\nexport function render() {}\n"),
    ]);
    let codebase = build(&dir);

    let files: Vec<&str> = codebase.files().map(|n| n.id.as_str()).collect();
    assert_eq!(files, vec!["a.py", "b.ts"]);

    let classes: Vec<&str> = codebase.classes().map(|n| n.name()).collect();
    assert_eq!(classes, vec!["Outer", "Inner", "Widget"]);

    let functions: Vec<&str> = codebase.functions().map(|n| n.name()).collect();
    assert_eq!(functions, vec!["top", "render"]);

    assert!(codebase.get_symbol("Inner").is_none());
    assert_eq!(codebase.get_class("Inner").unwrap().id, "a.py:Outer:Inner");
    assert_eq!(codebase.imports().count(), 1);
    assert!(codebase.get_file("a.py").unwrap().is_file());
    assert!(codebase.get_file("missing.py").is_none());
}

#[test]
fn test_language_hint_limits_build() {
    let dir = repo(&[("a.py", "x = 1\n"), ("b.ts", "const y = 2;\n")]);
    let codebase = Codebase::build(dir.path(), Some(SupportedLanguage::Python)).unwrap();
    let files: Vec<&str> = codebase.files().map(|n| n.id.as_str()).collect();
    assert_eq!(files, vec!["a.py"]);
}

#[test]
fn test_validate_healthy_repo() {
    let dir = repo(&[
        ("x.py", "def foo():\n    pass\n"),
        ("y.py", "from x import foo\n"),
    ]);
    let codebase = build(&dir);
    let report = codebase.validate().unwrap();
    assert_eq!(report.status, PostInitValidationStatus::Success);
    assert_eq!(report.resolved_imports, 1);
}
