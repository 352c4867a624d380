//! Graph health checks run after a build.
//!
//! Nothing here runs implicitly; callers decide when a codebase is worth
//! checking and what to do with an unhealthy one.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::codebase::Codebase;

/// Resolved/total import ratio below which a build is reported as unhealthy.
pub const MIN_IMPORT_RESOLUTION_RATE: f64 = 0.5;

/// Outcome of [`post_init_validation`], first failing check wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PostInitValidationStatus {
    Success,
    /// The graph is empty
    NoNodes,
    /// A tracked file has no File node or is gone from disk
    MissingFiles,
    LowImportResolutionRate,
    /// An edge points at a node that no longer exists
    DanglingEdges,
}

impl PostInitValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostInitValidationStatus::Success => "success",
            PostInitValidationStatus::NoNodes => "no_nodes",
            PostInitValidationStatus::MissingFiles => "missing_files",
            PostInitValidationStatus::LowImportResolutionRate => "low_import_resolution_rate",
            PostInitValidationStatus::DanglingEdges => "dangling_edges",
        }
    }
}

impl fmt::Display for PostInitValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status plus the counts it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub status: PostInitValidationStatus,
    pub nodes: usize,
    pub files: usize,
    pub missing_files: Vec<String>,
    pub imports: usize,
    pub resolved_imports: usize,
    pub dangling_edges: usize,
}

impl ValidationReport {
    /// Resolved imports over all imports; 1.0 when there are none.
    pub fn import_resolution_rate(&self) -> f64 {
        if self.imports == 0 {
            1.0
        } else {
            self.resolved_imports as f64 / self.imports as f64
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == PostInitValidationStatus::Success
    }
}

/// Check that a built codebase looks sane.
pub fn post_init_validation(codebase: &Codebase) -> ValidationReport {
    let graph = codebase.graph();

    let missing_files: Vec<String> = codebase
        .file_paths()
        .filter(|path| !graph.contains_node(path) || !codebase.root().join(path).is_file())
        .map(str::to_string)
        .collect();

    let import_nodes: Vec<_> = graph.iter_nodes().filter(|n| n.is_import()).collect();
    let resolved_imports = import_nodes
        .iter()
        .filter(|n| graph.import_target(&n.id).is_some_and(|t| !t.is_external()))
        .count();

    let mut report = ValidationReport {
        status: PostInitValidationStatus::Success,
        nodes: graph.node_count(),
        files: codebase.file_paths().count(),
        missing_files,
        imports: import_nodes.len(),
        resolved_imports,
        dangling_edges: graph.dangling_edge_count(),
    };

    report.status = if report.nodes == 0 {
        PostInitValidationStatus::NoNodes
    } else if !report.missing_files.is_empty() {
        PostInitValidationStatus::MissingFiles
    } else if report.import_resolution_rate() < MIN_IMPORT_RESOLUTION_RATE {
        PostInitValidationStatus::LowImportResolutionRate
    } else if report.dangling_edges > 0 {
        PostInitValidationStatus::DanglingEdges
    } else {
        PostInitValidationStatus::Success
    };

    if report.is_success() {
        debug!(
            "Validation passed: {} nodes, {}/{} imports resolved",
            report.nodes, report.resolved_imports, report.imports
        );
    } else {
        warn!("Validation failed: {}", report.status);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, files: &[(&str, &str)]) {
        for (path, text) in files {
            let abs = dir.path().join(path);
            if let Some(parent) = abs.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(abs, text).unwrap();
        }
    }

    #[test]
    fn test_valid_graph() {
        let dir = TempDir::new().unwrap();
        write(&dir, &[("file.py", "a = 1 + 2\n"), ("file2.py", "b = 1 + 2\n")]);
        let codebase = Codebase::build(dir.path(), None).unwrap();
        let report = post_init_validation(&codebase);
        assert_eq!(report.status, PostInitValidationStatus::Success);
        assert_eq!(report.files, 2);
        assert_eq!(report.import_resolution_rate(), 1.0);
    }

    #[test]
    fn test_no_nodes() {
        let dir = TempDir::new().unwrap();
        let codebase = Codebase::build(dir.path(), None).unwrap();
        assert_eq!(
            post_init_validation(&codebase).status,
            PostInitValidationStatus::NoNodes
        );
    }

    #[test]
    fn test_missing_files() {
        let dir = TempDir::new().unwrap();
        write(&dir, &[("file.py", "a = 1 + 2\n"), ("file2.py", "b = 1 + 2\n")]);
        let codebase = Codebase::build(dir.path(), None).unwrap();
        fs::remove_file(dir.path().join("file.py")).unwrap();

        let report = post_init_validation(&codebase);
        assert_eq!(report.status, PostInitValidationStatus::MissingFiles);
        assert_eq!(report.missing_files, vec!["file.py".to_string()]);
    }

    #[test]
    fn test_low_import_resolution_rate() {
        let dir = TempDir::new().unwrap();
        let bar = "from foo2 import f as f2\nfrom foo3 import f as f3\nfrom numpy import np\n\ndef b():\n    pass\n";
        let foo = "from bar import b\nfrom bar2 import b as b2\nfrom bar3 import b as b3\nfrom bar4 import b as b4\nfrom numpy import np\n\ndef f():\n    pass\n";
        write(&dir, &[("bar.py", bar), ("foo.py", foo)]);
        let codebase = Codebase::build(dir.path(), None).unwrap();

        let report = post_init_validation(&codebase);
        assert_eq!(report.imports, 8);
        assert_eq!(report.resolved_imports, 1);
        assert_eq!(report.status, PostInitValidationStatus::LowImportResolutionRate);
        assert!(codebase.validate().is_err());
    }
}
