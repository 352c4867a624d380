//! Common test utilities for integration tests.
//!
//! Fixture repositories are written into temporary directories so every test
//! owns its working tree and can commit freely.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use codeweave_core::{ByteRange, Codebase};
use tempfile::TempDir;

/// Write `files` (relative path, contents) under a fresh temp directory.
pub fn repo(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    for (path, text) in files {
        write(dir.path(), path, text);
    }
    dir
}

pub fn write(root: &Path, path: &str, text: &str) {
    let abs = root.join(path);
    if let Some(parent) = abs.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    fs::write(abs, text).expect("Failed to write fixture");
}

pub fn read(root: &Path, path: &str) -> String {
    fs::read_to_string(root.join(path)).expect("Failed to read file")
}

pub fn build(dir: &TempDir) -> Codebase {
    Codebase::build(dir.path(), None).expect("Failed to build codebase")
}

/// Byte range of the first occurrence of `needle` in `path`.
pub fn range_of(codebase: &Codebase, path: &str, needle: &str) -> ByteRange {
    let text = codebase.file_text(path).expect("file not tracked");
    let start = text.find(needle).expect("needle not found");
    ByteRange::new(start, start + needle.len())
}

/// Byte range of the last occurrence of `needle` in `path`.
pub fn last_range_of(codebase: &Codebase, path: &str, needle: &str) -> ByteRange {
    let text = codebase.file_text(path).expect("file not tracked");
    let start = text.rfind(needle).expect("needle not found");
    ByteRange::new(start, start + needle.len())
}
