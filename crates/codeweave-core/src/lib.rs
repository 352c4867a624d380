//! Codeweave Core - code graph, import resolution and transactional edits
//!
//! This crate provides:
//! - Tree-sitter parsing and per-language extraction (Python, JavaScript, TypeScript)
//! - A typed code graph of files, symbols, imports and external modules
//! - Import resolution across files, including `tsconfig.json` path aliases
//! - Usage and dependency queries over the graph
//! - A transaction queue for byte-precise, conflict-checked source edits
//!   applied through a [`Codebase`] session with commit, reset and diff

pub mod builder;
pub mod codebase;
pub mod frontend;
pub mod graph;
pub mod linker;
pub mod model;
pub mod parser;
pub mod resolver;
pub mod transaction;
pub mod tsconfig;
pub mod usage;
pub mod validation;

// Session re-exports
pub use codebase::{BuildOptions, Codebase, CodebaseError, CodebaseStats, CommitSummary};

// Graph re-exports
pub use graph::{CodeGraph, Edge, EdgeData, EdgeType, FileInfo, Node, NodeKind, NodeType};
pub use model::{ByteRange, HasBody, HasDecorators, HasName, ImportInfo, SymbolInfo, SymbolKind};

// Parser re-exports
pub use parser::{CodeParser, ParserError, SupportedLanguage};

// Builder re-exports
pub use builder::{collect_files, BuilderConfig, BuilderError, DiscoveredFiles, SourceFile};

// Resolution re-exports
pub use linker::LinkStats;
pub use resolver::{Resolution, ResolutionCache, ResolvedTarget};
pub use tsconfig::{ProjectConfig, ProjectConfigs, TsConfigError};

// Query re-exports
pub use usage::{Usage, UsageType};

// Transaction re-exports
pub use transaction::{
    Enqueued, SessionLimits, Threshold, Transaction, TransactionError, TransactionKind,
    TransactionManager, TransactionRequest,
};

// Validation re-exports
pub use validation::{post_init_validation, PostInitValidationStatus, ValidationReport};
