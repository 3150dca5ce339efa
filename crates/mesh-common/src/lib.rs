//! Shared types for the Mesh semantic analyzer: spans, diagnostics, and the
//! abstract AST the analyzer consumes.
//!
//! Lexing, parsing, module-file loading and caching, the bytecode
//! evaluator, the CLI, and the standard library are external collaborators
//! (spec.md §1). This crate holds only the interface shapes the analyzer
//! in `mesh-typeck` needs from them, plus the plumbing (spans,
//! diagnostics) that both sides share.

pub mod ast;
pub mod error;
pub mod span;

pub use ast::{ModuleLoader, NodeId, NodeIdGen, Program};
pub use error::{Diagnostic, DiagnosticCode, DiagnosticSink, SourceToken};
pub use span::Span;
