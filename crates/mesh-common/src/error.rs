//! The diagnostics channel (spec.md §6, §7): a stable taxonomy of codes and
//! a structured `Diagnostic` carrying a source token, independent of any
//! particular pass.

use std::fmt;

use serde::Serialize;

use crate::span::Span;

/// Stable diagnostic codes. Every error the analyzer produces maps onto
/// exactly one of these eight (spec.md §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiagnosticCode {
    /// A001: undeclared identifier (missing imports, unknown trait, module not found).
    UndeclaredIdentifier,
    /// A002: undeclared type.
    UndeclaredType,
    /// A003: type error (mismatches, kind errors, illegal mutations, break/continue
    /// outside loops, functional-dependency violations).
    TypeError,
    /// A004: redefinition or overlap.
    Redefinition,
    /// A005: reserved for assignment-type mismatch (used sparingly).
    AssignmentMismatch,
    /// A006: undefined symbol.
    UndefinedSymbol,
    /// A007: non-exhaustive match.
    NonExhaustiveMatch,
    /// A008: naming-convention violation.
    NamingConvention,
}

impl DiagnosticCode {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticCode::UndeclaredIdentifier => "A001",
            DiagnosticCode::UndeclaredType => "A002",
            DiagnosticCode::TypeError => "A003",
            DiagnosticCode::Redefinition => "A004",
            DiagnosticCode::AssignmentMismatch => "A005",
            DiagnosticCode::UndefinedSymbol => "A006",
            DiagnosticCode::NonExhaustiveMatch => "A007",
            DiagnosticCode::NamingConvention => "A008",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The source token a diagnostic is anchored to: which file, where in it,
/// and (when available) the offending lexeme -- spec.md §6.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceToken {
    pub file: String,
    pub span: Span,
    pub lexeme: Option<String>,
}

impl SourceToken {
    pub fn new(file: impl Into<String>, span: Span) -> Self {
        Self { file: file.into(), span, lexeme: None }
    }

    pub fn with_lexeme(mut self, lexeme: impl Into<String>) -> Self {
        self.lexeme = Some(lexeme.into());
        self
    }
}

/// A single diagnostic emitted by the analyzer.
///
/// Duplicate diagnostics for the same token are deduplicated by a
/// `(token, code)` key (spec.md §7 "Propagation policy").
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub message: String,
    pub token: SourceToken,
    /// At most one "did you mean" suggestion (spec.md §7 "Hints").
    pub hint: Option<String>,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, message: impl Into<String>, token: SourceToken) -> Self {
        Self { code, message: message.into(), token, hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// The `(file, span, code)` key used to deduplicate diagnostics.
    pub fn dedup_key(&self) -> (String, Span, &'static str) {
        (self.token.file.clone(), self.token.span, self.code.as_str())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (did you mean `{hint}`?)")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// An accumulator of diagnostics shared across all four passes (spec.md §7
/// "Propagation policy": each pass accumulates errors rather than aborting).
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
    seen: std::collections::HashSet<(String, Span, &'static str)>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        if self.seen.insert(diagnostic.dedup_key()) {
            self.diagnostics.push(diagnostic);
        }
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for d in diagnostics {
            self.push(d);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}
