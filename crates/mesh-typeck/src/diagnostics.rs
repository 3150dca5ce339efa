//! Ariadne-based diagnostic rendering for `TypeError` (spec.md §6
//! "Diagnostics channel").
//!
//! `mesh_common::render_diagnostics`-style one-liners are enough for a
//! pipeline that only needs the bare `file:span: [code] message` form, but
//! a human-facing renderer wants labeled source spans and a fix suggestion
//! when one is plausible. Grounded directly on the teacher's
//! `snow-typeck/src/diagnostics.rs`: colorless `Config` for deterministic
//! output, a single primary label per report, and a `fix_suggestion`
//! helper for the handful of mismatches with an obvious fix.

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use serde::Serialize;

use crate::error::TypeError;
use crate::ty::Ty;

/// Clamp a byte range to `len`, widening zero-length spans by one byte so
/// ariadne always has something to underline (synthetic spans are 0..0).
fn clamp(range: Range<usize>, len: usize) -> Range<usize> {
    let start = range.start.min(len);
    let end = range.end.min(len).max(start);
    if start == end {
        start..end.saturating_add(1).min(len).max(start)
    } else {
        start..end
    }
}

/// A fix suggestion for the common "wrap in constructor" / "convert"
/// mismatches, the same short list the teacher's `fix_suggestion` covers.
fn fix_suggestion(expected: &Ty, found: &Ty) -> Option<String> {
    let expected_str = expected.to_string();
    let found_str = found.to_string();
    if let Some(inner) = expected_str.strip_prefix("Option<").and_then(|s| s.strip_suffix('>')) {
        if inner == found_str {
            return Some("wrap in Some(...)".to_string());
        }
    }
    if let Some(inner) = expected_str.strip_prefix("Result<") {
        if let Some(comma) = inner.find(',') {
            if inner[..comma].trim() == found_str {
                return Some("wrap in Ok(...)".to_string());
            }
        }
    }
    match (expected_str.as_str(), found_str.as_str()) {
        ("Int", "Float") => Some("use an Int conversion".to_string()),
        ("Float", "Int") => Some("use a Float conversion".to_string()),
        ("String", "Int") | ("String", "Float") => Some("use to_string()".to_string()),
        ("Bool", _) if found_str != "Bool" => Some("expected a boolean expression".to_string()),
        _ => None,
    }
}

/// A non-generic "why this is wrong" label for the primary span, used
/// whenever `error.to_string()` alone doesn't already say it.
fn primary_label(error: &TypeError) -> String {
    match error {
        TypeError::Mismatch { expected, found, .. } => format!("expected `{expected}`, found `{found}`"),
        TypeError::InfiniteType { .. } => "recursive type here".to_string(),
        TypeError::ArityMismatch { expected, found, .. } => format!("expected {expected} argument(s), found {found}"),
        TypeError::UndeclaredIdentifier { .. } | TypeError::UndefinedSymbol { .. } => "not found in this scope".to_string(),
        TypeError::UndeclaredType { .. } => "not a known type".to_string(),
        TypeError::NonExhaustiveMatch { missing_patterns, .. } => format!("missing: {}", missing_patterns.join(", ")),
        TypeError::RedundantArm { .. } => "this arm is unreachable".to_string(),
        TypeError::UnresolvedWitness { trait_name, .. } => format!("no instance of `{trait_name}` in scope"),
        _ => error.to_string(),
    }
}

/// The report severity: every `TypeError` is a hard error except
/// `RedundantArm`, which spec.md §4.5 "Reachability" calls non-fatal.
fn report_kind(error: &TypeError) -> ReportKind<'static> {
    match error {
        TypeError::RedundantArm { .. } => ReportKind::Warning,
        _ => ReportKind::Error,
    }
}

fn label_color(error: &TypeError) -> Color {
    match report_kind(error) {
        ReportKind::Warning => Color::Yellow,
        _ => Color::Red,
    }
}

/// Render `error` against its own source text as a labeled, colorless
/// ariadne report: `[code] message` plus a primary span label and, for a
/// type mismatch with an obvious fix, a help line.
pub fn render_diagnostic(error: &TypeError, source: &str, _filename: &str) -> String {
    let config = Config::default().with_color(false);
    let len = source.len();
    let span = clamp(error.span().start as usize..error.span().end as usize, len);
    let code = error.code().as_str();
    let message = error.to_string();

    let mut builder = Report::build(report_kind(error), span.clone())
        .with_code(code)
        .with_message(&message)
        .with_config(config)
        .with_label(Label::new(span).with_message(primary_label(error)).with_color(label_color(error)));

    if let TypeError::Mismatch { expected, found, .. } = error {
        if let Some(fix) = fix_suggestion(expected, found) {
            builder.set_help(fix);
        }
    }

    let report = builder.finish();
    let mut buf = Vec::new();
    report.write(Source::from(source), &mut buf).expect("ariadne report should render");
    String::from_utf8(buf).expect("diagnostic output should be valid UTF-8")
}

#[derive(Serialize)]
struct JsonSpan {
    start: usize,
    end: usize,
}

#[derive(Serialize)]
struct JsonDiagnostic<'a> {
    code: &'a str,
    severity: &'a str,
    message: String,
    spans: Vec<JsonSpan>,
}

/// Render `error` as a single-line JSON object instead of ariadne's
/// human-facing text, for a machine-readable diagnostics stream (spec.md
/// §6 "Diagnostics channel"). Same `code`/`severity`/`message`/`spans`
/// shape the teacher's own JSON-mode diagnostic output carries.
pub fn render_diagnostic_json(error: &TypeError, source: &str) -> String {
    let len = source.len();
    let span = clamp(error.span().start as usize..error.span().end as usize, len);
    let severity = match report_kind(error) {
        ReportKind::Warning => "warning",
        _ => "error",
    };
    let json = JsonDiagnostic { code: error.code().as_str(), severity, message: error.to_string(), spans: vec![JsonSpan { start: span.start, end: span.end }] };
    serde_json::to_string(&json).expect("diagnostic should serialize to JSON")
}
