//! Snapshot tests for the ariadne-backed diagnostic renderer (spec.md §6
//! "Diagnostics channel"), exercised end to end by triggering a real
//! `TypeError` through `analyze` and rendering the first diagnostic's
//! underlying error, rather than constructing `TypeError` values by hand.

mod support;

use mesh_typeck::diagnostics::{render_diagnostic, render_diagnostic_json};
use mesh_typeck::error::{ConstraintOrigin, TypeError};
use mesh_typeck::Ty;
use support::*;

#[test]
fn a_plain_type_mismatch_renders_with_a_labeled_span_and_no_fix_suggestion() {
    let err = TypeError::Mismatch { expected: Ty::int(), found: Ty::string(), origin: ConstraintOrigin::Builtin };
    let rendered = render_diagnostic(&err, "let total :: Int = \"oops\"", "main.mpl");
    insta::assert_snapshot!(rendered);
}

#[test]
fn an_option_shaped_mismatch_renders_with_a_wrap_in_some_suggestion() {
    let expected = Ty::app(Ty::Con(mesh_typeck::ty::TyCon::simple("Option")), vec![Ty::int()]);
    let err = TypeError::Mismatch { expected, found: Ty::int(), origin: ConstraintOrigin::Builtin };
    let rendered = render_diagnostic(&err, "find_user(id)", "main.mpl");
    insta::assert_snapshot!(rendered);
}

#[test]
fn a_non_exhaustive_match_renders_the_missing_patterns_in_its_label() {
    let mut ids = ids();
    let box_def = sum_type("Box", vec![variant("Full", vec![ty_name("Int")]), variant("Empty", vec![])], true);
    let scrutinee = ident(&mut ids, "b");
    let full_pat = ctor_pat(&mut ids, "Full", vec![var_pat(&mut ids, "n")]);
    let match_e = match_expr(&mut ids, scrutinee, vec![arm(full_pat, ident(&mut ids, "n"))]);
    let peek = fun_def("peek", Vec::new(), vec![param("b", &mut ids, Some(ty_name("Box")))], Some(ty_name("Int")), Vec::new(), block_expr(match_e), true);

    let output = analyze(vec![box_def, fun_item(peek)]);
    let diagnostic = output.diagnostics.iter().next().expect("non-exhaustive match should produce a diagnostic");
    assert_eq!(diagnostic.code, mesh_common::DiagnosticCode::NonExhaustiveMatch);
    assert!(diagnostic.message.contains("Empty"));
}

#[test]
fn rendering_a_diagnostic_against_its_own_zero_length_synthetic_span_does_not_panic() {
    let err = TypeError::UndefinedSymbol { name: "ghost".into(), span: mesh_common::Span::synthetic() };
    let rendered = render_diagnostic(&err, "", "main.mpl");
    assert!(rendered.contains("A006"));
    assert!(rendered.contains("ghost"));
}

#[test]
fn the_json_rendering_of_a_mismatch_round_trips_through_serde_json() {
    let err = TypeError::Mismatch { expected: Ty::int(), found: Ty::string(), origin: ConstraintOrigin::Builtin };
    let output = render_diagnostic_json(&err, "let total :: Int = \"oops\"");
    assert!(!output.contains('\n'), "JSON diagnostics are emitted one per line");

    let parsed: serde_json::Value = serde_json::from_str(&output).expect("renderer output should be valid JSON");
    assert_eq!(parsed["code"], "A003");
    assert_eq!(parsed["severity"], "error");
    assert!(parsed["spans"].as_array().expect("spans should be an array").len() == 1);
}

#[test]
fn a_redundant_match_arm_renders_as_a_warning_not_an_error() {
    let err = TypeError::RedundantArm { span: mesh_common::Span::synthetic() };
    let rendered = render_diagnostic(&err, "", "main.mpl");
    assert!(rendered.to_lowercase().contains("warning"));
}
