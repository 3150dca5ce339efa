//! Pattern exhaustiveness and redundancy, exercised through `analyze`
//! rather than `exhaustiveness::is_useful` directly (spec.md §4.5).

mod support;

use mesh_common::DiagnosticCode;
use support::*;

fn traffic_light() -> mesh_common::ast::Item {
    sum_type("Light", vec![variant("Red", vec![]), variant("Yellow", vec![]), variant("Green", vec![])], true)
}

#[test]
fn a_match_covering_every_variant_is_exhaustive() {
    let light_def = traffic_light();
    let mut ids = ids();
    let scrutinee = ident(&mut ids, "l");
    let arms = vec![
        arm(ctor_pat(&mut ids, "Red", vec![]), int_lit(&mut ids, 0)),
        arm(ctor_pat(&mut ids, "Yellow", vec![]), int_lit(&mut ids, 1)),
        arm(ctor_pat(&mut ids, "Green", vec![]), int_lit(&mut ids, 2)),
    ];
    let body = block_expr(match_expr(&mut ids, scrutinee, arms));
    let code_of = fun_def("code_of", Vec::new(), vec![param("l", &mut ids, Some(ty_name("Light")))], Some(ty_name("Int")), Vec::new(), body, true);

    let output = analyze(vec![light_def, fun_item(code_of)]);
    assert!(output.diagnostics.is_empty(), "diagnostics: {:?}", output.diagnostics.iter().collect::<Vec<_>>());
}

#[test]
fn a_match_missing_one_variant_is_reported_non_exhaustive() {
    let light_def = traffic_light();
    let mut ids = ids();
    let scrutinee = ident(&mut ids, "l");
    // Missing `Green`.
    let arms = vec![arm(ctor_pat(&mut ids, "Red", vec![]), int_lit(&mut ids, 0)), arm(ctor_pat(&mut ids, "Yellow", vec![]), int_lit(&mut ids, 1))];
    let body = block_expr(match_expr(&mut ids, scrutinee, arms));
    let code_of = fun_def("code_of", Vec::new(), vec![param("l", &mut ids, Some(ty_name("Light")))], Some(ty_name("Int")), Vec::new(), body, true);

    let output = analyze(vec![light_def, fun_item(code_of)]);
    assert!(output.diagnostics.iter().any(|d| d.code == DiagnosticCode::NonExhaustiveMatch));
}

#[test]
fn a_trailing_wildcard_after_every_variant_is_already_matched_makes_it_redundant() {
    let light_def = traffic_light();
    let mut ids = ids();
    let scrutinee = ident(&mut ids, "l");
    let arms = vec![
        arm(ctor_pat(&mut ids, "Red", vec![]), int_lit(&mut ids, 0)),
        arm(ctor_pat(&mut ids, "Yellow", vec![]), int_lit(&mut ids, 1)),
        arm(ctor_pat(&mut ids, "Green", vec![]), int_lit(&mut ids, 2)),
        arm(wildcard_pat(&mut ids), int_lit(&mut ids, -1)),
    ];
    let body = block_expr(match_expr(&mut ids, scrutinee, arms));
    let code_of = fun_def("code_of", Vec::new(), vec![param("l", &mut ids, Some(ty_name("Light")))], Some(ty_name("Int")), Vec::new(), body, true);

    let output = analyze(vec![light_def, fun_item(code_of)]);
    assert!(output.diagnostics.iter().any(|d| matches!(d.code, DiagnosticCode::TypeError)), "the trailing wildcard should be flagged as unreachable");
}

#[test]
fn an_or_pattern_covering_the_remaining_variants_is_exhaustive() {
    let light_def = traffic_light();
    let mut ids = ids();
    let scrutinee = ident(&mut ids, "l");
    let rest = or_pat(&mut ids, vec![ctor_pat(&mut ids, "Yellow", vec![]), ctor_pat(&mut ids, "Green", vec![])]);
    let arms = vec![arm(ctor_pat(&mut ids, "Red", vec![]), int_lit(&mut ids, 0)), arm(rest, int_lit(&mut ids, 1))];
    let body = block_expr(match_expr(&mut ids, scrutinee, arms));
    let code_of = fun_def("code_of", Vec::new(), vec![param("l", &mut ids, Some(ty_name("Light")))], Some(ty_name("Int")), Vec::new(), body, true);

    let output = analyze(vec![light_def, fun_item(code_of)]);
    assert!(output.diagnostics.is_empty(), "diagnostics: {:?}", output.diagnostics.iter().collect::<Vec<_>>());
}
