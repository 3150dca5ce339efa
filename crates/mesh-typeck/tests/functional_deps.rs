//! Functional dependencies: coverage (every dependency variable must be
//! one of the trait's own parameters) and consistency (two instances
//! agreeing on the determining parameters must agree on the determined
//! ones too) -- spec.md §4.3, §8 scenario 5.

mod support;

use mesh_common::DiagnosticCode;
use support::*;

#[test]
fn a_fundep_over_the_traits_own_parameters_is_accepted() {
    // trait Convert[A, B] | A -> B { fun convert(a: A): B }
    let convert = trait_def(
        "Convert",
        vec!["A", "B"],
        Vec::new(),
        vec![fundep(vec!["A"], vec!["B"])],
        vec![trait_method("convert", vec![ty_name("A")], ty_name("B"), None)],
    );

    let output = analyze(vec![convert]);
    assert!(output.diagnostics.is_empty(), "diagnostics: {:?}", output.diagnostics.iter().collect::<Vec<_>>());
}

#[test]
fn a_fundep_referencing_a_variable_outside_the_traits_parameters_is_rejected() {
    // trait Convert[A, B] | A -> C { ... } -- `C` is not a parameter.
    let convert = trait_def(
        "Convert",
        vec!["A", "B"],
        Vec::new(),
        vec![fundep(vec!["A"], vec!["C"])],
        vec![trait_method("convert", vec![ty_name("A")], ty_name("B"), None)],
    );

    let output = analyze(vec![convert]);
    assert!(output.diagnostics.iter().any(|d| d.code == DiagnosticCode::TypeError));
}

#[test]
fn two_instances_agreeing_on_the_determining_parameter_must_agree_on_the_determined_one() {
    // trait Convert[A, B] | A -> B { fun convert(a: A): B }
    // instance Convert[Int, String] { fun convert(a: Int): String { "" } }
    // instance Convert[Int, Bool]   { fun convert(a: Int): Bool   { true } }
    // Both fix A = Int but disagree on B, violating the fundep.
    let convert = trait_def(
        "Convert",
        vec!["A", "B"],
        Vec::new(),
        vec![fundep(vec!["A"], vec!["B"])],
        vec![trait_method("convert", vec![ty_name("A")], ty_name("B"), None)],
    );

    let mut ids = ids();
    let body_a = block_expr(str_lit(&mut ids, ""));
    let method_a = fun_def("convert", Vec::new(), vec![param("a", &mut ids, Some(ty_name("Int")))], Some(ty_name("String")), Vec::new(), body_a, true);
    let first = instance("Convert", vec![ty_name("Int"), ty_name("String")], vec![method_a]);

    let body_b = block_expr(bool_lit(&mut ids, true));
    let method_b = fun_def("convert", Vec::new(), vec![param("a", &mut ids, Some(ty_name("Int")))], Some(ty_name("Bool")), Vec::new(), body_b, true);
    let second = instance("Convert", vec![ty_name("Int"), ty_name("Bool")], vec![method_b]);

    let output = analyze(vec![convert, first, second]);
    assert!(output.diagnostics.iter().any(|d| d.code == DiagnosticCode::TypeError));
}

#[test]
fn two_instances_agreeing_on_both_determining_and_determined_parameters_are_consistent() {
    // Same instance registered against two unrelated traits, each
    // independently consistent with its own fundep -- disjoint A's never
    // collide, so no violation is reported.
    let convert = trait_def(
        "Convert",
        vec!["A", "B"],
        Vec::new(),
        vec![fundep(vec!["A"], vec!["B"])],
        vec![trait_method("convert", vec![ty_name("A")], ty_name("B"), None)],
    );

    let mut ids = ids();
    let body_int = block_expr(str_lit(&mut ids, ""));
    let method_int = fun_def("convert", Vec::new(), vec![param("a", &mut ids, Some(ty_name("Int")))], Some(ty_name("String")), Vec::new(), body_int, true);
    let int_instance = instance("Convert", vec![ty_name("Int"), ty_name("String")], vec![method_int]);

    let body_bool = block_expr(str_lit(&mut ids, ""));
    let method_bool = fun_def("convert", Vec::new(), vec![param("a", &mut ids, Some(ty_name("Bool")))], Some(ty_name("String")), Vec::new(), body_bool, true);
    let bool_instance = instance("Convert", vec![ty_name("Bool"), ty_name("String")], vec![method_bool]);

    let output = analyze(vec![convert, int_instance, bool_instance]);
    assert!(output.diagnostics.is_empty(), "diagnostics: {:?}", output.diagnostics.iter().collect::<Vec<_>>());
}
