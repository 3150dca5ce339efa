//! Trait/instance registration and dictionary-passing elaboration,
//! exercised end-to-end through the public `analyze` entry point.

mod support;

use mesh_common::DiagnosticCode;
use support::*;

#[test]
fn calling_a_trait_method_through_a_concrete_instance_resolves_without_error() {
    let mut ids = ids();
    // fun describe(n: Int): String { n.show() }
    let receiver = ident(&mut ids, "n");
    let show_call = call(&mut ids, field_access(&mut ids, receiver, "show"), vec![]);
    let body = block_expr(show_call);
    let describe = fun_def(
        "describe",
        Vec::new(),
        vec![param("n", &mut ids, Some(ty_name("Int")))],
        Some(ty_name("String")),
        Vec::new(),
        body,
        true,
    );

    let output = analyze(vec![fun_item(describe)]);
    assert!(output.diagnostics.is_empty(), "diagnostics: {:?}", output.diagnostics.iter().collect::<Vec<_>>());
}

#[test]
fn user_defined_trait_with_missing_method_is_rejected() {
    let mut ids = ids();
    let trait_item = trait_def(
        "Greet",
        vec!["A"],
        Vec::new(),
        Vec::new(),
        vec![trait_method("hello", vec![ty_name("A")], ty_name("String"), None)],
    );

    // instance Greet[Int] {} -- no `hello` method supplied.
    let bad_instance = instance("Greet", vec![ty_name("Int")], Vec::new());
    let _ = &mut ids;

    let output = analyze(vec![trait_item, bad_instance]);
    assert!(!output.diagnostics.is_empty());
    assert!(output.diagnostics.iter().any(|d| d.code == DiagnosticCode::Redefinition));
}

#[test]
fn overlapping_instances_for_the_same_trait_are_rejected() {
    let trait_item = trait_def("Greet", vec!["A"], Vec::new(), Vec::new(), vec![trait_method("hello", vec![ty_name("A")], ty_name("String"), None)]);

    let mut ids = ids();
    let body_a = block_expr(str_lit(&mut ids, "hi"));
    let method_a = fun_def("hello", Vec::new(), vec![param("self", &mut ids, Some(ty_name("Int")))], Some(ty_name("String")), Vec::new(), body_a, true);
    let first = instance("Greet", vec![ty_name("Int")], vec![method_a]);

    let body_b = block_expr(str_lit(&mut ids, "hi again"));
    let method_b = fun_def("hello", Vec::new(), vec![param("self", &mut ids, Some(ty_name("Int")))], Some(ty_name("String")), Vec::new(), body_b, true);
    let second = instance("Greet", vec![ty_name("Int")], vec![method_b]);

    let output = analyze(vec![trait_item, first, second]);
    assert!(output.diagnostics.iter().any(|d| d.code == DiagnosticCode::Redefinition));
}

#[test]
fn super_trait_must_be_implemented_for_the_same_type() {
    let equal = trait_def("Equal2", vec!["A"], Vec::new(), Vec::new(), vec![trait_method("eq2", vec![ty_name("A"), ty_name("A")], ty_name("Bool"), None)]);
    let order = trait_def(
        "Order2",
        vec!["A"],
        vec![constraint("Equal2", vec![ty_name("A")])],
        Vec::new(),
        vec![trait_method("cmp2", vec![ty_name("A"), ty_name("A")], ty_name("Int"), None)],
    );

    let mut ids = ids();
    let body = block_expr(int_lit(&mut ids, 0));
    let cmp_method = fun_def("cmp2", Vec::new(), vec![param("a", &mut ids, Some(ty_name("Int"))), param("b", &mut ids, Some(ty_name("Int")))], Some(ty_name("Int")), Vec::new(), body, true);
    // Order2[Int] without a matching Equal2[Int] instance.
    let order_instance = instance("Order2", vec![ty_name("Int")], vec![cmp_method]);

    let output = analyze(vec![equal, order, order_instance]);
    assert!(!output.diagnostics.is_empty());
}

#[test]
fn from_instance_synthesizes_a_matching_into_instance() {
    // trait From[A] { fun from(x: A): ? }; instance From[String] builds an
    // Int, so `Into` for `String` producing `Int` is synthesized alongside.
    let from_trait = trait_def("From", vec!["A"], Vec::new(), Vec::new(), vec![trait_method("from", vec![ty_name("A")], ty_name("Int"), None)]);

    let mut ids = ids();
    let body = block_expr(int_lit(&mut ids, 0));
    let from_method = fun_def("from", Vec::new(), vec![param("s", &mut ids, Some(ty_name("String")))], Some(ty_name("Int")), Vec::new(), body, true);
    let from_instance = instance("From", vec![ty_name("String")], vec![from_method]);

    let output = analyze(vec![from_trait, from_instance]);
    assert!(output.diagnostics.is_empty(), "diagnostics: {:?}", output.diagnostics.iter().collect::<Vec<_>>());
    let synthesized_into = output.traits.has_impl("Into", &[mesh_typeck::Ty::int()]);
    assert!(synthesized_into, "From[String] -> Int should synthesize Into[Int] for String");
}
