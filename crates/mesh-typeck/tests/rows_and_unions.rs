//! Row-polymorphic records and open/closed union types (spec.md §4.3,
//! §4.4), at the public `analyze` entry point. `structs.rs` in this same
//! directory covers the open/closed record-parameter width check; this
//! file is about row-variable sharing across two parameters and about
//! union membership.

mod support;

use support::*;

#[test]
fn two_open_record_parameters_unify_their_shared_fields_through_a_common_row_variable() {
    // fun same_name(a: { name: String, ... }, b: { name: String, ... }): Bool {
    //     a.name == b.name
    // }
    let mut ids = ids();
    let open_person = ty_record(vec![("name", ty_name("String"))], true);
    let eq = binop(&mut ids, "==", field_access(&mut ids, ident(&mut ids, "a"), "name"), field_access(&mut ids, ident(&mut ids, "b"), "name"));
    let body = block_expr(eq);
    let same_name = fun_def(
        "same_name",
        Vec::new(),
        vec![param("a", &mut ids, Some(open_person.clone())), param("b", &mut ids, Some(open_person))],
        Some(ty_name("Bool")),
        Vec::new(),
        body,
        true,
    );

    let output = analyze(vec![fun_item(same_name)]);
    assert!(output.diagnostics.is_empty(), "diagnostics: {:?}", output.diagnostics.iter().collect::<Vec<_>>());
}

#[test]
fn a_record_literal_missing_a_required_field_is_rejected_against_a_closed_annotation() {
    // fun age_of(person: { name: String, age: Int }): Int { person.age }
    // age_of({ name: "Ada" }) -- missing `age`.
    let mut ids = ids();
    let person_ty = ty_record(vec![("name", ty_name("String")), ("age", ty_name("Int"))], false);
    let body = block_expr(field_access(&mut ids, ident(&mut ids, "person"), "age"));
    let age_of = fun_def("age_of", Vec::new(), vec![param("person", &mut ids, Some(person_ty))], Some(ty_name("Int")), Vec::new(), body, true);

    let call_site = call(&mut ids, ident(&mut ids, "age_of"), vec![record_lit(&mut ids, vec![("name", str_lit(&mut ids, "Ada"))])]);
    let caller = fun_def("greet", Vec::new(), vec![], Some(ty_name("Int")), Vec::new(), block_expr(call_site), true);

    let output = analyze(vec![fun_item(age_of), fun_item(caller)]);
    assert!(!output.diagnostics.is_empty(), "a record literal missing a required field should be rejected");
}

#[test]
fn a_value_unifying_with_one_member_of_a_union_annotation_is_accepted() {
    // fun describe(x: Int | String): String { "" }
    // describe(1) -- Int is a member of the union.
    let mut ids = ids();
    let union_ty = ty_union(vec![ty_name("Int"), ty_name("String")]);
    let body = block_expr(str_lit(&mut ids, ""));
    let describe = fun_def("describe", Vec::new(), vec![param("x", &mut ids, Some(union_ty))], Some(ty_name("String")), Vec::new(), body, true);

    let call_site = call(&mut ids, ident(&mut ids, "describe"), vec![int_lit(&mut ids, 1)]);
    let caller = fun_def("greet", Vec::new(), vec![], Some(ty_name("String")), Vec::new(), block_expr(call_site), true);

    let output = analyze(vec![fun_item(describe), fun_item(caller)]);
    assert!(output.diagnostics.is_empty(), "diagnostics: {:?}", output.diagnostics.iter().collect::<Vec<_>>());
}

#[test]
fn a_value_not_matching_any_union_member_is_rejected_in_strict_mode() {
    // describe(x: Int | String): String { "" }; describe(true) -- Bool is
    // neither member.
    let mut ids = ids();
    let union_ty = ty_union(vec![ty_name("Int"), ty_name("String")]);
    let body = block_expr(str_lit(&mut ids, ""));
    let describe = fun_def("describe", Vec::new(), vec![param("x", &mut ids, Some(union_ty))], Some(ty_name("String")), Vec::new(), body, true);

    let call_site = call(&mut ids, ident(&mut ids, "describe"), vec![bool_lit(&mut ids, true)]);
    let caller = fun_def("greet", Vec::new(), vec![], Some(ty_name("String")), Vec::new(), block_expr(call_site), true);

    let options = mesh_typeck::AnalysisOptions { strict_unions: true, ..mesh_typeck::AnalysisOptions::default() };
    let output = analyze_with(vec![fun_item(describe), fun_item(caller)], options);
    assert!(!output.diagnostics.is_empty(), "Bool is not a member of Int | String and should be rejected under strict unions");
}
