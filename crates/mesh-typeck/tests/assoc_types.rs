//! Generic type aliases and higher-kinded constructor applications --
//! this analyzer's closest equivalent to "type-level" features, since
//! spec.md has no associated-type construct of its own.

mod support;

use support::*;

#[test]
fn generic_type_alias_expands_through_unification() {
    // type Pair<a> = (a, a)
    let pair_alias = type_alias("Pair", vec![generic("a")], ty_app(ty_name("Tuple2"), vec![ty_name("a"), ty_name("a")]), true);

    // fun swap(p: Pair<Int>): Pair<Int> { p }
    let mut ids = ids();
    let body = block_expr(ident(&mut ids, "p"));
    let swap = fun_def(
        "swap",
        Vec::new(),
        vec![param("p", &mut ids, Some(ty_app(ty_name("Pair"), vec![ty_name("Int")])))],
        Some(ty_app(ty_name("Pair"), vec![ty_name("Int")])),
        Vec::new(),
        body,
        true,
    );

    let output = analyze(vec![pair_alias, fun_item(swap)]);
    assert!(output.diagnostics.is_empty(), "diagnostics: {:?}", output.diagnostics.iter().collect::<Vec<_>>());
}

#[test]
fn self_referential_type_alias_is_rejected_as_cyclic() {
    // type Bad = Bad
    let bad_alias = type_alias("Bad", Vec::new(), ty_name("Bad"), true);
    let output = analyze(vec![bad_alias]);
    assert!(!output.diagnostics.is_empty(), "a directly self-referential alias must be rejected");
}

#[test]
fn higher_kinded_functor_instance_applies_to_a_parameterized_constructor() {
    // The prelude already registers `Functor Option`; exercise it through
    // a call to the built-in `map` trait method on an `Option<Int>` value.
    let mut ids = ids();
    let ctor = call(&mut ids, ident(&mut ids, "Some"), vec![int_lit(&mut ids, 1)]);
    let mapper = mesh_common::ast::Expr {
        id: ids.next(),
        kind: mesh_common::ast::ExprKind::Function(mesh_common::ast::FunctionLiteral {
            params: vec![param("n", &mut ids, None)],
            variadic_param: None,
            return_type: None,
            body: Box::new(block_expr(ident(&mut ids, "n"))),
        }),
        span: sp(),
    };
    let mapped = call(&mut ids, field_access(&mut ids, ctor, "map"), vec![mapper]);
    let body = block_expr(mapped);
    let use_functor = fun_def("use_functor", Vec::new(), vec![], None, Vec::new(), body, true);

    let output = analyze(vec![fun_item(use_functor)]);
    assert!(output.diagnostics.is_empty(), "diagnostics: {:?}", output.diagnostics.iter().collect::<Vec<_>>());
}
