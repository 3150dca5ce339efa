//! The built-in surface (spec.md §6 "Built-in surface"): primitive type
//! constructors, generic containers, monad-transformer constructors,
//! built-in traits with their primitive instances, and free functions.
//! Registered once per process before the driver's passes run, exactly
//! the way the teacher's `builtins.rs` seeds its `TypeEnv`/`TraitRegistry`
//! before inference starts -- generalized here from the teacher's
//! single-parameter traits to the multi-parameter `TraitRegistry` this
//! analyzer uses.
//!
//! This module has no `Cargo.toml` surface of its own to carry: it is
//! plain registration code over `SymbolTable`/`TraitRegistry`, run from
//! the driver's `analyze` entry point (spec.md §6, SPEC_FULL.md §10.6).

use rustc_hash::FxHashMap;

use mesh_common::Span;

use crate::kind::Kind;
use crate::scope::{SymbolTable, TypeDefInfo, TypeDefKind};
use crate::traits::{ImplDef, ImplMethodSig, TraitDef, TraitMethodSig, TraitRegistry};
use crate::ty::{Scheme, Ty, TyCon};
use crate::unify::InferCtx;

/// Register the full prelude into `table`/`traits`, using `ctx` to mint
/// the fresh type variables that make prelude functions and trait methods
/// polymorphic (spec.md §6 "Built-in surface").
pub fn register_prelude(table: &mut SymbolTable, traits: &mut TraitRegistry, ctx: &mut InferCtx) {
    register_primitive_types(table);
    register_containers(table);
    register_monad_transformers(table);
    register_traits(table, traits, ctx);
    register_primitive_instances(traits, ctx);
    register_free_functions(table, ctx);
}

fn con(name: &str, span: Span, kind: Kind, table: &mut SymbolTable) {
    let _ = span;
    table.define_type(TypeDefInfo { con: TyCon::new(name, kind.clone()), kind: TypeDefKind::Struct { fields: Vec::new() }, span: Span::synthetic() });
    table.define_kind(name, kind);
}

/// spec.md §6 "primitive type constructors (Int, Float, Bool, Char,
/// BigInt, Rational, String=`List<Char>`)".
fn register_primitive_types(table: &mut SymbolTable) {
    for name in ["Int", "Float", "Bool", "Char", "BigInt", "Rational"] {
        con(name, Span::synthetic(), Kind::Star, table);
    }
    // `String` is a transparent alias for `List<Char>`, not its own
    // constructor (spec.md §6).
    table.define_type_alias("String", Ty::string());
}

/// spec.md §6 "generic container constructors (List, Option, Result, Map,
/// Bytes, Bits, Range)".
fn register_containers(table: &mut SymbolTable) {
    con("List", Span::synthetic(), Kind::arrows(vec![Kind::Star, Kind::Star]), table);
    con("Option", Span::synthetic(), Kind::arrows(vec![Kind::Star, Kind::Star]), table);
    con("Result", Span::synthetic(), Kind::arrows(vec![Kind::Star, Kind::Star, Kind::Star]), table);
    con("Map", Span::synthetic(), Kind::arrows(vec![Kind::Star, Kind::Star, Kind::Star]), table);
    con("Bytes", Span::synthetic(), Kind::Star, table);
    con("Bits", Span::synthetic(), Kind::Star, table);
    con("Range", Span::synthetic(), Kind::Star, table);
}

/// spec.md §6 "monad-transformer constructors (Reader, State, Writer,
/// Identity, OptionT, ResultT)".
fn register_monad_transformers(table: &mut SymbolTable) {
    con("Identity", Span::synthetic(), Kind::arrows(vec![Kind::Star, Kind::Star]), table);
    con("Reader", Span::synthetic(), Kind::arrows(vec![Kind::Star, Kind::Star, Kind::Star]), table);
    con("State", Span::synthetic(), Kind::arrows(vec![Kind::Star, Kind::Star, Kind::Star]), table);
    con("Writer", Span::synthetic(), Kind::arrows(vec![Kind::Star, Kind::Star, Kind::Star]), table);
    // `f` in `OptionT f a` / `ResultT f e a` is higher-kinded
    // (`Star -> Star`), matching the `HKT` glossary entry.
    let hkt_arg = Kind::arrows(vec![Kind::Star, Kind::Star]);
    con("OptionT", Span::synthetic(), Kind::arrows(vec![hkt_arg.clone(), Kind::Star, Kind::Star]), table);
    con("ResultT", Span::synthetic(), Kind::arrows(vec![hkt_arg, Kind::Star, Kind::Star, Kind::Star]), table);
}

/// spec.md §6 "built-in traits (Show, Equal, Order, Numeric, Bitwise,
/// Concat, Default, Functor, Applicative, Monad, Semigroup, Monoid, Empty,
/// Optional, Iter) with their methods and operator associations".
///
/// Method signatures are written in terms of single-uppercase-letter
/// `TyCon` placeholders (`A`, `F`, ...) rather than fresh `ctx` variables,
/// matching the trait's own `type_params` names: both `ty_mentions_trait_param`
/// (used to skip an overly strict return-type check during `register_impl`)
/// and `freshen_type_params` (used at witness-resolution time) only
/// recognize a single-uppercase-letter `TyCon`, not a flexible `Ty::Var`.
fn register_traits(table: &mut SymbolTable, traits: &mut TraitRegistry, _ctx: &mut InferCtx) {
    let a = Ty::Con(TyCon::simple("A"));

    let simple = |name: &str, methods: Vec<TraitMethodSig>| TraitDef {
        name: name.to_string(),
        type_params: vec!["A".to_string()],
        super_traits: Vec::new(),
        fundeps: Vec::new(),
        methods,
    };

    let method = |name: &str, params: Vec<Ty>, ret: Ty| TraitMethodSig {
        name: name.to_string(),
        param_types: params,
        return_type: ret,
        has_default_body: false,
    };

    let show = simple("Show", vec![method("show", vec![a.clone()], Ty::string())]);
    let equal = simple("Equal", vec![method("equals", vec![a.clone(), a.clone()], Ty::bool())]);
    let order = TraitDef {
        super_traits: vec![crate::ty::Constraint { trait_name: "Equal".into(), args: vec![a.clone()] }],
        ..simple("Order", vec![method("compare", vec![a.clone(), a.clone()], Ty::int())])
    };
    let numeric = simple(
        "Numeric",
        vec![
            method("add", vec![a.clone(), a.clone()], a.clone()),
            method("sub", vec![a.clone(), a.clone()], a.clone()),
            method("mul", vec![a.clone(), a.clone()], a.clone()),
            method("div", vec![a.clone(), a.clone()], a.clone()),
        ],
    );
    let bitwise = simple(
        "Bitwise",
        vec![
            method("and", vec![a.clone(), a.clone()], a.clone()),
            method("or", vec![a.clone(), a.clone()], a.clone()),
            method("xor", vec![a.clone(), a.clone()], a.clone()),
        ],
    );
    let concat = simple("Concat", vec![method("concat", vec![a.clone(), a.clone()], a.clone())]);
    let default_trait = simple("Default", vec![method("default", vec![], a.clone())]);
    let semigroup = simple("Semigroup", vec![method("append", vec![a.clone(), a.clone()], a.clone())]);
    let monoid = TraitDef {
        super_traits: vec![crate::ty::Constraint { trait_name: "Semigroup".into(), args: vec![a.clone()] }],
        ..simple("Monoid", vec![method("empty", vec![], a.clone())])
    };
    let empty_trait = simple("Empty", vec![method("is_empty", vec![a.clone()], Ty::bool())]);
    let optional = simple(
        "Optional",
        vec![
            method("is_some", vec![a.clone()], Ty::bool()),
            method("is_none", vec![a.clone()], Ty::bool()),
        ],
    );

    // `Functor`/`Applicative`/`Monad`/`Iter` all range over a type
    // *constructor* `F` (a higher-kinded parameter), so their methods
    // mention `F` applied to other placeholder types rather than `F`
    // itself (spec.md GLOSSARY "HKT"). `X`/`Y` are method-local
    // placeholders, freshened independently of `F` wherever they appear.
    let f = Ty::Con(TyCon::new("F", Kind::arrows(vec![Kind::Star, Kind::Star])));
    let x = Ty::Con(TyCon::simple("X"));
    let y = Ty::Con(TyCon::simple("Y"));
    let hkt = |name: &str, methods: Vec<TraitMethodSig>| TraitDef {
        name: name.to_string(),
        type_params: vec!["F".to_string()],
        super_traits: Vec::new(),
        fundeps: Vec::new(),
        methods,
    };
    let functor = hkt(
        "Functor",
        vec![method("map", vec![Ty::app(f.clone(), vec![x.clone()]), Ty::func(vec![x.clone()], y.clone())], Ty::app(f.clone(), vec![y.clone()]))],
    );
    let applicative = TraitDef {
        super_traits: vec![crate::ty::Constraint { trait_name: "Functor".into(), args: vec![f.clone()] }],
        ..hkt("Applicative", vec![method("pure", vec![x.clone()], Ty::app(f.clone(), vec![x.clone()]))])
    };
    let monad = TraitDef {
        super_traits: vec![crate::ty::Constraint { trait_name: "Applicative".into(), args: vec![f.clone()] }],
        ..hkt(
            "Monad",
            vec![method(
                "bind",
                vec![Ty::app(f.clone(), vec![x.clone()]), Ty::func(vec![x.clone()], Ty::app(f.clone(), vec![y.clone()]))],
                Ty::app(f.clone(), vec![y.clone()]),
            )],
        )
    };
    // spec.md §4.5 "For-loop": `Iter`'s method returns `() -> Option<T>`.
    let iter = hkt("Iter", vec![method("next", vec![f.clone()], Ty::func(vec![], Ty::option(x.clone())))]);

    for def in [show, equal, order, numeric, bitwise, concat, default_trait, semigroup, monoid, empty_trait, optional, functor, applicative, monad, iter] {
        table.define_trait(def.clone());
        let errs = traits.register_trait(def);
        debug_assert!(errs.is_empty(), "prelude trait definitions must be fundep-clean: {errs:?}");
    }
}

/// spec.md §6 "primitive instances (e.g. `Show Int`, `Functor Option`,
/// `Monad List`)".
fn register_primitive_instances(traits: &mut TraitRegistry, ctx: &mut InferCtx) {
    let mut methods = |pairs: Vec<(&str, Vec<Ty>, Ty)>| -> FxHashMap<String, ImplMethodSig> {
        pairs.into_iter().map(|(n, p, r)| (n.to_string(), ImplMethodSig { param_types: p, return_type: r })).collect()
    };

    traits.register_impl(ImplDef {
        trait_name: "Show".into(),
        args: vec![Ty::int()],
        args_display: "Int".into(),
        methods: methods(vec![("show", vec![Ty::int()], Ty::string())]),
        evidence_name: "$impl_Show_Int".into(),
    });
    traits.register_impl(ImplDef {
        trait_name: "Equal".into(),
        args: vec![Ty::int()],
        args_display: "Int".into(),
        methods: methods(vec![("equals", vec![Ty::int(), Ty::int()], Ty::bool())]),
        evidence_name: "$impl_Equal_Int".into(),
    });
    traits.register_impl(ImplDef {
        trait_name: "Numeric".into(),
        args: vec![Ty::int()],
        args_display: "Int".into(),
        methods: methods(vec![
            ("add", vec![Ty::int(), Ty::int()], Ty::int()),
            ("sub", vec![Ty::int(), Ty::int()], Ty::int()),
            ("mul", vec![Ty::int(), Ty::int()], Ty::int()),
            ("div", vec![Ty::int(), Ty::int()], Ty::int()),
        ]),
        evidence_name: "$impl_Numeric_Int".into(),
    });
    traits.register_impl(ImplDef {
        trait_name: "Numeric".into(),
        args: vec![Ty::float()],
        args_display: "Float".into(),
        methods: methods(vec![
            ("add", vec![Ty::float(), Ty::float()], Ty::float()),
            ("sub", vec![Ty::float(), Ty::float()], Ty::float()),
            ("mul", vec![Ty::float(), Ty::float()], Ty::float()),
            ("div", vec![Ty::float(), Ty::float()], Ty::float()),
        ]),
        evidence_name: "$impl_Numeric_Float".into(),
    });

    let a = ctx.fresh_var();
    traits.register_impl(ImplDef {
        trait_name: "Functor".into(),
        args: vec![Ty::Con(TyCon::new("Option", Kind::arrows(vec![Kind::Star, Kind::Star])))],
        args_display: "Option".into(),
        methods: methods(vec![("map", vec![Ty::option(a.clone()), Ty::func(vec![a.clone()], a.clone())], Ty::option(a.clone()))]),
        evidence_name: "$impl_Functor_Option".into(),
    });
    traits.register_impl(ImplDef {
        trait_name: "Monad".into(),
        args: vec![Ty::Con(TyCon::new("List", Kind::arrows(vec![Kind::Star, Kind::Star])))],
        args_display: "List".into(),
        methods: methods(vec![("bind", vec![Ty::list(a.clone()), Ty::func(vec![a.clone()], Ty::list(a.clone()))], Ty::list(a))]),
        evidence_name: "$impl_Monad_List".into(),
    });
}

/// Build a polymorphic [`Scheme`] quantifying over the fresh variables that
/// appear in `vars`, used for prelude bindings where the variables were
/// just minted and so need no level check to be generalizable.
fn scheme_of(vars: Vec<Ty>, ty: Ty) -> Scheme {
    let var_ids = vars
        .into_iter()
        .filter_map(|v| match v {
            Ty::Var(id) => Some(id),
            _ => None,
        })
        .collect();
    Scheme { vars: var_ids, constraints: Vec::new(), ty }
}

/// spec.md §6 "free functions (`print`, `write`, `typeOf`, `panic`,
/// `debug`, `trace`, `len`, `lenBytes`, `getType`, `kindOf`, `debugType`,
/// `debugRepr`, `default`, `id`, `const`, `intToFloat`, `floatToInt`,
/// `sprintf`, `read`, monad-specific helpers)".
fn register_free_functions(table: &mut SymbolTable, ctx: &mut InferCtx) {
    let span = Span::synthetic();

    let a = ctx.fresh_var();
    table.define("print", scheme_of(vec![a.clone()], Ty::func(vec![a.clone()], Ty::unit())), span);
    let a = ctx.fresh_var();
    table.define("write", scheme_of(vec![a.clone()], Ty::func(vec![a.clone()], Ty::unit())), span);

    let a = ctx.fresh_var();
    table.define(
        "typeOf",
        scheme_of(vec![a.clone()], Ty::func(vec![a.clone(), Ty::TypeVal(Box::new(a.clone()))], Ty::bool())),
        span,
    );

    let a = ctx.fresh_var();
    table.define("panic", scheme_of(vec![a.clone()], Ty::func(vec![Ty::string()], a)), span);

    let a = ctx.fresh_var();
    table.define("debug", scheme_of(vec![a.clone()], Ty::func(vec![a.clone()], a)), span);
    let a = ctx.fresh_var();
    table.define("trace", scheme_of(vec![a.clone()], Ty::func(vec![Ty::string(), a.clone()], a)), span);

    let a = ctx.fresh_var();
    table.define("len", scheme_of(vec![a.clone()], Ty::func(vec![Ty::list(a)], Ty::int())), span);
    table.define("lenBytes", Scheme::mono(Ty::func(vec![Ty::Con(TyCon::simple("Bytes"))], Ty::int())), span);

    let a = ctx.fresh_var();
    table.define("getType", scheme_of(vec![a.clone()], Ty::func(vec![a], Ty::string())), span);
    table.define("kindOf", Scheme::mono(Ty::func(vec![Ty::TypeVal(Box::new(Ty::Never))], Ty::string())), span);

    let a = ctx.fresh_var();
    table.define("debugType", scheme_of(vec![a.clone()], Ty::func(vec![a], Ty::string())), span);
    let a = ctx.fresh_var();
    table.define("debugRepr", scheme_of(vec![a.clone()], Ty::func(vec![a], Ty::string())), span);

    let a = ctx.fresh_var();
    table.define("default", scheme_of(vec![a.clone()], Ty::func(vec![], a)), span);

    let a = ctx.fresh_var();
    table.define("id", scheme_of(vec![a.clone()], Ty::func(vec![a.clone()], a)), span);

    let a = ctx.fresh_var();
    let b = ctx.fresh_var();
    table.define("const", scheme_of(vec![a.clone(), b.clone()], Ty::func(vec![a.clone(), b], a)), span);

    table.define("intToFloat", Scheme::mono(Ty::func(vec![Ty::int()], Ty::float())), span);
    table.define("floatToInt", Scheme::mono(Ty::func(vec![Ty::float()], Ty::int())), span);

    let a = ctx.fresh_var();
    table.define(
        "sprintf",
        scheme_of(vec![a.clone()], Ty::Func(crate::ty::TFunc {
            params: vec![Ty::string(), a],
            ret: Box::new(Ty::string()),
            is_variadic: true,
            default_count: 0,
            constraints: Vec::new(),
        })),
        span,
    );

    table.define("read", Scheme::mono(Ty::func(vec![], Ty::option(Ty::string()))), span);
}
