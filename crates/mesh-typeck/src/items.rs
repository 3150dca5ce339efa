//! Per-item Naming/Headers/Instances/Bodies registration (spec.md §4.7
//! "four ordered passes"), factored out of a single module-at-a-time walk
//! so the exact same logic also gives block-nested declarations "fully
//! recursive registration" (spec.md §4.5 "Block"): [`crate::infer::Infer`]'s
//! `Stmt::Item` arm drives these functions directly instead of duplicating
//! them.
//!
//! A named, generic top-level function is checked the same way the teacher
//! checks an anonymous function literal, with one addition: its own
//! declared generics are bound to rigid placeholder constructors rather
//! than fresh flexible variables before the body is checked, so a call to
//! a trait method inside the body can't accidentally unify the generic
//! with a concrete type (spec.md §4.4 "Rigids", §9 "Rigidity"). The
//! externally visible scheme the Headers pass registers stays fully
//! polymorphic -- every generic becomes a real quantified [`TyVar`] -- so
//! callers still get a fresh instantiation per use; only the body-checking
//! pass sees the rigid version.

use rustc_hash::FxHashMap;

use mesh_common::ast::{ConstDef, FunDef, Item, InstanceDef, TraitDef as AstTraitDef, TypeAliasDef, TypeDef};
use mesh_common::Span;

use crate::error::{ConstraintOrigin, TypeError};
use crate::infer::{is_syntactic_value, Infer};
use crate::kind::Kind;
use crate::scope::{Instance, TypeDefInfo, TypeDefKind};
use crate::traits::{self, FunDep, ImplDef, ImplMethodSig, TraitDef, TraitMethodSig};
use crate::ty::{Forall, Scheme, TFunc, TRecord, Ty, TyCon, TyVar};
use crate::witness;

// ── Naming ───────────────────────────────────────────────────────────────

/// Forward-declares the name(s) one item introduces, so later items in the
/// same pass (and recursive references within Bodies) see a pending symbol
/// rather than an undeclared one (spec.md §5 "Pending symbols").
pub fn name_item(infer: &mut Infer, item: &Item) {
    match item {
        Item::Fun(f) => {
            if let Err(e) = infer.table.check_redefinition(&f.name, f.span) {
                infer.push_error(e);
            }
            infer.table.define_pending(f.name.clone(), f.span);
        }
        Item::Const(c) => {
            if let Err(e) = infer.table.check_redefinition(&c.name, c.span) {
                infer.push_error(e);
            }
            infer.table.define_pending(c.name.clone(), c.span);
        }
        Item::Type(t) => {
            if let Err(e) = infer.table.check_type_redefinition(&t.name, t.span) {
                infer.push_error(e);
            }
            infer.table.define_pending_type(t.name.clone());
            for variant in &t.variants {
                if let Err(e) = infer.table.check_redefinition(&variant.name, variant.span) {
                    infer.push_error(e);
                }
                infer.table.define_pending(variant.name.clone(), variant.span);
            }
        }
        Item::TypeAlias(a) => {
            if let Err(e) = infer.table.check_type_redefinition(&a.name, a.span) {
                infer.push_error(e);
            }
            infer.table.define_pending_type(a.name.clone());
        }
        // Traits, instances, imports, re-exports and top-level expressions
        // don't introduce a forward-referenceable value/type name of their
        // own (spec.md §4.7 "Naming").
        Item::Trait(_) | Item::Instance(_) | Item::Import(_) | Item::Reexport(_) | Item::TopLevelExpr(_) => {}
    }
}

// ── Headers ──────────────────────────────────────────────────────────────

/// Builds every item's *signature* -- the part other items can reference
/// before any body has been checked (spec.md §4.7 "Headers").
pub fn header_item(infer: &mut Infer, item: &Item) {
    match item {
        Item::Fun(f) => header_fun(infer, f),
        Item::Const(c) => header_const(infer, c),
        Item::Type(t) => header_type(infer, t),
        Item::TypeAlias(a) => header_type_alias(infer, a),
        Item::Trait(t) => header_trait(infer, t),
        Item::Instance(_) | Item::Import(_) | Item::Reexport(_) | Item::TopLevelExpr(_) => {}
    }
}

fn header_fun(infer: &mut Infer, f: &FunDef) {
    let generic_vars: Vec<(String, Ty)> = f.generics.iter().map(|g| (g.name.clone(), infer.fresh())).collect();

    let (param_tys, variadic_ty, ret_ty, mut constraints, implicit_vars) = {
        let mut builder = infer.builder();
        for (name, ty) in &generic_vars {
            builder.bind_generic(name.clone(), ty.clone());
        }
        let param_tys: Vec<Ty> = f.params.iter().map(|p| Infer::build_param_ty(&mut builder, p).unwrap_or(Ty::unit())).collect();
        let variadic_ty = f.variadic_param.as_ref().and_then(|p| Infer::build_param_ty(&mut builder, p));
        let ret_ty = f.return_type.as_ref().map(|t| builder.build(t).unwrap_or(Ty::unit())).unwrap_or(Ty::unit());
        let mut constraints = builder.build_constraints(&f.constraints).unwrap_or_default();
        for g in &f.generics {
            constraints.extend(builder.build_constraints(&g.constraints).unwrap_or_default());
        }
        let implicit_vars: Vec<Ty> = builder.implicit_generics().map(|(_, ty)| ty.clone()).collect();
        (param_tys, variadic_ty, ret_ty, constraints, implicit_vars)
    };
    let _ = &mut constraints;

    let default_count = f.params.iter().filter(|p| p.default.is_some()).count();
    let mut params = param_tys;
    let is_variadic = variadic_ty.is_some();
    if let Some(v) = variadic_ty {
        params.push(v);
    }
    let func_ty = Ty::Func(TFunc { params, ret: Box::new(ret_ty), is_variadic, default_count, constraints: constraints.clone() });

    let mut vars: Vec<TyVar> = generic_vars.iter().filter_map(|(_, v)| as_tyvar(v)).collect();
    for v in &implicit_vars {
        if let Some(tv) = as_tyvar(v) {
            if !vars.contains(&tv) {
                vars.push(tv);
            }
        }
    }

    let scheme = Scheme { vars, constraints, ty: func_ty };
    infer.table.define(f.name.clone(), scheme, f.span);
}

fn as_tyvar(ty: &Ty) -> Option<TyVar> {
    match ty {
        Ty::Var(v) => Some(*v),
        _ => None,
    }
}

fn header_const(infer: &mut Infer, c: &ConstDef) {
    let ty = match &c.type_ann {
        Some(t) => {
            let mut builder = infer.builder();
            builder.build(t).unwrap_or(Ty::unit())
        }
        None => infer.fresh(),
    };
    infer.table.define(c.name.clone(), Scheme::mono(ty), c.span);
}

fn header_type(infer: &mut Infer, t: &TypeDef) {
    let generic_vars: Vec<(String, Ty)> = t.generics.iter().map(|g| (g.name.clone(), infer.fresh())).collect();
    let kind = record_kind(generic_vars.len());
    let con = TyCon::new(t.name.clone(), kind.clone());
    infer.table.define_kind(t.name.clone(), kind);

    let mut variants = Vec::with_capacity(t.variants.len());
    for variant in &t.variants {
        let field_tys: Vec<Ty> = {
            let mut builder = infer.builder();
            for (name, ty) in &generic_vars {
                builder.bind_generic(name.clone(), ty.clone());
            }
            variant.fields.iter().map(|f| builder.build(f).unwrap_or(Ty::unit())).collect()
        };
        variants.push((variant.name.clone(), field_tys));
    }

    infer.table.define_type(TypeDefInfo { con: con.clone(), kind: TypeDefKind::Sum { variants: variants.clone() }, span: t.span });

    let result_ty = Ty::app(Ty::Con(con), generic_vars.iter().map(|(_, v)| v.clone()).collect());
    let vars: Vec<TyVar> = generic_vars.iter().filter_map(|(_, v)| as_tyvar(v)).collect();
    for (name, field_tys) in variants {
        let ctor_ty = Ty::func(field_tys, result_ty.clone());
        let scheme = Scheme { vars: vars.clone(), constraints: Vec::new(), ty: ctor_ty };
        infer.table.define_constructor(name, scheme, t.span);
    }
}

fn header_type_alias(infer: &mut Infer, a: &TypeAliasDef) {
    let generic_vars: Vec<(String, Ty)> = a.generics.iter().map(|g| (g.name.clone(), infer.fresh())).collect();
    let underlying = {
        let mut builder = infer.builder();
        for (name, ty) in &generic_vars {
            builder.bind_generic(name.clone(), ty.clone());
        }
        builder.build(&a.aliased).unwrap_or(Ty::unit())
    };
    infer.table.define_type_alias(a.name.clone(), underlying);
    infer.table.define_kind(a.name.clone(), record_kind(generic_vars.len()));
    if let Err(e) = crate::builder::check_alias_acyclic(&a.name, infer.table, a.span) {
        infer.push_error(e);
    }
    infer.table.finish_pending_type(&a.name);
}

fn record_kind(arity: usize) -> Kind {
    if arity == 0 {
        Kind::Star
    } else {
        Kind::arrows(std::iter::repeat(Kind::Star).take(arity + 1).collect())
    }
}

fn header_trait(infer: &mut Infer, t: &AstTraitDef) {
    let (super_traits, methods) = {
        let mut builder = infer.builder();
        for param in &t.type_params {
            builder.bind_generic(param.clone(), Ty::Con(TyCon::simple(param.clone())));
        }
        let super_traits = builder.build_constraints(&t.super_traits).unwrap_or_default();
        let methods = t
            .methods
            .iter()
            .map(|m| TraitMethodSig {
                name: m.name.clone(),
                param_types: m.params.iter().map(|p| builder.build(p).unwrap_or(Ty::unit())).collect(),
                return_type: builder.build(&m.return_type).unwrap_or(Ty::unit()),
                has_default_body: m.default_body.is_some(),
            })
            .collect();
        (super_traits, methods)
    };

    let fundeps = t.fundeps.iter().map(|d| FunDep { determining: d.from.clone(), determined: d.to.clone() }).collect();
    let def = TraitDef { name: t.name.clone(), type_params: t.type_params.clone(), super_traits, fundeps, methods };
    infer.table.define_trait(def.clone());
    for e in infer.traits.register_trait(def) {
        infer.push_error(e);
    }
}

// ── Instances ────────────────────────────────────────────────────────────

/// Registers one `instance` declaration's evidence (spec.md §4.3
/// "Registering an instance", §4.7 "Instances"). Method *bodies* are
/// deferred to [`body_item`] so they can call other instances registered
/// later in the same pass.
pub fn instance_item(infer: &mut Infer, inst: &InstanceDef) {
    let args: Vec<Ty> = {
        let mut builder = infer.builder();
        inst.args.iter().map(|a| builder.build(a).unwrap_or(Ty::unit())).collect()
    };
    let args_display = args.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");

    let Some(trait_def) = infer.traits.get_trait(&inst.trait_name).cloned() else {
        infer.push_error(TypeError::UndeclaredType { name: inst.trait_name.clone(), span: inst.span, suggestion: None });
        return;
    };

    let subst: FxHashMap<String, Ty> = trait_def.type_params.iter().cloned().zip(args.iter().cloned()).collect();

    let mut methods = FxHashMap::default();
    for m in &inst.methods {
        if let Some(sig) = trait_def.methods.iter().find(|sig| sig.name == m.name) {
            methods.insert(
                m.name.clone(),
                ImplMethodSig {
                    param_types: sig.param_types.iter().map(|t| subst_trait_param(t, &subst)).collect(),
                    return_type: subst_trait_param(&sig.return_type, &subst),
                },
            );
        }
    }

    let evidence_name = traits::evidence_name(&inst.trait_name, &args_display, false);
    let impl_def = ImplDef { trait_name: inst.trait_name.clone(), args: args.clone(), args_display: args_display.clone(), methods, evidence_name: evidence_name.clone() };

    let errors = infer.traits.register_impl(impl_def.clone());
    if !errors.is_empty() {
        for e in errors {
            infer.push_error(e);
        }
        return;
    }

    let scheme = traits::evidence_scheme(&trait_def, &impl_def);
    infer.table.define(evidence_name.clone(), scheme, inst.span);
    infer.table.register_evidence(inst.trait_name.clone(), args_display, evidence_name.clone());
    infer.table.register_instance(Instance { trait_name: inst.trait_name.clone(), args, evidence_name, span: inst.span });
}

fn subst_trait_param(ty: &Ty, subst: &FxHashMap<String, Ty>) -> Ty {
    match ty {
        Ty::Con(c) => subst.get(&c.name).cloned().unwrap_or_else(|| ty.clone()),
        Ty::Var(_) | Ty::Never | Ty::TypeVal(_) => ty.clone(),
        Ty::App(con, args) => Ty::app(subst_trait_param(con, subst), args.iter().map(|a| subst_trait_param(a, subst)).collect()),
        Ty::Func(f) => Ty::Func(TFunc {
            params: f.params.iter().map(|p| subst_trait_param(p, subst)).collect(),
            ret: Box::new(subst_trait_param(&f.ret, subst)),
            is_variadic: f.is_variadic,
            default_count: f.default_count,
            constraints: f.constraints.clone(),
        }),
        Ty::Tuple(elems) => Ty::Tuple(elems.iter().map(|e| subst_trait_param(e, subst)).collect()),
        Ty::Record(r) => Ty::Record(TRecord { fields: r.fields.iter().map(|(n, t)| (n.clone(), subst_trait_param(t, subst))).collect(), open: r.open }),
        Ty::Union(members) => Ty::union_of(members.iter().map(|m| subst_trait_param(m, subst)).collect()),
        Ty::Forall(f) => Ty::Forall(Forall { vars: f.vars.clone(), constraints: f.constraints.clone(), body: Box::new(subst_trait_param(&f.body, subst)) }),
    }
}

// ── Bodies ───────────────────────────────────────────────────────────────

/// Checks every item's body against the signature Headers already
/// registered (spec.md §4.7 "Bodies").
pub fn body_item(infer: &mut Infer, item: &Item) {
    match item {
        Item::Fun(f) => {
            if f.body.is_some() {
                body_fun(infer, f, None);
            }
        }
        Item::Const(c) => body_const(infer, c),
        Item::Instance(inst) => {
            for m in &inst.methods {
                if m.body.is_some() {
                    body_fun(infer, m, Some(inst));
                }
            }
        }
        Item::TopLevelExpr(e) => {
            infer.infer_expr(e);
        }
        Item::Type(_) | Item::TypeAlias(_) | Item::Trait(_) | Item::Import(_) | Item::Reexport(_) => {}
    }
}

/// Type-checks a function body against its own declared signature, with
/// its generics bound to rigid placeholders rather than flexible
/// variables, so that overloaded calls inside the body either resolve
/// against a concrete instance or bubble a dictionary parameter up to this
/// function's own (already-generalized) scheme -- never silently unify
/// the generic away (spec.md §4.3 "Witness resolution", §9 "Rigidity").
///
/// `in_instance` is `Some` when checking an instance method, whose own
/// generics (if any) come from the enclosing `instance`'s argument list
/// rather than from `f.generics`.
fn body_fun(infer: &mut Infer, f: &FunDef, in_instance: Option<&InstanceDef>) {
    let Some(body) = &f.body else { return };

    infer.table.push_scope(crate::scope::ScopeKind::Function);
    infer.ctx.enter_level();

    let rigid_names: Vec<String> = match in_instance {
        Some(inst) => inst.args.iter().filter_map(type_expr_name).collect(),
        None => f.generics.iter().map(|g| g.name.clone()).collect(),
    };

    let (param_tys, variadic_ty, ret_ty, constraints) = {
        let mut builder = infer.builder();
        for name in &rigid_names {
            builder.bind_generic(name.clone(), Ty::Con(TyCon::simple(name.clone())));
        }
        let param_tys: Vec<Option<Ty>> = f.params.iter().map(|p| Infer::build_param_ty(&mut builder, p)).collect();
        let variadic_ty = f.variadic_param.as_ref().and_then(|p| Infer::build_param_ty(&mut builder, p));
        let ret_ty = f.return_type.as_ref().map(|t| builder.build(t).unwrap_or(Ty::unit()));
        let mut constraints = builder.build_constraints(&f.constraints).unwrap_or_default();
        for g in &f.generics {
            constraints.extend(builder.build_constraints(&g.constraints).unwrap_or_default());
        }
        (param_tys, variadic_ty, ret_ty, constraints)
    };

    for (param, declared) in f.params.iter().zip(param_tys) {
        infer.finish_param(param, declared);
    }
    if let Some(variadic) = &f.variadic_param {
        infer.finish_param(variadic, variadic_ty);
    }

    let body_ty = infer.infer_block(body);
    if let Some(declared) = ret_ty {
        infer.unify(declared, body_ty, ConstraintOrigin::Return { return_span: body.span });
    }

    infer.ctx.leave_level();
    infer.table.pop_scope();

    let pending = std::mem::take(&mut infer.pending);
    let elaboration = witness::elaborate(pending, infer.ctx, infer.traits);
    for (span, name) in elaboration.witnesses {
        infer.witnesses.insert(span, name);
    }
    for err in elaboration.errors {
        infer.push_error(err);
    }
    // A constraint stated purely in terms of this function's own rigid
    // generics is expected here -- it's exactly what `constraints` above
    // already declares -- so bubbled constraints aren't re-reported; they
    // already flow through this function's own dictionary parameters.
    let _ = elaboration.bubbled;
}

fn type_expr_name(expr: &mesh_common::ast::TypeExpr) -> Option<String> {
    match &expr.kind {
        mesh_common::ast::TypeExprKind::Name(n) if n.chars().next().is_some_and(|c| c.is_lowercase()) => Some(n.clone()),
        _ => None,
    }
}

fn body_const(infer: &mut Infer, c: &ConstDef) {
    let env_level = infer.ctx.current_level();
    infer.ctx.enter_level();
    let value_ty = infer.infer_expr(&c.value);
    infer.ctx.leave_level();

    if let Some(t) = &c.type_ann {
        let declared = {
            let mut builder = infer.builder();
            builder.build(t).unwrap_or(Ty::unit())
        };
        infer.unify(declared, value_ty.clone(), ConstraintOrigin::Annotation { annotation_span: c.span });
    }

    if is_syntactic_value(&c.value) {
        let scheme = infer.ctx.generalize(value_ty, Vec::new(), env_level);
        infer.table.define(c.name.clone(), scheme, c.span);
    } else {
        infer.table.define(c.name.clone(), Scheme::mono(value_ty), c.span);
    }
}

/// Runs all four passes, in order, over one set of items -- used both for
/// a single module's own items by the driver and, unmodified, for a
/// block's locally nested items (spec.md §4.5 "Block": "supported with
/// fully recursive registration").
pub fn register_items(infer: &mut Infer, items: &[Item]) {
    for item in items {
        name_item(infer, item);
    }
    for item in items {
        header_item(infer, item);
    }
    for item in items {
        if let Item::Instance(inst) = item {
            instance_item(infer, inst);
        }
    }
    for item in items {
        body_item(infer, item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_common::ast::{Expr, ExprKind, GenericParam, LiteralKind, Param, Pattern, PatternKind, VariantDef};
    use mesh_common::NodeIdGen;

    use crate::infer::TypeMap;
    use crate::options::AnalysisOptions;
    use crate::scope::SymbolTable;
    use crate::traits::TraitRegistry;
    use crate::unify::InferCtx;

    fn ids() -> NodeIdGen {
        NodeIdGen::new()
    }

    fn name_pattern(ids: &mut NodeIdGen, name: &str) -> Pattern {
        Pattern { id: ids.next(), kind: PatternKind::Var(name.to_string()), span: Span::synthetic() }
    }

    #[test]
    fn recursive_function_sees_its_own_pending_name() {
        let mut ids = ids();
        let mut table = SymbolTable::new();
        let mut traits = TraitRegistry::new();
        let mut types = TypeMap::default();
        let mut ctx = InferCtx::new(AnalysisOptions::default());
        let mut infer = Infer::new(&mut ctx, &mut table, &mut traits, &mut types);

        let recurse = Expr { id: ids.next(), kind: ExprKind::Identifier("loop_forever".to_string()), span: Span::synthetic() };
        let body = mesh_common::ast::Block { statements: vec![mesh_common::ast::Stmt::Expr(recurse)], span: Span::synthetic() };
        let fun = FunDef {
            name: "loop_forever".to_string(),
            generics: Vec::new(),
            params: Vec::new(),
            variadic_param: None,
            return_type: None,
            constraints: Vec::new(),
            body: Some(body),
            is_pub: false,
            span: Span::synthetic(),
        };
        let item = Item::Fun(fun);
        register_items(&mut infer, std::slice::from_ref(&item));
        assert!(ctx.errors.is_empty());
        assert!(table.find("loop_forever").is_some());
    }

    #[test]
    fn constructor_is_registered_with_positional_fields() {
        let mut ids = ids();
        let mut table = SymbolTable::new();
        let mut traits = TraitRegistry::new();
        let mut types = TypeMap::default();
        let mut ctx = InferCtx::new(AnalysisOptions::default());
        let mut infer = Infer::new(&mut ctx, &mut table, &mut traits, &mut types);

        let type_def = TypeDef {
            name: "Point".to_string(),
            generics: Vec::new(),
            variants: vec![VariantDef {
                name: "Point".to_string(),
                fields: vec![
                    mesh_common::ast::TypeExpr { kind: mesh_common::ast::TypeExprKind::Name("Int".to_string()), span: Span::synthetic() },
                    mesh_common::ast::TypeExpr { kind: mesh_common::ast::TypeExprKind::Name("Int".to_string()), span: Span::synthetic() },
                ],
                span: Span::synthetic(),
            }],
            is_pub: true,
            span: Span::synthetic(),
        };
        register_items(&mut infer, &[Item::Type(type_def)]);
        assert!(ctx.errors.is_empty());
        let ctor = table.find("Point").expect("constructor registered");
        match &ctor.scheme.ty {
            Ty::Func(f) => assert_eq!(f.params.len(), 2),
            other => panic!("expected a constructor function type, got {other:?}"),
        }
        let _ = name_pattern(&mut ids, "_unused");
    }

    #[test]
    fn generic_function_body_treats_its_parameter_as_rigid() {
        let mut ids = ids();
        let mut table = SymbolTable::new();
        let mut traits = TraitRegistry::new();
        let mut types = TypeMap::default();
        let mut ctx = InferCtx::new(AnalysisOptions::default());
        let mut infer = Infer::new(&mut ctx, &mut table, &mut traits, &mut types);

        // fun identity<a>(x: a): a { x }
        let param_pattern = name_pattern(&mut ids, "x");
        let body_expr = Expr { id: ids.next(), kind: ExprKind::Identifier("x".to_string()), span: Span::synthetic() };
        let body = mesh_common::ast::Block { statements: vec![mesh_common::ast::Stmt::Expr(body_expr)], span: Span::synthetic() };
        let fun = FunDef {
            name: "identity".to_string(),
            generics: vec![GenericParam { name: "a".to_string(), constraints: Vec::new() }],
            params: vec![Param {
                pattern: param_pattern,
                type_ann: Some(mesh_common::ast::TypeExpr { kind: mesh_common::ast::TypeExprKind::Name("a".to_string()), span: Span::synthetic() }),
                default: None,
            }],
            variadic_param: None,
            return_type: Some(mesh_common::ast::TypeExpr { kind: mesh_common::ast::TypeExprKind::Name("a".to_string()), span: Span::synthetic() }),
            constraints: Vec::new(),
            body: Some(body),
            is_pub: true,
            span: Span::synthetic(),
        };
        register_items(&mut infer, &[Item::Fun(fun)]);
        assert!(ctx.errors.is_empty(), "errors: {:?}", ctx.errors);
        let scheme = &table.find("identity").expect("identity registered").scheme;
        assert_eq!(scheme.vars.len(), 1, "identity should be quantified over exactly one variable");
    }

    #[test]
    fn literal_dummy_for_unused_import() {
        let _ = LiteralKind::Unit;
    }
}
