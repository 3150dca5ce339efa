//! Shared fixture builders for the integration tests in this directory.
//!
//! Lexing and parsing are out of scope (spec.md §1), so these tests build
//! `mesh_common::ast` fixtures directly rather than parsing source text --
//! the same role the teacher's `check_source(src: &str)` helper plays, one
//! layer further in.

#![allow(dead_code)]

use mesh_common::ast::{
    Arg, Block, ConstDef, Expr, ExprKind, FunDef, FunDep, FuncTypeExpr, GenericParam, ImportDecl, ImportName, InstanceDef,
    LiteralKind, MatchArm, NodeIdGen, Param, Pattern, PatternKind, Program, SourceFile, Stmt, TraitConstraintExpr, TraitDef,
    TraitMethodDef, TypeAliasDef, TypeDef, TypeExpr, TypeExprKind, VariantDef,
};
use mesh_common::Span;
use mesh_typeck::{analyze_single_module, AnalysisOptions, AnalysisOutput};

pub fn ids() -> NodeIdGen {
    NodeIdGen::new()
}

pub fn sp() -> Span {
    Span::synthetic()
}

pub fn program(items: Vec<mesh_common::ast::Item>) -> Program {
    Program { entry_module: "Main".to_string(), files: vec![SourceFile { path: "main.mpl".to_string(), items }] }
}

pub fn analyze(items: Vec<mesh_common::ast::Item>) -> AnalysisOutput {
    analyze_single_module(&program(items), AnalysisOptions::default())
}

pub fn analyze_with(items: Vec<mesh_common::ast::Item>, options: AnalysisOptions) -> AnalysisOutput {
    analyze_single_module(&program(items), options)
}

// ── Expressions / patterns ─────────────────────────────────────────────

pub fn int_lit(ids: &mut NodeIdGen, n: i64) -> Expr {
    Expr { id: ids.next(), kind: ExprKind::Literal(LiteralKind::Int(n)), span: sp() }
}

pub fn float_lit(ids: &mut NodeIdGen, f: f64) -> Expr {
    Expr { id: ids.next(), kind: ExprKind::Literal(LiteralKind::Float(f)), span: sp() }
}

pub fn bool_lit(ids: &mut NodeIdGen, b: bool) -> Expr {
    Expr { id: ids.next(), kind: ExprKind::Literal(LiteralKind::Bool(b)), span: sp() }
}

pub fn str_lit(ids: &mut NodeIdGen, s: &str) -> Expr {
    Expr { id: ids.next(), kind: ExprKind::Literal(LiteralKind::Str(s.to_string())), span: sp() }
}

pub fn unit_lit(ids: &mut NodeIdGen) -> Expr {
    Expr { id: ids.next(), kind: ExprKind::Literal(LiteralKind::Unit), span: sp() }
}

pub fn ident(ids: &mut NodeIdGen, name: &str) -> Expr {
    Expr { id: ids.next(), kind: ExprKind::Identifier(name.to_string()), span: sp() }
}

pub fn qualified_ident(ids: &mut NodeIdGen, module: &str, name: &str) -> Expr {
    Expr { id: ids.next(), kind: ExprKind::QualifiedIdentifier(module.to_string(), name.to_string()), span: sp() }
}

pub fn call(ids: &mut NodeIdGen, callee: Expr, args: Vec<Expr>) -> Expr {
    Expr {
        id: ids.next(),
        kind: ExprKind::Call { callee: Box::new(callee), args: args.into_iter().map(|value| Arg { name: None, value }).collect() },
        span: sp(),
    }
}

pub fn binop(ids: &mut NodeIdGen, op: &str, lhs: Expr, rhs: Expr) -> Expr {
    Expr { id: ids.next(), kind: ExprKind::BinOp { op: op.to_string(), lhs: Box::new(lhs), rhs: Box::new(rhs) }, span: sp() }
}

pub fn field_access(ids: &mut NodeIdGen, base: Expr, field: &str) -> Expr {
    Expr { id: ids.next(), kind: ExprKind::FieldAccess { base: Box::new(base), field: field.to_string() }, span: sp() }
}

pub fn record_lit(ids: &mut NodeIdGen, fields: Vec<(&str, Expr)>) -> Expr {
    Expr {
        id: ids.next(),
        kind: ExprKind::RecordLit { fields: fields.into_iter().map(|(n, e)| (n.to_string(), e)).collect(), spread: None },
        span: sp(),
    }
}

pub fn list_expr(ids: &mut NodeIdGen, elems: Vec<Expr>) -> Expr {
    Expr { id: ids.next(), kind: ExprKind::List(elems), span: sp() }
}

pub fn match_expr(ids: &mut NodeIdGen, scrutinee: Expr, arms: Vec<MatchArm>) -> Expr {
    Expr { id: ids.next(), kind: ExprKind::Match { scrutinee: Box::new(scrutinee), arms }, span: sp() }
}

pub fn arm(pattern: Pattern, body: Expr) -> MatchArm {
    MatchArm { pattern, guard: None, body, span: Span::synthetic() }
}

pub fn var_pat(ids: &mut NodeIdGen, name: &str) -> Pattern {
    Pattern { id: ids.next(), kind: PatternKind::Var(name.to_string()), span: sp() }
}

pub fn wildcard_pat(ids: &mut NodeIdGen) -> Pattern {
    Pattern { id: ids.next(), kind: PatternKind::Wildcard, span: sp() }
}

pub fn lit_pat(ids: &mut NodeIdGen, lit: LiteralKind) -> Pattern {
    Pattern { id: ids.next(), kind: PatternKind::Literal(lit), span: sp() }
}

pub fn ctor_pat(ids: &mut NodeIdGen, name: &str, args: Vec<Pattern>) -> Pattern {
    Pattern { id: ids.next(), kind: PatternKind::Constructor { name: name.to_string(), args }, span: sp() }
}

pub fn or_pat(ids: &mut NodeIdGen, alts: Vec<Pattern>) -> Pattern {
    Pattern { id: ids.next(), kind: PatternKind::Or(alts), span: sp() }
}

pub fn block_expr(e: Expr) -> Block {
    Block { statements: vec![Stmt::Expr(e)], span: Span::synthetic() }
}

pub fn block(stmts: Vec<Stmt>) -> Block {
    Block { statements: stmts, span: Span::synthetic() }
}

// ── Type expressions ────────────────────────────────────────────────────

pub fn ty_name(name: &str) -> TypeExpr {
    TypeExpr { id: 0, kind: TypeExprKind::Name(name.to_string()), span: Span::synthetic() }
}

pub fn ty_qualified(module: &str, name: &str) -> TypeExpr {
    TypeExpr { id: 0, kind: TypeExprKind::Qualified(module.to_string(), name.to_string()), span: Span::synthetic() }
}

pub fn ty_tuple(elems: Vec<TypeExpr>) -> TypeExpr {
    TypeExpr { id: 0, kind: TypeExprKind::Tuple(elems), span: Span::synthetic() }
}

pub fn ty_app(base: TypeExpr, args: Vec<TypeExpr>) -> TypeExpr {
    TypeExpr { id: 0, kind: TypeExprKind::App(Box::new(base), args), span: Span::synthetic() }
}

pub fn ty_func(params: Vec<TypeExpr>, ret: TypeExpr) -> TypeExpr {
    TypeExpr {
        id: 0,
        kind: TypeExprKind::Func(FuncTypeExpr { params, ret: Box::new(ret), is_variadic: false, default_count: 0, constraints: Vec::new() }),
        span: Span::synthetic(),
    }
}

pub fn ty_record(fields: Vec<(&str, TypeExpr)>, open: bool) -> TypeExpr {
    TypeExpr {
        id: 0,
        kind: TypeExprKind::Record(mesh_common::ast::RecordTypeExpr { fields: fields.into_iter().map(|(n, t)| (n.to_string(), t)).collect(), open }),
        span: Span::synthetic(),
    }
}

pub fn ty_union(members: Vec<TypeExpr>) -> TypeExpr {
    TypeExpr { id: 0, kind: TypeExprKind::Union(members), span: Span::synthetic() }
}

pub fn ty_forall(vars: Vec<&str>, constraints: Vec<TraitConstraintExpr>, body: TypeExpr) -> TypeExpr {
    TypeExpr {
        id: 0,
        kind: TypeExprKind::Forall(mesh_common::ast::ForallTypeExpr { vars: vars.into_iter().map(String::from).collect(), constraints, body: Box::new(body) }),
        span: Span::synthetic(),
    }
}

pub fn constraint(trait_name: &str, args: Vec<TypeExpr>) -> TraitConstraintExpr {
    TraitConstraintExpr { trait_name: trait_name.to_string(), args, span: Span::synthetic() }
}

// ── Items ───────────────────────────────────────────────────────────────

pub fn param(name: &str, ids: &mut NodeIdGen, type_ann: Option<TypeExpr>) -> Param {
    Param { pattern: var_pat(ids, name), type_ann, default: None }
}

pub fn const_def(ids: &mut NodeIdGen, name: &str, value: Expr, is_pub: bool) -> mesh_common::ast::Item {
    mesh_common::ast::Item::Const(ConstDef { name: name.to_string(), type_ann: None, value, is_pub, span: sp() })
}

#[allow(clippy::too_many_arguments)]
pub fn fun_def(
    name: &str,
    generics: Vec<GenericParam>,
    params: Vec<Param>,
    return_type: Option<TypeExpr>,
    constraints: Vec<TraitConstraintExpr>,
    body: Block,
    is_pub: bool,
) -> FunDef {
    FunDef { name: name.to_string(), generics, params, variadic_param: None, return_type, constraints, body: Some(body), is_pub, span: Span::synthetic() }
}

pub fn fun_item(def: FunDef) -> mesh_common::ast::Item {
    mesh_common::ast::Item::Fun(def)
}

pub fn generic(name: &str) -> GenericParam {
    GenericParam { name: name.to_string(), constraints: Vec::new() }
}

pub fn sum_type(name: &str, variants: Vec<VariantDef>, is_pub: bool) -> mesh_common::ast::Item {
    mesh_common::ast::Item::Type(TypeDef { name: name.to_string(), generics: Vec::new(), variants, is_pub, span: sp() })
}

pub fn generic_sum_type(name: &str, generics: Vec<GenericParam>, variants: Vec<VariantDef>, is_pub: bool) -> mesh_common::ast::Item {
    mesh_common::ast::Item::Type(TypeDef { name: name.to_string(), generics, variants, is_pub, span: sp() })
}

pub fn variant(name: &str, fields: Vec<TypeExpr>) -> VariantDef {
    VariantDef { name: name.to_string(), fields, span: Span::synthetic() }
}

pub fn type_alias(name: &str, generics: Vec<GenericParam>, aliased: TypeExpr, is_pub: bool) -> mesh_common::ast::Item {
    mesh_common::ast::Item::TypeAlias(TypeAliasDef { name: name.to_string(), generics, aliased, is_pub, span: sp() })
}

pub fn trait_def(
    name: &str,
    type_params: Vec<&str>,
    super_traits: Vec<TraitConstraintExpr>,
    fundeps: Vec<FunDep>,
    methods: Vec<TraitMethodDef>,
) -> mesh_common::ast::Item {
    mesh_common::ast::Item::Trait(TraitDef {
        name: name.to_string(),
        type_params: type_params.into_iter().map(String::from).collect(),
        super_traits,
        fundeps,
        methods,
        is_pub: true,
        span: sp(),
    })
}

pub fn trait_method(name: &str, params: Vec<TypeExpr>, return_type: TypeExpr, default_body: Option<Block>) -> TraitMethodDef {
    TraitMethodDef { name: name.to_string(), params, return_type, default_body }
}

pub fn fundep(from: Vec<&str>, to: Vec<&str>) -> FunDep {
    FunDep { from: from.into_iter().map(String::from).collect(), to: to.into_iter().map(String::from).collect(), span: Span::synthetic() }
}

pub fn instance(trait_name: &str, args: Vec<TypeExpr>, methods: Vec<FunDef>) -> mesh_common::ast::Item {
    mesh_common::ast::Item::Instance(InstanceDef { trait_name: trait_name.to_string(), args, requirements: Vec::new(), methods, span: sp() })
}

pub fn import(path: Vec<&str>, alias: Option<&str>, names: Vec<(&str, Option<&str>)>) -> mesh_common::ast::Item {
    mesh_common::ast::Item::Import(ImportDecl {
        path: path.into_iter().map(String::from).collect(),
        alias: alias.map(String::from),
        names: names.into_iter().map(|(n, a)| ImportName { name: n.to_string(), alias: a.map(String::from) }).collect(),
        span: sp(),
    })
}

pub fn top_level(e: Expr) -> mesh_common::ast::Item {
    mesh_common::ast::Item::TopLevelExpr(e)
}
