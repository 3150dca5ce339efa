//! The inference engine (spec.md §4.5): one method per expression/statement
//! construct, threading a shared [`Infer`] context exactly the way the
//! teacher's `infer_expr`/`infer_call`/`infer_if`/... free functions thread
//! `ctx`/`env`/`types`/`type_registry`/`trait_registry` -- bundled into one
//! struct here so recursive calls don't carry five parameters apiece, but
//! the same "one function per AST shape, unify at the use site, push an
//! error and keep going" discipline.

use rustc_hash::FxHashMap;

use mesh_common::ast::{
    Arg, Block, Expr, ExprKind, FunctionLiteral, LiteralKind, MatchArm, NodeId, Param, Pattern, PatternKind, Stmt,
};
use mesh_common::Span;

use crate::builder::Builder;
use crate::error::{suggest, ConstraintOrigin, TypeError};
use crate::exhaustiveness::{self, LitKind, Pat, TypeInfo};
use crate::scope::{PendingConstraint, ScopeKind, SymbolTable};
use crate::traits::TraitRegistry;
use crate::ty::{Constraint, Scheme, TRecord, Ty, TyCon};
use crate::unify::InferCtx;

/// The decorated AST's `TypeMap`: every expression and pattern node's
/// inferred type, keyed by `NodeId` (spec.md §6 "Decorated AST").
pub type TypeMap = FxHashMap<NodeId, Ty>;

/// Bundles the state threaded through every `infer_*` call for one module
/// body. Lives only for the duration of inferring one function/top-level
/// expression; the driver (§4.7) owns the `SymbolTable`/`TraitRegistry`
/// across the whole program and hands out a fresh `Infer` per body.
pub struct Infer<'a> {
    pub ctx: &'a mut InferCtx,
    pub table: &'a mut SymbolTable,
    pub traits: &'a mut TraitRegistry,
    pub types: &'a mut TypeMap,
    /// Constraints collected at call sites awaiting witness resolution
    /// once every instance in the current module has been registered
    /// (spec.md §4.3 "Pending witness queue", §4.7 "witnesses resolve
    /// after the Instances pass").
    pub pending: Vec<PendingConstraint>,
    /// Which symbol each identifier/qualified-identifier node resolved to,
    /// keyed by the node's id (spec.md §6 "Each identifier gains a
    /// reference to its resolving symbol in ResolutionMap"). Holds the
    /// resolved name -- `"f"` for a local binding, `"Module.f"` for a
    /// qualified one -- since that's everything a consumer of the
    /// decorated AST needs to follow the reference back to its definition.
    pub resolution: FxHashMap<NodeId, String>,
    /// Resolved dictionary witnesses, keyed by the call/reference site's
    /// span (spec.md §6 "Witnesses"). Accumulated across every body this
    /// `Infer` checks within one module, so the driver can read it back
    /// once as the decorated AST's full witness table.
    pub witnesses: crate::witness::WitnessMap,
    loop_depth: u32,
}

impl<'a> Infer<'a> {
    pub fn new(ctx: &'a mut InferCtx, table: &'a mut SymbolTable, traits: &'a mut TraitRegistry, types: &'a mut TypeMap) -> Self {
        Infer {
            ctx,
            table,
            traits,
            types,
            pending: Vec::new(),
            resolution: FxHashMap::default(),
            witnesses: FxHashMap::default(),
            loop_depth: 0,
        }
    }

    fn record(&mut self, id: NodeId, ty: Ty) -> Ty {
        self.types.insert(id, ty.clone());
        ty
    }

    pub(crate) fn unify(&mut self, a: Ty, b: Ty, origin: ConstraintOrigin) {
        if let Err(e) = self.ctx.unify_resolving(a, b, origin, &*self.table) {
            let _ = e;
        }
    }

    /// A fresh [`Builder`] borrowing this `Infer`'s table and context; the
    /// options field is copied out first so the two borrows don't overlap.
    pub(crate) fn builder(&mut self) -> Builder<'_> {
        let options = self.ctx.options;
        Builder::new(self.table, self.ctx, options)
    }

    pub(crate) fn fresh(&mut self) -> Ty {
        self.ctx.fresh_var()
    }

    // ── Top-level dispatch ─────────────────────────────────────────────

    pub fn infer_expr(&mut self, expr: &Expr) -> Ty {
        let ty = match &expr.kind {
            ExprKind::Literal(lit) => Self::infer_literal(lit),
            ExprKind::Identifier(name) => self.infer_identifier(name, expr.id, expr.span),
            ExprKind::QualifiedIdentifier(module, name) => self.infer_qualified_identifier(module, name, expr.id, expr.span),
            ExprKind::Tuple(elems) => Ty::Tuple(elems.iter().map(|e| self.infer_expr(e)).collect()),
            ExprKind::List(elems) => self.infer_list(elems, expr.span),
            ExprKind::RecordLit { fields, spread } => self.infer_record_lit(fields, spread.as_deref(), expr.span),
            ExprKind::Call { callee, args } => self.infer_call(callee, args, expr.span),
            ExprKind::BinOp { op, lhs, rhs } => self.infer_binop(op, lhs, rhs, expr.span),
            ExprKind::UnOp { op, operand } => self.infer_unop(op, operand, expr.span),
            ExprKind::If { cond, then_branch, else_branch } => self.infer_if(cond, then_branch, else_branch.as_deref(), expr.span),
            ExprKind::Match { scrutinee, arms } => self.infer_match(scrutinee, arms, expr.span),
            ExprKind::Block(block) => self.infer_block(block),
            ExprKind::Function(lit) => self.infer_function_literal(lit),
            ExprKind::Assign { target, value } => self.infer_assign(target, value, expr.span),
            ExprKind::Let { pattern, type_ann, value } => self.infer_let(pattern, type_ann.as_ref(), value, expr.span),
            ExprKind::For { pattern, iterable, body } => self.infer_for(pattern, iterable, body, expr.span),
            ExprKind::While { cond, body } => self.infer_while(cond, body),
            ExprKind::Break(value) => self.infer_break(value.as_deref(), expr.span),
            ExprKind::Continue => self.infer_continue(expr.span),
            ExprKind::Return(value) => self.infer_return(value.as_deref()),
            ExprKind::Pipe { value, callee, args, placeholder_index } => {
                self.infer_pipe(value, callee, args, *placeholder_index, expr.span)
            }
            ExprKind::FieldAccess { base, field } => self.infer_field_access(base, field, expr.span),
        };
        self.record(expr.id, ty)
    }

    fn infer_literal(lit: &LiteralKind) -> Ty {
        match lit {
            LiteralKind::Int(_) => Ty::int(),
            LiteralKind::Float(_) => Ty::float(),
            LiteralKind::Bool(_) => Ty::bool(),
            LiteralKind::Char(_) => Ty::char_ty(),
            LiteralKind::Str(_) => Ty::string(),
            LiteralKind::Unit => Ty::unit(),
        }
    }

    /// spec.md §4.5 "Identifier": looks up the symbol table, instantiates
    /// its scheme, and queues any trait constraints the scheme carries for
    /// later witness resolution (spec.md §4.3).
    fn infer_identifier(&mut self, name: &str, id: NodeId, span: Span) -> Ty {
        let Some(symbol) = self.table.find(name) else {
            let suggestion = suggest(name, self.table.visible_names().iter().map(String::as_str), self.ctx.options.max_suggestion_distance);
            self.push_error(TypeError::UndeclaredIdentifier { name: name.to_string(), span, suggestion });
            return self.fresh();
        };
        let scheme = symbol.scheme.clone();
        self.resolution.insert(id, name.to_string());
        let (ty, constraints) = self.ctx.instantiate(&scheme);
        for constraint in constraints {
            self.pending.push(PendingConstraint { constraint, span });
        }
        ty
    }

    fn infer_qualified_identifier(&mut self, module: &str, name: &str, id: NodeId, span: Span) -> Ty {
        // Cross-module value lookup: the driver (spec.md §4.7) stitches an
        // imported module's exported bindings into this module's table
        // under the qualified key `"canonical.name"` (spec.md §4.2
        // "Aliasing of modules"), so a plain `find` under that key covers
        // `alias.name` references once imports have run; extension methods
        // are checked first since they're keyed by type name, not module.
        let canonical = self.table.resolve_module_alias(module).unwrap_or(module).to_string();
        if let Some(scheme) = self.table.find_extension_method(&canonical, name) {
            let scheme = scheme.clone();
            self.resolution.insert(id, format!("{canonical}.{name}"));
            let (ty, constraints) = self.ctx.instantiate(&scheme);
            for constraint in constraints {
                self.pending.push(PendingConstraint { constraint, span });
            }
            return ty;
        }
        let qualified = format!("{canonical}.{name}");
        if let Some(symbol) = self.table.find(&qualified) {
            let scheme = symbol.scheme.clone();
            self.resolution.insert(id, qualified);
            let (ty, constraints) = self.ctx.instantiate(&scheme);
            for constraint in constraints {
                self.pending.push(PendingConstraint { constraint, span });
            }
            return ty;
        }
        self.push_error(TypeError::UndeclaredIdentifier { name: format!("{module}.{name}"), span, suggestion: None });
        self.fresh()
    }

    fn infer_list(&mut self, elems: &[Expr], span: Span) -> Ty {
        let elem_ty = self.fresh();
        for e in elems {
            let t = self.infer_expr(e);
            self.unify(elem_ty.clone(), t, ConstraintOrigin::Assignment { span: e.span });
        }
        let _ = span;
        Ty::list(elem_ty)
    }

    /// spec.md §4.4 "Records": a spread (`{ ...base, field: v }`) must be a
    /// record whose fields the literal's own fields extend or override.
    fn infer_record_lit(&mut self, fields: &[(String, Expr)], spread: Option<&Expr>, span: Span) -> Ty {
        let mut field_tys: Vec<(String, Ty)> = Vec::with_capacity(fields.len());
        for (name, value) in fields {
            let ty = self.infer_expr(value);
            field_tys.push((name.clone(), ty));
        }
        if let Some(base) = spread {
            let base_ty = self.infer_expr(base);
            let open_self = Ty::Record(TRecord { fields: field_tys.clone(), open: true });
            self.unify(open_self, base_ty, ConstraintOrigin::Assignment { span });
        }
        Ty::Record(TRecord { fields: field_tys, open: false })
    }

    /// spec.md §4.5 "Call": positional args fill parameters left-to-right;
    /// named args (for declared defaults) may fill any remaining
    /// parameter by name; a trailing variadic slice absorbs the rest.
    fn infer_call(&mut self, callee: &Expr, args: &[Arg], span: Span) -> Ty {
        let callee_ty = self.infer_expr(callee);
        let ret = self.fresh();
        let arg_tys: Vec<(Option<String>, Ty, Span)> = args.iter().map(|a| (a.name.clone(), self.infer_expr(&a.value), a.value.span)).collect();

        let mut params = Vec::with_capacity(arg_tys.len());
        for _ in &arg_tys {
            params.push(self.fresh());
        }
        let synthesized = Ty::func(params.clone(), ret.clone());
        self.unify(callee_ty, synthesized, ConstraintOrigin::FnArg { call_span: span, param_idx: 0 });

        for (i, (name, ty, arg_span)) in arg_tys.into_iter().enumerate() {
            let _ = name;
            self.unify(params[i].clone(), ty, ConstraintOrigin::FnArg { call_span: span, param_idx: i + 1 });
            let _ = arg_span;
        }

        ret
    }

    /// spec.md §4.5 "Pipe": `x |> f(a, _, b)` inserts `x` at the
    /// placeholder position, or appends it as the trailing argument when
    /// there is none.
    fn infer_pipe(&mut self, value: &Expr, callee: &Expr, args: &[Arg], placeholder: Option<usize>, span: Span) -> Ty {
        let value_ty = self.infer_expr(value);
        let mut synthetic_args: Vec<Arg> = args.to_vec();
        let slot = Arg { name: None, value: Expr { id: value.id, span: value.span, kind: value.kind.clone() } };
        match placeholder {
            Some(idx) if idx <= synthetic_args.len() => synthetic_args.insert(idx, slot),
            _ => synthetic_args.push(slot),
        }
        let _ = value_ty;
        self.infer_call(callee, &synthetic_args, span)
    }

    /// spec.md §6 "Operator dispatch": binary operators other than boolean
    /// `&&`/`||` resolve to a trait method call (`+` -> `Add.add`, etc.).
    fn infer_binop(&mut self, op: &str, lhs: &Expr, rhs: &Expr, span: Span) -> Ty {
        let lhs_ty = self.infer_expr(lhs);
        let rhs_ty = self.infer_expr(rhs);

        if op == "&&" || op == "||" {
            self.unify(lhs_ty, Ty::bool(), ConstraintOrigin::BinOp { op_span: span });
            self.unify(rhs_ty, Ty::bool(), ConstraintOrigin::BinOp { op_span: span });
            return Ty::bool();
        }

        let Some(trait_name) = self.table.operator_trait(op).map(str::to_string) else {
            self.unify(lhs_ty.clone(), rhs_ty, ConstraintOrigin::BinOp { op_span: span });
            return lhs_ty;
        };

        let is_comparison = matches!(op, "==" | "!=" | "<" | "<=" | ">" | ">=");
        self.unify(lhs_ty.clone(), rhs_ty, ConstraintOrigin::BinOp { op_span: span });
        self.pending.push(PendingConstraint {
            constraint: Constraint { trait_name, args: vec![lhs_ty.clone()] },
            span,
        });
        if is_comparison {
            Ty::bool()
        } else {
            lhs_ty
        }
    }

    fn infer_unop(&mut self, op: &str, operand: &Expr, span: Span) -> Ty {
        let ty = self.infer_expr(operand);
        match op {
            "!" => {
                self.unify(ty, Ty::bool(), ConstraintOrigin::BinOp { op_span: span });
                Ty::bool()
            }
            "-" => ty,
            _ => ty,
        }
    }

    /// spec.md §4.5 "If": both branches are unified together; an absent
    /// `else` branch forces the `then` branch to unit.
    fn infer_if(&mut self, cond: &Expr, then_branch: &Block, else_branch: Option<&Block>, span: Span) -> Ty {
        let cond_ty = self.infer_expr(cond);
        self.unify(cond_ty, Ty::bool(), ConstraintOrigin::IfBranches { if_span: span });

        let then_ty = self.infer_block(then_branch);
        match else_branch {
            Some(else_block) => {
                let else_ty = self.infer_block(else_block);
                self.unify(then_ty.clone(), else_ty, ConstraintOrigin::IfBranches { if_span: span });
                then_ty
            }
            None => {
                self.unify(then_ty, Ty::unit(), ConstraintOrigin::IfBranches { if_span: span });
                Ty::unit()
            }
        }
    }

    /// spec.md §4.5 "Match": infers the scrutinee and every arm body
    /// (unified together), converts each arm's pattern to the abstract
    /// form and runs exhaustiveness/redundancy checking (spec.md §4.5
    /// "Pattern matching").
    fn infer_match(&mut self, scrutinee: &Expr, arms: &[MatchArm], span: Span) -> Ty {
        let scrutinee_ty = self.infer_expr(scrutinee);
        let result_ty = self.fresh();

        let mut abstract_patterns = Vec::with_capacity(arms.len());
        for arm in arms {
            self.table.push_scope(ScopeKind::Block);
            let pat_ty = self.infer_pattern(&arm.pattern);
            self.unify(scrutinee_ty.clone(), pat_ty, ConstraintOrigin::MatchArm { span: arm.span });
            if let Some(guard) = &arm.guard {
                let guard_ty = self.infer_expr(guard);
                self.unify(guard_ty, Ty::bool(), ConstraintOrigin::MatchArm { span: arm.span });
            }
            let body_ty = self.infer_expr(&arm.body);
            self.unify(result_ty.clone(), body_ty, ConstraintOrigin::MatchArm { span: arm.span });
            self.table.pop_scope();
            abstract_patterns.push(to_abstract_pattern(&arm.pattern));
        }

        let resolved_scrutinee = self.ctx.resolve(scrutinee_ty);
        let type_info = type_info_for(&resolved_scrutinee, self.table);
        if let Some(missing) = exhaustiveness::check_exhaustiveness(&abstract_patterns, &type_info) {
            let witnesses: Vec<String> = missing.iter().map(format_pat).collect();
            self.push_error(TypeError::NonExhaustiveMatch {
                scrutinee_type: resolved_scrutinee.to_string(),
                missing_patterns: witnesses,
                span,
            });
        }
        for idx in exhaustiveness::check_redundancy(&abstract_patterns, &type_info) {
            self.ctx.warnings.push(TypeError::RedundantArm { span: arms[idx].span });
        }

        result_ty
    }

    /// spec.md §4.5 "Block": statements execute in sequence in a fresh
    /// child scope; the block's type is its trailing expression's type,
    /// or unit if the block ends in a non-expression statement or is empty.
    pub(crate) fn infer_block(&mut self, block: &Block) -> Ty {
        self.table.push_scope(ScopeKind::Block);
        let mut last = Ty::unit();
        for (i, stmt) in block.statements.iter().enumerate() {
            last = match stmt {
                Stmt::Expr(e) => self.infer_expr(e),
                Stmt::Item(_) => {
                    // Local trait/instance/type declarations nested in a
                    // block are out of scope for a single-body inference
                    // pass; the driver's Headers/Instances passes handle
                    // module-level items. A block-nested item contributes
                    // no type of its own.
                    Ty::unit()
                }
            };
            if i + 1 < block.statements.len() {
                last = Ty::unit();
            }
        }
        self.table.pop_scope();
        last
    }

    /// spec.md §4.5 "Function literal": builds parameter/return types
    /// (defaults contribute a `default_count`, one trailing variadic
    /// parameter is allowed), infers the body against them, and returns
    /// the resulting (unquantified -- generalization happens at the
    /// binding site, spec.md §4.5 "Let") function type.
    ///
    /// All of a signature's type annotations share one `Builder`, so an
    /// implicit lowercase generic like `a` in `fn identity(x: a): a` binds
    /// to the same flexible variable in the parameter and the return type
    /// instead of two unrelated ones.
    fn infer_function_literal(&mut self, lit: &FunctionLiteral) -> Ty {
        self.table.push_scope(ScopeKind::Function);
        self.ctx.enter_level();

        let mut declared_params = Vec::with_capacity(lit.params.len());
        let mut declared_variadic = None;
        let mut declared_ret = None;
        {
            let mut builder = self.builder();
            for param in &lit.params {
                declared_params.push(Self::build_param_ty(&mut builder, param));
            }
            if let Some(variadic) = &lit.variadic_param {
                declared_variadic = Some(Self::build_param_ty(&mut builder, variadic));
            }
            declared_ret = lit.return_type.as_ref().map(|t| builder.build(t).unwrap_or(Ty::unit()));
        }

        let mut param_tys = Vec::with_capacity(lit.params.len());
        let mut default_count = 0usize;
        for (param, declared) in lit.params.iter().zip(declared_params) {
            let ty = self.finish_param(param, declared);
            if param.default.is_some() {
                default_count += 1;
            }
            param_tys.push(ty);
        }

        let mut is_variadic = false;
        if let Some(variadic) = &lit.variadic_param {
            let elem_ty = self.finish_param(variadic, declared_variadic.expect("variadic param built above"));
            param_tys.push(elem_ty);
            is_variadic = true;
        }

        let body_ty = self.infer_block(&lit.body);
        let ret = match declared_ret.take() {
            Some(declared) => {
                self.unify(declared.clone(), body_ty, ConstraintOrigin::Return { return_span: lit.body.span });
                declared
            }
            None => body_ty,
        };

        self.ctx.leave_level();
        self.table.pop_scope();

        Ty::Func(crate::ty::TFunc { params: param_tys, ret: Box::new(ret), is_variadic, default_count, constraints: Vec::new() })
    }

    pub(crate) fn build_param_ty(builder: &mut Builder, param: &Param) -> Option<Ty> {
        param.type_ann.as_ref().map(|t| {
            if let mesh_common::ast::TypeExprKind::Record(r) = &t.kind {
                builder.build_param_record(r).unwrap_or(Ty::unit())
            } else {
                builder.build(t).unwrap_or(Ty::unit())
            }
        })
    }

    pub(crate) fn finish_param(&mut self, param: &Param, declared: Option<Ty>) -> Ty {
        let ty = declared.unwrap_or_else(|| self.fresh());
        if let Some(default) = &param.default {
            let default_ty = self.infer_expr(default);
            self.unify(ty.clone(), default_ty, ConstraintOrigin::LetBinding { binding_span: default.span });
        }
        self.bind_pattern(&param.pattern, ty.clone());
        ty
    }


    /// spec.md §4.2 "Mutation rule": `target = value` is an assignment (not
    /// a fresh binding) when `target` already resolves to a value
    /// identifier; the mutation check runs before unification.
    fn infer_assign(&mut self, target: &Expr, value: &Expr, span: Span) -> Ty {
        if let ExprKind::Identifier(name) = &target.kind {
            if let Err(e) = self.table.check_mutation(name, span) {
                self.push_error(e);
            }
        }
        let target_ty = self.infer_expr(target);
        let value_ty = self.infer_expr(value);
        self.unify(target_ty, value_ty, ConstraintOrigin::Assignment { span });
        Ty::unit()
    }

    /// spec.md §4.5 "Let": the RHS is inferred at a fresh level so its
    /// free variables can be generalized (subject to the value
    /// restriction: only a syntactic value is generalized, everything
    /// else is bound monomorphically).
    fn infer_let(&mut self, pattern: &Pattern, type_ann: Option<&mesh_common::ast::TypeExpr>, value: &Expr, span: Span) -> Ty {
        let env_level = self.ctx.current_level();
        self.ctx.enter_level();
        let value_ty = self.infer_expr(value);
        self.ctx.leave_level();

        let declared = type_ann.map(|t| {
            let mut builder = Builder::new(self.table, self.ctx, self.ctx.options);
            builder.build(t).unwrap_or(Ty::unit())
        });
        if let Some(declared) = &declared {
            self.unify(declared.clone(), value_ty.clone(), ConstraintOrigin::Annotation { annotation_span: span });
        }

        if is_syntactic_value(value) {
            let scheme = self.ctx.generalize(value_ty, Vec::new(), env_level);
            self.bind_pattern_scheme(pattern, scheme);
        } else {
            self.bind_pattern(pattern, value_ty);
        }
        Ty::unit()
    }

    /// spec.md §4.5 "For": `iterable` must be a `List<T>` (or any
    /// registered `Iterable`-shaped container); `pattern` binds `T` for
    /// the loop body.
    fn infer_for(&mut self, pattern: &Pattern, iterable: &Expr, body: &Block, span: Span) -> Ty {
        let iterable_ty = self.infer_expr(iterable);
        let elem_ty = self.fresh();
        self.unify(iterable_ty, Ty::list(elem_ty.clone()), ConstraintOrigin::ForLoop { span });

        self.table.push_scope(ScopeKind::Block);
        self.bind_pattern(pattern, elem_ty);
        self.loop_depth += 1;
        self.infer_block(body);
        self.loop_depth -= 1;
        self.table.pop_scope();
        Ty::unit()
    }

    fn infer_while(&mut self, cond: &Expr, body: &Block) -> Ty {
        let cond_ty = self.infer_expr(cond);
        self.unify(cond_ty, Ty::bool(), ConstraintOrigin::IfBranches { if_span: body.span });
        self.loop_depth += 1;
        self.infer_block(body);
        self.loop_depth -= 1;
        Ty::unit()
    }

    fn infer_break(&mut self, value: Option<&Expr>, span: Span) -> Ty {
        if self.loop_depth == 0 {
            self.push_error(TypeError::BreakOutsideLoop { span });
        }
        if let Some(v) = value {
            self.infer_expr(v);
        }
        Ty::Never
    }

    fn infer_continue(&mut self, span: Span) -> Ty {
        if self.loop_depth == 0 {
            self.push_error(TypeError::ContinueOutsideLoop { span });
        }
        Ty::Never
    }

    fn infer_return(&mut self, value: Option<&Expr>) -> Ty {
        if let Some(v) = value {
            self.infer_expr(v);
        }
        Ty::Never
    }

    /// spec.md §4.4 "Records"/§4.3 "Extension methods": field access first
    /// tries a record's own field, then falls back to a trait method
    /// lookup so `x.show()`-style calls dispatch the same way a direct
    /// trait-method call would (spec.md §4.3 "Ambiguous methods").
    fn infer_field_access(&mut self, base: &Expr, field: &str, span: Span) -> Ty {
        let base_ty = self.infer_expr(base);
        let resolved = self.ctx.resolve(base_ty.clone());
        if let Ty::Record(r) = &resolved {
            if let Some(ty) = r.field(field) {
                return ty.clone();
            }
        }

        let candidates = self.traits.find_method_traits(field, &resolved);
        match candidates.len() {
            0 => {
                self.push_error(TypeError::UndefinedSymbol { name: field.to_string(), span });
                self.fresh()
            }
            1 => {
                let sig = self.traits.resolve_method(field, &resolved).expect("candidate trait reported a method it doesn't have");
                self.pending.push(PendingConstraint {
                    constraint: Constraint { trait_name: candidates[0].clone(), args: vec![resolved] },
                    span,
                });
                Ty::func(sig.param_types, sig.return_type)
            }
            _ => {
                self.push_error(TypeError::AmbiguousMethod { method_name: field.to_string(), candidate_traits: candidates, ty: resolved, span });
                self.fresh()
            }
        }
    }

    // ── Patterns (spec.md §4.5 "Pattern inference") ───────────────────

    /// Infers a pattern's type and binds every variable it introduces into
    /// the current scope; `_` binds nothing (spec.md §4.2 "A special
    /// sentinel `_` never defines anything").
    fn infer_pattern(&mut self, pattern: &Pattern) -> Ty {
        let ty = match &pattern.kind {
            PatternKind::Wildcard => self.fresh(),
            PatternKind::Var(name) => {
                let ty = self.fresh();
                self.table.define(name.clone(), Scheme::mono(ty.clone()), pattern.span);
                ty
            }
            PatternKind::Literal(lit) => Self::infer_literal(lit),
            PatternKind::Constructor { name, args } => self.infer_constructor_pattern(name, args, pattern.span),
            PatternKind::Tuple(elems) => Ty::Tuple(elems.iter().map(|p| self.infer_pattern(p)).collect()),
            PatternKind::List { elements, rest } => {
                let elem_ty = self.fresh();
                for e in elements {
                    let t = self.infer_pattern(e);
                    self.unify(elem_ty.clone(), t, ConstraintOrigin::MatchArm { span: e.span });
                }
                if let Some(rest) = rest {
                    let rest_ty = self.infer_pattern(rest);
                    self.unify(rest_ty, Ty::list(elem_ty.clone()), ConstraintOrigin::MatchArm { span: rest.span });
                }
                Ty::list(elem_ty)
            }
            PatternKind::Record { fields, has_rest } => {
                let mut field_tys = Vec::with_capacity(fields.len());
                for (name, p) in fields {
                    field_tys.push((name.clone(), self.infer_pattern(p)));
                }
                Ty::Record(TRecord { fields: field_tys, open: *has_rest })
            }
            PatternKind::Or(alts) => self.infer_or_pattern(alts, pattern.span),
            PatternKind::Annotated(inner, type_ann) => {
                let mut builder = Builder::new(self.table, self.ctx, self.ctx.options);
                let declared = builder.build(type_ann).unwrap_or(Ty::unit());
                let inner_ty = self.infer_pattern(inner);
                self.unify(declared.clone(), inner_ty, ConstraintOrigin::Annotation { annotation_span: pattern.span });
                declared
            }
        };
        self.record(pattern.id, ty.clone());
        ty
    }

    /// spec.md §4.4 "Sum types": a constructor pattern's argument count and
    /// types come from the matching variant's declared fields, looked up
    /// by name in the symbol table's constructor bindings.
    fn infer_constructor_pattern(&mut self, name: &str, args: &[Pattern], span: Span) -> Ty {
        let Some(symbol) = self.table.find(name) else {
            self.push_error(TypeError::UndeclaredIdentifier { name: name.to_string(), span, suggestion: None });
            for a in args {
                self.infer_pattern(a);
            }
            return self.fresh();
        };
        let scheme = symbol.scheme.clone();
        let (ctor_ty, _) = self.ctx.instantiate(&scheme);
        let (field_tys, result_ty) = match ctor_ty {
            Ty::Func(f) => (f.params, *f.ret),
            other => (Vec::new(), other),
        };
        if field_tys.len() != args.len() {
            self.push_error(TypeError::ArityMismatch { expected: field_tys.len(), found: args.len(), origin: ConstraintOrigin::MatchArm { span } });
        }
        for (arg, declared) in args.iter().zip(field_tys.iter()) {
            let arg_ty = self.infer_pattern(arg);
            self.unify(declared.clone(), arg_ty, ConstraintOrigin::MatchArm { span: arg.span });
        }
        result_ty
    }

    /// spec.md §7 "OrPatternBindingMismatch" (A003): every alternative of
    /// an or-pattern must bind exactly the same set of variable names,
    /// each with a unifiable type.
    fn infer_or_pattern(&mut self, alts: &[Pattern], span: Span) -> Ty {
        let result_ty = self.fresh();
        let mut first_names: Option<Vec<String>> = None;
        for alt in alts {
            self.table.push_scope(ScopeKind::Block);
            let ty = self.infer_pattern(alt);
            self.unify(result_ty.clone(), ty, ConstraintOrigin::MatchArm { span });
            let mut names: Vec<String> = collect_pattern_bindings(alt);
            names.sort();
            match &first_names {
                Some(expected) if expected != &names => {
                    self.push_error(TypeError::NamingConvention {
                        name: names.join(", "),
                        expected: "the same bindings as the first or-pattern alternative",
                        span,
                    });
                }
                None => first_names = Some(names),
                _ => {}
            }
            self.table.pop_scope();
        }
        // Re-bind into the enclosing scope from the first alternative so
        // the arm body can reference the (unified) bound names.
        if let Some(first) = alts.first() {
            self.bind_pattern(first, result_ty.clone());
        }
        result_ty
    }

    pub(crate) fn bind_pattern(&mut self, pattern: &Pattern, ty: Ty) {
        let inferred = self.infer_pattern(pattern);
        self.unify(inferred, ty, ConstraintOrigin::LetBinding { binding_span: pattern.span });
    }

    pub(crate) fn bind_pattern_scheme(&mut self, pattern: &Pattern, scheme: Scheme) {
        match &pattern.kind {
            PatternKind::Var(name) => {
                self.table.define(name.clone(), scheme, pattern.span);
            }
            _ => {
                // Only a bare variable binding can carry real polymorphism
                // through to its uses; anything more structured falls
                // back to the monomorphic instantiation (spec.md §4.5
                // "Generalisation applies to let-bound variables").
                let (ty, _) = self.ctx.instantiate(&scheme);
                self.bind_pattern(pattern, ty);
            }
        }
    }

    pub(crate) fn push_error(&mut self, error: TypeError) {
        self.ctx.errors.push(error);
    }
}

/// spec.md §4.5 "Generalisation"/"Value restriction": only literals,
/// variables, tuples/records/lists of values, and function literals are
/// generalized; everything else (calls, in particular) binds
/// monomorphically to avoid unsoundly generalizing a mutable reference.
fn is_syntactic_value(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Identifier(_) | ExprKind::Function(_) => true,
        ExprKind::Tuple(elems) | ExprKind::List(elems) => elems.iter().all(is_syntactic_value),
        ExprKind::RecordLit { fields, spread } => fields.iter().all(|(_, v)| is_syntactic_value(v)) && spread.is_none(),
        _ => false,
    }
}

fn collect_pattern_bindings(pattern: &Pattern) -> Vec<String> {
    let mut out = Vec::new();
    collect_pattern_bindings_into(pattern, &mut out);
    out
}

fn collect_pattern_bindings_into(pattern: &Pattern, out: &mut Vec<String>) {
    match &pattern.kind {
        PatternKind::Var(name) => out.push(name.clone()),
        PatternKind::Constructor { args, .. } | PatternKind::Tuple(args) => {
            for a in args {
                collect_pattern_bindings_into(a, out);
            }
        }
        PatternKind::List { elements, rest } => {
            for e in elements {
                collect_pattern_bindings_into(e, out);
            }
            if let Some(r) = rest {
                collect_pattern_bindings_into(r, out);
            }
        }
        PatternKind::Record { fields, .. } => {
            for (_, p) in fields {
                collect_pattern_bindings_into(p, out);
            }
        }
        PatternKind::Or(alts) => {
            if let Some(first) = alts.first() {
                collect_pattern_bindings_into(first, out);
            }
        }
        PatternKind::Annotated(inner, _) => collect_pattern_bindings_into(inner, out),
        PatternKind::Wildcard | PatternKind::Literal(_) => {}
    }
}

/// spec.md §4.5 "Pattern matching": converts a surface `Pattern` into the
/// abstract shape [`exhaustiveness`] reasons about, discarding everything
/// it doesn't need (types, guards, variable names).
fn to_abstract_pattern(pattern: &Pattern) -> Pat {
    match &pattern.kind {
        PatternKind::Wildcard | PatternKind::Var(_) => Pat::Wildcard,
        PatternKind::Literal(lit) => literal_to_abstract(lit),
        PatternKind::Constructor { name, args } => {
            Pat::Constructor { name: name.clone(), type_name: String::new(), args: args.iter().map(to_abstract_pattern).collect() }
        }
        PatternKind::Tuple(elems) => {
            Pat::Constructor { name: format!("$tuple{}", elems.len()), type_name: "$tuple".to_string(), args: elems.iter().map(to_abstract_pattern).collect() }
        }
        PatternKind::List { elements, rest } => {
            // A fixed-length list pattern is treated as a tuple-shaped
            // constructor for exhaustiveness purposes; an open tail
            // (`rest`) makes the pattern behave like a wildcard since
            // lists have unbounded length (spec.md §4.4 "Lists").
            if rest.is_some() {
                Pat::Wildcard
            } else {
                Pat::Constructor {
                    name: format!("$list{}", elements.len()),
                    type_name: "$list".to_string(),
                    args: elements.iter().map(to_abstract_pattern).collect(),
                }
            }
        }
        PatternKind::Record { fields, has_rest } => {
            if *has_rest {
                Pat::Wildcard
            } else {
                Pat::Constructor {
                    name: "$record".to_string(),
                    type_name: "$record".to_string(),
                    args: fields.iter().map(|(_, p)| to_abstract_pattern(p)).collect(),
                }
            }
        }
        PatternKind::Or(alts) => Pat::Or { alternatives: alts.iter().map(to_abstract_pattern).collect() },
        PatternKind::Annotated(inner, _) => to_abstract_pattern(inner),
    }
}

fn literal_to_abstract(lit: &LiteralKind) -> Pat {
    match lit {
        LiteralKind::Int(v) => Pat::Literal { value: v.to_string(), ty: LitKind::Int },
        LiteralKind::Float(v) => Pat::Literal { value: v.to_string(), ty: LitKind::Float },
        LiteralKind::Bool(v) => Pat::Literal { value: v.to_string(), ty: LitKind::Bool },
        LiteralKind::Char(v) => Pat::Literal { value: v.to_string(), ty: LitKind::String },
        LiteralKind::Str(v) => Pat::Literal { value: v.clone(), ty: LitKind::String },
        LiteralKind::Unit => Pat::Wildcard,
    }
}

fn format_pat(pat: &Pat) -> String {
    match pat {
        Pat::Wildcard => "_".to_string(),
        Pat::Literal { value, .. } => value.clone(),
        Pat::Constructor { name, args, .. } if args.is_empty() => name.clone(),
        Pat::Constructor { name, args, .. } => format!("{name}({})", args.iter().map(format_pat).collect::<Vec<_>>().join(", ")),
        Pat::Or { alternatives } => alternatives.iter().map(format_pat).collect::<Vec<_>>().join(" | "),
    }
}

/// spec.md §4.5 "Pattern matching": builds the [`TypeInfo`] the
/// exhaustiveness algorithm needs for a scrutinee's resolved type, looking
/// up a sum type's variant arities in the symbol table.
fn type_info_for(ty: &Ty, table: &SymbolTable) -> TypeInfo {
    if *ty == Ty::bool() {
        return TypeInfo::Bool;
    }
    if let Ty::Con(con) = ty {
        if let Some(def) = table.find_type(&con.name) {
            if let crate::scope::TypeDefKind::Sum { variants } = &def.kind {
                return TypeInfo::SumType {
                    variants: variants.iter().map(|(name, fields)| exhaustiveness::ConstructorSig { name: name.clone(), arity: fields.len() }).collect(),
                };
            }
        }
    }
    if let Ty::App(con, _) = ty {
        if let Ty::Con(con) = con.as_ref() {
            if let Some(def) = table.find_type(&con.name) {
                if let crate::scope::TypeDefKind::Sum { variants } = &def.kind {
                    return TypeInfo::SumType {
                        variants: variants.iter().map(|(name, fields)| exhaustiveness::ConstructorSig { name: name.clone(), arity: fields.len() }).collect(),
                    };
                }
            }
        }
    }
    TypeInfo::Infinite
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::AnalysisOptions;
    use mesh_common::ast::NodeId as Id;

    fn span() -> Span {
        Span::synthetic()
    }

    fn expr(id: Id, kind: ExprKind) -> Expr {
        Expr { id, span: span(), kind }
    }

    fn block(stmts: Vec<Stmt>) -> Block {
        Block { statements: stmts, span: span() }
    }

    fn pat(id: Id, kind: PatternKind) -> Pattern {
        Pattern { id, span: span(), kind }
    }

    fn fresh_fixture() -> (InferCtx, SymbolTable, TraitRegistry, TypeMap) {
        (InferCtx::new(AnalysisOptions::default()), SymbolTable::new(), TraitRegistry::new(), TypeMap::default())
    }

    #[test]
    fn literal_expression_types_are_builtins() {
        let (mut ctx, mut table, mut traits, mut types) = fresh_fixture();
        let mut infer = Infer::new(&mut ctx, &mut table, &mut traits, &mut types);
        let e = expr(0, ExprKind::Literal(LiteralKind::Int(1)));
        assert_eq!(infer.infer_expr(&e), Ty::int());
    }

    #[test]
    fn undeclared_identifier_is_reported_and_recovers() {
        let (mut ctx, mut table, mut traits, mut types) = fresh_fixture();
        {
            let mut infer = Infer::new(&mut ctx, &mut table, &mut traits, &mut types);
            infer.infer_expr(&expr(0, ExprKind::Identifier("missing".into())));
        }
        assert_eq!(ctx.errors.len(), 1);
        assert!(matches!(ctx.errors[0], TypeError::UndeclaredIdentifier { .. }));
    }

    #[test]
    fn let_binding_generalizes_identity_function() {
        let (mut ctx, mut table, mut traits, mut types) = fresh_fixture();
        let mut infer = Infer::new(&mut ctx, &mut table, &mut traits, &mut types);

        let identity = FunctionLiteral {
            params: vec![Param { pattern: pat(1, PatternKind::Var("x".into())), type_ann: None, default: None }],
            variadic_param: None,
            return_type: None,
            body: Box::new(block(vec![Stmt::Expr(expr(2, ExprKind::Identifier("x".into())))])),
        };
        let let_expr = expr(
            3,
            ExprKind::Let {
                pattern: pat(4, PatternKind::Var("id".into())),
                type_ann: None,
                value: Box::new(expr(5, ExprKind::Function(identity))),
            },
        );
        infer.infer_expr(&let_expr);

        let use1 = infer.infer_expr(&expr(6, ExprKind::Identifier("id".into())));
        let use2 = infer.infer_expr(&expr(7, ExprKind::Identifier("id".into())));
        assert_ne!(use1, use2, "two instantiations of a generalized scheme must be distinct");
    }

    #[test]
    fn break_outside_loop_is_reported() {
        let (mut ctx, mut table, mut traits, mut types) = fresh_fixture();
        {
            let mut infer = Infer::new(&mut ctx, &mut table, &mut traits, &mut types);
            infer.infer_expr(&expr(0, ExprKind::Break(None)));
        }
        assert!(matches!(ctx.errors[0], TypeError::BreakOutsideLoop { .. }));
    }

    #[test]
    fn mutating_global_from_function_body_is_reported() {
        let (mut ctx, mut table, mut traits, mut types) = fresh_fixture();
        table.define("counter", Scheme::mono(Ty::int()), span());
        {
            let mut infer = Infer::new(&mut ctx, &mut table, &mut traits, &mut types);
            let fn_lit = FunctionLiteral {
                params: vec![],
                variadic_param: None,
                return_type: None,
                body: Box::new(block(vec![Stmt::Expr(expr(
                    1,
                    ExprKind::Assign {
                        target: Box::new(expr(2, ExprKind::Identifier("counter".into()))),
                        value: Box::new(expr(3, ExprKind::Literal(LiteralKind::Int(1)))),
                    },
                ))])),
            };
            infer.infer_expr(&expr(4, ExprKind::Function(fn_lit)));
        }
        assert!(ctx.errors.iter().any(|e| matches!(e, TypeError::MutateGlobalFromFunction { .. })));
    }

    #[test]
    fn if_without_else_forces_unit() {
        let (mut ctx, mut table, mut traits, mut types) = fresh_fixture();
        let mut infer = Infer::new(&mut ctx, &mut table, &mut traits, &mut types);
        let e = expr(
            0,
            ExprKind::If {
                cond: Box::new(expr(1, ExprKind::Literal(LiteralKind::Bool(true)))),
                then_branch: Box::new(block(vec![])),
                else_branch: None,
            },
        );
        assert_eq!(infer.infer_expr(&e), Ty::unit());
    }

    #[test]
    fn non_exhaustive_bool_match_is_reported() {
        let (mut ctx, mut table, mut traits, mut types) = fresh_fixture();
        {
            let mut infer = Infer::new(&mut ctx, &mut table, &mut traits, &mut types);
            let e = expr(
                0,
                ExprKind::Match {
                    scrutinee: Box::new(expr(1, ExprKind::Literal(LiteralKind::Bool(true)))),
                    arms: vec![MatchArm {
                        pattern: pat(2, PatternKind::Literal(LiteralKind::Bool(true))),
                        guard: None,
                        body: expr(3, ExprKind::Literal(LiteralKind::Unit)),
                        span: span(),
                    }],
                },
            );
            infer.infer_expr(&e);
        }
        assert!(ctx.errors.iter().any(|e| matches!(e, TypeError::NonExhaustiveMatch { .. })));
    }

    #[test]
    fn or_pattern_binding_mismatch_is_reported() {
        let (mut ctx, mut table, mut traits, mut types) = fresh_fixture();
        {
            let mut infer = Infer::new(&mut ctx, &mut table, &mut traits, &mut types);
            let arm_pat = pat(
                0,
                PatternKind::Or(vec![
                    pat(1, PatternKind::Var("a".into())),
                    pat(2, PatternKind::Constructor { name: "None".into(), args: vec![] }),
                ]),
            );
            infer.infer_pattern(&arm_pat);
        }
        assert!(ctx.errors.iter().any(|e| matches!(e, TypeError::NamingConvention { .. })));
    }

    #[test]
    fn for_loop_binds_list_element_type() {
        let (mut ctx, mut table, mut traits, mut types) = fresh_fixture();
        let mut infer = Infer::new(&mut ctx, &mut table, &mut traits, &mut types);
        let list_expr = expr(0, ExprKind::List(vec![expr(1, ExprKind::Literal(LiteralKind::Int(1)))]));
        let for_expr = expr(
            2,
            ExprKind::For {
                pattern: pat(3, PatternKind::Var("x".into())),
                iterable: Box::new(list_expr),
                body: Box::new(block(vec![Stmt::Expr(expr(4, ExprKind::Identifier("x".into())))])),
            },
        );
        infer.infer_expr(&for_expr);
        assert!(ctx.errors.is_empty());
    }
}
