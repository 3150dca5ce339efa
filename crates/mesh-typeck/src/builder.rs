//! Builder: turns a syntactic type annotation (`mesh_common::ast::TypeExpr`)
//! into an internal [`Ty`] (spec.md §4.3).
//!
//! The only non-trivial rule is the **case rule**: an uppercase identifier
//! that isn't a known type is an error, while a lowercase identifier that
//! isn't a known type is an *implicit generic* -- a fresh type variable is
//! minted and remembered under that name so every other occurrence of the
//! same lowercase identifier within one signature resolves to the same
//! variable. That's genuinely local to one `Builder`, not the symbol
//! table's scope stack, so it's tracked here as `implicit_generics` rather
//! than pushed into `SymbolTable`.

use rustc_hash::FxHashMap;

use mesh_common::ast::{FuncTypeExpr, RecordTypeExpr, TraitConstraintExpr, TypeExpr, TypeExprKind};
use mesh_common::Span;

use crate::error::{suggest, TypeError};
use crate::kind::Kind;
use crate::options::AnalysisOptions;
use crate::scope::{SymbolTable, TypeDefKind};
use crate::ty::{Constraint, Forall, TFunc, TRecord, Ty, TyCon};
use crate::unify::InferCtx;

/// Resolves `module.Name` references into a foreign module's type
/// information, standing in for the (out-of-scope) module loader's Headers
/// pass having already populated that module's own symbol table (spec.md
/// §4.3 "Qualified names"). The multi-module driver implements this over
/// its per-module registry; a single-module build can pass [`NoForeignTypes`].
pub trait ForeignTypeResolver {
    fn resolve(&self, module: &str, name: &str) -> Option<ForeignType>;
}

/// What the builder needs to know about a type reached through a
/// qualified reference: its kind (to validate application arity) and its
/// structural form, if any (so the unifier can still expand a qualified
/// alias).
pub struct ForeignType {
    pub kind: Kind,
    pub underlying: Option<Ty>,
}

pub struct NoForeignTypes;
impl ForeignTypeResolver for NoForeignTypes {
    fn resolve(&self, _module: &str, _name: &str) -> Option<ForeignType> {
        None
    }
}

const NO_FOREIGN_TYPES: NoForeignTypes = NoForeignTypes;

pub struct Builder<'a> {
    table: &'a SymbolTable,
    ctx: &'a mut InferCtx,
    foreign: &'a dyn ForeignTypeResolver,
    options: AnalysisOptions,
    /// Lowercase names already bound to a fresh variable within this
    /// builder's lifetime (spec.md §4.3 "implicit generic discovery").
    implicit_generics: FxHashMap<String, Ty>,
}

impl<'a> Builder<'a> {
    pub fn new(table: &'a SymbolTable, ctx: &'a mut InferCtx, options: AnalysisOptions) -> Self {
        Builder { table, ctx, foreign: &NO_FOREIGN_TYPES, options, implicit_generics: FxHashMap::default() }
    }

    pub fn with_foreign_resolver(mut self, foreign: &'a dyn ForeignTypeResolver) -> Self {
        self.foreign = foreign;
        self
    }

    /// Seed an explicitly-declared generic parameter (`fun f<a>(...)`) so
    /// references to it inside the signature resolve to the same variable
    /// as an implicit one would, without re-minting it.
    pub fn bind_generic(&mut self, name: impl Into<String>, ty: Ty) {
        self.implicit_generics.insert(name.into(), ty);
    }

    pub fn implicit_generics(&self) -> impl Iterator<Item = (&String, &Ty)> {
        self.implicit_generics.iter()
    }

    pub fn build(&mut self, expr: &TypeExpr) -> Result<Ty, TypeError> {
        match &expr.kind {
            TypeExprKind::Name(name) => self.build_name(name, expr.span),
            TypeExprKind::Qualified(module, name) => self.build_qualified(module, name, expr.span),
            TypeExprKind::App(con, args) => self.build_app(con, args, expr.span),
            TypeExprKind::Func(f) => self.build_func(f),
            TypeExprKind::Tuple(elems) => {
                let built: Result<Vec<Ty>, TypeError> = elems.iter().map(|e| self.build(e)).collect();
                Ok(Ty::Tuple(built?))
            }
            TypeExprKind::Record(r) => self.build_record(r),
            TypeExprKind::Union(members) => {
                let built: Result<Vec<Ty>, TypeError> = members.iter().map(|m| self.build(m)).collect();
                Ok(Ty::union_of(built?))
            }
            TypeExprKind::Forall(forall) => self.build_forall(forall),
        }
    }

    /// spec.md §4.3 "Case rule".
    fn build_name(&mut self, name: &str, span: Span) -> Result<Ty, TypeError> {
        let is_upper = name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false);

        if !is_upper {
            if let Some(existing) = self.implicit_generics.get(name) {
                return Ok(existing.clone());
            }
            let fresh = self.ctx.fresh_var();
            self.implicit_generics.insert(name.to_string(), fresh.clone());
            return Ok(fresh);
        }

        if let Some(def) = self.table.find_type(name) {
            return Ok(Ty::Con(def.con.clone()));
        }
        if let Some(underlying) = self.table.resolve_type_alias(name) {
            let kind = self.table.find_kind(name).cloned().unwrap_or(Kind::Star);
            let mut con = TyCon::new(name, kind);
            con.underlying = Some(Box::new(underlying.clone()));
            return Ok(Ty::Con(con));
        }

        let suggestion = suggest(name, self.table.type_names().iter().map(String::as_str), self.options.max_suggestion_distance);
        Err(TypeError::UndeclaredType { name: name.to_string(), span, suggestion })
    }

    /// spec.md §4.3 "Qualified names": `m.T` always yields a `TCon` with
    /// `module = Some(m)`; `underlying` is filled in from the foreign
    /// module's registry so structural unification still works while
    /// qualified identity is preserved for extension-method lookup.
    fn build_qualified(&mut self, module: &str, name: &str, span: Span) -> Result<Ty, TypeError> {
        let canonical = self.table.resolve_module_alias(module).unwrap_or(module).to_string();
        if let Some(foreign) = self.foreign.resolve(&canonical, name) {
            let mut con = TyCon::with_module(name, canonical, foreign.kind);
            con.underlying = foreign.underlying.map(Box::new);
            return Ok(Ty::Con(con));
        }
        // Driver-populated fallback (spec.md §4.7): the multi-module driver
        // stitches a dependency's Headers-pass output into this table under
        // the qualified key rather than threading a `ForeignTypeResolver`
        // trait object through borrows of its own module map.
        if let Some((kind, underlying)) = self.table.find_foreign_type(&canonical, name) {
            let mut con = TyCon::with_module(name, canonical, kind.clone());
            con.underlying = underlying.cloned().map(Box::new);
            return Ok(Ty::Con(con));
        }
        let suggestion = suggest(name, self.table.type_names().iter().map(String::as_str), self.options.max_suggestion_distance);
        Err(TypeError::UndeclaredType { name: format!("{module}.{name}"), span, suggestion })
    }

    /// spec.md §4.3 "Aliases": an alias name with type arguments yields a
    /// `TApp` whose constructor is the alias's `TCon`, with kind arity
    /// validated with a position-specific error.
    fn build_app(&mut self, con_expr: &TypeExpr, arg_exprs: &[TypeExpr], span: Span) -> Result<Ty, TypeError> {
        let con = self.build(con_expr)?;
        let args: Result<Vec<Ty>, TypeError> = arg_exprs.iter().map(|a| self.build(a)).collect();
        let args = args?;

        let con_name = match &con {
            Ty::Con(c) => c.name.clone(),
            _ => "<expr>".to_string(),
        };
        let expected_arity = self.con_kind(&con).arity();
        if args.len() != expected_arity && expected_arity > 0 {
            return Err(TypeError::KindArityMismatch {
                name: con_name,
                expected: expected_arity,
                found: args.len(),
                span,
            });
        }

        Ok(Ty::app(con, args))
    }

    fn con_kind(&self, ty: &Ty) -> Kind {
        match ty {
            Ty::Con(c) => c.kind.clone(),
            Ty::Var(v) => self.ctx.var_kind(*v),
            _ => Kind::Star,
        }
    }

    fn build_func(&mut self, f: &FuncTypeExpr) -> Result<Ty, TypeError> {
        let params: Result<Vec<Ty>, TypeError> = f.params.iter().map(|p| self.build(p)).collect();
        let ret = self.build(&f.ret)?;
        let constraints = self.build_constraints(&f.constraints)?;
        Ok(Ty::Func(TFunc {
            params: params?,
            ret: Box::new(ret),
            is_variadic: f.is_variadic,
            default_count: f.default_count,
            constraints,
        }))
    }

    /// spec.md §9 "Row polymorphism": the builder toggles width-subtyping
    /// on for parameter annotations via `AnalysisOptions::row_open_params`;
    /// record type expressions carry their own explicit flag otherwise.
    fn build_record(&mut self, r: &RecordTypeExpr) -> Result<Ty, TypeError> {
        let mut fields = Vec::with_capacity(r.fields.len());
        for (name, ty) in &r.fields {
            fields.push((name.clone(), self.build(ty)?));
        }
        Ok(Ty::Record(TRecord { fields, open: r.open }))
    }

    /// Build a record type expression specifically for a function
    /// parameter position, applying `row_open_params` (spec.md §4.3, §9).
    pub fn build_param_record(&mut self, r: &RecordTypeExpr) -> Result<Ty, TypeError> {
        let mut ty = self.build_record(r)?;
        if self.options.row_open_params {
            if let Ty::Record(rec) = &mut ty {
                rec.open = true;
            }
        }
        Ok(ty)
    }

    /// spec.md §4.3 "Forall": opens a sub-scope, registers its variables,
    /// builds the body, and wraps in `Forall` with any per-variable
    /// constraints.
    fn build_forall(&mut self, forall: &mesh_common::ast::ForallTypeExpr) -> Result<Ty, TypeError> {
        let saved: FxHashMap<String, Ty> = self.implicit_generics.clone();
        let mut vars = Vec::with_capacity(forall.vars.len());
        for name in &forall.vars {
            let fresh = self.ctx.fresh_var();
            self.implicit_generics.insert(name.clone(), fresh.clone());
            if let Ty::Var(v) = fresh {
                vars.push(v);
            }
        }
        let constraints = self.build_constraints(&forall.constraints)?;
        let body = self.build(&forall.body)?;
        self.implicit_generics = saved;
        Ok(Ty::Forall(Forall { vars, constraints, body: Box::new(body) }))
    }

    pub fn build_constraints(&mut self, exprs: &[TraitConstraintExpr]) -> Result<Vec<Constraint>, TypeError> {
        let mut out = Vec::with_capacity(exprs.len());
        for c in exprs {
            let args: Result<Vec<Ty>, TypeError> = c.args.iter().map(|a| self.build(a)).collect();
            out.push(Constraint { trait_name: c.trait_name.clone(), args: args? });
        }
        Ok(out)
    }
}

/// spec.md §3.2 "a type alias graph must be acyclic": walk an alias's
/// underlying form, following nested alias references, and report a cycle
/// if the starting name is reached again.
pub fn check_alias_acyclic(name: &str, table: &SymbolTable, span: Span) -> Result<(), TypeError> {
    fn visit(current: &str, root: &str, table: &SymbolTable, seen: &mut std::collections::HashSet<String>) -> bool {
        if current == root && !seen.is_empty() {
            return true;
        }
        if !seen.insert(current.to_string()) {
            return false;
        }
        if let Some(TypeDefKind::Alias { underlying }) = table.find_type(current).map(|info| &info.kind) {
            return mentions_alias(underlying, table, root, seen);
        }
        false
    }

    fn mentions_alias(ty: &Ty, table: &SymbolTable, root: &str, seen: &mut std::collections::HashSet<String>) -> bool {
        match ty {
            Ty::Con(c) => visit(&c.name, root, table, seen),
            Ty::App(con, args) => mentions_alias(con, table, root, seen) || args.iter().any(|a| mentions_alias(a, table, root, seen)),
            Ty::Func(f) => f.params.iter().any(|p| mentions_alias(p, table, root, seen)) || mentions_alias(&f.ret, table, root, seen),
            Ty::Tuple(elems) => elems.iter().any(|e| mentions_alias(e, table, root, seen)),
            Ty::Record(r) => r.fields.iter().any(|(_, t)| mentions_alias(t, table, root, seen)),
            Ty::Union(members) => members.iter().any(|m| mentions_alias(m, table, root, seen)),
            _ => false,
        }
    }

    let mut seen = std::collections::HashSet::new();
    if visit(name, name, table, &mut seen) {
        return Err(TypeError::CyclicTypeAlias { name: name.to_string(), span });
    }
    Ok(())
}
