//! Unification engine (spec.md §4.4) and the inference context that owns
//! it (spec.md §4.5 "The engine threads an `InferenceContext`").
//!
//! Built on `ena`'s union-find table, exactly as the teacher's type
//! checker uses it, extended with kind-checking before binding, row-open
//! records, union membership, rank-N skolemization, and a resolver hook
//! so the unifier can expand nominal aliases on demand.

use ena::unify::InPlaceUnificationTable;

use crate::error::{ConstraintOrigin, TypeError};
use crate::kind::{Kind, KindSubst};
use crate::options::AnalysisOptions;
use crate::ty::{Constraint, Forall, Scheme, TFunc, TRecord, Ty, TyCon, TyVar};

/// Expands a nominal alias's `TyCon` to its structural `underlying` form.
/// Implemented by the symbol table (§4.2) so the unifier can stay
/// decoupled from scope management.
pub trait AliasResolver {
    fn expand_alias(&self, con: &TyCon) -> Option<Ty>;
}

/// A resolver that never expands anything, for unification that does not
/// need alias-awareness (e.g. unit tests of the unifier in isolation).
pub struct NoAliasResolver;
impl AliasResolver for NoAliasResolver {
    fn expand_alias(&self, _con: &TyCon) -> Option<Ty> {
        None
    }
}

/// Owns the union-find table, level state, kind substitution, and
/// accumulated errors for one analysis run (spec.md §4.5
/// "InferenceContext").
pub struct InferCtx {
    table: InPlaceUnificationTable<TyVar>,
    kinds: KindSubst,
    /// Declared kind of each flexible variable, indexed by `TyVar.0`.
    var_kinds: Vec<Kind>,
    current_level: u32,
    var_levels: Vec<u32>,
    pub errors: Vec<TypeError>,
    pub warnings: Vec<TypeError>,
    pub options: AnalysisOptions,
}

impl InferCtx {
    pub fn new(options: AnalysisOptions) -> Self {
        InferCtx {
            table: InPlaceUnificationTable::new(),
            kinds: KindSubst::new(),
            var_kinds: Vec::new(),
            current_level: 0,
            var_levels: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            options,
        }
    }

    // ── Type variable creation ──────────────────────────────────────

    pub fn fresh_var(&mut self) -> Ty {
        self.fresh_var_kinded(Kind::Star)
    }

    pub fn fresh_var_kinded(&mut self, kind: Kind) -> Ty {
        let var = self.table.new_key(None);
        while self.var_levels.len() <= var.0 as usize {
            self.var_levels.push(0);
            self.var_kinds.push(Kind::Star);
        }
        self.var_levels[var.0 as usize] = self.current_level;
        self.var_kinds[var.0 as usize] = kind;
        Ty::Var(var)
    }

    pub fn var_kind(&self, var: TyVar) -> Kind {
        self.var_kinds.get(var.0 as usize).cloned().unwrap_or(Kind::Star)
    }

    // ── Resolution ───────────────────────────────────────────────────

    /// Resolve a type by following union-find indirection. Compound types
    /// are resolved recursively so callers always see the most-resolved
    /// shape available so far.
    pub fn resolve(&mut self, ty: Ty) -> Ty {
        match ty {
            Ty::Var(v) => match self.table.probe_value(v) {
                Some(inner) => self.resolve(inner),
                None => Ty::Var(self.table.find(v)),
            },
            Ty::App(con, args) => {
                let con = Box::new(self.resolve(*con));
                let args = args.into_iter().map(|a| self.resolve(a)).collect();
                Ty::App(con, args)
            }
            Ty::Func(f) => Ty::Func(TFunc {
                params: f.params.into_iter().map(|p| self.resolve(p)).collect(),
                ret: Box::new(self.resolve(*f.ret)),
                is_variadic: f.is_variadic,
                default_count: f.default_count,
                constraints: f.constraints,
            }),
            Ty::Tuple(elems) => Ty::Tuple(elems.into_iter().map(|e| self.resolve(e)).collect()),
            Ty::Record(r) => Ty::Record(TRecord {
                fields: r.fields.into_iter().map(|(n, t)| (n, self.resolve(t))).collect(),
                open: r.open,
            }),
            Ty::Union(members) => Ty::union_of(members.into_iter().map(|m| self.resolve(m)).collect()),
            Ty::TypeVal(inner) => Ty::TypeVal(Box::new(self.resolve(*inner))),
            other => other,
        }
    }

    // ── Occurs check ───────────────────────────────────────────────

    pub fn occurs_in(&mut self, var: TyVar, ty: &Ty) -> bool {
        match ty {
            Ty::Var(v) => {
                if *v == var {
                    return true;
                }
                match self.table.probe_value(*v) {
                    Some(inner) => self.occurs_in(var, &inner),
                    None => false,
                }
            }
            Ty::Con(_) | Ty::Never => false,
            Ty::App(con, args) => self.occurs_in(var, con) || args.iter().any(|a| self.occurs_in(var, a)),
            Ty::Func(f) => f.params.iter().any(|p| self.occurs_in(var, p)) || self.occurs_in(var, &f.ret),
            Ty::Tuple(elems) => elems.iter().any(|e| self.occurs_in(var, e)),
            Ty::Record(r) => r.fields.iter().any(|(_, t)| self.occurs_in(var, t)),
            Ty::Union(members) => members.iter().any(|m| self.occurs_in(var, m)),
            Ty::TypeVal(inner) => self.occurs_in(var, inner),
            Ty::Forall(forall) => !forall.vars.contains(&var) && self.occurs_in(var, &forall.body),
        }
    }

    // ── Unification ──────────────────────────────────────────────────

    pub fn unify(&mut self, a: Ty, b: Ty, origin: ConstraintOrigin) -> Result<(), TypeError> {
        self.unify_resolving(a, b, origin, &NoAliasResolver)
    }

    /// The resolver-aware variant (spec.md §4.4 "A resolver-aware
    /// variant additionally consults the symbol table to expand aliases
    /// on demand").
    pub fn unify_resolving(
        &mut self,
        a: Ty,
        b: Ty,
        origin: ConstraintOrigin,
        resolver: &dyn AliasResolver,
    ) -> Result<(), TypeError> {
        let a = self.resolve(a);
        let b = self.resolve(b);
        log::trace!("unify: {a} ~ {b}");

        match (a, b) {
            (Ty::Var(v1), Ty::Var(v2)) if v1 == v2 => Ok(()),
            (Ty::Var(v1), Ty::Var(v2)) => {
                self.kinds.unify(&self.var_kind(v1), &self.var_kind(v2)).map_err(|e| {
                    self.errors.push(e.clone());
                    e
                })?;
                self.table.unify_var_var(v1, v2).expect("unifying two unbound vars should not fail");
                Ok(())
            }
            (Ty::Var(v), ty) | (ty, Ty::Var(v)) => {
                if self.occurs_in(v, &ty) {
                    log::debug!("occurs check rejected {v} binding to {ty}");
                    let err = TypeError::InfiniteType { var: v, ty, origin };
                    self.errors.push(err.clone());
                    return Err(err);
                }
                self.table.unify_var_value(v, Some(ty)).expect("binding after occurs check should not fail");
                Ok(())
            }

            (Ty::Never, _) | (_, Ty::Never) => Ok(()),

            // Rigid/nominal constructors: equal by (name, module); if one
            // side is an alias with an `underlying` form and strict mode
            // permits expansion, retry structurally.
            (Ty::Con(c1), Ty::Con(c2)) => {
                if c1 == c2 {
                    return Ok(());
                }
                if let Some(expanded) = resolver.expand_alias(&c1) {
                    return self.unify_resolving(expanded, Ty::Con(c2), origin, resolver);
                }
                if let Some(expanded) = resolver.expand_alias(&c2) {
                    return self.unify_resolving(Ty::Con(c1), expanded, origin, resolver);
                }
                let err = TypeError::Mismatch { expected: Ty::Con(c1), found: Ty::Con(c2), origin };
                self.errors.push(err.clone());
                Err(err)
            }

            // A bare constructor unifies with its own zero-argument
            // application (e.g. `Point` vs `App(Point, [])`).
            (Ty::Con(c), Ty::App(con, args)) | (Ty::App(con, args), Ty::Con(c))
                if args.is_empty() && matches!(con.as_ref(), Ty::Con(ac) if *ac == c) =>
            {
                Ok(())
            }

            (Ty::App(c1, a1), Ty::App(c2, a2)) => {
                self.unify_resolving(*c1, *c2, origin.clone(), resolver)?;
                if a1.len() != a2.len() {
                    let err = TypeError::ArityMismatch { expected: a1.len(), found: a2.len(), origin };
                    self.errors.push(err.clone());
                    return Err(err);
                }
                for (x, y) in a1.into_iter().zip(a2) {
                    self.unify_resolving(x, y, origin.clone(), resolver)?;
                }
                Ok(())
            }

            (Ty::Func(f1), Ty::Func(f2)) => self.unify_func(f1, f2, origin, resolver),

            (Ty::Tuple(e1), Ty::Tuple(e2)) => {
                if e1.len() != e2.len() {
                    let err = TypeError::ArityMismatch { expected: e1.len(), found: e2.len(), origin };
                    self.errors.push(err.clone());
                    return Err(err);
                }
                for (x, y) in e1.into_iter().zip(e2) {
                    self.unify_resolving(x, y, origin.clone(), resolver)?;
                }
                Ok(())
            }

            (Ty::Record(r1), Ty::Record(r2)) => self.unify_records(r1, r2, origin, resolver),

            // A concrete type flowing into a fixed union position: strict
            // mode requires it unify with some member (spec.md §4.4,
            // §10.4 `strict_unions`).
            (other, Ty::Union(members)) | (Ty::Union(members), other) if !matches!(other, Ty::Union(_)) => {
                if !self.options.strict_unions {
                    return Ok(());
                }
                for m in &members {
                    let snapshot = self.table.snapshot();
                    if self.unify_resolving(other.clone(), m.clone(), origin.clone(), resolver).is_ok() {
                        self.table.commit(snapshot);
                        return Ok(());
                    }
                    self.table.rollback_to(snapshot);
                }
                let err = TypeError::Mismatch { expected: Ty::Union(members), found: other, origin };
                self.errors.push(err.clone());
                Err(err)
            }

            // Two unions: ordinary unification requires set containment
            // (every member of one side unifies with some member of the
            // other), checked in both directions.
            (Ty::Union(m1), Ty::Union(m2)) => {
                let subset = |this: &mut Self, xs: &[Ty], ys: &[Ty]| -> bool {
                    xs.iter().all(|x| {
                        ys.iter().any(|y| {
                            let snapshot = this.table.snapshot();
                            let ok = this.unify_resolving(x.clone(), y.clone(), origin.clone(), resolver).is_ok();
                            if ok {
                                this.table.commit(snapshot);
                            } else {
                                this.table.rollback_to(snapshot);
                            }
                            ok
                        })
                    })
                };
                if subset(self, &m1, &m2) && subset(self, &m2, &m1) {
                    Ok(())
                } else {
                    let err = TypeError::Mismatch { expected: Ty::Union(m1), found: Ty::Union(m2), origin };
                    self.errors.push(err.clone());
                    Err(err)
                }
            }

            (Ty::TypeVal(t1), Ty::TypeVal(t2)) => self.unify_resolving(*t1, *t2, origin, resolver),

            // Unifying with a polytype skolemises its quantified variables
            // to fresh rigid constructors on each side, so a rank-N
            // parameter cannot be unsoundly specialized to one caller's
            // concrete type (spec.md §4.4 "Forall"): the resulting
            // monotypes are unified as usual, and since a skolem is just
            // a `TyCon` whose identity is its unique generated name, the
            // ordinary constructor-equality rule already rejects any
            // attempt to unify it with something else.
            (Ty::Forall(forall), other) | (other, Ty::Forall(forall)) => {
                let skolem_subst = self.skolemize(&forall);
                let skolemized_body = forall.body.apply(&skolem_subst);
                self.unify_resolving(skolemized_body, other, origin, resolver)
            }

            (a, b) => {
                let err = TypeError::Mismatch { expected: a, found: b, origin };
                self.errors.push(err.clone());
                Err(err)
            }
        }
    }

    fn unify_func(&mut self, f1: TFunc, f2: TFunc, origin: ConstraintOrigin, resolver: &dyn AliasResolver) -> Result<(), TypeError> {
        let n = f1.params.len().min(f2.params.len());
        for i in 0..n {
            self.unify_resolving(f1.params[i].clone(), f2.params[i].clone(), origin.clone(), resolver)?;
        }
        if f1.params.len() != f2.params.len() {
            let (longer, extra) = if f1.params.len() < f2.params.len() {
                (&f2, f2.params.len() - f1.params.len())
            } else {
                (&f1, f1.params.len() - f2.params.len())
            };
            if longer.is_variadic {
                if let Some(elem) = longer.params.last().cloned() {
                    for p in &longer.params[n..] {
                        self.unify_resolving(p.clone(), elem.clone(), origin.clone(), resolver)?;
                    }
                }
            } else if extra > longer.default_count {
                let err = TypeError::ArityMismatch { expected: f1.params.len(), found: f2.params.len(), origin };
                self.errors.push(err.clone());
                return Err(err);
            }
        }
        self.unify_resolving(*f1.ret, *f2.ret, origin, resolver)
    }

    fn unify_records(&mut self, r1: TRecord, r2: TRecord, origin: ConstraintOrigin, resolver: &dyn AliasResolver) -> Result<(), TypeError> {
        for (name, ty1) in &r1.fields {
            match r2.field(name) {
                Some(ty2) => self.unify_resolving(ty1.clone(), ty2.clone(), origin.clone(), resolver)?,
                None if r2.open => {}
                None => {
                    let err = TypeError::Mismatch {
                        expected: Ty::Record(r1.clone()),
                        found: Ty::Record(r2.clone()),
                        origin,
                    };
                    self.errors.push(err.clone());
                    return Err(err);
                }
            }
        }
        for (name, _) in &r2.fields {
            if r1.field(name).is_none() && !r1.open {
                let err = TypeError::Mismatch { expected: Ty::Record(r1.clone()), found: Ty::Record(r2.clone()), origin };
                self.errors.push(err.clone());
                return Err(err);
            }
        }
        Ok(())
    }

    /// Replace `forall`'s quantified variables with fresh rigid `TyCon`s
    /// (lowercase-named, so they are treated as skolems), returned as a
    /// substitution from the original var ids to those skolems.
    fn skolemize(&mut self, forall: &Forall) -> crate::ty::Subst {
        let mut subst = crate::ty::Subst::new();
        for (i, v) in forall.vars.iter().enumerate() {
            let skolem = Ty::Con(TyCon::new(format!("skolem${}${}", v.0, i), self.var_kind(*v)));
            subst.insert(*v, skolem);
        }
        subst
    }

    // ── Level management ──────────────────────────────────────────

    pub fn enter_level(&mut self) {
        self.current_level += 1;
    }

    pub fn leave_level(&mut self) {
        debug_assert!(self.current_level > 0, "cannot leave level 0");
        self.current_level -= 1;
    }

    pub fn current_level(&self) -> u32 {
        self.current_level
    }

    // ── Generalization (spec.md §4.5 "Generalisation") ─────────────

    /// Generalize `ty` into a scheme, quantifying over variables whose
    /// level is strictly greater than the *ambient environment's* level
    /// (passed as `env_level`, not always `current_level`, since a
    /// top-level `let` generalizes against the whole enclosing
    /// environment, not just one nesting nudge).
    pub fn generalize(&mut self, ty: Ty, constraints: Vec<Constraint>, env_level: u32) -> Scheme {
        let resolved = self.resolve(ty);
        let mut free_vars = Vec::new();
        self.collect_generalizable_vars(&resolved, env_level, &mut free_vars);
        let mut seen = rustc_hash::FxHashSet::default();
        free_vars.retain(|v| seen.insert(*v));
        log::trace!("generalize {resolved} at env level {env_level}: quantifying over {free_vars:?}");
        Scheme { vars: free_vars, constraints, ty: resolved }
    }

    fn collect_generalizable_vars(&mut self, ty: &Ty, env_level: u32, out: &mut Vec<TyVar>) {
        match ty {
            Ty::Var(v) => match self.table.probe_value(*v) {
                Some(inner) => self.collect_generalizable_vars(&inner, env_level, out),
                None => {
                    let level = self.var_levels.get(v.0 as usize).copied().unwrap_or(0);
                    if level > env_level {
                        out.push(*v);
                    }
                }
            },
            Ty::Con(_) | Ty::Never => {}
            Ty::App(con, args) => {
                self.collect_generalizable_vars(con, env_level, out);
                for a in args {
                    self.collect_generalizable_vars(a, env_level, out);
                }
            }
            Ty::Func(f) => {
                for p in &f.params {
                    self.collect_generalizable_vars(p, env_level, out);
                }
                self.collect_generalizable_vars(&f.ret, env_level, out);
            }
            Ty::Tuple(elems) => {
                for e in elems {
                    self.collect_generalizable_vars(e, env_level, out);
                }
            }
            Ty::Record(r) => {
                for (_, t) in &r.fields {
                    self.collect_generalizable_vars(t, env_level, out);
                }
            }
            Ty::Union(members) => {
                for m in members {
                    self.collect_generalizable_vars(m, env_level, out);
                }
            }
            Ty::TypeVal(inner) => self.collect_generalizable_vars(inner, env_level, out),
            Ty::Forall(forall) => self.collect_generalizable_vars(&forall.body, env_level, out),
        }
    }

    // ── Instantiation (spec.md §4.5 "Instantiation") ───────────────

    pub fn instantiate(&mut self, scheme: &Scheme) -> (Ty, Vec<Constraint>) {
        if scheme.vars.is_empty() {
            return (scheme.ty.clone(), scheme.constraints.clone());
        }
        let mut subst = crate::ty::Subst::new();
        for v in &scheme.vars {
            let kind = self.var_kind(*v);
            subst.insert(*v, self.fresh_var_kinded(kind));
        }
        let ty = scheme.ty.apply(&subst);
        let constraints = scheme.constraints.iter().map(|c| Constraint {
            trait_name: c.trait_name.clone(),
            args: c.args.iter().map(|a| a.apply(&subst)).collect(),
        }).collect();
        (ty, constraints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> ConstraintOrigin {
        ConstraintOrigin::Builtin
    }

    #[test]
    fn unify_var_with_concrete() {
        let mut ctx = InferCtx::new(AnalysisOptions::default());
        let a = ctx.fresh_var();
        assert!(ctx.unify(a.clone(), Ty::int(), origin()).is_ok());
        assert_eq!(ctx.resolve(a), Ty::int());
    }

    #[test]
    fn occurs_check_rejects_infinite_type() {
        let mut ctx = InferCtx::new(AnalysisOptions::default());
        let a = ctx.fresh_var();
        let fun = Ty::func(vec![a.clone()], Ty::int());
        assert!(matches!(ctx.unify(a, fun, origin()), Err(TypeError::InfiniteType { .. })));
    }

    #[test]
    fn row_open_record_permits_extra_fields() {
        let mut ctx = InferCtx::new(AnalysisOptions::default());
        let open = Ty::Record(TRecord { fields: vec![("x".into(), Ty::int())], open: true });
        let wide = Ty::Record(TRecord { fields: vec![("x".into(), Ty::int()), ("y".into(), Ty::int())], open: false });
        assert!(ctx.unify(open, wide, origin()).is_ok());
    }

    #[test]
    fn closed_record_rejects_extra_fields() {
        let mut ctx = InferCtx::new(AnalysisOptions::default());
        let closed = Ty::Record(TRecord { fields: vec![("x".into(), Ty::int())], open: false });
        let wide = Ty::Record(TRecord { fields: vec![("x".into(), Ty::int()), ("y".into(), Ty::int())], open: false });
        assert!(ctx.unify(closed, wide, origin()).is_err());
    }

    #[test]
    fn strict_union_requires_member_match() {
        let mut ctx = InferCtx::new(AnalysisOptions { strict_unions: true, ..AnalysisOptions::default() });
        let union = Ty::Union(vec![Ty::int(), Ty::string()]);
        assert!(ctx.unify(Ty::int(), union.clone(), origin()).is_ok());
        let mut ctx2 = InferCtx::new(AnalysisOptions { strict_unions: true, ..AnalysisOptions::default() });
        assert!(ctx2.unify(Ty::bool(), union, origin()).is_err());
    }

    #[test]
    fn permissive_union_allows_anything() {
        let mut ctx = InferCtx::new(AnalysisOptions { strict_unions: false, ..AnalysisOptions::default() });
        let union = Ty::Union(vec![Ty::int(), Ty::string()]);
        assert!(ctx.unify(Ty::bool(), union, origin()).is_ok());
    }

    #[test]
    fn variadic_tail_unifies_against_element_type() {
        let mut ctx = InferCtx::new(AnalysisOptions::default());
        let variadic = Ty::Func(TFunc { params: vec![Ty::int()], ret: Box::new(Ty::unit()), is_variadic: true, default_count: 0, constraints: vec![] });
        let call_site = Ty::Func(TFunc { params: vec![Ty::int(), Ty::int(), Ty::int()], ret: Box::new(Ty::unit()), is_variadic: false, default_count: 0, constraints: vec![] });
        assert!(ctx.unify(variadic, call_site, origin()).is_ok());
    }

    #[test]
    fn generalize_then_instantiate_produces_fresh_vars() {
        let mut ctx = InferCtx::new(AnalysisOptions::default());
        ctx.enter_level();
        let a = ctx.fresh_var();
        let id_ty = Ty::func(vec![a.clone()], a);
        ctx.leave_level();
        let scheme = ctx.generalize(id_ty, vec![], ctx.current_level());
        assert_eq!(scheme.vars.len(), 1);
        let (inst1, _) = ctx.instantiate(&scheme);
        let (inst2, _) = ctx.instantiate(&scheme);
        assert_ne!(inst1, inst2);
    }

    #[test]
    fn rank_n_forall_skolemizes_and_rejects_specialization() {
        let mut ctx = InferCtx::new(AnalysisOptions::default());
        let forall = Ty::Forall(Forall {
            vars: vec![TyVar(0)],
            constraints: vec![],
            body: Box::new(Ty::func(vec![Ty::Var(TyVar(0))], Ty::Var(TyVar(0)))),
        });
        // Unifying against a concrete Int -> Int function would require
        // specializing the skolem to Int, which must fail.
        let concrete = Ty::func(vec![Ty::int()], Ty::int());
        assert!(ctx.unify(forall, concrete, origin()).is_err());
    }
}
