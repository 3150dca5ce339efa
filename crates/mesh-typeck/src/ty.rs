//! Type representation for the Mesh type system (spec.md §3.2, §4.1).
//!
//! `Ty` is richer than a textbook HM type: besides variables, constructors,
//! applications and functions it carries row-polymorphic records, union
//! types, a first-class `TType` (the value of a type, used by `typeOf`),
//! and explicit `Forall` polytypes for rank-N positions. Flexible type
//! variables (`Ty::Var`) are unified through `ena`'s union-find table in
//! [`crate::unify::InferCtx`]; rigid (skolem) variables are represented,
//! per spec.md §4.4/§9, as an ordinary `TyCon` whose name starts with a
//! lowercase letter -- there is no separate "rigid" variant.

use std::cell::Cell;
use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::kind::Kind;

/// A flexible (unifiable) type variable, identified by a `u32` index into
/// the unification table. See module docs for how rigidity is represented
/// instead of as a variant of this type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TyVar(pub u32);

impl fmt::Display for TyVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

impl ena::unify::UnifyKey for TyVar {
    type Value = Option<Ty>;

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        TyVar(u)
    }

    fn tag() -> &'static str {
        "TyVar"
    }
}

impl ena::unify::EqUnifyValue for Ty {}

/// A named type constructor: `Int`, `Option`, or a user `Point` defined in
/// some module. Equality is by `(name, module)` (spec.md §4.4); `underlying`,
/// `type_params` and `kind` are structural bookkeeping, not identity.
#[derive(Clone, Debug)]
pub struct TyCon {
    pub name: String,
    /// The defining module, if this constructor was reached through a
    /// qualified reference (`m.T`) or belongs to a non-entry module.
    pub module: Option<String>,
    /// The structural form of a nominal alias, used by the resolver-aware
    /// unifier to expand aliases on demand (spec.md §4.4 "Constructors").
    pub underlying: Option<Box<Ty>>,
    /// Declared generic parameter names, for alias expansion.
    pub type_params: Vec<String>,
    pub kind: Kind,
}

impl TyCon {
    pub fn new(name: impl Into<String>, kind: Kind) -> Self {
        TyCon { name: name.into(), module: None, underlying: None, type_params: Vec::new(), kind }
    }

    pub fn simple(name: impl Into<String>) -> Self {
        Self::new(name, Kind::Star)
    }

    pub fn with_module(name: impl Into<String>, module: impl Into<String>, kind: Kind) -> Self {
        TyCon { name: name.into(), module: Some(module.into()), underlying: None, type_params: Vec::new(), kind }
    }

    /// A lowercase-named constructor is a rigid type variable (skolem),
    /// per spec.md §4.4 "Rigids" and §9 "Rigidity".
    pub fn is_rigid(&self) -> bool {
        self.name.chars().next().map(|c| c.is_lowercase()).unwrap_or(false)
    }
}

impl PartialEq for TyCon {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.module == other.module
    }
}
impl Eq for TyCon {}

impl std::hash::Hash for TyCon {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.module.hash(state);
    }
}

impl fmt::Display for TyCon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.module {
            Some(m) => write!(f, "{m}.{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A trait/class constraint: `Show a`, `Convert<a, b>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Constraint {
    pub trait_name: String,
    pub args: Vec<Ty>,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.trait_name)?;
        if !self.args.is_empty() {
            write!(f, "[{}]", self.args.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", "))?;
        }
        Ok(())
    }
}

/// A function type: params, return, and the qualified (trait-constrained)
/// part of its scheme (spec.md §3.2 `TFunc`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TFunc {
    pub params: Vec<Ty>,
    pub ret: Box<Ty>,
    pub is_variadic: bool,
    pub default_count: usize,
    pub constraints: Vec<Constraint>,
}

/// A structural record type; `open` permits width subtyping during
/// unification (spec.md §4.4 "Records", §9 "Row polymorphism").
#[derive(Clone, Debug)]
pub struct TRecord {
    pub fields: Vec<(String, Ty)>,
    pub open: bool,
}

impl TRecord {
    pub fn field(&self, name: &str) -> Option<&Ty> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }
}

impl PartialEq for TRecord {
    fn eq(&self, other: &Self) -> bool {
        self.open == other.open && self.as_map() == other.as_map()
    }
}
impl Eq for TRecord {}
impl std::hash::Hash for TRecord {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.open.hash(state);
        let mut names: Vec<&String> = self.fields.iter().map(|(n, _)| n).collect();
        names.sort();
        for n in names {
            n.hash(state);
        }
    }
}

impl TRecord {
    fn as_map(&self) -> FxHashMap<&String, &Ty> {
        self.fields.iter().map(|(n, t)| (n, t)).collect()
    }
}

/// A polytype quantified over `vars`, possibly constrained, used directly
/// as a `Ty` so it can appear in argument/rank-N positions (spec.md §3.2
/// `TForall`, §4.5 "Rank-N").
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Forall {
    pub vars: Vec<TyVar>,
    pub constraints: Vec<Constraint>,
    pub body: Box<Ty>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    /// A flexible (unifiable) inference variable.
    Var(TyVar),
    /// A concrete (or rigid, if lowercase-named) type constructor.
    Con(TyCon),
    /// A type constructor applied to arguments: `Option<Int>`.
    ///
    /// Kept flattened: `App(App(C, [a]), [b])` normalizes to
    /// `App(C, [a, b])` on construction (spec.md §4.1 "Flattening").
    App(Box<Ty>, Vec<Ty>),
    Func(TFunc),
    Tuple(Vec<Ty>),
    Record(TRecord),
    /// A union of member types; callers decide strict/open semantics via
    /// `AnalysisOptions` rather than a flag on the type itself, since the
    /// same union may be checked in strict or permissive contexts
    /// depending on where it flows (spec.md §4.4 "Unions").
    Union(Vec<Ty>),
    /// `TType` -- a type used as a value, e.g. the second argument to
    /// `typeOf(v, T)`.
    TypeVal(Box<Ty>),
    Forall(Forall),
    /// The bottom type: the type of `break`/`return`/`panic` expressions.
    Never,
}

impl Ty {
    pub fn int() -> Ty { Ty::Con(TyCon::simple("Int")) }
    pub fn float() -> Ty { Ty::Con(TyCon::simple("Float")) }
    pub fn bool() -> Ty { Ty::Con(TyCon::simple("Bool")) }
    pub fn char_ty() -> Ty { Ty::Con(TyCon::simple("Char")) }
    pub fn big_int() -> Ty { Ty::Con(TyCon::simple("BigInt")) }
    pub fn rational() -> Ty { Ty::Con(TyCon::simple("Rational")) }
    pub fn unit() -> Ty { Ty::Tuple(Vec::new()) }

    /// `String = List<Char>` (spec.md §6 "Built-in surface").
    pub fn string() -> Ty {
        Ty::list(Ty::char_ty())
    }

    pub fn list(elem: Ty) -> Ty {
        Ty::App(Box::new(Ty::Con(TyCon::new("List", Kind::arrows(vec![Kind::Star, Kind::Star])))), vec![elem])
    }

    pub fn option(inner: Ty) -> Ty {
        Ty::App(Box::new(Ty::Con(TyCon::new("Option", Kind::arrows(vec![Kind::Star, Kind::Star])))), vec![inner])
    }

    pub fn result(ok: Ty, err: Ty) -> Ty {
        Ty::App(
            Box::new(Ty::Con(TyCon::new("Result", Kind::arrows(vec![Kind::Star, Kind::Star, Kind::Star])))),
            vec![ok, err],
        )
    }

    pub fn map(key: Ty, value: Ty) -> Ty {
        Ty::App(
            Box::new(Ty::Con(TyCon::new("Map", Kind::arrows(vec![Kind::Star, Kind::Star, Kind::Star])))),
            vec![key, value],
        )
    }

    pub fn func(params: Vec<Ty>, ret: Ty) -> Ty {
        Ty::Func(TFunc { params, ret: Box::new(ret), is_variadic: false, default_count: 0, constraints: Vec::new() })
    }

    /// Construct a flattened application (spec.md §4.1 "Flattening").
    pub fn app(con: Ty, mut args: Vec<Ty>) -> Ty {
        if args.is_empty() {
            return con;
        }
        match con {
            Ty::App(inner_con, mut inner_args) => {
                inner_args.append(&mut args);
                Ty::App(inner_con, inner_args)
            }
            other => Ty::App(Box::new(other), args),
        }
    }

    pub fn is_never(&self) -> bool {
        matches!(self, Ty::Never)
    }

    /// Normalize a union: flatten nested unions, absorb `Never`, dedup,
    /// and collapse a singleton to its sole member (spec.md §3.2 `TUnion`
    /// "normalisation eliminates duplicates and absorbs Never").
    pub fn union_of(members: Vec<Ty>) -> Ty {
        let mut flat: Vec<Ty> = Vec::new();
        for m in members {
            match m {
                Ty::Union(inner) => flat.extend(inner),
                Ty::Never => {}
                other => flat.push(other),
            }
        }
        let mut deduped: Vec<Ty> = Vec::new();
        for m in flat {
            if !deduped.contains(&m) {
                deduped.push(m);
            }
        }
        match deduped.len() {
            0 => Ty::Never,
            1 => deduped.into_iter().next().unwrap(),
            _ => Ty::Union(deduped),
        }
    }

    /// Free (flexible) type variables, in order of first appearance.
    pub fn free_type_vars(&self) -> Vec<TyVar> {
        let mut out = Vec::new();
        let mut seen = FxHashSet::default();
        self.collect_free_vars(&mut out, &mut seen);
        out
    }

    fn collect_free_vars(&self, out: &mut Vec<TyVar>, seen: &mut FxHashSet<TyVar>) {
        match self {
            Ty::Var(v) => {
                if seen.insert(*v) {
                    out.push(*v);
                }
            }
            Ty::Con(_) | Ty::Never => {}
            Ty::App(con, args) => {
                con.collect_free_vars(out, seen);
                for a in args {
                    a.collect_free_vars(out, seen);
                }
            }
            Ty::Func(f) => {
                for p in &f.params {
                    p.collect_free_vars(out, seen);
                }
                f.ret.collect_free_vars(out, seen);
                for c in &f.constraints {
                    for a in &c.args {
                        a.collect_free_vars(out, seen);
                    }
                }
            }
            Ty::Tuple(elems) => {
                for e in elems {
                    e.collect_free_vars(out, seen);
                }
            }
            Ty::Record(r) => {
                for (_, t) in &r.fields {
                    t.collect_free_vars(out, seen);
                }
            }
            Ty::Union(members) => {
                for m in members {
                    m.collect_free_vars(out, seen);
                }
            }
            Ty::TypeVal(t) => t.collect_free_vars(out, seen),
            Ty::Forall(forall) => {
                let mut inner = Vec::new();
                let mut inner_seen = FxHashSet::default();
                forall.body.collect_free_vars(&mut inner, &mut inner_seen);
                for c in &forall.constraints {
                    for a in &c.args {
                        a.collect_free_vars(&mut inner, &mut inner_seen);
                    }
                }
                for v in inner {
                    if !forall.vars.contains(&v) && seen.insert(v) {
                        out.push(v);
                    }
                }
            }
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Var(v) => write!(f, "{v}"),
            Ty::Con(c) => write!(f, "{c}"),
            Ty::App(con, args) => {
                write!(f, "{con}")?;
                if !args.is_empty() {
                    write!(f, "<{}>", args.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", "))?;
                }
                Ok(())
            }
            Ty::Func(func) => {
                write!(f, "(")?;
                for (i, p) in func.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                if func.is_variadic {
                    write!(f, "...")?;
                }
                write!(f, ") -> {}", func.ret)?;
                if !func.constraints.is_empty() {
                    write!(f, " where {}", func.constraints.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(", "))?;
                }
                Ok(())
            }
            Ty::Tuple(elems) => {
                write!(f, "(")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, ")")
            }
            Ty::Record(r) => {
                write!(f, "{{")?;
                for (i, (name, ty)) in r.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {ty}")?;
                }
                if r.open {
                    write!(f, "{}..", if r.fields.is_empty() { "" } else { ", " })?;
                }
                write!(f, "}}")
            }
            Ty::Union(members) => {
                write!(f, "{}", members.iter().map(|m| m.to_string()).collect::<Vec<_>>().join(" | "))
            }
            Ty::TypeVal(inner) => write!(f, "Type[{inner}]"),
            Ty::Forall(forall) => {
                write!(f, "forall {}", forall.vars.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" "))?;
                if !forall.constraints.is_empty() {
                    write!(f, " ({})", forall.constraints.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(", "))?;
                }
                write!(f, ". {}", forall.body)
            }
            Ty::Never => write!(f, "Never"),
        }
    }
}

/// A polymorphic type scheme: `forall a1..an. Q => ty`, where `Q` is the
/// constraint list (spec.md GLOSSARY "Scheme / polytype"). Unlike
/// [`Forall`] (a `Ty` variant used for rank-N argument positions), a
/// `Scheme` is the top-level type recorded for a symbol in the symbol
/// table; it is instantiated on every reference.
#[derive(Clone, Debug)]
pub struct Scheme {
    pub vars: Vec<TyVar>,
    pub constraints: Vec<Constraint>,
    pub ty: Ty,
}

impl Scheme {
    pub fn mono(ty: Ty) -> Self {
        Scheme { vars: Vec::new(), constraints: Vec::new(), ty }
    }

    pub fn is_polymorphic(&self) -> bool {
        !self.vars.is_empty()
    }
}

/// A substitution: a finite mapping from flexible type-variable id to
/// type (spec.md §3.3). `apply` is pure term substitution and alpha-
/// renames `Forall` binders on every descent to guarantee it can never
/// capture a quantified variable (spec.md §4.1, §8 "No TForall has a
/// capture-colliding substitution").
#[derive(Clone, Debug, Default)]
pub struct Subst {
    bindings: FxHashMap<TyVar, Ty>,
    fresh_ceiling: Cell<u32>,
}

impl Subst {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn singleton(var: TyVar, ty: Ty) -> Self {
        let mut s = Self::new();
        s.insert(var, ty);
        s
    }

    pub fn insert(&mut self, var: TyVar, ty: Ty) {
        self.fresh_ceiling.set(self.fresh_ceiling.get().max(var.0 + 1));
        self.bindings.insert(var, ty);
    }

    pub fn get(&self, var: TyVar) -> Option<&Ty> {
        self.bindings.get(&var)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// `s2.compose(s1)` computes `s2 ∘ s1`: apply `s2` to every value of
    /// `s1`, then union with `s2` -- keys of `s1` take precedence over a
    /// raw `s2` entry for the same key (spec.md §3.3).
    pub fn compose(&self, s1: &Subst) -> Subst {
        let mut result = Subst::new();
        for (k, v) in &s1.bindings {
            result.insert(*k, v.apply(self));
        }
        for (k, v) in &self.bindings {
            result.bindings.entry(*k).or_insert_with(|| v.clone());
        }
        result.fresh_ceiling.set(self.fresh_ceiling.get().max(s1.fresh_ceiling.get()).max(result.fresh_ceiling.get()));
        result
    }

    fn fresh(&self) -> TyVar {
        let id = self.fresh_ceiling.get();
        self.fresh_ceiling.set(id + 1);
        TyVar(id)
    }
}

impl Ty {
    pub fn apply(&self, subst: &Subst) -> Ty {
        if subst.is_empty() {
            return self.clone();
        }
        match self {
            Ty::Var(v) => match subst.get(*v) {
                Some(replacement) => replacement.apply(subst),
                None => self.clone(),
            },
            Ty::Con(_) | Ty::Never => self.clone(),
            Ty::App(con, args) => Ty::App(Box::new(con.apply(subst)), args.iter().map(|a| a.apply(subst)).collect()),
            Ty::Func(func) => Ty::Func(TFunc {
                params: func.params.iter().map(|p| p.apply(subst)).collect(),
                ret: Box::new(func.ret.apply(subst)),
                is_variadic: func.is_variadic,
                default_count: func.default_count,
                constraints: func.constraints.iter().map(|c| apply_constraint(c, subst)).collect(),
            }),
            Ty::Tuple(elems) => Ty::Tuple(elems.iter().map(|e| e.apply(subst)).collect()),
            Ty::Record(r) => Ty::Record(TRecord {
                fields: r.fields.iter().map(|(n, t)| (n.clone(), t.apply(subst))).collect(),
                open: r.open,
            }),
            Ty::Union(members) => Ty::union_of(members.iter().map(|m| m.apply(subst)).collect()),
            Ty::TypeVal(inner) => Ty::TypeVal(Box::new(inner.apply(subst))),
            Ty::Forall(forall) => {
                // Always alpha-rename on descent: simplest rule that can
                // never let a quantified variable be captured by the
                // substitution's range (spec.md §8 invariant).
                let mut rename = Subst::new();
                let mut new_vars = Vec::with_capacity(forall.vars.len());
                for v in &forall.vars {
                    let fresh = subst.fresh();
                    rename.insert(*v, Ty::Var(fresh));
                    new_vars.push(fresh);
                }
                let renamed_body = forall.body.apply(&rename);
                let renamed_constraints: Vec<Constraint> =
                    forall.constraints.iter().map(|c| apply_constraint(c, &rename)).collect();
                Ty::Forall(Forall {
                    vars: new_vars,
                    constraints: renamed_constraints.iter().map(|c| apply_constraint(c, subst)).collect(),
                    body: Box::new(renamed_body.apply(subst)),
                })
            }
        }
    }
}

fn apply_constraint(c: &Constraint, subst: &Subst) -> Constraint {
    Constraint { trait_name: c.trait_name.clone(), args: c.args.iter().map(|a| a.apply(subst)).collect() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_function_and_app() {
        assert_eq!(Ty::func(vec![Ty::int(), Ty::string()], Ty::bool()).to_string(), "(Int, List<Char>) -> Bool");
        assert_eq!(Ty::option(Ty::int()).to_string(), "Option<Int>");
    }

    #[test]
    fn flatten_nested_app() {
        let inner = Ty::app(Ty::Con(TyCon::simple("Map")), vec![Ty::int()]);
        let flattened = Ty::app(inner, vec![Ty::string()]);
        match flattened {
            Ty::App(con, args) => {
                assert_eq!(*con, Ty::Con(TyCon::simple("Map")));
                assert_eq!(args, vec![Ty::int(), Ty::string()]);
            }
            other => panic!("expected App, got {other:?}"),
        }
    }

    #[test]
    fn union_of_dedups_and_absorbs_never() {
        let u = Ty::union_of(vec![Ty::int(), Ty::Never, Ty::int(), Ty::string()]);
        assert_eq!(u, Ty::Union(vec![Ty::int(), Ty::string()]));
        assert_eq!(Ty::union_of(vec![Ty::int()]), Ty::int());
    }

    #[test]
    fn rigid_detection_by_case() {
        assert!(TyCon::simple("a").is_rigid());
        assert!(!TyCon::simple("Int").is_rigid());
    }

    #[test]
    fn tycon_identity_ignores_underlying() {
        let mut aliased = TyCon::simple("Meters");
        aliased.underlying = Some(Box::new(Ty::float()));
        assert_eq!(aliased, TyCon::simple("Meters"));
    }

    #[test]
    fn apply_substitutes_var() {
        let subst = Subst::singleton(TyVar(0), Ty::int());
        assert_eq!(Ty::Var(TyVar(0)).apply(&subst), Ty::int());
    }

    #[test]
    fn compose_prefers_s1_keys_after_applying_s2() {
        // s1: 0 -> Var(1); s2: 1 -> Int, 0 -> String
        let mut s1 = Subst::new();
        s1.insert(TyVar(0), Ty::Var(TyVar(1)));
        let mut s2 = Subst::new();
        s2.insert(TyVar(1), Ty::int());
        s2.insert(TyVar(0), Ty::string());

        let composed = s2.compose(&s1);
        // key 0 comes from s1 (Var(1)), then s2 applied to it -> Int.
        assert_eq!(composed.get(TyVar(0)), Some(&Ty::int()));
        assert_eq!(composed.get(TyVar(1)), Some(&Ty::int()));
    }

    #[test]
    fn apply_renames_forall_binder_to_avoid_capture() {
        // forall a. a -> ?0   with subst { ?0 -> a (some outer var id 5) }
        // Naive substitution without alpha-renaming would let the outer
        // var be captured by the forall's own quantifier.
        let forall = Ty::Forall(Forall {
            vars: vec![TyVar(0)],
            constraints: vec![],
            body: Box::new(Ty::func(vec![Ty::Var(TyVar(0))], Ty::Var(TyVar(99)))),
        });
        let subst = Subst::singleton(TyVar(99), Ty::Var(TyVar(0)));
        let result = forall.apply(&subst);
        match result {
            Ty::Forall(f) => {
                assert_ne!(f.vars[0], TyVar(0), "binder must be renamed");
                // the body's return type must reference the *original*
                // var 0 (renamed-subst range), not the fresh binder.
                if let Ty::Func(func) = f.body.as_ref() {
                    assert_eq!(*func.ret, Ty::Var(TyVar(0)));
                    assert_eq!(func.params[0], Ty::Var(f.vars[0]));
                } else {
                    panic!("expected function body");
                }
            }
            other => panic!("expected Forall, got {other:?}"),
        }
    }
}
