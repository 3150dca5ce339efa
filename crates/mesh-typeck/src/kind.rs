//! Kinds -- the "type of a type" (spec.md §3.1, §4.1).
//!
//! A small Hindley-Milner-style kind checker: `Star` for proper types,
//! `Arrow` for type-constructor kinds, and `Var` as an inference variable
//! used only while a type's kind is being computed. Unlike `TyVar` in
//! [`crate::ty`], kind variables are not threaded through `ena` -- kind
//! inference is local to a single type annotation and short-lived, so a
//! plain substitution map is enough.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::error::TypeError;

pub type KindVarId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Kind {
    /// The kind of proper types: `Int`, `Option<Int>`.
    Star,
    /// The kind of a type constructor: `f :: Star -> Star` for `Option`.
    Arrow(Box<Kind>, Box<Kind>),
    /// An inference variable, resolved by [`KindSubst`].
    Var(KindVarId),
}

impl Kind {
    /// Right-associate a chain of kinds into arrows: `[Star, Star, Star]`
    /// becomes `Star -> (Star -> Star)` (spec.md §3.1 "A helper constructs
    /// right-associated arrows from a list").
    pub fn arrows(mut kinds: Vec<Kind>) -> Kind {
        let last = kinds.pop().expect("arrows() requires at least one kind");
        kinds.into_iter().rev().fold(last, |acc, k| Kind::Arrow(Box::new(k), Box::new(acc)))
    }

    pub fn arity(&self) -> usize {
        match self {
            Kind::Arrow(_, rest) => 1 + rest.arity(),
            _ => 0,
        }
    }

    pub fn apply(&self, subst: &KindSubst) -> Kind {
        match self {
            Kind::Star => Kind::Star,
            Kind::Arrow(from, to) => Kind::Arrow(Box::new(from.apply(subst)), Box::new(to.apply(subst))),
            Kind::Var(id) => match subst.get(*id) {
                Some(k) => k.apply(subst),
                None => Kind::Var(*id),
            },
        }
    }

    fn occurs(&self, id: KindVarId, subst: &KindSubst) -> bool {
        match self.apply(subst) {
            Kind::Star => false,
            Kind::Arrow(from, to) => from.occurs(id, subst) || to.occurs(id, subst),
            Kind::Var(v) => v == id,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Star => write!(f, "Star"),
            Kind::Arrow(from, to) => write!(f, "({from} -> {to})"),
            Kind::Var(id) => write!(f, "?k{id}"),
        }
    }
}

/// A substitution from kind-variable id to kind, composed incrementally
/// during kind inference (spec.md §4.1 "Kind inference").
#[derive(Debug, Default, Clone)]
pub struct KindSubst {
    bindings: FxHashMap<KindVarId, Kind>,
    next_var: KindVarId,
}

impl KindSubst {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh_var(&mut self) -> Kind {
        let id = self.next_var;
        self.next_var += 1;
        Kind::Var(id)
    }

    pub fn get(&self, id: KindVarId) -> Option<&Kind> {
        self.bindings.get(&id)
    }

    fn bind(&mut self, id: KindVarId, kind: Kind) {
        self.bindings.insert(id, kind);
    }

    /// Unify two kinds, extending `self` in place.
    ///
    /// `Star = Star`; `Arrow` structurally; `Var` binds after an occurs
    /// check (spec.md §4.1).
    pub fn unify(&mut self, a: &Kind, b: &Kind) -> Result<(), TypeError> {
        let a = a.apply(self);
        let b = b.apply(self);
        match (&a, &b) {
            (Kind::Star, Kind::Star) => Ok(()),
            (Kind::Var(v1), Kind::Var(v2)) if v1 == v2 => Ok(()),
            (Kind::Var(v), other) | (other, Kind::Var(v)) => {
                if other.occurs(*v, self) {
                    return Err(TypeError::KindMismatch { expected: a.clone(), found: b.clone() });
                }
                self.bind(*v, other.clone());
                Ok(())
            }
            (Kind::Arrow(f1, t1), Kind::Arrow(f2, t2)) => {
                self.unify(f1, f2)?;
                self.unify(t1, t2)
            }
            _ => Err(TypeError::KindMismatch { expected: a, found: b }),
        }
    }

    /// Default every still-unresolved kind variable to `Star` (spec.md
    /// §4.1 "Unresolved kind-variables default to Star on exit").
    pub fn finish(&self, kind: &Kind) -> Kind {
        match kind.apply(self) {
            Kind::Var(_) => Kind::Star,
            Kind::Star => Kind::Star,
            Kind::Arrow(from, to) => Kind::Arrow(Box::new(self.finish(&from)), Box::new(self.finish(&to))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrows_right_associates() {
        let k = Kind::arrows(vec![Kind::Star, Kind::Star, Kind::Star]);
        assert_eq!(k, Kind::Arrow(Box::new(Kind::Star), Box::new(Kind::Arrow(Box::new(Kind::Star), Box::new(Kind::Star)))));
        assert_eq!(k.arity(), 2);
    }

    #[test]
    fn unify_var_binds_then_defaults_to_star() {
        let mut subst = KindSubst::new();
        let v = subst.fresh_var();
        subst.unify(&v, &Kind::Star).unwrap();
        assert_eq!(v.apply(&subst), Kind::Star);

        let mut subst2 = KindSubst::new();
        let unresolved = subst2.fresh_var();
        assert_eq!(subst2.finish(&unresolved), Kind::Star);
    }

    #[test]
    fn occurs_check_rejects_self_reference() {
        let mut subst = KindSubst::new();
        let v = subst.fresh_var();
        let arrow = Kind::Arrow(Box::new(v.clone()), Box::new(Kind::Star));
        assert!(subst.unify(&v, &arrow).is_err());
    }

    #[test]
    fn mismatched_arity_is_an_error() {
        let mut subst = KindSubst::new();
        let arrow1 = Kind::Arrow(Box::new(Kind::Star), Box::new(Kind::Star));
        assert!(subst.unify(&Kind::Star, &arrow1).is_err());
    }
}
