//! Trait registry: definitions, instance registration, functional
//! dependencies, and dictionary-passing witness resolution (spec.md §4.3).
//!
//! Directly generalizes the teacher's `TraitRegistry` (single-type-
//! argument `impl Trait for Type`, structural matching via temporary
//! unification) to multi-parameter traits (`args: Vec<Ty>` instead of one
//! `impl_type`), super-traits, and functional dependencies. Overlap
//! rejection keeps the teacher's "duplicate impl" check but renames it
//! `OverlappingInstance` and applies it eagerly at registration time,
//! per SPEC_FULL.md §11's resolved open question.

use rustc_hash::FxHashMap;

use crate::error::{ConstraintOrigin, TypeError};
use crate::options::AnalysisOptions;
use crate::ty::{Constraint, Scheme, Ty};
use crate::unify::InferCtx;

#[derive(Clone, Debug)]
pub struct TraitMethodSig {
    pub name: String,
    pub param_types: Vec<Ty>,
    pub return_type: Ty,
    pub has_default_body: bool,
}

/// `trait Convert<a, b, c> | a b -> c` (spec.md §4.3 "Functional
/// dependencies"): `determining` are the parameters that fix
/// `determined`.
#[derive(Clone, Debug)]
pub struct FunDep {
    pub determining: Vec<String>,
    pub determined: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct TraitDef {
    pub name: String,
    pub type_params: Vec<String>,
    pub super_traits: Vec<Constraint>,
    pub fundeps: Vec<FunDep>,
    pub methods: Vec<TraitMethodSig>,
}

impl TraitDef {
    /// spec.md §4.3 "Coverage": every variable named by a functional
    /// dependency (on either side) must be one of the trait's own type
    /// parameters.
    pub fn check_fundep_coverage(&self) -> Vec<TypeError> {
        let mut errors = Vec::new();
        for dep in &self.fundeps {
            for var in dep.determining.iter().chain(&dep.determined) {
                if !self.type_params.iter().any(|p| p == var) {
                    errors.push(TypeError::UnknownFunDepVariable {
                        trait_name: self.name.clone(),
                        var: var.clone(),
                        span: mesh_common::Span::synthetic(),
                    });
                }
            }
        }
        errors
    }
}

#[derive(Clone, Debug)]
pub struct ImplMethodSig {
    pub param_types: Vec<Ty>,
    pub return_type: Ty,
}

/// One registered instance: `instance Trait[arg1, arg2] for ...` (spec.md
/// §4.3). Generalizes the teacher's single `impl_type` to a full argument
/// vector so multi-parameter traits are handled uniformly.
#[derive(Clone, Debug)]
pub struct ImplDef {
    pub trait_name: String,
    pub args: Vec<Ty>,
    pub args_display: String,
    pub methods: FxHashMap<String, ImplMethodSig>,
    /// Name of the synthesized dictionary value, e.g. `$impl_Show_Point`
    /// (spec.md §4.3 "Evidence synthesis").
    pub evidence_name: String,
}

#[derive(Default)]
pub struct TraitRegistry {
    traits: FxHashMap<String, TraitDef>,
    impls: FxHashMap<String, Vec<ImplDef>>,
}

impl TraitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a trait definition, returning any functional-dependency
    /// coverage errors immediately (spec.md §4.3).
    pub fn register_trait(&mut self, def: TraitDef) -> Vec<TypeError> {
        let errors = def.check_fundep_coverage();
        self.traits.insert(def.name.clone(), def);
        errors
    }

    pub fn get_trait(&self, name: &str) -> Option<&TraitDef> {
        self.traits.get(name)
    }

    pub fn trait_defs(&self) -> impl Iterator<Item = &TraitDef> {
        self.traits.values()
    }

    pub fn all_impls(&self) -> impl Iterator<Item = &ImplDef> {
        self.impls.values().flat_map(|v| v.iter())
    }

    /// Register an instance. Checks required methods, super-trait
    /// satisfaction, functional-dependency consistency, and structural
    /// overlap against every previously registered instance of the same
    /// trait, in that order, collecting every violation found (spec.md
    /// §4.3 "Registering an instance", §9 "Overlap").
    pub fn register_impl(&mut self, impl_def: ImplDef) -> Vec<TypeError> {
        log::debug!("registering instance {} for {}", impl_def.trait_name, impl_def.args_display);
        let mut errors = Vec::new();

        if let Some(trait_def) = self.traits.get(&impl_def.trait_name).cloned() {
            for method in &trait_def.methods {
                match impl_def.methods.get(&method.name) {
                    None if !method.has_default_body => {
                        errors.push(TypeError::MissingTraitMethod {
                            trait_name: impl_def.trait_name.clone(),
                            method_name: method.name.clone(),
                            impl_ty: impl_def.args_display.clone(),
                        });
                    }
                    Some(found) => {
                        if method.return_type != found.return_type && !ty_mentions_trait_param(&method.return_type, &trait_def.type_params) {
                            errors.push(TypeError::TraitMethodSignatureMismatch {
                                trait_name: impl_def.trait_name.clone(),
                                method_name: method.name.clone(),
                                expected: method.return_type.clone(),
                                found: found.return_type.clone(),
                            });
                        }
                    }
                    None => {}
                }
            }

            for super_constraint in &trait_def.super_traits {
                if !self.instance_exists(&super_constraint.trait_name, &impl_def.args) {
                    errors.push(TypeError::MissingSuperTrait {
                        trait_name: impl_def.trait_name.clone(),
                        super_trait: super_constraint.trait_name.clone(),
                        impl_ty: impl_def.args_display.clone(),
                    });
                }
            }

            errors.extend(self.check_fundep_consistency(&trait_def, &impl_def));
        }

        if let Some(overlap) = self.find_overlap(&impl_def) {
            log::debug!("instance {} for {} overlaps existing instance for {overlap}", impl_def.trait_name, impl_def.args_display);
            errors.push(TypeError::OverlappingInstance {
                trait_name: impl_def.trait_name.clone(),
                impl_type: format!("{} (already defined for `{}`)", impl_def.args_display, overlap),
            });
        }

        let maybe_into = impl_def.trait_name == "From" && impl_def.args.len() == 1;
        let into_source = maybe_into.then(|| impl_def.args[0].clone());

        self.impls.entry(impl_def.trait_name.clone()).or_default().push(impl_def.clone());

        if let Some(source_ty) = into_source {
            // `From`'s implementing type is recorded as the `from`
            // constructor's return type by convention, falling back to
            // the source type if unavailable.
            let target_ty = impl_def.methods.get("from").map(|m| m.return_type.clone()).unwrap_or_else(|| source_ty.clone());
            let mut into_methods = FxHashMap::default();
            into_methods.insert(
                "into".to_string(),
                ImplMethodSig { param_types: vec![], return_type: target_ty.clone() },
            );
            self.impls.entry("Into".to_string()).or_default().push(ImplDef {
                trait_name: "Into".to_string(),
                args: vec![source_ty.clone()],
                args_display: source_ty.to_string(),
                methods: into_methods,
                evidence_name: format!("$impl_Into_{source_ty}"),
            });
        }

        errors
    }

    fn instance_exists(&self, trait_name: &str, args: &[Ty]) -> bool {
        self.find_impl(trait_name, args).is_some()
    }

    /// spec.md §4.3 "Consistency": two instances may not agree on the
    /// determining arguments while disagreeing on the determined ones.
    fn check_fundep_consistency(&self, trait_def: &TraitDef, new_impl: &ImplDef) -> Vec<TypeError> {
        let mut errors = Vec::new();
        let Some(existing) = self.impls.get(&trait_def.name) else { return errors };
        for dep in &trait_def.fundeps {
            let determining_idx: Vec<usize> = dep.determining.iter().filter_map(|v| trait_def.type_params.iter().position(|p| p == v)).collect();
            let determined_idx: Vec<usize> = dep.determined.iter().filter_map(|v| trait_def.type_params.iter().position(|p| p == v)).collect();
            for other in existing {
                let mut ctx = InferCtx::new(AnalysisOptions::default());
                let determining_match = determining_idx.iter().all(|&i| {
                    i < new_impl.args.len() && i < other.args.len()
                        && ctx.unify(new_impl.args[i].clone(), other.args[i].clone(), ConstraintOrigin::Builtin).is_ok()
                });
                if !determining_match {
                    continue;
                }
                let determined_match = determined_idx.iter().all(|&i| {
                    i < new_impl.args.len() && i < other.args.len()
                        && new_impl.args[i] == other.args[i]
                });
                if !determined_match {
                    errors.push(TypeError::FunctionalDependencyViolation {
                        trait_name: trait_def.name.clone(),
                        reason: format!(
                            "`{}` and `{}` agree on the determining parameters but disagree on the determined ones",
                            new_impl.args_display, other.args_display
                        ),
                    });
                }
            }
        }
        errors
    }

    fn find_overlap(&self, impl_def: &ImplDef) -> Option<String> {
        let existing = self.impls.get(&impl_def.trait_name)?;
        for other in existing {
            if other.args.len() != impl_def.args.len() {
                continue;
            }
            let mut ctx = InferCtx::new(AnalysisOptions::default());
            let all_unify = impl_def.args.iter().zip(&other.args).all(|(a, b)| {
                let fa = freshen_type_params(a, &mut ctx);
                let fb = freshen_type_params(b, &mut ctx);
                ctx.unify(fa, fb, ConstraintOrigin::Builtin).is_ok()
            });
            if all_unify {
                return Some(other.args_display.clone());
            }
        }
        None
    }

    pub fn has_impl(&self, trait_name: &str, args: &[Ty]) -> bool {
        self.find_impl(trait_name, args).is_some()
    }

    /// Find a registered instance whose (freshened) arguments unify with
    /// the query arguments, used both for constraint satisfaction checks
    /// and as the dictionary-passing witness lookup (spec.md §4.3
    /// "Resolution").
    pub fn find_impl(&self, trait_name: &str, args: &[Ty]) -> Option<&ImplDef> {
        let impls = self.impls.get(trait_name)?;
        impls.iter().find(|impl_def| {
            if impl_def.args.len() != args.len() {
                return false;
            }
            let mut ctx = InferCtx::new(AnalysisOptions::default());
            impl_def.args.iter().zip(args).all(|(stored, query)| {
                let freshened = freshen_type_params(stored, &mut ctx);
                ctx.unify(freshened, query.clone(), ConstraintOrigin::Builtin).is_ok()
            })
        })
    }

    /// Resolve the dictionary-passing witness for a constraint, walking
    /// super-trait chains breadth-first when `trait_name` has no direct
    /// instance but a super-trait relationship supplies one transitively
    /// (spec.md §4.3 "Witness resolution", "Super-trait chaining").
    pub fn resolve_witness(&self, constraint: &Constraint) -> Result<&str, TypeError> {
        if let Some(impl_def) = self.find_impl(&constraint.trait_name, &constraint.args) {
            log::trace!("witness for {}: direct instance {}", constraint.trait_name, impl_def.evidence_name);
            return Ok(&impl_def.evidence_name);
        }
        let mut queue: Vec<String> = self
            .get_trait(&constraint.trait_name)
            .map(|t| t.super_traits.iter().map(|c| c.trait_name.clone()).collect())
            .unwrap_or_default();
        let mut visited = std::collections::HashSet::new();
        while let Some(super_name) = queue.pop() {
            if !visited.insert(super_name.clone()) {
                continue;
            }
            if let Some(impl_def) = self.find_impl(&super_name, &constraint.args) {
                log::trace!("witness for {}: via super-trait {super_name} instance {}", constraint.trait_name, impl_def.evidence_name);
                return Ok(&impl_def.evidence_name);
            }
            if let Some(def) = self.get_trait(&super_name) {
                queue.extend(def.super_traits.iter().map(|c| c.trait_name.clone()));
            }
        }
        log::debug!("witness for {} over {:?}: unresolved", constraint.trait_name, constraint.args);
        Err(TypeError::UnresolvedWitness {
            trait_name: constraint.trait_name.clone(),
            args: constraint.args.clone(),
            span: mesh_common::Span::synthetic(),
        })
    }

    /// Every trait that provides `method_name` and has an instance
    /// structurally matching `self_ty` as its first argument, sorted for
    /// determinism. More than one candidate means the call site is
    /// ambiguous (spec.md §4.3 "Ambiguous methods").
    pub fn find_method_traits(&self, method_name: &str, self_ty: &Ty) -> Vec<String> {
        let mut names = Vec::new();
        for (trait_name, impls) in &self.impls {
            for impl_def in impls {
                if !impl_def.methods.contains_key(method_name) {
                    continue;
                }
                let Some(first) = impl_def.args.first() else { continue };
                let mut ctx = InferCtx::new(AnalysisOptions::default());
                let freshened = freshen_type_params(first, &mut ctx);
                if ctx.unify(freshened, self_ty.clone(), ConstraintOrigin::Builtin).is_ok() {
                    names.push(trait_name.clone());
                    break;
                }
            }
        }
        names.sort();
        names
    }

    pub fn resolve_method(&self, method_name: &str, self_ty: &Ty) -> Option<ImplMethodSig> {
        for impls in self.impls.values() {
            for impl_def in impls {
                let Some(first) = impl_def.args.first() else { continue };
                let mut ctx = InferCtx::new(AnalysisOptions::default());
                let freshened = freshen_type_params(first, &mut ctx);
                if ctx.unify(freshened, self_ty.clone(), ConstraintOrigin::Builtin).is_ok() {
                    if let Some(sig) = impl_def.methods.get(method_name) {
                        return Some(ImplMethodSig { param_types: sig.param_types.clone(), return_type: ctx.resolve(sig.return_type.clone()) });
                    }
                }
            }
        }
        None
    }
}

/// True if a type expression mentions any of the trait's own type
/// parameters -- used to skip a too-strict return-type comparison for
/// methods whose signature depends on the instance (`Self`-like
/// positions), mirroring the teacher's `ty_contains_self` check.
fn ty_mentions_trait_param(ty: &Ty, params: &[String]) -> bool {
    match ty {
        Ty::Con(c) => params.iter().any(|p| p == &c.name),
        Ty::App(con, args) => ty_mentions_trait_param(con, params) || args.iter().any(|a| ty_mentions_trait_param(a, params)),
        Ty::Func(f) => f.params.iter().any(|p| ty_mentions_trait_param(p, params)) || ty_mentions_trait_param(&f.ret, params),
        Ty::Tuple(elems) => elems.iter().any(|e| ty_mentions_trait_param(e, params)),
        Ty::Record(r) => r.fields.iter().any(|(_, t)| ty_mentions_trait_param(t, params)),
        Ty::Union(members) => members.iter().any(|m| ty_mentions_trait_param(m, params)),
        _ => false,
    }
}

/// Replace single-uppercase-letter constructors (trait/instance type
/// parameters) with fresh inference variables so two instance heads can
/// be compared via ordinary unification (spec.md §4.3, teacher's
/// `freshen_type_params`).
fn freshen_type_params(ty: &Ty, ctx: &mut InferCtx) -> Ty {
    let mut seen = FxHashMap::default();
    freshen_recursive(ty, ctx, &mut seen)
}

fn freshen_recursive(ty: &Ty, ctx: &mut InferCtx, seen: &mut FxHashMap<String, Ty>) -> Ty {
    match ty {
        Ty::Con(c) if is_type_param_name(&c.name) => {
            seen.entry(c.name.clone()).or_insert_with(|| ctx.fresh_var()).clone()
        }
        Ty::Con(_) | Ty::Var(_) | Ty::Never => ty.clone(),
        Ty::App(con, args) => Ty::App(Box::new(freshen_recursive(con, ctx, seen)), args.iter().map(|a| freshen_recursive(a, ctx, seen)).collect()),
        Ty::Func(f) => Ty::Func(crate::ty::TFunc {
            params: f.params.iter().map(|p| freshen_recursive(p, ctx, seen)).collect(),
            ret: Box::new(freshen_recursive(&f.ret, ctx, seen)),
            is_variadic: f.is_variadic,
            default_count: f.default_count,
            constraints: f.constraints.clone(),
        }),
        Ty::Tuple(elems) => Ty::Tuple(elems.iter().map(|e| freshen_recursive(e, ctx, seen)).collect()),
        Ty::Record(r) => Ty::Record(crate::ty::TRecord {
            fields: r.fields.iter().map(|(n, t)| (n.clone(), freshen_recursive(t, ctx, seen))).collect(),
            open: r.open,
        }),
        Ty::Union(members) => Ty::union_of(members.iter().map(|m| freshen_recursive(m, ctx, seen)).collect()),
        Ty::TypeVal(inner) => Ty::TypeVal(Box::new(freshen_recursive(inner, ctx, seen))),
        Ty::Forall(_) => ty.clone(),
    }
}

fn is_type_param_name(name: &str) -> bool {
    // Single uppercase letters are the convention this registry's own unit
    // tests were written against; lowercase-leading names are the rigid
    // (skolem) `TyCon` convention the rest of the crate uses for a
    // trait/instance's own generic parameters once they come from the
    // `Builder` pipeline (spec.md §4.3, §9 "Rigidity"). Both name the same
    // thing: a placeholder that must be freshened independently per query
    // rather than looked up as a concrete type.
    (name.len() == 1 && name.as_bytes()[0].is_ascii_uppercase()) || name.chars().next().is_some_and(|c| c.is_lowercase())
}

/// Evidence synthesis: produce the dictionary name for an instance
/// (spec.md §4.3 "Evidence synthesis names evidence `$impl_Trait_Type`
/// for a value witness and `$ctor_Trait_Type` for a constructor
/// witness").
pub fn evidence_name(trait_name: &str, args_display: &str, is_constructor: bool) -> String {
    let prefix = if is_constructor { "$ctor" } else { "$impl" };
    format!("{prefix}_{trait_name}_{args_display}")
}

/// Synthesize a `Scheme` for an evidence value so it can be registered in
/// the [`SymbolTable`] like any other binding (used by the driver's
/// Instances pass).
pub fn evidence_scheme(trait_def: &TraitDef, impl_def: &ImplDef) -> Scheme {
    let _ = trait_def;
    Scheme::mono(Ty::Record(crate::ty::TRecord {
        fields: impl_def.methods.iter().map(|(name, sig)| (name.clone(), Ty::func(sig.param_types.clone(), sig.return_type.clone()))).collect(),
        open: false,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::TyCon;

    fn printable() -> TraitDef {
        TraitDef {
            name: "Printable".into(),
            type_params: vec!["A".into()],
            super_traits: vec![],
            fundeps: vec![],
            methods: vec![TraitMethodSig { name: "to_string".into(), param_types: vec![], return_type: Ty::string(), has_default_body: false }],
        }
    }

    fn to_string_methods() -> FxHashMap<String, ImplMethodSig> {
        let mut m = FxHashMap::default();
        m.insert("to_string".into(), ImplMethodSig { param_types: vec![], return_type: Ty::string() });
        m
    }

    #[test]
    fn register_and_find_trait() {
        let mut reg = TraitRegistry::new();
        assert!(reg.register_trait(printable()).is_empty());
        assert!(reg.get_trait("Printable").is_some());
    }

    #[test]
    fn missing_method_is_reported() {
        let mut reg = TraitRegistry::new();
        reg.register_trait(printable());
        let errors = reg.register_impl(ImplDef {
            trait_name: "Printable".into(),
            args: vec![Ty::int()],
            args_display: "Int".into(),
            methods: FxHashMap::default(),
            evidence_name: "$impl_Printable_Int".into(),
        });
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], TypeError::MissingTraitMethod { .. }));
    }

    #[test]
    fn structural_generic_instance_matches_any_argument() {
        let mut reg = TraitRegistry::new();
        reg.register_trait(printable());
        let list_of_a = Ty::App(Box::new(Ty::Con(TyCon::simple("List"))), vec![Ty::Con(TyCon::simple("A"))]);
        let errors = reg.register_impl(ImplDef {
            trait_name: "Printable".into(),
            args: vec![list_of_a],
            args_display: "List<A>".into(),
            methods: to_string_methods(),
            evidence_name: "$impl_Printable_List".into(),
        });
        assert!(errors.is_empty());
        assert!(reg.has_impl("Printable", &[Ty::list(Ty::int())]));
        assert!(!reg.has_impl("Printable", &[Ty::int()]));
    }

    #[test]
    fn overlapping_instances_rejected_eagerly() {
        let mut reg = TraitRegistry::new();
        reg.register_trait(printable());
        reg.register_impl(ImplDef { trait_name: "Printable".into(), args: vec![Ty::int()], args_display: "Int".into(), methods: to_string_methods(), evidence_name: "$impl_Printable_Int".into() });
        let errors = reg.register_impl(ImplDef { trait_name: "Printable".into(), args: vec![Ty::int()], args_display: "Int".into(), methods: to_string_methods(), evidence_name: "$impl_Printable_Int2".into() });
        assert!(matches!(&errors[0], TypeError::OverlappingInstance { .. }));
    }

    #[test]
    fn missing_super_trait_is_reported() {
        let mut reg = TraitRegistry::new();
        reg.register_trait(TraitDef {
            name: "Eq".into(),
            type_params: vec!["A".into()],
            super_traits: vec![],
            fundeps: vec![],
            methods: vec![],
        });
        reg.register_trait(TraitDef {
            name: "Ord".into(),
            type_params: vec!["A".into()],
            super_traits: vec![Constraint { trait_name: "Eq".into(), args: vec![Ty::Con(TyCon::simple("A"))] }],
            fundeps: vec![],
            methods: vec![],
        });
        let errors = reg.register_impl(ImplDef { trait_name: "Ord".into(), args: vec![Ty::int()], args_display: "Int".into(), methods: FxHashMap::default(), evidence_name: "$impl_Ord_Int".into() });
        assert!(errors.iter().any(|e| matches!(e, TypeError::MissingSuperTrait { .. })));
    }

    #[test]
    fn functional_dependency_inconsistency_is_rejected() {
        let mut reg = TraitRegistry::new();
        reg.register_trait(TraitDef {
            name: "Convert".into(),
            type_params: vec!["A".into(), "B".into()],
            super_traits: vec![],
            fundeps: vec![FunDep { determining: vec!["A".into()], determined: vec!["B".into()] }],
            methods: vec![],
        });
        reg.register_impl(ImplDef { trait_name: "Convert".into(), args: vec![Ty::int(), Ty::string()], args_display: "Int, String".into(), methods: FxHashMap::default(), evidence_name: "e1".into() });
        let errors = reg.register_impl(ImplDef { trait_name: "Convert".into(), args: vec![Ty::int(), Ty::bool()], args_display: "Int, Bool".into(), methods: FxHashMap::default(), evidence_name: "e2".into() });
        assert!(errors.iter().any(|e| matches!(e, TypeError::FunctionalDependencyViolation { .. })));
    }

    #[test]
    fn super_trait_witness_resolves_by_chaining() {
        let mut reg = TraitRegistry::new();
        reg.register_trait(TraitDef { name: "Eq".into(), type_params: vec!["A".into()], super_traits: vec![], fundeps: vec![], methods: vec![] });
        reg.register_trait(TraitDef {
            name: "Ord".into(),
            type_params: vec!["A".into()],
            super_traits: vec![Constraint { trait_name: "Eq".into(), args: vec![Ty::Con(TyCon::simple("A"))] }],
            fundeps: vec![],
            methods: vec![],
        });
        reg.register_impl(ImplDef { trait_name: "Eq".into(), args: vec![Ty::int()], args_display: "Int".into(), methods: FxHashMap::default(), evidence_name: "$impl_Eq_Int".into() });
        let witness = reg.resolve_witness(&Constraint { trait_name: "Eq".into(), args: vec![Ty::int()] });
        assert_eq!(witness.unwrap(), "$impl_Eq_Int");
    }

    #[test]
    fn into_is_synthesized_from_from() {
        let mut reg = TraitRegistry::new();
        reg.register_trait(TraitDef {
            name: "From".into(),
            type_params: vec!["A".into()],
            super_traits: vec![],
            fundeps: vec![],
            methods: vec![TraitMethodSig { name: "from".into(), param_types: vec![Ty::int()], return_type: Ty::string(), has_default_body: false }],
        });
        let mut methods = FxHashMap::default();
        methods.insert("from".into(), ImplMethodSig { param_types: vec![Ty::int()], return_type: Ty::string() });
        reg.register_impl(ImplDef { trait_name: "From".into(), args: vec![Ty::int()], args_display: "Int".into(), methods, evidence_name: "$impl_From_Int".into() });
        assert!(reg.has_impl("Into", &[Ty::int()]));
    }
}
