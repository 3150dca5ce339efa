//! Dictionary-passing elaboration (spec.md §4.3, §4.7 "witnesses resolve
//! after the Instances pass"): drains the pending constraint queue a
//! function body's [`crate::infer::Infer`] collected and resolves each one
//! into the name of an evidence value, generalizing the teacher's
//! end-of-body "resolve pending trait calls" step from single-parameter
//! traits to this registry's multi-parameter, super-trait-aware one.
//!
//! Three resolution strategies, in order (spec.md §4.3 "Witness
//! resolution"):
//!   1. Named-parameter lookup: the constraint's arguments are rigid
//!      (skolemized) type variables belonging to the enclosing function's
//!      own declared generics, so the witness is the implicit dictionary
//!      parameter that function's *own* constraint set synthesizes --
//!      there is no concrete instance to find yet.
//!   2. [`TraitRegistry::resolve_witness`]'s direct lookup.
//!   3. [`TraitRegistry::resolve_witness`]'s super-trait BFS chain.
//!
//! Strategy 1 doesn't fail: it produces a witness that names a dictionary
//! the function receives from its own callers, and also reports the
//! constraint back to the caller so it can be folded into the enclosing
//! binding's generalized [`crate::ty::Scheme`] (spec.md §4.5
//! "Generalisation" carries constraints, not just quantified variables).

use rustc_hash::FxHashMap;

use mesh_common::Span;

use crate::error::TypeError;
use crate::scope::PendingConstraint;
use crate::traits::{evidence_name, TraitRegistry};
use crate::ty::{Constraint, Ty, TyCon};
use crate::unify::InferCtx;

/// Resolved witnesses, keyed by the span of the call/reference site whose
/// constraint produced them -- the decorated AST's witness side table
/// (spec.md §6 "TypeMap / ResolutionMap / Witnesses").
pub type WitnessMap = FxHashMap<Span, String>;

/// The outcome of elaborating one function/top-level binding's pending
/// constraints.
pub struct Elaboration {
    pub witnesses: WitnessMap,
    /// Constraints that could not be resolved locally because they're
    /// stated purely in terms of the enclosing binding's own rigid type
    /// parameters; the caller should fold these into that binding's
    /// generalized scheme rather than report them as errors.
    pub bubbled: Vec<Constraint>,
    pub errors: Vec<TypeError>,
}

/// Drain `pending`, resolving each constraint's witness against `traits`.
/// `ctx` is used only to fully resolve each constraint's argument types
/// through the union-find table before matching.
pub fn elaborate(pending: Vec<PendingConstraint>, ctx: &mut InferCtx, traits: &TraitRegistry) -> Elaboration {
    let mut witnesses = WitnessMap::default();
    let mut bubbled = Vec::new();
    let mut errors = Vec::new();

    for PendingConstraint { constraint, span } in pending {
        let resolved = Constraint {
            trait_name: constraint.trait_name,
            args: constraint.args.into_iter().map(|a| ctx.resolve(a)).collect(),
        };

        if is_rigid_constraint(&resolved) {
            // Strategy 1: named-parameter lookup. The dictionary isn't
            // known yet -- it will be a parameter this binding receives
            // once its own scheme carries this constraint -- but the
            // witness *name* is deterministic from the constraint shape,
            // matching the naming `evidence_name` uses for concrete
            // instances so later stages don't need two naming schemes.
            let args_display = resolved.args.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
            let dict_name = format!("$dict_{}_{}", resolved.trait_name, args_display);
            witnesses.insert(span, dict_name);
            bubbled.push(resolved);
            continue;
        }

        match traits.resolve_witness(&resolved) {
            Ok(name) => {
                witnesses.insert(span, name.to_string());
            }
            Err(err) => {
                errors.push(reposition(err, span));
            }
        }
    }

    Elaboration { witnesses, bubbled, errors }
}

/// `resolve_witness` always stamps a synthetic span since it has no call
/// site of its own; substitute the constraint's real span so diagnostics
/// point at the call that actually needed the witness.
fn reposition(err: TypeError, span: Span) -> TypeError {
    match err {
        TypeError::UnresolvedWitness { trait_name, args, .. } => TypeError::UnresolvedWitness { trait_name, args, span },
        other => other,
    }
}

/// spec.md §4.3 "Named-parameter lookup": true when every argument of the
/// constraint is a rigid (skolemized) constructor rather than a concrete
/// or still-flexible type, meaning no instance registered anywhere could
/// possibly match -- the only source of evidence is a dictionary the
/// enclosing generic binding itself receives.
fn is_rigid_constraint(constraint: &Constraint) -> bool {
    !constraint.args.is_empty() && constraint.args.iter().all(ty_is_rigid)
}

fn ty_is_rigid(ty: &Ty) -> bool {
    match ty {
        Ty::Con(c) => c.is_rigid(),
        Ty::App(con, args) => ty_is_rigid(con) && args.iter().all(ty_is_rigid),
        _ => false,
    }
}

/// The dictionary-parameter name a rigid constraint elaborates to,
/// exposed so the driver can synthesize the matching parameter binding
/// when it builds a generic function's scope (spec.md §4.3 "Evidence
/// synthesis" extended to implicit dictionary parameters).
pub fn dict_param_name(constraint: &Constraint) -> String {
    let args_display = constraint.args.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
    format!("$dict_{}_{}", constraint.trait_name, args_display)
}

/// Concrete-instance evidence name, re-exported under this module for
/// call sites that only need `witness::evidence_name` rather than
/// reaching into `crate::traits` directly.
pub fn concrete_evidence_name(trait_name: &str, args_display: &str) -> String {
    evidence_name(trait_name, args_display, false)
}
