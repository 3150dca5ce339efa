//! Type errors with provenance tracking (spec.md §7).
//!
//! Every `TypeError` carries a [`ConstraintOrigin`] recording *why* a
//! constraint was generated, so the rendered diagnostic can say more than
//! "expected X, found Y". Each variant maps onto exactly one of the eight
//! stable `mesh_common::DiagnosticCode`s.

use std::fmt;

use mesh_common::{Diagnostic, DiagnosticCode, SourceToken, Span};

use crate::kind::Kind;
use crate::ty::{Ty, TyVar};

/// Where a unification constraint came from -- used to produce a
/// contextual message instead of a bare type mismatch (spec.md §7
/// "Propagation policy", teacher's `error.rs`).
#[derive(Clone, Debug)]
pub enum ConstraintOrigin {
    FnArg { call_span: Span, param_idx: usize },
    BinOp { op_span: Span },
    IfBranches { if_span: Span },
    Annotation { annotation_span: Span },
    Return { return_span: Span },
    LetBinding { binding_span: Span },
    Assignment { span: Span },
    ForLoop { span: Span },
    MatchArm { span: Span },
    /// Synthetic origin for built-in/prelude constraints.
    Builtin,
}

impl ConstraintOrigin {
    pub fn span(&self) -> Span {
        match self {
            ConstraintOrigin::FnArg { call_span, .. } => *call_span,
            ConstraintOrigin::BinOp { op_span } => *op_span,
            ConstraintOrigin::IfBranches { if_span } => *if_span,
            ConstraintOrigin::Annotation { annotation_span } => *annotation_span,
            ConstraintOrigin::Return { return_span } => *return_span,
            ConstraintOrigin::LetBinding { binding_span } => *binding_span,
            ConstraintOrigin::Assignment { span } => *span,
            ConstraintOrigin::ForLoop { span } => *span,
            ConstraintOrigin::MatchArm { span } => *span,
            ConstraintOrigin::Builtin => Span::synthetic(),
        }
    }
}

/// A type error encountered during analysis. Every constructor is
/// annotated with the `mesh_common::DiagnosticCode` it maps onto.
#[derive(Clone, Debug)]
pub enum TypeError {
    /// A003.
    Mismatch { expected: Ty, found: Ty, origin: ConstraintOrigin },
    /// A003.
    KindMismatch { expected: Kind, found: Kind },
    /// A003.
    InfiniteType { var: TyVar, ty: Ty, origin: ConstraintOrigin },
    /// A003.
    ArityMismatch { expected: usize, found: usize, origin: ConstraintOrigin },
    /// A001.
    UndeclaredIdentifier { name: String, span: Span, suggestion: Option<String> },
    /// A002.
    UndeclaredType { name: String, span: Span, suggestion: Option<String> },
    /// A004.
    Redefinition { name: String, span: Span },
    /// A006.
    UndefinedSymbol { name: String, span: Span },
    /// A003 ("cannot mutate global variable").
    MutateGlobalFromFunction { name: String, span: Span },
    /// A003 ("cannot reassign imported symbol").
    ReassignImported { name: String, span: Span },
    /// A003: `break`/`continue` outside a loop.
    BreakOutsideLoop { span: Span },
    ContinueOutsideLoop { span: Span },
    /// A007.
    NonExhaustiveMatch { scrutinee_type: String, missing_patterns: Vec<String>, span: Span },
    /// Non-fatal; reported but does not block the enclosing declaration
    /// (spec.md §4.5 "Reachability").
    RedundantArm { span: Span },
    /// A003: a trait method's implementation type does not match the
    /// trait's declared signature after substitution.
    TraitMethodSignatureMismatch { trait_name: String, method_name: String, expected: Ty, found: Ty },
    /// A004: an impl is missing a required method.
    MissingTraitMethod { trait_name: String, method_name: String, impl_ty: String },
    /// A003: super-trait not implemented for the same arguments.
    MissingSuperTrait { trait_name: String, super_trait: String, impl_ty: String },
    /// A003: a functional dependency coverage or consistency violation.
    FunctionalDependencyViolation { trait_name: String, reason: String },
    /// A004: two instances for the same trait whose heads structurally
    /// overlap (spec.md §9 "Open question -- overlapping instances").
    OverlappingInstance { trait_name: String, impl_type: String },
    /// A003: no witness could be resolved for a constrained call.
    UnresolvedWitness { trait_name: String, args: Vec<Ty>, span: Span },
    /// A003: two unrelated traits both provide a method with this name.
    AmbiguousMethod { method_name: String, candidate_traits: Vec<String>, ty: Ty, span: Span },
    /// A008.
    NamingConvention { name: String, expected: &'static str, span: Span },
    /// A003: `trait ... | a -> c` references a variable not among the
    /// trait's own parameters (spec.md §8 scenario 5).
    UnknownFunDepVariable { trait_name: String, var: String, span: Span },
    /// A003: a type application supplied the wrong number of arguments for
    /// its constructor's kind (spec.md §4.1 "kind arity validated with
    /// position-specific errors").
    KindArityMismatch { name: String, expected: usize, found: usize, span: Span },
    /// A003: a type alias's underlying form transitively mentions itself
    /// (spec.md §3.2 "a type alias graph must be acyclic").
    CyclicTypeAlias { name: String, span: Span },
}

impl TypeError {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            TypeError::UndeclaredIdentifier { .. } => DiagnosticCode::UndeclaredIdentifier,
            TypeError::UndeclaredType { .. } => DiagnosticCode::UndeclaredType,
            TypeError::Redefinition { .. } | TypeError::MissingTraitMethod { .. } | TypeError::OverlappingInstance { .. } => {
                DiagnosticCode::Redefinition
            }
            TypeError::UndefinedSymbol { .. } => DiagnosticCode::UndefinedSymbol,
            TypeError::NonExhaustiveMatch { .. } => DiagnosticCode::NonExhaustiveMatch,
            TypeError::NamingConvention { .. } => DiagnosticCode::NamingConvention,
            _ => DiagnosticCode::TypeError,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            TypeError::Mismatch { origin, .. }
            | TypeError::InfiniteType { origin, .. }
            | TypeError::ArityMismatch { origin, .. } => origin.span(),
            TypeError::KindMismatch { .. } => Span::synthetic(),
            TypeError::UndeclaredIdentifier { span, .. }
            | TypeError::UndeclaredType { span, .. }
            | TypeError::Redefinition { span, .. }
            | TypeError::UndefinedSymbol { span, .. }
            | TypeError::MutateGlobalFromFunction { span, .. }
            | TypeError::ReassignImported { span, .. }
            | TypeError::BreakOutsideLoop { span }
            | TypeError::ContinueOutsideLoop { span }
            | TypeError::NonExhaustiveMatch { span, .. }
            | TypeError::RedundantArm { span }
            | TypeError::UnresolvedWitness { span, .. }
            | TypeError::AmbiguousMethod { span, .. }
            | TypeError::NamingConvention { span, .. }
            | TypeError::UnknownFunDepVariable { span, .. }
            | TypeError::KindArityMismatch { span, .. }
            | TypeError::CyclicTypeAlias { span, .. } => *span,
            TypeError::TraitMethodSignatureMismatch { .. }
            | TypeError::MissingTraitMethod { .. }
            | TypeError::MissingSuperTrait { .. }
            | TypeError::FunctionalDependencyViolation { .. }
            | TypeError::OverlappingInstance { .. } => Span::synthetic(),
        }
    }

    /// Lower into the shared `Diagnostic` shape (spec.md §6 "Diagnostics
    /// channel"). `file` is the source file the error's span belongs to.
    pub fn into_diagnostic(self, file: impl Into<String>) -> Diagnostic {
        let code = self.code();
        let span = self.span();
        let message = self.to_string();
        let token = SourceToken::new(file, span);
        Diagnostic::new(code, message, token)
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::Mismatch { expected, found, .. } => {
                write!(f, "type mismatch: expected `{expected}`, found `{found}`")
            }
            TypeError::KindMismatch { expected, found } => {
                write!(f, "kind mismatch: expected `{expected}`, found `{found}`")
            }
            TypeError::InfiniteType { var, ty, .. } => write!(f, "infinite type: `{var}` occurs in `{ty}`"),
            TypeError::ArityMismatch { expected, found, .. } => {
                write!(f, "arity mismatch: expected {expected} arguments, found {found}")
            }
            TypeError::UndeclaredIdentifier { name, suggestion, .. } => {
                write!(f, "undeclared identifier `{name}`")?;
                if let Some(s) = suggestion {
                    write!(f, ", did you mean `{s}`?")?;
                }
                Ok(())
            }
            TypeError::UndeclaredType { name, suggestion, .. } => {
                write!(f, "undeclared type `{name}`")?;
                if let Some(s) = suggestion {
                    write!(f, ", did you mean `{s}`?")?;
                }
                Ok(())
            }
            TypeError::Redefinition { name, .. } => write!(f, "redefinition of `{name}`"),
            TypeError::UndefinedSymbol { name, .. } => write!(f, "undefined symbol `{name}`"),
            TypeError::MutateGlobalFromFunction { name, .. } => {
                write!(f, "cannot mutate global variable `{name}` from a function")
            }
            TypeError::ReassignImported { name, .. } => write!(f, "cannot reassign imported symbol `{name}`"),
            TypeError::BreakOutsideLoop { .. } => write!(f, "`break` used outside of a loop"),
            TypeError::ContinueOutsideLoop { .. } => write!(f, "`continue` used outside of a loop"),
            TypeError::NonExhaustiveMatch { scrutinee_type, missing_patterns, .. } => {
                write!(f, "non-exhaustive match on `{scrutinee_type}`: missing {}", missing_patterns.join(", "))
            }
            TypeError::RedundantArm { .. } => write!(f, "unreachable match arm"),
            TypeError::TraitMethodSignatureMismatch { trait_name, method_name, expected, found } => write!(
                f,
                "method `{method_name}` in instance of `{trait_name}` has wrong signature: expected `{expected}`, found `{found}`"
            ),
            TypeError::MissingTraitMethod { trait_name, method_name, impl_ty } => {
                write!(f, "instance `{trait_name}` for `{impl_ty}` is missing method `{method_name}`")
            }
            TypeError::MissingSuperTrait { trait_name, super_trait, impl_ty } => write!(
                f,
                "instance `{trait_name}` for `{impl_ty}` requires an instance of super-trait `{super_trait}`"
            ),
            TypeError::FunctionalDependencyViolation { trait_name, reason } => {
                write!(f, "functional dependency violation on `{trait_name}`: {reason}")
            }
            TypeError::OverlappingInstance { trait_name, impl_type } => {
                write!(f, "overlapping instance: `{trait_name}` is already implemented for `{impl_type}`")
            }
            TypeError::UnresolvedWitness { trait_name, args, .. } => write!(
                f,
                "could not resolve an instance of `{trait_name}[{}]`",
                args.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", ")
            ),
            TypeError::AmbiguousMethod { method_name, candidate_traits, ty, .. } => write!(
                f,
                "ambiguous method `{method_name}` for type `{ty}`: candidates from traits [{}]",
                candidate_traits.join(", ")
            ),
            TypeError::NamingConvention { name, expected, .. } => {
                write!(f, "`{name}` does not follow naming conventions: expected {expected}")
            }
            TypeError::UnknownFunDepVariable { trait_name, var, .. } => {
                write!(f, "unknown type variable `{var}` in functional dependency of trait `{trait_name}`")
            }
            TypeError::KindArityMismatch { name, expected, found, .. } => {
                write!(f, "`{name}` expects {expected} type argument(s), found {found}")
            }
            TypeError::CyclicTypeAlias { name, .. } => {
                write!(f, "type alias `{name}` is cyclic: its underlying form refers back to itself")
            }
        }
    }
}

impl std::error::Error for TypeError {}

/// "Did you mean" lookup (spec.md §7 "Hints"): the closest candidate to
/// `name` within `max_distance` edits, or `None` if nothing is close
/// enough. Ties are broken by the candidate's position in `candidates`.
pub fn suggest<'a>(name: &str, candidates: impl IntoIterator<Item = &'a str>, max_distance: usize) -> Option<String> {
    candidates
        .into_iter()
        .filter(|c| *c != name)
        .map(|c| (strsim::levenshtein(name, c), c))
        .filter(|(dist, _)| *dist <= max_distance)
        .min_by_key(|(dist, _)| *dist)
        .map(|(_, c)| c.to_string())
}
