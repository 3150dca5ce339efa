//! Analysis options (SPEC_FULL.md §10.4).
//!
//! The CLI and its configuration file format are out of scope (spec.md
//! §1); this struct is the small, in-process configuration surface every
//! pass actually needs, threaded through the driver and the inference
//! context rather than read from disk.

#[derive(Debug, Clone, Copy)]
pub struct AnalysisOptions {
    /// spec.md §4.4 "Unions": in strict mode a value may only flow into a
    /// union position by unifying with one variant; in permissive mode
    /// the check is not enforced at the unifier level (narrowing and
    /// branch-merging in the inference engine compute the union
    /// directly, so the unifier only needs to gate membership checks
    /// against an *already fixed* union annotation).
    pub strict_unions: bool,
    /// spec.md §4.3/§9 "Row polymorphism": whether the builder opens
    /// record parameter annotations for width subtyping.
    pub row_open_params: bool,
    /// Bound on the Levenshtein distance used for "did you mean" hints
    /// (spec.md §7 "Hints").
    pub max_suggestion_distance: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self { strict_unions: true, row_open_params: true, max_suggestion_distance: 3 }
    }
}
