//! Maranget's usefulness algorithm for exhaustiveness and redundancy checking
//! (spec.md §4.5 "Pattern matching").
//!
//! This is the same abstract pattern representation used elsewhere in the
//! pack (`Pat`/`PatternMatrix`/`TypeInfo`/`is_useful`): translation from AST
//! patterns into `Pat` happens in `infer.rs`, this module only ever reasons
//! about the abstract shape. The core predicate `is_useful(matrix, row,
//! type_info)` answers "does this row match a value not already matched by
//! the matrix" -- exhaustiveness asks it of a trailing wildcard, redundancy
//! asks it of each arm against all earlier arms.

use rustc_hash::FxHashSet;

/// The kind of a literal pattern value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LitKind {
    Int,
    Float,
    Bool,
    String,
}

/// Abstract pattern representation for exhaustiveness checking.
///
/// Not an AST node -- a simplified shape the usefulness algorithm reasons
/// about directly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pat {
    /// Matches anything (wildcard `_` or a variable binding).
    Wildcard,
    /// Matches a specific constructor with arguments.
    Constructor { name: String, type_name: String, args: Vec<Pat> },
    /// Matches a specific literal value.
    Literal { value: String, ty: LitKind },
    /// Matches any of the alternatives (or-pattern).
    Or { alternatives: Vec<Pat> },
}

impl Pat {
    fn is_wildcard(&self) -> bool {
        matches!(self, Pat::Wildcard)
    }
}

/// A row in the pattern matrix (one match arm's patterns).
pub type PatternRow = Vec<Pat>;

/// The pattern matrix: each row corresponds to one match arm.
#[derive(Clone, Debug)]
pub struct PatternMatrix {
    pub rows: Vec<PatternRow>,
}

/// Signature of a constructor (name + arity).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstructorSig {
    pub name: String,
    pub arity: usize,
}

/// Type information needed for exhaustiveness checking: what constructors
/// (if any) a column's type has, so the algorithm can tell whether every
/// case is covered.
#[derive(Clone, Debug)]
pub enum TypeInfo {
    /// A sum type (or record/tuple-as-product) with known, finite variants.
    SumType { variants: Vec<ConstructorSig> },
    /// Bool: two constructors, `true` and `false`.
    Bool,
    /// A type with unbounded inhabitants (Int, Float, String) -- only a
    /// wildcard (or catch-all or-pattern) can make it exhaustive.
    Infinite,
}

impl TypeInfo {
    fn variants(&self) -> Option<&[ConstructorSig]> {
        match self {
            TypeInfo::SumType { variants } => Some(variants),
            TypeInfo::Bool => None,
            TypeInfo::Infinite => None,
        }
    }

    fn is_complete(&self, seen: &FxHashSet<String>) -> bool {
        match self {
            TypeInfo::Bool => seen.contains("true") && seen.contains("false"),
            TypeInfo::SumType { variants } => variants.iter().all(|v| seen.contains(&v.name)),
            TypeInfo::Infinite => false,
        }
    }

    fn arity_of(&self, ctor: &str) -> usize {
        match self {
            TypeInfo::SumType { variants } => {
                variants.iter().find(|v| v.name == ctor).map(|v| v.arity).unwrap_or(0)
            }
            TypeInfo::Bool | TypeInfo::Infinite => 0,
        }
    }

    fn all_ctor_names(&self) -> Vec<String> {
        match self {
            TypeInfo::SumType { variants } => variants.iter().map(|v| v.name.clone()).collect(),
            TypeInfo::Bool => vec!["true".to_string(), "false".to_string()],
            TypeInfo::Infinite => vec![],
        }
    }
}

/// Expand or-patterns in a row into the cartesian set of concrete rows
/// (only the first column is ever an or-pattern in practice, but this
/// handles it wherever it appears).
fn expand_or(row: &[Pat]) -> Vec<PatternRow> {
    let mut out: Vec<PatternRow> = vec![vec![]];
    for pat in row {
        let alts: Vec<Pat> = match pat {
            Pat::Or { alternatives } => alternatives.clone(),
            other => vec![other.clone()],
        };
        let mut next = Vec::with_capacity(out.len() * alts.len());
        for prefix in &out {
            for alt in &alts {
                let mut r = prefix.clone();
                r.push(alt.clone());
                next.push(r);
            }
        }
        out = next;
    }
    out
}

fn head_ctor_name(pat: &Pat) -> Option<String> {
    match pat {
        Pat::Constructor { name, .. } => Some(name.clone()),
        Pat::Literal { value, .. } => Some(value.clone()),
        Pat::Wildcard | Pat::Or { .. } => None,
    }
}

/// Specialize the matrix by a constructor: keep rows whose head matches
/// (or is a wildcard, expanded to `arity` wildcards), drop the head column.
fn specialize(matrix: &PatternMatrix, ctor: &str, arity: usize) -> PatternMatrix {
    let mut rows = Vec::new();
    for row in &matrix.rows {
        let Some((head, rest)) = row.split_first() else { continue };
        match head {
            Pat::Constructor { name, args, .. } if name == ctor => {
                let mut r = args.clone();
                r.extend_from_slice(rest);
                rows.push(r);
            }
            Pat::Literal { value, .. } if value == ctor => {
                rows.push(rest.to_vec());
            }
            Pat::Wildcard => {
                let mut r = vec![Pat::Wildcard; arity];
                r.extend_from_slice(rest);
                rows.push(r);
            }
            Pat::Constructor { .. } | Pat::Literal { .. } => {}
            Pat::Or { .. } => unreachable!("or-patterns are expanded before specialization"),
        }
    }
    PatternMatrix { rows }
}

/// The default matrix: rows whose head is a wildcard, with the head column
/// dropped. Used when no single constructor covers the remaining space.
fn default_matrix(matrix: &PatternMatrix) -> PatternMatrix {
    let mut rows = Vec::new();
    for row in &matrix.rows {
        let Some((head, rest)) = row.split_first() else { continue };
        if head.is_wildcard() {
            rows.push(rest.to_vec());
        }
    }
    PatternMatrix { rows }
}

fn matrix_head_ctors(matrix: &PatternMatrix) -> FxHashSet<String> {
    let mut seen = FxHashSet::default();
    for row in &matrix.rows {
        if let Some(head) = row.first() {
            if let Some(name) = head_ctor_name(head) {
                seen.insert(name);
            }
        }
    }
    seen
}

/// Core usefulness predicate (Algorithm U). Returns `true` if `row` matches
/// some value not already matched by any row of `matrix`.
pub fn is_useful(matrix: &PatternMatrix, row: &[Pat], type_info: &[TypeInfo]) -> bool {
    if row.is_empty() {
        return matrix.rows.is_empty();
    }
    let expanded = expand_or(row);
    if expanded.len() > 1 {
        return expanded.iter().any(|r| is_useful(matrix, r, type_info));
    }
    let row = &expanded[0];
    let (head, rest) = row.split_first().expect("row checked non-empty above");
    let (head_ty, rest_ty) = type_info.split_first().unwrap_or((&TypeInfo::Infinite, &[]));

    match head {
        Pat::Wildcard => {
            let seen = matrix_head_ctors(matrix);
            if head_ty.is_complete(&seen) {
                head_ty.all_ctor_names().iter().any(|ctor| {
                    let arity = head_ty.arity_of(ctor);
                    let mut specialized_ty = vec![TypeInfo::Infinite; arity];
                    specialized_ty.extend_from_slice(rest_ty);
                    is_useful(&specialize(matrix, ctor, arity), &expand_default_row(rest, arity), &specialized_ty)
                })
            } else {
                is_useful(&default_matrix(matrix), rest, rest_ty)
            }
        }
        Pat::Constructor { name, args, .. } => {
            let arity = args.len();
            let mut specialized_ty = vec![TypeInfo::Infinite; arity];
            specialized_ty.extend_from_slice(rest_ty);
            let mut new_row = args.clone();
            new_row.extend_from_slice(rest);
            is_useful(&specialize(matrix, name, arity), &new_row, &specialized_ty)
        }
        Pat::Literal { value, .. } => {
            is_useful(&specialize(matrix, value, 0), rest, rest_ty)
        }
        Pat::Or { .. } => unreachable!("or-patterns expanded above"),
    }
}

fn expand_default_row(rest: &[Pat], arity: usize) -> PatternRow {
    let mut r = vec![Pat::Wildcard; arity];
    r.extend_from_slice(rest);
    r
}

/// Check whether a match expression is exhaustive. Returns `None` if
/// exhaustive, `Some(witnesses)` with example uncovered patterns otherwise.
pub fn check_exhaustiveness(arms: &[Pat], scrutinee_type: &TypeInfo) -> Option<Vec<Pat>> {
    let mut matrix = PatternMatrix { rows: vec![] };
    for arm in arms {
        for expanded in expand_or(std::slice::from_ref(arm)) {
            matrix.rows.push(expanded);
        }
    }
    if is_useful(&matrix, &[Pat::Wildcard], std::slice::from_ref(scrutinee_type)) {
        Some(missing_witnesses(&matrix, scrutinee_type))
    } else {
        None
    }
}

/// Enumerate concrete witness patterns not covered by `matrix`, for
/// diagnostics. Bounded: sum types enumerate their uncovered variants;
/// infinite types report a single generic wildcard witness.
fn missing_witnesses(matrix: &PatternMatrix, ty: &TypeInfo) -> Vec<Pat> {
    let seen = matrix_head_ctors(matrix);
    match ty {
        TypeInfo::Bool => {
            let mut out = Vec::new();
            if !seen.contains("true") {
                out.push(Pat::Literal { value: "true".to_string(), ty: LitKind::Bool });
            }
            if !seen.contains("false") {
                out.push(Pat::Literal { value: "false".to_string(), ty: LitKind::Bool });
            }
            if out.is_empty() {
                out.push(Pat::Wildcard);
            }
            out
        }
        TypeInfo::SumType { variants } => {
            let missing: Vec<Pat> = variants
                .iter()
                .filter(|v| !seen.contains(&v.name))
                .map(|v| Pat::Constructor {
                    name: v.name.clone(),
                    type_name: String::new(),
                    args: vec![Pat::Wildcard; v.arity],
                })
                .collect();
            if missing.is_empty() { vec![Pat::Wildcard] } else { missing }
        }
        TypeInfo::Infinite => vec![Pat::Wildcard],
    }
}

/// Check for redundant (unreachable) arms. Returns the 0-based indices of
/// arms that add no coverage beyond the arms preceding them.
pub fn check_redundancy(arms: &[Pat], scrutinee_type: &TypeInfo) -> Vec<usize> {
    let mut matrix = PatternMatrix { rows: vec![] };
    let mut redundant = Vec::new();
    for (i, arm) in arms.iter().enumerate() {
        if is_useful(&matrix, std::slice::from_ref(arm), std::slice::from_ref(scrutinee_type)) {
            for expanded in expand_or(std::slice::from_ref(arm)) {
                matrix.rows.push(expanded);
            }
        } else {
            redundant.push(i);
        }
    }
    redundant
}
