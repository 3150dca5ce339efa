//! The abstract AST the analyzer consumes.
//!
//! Lexing, parsing, and module-file loading are out-of-scope collaborators
//! (spec.md §1); this module is the *interface shape* the core needs from
//! them, not a concrete syntax tree. It intentionally omits everything a
//! parser or formatter would want (trivia, concrete token spans per
//! punctuation, CST node kinds) and keeps only what feeds type inference.
//!
//! Every expression and pattern carries a [`NodeId`] rather than an inferred
//! type directly: the decorated AST (spec.md §6) is this tree plus external
//! `TypeMap`/`ResolutionMap` tables keyed by `NodeId`, so the tree itself
//! stays immutable through Naming/Headers/Instances and is only rewritten
//! (witnesses spliced in) during Bodies.

use crate::span::Span;

/// Identifies a single `Expr` or `Pattern` node for the `TypeMap` /
/// `ResolutionMap` / `Witnesses` side tables the analyzer produces.
pub type NodeId = u32;

/// Hands out fresh, process-unique node ids. A parser (or, in tests, a
/// fixture builder) owns one of these and stamps every node it constructs.
#[derive(Debug, Default)]
pub struct NodeIdGen(NodeId);

impl NodeIdGen {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn next(&mut self) -> NodeId {
        let id = self.0;
        self.0 += 1;
        id
    }
}

// ── Type annotations (surface syntax, not the internal `Ty`) ──────────────

#[derive(Debug, Clone, PartialEq)]
pub struct TypeExpr {
    pub id: NodeId,
    pub span: Span,
    pub kind: TypeExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExprKind {
    /// A bare name: `Int`, `a`, `MyType`. The builder (§4.3) decides at
    /// build time whether this is a nominal reference or an implicit
    /// generic, based on case.
    Name(String),
    /// `module.Name`, always nominal per the builder's case rule.
    Qualified(String, String),
    /// `Name<Arg1, Arg2>` -- a type alias or constructor application.
    App(Box<TypeExpr>, Vec<TypeExpr>),
    /// `(P1, P2, ...) -> R`, optionally variadic with a default count and
    /// a qualified part (`where` constraints written on a function type).
    Func(FuncTypeExpr),
    /// `(T1, T2, ...)`.
    Tuple(Vec<TypeExpr>),
    /// `{ field: T, ... }`, with an explicit open/closed row flag.
    Record(RecordTypeExpr),
    /// `T1 | T2 | ...`.
    Union(Vec<TypeExpr>),
    /// `forall a b. constraints => body`.
    Forall(ForallTypeExpr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncTypeExpr {
    pub params: Vec<TypeExpr>,
    pub ret: Box<TypeExpr>,
    pub is_variadic: bool,
    pub default_count: usize,
    pub constraints: Vec<TraitConstraintExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordTypeExpr {
    pub fields: Vec<(String, TypeExpr)>,
    /// Row-open: unification against this record permits extra fields on
    /// the other side (spec.md §4.4 "Records").
    pub open: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForallTypeExpr {
    pub vars: Vec<String>,
    pub constraints: Vec<TraitConstraintExpr>,
    pub body: Box<TypeExpr>,
}

/// A trait/class constraint written in source: `Show a`, `Convert<a, b>`.
#[derive(Debug, Clone, PartialEq)]
pub struct TraitConstraintExpr {
    pub trait_name: String,
    pub args: Vec<TypeExpr>,
    pub span: Span,
}

// ── Patterns ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub id: NodeId,
    pub span: Span,
    pub kind: PatternKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternKind {
    /// `_` -- the discard sentinel (spec.md §4.2 "A special sentinel `_`
    /// never defines anything").
    Wildcard,
    Var(String),
    Literal(LiteralKind),
    /// `Some(n)`, `Cons(x, xs)`.
    Constructor { name: String, args: Vec<Pattern> },
    Tuple(Vec<Pattern>),
    /// `[a, b, ...rest]`; `rest` is `None` for a closed list pattern.
    List { elements: Vec<Pattern>, rest: Option<Box<Pattern>> },
    /// `{ x, y, ... }`; `has_rest` marks an open record pattern.
    Record { fields: Vec<(String, Pattern)>, has_rest: bool },
    /// `P1 | P2 | ...`; every alternative must bind the same variable set
    /// (spec.md §7 `OrPatternBindingMismatch`, via `A003`).
    Or(Vec<Pattern>),
    /// `p: T` -- a pattern annotated with an explicit type.
    Annotated(Box<Pattern>, TypeExpr),
}

// ── Expressions ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralKind {
    Int(i64),
    Float(f64),
    Bool(bool),
    Char(char),
    Str(String),
    /// `()` -- the empty tuple / unit value.
    Unit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind,
}

/// A call argument. `name` is set for `f(x: 1)`-style named arguments,
/// used to resolve which defaults are supplied and which are not
/// (spec.md §9 "variadic default counts").
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: Option<String>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub pattern: Pattern,
    pub type_ann: Option<TypeExpr>,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionLiteral {
    pub params: Vec<Param>,
    /// The trailing variadic parameter, if any; its declared type is the
    /// element type, not `List<T>` (spec.md §9).
    pub variadic_param: Option<Param>,
    pub return_type: Option<TypeExpr>,
    pub body: Box<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(LiteralKind),
    Identifier(String),
    /// `module.name` -- a qualified reference resolved via the symbol
    /// table's alias map (spec.md §4.2 "Aliasing of modules").
    QualifiedIdentifier(String, String),
    Tuple(Vec<Expr>),
    List(Vec<Expr>),
    /// `{ field: v, ...spread }`.
    RecordLit { fields: Vec<(String, Expr)>, spread: Option<Box<Expr>> },
    Call { callee: Box<Expr>, args: Vec<Arg> },
    BinOp { op: String, lhs: Box<Expr>, rhs: Box<Expr> },
    UnOp { op: String, operand: Box<Expr> },
    If { cond: Box<Expr>, then_branch: Box<Block>, else_branch: Option<Box<Block>> },
    Match { scrutinee: Box<Expr>, arms: Vec<MatchArm> },
    Block(Box<Block>),
    Function(FunctionLiteral),
    /// `target = value`; `target` is itself an `Expr` (an identifier or a
    /// field access) so the inference engine can distinguish a fresh
    /// binding from a mutation (spec.md §4.5 "Assignment").
    Assign { target: Box<Expr>, value: Box<Expr> },
    /// `let pattern (: T)? = value`.
    Let { pattern: Pattern, type_ann: Option<TypeExpr>, value: Box<Expr> },
    For { pattern: Pattern, iterable: Box<Expr>, body: Box<Block> },
    While { cond: Box<Expr>, body: Box<Block> },
    Break(Option<Box<Expr>>),
    Continue,
    Return(Option<Box<Expr>>),
    /// `x |> f(a, _, b)` -- `placeholder_index` is the position of the `_`
    /// among `args`, or `None` when the piped value is appended as the
    /// trailing argument (spec.md §4.5 "Pipe").
    Pipe { value: Box<Expr>, callee: Box<Expr>, args: Vec<Arg>, placeholder_index: Option<usize> },
    FieldAccess { base: Box<Expr>, field: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    /// A local declaration nested in a block: `type`, `trait`, `instance`,
    /// or `fun` (spec.md §4.5 "Block").
    Item(Item),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub span: Span,
}

// ── Top-level items ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct GenericParam {
    pub name: String,
    pub constraints: Vec<TraitConstraintExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunDef {
    pub name: String,
    pub generics: Vec<GenericParam>,
    pub params: Vec<Param>,
    pub variadic_param: Option<Param>,
    pub return_type: Option<TypeExpr>,
    pub constraints: Vec<TraitConstraintExpr>,
    pub body: Option<Block>,
    pub is_pub: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstDef {
    pub name: String,
    pub type_ann: Option<TypeExpr>,
    pub value: Expr,
    pub is_pub: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariantDef {
    pub name: String,
    pub fields: Vec<TypeExpr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    pub name: String,
    pub generics: Vec<GenericParam>,
    pub variants: Vec<VariantDef>,
    pub is_pub: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeAliasDef {
    pub name: String,
    pub generics: Vec<GenericParam>,
    pub aliased: TypeExpr,
    pub is_pub: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunDep {
    pub from: Vec<String>,
    pub to: Vec<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraitMethodDef {
    pub name: String,
    pub params: Vec<TypeExpr>,
    pub return_type: TypeExpr,
    pub default_body: Option<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraitDef {
    pub name: String,
    pub type_params: Vec<String>,
    pub super_traits: Vec<TraitConstraintExpr>,
    pub fundeps: Vec<FunDep>,
    pub methods: Vec<TraitMethodDef>,
    pub is_pub: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstanceDef {
    pub trait_name: String,
    pub args: Vec<TypeExpr>,
    pub requirements: Vec<TraitConstraintExpr>,
    pub methods: Vec<FunDef>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportName {
    pub name: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    /// Dotted package path, e.g. `["Math", "Vector"]`.
    pub path: Vec<String>,
    /// Local alias for the whole module (spec.md §4.2 "Aliasing of modules").
    pub alias: Option<String>,
    /// `from Module import name1, name2 as alias`.
    pub names: Vec<ImportName>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReexportSpec {
    pub from_module: String,
    pub names: Vec<ImportName>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Fun(FunDef),
    Const(ConstDef),
    Type(TypeDef),
    TypeAlias(TypeAliasDef),
    Trait(TraitDef),
    Instance(InstanceDef),
    Import(ImportDecl),
    Reexport(ReexportSpec),
    /// A top-level expression, evaluated for its side effect at module load.
    TopLevelExpr(Expr),
}

/// One parsed source file belonging to a module.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    /// Path relative to the project root, e.g. `"math/vector.mpl"`.
    pub path: String,
    pub items: Vec<Item>,
}

/// The program the pipeline hands to the analyzer: the entry module's own
/// files. Every other module reachable from here is fetched lazily through
/// [`ModuleLoader`] (spec.md §6).
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub entry_module: String,
    pub files: Vec<SourceFile>,
}

// ── Module loader (external collaborator, spec.md §6) ─────────────────

/// A module as exposed by the (out-of-scope) module loader: parsed files
/// plus enough bookkeeping for the driver to resolve imports and
/// re-exports. The loader does *not* own symbol tables or per-pass flags
/// -- those belong to the driver (spec.md §4.7, §9), so that the loader
/// stays a pure "give me parsed files for this name" collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedModule {
    pub name: String,
    pub base_dir: String,
    pub files: Vec<SourceFile>,
    /// Names this module exports; `pub` items are implicitly exported,
    /// this lists any additionally re-exported names.
    pub exports: Vec<String>,
    pub reexports: Vec<ReexportSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadError {
    NotFound(String),
    Io(String),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::NotFound(path) => write!(f, "module not found: {path}"),
            LoadError::Io(msg) => write!(f, "module load error: {msg}"),
        }
    }
}

impl std::error::Error for LoadError {}

/// The out-of-scope module loader's interface shape (spec.md §6).
pub trait ModuleLoader {
    fn get_module(&self, absolute_path: &str) -> Result<LoadedModule, LoadError>;
    fn get_module_by_package_name(&self, name: &str) -> Option<LoadedModule>;
}
