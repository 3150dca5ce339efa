//! Symbol table: scopes, the value/type/trait registries, and the
//! mutation-rule check (spec.md §4.2).
//!
//! Grounded on the teacher's `TypeEnv`/`TypeRegistry` split (referenced
//! from `infer.rs` as `crate::env::TypeEnv` and the in-file
//! `TypeRegistry`): a stack of scopes for value bindings, plus flat
//! registries for types, traits, and module namespaces that are visible
//! regardless of nesting.

use rustc_hash::{FxHashMap, FxHashSet};

use mesh_common::Span;

use crate::error::TypeError;
use crate::kind::Kind;
use crate::ty::{Constraint, Scheme, Ty, TyCon};

/// What kind of scope boundary a [`Scope`] represents. Used by the
/// mutation-rule check: a function scope may not reassign a binding that
/// lives in an enclosing global scope (spec.md §4.2 "Mutation rule").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Function,
    Block,
}

#[derive(Debug, Clone)]
pub enum SymbolKind {
    /// A let-binding, function parameter, or top-level function.
    Value,
    /// A struct/sum-type constructor function (`Point(x, y)`).
    Constructor,
    /// A forward-declared symbol awaiting its body pass (spec.md §5
    /// "Pending symbols").
    Pending,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub scheme: Scheme,
    pub kind: SymbolKind,
    pub span: Span,
    /// True if this binding was brought in by an `import`, and so cannot
    /// be reassigned (spec.md §4.2).
    pub imported: bool,
}

#[derive(Clone)]
struct Scope {
    kind: ScopeKind,
    bindings: FxHashMap<String, Symbol>,
}

/// A user-defined type: struct, sum type, or type alias (spec.md §3.1/§4.2
/// "Type registry").
#[derive(Debug, Clone)]
pub enum TypeDefKind {
    Struct { fields: Vec<(String, Ty)> },
    Sum { variants: Vec<(String, Vec<Ty>)> },
    Alias { underlying: Ty },
}

#[derive(Debug, Clone)]
pub struct TypeDefInfo {
    pub con: TyCon,
    pub kind: TypeDefKind,
    pub span: Span,
}

/// A registered trait method implementation (spec.md §4.3 "Evidence").
#[derive(Debug, Clone)]
pub struct Instance {
    pub trait_name: String,
    pub args: Vec<Ty>,
    /// The name of the synthesized evidence value/function, e.g.
    /// `$impl_Show_Point` (spec.md §4.3 "Evidence synthesis").
    pub evidence_name: String,
    pub span: Span,
}

/// The symbol table threaded through all four driver passes (spec.md §5).
///
/// Scopes hold value bindings; everything else (types, traits, instances,
/// module aliases, operator dispatch) is registered flatly since Mesh has
/// no nested type or trait declarations.
#[derive(Clone)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    types: FxHashMap<String, TypeDefInfo>,
    type_aliases: FxHashMap<String, Ty>,
    kinds: FxHashMap<String, Kind>,
    traits: FxHashMap<String, crate::traits::TraitDef>,
    instances: Vec<Instance>,
    /// Per-trait evidence values already synthesized, keyed by
    /// `(trait_name, display of args)` to avoid duplicate synthesis.
    evidence: FxHashMap<(String, String), String>,
    /// `+` -> `Add`, `==` -> `Eq`, etc. (spec.md §6 "Operator dispatch").
    operator_traits: FxHashMap<String, String>,
    /// Module alias (e.g. `Geo` from `import Geo from "geometry"`) to the
    /// package/module's canonical name.
    module_aliases: FxHashMap<String, String>,
    extension_methods: FxHashMap<(String, String), Scheme>,
    /// Type names forward-declared in the Naming pass but not yet given a
    /// real `TypeDefInfo` by Headers (spec.md §5 "Pending symbol").
    pending_types: FxHashSet<String>,
    /// Types reached through a qualified reference (`module.Name`) to a
    /// module this one imports, populated by the driver once that module's
    /// own Headers pass has resolved the name (spec.md §4.3 "Qualified
    /// names", §4.7). Keyed by `(canonical module name, type name)`.
    foreign_types: FxHashMap<(String, String), (Kind, Option<Ty>)>,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = SymbolTable {
            scopes: vec![Scope { kind: ScopeKind::Global, bindings: FxHashMap::default() }],
            types: FxHashMap::default(),
            type_aliases: FxHashMap::default(),
            kinds: FxHashMap::default(),
            traits: FxHashMap::default(),
            instances: Vec::new(),
            evidence: FxHashMap::default(),
            operator_traits: FxHashMap::default(),
            module_aliases: FxHashMap::default(),
            extension_methods: FxHashMap::default(),
            pending_types: FxHashSet::default(),
            foreign_types: FxHashMap::default(),
        };
        table.seed_operator_traits();
        table
    }

    /// spec.md §6 "Built-in surface": operators dispatch through the
    /// built-in traits (`Numeric` covers the arithmetic operators since the
    /// prelude has no separate `Add`/`Sub`/... trait per operator; `Equal`/
    /// `Order` match the trait names the glossary actually uses).
    fn seed_operator_traits(&mut self) {
        for (op, trait_name) in [
            ("+", "Numeric"), ("-", "Numeric"), ("*", "Numeric"), ("/", "Numeric"), ("%", "Numeric"),
            ("==", "Equal"), ("!=", "Equal"), ("<", "Order"), ("<=", "Order"), (">", "Order"), (">=", "Order"),
        ] {
            self.operator_traits.insert(op.to_string(), trait_name.to_string());
        }
    }

    // ── Scope stack ────────────────────────────────────────────────

    pub fn push_scope(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope { kind, bindings: FxHashMap::default() });
    }

    pub fn pop_scope(&mut self) {
        debug_assert!(self.scopes.len() > 1, "cannot pop the global scope");
        self.scopes.pop();
    }

    fn current_scope_mut(&mut self) -> &mut Scope {
        self.scopes.last_mut().expect("scope stack is never empty")
    }

    // ── Value bindings ───────────────────────────────────────────────

    /// spec.md §4.2 "A special sentinel `_` never defines anything (discard)".
    fn is_discard(name: &str) -> bool {
        name == "_"
    }

    pub fn define(&mut self, name: impl Into<String>, scheme: Scheme, span: Span) {
        let name = name.into();
        if Self::is_discard(&name) {
            return;
        }
        self.current_scope_mut()
            .bindings
            .insert(name.clone(), Symbol { name, scheme, kind: SymbolKind::Value, span, imported: false });
    }

    pub fn define_constructor(&mut self, name: impl Into<String>, scheme: Scheme, span: Span) {
        let name = name.into();
        self.current_scope_mut()
            .bindings
            .insert(name.clone(), Symbol { name, scheme, kind: SymbolKind::Constructor, span, imported: false });
    }

    pub fn define_imported(&mut self, name: impl Into<String>, scheme: Scheme, span: Span) {
        let name = name.into();
        if Self::is_discard(&name) {
            return;
        }
        self.current_scope_mut()
            .bindings
            .insert(name.clone(), Symbol { name, scheme, kind: SymbolKind::Value, span, imported: true });
    }

    /// Forward-declare a symbol during the Naming pass so that mutually
    /// recursive functions can reference each other (spec.md §5 "Pending
    /// symbols").
    pub fn define_pending(&mut self, name: impl Into<String>, span: Span) {
        let name = name.into();
        if Self::is_discard(&name) {
            return;
        }
        self.current_scope_mut().bindings.insert(
            name.clone(),
            Symbol { name, scheme: Scheme::mono(Ty::Never), kind: SymbolKind::Pending, span, imported: false },
        );
    }

    /// spec.md §4.2 "redefinition": attempts to redefine a non-pending
    /// binding in the same scope, or to shadow it with a conflicting
    /// symbol-kind, fail with `A004` -- except that pending symbols may
    /// always be overwritten, and `_` never conflicts with anything.
    pub fn check_redefinition(&self, name: &str, span: Span) -> Result<(), TypeError> {
        if Self::is_discard(name) {
            return Ok(());
        }
        if let Some(existing) = self.current_scope().bindings.get(name) {
            if !matches!(existing.kind, SymbolKind::Pending) {
                return Err(TypeError::Redefinition { name: name.to_string(), span });
            }
        }
        Ok(())
    }

    fn current_scope(&self) -> &Scope {
        self.scopes.last().expect("scope stack is never empty")
    }

    /// Resolve an identifier, searching inner scopes outward.
    pub fn find(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|s| s.bindings.get(name))
    }

    /// Like [`find`](Self::find) but also reports which scope kind the
    /// binding was found in, used by the mutation-rule check.
    pub fn find_with_scope(&self, name: &str) -> Option<(&Symbol, ScopeKind)> {
        self.scopes.iter().rev().find_map(|s| s.bindings.get(name).map(|sym| (sym, s.kind)))
    }

    /// All names bound anywhere in the current scope chain, used for
    /// "did you mean" suggestions (spec.md §7 "Hints").
    pub fn visible_names(&self) -> Vec<String> {
        let mut seen = FxHashSet::default();
        let mut names = Vec::new();
        for scope in self.scopes.iter().rev() {
            for name in scope.bindings.keys() {
                if seen.insert(name.clone()) {
                    names.push(name.clone());
                }
            }
        }
        names
    }

    /// spec.md §4.2 "Mutation rule": assigning to a binding that lives in
    /// an enclosing `Global` scope from inside a `Function` scope is
    /// rejected, as is reassigning anything marked `imported`.
    pub fn check_mutation(&self, name: &str, span: Span) -> Result<(), TypeError> {
        let Some((symbol, owner_kind)) = self.find_with_scope(name) else {
            return Ok(());
        };
        if symbol.imported {
            return Err(TypeError::ReassignImported { name: name.to_string(), span });
        }
        let currently_in_function = self.scopes.iter().any(|s| s.kind == ScopeKind::Function);
        if owner_kind == ScopeKind::Global && currently_in_function {
            return Err(TypeError::MutateGlobalFromFunction { name: name.to_string(), span });
        }
        Ok(())
    }

    // ── Type registry ────────────────────────────────────────────────

    pub fn define_type(&mut self, info: TypeDefInfo) {
        self.pending_types.remove(&info.con.name);
        self.types.insert(info.con.name.clone(), info);
    }

    pub fn find_type(&self, name: &str) -> Option<&TypeDefInfo> {
        self.types.get(name)
    }

    /// Forward-declare a type name during Naming (spec.md §5 "Pending
    /// symbol"); `Headers` later replaces it with a real `TypeDefInfo` via
    /// [`define_type`](Self::define_type).
    pub fn define_pending_type(&mut self, name: impl Into<String>) {
        self.pending_types.insert(name.into());
    }

    /// Clear a pending-type placeholder for a name that Headers resolves
    /// into a type *alias* rather than a `TypeDefInfo` (spec.md §4.3
    /// "Aliases" register through [`define_type_alias`](Self::define_type_alias),
    /// which has no `TypeDefInfo` of its own to call [`define_type`]
    /// with).
    pub fn finish_pending_type(&mut self, name: &str) {
        self.pending_types.remove(name);
    }

    /// spec.md §4.2 "redefinition" for the type namespace: a type name
    /// already given a real definition (not just forward-declared) cannot
    /// be declared again.
    pub fn check_type_redefinition(&self, name: &str, span: Span) -> Result<(), TypeError> {
        if self.types.contains_key(name) && !self.pending_types.contains(name) {
            return Err(TypeError::Redefinition { name: name.to_string(), span });
        }
        Ok(())
    }

    pub fn define_type_alias(&mut self, name: impl Into<String>, underlying: Ty) {
        self.type_aliases.insert(name.into(), underlying);
    }

    /// Expand a nominal alias one level; used directly as the
    /// [`crate::unify::AliasResolver`] implementation.
    pub fn resolve_type_alias(&self, name: &str) -> Option<&Ty> {
        self.type_aliases.get(name)
    }

    pub fn define_kind(&mut self, name: impl Into<String>, kind: Kind) {
        self.kinds.insert(name.into(), kind);
    }

    pub fn find_kind(&self, name: &str) -> Option<&Kind> {
        self.kinds.get(name)
    }

    pub fn type_names(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }

    // ── Module aliases ───────────────────────────────────────────────

    pub fn define_module_alias(&mut self, alias: impl Into<String>, canonical: impl Into<String>) {
        self.module_aliases.insert(alias.into(), canonical.into());
    }

    pub fn resolve_module_alias(&self, alias: &str) -> Option<&str> {
        self.module_aliases.get(alias).map(String::as_str)
    }

    /// Record a type reached through `module.Name` once the driver has
    /// driven that module's Headers pass (spec.md §4.3 "Qualified names").
    pub fn define_foreign_type(&mut self, module: impl Into<String>, name: impl Into<String>, kind: Kind, underlying: Option<Ty>) {
        self.foreign_types.insert((module.into(), name.into()), (kind, underlying));
    }

    pub fn find_foreign_type(&self, module: &str, name: &str) -> Option<(&Kind, Option<&Ty>)> {
        self.foreign_types.get(&(module.to_string(), name.to_string())).map(|(k, u)| (k, u.as_ref()))
    }

    // ── Trait registry ───────────────────────────────────────────────

    pub fn define_trait(&mut self, def: crate::traits::TraitDef) {
        self.traits.insert(def.name.clone(), def);
    }

    pub fn find_trait(&self, name: &str) -> Option<&crate::traits::TraitDef> {
        self.traits.get(name)
    }

    pub fn trait_names(&self) -> Vec<String> {
        self.traits.keys().cloned().collect()
    }

    pub fn operator_trait(&self, op: &str) -> Option<&str> {
        self.operator_traits.get(op).map(String::as_str)
    }

    pub fn register_instance(&mut self, instance: Instance) {
        self.instances.push(instance);
    }

    pub fn instances_for(&self, trait_name: &str) -> impl Iterator<Item = &Instance> {
        self.instances.iter().filter(move |i| i.trait_name == trait_name)
    }

    pub fn all_instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn register_evidence(&mut self, trait_name: impl Into<String>, args_key: impl Into<String>, evidence_name: impl Into<String>) {
        self.evidence.insert((trait_name.into(), args_key.into()), evidence_name.into());
    }

    pub fn get_evidence(&self, trait_name: &str, args_key: &str) -> Option<&str> {
        self.evidence.get(&(trait_name.to_string(), args_key.to_string())).map(String::as_str)
    }

    pub fn define_extension_method(&mut self, ty_name: impl Into<String>, method: impl Into<String>, scheme: Scheme) {
        self.extension_methods.insert((ty_name.into(), method.into()), scheme);
    }

    pub fn find_extension_method(&self, ty_name: &str, method: &str) -> Option<&Scheme> {
        self.extension_methods.get(&(ty_name.to_string(), method.to_string()))
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl crate::unify::AliasResolver for SymbolTable {
    fn expand_alias(&self, con: &TyCon) -> Option<Ty> {
        if con.is_rigid() {
            return None;
        }
        self.resolve_type_alias(&con.name).cloned().or_else(|| con.underlying.as_deref().cloned())
    }
}

/// A constraint paired with the span of the call/use-site it was
/// collected at, for later witness resolution (spec.md §4.3 "Pending
/// witness queue").
#[derive(Debug, Clone)]
pub struct PendingConstraint {
    pub constraint: Constraint,
    pub span: Span,
}
