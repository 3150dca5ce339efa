//! Multi-module driver (spec.md §4.7): runs Naming → Headers → Instances →
//! Bodies over a module's own files and, for each pass, recursively drives
//! the very same pass on every module that module imports, before touching
//! its own items. Per-module, per-pass `Analyzing`/`Analyzed` flags make
//! re-entry into a module whose pass is already running a safe no-op
//! (spec.md §9 "Cyclic module graphs"), so import cycles never loop.
//!
//! Grounded on the teacher's `Analyzer::analyze_module`'s four sequential
//! `analyze_*` sweeps over `file.imports`, generalized here from the
//! teacher's single shared `TypeEnv` to one [`crate::scope::SymbolTable`]
//! per module (so Naming's pending placeholders stay private to the
//! module that declared them) plus one [`TraitRegistry`] and one
//! [`InferCtx`] shared across the whole run (spec.md §5 "the only shared
//! mutable state per analysis run is the `InferenceContext`, the symbol
//! table, and module flags").

use rustc_hash::{FxHashMap, FxHashSet};

use mesh_common::ast::{
    Item, LoadError, LoadedModule, ModuleLoader, NodeId, Program, ReexportSpec, SourceFile,
};
use mesh_common::{Diagnostic, DiagnosticSink};

use crate::builtins;
use crate::infer::{Infer, TypeMap};
use crate::items;
use crate::kind::Kind;
use crate::options::AnalysisOptions;
use crate::scope::SymbolTable;
use crate::traits::TraitRegistry;
use crate::unify::InferCtx;
use crate::witness::WitnessMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Naming,
    Headers,
    Instances,
    Bodies,
}

const PASSES: [Pass; 4] = [Pass::Naming, Pass::Headers, Pass::Instances, Pass::Bodies];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum PassState {
    #[default]
    NotStarted,
    Analyzing,
    Analyzed,
}

#[derive(Debug, Clone, Copy, Default)]
struct PassFlags {
    naming: PassState,
    headers: PassState,
    instances: PassState,
    bodies: PassState,
}

impl PassFlags {
    fn get(&self, pass: Pass) -> PassState {
        match pass {
            Pass::Naming => self.naming,
            Pass::Headers => self.headers,
            Pass::Instances => self.instances,
            Pass::Bodies => self.bodies,
        }
    }

    fn set(&mut self, pass: Pass, state: PassState) {
        match pass {
            Pass::Naming => self.naming = state,
            Pass::Headers => self.headers = state,
            Pass::Instances => self.instances = state,
            Pass::Bodies => self.bodies = state,
        }
    }
}

/// One module's own state across the four passes: its files (reordered
/// entry-file-last, spec.md §4.7), its private symbol table, and the
/// decorated-AST side tables this module's Bodies pass produces.
pub struct ModuleUnit {
    pub name: String,
    pub files: Vec<SourceFile>,
    pub table: SymbolTable,
    pub types: TypeMap,
    pub witnesses: WitnessMap,
    pub resolution: FxHashMap<NodeId, String>,
    reexports: Vec<ReexportSpec>,
    flags: PassFlags,
}

/// Everything the driver produces for a full program: every module it
/// visited, each decorated per spec.md §6, plus the merged diagnostics
/// stream (spec.md §6 "Diagnostics channel").
pub struct AnalysisOutput {
    pub modules: FxHashMap<String, ModuleUnit>,
    pub diagnostics: DiagnosticSink,
    /// Root-level entry point for `OperatorTraits` (spec.md §6): shared
    /// across every module since operators dispatch through the same
    /// built-in traits everywhere.
    pub traits: TraitRegistry,
}

/// Runs the four-pass driver over an entry [`Program`], fetching any module
/// it imports (transitively) through `loader` (spec.md §6 "Module loader").
pub struct Driver<'a> {
    loader: &'a dyn ModuleLoader,
    ctx: InferCtx,
    traits: TraitRegistry,
    /// A symbol table already seeded with the prelude (spec.md §6 "A
    /// prelude is registered once per process"), cloned as the starting
    /// point for every module's own table so `Int`, `print`, etc. are
    /// visible everywhere without re-registering prelude instances into
    /// the shared `traits` registry once per module.
    prelude_table: SymbolTable,
    modules: FxHashMap<String, ModuleUnit>,
    diagnostics: DiagnosticSink,
}

impl<'a> Driver<'a> {
    pub fn new(loader: &'a dyn ModuleLoader, options: AnalysisOptions) -> Self {
        let mut ctx = InferCtx::new(options);
        let mut traits = TraitRegistry::new();
        let mut prelude_table = SymbolTable::new();
        builtins::register_prelude(&mut prelude_table, &mut traits, &mut ctx);
        Driver { loader, ctx, traits, prelude_table, modules: FxHashMap::default(), diagnostics: DiagnosticSink::new() }
    }

    /// Analyze `program`'s entry module (and everything it transitively
    /// imports), running all four passes in order.
    pub fn analyze(mut self, program: &Program) -> AnalysisOutput {
        self.insert_module(program.entry_module.clone(), program.files.clone(), Vec::new());
        for pass in PASSES {
            self.drive(&program.entry_module, pass);
        }
        AnalysisOutput { modules: self.modules, diagnostics: self.diagnostics, traits: self.traits }
    }

    fn insert_module(&mut self, name: String, files: Vec<SourceFile>, reexports: Vec<ReexportSpec>) {
        if self.modules.contains_key(&name) {
            return;
        }
        let files = order_files(&name, files);
        let unit = ModuleUnit {
            name: name.clone(),
            files,
            table: self.prelude_table.clone(),
            types: TypeMap::default(),
            witnesses: WitnessMap::default(),
            resolution: FxHashMap::default(),
            reexports,
            flags: PassFlags::default(),
        };
        self.modules.insert(name, unit);
    }

    /// Ensures `name` is loaded into `self.modules`, fetching it from the
    /// loader on first reference. Returns `false` if the loader cannot
    /// find it at all (spec.md §6 "module not found" -> `A001`).
    fn ensure_loaded(&mut self, name: &str) -> bool {
        if self.modules.contains_key(name) {
            return true;
        }
        match self.loader.get_module_by_package_name(name) {
            Some(loaded) => {
                self.insert_module(name.to_string(), loaded.files, loaded.reexports);
                true
            }
            None => false,
        }
    }

    /// Every module this module's files import, as canonical (dotted)
    /// names, in source order with duplicates removed.
    fn collect_imports(&self, name: &str) -> Vec<String> {
        let mut seen = FxHashSet::default();
        let mut imports = Vec::new();
        let Some(unit) = self.modules.get(name) else { return imports };
        for file in &unit.files {
            for item in &file.items {
                if let Item::Import(import) = item {
                    let canonical = import.path.join(".");
                    if seen.insert(canonical.clone()) {
                        imports.push(canonical);
                    }
                }
            }
        }
        imports
    }

    /// Drives `pass` on `name`, recursively driving the same pass on every
    /// module it imports first (spec.md §4.7). Re-entering a module whose
    /// pass is already `Analyzing` is a safe no-op that breaks import
    /// cycles (spec.md §9).
    fn drive(&mut self, name: &str, pass: Pass) {
        let Some(unit) = self.modules.get(name) else { return };
        if unit.flags.get(pass) != PassState::NotStarted {
            log::debug!("{pass:?} on {name}: already {:?}, safe no-op (cycle guard)", unit.flags.get(pass));
            return;
        }
        log::trace!("{pass:?} on {name}: starting");
        self.modules.get_mut(name).unwrap().flags.set(pass, PassState::Analyzing);

        for dep in self.collect_imports(name) {
            if self.ensure_loaded(&dep) {
                self.drive(&dep, pass);
                self.stitch_import(name, &dep, pass);
            } else if pass == Pass::Naming {
                self.report_module_not_found(name, &dep);
            }
        }

        match pass {
            Pass::Naming => self.run_naming(name),
            Pass::Headers => self.run_headers(name),
            Pass::Instances => self.run_instances(name),
            Pass::Bodies => self.run_bodies(name),
        }

        self.modules.get_mut(name).unwrap().flags.set(pass, PassState::Analyzed);
        log::trace!("{pass:?} on {name}: finished");
    }

    fn report_module_not_found(&mut self, importer: &str, missing: &str) {
        log::warn!("{importer} imports unresolvable module {missing}");
        let file = self.modules.get(importer).and_then(|u| u.files.first()).map(|f| f.path.clone()).unwrap_or_default();
        let error = crate::error::TypeError::UndeclaredIdentifier {
            name: missing.to_string(),
            span: mesh_common::Span::synthetic(),
            suggestion: None,
        };
        self.diagnostics.push(error.into_diagnostic(file));
    }

    /// After module `dep`'s `pass` has completed, pulls whatever that pass
    /// makes visible into `importer`'s own table (spec.md §4.3 "Qualified
    /// names", §4.7 "re-exports are resolved after all imports complete").
    /// Only the Headers pass produces anything to stitch: Naming's pending
    /// placeholders are private, and Instances/Bodies register into the
    /// `traits` registry this whole run already shares.
    fn stitch_import(&mut self, importer: &str, dep: &str, pass: Pass) {
        if pass != Pass::Headers {
            return;
        }
        let Some(dep_unit) = self.modules.get(dep) else { return };
        let exported_values = dep_unit.exported_value_names();
        let exported_types = dep_unit.exported_type_names();
        let explicit_names = dep_unit_explicit_imports(self.modules.get(importer), dep);

        let mut to_import_values: Vec<(String, Option<String>)> = Vec::new();
        let mut to_import_types: Vec<(String, Option<String>)> = Vec::new();
        for (name, alias) in &explicit_names {
            if exported_values.contains(name) {
                to_import_values.push((name.clone(), alias.clone()));
            } else if exported_types.contains(name) {
                to_import_types.push((name.clone(), alias.clone()));
            }
        }

        let dep_unit = self.modules.get(dep).unwrap();
        let mut qualified_values = Vec::new();
        for value_name in &exported_values {
            if let Some(symbol) = dep_unit.table.find(value_name) {
                qualified_values.push((value_name.clone(), symbol.scheme.clone(), symbol.span));
            }
        }
        let mut qualified_types = Vec::new();
        for type_name in &exported_types {
            if let Some(info) = dep_unit.table.find_type(type_name) {
                let kind = dep_unit.table.find_kind(type_name).cloned().unwrap_or(Kind::Star);
                qualified_types.push((type_name.clone(), info.clone(), kind));
            } else if let Some(underlying) = dep_unit.table.resolve_type_alias(type_name) {
                let kind = dep_unit.table.find_kind(type_name).cloned().unwrap_or(Kind::Star);
                qualified_types.push((type_name.clone(), crate::scope::TypeDefInfo {
                    con: crate::ty::TyCon::with_module(type_name.clone(), dep.to_string(), kind.clone()),
                    kind: crate::scope::TypeDefKind::Alias { underlying: underlying.clone() },
                    span: mesh_common::Span::synthetic(),
                }, kind));
            }
        }
        let resolved_values: Vec<(String, crate::ty::Scheme, mesh_common::Span)> = to_import_values
            .iter()
            .filter_map(|(name, _)| dep_unit.table.find(name).map(|s| (name.clone(), s.scheme.clone(), s.span)))
            .collect();
        let alias_map: FxHashMap<String, String> = explicit_names
            .iter()
            .filter_map(|(name, alias)| alias.clone().map(|a| (name.clone(), a)))
            .collect();

        let Some(importer_unit) = self.modules.get_mut(importer) else { return };
        for (name, scheme, span) in &qualified_values {
            importer_unit.table.define_imported(format!("{dep}.{name}"), scheme.clone(), *span);
        }
        for (name, info, kind) in &qualified_types {
            let underlying = match &info.kind {
                crate::scope::TypeDefKind::Alias { underlying } => Some(underlying.clone()),
                _ => None,
            };
            importer_unit.table.define_foreign_type(dep.to_string(), name.clone(), kind.clone(), underlying);
        }
        for (name, scheme, span) in &resolved_values {
            let local_name = alias_map.get(name).cloned().unwrap_or_else(|| name.clone());
            importer_unit.table.define_imported(local_name, scheme.clone(), *span);
        }
        for (name, _alias) in &to_import_types {
            if let Some((_, info, _)) = qualified_types.iter().find(|(n, _, _)| n == name) {
                let mut local = info.clone();
                local.con.module = None;
                importer_unit.table.define_type(local);
            }
        }
        if let Some(whole_alias) = dep_unit_whole_module_alias(self.modules.get(importer), dep) {
            importer_unit.table.define_module_alias(whole_alias, dep.to_string());
        }
    }

    fn run_naming(&mut self, name: &str) {
        let files = self.clone_files(name);
        let Some(unit) = self.modules.get_mut(name) else { return };
        let mut infer = Infer::new(&mut self.ctx, &mut unit.table, &mut self.traits, &mut unit.types);
        for file in &files {
            for item in &file.items {
                items::name_item(&mut infer, item);
            }
            self.drain_errors(&file.path);
        }
    }

    fn run_headers(&mut self, name: &str) {
        let files = self.clone_files(name);
        let Some(unit) = self.modules.get_mut(name) else { return };
        let mut infer = Infer::new(&mut self.ctx, &mut unit.table, &mut self.traits, &mut unit.types);
        for file in &files {
            for item in &file.items {
                items::header_item(&mut infer, item);
            }
            self.drain_errors(&file.path);
        }
    }

    fn run_instances(&mut self, name: &str) {
        let files = self.clone_files(name);
        let Some(unit) = self.modules.get_mut(name) else { return };
        let mut infer = Infer::new(&mut self.ctx, &mut unit.table, &mut self.traits, &mut unit.types);
        for file in &files {
            for item in &file.items {
                if let Item::Instance(inst) = item {
                    items::instance_item(&mut infer, inst);
                }
            }
            self.drain_errors(&file.path);
        }
    }

    fn run_bodies(&mut self, name: &str) {
        let files = self.clone_files(name);
        let (witnesses, resolution) = {
            let Some(unit) = self.modules.get_mut(name) else { return };
            let mut infer = Infer::new(&mut self.ctx, &mut unit.table, &mut self.traits, &mut unit.types);
            for file in &files {
                for item in &file.items {
                    items::body_item(&mut infer, item);
                }
                let errors: Vec<_> = std::mem::take(&mut infer.ctx.errors);
                for error in errors {
                    self.diagnostics.push(error.into_diagnostic(file.path.clone()));
                }
            }
            (infer.witnesses.clone(), infer.resolution.clone())
        };
        let Some(unit) = self.modules.get_mut(name) else { return };
        unit.witnesses.extend(witnesses);
        unit.resolution.extend(resolution);
    }

    fn clone_files(&self, name: &str) -> Vec<SourceFile> {
        self.modules.get(name).map(|u| u.files.clone()).unwrap_or_default()
    }

    fn drain_errors(&mut self, file: &str) {
        let errors: Vec<_> = std::mem::take(&mut self.ctx.errors);
        for error in errors {
            self.diagnostics.push(error.into_diagnostic(file.to_string()));
        }
    }
}

impl ModuleUnit {
    /// Every `pub` function, constant, or sum-type constructor this module
    /// declares at top level, plus whatever it re-exports from elsewhere
    /// (spec.md §4.7 "re-exports are resolved after all imports complete").
    fn exported_value_names(&self) -> FxHashSet<String> {
        let mut names = FxHashSet::default();
        for file in &self.files {
            for item in &file.items {
                match item {
                    Item::Fun(f) if f.is_pub => {
                        names.insert(f.name.clone());
                    }
                    Item::Const(c) if c.is_pub => {
                        names.insert(c.name.clone());
                    }
                    Item::Type(t) if t.is_pub => {
                        for variant in &t.variants {
                            names.insert(variant.name.clone());
                        }
                    }
                    _ => {}
                }
            }
        }
        for reexport in &self.reexports {
            names.extend(reexport.names.iter().map(|n| n.alias.clone().unwrap_or_else(|| n.name.clone())));
        }
        names
    }

    fn exported_type_names(&self) -> FxHashSet<String> {
        let mut names = FxHashSet::default();
        for file in &self.files {
            for item in &file.items {
                match item {
                    Item::Type(t) if t.is_pub => {
                        names.insert(t.name.clone());
                    }
                    Item::TypeAlias(a) if a.is_pub => {
                        names.insert(a.name.clone());
                    }
                    _ => {}
                }
            }
        }
        names
    }
}

/// Names this module's own `import` of `dep` lists explicitly
/// (`from Dep import a, b as c`), each paired with its local alias if any.
fn dep_unit_explicit_imports(importer: Option<&ModuleUnit>, dep: &str) -> Vec<(String, Option<String>)> {
    let Some(importer) = importer else { return Vec::new() };
    let mut out = Vec::new();
    for file in &importer.files {
        for item in &file.items {
            if let Item::Import(import) = item {
                if import.path.join(".") == dep {
                    for name in &import.names {
                        out.push((name.name.clone(), name.alias.clone()));
                    }
                }
            }
        }
    }
    out
}

/// The local alias bound for a whole-module import with no explicit name
/// list (`import Geo from "geometry"` -> `Geo.someFunc`), spec.md §4.2
/// "Aliasing of modules".
fn dep_unit_whole_module_alias(importer: Option<&ModuleUnit>, dep: &str) -> Option<String> {
    let importer = importer?;
    for file in &importer.files {
        for item in &file.items {
            if let Item::Import(import) = item {
                if import.path.join(".") == dep && import.names.is_empty() {
                    return import.alias.clone().or_else(|| import.path.last().cloned());
                }
            }
        }
    }
    None
}

/// spec.md §4.7 "The driver orders files within a module so that the file
/// whose basename matches the package name is processed last".
fn order_files(module_name: &str, mut files: Vec<SourceFile>) -> Vec<SourceFile> {
    let package = module_name.rsplit('.').next().unwrap_or(module_name);
    files.sort_by_key(|f| {
        let stem = std::path::Path::new(&f.path).file_stem().and_then(|s| s.to_str()).unwrap_or(f.path.as_str());
        stem.eq_ignore_ascii_case(package)
    });
    files
}

/// A `ModuleLoader` over a fixed in-memory map, for tests and for
/// single-module callers that have no real loader (spec.md §6).
pub struct InMemoryLoader {
    modules: FxHashMap<String, LoadedModule>,
}

impl InMemoryLoader {
    pub fn new(modules: Vec<LoadedModule>) -> Self {
        Self { modules: modules.into_iter().map(|m| (m.name.clone(), m)).collect() }
    }
}

impl ModuleLoader for InMemoryLoader {
    fn get_module(&self, absolute_path: &str) -> Result<LoadedModule, LoadError> {
        self.modules.get(absolute_path).cloned().ok_or_else(|| LoadError::NotFound(absolute_path.to_string()))
    }

    fn get_module_by_package_name(&self, name: &str) -> Option<LoadedModule> {
        self.modules.get(name).cloned()
    }
}
