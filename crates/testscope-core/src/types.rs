// ABOUTME: Shared data model for module indexing and dependency analysis.
// ABOUTME: All structures are built fresh per invocation and never mutated after construction.
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// What an importer depends on within a target module.
///
/// The whole-module sentinel is a distinct variant rather than a magic
/// string, so it can never collide with a legal symbol name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SymbolRef {
    /// A concrete top-level name imported from the target module.
    Name(String),
    /// The importer depends on the entire module (plain or wildcard import).
    Module,
}

impl SymbolRef {
    pub fn name(value: impl Into<String>) -> Self {
        SymbolRef::Name(value.into())
    }

    pub fn is_module(&self) -> bool {
        matches!(self, SymbolRef::Module)
    }
}

/// One indexed source file: its qualified dotted name, location, and
/// package membership, derived once at index-build time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
    pub path: PathBuf,
    pub package_parts: Vec<String>,
    pub is_package: bool,
}

/// Exports and imports extracted from one module's content.
///
/// `imports` maps each target module name to the set of symbols the module
/// references in it; `SymbolRef::Module` denotes a plain or wildcard import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleData {
    pub exports: HashSet<String>,
    pub imports: HashMap<String, HashSet<SymbolRef>>,
}

/// Name and path lookup tables for every indexed module.
#[derive(Debug, Default)]
pub struct ModuleIndex {
    pub modules: HashMap<String, ModuleInfo>,
    pub by_path: HashMap<PathBuf, String>,
}

impl ModuleIndex {
    pub fn get(&self, name: &str) -> Option<&ModuleInfo> {
        self.modules.get(name)
    }

    pub fn module_for_path(&self, path: &Path) -> Option<&str> {
        self.by_path.get(path).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
