// ABOUTME: Extracts exported symbols and the import table from one module's content.
// ABOUTME: Any unreadable, undecodable, or unparsable input degrades to an empty ModuleData.
use std::collections::{HashMap, HashSet};
use std::fs;

use testscope_core::{ModuleData, ModuleInfo, SymbolRef};
use tracing::debug;
use tree_sitter::{Node, TreeCursor};

use crate::LanguageRegistry;

/// Analyze one indexed module's file content. Never errors: a module that
/// cannot be read or parsed contributes no static signal.
pub fn analyze_module(registry: &LanguageRegistry, info: &ModuleInfo) -> ModuleData {
    let bytes = match fs::read(&info.path) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("unreadable module {}: {}", info.path.display(), e);
            return ModuleData::default();
        }
    };
    let Ok(text) = String::from_utf8(bytes) else {
        debug!("non-UTF-8 module {}", info.path.display());
        return ModuleData::default();
    };
    analyze_source(registry, info, &text)
}

/// Pure extraction from source text to `ModuleData`.
pub fn analyze_source(registry: &LanguageRegistry, info: &ModuleInfo, source: &str) -> ModuleData {
    let Some(mut parser) = registry.create_parser() else {
        return ModuleData::default();
    };
    let Some(tree) = parser.parse(source, None) else {
        return ModuleData::default();
    };
    let root = tree.root_node();
    if root.has_error() {
        debug!("syntax errors in module {}", info.name);
        return ModuleData::default();
    }

    let mut extractor = Extractor {
        info,
        source,
        exports: HashSet::new(),
        imports: HashMap::new(),
    };
    extractor.collect_top_level(root);
    extractor.walk_imports(root);

    ModuleData {
        exports: extractor.exports,
        imports: extractor.imports,
    }
}

struct Extractor<'a> {
    info: &'a ModuleInfo,
    source: &'a str,
    exports: HashSet<String>,
    imports: HashMap<String, HashSet<SymbolRef>>,
}

impl<'a> Extractor<'a> {
    fn text(&self, node: Node) -> Option<String> {
        node.utf8_text(self.source.as_bytes())
            .ok()
            .map(str::to_string)
    }

    fn add_import(&mut self, target_module: &str, symbol: SymbolRef) {
        if target_module.is_empty() {
            return;
        }
        self.imports
            .entry(target_module.to_string())
            .or_default()
            .insert(symbol);
    }

    /// Definitions and assignments only export when they sit at module top
    /// level; nested names are invisible to importers.
    fn collect_top_level(&mut self, module: Node) {
        let mut cursor = module.walk();
        for child in module.named_children(&mut cursor) {
            self.collect_definition(child);
        }
    }

    fn collect_definition(&mut self, node: Node) {
        match node.kind() {
            "function_definition" | "class_definition" => {
                if let Some(name) = node.child_by_field_name("name").and_then(|n| self.text(n)) {
                    self.exports.insert(name);
                }
            }
            "decorated_definition" => {
                if let Some(definition) = node.child_by_field_name("definition") {
                    self.collect_definition(definition);
                }
            }
            "expression_statement" => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    if child.kind() == "assignment" {
                        self.collect_assignment_targets(child);
                    }
                }
            }
            _ => {}
        }
    }

    fn collect_assignment_targets(&mut self, assignment: Node) {
        if let Some(left) = assignment.child_by_field_name("left") {
            if left.kind() == "identifier" {
                if let Some(name) = self.text(left) {
                    self.exports.insert(name);
                }
            }
        }
        // Chained assignment nests on the right: a = b = 1.
        if let Some(right) = assignment.child_by_field_name("right") {
            if right.kind() == "assignment" {
                self.collect_assignment_targets(right);
            }
        }
    }

    /// Import statements bind names wherever they appear, so the whole tree
    /// is walked for them.
    fn walk_imports(&mut self, root: Node) {
        let mut cursor = root.walk();
        self.visit_import_node(&mut cursor);
    }

    fn visit_import_node(&mut self, cursor: &mut TreeCursor) {
        let node = cursor.node();
        match node.kind() {
            "import_statement" => self.record_plain_import(node),
            "import_from_statement" => self.record_from_import(node),
            _ => {}
        }

        if cursor.goto_first_child() {
            loop {
                self.visit_import_node(cursor);
                if !cursor.goto_next_sibling() {
                    break;
                }
            }
            cursor.goto_parent();
        }
    }

    fn record_plain_import(&mut self, node: Node) {
        let mut cursor = node.walk();
        for name in node.children_by_field_name("name", &mut cursor) {
            let (target, binding) = match name.kind() {
                "dotted_name" => {
                    let Some(target) = self.text(name) else { continue };
                    let binding = target.split('.').next().unwrap_or("").to_string();
                    (target, binding)
                }
                "aliased_import" => {
                    let target = name
                        .child_by_field_name("name")
                        .and_then(|n| self.text(n));
                    let binding = name
                        .child_by_field_name("alias")
                        .and_then(|n| self.text(n));
                    let (Some(target), Some(binding)) = (target, binding) else {
                        continue;
                    };
                    (target, binding)
                }
                _ => continue,
            };
            self.add_import(&target, SymbolRef::Module);
            if !binding.is_empty() {
                self.exports.insert(binding);
            }
        }
    }

    fn record_from_import(&mut self, node: Node) {
        let (module, level) = match node.child_by_field_name("module_name") {
            Some(module_name) => match module_name.kind() {
                "dotted_name" => (self.text(module_name), 0),
                "relative_import" => {
                    let mut level = 0;
                    let mut module = None;
                    let mut cursor = module_name.walk();
                    for child in module_name.children(&mut cursor) {
                        match child.kind() {
                            "import_prefix" => {
                                level = self
                                    .text(child)
                                    .map_or(0, |dots| dots.chars().filter(|c| *c == '.').count());
                            }
                            "dotted_name" => module = self.text(child),
                            _ => {}
                        }
                    }
                    (module, level)
                }
                _ => return,
            },
            None => return,
        };

        let Some(target) = resolve_import_module(self.info, module.as_deref(), level) else {
            return;
        };

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "wildcard_import" {
                // Conservative: any change to the target may affect us.
                self.add_import(&target, SymbolRef::Module);
                return;
            }
        }

        let mut cursor = node.walk();
        for name in node.children_by_field_name("name", &mut cursor) {
            let binding = match name.kind() {
                "dotted_name" => self.text(name),
                "aliased_import" => name.child_by_field_name("alias").and_then(|n| self.text(n)),
                _ => None,
            };
            let Some(binding) = binding else { continue };
            self.add_import(&target, SymbolRef::name(binding.clone()));
            self.exports.insert(binding);
        }
    }
}

/// Resolve a (possibly relative) import target to an absolute dotted name.
///
/// Level 0 is already absolute. Level 1 resolves against the importing
/// module's own package; each additional level climbs one package higher
/// before the target's own segments are appended.
pub fn resolve_import_module(
    info: &ModuleInfo,
    module: Option<&str>,
    level: usize,
) -> Option<String> {
    if level == 0 {
        return module.map(str::to_string);
    }

    let mut base: Vec<&str> = info.package_parts.iter().map(String::as_str).collect();
    if level > 1 {
        let drop = (level - 1).min(base.len());
        base.truncate(base.len() - drop);
    }
    if let Some(module) = module {
        base.extend(module.split('.'));
    }

    let result = base
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(".");
    if result.is_empty() {
        None
    } else {
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn module_info(name: &str, is_package: bool) -> ModuleInfo {
        let mut package_parts: Vec<String> = name.split('.').map(str::to_string).collect();
        if !is_package {
            package_parts.pop();
        }
        ModuleInfo {
            name: name.to_string(),
            path: PathBuf::from(format!("/repo/{}.py", name.replace('.', "/"))),
            package_parts,
            is_package,
        }
    }

    fn analyze(name: &str, source: &str) -> ModuleData {
        let registry = LanguageRegistry::new();
        analyze_source(&registry, &module_info(name, false), source)
    }

    #[test]
    fn exports_cover_defs_assignments_and_import_bindings() {
        let data = analyze(
            "core",
            r#"
import math
from math import sqrt as root

CONSTANT = 1


@decorator
def use(value):
    return root(value) + math.ceil(value)


class Engine:
    def method(self):
        return CONSTANT
"#,
        );
        for name in ["math", "root", "CONSTANT", "use", "Engine"] {
            assert!(data.exports.contains(name), "missing export {name}");
        }
        // Method names are not module-level exports.
        assert!(!data.exports.contains("method"));
        assert!(data.imports["math"].contains(&SymbolRef::Module));
        assert!(data.imports["math"].contains(&SymbolRef::name("root")));
    }

    #[test]
    fn plain_import_binds_top_name_and_records_sentinel() {
        let data = analyze("app", "import os.path\n");
        assert!(data.exports.contains("os"));
        assert_eq!(
            data.imports["os.path"],
            HashSet::from([SymbolRef::Module])
        );
    }

    #[test]
    fn aliased_plain_import_binds_alias() {
        let data = analyze("app", "import numpy as np\n");
        assert!(data.exports.contains("np"));
        assert!(data.imports["numpy"].contains(&SymbolRef::Module));
    }

    #[test]
    fn wildcard_import_records_only_sentinel() {
        let data = analyze("app", "from helpers import *\n");
        assert_eq!(
            data.imports["helpers"],
            HashSet::from([SymbolRef::Module])
        );
    }

    #[test]
    fn nested_imports_are_recorded() {
        let data = analyze(
            "app",
            r#"
def lazy():
    from engine import compute
    return compute(1)
"#,
        );
        assert!(data.imports["engine"].contains(&SymbolRef::name("compute")));
        // The nested function itself is top level, its body names are not.
        assert!(data.exports.contains("lazy"));
        assert!(!data.exports.contains("compute"));
    }

    #[test]
    fn chained_assignment_exports_all_targets() {
        let data = analyze("app", "A = B = 1\n");
        assert!(data.exports.contains("A"));
        assert!(data.exports.contains("B"));
    }

    #[test]
    fn unparsable_source_yields_empty_data() {
        let data = analyze("app", "def broken(:\n");
        assert_eq!(data, ModuleData::default());
    }

    #[test]
    fn unreadable_file_yields_empty_data() {
        let registry = LanguageRegistry::new();
        let info = module_info("ghost", false);
        assert_eq!(analyze_module(&registry, &info), ModuleData::default());
    }

    #[test]
    fn relative_import_resolves_against_own_package() {
        let registry = LanguageRegistry::new();
        let info = module_info("pkg.sub.mod", false);
        let data = analyze_source(&registry, &info, "from . import sibling\n");
        assert!(data.imports["pkg.sub"].contains(&SymbolRef::name("sibling")));

        let data = analyze_source(&registry, &info, "from .other import thing\n");
        assert!(data.imports["pkg.sub.other"].contains(&SymbolRef::name("thing")));

        let data = analyze_source(&registry, &info, "from ..top import thing\n");
        assert!(data.imports["pkg.top"].contains(&SymbolRef::name("thing")));
    }

    #[test]
    fn package_entry_point_is_its_own_package() {
        let registry = LanguageRegistry::new();
        let info = module_info("pkg.sub", true);
        let data = analyze_source(&registry, &info, "from .mod import thing\n");
        assert!(data.imports["pkg.sub.mod"].contains(&SymbolRef::name("thing")));
    }

    #[test]
    fn resolve_levels_climb_packages() {
        let info = module_info("a.b.c.d", false);
        assert_eq!(
            resolve_import_module(&info, Some("x"), 0).as_deref(),
            Some("x")
        );
        assert_eq!(
            resolve_import_module(&info, Some("x"), 1).as_deref(),
            Some("a.b.c.x")
        );
        assert_eq!(
            resolve_import_module(&info, Some("x"), 3).as_deref(),
            Some("a.x")
        );
        assert_eq!(resolve_import_module(&info, None, 1).as_deref(), Some("a.b.c"));
        // Climbing past the top degrades to the bare target.
        assert_eq!(
            resolve_import_module(&info, Some("x"), 9).as_deref(),
            Some("x")
        );
        assert_eq!(resolve_import_module(&info, None, 9), None);
    }
}
