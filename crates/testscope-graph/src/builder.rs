// ABOUTME: Runs the extractor over every indexed module and builds the reverse-dependency graph.
// ABOUTME: The augmentation pass normalizes package-attribute module references to whole-module imports.
use std::collections::{HashMap, HashSet};

use testscope_core::{ModuleData, ModuleIndex, SymbolRef};
use testscope_parser::{analyze_module, LanguageRegistry};
use tracing::debug;

/// module name -> symbol-or-sentinel -> modules that import it.
pub type ReverseGraph = HashMap<String, HashMap<SymbolRef, HashSet<String>>>;

/// Per-module extraction results plus the inverted adjacency map.
#[derive(Debug, Default)]
pub struct ImpactAnalysis {
    pub module_data: HashMap<String, ModuleData>,
    pub reverse_imports: ReverseGraph,
}

/// Analyze every indexed module and invert the import triples.
///
/// Construction is pure: identical file content yields identical maps
/// regardless of filesystem traversal order.
pub fn build_analysis(registry: &LanguageRegistry, index: &ModuleIndex) -> ImpactAnalysis {
    let mut analysis = ImpactAnalysis::default();

    for (module_name, info) in &index.modules {
        let extracted = analyze_module(registry, info);
        let mut imports = extracted.imports;

        // A submodule obtained via attribute access on its parent package is
        // syntactically a plain symbol import; when the dotted concatenation
        // names an indexed module, treat it as a whole-module import too.
        let candidates: Vec<String> = imports
            .iter()
            .flat_map(|(target, symbols)| {
                symbols.iter().filter_map(move |symbol| match symbol {
                    SymbolRef::Name(name) => Some(format!("{target}.{name}")),
                    SymbolRef::Module => None,
                })
            })
            .filter(|candidate| index.contains(candidate))
            .collect();
        for candidate in candidates {
            debug!("{module_name}: promoting {candidate} to whole-module import");
            imports
                .entry(candidate)
                .or_default()
                .insert(SymbolRef::Module);
        }

        let module_data = ModuleData {
            exports: extracted.exports,
            imports,
        };

        for (target, symbols) in &module_data.imports {
            for symbol in symbols {
                analysis
                    .reverse_imports
                    .entry(target.clone())
                    .or_default()
                    .entry(symbol.clone())
                    .or_default()
                    .insert(module_name.clone());
            }
        }
        analysis.module_data.insert(module_name.clone(), module_data);
    }

    analysis
}
