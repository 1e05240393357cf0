// ABOUTME: Breadth-first impact resolution over the reverse-dependency graph.
// ABOUTME: Test modules are sinks; the lexical fallback catches non-import coupling.
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;

use testscope_core::{Config, ModuleIndex, ModuleInfo, SymbolRef};
use tracing::debug;

use crate::builder::ImpactAnalysis;
use crate::tokens::TokenCollector;

/// Computes the set of impacted test modules for a set of changed files.
pub struct ImpactResolver<'a> {
    config: &'a Config,
    index: &'a ModuleIndex,
    analysis: &'a ImpactAnalysis,
    tokenizer: TokenCollector<'a>,
    test_tokens: HashMap<PathBuf, HashSet<String>>,
    test_dir_tokens: HashMap<PathBuf, HashSet<String>>,
}

impl<'a> ImpactResolver<'a> {
    pub fn new(config: &'a Config, index: &'a ModuleIndex, analysis: &'a ImpactAnalysis) -> Self {
        let tokenizer = TokenCollector::new(&config.root, &config.tokens);

        let mut test_tokens = HashMap::new();
        let mut test_dir_tokens = HashMap::new();
        for info in index.modules.values() {
            if !is_test_module(config, info) {
                continue;
            }
            test_tokens.insert(info.path.clone(), tokenizer.path_tokens(&info.path));
            test_dir_tokens.insert(info.path.clone(), tokenizer.directory_tokens(&info.path));
        }

        Self {
            config,
            index,
            analysis,
            tokenizer,
            test_tokens,
            test_dir_tokens,
        }
    }

    /// Resolve impacted test-module paths for the changed files. Paths
    /// outside the index contribute nothing to graph seeding but remain
    /// eligible for the lexical fallback. Output is sorted.
    pub fn resolve(&self, changed_paths: &[PathBuf]) -> Vec<PathBuf> {
        if changed_paths.is_empty() {
            return Vec::new();
        }

        let mut impacted: HashSet<String> = HashSet::new();
        self.propagate_graph_impact(changed_paths, &mut impacted);
        self.apply_token_fallback(changed_paths, &mut impacted);

        let mut paths: Vec<PathBuf> = impacted
            .iter()
            .filter_map(|module| self.index.get(module))
            .filter(|info| is_test_module(self.config, info))
            .map(|info| info.path.clone())
            .collect();
        paths.sort();
        paths
    }

    fn propagate_graph_impact(&self, changed_paths: &[PathBuf], impacted: &mut HashSet<String>) {
        let changed_modules: HashSet<&str> = changed_paths
            .iter()
            .filter_map(|path| self.index.module_for_path(path))
            .collect();
        if changed_modules.is_empty() {
            return;
        }
        debug!("seeding impact queue from {} changed modules", changed_modules.len());

        let mut queue: VecDeque<(String, SymbolRef)> = VecDeque::new();
        for module in &changed_modules {
            if let Some(data) = self.analysis.module_data.get(*module) {
                for symbol in &data.exports {
                    queue.push_back((module.to_string(), SymbolRef::name(symbol.clone())));
                }
            }
            // A module with no discovered exports is still reachable through
            // wholesale imports.
            queue.push_back((module.to_string(), SymbolRef::Module));
        }

        let mut visited: HashSet<(String, SymbolRef)> = HashSet::new();
        while let Some((module, symbol)) = queue.pop_front() {
            if !visited.insert((module.clone(), symbol.clone())) {
                continue;
            }

            if let Some(info) = self.index.get(&module) {
                if is_test_module(self.config, info) {
                    impacted.insert(module);
                    continue;
                }
            }

            let Some(reverse) = self.analysis.reverse_imports.get(&module) else {
                continue;
            };
            let mut dependants: HashSet<&String> = HashSet::new();
            if let SymbolRef::Name(_) = &symbol {
                if let Some(direct) = reverse.get(&symbol) {
                    dependants.extend(direct);
                }
            }
            // Wholesale importers are impacted no matter which symbol changed.
            if let Some(wholesale) = reverse.get(&SymbolRef::Module) {
                dependants.extend(wholesale);
            }

            for dependant in dependants {
                let Some(dep_data) = self.analysis.module_data.get(dependant) else {
                    continue;
                };
                let Some(imported) = dep_data.imports.get(&module) else {
                    continue;
                };
                // Re-check against the dependant's own import set so a change
                // to symbol S never propagates through a module that only
                // imported unrelated symbols.
                match &symbol {
                    SymbolRef::Module => {
                        if imported.contains(&SymbolRef::Module) {
                            queue.push_back((dependant.clone(), SymbolRef::Module));
                        }
                    }
                    SymbolRef::Name(_) => {
                        if imported.contains(&symbol) {
                            queue.push_back((dependant.clone(), symbol.clone()));
                        }
                        if imported.contains(&SymbolRef::Module) {
                            queue.push_back((dependant.clone(), SymbolRef::Module));
                        }
                    }
                }
            }
        }
    }

    fn apply_token_fallback(&self, changed_paths: &[PathBuf], impacted: &mut HashSet<String>) {
        let threshold = self.config.tokens.fallback_score.max(1);

        let changed_tokens: Vec<HashSet<String>> = changed_paths
            .iter()
            .map(|path| self.tokenizer.path_tokens(path))
            .collect();
        let changed_dir_tokens: Vec<HashSet<String>> = changed_paths
            .iter()
            .map(|path| self.tokenizer.directory_tokens(path))
            .collect();

        for (path, tokens) in &self.test_tokens {
            let Some(module_name) = self.index.module_for_path(path) else {
                continue;
            };

            let score = changed_tokens
                .iter()
                .map(|changed| {
                    tokens
                        .intersection(changed)
                        .map(|token| token.len())
                        .sum::<usize>()
                })
                .max()
                .unwrap_or(0);
            if score < threshold {
                continue;
            }

            // The directory gate stops same-named files in unrelated
            // subsystems from matching on filename tokens alone.
            let dir_tokens = &self.test_dir_tokens[path];
            let dir_match = changed_dir_tokens
                .iter()
                .any(|changed| !dir_tokens.is_disjoint(changed));
            if !dir_match {
                continue;
            }

            debug!("fallback selected {module_name} (score {score})");
            impacted.insert(module_name.to_string());
        }
    }
}

fn is_test_module(config: &Config, info: &ModuleInfo) -> bool {
    config
        .naming
        .is_test_file(&info.path, &config.root, &config.source_suffixes)
}
