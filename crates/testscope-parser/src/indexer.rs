// ABOUTME: Walks the source tree and maps files to qualified dotted module names.
// ABOUTME: Exclusion is by directory name; pruned subtrees are never descended into.
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use ignore::WalkBuilder;
use testscope_core::{Config, ModuleIndex, ModuleInfo};
use tracing::{debug, info, warn};

/// Filename marking a directory as a package; the file's module name is the
/// directory's dotted path.
pub const PACKAGE_ENTRY: &str = "__init__.py";

/// Builds an importable module index for a repository.
pub struct ModuleIndexer<'a> {
    config: &'a Config,
}

impl<'a> ModuleIndexer<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    fn collect_source_files(&self) -> Vec<PathBuf> {
        let exclude: HashSet<String> = self.config.exclude_dirs.iter().cloned().collect();
        debug!(
            "collecting source files under {} (excluding {:?})",
            self.config.root.display(),
            self.config.exclude_dirs
        );

        let mut builder = WalkBuilder::new(&self.config.root);
        builder
            .standard_filters(false)
            .follow_links(false)
            .filter_entry(move |entry| {
                // The root itself is never pruned, whatever its name.
                if entry.depth() == 0 {
                    return true;
                }
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                if !is_dir {
                    return true;
                }
                !exclude.contains(entry.file_name().to_string_lossy().as_ref())
            });

        let mut paths = Vec::new();
        for dent in builder.build() {
            let dent = match dent {
                Ok(d) => d,
                Err(e) => {
                    warn!("walker error: {}", e);
                    continue;
                }
            };
            if !dent.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let name = dent.file_name().to_string_lossy().into_owned();
            if !self
                .config
                .source_suffixes
                .iter()
                .any(|suffix| name.ends_with(suffix.as_str()))
            {
                continue;
            }
            paths.push(dent.into_path());
        }
        paths
    }

    /// Derive the qualified dotted name for a source file, or `None` when the
    /// file yields no module (empty result or empty path component).
    pub fn derive_module_name(&self, path: &Path) -> Option<String> {
        // Defensive: a file reached through a symlink may not live under the
        // declared root; fall back to its raw components.
        let relative = path.strip_prefix(&self.config.root).unwrap_or(path);
        let mut parts: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(os) => Some(os.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        if let Some(first) = parts.first() {
            if self.config.source_roots.iter().any(|r| r == first) {
                parts.remove(0);
            }
        }
        if parts.is_empty() {
            return None;
        }

        let filename = parts.last()?.clone();
        if filename == PACKAGE_ENTRY {
            parts.pop();
        } else {
            let mut suffixes: Vec<&String> = self.config.source_suffixes.iter().collect();
            suffixes.sort_by_key(|s| std::cmp::Reverse(s.len()));
            let matched = suffixes
                .into_iter()
                .find(|s| !s.is_empty() && filename.ends_with(s.as_str()))?;
            let stem = filename[..filename.len() - matched.len()].to_string();
            *parts.last_mut()? = stem;
        }

        if parts.is_empty() {
            return None;
        }
        if parts.iter().any(|part| part.is_empty() || part == ".") {
            return None;
        }
        Some(parts.join("."))
    }

    pub fn build(&self) -> ModuleIndex {
        let mut index = ModuleIndex::default();

        for path in self.collect_source_files() {
            let Some(name) = self.derive_module_name(&path) else {
                continue;
            };
            let is_package = path.file_name().is_some_and(|n| n == PACKAGE_ENTRY);
            let mut package_parts: Vec<String> =
                name.split('.').map(str::to_string).collect();
            if !is_package {
                package_parts.pop();
            }
            index.by_path.insert(path.clone(), name.clone());
            index.modules.insert(
                name.clone(),
                ModuleInfo {
                    name,
                    path,
                    package_parts,
                    is_package,
                },
            );
        }

        info!(
            "indexed {} modules under {}",
            index.len(),
            self.config.root.display()
        );
        index
    }
}
