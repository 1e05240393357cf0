// ABOUTME: High-level orchestration: change detection, impact planning, and test execution.
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use testscope_core::Config;
use testscope_git::ChangeDetector;
use testscope_graph::{build_analysis, ImpactResolver};
use testscope_parser::{LanguageRegistry, ModuleIndexer};
use tracing::info;

pub struct Runner {
    config: Config,
}

impl Runner {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn collect_changes(&self) -> Result<Vec<PathBuf>> {
        let changed = ChangeDetector::new(&self.config).collect()?;
        Ok(changed)
    }

    /// Build a fresh index and graph, then resolve the impacted test paths.
    pub fn plan(&self, changed_paths: Option<Vec<PathBuf>>) -> Result<Vec<PathBuf>> {
        let changed = match changed_paths {
            Some(paths) => paths,
            None => self.collect_changes()?,
        };
        info!("planning against {} changed files", changed.len());

        let registry = LanguageRegistry::new();
        let index = ModuleIndexer::new(&self.config).build();
        let analysis = build_analysis(&registry, &index);
        let resolver = ImpactResolver::new(&self.config, &index, &analysis);
        Ok(resolver.resolve(&changed))
    }

    pub fn execute(&self, tests: &[PathBuf]) -> Result<i32> {
        if tests.is_empty() {
            if !self.config.quiet {
                println!("testscope: no impacted tests detected.");
            }
            return Ok(0);
        }

        let display: Vec<String> = tests
            .iter()
            .map(|path| self.display_path(path))
            .collect();
        if !self.config.quiet {
            println!("Impacted test modules ({}):", display.len());
            for item in &display {
                println!("  - {item}");
            }
        }

        if self.config.dry_run {
            return Ok(0);
        }

        let (program, args) = self
            .config
            .test_command
            .split_first()
            .context("test command must not be empty")?;
        if self.config.print_command && !self.config.quiet {
            let mut command_line = vec![program.clone()];
            command_line.extend(args.iter().cloned());
            command_line.extend(display.iter().cloned());
            println!("Running: {}", command_line.join(" "));
        }

        let status = Command::new(program)
            .args(args)
            .args(&display)
            .current_dir(&self.config.root)
            .envs(&self.config.env)
            .status()
            .with_context(|| format!("failed to execute test command '{program}'"))?;
        Ok(status.code().unwrap_or(1))
    }

    pub fn run(&self, changed_paths: Option<Vec<PathBuf>>) -> Result<i32> {
        let tests = self.plan(changed_paths)?;
        self.execute(&tests)
    }

    pub fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.config.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}
