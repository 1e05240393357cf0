// ABOUTME: Configuration types and layered loading for Testscope.
// ABOUTME: Defaults are merged with a TOML file and TESTSCOPE_* environment overrides.
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, TestscopeError};

pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".mypy_cache",
    ".pytest_cache",
    ".tox",
    ".venv",
    "__pycache__",
    "build",
    "dist",
    "node_modules",
    "venv",
];

/// Generic path tokens that carry no signal for fallback matching.
pub const DEFAULT_STOPWORDS: &[&str] = &[
    "api", "apis", "base", "build", "common", "core", "data", "init", "lib", "model", "models",
    "query", "queries", "service", "services", "src", "test", "tests", "util", "utils",
];

fn default_test_command() -> Vec<String> {
    vec!["pytest".into(), "-q".into(), "--maxfail=1".into()]
}

fn default_source_suffixes() -> Vec<String> {
    vec![".py".into()]
}

fn default_source_roots() -> Vec<String> {
    vec!["src".into()]
}

/// Git diff source used to discover changed files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiffMode {
    #[default]
    Staged,
    Unstaged,
    Range,
}

/// Options describing how to obtain the list of changed files.
#[derive(Debug, Clone)]
pub struct DiffConfig {
    pub mode: DiffMode,
    pub base: Option<String>,
    pub head: Option<String>,
    /// Delta statuses considered changes, as `git diff --diff-filter` letters.
    pub diff_filter: String,
    pub include_untracked: bool,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            mode: DiffMode::Staged,
            base: None,
            head: None,
            diff_filter: "ACMR".into(),
            include_untracked: false,
        }
    }
}

/// Rules classifying a module as a test module.
#[derive(Debug, Clone)]
pub struct TestNamingRules {
    pub directory_markers: Vec<String>,
    pub filename_prefixes: Vec<String>,
    pub filename_suffixes: Vec<String>,
}

impl Default for TestNamingRules {
    fn default() -> Self {
        Self {
            directory_markers: vec!["tests".into()],
            filename_prefixes: vec!["test_".into()],
            filename_suffixes: vec!["_test.py".into()],
        }
    }
}

impl TestNamingRules {
    pub fn is_test_file(&self, path: &Path, root: &Path, suffixes: &[String]) -> bool {
        let relative = path.strip_prefix(root).unwrap_or(path);
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => return false,
        };

        let in_marked_directory = parts
            .iter()
            .take(parts.len().saturating_sub(1))
            .any(|part| self.directory_markers.iter().any(|m| m == part));
        let has_prefix = self.filename_prefixes.iter().any(|p| name.starts_with(p.as_str()));
        let has_suffix = self.filename_suffixes.iter().any(|s| name.ends_with(s.as_str()));
        let extension_ok = suffixes.iter().any(|s| name.ends_with(s.as_str()));

        if in_marked_directory {
            (has_prefix || has_suffix) && extension_ok
        } else {
            has_prefix && extension_ok || has_suffix
        }
    }
}

/// Settings controlling token extraction for the fallback matcher.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub minimum_length: usize,
    pub fallback_score: usize,
    pub stopwords: Vec<String>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            minimum_length: 3,
            fallback_score: 12,
            stopwords: DEFAULT_STOPWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Top-level configuration: one immutable value per invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub diff: DiffConfig,
    pub test_command: Vec<String>,
    pub source_suffixes: Vec<String>,
    pub source_roots: Vec<String>,
    pub exclude_dirs: Vec<String>,
    pub naming: TestNamingRules,
    pub tokens: TokenConfig,
    pub dry_run: bool,
    pub quiet: bool,
    pub print_command: bool,
    pub env: BTreeMap<String, String>,
}

impl Config {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            diff: DiffConfig::default(),
            test_command: default_test_command(),
            source_suffixes: default_source_suffixes(),
            source_roots: default_source_roots(),
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect(),
            naming: TestNamingRules::default(),
            tokens: TokenConfig::default(),
            dry_run: false,
            quiet: false,
            print_command: true,
            env: BTreeMap::new(),
        }
    }

    pub fn apply(&mut self, overrides: ConfigOverrides) -> Result<()> {
        if let Some(command) = overrides.test_command {
            self.test_command = command.into_argv()?;
        }
        if let Some(suffixes) = overrides.source_suffixes {
            self.source_suffixes = suffixes;
        }
        if let Some(roots) = overrides.source_roots {
            self.source_roots = roots;
        }
        if let Some(dirs) = overrides.exclude_dirs {
            self.exclude_dirs = dirs;
        }
        if let Some(dry_run) = overrides.dry_run {
            self.dry_run = dry_run;
        }
        if let Some(quiet) = overrides.quiet {
            self.quiet = quiet;
        }
        if let Some(print_command) = overrides.print_command {
            self.print_command = print_command;
        }
        if let Some(env) = overrides.env {
            self.env = env;
        }
        if let Some(naming) = overrides.naming {
            if let Some(markers) = naming.directory_markers {
                self.naming.directory_markers = markers;
            }
            if let Some(prefixes) = naming.filename_prefixes {
                self.naming.filename_prefixes = prefixes;
            }
            if let Some(suffixes) = naming.filename_suffixes {
                self.naming.filename_suffixes = suffixes;
            }
        }
        if let Some(tokens) = overrides.tokens {
            if let Some(minimum) = tokens.minimum_length {
                self.tokens.minimum_length = minimum;
            }
            if let Some(score) = tokens.fallback_score {
                self.tokens.fallback_score = score;
            }
            if let Some(stopwords) = tokens.stopwords {
                self.tokens.stopwords = stopwords;
            }
        }
        if let Some(diff) = overrides.diff {
            if let Some(mode) = diff.mode {
                self.diff.mode = mode;
            }
            if let Some(base) = diff.base {
                self.diff.base = Some(base);
            }
            if let Some(head) = diff.head {
                self.diff.head = Some(head);
            }
            if let Some(filter) = diff.diff_filter {
                self.diff.diff_filter = filter;
            }
            if let Some(untracked) = diff.include_untracked {
                self.diff.include_untracked = untracked;
            }
        }
        Ok(())
    }
}

/// A test command given either as one shell-style line or as an argv list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    Line(String),
    Argv(Vec<String>),
}

impl CommandSpec {
    pub fn into_argv(self) -> Result<Vec<String>> {
        let argv: Vec<String> = match self {
            CommandSpec::Line(line) => split_command_line(&line)?,
            CommandSpec::Argv(argv) => argv,
        };
        if argv.is_empty() {
            return Err(TestscopeError::InvalidCommand(
                "test command must not be empty".into(),
            ));
        }
        Ok(argv)
    }
}

/// Shell-style word splitting: single quotes are literal, double quotes allow
/// `\"` and `\\` escapes, a backslash outside quotes escapes the next char.
fn split_command_line(line: &str) -> Result<Vec<String>> {
    let mut argv = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(inner) => word.push(inner),
                        None => {
                            return Err(TestscopeError::InvalidCommand(format!(
                                "unbalanced quote in test command '{line}'"
                            )))
                        }
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped @ ('"' | '\\')) => word.push(escaped),
                            Some(other) => {
                                word.push('\\');
                                word.push(other);
                            }
                            None => {
                                return Err(TestscopeError::InvalidCommand(format!(
                                    "unbalanced quote in test command '{line}'"
                                )))
                            }
                        },
                        Some(inner) => word.push(inner),
                        None => {
                            return Err(TestscopeError::InvalidCommand(format!(
                                "unbalanced quote in test command '{line}'"
                            )))
                        }
                    }
                }
            }
            '\\' => {
                in_word = true;
                match chars.next() {
                    Some(escaped) => word.push(escaped),
                    None => {
                        return Err(TestscopeError::InvalidCommand(format!(
                            "trailing backslash in test command '{line}'"
                        )))
                    }
                }
            }
            ch if ch.is_whitespace() => {
                if in_word {
                    argv.push(std::mem::take(&mut word));
                    in_word = false;
                }
            }
            ch => {
                in_word = true;
                word.push(ch);
            }
        }
    }
    if in_word {
        argv.push(word);
    }
    Ok(argv)
}

/// Partial configuration parsed from a TOML section; unset keys keep the
/// value from the layer below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ConfigOverrides {
    pub test_command: Option<CommandSpec>,
    pub source_suffixes: Option<Vec<String>>,
    pub source_roots: Option<Vec<String>>,
    pub exclude_dirs: Option<Vec<String>>,
    pub dry_run: Option<bool>,
    pub quiet: Option<bool>,
    pub print_command: Option<bool>,
    pub env: Option<BTreeMap<String, String>>,
    pub naming: Option<NamingOverrides>,
    pub tokens: Option<TokenOverrides>,
    pub diff: Option<DiffOverrides>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NamingOverrides {
    pub directory_markers: Option<Vec<String>>,
    pub filename_prefixes: Option<Vec<String>>,
    pub filename_suffixes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TokenOverrides {
    pub minimum_length: Option<usize>,
    pub fallback_score: Option<usize>,
    pub stopwords: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DiffOverrides {
    pub mode: Option<DiffMode>,
    pub base: Option<String>,
    pub head: Option<String>,
    pub diff_filter: Option<String>,
    pub include_untracked: Option<bool>,
}

/// Locate the nearest ancestor directory containing a `.git` entry.
pub fn find_repo_root(start: Option<&Path>) -> PathBuf {
    let start = start
        .map(Path::to_path_buf)
        .unwrap_or_else(|| env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    let mut current = start.as_path();
    loop {
        if current.join(".git").exists() {
            return current.to_path_buf();
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return start,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigDocument {
    testscope: Option<ConfigOverrides>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PyprojectDocument {
    tool: Option<PyprojectToolSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PyprojectToolSection {
    testscope: Option<ConfigOverrides>,
}

fn section_from_toml(path: &Path, text: &str) -> Result<Option<ConfigOverrides>> {
    if path.file_name().is_some_and(|n| n == "pyproject.toml") {
        let document: PyprojectDocument = toml::from_str(text)?;
        Ok(document.tool.and_then(|tool| tool.testscope))
    } else {
        let document: ConfigDocument = toml::from_str(text)?;
        Ok(document.testscope)
    }
}

fn env_flag(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

/// Load configuration from defaults, an optional TOML file, and environment
/// variables. Later layers win; the result is immutable for the invocation.
pub fn load_config(root: Option<&Path>, config_path: Option<&Path>) -> Result<Config> {
    let root = find_repo_root(root);
    let mut config = Config::new(root.clone());

    let candidates: Vec<PathBuf> = match config_path {
        Some(path) => vec![path.to_path_buf()],
        None => vec![
            root.join("testscope.toml"),
            root.join(".testscoperc"),
            root.join("pyproject.toml"),
        ],
    };

    for path in candidates {
        if !path.exists() {
            continue;
        }
        let text = fs::read_to_string(&path)?;
        if let Some(overrides) = section_from_toml(&path, &text)? {
            debug!("loaded configuration from {}", path.display());
            config.apply(overrides)?;
            break;
        }
    }

    if let Ok(command) = env::var("TESTSCOPE_TEST_COMMAND") {
        config.test_command = CommandSpec::Line(command).into_argv()?;
    }
    if let Ok(value) = env::var("TESTSCOPE_DRY_RUN") {
        config.dry_run = env_flag(&value);
    }
    if let Ok(value) = env::var("TESTSCOPE_QUIET") {
        config.quiet = env_flag(&value);
    }

    Ok(config)
}
