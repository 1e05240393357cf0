// ABOUTME: Command-line entry point: flag parsing, configuration layering, and exit codes.
mod runner;

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use testscope_core::{load_config, CommandSpec, Config, DiffMode};
use testscope_git::ChangeDetectionError;
use tracing_subscriber::EnvFilter;

use crate::runner::Runner;

#[derive(Parser)]
#[command(name = "testscope")]
#[command(about = "Run only the test modules impacted by recent changes", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a testscope TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Repository root (defaults to the nearest ancestor containing .git)
    #[arg(long)]
    root: Option<PathBuf>,

    /// Source of changed files
    #[arg(long, value_enum)]
    diff_mode: Option<DiffModeArg>,

    /// Base revision used for diff range mode
    #[arg(long)]
    base: Option<String>,

    /// Head revision used for diff range mode
    #[arg(long)]
    head: Option<String>,

    /// Include untracked files when gathering impacted tests
    #[arg(long)]
    include_untracked: bool,

    /// Shell-style command used to execute tests
    #[arg(long)]
    test_command: Option<String>,

    /// Plan impacted tests without running them
    #[arg(long)]
    dry_run: bool,

    /// Alias for --dry-run (prints the impacted test list)
    #[arg(long)]
    list: bool,

    /// Output impacted tests as JSON and exit
    #[arg(long)]
    json: bool,

    /// Suppress informational output
    #[arg(short, long)]
    quiet: bool,

    /// Do not echo the test command before execution
    #[arg(long)]
    no_print_command: bool,

    /// Minimum token length for fallback matching
    #[arg(long)]
    min_token_length: Option<usize>,

    /// Minimum score required for fallback matching
    #[arg(long)]
    fallback_score: Option<usize>,

    /// Custom source root directory (repeatable)
    #[arg(long = "source-root")]
    source_roots: Vec<String>,

    /// Directory name to exclude from indexing (repeatable)
    #[arg(long = "exclude-dir")]
    exclude_dirs: Vec<String>,

    /// Directory marker treated as containing tests (repeatable)
    #[arg(long = "test-dir")]
    test_dir_markers: Vec<String>,

    /// Filename prefix recognized as a test module (repeatable)
    #[arg(long = "test-prefix")]
    test_prefixes: Vec<String>,

    /// Filename suffix recognized as a test module (repeatable)
    #[arg(long = "test-suffix")]
    test_suffixes: Vec<String>,

    /// Additional token stopword ignored during fallback matching (repeatable)
    #[arg(long = "stopword")]
    stopwords: Vec<String>,

    /// Additional environment variable passed to the test command (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE")]
    env: Vec<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Explicit paths to treat as changed (for scripting and testing)
    paths: Vec<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum DiffModeArg {
    Staged,
    Unstaged,
    Range,
}

impl From<DiffModeArg> for DiffMode {
    fn from(arg: DiffModeArg) -> Self {
        match arg {
            DiffModeArg::Staged => DiffMode::Staged,
            DiffModeArg::Unstaged => DiffMode::Unstaged,
            DiffModeArg::Range => DiffMode::Range,
        }
    }
}

fn apply_cli_overrides(config: &mut Config, cli: &Cli) -> Result<()> {
    if let Some(command) = &cli.test_command {
        config.test_command = CommandSpec::Line(command.clone()).into_argv()?;
    }
    if cli.dry_run || cli.list {
        config.dry_run = true;
    }
    if cli.quiet {
        config.quiet = true;
    }
    if cli.no_print_command {
        config.print_command = false;
    }
    if !cli.source_roots.is_empty() {
        config.source_roots = cli.source_roots.clone();
    }
    if !cli.exclude_dirs.is_empty() {
        config.exclude_dirs = cli.exclude_dirs.clone();
    }
    if !cli.test_dir_markers.is_empty() {
        config.naming.directory_markers = cli.test_dir_markers.clone();
    }
    if !cli.test_prefixes.is_empty() {
        config.naming.filename_prefixes = cli.test_prefixes.clone();
    }
    if !cli.test_suffixes.is_empty() {
        config.naming.filename_suffixes = cli.test_suffixes.clone();
    }
    if let Some(minimum) = cli.min_token_length {
        config.tokens.minimum_length = minimum;
    }
    if let Some(score) = cli.fallback_score {
        config.tokens.fallback_score = score;
    }
    for stopword in &cli.stopwords {
        if !config.tokens.stopwords.contains(stopword) {
            config.tokens.stopwords.push(stopword.clone());
        }
    }
    for entry in &cli.env {
        let Some((key, value)) = entry.split_once('=') else {
            bail!("invalid --env value '{entry}', expected KEY=VALUE");
        };
        config.env.insert(key.to_string(), value.to_string());
    }
    if let Some(mode) = cli.diff_mode {
        config.diff.mode = mode.into();
    }
    if let Some(base) = &cli.base {
        config.diff.base = Some(base.clone());
    }
    if let Some(head) = &cli.head {
        config.diff.head = Some(head.clone());
    }
    if cli.include_untracked {
        config.diff.include_untracked = true;
    }
    Ok(())
}

/// Explicit positional paths are resolved against the root; paths that do
/// not exist are warned about and dropped.
fn resolve_changed_paths(cli: &Cli, config: &Config) -> Option<Vec<PathBuf>> {
    if cli.paths.is_empty() {
        return None;
    }
    let mut resolved = Vec::new();
    for entry in &cli.paths {
        let path = if entry.is_absolute() {
            entry.clone()
        } else {
            config.root.join(entry)
        };
        if !path.exists() {
            eprintln!("warning: explicit path '{}' does not exist", entry.display());
            continue;
        }
        resolved.push(path);
    }
    Some(resolved)
}

fn run(cli: Cli) -> Result<i32> {
    let mut config = load_config(cli.root.as_deref(), cli.config.as_deref())?;
    apply_cli_overrides(&mut config, &cli)?;

    let explicit_paths = resolve_changed_paths(&cli, &config);
    let runner = Runner::new(config.clone());

    if cli.json {
        let tests = runner.plan(explicit_paths)?;
        let payload: Vec<String> = tests.iter().map(|p| runner.display_path(p)).collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(0);
    }

    if config.dry_run {
        let tests = runner.plan(explicit_paths)?;
        return runner.execute(&tests);
    }

    runner.run(explicit_paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_layer_on_top_of_config() {
        let cli = Cli::parse_from([
            "testscope",
            "--test-command",
            r#"pytest -k "slow and not flaky""#,
            "--list",
            "--diff-mode",
            "range",
            "--base",
            "main",
            "--env",
            "CI=1",
            "--stopword",
            "fixture",
        ]);
        let mut config = Config::new(PathBuf::from("/repo"));
        apply_cli_overrides(&mut config, &cli).unwrap();

        assert_eq!(
            config.test_command,
            vec!["pytest", "-k", "slow and not flaky"]
        );
        assert!(config.dry_run);
        assert_eq!(config.diff.mode, DiffMode::Range);
        assert_eq!(config.diff.base.as_deref(), Some("main"));
        assert_eq!(config.env.get("CI").map(String::as_str), Some("1"));
        assert!(config.tokens.stopwords.iter().any(|s| s == "fixture"));
    }

    #[test]
    fn malformed_env_flag_is_rejected() {
        let cli = Cli::parse_from(["testscope", "--env", "NOEQUALS"]);
        let mut config = Config::new(PathBuf::from("/repo"));
        assert!(apply_cli_overrides(&mut config, &cli).is_err());
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            if err.downcast_ref::<ChangeDetectionError>().is_some() {
                eprintln!("testscope: {err}");
                std::process::exit(2);
            }
            eprintln!("testscope: {err:#}");
            std::process::exit(1);
        }
    }
}
