use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use testscope_core::{Config, TokenConfig};
use testscope_parser::{LanguageRegistry, ModuleIndexer};

use crate::{build_analysis, ImpactResolver};

fn write(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

fn resolve(config: &Config, changed: &[PathBuf]) -> Vec<PathBuf> {
    let registry = LanguageRegistry::new();
    let index = ModuleIndexer::new(config).build();
    let analysis = build_analysis(&registry, &index);
    ImpactResolver::new(config, &index, &analysis).resolve(changed)
}

fn basic_layout(root: &Path) {
    write(
        root,
        "feature.py",
        "VALUE = 1\n\n\ndef compute(x):\n    return x + VALUE\n",
    );
    write(
        root,
        "tests/test_feature.py",
        "from feature import compute\n\n\ndef test_compute():\n    assert compute(4) == 5\n",
    );
}

#[test]
fn direct_dependency_impacts_its_test() {
    let tmp = TempDir::new().unwrap();
    basic_layout(tmp.path());
    let config = Config::new(tmp.path().to_path_buf());

    let tests = resolve(&config, &[tmp.path().join("feature.py")]);
    assert_eq!(tests, vec![tmp.path().join("tests/test_feature.py")]);
}

#[test]
fn symbol_precise_propagation_stops_at_unrelated_importers() {
    let tmp = TempDir::new().unwrap();
    basic_layout(tmp.path());
    write(
        tmp.path(),
        "consumer.py",
        "from feature import compute\n\n\ndef adapter(val):\n    return compute(val)\n",
    );
    write(
        tmp.path(),
        "tests/test_consumer.py",
        "from consumer import adapter\n\n\ndef test_adapter():\n    assert adapter(2) == 3\n",
    );
    let config = Config::new(tmp.path().to_path_buf());

    // Changing the consumer alone must not ripple back to the feature test.
    let tests = resolve(&config, &[tmp.path().join("consumer.py")]);
    assert_eq!(tests, vec![tmp.path().join("tests/test_consumer.py")]);
}

#[test]
fn whole_module_import_is_impacted_by_any_symbol() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "feature.py", "def compute(x):\n    return x\n");
    write(
        tmp.path(),
        "tests/test_wholesale.py",
        "import feature\n\n\ndef test_compute():\n    assert feature.compute(1) == 1\n",
    );
    let config = Config::new(tmp.path().to_path_buf());

    let tests = resolve(&config, &[tmp.path().join("feature.py")]);
    assert_eq!(tests, vec![tmp.path().join("tests/test_wholesale.py")]);
}

#[test]
fn import_cycles_terminate() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "alpha.py",
        "import beta\n\n\ndef a():\n    return beta.b()\n",
    );
    write(
        tmp.path(),
        "beta.py",
        "import alpha\n\n\ndef b():\n    return 1\n",
    );
    write(
        tmp.path(),
        "tests/test_alpha.py",
        "import alpha\n\n\ndef test_a():\n    assert alpha.a() == 1\n",
    );
    let config = Config::new(tmp.path().to_path_buf());

    let tests = resolve(&config, &[tmp.path().join("beta.py")]);
    assert_eq!(tests, vec![tmp.path().join("tests/test_alpha.py")]);
}

#[test]
fn reexports_propagate_through_intermediate_modules() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "engine.py", "def compute(x):\n    return x\n");
    write(tmp.path(), "facade.py", "from engine import compute\n");
    write(
        tmp.path(),
        "tests/test_facade.py",
        "from facade import compute\n\n\ndef test_compute():\n    assert compute(2) == 2\n",
    );
    let config = Config::new(tmp.path().to_path_buf());

    let tests = resolve(&config, &[tmp.path().join("engine.py")]);
    assert_eq!(tests, vec![tmp.path().join("tests/test_facade.py")]);
}

#[test]
fn package_attribute_access_counts_as_module_import() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "pkg/__init__.py", "");
    write(tmp.path(), "pkg/engine.py", "def run():\n    return 1\n");
    write(
        tmp.path(),
        "tests/test_engine.py",
        "from pkg import engine\n\n\ndef test_run():\n    assert engine.run() == 1\n",
    );
    let config = Config::new(tmp.path().to_path_buf());

    // `from pkg import engine` looks like a symbol import but names the
    // submodule; the augmentation pass must catch any change to it.
    let tests = resolve(&config, &[tmp.path().join("pkg/engine.py")]);
    assert_eq!(tests, vec![tmp.path().join("tests/test_engine.py")]);
}

#[test]
fn fallback_matches_token_coupled_tests() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "src/billing/tax.py", "RATE = 0.2\n");
    write(
        tmp.path(),
        "tests/billing/test_tax.py",
        "def test_rate():\n    assert True\n",
    );
    let mut config = Config::new(tmp.path().to_path_buf());
    config.tokens = TokenConfig {
        fallback_score: 3,
        ..TokenConfig::default()
    };

    let tests = resolve(&config, &[tmp.path().join("src/billing/tax.py")]);
    assert_eq!(tests, vec![tmp.path().join("tests/billing/test_tax.py")]);
}

#[test]
fn fallback_directory_gate_blocks_unrelated_subsystems() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "src/billing/ledger.py", "ENTRIES = []\n");
    // Same filename tokens, entirely different subsystem.
    write(
        tmp.path(),
        "tests/shipping/test_ledger.py",
        "def test_ledger():\n    assert True\n",
    );
    let mut config = Config::new(tmp.path().to_path_buf());
    config.tokens = TokenConfig {
        fallback_score: 3,
        ..TokenConfig::default()
    };

    let tests = resolve(&config, &[tmp.path().join("src/billing/ledger.py")]);
    assert!(tests.is_empty());
}

#[test]
fn fallback_never_fires_below_threshold() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "src/billing/tax.py", "RATE = 0.2\n");
    write(
        tmp.path(),
        "tests/billing/test_tax.py",
        "def test_rate():\n    assert True\n",
    );
    let config = Config::new(tmp.path().to_path_buf());

    // Shared tokens "billing" + "tax" score 10, below the default 12.
    let tests = resolve(&config, &[tmp.path().join("src/billing/tax.py")]);
    assert!(tests.is_empty());
}

#[test]
fn changed_test_files_select_themselves() {
    let tmp = TempDir::new().unwrap();
    basic_layout(tmp.path());
    let config = Config::new(tmp.path().to_path_buf());

    let tests = resolve(&config, &[tmp.path().join("tests/test_feature.py")]);
    assert_eq!(tests, vec![tmp.path().join("tests/test_feature.py")]);
}

#[test]
fn results_are_sorted_and_deterministic() {
    let tmp = TempDir::new().unwrap();
    basic_layout(tmp.path());
    write(
        tmp.path(),
        "tests/zeta_test.py",
        "def test_dummy():\n    assert True\n",
    );
    let config = Config::new(tmp.path().to_path_buf());

    let changed = vec![
        tmp.path().join("tests/zeta_test.py"),
        tmp.path().join("feature.py"),
    ];
    let first = resolve(&config, &changed);
    let mut sorted = first.clone();
    sorted.sort();
    assert_eq!(first, sorted);

    for _ in 0..3 {
        assert_eq!(resolve(&config, &changed), first);
    }
}

#[test]
fn unknown_changed_paths_are_ignored_by_graph_seeding() {
    let tmp = TempDir::new().unwrap();
    basic_layout(tmp.path());
    let config = Config::new(tmp.path().to_path_buf());

    let tests = resolve(&config, &[tmp.path().join("README.md")]);
    assert!(tests.is_empty());
}

#[test]
fn empty_change_set_yields_empty_plan() {
    let tmp = TempDir::new().unwrap();
    basic_layout(tmp.path());
    let config = Config::new(tmp.path().to_path_buf());

    assert!(resolve(&config, &[]).is_empty());
}

#[test]
fn module_without_exports_still_reaches_wholesale_importers() {
    let tmp = TempDir::new().unwrap();
    // Unparsable content: no exports, no imports discovered.
    write(tmp.path(), "generated.py", "def broken(:\n");
    write(
        tmp.path(),
        "tests/test_generated.py",
        "import generated\n\n\ndef test_import():\n    assert generated\n",
    );
    let config = Config::new(tmp.path().to_path_buf());

    let tests = resolve(&config, &[tmp.path().join("generated.py")]);
    assert_eq!(tests, vec![tmp.path().join("tests/test_generated.py")]);
}
