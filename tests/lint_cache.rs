//! Lint runs against a real project tree, exercising the on-disk cache
//! across processes the way repeated dev builds would.

use std::fs;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use sitewright::config::Config;
use sitewright::lint;
use tempfile::TempDir;

fn write_script(root: &Path, name: &str, contents: &str) {
    let dir = root.join("src/js-modules");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(name), contents).unwrap();
}

fn load_config(root: &Path) -> Config {
    Config::load(root, None).unwrap()
}

#[test]
fn cold_run_checks_everything_and_seeds_the_cache() {
    let tmp = TempDir::new().unwrap();
    write_script(tmp.path(), "app.js", "const app = 1;\n");
    write_script(tmp.path(), "nav.js", "const nav = 2;\n");
    let config = load_config(tmp.path());

    let report = lint::run(&config).unwrap();
    assert_eq!(report.checked, 2);
    assert_eq!(report.from_cache, 0);
    assert!(report.is_clean());

    let cache = fs::read_to_string(config.lint_cache_path()).unwrap();
    serde_json::from_str::<serde_json::Value>(&cache).expect("cache is valid JSON");
}

#[test]
fn warm_run_answers_from_the_cache() {
    let tmp = TempDir::new().unwrap();
    write_script(tmp.path(), "app.js", "var old = 1;\n");
    write_script(tmp.path(), "nav.js", "const nav = 2;\n");
    let config = load_config(tmp.path());

    let cold = lint::run(&config).unwrap();
    let warm = lint::run(&config).unwrap();

    assert_eq!(warm.from_cache, 2);
    assert_eq!(warm.checked, 2);

    // cached findings replay identically
    assert_eq!(warm.error_count(), cold.error_count());
    assert_eq!(warm.warning_count(), cold.warning_count());
    let rules: Vec<_> = warm
        .files_with_findings()
        .flat_map(|f| f.outcome.messages.iter().map(|m| m.rule.as_str()))
        .collect();
    assert_eq!(rules, vec!["no-var"]);
}

#[test]
fn an_edit_invalidates_only_that_entry() {
    let tmp = TempDir::new().unwrap();
    write_script(tmp.path(), "app.js", "const app = 1;\n");
    write_script(tmp.path(), "nav.js", "const nav = 2;\n");
    let config = load_config(tmp.path());

    lint::run(&config).unwrap();

    // mtime is the cache key; give it room to move
    sleep(Duration::from_millis(50));
    write_script(tmp.path(), "app.js", "const app = 1;\ndebugger;\n");

    let report = lint::run(&config).unwrap();
    assert_eq!(report.from_cache, 1, "only the untouched file replays");
    assert_eq!(report.error_count(), 1);
    let findings: Vec<_> = report.files_with_findings().collect();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].rel, "app.js");
    assert_eq!(findings[0].outcome.messages[0].rule, "no-debugger");
}

#[test]
fn corrupt_cache_starts_cold_and_heals() {
    let tmp = TempDir::new().unwrap();
    write_script(tmp.path(), "app.js", "const app = 1;\n");
    let config = load_config(tmp.path());

    let cache_path = config.lint_cache_path();
    fs::create_dir_all(cache_path.parent().unwrap()).unwrap();
    fs::write(&cache_path, "definitely not json {{{").unwrap();

    let report = lint::run(&config).unwrap();
    assert_eq!(report.from_cache, 0);
    assert!(report.is_clean());

    // the run rewrote a usable cache
    let cache = fs::read_to_string(&cache_path).unwrap();
    serde_json::from_str::<serde_json::Value>(&cache).expect("cache healed");
    let warm = lint::run(&config).unwrap();
    assert_eq!(warm.from_cache, 1);
}

#[test]
fn findings_match_the_enforced_rules() {
    let tmp = TempDir::new().unwrap();
    write_script(
        tmp.path(),
        "legacy.js",
        "var legacy = 1;\n\
         if (legacy == 1) { debugger; }\n\
         console.log(\"boot\");\n\
         // console.log(\"commented out\");\n\
         const label = \"a == b\";\n",
    );
    let config = load_config(tmp.path());

    let report = lint::run(&config).unwrap();
    assert_eq!(report.error_count(), 2, "eqeqeq and no-debugger");
    assert_eq!(report.warning_count(), 2, "no-var and no-console");

    let file = report.files_with_findings().next().unwrap();
    let rules: Vec<_> = file.outcome.messages.iter().map(|m| m.rule.as_str()).collect();
    assert!(rules.contains(&"no-var"));
    assert!(rules.contains(&"eqeqeq"));
    assert!(rules.contains(&"no-debugger"));
    assert!(rules.contains(&"no-console"));

    // strings and comments are masked before the code rules run
    let eqeqeq = file.outcome.messages.iter().filter(|m| m.rule == "eqeqeq");
    assert_eq!(eqeqeq.count(), 1);
    let consoles = file.outcome.messages.iter().filter(|m| m.rule == "no-console");
    assert_eq!(consoles.count(), 1);
}
