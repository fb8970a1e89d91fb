//! Script linting.
//!
//! A small line-based checker for the JS sources, covering the handful of
//! rules the project actually enforces:
//!
//! | rule                 | severity | fires on                                  |
//! |----------------------|----------|-------------------------------------------|
//! | `no-debugger`        | error    | `debugger` statements                     |
//! | `eqeqeq`             | error    | `==` / `!=` comparisons                   |
//! | `no-console`         | warning  | `console.` member access                  |
//! | `no-var`             | warning  | `var` declarations                        |
//! | `no-trailing-spaces` | warning  | whitespace at end of line                 |
//! | `max-len`            | warning  | lines over the configured maximum         |
//!
//! String literals, template literals, and comments are masked out before
//! the code rules run, so `"a == b"` in a string or a commented-out
//! `console.log` never trips a rule. The checker tracks block comments and
//! template literals across lines; expressions interpolated inside
//! templates are skipped rather than half-checked.
//!
//! Results are cached by file modification time (see [`crate::cache`]), so
//! repeated runs in watch mode only re-check files that changed. Findings
//! never fail a build: they are collected, printed, and left to the
//! developer.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::{self, LintCache};
use crate::config::Config;
use crate::fileset::{FileSet, FileSetError, rel_slashes};

#[derive(Debug, Error)]
pub enum LintError {
    #[error(transparent)]
    FileSet(#[from] FileSetError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// A single finding in a source file. Lines and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintMessage {
    pub line: usize,
    pub column: usize,
    pub rule: String,
    pub message: String,
    pub severity: Severity,
}

/// All findings for one file. Empty means the file is clean.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintOutcome {
    pub messages: Vec<LintMessage>,
}

impl LintOutcome {
    pub fn error_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.severity == Severity::Warning)
            .count()
    }

    pub fn is_clean(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Findings for one file, addressed by source-relative path.
#[derive(Debug, Clone)]
pub struct FileLintResult {
    pub rel: String,
    pub outcome: LintOutcome,
}

/// Result of a lint run over the script sources.
#[derive(Debug, Default)]
pub struct LintReport {
    pub files: Vec<FileLintResult>,
    pub checked: usize,
    pub from_cache: usize,
}

impl LintReport {
    pub fn error_count(&self) -> usize {
        self.files.iter().map(|f| f.outcome.error_count()).sum()
    }

    pub fn warning_count(&self) -> usize {
        self.files.iter().map(|f| f.outcome.warning_count()).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.files.iter().all(|f| f.outcome.is_clean())
    }

    /// Files that have at least one finding.
    pub fn files_with_findings(&self) -> impl Iterator<Item = &FileLintResult> {
        self.files.iter().filter(|f| !f.outcome.is_clean())
    }
}

// =============================================================================
// Runner
// =============================================================================

/// Source access used by the lint runner. The indirection exists so tests
/// can observe which files are actually read: a cache hit must not read
/// the file at all.
pub trait SourceReader: Send + Sync {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

/// Reads straight from the filesystem.
pub struct FsReader;

impl SourceReader for FsReader {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// Lint all script sources, using and updating the on-disk cache.
pub fn run(config: &Config) -> Result<LintReport, LintError> {
    run_with_reader(config, &FsReader)
}

pub fn run_with_reader(
    config: &Config,
    reader: &dyn SourceReader,
) -> Result<LintReport, LintError> {
    let files = FileSet::new(config.scripts_dir(), &config.scripts.sources, &[])?.enumerate()?;
    let cache_path = config.lint_cache_path();
    let mut lint_cache = LintCache::load(&cache_path);

    let max_len = config.lint.max_line_length as usize;
    let mut report = LintReport {
        checked: files.len(),
        ..LintReport::default()
    };

    for file in &files {
        let key = file.path.display().to_string();
        let mtime = cache::file_mtime(&file.path)?;
        let outcome = match lint_cache.lookup(&key, &mtime) {
            Some(cached) => {
                report.from_cache += 1;
                cached.clone()
            }
            None => {
                let source = reader.read_to_string(&file.path)?;
                let outcome = lint_source(&source, max_len);
                lint_cache.record(key, mtime, outcome.clone());
                outcome
            }
        };
        report.files.push(FileLintResult {
            rel: rel_slashes(&file.rel),
            outcome,
        });
    }

    // A failed cache write costs one warm start, not the lint run.
    if let Err(err) = lint_cache.save(&cache_path) {
        tracing::warn!(path = %cache_path.display(), %err, "could not save lint cache");
    }

    Ok(report)
}

// =============================================================================
// Rules
// =============================================================================

/// Lint a single source text. Pure: no filesystem, no cache.
pub fn lint_source(source: &str, max_line_length: usize) -> LintOutcome {
    let mut messages = Vec::new();
    let mut state = ScanState::default();

    for (index, raw) in source.lines().enumerate() {
        let number = index + 1;
        let in_template_before = state.in_template;
        let masked = mask_line(raw, &mut state);

        check_max_len(raw, number, max_line_length, &mut messages);
        if !in_template_before && !state.in_template {
            check_trailing_space(raw, number, &mut messages);
        }
        check_code_rules(&masked, number, &mut messages);
    }

    LintOutcome { messages }
}

fn check_max_len(raw: &str, number: usize, max: usize, messages: &mut Vec<LintMessage>) {
    let len = raw.chars().count();
    if len > max {
        messages.push(LintMessage {
            line: number,
            column: max + 1,
            rule: "max-len".into(),
            message: format!("this line has a length of {len}, maximum allowed is {max}"),
            severity: Severity::Warning,
        });
    }
}

fn check_trailing_space(raw: &str, number: usize, messages: &mut Vec<LintMessage>) {
    let trimmed = raw.trim_end();
    if trimmed.len() < raw.len() && !raw.trim().is_empty() {
        messages.push(LintMessage {
            line: number,
            column: trimmed.chars().count() + 1,
            rule: "no-trailing-spaces".into(),
            message: "trailing spaces not allowed".into(),
            severity: Severity::Warning,
        });
    }
}

fn check_code_rules(masked: &str, number: usize, messages: &mut Vec<LintMessage>) {
    for column in identifier_positions(masked, "debugger") {
        messages.push(LintMessage {
            line: number,
            column,
            rule: "no-debugger".into(),
            message: "unexpected 'debugger' statement".into(),
            severity: Severity::Error,
        });
    }
    for column in identifier_positions(masked, "var") {
        messages.push(LintMessage {
            line: number,
            column,
            rule: "no-var".into(),
            message: "unexpected var, use let or const instead".into(),
            severity: Severity::Warning,
        });
    }
    for column in console_positions(masked) {
        messages.push(LintMessage {
            line: number,
            column,
            rule: "no-console".into(),
            message: "unexpected console statement".into(),
            severity: Severity::Warning,
        });
    }
    for (column, op) in loose_equality_positions(masked) {
        let strict = if op == "==" { "===" } else { "!==" };
        messages.push(LintMessage {
            line: number,
            column,
            rule: "eqeqeq".into(),
            message: format!("expected '{strict}' and instead saw '{op}'"),
            severity: Severity::Error,
        });
    }
    messages.sort_by_key(|m| (m.line, m.column));
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// 1-based columns where `word` appears as a standalone identifier.
fn identifier_positions(masked: &str, word: &str) -> Vec<usize> {
    let chars: Vec<char> = masked.chars().collect();
    let needle: Vec<char> = word.chars().collect();
    let mut found = Vec::new();
    if chars.len() < needle.len() {
        return found;
    }
    for i in 0..=chars.len() - needle.len() {
        if chars[i..i + needle.len()] != needle[..] {
            continue;
        }
        let before_ok = i == 0 || !is_ident_char(chars[i - 1]);
        let after_ok = chars
            .get(i + needle.len())
            .map(|c| !is_ident_char(*c))
            .unwrap_or(true);
        if before_ok && after_ok {
            found.push(i + 1);
        }
    }
    found
}

/// 1-based columns of `console` identifiers followed by a member access.
fn console_positions(masked: &str) -> Vec<usize> {
    let chars: Vec<char> = masked.chars().collect();
    identifier_positions(masked, "console")
        .into_iter()
        .filter(|col| {
            let mut i = col - 1 + "console".len();
            while chars.get(i).map(|c| c.is_whitespace()).unwrap_or(false) {
                i += 1;
            }
            chars.get(i) == Some(&'.')
        })
        .collect()
}

/// 1-based columns of loose `==` / `!=` operators, with the operator text.
fn loose_equality_positions(masked: &str) -> Vec<(usize, &'static str)> {
    let chars: Vec<char> = masked.chars().collect();
    let mut found = Vec::new();
    let mut i = 0;
    while i + 1 < chars.len() {
        let pair = (chars[i], chars[i + 1]);
        let prev = if i == 0 { None } else { Some(chars[i - 1]) };
        match pair {
            ('=', '=') => {
                let part_of_longer = matches!(prev, Some('=') | Some('!') | Some('<') | Some('>'))
                    || chars.get(i + 2) == Some(&'=');
                if !part_of_longer {
                    found.push((i + 1, "=="));
                }
                i += 2;
            }
            ('!', '=') => {
                if chars.get(i + 2) != Some(&'=') {
                    found.push((i + 1, "!="));
                }
                i += 2;
            }
            _ => i += 1,
        }
    }
    found
}

// =============================================================================
// String and comment masking
// =============================================================================

#[derive(Debug, Default)]
struct ScanState {
    in_block_comment: bool,
    in_template: bool,
}

/// Replace string contents and comments with spaces so the code rules see
/// only real code, at unchanged column positions. Updates `state` for
/// constructs that continue past the end of the line.
fn mask_line(raw: &str, state: &mut ScanState) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;

    while i < chars.len() {
        if state.in_block_comment {
            if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                state.in_block_comment = false;
                out.push_str("  ");
                i += 2;
            } else {
                out.push(' ');
                i += 1;
            }
            continue;
        }
        if state.in_template {
            if chars[i] == '\\' {
                out.push_str("  ");
                i += 2;
            } else if chars[i] == '`' {
                state.in_template = false;
                out.push('`');
                i += 1;
            } else {
                out.push(' ');
                i += 1;
            }
            continue;
        }

        let c = chars[i];
        match c {
            '/' if chars.get(i + 1) == Some(&'/') => {
                for _ in i..chars.len() {
                    out.push(' ');
                }
                break;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                state.in_block_comment = true;
                out.push_str("  ");
                i += 2;
            }
            '\'' | '"' => {
                out.push(c);
                i += 1;
                while i < chars.len() {
                    if chars[i] == '\\' {
                        out.push_str("  ");
                        i += 2;
                    } else if chars[i] == c {
                        out.push(c);
                        i += 1;
                        break;
                    } else {
                        out.push(' ');
                        i += 1;
                    }
                }
            }
            '`' => {
                state.in_template = true;
                out.push('`');
                i += 1;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::test_config;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn rules_found(outcome: &LintOutcome) -> Vec<&str> {
        outcome.messages.iter().map(|m| m.rule.as_str()).collect()
    }

    // =========================================================================
    // Individual rules
    // =========================================================================

    #[test]
    fn finds_debugger_statement() {
        let outcome = lint_source("function f() {\n  debugger;\n}\n", 120);
        assert_eq!(outcome.messages.len(), 1);
        let m = &outcome.messages[0];
        assert_eq!(m.rule, "no-debugger");
        assert_eq!(m.severity, Severity::Error);
        assert_eq!((m.line, m.column), (2, 3));
    }

    #[test]
    fn finds_console_member_access() {
        let outcome = lint_source("console.log('hi');\n", 120);
        assert_eq!(rules_found(&outcome), vec!["no-console"]);
        assert_eq!(outcome.messages[0].severity, Severity::Warning);
    }

    #[test]
    fn bare_console_identifier_is_fine() {
        let outcome = lint_source("let c = console;\n", 120);
        assert!(outcome.is_clean());
    }

    #[test]
    fn finds_loose_equality() {
        let outcome = lint_source("if (a == b) {}\n", 120);
        assert_eq!(rules_found(&outcome), vec!["eqeqeq"]);
        assert_eq!(outcome.messages[0].message, "expected '===' and instead saw '=='");
        assert_eq!(outcome.messages[0].column, 7);
    }

    #[test]
    fn finds_loose_inequality() {
        let outcome = lint_source("if (a != b) {}\n", 120);
        assert_eq!(rules_found(&outcome), vec!["eqeqeq"]);
        assert_eq!(outcome.messages[0].message, "expected '!==' and instead saw '!='");
    }

    #[test]
    fn strict_operators_are_fine() {
        let source = "if (a === b || a !== c || a <= d || a >= e) {}\n";
        assert!(lint_source(source, 120).is_clean());
    }

    #[test]
    fn finds_var_declaration() {
        let outcome = lint_source("var x = 1;\n", 120);
        assert_eq!(rules_found(&outcome), vec!["no-var"]);
    }

    #[test]
    fn var_inside_identifier_is_fine() {
        assert!(lint_source("let variable = invar;\n", 120).is_clean());
    }

    #[test]
    fn finds_trailing_spaces() {
        let outcome = lint_source("let a = 1;   \n", 120);
        assert_eq!(rules_found(&outcome), vec!["no-trailing-spaces"]);
        assert_eq!(outcome.messages[0].column, 11);
    }

    #[test]
    fn blank_line_is_not_trailing_space() {
        assert!(lint_source("let a = 1;\n   \nlet b = 2;\n", 120).is_clean());
    }

    #[test]
    fn finds_overlong_line() {
        let outcome = lint_source("let aaaaaaa = 1;\n", 10);
        assert_eq!(rules_found(&outcome), vec!["max-len"]);
        assert_eq!(outcome.messages[0].column, 11);
        assert!(outcome.messages[0].message.contains("length of 16"));
    }

    // =========================================================================
    // Masking
    // =========================================================================

    #[test]
    fn string_contents_are_masked() {
        let source = "let s = 'a == b; var x; console.log';\n";
        assert!(lint_source(source, 120).is_clean());
    }

    #[test]
    fn line_comments_are_masked() {
        assert!(lint_source("// console.log('x'); var y;\n", 120).is_clean());
    }

    #[test]
    fn block_comments_span_lines() {
        let source = "/*\nvar x = 1;\nconsole.log(x);\n*/\nlet y = 2;\n";
        assert!(lint_source(source, 120).is_clean());
    }

    #[test]
    fn template_contents_span_lines() {
        let source = "let t = `first\nconsole.log not code\nlast`;\n";
        assert!(lint_source(source, 120).is_clean());
    }

    #[test]
    fn code_after_template_is_checked() {
        let source = "let t = `x`;\nvar y = 1;\n";
        let outcome = lint_source(source, 120);
        assert_eq!(rules_found(&outcome), vec!["no-var"]);
        assert_eq!(outcome.messages[0].line, 2);
    }

    #[test]
    fn trailing_space_in_template_is_content() {
        let source = "let t = `line  \nmore  \nend`;\n";
        assert!(lint_source(source, 120).is_clean());
    }

    #[test]
    fn escaped_quote_does_not_end_string() {
        let source = "let s = 'it\\'s == fine';\n";
        assert!(lint_source(source, 120).is_clean());
    }

    #[test]
    fn findings_are_ordered_by_position() {
        let source = "var a = 1; debugger;\n";
        let outcome = lint_source(source, 120);
        assert_eq!(rules_found(&outcome), vec!["no-var", "no-debugger"]);
    }

    #[test]
    fn clean_source_has_no_findings() {
        let source = "const add = (a, b) => a + b;\n\nexport default add;\n";
        let outcome = lint_source(source, 120);
        assert!(outcome.is_clean());
        assert_eq!(outcome.error_count(), 0);
        assert_eq!(outcome.warning_count(), 0);
    }

    // =========================================================================
    // Runner and cache interaction
    // =========================================================================

    struct CountingReader {
        reads: AtomicUsize,
    }

    impl CountingReader {
        fn new() -> Self {
            Self {
                reads: AtomicUsize::new(0),
            }
        }

        fn count(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    impl SourceReader for CountingReader {
        fn read_to_string(&self, path: &Path) -> io::Result<String> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            std::fs::read_to_string(path)
        }
    }

    fn write_script(root: &Path, name: &str, contents: &str) {
        let dir = root.join("src/js-modules");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn run_reports_findings_per_file() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        write_script(tmp.path(), "bad.js", "var x = 1;\n");
        write_script(tmp.path(), "good.js", "const y = 2;\n");

        let report = run(&config).unwrap();
        assert_eq!(report.checked, 2);
        assert_eq!(report.from_cache, 0);
        assert_eq!(report.warning_count(), 1);
        let flagged: Vec<&str> = report.files_with_findings().map(|f| f.rel.as_str()).collect();
        assert_eq!(flagged, vec!["bad.js"]);
    }

    #[test]
    fn second_run_hits_cache_without_reading() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        write_script(tmp.path(), "a.js", "debugger;\n");

        let first = CountingReader::new();
        let report = run_with_reader(&config, &first).unwrap();
        assert_eq!(report.error_count(), 1);
        assert_eq!(first.count(), 1);

        let second = CountingReader::new();
        let report = run_with_reader(&config, &second).unwrap();
        assert_eq!(report.from_cache, 1);
        assert_eq!(report.error_count(), 1, "cached findings are replayed");
        assert_eq!(second.count(), 0, "cache hit must not read the file");
    }

    #[test]
    fn modified_file_is_linted_again() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        write_script(tmp.path(), "a.js", "var x = 1;\n");

        run(&config).unwrap();
        // mtimes have millisecond precision in the cache
        std::thread::sleep(std::time::Duration::from_millis(20));
        write_script(tmp.path(), "a.js", "const x = 1;\n");

        let reader = CountingReader::new();
        let report = run_with_reader(&config, &reader).unwrap();
        assert_eq!(report.from_cache, 0);
        assert_eq!(reader.count(), 1);
        assert!(report.is_clean());
    }

    #[test]
    fn cache_file_lands_at_configured_path() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        write_script(tmp.path(), "a.js", "const x = 1;\n");

        run(&config).unwrap();
        assert!(tmp.path().join("tmp/cache-eslint.json").exists());
    }

    #[test]
    fn no_scripts_is_an_empty_report() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());

        let report = run(&config).unwrap();
        assert_eq!(report.checked, 0);
        assert!(report.is_clean());
    }
}
