//! CLI output formatting for build and lint results.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! Build (production)
//!     pages    3 written
//!     styles   2 written, 1 failed
//!     images   10 written, 4 skipped
//!     scripts  2 written
//!     fonts    12 written
//!
//! Alerts
//!     styles: bad.sass: undefined variable: "$brand"
//!
//! Lint
//!     3 files checked (2 from cache), no problems
//!
//! 29 files written, 4 skipped, 1 failed
//! ```
//!
//! Sections that have nothing to say are dropped: a clean build prints no
//! `Alerts` block, a build without lint prints no `Lint` block.
//!
//! ## Lint
//!
//! ```text
//! app.js
//!     3:1 warning unexpected console statement (no-console)
//!     9:5 error unexpected 'debugger' statement (no-debugger)
//!
//! 3 files checked, 1 errors, 1 warnings
//! ```
//!
//! # Architecture
//!
//! Each surface has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::config::Mode;
use crate::lint::LintReport;
use crate::notifier::PipelineAlert;
use crate::pipeline::PipelineReport;
use crate::tasks::BuildSummary;

// ============================================================================
// Build summary
// ============================================================================

/// Format a build summary: one line per pipeline, then alerts, then lint,
/// then overall file totals.
pub fn format_build_summary(summary: &BuildSummary, mode: Mode) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(format!("Build ({})", mode.as_str()));

    for report in &summary.reports {
        lines.push(format!("    {:<8} {}", report.pipeline, report_counts(report)));
    }

    if !summary.alerts.is_empty() {
        lines.push(String::new());
        lines.push("Alerts".to_string());
        for alert in &summary.alerts {
            lines.push(format!("    {}", alert_line(alert)));
        }
    }

    if let Some(ref lint) = summary.lint {
        lines.push(String::new());
        lines.push("Lint".to_string());
        for line in format_lint_report(lint) {
            if line.is_empty() {
                lines.push(line);
            } else {
                lines.push(format!("    {line}"));
            }
        }
    }

    lines.push(String::new());
    lines.push(overall_totals(summary));
    lines
}

/// Print a build summary to stdout.
pub fn print_build_summary(summary: &BuildSummary, mode: Mode) {
    for line in format_build_summary(summary, mode) {
        println!("{line}");
    }
}

/// Per-pipeline counts: written always, skipped and failed only when
/// non-zero.
fn report_counts(report: &PipelineReport) -> String {
    let mut parts = vec![format!("{} written", report.written.len())];
    if !report.skipped.is_empty() {
        parts.push(format!("{} skipped", report.skipped.len()));
    }
    if !report.failed.is_empty() {
        parts.push(format!("{} failed", report.failed.len()));
    }
    parts.join(", ")
}

fn alert_line(alert: &PipelineAlert) -> String {
    match &alert.file {
        Some(file) => format!("{}: {}: {}", alert.pipeline, file, alert.message),
        None => format!("{}: {}", alert.pipeline, alert.message),
    }
}

fn overall_totals(summary: &BuildSummary) -> String {
    let mut line = format!("{} files written", summary.written());
    if summary.skipped() > 0 {
        line.push_str(&format!(", {} skipped", summary.skipped()));
    }
    if summary.failed() > 0 {
        line.push_str(&format!(", {} failed", summary.failed()));
    }
    line
}

// ============================================================================
// Lint report
// ============================================================================

/// Format a lint report: findings grouped per file, then a totals line.
pub fn format_lint_report(report: &LintReport) -> Vec<String> {
    let mut lines = Vec::new();

    for file in report.files_with_findings() {
        lines.push(file.rel.clone());
        for finding in &file.outcome.messages {
            lines.push(format!(
                "    {}:{} {} {} ({})",
                finding.line,
                finding.column,
                finding.severity.label(),
                finding.message,
                finding.rule
            ));
        }
    }

    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(lint_totals(report));
    lines
}

/// Print a lint report to stdout.
pub fn print_lint_report(report: &LintReport) {
    for line in format_lint_report(report) {
        println!("{line}");
    }
}

fn lint_totals(report: &LintReport) -> String {
    let mut line = format!("{} files checked", report.checked);
    if report.from_cache > 0 {
        line.push_str(&format!(" ({} from cache)", report.from_cache));
    }
    if report.is_clean() {
        line.push_str(", no problems");
    } else {
        line.push_str(&format!(
            ", {} errors, {} warnings",
            report.error_count(),
            report.warning_count()
        ));
    }
    line
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lint::{FileLintResult, LintMessage, LintOutcome, Severity};

    fn report_with(
        name: &'static str,
        written: usize,
        skipped: usize,
        failed: usize,
    ) -> PipelineReport {
        let mut report = PipelineReport::new(name);
        for i in 0..written {
            report.written.push(format!("w{i}"));
        }
        for i in 0..skipped {
            report.skipped.push(format!("s{i}"));
        }
        for i in 0..failed {
            report.failed.push(format!("f{i}"));
        }
        report
    }

    fn finding(line: usize, column: usize, rule: &str, message: &str, severity: Severity) -> LintMessage {
        LintMessage {
            line,
            column,
            rule: rule.to_string(),
            message: message.to_string(),
            severity,
        }
    }

    // =========================================================================
    // Build summary
    // =========================================================================

    #[test]
    fn build_summary_lists_each_pipeline() {
        let mut summary = BuildSummary::default();
        summary.reports.push(report_with("pages", 3, 0, 0));
        summary.reports.push(report_with("styles", 2, 0, 1));
        summary.reports.push(report_with("images", 10, 4, 0));

        let lines = format_build_summary(&summary, Mode::Production);
        assert_eq!(lines[0], "Build (production)");
        assert_eq!(lines[1], "    pages    3 written");
        assert_eq!(lines[2], "    styles   2 written, 1 failed");
        assert_eq!(lines[3], "    images   10 written, 4 skipped");
    }

    #[test]
    fn build_summary_ends_with_overall_totals() {
        let mut summary = BuildSummary::default();
        summary.reports.push(report_with("pages", 3, 0, 0));
        summary.reports.push(report_with("images", 10, 4, 1));

        let lines = format_build_summary(&summary, Mode::Development);
        assert_eq!(lines.last().unwrap(), "13 files written, 4 skipped, 1 failed");
    }

    #[test]
    fn clean_build_has_no_alert_section() {
        let mut summary = BuildSummary::default();
        summary.reports.push(report_with("pages", 1, 0, 0));

        let lines = format_build_summary(&summary, Mode::Development);
        assert!(!lines.contains(&"Alerts".to_string()));
        assert!(!lines.contains(&"Lint".to_string()));
    }

    #[test]
    fn alerts_render_with_and_without_a_file() {
        let mut summary = BuildSummary::default();
        summary.alerts.push(PipelineAlert {
            pipeline: "styles",
            file: Some("bad.sass".to_string()),
            message: "undefined variable".to_string(),
        });
        summary.alerts.push(PipelineAlert {
            pipeline: "fonts",
            file: None,
            message: "vendor package missing: vendor/fontawesome".to_string(),
        });

        let lines = format_build_summary(&summary, Mode::Development);
        assert!(lines.contains(&"Alerts".to_string()));
        assert!(lines.contains(&"    styles: bad.sass: undefined variable".to_string()));
        assert!(lines.contains(&"    fonts: vendor package missing: vendor/fontawesome".to_string()));
    }

    #[test]
    fn lint_section_nests_under_the_summary() {
        let mut summary = BuildSummary::default();
        summary.lint = Some(LintReport {
            files: vec![],
            checked: 3,
            from_cache: 2,
        });

        let lines = format_build_summary(&summary, Mode::Development);
        let at = lines.iter().position(|l| l == "Lint").unwrap();
        assert_eq!(lines[at + 1], "    3 files checked (2 from cache), no problems");
    }

    // =========================================================================
    // Lint report
    // =========================================================================

    #[test]
    fn clean_lint_report_is_one_line() {
        let report = LintReport {
            files: vec![FileLintResult {
                rel: "app.js".to_string(),
                outcome: LintOutcome::default(),
            }],
            checked: 1,
            from_cache: 0,
        };
        assert_eq!(format_lint_report(&report), vec!["1 files checked, no problems"]);
    }

    #[test]
    fn findings_group_under_their_file() {
        let report = LintReport {
            files: vec![
                FileLintResult {
                    rel: "app.js".to_string(),
                    outcome: LintOutcome {
                        messages: vec![
                            finding(3, 1, "no-console", "unexpected console statement", Severity::Warning),
                            finding(9, 5, "no-debugger", "unexpected 'debugger' statement", Severity::Error),
                        ],
                    },
                },
                FileLintResult {
                    rel: "clean.js".to_string(),
                    outcome: LintOutcome::default(),
                },
            ],
            checked: 2,
            from_cache: 0,
        };

        let lines = format_lint_report(&report);
        assert_eq!(lines[0], "app.js");
        assert_eq!(lines[1], "    3:1 warning unexpected console statement (no-console)");
        assert_eq!(lines[2], "    9:5 error unexpected 'debugger' statement (no-debugger)");
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "2 files checked, 1 errors, 1 warnings");
    }

    #[test]
    fn clean_files_are_not_listed() {
        let report = LintReport {
            files: vec![FileLintResult {
                rel: "clean.js".to_string(),
                outcome: LintOutcome::default(),
            }],
            checked: 1,
            from_cache: 1,
        };
        let lines = format_lint_report(&report);
        assert!(!lines.contains(&"clean.js".to_string()));
        assert_eq!(lines.last().unwrap(), "1 files checked (1 from cache), no problems");
    }
}
