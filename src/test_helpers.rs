//! Shared test utilities for the sitewright test suite.
//!
//! Provides a root-pinned config, project tree scaffolding, and report
//! assertions used across pipeline tests.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! scaffold_project(tmp.path());
//! let config = test_config(tmp.path());
//!
//! let report = styles::run(&config, Mode::Development, &notifier).unwrap();
//! assert_written(&report, "main.css");
//! ```

use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::pipeline::PipelineReport;

// =========================================================================
// Config and project scaffolding
// =========================================================================

/// Stock config rooted at `root`. Tests tweak fields from here.
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.root = root.to_path_buf();
    config
}

/// Write `rel` under `root`, creating parent directories as needed.
pub fn write_file(root: &Path, rel: &str, contents: impl AsRef<[u8]>) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Lay down a small complete project: one page extending one fragment,
/// one stylesheet, one image, one script, and the vendored font package.
pub fn scaffold_project(root: &Path) {
    write_file(
        root,
        "src/templates/base.tera",
        "<html><body>{% block body %}{% endblock body %}</body></html>",
    );
    write_file(
        root,
        "src/pages/index.tera",
        "{% extends \"base.tera\" %}{% block body %}<h1>{{ mode }}</h1>{% endblock body %}",
    );
    write_file(root, "src/styles/main.sass", "body\n  margin: 0\n");
    write_file(root, "src/img/logo.bin", "image bytes");
    write_file(root, "src/js-modules/app.js", "const app = 1;\n");
    write_file(root, "vendor/fontawesome/scss/fontawesome.scss", "// fa\n");
    write_file(root, "vendor/fontawesome/webfonts/fa.woff2", "font bytes");
}

// =========================================================================
// Report assertions that panic with a clear message on miss
// =========================================================================

/// Assert `rel` is among the report's written files.
pub fn assert_written(report: &PipelineReport, rel: &str) {
    assert!(
        report.written.iter().any(|w| w == rel),
        "'{rel}' not written by {}. Written: {:?}",
        report.pipeline,
        report.written
    );
}

/// Assert `rel` is among the report's failed files.
pub fn assert_failed(report: &PipelineReport, rel: &str) {
    assert!(
        report.failed.iter().any(|f| f == rel),
        "'{rel}' did not fail in {}. Failed: {:?}",
        report.pipeline,
        report.failed
    );
}
