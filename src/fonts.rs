//! Icon-font vendor sync.
//!
//! Font Awesome ships as a vendored package under `vendor/fontawesome/`.
//! Two copies bring it into the build:
//!
//! - `scss/` goes to `src/styles/vendors/fontawesome/`, where the
//!   stylesheet sources can `@import` it (the `vendors/` subtree is
//!   excluded from direct compilation).
//! - `webfonts/` goes to `assets/webfonts/` in the output, where the
//!   vendor SCSS expects to find the font files at runtime.
//!
//! Both copies always overwrite: a vendor upgrade must propagate without
//! a `clean`. A missing vendor package is reported as an alert and the
//! task completes empty, so a fresh checkout without vendor files still
//! builds everything else.

use crate::config::Config;
use crate::fileset::FileSet;
use crate::notifier::Notifier;
use crate::pipeline::{Pipeline, PipelineError, PipelineReport};

const VENDOR_PACKAGE: &str = "fontawesome";
const SCSS_SUBDIR: &str = "scss";
const WEBFONTS_SUBDIR: &str = "webfonts";
/// Destination under the styles source tree for the vendor SCSS.
const STYLES_VENDOR_DEST: &str = "vendors/fontawesome";

/// Copy the vendor SCSS and webfonts into place.
pub fn run(config: &Config, notifier: &Notifier) -> Result<PipelineReport, PipelineError> {
    let package = config.vendor_dir().join(VENDOR_PACKAGE);
    if !package.exists() {
        notifier.notify(
            "fonts",
            None,
            format!("vendor package missing: {}", package.display()),
        );
        return Ok(PipelineReport::new("fonts"));
    }

    let copier = Pipeline::new("fonts");

    let scss_globs = vec!["**/*.scss".to_string()];
    let scss = FileSet::new(package.join(SCSS_SUBDIR), &scss_globs, &[])?;
    let scss_dest = config.styles_dir().join(STYLES_VENDOR_DEST);
    let mut report = copier.run(&scss, &scss_dest, notifier)?;

    let font_globs = vec!["**/*".to_string()];
    let webfonts = FileSet::new(package.join(WEBFONTS_SUBDIR), &font_globs, &[])?;
    report.merge(copier.run(&webfonts, &config.fonts_dest(), notifier)?);

    Ok(report)
}
