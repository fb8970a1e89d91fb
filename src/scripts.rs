//! Script module pipeline.
//!
//! Copies the flat JS modules under `src/js-modules/` into
//! `assets/js-modules/`. The default set is `*.js` at the top level only;
//! there is no bundling or transpilation, the files ship as written.
//! Production builds run the conservative compressor from
//! [`crate::minify`] over each file.
//!
//! Linting is a separate concern: the build task runs
//! [`crate::lint`] over the same set before copying, but findings never
//! stop the copy.

use crate::config::{Config, Mode};
use crate::fileset::FileSet;
use crate::minify;
use crate::notifier::Notifier;
use crate::pipeline::{Pipeline, PipelineError, PipelineReport};

/// Copy (and in production, compress) all script modules.
pub fn run(
    config: &Config,
    mode: Mode,
    notifier: &Notifier,
) -> Result<PipelineReport, PipelineError> {
    let files = FileSet::new(config.scripts_dir(), &config.scripts.sources, &[])?;
    let pipeline = Pipeline::new("scripts").step_if(
        mode.is_production(),
        "compress",
        |mut asset| {
            let js = minify::compress_js(asset.text()?);
            asset.set_text(js);
            Ok(asset)
        },
    );
    pipeline.run(&files, &config.scripts_dest(), notifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::test_config;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_script(root: &Path, name: &str, contents: &str) {
        let path = root.join("src/js-modules").join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn development_copies_verbatim() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let source = "// init widget\nconst widget = {};\n\nexport default widget;\n";
        write_script(tmp.path(), "widget.js", source);

        let report = run(&config, Mode::Development, &Notifier::default()).unwrap();
        assert_eq!(report.written, vec!["widget.js"]);

        let copied = fs::read_to_string(config.scripts_dest().join("widget.js")).unwrap();
        assert_eq!(copied, source, "comments and blank lines survive");
    }

    #[test]
    fn production_compresses() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        write_script(
            tmp.path(),
            "widget.js",
            "// init widget\nconst widget = {};\n\nexport default widget;\n",
        );

        run(&config, Mode::Production, &Notifier::default()).unwrap();

        let compressed = fs::read_to_string(config.scripts_dest().join("widget.js")).unwrap();
        assert_eq!(compressed, "const widget = {};\nexport default widget;\n");
    }

    #[test]
    fn nested_files_are_outside_the_default_set() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        write_script(tmp.path(), "top.js", "const a = 1;\n");
        write_script(tmp.path(), "lib/helper.js", "const b = 2;\n");

        let report = run(&config, Mode::Development, &Notifier::default()).unwrap();
        assert_eq!(report.written, vec!["top.js"]);
    }

    #[test]
    fn non_utf8_file_fails_compression_only() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let dir = tmp.path().join("src/js-modules");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("weird.js"), [0xff, 0xfe, 0x00]).unwrap();

        let notifier = Notifier::default();
        let report = run(&config, Mode::Production, &notifier).unwrap();
        assert_eq!(report.failed, vec!["weird.js"]);
        assert_eq!(notifier.len(), 1);

        // development has no text step, the bytes just copy
        let report = run(&config, Mode::Development, &Notifier::default()).unwrap();
        assert_eq!(report.written, vec!["weird.js"]);
    }
}
