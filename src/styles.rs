//! Stylesheet pipeline.
//!
//! Compiles the Sass/SCSS sources under `src/styles/` into CSS under
//! `assets/css/`. Partials (`_*`) and vendor sheets are excluded from
//! enumeration but stay reachable through `@import`; imports resolve
//! against the styles tree first, then the project vendor directory.
//!
//! Steps by mode:
//!
//! - **development**: compile → vendor prefixes → sidecar source map with
//!   a `sourceMappingURL` reference appended to the sheet.
//! - **production**: compile → vendor prefixes → minify → content-hashed
//!   file name. The original-to-hashed name mapping is written to
//!   `manifest/css.json` under the output directory, for templates that
//!   need to reference hashed sheets.
//!
//! Hashed names change exactly when the final CSS bytes change, so a
//! far-future cache policy on `assets/css/` is safe.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use sha2::{Digest, Sha256};

use crate::config::{Config, Mode, STYLE_MANIFEST_FILE};
use crate::fileset::FileSet;
use crate::minify;
use crate::notifier::Notifier;
use crate::pipeline::{
    Asset, Pipeline, PipelineError, PipelineReport, Sidecar, StepResult, record_source,
};
use crate::scss;
use crate::sourcemap::{self, SourceMap};

/// Hex digits of the content hash kept in production file names.
const HASH_LEN: usize = 10;

type Manifest = Arc<Mutex<BTreeMap<String, String>>>;

/// Compile all stylesheets for `mode`. In production this also writes the
/// name manifest.
pub fn run(
    config: &Config,
    mode: Mode,
    notifier: &Notifier,
) -> Result<PipelineReport, PipelineError> {
    let files = FileSet::new(
        config.styles_dir(),
        &config.styles.sources,
        &config.styles.exclude,
    )?;
    let manifest: Manifest = Arc::default();
    let pipeline = build_pipeline(config, mode, Arc::clone(&manifest));
    let report = pipeline.run(&files, &config.css_dest(), notifier)?;

    if mode.is_production() {
        write_manifest(config, &lock(&manifest))?;
    }
    Ok(report)
}

fn build_pipeline(config: &Config, mode: Mode, manifest: Manifest) -> Pipeline {
    let dev = !mode.is_production();
    let styles_dir = config.styles_dir();
    let search_paths = vec![config.styles_dir(), config.vendor_dir()];

    Pipeline::new("styles")
        .step_if(dev, "record-source", record_source)
        .step("compile", move |mut asset| {
            let source = asset.text()?.to_string();
            let origin = styles_dir.join(&asset.rel_path);
            let css = scss::compile_source(&source, &origin, &search_paths)?;
            asset.set_text(css);
            Ok(asset)
        })
        .step("rename-css", |mut asset| {
            asset.rel_path = asset.rel_path.with_extension("css");
            Ok(asset)
        })
        .step("prefix", |mut asset| {
            let css = prefix_css(asset.text()?);
            asset.set_text(css);
            Ok(asset)
        })
        .step_if(!dev, "minify", |mut asset| {
            let css = minify::minify_css(asset.text()?);
            asset.set_text(css);
            Ok(asset)
        })
        .step_if(!dev, "rev", move |mut asset| {
            let original = asset.rel_display();
            let hash = content_hash(&asset.contents);
            asset.rel_path = hashed_name(&asset.rel_path, &hash);
            lock(&manifest).insert(original, asset.rel_display());
            Ok(asset)
        })
        .step_if(dev, "write-map", write_map)
}

fn write_map(mut asset: Asset) -> StepResult {
    let Some(source) = asset.source.clone() else {
        return Ok(asset);
    };
    let map_rel = sourcemap::map_path(&asset.rel_path);
    let file_name = file_name_string(&asset.rel_path);
    let map_name = file_name_string(&map_rel);
    let map = SourceMap::new(&file_name, &source.rel, &source.text);

    let mut css = asset.text()?.to_string();
    css.push_str(&sourcemap::css_map_reference(&map_name));
    asset.set_text(css);
    asset.sidecars.push(Sidecar {
        rel_path: map_rel,
        contents: map.to_json().into_bytes(),
    });
    Ok(asset)
}

fn file_name_string(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn lock(manifest: &Manifest) -> MutexGuard<'_, BTreeMap<String, String>> {
    match manifest.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_manifest(config: &Config, entries: &BTreeMap<String, String>) -> Result<(), PipelineError> {
    if entries.is_empty() {
        return Ok(());
    }
    let dir = config.manifest_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(entries).map_err(io::Error::from)?;
    let path = dir.join(STYLE_MANIFEST_FILE);
    std::fs::write(&path, json)?;
    tracing::debug!(path = %path.display(), entries = entries.len(), "style manifest written");
    Ok(())
}

// =============================================================================
// Content hashing
// =============================================================================

/// Short hex hash of the final file contents.
pub fn content_hash(contents: &[u8]) -> String {
    let digest = Sha256::digest(contents);
    let hex = format!("{digest:x}");
    hex[..HASH_LEN].to_string()
}

/// `main.css` + `1a2b3c4d5e` → `main-1a2b3c4d5e.css`, keeping the
/// directory part.
pub fn hashed_name(rel: &Path, hash: &str) -> PathBuf {
    let stem = rel
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match rel.extension() {
        Some(ext) => format!("{stem}-{hash}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{hash}"),
    };
    rel.with_file_name(name)
}

// =============================================================================
// Vendor prefixes
// =============================================================================

/// Properties that still need vendor-prefixed duplicates in current
/// browsers.
const PROPERTY_PREFIXES: &[(&str, &[&str])] = &[
    ("appearance", &["-webkit-", "-moz-"]),
    ("backdrop-filter", &["-webkit-"]),
    ("box-decoration-break", &["-webkit-"]),
    ("hyphens", &["-webkit-", "-ms-"]),
    ("mask", &["-webkit-"]),
    ("mask-image", &["-webkit-"]),
    ("tab-size", &["-moz-"]),
    ("text-size-adjust", &["-webkit-", "-ms-"]),
    ("user-select", &["-webkit-", "-moz-", "-ms-"]),
];

/// Insert vendor-prefixed duplicates above declarations that need them.
/// Operates line-wise on the compiler's one-declaration-per-line output.
pub fn prefix_css(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    for line in css.lines() {
        let trimmed = line.trim_start();
        let indent = &line[..line.len() - trimmed.len()];
        if let Some((prop, value)) = split_declaration(trimmed) {
            let bare_value = value.trim_end_matches(';').trim();
            if prop == "position" && bare_value == "sticky" {
                out.push_str(indent);
                out.push_str("position: -webkit-sticky;\n");
            } else if prop == "background-clip" && bare_value == "text" {
                out.push_str(indent);
                out.push_str("-webkit-background-clip: text;\n");
            } else if let Some((_, prefixes)) = PROPERTY_PREFIXES.iter().find(|(p, _)| *p == prop) {
                for prefix in *prefixes {
                    out.push_str(indent);
                    out.push_str(prefix);
                    out.push_str(prop);
                    out.push_str(": ");
                    out.push_str(value);
                    out.push('\n');
                }
            }
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Split a `prop: value;` line, rejecting selectors, at-rules, comments,
/// and already-prefixed declarations.
fn split_declaration(trimmed: &str) -> Option<(&str, &str)> {
    if trimmed.starts_with('-') || trimmed.starts_with('@') || trimmed.starts_with("/*") {
        return None;
    }
    if trimmed.contains('{') || trimmed.contains('}') {
        return None;
    }
    let colon = trimmed.find(':')?;
    let prop = trimmed[..colon].trim();
    if prop.is_empty() || !prop.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return None;
    }
    let value = trimmed[colon + 1..].trim();
    if value.is_empty() {
        return None;
    }
    Some((prop, value))
}
