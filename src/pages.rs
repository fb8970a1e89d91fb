//! Page template pipeline.
//!
//! Renders the Tera templates under `src/pages/` to HTML at the root of
//! the output directory, preserving subdirectories (`blog/post.tera`
//! becomes `blog/post.html`). Shared fragments live under
//! `src/templates/` and are registered under their own relative names, so
//! pages can `{% include "header.tera" %}` or `{% extends "base.tera" %}`.
//!
//! All templates are parsed up front into one engine. A fragment that
//! fails to parse is reported once and dropped; a page that fails to parse
//! is dropped from the run with its parse error, and the remaining pages
//! still render. Rendered HTML is minified in both modes; development
//! builds additionally get a `.map` sidecar carrying the original template
//! text.
//!
//! Templates see two context values and one function:
//!
//! - `mode`: `"development"` or `"production"`
//! - `assets`: the asset URL base (`./assets`, or `$STATIC_URL/assets`)
//! - `asset(path=...)`: full URL for one asset, e.g.
//!   `{{ asset(path="css/main.css") }}`

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use tera::Tera;

use crate::config::{self, Config, Mode};
use crate::fileset::{FileSet, rel_slashes};
use crate::minify;
use crate::notifier::Notifier;
use crate::pipeline::{
    Asset, Pipeline, PipelineError, PipelineReport, Sidecar, StepError, StepResult, record_source,
};
use crate::sourcemap::{self, SourceMap};

/// Registration-name prefix that keeps pages from colliding with
/// fragments in the engine's template namespace.
const PAGE_PREFIX: &str = "pages/";

/// Render all pages for `mode`.
pub fn run(
    config: &Config,
    mode: Mode,
    notifier: &Notifier,
) -> Result<PipelineReport, PipelineError> {
    let files = FileSet::new(config.pages_dir(), &config.pages.sources, &[])?;
    let sources = collect_template_sources(config, notifier)?;
    let (mut engine, failures) = build_engine(&sources);
    engine.register_function("asset", asset_function);

    let mut page_failures = BTreeMap::new();
    for (name, message) in failures {
        match name.strip_prefix(PAGE_PREFIX) {
            Some(rel) => {
                page_failures.insert(rel.to_string(), message);
            }
            None => notifier.notify("pages", Some(name), message),
        }
    }

    let pipeline = build_pipeline(mode, Arc::new(engine), Arc::new(page_failures));
    pipeline.run(&files, &config.output_dir(), notifier)
}

fn build_pipeline(
    mode: Mode,
    engine: Arc<Tera>,
    failures: Arc<BTreeMap<String, String>>,
) -> Pipeline {
    let dev = !mode.is_production();
    let context = page_context(mode);

    Pipeline::new("pages")
        .step_if(dev, "record-source", record_source)
        .step("render", move |mut asset| {
            let rel = asset.rel_display();
            if let Some(message) = failures.get(&rel) {
                return Err(StepError::Failed(message.clone()));
            }
            let html = engine
                .render(&format!("{PAGE_PREFIX}{rel}"), &context)
                .map_err(|e| StepError::Failed(template_error_message(&e)))?;
            asset.set_text(html);
            Ok(asset)
        })
        .step("minify", |mut asset| {
            let html = minify::minify_html(asset.text()?);
            asset.set_text(html);
            Ok(asset)
        })
        .step("rename-html", |mut asset| {
            asset.rel_path = asset.rel_path.with_extension("html");
            Ok(asset)
        })
        .step_if(dev, "write-map", write_map)
}

fn write_map(mut asset: Asset) -> StepResult {
    let Some(source) = asset.source.clone() else {
        return Ok(asset);
    };
    let map_rel = sourcemap::map_path(&asset.rel_path);
    let file_name = asset
        .rel_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let map = SourceMap::new(&file_name, &source.rel, &source.text);
    asset.sidecars.push(Sidecar {
        rel_path: map_rel,
        contents: map.to_json().into_bytes(),
    });
    Ok(asset)
}

fn page_context(mode: Mode) -> tera::Context {
    let mut context = tera::Context::new();
    context.insert("mode", mode.as_str());
    context.insert("assets", &config::asset_url(""));
    context
}

fn asset_function(args: &HashMap<String, tera::Value>) -> tera::Result<tera::Value> {
    let path = args.get("path").and_then(|v| v.as_str()).unwrap_or("");
    Ok(tera::Value::String(config::asset_url(path)))
}

/// Read fragments and pages into (registration name, text) pairs.
/// Fragments keep their relative names; pages get the [`PAGE_PREFIX`].
/// An unreadable fragment is reported here; an unreadable page is left to
/// the pipeline's own read, which reports it per file.
fn collect_template_sources(
    config: &Config,
    notifier: &Notifier,
) -> Result<Vec<(String, String)>, PipelineError> {
    let mut sources = Vec::new();

    let fragments = FileSet::new(config.fragments_dir(), &config.pages.sources, &[])?;
    for file in fragments.enumerate()? {
        let rel = rel_slashes(&file.rel);
        match std::fs::read_to_string(&file.path) {
            Ok(text) => sources.push((rel, text)),
            Err(e) => notifier.notify("pages", Some(rel), format!("fragment read failed: {e}")),
        }
    }

    let pages = FileSet::new(config.pages_dir(), &config.pages.sources, &[])?;
    for file in pages.enumerate()? {
        let rel = rel_slashes(&file.rel);
        match std::fs::read_to_string(&file.path) {
            Ok(text) => sources.push((format!("{PAGE_PREFIX}{rel}"), text)),
            Err(e) => {
                tracing::debug!(file = %rel, %e, "page unreadable at registration");
            }
        }
    }
    Ok(sources)
}

/// Parse all template sources into one engine. Templates that fail to
/// parse (or whose inheritance cannot be resolved) are dropped and
/// collected with their error text; each retry rebuilds the engine
/// without the templates dropped so far, so one broken template cannot
/// poison the rest.
fn build_engine(sources: &[(String, String)]) -> (Tera, BTreeMap<String, String>) {
    let mut failures: BTreeMap<String, String> = BTreeMap::new();
    loop {
        let mut engine = Tera::default();
        let mut dropped = None;
        for (name, text) in sources.iter().filter(|(n, _)| !failures.contains_key(n)) {
            if let Err(err) = engine.add_raw_template(name, text) {
                dropped = Some((name.clone(), template_error_message(&err)));
                break;
            }
        }
        match dropped {
            Some((name, message)) => {
                failures.insert(name, message);
            }
            None => return (engine, failures),
        }
    }
}

/// Tera's `Display` is just the headline; the actual parse or render
/// detail sits in the error source chain.
fn template_error_message(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(err) = source {
        message.push_str(": ");
        message.push_str(&err.to_string());
        source = err.source();
    }
    message
}
