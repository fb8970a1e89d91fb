//! # Sitewright
//!
//! A declarative asset build tool for static sites. Sources live under
//! `src/`, vendored third-party assets under `vendor/`, and a build
//! compiles everything into a deployable `dist/` tree:
//!
//! ```text
//! src/pages/**/*.tera    →  dist/**/*.html              (rendered, minified)
//! src/styles/**/*.sass   →  dist/assets/css/            (compiled, prefixed, hashed)
//! src/img/**/*           →  dist/assets/img/            (copied, optimized)
//! src/js-modules/*.js    →  dist/assets/js-modules/     (copied, compressed)
//! vendor/fontawesome/    →  dist/assets/webfonts/       (staged)
//! ```
//!
//! # Architecture: Parallel Per-File Pipelines
//!
//! A build wipes the output tree, stages vendored assets, then runs the
//! four source pipelines and the script lint concurrently. Each pipeline
//! is a short chain of per-file steps over a glob-selected file set; the
//! shared runner in [`pipeline`] enumerates sources, applies the steps,
//! and writes results.
//!
//! Failures are per-file: a stylesheet that does not compile or a
//! template that does not render drops that one file, records an alert,
//! and the rest of the build completes. This keeps the dev loop alive
//! while you are mid-edit in one file.
//!
//! Build mode ([`config::Mode`]) is threaded explicitly. Development
//! builds keep output readable and attach source map sidecars;
//! production builds minify, optimize images, and emit content-hashed
//! stylesheet names with a `manifest/css.json` mapping for deploys.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`tasks`] | Build orchestration from vendor staging through the summary |
//! | [`pipeline`] | Shared per-file runner: enumerate, transform, write, route failures |
//! | [`pages`] | Template rendering to minified HTML |
//! | [`styles`] | Stylesheet compilation, vendor prefixing, minification, content hashing |
//! | [`images`] | Image copying, production re-encoding behind [`images::ImageCodec`] |
//! | [`scripts`] | Script module copying and production compression |
//! | [`fonts`] | Vendored icon-font staging into styles and output trees |
//! | [`scss`] | Stylesheet compiler for indented and braced syntax |
//! | [`minify`] | HTML, CSS, and JS minifiers |
//! | [`sourcemap`] | Source map sidecars for development builds |
//! | [`lint`] | Script lint rules with an mtime-keyed result cache |
//! | [`cache`] | Versioned lint cache persistence |
//! | [`fileset`] | Glob-based source enumeration |
//! | [`config`] | `sitewright.toml` loading and the derived directory layout |
//! | [`notifier`] | Per-file failure collection shared across pipelines |
//! | [`watch`] | Source watching and pipeline reruns for the dev loop |
//! | [`serve`] | Dev server with live reload |
//! | [`output`] | CLI output formatting |
//! | [`logging`] | Log filtering and setup |
//!
//! # Design Decisions
//!
//! ## Content-Hashed Stylesheets
//!
//! Production stylesheet names embed a hash of the compiled contents
//! (`main-3f2a9c41d0.css`), and `manifest/css.json` maps original names
//! to hashed ones. Deploys can cache CSS forever; a changed sheet gets a
//! new name, an unchanged sheet keeps its old one.
//!
//! ## Broken Template Isolation
//!
//! Template inheritance means one broken fragment can poison every page
//! that extends it. [`pages`] registers templates one at a time and
//! rebuilds the engine without any template that fails to parse, so a
//! syntax error in one page leaves every other page rendering.
//!
//! ## Mtime-Keyed Lint Cache
//!
//! Lint results persist across runs keyed by file path and modification
//! time. Warm runs re-lint only files that changed since the cache was
//! written. The cache file is versioned and a corrupt or stale cache
//! falls back to a cold run.
//!
//! ## The Dev Loop
//!
//! `sitewright dev` builds once, then watches sources and reruns only
//! the pipeline that owns a changed file, while [`serve`] hosts the
//! output on localhost and pushes a live reload to connected browsers
//! whenever the output tree changes.

pub mod cache;
pub mod config;
pub mod fileset;
pub mod fonts;
pub mod images;
pub mod lint;
pub mod logging;
pub mod minify;
pub mod notifier;
pub mod output;
pub mod pages;
pub mod pipeline;
pub mod scripts;
pub mod scss;
pub mod serve;
pub mod sourcemap;
pub mod styles;
pub mod tasks;
pub mod watch;

#[cfg(test)]
pub(crate) mod test_helpers;
