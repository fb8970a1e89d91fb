//! Project configuration module.
//!
//! Handles loading, validating, and merging the `sitewright.toml` project
//! file. Values from the file are overlaid on stock defaults, so a config
//! file only needs the keys it wants to change.
//!
//! ## Project Layout
//!
//! The defaults assume this tree, rooted at the project directory:
//!
//! ```text
//! project/
//! ├── sitewright.toml          # Optional config (overrides stock defaults)
//! ├── src/
//! │   ├── pages/               # Page templates, rendered to HTML
//! │   ├── templates/           # Shared fragments (extended/included by pages)
//! │   ├── styles/              # Stylesheets (indented and braced syntax)
//! │   ├── img/                 # Images, copied (and optimized in production)
//! │   └── js-modules/          # Script modules
//! ├── vendor/                  # Third-party assets staged before builds
//! └── dist/                    # Build output (wiped by `clean`)
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [paths]
//! source = "src"            # Source tree, relative to the project root
//! output = "dist"           # Output tree, relative to the project root
//! vendor = "vendor"         # Vendored third-party assets
//!
//! [server]
//! port = 3000               # Dev server port
//!
//! [pages]
//! dir = "pages"             # Page templates, relative to paths.source
//! fragments_dir = "templates"
//! sources = ["**/*.tera"]
//!
//! [styles]
//! dir = "styles"
//! sources = ["**/*.sass", "**/*.scss"]
//! exclude = ["vendors/**", "**/_*"]   # Vendored sheets and partials
//!
//! [images]
//! dir = "img"
//! sources = ["**/*"]
//! quality = 80              # JPEG re-encode quality (1-100, production only)
//!
//! [scripts]
//! dir = "js-modules"
//! sources = ["*.js"]        # Top level only, subdirectories are ignored
//!
//! [lint]
//! cache_file = "tmp/cache-eslint.json"  # Relative to the project root
//! max_line_length = 120
//! ```
//!
//! Unknown keys are rejected to catch typos early.
//!
//! The `STATIC_URL` environment variable sets the URL prefix under which
//! built assets are served (pages reference styles and scripts through it).
//! When unset, assets resolve relative to the page (`./assets`).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name, looked up in the project root.
pub const DEFAULT_CONFIG_FILE: &str = "sitewright.toml";

/// Environment variable naming the asset URL prefix baked into pages.
pub const STATIC_URL_VAR: &str = "STATIC_URL";

/// Output subtree for compiled stylesheets.
pub const CSS_SUBTREE: &str = "assets/css";
/// Output subtree for images.
pub const IMAGES_SUBTREE: &str = "assets/img";
/// Output subtree for script modules.
pub const SCRIPTS_SUBTREE: &str = "assets/js-modules";
/// Output subtree for vendored font files.
pub const FONTS_SUBTREE: &str = "assets/webfonts";
/// Output subtree holding the production asset manifest.
pub const MANIFEST_SUBTREE: &str = "manifest";
/// Manifest file mapping original stylesheet names to hashed output names.
pub const STYLE_MANIFEST_FILE: &str = "css.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("config file not found: {0}")]
    Missing(PathBuf),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Build mode, threaded explicitly through every pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Development,
    Production,
}

impl Mode {
    pub fn is_production(self) -> bool {
        matches!(self, Mode::Production)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
        }
    }
}

/// Project configuration loaded from `sitewright.toml`.
///
/// All fields have defaults matching the stock project layout. User config
/// files need only specify the values they want to override. Unknown keys
/// are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Project root the relative paths below resolve against.
    /// Set by [`Config::load`], never read from the file.
    #[serde(skip)]
    pub root: PathBuf,
    /// Source, output, and vendor tree locations.
    pub paths: PathsConfig,
    /// Dev server settings.
    pub server: ServerConfig,
    /// Page template pipeline settings.
    pub pages: PagesConfig,
    /// Stylesheet pipeline settings.
    pub styles: StylesConfig,
    /// Image pipeline settings.
    pub images: ImagesConfig,
    /// Script pipeline settings.
    pub scripts: ScriptsConfig,
    /// Script lint settings.
    pub lint: LintConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            paths: PathsConfig::default(),
            server: ServerConfig::default(),
            pages: PagesConfig::default(),
            styles: StylesConfig::default(),
            images: ImagesConfig::default(),
            scripts: ScriptsConfig::default(),
            lint: LintConfig::default(),
        }
    }
}

/// Source, output, and vendor tree locations, relative to the project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Source tree holding pages, styles, images, and scripts.
    pub source: String,
    /// Output tree produced by builds and removed by `clean`.
    pub output: String,
    /// Vendored third-party assets staged into the build.
    pub vendor: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source: "src".to_string(),
            output: "dist".to_string(),
            vendor: "vendor".to_string(),
        }
    }
}

/// Dev server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// TCP port the dev server binds on localhost.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

/// Page template pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PagesConfig {
    /// Directory of page templates, relative to `paths.source`.
    pub dir: String,
    /// Directory of shared fragments pages extend or include.
    pub fragments_dir: String,
    /// Glob patterns selecting page files within `dir`.
    pub sources: Vec<String>,
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            dir: "pages".to_string(),
            fragments_dir: "templates".to_string(),
            sources: vec!["**/*.tera".to_string()],
        }
    }
}

/// Stylesheet pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StylesConfig {
    /// Directory of stylesheets, relative to `paths.source`.
    pub dir: String,
    /// Glob patterns selecting entry stylesheets within `dir`.
    pub sources: Vec<String>,
    /// Glob patterns excluded from compilation (still reachable via imports).
    pub exclude: Vec<String>,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            dir: "styles".to_string(),
            sources: vec!["**/*.sass".to_string(), "**/*.scss".to_string()],
            exclude: vec!["vendors/**".to_string(), "**/_*".to_string()],
        }
    }
}

/// Image pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Directory of images, relative to `paths.source`.
    pub dir: String,
    /// Glob patterns selecting images within `dir`.
    pub sources: Vec<String>,
    /// JPEG re-encode quality (1 = worst, 100 = best), production builds only.
    pub quality: u8,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            dir: "img".to_string(),
            sources: vec!["**/*".to_string()],
            quality: 80,
        }
    }
}

/// Script pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptsConfig {
    /// Directory of script modules, relative to `paths.source`.
    pub dir: String,
    /// Glob patterns selecting scripts within `dir`. The stock pattern is
    /// non-recursive: subdirectories hold private helpers and are skipped.
    pub sources: Vec<String>,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            dir: "js-modules".to_string(),
            sources: vec!["*.js".to_string()],
        }
    }
}

/// Script lint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LintConfig {
    /// Lint result cache location, relative to the project root.
    pub cache_file: String,
    /// Maximum allowed line length before the `max-len` rule fires.
    pub max_line_length: u32,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            cache_file: "tmp/cache-eslint.json".to_string(),
            max_line_length: 120,
        }
    }
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.images.quality == 0 || self.images.quality > 100 {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port must be non-zero".into(),
            ));
        }
        for (section, sources) in [
            ("pages", &self.pages.sources),
            ("styles", &self.styles.sources),
            ("images", &self.images.sources),
            ("scripts", &self.scripts.sources),
        ] {
            if sources.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "{section}.sources must not be empty"
                )));
            }
        }
        if self.lint.max_line_length == 0 {
            return Err(ConfigError::Validation(
                "lint.max_line_length must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Load config for the project rooted at `root`.
    ///
    /// Reads `sitewright.toml` from the root (or `file` when given; a missing
    /// explicit file is an error, a missing default file is not), merges it
    /// on top of stock defaults, rejects unknown keys, and validates. The
    /// root is canonicalized so every derived path below is absolute.
    pub fn load(root: &Path, file: Option<&Path>) -> Result<Config, ConfigError> {
        let root = root.canonicalize()?;
        let config_path = match file {
            Some(f) if f.is_absolute() => f.to_path_buf(),
            Some(f) => root.join(f),
            None => root.join(DEFAULT_CONFIG_FILE),
        };
        let overlay = match load_raw_config(&config_path)? {
            Some(value) => Some(value),
            None if file.is_some() => return Err(ConfigError::Missing(config_path)),
            None => None,
        };
        let mut config = resolve_config(stock_defaults_value(), overlay)?;
        config.root = root;
        Ok(config)
    }

    // Source-side directories.

    pub fn source_dir(&self) -> PathBuf {
        self.root.join(&self.paths.source)
    }

    pub fn vendor_dir(&self) -> PathBuf {
        self.root.join(&self.paths.vendor)
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.source_dir().join(&self.pages.dir)
    }

    pub fn fragments_dir(&self) -> PathBuf {
        self.source_dir().join(&self.pages.fragments_dir)
    }

    pub fn styles_dir(&self) -> PathBuf {
        self.source_dir().join(&self.styles.dir)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.source_dir().join(&self.images.dir)
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.source_dir().join(&self.scripts.dir)
    }

    // Output-side directories. Pages land at the output root; the other
    // pipelines write into fixed subtrees the page URLs point at.

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.paths.output)
    }

    pub fn css_dest(&self) -> PathBuf {
        self.output_dir().join(CSS_SUBTREE)
    }

    pub fn images_dest(&self) -> PathBuf {
        self.output_dir().join(IMAGES_SUBTREE)
    }

    pub fn scripts_dest(&self) -> PathBuf {
        self.output_dir().join(SCRIPTS_SUBTREE)
    }

    pub fn fonts_dest(&self) -> PathBuf {
        self.output_dir().join(FONTS_SUBTREE)
    }

    pub fn manifest_dir(&self) -> PathBuf {
        self.output_dir().join(MANIFEST_SUBTREE)
    }

    pub fn lint_cache_path(&self) -> PathBuf {
        self.root.join(&self.lint.cache_file)
    }
}

/// Resolve the asset URL prefix pages are rendered with.
///
/// Reads `STATIC_URL` from the environment; when unset or empty the prefix
/// falls back to `.`, so assets resolve relative to the served page.
pub fn asset_url(suffix: &str) -> String {
    let prefix = std::env::var(STATIC_URL_VAR).ok();
    asset_url_from(prefix.as_deref(), suffix)
}

/// Pure form of [`asset_url`] for an explicit prefix.
///
/// The result is `<prefix>/assets` with `suffix` appended when non-empty.
/// Trailing slashes on the prefix and leading slashes on the suffix are
/// normalized away.
pub fn asset_url_from(prefix: Option<&str>, suffix: &str) -> String {
    let prefix = match prefix {
        Some(p) if !p.is_empty() => p.trim_end_matches('/'),
        _ => ".",
    };
    let mut url = format!("{prefix}/assets");
    let suffix = suffix.trim_start_matches('/');
    if !suffix.is_empty() {
        url.push('/');
        url.push_str(suffix);
    }
    url
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Config::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Config, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}
