//! Stylesheet compilation.
//!
//! Compiles the project's stylesheet dialect to plain CSS without shelling
//! out to an external toolchain. The supported language is the subset the
//! style pipeline needs:
//!
//! - `$variables` with lexical scoping, `!default`, and `#{}` interpolation
//! - nested rules with `&` parent references and comma selector lists
//! - `@import` with search paths, `_partial` resolution, both syntaxes,
//!   and CSS passthrough for `url(...)`, protocol, and `.css` targets
//! - block at-rules (`@media`, `@supports`, `@font-face`) one level deep,
//!   bubbling out of style rules with the enclosing selector applied
//! - `//` and `/* */` comments (stripped), indented `.sass` syntax via a
//!   line-based pre-pass
//!
//! Deliberately out of scope: mixins, functions, `@extend`, the `@use`
//! module system, and arithmetic. Sources using those fail with a located
//! parse error rather than producing wrong CSS.
//!
//! Output is deterministic: same inputs, byte-identical CSS.

mod compiler;
mod indented;

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use indented::indented_to_braced;

#[derive(Error, Debug)]
pub enum ScssError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{file}:{line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },
    #[error("{file}:{line}: {message}")]
    Indent {
        file: String,
        line: usize,
        message: String,
    },
    #[error("import '{target}' not found (imported from {from})")]
    ImportNotFound { target: String, from: String },
    #[error("import cycle detected: {chain} -> {target}")]
    ImportCycle { target: String, chain: String },
}

/// Compile stylesheet source text to CSS.
///
/// `origin` is the path the source was read from: its extension selects the
/// syntax (`.sass` is indented), its directory anchors relative imports,
/// and it seeds import-cycle detection. `search_paths` are tried for
/// imports the origin directory does not satisfy.
pub fn compile_source(
    source: &str,
    origin: &Path,
    search_paths: &[PathBuf],
) -> Result<String, ScssError> {
    compiler::Compiler::compile(source, origin, search_paths)
}

/// Read and compile a stylesheet file. Convenience wrapper over
/// [`compile_source`].
pub fn compile_file(path: &Path, search_paths: &[PathBuf]) -> Result<String, ScssError> {
    let source = fs::read_to_string(path).map_err(|source| ScssError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    compile_source(&source, path, search_paths)
}
