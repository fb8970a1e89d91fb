//! Development-mode source maps.
//!
//! Compiled pages and styles get a sidecar `.map` file in development
//! builds, so the browser's devtools can show the original source next to
//! the generated output. The maps carry the full original text in
//! `sourcesContent` with an empty `mappings` field: enough for "view
//! source" navigation without a compiler that tracks per-token positions.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// A source map v3 document for a single generated file.
#[derive(Debug, Clone, Serialize)]
pub struct SourceMap {
    version: u32,
    file: String,
    sources: Vec<String>,
    #[serde(rename = "sourcesContent")]
    sources_content: Vec<String>,
    names: Vec<String>,
    mappings: String,
}

impl SourceMap {
    /// Build a map for `file` generated from a single `source` whose
    /// original text was `contents`.
    pub fn new(file: &str, source: &str, contents: &str) -> Self {
        SourceMap {
            version: 3,
            file: file.to_string(),
            sources: vec![source.to_string()],
            sources_content: vec![contents.to_string()],
            names: Vec::new(),
            mappings: String::new(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("source map must serialize")
    }
}

/// Sidecar path for a generated file: the same path with `.map` appended
/// to the file name.
pub fn map_path(rel: &Path) -> PathBuf {
    let name = match rel.file_name() {
        Some(n) => n.to_string_lossy().into_owned(),
        None => String::new(),
    };
    rel.with_file_name(format!("{name}.map"))
}

/// Trailing comment that points a stylesheet at its sidecar map.
pub fn css_map_reference(map_name: &str) -> String {
    format!("\n/*# sourceMappingURL={map_name} */\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_carries_source_and_contents() {
        let map = SourceMap::new("main.css", "main.sass", "body\n  color: red\n");
        let value: serde_json::Value =
            serde_json::from_str(&map.to_json()).expect("map json parses");
        assert_eq!(value["version"], 3);
        assert_eq!(value["file"], "main.css");
        assert_eq!(value["sources"][0], "main.sass");
        assert_eq!(value["sourcesContent"][0], "body\n  color: red\n");
        assert_eq!(value["names"].as_array().map(Vec::len), Some(0));
        assert_eq!(value["mappings"], "");
    }

    #[test]
    fn map_path_appends_suffix() {
        assert_eq!(
            map_path(Path::new("css/main.css")),
            PathBuf::from("css/main.css.map")
        );
        assert_eq!(map_path(Path::new("index.html")), PathBuf::from("index.html.map"));
    }

    #[test]
    fn css_reference_names_the_map() {
        let comment = css_map_reference("main.css.map");
        assert_eq!(comment, "\n/*# sourceMappingURL=main.css.map */\n");
    }
}
