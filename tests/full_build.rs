//! End-to-end builds over a realistic project tree.
//!
//! Everything here goes through the public surface only: `Config::load`
//! on a scaffolded project, `tasks::build`, then assertions on the
//! output tree the way a deploy would consume it. Per-step behavior is
//! covered by the unit tests next to each pipeline; these tests pin the
//! overall shape.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use sitewright::config::{Config, Mode};
use sitewright::notifier::Notifier;
use sitewright::{output, tasks};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, contents: impl AsRef<[u8]>) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn png_bytes() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(16, 16, image::Rgba([200, 40, 40, 255]));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// A small but complete site: two pages extending a shared base, styles
/// in both dialects with a partial and a vendor import, images, one
/// script module, and a vendored icon font.
fn scaffold_site(root: &Path) {
    write(
        root,
        "src/templates/base.tera",
        "<html><head><link rel=\"stylesheet\" href=\"{{ assets }}/css/main.css\"></head>\n\
         <body>{% block body %}{% endblock body %}</body></html>\n",
    );
    write(
        root,
        "src/pages/index.tera",
        "{% extends \"base.tera\" %}\n{% block body %}<h1>Home ({{ mode }})</h1>{% endblock body %}\n",
    );
    write(
        root,
        "src/pages/blog/first.tera",
        "{% extends \"base.tera\" %}\n{% block body %}<article>first post</article>{% endblock body %}\n",
    );
    write(root, "src/styles/_palette.scss", "$ink: #222;\n");
    write(
        root,
        "src/styles/main.scss",
        "@import \"palette\";\n\
         @import \"vendors/fontawesome/fontawesome\";\n\
         body { color: $ink; margin: 0; }\n",
    );
    write(root, "src/styles/print.sass", "main\n  font-size: 12pt\n");
    write(root, "src/img/logo.png", png_bytes());
    write(root, "src/img/raw/capture.bin", b"not an image at all");
    write(
        root,
        "src/js-modules/app.js",
        "// bootstraps the page\nconst app = () => {};\napp();\n",
    );
    write(
        root,
        "vendor/fontawesome/scss/fontawesome.scss",
        ".fa { display: inline-block; }\n",
    );
    write(
        root,
        "vendor/fontawesome/webfonts/fa-solid-900.woff2",
        b"\0woff2 payload",
    );
}

fn map_files(output_dir: &Path) -> Vec<String> {
    walkdir::WalkDir::new(output_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "map"))
        .map(|e| e.path().display().to_string())
        .collect()
}

fn css_files(config: &Config) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(config.css_dest())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".css"))
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn production_build_produces_a_deployable_tree() {
    let tmp = TempDir::new().unwrap();
    scaffold_site(tmp.path());
    let config = Arc::new(Config::load(tmp.path(), None).unwrap());
    let notifier = Arc::new(Notifier::default());

    let summary = tasks::build(&config, Mode::Production, &notifier)
        .await
        .unwrap();
    assert!(summary.is_clean(), "alerts: {:?}", summary.alerts);
    assert_eq!(summary.reports.len(), 5);

    // pages render minified, with the shared base and asset URLs inlined
    let index = fs::read_to_string(config.output_dir().join("index.html")).unwrap();
    assert!(index.contains("<h1>Home (production)</h1>"), "got: {index}");
    assert!(index.contains("/assets/css/main.css"), "got: {index}");
    assert!(!index.contains('\n'), "page not minified: {index}");
    assert!(
        config.output_dir().join("blog/first.html").exists(),
        "subdirectory page missing"
    );

    // styles are hashed; the manifest resolves the original name
    let names = css_files(&config);
    assert_eq!(names.len(), 2, "got: {names:?}");
    let hashed_main = names
        .iter()
        .find(|n| n.starts_with("main-"))
        .expect("hashed main sheet");
    let manifest =
        fs::read_to_string(config.manifest_dir().join("css.json")).unwrap();
    let manifest: serde_json::Value = serde_json::from_str(&manifest).unwrap();
    assert_eq!(manifest["main.css"], hashed_main.as_str());
    assert_eq!(
        manifest["print.css"],
        names.iter().find(|n| n.starts_with("print-")).unwrap().as_str()
    );

    // the vendor sheet arrived through the fonts stage and the @import
    let css = fs::read_to_string(config.css_dest().join(hashed_main)).unwrap();
    assert!(css.contains("color:#222"), "got: {css}");
    assert!(css.contains(".fa{display:inline-block}"), "got: {css}");

    // images: the PNG is still a decodable PNG, the blob is untouched
    let logo = fs::read(config.images_dest().join("logo.png")).unwrap();
    image::load_from_memory(&logo).expect("optimized logo still decodes");
    let blob = fs::read(config.images_dest().join("raw/capture.bin")).unwrap();
    assert_eq!(blob, b"not an image at all");

    // scripts are compressed, fonts staged
    let js = fs::read_to_string(config.scripts_dest().join("app.js")).unwrap();
    assert!(!js.contains("bootstraps"), "comment survived: {js}");
    assert!(
        config.fonts_dest().join("fa-solid-900.woff2").exists(),
        "webfont not staged"
    );

    // lint ran over the scripts and found nothing
    let lint = summary.lint.as_ref().expect("lint report");
    assert_eq!(lint.checked, 1);
    assert!(lint.is_clean(), "unexpected findings");

    // no development artifacts in a production tree
    assert_eq!(map_files(&config.output_dir()), Vec::<String>::new());
}

#[tokio::test]
async fn development_build_keeps_readable_output_with_maps() {
    let tmp = TempDir::new().unwrap();
    scaffold_site(tmp.path());
    let config = Arc::new(Config::load(tmp.path(), None).unwrap());

    let summary = tasks::build(&config, Mode::Development, &Arc::new(Notifier::default()))
        .await
        .unwrap();
    assert!(summary.is_clean(), "alerts: {:?}", summary.alerts);

    // plain names, map sidecars, and a sourceMappingURL reference
    let css = fs::read_to_string(config.css_dest().join("main.css")).unwrap();
    assert!(css.contains("color: #222;"), "got: {css}");
    assert!(css.contains("/*# sourceMappingURL=main.css.map */"));

    let map = fs::read_to_string(config.css_dest().join("main.css.map")).unwrap();
    let map: serde_json::Value = serde_json::from_str(&map).unwrap();
    assert_eq!(map["sources"][0], "main.scss");
    assert!(
        map["sourcesContent"][0]
            .as_str()
            .unwrap()
            .contains("@import \"palette\";")
    );

    assert!(config.output_dir().join("index.html.map").exists());

    // scripts ship as written
    let js = fs::read_to_string(config.scripts_dest().join("app.js")).unwrap();
    assert!(js.contains("// bootstraps the page"));

    // no hashed names, no manifest
    assert!(!config.manifest_dir().exists());
}

fn tree_digest(root: &Path) -> Vec<(String, String)> {
    let mut entries = Vec::new();
    for entry in walkdir::WalkDir::new(root).sort_by_file_name() {
        let entry = entry.unwrap();
        if entry.file_type().is_file() {
            let rel = entry.path().strip_prefix(root).unwrap().display().to_string();
            let contents = fs::read(entry.path()).unwrap();
            entries.push((rel, sitewright::styles::content_hash(&contents)));
        }
    }
    entries
}

#[tokio::test]
async fn rebuild_without_edits_is_byte_identical() {
    let tmp = TempDir::new().unwrap();
    scaffold_site(tmp.path());
    let config = Arc::new(Config::load(tmp.path(), None).unwrap());
    let notifier = Arc::new(Notifier::default());

    tasks::build(&config, Mode::Production, &notifier).await.unwrap();
    let first = tree_digest(&config.output_dir());
    assert!(!first.is_empty());

    tasks::build(&config, Mode::Production, &notifier).await.unwrap();
    assert_eq!(tree_digest(&config.output_dir()), first);
}

#[tokio::test]
async fn rebuild_changes_only_the_hashes_that_changed() {
    let tmp = TempDir::new().unwrap();
    scaffold_site(tmp.path());
    let config = Arc::new(Config::load(tmp.path(), None).unwrap());
    let notifier = Arc::new(Notifier::default());

    tasks::build(&config, Mode::Production, &notifier).await.unwrap();
    let before = css_files(&config);
    let main_before = before.iter().find(|n| n.starts_with("main-")).unwrap().clone();
    let print_before = before.iter().find(|n| n.starts_with("print-")).unwrap().clone();

    write(tmp.path(), "src/styles/print.sass", "main\n  font-size: 11pt\n");
    tasks::build(&config, Mode::Production, &notifier).await.unwrap();

    let after = css_files(&config);
    assert!(
        after.contains(&main_before),
        "untouched sheet was renamed: {after:?}"
    );
    assert!(
        !after.contains(&print_before),
        "edited sheet kept its stale name: {after:?}"
    );

    let manifest =
        fs::read_to_string(config.manifest_dir().join("css.json")).unwrap();
    let manifest: serde_json::Value = serde_json::from_str(&manifest).unwrap();
    assert_eq!(manifest["main.css"], main_before.as_str());
    assert_ne!(manifest["print.css"], print_before.as_str());
}

#[tokio::test]
async fn config_overlay_redirects_the_output_tree() {
    let tmp = TempDir::new().unwrap();
    scaffold_site(tmp.path());
    write(tmp.path(), "sitewright.toml", "[paths]\noutput = \"public\"\n");
    let config = Arc::new(Config::load(tmp.path(), None).unwrap());

    tasks::build(&config, Mode::Development, &Arc::new(Notifier::default()))
        .await
        .unwrap();

    assert!(tmp.path().join("public/index.html").exists());
    assert!(!tmp.path().join("dist").exists());
}

#[tokio::test]
async fn summary_formats_a_real_build() {
    let tmp = TempDir::new().unwrap();
    scaffold_site(tmp.path());
    let config = Arc::new(Config::load(tmp.path(), None).unwrap());

    let summary = tasks::build(&config, Mode::Development, &Arc::new(Notifier::default()))
        .await
        .unwrap();

    let lines = output::format_build_summary(&summary, Mode::Development);
    assert_eq!(lines[0], "Build (development)");
    for pipeline in ["pages", "styles", "images", "scripts", "fonts"] {
        assert!(
            lines.iter().any(|l| l.trim_start().starts_with(pipeline)),
            "no line for {pipeline}: {lines:?}"
        );
    }
    let totals = format!("{} files written", summary.written());
    assert_eq!(lines.last().unwrap(), &totals);
}
