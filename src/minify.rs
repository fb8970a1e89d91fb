//! Conservative output minification.
//!
//! Three hand-rolled minifiers, one per text output kind. All of them are
//! deliberately conservative: they only perform transformations that cannot
//! change how a browser interprets the output.
//!
//! - **HTML**: whitespace runs collapse to a single space (what the browser
//!   renders anyway), comments are stripped. Content of `<pre>`,
//!   `<textarea>`, `<script>`, and `<style>` is preserved byte-for-byte,
//!   as are conditional comments (`<!--[if ...]>`).
//! - **CSS**: comments are stripped, whitespace collapses, spaces adjacent
//!   to safe punctuation are dropped, the last `;` of a block is dropped.
//! - **JS**: block comments and whole-line `//` comments are stripped,
//!   trailing whitespace and blank lines are dropped. No identifier
//!   mangling, no statement rewriting: inline `//` comments and anything
//!   resembling a regex literal are left alone rather than risk breaking
//!   the program.
//!
//! `/*!`-prefixed comments (license banners) survive CSS and JS
//! minification.
//!
//! All three are idempotent: minifying already-minified output is a no-op.

/// Tags whose text content must survive byte-for-byte.
const PRESERVED_TAGS: [&str; 4] = ["pre", "textarea", "script", "style"];

// =============================================================================
// HTML
// =============================================================================

pub fn minify_html(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    let mut preserve: Option<&'static str> = None;

    while i < chars.len() {
        if let Some(tag) = preserve {
            if is_closing_tag_at(&chars, i, tag) {
                preserve = None;
                // fall through to normal tag handling below
            } else {
                out.push(chars[i]);
                i += 1;
                continue;
            }
        }

        if starts_with(&chars, i, "<!--") {
            let end = find_seq(&chars, i + 4, "-->").map(|p| p + 3).unwrap_or(chars.len());
            if starts_with(&chars, i, "<!--[if") {
                // downlevel-hidden conditional comment, copy verbatim
                out.extend(&chars[i..end]);
            }
            i = end;
            continue;
        }

        let c = chars[i];
        if c == '<' && is_tag_start(&chars, i) {
            let (end, name, closing, self_closing) = copy_tag(&chars, i, &mut out);
            if !closing && !self_closing {
                if let Some(tag) = PRESERVED_TAGS.iter().find(|t| **t == name) {
                    preserve = Some(tag);
                }
            }
            i = end;
            continue;
        }

        if c.is_whitespace() {
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            out.push(' ');
            continue;
        }

        out.push(c);
        i += 1;
    }

    out.trim().to_string()
}

/// Copy a tag verbatim from `<` up to and including `>`, respecting quoted
/// attribute values. Returns (position after tag, lowercase name, closing?,
/// self-closing?).
fn copy_tag(chars: &[char], start: usize, out: &mut String) -> (usize, String, bool, bool) {
    let mut i = start + 1;
    let closing = i < chars.len() && chars[i] == '/';
    if closing {
        i += 1;
    }
    let name_start = i;
    while i < chars.len() && chars[i].is_ascii_alphanumeric() {
        i += 1;
    }
    let name: String = chars[name_start..i].iter().collect::<String>().to_lowercase();

    let mut quote: Option<char> = None;
    let mut end = start;
    let mut j = start;
    while j < chars.len() {
        let c = chars[j];
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
        } else if c == '"' || c == '\'' {
            quote = Some(c);
        } else if c == '>' {
            end = j + 1;
            break;
        }
        j += 1;
    }
    if end == start {
        end = chars.len();
    }
    let self_closing = end >= 2 && chars[end.saturating_sub(2)] == '/';
    out.extend(&chars[start..end]);
    (end, name, closing, self_closing)
}

fn is_tag_start(chars: &[char], i: usize) -> bool {
    match chars.get(i + 1) {
        Some(c) => c.is_ascii_alphabetic() || *c == '/' || *c == '!' || *c == '?',
        None => false,
    }
}

fn is_closing_tag_at(chars: &[char], i: usize, tag: &str) -> bool {
    if !starts_with(chars, i, "</") {
        return false;
    }
    let rest: String = chars[i + 2..].iter().take(tag.len()).collect();
    rest.eq_ignore_ascii_case(tag)
}

fn starts_with(chars: &[char], i: usize, s: &str) -> bool {
    s.chars()
        .enumerate()
        .all(|(k, c)| chars.get(i + k).copied() == Some(c))
}

fn find_seq(chars: &[char], from: usize, s: &str) -> Option<usize> {
    let needle: Vec<char> = s.chars().collect();
    if needle.is_empty() || chars.len() < needle.len() {
        return None;
    }
    (from..=chars.len() - needle.len()).find(|&i| chars[i..i + needle.len()] == needle[..])
}

// =============================================================================
// CSS
// =============================================================================

/// No space needed after these.
const CSS_TIGHT_AFTER: [char; 6] = ['{', '}', ';', ',', ':', '>'];
/// No space needed before these. `:` is absent: `a :hover` must keep its
/// space to stay a descendant selector.
const CSS_TIGHT_BEFORE: [char; 5] = ['{', '}', ';', ',', '>'];

pub fn minify_css(input: &str) -> String {
    let stripped = strip_css_comments(input);
    let chars: Vec<char> = stripped.chars().collect();
    let mut out = String::with_capacity(stripped.len());
    let mut i = 0;
    let mut pending_space = false;

    while i < chars.len() {
        let c = chars[i];
        if c == '"' || c == '\'' {
            if pending_space {
                let prev = out.chars().last();
                let tight = prev.map(|p| CSS_TIGHT_AFTER.contains(&p)).unwrap_or(true);
                if !tight {
                    out.push(' ');
                }
                pending_space = false;
            }
            i = copy_quoted(&chars, i, &mut out);
            continue;
        }
        if c.is_whitespace() {
            pending_space = true;
            i += 1;
            continue;
        }
        if pending_space {
            let prev = out.chars().last();
            let tight = prev.map(|p| CSS_TIGHT_AFTER.contains(&p)).unwrap_or(true)
                || CSS_TIGHT_BEFORE.contains(&c);
            if !tight {
                out.push(' ');
            }
            pending_space = false;
        }
        if c == '}' {
            while out.ends_with(';') {
                out.pop();
            }
        }
        out.push(c);
        i += 1;
    }
    out.trim().to_string()
}

fn strip_css_comments(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '"' || c == '\'' {
            i = copy_quoted(&chars, i, &mut out);
            continue;
        }
        if c == '/' && chars.get(i + 1) == Some(&'*') {
            let end = find_seq(&chars, i + 2, "*/").map(|p| p + 2).unwrap_or(chars.len());
            if chars.get(i + 2) == Some(&'!') {
                out.extend(&chars[i..end]);
            }
            i = end;
            continue;
        }
        out.push(c);
        i += 1;
    }
    out
}

/// Copy a quoted span (including quotes) verbatim, honoring `\` escapes.
/// Returns the position after the closing quote.
fn copy_quoted(chars: &[char], start: usize, out: &mut String) -> usize {
    let quote = chars[start];
    out.push(quote);
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        out.push(c);
        i += 1;
        if c == '\\' && i < chars.len() {
            out.push(chars[i]);
            i += 1;
        } else if c == quote {
            break;
        }
    }
    i
}

// =============================================================================
// JS
// =============================================================================

enum JsState {
    Code,
    Str(char),
    Template { expr_depth: Vec<usize> },
}

pub fn compress_js(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    let mut state = JsState::Code;
    // Start of the current output line, and whether that line has stayed in
    // plain code state throughout (only such lines are safe to trim/drop).
    let mut line_start = 0;
    let mut line_pure_code = true;

    while i < chars.len() {
        let c = chars[i];
        match &mut state {
            JsState::Code => {
                if c == '/' && chars.get(i + 1) == Some(&'/') {
                    let line_so_far = &out[line_start..];
                    let eol = find_char(&chars, i, '\n').unwrap_or(chars.len());
                    if line_so_far.trim().is_empty() {
                        // whole-line comment, drop it
                        i = eol;
                    } else {
                        // inline comment, keep verbatim
                        out.extend(&chars[i..eol]);
                        i = eol;
                    }
                    continue;
                }
                if c == '/' && chars.get(i + 1) == Some(&'*') {
                    let end = find_seq(&chars, i + 2, "*/").map(|p| p + 2).unwrap_or(chars.len());
                    if chars.get(i + 2) == Some(&'!') {
                        out.extend(&chars[i..end]);
                    } else if !out.ends_with(char::is_whitespace) && !out.is_empty() {
                        // keep tokens separated where the comment was
                        out.push(' ');
                    }
                    i = end;
                    continue;
                }
                match c {
                    '"' | '\'' => {
                        state = JsState::Str(c);
                        line_pure_code = false;
                        out.push(c);
                        i += 1;
                    }
                    '`' => {
                        state = JsState::Template { expr_depth: Vec::new() };
                        line_pure_code = false;
                        out.push(c);
                        i += 1;
                    }
                    '\n' => {
                        if line_pure_code {
                            while out.ends_with(' ') || out.ends_with('\t') {
                                out.pop();
                            }
                            if out[line_start..].is_empty() {
                                // blank line, drop it
                            } else {
                                out.push('\n');
                                line_start = out.len();
                            }
                        } else {
                            out.push('\n');
                            line_start = out.len();
                        }
                        line_pure_code = true;
                        i += 1;
                    }
                    _ => {
                        out.push(c);
                        i += 1;
                    }
                }
            }
            JsState::Str(quote) => {
                out.push(c);
                i += 1;
                if c == '\\' && i < chars.len() {
                    out.push(chars[i]);
                    i += 1;
                } else if c == *quote {
                    state = JsState::Code;
                } else if c == '\n' {
                    // unterminated string; bail back to code to stay safe
                    line_start = out.len();
                    line_pure_code = true;
                    state = JsState::Code;
                }
            }
            JsState::Template { expr_depth } => {
                out.push(c);
                i += 1;
                match c {
                    '\\' if i < chars.len() => {
                        out.push(chars[i]);
                        i += 1;
                    }
                    '$' if chars.get(i) == Some(&'{') => {
                        out.push('{');
                        i += 1;
                        expr_depth.push(1);
                    }
                    '{' if !expr_depth.is_empty() => {
                        if let Some(depth) = expr_depth.last_mut() {
                            *depth += 1;
                        }
                    }
                    '}' if !expr_depth.is_empty() => {
                        if let Some(depth) = expr_depth.last_mut() {
                            *depth -= 1;
                            if *depth == 0 {
                                expr_depth.pop();
                            }
                        }
                    }
                    '`' if expr_depth.is_empty() => {
                        state = JsState::Code;
                    }
                    '\n' => {
                        line_start = out.len();
                        line_pure_code = false;
                    }
                    _ => {}
                }
            }
        }
    }

    // trailing cleanup mirrors the per-line handling at EOF
    while out.ends_with(' ') || out.ends_with('\t') || out.ends_with('\n') {
        out.pop();
    }
    if out.is_empty() { out } else { format!("{out}\n") }
}

fn find_char(chars: &[char], from: usize, needle: char) -> Option<usize> {
    (from..chars.len()).find(|&i| chars[i] == needle)
}
