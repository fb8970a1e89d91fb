//! Indented-syntax to braced-syntax conversion.
//!
//! Stylesheets come in two syntaxes. The braced syntax is handled directly
//! by the compiler; the indented syntax (`.sass` files) is converted here
//! first, line by line:
//!
//! ```text
//! .card                      .card {
//!   color: $fg        ->       color: $fg;
//!   &:hover                    &:hover {
//!     color: $accent             color: $accent;
//!                              }
//!                            }
//! ```
//!
//! A line followed by a deeper-indented line opens a block; every other
//! line becomes a `;`-terminated statement. A line ending in `,` continues
//! onto the next line (multi-line selector lists). Dedents must return to
//! an indent level that is already open.

use super::ScssError;

struct Line {
    indent: usize,
    text: String,
    number: usize,
}

/// Convert indented-syntax source to braced syntax.
///
/// `file` is used for error messages only.
pub fn indented_to_braced(source: &str, file: &str) -> Result<String, ScssError> {
    let lines = collect_lines(source, file)?;
    let mut out = String::with_capacity(source.len() + source.len() / 4);
    let mut stack: Vec<usize> = Vec::new();
    let mut pending = String::new();

    for (i, line) in lines.iter().enumerate() {
        // Close blocks whose content sits deeper than this line.
        let mut dedented = false;
        while let Some(&top) = stack.last() {
            if line.indent < top {
                stack.pop();
                out.push_str("}\n");
                dedented = true;
            } else {
                break;
            }
        }
        match stack.last() {
            Some(&top) if line.indent != top => {
                return Err(indent_err(file, line.number, "inconsistent indentation"));
            }
            None if line.indent != 0 => {
                // A dedent that lands between open levels, or indentation
                // with no block open at all.
                let message = if dedented {
                    "inconsistent indentation"
                } else {
                    "unexpected indentation"
                };
                return Err(indent_err(file, line.number, message));
            }
            _ => {}
        }

        if line.text.starts_with("//") {
            out.push_str(&line.text);
            out.push('\n');
            continue;
        }
        if line.text.ends_with(',') {
            pending.push_str(&line.text);
            pending.push(' ');
            continue;
        }

        let text = if pending.is_empty() {
            line.text.clone()
        } else {
            let joined = format!("{pending}{}", line.text);
            pending.clear();
            joined
        };

        let opens = lines
            .get(i + 1)
            .map(|next| next.indent > line.indent)
            .unwrap_or(false);
        if opens {
            out.push_str(text.trim_end_matches(';').trim_end());
            out.push_str(" {\n");
            stack.push(lines[i + 1].indent);
        } else {
            out.push_str(text.trim_end_matches(';').trim_end());
            out.push_str(";\n");
        }
    }

    for _ in stack {
        out.push_str("}\n");
    }
    Ok(out)
}

fn collect_lines(source: &str, file: &str) -> Result<Vec<Line>, ScssError> {
    let mut lines = Vec::new();
    for (i, raw) in source.lines().enumerate() {
        let number = i + 1;
        if raw.trim().is_empty() {
            continue;
        }
        let text = raw.trim_start();
        let leading = &raw[..raw.len() - text.len()];
        if leading.contains('\t') {
            return Err(indent_err(file, number, "tabs are not allowed in indentation"));
        }
        lines.push(Line {
            indent: leading.len(),
            text: text.trim_end().to_string(),
            number,
        });
    }
    Ok(lines)
}

fn indent_err(file: &str, line: usize, message: &str) -> ScssError {
    ScssError::Indent {
        file: file.to_string(),
        line,
        message: message.to_string(),
    }
}
