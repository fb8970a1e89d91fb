//! Stylesheet parser, evaluator, and CSS emitter.
//!
//! The compiler works in three phases:
//!
//! 1. **Parse** braced source (comments already stripped) into a tree of
//!    items: variable definitions, declarations, imports, and rules.
//! 2. **Evaluate** the tree: resolve `$variables` and `#{}` interpolation,
//!    inline `@import`s at their position, and flatten nested rules into
//!    selector-combined flat rules. Block at-rules (`@media`, `@supports`,
//!    `@font-face`) keep their block; one found inside a style rule bubbles
//!    to the top level with the enclosing selector applied to its contents.
//! 3. **Emit** deterministic CSS text: one flat rule per block, two-space
//!    indent, selectors joined with `, `.
//!
//! Imports resolve against the importing file's directory first, then the
//! configured search paths, trying `name.scss`, `_name.scss`, `name.sass`,
//! and `_name.sass` in that order. Imports of `.css` files, `url(...)`, and
//! protocol-prefixed targets pass through as literal CSS `@import` lines.

use super::ScssError;
use super::indented::indented_to_braced;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

// =============================================================================
// Parse phase
// =============================================================================

#[derive(Debug)]
enum Item {
    VarDef {
        name: String,
        value: String,
        default_only: bool,
        line: usize,
    },
    Declaration {
        prop: String,
        value: String,
        line: usize,
    },
    Import {
        targets: Vec<String>,
        line: usize,
    },
    AtLine {
        text: String,
        line: usize,
    },
    Rule {
        prelude: String,
        body: Vec<Item>,
        line: usize,
    },
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    file: &'a str,
}

fn parse_items(source: &str, file: &str) -> Result<Vec<Item>, ScssError> {
    Parser {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        file,
    }
    .parse_block(false)
}

impl<'a> Parser<'a> {
    fn parse_block(&mut self, nested: bool) -> Result<Vec<Item>, ScssError> {
        let mut items = Vec::new();
        let mut buf = String::new();
        let mut buf_line = self.line;
        let mut paren_depth: usize = 0;

        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            match c {
                '"' | '\'' => {
                    if buf.trim().is_empty() {
                        buf_line = self.line;
                    }
                    buf.push(c);
                    self.pos += 1;
                    self.copy_string(c, &mut buf)?;
                }
                '(' => {
                    paren_depth += 1;
                    buf.push(c);
                    self.pos += 1;
                }
                ')' => {
                    paren_depth = paren_depth.saturating_sub(1);
                    buf.push(c);
                    self.pos += 1;
                }
                '{' if paren_depth == 0 => {
                    self.pos += 1;
                    let prelude = std::mem::take(&mut buf).trim().to_string();
                    if prelude.is_empty() {
                        return Err(parse_err(self.file, buf_line, "unexpected '{'"));
                    }
                    if prelude.ends_with(':') {
                        return Err(parse_err(
                            self.file,
                            buf_line,
                            "nested properties are not supported",
                        ));
                    }
                    let line = buf_line;
                    let body = self.parse_block(true)?;
                    items.push(Item::Rule {
                        prelude,
                        body,
                        line,
                    });
                    buf_line = self.line;
                }
                '}' if paren_depth == 0 => {
                    self.pos += 1;
                    if !nested {
                        return Err(parse_err(self.file, self.line, "unexpected '}'"));
                    }
                    let trailing = std::mem::take(&mut buf);
                    push_statement(self.file, trailing, buf_line, &mut items)?;
                    return Ok(items);
                }
                ';' if paren_depth == 0 => {
                    self.pos += 1;
                    let stmt = std::mem::take(&mut buf);
                    push_statement(self.file, stmt, buf_line, &mut items)?;
                    buf_line = self.line;
                }
                '\n' => {
                    self.line += 1;
                    self.pos += 1;
                    buf.push(' ');
                    if buf.trim().is_empty() {
                        buf_line = self.line;
                    }
                }
                _ => {
                    if buf.trim().is_empty() && !c.is_whitespace() {
                        buf_line = self.line;
                    }
                    buf.push(c);
                    self.pos += 1;
                }
            }
        }

        if nested {
            return Err(parse_err(
                self.file,
                self.line,
                "unexpected end of file (unclosed block)",
            ));
        }
        push_statement(self.file, buf, buf_line, &mut items)?;
        Ok(items)
    }

    /// Copy a quoted string (opening quote already consumed and pushed).
    fn copy_string(&mut self, quote: char, buf: &mut String) -> Result<(), ScssError> {
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            buf.push(c);
            self.pos += 1;
            match c {
                '\\' => {
                    if self.pos < self.chars.len() {
                        buf.push(self.chars[self.pos]);
                        self.pos += 1;
                    }
                }
                '\n' => self.line += 1,
                _ if c == quote => return Ok(()),
                _ => {}
            }
        }
        Err(parse_err(self.file, self.line, "unterminated string"))
    }
}

fn push_statement(
    file: &str,
    text: String,
    line: usize,
    items: &mut Vec<Item>,
) -> Result<(), ScssError> {
    let t = text.trim();
    if t.is_empty() {
        return Ok(());
    }
    if let Some(rest) = t.strip_prefix('$') {
        let Some((name, value)) = rest.split_once(':') else {
            return Err(parse_err(file, line, "expected ':' in variable definition"));
        };
        let name = name.trim().to_string();
        let mut value = value.trim().to_string();
        let default_only = match value.strip_suffix("!default") {
            Some(stripped) => {
                value = stripped.trim_end().to_string();
                true
            }
            None => false,
        };
        if name.is_empty() || value.is_empty() {
            return Err(parse_err(file, line, "empty variable definition"));
        }
        items.push(Item::VarDef {
            name,
            value,
            default_only,
            line,
        });
        return Ok(());
    }
    if let Some(rest) = t.strip_prefix("@import") {
        let next = rest.chars().next();
        let is_keyword = matches!(next, Some(c) if c.is_whitespace() || c == '"' || c == '\'');
        if is_keyword {
            let targets: Vec<String> = split_top_commas(rest.trim())
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if targets.is_empty() {
                return Err(parse_err(file, line, "missing import target"));
            }
            items.push(Item::Import { targets, line });
            return Ok(());
        }
    }
    if t.starts_with('@') {
        items.push(Item::AtLine {
            text: t.to_string(),
            line,
        });
        return Ok(());
    }
    if let Some(idx) = find_top_colon(t) {
        let prop = t[..idx].trim().to_string();
        let value = t[idx + 1..].trim().to_string();
        if prop.is_empty() || value.is_empty() {
            return Err(parse_err(file, line, "malformed declaration"));
        }
        items.push(Item::Declaration { prop, value, line });
        return Ok(());
    }
    Err(parse_err(file, line, "expected ':' in declaration"))
}

// =============================================================================
// Evaluation phase
// =============================================================================

type Scope = HashMap<String, String>;

#[derive(Debug)]
enum Block {
    Raw(String),
    Rule {
        selector: String,
        decls: Vec<(String, String)>,
    },
    AtRule {
        prelude: String,
        inner: Vec<(String, Vec<(String, String)>)>,
    },
}

pub(super) struct Compiler<'a> {
    search_paths: &'a [PathBuf],
    /// Canonical paths of the files currently being compiled, entry first.
    stack: Vec<PathBuf>,
}

impl<'a> Compiler<'a> {
    /// Compile already-read source for `origin` into CSS text.
    pub(super) fn compile(
        source: &str,
        origin: &Path,
        search_paths: &'a [PathBuf],
    ) -> Result<String, ScssError> {
        let label = file_label(origin);
        let braced = if is_indented(origin) {
            indented_to_braced(source, &label)?
        } else {
            source.to_string()
        };
        let stripped = strip_comments(&braced, &label)?;
        let items = parse_items(&stripped, &label)?;

        let mut compiler = Compiler {
            search_paths,
            stack: vec![origin.canonicalize().unwrap_or_else(|_| origin.to_path_buf())],
        };
        let dir = origin.parent().unwrap_or(Path::new(".")).to_path_buf();
        let mut scopes: Vec<Scope> = vec![Scope::new()];
        let mut out = Vec::new();
        compiler.eval_items(items, &[], &mut scopes, &dir, &label, &mut out, false)?;
        Ok(emit(&out))
    }

    #[allow(clippy::too_many_arguments)]
    fn eval_items(
        &mut self,
        items: Vec<Item>,
        parents: &[String],
        scopes: &mut Vec<Scope>,
        dir: &Path,
        file: &str,
        out: &mut Vec<Block>,
        in_at_rule: bool,
    ) -> Result<Vec<(String, String)>, ScssError> {
        let mut decls = Vec::new();
        for item in items {
            match item {
                Item::VarDef {
                    name,
                    value,
                    default_only,
                    line,
                } => {
                    if default_only && lookup(scopes, &name).is_some() {
                        continue;
                    }
                    let resolved = substitute(&value, scopes, file, line)?;
                    if let Some(scope) = scopes.last_mut() {
                        scope.insert(name, resolved);
                    }
                }
                Item::Declaration { prop, value, line } => {
                    if parents.is_empty() && !in_at_rule {
                        return Err(parse_err(
                            file,
                            line,
                            "declarations are not allowed at the top level",
                        ));
                    }
                    // property names interpolate too: `padding-#{$side}`
                    let prop = substitute(&prop, scopes, file, line)?;
                    decls.push((prop, substitute(&value, scopes, file, line)?));
                }
                Item::Import { targets, line } => {
                    if in_at_rule || !parents.is_empty() {
                        return Err(parse_err(
                            file,
                            line,
                            "@import is only allowed at the top level",
                        ));
                    }
                    for target in targets {
                        self.eval_import(&target, scopes, dir, file, out)?;
                    }
                }
                Item::AtLine { text, line } => {
                    if in_at_rule || !parents.is_empty() {
                        return Err(parse_err(
                            file,
                            line,
                            &format!("unsupported at-rule inside a block: {text}"),
                        ));
                    }
                    out.push(Block::Raw(format!("{text};")));
                }
                Item::Rule {
                    prelude,
                    body,
                    line,
                } => {
                    if prelude.starts_with('@') {
                        self.eval_at_rule(prelude, body, line, parents, scopes, dir, file, out, in_at_rule)?;
                    } else {
                        let resolved = substitute(&prelude, scopes, file, line)?;
                        let combined = combine_selectors(parents, &resolved);
                        scopes.push(Scope::new());
                        let mut child_out = Vec::new();
                        let result = self.eval_items(
                            body,
                            &combined,
                            scopes,
                            dir,
                            file,
                            &mut child_out,
                            in_at_rule,
                        );
                        scopes.pop();
                        let child_decls = result?;
                        if !child_decls.is_empty() {
                            out.push(Block::Rule {
                                selector: combined.join(", "),
                                decls: child_decls,
                            });
                        }
                        out.extend(child_out);
                    }
                }
            }
        }
        Ok(decls)
    }

    #[allow(clippy::too_many_arguments)]
    fn eval_at_rule(
        &mut self,
        prelude: String,
        body: Vec<Item>,
        line: usize,
        parents: &[String],
        scopes: &mut Vec<Scope>,
        dir: &Path,
        file: &str,
        out: &mut Vec<Block>,
        in_at_rule: bool,
    ) -> Result<(), ScssError> {
        if in_at_rule {
            return Err(parse_err(file, line, "nested at-rules are not supported"));
        }
        let resolved_prelude = substitute(&prelude, scopes, file, line)?;
        scopes.push(Scope::new());
        let mut at_out = Vec::new();
        let result = self.eval_items(body, parents, scopes, dir, file, &mut at_out, true);
        scopes.pop();
        let direct = result?;

        let mut inner = Vec::new();
        if !direct.is_empty() {
            if parents.is_empty() {
                // @font-face and friends hold bare declarations; they flatten
                // to a single selector-less group rendered as the at-rule body.
                return emit_bare_at_rule(resolved_prelude, direct, at_out, out, file, line);
            }
            inner.push((parents.join(", "), direct));
        }
        for block in at_out {
            match block {
                Block::Rule { selector, decls } => inner.push((selector, decls)),
                _ => {
                    return Err(parse_err(file, line, "unsupported construct inside at-rule"));
                }
            }
        }
        if !inner.is_empty() {
            out.push(Block::AtRule {
                prelude: resolved_prelude,
                inner,
            });
        }
        Ok(())
    }

    fn eval_import(
        &mut self,
        target: &str,
        scopes: &mut Vec<Scope>,
        dir: &Path,
        file: &str,
        out: &mut Vec<Block>,
    ) -> Result<(), ScssError> {
        if is_css_passthrough(target) {
            out.push(Block::Raw(format!("@import {target};")));
            return Ok(());
        }
        let cleaned = unquote(target);
        let Some(path) = self.resolve_import(&cleaned, dir) else {
            return Err(ScssError::ImportNotFound {
                target: cleaned,
                from: file.to_string(),
            });
        };
        let canon = path.canonicalize().unwrap_or_else(|_| path.clone());
        if self.stack.contains(&canon) {
            return Err(ScssError::ImportCycle {
                target: cleaned,
                chain: self
                    .stack
                    .iter()
                    .map(|p| file_label(p))
                    .collect::<Vec<_>>()
                    .join(" -> "),
            });
        }
        let text = fs::read_to_string(&path).map_err(|source| ScssError::Io {
            path: path.clone(),
            source,
        })?;
        let label = file_label(&path);
        let braced = if is_indented(&path) {
            indented_to_braced(&text, &label)?
        } else {
            text
        };
        let stripped = strip_comments(&braced, &label)?;
        let items = parse_items(&stripped, &label)?;
        let sub_dir = path.parent().unwrap_or(dir).to_path_buf();

        self.stack.push(canon);
        let result = self.eval_items(items, &[], scopes, &sub_dir, &label, out, false);
        self.stack.pop();
        result?;
        Ok(())
    }

    /// Find the file an import target refers to, or `None`.
    fn resolve_import(&self, target: &str, dir: &Path) -> Option<PathBuf> {
        let rel = Path::new(target);
        let has_ext = matches!(
            rel.extension().and_then(|e| e.to_str()),
            Some("scss") | Some("sass")
        );
        let mut dirs: Vec<&Path> = vec![dir];
        dirs.extend(self.search_paths.iter().map(PathBuf::as_path));
        for base_dir in dirs {
            let base = base_dir.join(rel);
            let candidates = if has_ext {
                vec![base.clone(), underscored(&base)]
            } else {
                let scss = append_ext(&base, "scss");
                let sass = append_ext(&base, "sass");
                vec![scss.clone(), underscored(&scss), sass.clone(), underscored(&sass)]
            };
            for candidate in candidates {
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
        None
    }
}

/// An at-rule whose body is bare declarations (`@font-face { src: ...; }`)
/// emits them directly, without a selector group.
fn emit_bare_at_rule(
    prelude: String,
    decls: Vec<(String, String)>,
    at_out: Vec<Block>,
    out: &mut Vec<Block>,
    file: &str,
    line: usize,
) -> Result<(), ScssError> {
    if !at_out.is_empty() {
        return Err(parse_err(
            file,
            line,
            "at-rules may hold declarations or rules, not both",
        ));
    }
    out.push(Block::Rule {
        selector: prelude,
        decls,
    });
    Ok(())
}

// =============================================================================
// Emit phase
// =============================================================================

fn emit(blocks: &[Block]) -> String {
    let mut out = String::new();
    for (i, block) in blocks.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        match block {
            Block::Raw(line) => {
                out.push_str(line);
                out.push('\n');
            }
            Block::Rule { selector, decls } => emit_rule(&mut out, selector, decls, 0),
            Block::AtRule { prelude, inner } => {
                out.push_str(prelude);
                out.push_str(" {\n");
                for (j, (selector, decls)) in inner.iter().enumerate() {
                    if j > 0 {
                        out.push('\n');
                    }
                    emit_rule(&mut out, selector, decls, 1);
                }
                out.push_str("}\n");
            }
        }
    }
    out
}

fn emit_rule(out: &mut String, selector: &str, decls: &[(String, String)], level: usize) {
    let pad = "  ".repeat(level);
    out.push_str(&pad);
    out.push_str(selector);
    out.push_str(" {\n");
    for (prop, value) in decls {
        out.push_str(&pad);
        out.push_str("  ");
        out.push_str(prop);
        out.push_str(": ");
        out.push_str(value);
        out.push_str(";\n");
    }
    out.push_str(&pad);
    out.push_str("}\n");
}

// =============================================================================
// Helpers
// =============================================================================

fn parse_err(file: &str, line: usize, message: &str) -> ScssError {
    ScssError::Parse {
        file: file.to_string(),
        line,
        message: message.to_string(),
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn is_indented(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("sass")
}

fn underscored(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match path.parent() {
        Some(parent) => parent.join(format!("_{name}")),
        None => PathBuf::from(format!("_{name}")),
    }
}

fn append_ext(path: &Path, ext: &str) -> PathBuf {
    PathBuf::from(format!("{}.{ext}", path.display()))
}

fn unquote(s: &str) -> String {
    let t = s.trim();
    for q in ['"', '\''] {
        if t.len() >= 2 && t.starts_with(q) && t.ends_with(q) {
            return t[1..t.len() - 1].to_string();
        }
    }
    t.to_string()
}

fn is_css_passthrough(target: &str) -> bool {
    let t = target.trim();
    if t.starts_with("url(") {
        return true;
    }
    let bare = unquote(t);
    bare.starts_with("http://")
        || bare.starts_with("https://")
        || bare.starts_with("//")
        || bare.ends_with(".css")
}

/// Strip `// line` and `/* block */` comments, preserving line numbers.
///
/// `//` preceded by `:` is kept: those are the protocol slashes of an
/// unquoted `url(http://...)`.
fn strip_comments(source: &str, file: &str) -> Result<String, ScssError> {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut i = 0;
    let mut line = 1;
    let mut quote: Option<char> = None;
    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            out.push(c);
            i += 1;
            match c {
                '\\' if i < chars.len() => {
                    out.push(chars[i]);
                    i += 1;
                }
                '\n' => line += 1,
                _ if c == q => quote = None,
                _ => {}
            }
            continue;
        }
        match c {
            '"' | '\'' => {
                quote = Some(c);
                out.push(c);
                i += 1;
            }
            '/' if i + 1 < chars.len() && chars[i + 1] == '/' && !out.ends_with(':') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if i + 1 < chars.len() && chars[i + 1] == '*' => {
                i += 2;
                loop {
                    if i + 1 >= chars.len() {
                        return Err(parse_err(file, line, "unterminated comment"));
                    }
                    if chars[i] == '*' && chars[i + 1] == '/' {
                        i += 2;
                        break;
                    }
                    if chars[i] == '\n' {
                        line += 1;
                        out.push('\n');
                    }
                    i += 1;
                }
            }
            '\n' => {
                line += 1;
                out.push(c);
                i += 1;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    Ok(out)
}

fn lookup<'s>(scopes: &'s [Scope], name: &str) -> Option<&'s str> {
    scopes
        .iter()
        .rev()
        .find_map(|scope| scope.get(name).map(String::as_str))
}

/// Resolve `$variables` and `#{...}` interpolation in a value or selector.
///
/// Bare `$name` references are resolved outside quotes; inside quotes only
/// `#{...}` interpolates, matching the usual stylesheet semantics.
fn substitute(input: &str, scopes: &[Scope], file: &str, line: usize) -> Result<String, ScssError> {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    let mut quote: Option<char> = None;
    while i < chars.len() {
        let c = chars[i];
        if c == '#' && i + 1 < chars.len() && chars[i + 1] == '{' {
            let Some(close) = (i + 2..chars.len()).find(|&j| chars[j] == '}') else {
                return Err(parse_err(file, line, "unterminated interpolation"));
            };
            let inner: String = chars[i + 2..close].iter().collect();
            out.push_str(substitute(&inner, scopes, file, line)?.trim());
            i = close + 1;
            continue;
        }
        if let Some(q) = quote {
            out.push(c);
            i += 1;
            if c == '\\' && i < chars.len() {
                out.push(chars[i]);
                i += 1;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => {
                quote = Some(c);
                out.push(c);
                i += 1;
            }
            '$' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len()
                    && (chars[end].is_alphanumeric() || chars[end] == '-' || chars[end] == '_')
                {
                    end += 1;
                }
                if end == start {
                    out.push('$');
                    i += 1;
                    continue;
                }
                let name: String = chars[start..end].iter().collect();
                match lookup(scopes, &name) {
                    Some(value) => out.push_str(value),
                    None => {
                        return Err(parse_err(
                            file,
                            line,
                            &format!("undefined variable: ${name}"),
                        ));
                    }
                }
                i = end;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    Ok(out)
}

/// Split on commas at paren/quote depth zero.
fn split_top_commas(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth: usize = 0;
    let mut quote: Option<char> = None;
    for c in input.chars() {
        if let Some(q) = quote {
            current.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => {
                quote = Some(c);
                current.push(c);
            }
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

fn find_top_colon(input: &str) -> Option<usize> {
    let mut depth: usize = 0;
    let mut quote: Option<char> = None;
    for (idx, c) in input.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ':' if depth == 0 => return Some(idx),
            _ => {}
        }
    }
    None
}

/// Combine a parent selector list with a nested selector list.
///
/// `&` in the child splices the parent in place; otherwise the child is
/// appended as a descendant. Comma lists multiply out parent-first.
fn combine_selectors(parents: &[String], child_list: &str) -> Vec<String> {
    let children: Vec<String> = split_top_commas(child_list)
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if parents.is_empty() {
        return children;
    }
    let mut out = Vec::new();
    for parent in parents {
        for child in &children {
            if child.contains('&') {
                out.push(child.replace('&', parent));
            } else {
                out.push(format!("{parent} {child}"));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scopes_with(pairs: &[(&str, &str)]) -> Vec<Scope> {
        let mut scope = Scope::new();
        for (k, v) in pairs {
            scope.insert(k.to_string(), v.to_string());
        }
        vec![scope]
    }

    // =========================================================================
    // strip_comments tests
    // =========================================================================

    #[test]
    fn strip_line_comments() {
        let out = strip_comments("a { // note\ncolor: red; }\n", "t").unwrap();
        assert_eq!(out, "a { \ncolor: red; }\n");
    }

    #[test]
    fn strip_block_comments_keeps_line_count() {
        let out = strip_comments("a/* one\ntwo */b\n", "t").unwrap();
        assert_eq!(out, "a\nb\n");
    }

    #[test]
    fn strip_keeps_protocol_slashes() {
        let out = strip_comments("src: url(http://x.test/a.woff);\n", "t").unwrap();
        assert_eq!(out, "src: url(http://x.test/a.woff);\n");
    }

    #[test]
    fn strip_keeps_comment_markers_in_strings() {
        let out = strip_comments("content: \"// not a comment\";\n", "t").unwrap();
        assert_eq!(out, "content: \"// not a comment\";\n");
    }

    #[test]
    fn strip_unterminated_block_comment_errors() {
        let err = strip_comments("a { /* oops\n", "t").unwrap_err();
        assert!(err.to_string().contains("unterminated comment"));
    }

    // =========================================================================
    // substitute tests
    // =========================================================================

    #[test]
    fn substitute_resolves_variables() {
        let scopes = scopes_with(&[("fg", "#333")]);
        assert_eq!(substitute("$fg", &scopes, "t", 1).unwrap(), "#333");
        assert_eq!(
            substitute("1px solid $fg", &scopes, "t", 1).unwrap(),
            "1px solid #333"
        );
    }

    #[test]
    fn substitute_undefined_variable_errors() {
        let scopes = scopes_with(&[]);
        let err = substitute("$missing", &scopes, "main.scss", 3).unwrap_err();
        assert!(err.to_string().contains("undefined variable: $missing"));
        assert!(err.to_string().contains("main.scss:3"));
    }

    #[test]
    fn substitute_interpolation_inside_strings() {
        let scopes = scopes_with(&[("name", "logo")]);
        assert_eq!(
            substitute("url(\"#{$name}.png\")", &scopes, "t", 1).unwrap(),
            "url(\"logo.png\")"
        );
        // Bare $ inside quotes stays literal.
        assert_eq!(
            substitute("\"$name\"", &scopes, "t", 1).unwrap(),
            "\"$name\""
        );
    }

    #[test]
    fn substitute_lone_dollar_is_literal() {
        let scopes = scopes_with(&[]);
        assert_eq!(substitute("a$ b", &scopes, "t", 1).unwrap(), "a$ b");
    }

    #[test]
    fn substitute_inner_scope_shadows_outer() {
        let mut scopes = scopes_with(&[("c", "red")]);
        let mut inner = Scope::new();
        inner.insert("c".to_string(), "blue".to_string());
        scopes.push(inner);
        assert_eq!(substitute("$c", &scopes, "t", 1).unwrap(), "blue");
    }

    // =========================================================================
    // selector combination tests
    // =========================================================================

    #[test]
    fn combine_plain_nesting() {
        let parents = vec![".card".to_string()];
        assert_eq!(combine_selectors(&parents, ".title"), vec![".card .title"]);
    }

    #[test]
    fn combine_ampersand_splices_parent() {
        let parents = vec![".card".to_string()];
        assert_eq!(combine_selectors(&parents, "&:hover"), vec![".card:hover"]);
        assert_eq!(combine_selectors(&parents, "&.open"), vec![".card.open"]);
    }

    #[test]
    fn combine_comma_lists_multiply() {
        let parents = vec![".a".to_string(), ".b".to_string()];
        assert_eq!(
            combine_selectors(&parents, "x, y"),
            vec![".a x", ".a y", ".b x", ".b y"]
        );
    }

    #[test]
    fn combine_without_parent_passes_through() {
        assert_eq!(combine_selectors(&[], "h1, h2"), vec!["h1", "h2"]);
    }

    // =========================================================================
    // splitting helpers
    // =========================================================================

    #[test]
    fn split_top_commas_respects_parens_and_quotes() {
        assert_eq!(
            split_top_commas("rgb(1, 2, 3), \"a,b\", x"),
            vec!["rgb(1, 2, 3)", " \"a,b\"", " x"]
        );
    }

    #[test]
    fn find_top_colon_skips_parens() {
        assert_eq!(find_top_colon("color: red"), Some(5));
        assert_eq!(find_top_colon("width calc(1:2)"), None);
    }

    #[test]
    fn css_passthrough_detection() {
        assert!(is_css_passthrough("url(theme.css)"));
        assert!(is_css_passthrough("\"http://cdn.test/x\""));
        assert!(is_css_passthrough("\"print.css\""));
        assert!(!is_css_passthrough("\"base\""));
    }

    // =========================================================================
    // import candidate resolution
    // =========================================================================

    #[test]
    fn underscored_prefixes_file_name_only() {
        assert_eq!(
            underscored(Path::new("a/b/vars.scss")),
            PathBuf::from("a/b/_vars.scss")
        );
    }

    #[test]
    fn resolve_import_prefers_plain_over_partial() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("base.scss"), "").unwrap();
        std::fs::write(tmp.path().join("_base.scss"), "").unwrap();
        let compiler = Compiler {
            search_paths: &[],
            stack: Vec::new(),
        };
        let found = compiler.resolve_import("base", tmp.path()).unwrap();
        assert_eq!(found.file_name().unwrap(), "base.scss");
    }

    #[test]
    fn resolve_import_falls_back_to_search_paths() {
        let local = tempfile::TempDir::new().unwrap();
        let vendor = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(vendor.path().join("fontawesome")).unwrap();
        std::fs::write(vendor.path().join("fontawesome/_icons.scss"), "").unwrap();
        let paths = vec![vendor.path().to_path_buf()];
        let compiler = Compiler {
            search_paths: &paths,
            stack: Vec::new(),
        };
        let found = compiler
            .resolve_import("fontawesome/icons", local.path())
            .unwrap();
        assert_eq!(found.file_name().unwrap(), "_icons.scss");
    }

    #[test]
    fn resolve_import_missing_is_none() {
        let tmp = tempfile::TempDir::new().unwrap();
        let compiler = Compiler {
            search_paths: &[],
            stack: Vec::new(),
        };
        assert!(compiler.resolve_import("ghost", tmp.path()).is_none());
    }
}
