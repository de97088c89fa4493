//! Reads the header of a Go source file: build constraints, the package
//! clause and the import declarations. Nothing past the imports is parsed.

use super::constraint::{Expr, TagSet};

/// What a source file header declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileHeader {
    pub package: String,
    pub imports: Vec<String>,
    /// True when the file imports the pseudo-package `"C"`.
    pub uses_cgo: bool,
    /// Comment text preceding `import "C"`.
    pub cgo_preamble: String,
}

/// Constraint lines found before the package clause.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constraints {
    pub go_build: Option<String>,
    pub plus_build: Vec<String>,
}

impl Constraints {
    /// Read constraint comments from the leading comment block.
    ///
    /// `// +build` lines only count when their comment group is followed by
    /// a blank line; `//go:build` lines count anywhere in the block.
    pub fn read(src: &str) -> Self {
        let mut found = Constraints::default();
        let mut pending: Vec<String> = Vec::new();
        let mut in_block = false;
        for line in src.lines() {
            let trimmed = line.trim();
            if in_block {
                if trimmed.contains("*/") {
                    in_block = false;
                }
                continue;
            }
            if trimmed.is_empty() {
                found.plus_build.append(&mut pending);
                continue;
            }
            if let Some(comment) = trimmed.strip_prefix("//") {
                if let Some(expr) = comment.strip_prefix("go:build") {
                    if found.go_build.is_none() {
                        found.go_build = Some(expr.trim().to_string());
                    }
                } else if let Some(rest) = comment.trim_start().strip_prefix("+build") {
                    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                        pending.push(rest.trim().to_string());
                    }
                }
                continue;
            }
            if trimmed.starts_with("/*") {
                in_block = !trimmed[2..].contains("*/");
                continue;
            }
            break;
        }
        found
    }

    pub fn satisfied(&self, tags: &TagSet) -> Result<bool, String> {
        if let Some(expr) = &self.go_build {
            return Ok(Expr::parse(expr)?.eval(tags));
        }
        Ok(self.plus_build.iter().all(|line| tags.matches_line(line)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Ident(String),
    Str(String),
    Punct(char),
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    src: &'a str,
    line: usize,
    group: Vec<String>,
    group_end: Option<usize>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            chars: src.char_indices().peekable(),
            src,
            line: 1,
            group: Vec::new(),
            group_end: None,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn push_comment(&mut self, start_line: usize, text: String) {
        match self.group_end {
            Some(end) if start_line <= end + 1 => {}
            _ => self.group.clear(),
        }
        self.group.push(text);
        self.group_end = Some(self.line);
    }

    /// Next token and the comment group directly above it.
    fn next(&mut self) -> Result<Option<(Tok, String)>, String> {
        loop {
            let Some(&(pos, c)) = self.chars.peek() else {
                return Ok(None);
            };
            if c.is_whitespace() {
                self.bump();
                continue;
            }
            if c == '/' {
                let rest = &self.src[pos..];
                if rest.starts_with("//") {
                    let start = self.line;
                    let end = rest.find('\n').unwrap_or(rest.len());
                    let text = rest[2..end].to_string();
                    for _ in 0..rest[..end].chars().count() {
                        self.bump();
                    }
                    self.push_comment(start, text);
                    continue;
                }
                if rest.starts_with("/*") {
                    let start = self.line;
                    let Some(close) = rest[2..].find("*/") else {
                        return Err("unterminated block comment".to_string());
                    };
                    let text = rest[2..2 + close].to_string();
                    for _ in 0..rest[..close + 4].chars().count() {
                        self.bump();
                    }
                    self.push_comment(start, text);
                    continue;
                }
            }

            let line = self.line;
            let doc = match self.group_end {
                Some(end) if end + 1 >= line => self.group.join("\n"),
                _ => String::new(),
            };
            self.group.clear();
            self.group_end = None;

            let tok = match c {
                '"' => Tok::Str(self.interpreted_string()?),
                '`' => Tok::Str(self.raw_string()?),
                c if c.is_alphanumeric() || c == '_' => {
                    let mut ident = String::new();
                    while let Some(&(_, c)) = self.chars.peek() {
                        if c.is_alphanumeric() || c == '_' {
                            ident.push(c);
                            self.bump();
                        } else {
                            break;
                        }
                    }
                    Tok::Ident(ident)
                }
                other => {
                    self.bump();
                    Tok::Punct(other)
                }
            };
            return Ok(Some((tok, doc)));
        }
    }

    fn interpreted_string(&mut self) -> Result<String, String> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some(c) => out.push(c),
                    None => break,
                },
                Some('\n') | None => break,
                Some(c) => out.push(c),
            }
        }
        Err("unterminated string literal".to_string())
    }

    fn raw_string(&mut self) -> Result<String, String> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('`') => return Ok(out),
                Some(c) => out.push(c),
                None => return Err("unterminated raw string literal".to_string()),
            }
        }
    }
}

/// Parse the package clause and import declarations of `src`.
pub fn read_header(src: &str) -> Result<FileHeader, String> {
    let mut lex = Lexer::new(src);
    let mut header = FileHeader::default();

    match lex.next()? {
        Some((Tok::Ident(kw), _)) if kw == "package" => {}
        _ => return Err("expected 'package' clause".to_string()),
    }
    match lex.next()? {
        Some((Tok::Ident(name), _)) => header.package = name,
        _ => return Err("expected package name".to_string()),
    }

    loop {
        let Some((tok, doc)) = lex.next()? else {
            break;
        };
        match tok {
            Tok::Punct(';') => continue,
            Tok::Ident(kw) if kw == "import" => match lex.next()? {
                Some((Tok::Punct('('), _)) => loop {
                    match lex.next()? {
                        Some((Tok::Punct(')'), _)) => break,
                        Some((Tok::Punct(';'), _)) => continue,
                        Some((tok, spec_doc)) => {
                            let path = import_spec(&mut lex, tok)?;
                            record(&mut header, path, &spec_doc);
                        }
                        None => return Err("unterminated import block".to_string()),
                    }
                },
                Some((tok, _)) => {
                    let path = import_spec(&mut lex, tok)?;
                    record(&mut header, path, &doc);
                }
                None => return Err("expected import path".to_string()),
            },
            _ => break,
        }
    }
    Ok(header)
}

/// Finish an import spec whose first token is `first`: `[name] "path"`.
fn import_spec(lex: &mut Lexer<'_>, first: Tok) -> Result<String, String> {
    match first {
        Tok::Str(path) => Ok(path),
        Tok::Ident(_) | Tok::Punct('.') => match lex.next()? {
            Some((Tok::Str(path), _)) => Ok(path),
            _ => Err("expected import path after import name".to_string()),
        },
        other => Err(format!("unexpected {other:?} in import declaration")),
    }
}

fn record(header: &mut FileHeader, path: String, doc: &str) {
    if path == "C" {
        header.uses_cgo = true;
        if !header.cgo_preamble.is_empty() && !doc.is_empty() {
            header.cgo_preamble.push('\n');
        }
        header.cgo_preamble.push_str(doc);
    } else {
        header.imports.push(path);
    }
}

/// Flags contributed by `#cgo` directives in a preamble.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CgoFlags {
    pub cflags: Vec<String>,
    pub ldflags: Vec<String>,
}

/// Collect `#cgo [constraints] CFLAGS|CPPFLAGS|LDFLAGS: ...` directives.
pub fn cgo_directives(preamble: &str, tags: &TagSet) -> Result<CgoFlags, String> {
    let mut flags = CgoFlags::default();
    for line in preamble.lines() {
        let Some(rest) = line.trim().strip_prefix("#cgo") else {
            continue;
        };
        if !rest.starts_with(char::is_whitespace) {
            continue;
        }
        let Some((head, args)) = rest.split_once(':') else {
            return Err(format!("malformed #cgo directive: {}", line.trim()));
        };
        let mut fields: Vec<&str> = head.split_whitespace().collect();
        let Some(verb) = fields.pop() else {
            return Err(format!("malformed #cgo directive: {}", line.trim()));
        };
        if !fields.is_empty() && !fields.iter().any(|term| tags.matches_term(term)) {
            continue;
        }
        let values = split_quoted(args);
        match verb {
            "CFLAGS" | "CPPFLAGS" => flags.cflags.extend(values),
            "LDFLAGS" => flags.ldflags.extend(values),
            _ => {}
        }
    }
    Ok(flags)
}

/// Whitespace split honoring single and double quotes.
fn split_quoted(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut started = false;
    for c in s.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                started = true;
            }
            None if c.is_whitespace() => {
                if started {
                    out.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            None => {
                current.push(c);
                started = true;
            }
        }
    }
    if started {
        out.push(current);
    }
    out
}
