//! Build constraint evaluation: file-name suffixes, `//go:build`
//! expressions and legacy `// +build` lines.

use std::collections::HashSet;

use crate::config::PlatformConfig;

/// Newest release tag the toolchain image satisfies (`go1.1` ..= `go1.N`).
const RELEASE_MINOR: u32 = 11;

pub const KNOWN_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "js", "linux",
    "nacl", "netbsd", "openbsd", "plan9", "solaris", "wasip1", "windows", "zos",
];

pub const KNOWN_ARCH: &[&str] = &[
    "386", "amd64", "amd64p32", "arm", "armbe", "arm64", "arm64be", "loong64", "mips", "mipsle",
    "mips64", "mips64le", "mips64p32", "mips64p32le", "ppc", "ppc64", "ppc64le", "riscv",
    "riscv64", "s390", "s390x", "sparc", "sparc64", "wasm",
];

const UNIX_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "linux",
    "netbsd", "openbsd", "solaris",
];

/// Tags satisfied by a platform configuration.
#[derive(Debug, Clone)]
pub struct TagSet {
    tags: HashSet<String>,
}

impl TagSet {
    pub fn new(platform: &PlatformConfig) -> Self {
        let mut tags: HashSet<String> = HashSet::new();
        tags.insert(platform.goos.clone());
        tags.insert(platform.goarch.clone());
        tags.insert("gc".to_string());
        match platform.goos.as_str() {
            "android" => {
                tags.insert("linux".to_string());
            }
            "illumos" => {
                tags.insert("solaris".to_string());
            }
            "ios" => {
                tags.insert("darwin".to_string());
            }
            _ => {}
        }
        if UNIX_OS.contains(&platform.goos.as_str()) {
            tags.insert("unix".to_string());
        }
        if platform.cgo_enabled {
            tags.insert("cgo".to_string());
        }
        for minor in 1..=RELEASE_MINOR {
            tags.insert(format!("go1.{minor}"));
        }
        tags.extend(platform.build_tags.iter().cloned());
        Self { tags }
    }

    pub fn has(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Legacy `+build` term: `a,!b` means `a && !b`.
    pub fn matches_term(&self, term: &str) -> bool {
        !term.is_empty() && term.split(',').all(|t| self.matches_tag(t))
    }

    /// Legacy `+build` line: space-separated alternatives.
    pub fn matches_line(&self, line: &str) -> bool {
        line.split_whitespace().any(|term| self.matches_term(term))
    }

    fn matches_tag(&self, tag: &str) -> bool {
        match tag.strip_prefix('!') {
            // "!!x" is never satisfied.
            Some(rest) if rest.starts_with('!') => false,
            Some(rest) => !rest.is_empty() && !self.has(rest),
            None => !tag.is_empty() && self.has(tag),
        }
    }
}

/// Whether `name` is buildable under its `_GOOS`/`_GOARCH` suffixes.
pub fn file_name_matches(name: &str, tags: &TagSet) -> bool {
    let stem = match name.find('.') {
        Some(dot) => &name[..dot],
        None => name,
    };
    // Everything before the first underscore is ignored.
    let Some(first) = stem.find('_') else {
        return true;
    };
    let mut parts: Vec<&str> = stem[first..].split('_').collect();
    if parts.last() == Some(&"test") {
        parts.pop();
    }
    let n = parts.len();
    if n >= 2 && KNOWN_OS.contains(&parts[n - 2]) && KNOWN_ARCH.contains(&parts[n - 1]) {
        return tags.has(parts[n - 2]) && tags.has(parts[n - 1]);
    }
    if n >= 1 && (KNOWN_OS.contains(&parts[n - 1]) || KNOWN_ARCH.contains(&parts[n - 1])) {
        return tags.has(parts[n - 1]);
    }
    true
}

/// A parsed `//go:build` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Tag(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn eval(&self, tags: &TagSet) -> bool {
        match self {
            Expr::Tag(t) => tags.has(t),
            Expr::Not(e) => !e.eval(tags),
            Expr::And(a, b) => a.eval(tags) && b.eval(tags),
            Expr::Or(a, b) => a.eval(tags) || b.eval(tags),
        }
    }

    /// Parse the text following `//go:build`.
    pub fn parse(text: &str) -> Result<Expr, String> {
        let tokens = tokenize(text)?;
        if tokens.len() > MAX_EXPR_TOKENS {
            return Err("build expression too large".to_string());
        }
        let mut parser = ExprParser { tokens, pos: 0, depth: 0 };
        let expr = parser.or()?;
        match parser.tokens.get(parser.pos) {
            None => Ok(expr),
            Some(tok) => Err(format!("unexpected {tok:?} in build expression")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Tag(String),
    Not,
    And,
    Or,
    Open,
    Close,
}

fn tokenize(text: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '!' => {
                chars.next();
                tokens.push(Token::Not);
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '&' | '|' => {
                chars.next();
                if chars.next() != Some(c) {
                    return Err(format!("expected {c}{c} in build expression"));
                }
                tokens.push(if c == '&' { Token::And } else { Token::Or });
            }
            c if c.is_alphanumeric() || c == '_' || c == '.' => {
                let mut tag = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '.' {
                        tag.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Tag(tag));
            }
            other => return Err(format!("invalid character {other:?} in build expression")),
        }
    }
    Ok(tokens)
}

/// Bounds on `//go:build` lines so parsing and evaluation stay shallow.
const MAX_EXPR_TOKENS: usize = 1000;
const MAX_EXPR_DEPTH: usize = 100;

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn descend(&mut self) -> Result<(), String> {
        self.depth += 1;
        if self.depth > MAX_EXPR_DEPTH {
            return Err("build expression too deeply nested".to_string());
        }
        Ok(())
    }

    fn or(&mut self) -> Result<Expr, String> {
        let mut left = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, String> {
        let mut left = self.not()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr, String> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            self.descend()?;
            let inner = self.not()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Expr, String> {
        match self.tokens.get(self.pos).cloned() {
            Some(Token::Tag(t)) => {
                self.pos += 1;
                Ok(Expr::Tag(t))
            }
            Some(Token::Open) => {
                self.pos += 1;
                self.descend()?;
                let inner = self.or()?;
                if self.peek() != Some(&Token::Close) {
                    return Err("missing ) in build expression".to_string());
                }
                self.pos += 1;
                self.depth -= 1;
                Ok(inner)
            }
            Some(tok) => Err(format!("unexpected {tok:?} in build expression")),
            None => Err("unexpected end of build expression".to_string()),
        }
    }
}
