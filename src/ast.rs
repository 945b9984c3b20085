use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::span::{LineIndex, LineRange, SourceSpan};

/// Closed set of statement kinds the parser produces.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Assert,
    Block,
    Break,
    Continue,
    Do,
    Empty,
    Expression,
    For,
    If,
    Labeled,
    Return,
    Switch,
    Synchronized,
    Throw,
    Try,
    TypeDeclaration,
    VariableDeclaration,
    While,
}

impl StatementKind {
    /// Whether statements of this kind are mutation targets and donor candidates.
    ///
    /// Blocks, labels and local type declarations are structure only.
    pub fn is_eligible(self) -> bool {
        !matches!(
            self,
            StatementKind::Block | StatementKind::Labeled | StatementKind::TypeDeclaration
        )
    }

    /// Whether children of this kind sit in a statement list (as opposed to a
    /// single-statement slot such as the body of an `if`).
    pub fn holds_statement_list(self) -> bool {
        matches!(self, StatementKind::Block | StatementKind::Switch)
    }
}

/// One statement node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: SourceSpan,
    pub lines: LineRange,
    pub children: Vec<Statement>,
}

impl Statement {
    /// Number of eligible statements in this subtree, including `self`.
    pub fn eligible_count(&self) -> usize {
        let own = usize::from(self.kind.is_eligible());
        own + self
            .children
            .iter()
            .map(Statement::eligible_count)
            .sum::<usize>()
    }
}

/// Handle to one statement of one file.
///
/// `path` is the child-index path from the file's body roots. Two locations are
/// equal iff they name the same file and path; `kind`, `lines` and `text`
/// describe the node at the time the location was taken.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub file: PathBuf,
    pub path: Vec<usize>,
    pub kind: StatementKind,
    pub lines: LineRange,
    pub text: String,
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.file == other.file && self.path == other.path
    }
}

impl Eq for Location {}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.file.hash(state);
        self.path.hash(state);
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("line {line}, column {column}: {message}")]
pub struct ParseError {
    pub line: u32,
    pub column: usize,
    pub message: String,
}

/// Parsed statement outline of one brace-structured (Java-like) source file.
///
/// Expressions are not parsed. The outline holds the bodies of methods,
/// constructors and initializers, and the statement tree inside each.
#[derive(Debug, Clone)]
pub struct SourceAst {
    path: PathBuf,
    text: String,
    index: LineIndex,
    roots: Vec<Statement>,
}

impl SourceAst {
    pub fn parse(path: impl Into<PathBuf>, text: impl Into<String>) -> Result<Self, ParseError> {
        let text = text.into();
        let index = LineIndex::new(&text);
        let roots = Parser::new(&text, &index).compilation_unit()?;
        Ok(Self {
            path: path.into(),
            text,
            index,
            roots,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn line_count(&self) -> u32 {
        self.index.line_count()
    }

    /// Method, constructor and initializer bodies in source order.
    pub fn roots(&self) -> &[Statement] {
        &self.roots
    }

    pub fn text_of(&self, stmt: &Statement) -> &str {
        &self.text[stmt.span.start..stmt.span.end]
    }

    /// Every statement with its path, in pre-order.
    pub fn walk(&self) -> Vec<(Vec<usize>, &Statement)> {
        fn go<'s>(
            stmt: &'s Statement,
            path: &mut Vec<usize>,
            out: &mut Vec<(Vec<usize>, &'s Statement)>,
        ) {
            out.push((path.clone(), stmt));
            for (i, child) in stmt.children.iter().enumerate() {
                path.push(i);
                go(child, path, out);
                path.pop();
            }
        }

        let mut out = Vec::new();
        let mut path = Vec::new();
        for (i, root) in self.roots.iter().enumerate() {
            path.push(i);
            go(root, &mut path, &mut out);
            path.pop();
        }
        out
    }

    pub fn resolve(&self, path: &[usize]) -> Option<&Statement> {
        let (first, rest) = path.split_first()?;
        let mut node = self.roots.get(*first)?;
        for &i in rest {
            node = node.children.get(i)?;
        }
        Some(node)
    }

    /// Kind of the statement enclosing `path`, `None` for roots.
    pub fn parent_kind(&self, path: &[usize]) -> Option<StatementKind> {
        if path.len() < 2 {
            return None;
        }
        self.resolve(&path[..path.len() - 1]).map(|s| s.kind)
    }

    pub fn location(&self, path: Vec<usize>, stmt: &Statement) -> Location {
        Location {
            file: self.path.clone(),
            path,
            kind: stmt.kind,
            lines: stmt.lines,
            text: self.text_of(stmt).to_string(),
        }
    }

    /// Every eligible statement of the file, in pre-order.
    pub fn locations(&self) -> Vec<Location> {
        self.walk()
            .into_iter()
            .filter(|(_, s)| s.kind.is_eligible())
            .map(|(path, s)| self.location(path, s))
            .collect()
    }

    /// Eligible statements covering `line`, outermost first.
    pub fn infer(&self, line: u32) -> Vec<Location> {
        self.walk()
            .into_iter()
            .filter(|(_, s)| s.kind.is_eligible() && s.lines.covers(line))
            .map(|(path, s)| self.location(path, s))
            .collect()
    }
}

const LOCAL_TYPE_MODIFIERS: &[&str] = &["final", "abstract", "static", "strictfp"];
const NON_DECLARATION_HEADS: &[&str] = &[
    "return", "throw", "new", "yield", "assert", "break", "continue", "this", "super",
];

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    index: &'a LineIndex,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str, index: &'a LineIndex) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            index,
            pos: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        let mut offset = self.pos.min(self.src.len());
        while !self.src.is_char_boundary(offset) {
            offset -= 1;
        }
        let (line, column) = self
            .index
            .line_col(self.src, offset)
            .unwrap_or((self.index.line_of(offset), 1));
        ParseError {
            line,
            column,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, pos: usize) -> Option<u8> {
        self.bytes.get(pos).copied()
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match (self.peek(), self.peek_at(self.pos + 1)) {
                (Some(b), _) if b.is_ascii_whitespace() => self.pos += 1,
                (Some(b'/'), Some(b'/')) => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                (Some(b'/'), Some(b'*')) => {
                    let rest = &self.src[self.pos + 2..];
                    let close = rest.find("*/").ok_or_else(|| self.error("unterminated comment"))?;
                    self.pos += 2 + close + 2;
                }
                _ => return Ok(()),
            }
        }
    }

    fn ident_at(&self, pos: usize) -> Option<&'a str> {
        let first = self.peek_at(pos)?;
        if !(first.is_ascii_alphabetic() || first == b'_' || first == b'$') {
            return None;
        }
        let len = self.bytes[pos..]
            .iter()
            .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_' || **b == b'$')
            .count();
        Some(&self.src[pos..pos + len])
    }

    fn peek_word(&self) -> Option<&'a str> {
        self.ident_at(self.pos)
    }

    fn bump_word(&mut self, word: &str) {
        self.pos += word.len();
    }

    fn expect(&mut self, byte: u8) -> Result<(), ParseError> {
        self.skip_trivia()?;
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected `{}`", byte as char)))
        }
    }

    fn expect_word(&mut self, word: &str) -> Result<(), ParseError> {
        self.skip_trivia()?;
        if self.peek_word() == Some(word) {
            self.bump_word(word);
            Ok(())
        } else {
            Err(self.error(format!("expected `{word}`")))
        }
    }

    /// Skip a string, text block or char literal starting at `pos`.
    fn skip_literal(&mut self) -> Result<(), ParseError> {
        let quote = self.bytes[self.pos];
        if self.bytes[self.pos..].starts_with(b"\"\"\"") {
            // Byte-wise: `i` may step into a multi-byte char.
            let rest = &self.bytes[self.pos + 3..];
            let mut i = 0;
            while i < rest.len() {
                if rest[i] == b'\\' {
                    i += 2;
                    continue;
                }
                if rest[i..].starts_with(b"\"\"\"") {
                    self.pos += 3 + i + 3;
                    return Ok(());
                }
                i += 1;
            }
            return Err(self.error("unterminated text block"));
        }

        self.pos += 1;
        while let Some(b) = self.peek() {
            match b {
                b'\\' => self.pos += 2,
                b'\n' => break,
                _ if b == quote => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => self.pos += 1,
            }
        }
        Err(self.error("unterminated literal"))
    }

    /// Skip one bracketed group (`()`, `[]` or `{}`) including nested groups.
    fn skip_group(&mut self) -> Result<(), ParseError> {
        let mut stack = Vec::new();
        loop {
            self.skip_trivia()?;
            let Some(b) = self.peek() else {
                return Err(self.error("unbalanced brackets"));
            };
            match b {
                b'(' | b'[' | b'{' => {
                    stack.push(b);
                    self.pos += 1;
                }
                b')' | b']' | b'}' => {
                    let open = stack.pop().ok_or_else(|| self.error("unexpected closing bracket"))?;
                    if closing_for(open) != b {
                        return Err(self.error(format!("mismatched `{}`", b as char)));
                    }
                    self.pos += 1;
                    if stack.is_empty() {
                        return Ok(());
                    }
                }
                b'"' | b'\'' => self.skip_literal()?,
                _ => self.pos += 1,
            }
        }
    }

    fn paren_group(&mut self) -> Result<(), ParseError> {
        self.skip_trivia()?;
        if self.peek() != Some(b'(') {
            return Err(self.error("expected `(`"));
        }
        self.skip_group()
    }

    /// Advance past the next `;` at bracket depth zero.
    fn scan_to_semicolon(&mut self) -> Result<(), ParseError> {
        loop {
            self.skip_trivia()?;
            match self.peek() {
                None => return Err(self.error("expected `;`")),
                Some(b';') => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(b'(' | b'[' | b'{') => self.skip_group()?,
                Some(b')' | b']' | b'}') => return Err(self.error("expected `;`")),
                Some(b'"' | b'\'') => self.skip_literal()?,
                Some(_) => self.pos += 1,
            }
        }
    }

    /// Advance to the next `{`, `;` or unmatched `}` at depth zero, leaving
    /// `pos` on it.
    fn scan_header(&mut self) -> Result<u8, ParseError> {
        loop {
            self.skip_trivia()?;
            match self.peek() {
                None => return Err(self.error("unexpected end of file")),
                Some(b @ (b'{' | b';' | b'}')) => return Ok(b),
                Some(b'(' | b'[') => self.skip_group()?,
                Some(b')' | b']') => return Err(self.error("unexpected closing bracket")),
                Some(b'"' | b'\'') => self.skip_literal()?,
                Some(_) => self.pos += 1,
            }
        }
    }

    fn node(&self, kind: StatementKind, start: usize, children: Vec<Statement>) -> Statement {
        let span = SourceSpan::new(start, self.pos);
        Statement {
            kind,
            span,
            lines: self.index.lines_of(span),
            children,
        }
    }

    fn compilation_unit(&mut self) -> Result<Vec<Statement>, ParseError> {
        let mut roots = Vec::new();
        self.declarations(&mut roots, false)?;
        Ok(roots)
    }

    /// Members of a compilation unit or type body. Bodies found become roots.
    fn declarations(&mut self, roots: &mut Vec<Statement>, nested: bool) -> Result<(), ParseError> {
        loop {
            self.skip_trivia()?;
            match self.peek() {
                None if nested => return Err(self.error("unclosed type body")),
                None => return Ok(()),
                Some(b'}') if nested => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(b'}') => return Err(self.error("unexpected `}`")),
                Some(_) => {}
            }

            let header_start = self.pos;
            let terminator = self.scan_header()?;
            let header = strip_annotations(&self.src[header_start..self.pos]);

            if terminator == b'}' {
                // trailing enum constants without a `;`
                if !nested {
                    return Err(self.error("unexpected `}`"));
                }
                self.pos += 1;
                return Ok(());
            } else if terminator == b';' {
                self.pos += 1;
            } else if has_assignment(header) {
                self.skip_group()?;
                self.scan_to_semicolon()?;
            } else if is_type_header(header) {
                self.pos += 1;
                self.declarations(roots, true)?;
            } else if header.contains('(') || header.is_empty() || header == "static" {
                roots.push(self.block()?);
            } else {
                // enum constant with a class body
                self.pos += 1;
                self.declarations(roots, true)?;
            }
        }
    }

    fn block(&mut self) -> Result<Statement, ParseError> {
        self.skip_trivia()?;
        let start = self.pos;
        self.expect(b'{')?;
        let mut children = Vec::new();
        loop {
            self.skip_trivia()?;
            match self.peek() {
                None => return Err(self.error("unclosed block")),
                Some(b'}') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => children.push(self.statement()?),
            }
        }
        Ok(self.node(StatementKind::Block, start, children))
    }

    fn statement(&mut self) -> Result<Statement, ParseError> {
        use StatementKind::*;

        self.skip_trivia()?;
        let start = self.pos;
        match self.peek() {
            None => return Err(self.error("expected statement")),
            Some(b'{') => return self.block(),
            Some(b';') => {
                self.pos += 1;
                return Ok(self.node(Empty, start, Vec::new()));
            }
            Some(b'}') => return Err(self.error("unexpected `}`")),
            Some(_) => {}
        }

        if let Some(word) = self.peek_word() {
            match word {
                "if" => {
                    self.bump_word(word);
                    self.paren_group()?;
                    let mut children = vec![self.statement()?];
                    self.skip_trivia()?;
                    if self.peek_word() == Some("else") {
                        self.bump_word("else");
                        children.push(self.statement()?);
                    }
                    return Ok(self.node(If, start, children));
                }
                "for" | "while" => {
                    self.bump_word(word);
                    self.paren_group()?;
                    let body = self.statement()?;
                    let kind = if word == "for" { For } else { While };
                    return Ok(self.node(kind, start, vec![body]));
                }
                "do" => {
                    self.bump_word(word);
                    let body = self.statement()?;
                    self.expect_word("while")?;
                    self.paren_group()?;
                    self.expect(b';')?;
                    return Ok(self.node(Do, start, vec![body]));
                }
                "switch" => {
                    self.bump_word(word);
                    self.paren_group()?;
                    let children = self.switch_body()?;
                    return Ok(self.node(Switch, start, children));
                }
                "try" => {
                    self.bump_word(word);
                    self.skip_trivia()?;
                    if self.peek() == Some(b'(') {
                        self.skip_group()?;
                    }
                    let mut children = vec![self.block()?];
                    loop {
                        self.skip_trivia()?;
                        match self.peek_word() {
                            Some("catch") => {
                                self.bump_word("catch");
                                self.paren_group()?;
                                children.push(self.block()?);
                            }
                            Some("finally") => {
                                self.bump_word("finally");
                                children.push(self.block()?);
                                break;
                            }
                            _ => break,
                        }
                    }
                    return Ok(self.node(Try, start, children));
                }
                "synchronized" => {
                    self.bump_word(word);
                    self.paren_group()?;
                    let body = self.block()?;
                    return Ok(self.node(Synchronized, start, vec![body]));
                }
                "return" | "throw" | "break" | "continue" | "assert" => {
                    let kind = match word {
                        "return" => Return,
                        "throw" => Throw,
                        "break" => Break,
                        "continue" => Continue,
                        _ => Assert,
                    };
                    self.bump_word(word);
                    self.scan_to_semicolon()?;
                    return Ok(self.node(kind, start, Vec::new()));
                }
                _ => {}
            }

            if self.at_local_type_declaration() {
                if self.scan_header()? != b'{' {
                    return Err(self.error("expected type body"));
                }
                self.skip_group()?;
                return Ok(self.node(TypeDeclaration, start, Vec::new()));
            }

            let after = self.pos + word.len();
            let mut probe = Parser {
                pos: after,
                ..*self
            };
            probe.skip_trivia()?;
            if probe.peek() == Some(b':') && probe.peek_at(probe.pos + 1) != Some(b':') {
                self.pos = probe.pos + 1;
                let body = self.statement()?;
                return Ok(self.node(Labeled, start, vec![body]));
            }
        }

        self.scan_to_semicolon()?;
        let kind = if is_variable_declaration(&self.src[start..self.pos]) {
            VariableDeclaration
        } else {
            Expression
        };
        Ok(self.node(kind, start, Vec::new()))
    }

    fn at_local_type_declaration(&self) -> bool {
        let mut probe = Parser { ..*self };
        loop {
            if probe.skip_trivia().is_err() {
                return false;
            }
            let Some(word) = probe.peek_word() else {
                return false;
            };
            match word {
                "class" | "interface" | "enum" => return true,
                "record" => {
                    probe.bump_word(word);
                    return probe.skip_trivia().is_ok() && probe.peek_word().is_some();
                }
                w if LOCAL_TYPE_MODIFIERS.contains(&w) => probe.bump_word(w),
                _ => return false,
            }
        }
    }

    /// Statements of a switch body; `case`/`default` labels are skipped.
    fn switch_body(&mut self) -> Result<Vec<Statement>, ParseError> {
        self.expect(b'{')?;
        let mut children = Vec::new();
        loop {
            self.skip_trivia()?;
            match self.peek() {
                None => return Err(self.error("unclosed switch")),
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(children);
                }
                Some(_) => {}
            }
            match self.peek_word() {
                Some(label @ ("case" | "default")) => {
                    self.bump_word(label);
                    if self.skip_switch_label()? {
                        children.push(self.statement()?);
                    }
                }
                _ => children.push(self.statement()?),
            }
        }
    }

    /// Skip to the end of a switch label. Returns true for `->` labels.
    fn skip_switch_label(&mut self) -> Result<bool, ParseError> {
        loop {
            self.skip_trivia()?;
            match (self.peek(), self.peek_at(self.pos + 1)) {
                (None, _) => return Err(self.error("unterminated switch label")),
                (Some(b':'), Some(b':')) => self.pos += 2,
                (Some(b':'), _) => {
                    self.pos += 1;
                    return Ok(false);
                }
                (Some(b'-'), Some(b'>')) => {
                    self.pos += 2;
                    return Ok(true);
                }
                (Some(b'(' | b'[' | b'{'), _) => self.skip_group()?,
                (Some(b'"' | b'\''), _) => self.skip_literal()?,
                _ => self.pos += 1,
            }
        }
    }
}

fn closing_for(open: u8) -> u8 {
    match open {
        b'(' => b')',
        b'[' => b']',
        _ => b'}',
    }
}

/// Drop leading `@Annotation` / `@Annotation(...)` prefixes.
fn strip_annotations(text: &str) -> &str {
    let mut rest = text.trim();
    while let Some(after_at) = rest.strip_prefix('@') {
        let name_len = after_at
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_' || *b == b'$' || *b == b'.')
            .count();
        if name_len == 0 {
            // `@interface`-less `@` is malformed; leave it for the caller
            return rest;
        }
        let mut tail = after_at[name_len..].trim_start();
        if &after_at[..name_len] == "interface" {
            return rest;
        }
        if tail.starts_with('(') {
            let mut depth = 0usize;
            let mut end = tail.len();
            for (i, c) in tail.char_indices() {
                match c {
                    '(' => depth += 1,
                    ')' => {
                        depth -= 1;
                        if depth == 0 {
                            end = i + 1;
                            break;
                        }
                    }
                    _ => {}
                }
            }
            tail = tail[end..].trim_start();
        }
        rest = tail;
    }
    rest
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '$'))
        .filter(|w| !w.is_empty())
}

fn is_type_header(header: &str) -> bool {
    let before_paren = header.split('(').next().unwrap_or("");
    let mut tokens = words(before_paren).peekable();
    while let Some(token) = tokens.next() {
        match token {
            "class" | "interface" | "enum" => return true,
            "record" if tokens.peek().is_some() => return true,
            _ => {}
        }
    }
    false
}

/// True for a declaration header whose `{` starts an initializer (`int[] a = {`).
fn has_assignment(header: &str) -> bool {
    let bytes = header.as_bytes();
    bytes.iter().enumerate().any(|(i, &b)| {
        b == b'='
            && bytes.get(i + 1) != Some(&b'=')
            && !matches!(i.checked_sub(1).map(|j| bytes[j]), Some(b'=' | b'!' | b'<' | b'>'))
    })
}

/// Heuristic split between `Type name = ...;` and expression statements.
fn is_variable_declaration(statement: &str) -> bool {
    let text = strip_annotations(statement);
    let head_end = text
        .char_indices()
        .find(|&(i, c)| match c {
            ';' | '(' => true,
            '=' => text.as_bytes().get(i + 1) != Some(&b'='),
            _ => false,
        })
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    if text[head_end..].starts_with('(') {
        return false;
    }

    let mut head = String::with_capacity(head_end);
    let mut depth = 0usize;
    for c in text[..head_end].chars() {
        match c {
            '<' => depth += 1,
            '>' if depth > 0 => depth -= 1,
            _ if depth > 0 => {}
            _ => head.push(c),
        }
    }
    let head = head.replace("[]", " ").replace("...", " ");

    let tokens: Vec<&str> = head
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect();
    tokens.len() >= 2
        && !NON_DECLARATION_HEADS.contains(&tokens[0])
        && tokens.iter().all(|t| {
            t.split('.').all(|part| {
                part.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
                    && part.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$')
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"package demo;

import java.util.List;

public class Calc {
    private int[] cache = {1, 2};

    public int abs(int x) {
        if (x < 0) {
            return -x;
        }
        return x;
    }

    // comment with { brace
    int loop(List<String> xs) {
        int n = 0;
        for (String s : xs) n += s.length();
        while (n > 10) { n--; }
        outer:
        do { n++; } while (n < 3);
        switch (n) {
            case 1: n = 2; break;
            default: throw new IllegalStateException("}");
        }
        try { n = n / 0; } catch (ArithmeticException e) { n = 0; } finally { ; }
        assert n >= 0;
        return n;
    }
}
"#;

    fn kinds(ast: &SourceAst) -> Vec<StatementKind> {
        ast.walk().into_iter().map(|(_, s)| s.kind).collect()
    }

    #[test]
    fn parses_method_bodies_into_statement_trees() {
        use StatementKind::*;

        let ast = SourceAst::parse("Calc.java", SAMPLE).expect("sample should parse");
        assert_eq!(ast.roots().len(), 2);
        assert_eq!(
            kinds(&ast),
            vec![
                Block, If, Block, Return, Return, // abs
                Block, VariableDeclaration, For, Expression, While, Block, Expression, Labeled,
                Do, Block, Expression, Switch, Expression, Break, Throw, Try, Block, Expression,
                Block, Expression, Block, Empty, Assert, Return,
            ]
        );
    }

    #[test]
    fn line_ranges_follow_source() {
        let ast = SourceAst::parse("Calc.java", SAMPLE).unwrap();
        let if_stmt = ast.resolve(&[0, 0]).unwrap();
        assert_eq!(if_stmt.kind, StatementKind::If);
        assert_eq!(if_stmt.lines, LineRange { start: 9, end: 11 });
        assert_eq!(ast.text_of(ast.resolve(&[0, 1]).unwrap()), "return x;");
    }

    #[test]
    fn infer_lists_outermost_first() {
        let ast = SourceAst::parse("Calc.java", SAMPLE).unwrap();
        let found = ast.infer(10);
        let kinds: Vec<_> = found.iter().map(|l| l.kind).collect();
        assert_eq!(kinds, vec![StatementKind::If, StatementKind::Return]);
        assert_eq!(found.last().unwrap().text, "return -x;");
        assert!(ast.infer(1).is_empty());
    }

    #[test]
    fn eligible_count_skips_structural_nodes() {
        let ast = SourceAst::parse("Calc.java", SAMPLE).unwrap();
        let if_stmt = ast.resolve(&[0, 0]).unwrap();
        assert_eq!(if_stmt.eligible_count(), 2);
        assert_eq!(ast.roots()[0].eligible_count(), 3);
    }

    #[test]
    fn location_equality_ignores_text() {
        let ast = SourceAst::parse("Calc.java", SAMPLE).unwrap();
        let a = ast.locations()[0].clone();
        let mut b = a.clone();
        b.text = "changed".to_string();
        assert_eq!(a, b);
        b.path.push(0);
        assert_ne!(a, b);
    }

    #[test]
    fn unbalanced_source_is_an_error() {
        let err = SourceAst::parse("Bad.java", "class A { void f() { if (x) { } }").unwrap_err();
        assert!(err.message.contains("unclosed"), "{err}");
        assert!(SourceAst::parse("Bad.java", "class A { String s = \"oops; }").is_err());
    }

    #[test]
    fn non_ascii_literals_and_comments_parse() {
        let src = "class A {\n  void f() {\n    // naïve\n    /* größe */\n    String s = \"héllo\";\n    char c = 'é';\n    String t = \"\"\"\n      h\u{e9}llo \\\"\u{1F600}\n      \"\"\";\n    g(s, c, t);\n  }\n}\n";
        let ast = SourceAst::parse("A.java", src).expect("UTF-8 source should parse");
        assert_eq!(
            kinds(&ast),
            vec![
                StatementKind::Block,
                StatementKind::VariableDeclaration,
                StatementKind::VariableDeclaration,
                StatementKind::VariableDeclaration,
                StatementKind::Expression,
            ]
        );
        let block = ast.resolve(&[0, 2]).unwrap();
        assert!(ast.text_of(block).contains('\u{1F600}'));
        assert_eq!(block.lines, LineRange { start: 7, end: 9 });
        assert_eq!(ast.text_of(ast.resolve(&[0, 1]).unwrap()), "char c = 'é';");
    }

    #[test]
    fn unterminated_text_block_is_an_error() {
        let src = "class A { void f() { String t = \"\"\"\n  héllo\n\"\"; } }";
        let err = SourceAst::parse("A.java", src).unwrap_err();
        assert!(err.message.contains("unterminated text block"), "{err}");
        assert_eq!((err.line, err.column), (1, 33));
    }

    #[test]
    fn declaration_heuristic() {
        assert!(is_variable_declaration("int x = 1;"));
        assert!(is_variable_declaration("final List<String> xs = new ArrayList<>();"));
        assert!(is_variable_declaration("int[] a, b;"));
        assert!(is_variable_declaration("@SuppressWarnings(\"x\") Foo f;"));
        assert!(!is_variable_declaration("x = 1;"));
        assert!(!is_variable_declaration("foo(bar);"));
        assert!(!is_variable_declaration("i++;"));
        assert!(!is_variable_declaration("yield x;"));
        assert!(!is_variable_declaration("a.b = c;"));
    }

    #[test]
    fn local_types_and_lambdas_are_single_statements() {
        let src = "class A { void f() { class L { void g() { x(); } } Runnable r = () -> { y(); }; } }";
        let ast = SourceAst::parse("A.java", src).unwrap();
        let kinds: Vec<_> = kinds(&ast);
        assert_eq!(
            kinds,
            vec![
                StatementKind::Block,
                StatementKind::TypeDeclaration,
                StatementKind::VariableDeclaration
            ]
        );
    }
}
