/*
 * lexer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Tokenizer.
//!
//! The scanner is a small mode automaton. Its mode is derived from the top
//! of a construct stack that records why the scanner left literal text:
//!
//! | Frame              | Opened by                 | Closed by        | Mode          |
//! |--------------------|---------------------------|------------------|---------------|
//! | `ArgumentList`     | `$(` / `@(`               | `)`              | Inside        |
//! | `ControlArguments` | `#if(`, `#foreach(`, ...  | `)`              | Inside        |
//! | `FreeStatement`    | `#set` without `(`        | end of line      | Inside        |
//! | `Statement`        | `$name` / `@name`         | first non-chain  | Statement     |
//! | `Parenthesis`      | `(`                       | `)`              | Inside        |
//! | `Bracket`          | `[`                       | `]`              | Inside        |
//! | `DynamicString`    | `"`                       | `"`              | DynamicString |
//!
//! An empty stack means `Outside` (literal text). Every token records the
//! stack depth after it was produced, which the parser uses to skip the rest
//! of a malformed construct.
//!
//! Closing a directive (`#end`, `#else`, a loop section, a jump, or the `)`
//! of a directive argument list) sets a pending-newline flag: the next scan
//! of literal text drops one line break, so directive lines leave no blank
//! lines behind.

use crate::ast::LoopSection;
use crate::options::TrimMode;
use crate::value::BinaryOp;
use std::collections::VecDeque;
use std::fmt;

/// Control directives recognized after `#`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    If,
    ElseIf,
    Else,
    End,
    Foreach,
    Loop,
    Set,
    Parse,
    Include,
    Assert,
    Pragma,
    Break,
    Continue,
    Stop,
    Section(LoopSection),
}

impl Directive {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "if" => Directive::If,
            "elseif" => Directive::ElseIf,
            "else" => Directive::Else,
            "end" => Directive::End,
            "foreach" => Directive::Foreach,
            "loop" => Directive::Loop,
            "set" => Directive::Set,
            "parse" => Directive::Parse,
            "include" => Directive::Include,
            "assert" => Directive::Assert,
            "pragma" => Directive::Pragma,
            "break" => Directive::Break,
            "continue" => Directive::Continue,
            "stop" => Directive::Stop,
            "beforeall" => Directive::Section(LoopSection::BeforeAll),
            "before" => Directive::Section(LoopSection::Before),
            "each" => Directive::Section(LoopSection::Each),
            "between" => Directive::Section(LoopSection::Between),
            "odd" => Directive::Section(LoopSection::Odd),
            "even" => Directive::Section(LoopSection::Even),
            "after" => Directive::Section(LoopSection::After),
            "afterall" => Directive::Section(LoopSection::AfterAll),
            "nodata" => Directive::Section(LoopSection::NoData),
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Directive::If => "if",
            Directive::ElseIf => "elseif",
            Directive::Else => "else",
            Directive::End => "end",
            Directive::Foreach => "foreach",
            Directive::Loop => "loop",
            Directive::Set => "set",
            Directive::Parse => "parse",
            Directive::Include => "include",
            Directive::Assert => "assert",
            Directive::Pragma => "pragma",
            Directive::Break => "break",
            Directive::Continue => "continue",
            Directive::Stop => "stop",
            Directive::Section(section) => section.name(),
        }
    }

    /// Directives whose parenthesized argument list is mandatory.
    fn takes_arguments(self) -> bool {
        matches!(
            self,
            Directive::If
                | Directive::ElseIf
                | Directive::Foreach
                | Directive::Loop
                | Directive::Parse
                | Directive::Include
                | Directive::Assert
                | Directive::Pragma
        )
    }
}

/// Type suffix of a numeric literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberSuffix {
    /// `L`
    Long,
    /// `UL`
    UnsignedLong,
    /// `D`
    Double,
    /// `M`
    Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Text(String),
    /// `$(` or `@(`
    PassthroughStart { is_macro: bool },
    /// `$` or `@` directly before an identifier in text or a dynamic string.
    StatementStart { is_macro: bool },
    /// `@` before an identifier inside an expression.
    MacroSigil,
    Ident(String),
    Dot,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Assign,
    Binary(BinaryOp),
    Not,
    Number {
        text: String,
        suffix: Option<NumberSuffix>,
    },
    /// `'plain'` string, escapes already processed.
    Str(String),
    DynamicStringStart,
    DynamicStringEnd,
    True,
    False,
    Null,
    In,
    /// End of a `$name...` chain (zero width).
    StatementEnd,
    /// Line break ending a free `#set`.
    EndOfLine,
    Directive(Directive),
    Error {
        code: &'static str,
        message: String,
    },
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Text(_) => f.write_str("text"),
            TokenKind::PassthroughStart { is_macro: false } => f.write_str("`$(`"),
            TokenKind::PassthroughStart { is_macro: true } => f.write_str("`@(`"),
            TokenKind::StatementStart { is_macro: false } => f.write_str("`$`"),
            TokenKind::StatementStart { is_macro: true } | TokenKind::MacroSigil => {
                f.write_str("`@`")
            }
            TokenKind::Ident(name) => write!(f, "identifier `{name}`"),
            TokenKind::Dot => f.write_str("`.`"),
            TokenKind::LParen => f.write_str("`(`"),
            TokenKind::RParen => f.write_str("`)`"),
            TokenKind::LBracket => f.write_str("`[`"),
            TokenKind::RBracket => f.write_str("`]`"),
            TokenKind::Comma => f.write_str("`,`"),
            TokenKind::Assign => f.write_str("`=`"),
            TokenKind::Binary(op) => write!(f, "`{op}`"),
            TokenKind::Not => f.write_str("`!`"),
            TokenKind::Number { text, .. } => write!(f, "number `{text}`"),
            TokenKind::Str(_) => f.write_str("string"),
            TokenKind::DynamicStringStart | TokenKind::DynamicStringEnd => f.write_str("`\"`"),
            TokenKind::True => f.write_str("`true`"),
            TokenKind::False => f.write_str("`false`"),
            TokenKind::Null => f.write_str("`null`"),
            TokenKind::In => f.write_str("`in`"),
            TokenKind::StatementEnd => f.write_str("end of statement"),
            TokenKind::EndOfLine => f.write_str("end of line"),
            TokenKind::Directive(d) => write!(f, "`#{}`", d.name()),
            TokenKind::Error { message, .. } => f.write_str(message),
            TokenKind::Eof => f.write_str("end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset past the last character.
    pub end: usize,
    /// Construct-stack depth after this token.
    pub depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    ArgumentList,
    ControlArguments,
    FreeStatement,
    Statement { expect_ident: bool },
    Parenthesis,
    Bracket,
    DynamicString,
}

impl Frame {
    fn describe(self) -> &'static str {
        match self {
            Frame::ArgumentList => "argument list",
            Frame::ControlArguments => "directive arguments",
            Frame::FreeStatement => "statement",
            Frame::Statement { .. } => "statement",
            Frame::Parenthesis => "parenthesis",
            Frame::Bracket => "bracket",
            Frame::DynamicString => "string",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Outside,
    Inside,
    Statement { expect_ident: bool },
    DynamicString,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Pull-based scanner over template source.
pub struct Tokenizer<'s> {
    src: &'s str,
    pos: usize,
    stack: Vec<Frame>,
    queue: VecDeque<Token>,
    strip_newline: bool,
    trim: TrimMode,
}

impl<'s> Tokenizer<'s> {
    pub fn new(src: &'s str, trim: TrimMode) -> Self {
        Self {
            src,
            pos: 0,
            stack: Vec::new(),
            queue: VecDeque::new(),
            strip_newline: false,
            trim,
        }
    }

    /// Switch the trim mode for the rest of the source.
    pub fn set_trim(&mut self, trim: TrimMode) {
        self.trim = trim;
    }

    pub fn trim(&self) -> TrimMode {
        self.trim
    }

    pub fn next_token(&mut self) -> Token {
        if let Some(token) = self.queue.pop_front() {
            return token;
        }
        match self.mode() {
            Mode::Outside => self.scan_outside(),
            Mode::Inside => self.scan_inside(),
            Mode::Statement { expect_ident } => self.scan_statement(expect_ident),
            Mode::DynamicString => self.scan_dynamic_string(),
        }
    }

    fn mode(&self) -> Mode {
        match self.stack.last() {
            None => Mode::Outside,
            Some(Frame::Statement { expect_ident }) => Mode::Statement {
                expect_ident: *expect_ident,
            },
            Some(Frame::DynamicString) => Mode::DynamicString,
            Some(_) => Mode::Inside,
        }
    }

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            start,
            end: self.pos,
            depth: self.stack.len(),
        }
    }

    fn error(&self, code: &'static str, message: impl Into<String>, start: usize) -> Token {
        self.token(
            TokenKind::Error {
                code,
                message: message.into(),
            },
            start,
        )
    }

    fn scan_ident(&mut self) -> &'s str {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_continue) {
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    fn end_of_input(&mut self) -> Token {
        let start = self.pos;
        match self.stack.last().copied() {
            None => self.token(TokenKind::Eof, start),
            Some(Frame::Statement { .. }) => {
                self.stack.pop();
                self.token(TokenKind::StatementEnd, start)
            }
            Some(Frame::FreeStatement) => {
                self.stack.pop();
                self.token(TokenKind::EndOfLine, start)
            }
            Some(frame) => {
                self.stack.clear();
                self.error("P003", format!("unterminated {}", frame.describe()), start)
            }
        }
    }

    // Outside mode

    fn scan_outside(&mut self) -> Token {
        if std::mem::take(&mut self.strip_newline) {
            self.strip_line_end();
        }
        let start = self.pos;
        let mut text = String::new();
        loop {
            let rest = self.rest();
            let Some(c) = rest.chars().next() else {
                break;
            };
            let next = rest[c.len_utf8()..].chars().next();
            match (c, next) {
                ('$' | '@', Some(n)) if n == '(' || is_ident_start(n) => break,
                ('#', Some('#')) => self.skip_line_comment(),
                ('#', Some('*')) => match self.block_comment_end() {
                    Some(len) => self.pos += len,
                    None if text.is_empty() => {
                        self.pos = self.src.len();
                        return self.error("P003", "unterminated comment", start);
                    }
                    None => break,
                },
                ('#', Some('[')) => match rest[2..].find("]#") {
                    Some(len) => {
                        text.push_str(&rest[2..2 + len]);
                        self.pos += len + 4;
                    }
                    None if text.is_empty() => {
                        self.pos = self.src.len();
                        return self.error("P003", "unterminated unparsed block", start);
                    }
                    None => break,
                },
                ('#', Some(n)) if is_ident_start(n) => {
                    if self.trim == TrimMode::Greedy {
                        self.trim_directive_indent(&mut text);
                    }
                    if text.is_empty() {
                        return self.scan_directive();
                    }
                    break;
                }
                _ => {
                    text.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }

        if !text.is_empty() {
            return self.token(TokenKind::Text(text), start);
        }
        if self.rest().is_empty() {
            return self.end_of_input();
        }
        self.scan_sigil()
    }

    /// Drop the line break after a directive (and, when greedy, the blanks
    /// before it).
    fn strip_line_end(&mut self) {
        let rest = self.rest();
        let blanks = match self.trim {
            TrimMode::Greedy => rest.len() - rest.trim_start_matches(is_blank).len(),
            TrimMode::Standard => 0,
        };
        let after = &rest[blanks..];
        if after.starts_with("\r\n") {
            self.pos += blanks + 2;
        } else if after.starts_with('\n') {
            self.pos += blanks + 1;
        }
    }

    /// Greedy mode: remove the indentation in front of a directive that
    /// starts its line.
    fn trim_directive_indent(&self, text: &mut String) {
        let before = &self.src[..self.pos];
        let trimmed = before.trim_end_matches(is_blank);
        if !(trimmed.is_empty() || trimmed.ends_with('\n')) {
            return;
        }
        let indent = &before[trimmed.len()..];
        if text.ends_with(indent) {
            text.truncate(text.len() - indent.len());
        }
    }

    fn skip_line_comment(&mut self) {
        match self.rest().find('\n') {
            Some(i) => self.pos += i + 1,
            None => self.pos = self.src.len(),
        }
    }

    /// Length of the (nested) `#* ... *#` comment at the cursor.
    fn block_comment_end(&self) -> Option<usize> {
        let bytes = self.rest().as_bytes();
        let mut depth = 0usize;
        let mut i = 0;
        while i + 1 < bytes.len() {
            match (bytes[i], bytes[i + 1]) {
                (b'#', b'*') => {
                    depth += 1;
                    i += 2;
                }
                (b'*', b'#') => {
                    depth -= 1;
                    i += 2;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => i += 1,
            }
        }
        None
    }

    fn scan_directive(&mut self) -> Token {
        let start = self.pos;
        self.pos += 1;
        let name = self.scan_ident();
        let Some(directive) = Directive::from_name(name) else {
            return self.error("P002", format!("unknown directive `#{name}`"), start);
        };
        let token = self.token(TokenKind::Directive(directive), start);

        if directive.takes_arguments() || directive == Directive::Set {
            let rest = self.rest();
            let blanks = rest.len() - rest.trim_start_matches(is_blank).len();
            if rest[blanks..].starts_with('(') {
                self.pos += blanks;
                let paren = self.pos;
                self.pos += 1;
                self.stack.push(Frame::ControlArguments);
                self.queue.push_back(self.token(TokenKind::LParen, paren));
            } else if directive == Directive::Set {
                self.stack.push(Frame::FreeStatement);
            }
        } else {
            self.strip_newline = true;
        }
        token
    }

    /// `$(`, `@(`, `$name` or `@name`.
    fn scan_sigil(&mut self) -> Token {
        let start = self.pos;
        let is_macro = self.bump() == Some('@');
        if self.peek() == Some('(') {
            self.pos += 1;
            self.stack.push(Frame::ArgumentList);
            self.token(TokenKind::PassthroughStart { is_macro }, start)
        } else {
            self.stack.push(Frame::Statement { expect_ident: true });
            self.token(TokenKind::StatementStart { is_macro }, start)
        }
    }

    // Statement mode

    fn scan_statement(&mut self, expect_ident: bool) -> Token {
        let start = self.pos;
        if expect_ident {
            if let Some(Frame::Statement { expect_ident }) = self.stack.last_mut() {
                *expect_ident = false;
            }
            let name = self.scan_ident();
            return self.token(TokenKind::Ident(name.to_string()), start);
        }
        match (self.peek(), self.peek_nth(1)) {
            (Some('.'), Some(n)) if is_ident_start(n) => {
                self.pos += 1;
                if let Some(Frame::Statement { expect_ident }) = self.stack.last_mut() {
                    *expect_ident = true;
                }
                self.token(TokenKind::Dot, start)
            }
            (Some('['), _) => {
                self.pos += 1;
                self.stack.push(Frame::Bracket);
                self.token(TokenKind::LBracket, start)
            }
            (Some('('), _) => {
                self.pos += 1;
                self.stack.push(Frame::Parenthesis);
                self.token(TokenKind::LParen, start)
            }
            _ => {
                self.stack.pop();
                self.token(TokenKind::StatementEnd, start)
            }
        }
    }

    // Inside mode

    fn scan_inside(&mut self) -> Token {
        let free = self.stack.last() == Some(&Frame::FreeStatement);
        loop {
            let rest = self.rest();
            if free && (rest.starts_with('\n') || rest.starts_with("\r\n")) {
                let start = self.pos;
                self.pos += if rest.starts_with('\n') { 1 } else { 2 };
                self.stack.pop();
                return self.token(TokenKind::EndOfLine, start);
            }
            match self.peek() {
                Some(c) if c.is_whitespace() => self.pos += c.len_utf8(),
                _ => break,
            }
        }

        let start = self.pos;
        let Some(c) = self.bump() else {
            return self.end_of_input();
        };
        let next = self.peek();
        let kind = match c {
            '(' => {
                self.stack.push(Frame::Parenthesis);
                TokenKind::LParen
            }
            ')' => {
                match self.stack.last() {
                    Some(Frame::ArgumentList | Frame::Parenthesis) => {
                        self.stack.pop();
                    }
                    Some(Frame::ControlArguments) => {
                        self.stack.pop();
                        self.strip_newline = true;
                    }
                    _ => {}
                }
                TokenKind::RParen
            }
            '[' => {
                self.stack.push(Frame::Bracket);
                TokenKind::LBracket
            }
            ']' => {
                if self.stack.last() == Some(&Frame::Bracket) {
                    self.stack.pop();
                }
                TokenKind::RBracket
            }
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            '=' if next == Some('=') => {
                self.pos += 1;
                TokenKind::Binary(BinaryOp::Eq)
            }
            '=' => TokenKind::Assign,
            '!' if next == Some('=') => {
                self.pos += 1;
                TokenKind::Binary(BinaryOp::Ne)
            }
            '!' => TokenKind::Not,
            '<' if next == Some('=') => {
                self.pos += 1;
                TokenKind::Binary(BinaryOp::Le)
            }
            '<' => TokenKind::Binary(BinaryOp::Lt),
            '>' if next == Some('=') => {
                self.pos += 1;
                TokenKind::Binary(BinaryOp::Ge)
            }
            '>' => TokenKind::Binary(BinaryOp::Gt),
            '&' if next == Some('&') => {
                self.pos += 1;
                TokenKind::Binary(BinaryOp::And)
            }
            '|' if next == Some('|') => {
                self.pos += 1;
                TokenKind::Binary(BinaryOp::Or)
            }
            '+' => TokenKind::Binary(BinaryOp::Add),
            '-' => TokenKind::Binary(BinaryOp::Sub),
            '*' => TokenKind::Binary(BinaryOp::Mul),
            '/' => TokenKind::Binary(BinaryOp::Div),
            '%' => TokenKind::Binary(BinaryOp::Rem),
            '\'' => self.scan_plain_string(),
            '"' => {
                self.stack.push(Frame::DynamicString);
                TokenKind::DynamicStringStart
            }
            '$' | '@' if next == Some('(') => {
                self.pos += 1;
                self.stack.push(Frame::ArgumentList);
                TokenKind::PassthroughStart { is_macro: c == '@' }
            }
            '$' if next.is_some_and(is_ident_start) => return self.scan_word(),
            '@' if next.is_some_and(is_ident_start) => TokenKind::MacroSigil,
            c if c.is_ascii_digit() => self.scan_number(start),
            c if is_ident_start(c) => {
                self.pos = start;
                return self.scan_word();
            }
            other => {
                return self.error("P001", format!("unexpected character `{other}`"), start);
            }
        };
        self.token(kind, start)
    }

    fn scan_word(&mut self) -> Token {
        let start = self.pos;
        let kind = match self.scan_ident() {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "in" => TokenKind::In,
            name => TokenKind::Ident(name.to_string()),
        };
        self.token(kind, start)
    }

    fn scan_number(&mut self, start: usize) -> TokenKind {
        let digits = |t: &mut Self| {
            while t.peek().is_some_and(|c| c.is_ascii_digit()) {
                t.pos += 1;
            }
        };
        digits(self);
        if self.peek() == Some('.') && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
            digits(self);
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let signed = matches!(self.peek_nth(1), Some('+' | '-'));
            let digit_at = if signed { 2 } else { 1 };
            if self.peek_nth(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += digit_at;
                digits(self);
            }
        }
        let text = self.src[start..self.pos].to_string();

        let rest = self.rest();
        let (suffix, len) = if rest.as_bytes().get(..2).is_some_and(|b| b.eq_ignore_ascii_case(b"ul")) {
            (Some(NumberSuffix::UnsignedLong), 2)
        } else {
            match self.peek() {
                Some('L' | 'l') => (Some(NumberSuffix::Long), 1),
                Some('D' | 'd') => (Some(NumberSuffix::Double), 1),
                Some('M' | 'm') => (Some(NumberSuffix::Decimal), 1),
                _ => (None, 0),
            }
        };
        self.pos += len;

        if self.peek().is_some_and(is_ident_continue) {
            self.scan_ident();
            return TokenKind::Error {
                code: "C102",
                message: format!("invalid number literal `{}`", &self.src[start..self.pos]),
            };
        }
        TokenKind::Number { text, suffix }
    }

    fn scan_plain_string(&mut self) -> TokenKind {
        let mut value = String::new();
        loop {
            match self.bump() {
                None => {
                    return TokenKind::Error {
                        code: "P003",
                        message: "unterminated string literal".to_string(),
                    };
                }
                Some('\'') => return TokenKind::Str(value),
                Some('\\') => self.read_escape('\'', &mut value),
                Some(c) => value.push(c),
            }
        }
    }

    /// Escape sequence after a `\`. Unknown escapes are kept verbatim.
    fn read_escape(&mut self, delimiter: char, out: &mut String) {
        match self.bump() {
            Some('b') => out.push('\u{8}'),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('f') => out.push('\u{c}'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('u') => {
                let decoded = self
                    .rest()
                    .get(..4)
                    .filter(|hex| hex.chars().all(|c| c.is_ascii_hexdigit()))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .and_then(char::from_u32);
                match decoded {
                    Some(c) => {
                        out.push(c);
                        self.pos += 4;
                    }
                    None => out.push_str("\\u"),
                }
            }
            Some(c) if c == delimiter => out.push(c),
            Some(c) => {
                out.push('\\');
                out.push(c);
            }
            None => out.push('\\'),
        }
    }

    // Dynamic string mode

    fn scan_dynamic_string(&mut self) -> Token {
        let start = self.pos;
        let mut text = String::new();
        loop {
            let rest = self.rest();
            let Some(c) = rest.chars().next() else {
                break;
            };
            let next = rest[c.len_utf8()..].chars().next();
            match c {
                '"' if text.is_empty() => {
                    self.pos += 1;
                    self.stack.pop();
                    return self.token(TokenKind::DynamicStringEnd, start);
                }
                '"' => break,
                '$' | '@' if next.is_some_and(|n| n == '(' || is_ident_start(n)) => break,
                '\\' => {
                    self.pos += 1;
                    self.read_escape('"', &mut text);
                }
                _ => {
                    text.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
        if !text.is_empty() {
            return self.token(TokenKind::Text(text), start);
        }
        if self.rest().is_empty() {
            return self.end_of_input();
        }
        self.scan_sigil()
    }
}

/// Tokenize a whole source, up to and including [`TokenKind::Eof`].
pub fn tokenize(src: &str, trim: TrimMode) -> Vec<Token> {
    let mut tokenizer = Tokenizer::new(src, trim);
    let mut tokens = Vec::new();
    loop {
        let token = tokenizer.next_token();
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return tokens;
        }
    }
}
