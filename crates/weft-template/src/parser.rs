/*
 * parser.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template parser.
//!
//! A recursive-descent parser over the [`Tokenizer`] stream. Parsing never
//! fails as a whole: a malformed construct is replaced by an
//! [`ErrorNode`](crate::ast::ErrorNode), a diagnostic is recorded, and the
//! parser skips the rest of the construct using the construct-stack depth
//! carried by every token.

use crate::ast::{
    Assertion, Assignment, Chain, Conditional, Constant, ErrorNode, Expr, ForeachLoop, Inclusion,
    Jump, JumpKind, LoopBlocks, Node, Passthrough, RangeLoop, Segment, Statement,
};
use crate::error::TemplateResult;
use crate::eval_context::coded_diagnostic;
use crate::lexer::{Directive, NumberSuffix, Token, TokenKind, Tokenizer};
use crate::options::{CompileOptions, TrimMode};
use crate::value::{BinaryOp, UnaryOp};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use weft_error_reporting::{DiagnosticKind, DiagnosticMessage};
use weft_source_map::{FileId, FileInformation, SourceContext, SourceInfo};

/// A compiled template ready for evaluation.
///
/// Compiled templates hold no evaluation state and can be evaluated any
/// number of times, against independent state tables.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub(crate) nodes: Vec<Node>,
    pub(crate) source: String,
    pub(crate) name: String,
    pub(crate) file_id: FileId,
    pub(crate) diagnostics: Vec<DiagnosticMessage>,
}

impl Template {
    /// Compile a template from source text.
    pub fn compile(source: &str) -> Self {
        Self::compile_with(source, "<template>", FileId(0), &CompileOptions::default())
    }

    /// Compile with an explicit name and file id (used in diagnostics).
    pub fn compile_with(
        source: &str,
        name: &str,
        file_id: FileId,
        options: &CompileOptions,
    ) -> Self {
        let mut parser = Parser::new(source, file_id, options.trim);
        let nodes = parser.parse_document();
        Template {
            nodes,
            source: source.to_string(),
            name: name.to_string(),
            file_id,
            diagnostics: parser.diagnostics,
        }
    }

    /// Read and compile a template file.
    pub fn compile_from_file(path: &Path, options: &CompileOptions) -> TemplateResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Ok(Self::compile_with(
            &source,
            &path.to_string_lossy(),
            FileId(0),
            options,
        ))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    /// Diagnostics for every malformed construct, in source order.
    pub fn parse_diagnostics(&self) -> &[DiagnosticMessage] {
        &self.diagnostics
    }

    pub fn has_parse_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// A source context holding this template, for rendering diagnostics.
    pub fn source_context(&self) -> SourceContext {
        let mut ctx = SourceContext::new();
        ctx.add_file_with_id(self.file_id, self.name.clone(), Some(self.source.clone()));
        ctx
    }
}

type PResult<T> = Result<T, ErrorNode>;

/// Directives that end a block. Whether they are legal depends on the
/// enclosing construct.
fn is_terminator(directive: Directive) -> bool {
    matches!(
        directive,
        Directive::End | Directive::Else | Directive::ElseIf | Directive::Section(_)
    )
}

fn closes_if_branch(directive: Directive) -> bool {
    matches!(directive, Directive::ElseIf | Directive::Else | Directive::End)
}

fn closes_else_branch(directive: Directive) -> bool {
    directive == Directive::End
}

fn closes_loop_block(directive: Directive) -> bool {
    matches!(directive, Directive::Section(_) | Directive::End)
}

fn binary_level(op: BinaryOp) -> usize {
    match op {
        BinaryOp::Or => 0,
        BinaryOp::And => 1,
        BinaryOp::Eq | BinaryOp::Ne => 2,
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 3,
        BinaryOp::Add | BinaryOp::Sub => 4,
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 5,
    }
}

const UNARY_LEVEL: usize = 6;

struct Parser<'s> {
    tokens: Tokenizer<'s>,
    peeked: Option<Token>,
    /// Construct depth after the last consumed token.
    last_depth: usize,
    file_id: FileId,
    file_info: FileInformation,
    diagnostics: Vec<DiagnosticMessage>,
}

impl<'s> Parser<'s> {
    fn new(source: &'s str, file_id: FileId, trim: TrimMode) -> Self {
        Self {
            tokens: Tokenizer::new(source, trim),
            peeked: None,
            last_depth: 0,
            file_id,
            file_info: FileInformation::new(source),
            diagnostics: Vec::new(),
        }
    }

    // Token plumbing

    fn peek(&mut self) -> &Token {
        let tokens = &mut self.tokens;
        self.peeked.get_or_insert_with(|| tokens.next_token())
    }

    fn next(&mut self) -> Token {
        let token = match self.peeked.take() {
            Some(token) => token,
            None => self.tokens.next_token(),
        };
        self.last_depth = token.depth;
        token
    }

    fn at(&mut self, kind: &TokenKind) -> bool {
        self.peek().kind == *kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        let found = self.at(kind);
        if found {
            self.next();
        }
        found
    }

    fn expect(&mut self, kind: &TokenKind) -> PResult<Token> {
        if self.at(kind) {
            return Ok(self.next());
        }
        let token = self.peek().clone();
        Err(self.unexpected(&token, &format!("{kind}")))
    }

    /// Skip the rest of the construct that was open at `base` depth.
    fn recover(&mut self, base: usize) {
        while self.last_depth > base || self.peek().depth > base {
            if self.at(&TokenKind::Eof) {
                return;
            }
            self.next();
        }
    }

    // Diagnostics

    fn info(&self, start: usize, end: usize) -> SourceInfo {
        SourceInfo::original(self.file_id, self.file_info.range(start, end))
    }

    fn error(&mut self, code: &'static str, message: String, start: usize, end: usize) -> ErrorNode {
        let source_info = self.info(start, end);
        self.diagnostics.push(coded_diagnostic(
            code,
            DiagnosticKind::Error,
            message.clone(),
            source_info,
        ));
        ErrorNode {
            code,
            message,
            source_info,
        }
    }

    /// Error for a token that does not fit. Lexer error tokens carry their
    /// own code and message.
    fn unexpected(&mut self, token: &Token, expected: &str) -> ErrorNode {
        match &token.kind {
            TokenKind::Error { code, message } => {
                self.error(*code, message.clone(), token.start, token.end)
            }
            TokenKind::Eof => self.error(
                "P003",
                format!("unexpected end of input, expected {expected}"),
                token.start,
                token.end,
            ),
            kind => self.error(
                "P001",
                format!("unexpected {kind}, expected {expected}"),
                token.start,
                token.end,
            ),
        }
    }

    // Sections

    fn parse_document(&mut self) -> Vec<Node> {
        self.parse_block(|_| false)
    }

    /// Nodes up to end of input or a terminator accepted by `accept` (left
    /// unconsumed). Other terminators are reported as stray.
    fn parse_block(&mut self, accept: fn(Directive) -> bool) -> Vec<Node> {
        let mut nodes = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::Eof => return nodes,
                TokenKind::Directive(d) if is_terminator(d) => {
                    if accept(d) {
                        return nodes;
                    }
                    let error = self.stray_directive();
                    nodes.push(Node::Error(error));
                }
                _ => {
                    if let Some(node) = self.parse_node() {
                        nodes.push(node);
                    }
                }
            }
        }
    }

    fn stray_directive(&mut self) -> ErrorNode {
        let base = self.last_depth;
        let token = self.next();
        let name = match token.kind {
            TokenKind::Directive(d) => d.name(),
            _ => "?",
        };
        let error = self.error(
            "P004",
            format!("`#{name}` is not allowed here"),
            token.start,
            token.end,
        );
        if self.at(&TokenKind::LParen) {
            self.next();
            self.recover(base);
        }
        error
    }

    fn parse_node(&mut self) -> Option<Node> {
        let base = self.last_depth;
        let token = self.peek().clone();
        let node = match token.kind {
            TokenKind::Text(_) => match self.next().kind {
                TokenKind::Text(text) => Node::Text(text),
                _ => return None,
            },
            TokenKind::PassthroughStart { .. } => match self.parse_passthrough() {
                Ok(passthrough) => Node::Passthrough(passthrough),
                Err(error) => self.abandon(base, error),
            },
            TokenKind::StatementStart { .. } => match self.parse_statement() {
                Ok(statement) => Node::Statement(statement),
                Err(error) => self.abandon(base, error),
            },
            TokenKind::Directive(directive) => {
                self.next();
                return self.parse_directive(directive, token, base);
            }
            _ => {
                self.next();
                let error = self.unexpected(&token, "text");
                Node::Error(error)
            }
        };
        Some(node)
    }

    fn abandon(&mut self, base: usize, error: ErrorNode) -> Node {
        self.recover(base);
        Node::Error(error)
    }

    // Expansions

    fn parse_passthrough(&mut self) -> PResult<Passthrough> {
        let open = self.next();
        let is_macro = matches!(open.kind, TokenKind::PassthroughStart { is_macro: true });
        let args = self.parse_expr_list(&TokenKind::RParen)?;
        let close = self.expect(&TokenKind::RParen)?;
        Ok(Passthrough {
            is_macro,
            args,
            source_info: self.info(open.start, close.end),
        })
    }

    fn parse_statement(&mut self) -> PResult<Statement> {
        let sigil = self.next();
        let is_macro = matches!(sigil.kind, TokenKind::StatementStart { is_macro: true });
        let chain = self.parse_chain(sigil.start)?;
        self.expect(&TokenKind::StatementEnd)?;
        Ok(Statement { is_macro, chain })
    }

    /// An identifier followed by `.name`, `[args]` and `(args)` segments.
    fn parse_chain(&mut self, start: usize) -> PResult<Chain> {
        let token = self.peek().clone();
        let TokenKind::Ident(root) = token.kind else {
            return Err(self.unexpected(&token, "a variable name"));
        };
        self.next();
        let mut end = token.end;
        let mut segments = Vec::new();
        loop {
            let open = self.peek().clone();
            match open.kind {
                TokenKind::Dot => {
                    self.next();
                    let name = self.peek().clone();
                    let TokenKind::Ident(ident) = name.kind else {
                        return Err(self.unexpected(&name, "a member name"));
                    };
                    self.next();
                    end = name.end;
                    segments.push(Segment::Prop {
                        name: ident,
                        source_info: self.info(open.start, end),
                    });
                }
                TokenKind::LBracket => {
                    self.next();
                    let args = self.parse_expr_list(&TokenKind::RBracket)?;
                    end = self.expect(&TokenKind::RBracket)?.end;
                    segments.push(Segment::Indexer {
                        args,
                        source_info: self.info(open.start, end),
                    });
                }
                TokenKind::LParen => {
                    self.next();
                    let args = self.parse_expr_list(&TokenKind::RParen)?;
                    end = self.expect(&TokenKind::RParen)?.end;
                    segments.push(Segment::Invoke {
                        args,
                        source_info: self.info(open.start, end),
                    });
                }
                _ => break,
            }
        }
        Ok(Chain {
            root,
            segments,
            source_info: self.info(start, end),
        })
    }

    // Expressions

    fn parse_expr_list(&mut self, close: &TokenKind) -> PResult<Vec<Expr>> {
        let mut items = Vec::new();
        if self.at(close) {
            return Ok(items);
        }
        loop {
            items.push(self.parse_expr()?);
            if !self.eat(&TokenKind::Comma) {
                return Ok(items);
            }
        }
    }

    fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_binary(0)
    }

    fn parse_binary(&mut self, level: usize) -> PResult<Expr> {
        if level == UNARY_LEVEL {
            return self.parse_unary();
        }
        let mut lhs = self.parse_binary(level + 1)?;
        while let TokenKind::Binary(op) = self.peek().kind {
            if binary_level(op) != level {
                break;
            }
            self.next();
            let rhs = self.parse_binary(level + 1)?;
            let source_info = lhs.source_info().to(rhs.source_info());
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                source_info,
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let op = match self.peek().kind {
            TokenKind::Binary(BinaryOp::Add) => UnaryOp::Plus,
            TokenKind::Binary(BinaryOp::Sub) => UnaryOp::Minus,
            TokenKind::Not => UnaryOp::Not,
            _ => return self.parse_primary(),
        };
        let token = self.next();
        let operand = self.parse_unary()?;
        let source_info = self.info(token.start, operand.source_info().end_offset());
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
            source_info,
        })
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let token = self.peek().clone();
        let constant = |value: Constant, parser: &mut Self| -> PResult<Expr> {
            parser.next();
            Ok(Expr::Constant {
                value,
                source_info: parser.info(token.start, token.end),
            })
        };
        match &token.kind {
            TokenKind::Number { text, suffix } => match number_constant(text, *suffix) {
                Ok(value) => constant(value, self),
                Err((code, message)) => Err(self.error(code, message, token.start, token.end)),
            },
            TokenKind::Str(s) => constant(Constant::String(s.clone()), self),
            TokenKind::True => constant(Constant::Boolean(true), self),
            TokenKind::False => constant(Constant::Boolean(false), self),
            TokenKind::Null => constant(Constant::Null, self),
            TokenKind::LParen => {
                self.next();
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                self.next();
                let items = self.parse_expr_list(&TokenKind::RBracket)?;
                let close = self.expect(&TokenKind::RBracket)?;
                Ok(Expr::List {
                    items,
                    source_info: self.info(token.start, close.end),
                })
            }
            TokenKind::DynamicStringStart => self.parse_dynamic_string(),
            TokenKind::PassthroughStart { .. } => self.parse_passthrough().map(Expr::Passthrough),
            TokenKind::MacroSigil => {
                self.next();
                self.parse_chain(token.start).map(Expr::Macro)
            }
            TokenKind::Ident(_) => self.parse_chain(token.start).map(Expr::Chain),
            _ => Err(self.unexpected(&token, "an expression")),
        }
    }

    fn parse_dynamic_string(&mut self) -> PResult<Expr> {
        let open = self.next();
        let mut parts = Vec::new();
        loop {
            let token = self.peek().clone();
            match token.kind {
                TokenKind::DynamicStringEnd => {
                    self.next();
                    return Ok(Expr::DynamicString {
                        parts,
                        source_info: self.info(open.start, token.end),
                    });
                }
                TokenKind::Text(text) => {
                    self.next();
                    parts.push(Node::Text(text));
                }
                TokenKind::PassthroughStart { .. } => {
                    parts.push(Node::Passthrough(self.parse_passthrough()?));
                }
                TokenKind::StatementStart { .. } => {
                    parts.push(Node::Statement(self.parse_statement()?));
                }
                _ => return Err(self.unexpected(&token, "`\"`")),
            }
        }
    }

    // Directives

    /// `(` args `)` of a directive. On failure the argument list is skipped.
    fn arguments<T>(
        &mut self,
        directive: &Token,
        base: usize,
        parse: impl FnOnce(&mut Self) -> PResult<T>,
    ) -> PResult<(T, usize)> {
        let result = self.arguments_inner(directive, parse);
        if result.is_err() {
            self.recover(base);
        }
        result
    }

    fn arguments_inner<T>(
        &mut self,
        directive: &Token,
        parse: impl FnOnce(&mut Self) -> PResult<T>,
    ) -> PResult<(T, usize)> {
        if !self.at(&TokenKind::LParen) {
            let message = format!("expected `(` after {}", directive.kind);
            return Err(self.error("P001", message, directive.start, directive.end));
        }
        self.next();
        let value = parse(self)?;
        let close = self.expect(&TokenKind::RParen)?;
        Ok((value, close.end))
    }

    fn parse_directive(&mut self, directive: Directive, token: Token, base: usize) -> Option<Node> {
        let node = match directive {
            Directive::If => self.parse_conditional(&token, base),
            Directive::Foreach => self.parse_foreach(&token, base),
            Directive::Loop => self.parse_range_loop(&token, base),
            Directive::Set => self.parse_set(&token, base),
            Directive::Parse | Directive::Include => {
                let names = self.arguments(&token, base, |p| p.parse_expr_list(&TokenKind::RParen));
                match names {
                    Ok((names, end)) => {
                        let inclusion = Inclusion {
                            names,
                            source_info: self.info(token.start, end),
                        };
                        if directive == Directive::Parse {
                            Node::Parse(inclusion)
                        } else {
                            Node::Include(inclusion)
                        }
                    }
                    Err(error) => Node::Error(error),
                }
            }
            Directive::Assert => {
                let args = self.arguments(&token, base, |p| {
                    let condition = p.parse_expr()?;
                    p.expect(&TokenKind::Comma)?;
                    let message = p.parse_expr()?;
                    Ok((condition, message))
                });
                match args {
                    Ok(((condition, message), end)) => Node::Assert(Assertion {
                        condition,
                        message,
                        source_info: self.info(token.start, end),
                    }),
                    Err(error) => Node::Error(error),
                }
            }
            Directive::Pragma => return self.parse_pragma(&token, base),
            Directive::Break | Directive::Continue | Directive::Stop => {
                let kind = match directive {
                    Directive::Break => JumpKind::Break,
                    Directive::Continue => JumpKind::Continue,
                    _ => JumpKind::Stop,
                };
                Node::Jump(Jump {
                    kind,
                    source_info: self.info(token.start, token.end),
                })
            }
            Directive::End | Directive::Else | Directive::ElseIf | Directive::Section(_) => {
                // parse_block reports these before they get here
                let error = self.error(
                    "P004",
                    format!("`#{}` is not allowed here", directive.name()),
                    token.start,
                    token.end,
                );
                Node::Error(error)
            }
        };
        Some(node)
    }

    fn unterminated(&mut self, token: &Token) -> ErrorNode {
        let message = format!("{} is missing its `#end`", token.kind);
        self.error("P003", message, token.start, token.end)
    }

    fn parse_conditional(&mut self, token: &Token, base: usize) -> Node {
        let mut failure = None;
        let mut branches = Vec::new();

        let condition = self.arguments(token, base, Self::parse_expr);
        let body = self.parse_block(closes_if_branch);
        match condition {
            Ok((condition, _)) => branches.push((condition, body)),
            Err(error) => failure = Some(error),
        }

        let mut else_branch = None;
        let end = loop {
            let next = self.peek().clone();
            match next.kind {
                TokenKind::Directive(Directive::ElseIf) => {
                    let base = self.last_depth;
                    self.next();
                    let condition = self.arguments(&next, base, Self::parse_expr);
                    let body = self.parse_block(closes_if_branch);
                    match condition {
                        Ok((condition, _)) => branches.push((condition, body)),
                        Err(error) => {
                            failure.get_or_insert(error);
                        }
                    }
                }
                TokenKind::Directive(Directive::Else) => {
                    self.next();
                    else_branch = Some(self.parse_block(closes_else_branch));
                }
                TokenKind::Directive(Directive::End) => break self.next().end,
                _ => {
                    let error = self.unterminated(token);
                    return Node::Error(failure.unwrap_or(error));
                }
            }
        };

        if let Some(error) = failure {
            return Node::Error(error);
        }
        Node::Conditional(Conditional {
            branches,
            else_branch,
            source_info: self.info(token.start, end),
        })
    }

    /// Default body, named sections and the closing `#end`.
    fn parse_loop_blocks(&mut self, token: &Token) -> PResult<(LoopBlocks, usize)> {
        let mut blocks = LoopBlocks {
            body: self.parse_block(closes_loop_block),
            ..LoopBlocks::default()
        };
        loop {
            let next = self.peek().clone();
            match next.kind {
                TokenKind::Directive(Directive::Section(section)) => {
                    self.next();
                    let nodes = self.parse_block(closes_loop_block);
                    blocks.extend_section(section, nodes);
                }
                TokenKind::Directive(Directive::End) => {
                    self.next();
                    return Ok((blocks, next.end));
                }
                _ => return Err(self.unterminated(token)),
            }
        }
    }

    fn parse_target(&mut self) -> PResult<Chain> {
        let start = self.peek().start;
        self.parse_chain(start)
    }

    fn parse_foreach(&mut self, token: &Token, base: usize) -> Node {
        let header = self.arguments(token, base, |p| {
            let target = p.parse_target()?;
            p.expect(&TokenKind::In)?;
            let iterable = p.parse_expr()?;
            Ok((target, iterable))
        });
        let blocks = self.parse_loop_blocks(token);
        match (header, blocks) {
            (Ok(((target, iterable), _)), Ok((blocks, end))) => Node::Foreach(ForeachLoop {
                target,
                iterable,
                blocks,
                source_info: self.info(token.start, end),
            }),
            (Err(error), _) | (_, Err(error)) => Node::Error(error),
        }
    }

    fn parse_range_loop(&mut self, token: &Token, base: usize) -> Node {
        let header = self.arguments(token, base, |p| {
            let lower = p.parse_expr()?;
            p.expect(&TokenKind::Comma)?;
            let upper = p.parse_expr()?;
            p.expect(&TokenKind::Comma)?;
            let target = p.parse_target()?;
            let step = if p.eat(&TokenKind::Comma) {
                Some(p.parse_expr()?)
            } else {
                None
            };
            Ok((lower, upper, target, step))
        });
        let blocks = self.parse_loop_blocks(token);
        match (header, blocks) {
            (Ok(((lower, upper, target, step), _)), Ok((blocks, end))) => {
                Node::RangeLoop(RangeLoop {
                    lower,
                    upper,
                    target,
                    step,
                    blocks,
                    source_info: self.info(token.start, end),
                })
            }
            (Err(error), _) | (_, Err(error)) => Node::Error(error),
        }
    }

    fn parse_assignment(&mut self) -> PResult<(Chain, Expr)> {
        let target = self.parse_target()?;
        self.expect(&TokenKind::Assign)?;
        let value = self.parse_expr()?;
        Ok((target, value))
    }

    fn parse_set(&mut self, token: &Token, base: usize) -> Node {
        let parsed = if self.at(&TokenKind::LParen) {
            self.arguments(token, base, Self::parse_assignment)
        } else {
            let free = self.parse_assignment().and_then(|assignment| {
                let end = self.expect(&TokenKind::EndOfLine)?.start;
                Ok((assignment, end))
            });
            if free.is_err() {
                self.recover(base);
            }
            free
        };
        match parsed {
            Ok(((target, value), end)) => Node::Assignment(Assignment {
                target,
                value,
                source_info: self.info(token.start, end),
            }),
            Err(error) => Node::Error(error),
        }
    }

    /// `#pragma(trim, greedy)`. Takes effect for the text right after the
    /// closing parenthesis.
    fn parse_pragma(&mut self, token: &Token, base: usize) -> Option<Node> {
        let args = self.arguments(token, base, |p| {
            let name = p.expect_word()?;
            p.expect(&TokenKind::Comma)?;
            let value = p.expect_word()?;
            Ok((name, value))
        });
        let ((name, value), end) = match args {
            Ok(args) => args,
            Err(error) => return Some(Node::Error(error)),
        };
        let trim = (name == "trim").then(|| value.parse::<TrimMode>().ok()).flatten();
        match trim {
            Some(trim) => {
                self.tokens.set_trim(trim);
                None
            }
            None => {
                let error = self.error(
                    "P005",
                    format!("unknown pragma `{name}` with value `{value}`"),
                    token.start,
                    end,
                );
                Some(Node::Error(error))
            }
        }
    }

    /// An identifier or plain string.
    fn expect_word(&mut self) -> PResult<String> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Ident(word) | TokenKind::Str(word) => {
                self.next();
                Ok(word)
            }
            _ => Err(self.unexpected(&token, "a name")),
        }
    }
}

/// Convert a numeric literal, honoring its suffix. Errors carry a code.
fn number_constant(
    text: &str,
    suffix: Option<NumberSuffix>,
) -> Result<Constant, (&'static str, String)> {
    let fractional = text.contains(['.', 'e', 'E']);
    let out_of_range = || ("C101", format!("numeric literal `{text}` is out of range"));
    let invalid = || ("C102", format!("invalid numeric literal `{text}`"));
    let double = || match text.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(Constant::Double(n)),
        _ => Err(out_of_range()),
    };

    match suffix {
        None if fractional => double(),
        None => {
            let n = text.parse::<u64>().map_err(|_| out_of_range())?;
            Ok(if let Ok(small) = i32::try_from(n) {
                Constant::Int32(small)
            } else if let Ok(wide) = i64::try_from(n) {
                Constant::Int64(wide)
            } else {
                Constant::UInt64(n)
            })
        }
        Some(NumberSuffix::Long) if fractional => Err(invalid()),
        Some(NumberSuffix::Long) => text
            .parse::<i64>()
            .map(Constant::Int64)
            .map_err(|_| out_of_range()),
        Some(NumberSuffix::UnsignedLong) if fractional => Err(invalid()),
        Some(NumberSuffix::UnsignedLong) => text
            .parse::<u64>()
            .map(Constant::UInt64)
            .map_err(|_| out_of_range()),
        Some(NumberSuffix::Double) => double(),
        Some(NumberSuffix::Decimal) => {
            let parsed = if text.contains(['e', 'E']) {
                Decimal::from_scientific(text)
            } else {
                Decimal::from_str(text)
            };
            parsed.map(Constant::Decimal).map_err(|_| out_of_range())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Vec<Node> {
        Template::compile(source).nodes
    }

    fn codes(source: &str) -> Vec<String> {
        Template::compile(source)
            .diagnostics
            .iter()
            .filter_map(|d| d.code.clone())
            .collect()
    }

    #[test]
    fn test_parse_text_and_statement() {
        let nodes = parse("Hello $user.name!");
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0], Node::Text("Hello ".to_string()));
        let Node::Statement(statement) = &nodes[1] else {
            panic!("expected statement, got {:?}", nodes[1]);
        };
        assert!(!statement.is_macro);
        assert_eq!(statement.chain.root, "user");
        assert!(matches!(
            &statement.chain.segments[..],
            [Segment::Prop { name, .. }] if name == "name"
        ));
        assert_eq!(nodes[2], Node::Text("!".to_string()));
    }

    #[test]
    fn test_parse_precedence() {
        let nodes = parse("$(1 + 2 * 3 == 7 || false)");
        let Node::Passthrough(p) = &nodes[0] else {
            panic!("expected passthrough");
        };
        let Expr::Binary { op, lhs, .. } = &p.args[0] else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Or);
        let Expr::Binary { op, lhs, .. } = lhs.as_ref() else {
            panic!("expected equality");
        };
        assert_eq!(*op, BinaryOp::Eq);
        let Expr::Binary { op, rhs, .. } = lhs.as_ref() else {
            panic!("expected addition");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(rhs.as_ref(), Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_parse_loop_sections() {
        let nodes = parse("#foreach(x in xs)$(x)#between, #nodata(none)#end");
        let Node::Foreach(l) = &nodes[0] else {
            panic!("expected foreach, got {:?}", nodes[0]);
        };
        assert_eq!(l.target.root, "x");
        assert_eq!(l.blocks.body.len(), 1);
        assert_eq!(
            l.blocks.between.as_deref(),
            Some(&[Node::Text(", ".to_string())][..])
        );
        assert_eq!(
            l.blocks.no_data.as_deref(),
            Some(&[Node::Text("(none)".to_string())][..])
        );
    }

    #[test]
    fn test_parse_range_loop_with_step() {
        let nodes = parse("#loop(1, 10, i, 2)$i#end");
        let Node::RangeLoop(l) = &nodes[0] else {
            panic!("expected range loop");
        };
        assert_eq!(l.target.root, "i");
        assert!(l.step.is_some());
    }

    #[test]
    fn test_parse_conditional_branches() {
        let nodes = parse("#if(a)A#elseif(b)B#else\nC#end");
        let Node::Conditional(c) = &nodes[0] else {
            panic!("expected conditional");
        };
        assert_eq!(c.branches.len(), 2);
        assert_eq!(c.else_branch, Some(vec![Node::Text("C".to_string())]));
    }

    #[test]
    fn test_parse_set_forms() {
        let formal = parse("#set(a.b = 1)");
        let free = parse("#set a.b = 1\n");
        for nodes in [formal, free] {
            let Node::Assignment(a) = &nodes[0] else {
                panic!("expected assignment, got {nodes:?}");
            };
            assert_eq!(a.target.root, "a");
            assert_eq!(a.target.segments.len(), 1);
        }
    }

    #[test]
    fn test_number_literals() {
        assert_eq!(number_constant("42", None), Ok(Constant::Int32(42)));
        assert_eq!(number_constant("3000000000", None), Ok(Constant::Int64(3_000_000_000)));
        assert_eq!(
            number_constant("18446744073709551615", None),
            Ok(Constant::UInt64(u64::MAX))
        );
        assert_eq!(number_constant("2.5", None), Ok(Constant::Double(2.5)));
        assert_eq!(number_constant("1", Some(NumberSuffix::Long)), Ok(Constant::Int64(1)));
        assert_eq!(
            number_constant("1.25", Some(NumberSuffix::Decimal)),
            Ok(Constant::Decimal(Decimal::new(125, 2)))
        );
        assert_eq!(number_constant("99999999999999999999", None).map_err(|e| e.0), Err("C101"));
        assert_eq!(number_constant("1.5", Some(NumberSuffix::Long)).map_err(|e| e.0), Err("C102"));
    }

    #[test]
    fn test_malformed_passthrough_recovers() {
        let template = Template::compile("a $(1 +) b");
        assert_eq!(template.nodes.len(), 3);
        assert!(matches!(&template.nodes[1], Node::Error(e) if e.code == "P001"));
        assert_eq!(template.nodes[2], Node::Text(" b".to_string()));
    }

    #[test]
    fn test_parse_error_codes() {
        assert_eq!(codes("#end"), vec!["P004"]);
        assert_eq!(codes("#if(true) never closed"), vec!["P003"]);
        assert_eq!(codes("#frobnicate"), vec!["P002"]);
        assert_eq!(codes("$(10x)"), vec!["C102"]);
        assert_eq!(codes("#pragma(colour, blue)"), vec!["P005"]);
        assert!(codes("#pragma(trim, greedy)").is_empty());
    }

    #[test]
    fn test_bad_condition_keeps_body_balanced() {
        let template = Template::compile("#if(+)x#end after");
        assert_eq!(template.nodes.len(), 2);
        assert!(matches!(template.nodes[0], Node::Error(_)));
        assert_eq!(template.nodes[1], Node::Text(" after".to_string()));
    }

    #[test]
    fn test_diagnostic_location() {
        let template = Template::compile("line one\n  #bogus");
        let diagnostic = &template.parse_diagnostics()[0];
        let location = diagnostic.location.expect("location");
        assert_eq!(location.range.start.row, 1);
        assert_eq!(location.range.start.column, 2);
    }
}
