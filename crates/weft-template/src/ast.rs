/*
 * ast.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template AST types.
//!
//! This module defines the abstract syntax tree for parsed templates.
//! Each node includes source location information for error reporting.
//! Malformed constructs are kept in the tree as [`ErrorNode`]s; the
//! evaluator reports them without looking inside.

use crate::value::{BinaryOp, UnaryOp, Value};
use rust_decimal::Decimal;
use weft_source_map::SourceInfo;

/// A node of a section (a run of template output).
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text to be output as-is.
    Text(String),

    /// `$(a, b)` or `@(a, b)`
    Passthrough(Passthrough),

    /// `$name.prop[0].method()` or `@name`
    Statement(Statement),

    /// `#if(c) ... #elseif(d) ... #else ... #end`
    Conditional(Conditional),

    /// `#foreach(x in xs) ... #end`
    Foreach(ForeachLoop),

    /// `#loop(1, 10, i, 2) ... #end`
    RangeLoop(RangeLoop),

    /// `#set(x = 1)` or `#set x = 1`
    Assignment(Assignment),

    /// `#parse(names...)`
    Parse(Inclusion),

    /// `#include(names...)`
    Include(Inclusion),

    /// `#assert(cond, message)`
    Assert(Assertion),

    /// `#break`, `#continue` or `#stop`
    Jump(Jump),

    /// Parse-error placeholder.
    Error(ErrorNode),
}

/// Argument concatenation: `$(a, b)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Passthrough {
    /// `@(...)`: the concatenated text is evaluated as a template.
    pub is_macro: bool,
    pub args: Vec<Expr>,
    pub source_info: SourceInfo,
}

/// A chain used as output: `$user.name`.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub is_macro: bool,
    pub chain: Chain,
}

/// A root name followed by member accesses.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub root: String,
    pub segments: Vec<Segment>,
    pub source_info: SourceInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// `.name`; a method call when followed by [`Segment::Invoke`].
    Prop { name: String, source_info: SourceInfo },
    /// `[args]`
    Indexer { args: Vec<Expr>, source_info: SourceInfo },
    /// `(args)`
    Invoke { args: Vec<Expr>, source_info: SourceInfo },
}

impl Segment {
    pub fn source_info(&self) -> &SourceInfo {
        match self {
            Segment::Prop { source_info, .. }
            | Segment::Indexer { source_info, .. }
            | Segment::Invoke { source_info, .. } => source_info,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    /// `(condition, body)` for `#if` and every `#elseif`.
    pub branches: Vec<(Expr, Vec<Node>)>,
    pub else_branch: Option<Vec<Node>>,
    pub source_info: SourceInfo,
}

/// Named sub-block of a loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopSection {
    BeforeAll,
    Before,
    Each,
    Between,
    Odd,
    Even,
    After,
    AfterAll,
    NoData,
}

impl LoopSection {
    pub fn name(self) -> &'static str {
        match self {
            LoopSection::BeforeAll => "beforeall",
            LoopSection::Before => "before",
            LoopSection::Each => "each",
            LoopSection::Between => "between",
            LoopSection::Odd => "odd",
            LoopSection::Even => "even",
            LoopSection::After => "after",
            LoopSection::AfterAll => "afterall",
            LoopSection::NoData => "nodata",
        }
    }
}

/// Default body plus the optional named sub-blocks of a loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopBlocks {
    pub body: Vec<Node>,
    pub before_all: Option<Vec<Node>>,
    pub before: Option<Vec<Node>>,
    pub each: Option<Vec<Node>>,
    pub between: Option<Vec<Node>>,
    pub odd: Option<Vec<Node>>,
    pub even: Option<Vec<Node>>,
    pub after: Option<Vec<Node>>,
    pub after_all: Option<Vec<Node>>,
    pub no_data: Option<Vec<Node>>,
}

impl LoopBlocks {
    pub fn section(&self, section: LoopSection) -> Option<&[Node]> {
        let block = match section {
            LoopSection::BeforeAll => &self.before_all,
            LoopSection::Before => &self.before,
            LoopSection::Each => &self.each,
            LoopSection::Between => &self.between,
            LoopSection::Odd => &self.odd,
            LoopSection::Even => &self.even,
            LoopSection::After => &self.after,
            LoopSection::AfterAll => &self.after_all,
            LoopSection::NoData => &self.no_data,
        };
        block.as_deref()
    }

    /// Append nodes to a sub-block; a repeated `#each` continues the
    /// earlier one.
    pub fn extend_section(&mut self, section: LoopSection, nodes: Vec<Node>) {
        let block = match section {
            LoopSection::BeforeAll => &mut self.before_all,
            LoopSection::Before => &mut self.before,
            LoopSection::Each => &mut self.each,
            LoopSection::Between => &mut self.between,
            LoopSection::Odd => &mut self.odd,
            LoopSection::Even => &mut self.even,
            LoopSection::After => &mut self.after,
            LoopSection::AfterAll => &mut self.after_all,
            LoopSection::NoData => &mut self.no_data,
        };
        block.get_or_insert_with(Vec::new).extend(nodes);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeachLoop {
    pub target: Chain,
    pub iterable: Expr,
    pub blocks: LoopBlocks,
    pub source_info: SourceInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeLoop {
    pub lower: Expr,
    pub upper: Expr,
    pub target: Chain,
    pub step: Option<Expr>,
    pub blocks: LoopBlocks,
    pub source_info: SourceInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub target: Chain,
    pub value: Expr,
    pub source_info: SourceInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inclusion {
    pub names: Vec<Expr>,
    pub source_info: SourceInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assertion {
    pub condition: Expr,
    pub message: Expr,
    pub source_info: SourceInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JumpKind {
    Break,
    Continue,
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Jump {
    pub kind: JumpKind,
    pub source_info: SourceInfo,
}

/// Placeholder for a construct that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNode {
    pub code: &'static str,
    pub message: String,
    pub source_info: SourceInfo,
}

/// A literal constant. Kept apart from [`Value`] so compiled templates can be
/// shared between threads.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    Decimal(Decimal),
    String(String),
}

impl Constant {
    pub fn to_value(&self) -> Value {
        match self {
            Constant::Null => Value::Null,
            Constant::Boolean(b) => Value::Boolean(*b),
            Constant::Int32(n) => Value::Int32(*n),
            Constant::Int64(n) => Value::Int64(*n),
            Constant::UInt64(n) => Value::UInt64(*n),
            Constant::Double(n) => Value::Double(*n),
            Constant::Decimal(n) => Value::Decimal(*n),
            Constant::String(s) => Value::String(s.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant {
        value: Constant,
        source_info: SourceInfo,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        source_info: SourceInfo,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        source_info: SourceInfo,
    },
    /// A chain read: `user.name` (the `$` is optional inside expressions).
    Chain(Chain),
    /// `@name`: the chain's value is evaluated as a template.
    Macro(Chain),
    Passthrough(Passthrough),
    /// `"text $(expr) $name"`; parts are Text, Passthrough and Statement nodes.
    DynamicString {
        parts: Vec<Node>,
        source_info: SourceInfo,
    },
    /// `[a, b]`
    List {
        items: Vec<Expr>,
        source_info: SourceInfo,
    },
    Error(ErrorNode),
}

impl Expr {
    pub fn source_info(&self) -> &SourceInfo {
        match self {
            Expr::Constant { source_info, .. }
            | Expr::Binary { source_info, .. }
            | Expr::Unary { source_info, .. }
            | Expr::DynamicString { source_info, .. }
            | Expr::List { source_info, .. } => source_info,
            Expr::Chain(chain) | Expr::Macro(chain) => &chain.source_info,
            Expr::Passthrough(p) => &p.source_info,
            Expr::Error(e) => &e.source_info,
        }
    }
}
