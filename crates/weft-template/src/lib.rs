/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The weft text-templating engine.
//!
//! Templates mix literal text with constructs:
//!
//! - Passthroughs: `$(a, b)` concatenates its arguments, `@(src)` evaluates
//!   its argument as template source (a macro)
//! - Statements: `$user.name`, `$items[0]`, `$name.upper()`, `@snippet`
//! - Directives: `#if/#elseif/#else/#end`, `#foreach(x in xs)`,
//!   `#loop(1, 10, i, 2)` with the `#beforeall #before #each #between #odd
//!   #even #after #afterall #nodata` sub-blocks, `#set`, `#parse`,
//!   `#include`, `#assert`, `#pragma`, `#break`, `#continue`, `#stop`
//! - Strings: `'plain'` and `"dynamic $(interpolated)"`
//! - Comments: `## line` and nested `#* block *#`; `#[ raw ]#` is unparsed
//!
//! # Architecture
//!
//! Source text is tokenized by a mode/construct-stack automaton
//! ([`lexer`]), parsed into an AST ([`ast`], [`parser`]) that keeps malformed
//! constructs as error nodes, and evaluated by a tree-walking interpreter
//! ([`evaluator`]) against a [`StateTable`] of [`Value`]s. Evaluation never
//! fails with a Rust error: problems are collected in an [`ErrorList`] of
//! coded diagnostics and the offending construct renders as empty text.
//!
//! # Example
//!
//! ```
//! use weft_template::{StateTable, Template, Value};
//!
//! let template = Template::compile("#foreach(n in names)<$n>#end!");
//!
//! let mut state = StateTable::new();
//! state.insert("names", Value::list([Value::string("Ada"), Value::string("Grace")]));
//!
//! let result = template.evaluate(&mut state);
//! assert_eq!(result.output, "<Ada><Grace>!");
//! assert!(result.errors.is_empty());
//! ```

pub mod ast;
pub mod cache;
pub mod error;
pub mod eval_context;
pub mod evaluator;
pub mod host;
pub mod lexer;
pub mod members;
pub mod options;
pub mod parser;
pub mod resolver;
pub mod state;
pub mod value;

// Re-export main types at crate root
pub use ast::{Chain, Expr, LoopSection, Node, Segment};
pub use cache::TemplateCache;
pub use error::{TemplateError, TemplateResult};
pub use eval_context::{ErrorList, EvalContext};
pub use evaluator::Evaluation;
pub use host::{Callable, HostError, HostObject, NativeFunction};
pub use lexer::{Token, TokenKind, tokenize};
pub use options::{CompileOptions, EvalOptions, TrimMode, WeftConfig};
pub use parser::Template;
pub use resolver::{FileSystemResolver, MemoryResolver, NullResolver, TemplateLoader, TemplateResolver};
pub use state::StateTable;
pub use value::{BinaryOp, UnaryOp, Value, ValueError, ValueKind};
