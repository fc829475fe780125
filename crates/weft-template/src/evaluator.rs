/*
 * evaluator.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template evaluation engine.
//!
//! A tree-walking interpreter over the parsed AST. Every node renders into
//! its own buffer; when a node fails (an error diagnostic was recorded) its
//! partial output is dropped and evaluation continues with the next sibling.
//! Jumps (`#break`, `#continue`, `#stop`) are signalled through
//! [`EvalContext::pending_jump`]: each section stops at the first node that
//! sets it, and the enclosing loop (or the document root) consumes it.

mod chain;
mod expression;
mod loops;

use crate::ast::{
    Assertion, Conditional, ErrorNode, Expr, Inclusion, Jump, JumpKind, Node, Passthrough,
};
use crate::error::TemplateError;
use crate::eval_context::{ErrorList, Eval, EvalContext, Failed};
use crate::options::EvalOptions;
use crate::parser::Template;
use crate::resolver::{NullResolver, TemplateLoader};
use crate::state::StateTable;
use crate::value::Value;
use tracing::trace;
use weft_source_map::SourceInfo;

pub(crate) use chain::{assign, read_chain};
pub(crate) use expression::eval_expr;

/// Output and diagnostics of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub output: String,
    pub errors: ErrorList,
}

impl Evaluation {
    /// `true` when no error (warnings allowed) was recorded.
    pub fn is_ok(&self) -> bool {
        !self.errors.contains_error()
    }
}

impl Template {
    /// Evaluate against `state` with default options and no template loader.
    ///
    /// `#parse` and `#include` report `E106` in this mode.
    pub fn evaluate(&self, state: &mut StateTable) -> Evaluation {
        self.evaluate_with(state, &NullResolver, EvalOptions::default())
    }

    /// Evaluate against `state`, loading `#parse`/`#include` targets from
    /// `loader`.
    pub fn evaluate_with(
        &self,
        state: &mut StateTable,
        loader: &dyn TemplateLoader,
        options: EvalOptions,
    ) -> Evaluation {
        let mut ctx = EvalContext::new(state, loader, options);
        let output = render_section(&self.nodes, &mut ctx);
        Evaluation {
            output,
            errors: ctx.into_errors(),
        }
    }

    /// Evaluate and return only the output.
    pub fn render(&self, state: &mut StateTable) -> String {
        self.evaluate(state).output
    }
}

pub(crate) fn render_section(nodes: &[Node], ctx: &mut EvalContext<'_>) -> String {
    let mut out = String::new();
    render_into(nodes, ctx, &mut out);
    out
}

/// Render nodes in order until one of them sets a pending jump.
pub(crate) fn render_into(nodes: &[Node], ctx: &mut EvalContext<'_>, out: &mut String) {
    for node in nodes {
        if ctx.pending_jump.is_some() {
            break;
        }
        let mut buffer = String::new();
        if render_node(node, ctx, &mut buffer).is_ok() {
            out.push_str(&buffer);
        }
    }
}

pub(crate) fn render_node(node: &Node, ctx: &mut EvalContext<'_>, out: &mut String) -> Eval<()> {
    match node {
        Node::Text(text) => out.push_str(text),
        Node::Passthrough(passthrough) => out.push_str(&render_passthrough(passthrough, ctx)?),
        Node::Statement(statement) => {
            let value = read_chain(&statement.chain, ctx)?;
            let location = &statement.chain.source_info;
            let text = if statement.is_macro {
                let source = macro_source(value, location, ctx)?;
                expand_macro(&source, location, ctx)?
            } else {
                to_text(&value, location, ctx)?
            };
            out.push_str(&text);
        }
        Node::Conditional(conditional) => render_conditional(conditional, ctx, out)?,
        Node::Foreach(foreach) => loops::render_foreach(foreach, ctx, out)?,
        Node::RangeLoop(range) => loops::render_range_loop(range, ctx, out)?,
        Node::Assignment(assignment) => {
            let value = eval_expr(&assignment.value, ctx)?;
            assign(&assignment.target, value, ctx)?;
        }
        Node::Parse(inclusion) => render_parse(inclusion, ctx, out)?,
        Node::Include(inclusion) => render_include(inclusion, ctx, out)?,
        Node::Assert(assertion) => render_assert(assertion, ctx, out)?,
        Node::Jump(jump) => signal_jump(jump, ctx)?,
        Node::Error(error) => return Err(report_parse_error(error, ctx)),
    }
    Ok(())
}

pub(crate) fn report_parse_error(error: &ErrorNode, ctx: &mut EvalContext<'_>) -> Failed {
    ctx.fail(error.code, error.message.clone(), &error.source_info)
}

/// Text conversion of a value for output.
pub(crate) fn to_text(value: &Value, location: &SourceInfo, ctx: &mut EvalContext<'_>) -> Eval<String> {
    value.try_to_text().map_err(|err| {
        ctx.fail(
            "TM005",
            format!("{} cannot be converted to text: {err}", value.type_name()),
            location,
        )
    })
}

/// `$(a, b)` concatenates; `@(a, b)` concatenates strings and expands the
/// result as a template.
pub(crate) fn render_passthrough(passthrough: &Passthrough, ctx: &mut EvalContext<'_>) -> Eval<String> {
    let mut text = String::new();
    for arg in &passthrough.args {
        let value = eval_expr(arg, ctx)?;
        if passthrough.is_macro {
            text.push_str(&macro_source(value, arg.source_info(), ctx)?);
        } else {
            text.push_str(&to_text(&value, arg.source_info(), ctx)?);
        }
    }
    if passthrough.is_macro {
        expand_macro(&text, &passthrough.source_info, ctx)
    } else {
        Ok(text)
    }
}

pub(crate) fn macro_source(value: Value, location: &SourceInfo, ctx: &mut EvalContext<'_>) -> Eval<String> {
    match value {
        Value::String(source) => Ok(source),
        other => Err(ctx.fail(
            "R903",
            format!("macros only accept strings, found {}", other.type_name()),
            location,
        )),
    }
}

/// Compile `source` and evaluate it against the shared state table.
pub(crate) fn expand_macro(source: &str, location: &SourceInfo, ctx: &mut EvalContext<'_>) -> Eval<String> {
    if !ctx.can_nest() {
        let limit = ctx.options.max_nesting_depth;
        return Err(ctx.fail(
            "R908",
            format!("macro expansion nested more than {limit} levels deep"),
            location,
        ));
    }
    let template = ctx.compiled_macro(source);
    trace!(depth = ctx.depth + 1, len = source.len(), "expanding macro");
    Ok(ctx.nested(|child| render_section(template.nodes(), child)))
}

fn condition(value: &Value, location: &SourceInfo, ctx: &mut EvalContext<'_>) -> Eval<bool> {
    value.try_to_bool().ok_or_else(|| {
        ctx.fail(
            "TM002",
            format!("expected a boolean, found {}", value.type_name()),
            location,
        )
    })
}

pub(crate) fn eval_condition(expr: &Expr, ctx: &mut EvalContext<'_>) -> Eval<bool> {
    let value = eval_expr(expr, ctx)?;
    condition(&value, expr.source_info(), ctx)
}

fn render_conditional(
    conditional: &Conditional,
    ctx: &mut EvalContext<'_>,
    out: &mut String,
) -> Eval<()> {
    for (test, body) in &conditional.branches {
        if eval_condition(test, ctx)? {
            render_into(body, ctx, out);
            return Ok(());
        }
    }
    if let Some(body) = &conditional.else_branch {
        render_into(body, ctx, out);
    }
    Ok(())
}

/// Evaluate a template name argument.
fn template_name(expr: &Expr, ctx: &mut EvalContext<'_>) -> Eval<String> {
    let value = eval_expr(expr, ctx)?;
    to_text(&value, expr.source_info(), ctx)
}

fn render_parse(inclusion: &Inclusion, ctx: &mut EvalContext<'_>, out: &mut String) -> Eval<()> {
    for expr in &inclusion.names {
        let name = template_name(expr, ctx)?;
        if !ctx.can_nest() {
            let limit = ctx.options.max_nesting_depth;
            return Err(ctx.fail(
                "R908",
                format!("`#parse(\"{name}\")` nested more than {limit} levels deep"),
                &inclusion.source_info,
            ));
        }
        let template = match ctx.loader.get_compiled(&name) {
            Ok(template) => template,
            Err(TemplateError::TemplateNotFound { .. }) => {
                return Err(ctx.fail(
                    "E106",
                    format!("template `{name}` was not found"),
                    expr.source_info(),
                ));
            }
            Err(err) => {
                return Err(ctx.fail(
                    "R901",
                    format!("template `{name}` could not be loaded: {err}"),
                    expr.source_info(),
                ));
            }
        };
        trace!(template = %name, depth = ctx.depth + 1, "parsing nested template");
        let text = ctx.nested(|child| render_section(template.nodes(), child));
        out.push_str(&text);
        if ctx.pending_jump.is_some() {
            break;
        }
    }
    Ok(())
}

fn render_include(inclusion: &Inclusion, ctx: &mut EvalContext<'_>, out: &mut String) -> Eval<()> {
    for expr in &inclusion.names {
        let name = template_name(expr, ctx)?;
        match ctx.loader.resolve(&name) {
            Some(source) => out.push_str(&source),
            None => {
                return Err(ctx.fail(
                    "E106",
                    format!("template `{name}` was not found"),
                    expr.source_info(),
                ));
            }
        }
    }
    Ok(())
}

/// Emits the message unless the condition is `false`.
fn render_assert(assertion: &Assertion, ctx: &mut EvalContext<'_>, out: &mut String) -> Eval<()> {
    let value = eval_expr(&assertion.condition, ctx)?;
    if value.try_to_bool() == Some(false) {
        return Ok(());
    }
    let message = eval_expr(&assertion.message, ctx)?;
    out.push_str(&to_text(&message, assertion.message.source_info(), ctx)?);
    Ok(())
}

fn signal_jump(jump: &Jump, ctx: &mut EvalContext<'_>) -> Eval<()> {
    let name = match jump.kind {
        JumpKind::Break => "#break",
        JumpKind::Continue => "#continue",
        JumpKind::Stop => {
            ctx.pending_jump = Some(JumpKind::Stop);
            return Ok(());
        }
    };
    if ctx.loop_depth == 0 {
        return Err(ctx.fail(
            "R902",
            format!("`{name}` is only valid inside `#foreach` or `#loop`"),
            &jump.source_info,
        ));
    }
    ctx.pending_jump = Some(jump.kind);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TemplateCache;
    use crate::host::NativeFunction;
    use crate::resolver::MemoryResolver;
    use pretty_assertions::assert_eq;

    fn eval(source: &str, state: &mut StateTable) -> Evaluation {
        Template::compile(source).evaluate(state)
    }

    fn render(source: &str) -> String {
        eval(source, &mut StateTable::new()).output
    }

    #[test]
    fn test_text_and_passthrough() {
        let mut state = StateTable::new();
        state.insert("name", "World");
        let result = eval("Hello, $(name)! $(1 + 2, '-', true)", &mut state);
        assert_eq!(result.output, "Hello, World! 3-true");
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_set_then_read() {
        assert_eq!(render("#set greeting = \"hi\"\n$(greeting)"), "hi");
        assert_eq!(render("#set(n = 2 * 21)$n"), "42");
    }

    #[test]
    fn test_missing_root_is_one_warning() {
        let result = eval("[$(missing.prop)]", &mut StateTable::new());
        assert_eq!(result.output, "[]");
        assert_eq!(result.errors.codes(), vec!["E101"]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_conditional_branches() {
        let source = "#if(n > 10)big#elseif(n > 5)medium#else\nsmall#end";
        for (n, expected) in [(20, "big"), (7, "medium"), (1, "small")] {
            let mut state = StateTable::new();
            state.insert("n", n);
            assert_eq!(eval(source, &mut state).output, expected);
        }
    }

    #[test]
    fn test_condition_must_be_boolean() {
        let result = eval("a#if(1)b#end c", &mut StateTable::new());
        assert_eq!(result.output, "a c");
        assert_eq!(result.errors.codes(), vec!["TM002"]);
    }

    #[test]
    fn test_failed_node_drops_only_its_output() {
        let result = eval("a $(1 / 0) b", &mut StateTable::new());
        assert_eq!(result.output, "a  b");
        assert_eq!(result.errors.codes(), vec!["R904"]);
    }

    #[test]
    fn test_break_outside_loop() {
        let result = eval("before #break after", &mut StateTable::new());
        assert_eq!(result.output, "before  after");
        assert_eq!(result.errors.codes(), vec!["R902"]);
    }

    #[test]
    fn test_stop_halts_document() {
        assert_eq!(render("a#if(true)b#stop c#end d"), "ab");
    }

    #[test]
    fn test_macro_statement_and_passthrough() {
        let mut state = StateTable::new();
        state.insert("x", 42);
        state.insert("macroSrc", "$(x)");
        assert_eq!(eval("@(macroSrc)", &mut state).output, "42");
        assert_eq!(eval("@macroSrc!", &mut state).output, "42!");
    }

    #[test]
    fn test_macro_requires_string() {
        let mut state = StateTable::new();
        state.insert("n", 5);
        let result = eval("@(n)", &mut state);
        assert_eq!(result.output, "");
        assert_eq!(result.errors.codes(), vec!["R903"]);
    }

    #[test]
    fn test_recursive_macro_is_bounded() {
        let mut state = StateTable::new();
        state.insert("m", "x@(m)");
        let template = Template::compile("@(m)");
        let options = EvalOptions::default().with_max_nesting_depth(4);
        let result = template.evaluate_with(&mut state, &NullResolver, options);
        assert_eq!(result.output, "xxxx");
        assert_eq!(result.errors.codes(), vec!["R908"]);
    }

    #[test]
    fn test_macro_shares_state() {
        let mut state = StateTable::new();
        state.insert("src", "#set(y = 'set inside')");
        let result = eval("@(src)$y", &mut state);
        assert_eq!(result.output, "set inside");
        assert_eq!(state.get("y"), Some(&Value::string("set inside")));
    }

    #[test]
    fn test_jumps_inside_macro_apply_to_enclosing_loop() {
        let mut state = StateTable::new();
        state.insert("names", Value::list(["ann", "bob", "cy"].map(Value::string)));
        state.insert("stop_at_bob", "#if(n == 'bob')#break#end");
        state.insert("skip_bob", "#if(n == 'bob')#continue#end");

        let result = eval("#foreach(n in names)$n@(stop_at_bob)#end", &mut state);
        assert_eq!(result.output, "annbob");
        assert!(result.errors.is_empty());

        let result = eval("#foreach(n in names)@(skip_bob)$n#end", &mut state);
        assert_eq!(result.output, "anncy");
        assert!(result.errors.is_empty());

        let result = eval("a@(stop_at_bob)", &mut state);
        assert_eq!(result.errors.codes(), vec!["E101"]);
        state.insert("n", "bob");
        let result = eval("a@(stop_at_bob)b", &mut state);
        assert_eq!(result.output, "ab");
        assert_eq!(result.errors.codes(), vec!["R902"]);
    }

    #[test]
    fn test_assert_semantics() {
        assert_eq!(render("[#assert(false, 'no')]"), "[]");
        assert_eq!(render("[#assert(true, 'yes')]"), "[yes]");
        assert_eq!(render("[#assert('other', 'kept')]"), "[kept]");
    }

    #[test]
    fn test_parse_and_include() {
        let resolver = MemoryResolver::with_templates([
            ("header", "<h1>$title</h1>"),
            ("raw", "$title stays"),
        ]);
        let cache = TemplateCache::new(resolver);
        let mut state = StateTable::new();
        state.insert("title", "Weft");

        let template = Template::compile("#parse('header')|#include('raw')|#parse('nope')");
        let result = template.evaluate_with(&mut state, &cache, EvalOptions::default());
        assert_eq!(result.output, "<h1>Weft</h1>|$title stays|");
        assert_eq!(result.errors.codes(), vec!["E106"]);
    }

    #[test]
    fn test_parse_without_loader() {
        let result = eval("#include('x')", &mut StateTable::new());
        assert_eq!(result.errors.codes(), vec!["E106"]);
    }

    #[test]
    fn test_parse_error_reported_at_evaluation() {
        let result = eval("ok $(1 +) ok", &mut StateTable::new());
        assert_eq!(result.output, "ok  ok");
        assert_eq!(result.errors.codes(), vec!["P001"]);
    }

    #[test]
    fn test_host_function_failure_is_runtime_error() {
        let mut state = StateTable::new();
        state.insert(
            "explode",
            NativeFunction::new("explode", |_| panic!("kaboom")).into_value(),
        );
        let result = eval("<$explode()>", &mut state);
        assert_eq!(result.output, "<>");
        assert_eq!(result.errors.codes(), vec!["R901"]);
        let problem = result.errors.as_slice()[0].problem.as_ref().map(|p| p.as_str().to_string());
        assert!(problem.is_some_and(|p| p.contains("kaboom")));
    }

    #[test]
    fn test_independent_evaluations() {
        let template = Template::compile("$x#set(x = x + 1)");
        let mut first = StateTable::new();
        first.insert("x", 1);
        let mut second = StateTable::new();
        second.insert("x", 10);
        assert_eq!(template.evaluate(&mut first).output, "1");
        assert_eq!(template.evaluate(&mut second).output, "10");
        assert_eq!(first.get("x"), Some(&Value::Int32(2)));
        assert_eq!(second.get("x"), Some(&Value::Int32(11)));
    }
}
