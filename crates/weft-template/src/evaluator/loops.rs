/*
 * evaluator/loops.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! `#foreach` and `#loop`.
//!
//! Per element, once the loop variable is bound, the blocks run in this
//! order: `each`, `before`, `even`/`odd` by zero-based position, the default
//! body, `after`, and `between` on every element but the first. `#continue`
//! skips the rest of that sequence, `between` included. `beforeall` and
//! `afterall` wrap the whole run; an empty sequence renders only `nodata`.

use super::{assign, eval_expr, render_into};
use crate::ast::{Chain, Expr, ForeachLoop, JumpKind, LoopBlocks, LoopSection, Node, RangeLoop};
use crate::eval_context::{Eval, EvalContext, Failed};
use crate::host::guard;
use crate::value::Value;
use tracing::trace;
use weft_source_map::SourceInfo;

/// What the loop does after a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Next,
    Continue,
    Break,
    Stop,
}

pub(crate) fn render_foreach(
    foreach: &ForeachLoop,
    ctx: &mut EvalContext<'_>,
    out: &mut String,
) -> Eval<()> {
    let iterable = eval_expr(&foreach.iterable, ctx)?;
    let items = enumerate(&iterable, foreach.iterable.source_info(), ctx)?;
    trace!(count = items.len(), "foreach");
    run_loop(&foreach.target, &foreach.blocks, items, ctx, out)?;
    Ok(())
}

pub(crate) fn render_range_loop(
    range: &RangeLoop,
    ctx: &mut EvalContext<'_>,
    out: &mut String,
) -> Eval<()> {
    let lower = eval_expr(&range.lower, ctx)?;
    let upper = eval_expr(&range.upper, ctx)?;
    let step = match &range.step {
        Some(step) => Some(eval_expr(step, ctx)?),
        None => None,
    };

    let narrow = [Some(&lower), Some(&upper), step.as_ref()]
        .into_iter()
        .flatten()
        .all(|v| matches!(v, Value::Int32(_)));
    let lower_n = bound(&lower, &range.lower, ctx)?;
    let upper_n = bound(&upper, &range.upper, ctx)?;
    let step_n = match (&step, &range.step) {
        (Some(value), Some(expr)) => bound(value, expr, ctx)?,
        _ => 1,
    };
    if step_n == 0 {
        return Err(ctx.fail("R907", "loop step cannot be zero", &range.source_info));
    }

    let make = |n: i64| match i32::try_from(n) {
        Ok(small) if narrow => Value::Int32(small),
        _ => Value::Int64(n),
    };
    let items = RangeIter {
        next: Some(lower_n),
        upper: upper_n,
        step: step_n,
    }
    .map(make);
    trace!(lower = lower_n, upper = upper_n, step = step_n, "range loop");

    let ran = run_loop(&range.target, &range.blocks, items, ctx, out)?;
    if !ran && ctx.pending_jump.is_none() {
        assign(&range.target, make(upper_n), ctx)?;
    }
    Ok(())
}

/// An integer range bound or step.
fn bound(value: &Value, expr: &Expr, ctx: &mut EvalContext<'_>) -> Eval<i64> {
    value.as_integer().ok_or_else(|| {
        ctx.fail(
            "TM006",
            format!("loop bounds must be integers, found {}", value.type_name()),
            expr.source_info(),
        )
    })
}

/// Inclusive arithmetic progression that stops instead of overflowing.
struct RangeIter {
    next: Option<i64>,
    upper: i64,
    step: i64,
}

impl Iterator for RangeIter {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        let current = self.next?;
        let in_range = if self.step > 0 {
            current <= self.upper
        } else {
            current >= self.upper
        };
        if !in_range {
            self.next = None;
            return None;
        }
        self.next = current.checked_add(self.step);
        Some(current)
    }
}

/// The elements `#foreach` visits.
fn enumerate(value: &Value, location: &SourceInfo, ctx: &mut EvalContext<'_>) -> Eval<Vec<Value>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::List(items) => Ok(items.borrow().clone()),
        Value::Dict(map) => Ok(map
            .borrow()
            .iter()
            .map(|(key, value)| Value::dict([("key", Value::string(key.as_str())), ("value", value.clone())]))
            .collect()),
        Value::String(text) => Ok(text.chars().map(|c| Value::String(c.to_string())).collect()),
        Value::Host(host) => match guard(|| host.iterate().transpose()) {
            Ok(Some(items)) => Ok(items),
            Ok(None) => Err(not_enumerable(value, location, ctx)),
            Err(err) => Err(ctx.fail("R901", err.to_string(), location)),
        },
        other => Err(not_enumerable(other, location, ctx)),
    }
}

fn not_enumerable(value: &Value, location: &SourceInfo, ctx: &mut EvalContext<'_>) -> Failed {
    ctx.fail(
        "TM003",
        format!("{} cannot be enumerated", value.type_name()),
        location,
    )
}

/// Render the loop; returns whether any element was visited.
fn run_loop(
    target: &Chain,
    blocks: &LoopBlocks,
    items: impl IntoIterator<Item = Value>,
    ctx: &mut EvalContext<'_>,
    out: &mut String,
) -> Eval<bool> {
    let mut items = items.into_iter().peekable();
    if items.peek().is_none() {
        run_section(blocks, LoopSection::NoData, ctx, out);
        return Ok(false);
    }

    ctx.loop_depth += 1;
    let result = run_elements(target, blocks, items, ctx, out);
    ctx.loop_depth -= 1;

    let flow = result?;
    if flow != Flow::Stop {
        run_section(blocks, LoopSection::AfterAll, ctx, out);
    }
    Ok(true)
}

fn run_elements(
    target: &Chain,
    blocks: &LoopBlocks,
    items: impl Iterator<Item = Value>,
    ctx: &mut EvalContext<'_>,
    out: &mut String,
) -> Eval<Flow> {
    if run_block(blocks.section(LoopSection::BeforeAll), ctx, out) == Flow::Stop {
        return Ok(Flow::Stop);
    }

    for (index, item) in items.enumerate() {
        assign(target, item, ctx)?;

        let parity = if index % 2 == 0 {
            LoopSection::Even
        } else {
            LoopSection::Odd
        };
        let sequence = [
            blocks.section(LoopSection::Each),
            blocks.section(LoopSection::Before),
            blocks.section(parity),
            Some(blocks.body.as_slice()),
            blocks.section(LoopSection::After),
            blocks.section(LoopSection::Between).filter(|_| index > 0),
        ];
        for block in sequence {
            match run_block(block, ctx, out) {
                Flow::Next => {}
                Flow::Continue => break,
                flow => return Ok(flow),
            }
        }
    }
    Ok(Flow::Next)
}

/// Render one block and consume a `#break`/`#continue` it raised. `#stop`
/// stays pending.
fn run_block(block: Option<&[Node]>, ctx: &mut EvalContext<'_>, out: &mut String) -> Flow {
    let Some(nodes) = block else {
        return Flow::Next;
    };
    render_into(nodes, ctx, out);
    match ctx.pending_jump {
        None => Flow::Next,
        Some(JumpKind::Stop) => Flow::Stop,
        Some(JumpKind::Break) => {
            ctx.pending_jump = None;
            Flow::Break
        }
        Some(JumpKind::Continue) => {
            ctx.pending_jump = None;
            Flow::Continue
        }
    }
}

/// `nodata` and `afterall` run outside the loop body.
fn run_section(blocks: &LoopBlocks, section: LoopSection, ctx: &mut EvalContext<'_>, out: &mut String) {
    if let Some(nodes) = blocks.section(section) {
        render_into(nodes, ctx, out);
    }
}
