/*
 * evaluator/expression.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Expression evaluation.

use super::{
    eval_condition, expand_macro, macro_source, read_chain, render_node, render_passthrough,
    report_parse_error,
};
use crate::ast::Expr;
use crate::eval_context::{Eval, EvalContext, Failed};
use crate::value::{BinaryOp, Value, ValueError};
use weft_source_map::SourceInfo;

pub(crate) fn eval_expr(expr: &Expr, ctx: &mut EvalContext<'_>) -> Eval<Value> {
    match expr {
        Expr::Constant { value, .. } => Ok(value.to_value()),

        Expr::Binary {
            op: op @ (BinaryOp::Or | BinaryOp::And),
            lhs,
            rhs,
            ..
        } => {
            let left = eval_condition(lhs, ctx)?;
            // `a || b` skips b when a is true, `a && b` when a is false
            if left == (*op == BinaryOp::Or) {
                return Ok(Value::Boolean(left));
            }
            Ok(Value::Boolean(eval_condition(rhs, ctx)?))
        }

        Expr::Binary {
            op,
            lhs,
            rhs,
            source_info,
        } => {
            let left = eval_expr(lhs, ctx)?;
            let right = eval_expr(rhs, ctx)?;
            left.apply_binary(*op, &right)
                .map_err(|err| value_error(err, source_info, ctx))
        }

        Expr::Unary {
            op,
            operand,
            source_info,
        } => {
            let value = eval_expr(operand, ctx)?;
            value
                .apply_unary(*op)
                .map_err(|err| value_error(err, source_info, ctx))
        }

        Expr::Chain(chain) => read_chain(chain, ctx),

        Expr::Macro(chain) => {
            let value = read_chain(chain, ctx)?;
            let source = macro_source(value, &chain.source_info, ctx)?;
            expand_macro(&source, &chain.source_info, ctx).map(Value::String)
        }

        Expr::Passthrough(passthrough) => render_passthrough(passthrough, ctx).map(Value::String),

        Expr::DynamicString { parts, .. } => {
            let mut text = String::new();
            for part in parts {
                render_node(part, ctx, &mut text)?;
            }
            Ok(Value::String(text))
        }

        Expr::List { items, .. } => {
            let values = items
                .iter()
                .map(|item| eval_expr(item, ctx))
                .collect::<Eval<Vec<_>>>()?;
            Ok(Value::list(values))
        }

        Expr::Error(error) => Err(report_parse_error(error, ctx)),
    }
}

fn value_error(err: ValueError, location: &SourceInfo, ctx: &mut EvalContext<'_>) -> Failed {
    ctx.fail(err.code(), err.to_string(), location)
}
