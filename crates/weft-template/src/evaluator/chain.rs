/*
 * evaluator/chain.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Reading and writing statement chains (`root.prop[idx].method(args)`).
//!
//! A read folds the segments left to right. Lookup misses record a warning
//! (an error in strict mode) and halt the fold, degrading the chain to `""`.
//! A write resolves every segment but the last and then assigns through it.

use super::eval_expr;
use crate::ast::{Chain, Expr, Segment};
use crate::eval_context::{Eval, EvalContext, Failed};
use crate::host::{HostError, guard};
use crate::value::Value;
use weft_source_map::SourceInfo;

/// Result of folding a chain.
enum Folded {
    Resolved(Value),
    /// A lookup missed; the value stands in for the whole chain.
    Halted(Value),
}

pub(crate) fn read_chain(chain: &Chain, ctx: &mut EvalContext<'_>) -> Eval<Value> {
    match fold(chain, &chain.segments, ctx)? {
        Folded::Resolved(value) | Folded::Halted(value) => Ok(value),
    }
}

pub(crate) fn assign(target: &Chain, value: Value, ctx: &mut EvalContext<'_>) -> Eval<()> {
    let Some((last, prefix)) = target.segments.split_last() else {
        ctx.state.insert(target.root.clone(), value);
        return Ok(());
    };

    if let Segment::Invoke { source_info, .. } = last {
        return Err(ctx.fail(
            "E105",
            "cannot assign to the result of a call",
            source_info,
        ));
    }
    let owner = match fold(target, prefix, ctx)? {
        Folded::Resolved(owner) => owner,
        Folded::Halted(_) => {
            return Err(ctx.fail(
                "E105",
                format!("`{}` could not be resolved for assignment", target.root),
                &target.source_info,
            ));
        }
    };
    if matches!(owner, Value::Null | Value::Void) {
        return Err(null_reference(&owner, last.source_info(), ctx));
    }

    match last {
        Segment::Prop { name, source_info } => set_property(&owner, name, value, source_info, ctx),
        Segment::Indexer { args, source_info } => {
            let args = eval_args(args, ctx)?;
            set_index(&owner, &args, value, source_info, ctx)
        }
        Segment::Invoke { .. } => Ok(()),
    }
}

fn fold(chain: &Chain, segments: &[Segment], ctx: &mut EvalContext<'_>) -> Eval<Folded> {
    let Some(root) = ctx.state.get(&chain.root).cloned() else {
        ctx.lookup_miss(
            "E101",
            format!("`{}` is not defined", chain.root),
            &chain.source_info,
        )?;
        return Ok(Folded::Halted(Value::Null));
    };

    let mut current = root;
    let mut rest = segments;
    while let Some(segment) = rest.first() {
        if matches!(current, Value::Null | Value::Void) {
            return Err(null_reference(&current, segment.source_info(), ctx));
        }
        let step = match (segment, rest.get(1)) {
            (Segment::Prop { name, source_info }, Some(Segment::Invoke { args, .. })) => {
                rest = &rest[2..];
                let args = eval_args(args, ctx)?;
                call_method(&current, name, &args, source_info, ctx)?
            }
            (Segment::Prop { name, source_info }, _) => {
                rest = &rest[1..];
                get_property(&current, name, source_info, ctx)?
            }
            (Segment::Indexer { args, source_info }, _) => {
                rest = &rest[1..];
                let args = eval_args(args, ctx)?;
                get_index(&current, &args, source_info, ctx)?
            }
            (Segment::Invoke { args, source_info }, _) => {
                rest = &rest[1..];
                let args = eval_args(args, ctx)?;
                Some(invoke(&current, &args, source_info, ctx)?)
            }
        };
        match step {
            Some(next) => current = next,
            None => return Ok(Folded::Halted(Value::string(""))),
        }
    }
    Ok(Folded::Resolved(current))
}

fn eval_args(args: &[Expr], ctx: &mut EvalContext<'_>) -> Eval<Vec<Value>> {
    args.iter().map(|arg| eval_expr(arg, ctx)).collect()
}

fn null_reference(value: &Value, location: &SourceInfo, ctx: &mut EvalContext<'_>) -> Failed {
    ctx.fail(
        "R906",
        format!("cannot access a member of {}", value.type_name()),
        location,
    )
}

fn host_failure(err: HostError, location: &SourceInfo, ctx: &mut EvalContext<'_>) -> Failed {
    ctx.fail("R901", err.to_string(), location)
}

/// `None` when the lookup missed and the miss was only a warning.
fn miss(
    code: &str,
    message: String,
    location: &SourceInfo,
    ctx: &mut EvalContext<'_>,
) -> Eval<Option<Value>> {
    ctx.lookup_miss(code, message, location)?;
    Ok(None)
}

fn get_property(
    target: &Value,
    name: &str,
    location: &SourceInfo,
    ctx: &mut EvalContext<'_>,
) -> Eval<Option<Value>> {
    let not_found = || format!("{} has no property `{name}`", target.type_name());

    if let Value::Host(host) = target {
        return match guard(|| host.get_property(name)) {
            Ok(value) => Ok(Some(value)),
            Err(HostError::NotFound(_)) => miss("E102", not_found(), location, ctx),
            Err(err) => Err(host_failure(err, location, ctx)),
        };
    }
    if let Value::Dict(map) = target {
        let entry = map.borrow().get(name).cloned();
        if entry.is_some() {
            return Ok(entry);
        }
    }
    match ctx.members.property(target.kind(), name) {
        Some(builtin) => builtin
            .apply(target, &[])
            .map(Some)
            .map_err(|err| host_failure(err, location, ctx)),
        None => miss("E102", not_found(), location, ctx),
    }
}

fn call_method(
    target: &Value,
    name: &str,
    args: &[Value],
    location: &SourceInfo,
    ctx: &mut EvalContext<'_>,
) -> Eval<Option<Value>> {
    let not_found = || format!("{} has no method `{name}`", target.type_name());

    if let Value::Host(host) = target {
        return match guard(|| host.invoke(name, args)) {
            Ok(value) => Ok(Some(value)),
            Err(HostError::NotFound(_)) => miss("E103", not_found(), location, ctx),
            Err(err) => Err(host_failure(err, location, ctx)),
        };
    }
    if let Value::Dict(map) = target {
        let entry = map.borrow().get(name).cloned();
        if let Some(Value::Callable(callable)) = entry {
            return guard(|| callable.call(args))
                .map(Some)
                .map_err(|err| host_failure(err, location, ctx));
        }
    }
    match ctx.members.method(target.kind(), name) {
        Some(builtin) if builtin.arity() != args.len() => miss(
            "E103",
            format!(
                "`{name}` on {} takes {} argument(s), {} given",
                target.type_name(),
                builtin.arity(),
                args.len()
            ),
            location,
            ctx,
        ),
        Some(builtin) => builtin
            .apply(target, args)
            .map(Some)
            .map_err(|err| host_failure(err, location, ctx)),
        None => miss("E103", not_found(), location, ctx),
    }
}

fn invoke(
    target: &Value,
    args: &[Value],
    location: &SourceInfo,
    ctx: &mut EvalContext<'_>,
) -> Eval<Value> {
    match target {
        Value::Callable(callable) => {
            guard(|| callable.call(args)).map_err(|err| host_failure(err, location, ctx))
        }
        other => Err(ctx.fail(
            "TM004",
            format!("{} cannot be invoked", other.type_name()),
            location,
        )),
    }
}

/// A position argument for list and string indexers.
fn position(args: &[Value], target: &Value, location: &SourceInfo, ctx: &mut EvalContext<'_>) -> Eval<i64> {
    match args {
        [arg] => arg.as_integer().ok_or_else(|| {
            ctx.fail(
                "I002",
                format!("{} index must be an integer, found {}", target.type_name(), arg.type_name()),
                location,
            )
        }),
        _ => Err(ctx.fail(
            "I002",
            format!("{} index takes one argument, {} given", target.type_name(), args.len()),
            location,
        )),
    }
}

fn key(args: &[Value], location: &SourceInfo, ctx: &mut EvalContext<'_>) -> Eval<String> {
    match args {
        [arg] => arg.try_to_text().map_err(|err| host_failure(err, location, ctx)),
        _ => Err(ctx.fail(
            "I002",
            format!("dict index takes one argument, {} given", args.len()),
            location,
        )),
    }
}

fn get_index(
    target: &Value,
    args: &[Value],
    location: &SourceInfo,
    ctx: &mut EvalContext<'_>,
) -> Eval<Option<Value>> {
    match target {
        Value::List(items) => {
            let index = position(args, target, location, ctx)?;
            let found = usize::try_from(index).ok().and_then(|i| items.borrow().get(i).cloned());
            match found {
                Some(value) => Ok(Some(value)),
                None => miss("I001", format!("list index {index} is out of range"), location, ctx),
            }
        }
        Value::String(text) => {
            let index = position(args, target, location, ctx)?;
            let found = usize::try_from(index).ok().and_then(|i| text.chars().nth(i));
            match found {
                Some(c) => Ok(Some(Value::String(c.to_string()))),
                None => miss("I001", format!("string index {index} is out of range"), location, ctx),
            }
        }
        Value::Dict(map) => {
            let key = key(args, location, ctx)?;
            let found = map.borrow().get(&key).cloned();
            match found {
                Some(value) => Ok(Some(value)),
                None => miss("I001", format!("dict has no key `{key}`"), location, ctx),
            }
        }
        Value::Host(host) => match guard(|| host.get_index(args)) {
            Ok(value) => Ok(Some(value)),
            Err(HostError::NotFound(_)) => miss(
                "I001",
                format!("{} has no element at this index", host.type_name()),
                location,
                ctx,
            ),
            Err(err) => Err(host_failure(err, location, ctx)),
        },
        other => Err(ctx.fail(
            "I002",
            format!("{} cannot be indexed", other.type_name()),
            location,
        )),
    }
}

fn not_settable(target: &Value, member: &str, location: &SourceInfo, ctx: &mut EvalContext<'_>) -> Failed {
    ctx.fail(
        "E104",
        format!("{member} of {} cannot be assigned", target.type_name()),
        location,
    )
}

fn set_property(
    target: &Value,
    name: &str,
    value: Value,
    location: &SourceInfo,
    ctx: &mut EvalContext<'_>,
) -> Eval<()> {
    match target {
        Value::Dict(map) => {
            map.borrow_mut().insert(name.to_string(), value);
            Ok(())
        }
        Value::Host(host) => match guard(|| host.set_property(name, value)) {
            Ok(()) => Ok(()),
            Err(HostError::NotFound(_) | HostError::NotSettable(_)) => {
                Err(not_settable(target, &format!("`{name}`"), location, ctx))
            }
            Err(err) => Err(host_failure(err, location, ctx)),
        },
        _ => Err(not_settable(target, &format!("`{name}`"), location, ctx)),
    }
}

fn set_index(
    target: &Value,
    args: &[Value],
    value: Value,
    location: &SourceInfo,
    ctx: &mut EvalContext<'_>,
) -> Eval<()> {
    match target {
        Value::List(items) => {
            let index = position(args, target, location, ctx)?;
            let len = items.borrow().len();
            match usize::try_from(index) {
                Ok(i) if i < len => items.borrow_mut()[i] = value,
                Ok(i) if i == len => items.borrow_mut().push(value),
                _ => {
                    return Err(ctx.fail(
                        "I002",
                        format!("list index {index} is out of range for assignment (count {len})"),
                        location,
                    ));
                }
            }
            Ok(())
        }
        Value::Dict(map) => {
            let key = key(args, location, ctx)?;
            map.borrow_mut().insert(key, value);
            Ok(())
        }
        Value::Host(host) => match guard(|| host.set_index(args, value)) {
            Ok(()) => Ok(()),
            Err(HostError::NotFound(_) | HostError::NotSettable(_)) => {
                Err(not_settable(target, "an element", location, ctx))
            }
            Err(err) => Err(host_failure(err, location, ctx)),
        },
        _ => Err(not_settable(target, "an element", location, ctx)),
    }
}

#[cfg(test)]
mod tests {
    use crate::host::{HostError, HostObject, NativeFunction};
    use crate::options::EvalOptions;
    use crate::parser::Template;
    use crate::resolver::NullResolver;
    use crate::state::StateTable;
    use crate::value::Value;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    /// A host object with one settable and one read-only property.
    struct Counter {
        count: RefCell<i32>,
    }

    impl HostObject for Counter {
        fn type_name(&self) -> &str {
            "Counter"
        }

        fn get_property(&self, name: &str) -> Result<Value, HostError> {
            match name {
                "count" => Ok(Value::Int32(*self.count.borrow())),
                "label" => Ok(Value::string("counter")),
                "broken" => Err(HostError::failed("sensor offline")),
                _ => Err(HostError::NotFound(name.to_string())),
            }
        }

        fn set_property(&self, name: &str, value: Value) -> Result<(), HostError> {
            match (name, value) {
                ("count", Value::Int32(n)) => {
                    *self.count.borrow_mut() = n;
                    Ok(())
                }
                ("count", other) => Err(HostError::failed(format!(
                    "count must be Int32, got {}",
                    other.type_name()
                ))),
                _ => Err(HostError::NotSettable(name.to_string())),
            }
        }

        fn invoke(&self, name: &str, args: &[Value]) -> Result<Value, HostError> {
            match name {
                "bump" => {
                    let by = args.first().and_then(Value::as_integer).unwrap_or(1);
                    *self.count.borrow_mut() += by as i32;
                    Ok(Value::Void)
                }
                _ => Err(HostError::NotFound(name.to_string())),
            }
        }
    }

    fn state() -> StateTable {
        let mut state = StateTable::new();
        state.insert("user", Value::dict([
            ("name", Value::string("Ada")),
            ("tags", Value::list([Value::string("math"), Value::string("engines")])),
        ]));
        state.insert("counter", Value::host(Counter { count: RefCell::new(0) }));
        state.insert(
            "double",
            NativeFunction::new("double", |args| {
                let n = args.first().and_then(Value::as_integer).unwrap_or(0);
                Ok(Value::Int64(n * 2))
            })
            .into_value(),
        );
        state
    }

    fn run(source: &str, state: &mut StateTable) -> (String, Vec<String>) {
        let result = Template::compile(source).evaluate(state);
        let codes = result.errors.codes().into_iter().map(String::from).collect();
        (result.output, codes)
    }

    #[test]
    fn test_chain_reads() {
        let mut state = state();
        let (out, codes) = run(
            "$user.name $user.tags[1] $user.tags.count $user.name.upper() $user.name[0] $double(21)",
            &mut state,
        );
        assert_eq!(out, "Ada engines 2 ADA A 42");
        assert!(codes.is_empty());
    }

    #[test]
    fn test_missing_members_degrade() {
        let mut state = state();
        let (out, codes) = run(
            "[$user.age.years][$user.name.shout()][$user.tags[5]][$counter.nope]",
            &mut state,
        );
        assert_eq!(out, "[][][][]");
        assert_eq!(codes, vec!["E102", "E103", "I001", "E102"]);
    }

    #[test]
    fn test_strict_mode_promotes_misses() {
        let mut state = state();
        let template = Template::compile("a$user.age b");
        let options = EvalOptions::default().with_strict_mode(true);
        let result = template.evaluate_with(&mut state, &NullResolver, options);
        assert_eq!(result.output, "a b");
        assert!(result.errors.contains_error());
    }

    #[test]
    fn test_wrong_arity_is_a_miss() {
        let mut state = state();
        let (out, codes) = run("[$user.name.replace('A')]", &mut state);
        assert_eq!(out, "[]");
        assert_eq!(codes, vec!["E103"]);
    }

    #[test]
    fn test_null_reference() {
        let mut state = state();
        state.insert("nothing", Value::Null);
        let (out, codes) = run("[$nothing.prop]", &mut state);
        assert_eq!(out, "[]");
        assert_eq!(codes, vec!["R906"]);
    }

    #[test]
    fn test_invalid_index_arguments() {
        let mut state = state();
        let (_, codes) = run("$user.tags['x']", &mut state);
        assert_eq!(codes, vec!["I002"]);
        let (_, codes) = run("$user.tags[0]()", &mut state);
        assert_eq!(codes, vec!["TM004"]);
    }

    #[test]
    fn test_host_members() {
        let mut state = state();
        let (out, codes) = run(
            "$counter.label:#set(counter.count = 5)$counter.bump(2)$counter.count",
            &mut state,
        );
        assert_eq!(out, "counter:7");
        assert!(codes.is_empty());

        let (out, codes) = run("[$counter.broken]#set(counter.label = 'x')", &mut state);
        assert_eq!(out, "[]");
        assert_eq!(codes, vec!["R901", "E104"]);
    }

    #[test]
    fn test_assignment_targets() {
        let mut state = state();
        let (out, codes) = run(
            "#set(user.age = 36)#set(user.tags[2] = 'poetry')#set(user['city'] = 'London')\
             $user.age $user.tags.join(',') $user.city",
            &mut state,
        );
        assert_eq!(out, "36 math,engines,poetry London");
        assert!(codes.is_empty());
    }

    #[test]
    fn test_assignment_errors() {
        let mut state = state();
        let (_, codes) = run("#set(user.tags.count() = 1)", &mut state);
        assert_eq!(codes, vec!["E105"]);
        let (_, codes) = run("#set(missing.x = 1)", &mut state);
        assert_eq!(codes, vec!["E101", "E105"]);
        let (_, codes) = run("#set(user.tags[9] = 1)", &mut state);
        assert_eq!(codes, vec!["I002"]);
        let (_, codes) = run("#set(user.name.length = 1)", &mut state);
        assert_eq!(codes, vec!["E104"]);
    }

    #[test]
    fn test_list_mutation_is_shared() {
        let mut state = state();
        let (out, _) = run("#set(alias = user.tags)$alias.add('x')$user.tags.count", &mut state);
        assert_eq!(out, "3");
    }

    #[test]
    fn test_dict_callable_member() {
        let mut state = state();
        let helpers = Value::dict([(
            "greet",
            NativeFunction::new("greet", |args| {
                let who = args.first().map(|v| v.to_string()).unwrap_or_default();
                Ok(Value::String(format!("hello {who}")))
            })
            .into_value(),
        )]);
        state.insert("helpers", helpers);
        let (out, codes) = run("$helpers.greet('you') $helpers.count", &mut state);
        assert_eq!(out, "hello you 1");
        assert!(codes.is_empty());
    }
}
