/*
 * members.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Built-in members of strings, lists and dictionaries.
//!
//! Host objects resolve their own members; for the value kinds the engine
//! owns, `.name` and `.name(args)` resolve to a [`Builtin`]. Resolutions are
//! memoised in a [`MemberCache`] owned by the evaluation context.

use crate::host::HostError;
use crate::value::{BinaryOp, Value, ValueKind};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Builtin {
    StringLength,
    StringUpper,
    StringLower,
    StringTrim,
    StringContains,
    StringStartsWith,
    StringEndsWith,
    StringReplace,
    StringSplit,
    ListCount,
    ListFirst,
    ListLast,
    ListAdd,
    ListContains,
    ListJoin,
    DictCount,
    DictKeys,
    DictContainsKey,
    DictSet,
    DictRemove,
}

impl Builtin {
    fn property(kind: ValueKind, name: &str) -> Option<Self> {
        Some(match (kind, name) {
            (ValueKind::String, "length") => Builtin::StringLength,
            (ValueKind::List, "count") => Builtin::ListCount,
            (ValueKind::List, "first") => Builtin::ListFirst,
            (ValueKind::List, "last") => Builtin::ListLast,
            (ValueKind::Dict, "count") => Builtin::DictCount,
            (ValueKind::Dict, "keys") => Builtin::DictKeys,
            _ => return None,
        })
    }

    fn method(kind: ValueKind, name: &str) -> Option<Self> {
        Some(match (kind, name) {
            (ValueKind::String, "upper") => Builtin::StringUpper,
            (ValueKind::String, "lower") => Builtin::StringLower,
            (ValueKind::String, "trim") => Builtin::StringTrim,
            (ValueKind::String, "contains") => Builtin::StringContains,
            (ValueKind::String, "starts_with") => Builtin::StringStartsWith,
            (ValueKind::String, "ends_with") => Builtin::StringEndsWith,
            (ValueKind::String, "replace") => Builtin::StringReplace,
            (ValueKind::String, "split") => Builtin::StringSplit,
            (ValueKind::List, "add") => Builtin::ListAdd,
            (ValueKind::List, "contains") => Builtin::ListContains,
            (ValueKind::List, "join") => Builtin::ListJoin,
            (ValueKind::Dict, "contains_key") => Builtin::DictContainsKey,
            (ValueKind::Dict, "set") => Builtin::DictSet,
            (ValueKind::Dict, "remove") => Builtin::DictRemove,
            _ => return None,
        })
    }

    /// Number of arguments the member takes.
    pub(crate) fn arity(self) -> usize {
        match self {
            Builtin::StringLength
            | Builtin::StringUpper
            | Builtin::StringLower
            | Builtin::StringTrim
            | Builtin::ListCount
            | Builtin::ListFirst
            | Builtin::ListLast
            | Builtin::DictCount
            | Builtin::DictKeys => 0,
            Builtin::StringReplace | Builtin::DictSet => 2,
            _ => 1,
        }
    }

    /// Apply to `target`. The caller checks the arity first.
    pub(crate) fn apply(self, target: &Value, args: &[Value]) -> Result<Value, HostError> {
        let text = |i: usize| -> Result<String, HostError> {
            args.get(i).map_or(Ok(String::new()), Value::try_to_text)
        };
        let arg = |i: usize| args.get(i).cloned().unwrap_or_default();

        Ok(match (self, target) {
            (Builtin::StringLength, Value::String(s)) => count_value(s.chars().count()),
            (Builtin::StringUpper, Value::String(s)) => Value::String(s.to_uppercase()),
            (Builtin::StringLower, Value::String(s)) => Value::String(s.to_lowercase()),
            (Builtin::StringTrim, Value::String(s)) => Value::string(s.trim()),
            (Builtin::StringContains, Value::String(s)) => Value::Boolean(s.contains(&text(0)?)),
            (Builtin::StringStartsWith, Value::String(s)) => {
                Value::Boolean(s.starts_with(&text(0)?))
            }
            (Builtin::StringEndsWith, Value::String(s)) => Value::Boolean(s.ends_with(&text(0)?)),
            (Builtin::StringReplace, Value::String(s)) => {
                let from = text(0)?;
                if from.is_empty() {
                    Value::String(s.clone())
                } else {
                    Value::String(s.replace(&from, &text(1)?))
                }
            }
            (Builtin::StringSplit, Value::String(s)) => {
                let separator = text(0)?;
                if separator.is_empty() {
                    Value::list(s.chars().map(|c| Value::String(c.to_string())))
                } else {
                    Value::list(s.split(separator.as_str()).map(Value::string))
                }
            }

            (Builtin::ListCount, Value::List(items)) => count_value(items.borrow().len()),
            (Builtin::ListFirst, Value::List(items)) => {
                items.borrow().first().cloned().unwrap_or_default()
            }
            (Builtin::ListLast, Value::List(items)) => {
                items.borrow().last().cloned().unwrap_or_default()
            }
            (Builtin::ListAdd, Value::List(items)) => {
                items.borrow_mut().push(arg(0));
                Value::Void
            }
            (Builtin::ListContains, Value::List(items)) => {
                let needle = arg(0);
                let found = items.borrow().iter().any(|item| {
                    item.apply_binary(BinaryOp::Eq, &needle) == Ok(Value::Boolean(true))
                });
                Value::Boolean(found)
            }
            (Builtin::ListJoin, Value::List(items)) => {
                let separator = text(0)?;
                let parts = items
                    .borrow()
                    .iter()
                    .map(Value::try_to_text)
                    .collect::<Result<Vec<_>, _>>()?;
                Value::String(parts.join(&separator))
            }

            (Builtin::DictCount, Value::Dict(map)) => count_value(map.borrow().len()),
            (Builtin::DictKeys, Value::Dict(map)) => {
                Value::list(map.borrow().keys().map(|k| Value::string(k.as_str())))
            }
            (Builtin::DictContainsKey, Value::Dict(map)) => {
                Value::Boolean(map.borrow().contains_key(&text(0)?))
            }
            (Builtin::DictSet, Value::Dict(map)) => {
                let key = text(0)?;
                map.borrow_mut().insert(key, arg(1));
                Value::Void
            }
            (Builtin::DictRemove, Value::Dict(map)) => {
                let key = text(0)?;
                map.borrow_mut().remove(&key).unwrap_or_default()
            }

            (builtin, other) => {
                return Err(HostError::failed(format!(
                    "{builtin:?} cannot be applied to {}",
                    other.type_name()
                )));
            }
        })
    }
}

/// A length as the narrowest integer kind that holds it.
pub(crate) fn count_value(n: usize) -> Value {
    match i32::try_from(n) {
        Ok(small) => Value::Int32(small),
        Err(_) => u64::try_from(n).map_or(Value::Null, Value::UInt64),
    }
}

/// Per-evaluation memo of builtin member resolutions, keyed by value kind
/// and member name.
#[derive(Debug, Default)]
pub struct MemberCache {
    properties: HashMap<ValueKind, HashMap<String, Option<Builtin>>>,
    methods: HashMap<ValueKind, HashMap<String, Option<Builtin>>>,
}

impl MemberCache {
    pub(crate) fn property(&mut self, kind: ValueKind, name: &str) -> Option<Builtin> {
        Self::lookup(&mut self.properties, kind, name, Builtin::property)
    }

    pub(crate) fn method(&mut self, kind: ValueKind, name: &str) -> Option<Builtin> {
        Self::lookup(&mut self.methods, kind, name, Builtin::method)
    }

    fn lookup(
        table: &mut HashMap<ValueKind, HashMap<String, Option<Builtin>>>,
        kind: ValueKind,
        name: &str,
        resolve: fn(ValueKind, &str) -> Option<Builtin>,
    ) -> Option<Builtin> {
        let by_name = table.entry(kind).or_default();
        if let Some(found) = by_name.get(name) {
            return *found;
        }
        let found = resolve(kind, name);
        by_name.insert(name.to_string(), found);
        found
    }

    /// Number of memoised resolutions.
    pub fn len(&self) -> usize {
        self.properties.values().chain(self.methods.values()).map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_string_members() {
        let s = Value::string("  Hello, World  ");
        assert_eq!(Builtin::StringTrim.apply(&s, &[]), Ok(Value::string("Hello, World")));
        assert_eq!(
            Builtin::StringContains.apply(&s, &[Value::string("World")]),
            Ok(Value::Boolean(true))
        );
        assert_eq!(
            Builtin::StringLength.apply(&Value::string("héllo"), &[]),
            Ok(Value::Int32(5))
        );
        assert_eq!(
            Builtin::StringSplit.apply(&Value::string("a,b"), &[Value::string(",")]),
            Ok(Value::list([Value::string("a"), Value::string("b")]))
        );
    }

    #[test]
    fn test_list_members_mutate_in_place() {
        let list = Value::list([Value::Int32(1)]);
        assert_eq!(Builtin::ListAdd.apply(&list, &[Value::Int32(2)]), Ok(Value::Void));
        assert_eq!(Builtin::ListCount.apply(&list, &[]), Ok(Value::Int32(2)));
        assert_eq!(Builtin::ListLast.apply(&list, &[]), Ok(Value::Int32(2)));
        assert_eq!(
            Builtin::ListContains.apply(&list, &[Value::Int64(2)]),
            Ok(Value::Boolean(true))
        );
        assert_eq!(
            Builtin::ListJoin.apply(&list, &[Value::string("-")]),
            Ok(Value::string("1-2"))
        );
        assert_eq!(
            Builtin::ListFirst.apply(&Value::list([]), &[]),
            Ok(Value::Null)
        );
    }

    #[test]
    fn test_dict_members() {
        let dict = Value::dict([("a", Value::Int32(1))]);
        assert_eq!(
            Builtin::DictSet.apply(&dict, &[Value::string("b"), Value::Int32(2)]),
            Ok(Value::Void)
        );
        assert_eq!(
            Builtin::DictKeys.apply(&dict, &[]),
            Ok(Value::list([Value::string("a"), Value::string("b")]))
        );
        assert_eq!(
            Builtin::DictRemove.apply(&dict, &[Value::string("a")]),
            Ok(Value::Int32(1))
        );
        assert_eq!(
            Builtin::DictContainsKey.apply(&dict, &[Value::string("a")]),
            Ok(Value::Boolean(false))
        );
    }

    #[test]
    fn test_member_cache_memoises_misses() {
        let mut cache = MemberCache::default();
        assert_eq!(cache.method(ValueKind::String, "upper"), Some(Builtin::StringUpper));
        assert_eq!(cache.method(ValueKind::String, "upper"), Some(Builtin::StringUpper));
        assert_eq!(cache.property(ValueKind::Int32, "length"), None);
        assert_eq!(cache.len(), 2);
        assert_eq!(Builtin::StringReplace.arity(), 2);
    }
}
