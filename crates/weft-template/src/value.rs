/*
 * value.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The value model.
//!
//! [`Value`] is a closed tagged union. Operators are double-dispatched on the
//! left operand's kind: each kind lists the right-hand kinds it accepts, and
//! every other combination is a [`ValueError::TypeMismatch`]. Numeric
//! promotion is deliberately asymmetric (`Int32 + Double` is a `Double`, but
//! `UInt64` never mixes with signed integers):
//!
//! | Left    | Right kinds accepted                   | Result                     |
//! |---------|----------------------------------------|----------------------------|
//! | Int32   | Int32, Int64, Double, Decimal          | the wider of the two       |
//! | Int64   | Int64, Int32, Double, Decimal          | Int64 unless Double/Decimal|
//! | UInt64  | UInt64, Double, Decimal                | UInt64 unless Double/Decimal|
//! | Double  | Int32, Int64, Double, Decimal          | Double, Decimal for Decimal|
//! | Decimal | Int32, Int64, UInt64, Double, Decimal  | Decimal                    |
//!
//! Equality against `Null` compares the left operand with its kind's default
//! (`0`, `""`, `false`), so `$(0 == null)` is `true`.

use crate::host::{Callable, HostError, HostObject, guard};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Shared, mutable list storage.
pub type ListRef = Rc<RefCell<Vec<Value>>>;

/// Shared, mutable dictionary storage.
pub type DictRef = Rc<RefCell<BTreeMap<String, Value>>>;

/// A template value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    /// Result of a method that returns nothing.
    Void,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    Decimal(Decimal),
    String(String),
    List(ListRef),
    Dict(DictRef),
    Callable(Rc<dyn Callable>),
    Host(Rc<dyn HostObject>),
}

/// Discriminant of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKind {
    Null,
    Void,
    Boolean,
    Int32,
    Int64,
    UInt64,
    Double,
    Decimal,
    String,
    List,
    Dict,
    Callable,
    Host,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Null => "Null",
            ValueKind::Void => "Void",
            ValueKind::Boolean => "Boolean",
            ValueKind::Int32 => "Int32",
            ValueKind::Int64 => "Int64",
            ValueKind::UInt64 => "UInt64",
            ValueKind::Double => "Double",
            ValueKind::Decimal => "Decimal",
            ValueKind::String => "String",
            ValueKind::List => "List",
            ValueKind::Dict => "Dict",
            ValueKind::Callable => "Callable",
            ValueKind::Host => "Host",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary operators, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::Ne)
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::Or | BinaryOp::And)
    }

    /// Outcome of a comparison operator given an ordering (`None` when the
    /// operands are unordered, e.g. NaN).
    fn compare(self, ord: Option<Ordering>) -> bool {
        match self {
            BinaryOp::Eq => ord == Some(Ordering::Equal),
            BinaryOp::Ne => ord != Some(Ordering::Equal),
            BinaryOp::Lt => ord == Some(Ordering::Less),
            BinaryOp::Le => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
            BinaryOp::Gt => ord == Some(Ordering::Greater),
            BinaryOp::Ge => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
            _ => false,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::Not => "!",
        })
    }
}

/// Failure of an operator application.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("operator `{op}` cannot be applied to {left} and {right}")]
    TypeMismatch {
        op: BinaryOp,
        left: String,
        right: String,
    },

    #[error("operator `{op}` cannot be applied to {operand}")]
    UnaryTypeMismatch { op: UnaryOp, operand: String },

    #[error("division by zero")]
    DivideByZero,

    #[error("arithmetic overflow")]
    Overflow,

    #[error("{0}")]
    Host(String),
}

impl ValueError {
    /// Diagnostic code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            ValueError::TypeMismatch { .. } | ValueError::UnaryTypeMismatch { .. } => "TM001",
            ValueError::DivideByZero => "R904",
            ValueError::Overflow => "R905",
            ValueError::Host(_) => "R901",
        }
    }
}

impl From<HostError> for ValueError {
    fn from(err: HostError) -> Self {
        ValueError::Host(err.to_string())
    }
}

/// Numeric operands after promotion to a common representation.
#[derive(Debug, Clone, Copy)]
enum Num {
    I32(i32),
    I64(i64),
    U64(u64),
    F64(f64),
    Dec(Decimal),
}

fn decimal_from_f64(value: f64) -> Result<Decimal, ValueError> {
    Decimal::try_from(value).map_err(|_| ValueError::Overflow)
}

macro_rules! int_arith {
    ($op:expr, $a:expr, $b:expr, $ctor:path) => {
        match $op {
            BinaryOp::Add => $a.checked_add($b).map($ctor).ok_or(ValueError::Overflow),
            BinaryOp::Sub => $a.checked_sub($b).map($ctor).ok_or(ValueError::Overflow),
            BinaryOp::Mul => $a.checked_mul($b).map($ctor).ok_or(ValueError::Overflow),
            BinaryOp::Div if $b == 0 => Err(ValueError::DivideByZero),
            BinaryOp::Div => $a.checked_div($b).map($ctor).ok_or(ValueError::Overflow),
            BinaryOp::Rem if $b == 0 => Err(ValueError::DivideByZero),
            BinaryOp::Rem => $a.checked_rem($b).map($ctor).ok_or(ValueError::Overflow),
            op => Ok(Value::Boolean(op.compare(Some($a.cmp(&$b))))),
        }
    };
}

fn numeric(op: BinaryOp, lhs: Num, rhs: Num) -> Result<Value, ValueError> {
    match (lhs, rhs) {
        (Num::I32(a), Num::I32(b)) => int_arith!(op, a, b, Value::Int32),
        (Num::I64(a), Num::I64(b)) => int_arith!(op, a, b, Value::Int64),
        (Num::U64(a), Num::U64(b)) => int_arith!(op, a, b, Value::UInt64),
        (Num::F64(a), Num::F64(b)) => Ok(match op {
            BinaryOp::Add => Value::Double(a + b),
            BinaryOp::Sub => Value::Double(a - b),
            BinaryOp::Mul => Value::Double(a * b),
            BinaryOp::Div => Value::Double(a / b),
            BinaryOp::Rem => Value::Double(a % b),
            op => Value::Boolean(op.compare(a.partial_cmp(&b))),
        }),
        (Num::Dec(a), Num::Dec(b)) => match op {
            BinaryOp::Add => a.checked_add(b).map(Value::Decimal).ok_or(ValueError::Overflow),
            BinaryOp::Sub => a.checked_sub(b).map(Value::Decimal).ok_or(ValueError::Overflow),
            BinaryOp::Mul => a.checked_mul(b).map(Value::Decimal).ok_or(ValueError::Overflow),
            BinaryOp::Div | BinaryOp::Rem if b.is_zero() => Err(ValueError::DivideByZero),
            BinaryOp::Div => a.checked_div(b).map(Value::Decimal).ok_or(ValueError::Overflow),
            BinaryOp::Rem => a.checked_rem(b).map(Value::Decimal).ok_or(ValueError::Overflow),
            op => Ok(Value::Boolean(op.compare(Some(a.cmp(&b))))),
        },
        // promote() only pairs identical representations
        _ => Err(ValueError::Overflow),
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Void => ValueKind::Void,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Int32(_) => ValueKind::Int32,
            Value::Int64(_) => ValueKind::Int64,
            Value::UInt64(_) => ValueKind::UInt64,
            Value::Double(_) => ValueKind::Double,
            Value::Decimal(_) => ValueKind::Decimal,
            Value::String(_) => ValueKind::String,
            Value::List(_) => ValueKind::List,
            Value::Dict(_) => ValueKind::Dict,
            Value::Callable(_) => ValueKind::Callable,
            Value::Host(_) => ValueKind::Host,
        }
    }

    /// Kind name for diagnostics; host objects report their own type name.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Host(host) => host.type_name(),
            other => other.kind().as_str(),
        }
    }

    pub fn string(s: impl Into<String>) -> Value {
        Value::String(s.into())
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items.into_iter().collect())))
    }

    pub fn dict<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Value {
        let map = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Value::Dict(Rc::new(RefCell::new(map)))
    }

    pub fn host(object: impl HostObject + 'static) -> Value {
        Value::Host(Rc::new(object))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Int32(_) | Value::Int64(_) | Value::UInt64(_) | Value::Double(_) | Value::Decimal(_)
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer value of an integral kind.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Int32(n) => Some(i64::from(*n)),
            Value::Int64(n) => Some(*n),
            Value::UInt64(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    /// The zero/empty value of this kind, used for equality against `Null`.
    fn kind_default(&self) -> Option<Value> {
        Some(match self {
            Value::Boolean(_) => Value::Boolean(false),
            Value::Int32(_) => Value::Int32(0),
            Value::Int64(_) => Value::Int64(0),
            Value::UInt64(_) => Value::UInt64(0),
            Value::Double(_) => Value::Double(0.0),
            Value::Decimal(_) => Value::Decimal(Decimal::ZERO),
            Value::String(_) => Value::String(String::new()),
            _ => return None,
        })
    }

    fn mismatch(&self, op: BinaryOp, rhs: &Value) -> ValueError {
        ValueError::TypeMismatch {
            op,
            left: self.type_name().to_string(),
            right: rhs.type_name().to_string(),
        }
    }

    fn promote(&self, rhs: &Value) -> Result<Option<(Num, Num)>, ValueError> {
        use Value::{Decimal as Dec, Double, Int32, Int64, UInt64};
        Ok(Some(match (self, rhs) {
            (Int32(a), Int32(b)) => (Num::I32(*a), Num::I32(*b)),
            (Int32(a), Int64(b)) => (Num::I64(i64::from(*a)), Num::I64(*b)),
            (Int32(a), Double(b)) => (Num::F64(f64::from(*a)), Num::F64(*b)),
            (Int32(a), Dec(b)) => (Num::Dec(Decimal::from(*a)), Num::Dec(*b)),

            (Int64(a), Int64(b)) => (Num::I64(*a), Num::I64(*b)),
            (Int64(a), Int32(b)) => (Num::I64(*a), Num::I64(i64::from(*b))),
            (Int64(a), Double(b)) => (Num::F64(*a as f64), Num::F64(*b)),
            (Int64(a), Dec(b)) => (Num::Dec(Decimal::from(*a)), Num::Dec(*b)),

            (UInt64(a), UInt64(b)) => (Num::U64(*a), Num::U64(*b)),
            (UInt64(a), Double(b)) => (Num::F64(*a as f64), Num::F64(*b)),
            (UInt64(a), Dec(b)) => (Num::Dec(Decimal::from(*a)), Num::Dec(*b)),

            (Double(a), Int32(b)) => (Num::F64(*a), Num::F64(f64::from(*b))),
            (Double(a), Int64(b)) => (Num::F64(*a), Num::F64(*b as f64)),
            (Double(a), Double(b)) => (Num::F64(*a), Num::F64(*b)),
            (Double(a), Dec(b)) => (Num::Dec(decimal_from_f64(*a)?), Num::Dec(*b)),

            (Dec(a), Int32(b)) => (Num::Dec(*a), Num::Dec(Decimal::from(*b))),
            (Dec(a), Int64(b)) => (Num::Dec(*a), Num::Dec(Decimal::from(*b))),
            (Dec(a), UInt64(b)) => (Num::Dec(*a), Num::Dec(Decimal::from(*b))),
            (Dec(a), Double(b)) => (Num::Dec(*a), Num::Dec(decimal_from_f64(*b)?)),
            (Dec(a), Dec(b)) => (Num::Dec(*a), Num::Dec(*b)),

            _ => return Ok(None),
        }))
    }

    /// Apply a binary operator with `self` on the left.
    ///
    /// `||` and `&&` are short-circuited by the evaluator and never reach
    /// this method; here they are a type mismatch for every kind.
    pub fn apply_binary(&self, op: BinaryOp, rhs: &Value) -> Result<Value, ValueError> {
        match self {
            Value::Null | Value::Void => match op {
                BinaryOp::Eq => Ok(Value::Boolean(matches!(rhs, Value::Null | Value::Void))),
                BinaryOp::Ne => Ok(Value::Boolean(!matches!(rhs, Value::Null | Value::Void))),
                _ => Err(self.mismatch(op, rhs)),
            },
            Value::Boolean(a) => match rhs {
                Value::Boolean(b) if op.is_equality() => Ok(Value::Boolean(op.compare(Some(a.cmp(b))))),
                Value::Null if op.is_equality() => Ok(Value::Boolean(op.compare(Some(a.cmp(&false))))),
                _ => Err(self.mismatch(op, rhs)),
            },
            Value::String(a) => match (op, rhs) {
                (BinaryOp::Add, rhs) => {
                    let mut joined = a.clone();
                    joined.push_str(&rhs.try_to_text()?);
                    Ok(Value::String(joined))
                }
                (op, Value::String(b)) if op.is_equality() || op.is_relational() => {
                    Ok(Value::Boolean(op.compare(Some(a.as_str().cmp(b.as_str())))))
                }
                (op, Value::Null) if op.is_equality() => {
                    Ok(Value::Boolean(op.compare(Some(a.as_str().cmp("")))))
                }
                _ => Err(self.mismatch(op, rhs)),
            },
            Value::Int32(_)
            | Value::Int64(_)
            | Value::UInt64(_)
            | Value::Double(_)
            | Value::Decimal(_) => {
                if op.is_logical() {
                    return Err(self.mismatch(op, rhs));
                }
                if op.is_equality() && rhs.is_null() {
                    if let Some(default) = self.kind_default() {
                        return self.apply_binary(op, &default);
                    }
                }
                match self.promote(rhs)? {
                    Some((a, b)) => numeric(op, a, b),
                    None => Err(self.mismatch(op, rhs)),
                }
            }
            Value::Host(host) => match guard(|| host.apply_binary(op, rhs).transpose()) {
                Ok(Some(value)) => Ok(value),
                Ok(None) => Err(self.mismatch(op, rhs)),
                Err(err) => Err(err.into()),
            },
            Value::List(_) | Value::Dict(_) | Value::Callable(_) => Err(self.mismatch(op, rhs)),
        }
    }

    /// Apply a unary operator.
    pub fn apply_unary(&self, op: UnaryOp) -> Result<Value, ValueError> {
        let mismatch = || ValueError::UnaryTypeMismatch {
            op,
            operand: self.type_name().to_string(),
        };
        match (op, self) {
            (UnaryOp::Plus, v) if v.is_numeric() => Ok(v.clone()),
            (UnaryOp::Minus, Value::Int32(n)) => {
                n.checked_neg().map(Value::Int32).ok_or(ValueError::Overflow)
            }
            (UnaryOp::Minus, Value::Int64(n)) => {
                n.checked_neg().map(Value::Int64).ok_or(ValueError::Overflow)
            }
            (UnaryOp::Minus, Value::UInt64(n)) => i64::try_from(-i128::from(*n))
                .map(Value::Int64)
                .map_err(|_| ValueError::Overflow),
            (UnaryOp::Minus, Value::Double(n)) => Ok(Value::Double(-n)),
            (UnaryOp::Minus, Value::Decimal(n)) => Ok(Value::Decimal(-*n)),
            (UnaryOp::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
            _ => Err(mismatch()),
        }
    }

    /// Conversion to text. Only host objects can fail.
    ///
    /// A list or dict that (directly or not) contains itself renders the
    /// inner occurrence as `[...]` or `{...}`.
    pub fn try_to_text(&self) -> Result<String, HostError> {
        self.text_with(&mut Ancestors::default())
    }

    fn text_with(&self, seen: &mut Ancestors<*const ()>) -> Result<String, HostError> {
        Ok(match self {
            Value::Null | Value::Void => String::new(),
            Value::Boolean(b) => b.to_string(),
            Value::Int32(n) => n.to_string(),
            Value::Int64(n) => n.to_string(),
            Value::UInt64(n) => n.to_string(),
            Value::Double(n) => n.to_string(),
            Value::Decimal(n) => n.to_string(),
            Value::String(s) => s.clone(),
            Value::List(items) => {
                let parts = seen.visit(address(items), |seen| {
                    items
                        .borrow()
                        .iter()
                        .map(|item| item.text_with(seen))
                        .collect::<Result<Vec<_>, _>>()
                });
                match parts {
                    Some(parts) => format!("[{}]", parts?.join(", ")),
                    None => "[...]".to_string(),
                }
            }
            Value::Dict(map) => {
                let parts = seen.visit(address(map), |seen| {
                    map.borrow()
                        .iter()
                        .map(|(k, v)| v.text_with(seen).map(|text| format!("{k}: {text}")))
                        .collect::<Result<Vec<_>, _>>()
                });
                match parts {
                    Some(parts) => format!("{{{}}}", parts?.join(", ")),
                    None => "{...}".to_string(),
                }
            }
            Value::Callable(callable) => callable.name().to_string(),
            Value::Host(host) => match guard(|| host.to_text())? {
                Some(text) => text,
                None => host.type_name().to_string(),
            },
        })
    }

    /// Conversion to a boolean: booleans, `null` (false) and the strings
    /// `"true"`/`"false"` in any case.
    pub fn try_to_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::Null => Some(false),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    /// Build a value from JSON. Integers become the narrowest of
    /// Int32/Int64/UInt64, other numbers Double.
    pub fn from_json(json: &serde_json::Value) -> Value {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Boolean(*b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    i32::try_from(i).map_or(Value::Int64(i), Value::Int32)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt64(u)
                } else {
                    Value::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Json::String(s) => Value::String(s.clone()),
            Json::Array(items) => Value::list(items.iter().map(Value::from_json)),
            Json::Object(map) => Value::dict(map.iter().map(|(k, v)| (k.clone(), Value::from_json(v)))),
        }
    }

    /// Raw JSON view of this value. Decimals become JSON numbers when they
    /// fit a double; callables and host objects become their text. A list
    /// or dict nested in itself becomes the string `[...]` or `{...}`.
    pub fn to_json(&self) -> serde_json::Value {
        self.json_with(&mut Ancestors::default())
    }

    fn json_with(&self, seen: &mut Ancestors<*const ()>) -> serde_json::Value {
        use serde_json::{Number, Value as Json};
        match self {
            Value::Null | Value::Void => Json::Null,
            Value::Boolean(b) => Json::Bool(*b),
            Value::Int32(n) => Json::from(*n),
            Value::Int64(n) => Json::from(*n),
            Value::UInt64(n) => Json::from(*n),
            Value::Double(n) => Number::from_f64(*n).map_or(Json::Null, Json::Number),
            Value::Decimal(d) => d
                .to_f64()
                .and_then(Number::from_f64)
                .map_or_else(|| Json::String(d.to_string()), Json::Number),
            Value::String(s) => Json::String(s.clone()),
            Value::List(items) => seen
                .visit(address(items), |seen| {
                    Json::Array(items.borrow().iter().map(|item| item.json_with(seen)).collect())
                })
                .unwrap_or_else(|| Json::String("[...]".to_string())),
            Value::Dict(map) => seen
                .visit(address(map), |seen| {
                    Json::Object(
                        map.borrow()
                            .iter()
                            .map(|(k, v)| (k.clone(), v.json_with(seen)))
                            .collect(),
                    )
                })
                .unwrap_or_else(|| Json::String("{...}".to_string())),
            Value::Callable(_) | Value::Host(_) => {
                Json::String(self.try_to_text().unwrap_or_else(|_| self.type_name().to_string()))
            }
        }
    }

    /// Structural equality that treats a pair of aggregates already being
    /// compared further up as equal, so self-containing values terminate.
    fn eq_with(&self, other: &Value, seen: &mut Ancestors<(*const (), *const ())>) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) | (Value::Void, Value::Void) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::UInt64(a), Value::UInt64(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                Rc::ptr_eq(a, b)
                    || seen
                        .visit((address(a), address(b)), |seen| {
                            let (a, b) = (a.borrow(), b.borrow());
                            a.len() == b.len()
                                && a.iter().zip(b.iter()).all(|(x, y)| x.eq_with(y, seen))
                        })
                        .unwrap_or(true)
            }
            (Value::Dict(a), Value::Dict(b)) => {
                Rc::ptr_eq(a, b)
                    || seen
                        .visit((address(a), address(b)), |seen| {
                            let (a, b) = (a.borrow(), b.borrow());
                            a.len() == b.len()
                                && a.iter()
                                    .zip(b.iter())
                                    .all(|((ka, va), (kb, vb))| ka == kb && va.eq_with(vb, seen))
                        })
                        .unwrap_or(true)
            }
            (Value::Callable(a), Value::Callable(b)) => Rc::ptr_eq(a, b),
            (Value::Host(a), Value::Host(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn debug_with(
        &self,
        f: &mut fmt::Formatter<'_>,
        seen: &RefCell<Ancestors<*const ()>>,
    ) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Void => f.write_str("Void"),
            Value::Boolean(b) => f.debug_tuple("Boolean").field(b).finish(),
            Value::Int32(n) => f.debug_tuple("Int32").field(n).finish(),
            Value::Int64(n) => f.debug_tuple("Int64").field(n).finish(),
            Value::UInt64(n) => f.debug_tuple("UInt64").field(n).finish(),
            Value::Double(n) => f.debug_tuple("Double").field(n).finish(),
            Value::Decimal(n) => f.debug_tuple("Decimal").field(n).finish(),
            Value::String(s) => f.debug_tuple("String").field(s).finish(),
            Value::List(items) => {
                if !seen.borrow_mut().enter(address(items)) {
                    return f.write_str("List([...])");
                }
                f.write_str("List(")?;
                let result = f
                    .debug_list()
                    .entries(items.borrow().iter().map(|value| Shown { value, seen }))
                    .finish();
                seen.borrow_mut().leave();
                result?;
                f.write_str(")")
            }
            Value::Dict(map) => {
                if !seen.borrow_mut().enter(address(map)) {
                    return f.write_str("Dict({...})");
                }
                f.write_str("Dict(")?;
                let result = f
                    .debug_map()
                    .entries(map.borrow().iter().map(|(k, value)| (k, Shown { value, seen })))
                    .finish();
                seen.borrow_mut().leave();
                result?;
                f.write_str(")")
            }
            Value::Callable(c) => f.debug_tuple("Callable").field(&c.name()).finish(),
            Value::Host(h) => f.debug_tuple("Host").field(&h.type_name()).finish(),
        }
    }
}

fn address<T>(shared: &Rc<T>) -> *const () {
    Rc::as_ptr(shared).cast()
}

/// Aggregates on the path from the value being walked down to the current
/// position.
struct Ancestors<K>(Vec<K>);

impl<K> Default for Ancestors<K> {
    fn default() -> Self {
        Ancestors(Vec::new())
    }
}

impl<K: PartialEq> Ancestors<K> {
    /// Push `key`; `false` when it is already on the path.
    fn enter(&mut self, key: K) -> bool {
        if self.0.contains(&key) {
            return false;
        }
        self.0.push(key);
        true
    }

    fn leave(&mut self) {
        self.0.pop();
    }

    /// Run `f` below `key`, or return `None` when `key` is already on the
    /// path.
    fn visit<T>(&mut self, key: K, f: impl FnOnce(&mut Self) -> T) -> Option<T> {
        if !self.enter(key) {
            return None;
        }
        let result = f(self);
        self.leave();
        Some(result)
    }
}

struct Shown<'a> {
    value: &'a Value,
    seen: &'a RefCell<Ancestors<*const ()>>,
}

impl fmt::Debug for Shown<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.debug_with(f, self.seen)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.debug_with(f, &RefCell::new(Ancestors::default()))
    }
}

/// Structural equality for data kinds, identity for callables and hosts.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.eq_with(other, &mut Ancestors::default())
    }
}

/// Renders like output text; host failures render as the type name.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_to_text() {
            Ok(text) => f.write_str(&text),
            Err(_) => f.write_str(self.type_name()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int32(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::UInt64(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<Decimal> for Value {
    fn from(n: Decimal) -> Self {
        Value::Decimal(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Template;
    use crate::state::StateTable;
    use std::str::FromStr;

    fn dec(s: &str) -> Value {
        Value::Decimal(Decimal::from_str(s).unwrap())
    }

    fn add(a: Value, b: Value) -> Result<Value, ValueError> {
        a.apply_binary(BinaryOp::Add, &b)
    }

    #[test]
    fn test_int32_promotion() {
        assert_eq!(add(Value::Int32(1), Value::Int32(2)), Ok(Value::Int32(3)));
        assert_eq!(add(Value::Int32(1), Value::Int64(2)), Ok(Value::Int64(3)));
        assert_eq!(add(Value::Int32(1), Value::Double(0.5)), Ok(Value::Double(1.5)));
        assert_eq!(add(Value::Int32(1), dec("0.25")), Ok(dec("1.25")));
        assert!(matches!(
            add(Value::Int32(1), Value::UInt64(2)),
            Err(ValueError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_uint64_is_not_mixed_with_signed() {
        assert_eq!(add(Value::UInt64(1), Value::UInt64(2)), Ok(Value::UInt64(3)));
        assert_eq!(add(Value::UInt64(1), Value::Double(1.0)), Ok(Value::Double(2.0)));
        assert!(add(Value::UInt64(1), Value::Int32(2)).is_err());
        assert!(add(Value::UInt64(1), Value::Int64(2)).is_err());
    }

    #[test]
    fn test_asymmetric_double_decimal() {
        // Double on the left casts itself to Decimal when the right is Decimal
        assert_eq!(add(Value::Double(1.5), dec("1.5")), Ok(dec("3.0")));
        assert_eq!(add(dec("1.5"), Value::Double(1.5)), Ok(dec("3.0")));
        // Double does not accept UInt64, Decimal does
        assert!(add(Value::Double(1.0), Value::UInt64(1)).is_err());
        assert_eq!(add(dec("1"), Value::UInt64(1)), Ok(dec("2")));
        assert_eq!(
            add(Value::Double(f64::NAN), dec("1")),
            Err(ValueError::Overflow)
        );
    }

    #[test]
    fn test_int64_result_kind() {
        assert_eq!(add(Value::Int64(1), Value::Int32(2)), Ok(Value::Int64(3)));
        assert_eq!(add(Value::Int64(1), Value::Double(2.0)), Ok(Value::Double(3.0)));
    }

    #[test]
    fn test_checked_arithmetic() {
        assert_eq!(
            Value::Int32(1).apply_binary(BinaryOp::Div, &Value::Int32(0)),
            Err(ValueError::DivideByZero)
        );
        assert_eq!(
            Value::Int32(1).apply_binary(BinaryOp::Rem, &Value::Int32(0)),
            Err(ValueError::DivideByZero)
        );
        assert_eq!(
            add(Value::Int32(i32::MAX), Value::Int32(1)),
            Err(ValueError::Overflow)
        );
        assert_eq!(
            dec("1").apply_binary(BinaryOp::Div, &dec("0")),
            Err(ValueError::DivideByZero)
        );
        assert_eq!(
            Value::Double(1.0).apply_binary(BinaryOp::Div, &Value::Double(0.0)),
            Ok(Value::Double(f64::INFINITY))
        );
        assert_eq!(ValueError::DivideByZero.code(), "R904");
        assert_eq!(ValueError::Overflow.code(), "R905");
    }

    #[test]
    fn test_equality_against_null_uses_kind_default() {
        let eq = |v: Value| v.apply_binary(BinaryOp::Eq, &Value::Null);
        assert_eq!(eq(Value::Int32(5)), Ok(Value::Boolean(false)));
        assert_eq!(eq(Value::Int32(0)), Ok(Value::Boolean(true)));
        assert_eq!(eq(Value::Double(0.0)), Ok(Value::Boolean(true)));
        assert_eq!(eq(dec("0.00")), Ok(Value::Boolean(true)));
        assert_eq!(eq(Value::string("")), Ok(Value::Boolean(true)));
        assert_eq!(eq(Value::string("x")), Ok(Value::Boolean(false)));
        assert_eq!(eq(Value::Boolean(false)), Ok(Value::Boolean(true)));
        assert_eq!(eq(Value::Null), Ok(Value::Boolean(true)));
        assert_eq!(
            Value::Null.apply_binary(BinaryOp::Eq, &Value::Int32(0)),
            Ok(Value::Boolean(false))
        );
        assert_eq!(
            Value::Int32(5).apply_binary(BinaryOp::Ne, &Value::Null),
            Ok(Value::Boolean(true))
        );
    }

    #[test]
    fn test_string_operators() {
        assert_eq!(
            add(Value::string("n = "), Value::Int32(4)),
            Ok(Value::string("n = 4"))
        );
        assert_eq!(
            add(Value::string("x"), Value::Null),
            Ok(Value::string("x"))
        );
        assert_eq!(
            Value::string("a").apply_binary(BinaryOp::Lt, &Value::string("b")),
            Ok(Value::Boolean(true))
        );
        assert!(
            Value::string("a")
                .apply_binary(BinaryOp::Sub, &Value::string("b"))
                .is_err()
        );
        assert!(
            Value::string("1")
                .apply_binary(BinaryOp::Eq, &Value::Int32(1))
                .is_err()
        );
    }

    #[test]
    fn test_boolean_operators() {
        assert_eq!(
            Value::Boolean(true).apply_binary(BinaryOp::Ne, &Value::Boolean(false)),
            Ok(Value::Boolean(true))
        );
        assert!(
            Value::Boolean(true)
                .apply_binary(BinaryOp::Add, &Value::Boolean(true))
                .is_err()
        );
        assert!(
            Value::Boolean(true)
                .apply_binary(BinaryOp::And, &Value::Boolean(true))
                .is_err()
        );
    }

    #[test]
    fn test_mismatch_message() {
        let err = Value::Int32(1)
            .apply_binary(BinaryOp::Sub, &Value::string("a"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "operator `-` cannot be applied to Int32 and String"
        );
        assert_eq!(err.code(), "TM001");
    }

    #[test]
    fn test_unary() {
        assert_eq!(Value::Int32(3).apply_unary(UnaryOp::Minus), Ok(Value::Int32(-3)));
        assert_eq!(
            Value::Int32(i32::MIN).apply_unary(UnaryOp::Minus),
            Err(ValueError::Overflow)
        );
        assert_eq!(Value::UInt64(7).apply_unary(UnaryOp::Minus), Ok(Value::Int64(-7)));
        assert_eq!(
            Value::UInt64(u64::MAX).apply_unary(UnaryOp::Minus),
            Err(ValueError::Overflow)
        );
        assert_eq!(Value::Double(2.0).apply_unary(UnaryOp::Plus), Ok(Value::Double(2.0)));
        assert_eq!(Value::Boolean(true).apply_unary(UnaryOp::Not), Ok(Value::Boolean(false)));
        assert!(Value::Int32(1).apply_unary(UnaryOp::Not).is_err());
        assert!(Value::string("x").apply_unary(UnaryOp::Minus).is_err());
    }

    #[test]
    fn test_text_conversion() {
        assert_eq!(Value::Null.try_to_text().unwrap(), "");
        assert_eq!(Value::Void.try_to_text().unwrap(), "");
        assert_eq!(Value::Boolean(true).try_to_text().unwrap(), "true");
        assert_eq!(Value::Int64(-12).try_to_text().unwrap(), "-12");
        assert_eq!(Value::Double(2.5).try_to_text().unwrap(), "2.5");
        assert_eq!(dec("1.50").try_to_text().unwrap(), "1.50");
        let list = Value::list([Value::Int32(1), Value::string("a")]);
        assert_eq!(list.try_to_text().unwrap(), "[1, a]");
        let dict = Value::dict([("b", Value::Int32(2)), ("a", Value::Int32(1))]);
        assert_eq!(dict.try_to_text().unwrap(), "{a: 1, b: 2}");
    }

    #[test]
    fn test_bool_conversion() {
        assert_eq!(Value::Boolean(true).try_to_bool(), Some(true));
        assert_eq!(Value::Null.try_to_bool(), Some(false));
        assert_eq!(Value::string("True").try_to_bool(), Some(true));
        assert_eq!(Value::string("false").try_to_bool(), Some(false));
        assert_eq!(Value::string("yes").try_to_bool(), None);
        assert_eq!(Value::Int32(1).try_to_bool(), None);
    }

    #[test]
    fn test_lists_are_shared() {
        let list = Value::list([Value::Int32(1)]);
        let alias = list.clone();
        if let Value::List(items) = &alias {
            items.borrow_mut().push(Value::Int32(2));
        }
        assert_eq!(list, Value::list([Value::Int32(1), Value::Int32(2)]));
    }

    #[test]
    fn test_json_conversion() {
        let json = serde_json::json!({
            "small": 1,
            "big": 5_000_000_000_i64,
            "huge": u64::MAX,
            "ratio": 0.5,
            "tags": ["a", null],
        });
        let value = Value::from_json(&json);
        let Value::Dict(map) = &value else {
            panic!("expected a dict");
        };
        let map = map.borrow();
        assert_eq!(map["small"], Value::Int32(1));
        assert_eq!(map["big"], Value::Int64(5_000_000_000));
        assert_eq!(map["huge"], Value::UInt64(u64::MAX));
        assert_eq!(map["ratio"], Value::Double(0.5));
        assert_eq!(map["tags"], Value::list([Value::string("a"), Value::Null]));
        drop(map);
        assert_eq!(value.to_json(), json);
        assert_eq!(dec("2.5").to_json(), serde_json::json!(2.5));
    }

    #[test]
    fn test_self_containing_aggregates() {
        let list = Value::list([Value::Int32(1)]);
        let Value::List(items) = &list else {
            unreachable!()
        };
        items.borrow_mut().push(list.clone());
        assert_eq!(list.try_to_text().unwrap(), "[1, [...]]");
        assert_eq!(format!("{list:?}"), "List([Int32(1), List([...])])");
        assert_eq!(list.to_json(), serde_json::json!([1, "[...]"]));

        let twin = Value::list([Value::Int32(1)]);
        let Value::List(twin_items) = &twin else {
            unreachable!()
        };
        twin_items.borrow_mut().push(twin.clone());
        assert_eq!(list, twin);
        twin_items.borrow_mut()[0] = Value::Int32(2);
        assert_ne!(list, twin);

        let dict = Value::dict([("a".to_string(), Value::Int32(1))]);
        let Value::Dict(map) = &dict else {
            unreachable!()
        };
        map.borrow_mut().insert("me".to_string(), dict.clone());
        assert_eq!(dict.try_to_text().unwrap(), "{a: 1, me: {...}}");

        // Break the cycles so the test does not leak.
        items.borrow_mut().clear();
        twin_items.borrow_mut().clear();
        map.borrow_mut().clear();
    }

    #[test]
    fn test_shared_but_acyclic_values_render_fully() {
        let inner = Value::list([Value::Int32(1)]);
        let outer = Value::list([inner.clone(), inner]);
        assert_eq!(outer.try_to_text().unwrap(), "[[1], [1]]");
    }

    #[test]
    fn test_list_added_to_itself_in_a_template() {
        let result = Template::compile("#set(l = [1])$l.add(l)$l")
            .evaluate(&mut StateTable::new());
        assert_eq!(result.output, "[1, [...]]");
        assert!(result.is_ok());
    }

    /// Rendering a value and reading the text back as a literal with the
    /// kind's suffix gives the same value. Integral doubles render without
    /// a fraction (`1`), which the `D` suffix reads back as `1.0`.
    #[test]
    fn test_rendered_literals_read_back() {
        let cases = [
            (Value::Int32(-42), ""),
            (Value::Int32(i32::MAX), ""),
            (Value::Int64(5_000_000_000), "L"),
            (Value::Int64(-7), "L"),
            (Value::UInt64(u64::MAX), "UL"),
            (Value::Double(1.5), "D"),
            (Value::Double(1.0), "D"),
            (Value::Double(-0.25), "D"),
            (dec("2.50"), "M"),
            (dec("-0.001"), "M"),
            (Value::Boolean(true), ""),
            (Value::Boolean(false), ""),
        ];
        for (value, suffix) in cases {
            let literal = format!("{}{suffix}", value.try_to_text().unwrap());
            let mut state = StateTable::new();
            let result =
                Template::compile(&format!("#set(v = {literal})")).evaluate(&mut state);
            assert!(result.is_ok(), "{literal}");
            assert_eq!(state.get("v"), Some(&value), "{literal}");
        }

        let mut state = StateTable::new();
        Template::compile("#set(v = 'weft text')").evaluate(&mut state);
        assert_eq!(state.get("v"), Some(&Value::string("weft text")));
        assert_eq!(Value::Double(1.0).try_to_text().unwrap(), "1");
    }
}
