/*
 * host.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Host capability interface.
//!
//! Values the embedding application owns are exposed to templates as
//! [`Value::Host`] (objects with members) and [`Value::Callable`] (plain
//! functions). The evaluator only ever talks to them through the traits in
//! this module; every call is routed through [`guard`], so a failing or
//! panicking host turns into an `R901` diagnostic instead of unwinding
//! through the evaluator.

use crate::value::{BinaryOp, Value};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;
use thiserror::Error;

/// Failure reported by host code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// No member with this name (degrades to a lookup warning).
    #[error("no member named `{0}`")]
    NotFound(String),

    /// The member exists but cannot be assigned.
    #[error("member `{0}` cannot be assigned")]
    NotSettable(String),

    /// Anything else; reported as a runtime error with this text.
    #[error("{0}")]
    Failed(String),
}

impl HostError {
    pub fn failed(message: impl Into<String>) -> Self {
        HostError::Failed(message.into())
    }
}

/// An object owned by the embedding application.
///
/// Only [`type_name`](HostObject::type_name) and
/// [`get_property`](HostObject::get_property) are required. Mutation goes
/// through `&self`; implementations use interior mutability since templates
/// may hold several references to the same object.
pub trait HostObject {
    /// Name used in diagnostics and as the default text rendering.
    fn type_name(&self) -> &str;

    fn get_property(&self, name: &str) -> Result<Value, HostError>;

    fn set_property(&self, name: &str, _value: Value) -> Result<(), HostError> {
        Err(HostError::NotSettable(name.to_string()))
    }

    fn get_index(&self, _args: &[Value]) -> Result<Value, HostError> {
        Err(HostError::NotFound("[]".to_string()))
    }

    fn set_index(&self, _args: &[Value], _value: Value) -> Result<(), HostError> {
        Err(HostError::NotSettable("[]".to_string()))
    }

    /// Call the method `name`. Returning [`Value::Void`] means the method has
    /// no result.
    fn invoke(&self, name: &str, _args: &[Value]) -> Result<Value, HostError> {
        Err(HostError::NotFound(name.to_string()))
    }

    /// Text rendering; `None` falls back to the type name.
    fn to_text(&self) -> Result<Option<String>, HostError> {
        Ok(None)
    }

    /// Elements for `#foreach`; `None` means the object is not enumerable.
    fn iterate(&self) -> Option<Result<Vec<Value>, HostError>> {
        None
    }

    /// Operator overload with this object on the left; `None` means the
    /// operator is not supported.
    fn apply_binary(&self, _op: BinaryOp, _rhs: &Value) -> Option<Result<Value, HostError>> {
        None
    }
}

/// An invocable value: `$f(1, 2)`.
pub trait Callable {
    fn name(&self) -> &str;

    fn call(&self, args: &[Value]) -> Result<Value, HostError>;
}

type NativeFn = dyn Fn(&[Value]) -> Result<Value, HostError>;

/// Adapts a Rust closure into a [`Callable`].
pub struct NativeFunction {
    name: String,
    func: Box<NativeFn>,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&[Value]) -> Result<Value, HostError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }

    /// Wrap into a [`Value::Callable`].
    pub fn into_value(self) -> Value {
        Value::Callable(Rc::new(self))
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction").field("name", &self.name).finish()
    }
}

impl Callable for NativeFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, args: &[Value]) -> Result<Value, HostError> {
        (self.func)(args)
    }
}

/// Run host code, converting a panic into [`HostError::Failed`].
pub(crate) fn guard<T>(call: impl FnOnce() -> Result<T, HostError>) -> Result<T, HostError> {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(payload) => {
            let message = if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic payload".to_string()
            };
            Err(HostError::Failed(format!("host code panicked: {message}")))
        }
    }
}
