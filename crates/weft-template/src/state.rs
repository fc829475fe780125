/*
 * state.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The state table: root namespace of an evaluation.

use crate::value::Value;
use std::collections::HashMap;
use std::collections::hash_map;

/// Variables visible to a template, keyed by name.
///
/// `#set` and loop variables write here. Macro expansions and `#parse`d
/// templates share the table of the evaluation that started them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateTable {
    variables: HashMap<String, Value>,
}

impl StateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a table from a JSON object; `None` if `json` is not an object.
    pub fn from_json(json: &serde_json::Value) -> Option<Self> {
        let object = json.as_object()?;
        Some(
            object
                .iter()
                .map(|(k, v)| (k.clone(), Value::from_json(v)))
                .collect(),
        )
    }

    /// Insert or replace a variable.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.variables.remove(name)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, Value> {
        self.variables.iter()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for StateTable {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            variables: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
