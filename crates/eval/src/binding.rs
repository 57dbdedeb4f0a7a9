//! Context binding table: the name -> value store behind a callable's
//! local frame and a context's variables.
//!
//! Names and values live in parallel vectors that grow in fixed-size
//! blocks. Declaration order is preserved, which is what the positional
//! getters used by native callables rely on.

use crate::error::EvalError;
use crate::value::{GraphRef, ListRef, MapRef, Value};

/// Key under which a variadic signature stores its captured tail.
pub const VARARGS_KEY: &str = "$varargs";

const BLOCK_SIZE: usize = 8;

#[derive(Debug, Clone, Default)]
pub struct SignatureContextMap {
    names: Vec<String>,
    values: Vec<Value>,
}

impl SignatureContextMap {
    pub fn new() -> Self {
        SignatureContextMap::default()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn reserve_block(&mut self) {
        if self.names.len() == self.names.capacity() {
            self.names.reserve_exact(BLOCK_SIZE);
            self.values.reserve_exact(BLOCK_SIZE);
        }
    }

    /// Add a binding. Re-adding an existing name without `override_existing`
    /// is rejected with [`EvalError::DuplicateBinding`].
    pub fn add(
        &mut self,
        name: impl Into<String>,
        value: Value,
        override_existing: bool,
    ) -> Result<(), EvalError> {
        let name = name.into();
        match self.position(&name) {
            Some(i) if override_existing => {
                self.values[i] = value;
                Ok(())
            }
            Some(_) => Err(EvalError::DuplicateBinding { name }),
            None => {
                self.reserve_block();
                self.names.push(name);
                self.values.push(value);
                Ok(())
            }
        }
    }

    /// Add or replace a binding.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.position(&name) {
            Some(i) => self.values[i] = value,
            None => {
                self.reserve_block();
                self.names.push(name);
                self.values.push(value);
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let i = self.position(name)?;
        self.names.remove(i);
        Some(self.values.remove(i))
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.position(name).map(|i| &self.values[i])
    }

    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.names.iter().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    // ── Positional getters ───────────────────────────────────────────────

    pub fn value_at(&self, index: usize) -> Result<&Value, EvalError> {
        self.values.get(index).ok_or_else(|| {
            EvalError::invocation(format!(
                "no binding at position {} ({} bound)",
                index,
                self.values.len()
            ))
        })
    }

    pub fn numeric_at(&self, index: usize) -> Result<f64, EvalError> {
        Ok(self.value_at(index)?.as_numeric())
    }

    pub fn boolean_at(&self, index: usize) -> Result<bool, EvalError> {
        Ok(self.value_at(index)?.as_boolean())
    }

    pub fn string_at(&self, index: usize) -> Result<String, EvalError> {
        Ok(self.value_at(index)?.as_string())
    }

    pub fn list_at(&self, index: usize) -> Result<ListRef, EvalError> {
        Ok(self.value_at(index)?.as_list())
    }

    pub fn map_at(&self, index: usize) -> Result<MapRef, EvalError> {
        Ok(self.value_at(index)?.as_map())
    }

    pub fn graph_at(&self, index: usize) -> Result<GraphRef, EvalError> {
        Ok(self.value_at(index)?.as_graph())
    }

    /// The captured variadic tail; empty when the table has none.
    pub fn varargs(&self) -> Vec<Value> {
        self.get(VARARGS_KEY)
            .map(|v| v.as_list().borrow().clone())
            .unwrap_or_default()
    }
}
