//! Bound parameter sets and placeholder resolution.
//!
//! # Invariants
//! - `ParamKey::Position(n)` binds to the 1-based placeholder `n + 1`.
//! - `ParamKey::Name(s)` binds to `:s` unless `s` already carries a sigil.
//! - Values are bound with their own storage class, never stringified.

use super::value::Value;
use super::{DatabaseError, DbResult};
use rusqlite::Statement;
use std::fmt::{Display, Formatter};

/// Placeholder key for one bound value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamKey {
    /// Zero-based position.
    Position(usize),
    /// Placeholder name, with or without its `:`/`@`/`$` prefix.
    Name(String),
}

impl ParamKey {
    /// Returns the placeholder text SQLite knows this key by.
    ///
    /// Positional keys have no name and return `None`.
    pub fn placeholder(&self) -> Option<String> {
        match self {
            Self::Position(_) => None,
            Self::Name(name) if name.starts_with([':', '@', '$']) => Some(name.clone()),
            Self::Name(name) => Some(format!(":{name}")),
        }
    }
}

impl Display for ParamKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Position(position) => write!(f, "{}", position + 1),
            Self::Name(_) => write!(f, "{}", self.placeholder().unwrap_or_default()),
        }
    }
}

/// Ordered set of parameter bindings for one statement call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(ParamKey, Value)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds positional bindings in iteration order.
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut params = Self::new();
        for value in values {
            params = params.push(value);
        }
        params
    }

    /// Builds named bindings in iteration order.
    pub fn named<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        pairs
            .into_iter()
            .fold(Self::new(), |params, (name, value)| params.bind(name, value))
    }

    /// Appends a value at the next free position.
    pub fn push(mut self, value: impl Into<Value>) -> Self {
        let position = self
            .entries
            .iter()
            .filter_map(|(key, _)| match key {
                ParamKey::Position(position) => Some(position + 1),
                ParamKey::Name(_) => None,
            })
            .max()
            .unwrap_or(0);
        self.entries.push((ParamKey::Position(position), value.into()));
        self
    }

    /// Binds a value by placeholder name, replacing an earlier binding of it.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(ParamKey::Name(name.into()), value.into());
        self
    }

    /// Inserts or replaces one binding.
    pub fn insert(&mut self, key: ParamKey, value: Value) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &ParamKey) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParamKey, &Value)> {
        self.entries.iter().map(|(key, value)| (key, value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Binds every entry to `stmt` using the engine's native types.
    pub(crate) fn bind_to(&self, stmt: &mut Statement<'_>) -> DbResult<()> {
        for (key, value) in &self.entries {
            let index = match key {
                ParamKey::Position(position) => position + 1,
                ParamKey::Name(_) => {
                    let placeholder = key.placeholder().unwrap_or_default();
                    stmt.parameter_index(&placeholder)?
                        .ok_or(DatabaseError::UnknownParameter(placeholder))?
                }
            };
            stmt.raw_bind_parameter(index, value)?;
        }
        Ok(())
    }
}

impl Display for Params {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (index, (key, value)) in self.entries.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}={value}")?;
        }
        write!(f, "]")
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Self::positional(values)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::named(iter)
    }
}
