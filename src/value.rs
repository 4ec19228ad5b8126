//! Argument and result values that cross execution boundaries.
//!
//! Every task argument and every success result is a [`Value`]: a closed union
//! of the primitive shapes that can be moved between threads and serialized
//! across a process boundary without caring which strategy runs the task.
//! Tables travel through this layer in serialized form as [`Value::Bytes`]
//! (see [`crate::io::csv`]).

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Keyed arguments for one task, ordered for deterministic serialization.
pub type ArgMap = BTreeMap<String, Value>;

/// Closed value union for task arguments and results.
///
/// The set is deliberately small: everything here serializes identically with
/// Serde whether it is handed to a sibling thread or piped to a worker
/// process. Composite data that does not fit (a parsed table, say) is carried
/// as `Bytes` in its serialized form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Borrow the string payload, if this is a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

/// Fetch a required string argument, with a useful error on absence/mismatch.
pub fn require_str<'a>(args: &'a ArgMap, key: &str) -> Result<&'a str> {
    match args.get(key) {
        Some(Value::Str(s)) => Ok(s),
        Some(other) => bail!("argument `{key}` must be a string, got {other:?}"),
        None => bail!("missing required argument `{key}`"),
    }
}

/// Fetch a required integer argument.
pub fn require_int(args: &ArgMap, key: &str) -> Result<i64> {
    match args.get(key) {
        Some(Value::Int(n)) => Ok(*n),
        Some(other) => bail!("argument `{key}` must be an integer, got {other:?}"),
        None => bail!("missing required argument `{key}`"),
    }
}

/// Fetch a required bytes argument.
pub fn require_bytes<'a>(args: &'a ArgMap, key: &str) -> Result<&'a [u8]> {
    match args.get(key) {
        Some(Value::Bytes(b)) => Ok(b),
        Some(other) => bail!("argument `{key}` must be bytes, got {other:?}"),
        None => bail!("missing required argument `{key}`"),
    }
}
