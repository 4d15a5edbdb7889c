#![forbid(unsafe_code)]

//! Data snapshots and the in-place patch applied to component data.
//!
//! # Invariants
//!
//! 1. After [`patch`], every key of `next` is present in `data` with `next`'s
//!    value.
//! 2. Keys of `previous` absent from `next` are removed from `data`.
//! 3. Keys of `data` mentioned by neither snapshot are left untouched.

use serde_json::Value;

use crate::error::{BindError, Result};

/// Mapping produced by one invocation of a fetch function.
pub type Snapshot = serde_json::Map<String, Value>;

/// Counts from one [`patch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchSummary {
    pub written: usize,
    pub removed: usize,
}

/// Accept a fetch result only if it is a mapping.
pub fn into_snapshot(value: Value) -> Result<Snapshot> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(BindError::NotAMapping {
            found: value_kind(&other),
        }),
    }
}

/// Short JSON type name for diagnostics.
#[must_use]
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Patch `data` from `previous` to `next`.
pub fn patch(data: &mut Snapshot, previous: Option<&Snapshot>, next: &Snapshot) -> PatchSummary {
    let mut summary = PatchSummary::default();

    for (key, value) in next {
        data.insert(key.clone(), value.clone());
        summary.written += 1;
    }

    if let Some(previous) = previous {
        for key in previous.keys() {
            if !next.contains_key(key) && data.remove(key).is_some() {
                summary.removed += 1;
            }
        }
    }

    summary
}
