#![forbid(unsafe_code)]

//! Optional reactive-database integration: live cursor detection.
//!
//! A live cursor embedded in component data is not reactive: the data
//! manager only tracks what the fetch function read, and a cursor reads
//! nothing until it is materialized. When a probe is configured, every
//! snapshot is scanned and each cursor found produces a warning.

use serde_json::Value;

use crate::snapshot::Snapshot;

/// Marker key recognized by [`MarkerCursorProbe::default`].
pub const DEFAULT_CURSOR_MARKER: &str = "$cursor";

/// Recognizes live cursor values.
pub trait CursorProbe {
    fn is_live_cursor(&self, value: &Value) -> bool;
}

impl<F> CursorProbe for F
where
    F: Fn(&Value) -> bool,
{
    fn is_live_cursor(&self, value: &Value) -> bool {
        self(value)
    }
}

/// Treats any object carrying a marker key as a live cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerCursorProbe {
    marker: String,
}

impl MarkerCursorProbe {
    #[must_use]
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    #[must_use]
    pub fn marker(&self) -> &str {
        &self.marker
    }
}

impl Default for MarkerCursorProbe {
    fn default() -> Self {
        Self::new(DEFAULT_CURSOR_MARKER)
    }
}

impl CursorProbe for MarkerCursorProbe {
    fn is_live_cursor(&self, value: &Value) -> bool {
        value
            .as_object()
            .is_some_and(|map| map.contains_key(&self.marker))
    }
}

/// Keys of `snapshot` whose values are live cursors, in key order.
pub fn live_cursor_keys<'a>(probe: &dyn CursorProbe, snapshot: &'a Snapshot) -> Vec<&'a str> {
    snapshot
        .iter()
        .filter(|(_, value)| probe.is_live_cursor(value))
        .map(|(key, _)| key.as_str())
        .collect()
}
