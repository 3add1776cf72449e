//! Legacy single-blob layout
//!
//! Earlier releases kept every period in one document per entity kind,
//! either an object keyed by the period index or an array indexed by it:
//!
//! ```text
//! schedules-by-period = { "0": { "A": { "2025-01-01": "early" } }, "2": { ... } }
//! staff-by-period     = [ [ { "id": "s1", ... } ], null, [ ... ] ]
//! ```
//!
//! Schedules written by those releases mark a cleared cell with `null`.

use serde::de::DeserializeOwned;
use serde_json::Value;
use shiftstore_core::{ScheduleValue, StaffValue, StoredValue};
use std::collections::BTreeMap;
use tracing::warn;

/// A legacy period that could not be decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedPeriod {
    /// Index as written in the blob
    pub index: String,
    /// Entries found in the raw period
    pub raw_records: usize,
    /// Decode error
    pub reason: String,
}

/// Decoded content of one legacy blob.
///
/// Nothing in the blob is dropped silently: what does not decode is kept
/// in `rejected` or `blob_error`.
#[derive(Debug, Clone)]
pub struct LegacyPeriods<T> {
    /// Periods that decoded
    pub periods: BTreeMap<u32, T>,
    /// Periods that did not decode, or whose index is not a period number
    pub rejected: Vec<RejectedPeriod>,
    /// Set when the blob as a whole is unreadable
    pub blob_error: Option<String>,
}

impl<T> Default for LegacyPeriods<T> {
    fn default() -> Self {
        Self {
            periods: BTreeMap::new(),
            rejected: Vec::new(),
            blob_error: None,
        }
    }
}

impl<T> LegacyPeriods<T> {
    /// Returns `true` if every part of the blob decoded
    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty() && self.blob_error.is_none()
    }

    fn map<U>(self, f: impl Fn(T) -> U) -> LegacyPeriods<U> {
        LegacyPeriods {
            periods: self.periods.into_iter().map(|(i, v)| (i, f(v))).collect(),
            rejected: self.rejected,
            blob_error: self.blob_error,
        }
    }
}

/// Decodes a legacy schedule blob; `null` shift markers are cleared cells
pub fn parse_schedule_periods(blob_key: &str, bytes: &[u8]) -> LegacyPeriods<ScheduleValue> {
    parse_periods_with(blob_key, bytes, drop_cleared_cells)
}

/// Decodes a legacy staff blob
pub fn parse_staff_periods(blob_key: &str, bytes: &[u8]) -> LegacyPeriods<StaffValue> {
    parse_periods(blob_key, bytes)
}

/// Decodes a legacy blob into its periods.
///
/// Null periods are empty and skipped. Anything else that fails to decode
/// is logged and returned as rejected.
pub fn parse_periods<T: DeserializeOwned>(blob_key: &str, bytes: &[u8]) -> LegacyPeriods<T> {
    parse_periods_with(blob_key, bytes, |_| {})
}

fn parse_periods_with<T: DeserializeOwned>(
    blob_key: &str,
    bytes: &[u8],
    prepare: fn(&mut Value),
) -> LegacyPeriods<T> {
    let mut parsed = LegacyPeriods::default();

    let document: Value = match serde_json::from_slice(bytes) {
        Ok(document) => document,
        Err(e) => {
            warn!(key = blob_key, error = %e, "legacy blob is not valid JSON");
            parsed.blob_error = Some(format!("invalid JSON: {e}"));
            return parsed;
        }
    };

    let raw_periods: Vec<(String, Value)> = match document {
        Value::Null => Vec::new(),
        Value::Object(map) => map.into_iter().collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        other => {
            let kind = json_kind(&other);
            warn!(key = blob_key, kind, "unexpected legacy blob shape");
            parsed.blob_error = Some(format!("expected object or array, found {kind}"));
            return parsed;
        }
    };

    for (index, mut value) in raw_periods {
        if value.is_null() {
            continue;
        }
        let raw_records = raw_record_count(&value);
        let Ok(period) = index.parse::<u32>() else {
            warn!(key = blob_key, index = %index, "non-numeric legacy period");
            parsed.rejected.push(RejectedPeriod {
                index,
                raw_records,
                reason: "index is not a period number".to_string(),
            });
            continue;
        };

        prepare(&mut value);
        match serde_json::from_value::<T>(value) {
            Ok(content) => {
                parsed.periods.insert(period, content);
            }
            Err(e) => {
                warn!(key = blob_key, period, error = %e, "undecodable legacy period");
                parsed.rejected.push(RejectedPeriod {
                    index,
                    raw_records,
                    reason: e.to_string(),
                });
            }
        }
    }
    parsed
}

/// Removes `null` shift markers from a raw schedule period
fn drop_cleared_cells(period: &mut Value) {
    let Value::Object(rows) = period else {
        return;
    };
    for days in rows.values_mut() {
        if let Value::Object(days) = days {
            days.retain(|_, marker| !marker.is_null());
        }
    }
}

fn raw_record_count(value: &Value) -> usize {
    match value {
        Value::Null => 0,
        Value::Object(map) => map.len(),
        Value::Array(items) => items.len(),
        _ => 1,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Legacy periods of either kind, as stored values
pub(crate) fn into_stored<T: Into<StoredValue>>(
    parsed: LegacyPeriods<T>,
) -> LegacyPeriods<StoredValue> {
    parsed.map(Into::into)
}
