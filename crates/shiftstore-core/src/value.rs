//! Stored values
//!
//! Values are UTF-8 JSON documents. Which shape a document has is decided by
//! the key it lives under, so decoding always goes through
//! [`StoredValue::decode`] with the key in hand.

use crate::keys::{EntityKind, StorageKey};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Shift assignments for one period: staff id → date key → shift marker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleValue {
    assignments: BTreeMap<String, BTreeMap<String, String>>,
}

impl ScheduleValue {
    /// Creates an empty schedule
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns `shift` to `staff_id` on `date`, replacing any earlier marker
    pub fn assign(
        &mut self,
        staff_id: impl Into<String>,
        date: impl Into<String>,
        shift: impl Into<String>,
    ) {
        self.assignments
            .entry(staff_id.into())
            .or_default()
            .insert(date.into(), shift.into());
    }

    /// Builder form of [`ScheduleValue::assign`]
    pub fn with(
        mut self,
        staff_id: impl Into<String>,
        date: impl Into<String>,
        shift: impl Into<String>,
    ) -> Self {
        self.assign(staff_id, date, shift);
        self
    }

    /// The shift marker of `staff_id` on `date`
    pub fn shift(&self, staff_id: &str, date: &str) -> Option<&str> {
        self.assignments
            .get(staff_id)
            .and_then(|days| days.get(date))
            .map(String::as_str)
    }

    /// Number of staff members with at least one entry
    pub fn staff_count(&self) -> usize {
        self.assignments.len()
    }

    /// Returns `true` if no staff member has an entry
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Iterates over staff ids and their date → shift maps
    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, String>)> {
        self.assignments.iter()
    }
}

/// A single staff record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffRecord {
    /// Stable staff identifier
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// When the record was last edited; drives stale-write rejection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    /// Fields this layer does not interpret, kept verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl StaffRecord {
    /// Creates a record without a modification timestamp
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            last_modified: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Sets the modification timestamp
    pub fn modified_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_modified = Some(at);
        self
    }
}

/// Ordered staff records for one period
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaffValue {
    records: Vec<StaffRecord>,
}

impl StaffValue {
    /// Wraps an ordered list of records
    pub fn new(records: Vec<StaffRecord>) -> Self {
        Self { records }
    }

    /// The records in order
    pub fn records(&self) -> &[StaffRecord] {
        &self.records
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if there are no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The newest modification timestamp across all records
    pub fn max_last_modified(&self) -> Option<DateTime<Utc>> {
        self.records.iter().filter_map(|r| r.last_modified).max()
    }

    /// Returns `true` if this value carries strictly newer edits than `other`.
    ///
    /// A list without any timestamp counts as older than any timestamped list.
    pub fn is_newer_than(&self, other: &StaffValue) -> bool {
        self.max_last_modified() > other.max_last_modified()
    }
}

impl From<Vec<StaffRecord>> for StaffValue {
    fn from(records: Vec<StaffRecord>) -> Self {
        Self::new(records)
    }
}

/// Any value that can be stored under a [`StorageKey`]
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    /// Data for a `schedule-{n}` key
    Schedule(ScheduleValue),
    /// Data for a `staff-{n}` key
    Staff(StaffValue),
    /// Data for a metadata key (current period, cache version, legacy blobs)
    Meta(serde_json::Value),
}

impl StoredValue {
    /// Decodes `bytes` according to the shape expected under `key`
    pub fn decode(key: &StorageKey, bytes: &[u8]) -> Result<Self> {
        Ok(match key.kind() {
            Some(EntityKind::Schedule) => StoredValue::Schedule(serde_json::from_slice(bytes)?),
            Some(EntityKind::Staff) => StoredValue::Staff(serde_json::from_slice(bytes)?),
            None => StoredValue::Meta(serde_json::from_slice(bytes)?),
        })
    }

    /// Encodes the value as a JSON document
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(match self {
            StoredValue::Schedule(v) => serde_json::to_vec(v)?,
            StoredValue::Staff(v) => serde_json::to_vec(v)?,
            StoredValue::Meta(v) => serde_json::to_vec(v)?,
        })
    }

    /// The entity kind, `None` for metadata
    pub fn kind(&self) -> Option<EntityKind> {
        match self {
            StoredValue::Schedule(_) => Some(EntityKind::Schedule),
            StoredValue::Staff(_) => Some(EntityKind::Staff),
            StoredValue::Meta(_) => None,
        }
    }

    /// Short name of the variant, for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            StoredValue::Schedule(_) => "schedule",
            StoredValue::Staff(_) => "staff",
            StoredValue::Meta(_) => "metadata",
        }
    }

    /// Number of records: staff members for schedules, entries for staff lists
    pub fn record_count(&self) -> usize {
        match self {
            StoredValue::Schedule(v) => v.staff_count(),
            StoredValue::Staff(v) => v.len(),
            StoredValue::Meta(serde_json::Value::Null) => 0,
            StoredValue::Meta(_) => 1,
        }
    }

    /// Returns `true` if the value holds no records
    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }

    /// The schedule, if this is one
    pub fn as_schedule(&self) -> Option<&ScheduleValue> {
        match self {
            StoredValue::Schedule(v) => Some(v),
            _ => None,
        }
    }

    /// The staff list, if this is one
    pub fn as_staff(&self) -> Option<&StaffValue> {
        match self {
            StoredValue::Staff(v) => Some(v),
            _ => None,
        }
    }

    /// The metadata document, if this is one
    pub fn as_meta(&self) -> Option<&serde_json::Value> {
        match self {
            StoredValue::Meta(v) => Some(v),
            _ => None,
        }
    }
}

impl From<ScheduleValue> for StoredValue {
    fn from(value: ScheduleValue) -> Self {
        StoredValue::Schedule(value)
    }
}

impl From<StaffValue> for StoredValue {
    fn from(value: StaffValue) -> Self {
        StoredValue::Staff(value)
    }
}
