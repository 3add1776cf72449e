//! # Shiftstore Core
//!
//! Core types shared by every shiftstore crate: the period key schema,
//! the typed stored values, errors and the clock abstraction.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod error;
pub mod format_version;
pub mod keys;
pub mod value;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use keys::{EntityKind, StorageKey};
pub use value::{ScheduleValue, StaffRecord, StaffValue, StoredValue};
