//! Event types emitted by the countdown engine and session runner.
//!
//! Events are serialized as internally tagged JSON (`"type"` field) so front
//! ends and logs consume one shape. Timestamps are computed from the
//! wall-clock value the engine was handed, never read separately, which keeps
//! event streams reproducible in tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::timer::Phase;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A fresh work countdown was armed from Idle.
    Started {
        ends_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// A paused countdown picked back up; the deadline moved by the length
    /// of the pause.
    Resumed {
        remaining_ms: u64,
        ends_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// The countdown froze with time still on the clock.
    Paused {
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    /// The countdown was abandoned; back to Idle.
    Stopped { at: DateTime<Utc> },
    /// A work period ran to its deadline. The only event that earns a
    /// harvest; the break is already armed when this fires.
    WorkCompleted {
        break_ends_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// A break ran to its deadline and the next work period is armed.
    BreakCompleted {
        work_ends_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// The break was cut short by the user. No harvest.
    BreakSkipped {
        work_ends_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// Per-tick state readout for front ends.
    Snapshot {
        phase: Phase,
        remaining_ms: u64,
        display: String,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// One-line JSON rendering for machine-readable event streams.
    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string(self).map_err(CoreError::from)
    }
}
