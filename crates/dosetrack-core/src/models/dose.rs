//! Dose instance models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a dose instance.
///
/// `Pending` is the only state that admits a transition; `Taken` and
/// `Skipped` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DoseState {
    /// Generated, not yet acted on
    Pending,
    /// User took the dose
    Taken,
    /// User skipped the dose
    Skipped,
}

impl DoseState {
    /// Whether this state admits no further transition.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DoseState::Pending)
    }

    /// Canonical lowercase form used in the state column and across the FFI
    /// boundary.
    pub fn as_str(&self) -> &'static str {
        match self {
            DoseState::Pending => "pending",
            DoseState::Taken => "taken",
            DoseState::Skipped => "skipped",
        }
    }
}

/// One concrete, time-stamped occurrence generated from a dose template.
///
/// Instances are never deleted: resolving one retires it from the remaining
/// set, but the row persists as history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoseInstance {
    /// Unique id, assigned at expansion time
    pub dose_id: String,
    /// Owning prescription
    pub prescription_id: String,
    /// 0-based sequence number within the prescription, in chronological
    /// expansion order (breaks time ties by declared template order)
    pub ordinal: u32,
    /// When the dose is due: schedule_start + k * period + offset
    pub time: DateTime<Utc>,
    /// Quantity to take
    pub amount: f64,
    /// Unit label
    pub unit: String,
    /// Which fill this dose draws from: ordinal / doses_per_refill
    pub refill_batch: u32,
    /// Lifecycle state
    pub state: DoseState,
    /// Creation timestamp
    pub created_at: String,
    /// When the dose was marked taken/skipped, if resolved
    pub resolved_at: Option<String>,
}

impl DoseInstance {
    /// Check if this instance still counts toward the remaining set.
    pub fn is_pending(&self) -> bool {
        self.state == DoseState::Pending
    }
}
