//! Recurring dose schedule models.
//!
//! A schedule is a fixed period plus dose templates at offsets within that
//! period. Durations are millisecond counts, matching the wire format the
//! entry forms submit.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Schedule validation errors (rejected at construction).
#[derive(Error, Debug, PartialEq)]
pub enum ScheduleError {
    #[error("Period must be positive, got {0}ms")]
    NonPositivePeriod(i64),

    #[error("Dose offset {offset_ms}ms is outside the period of {period_ms}ms")]
    OffsetOutOfRange { offset_ms: i64, period_ms: i64 },

    #[error("Dose amount must be non-negative, got {0}")]
    NegativeAmount(f64),
}

/// One dose within each recurrence of the period.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoseTemplate {
    /// Offset from the start of each period, in milliseconds
    pub offset_ms: i64,
    /// Quantity to take
    pub amount: f64,
    /// Unit label (e.g., "tab", "mL") - not unit-converted
    pub unit: String,
}

/// A recurring dose pattern.
///
/// Only obtainable through [`Schedule::new`], which enforces the invariants
/// every consumer relies on: a positive period, all offsets inside one
/// period, non-negative amounts. Template order is preserved and breaks
/// time ties during expansion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Schedule {
    /// Recurrence interval, in milliseconds
    pub period_ms: i64,
    /// Dose templates, in declared order
    pub doses: Vec<DoseTemplate>,
}

impl Schedule {
    /// Validate and create a schedule.
    pub fn new(period_ms: i64, doses: Vec<DoseTemplate>) -> Result<Self, ScheduleError> {
        if period_ms <= 0 {
            return Err(ScheduleError::NonPositivePeriod(period_ms));
        }
        for dose in &doses {
            if dose.offset_ms < 0 || dose.offset_ms >= period_ms {
                return Err(ScheduleError::OffsetOutOfRange {
                    offset_ms: dose.offset_ms,
                    period_ms,
                });
            }
            if dose.amount < 0.0 {
                return Err(ScheduleError::NegativeAmount(dose.amount));
            }
        }
        Ok(Self { period_ms, doses })
    }

    /// Number of dose occurrences in each period.
    pub fn occurrences_per_period(&self) -> usize {
        self.doses.len()
    }

    /// The recurrence interval as a duration.
    pub fn period(&self) -> Duration {
        Duration::milliseconds(self.period_ms)
    }
}
