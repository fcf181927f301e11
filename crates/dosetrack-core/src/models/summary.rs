//! Per-medication remaining-doses summary.

use serde::{Deserialize, Serialize};

use super::{DoseInstance, Medication};

/// What a caller sees for one medication: the outstanding dose instances and
/// the two supply metrics derived from them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemainingDoses {
    /// Owning prescription
    pub prescription_id: String,
    /// The medication this summary describes
    pub medication: Medication,
    /// Outstanding (pending) dose instances, ascending by time
    pub doses: Vec<DoseInstance>,
    /// Doses left in the current fill
    pub doses_until_refill: u32,
    /// Doses left across the whole outstanding set
    pub doses_until_empty: u32,
}
