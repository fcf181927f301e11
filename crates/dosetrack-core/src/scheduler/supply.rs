//! Supply tracker: refill batches and the two user-facing metrics.
//!
//! The pending set mutates on every taken/skipped action, so the metrics are
//! recomputed from the current snapshot on every query - O(n), no cached
//! state.

use serde::{Deserialize, Serialize};

use super::{SchedulerError, SchedulerResult};
use crate::models::{DoseInstance, Prescription};

/// Supply figures for one prescription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupplyConfig {
    /// Doses dispensed in the current supply
    pub total_doses: u32,
    /// Doses per fill - the refill batch size
    pub doses_per_refill: u32,
}

impl SupplyConfig {
    /// Validate and create a supply config.
    pub fn new(total_doses: u32, doses_per_refill: u32) -> SchedulerResult<Self> {
        if doses_per_refill == 0 {
            return Err(SchedulerError::InvalidSupplyConfig);
        }
        Ok(Self {
            total_doses,
            doses_per_refill,
        })
    }

    /// The supply config a prescription implies: its fill quantity is the
    /// batch size.
    pub fn for_prescription(rx: &Prescription) -> SchedulerResult<Self> {
        Self::new(rx.total_doses, rx.doses_per_refill())
    }

    /// Which refill batch the dose with this sequence number draws from.
    pub fn batch_for(&self, ordinal: u32) -> u32 {
        ordinal / self.doses_per_refill
    }
}

/// The two summary metrics derived from the outstanding dose set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SupplySummary {
    /// Count of all outstanding doses - the supply runs out when every one
    /// of them has been consumed
    pub doses_until_empty: u32,
    /// Size of the earliest refill batch - doses left before the next
    /// refill boundary
    pub doses_until_refill: u32,
}

/// Partition the pending instances (chronological order assumed) into
/// consecutive refill batches: batch 0 is the earliest `doses_per_refill`
/// instances, batch 1 the next, and so on.
pub fn refill_batches<'a>(
    pending: &'a [DoseInstance],
    config: &SupplyConfig,
) -> impl Iterator<Item = &'a [DoseInstance]> {
    pending.chunks(config.doses_per_refill as usize)
}

/// Compute the summary metrics for the current pending snapshot.
///
/// Zero pending instances is a valid state, not an error: both metrics are 0.
pub fn summarize(pending: &[DoseInstance], config: &SupplyConfig) -> SupplySummary {
    let doses_until_refill = refill_batches(pending, config)
        .next()
        .map_or(0, |batch| batch.len() as u32);
    SupplySummary {
        doses_until_empty: pending.len() as u32,
        doses_until_refill,
    }
}
