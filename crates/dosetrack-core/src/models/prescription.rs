//! Prescription models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Medication, Schedule};

/// A registered prescription: a medication, its recurring schedule, and the
/// supply dispensed for it.
///
/// Read-only after dose expansion begins, except for the `expanded_until`
/// bookkeeping that makes repeated expansion idempotent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prescription {
    /// Local UUID - assigned at creation
    pub prescription_id: String,
    /// Opaque authenticated user id, supplied by the external auth layer
    pub user_id: String,
    /// The medication being taken
    pub medication: Medication,
    /// The recurring dose pattern
    pub schedule: Schedule,
    /// Doses dispensed per fill (also the refill batch size)
    pub total_doses: u32,
    /// Remaining refill count
    pub refills: u32,
    /// Instant the recurring pattern begins
    pub schedule_start: DateTime<Utc>,
    /// Exclusive horizon covered by previous expansions; None until the
    /// first expansion
    pub expanded_until: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl Prescription {
    /// Create a new prescription.
    pub fn new(
        user_id: String,
        medication: Medication,
        schedule: Schedule,
        total_doses: u32,
        refills: u32,
        schedule_start: DateTime<Utc>,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            prescription_id: uuid::Uuid::new_v4().to_string(),
            user_id,
            medication,
            schedule,
            total_doses,
            refills,
            schedule_start,
            expanded_until: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Refill batch size: the quantity dispensed per fill.
    pub fn doses_per_refill(&self) -> u32 {
        self.total_doses
    }

    /// Check if any dose instances have been generated yet.
    pub fn has_expanded(&self) -> bool {
        self.expanded_until.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DoseTemplate;

    #[test]
    fn test_new_prescription() {
        let medication = Medication::new("Amoxicillin".into(), true, None);
        let schedule = Schedule::new(
            24 * 60 * 60 * 1000,
            vec![DoseTemplate {
                offset_ms: 8 * 60 * 60 * 1000,
                amount: 1.0,
                unit: "tab".into(),
            }],
        )
        .unwrap();

        let rx = Prescription::new(
            "user-1".into(),
            medication,
            schedule,
            30,
            2,
            Utc::now(),
        );
        assert_eq!(rx.prescription_id.len(), 36);
        assert_eq!(rx.doses_per_refill(), 30);
        assert!(!rx.has_expanded());
    }
}
