//! Remaining-doses view: per-medication summaries for one user.

use crate::db::Database;
use crate::models::RemainingDoses;
use crate::scheduler::{summarize, SchedulerResult, SupplyConfig};

/// Composes prescriptions, their pending dose instances and the supply
/// metrics into the summary list a caller presents to the user.
///
/// Pure composition over a snapshot; holds no state of its own.
pub struct RemainingDosesView<'a> {
    db: &'a Database,
}

impl<'a> RemainingDosesView<'a> {
    /// Create a new view.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// One summary per prescription, sorted ascending by medication display
    /// name (case-sensitive byte-wise order).
    pub fn for_user(&self, user_id: &str) -> SchedulerResult<Vec<RemainingDoses>> {
        let prescriptions = self.db.list_prescriptions_for_user(user_id)?;

        let mut summaries = Vec::with_capacity(prescriptions.len());
        for rx in prescriptions {
            let pending = self.db.list_pending_doses(&rx.prescription_id)?;
            let config = SupplyConfig::for_prescription(&rx)?;
            let supply = summarize(&pending, &config);
            summaries.push(RemainingDoses {
                prescription_id: rx.prescription_id,
                medication: rx.medication,
                doses: pending,
                doses_until_refill: supply.doses_until_refill,
                doses_until_empty: supply.doses_until_empty,
            });
        }
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DoseState, DoseTemplate, Medication};
    use crate::scheduler::Scheduler;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    const HOUR_MS: i64 = 60 * 60 * 1000;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn create_and_expand(db: &Database, user: &str, name: &str, days: i64) -> String {
        let scheduler = Scheduler::new(db);
        let rx = scheduler
            .create_prescription(
                user,
                Medication::new(name.into(), false, None),
                24 * HOUR_MS,
                vec![DoseTemplate {
                    offset_ms: 8 * HOUR_MS,
                    amount: 1.0,
                    unit: "tab".into(),
                }],
                30,
                1,
                start(),
            )
            .unwrap();
        scheduler
            .expand_pending(&rx.prescription_id, start() + Duration::days(days))
            .unwrap();
        rx.prescription_id
    }

    #[test]
    fn test_sorted_by_medication_name() {
        let db = Database::open_in_memory().unwrap();
        create_and_expand(&db, "user-1", "Zoloft", 3);
        create_and_expand(&db, "user-1", "Amoxicillin", 3);
        create_and_expand(&db, "other-user", "Ibuprofen", 3);

        let summaries = RemainingDosesView::new(&db).for_user("user-1").unwrap();
        let names: Vec<&str> = summaries.iter().map(|s| s.medication.name.as_str()).collect();
        assert_eq!(names, vec!["Amoxicillin", "Zoloft"]);
    }

    #[test]
    fn test_metrics_follow_pending_set() {
        let db = Database::open_in_memory().unwrap();
        create_and_expand(&db, "user-1", "Amoxicillin", 5);

        let view = RemainingDosesView::new(&db);
        let before = view.for_user("user-1").unwrap();
        assert_eq!(before[0].doses_until_empty, 5);
        assert_eq!(before[0].doses_until_refill, 5);
        assert_eq!(before[0].doses.len(), 5);

        let dose_id = before[0].doses[0].dose_id.clone();
        db.transition_dose(&dose_id, DoseState::Taken).unwrap();

        let after = view.for_user("user-1").unwrap();
        assert_eq!(after[0].doses_until_empty, 4);
        assert!(after[0].doses.iter().all(|d| d.dose_id != dose_id));
    }

    #[test]
    fn test_unexpanded_prescription_has_empty_summary() {
        let db = Database::open_in_memory().unwrap();
        let scheduler = Scheduler::new(&db);
        scheduler
            .create_prescription(
                "user-1",
                Medication::new("Amoxicillin".into(), false, None),
                24 * HOUR_MS,
                vec![],
                30,
                0,
                start(),
            )
            .unwrap();

        let summaries = RemainingDosesView::new(&db).for_user("user-1").unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].doses_until_empty, 0);
        assert_eq!(summaries[0].doses_until_refill, 0);
    }
}
