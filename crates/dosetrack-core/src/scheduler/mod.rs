//! Recurring-dose scheduling engine.
//!
//! Pipeline: Schedule → Expansion → Dose Instances → Supply Summary

mod expander;
mod supply;

pub use expander::*;
pub use supply::*;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crate::db::Database;
use crate::models::{
    DoseInstance, DoseState, DoseTemplate, Medication, Prescription, Schedule, ScheduleError,
};

/// Scheduling errors.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Database error: {0}")]
    Database(#[from] crate::db::DbError),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(#[from] ScheduleError),

    #[error("Horizon end {horizon_end} is not after schedule start {schedule_start}")]
    InvalidHorizon {
        schedule_start: DateTime<Utc>,
        horizon_end: DateTime<Utc>,
    },

    #[error("Invalid supply config: doses per refill must be positive")]
    InvalidSupplyConfig,

    #[error("Prescription not found: {0}")]
    PrescriptionNotFound(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Main scheduler that coordinates prescription creation and incremental
/// dose expansion against the store.
pub struct Scheduler<'a> {
    db: &'a Database,
}

impl<'a> Scheduler<'a> {
    /// Create a new scheduler.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Validate and register a prescription.
    ///
    /// This is the configuration boundary: a malformed schedule or supply
    /// config is rejected here and nothing is stored.
    #[allow(clippy::too_many_arguments)]
    pub fn create_prescription(
        &self,
        user_id: &str,
        medication: Medication,
        period_ms: i64,
        doses: Vec<DoseTemplate>,
        total_doses: u32,
        refills: u32,
        schedule_start: DateTime<Utc>,
    ) -> SchedulerResult<Prescription> {
        let schedule = Schedule::new(period_ms, doses)?;
        // A prescription's refill batch size is its fill quantity; reject a
        // zero fill here so a stored prescription can never yield an invalid
        // supply config later.
        SupplyConfig::new(total_doses, total_doses)?;

        let rx = Prescription::new(
            user_id.to_string(),
            medication,
            schedule,
            total_doses,
            refills,
            schedule_start,
        );
        self.db.insert_prescription(&rx)?;
        info!(
            prescription_id = %rx.prescription_id,
            medication = %rx.medication.name,
            "prescription created"
        );
        Ok(rx)
    }

    /// Expand the prescription's schedule up to `horizon_end`, storing and
    /// returning only the newly created dose instances.
    ///
    /// Idempotent for non-advancing horizons: doses generated so far cover
    /// exactly `[schedule_start, expanded_until)`, so a repeated call with a
    /// horizon at or before the bookmark creates nothing.
    pub fn expand_pending(
        &self,
        prescription_id: &str,
        horizon_end: DateTime<Utc>,
    ) -> SchedulerResult<Vec<DoseInstance>> {
        let rx = self
            .db
            .get_prescription(prescription_id)?
            .ok_or_else(|| SchedulerError::PrescriptionNotFound(prescription_id.to_string()))?;

        if horizon_end <= rx.schedule_start {
            return Err(SchedulerError::InvalidHorizon {
                schedule_start: rx.schedule_start,
                horizon_end,
            });
        }

        let from = rx
            .expanded_until
            .map_or(rx.schedule_start, |u| u.max(rx.schedule_start));
        if horizon_end <= from {
            debug!(prescription_id, "horizon already covered, nothing to expand");
            return Ok(Vec::new());
        }

        let config = SupplyConfig::for_prescription(&rx)?;
        let next_ordinal = self.db.count_dose_instances(prescription_id)?;
        let now = Utc::now().to_rfc3339();

        let doses: Vec<DoseInstance> =
            expand_from(&rx.schedule, rx.schedule_start, from, horizon_end)
                .enumerate()
                .map(|(i, planned)| {
                    let ordinal = next_ordinal + i as u32;
                    DoseInstance {
                        dose_id: uuid::Uuid::new_v4().to_string(),
                        prescription_id: rx.prescription_id.clone(),
                        ordinal,
                        time: planned.time,
                        amount: planned.amount,
                        unit: planned.unit,
                        refill_batch: config.batch_for(ordinal),
                        state: DoseState::Pending,
                        created_at: now.clone(),
                        resolved_at: None,
                    }
                })
                .collect();

        self.db
            .insert_dose_instances(prescription_id, &doses, horizon_end)?;
        debug!(prescription_id, created = doses.len(), "expanded schedule");
        Ok(doses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const HOUR_MS: i64 = 60 * 60 * 1000;

    fn template(offset_hours: i64) -> DoseTemplate {
        DoseTemplate {
            offset_ms: offset_hours * HOUR_MS,
            amount: 1.0,
            unit: "tab".into(),
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn create_twice_daily(db: &Database, total_doses: u32) -> Prescription {
        let scheduler = Scheduler::new(db);
        scheduler
            .create_prescription(
                "user-1",
                Medication::new("Amoxicillin".into(), true, None),
                24 * HOUR_MS,
                vec![template(8), template(20)],
                total_doses,
                1,
                start(),
            )
            .unwrap()
    }

    #[test]
    fn test_create_rejects_invalid_schedule() {
        let db = Database::open_in_memory().unwrap();
        let scheduler = Scheduler::new(&db);
        let result = scheduler.create_prescription(
            "user-1",
            Medication::new("Amoxicillin".into(), true, None),
            0,
            vec![],
            30,
            1,
            start(),
        );
        assert!(matches!(result, Err(SchedulerError::InvalidSchedule(_))));
    }

    #[test]
    fn test_create_rejects_zero_fill() {
        let db = Database::open_in_memory().unwrap();
        let scheduler = Scheduler::new(&db);
        let result = scheduler.create_prescription(
            "user-1",
            Medication::new("Amoxicillin".into(), true, None),
            24 * HOUR_MS,
            vec![template(8)],
            0,
            1,
            start(),
        );
        assert!(matches!(result, Err(SchedulerError::InvalidSupplyConfig)));
    }

    #[test]
    fn test_expand_one_day() {
        let db = Database::open_in_memory().unwrap();
        let rx = create_twice_daily(&db, 30);
        let scheduler = Scheduler::new(&db);

        let created = scheduler
            .expand_pending(&rx.prescription_id, start() + Duration::days(1))
            .unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(created[0].time, start() + Duration::hours(8));
        assert_eq!(created[1].time, start() + Duration::hours(20));
        assert_eq!(created[0].ordinal, 0);
        assert_eq!(created[1].ordinal, 1);
        assert!(created.iter().all(|d| d.refill_batch == 0));
        assert!(created.iter().all(|d| d.state == DoseState::Pending));
    }

    #[test]
    fn test_expand_is_idempotent_for_same_horizon() {
        let db = Database::open_in_memory().unwrap();
        let rx = create_twice_daily(&db, 30);
        let scheduler = Scheduler::new(&db);
        let horizon = start() + Duration::days(3);

        let first = scheduler.expand_pending(&rx.prescription_id, horizon).unwrap();
        assert_eq!(first.len(), 6);

        let again = scheduler.expand_pending(&rx.prescription_id, horizon).unwrap();
        assert!(again.is_empty());

        // An earlier horizon creates nothing either
        let earlier = scheduler
            .expand_pending(&rx.prescription_id, start() + Duration::days(1))
            .unwrap();
        assert!(earlier.is_empty());
        assert_eq!(db.count_dose_instances(&rx.prescription_id).unwrap(), 6);
    }

    #[test]
    fn test_expand_continues_where_it_left_off() {
        let db = Database::open_in_memory().unwrap();
        let rx = create_twice_daily(&db, 30);
        let scheduler = Scheduler::new(&db);

        scheduler
            .expand_pending(&rx.prescription_id, start() + Duration::days(1))
            .unwrap();
        let more = scheduler
            .expand_pending(&rx.prescription_id, start() + Duration::days(2))
            .unwrap();

        assert_eq!(more.len(), 2);
        assert_eq!(more[0].time, start() + Duration::days(1) + Duration::hours(8));
        assert_eq!(more[0].ordinal, 2);
        assert_eq!(more[1].ordinal, 3);
    }

    #[test]
    fn test_expand_assigns_refill_batches() {
        let db = Database::open_in_memory().unwrap();
        // 2 doses/day, 4 per fill: day 3 crosses into batch 1
        let rx = create_twice_daily(&db, 4);
        let scheduler = Scheduler::new(&db);

        let created = scheduler
            .expand_pending(&rx.prescription_id, start() + Duration::days(3))
            .unwrap();
        let batches: Vec<u32> = created.iter().map(|d| d.refill_batch).collect();
        assert_eq!(batches, vec![0, 0, 0, 0, 1, 1]);
    }

    #[test]
    fn test_expand_rejects_horizon_before_start() {
        let db = Database::open_in_memory().unwrap();
        let rx = create_twice_daily(&db, 30);
        let scheduler = Scheduler::new(&db);

        let result = scheduler.expand_pending(&rx.prescription_id, start());
        assert!(matches!(result, Err(SchedulerError::InvalidHorizon { .. })));
    }

    #[test]
    fn test_expand_unknown_prescription() {
        let db = Database::open_in_memory().unwrap();
        let scheduler = Scheduler::new(&db);
        let result = scheduler.expand_pending("nope", start() + Duration::days(1));
        assert!(matches!(result, Err(SchedulerError::PrescriptionNotFound(_))));
    }
}
