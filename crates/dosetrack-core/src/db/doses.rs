//! Dose instance database operations: storage plus the lifecycle store.
//!
//! The lifecycle transition is a single conditional UPDATE (compare-and-set
//! on `state = 'pending'`), so two competing requests for the same dose
//! resolve deterministically: exactly one succeeds, the other sees
//! `AlreadyResolved`.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use thiserror::Error;
use tracing::info;

use super::{fmt_instant, parse_instant, Database, DbError, DbResult};
use crate::models::{DoseInstance, DoseState};

/// Lifecycle transition failures.
#[derive(Error, Debug)]
pub enum TransitionError {
    #[error("Dose instance not found: {0}")]
    NotFound(String),

    #[error("Dose instance already resolved: {0}")]
    AlreadyResolved(String),

    #[error("Target state must be taken or skipped")]
    InvalidTarget,

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<rusqlite::Error> for TransitionError {
    fn from(e: rusqlite::Error) -> Self {
        TransitionError::Database(e.into())
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT dose_id, prescription_id, ordinal, time, amount, unit,
           refill_batch, state, created_at, resolved_at
    FROM dose_instances
"#;

impl Database {
    /// Store a batch of newly expanded dose instances and advance the owning
    /// prescription's expansion bookmark, atomically.
    pub fn insert_dose_instances(
        &self,
        prescription_id: &str,
        doses: &[DoseInstance],
        expanded_until: DateTime<Utc>,
    ) -> DbResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO dose_instances (
                    dose_id, prescription_id, ordinal, time, amount, unit,
                    refill_batch, state, created_at, resolved_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )?;
            for dose in doses {
                stmt.execute(params![
                    dose.dose_id,
                    dose.prescription_id,
                    dose.ordinal,
                    fmt_instant(dose.time),
                    dose.amount,
                    dose.unit,
                    dose.refill_batch,
                    dose.state.as_str(),
                    dose.created_at,
                    dose.resolved_at,
                ])?;
            }
        }
        // Runs on the same connection, so it joins the open transaction; an
        // early return here rolls the inserted rows back.
        if !self.set_expanded_until(prescription_id, expanded_until)? {
            return Err(DbError::NotFound(format!(
                "prescription {}",
                prescription_id
            )));
        }
        tx.commit()?;
        Ok(())
    }

    /// Get a dose instance by id.
    pub fn get_dose_instance(&self, dose_id: &str) -> DbResult<Option<DoseInstance>> {
        self.conn
            .query_row(
                &format!("{} WHERE dose_id = ?", SELECT_COLUMNS),
                [dose_id],
                map_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List the outstanding (pending) instances for a prescription.
    ///
    /// Ordinal order is chronological order; ties between equal times keep
    /// the declared template order.
    pub fn list_pending_doses(&self, prescription_id: &str) -> DbResult<Vec<DoseInstance>> {
        self.list_doses_where(prescription_id, "AND state = 'pending'")
    }

    /// List every instance ever generated for a prescription, resolved ones
    /// included.
    pub fn list_dose_history(&self, prescription_id: &str) -> DbResult<Vec<DoseInstance>> {
        self.list_doses_where(prescription_id, "")
    }

    /// Count all instances generated for a prescription (any state); the
    /// next expansion continues ordinals from here.
    pub fn count_dose_instances(&self, prescription_id: &str) -> DbResult<u32> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM dose_instances WHERE prescription_id = ?",
            [prescription_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Transition a pending dose instance to `Taken` or `Skipped`.
    ///
    /// Repeating a transition for an already-resolved dose is a caller error
    /// (a stale view), reported as `AlreadyResolved` - never a silent no-op.
    pub fn transition_dose(
        &self,
        dose_id: &str,
        target: DoseState,
    ) -> Result<DoseInstance, TransitionError> {
        if !target.is_terminal() {
            return Err(TransitionError::InvalidTarget);
        }

        let rows_affected = self.conn.execute(
            r#"
            UPDATE dose_instances SET
                state = ?2,
                resolved_at = datetime('now')
            WHERE dose_id = ?1 AND state = 'pending'
            "#,
            params![dose_id, target.as_str()],
        )?;

        if rows_affected == 0 {
            // Lost the compare-and-set: either the id is unknown or another
            // request resolved the dose first.
            return match self.get_dose_instance(dose_id)? {
                None => Err(TransitionError::NotFound(dose_id.to_string())),
                Some(_) => Err(TransitionError::AlreadyResolved(dose_id.to_string())),
            };
        }

        let dose = self
            .get_dose_instance(dose_id)?
            .ok_or_else(|| TransitionError::NotFound(dose_id.to_string()))?;
        info!(dose_id, state = target.as_str(), "dose resolved");
        Ok(dose)
    }

    fn list_doses_where(
        &self,
        prescription_id: &str,
        extra_clause: &str,
    ) -> DbResult<Vec<DoseInstance>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE prescription_id = ? {} ORDER BY ordinal",
            SELECT_COLUMNS, extra_clause
        ))?;

        let rows = stmt.query_map([prescription_id], map_row)?;

        let mut doses = Vec::new();
        for row in rows {
            doses.push(DoseInstance::try_from(row?)?);
        }
        Ok(doses)
    }
}

/// Intermediate row struct for database mapping.
struct DoseRow {
    dose_id: String,
    prescription_id: String,
    ordinal: u32,
    time: String,
    amount: f64,
    unit: String,
    refill_batch: u32,
    state: String,
    created_at: String,
    resolved_at: Option<String>,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DoseRow> {
    Ok(DoseRow {
        dose_id: row.get(0)?,
        prescription_id: row.get(1)?,
        ordinal: row.get(2)?,
        time: row.get(3)?,
        amount: row.get(4)?,
        unit: row.get(5)?,
        refill_batch: row.get(6)?,
        state: row.get(7)?,
        created_at: row.get(8)?,
        resolved_at: row.get(9)?,
    })
}

impl TryFrom<DoseRow> for DoseInstance {
    type Error = DbError;

    fn try_from(row: DoseRow) -> Result<Self, Self::Error> {
        Ok(DoseInstance {
            dose_id: row.dose_id,
            prescription_id: row.prescription_id,
            ordinal: row.ordinal,
            time: parse_instant(&row.time)?,
            amount: row.amount,
            unit: row.unit,
            refill_batch: row.refill_batch,
            state: string_to_state(&row.state)?,
            created_at: row.created_at,
            resolved_at: row.resolved_at,
        })
    }
}

fn string_to_state(s: &str) -> Result<DoseState, DbError> {
    match s {
        "pending" => Ok(DoseState::Pending),
        "taken" => Ok(DoseState::Taken),
        "skipped" => Ok(DoseState::Skipped),
        _ => Err(DbError::Constraint(format!("Unknown dose state: {}", s))),
    }
}
