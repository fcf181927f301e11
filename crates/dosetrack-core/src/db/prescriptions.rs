//! Prescription database operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::{fmt_instant, parse_instant, Database, DbError, DbResult};
use crate::models::{Medication, Prescription, Schedule};

const SELECT_COLUMNS: &str = r#"
    SELECT prescription_id, user_id, medication, schedule, total_doses,
           refills, schedule_start, expanded_until, created_at, updated_at
    FROM prescriptions
"#;

impl Database {
    /// Insert a new prescription.
    pub fn insert_prescription(&self, rx: &Prescription) -> DbResult<()> {
        let medication_json = serde_json::to_string(&rx.medication)?;
        let schedule_json = serde_json::to_string(&rx.schedule)?;

        self.conn.execute(
            r#"
            INSERT INTO prescriptions (
                prescription_id, user_id, medication, schedule, total_doses,
                refills, schedule_start, expanded_until, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                rx.prescription_id,
                rx.user_id,
                medication_json,
                schedule_json,
                rx.total_doses,
                rx.refills,
                fmt_instant(rx.schedule_start),
                rx.expanded_until.map(fmt_instant),
                rx.created_at,
                rx.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a prescription by id.
    pub fn get_prescription(&self, prescription_id: &str) -> DbResult<Option<Prescription>> {
        self.conn
            .query_row(
                &format!("{} WHERE prescription_id = ?", SELECT_COLUMNS),
                [prescription_id],
                map_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List all prescriptions for a user, ordered by medication name.
    ///
    /// Ordering happens in Rust after decoding the medication JSON column;
    /// the comparison is case-sensitive byte-wise.
    pub fn list_prescriptions_for_user(&self, user_id: &str) -> DbResult<Vec<Prescription>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} WHERE user_id = ?", SELECT_COLUMNS))?;

        let rows = stmt.query_map([user_id], map_row)?;

        let mut prescriptions = Vec::new();
        for row in rows {
            prescriptions.push(Prescription::try_from(row?)?);
        }
        prescriptions.sort_by(|a, b| a.medication.name.cmp(&b.medication.name));
        Ok(prescriptions)
    }

    /// Advance the expansion bookmark after new dose instances are stored.
    pub fn set_expanded_until(
        &self,
        prescription_id: &str,
        expanded_until: DateTime<Utc>,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE prescriptions SET
                expanded_until = ?2,
                updated_at = datetime('now')
            WHERE prescription_id = ?1
            "#,
            params![prescription_id, fmt_instant(expanded_until)],
        )?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct PrescriptionRow {
    prescription_id: String,
    user_id: String,
    medication: String,
    schedule: String,
    total_doses: u32,
    refills: u32,
    schedule_start: String,
    expanded_until: Option<String>,
    created_at: String,
    updated_at: String,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PrescriptionRow> {
    Ok(PrescriptionRow {
        prescription_id: row.get(0)?,
        user_id: row.get(1)?,
        medication: row.get(2)?,
        schedule: row.get(3)?,
        total_doses: row.get(4)?,
        refills: row.get(5)?,
        schedule_start: row.get(6)?,
        expanded_until: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl TryFrom<PrescriptionRow> for Prescription {
    type Error = DbError;

    fn try_from(row: PrescriptionRow) -> Result<Self, Self::Error> {
        let medication: Medication = serde_json::from_str(&row.medication)?;
        // Deserialization bypasses the validating constructor; re-check the
        // schedule invariants so a corrupted column surfaces as an error
        // instead of breaking the expander.
        let raw: Schedule = serde_json::from_str(&row.schedule)?;
        let schedule = Schedule::new(raw.period_ms, raw.doses)
            .map_err(|e| DbError::Constraint(e.to_string()))?;

        Ok(Prescription {
            prescription_id: row.prescription_id,
            user_id: row.user_id,
            medication,
            schedule,
            total_doses: row.total_doses,
            refills: row.refills,
            schedule_start: parse_instant(&row.schedule_start)?,
            expanded_until: row.expanded_until.as_deref().map(parse_instant).transpose()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
