//! Dosetrack Core Library
//!
//! Recurring-dose scheduling and medication supply tracking engine.
//!
//! # Architecture
//!
//! ```text
//! Prescription (medication + schedule + supply)
//!        │
//!        ▼
//!  Dose Expander ── schedule × horizon ──► pending Dose Instances
//!        │                                        │
//!        │                          user marks taken / skipped
//!        │                                        │
//!        │                        ┌───────────────▼───────────────┐
//!        │                        │     Dose Lifecycle Store      │
//!        │                        │  atomic pending → taken/skip  │
//!        │                        └───────────────┬───────────────┘
//!        │                                        │
//!        ▼                                        ▼
//!  Supply Tracker ◄──────────────── current remaining set
//!        │
//!        ▼
//!  Remaining-Doses View (per-medication summaries)
//! ```
//!
//! # Core Principle
//!
//! **Dose instances resolve exactly once.** A taken/skipped dose is retired
//! from the remaining set but never deleted; a second transition request is
//! rejected, never silently absorbed.
//!
//! # Modules
//!
//! - [`db`]: SQLite storage layer and the dose lifecycle store
//! - [`models`]: Domain types (Medication, Schedule, Prescription, DoseInstance)
//! - [`scheduler`]: Dose expander and supply tracker
//! - [`view`]: Remaining-doses view composition

pub mod db;
pub mod models;
pub mod scheduler;
pub mod view;

// Re-export commonly used types
pub use db::{Database, TransitionError};
pub use models::{
    DoseInstance, DoseState, DoseTemplate, Medication, Prescription, RemainingDoses, Schedule,
    ScheduleError,
};
pub use scheduler::{
    expand, summarize, PlannedDose, Scheduler, SchedulerError, SupplyConfig, SupplySummary,
};
pub use view::RemainingDosesView;

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum DosetrackError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already resolved: {0}")]
    AlreadyResolved(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Invalid horizon: {0}")]
    InvalidHorizon(String),

    #[error("Invalid supply config: {0}")]
    InvalidSupplyConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<db::DbError> for DosetrackError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(what) => DosetrackError::NotFound(what),
            other => DosetrackError::DatabaseError(other.to_string()),
        }
    }
}

impl From<models::ScheduleError> for DosetrackError {
    fn from(e: models::ScheduleError) -> Self {
        DosetrackError::InvalidSchedule(e.to_string())
    }
}

impl From<scheduler::SchedulerError> for DosetrackError {
    fn from(e: scheduler::SchedulerError) -> Self {
        match e {
            scheduler::SchedulerError::Database(db) => db.into(),
            scheduler::SchedulerError::InvalidSchedule(s) => s.into(),
            scheduler::SchedulerError::InvalidHorizon { .. } => {
                DosetrackError::InvalidHorizon(e.to_string())
            }
            scheduler::SchedulerError::InvalidSupplyConfig => {
                DosetrackError::InvalidSupplyConfig(e.to_string())
            }
            scheduler::SchedulerError::PrescriptionNotFound(id) => DosetrackError::NotFound(id),
        }
    }
}

impl From<db::TransitionError> for DosetrackError {
    fn from(e: db::TransitionError) -> Self {
        match e {
            db::TransitionError::NotFound(id) => DosetrackError::NotFound(id),
            db::TransitionError::AlreadyResolved(id) => DosetrackError::AlreadyResolved(id),
            db::TransitionError::InvalidTarget => DosetrackError::InvalidInput(e.to_string()),
            db::TransitionError::Database(db) => db.into(),
        }
    }
}

impl From<serde_json::Error> for DosetrackError {
    fn from(e: serde_json::Error) -> Self {
        DosetrackError::SerializationError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for DosetrackError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        DosetrackError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

/// Parse an RFC 3339 instant from the FFI boundary.
fn parse_instant(s: &str) -> Result<DateTime<Utc>, DosetrackError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DosetrackError::InvalidInput(format!("Bad timestamp {:?}: {}", s, e)))
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<DosetrackCore>, DosetrackError> {
    let db = Database::open(&path)?;
    Ok(Arc::new(DosetrackCore {
        db: Arc::new(Mutex::new(db)),
    }))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<DosetrackCore>, DosetrackError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(DosetrackCore {
        db: Arc::new(Mutex::new(db)),
    }))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe database wrapper for FFI.
#[derive(uniffi::Object)]
pub struct DosetrackCore {
    db: Arc<Mutex<Database>>,
}

#[uniffi::export]
impl DosetrackCore {
    // =========================================================================
    // Prescription Operations
    // =========================================================================

    /// Register a new prescription. Rejects malformed schedules and supply
    /// configs without storing anything.
    pub fn create_prescription(
        &self,
        req: FfiNewPrescription,
    ) -> Result<FfiPrescription, DosetrackError> {
        let schedule_start = parse_instant(&req.schedule_start)?;
        let db = self.db.lock()?;
        let scheduler = Scheduler::new(&db);
        let rx = scheduler.create_prescription(
            &req.user_id,
            Medication::new(req.medication_name, req.generic, req.brand),
            req.period_ms,
            req.doses.into_iter().map(Into::into).collect(),
            req.total_doses,
            req.refills,
            schedule_start,
        )?;
        Ok(rx.into())
    }

    /// Get a prescription by id.
    pub fn get_prescription(
        &self,
        prescription_id: String,
    ) -> Result<Option<FfiPrescription>, DosetrackError> {
        let db = self.db.lock()?;
        let rx = db.get_prescription(&prescription_id)?;
        Ok(rx.map(|r| r.into()))
    }

    /// List a user's prescriptions, sorted by medication name.
    pub fn list_prescriptions(
        &self,
        user_id: String,
    ) -> Result<Vec<FfiPrescription>, DosetrackError> {
        let db = self.db.lock()?;
        let prescriptions = db.list_prescriptions_for_user(&user_id)?;
        Ok(prescriptions.into_iter().map(|r| r.into()).collect())
    }

    // =========================================================================
    // Expansion Operations
    // =========================================================================

    /// Expand a prescription's schedule up to `horizon_end` (RFC 3339),
    /// returning only the newly created dose instances. Idempotent for
    /// non-advancing horizons.
    pub fn expand_pending(
        &self,
        prescription_id: String,
        horizon_end: String,
    ) -> Result<Vec<FfiDoseInstance>, DosetrackError> {
        let horizon_end = parse_instant(&horizon_end)?;
        let db = self.db.lock()?;
        let scheduler = Scheduler::new(&db);
        let created = scheduler.expand_pending(&prescription_id, horizon_end)?;
        Ok(created.into_iter().map(|d| d.into()).collect())
    }

    // =========================================================================
    // Lifecycle Operations
    // =========================================================================

    /// Mark a pending dose as taken.
    pub fn mark_dose_taken(&self, dose_id: String) -> Result<FfiDoseInstance, DosetrackError> {
        let db = self.db.lock()?;
        let dose = db.transition_dose(&dose_id, DoseState::Taken)?;
        Ok(dose.into())
    }

    /// Mark a pending dose as skipped.
    pub fn mark_dose_skipped(&self, dose_id: String) -> Result<FfiDoseInstance, DosetrackError> {
        let db = self.db.lock()?;
        let dose = db.transition_dose(&dose_id, DoseState::Skipped)?;
        Ok(dose.into())
    }

    // =========================================================================
    // View Operations
    // =========================================================================

    /// Per-medication remaining-doses summaries for a user.
    pub fn get_remaining_doses(
        &self,
        user_id: String,
    ) -> Result<Vec<FfiRemainingDoses>, DosetrackError> {
        let db = self.db.lock()?;
        let view = RemainingDosesView::new(&db);
        let summaries = view.for_user(&user_id)?;
        Ok(summaries.into_iter().map(|s| s.into()).collect())
    }

    /// Every dose instance ever generated for a prescription, resolved ones
    /// included.
    pub fn dose_history(
        &self,
        prescription_id: String,
    ) -> Result<Vec<FfiDoseInstance>, DosetrackError> {
        let db = self.db.lock()?;
        let doses = db.list_dose_history(&prescription_id)?;
        Ok(doses.into_iter().map(|d| d.into()).collect())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe medication.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedication {
    pub medication_id: String,
    pub name: String,
    pub generic: bool,
    pub brand: Option<String>,
}

impl From<Medication> for FfiMedication {
    fn from(med: Medication) -> Self {
        Self {
            medication_id: med.medication_id,
            name: med.name,
            generic: med.generic,
            brand: med.brand,
        }
    }
}

/// FFI-safe dose template.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDoseTemplate {
    pub offset_ms: i64,
    pub amount: f64,
    pub unit: String,
}

impl From<FfiDoseTemplate> for DoseTemplate {
    fn from(t: FfiDoseTemplate) -> Self {
        DoseTemplate {
            offset_ms: t.offset_ms,
            amount: t.amount,
            unit: t.unit,
        }
    }
}

impl From<DoseTemplate> for FfiDoseTemplate {
    fn from(t: DoseTemplate) -> Self {
        Self {
            offset_ms: t.offset_ms,
            amount: t.amount,
            unit: t.unit,
        }
    }
}

/// FFI-safe prescription creation request.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewPrescription {
    pub user_id: String,
    pub medication_name: String,
    pub generic: bool,
    pub brand: Option<String>,
    pub period_ms: i64,
    pub doses: Vec<FfiDoseTemplate>,
    pub total_doses: u32,
    pub refills: u32,
    /// RFC 3339
    pub schedule_start: String,
}

/// FFI-safe prescription.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPrescription {
    pub prescription_id: String,
    pub user_id: String,
    pub medication: FfiMedication,
    pub period_ms: i64,
    pub doses: Vec<FfiDoseTemplate>,
    pub total_doses: u32,
    pub refills: u32,
    pub schedule_start: String,
    pub expanded_until: Option<String>,
}

impl From<Prescription> for FfiPrescription {
    fn from(rx: Prescription) -> Self {
        Self {
            prescription_id: rx.prescription_id,
            user_id: rx.user_id,
            medication: rx.medication.into(),
            period_ms: rx.schedule.period_ms,
            doses: rx.schedule.doses.into_iter().map(Into::into).collect(),
            total_doses: rx.total_doses,
            refills: rx.refills,
            schedule_start: rx.schedule_start.to_rfc3339(),
            expanded_until: rx.expanded_until.map(|t| t.to_rfc3339()),
        }
    }
}

/// FFI-safe dose instance.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDoseInstance {
    pub dose_id: String,
    pub prescription_id: String,
    pub ordinal: u32,
    /// RFC 3339
    pub time: String,
    pub amount: f64,
    pub unit: String,
    pub refill_batch: u32,
    pub state: String,
    pub resolved_at: Option<String>,
}

impl From<DoseInstance> for FfiDoseInstance {
    fn from(dose: DoseInstance) -> Self {
        Self {
            dose_id: dose.dose_id,
            prescription_id: dose.prescription_id,
            ordinal: dose.ordinal,
            time: dose.time.to_rfc3339(),
            amount: dose.amount,
            unit: dose.unit,
            refill_batch: dose.refill_batch,
            state: dose.state.as_str().to_string(),
            resolved_at: dose.resolved_at,
        }
    }
}

/// FFI-safe remaining-doses summary.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRemainingDoses {
    pub prescription_id: String,
    pub medication: FfiMedication,
    pub doses: Vec<FfiDoseInstance>,
    pub doses_until_refill: u32,
    pub doses_until_empty: u32,
}

impl From<RemainingDoses> for FfiRemainingDoses {
    fn from(summary: RemainingDoses) -> Self {
        Self {
            prescription_id: summary.prescription_id,
            medication: summary.medication.into(),
            doses: summary.doses.into_iter().map(Into::into).collect(),
            doses_until_refill: summary.doses_until_refill,
            doses_until_empty: summary.doses_until_empty,
        }
    }
}
