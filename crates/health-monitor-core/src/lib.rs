//! Health Monitor Core Library
//!
//! Local-first patient record keeping with oracle-assisted diagnosis.
//!
//! # Architecture
//!
//! ```text
//! Symptoms (+ image) → Patient record ──▶ Diagnosis prompt ──▶ Oracle
//!                            ▲                                   │
//!                            │                              raw reply
//!                            │                                   │
//!                     apply_diagnosis ◀──── Response parser ◀────┘
//!                            │
//!                     ┌──────┴──────┐
//!                     ▼             ▼
//!                JSON export    CSV export
//! ```
//!
//! # Core Principle
//!
//! **Visits are keyed by record ID, never by name.** Names are display data;
//! two patients may share one.
//!
//! # Modules
//!
//! - [`db`]: SQLite patient store
//! - [`models`]: Domain types (PatientRecord, VisitState)
//! - [`lifecycle`]: Visit state transitions over a [`lifecycle::PatientStore`]
//! - [`images`]: Content-addressed image storage
//! - [`workflow`]: Lifecycle + oracle + parser pipeline
//! - [`export`]: JSON and CSV record export

pub mod db;
pub mod export;
pub mod images;
pub mod lifecycle;
pub mod models;
pub mod workflow;

// Re-export commonly used types
pub use db::Database;
pub use export::{ExportError, RecordBatch, RecordExporter};
pub use images::{FsImageStore, ImageStore};
pub use lifecycle::{LifecycleError, PatientLifecycle, PatientStore};
pub use models::{PatientRecord, PromptContext, VisitState};
pub use workflow::{VisitOutcome, VisitWorkflow, WorkflowError};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use health_monitor_llm::{build_full_prompt, make_diagnosis_prompt, UNAVAILABLE_RESPONSE};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum HealthMonitorError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<db::DbError> for HealthMonitorError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(id) => HealthMonitorError::NotFound(id),
            other => HealthMonitorError::DatabaseError(other.to_string()),
        }
    }
}

impl From<LifecycleError> for HealthMonitorError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::Validation(msg) => HealthMonitorError::InvalidInput(msg),
            LifecycleError::NotFound(id) => HealthMonitorError::NotFound(id),
            LifecycleError::Store(e) => e.into(),
        }
    }
}

impl From<serde_json::Error> for HealthMonitorError {
    fn from(e: serde_json::Error) -> Self {
        HealthMonitorError::SerializationError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for HealthMonitorError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        HealthMonitorError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<HealthMonitorCore>, HealthMonitorError> {
    let db = Database::open(&path)?;
    Ok(Arc::new(HealthMonitorCore {
        db: Arc::new(Mutex::new(db)),
    }))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<HealthMonitorCore>, HealthMonitorError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(HealthMonitorCore {
        db: Arc::new(Mutex::new(db)),
    }))
}

/// Split a raw oracle reply into diagnosis and medicine suggestions.
#[uniffi::export]
pub fn parse_diagnosis_response(raw: String) -> FfiParsedDiagnosis {
    health_monitor_llm::parse_diagnosis_response(&raw).into()
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe database wrapper for FFI.
///
/// The host owns the oracle call: it fetches [`HealthMonitorCore::diagnosis_prompt`],
/// sends it, and hands the raw reply back to [`HealthMonitorCore::apply_oracle_response`].
#[derive(uniffi::Object)]
pub struct HealthMonitorCore {
    db: Arc<Mutex<Database>>,
}

#[uniffi::export]
impl HealthMonitorCore {
    // =========================================================================
    // Record Operations
    // =========================================================================

    /// Register a first visit.
    pub fn create_patient(
        &self,
        name: String,
        symptoms: String,
        image_reference: Option<String>,
    ) -> Result<FfiPatientRecord, HealthMonitorError> {
        let db = self.db.lock()?;
        let record = PatientLifecycle::new(&*db).create_record(&name, &symptoms, image_reference)?;
        Ok(record.into())
    }

    /// Get a record by ID.
    pub fn get_patient(&self, id: String) -> Result<Option<FfiPatientRecord>, HealthMonitorError> {
        let db = self.db.lock()?;
        let record = db.get_patient(&id)?;
        Ok(record.map(|r| r.into()))
    }

    /// Every record with exactly this name.
    pub fn find_patients_by_name(
        &self,
        name: String,
    ) -> Result<Vec<FfiPatientRecord>, HealthMonitorError> {
        let db = self.db.lock()?;
        let records = PatientLifecycle::new(&*db).find_by_name(&name)?;
        Ok(records.into_iter().map(|r| r.into()).collect())
    }

    /// List all records.
    pub fn list_patients(&self) -> Result<Vec<FfiPatientRecord>, HealthMonitorError> {
        let db = self.db.lock()?;
        let records = db.list_patients()?;
        Ok(records.into_iter().map(|r| r.into()).collect())
    }

    /// Start a returning visit for an existing record.
    pub fn record_visit(
        &self,
        id: String,
        symptoms: String,
        image_reference: Option<String>,
    ) -> Result<FfiPatientRecord, HealthMonitorError> {
        let db = self.db.lock()?;
        let record = PatientLifecycle::new(&*db).record_new_visit(&id, &symptoms, image_reference)?;
        Ok(record.into())
    }

    // =========================================================================
    // Diagnosis Operations
    // =========================================================================

    /// Full diagnosis prompt for the record's current visit.
    pub fn diagnosis_prompt(&self, id: String) -> Result<String, HealthMonitorError> {
        let db = self.db.lock()?;
        let record = PatientLifecycle::new(&*db).get(&id)?;
        let context = record.prompt_context();
        let with_image = context.image_reference.is_some();
        Ok(build_full_prompt(&make_diagnosis_prompt(
            &context.diagnosis_context(with_image),
        )))
    }

    /// Parse a raw oracle reply and store it as the current diagnosis.
    /// A reply with no diagnosis text is stored as an oracle failure.
    pub fn apply_oracle_response(
        &self,
        id: String,
        raw: String,
    ) -> Result<FfiPatientRecord, HealthMonitorError> {
        let db = self.db.lock()?;
        let parsed = health_monitor_llm::parse_diagnosis_response(&raw);
        let lifecycle = PatientLifecycle::new(&*db);
        let record = if parsed.diagnosis.trim().is_empty() {
            lifecycle.apply_diagnosis(&id, UNAVAILABLE_RESPONSE, None)?
        } else {
            lifecycle.apply_diagnosis(
                &id,
                &parsed.diagnosis,
                Some(&parsed.medicine_suggestions),
            )?
        };
        Ok(record.into())
    }

    /// Record that the oracle could not be reached for this visit.
    pub fn apply_oracle_failure(&self, id: String) -> Result<FfiPatientRecord, HealthMonitorError> {
        let db = self.db.lock()?;
        let record =
            PatientLifecycle::new(&*db).apply_diagnosis(&id, UNAVAILABLE_RESPONSE, None)?;
        Ok(record.into())
    }

    // =========================================================================
    // Export Operations
    // =========================================================================

    /// Export all records as JSON.
    pub fn export_records_json(&self) -> Result<String, HealthMonitorError> {
        let db = self.db.lock()?;
        let batch = RecordExporter::new(&db).export_all()?;
        Ok(batch.to_json()?)
    }

    /// Export all records as CSV.
    pub fn export_records_csv(&self) -> Result<String, HealthMonitorError> {
        let db = self.db.lock()?;
        let batch = RecordExporter::new(&db).export_all()?;
        Ok(batch.to_csv())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe patient record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientRecord {
    pub id: String,
    pub name: String,
    pub joining_date: String,
    pub symptoms: String,
    pub prev_diagnosis: Option<String>,
    pub latest_diagnosis: Option<String>,
    pub medicine_suggestions: Option<String>,
    pub image_reference: Option<String>,
    pub visit_state: String,
    pub updated_at: String,
}

impl From<PatientRecord> for FfiPatientRecord {
    fn from(record: PatientRecord) -> Self {
        Self {
            visit_state: format!("{:?}", record.visit_state()),
            id: record.id,
            name: record.name,
            joining_date: record.joining_date,
            symptoms: record.symptoms,
            prev_diagnosis: record.prev_diagnosis,
            latest_diagnosis: record.latest_diagnosis,
            medicine_suggestions: record.medicine_suggestions,
            image_reference: record.image_reference,
            updated_at: record.updated_at,
        }
    }
}

/// FFI-safe parsed oracle reply.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiParsedDiagnosis {
    pub diagnosis: String,
    pub medicine_suggestions: String,
    pub shape: String,
    pub degraded: bool,
}

impl From<health_monitor_llm::ParsedDiagnosis> for FfiParsedDiagnosis {
    fn from(parsed: health_monitor_llm::ParsedDiagnosis) -> Self {
        Self {
            shape: format!("{:?}", parsed.shape),
            degraded: parsed.shape.is_degraded(),
            diagnosis: parsed.diagnosis,
            medicine_suggestions: parsed.medicine_suggestions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffi_visit_cycle() {
        let core = open_database_in_memory().unwrap();
        let created = core
            .create_patient("Alice".into(), "fever".into(), None)
            .unwrap();
        assert_eq!(created.visit_state, "AwaitingDiagnosis");

        let prompt = core.diagnosis_prompt(created.id.clone()).unwrap();
        assert!(prompt.contains("fever"));

        let diagnosed = core
            .apply_oracle_response(
                created.id.clone(),
                "Diagnosis: Flu\nMedicine Suggestions: Rest".into(),
            )
            .unwrap();
        assert_eq!(diagnosed.latest_diagnosis, Some("Flu".into()));
        assert_eq!(diagnosed.medicine_suggestions, Some("Rest".into()));
        assert_eq!(diagnosed.visit_state, "Diagnosed");

        let revisited = core
            .record_visit(created.id.clone(), "cough".into(), None)
            .unwrap();
        assert_eq!(revisited.prev_diagnosis, Some("Flu".into()));
        assert!(revisited.latest_diagnosis.is_none());
    }

    #[test]
    fn test_ffi_oracle_failure() {
        let core = open_database_in_memory().unwrap();
        let created = core
            .create_patient("Bob".into(), "rash".into(), None)
            .unwrap();
        let failed = core.apply_oracle_failure(created.id).unwrap();
        assert_eq!(failed.latest_diagnosis.as_deref(), Some(UNAVAILABLE_RESPONSE));
        assert!(failed.medicine_suggestions.is_none());
    }

    #[test]
    fn test_ffi_empty_reply_is_failure() {
        let core = open_database_in_memory().unwrap();
        let created = core
            .create_patient("Cam".into(), "nausea".into(), None)
            .unwrap();
        let applied = core.apply_oracle_response(created.id, "   ".into()).unwrap();
        assert_eq!(applied.latest_diagnosis.as_deref(), Some(UNAVAILABLE_RESPONSE));
        assert_eq!(applied.visit_state, "Diagnosed");
    }

    #[test]
    fn test_ffi_error_mapping() {
        let core = open_database_in_memory().unwrap();
        assert!(matches!(
            core.record_visit("missing".into(), "cough".into(), None),
            Err(HealthMonitorError::NotFound(_))
        ));
        assert!(matches!(
            core.create_patient("".into(), "fever".into(), None),
            Err(HealthMonitorError::InvalidInput(_))
        ));
        assert!(core.get_patient("missing".into()).unwrap().is_none());
    }

    #[test]
    fn test_ffi_find_and_export() {
        let core = open_database_in_memory().unwrap();
        core.create_patient("Jordan".into(), "fever".into(), None)
            .unwrap();
        core.create_patient("Jordan".into(), "cough".into(), None)
            .unwrap();

        assert_eq!(core.find_patients_by_name("Jordan".into()).unwrap().len(), 2);
        assert_eq!(core.list_patients().unwrap().len(), 2);

        let csv = core.export_records_csv().unwrap();
        assert_eq!(csv.lines().count(), 3);
        let json = core.export_records_json().unwrap();
        assert!(json.contains("\"total\": 2"));
    }

    #[test]
    fn test_ffi_parse_diagnosis_response() {
        let parsed = parse_diagnosis_response("no markers at all".into());
        assert_eq!(parsed.diagnosis, "no markers at all");
        assert_eq!(parsed.shape, "Unstructured");
        assert!(parsed.degraded);
    }
}
