//! Patient record lifecycle.
//!
//! Visit flow:
//!
//! ```text
//! NEW ──create_record──▶ AWAITING_DIAGNOSIS ──apply_diagnosis──▶ DIAGNOSED
//!                               ▲                                    │
//!                               └────────── record_new_visit ────────┘
//! ```
//!
//! Diagnosis history is a single slot: starting a visit moves the latest
//! diagnosis into `prev_diagnosis`, overwriting whatever was there.

use thiserror::Error;
use tracing::info;

use crate::db::{DbError, DbResult};
use crate::models::PatientRecord;

/// Record store used by the lifecycle.
pub trait PatientStore {
    /// Persist a new record and return its ID.
    fn create(&self, record: &PatientRecord) -> DbResult<String>;

    fn get(&self, id: &str) -> DbResult<Option<PatientRecord>>;

    /// Overwrite an existing record. Fails with [`DbError::NotFound`] if absent.
    fn save(&self, record: &PatientRecord) -> DbResult<()>;

    /// Every record carrying exactly this display name. Names are not identities.
    fn find_by_name(&self, name: &str) -> DbResult<Vec<PatientRecord>>;
}

impl<T: PatientStore + ?Sized> PatientStore for &T {
    fn create(&self, record: &PatientRecord) -> DbResult<String> {
        (**self).create(record)
    }

    fn get(&self, id: &str) -> DbResult<Option<PatientRecord>> {
        (**self).get(id)
    }

    fn save(&self, record: &PatientRecord) -> DbResult<()> {
        (**self).save(record)
    }

    fn find_by_name(&self, name: &str) -> DbResult<Vec<PatientRecord>> {
        (**self).find_by_name(name)
    }
}

/// Lifecycle errors.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Patient not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] DbError),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Applies visit transitions to stored records.
pub struct PatientLifecycle<S> {
    store: S,
}

impl<S: PatientStore> PatientLifecycle<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Register a first visit.
    pub fn create_record(
        &self,
        name: &str,
        symptoms: &str,
        image_reference: Option<String>,
    ) -> LifecycleResult<PatientRecord> {
        require("name", name)?;
        require("symptoms", symptoms)?;

        let record = PatientRecord::new(name.to_string(), symptoms.to_string(), image_reference);
        self.store.create(&record)?;
        info!(patient_id = %record.id, "Created patient record");
        Ok(record)
    }

    /// Start a returning visit: roll the diagnosis forward and record new symptoms.
    pub fn record_new_visit(
        &self,
        id: &str,
        symptoms: &str,
        image_reference: Option<String>,
    ) -> LifecycleResult<PatientRecord> {
        require("symptoms", symptoms)?;

        let mut record = self.load(id)?;
        record.roll_forward(symptoms.to_string(), image_reference);
        self.save(&record)?;
        info!(
            patient_id = %record.id,
            has_previous = record.prev_diagnosis.is_some(),
            "Recorded new visit"
        );
        Ok(record)
    }

    /// Store a diagnosis for the current visit.
    pub fn apply_diagnosis(
        &self,
        id: &str,
        diagnosis: &str,
        medicine_suggestions: Option<&str>,
    ) -> LifecycleResult<PatientRecord> {
        let mut record = self.load(id)?;
        record.apply_diagnosis(
            diagnosis.to_string(),
            medicine_suggestions.map(str::to_string),
        );
        self.save(&record)?;
        Ok(record)
    }

    pub fn get(&self, id: &str) -> LifecycleResult<PatientRecord> {
        self.load(id)
    }

    /// Explicit name lookup. Returns every match; callers pick by ID.
    pub fn find_by_name(&self, name: &str) -> LifecycleResult<Vec<PatientRecord>> {
        require("name", name)?;
        Ok(self.store.find_by_name(name)?)
    }

    fn load(&self, id: &str) -> LifecycleResult<PatientRecord> {
        self.store
            .get(id)?
            .ok_or_else(|| LifecycleError::NotFound(id.to_string()))
    }

    fn save(&self, record: &PatientRecord) -> LifecycleResult<()> {
        self.store.save(record).map_err(|e| match e {
            DbError::NotFound(id) => LifecycleError::NotFound(id),
            other => LifecycleError::Store(other),
        })
    }
}

/// Reject empty or whitespace-only input.
pub(crate) fn require(field: &str, value: &str) -> LifecycleResult<()> {
    if value.trim().is_empty() {
        Err(LifecycleError::Validation(format!("{} must not be empty", field)))
    } else {
        Ok(())
    }
}
