//! Patient database operations.

use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::{Database, DbError, DbResult};
use crate::lifecycle::PatientStore;
use crate::models::PatientRecord;

const PATIENT_COLUMNS: &str = r#"
    patient_id, name, joining_date, symptoms, prev_diagnosis,
    latest_diagnosis, medicine_suggestions, image_reference,
    created_at, updated_at
"#;

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<PatientRecord> {
    Ok(PatientRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        joining_date: row.get(2)?,
        symptoms: row.get(3)?,
        prev_diagnosis: row.get(4)?,
        latest_diagnosis: row.get(5)?,
        medicine_suggestions: row.get(6)?,
        image_reference: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl Database {
    /// Insert a new patient.
    pub fn insert_patient(&self, patient: &PatientRecord) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO patients (
                patient_id, name, joining_date, symptoms, prev_diagnosis,
                latest_diagnosis, medicine_suggestions, image_reference,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                patient.id,
                patient.name,
                patient.joining_date,
                patient.symptoms,
                patient.prev_diagnosis,
                patient.latest_diagnosis,
                patient.medicine_suggestions,
                patient.image_reference,
                patient.created_at,
                patient.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update an existing patient. `joining_date` and `created_at` are never rewritten.
    pub fn update_patient(&self, patient: &PatientRecord) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE patients SET
                name = ?2,
                symptoms = ?3,
                prev_diagnosis = ?4,
                latest_diagnosis = ?5,
                medicine_suggestions = ?6,
                image_reference = ?7,
                updated_at = ?8
            WHERE patient_id = ?1
            "#,
            params![
                patient.id,
                patient.name,
                patient.symptoms,
                patient.prev_diagnosis,
                patient.latest_diagnosis,
                patient.medicine_suggestions,
                patient.image_reference,
                patient.updated_at,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, id: &str) -> DbResult<Option<PatientRecord>> {
        let sql = format!("SELECT {} FROM patients WHERE patient_id = ?", PATIENT_COLUMNS);
        self.conn
            .query_row(&sql, [id], patient_from_row)
            .optional()
            .map_err(Into::into)
    }

    /// All patients whose name matches exactly, oldest first.
    pub fn find_patients_by_name(&self, name: &str) -> DbResult<Vec<PatientRecord>> {
        let sql = format!(
            "SELECT {} FROM patients WHERE name = ? ORDER BY created_at, patient_id",
            PATIENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([name], patient_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// List all patients.
    pub fn list_patients(&self) -> DbResult<Vec<PatientRecord>> {
        let sql = format!(
            "SELECT {} FROM patients ORDER BY joining_date, name",
            PATIENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], patient_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Count stored patients.
    pub fn count_patients(&self) -> DbResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl PatientStore for Database {
    fn create(&self, record: &PatientRecord) -> DbResult<String> {
        self.insert_patient(record)?;
        debug!(patient_id = %record.id, "Inserted patient");
        Ok(record.id.clone())
    }

    fn get(&self, id: &str) -> DbResult<Option<PatientRecord>> {
        self.get_patient(id)
    }

    fn save(&self, record: &PatientRecord) -> DbResult<()> {
        if self.update_patient(record)? {
            debug!(patient_id = %record.id, "Saved patient");
            Ok(())
        } else {
            Err(DbError::NotFound(record.id.clone()))
        }
    }

    fn find_by_name(&self, name: &str) -> DbResult<Vec<PatientRecord>> {
        self.find_patients_by_name(name)
    }
}
