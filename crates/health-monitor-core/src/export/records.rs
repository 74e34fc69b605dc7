//! Patient record export (JSON and CSV).

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::db::{Database, DbError, DbResult};
use crate::models::PatientRecord;

const CSV_HEADER: &str = "patient_id,name,joining_date,symptoms,prev_diagnosis,latest_diagnosis,medicine_suggestions,image_reference,updated_at\n";

/// Export errors.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Store error: {0}")]
    Store(#[from] DbError),

    #[error("Invalid timestamp {0:?}: expected RFC 3339")]
    InvalidTimestamp(String),
}

pub type ExportResult<T> = Result<T, ExportError>;

/// Batch record export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordBatch {
    /// Export timestamp
    pub exported_at: String,
    /// Exported records
    pub records: Vec<PatientRecord>,
    /// Record count
    pub total: usize,
}

impl RecordBatch {
    pub fn new(records: Vec<PatientRecord>) -> Self {
        Self {
            exported_at: chrono::Utc::now().to_rfc3339(),
            total: records.len(),
            records,
        }
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV format.
    pub fn to_csv(&self) -> String {
        let mut csv = String::from(CSV_HEADER);

        for record in &self.records {
            csv.push_str(&format!(
                "{},{},{},{},{},{},{},{},{}\n",
                escape_csv(&record.id),
                escape_csv(&record.name),
                escape_csv(&record.joining_date),
                escape_csv(&record.symptoms),
                escape_csv(record.prev_diagnosis.as_deref().unwrap_or("")),
                escape_csv(record.latest_diagnosis.as_deref().unwrap_or("")),
                escape_csv(record.medicine_suggestions.as_deref().unwrap_or("")),
                escape_csv(record.image_reference.as_deref().unwrap_or("")),
                escape_csv(&record.updated_at),
            ));
        }

        csv
    }
}

/// Record exporter.
pub struct RecordExporter<'a> {
    db: &'a Database,
}

impl<'a> RecordExporter<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Export every stored record.
    pub fn export_all(&self) -> DbResult<RecordBatch> {
        Ok(RecordBatch::new(self.db.list_patients()?))
    }

    /// Export records updated at or after an RFC 3339 timestamp.
    pub fn export_since(&self, since: &str) -> ExportResult<RecordBatch> {
        let since = parse_timestamp(since)
            .ok_or_else(|| ExportError::InvalidTimestamp(since.to_string()))?;

        let records = self
            .db
            .list_patients()?
            .into_iter()
            .filter(|r| match parse_timestamp(&r.updated_at) {
                Some(updated) => updated >= since,
                None => {
                    warn!(patient_id = %r.id, updated_at = %r.updated_at, "Skipping record with unparseable timestamp");
                    false
                }
            })
            .collect();
        Ok(RecordBatch::new(records))
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value.trim()).ok()
}

/// Escape a string for CSV output.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
