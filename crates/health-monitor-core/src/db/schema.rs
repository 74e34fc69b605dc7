//! SQLite schema definition.

/// Complete database schema for the health monitor.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    patient_id TEXT PRIMARY KEY,                 -- UUID, never reused
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    joining_date TEXT NOT NULL,                  -- YYYY-MM-DD, set once
    symptoms TEXT NOT NULL CHECK (length(trim(symptoms)) > 0),
    prev_diagnosis TEXT,                         -- NULL for a new patient
    latest_diagnosis TEXT,                       -- NULL while awaiting diagnosis
    medicine_suggestions TEXT,
    image_reference TEXT,                        -- opaque image store handle
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(name);

-- joining_date is immutable once written
CREATE TRIGGER IF NOT EXISTS patients_joining_date_immutable
BEFORE UPDATE OF joining_date ON patients
WHEN new.joining_date IS NOT old.joining_date
BEGIN
    SELECT RAISE(ABORT, 'joining_date is immutable');
END;
"#;
