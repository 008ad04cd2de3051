//! SQLite schema definition.

/// Complete database schema for the clinic queue.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Patients (Append-Only - Immutable after creation)
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY,                          -- UUID v4
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    doctor TEXT NOT NULL,                         -- doctor display name
    appointment_number TEXT NOT NULL,             -- <TAG>-#<N>
    date_added TEXT NOT NULL,                     -- RFC 3339 UTC, millisecond precision
    status TEXT NOT NULL DEFAULT 'Active' CHECK (status IN ('Active'))
);

CREATE INDEX IF NOT EXISTS idx_patients_doctor ON patients(doctor);
CREATE INDEX IF NOT EXISTS idx_patients_date_added ON patients(date_added);

-- Records are created or bulk-deleted, never edited
CREATE TRIGGER IF NOT EXISTS patients_immutable BEFORE UPDATE ON patients
BEGIN
    SELECT RAISE(ABORT, 'Patient records are immutable');
END;

-- ============================================================================
-- Appointment Counters (one row per doctor)
-- ============================================================================

CREATE TABLE IF NOT EXISTS counters (
    doctor_id TEXT PRIMARY KEY,
    value INTEGER NOT NULL DEFAULT 0 CHECK (value >= 0),
    last_updated TEXT NOT NULL
);

-- ============================================================================
-- Meta (daily reset marker)
-- ============================================================================

CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
