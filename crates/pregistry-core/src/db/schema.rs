//! SQLite schema definition.

/// Schema bootstrapped on first open of a store.
///
/// Create-if-absent only: an existing `patients` table is left exactly as found.
/// The constraints keep every stored row decodable as a patient, including rows
/// written by hand through the query console: `dob` must be an ISO `YYYY-MM-DD`
/// date and `id` may not be NULL.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY NOT NULL,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    dob DATE NOT NULL CHECK (dob IS date(dob)),
    gender TEXT NOT NULL,
    blood_group TEXT NOT NULL,
    city TEXT NOT NULL,
    state TEXT NOT NULL,
    country TEXT NOT NULL,
    address TEXT NOT NULL,
    phone TEXT NOT NULL,
    email TEXT NOT NULL,
    insurance TEXT,
    policy_number TEXT,
    medical_history TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
);
"#;
