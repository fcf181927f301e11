//! SQLite schema definition.

/// Complete database schema for dosetrack.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Prescriptions
-- ============================================================================

CREATE TABLE IF NOT EXISTS prescriptions (
    prescription_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    medication TEXT NOT NULL,                    -- JSON object (Medication)
    schedule TEXT NOT NULL,                      -- JSON object (Schedule)
    total_doses INTEGER NOT NULL CHECK (total_doses > 0),
    refills INTEGER NOT NULL DEFAULT 0,
    schedule_start TEXT NOT NULL,                -- RFC 3339 UTC
    expanded_until TEXT,                         -- RFC 3339 UTC, NULL until first expansion
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_prescriptions_user ON prescriptions(user_id);

-- ============================================================================
-- Dose Instances (Append-Only - state resolves exactly once)
-- ============================================================================

CREATE TABLE IF NOT EXISTS dose_instances (
    dose_id TEXT PRIMARY KEY,
    prescription_id TEXT NOT NULL REFERENCES prescriptions(prescription_id),
    ordinal INTEGER NOT NULL,                    -- chronological sequence within prescription
    time TEXT NOT NULL,                          -- RFC 3339 UTC, fixed width (lexical order == chronological)
    amount REAL NOT NULL,
    unit TEXT NOT NULL,
    refill_batch INTEGER NOT NULL,
    state TEXT NOT NULL DEFAULT 'pending' CHECK (state IN ('pending', 'taken', 'skipped')),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    resolved_at TEXT,
    UNIQUE (prescription_id, ordinal)
);

-- Resolved instances are immutable: taken/skipped is terminal
CREATE TRIGGER IF NOT EXISTS dose_instances_state_terminal BEFORE UPDATE OF state ON dose_instances
WHEN old.state != 'pending'
BEGIN
    SELECT RAISE(ABORT, 'Resolved dose instances cannot change state');
END;

-- Rows are history; never physically removed
CREATE TRIGGER IF NOT EXISTS dose_instances_no_delete BEFORE DELETE ON dose_instances
BEGIN
    SELECT RAISE(ABORT, 'Dose instances are retained for history');
END;

CREATE INDEX IF NOT EXISTS idx_doses_prescription ON dose_instances(prescription_id, ordinal);
CREATE INDEX IF NOT EXISTS idx_doses_pending ON dose_instances(prescription_id, state);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn setup_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn
    }

    fn insert_fixture_rows(conn: &Connection) {
        conn.execute(
            r#"INSERT INTO prescriptions (prescription_id, user_id, medication, schedule, total_doses, refills, schedule_start)
               VALUES ('rx-1', 'user-1', '{}', '{}', 30, 1, '2024-01-01T00:00:00.000Z')"#,
            [],
        )
        .unwrap();
        conn.execute(
            r#"INSERT INTO dose_instances (dose_id, prescription_id, ordinal, time, amount, unit, refill_batch)
               VALUES ('dose-1', 'rx-1', 0, '2024-01-01T08:00:00.000Z', 1.0, 'tab', 0)"#,
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_zero_total_doses_rejected() {
        let conn = setup_conn();
        let result = conn.execute(
            r#"INSERT INTO prescriptions (prescription_id, user_id, medication, schedule, total_doses, refills, schedule_start)
               VALUES ('rx-1', 'user-1', '{}', '{}', 0, 1, '2024-01-01T00:00:00.000Z')"#,
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_state_rejected() {
        let conn = setup_conn();
        insert_fixture_rows(&conn);

        let result = conn.execute(
            "UPDATE dose_instances SET state = 'misplaced' WHERE dose_id = 'dose-1'",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_terminal_state_trigger() {
        let conn = setup_conn();
        insert_fixture_rows(&conn);

        // Pending -> taken succeeds
        conn.execute(
            "UPDATE dose_instances SET state = 'taken' WHERE dose_id = 'dose-1'",
            [],
        )
        .unwrap();

        // Taken -> skipped is blocked
        let result = conn.execute(
            "UPDATE dose_instances SET state = 'skipped' WHERE dose_id = 'dose-1'",
            [],
        );
        assert!(result.is_err());

        // Taken -> pending is blocked too
        let result = conn.execute(
            "UPDATE dose_instances SET state = 'pending' WHERE dose_id = 'dose-1'",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_delete_trigger() {
        let conn = setup_conn();
        insert_fixture_rows(&conn);

        let result = conn.execute("DELETE FROM dose_instances WHERE dose_id = 'dose-1'", []);
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_ordinal_rejected() {
        let conn = setup_conn();
        insert_fixture_rows(&conn);

        let result = conn.execute(
            r#"INSERT INTO dose_instances (dose_id, prescription_id, ordinal, time, amount, unit, refill_batch)
               VALUES ('dose-2', 'rx-1', 0, '2024-01-01T20:00:00.000Z', 1.0, 'tab', 0)"#,
            [],
        );
        assert!(result.is_err());
    }
}
