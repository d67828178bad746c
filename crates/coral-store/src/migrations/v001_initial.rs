//! v001 -- Initial schema creation.
//!
//! Creates the append-only `contributions` table. Updates and deletes are
//! refused by triggers; corrections are new rows with a negative amount.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Contributions (ledger)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS contributions (
    sequence        INTEGER PRIMARY KEY AUTOINCREMENT,  -- insertion order
    id              TEXT NOT NULL UNIQUE,               -- UUID v4
    user_id         TEXT NOT NULL,
    amount          INTEGER NOT NULL CHECK (amount <> 0),
    reason          TEXT NOT NULL,
    category        TEXT NOT NULL CHECK (category IN (
                        'project_creation',
                        'task_completion',
                        'code_review',
                        'documentation',
                        'idea_suggestion',
                        'bug_report',
                        'community_support'
                    )),
    project_id      TEXT,
    created_at      TEXT NOT NULL,                      -- RFC-3339
    idempotency_key TEXT
);

CREATE INDEX IF NOT EXISTS idx_contributions_user_seq
    ON contributions(user_id, sequence DESC);

CREATE UNIQUE INDEX IF NOT EXISTS idx_contributions_idempotency
    ON contributions(user_id, idempotency_key)
    WHERE idempotency_key IS NOT NULL;

CREATE TRIGGER IF NOT EXISTS contributions_no_update
    BEFORE UPDATE ON contributions
BEGIN
    SELECT RAISE(ABORT, 'contributions are append-only');
END;

CREATE TRIGGER IF NOT EXISTS contributions_no_delete
    BEFORE DELETE ON contributions
BEGIN
    SELECT RAISE(ABORT, 'contributions are append-only');
END;
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
