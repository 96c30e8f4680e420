use rusqlite::Connection;

use crate::error::Result;

/// Initialise the booking schema in `conn`.
///
/// Creates both tables (idempotent) and an index on the polling predicate so
/// the engine's due-instance scan stays cheap as history accumulates.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS booking_templates (
            id               TEXT    NOT NULL PRIMARY KEY,
            owner_id         TEXT    NOT NULL,
            preferred_unit   TEXT,
            accept_any_unit  INTEGER NOT NULL DEFAULT 0,
            date             TEXT    NOT NULL,   -- YYYY-MM-DD
            time_of_day      TEXT    NOT NULL,   -- HH:MM
            party_type       TEXT    NOT NULL,
            party_size       INTEGER NOT NULL,
            duration_minutes INTEGER NOT NULL,
            recurrence       TEXT    NOT NULL,
            recurrence_end   TEXT,               -- YYYY-MM-DD or NULL
            active           INTEGER NOT NULL DEFAULT 1,
            created_at       TEXT    NOT NULL,
            updated_at       TEXT    NOT NULL
        ) STRICT;

        CREATE TABLE IF NOT EXISTS booking_instances (
            id                      TEXT    NOT NULL PRIMARY KEY,
            template_id             TEXT,
            date                    TEXT    NOT NULL,   -- YYYY-MM-DD
            scheduled_execute_time  TEXT    NOT NULL,   -- ISO-8601 UTC
            status                  TEXT    NOT NULL DEFAULT 'pending',
            retry_count             INTEGER NOT NULL DEFAULT 0,
            confirmation_id         TEXT,
            error_detail            TEXT,
            created_at              TEXT    NOT NULL,
            updated_at              TEXT    NOT NULL
        ) STRICT;

        -- Efficient polling: WHERE status = 'pending' AND scheduled_execute_time <= ?
        CREATE INDEX IF NOT EXISTS idx_instances_due
            ON booking_instances (status, scheduled_execute_time);

        CREATE INDEX IF NOT EXISTS idx_instances_template
            ON booking_instances (template_id);
        ",
    )?;
    Ok(())
}
