use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};

use crate::db::init_db;
use crate::error::{Result, StoreError};
use crate::types::{BookingInstance, BookingTemplate, InstanceStatus, Recurrence};

/// Thread-safe store over both booking tables.
///
/// Wraps a single SQLite connection in a `Mutex`. Each process part that
/// needs independent access (engine loop vs. intake handlers) opens its own
/// `Connection` and wraps its own `BookingStore`; SQLite WAL mode handles
/// the cross-connection coordination.
pub struct BookingStore {
    pub(crate) db: Mutex<Connection>,
}

impl BookingStore {
    /// Wrap a connection, initialising the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }
}

// --- row mapping -----------------------------------------------------------

pub(crate) fn row_to_template(row: &Row<'_>) -> rusqlite::Result<BookingTemplate> {
    Ok(BookingTemplate {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        preferred_unit: row.get(2)?,
        accept_any_unit: row.get::<_, i64>(3)? != 0,
        date: get_date(row, 4)?,
        time_of_day: get_time(row, 5)?,
        party_type: row.get(6)?,
        party_size: row.get(7)?,
        duration_minutes: row.get(8)?,
        recurrence: get_recurrence(row, 9)?,
        recurrence_end: get_opt_date(row, 10)?,
        active: row.get::<_, i64>(11)? != 0,
        created_at: get_timestamp(row, 12)?,
        updated_at: get_timestamp(row, 13)?,
    })
}

pub(crate) fn row_to_instance(row: &Row<'_>) -> rusqlite::Result<BookingInstance> {
    Ok(BookingInstance {
        id: row.get(0)?,
        template_id: row.get(1)?,
        date: get_date(row, 2)?,
        scheduled_execute_time: get_timestamp(row, 3)?,
        status: get_status(row, 4)?,
        retry_count: row.get(5)?,
        confirmation_id: row.get(6)?,
        error_detail: row.get(7)?,
        created_at: get_timestamp(row, 8)?,
        updated_at: get_timestamp(row, 9)?,
    })
}

pub(crate) const TEMPLATE_COLUMNS: &str = "id, owner_id, preferred_unit, accept_any_unit, \
     date, time_of_day, party_type, party_size, duration_minutes, \
     recurrence, recurrence_end, active, created_at, updated_at";

pub(crate) const INSTANCE_COLUMNS: &str = "id, template_id, date, scheduled_execute_time, \
     status, retry_count, confirmation_id, error_detail, created_at, updated_at";

fn get_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let s: String = row.get(idx)?;
    s.parse()
        .map_err(|e: chrono::ParseError| conversion_err(idx, Box::new(e)))
}

fn get_opt_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| {
        s.parse()
            .map_err(|e: chrono::ParseError| conversion_err(idx, Box::new(e)))
    })
    .transpose()
}

fn get_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<chrono::NaiveTime> {
    let s: String = row.get(idx)?;
    chrono::NaiveTime::parse_from_str(&s, "%H:%M")
        .map_err(|e| conversion_err(idx, Box::new(e)))
}

fn get_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, Box::new(e)))
}

fn get_status(row: &Row<'_>, idx: usize) -> rusqlite::Result<InstanceStatus> {
    let s: String = row.get(idx)?;
    s.parse::<InstanceStatus>()
        .map_err(|e| conversion_err(idx, e.into()))
}

fn get_recurrence(row: &Row<'_>, idx: usize) -> rusqlite::Result<Recurrence> {
    let s: String = row.get(idx)?;
    s.parse::<Recurrence>()
        .map_err(|e| conversion_err(idx, e.into()))
}

fn conversion_err(
    idx: usize,
    e: Box<dyn std::error::Error + Send + Sync + 'static>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e)
}

/// Surface a decode failure for a known row as `CorruptRow` instead of a
/// bare database error, so callers can tell bad data from a bad connection.
pub(crate) fn decode_err(id: &str, e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::FromSqlConversionFailure(_, _, source) => StoreError::CorruptRow {
            id: id.to_string(),
            detail: source.to_string(),
        },
        other => StoreError::Database(other),
    }
}

/// Stored wire formats for the TEXT columns.
pub(crate) fn fmt_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

pub(crate) fn fmt_time(t: chrono::NaiveTime) -> String {
    t.format("%H:%M").to_string()
}
