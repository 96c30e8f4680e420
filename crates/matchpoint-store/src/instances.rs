//! Instance queries and the guarded status transitions.
//!
//! Every transition is a conditional UPDATE with the required source status
//! in the WHERE clause; the affected-row count tells the caller whether the
//! transition applied. That makes `claim_instance` safe with multiple engine
//! processes polling the same database, and makes the user-facing actions
//! (cancel, retry) idempotent in the face of races.

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::error::{Result, StoreError};
use crate::store::{decode_err, fmt_date, row_to_instance, BookingStore, INSTANCE_COLUMNS};
use crate::types::{BookingInstance, InstanceStatus};

/// A guarded UPDATE matched no rows: either the instance does not exist, or
/// it is not in the status the transition requires.
fn transition_refused(
    db: &rusqlite::Connection,
    id: &str,
    expected: InstanceStatus,
) -> StoreError {
    let exists = db
        .query_row(
            "SELECT 1 FROM booking_instances WHERE id = ?1",
            [id],
            |_| Ok(()),
        )
        .is_ok();
    if exists {
        StoreError::InvalidTransition {
            id: id.to_string(),
            expected: expected.to_string(),
        }
    } else {
        StoreError::InstanceNotFound { id: id.to_string() }
    }
}

impl BookingStore {
    /// Insert a standalone instance (one created outside template expansion,
    /// or a pre-failed one for a date already in the past).
    pub fn insert_instance(&self, instance: &BookingInstance) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO booking_instances
             (id, template_id, date, scheduled_execute_time, status,
              retry_count, confirmation_id, error_detail, created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            rusqlite::params![
                instance.id,
                instance.template_id,
                fmt_date(instance.date),
                instance.scheduled_execute_time.to_rfc3339(),
                instance.status.to_string(),
                instance.retry_count,
                instance.confirmation_id,
                instance.error_detail,
                instance.created_at.to_rfc3339(),
                instance.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Retrieve one instance by id.
    pub fn get_instance(&self, id: &str) -> Result<Option<BookingInstance>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            &format!("SELECT {INSTANCE_COLUMNS} FROM booking_instances WHERE id = ?1"),
            [id],
            row_to_instance,
        ) {
            Ok(i) => Ok(Some(i)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(decode_err(id, e)),
        }
    }

    /// All instances generated from one template, by date.
    pub fn instances_for_template(&self, template_id: &str) -> Result<Vec<BookingInstance>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&format!(
            "SELECT {INSTANCE_COLUMNS} FROM booking_instances
             WHERE template_id = ?1 ORDER BY date"
        ))?;
        let rows = stmt.query_map([template_id], row_to_instance)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Pending instances whose execute time has arrived, oldest first.
    pub fn due_instances(&self, now: DateTime<Utc>) -> Result<Vec<BookingInstance>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare_cached(&format!(
            "SELECT {INSTANCE_COLUMNS} FROM booking_instances
             WHERE status = 'pending' AND scheduled_execute_time <= ?1
             ORDER BY scheduled_execute_time"
        ))?;
        let rows = stmt.query_map([now.to_rfc3339()], row_to_instance)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Atomic `pending → processing` claim. Returns `false` when another
    /// worker already took the row (or it was cancelled meanwhile) — the
    /// only concurrency guard the engine relies on.
    #[instrument(skip(self), fields(instance_id = %id))]
    pub fn claim_instance(&self, id: &str) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE booking_instances
             SET status = 'processing', updated_at = ?2
             WHERE id = ?1 AND status = 'pending'",
            rusqlite::params![id, now],
        )?;
        Ok(n == 1)
    }

    /// `processing → confirmed`, recording the portal's confirmation id.
    #[instrument(skip(self), fields(instance_id = %id, confirmation_id))]
    pub fn mark_confirmed(&self, id: &str, confirmation_id: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE booking_instances
             SET status = 'confirmed', confirmation_id = ?2,
                 error_detail = NULL, updated_at = ?3
             WHERE id = ?1 AND status = 'processing'",
            rusqlite::params![id, confirmation_id, now],
        )?;
        if n == 0 {
            return Err(transition_refused(&db, id, InstanceStatus::Processing));
        }
        info!("instance confirmed");
        Ok(())
    }

    /// `processing → failed`, counting the attempt and recording why.
    #[instrument(skip(self, detail), fields(instance_id = %id))]
    pub fn mark_failed(&self, id: &str, detail: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE booking_instances
             SET status = 'failed', retry_count = retry_count + 1,
                 error_detail = ?2, updated_at = ?3
             WHERE id = ?1 AND status = 'processing'",
            rusqlite::params![id, detail, now],
        )?;
        if n == 0 {
            return Err(transition_refused(&db, id, InstanceStatus::Processing));
        }
        warn!(detail, "instance failed");
        Ok(())
    }

    /// `processing → pending` with a pushed-forward execute time — the
    /// transient-failure path. Counts the attempt and keeps the reason
    /// visible until a later attempt succeeds.
    #[instrument(skip(self, detail), fields(instance_id = %id, next = %next_attempt))]
    pub fn reschedule_retry(
        &self,
        id: &str,
        next_attempt: DateTime<Utc>,
        detail: &str,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE booking_instances
             SET status = 'pending', retry_count = retry_count + 1,
                 scheduled_execute_time = ?2, error_detail = ?3, updated_at = ?4
             WHERE id = ?1 AND status = 'processing'",
            rusqlite::params![id, next_attempt.to_rfc3339(), detail, now],
        )?;
        if n == 0 {
            return Err(transition_refused(&db, id, InstanceStatus::Processing));
        }
        Ok(())
    }

    /// User cancel. Only a still-`pending` instance can be withdrawn; once a
    /// submission is in flight the portal may accept it regardless.
    #[instrument(skip(self), fields(instance_id = %id))]
    pub fn cancel_instance(&self, id: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE booking_instances
             SET status = 'cancelled', updated_at = ?2
             WHERE id = ?1 AND status = 'pending'",
            rusqlite::params![id, now],
        )?;
        if n == 0 {
            return Err(transition_refused(&db, id, InstanceStatus::Pending));
        }
        info!("instance cancelled");
        Ok(())
    }

    /// User retry of a failed instance: reset the attempt counter and make
    /// it due immediately.
    #[instrument(skip(self), fields(instance_id = %id))]
    pub fn reset_for_retry(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE booking_instances
             SET status = 'pending', retry_count = 0,
                 scheduled_execute_time = ?2, updated_at = ?2
             WHERE id = ?1 AND status = 'failed'",
            rusqlite::params![id, now.to_rfc3339()],
        )?;
        if n == 0 {
            return Err(transition_refused(&db, id, InstanceStatus::Failed));
        }
        info!("instance queued for retry");
        Ok(())
    }

    /// Crash recovery: return instances stranded in `processing` by a
    /// previous engine run to `pending`. Called once at engine startup,
    /// before the first tick.
    pub fn sweep_stuck_processing(&self) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE booking_instances
             SET status = 'pending', updated_at = ?1
             WHERE status = 'processing'",
            [&now],
        )?;
        if n > 0 {
            warn!(count = n, "instances recovered from stale processing state");
        }
        Ok(n)
    }
}
