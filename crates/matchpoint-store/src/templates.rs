//! Template CRUD plus the one-shot expansion transaction.

use chrono::Utc;
use tracing::{info, instrument};

use crate::error::{Result, StoreError};
use crate::store::{
    decode_err, fmt_date, fmt_time, row_to_template, BookingStore, TEMPLATE_COLUMNS,
};
use crate::types::{BookingInstance, BookingTemplate};

impl BookingStore {
    /// Persist a template together with its expanded instances, atomically.
    ///
    /// Idempotent per template id: when the template row already exists (or
    /// already has instances) nothing new is inserted, so re-running
    /// expansion can never duplicate instances. Returns the number of
    /// instances actually inserted.
    #[instrument(skip(self, template, instances), fields(template_id = %template.id))]
    pub fn insert_template_with_instances(
        &self,
        template: &BookingTemplate,
        instances: &[BookingInstance],
    ) -> Result<usize> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;

        let inserted_template = tx.execute(
            "INSERT OR IGNORE INTO booking_templates
             (id, owner_id, preferred_unit, accept_any_unit, date, time_of_day,
              party_type, party_size, duration_minutes, recurrence,
              recurrence_end, active, created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)",
            rusqlite::params![
                template.id,
                template.owner_id,
                template.preferred_unit,
                template.accept_any_unit as i64,
                fmt_date(template.date),
                fmt_time(template.time_of_day),
                template.party_type,
                template.party_size,
                template.duration_minutes,
                template.recurrence.to_string(),
                template.recurrence_end.map(fmt_date),
                template.active as i64,
                template.created_at.to_rfc3339(),
                template.updated_at.to_rfc3339(),
            ],
        )?;

        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM booking_instances WHERE template_id = ?1",
            [&template.id],
            |row| row.get(0),
        )?;

        let mut inserted = 0usize;
        if existing == 0 {
            for instance in instances {
                inserted += tx.execute(
                    "INSERT OR IGNORE INTO booking_instances
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
            }
        }
        tx.commit()?;

        if inserted_template > 0 {
            info!(instances = inserted, "template stored and expanded");
        }
        Ok(inserted)
    }

    /// Retrieve a template by id, returning `None` if it does not exist.
    pub fn get_template(&self, id: &str) -> Result<Option<BookingTemplate>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            &format!("SELECT {TEMPLATE_COLUMNS} FROM booking_templates WHERE id = ?1"),
            [id],
            row_to_template,
        ) {
            Ok(t) => Ok(Some(t)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(decode_err(id, e)),
        }
    }

    /// All templates belonging to one owner, newest first.
    pub fn templates_for_owner(&self, owner_id: &str) -> Result<Vec<BookingTemplate>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM booking_templates
             WHERE owner_id = ?1 ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map([owner_id], row_to_template)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Deactivate a template and cancel its not-yet-settled instances.
    ///
    /// Only `pending` and `failed` instances are cancelled: confirmed rows
    /// are history, and a `processing` row has a submission in flight that
    /// cannot be un-submitted (the reconciler will settle it normally).
    /// Returns the number of instances cancelled.
    #[instrument(skip(self), fields(template_id = %id))]
    pub fn cancel_template(&self, id: &str) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;

        let n = tx.execute(
            "UPDATE booking_templates SET active = 0, updated_at = ?2 WHERE id = ?1",
            rusqlite::params![id, now],
        )?;
        if n == 0 {
            return Err(StoreError::TemplateNotFound { id: id.to_string() });
        }

        let cancelled = tx.execute(
            "UPDATE booking_instances
             SET status = 'cancelled', updated_at = ?2
             WHERE template_id = ?1 AND status IN ('pending', 'failed')",
            rusqlite::params![id, now],
        )?;
        tx.commit()?;

        info!(cancelled, "template cancelled");
        Ok(cancelled)
    }
}
