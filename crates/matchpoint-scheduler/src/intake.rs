//! Template intake: validation, expansion and the single persistence
//! transaction that makes expansion exactly-once.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use matchpoint_core::config::MAX_DURATION_MINUTES;
use matchpoint_store::{
    BookingInstance, BookingStore, BookingTemplate, InstanceStatus, Recurrence,
};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{Result, ValidationError};
use crate::recurrence::expand_dates;
use crate::window::BookingWindow;

/// The reservation intent as submitted by the UI/API collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateIntake {
    pub owner_id: String,
    pub preferred_unit: Option<String>,
    #[serde(default)]
    pub accept_any_unit: bool,
    /// ISO-8601 date of the first (or only) occurrence.
    pub date: NaiveDate,
    /// Desired start time, `HH:MM`, portal-local.
    pub time_of_day: String,
    pub party_type: String,
    pub party_size: u32,
    pub duration_minutes: u32,
    #[serde(default = "default_recurrence")]
    pub recurrence: Recurrence,
    pub recurrence_end: Option<NaiveDate>,
}

fn default_recurrence() -> Recurrence {
    Recurrence::Once
}

impl TemplateIntake {
    /// Reject malformed intents before anything is persisted.
    pub fn validate(&self, slot_minutes: u32, today: NaiveDate) -> Result<NaiveTime> {
        let time = NaiveTime::parse_from_str(&self.time_of_day, "%H:%M").map_err(|_| {
            ValidationError::BadTimeOfDay {
                value: self.time_of_day.clone(),
            }
        })?;

        if self.party_size == 0 {
            return Err(ValidationError::EmptyParty.into());
        }
        if self.duration_minutes == 0
            || self.duration_minutes > MAX_DURATION_MINUTES
            || self.duration_minutes % slot_minutes != 0
        {
            return Err(ValidationError::BadDuration {
                minutes: self.duration_minutes,
                slot: slot_minutes,
                max: MAX_DURATION_MINUTES,
            }
            .into());
        }
        if let Some(end) = self.recurrence_end {
            if end < self.date {
                return Err(ValidationError::EndBeforeStart {
                    start: self.date,
                    end,
                }
                .into());
            }
        }
        // A one-shot for a date that has already passed can never succeed.
        // Recurring templates keep their future occurrences; the expired
        // ones are materialised as failed below.
        if self.recurrence == Recurrence::Once && self.date < today {
            return Err(ValidationError::DateInPast { date: self.date }.into());
        }

        Ok(time)
    }
}

/// Validate `intake`, expand it into dated instances with their execute
/// times, and persist everything in one transaction.
///
/// Instances whose date already passed are stored as `failed` with a reason
/// (never scheduled); everything else starts `pending`. Safe to call twice
/// with the same template id — the store inserts instances only once.
#[instrument(skip_all, fields(owner_id = %intake.owner_id, recurrence = %intake.recurrence))]
pub fn register_template(
    store: &BookingStore,
    window: &BookingWindow,
    slot_minutes: u32,
    intake: TemplateIntake,
    now: DateTime<Utc>,
) -> Result<BookingTemplate> {
    let today = now.with_timezone(&window.offset).date_naive();
    let time_of_day = intake.validate(slot_minutes, today)?;

    let template = BookingTemplate {
        id: Uuid::new_v4().to_string(),
        owner_id: intake.owner_id,
        preferred_unit: intake.preferred_unit,
        accept_any_unit: intake.accept_any_unit,
        date: intake.date,
        time_of_day,
        party_type: intake.party_type,
        party_size: intake.party_size,
        duration_minutes: intake.duration_minutes,
        recurrence: intake.recurrence,
        recurrence_end: intake.recurrence_end,
        active: true,
        created_at: now,
        updated_at: now,
    };

    let dates = expand_dates(template.date, template.recurrence, template.recurrence_end);
    let instances: Vec<BookingInstance> = dates
        .into_iter()
        .map(|date| build_instance(&template, date, window, now))
        .collect();

    let inserted = store.insert_template_with_instances(&template, &instances)?;
    info!(template_id = %template.id, instances = inserted, "template registered");
    Ok(template)
}

fn build_instance(
    template: &BookingTemplate,
    date: NaiveDate,
    window: &BookingWindow,
    now: DateTime<Utc>,
) -> BookingInstance {
    let (status, execute_time, error_detail) = match window.resolve(date, now) {
        Some(t) => (InstanceStatus::Pending, t, None),
        None => (
            InstanceStatus::Failed,
            now,
            Some(format!("target date {date} had already passed at creation")),
        ),
    };

    BookingInstance {
        id: Uuid::new_v4().to_string(),
        template_id: Some(template.id.clone()),
        date,
        scheduled_execute_time: execute_time,
        status,
        retry_count: 0,
        confirmation_id: None,
        error_detail,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use rusqlite::Connection;

    fn store() -> BookingStore {
        BookingStore::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    fn window() -> BookingWindow {
        BookingWindow {
            advance_days: 7,
            open_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            offset: FixedOffset::east_opt(0).unwrap(),
        }
    }

    fn intake(date: NaiveDate, recurrence: Recurrence) -> TemplateIntake {
        TemplateIntake {
            owner_id: "owner-1".to_string(),
            preferred_unit: Some("court-1".to_string()),
            accept_any_unit: false,
            date,
            time_of_day: "18:00".to_string(),
            party_type: "doubles".to_string(),
            party_size: 4,
            duration_minutes: 60,
            recurrence,
            recurrence_end: None,
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn weekly_template_expands_and_schedules() {
        let store = store();
        let now = Utc.with_ymd_and_hms(2025, 11, 1, 12, 0, 0).unwrap();

        let template = register_template(
            &store,
            &window(),
            30,
            intake(d(2025, 11, 7), Recurrence::Weekly),
            now,
        )
        .unwrap();

        let instances = store.instances_for_template(&template.id).unwrap();
        assert_eq!(
            instances.len(),
            matchpoint_core::config::MAX_INSTANCES_PER_TEMPLATE
        );
        assert_eq!(instances[0].date, d(2025, 11, 7));
        assert_eq!(instances[1].date, d(2025, 11, 14));

        // 2025-11-07 is within 7 days of now → immediate (clamped to now);
        // 2025-11-14 opens 2025-11-07 08:00.
        assert_eq!(instances[0].scheduled_execute_time, now);
        assert_eq!(
            instances[1].scheduled_execute_time,
            Utc.with_ymd_and_hms(2025, 11, 7, 8, 0, 0).unwrap()
        );
        for i in &instances {
            assert_eq!(i.status, InstanceStatus::Pending);
            assert!(i.scheduled_execute_time.date_naive() < i.date);
        }
    }

    #[test]
    fn once_in_the_past_is_rejected() {
        let store = store();
        let now = Utc.with_ymd_and_hms(2025, 11, 10, 12, 0, 0).unwrap();
        let err = register_template(
            &store,
            &window(),
            30,
            intake(d(2025, 11, 7), Recurrence::Once),
            now,
        );
        assert!(err.is_err());
    }

    #[test]
    fn recurring_template_with_expired_start_fails_only_that_instance() {
        let store = store();
        let now = Utc.with_ymd_and_hms(2025, 11, 10, 12, 0, 0).unwrap();
        let mut i = intake(d(2025, 11, 7), Recurrence::Weekly);
        i.recurrence_end = Some(d(2025, 11, 21));

        let template = register_template(&store, &window(), 30, i, now).unwrap();
        let instances = store.instances_for_template(&template.id).unwrap();
        assert_eq!(instances.len(), 3);
        assert_eq!(instances[0].status, InstanceStatus::Failed);
        assert!(instances[0].error_detail.is_some());
        assert_eq!(instances[1].status, InstanceStatus::Pending);
        assert_eq!(instances[2].status, InstanceStatus::Pending);
    }

    #[test]
    fn validation_rejections() {
        let now = Utc.with_ymd_and_hms(2025, 11, 1, 12, 0, 0).unwrap();
        let today = now.date_naive();

        let mut bad_duration = intake(d(2025, 11, 7), Recurrence::Once);
        bad_duration.duration_minutes = 45; // not a multiple of 30
        assert!(bad_duration.validate(30, today).is_err());

        let mut too_long = intake(d(2025, 11, 7), Recurrence::Once);
        too_long.duration_minutes = 300;
        assert!(too_long.validate(30, today).is_err());

        let mut no_party = intake(d(2025, 11, 7), Recurrence::Once);
        no_party.party_size = 0;
        assert!(no_party.validate(30, today).is_err());

        let mut bad_time = intake(d(2025, 11, 7), Recurrence::Once);
        bad_time.time_of_day = "6pm".to_string();
        assert!(bad_time.validate(30, today).is_err());

        let mut inverted = intake(d(2025, 11, 7), Recurrence::Weekly);
        inverted.recurrence_end = Some(d(2025, 11, 1));
        assert!(inverted.validate(30, today).is_err());

        assert!(intake(d(2025, 11, 7), Recurrence::Once)
            .validate(30, today)
            .is_ok());
    }
}
