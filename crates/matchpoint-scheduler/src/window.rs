//! When does an instance become executable?
//!
//! The portal opens bookings for date `D` exactly `W` days earlier, at a
//! fixed portal-local wall time. The engine therefore has no reason to wake
//! up before `(D − W)` at that time — and every reason to fire right then,
//! since popular slots go within minutes of the window opening.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use matchpoint_core::config::PortalConfig;

use crate::error::EngineError;

/// The portal's advance-booking rule, resolved from config once at startup.
#[derive(Debug, Clone, Copy)]
pub struct BookingWindow {
    pub advance_days: u32,
    pub open_time: NaiveTime,
    pub offset: FixedOffset,
}

/// Outcome of the execute-time calculation for one instance date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteTime {
    /// Window not open yet — execute at this UTC instant.
    At(DateTime<Utc>),
    /// The window is already open; execute on the next tick.
    Immediate,
    /// The target date itself has passed. Never scheduled; fail on arrival.
    DateInPast,
}

impl BookingWindow {
    pub fn from_config(cfg: &PortalConfig) -> Result<Self, EngineError> {
        Ok(Self {
            advance_days: cfg.advance_window_days,
            open_time: cfg.window_open().map_err(|e| EngineError::Config(e.to_string()))?,
            offset: cfg.utc_offset().map_err(|e| EngineError::Config(e.to_string()))?,
        })
    }

    /// Compute when the instance for `date` should execute, given `now`.
    pub fn execute_time(&self, date: NaiveDate, now: DateTime<Utc>) -> ExecuteTime {
        let today = now.with_timezone(&self.offset).date_naive();
        if date < today {
            return ExecuteTime::DateInPast;
        }

        let opens_local = (date - Duration::days(self.advance_days as i64))
            .and_time(self.open_time)
            .and_local_timezone(self.offset)
            // FixedOffset conversions are never ambiguous.
            .single();
        let Some(opens_local) = opens_local else {
            return ExecuteTime::DateInPast;
        };
        let opens = opens_local.with_timezone(&Utc);

        if opens <= now {
            ExecuteTime::Immediate
        } else {
            ExecuteTime::At(opens)
        }
    }

    /// Resolve [`ExecuteTime`] to a concrete store timestamp (`Immediate`
    /// clamps to `now`); `None` for a date already in the past.
    pub fn resolve(&self, date: NaiveDate, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.execute_time(date, now) {
            ExecuteTime::At(t) => Some(t),
            ExecuteTime::Immediate => Some(now),
            ExecuteTime::DateInPast => None,
        }
    }
}
