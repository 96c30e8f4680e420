//! The portal's per-date availability payload and the free-window maths.
//!
//! The portal reports, per unit, its operating-hours window and the
//! intervals already booked. Free windows are what is left after
//! subtraction; a request fits when `[start, start + duration)` sits fully
//! inside one free window.

use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;

use crate::error::{PortalError, Result};

/// `GET /api/availability?date=…` response.
#[derive(Debug, Clone, Deserialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub units: Vec<UnitAvailability>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnitAvailability {
    pub id: String,
    /// Operating hours, portal-local `HH:MM`.
    pub opens: String,
    pub closes: String,
    #[serde(default)]
    pub booked: Vec<BookedInterval>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookedInterval {
    pub start: String,
    pub end: String,
}

/// Half-open interval in minutes since midnight.
type Window = (u32, u32);

fn minutes(s: &str) -> Result<u32> {
    let t = NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|e| PortalError::MalformedResponse(format!("bad time {s:?}: {e}")))?;
    Ok(t.signed_duration_since(NaiveTime::MIN).num_minutes() as u32)
}

/// Operating hours minus booked intervals, in chronological order.
pub fn free_windows(unit: &UnitAvailability) -> Result<Vec<Window>> {
    let opens = minutes(&unit.opens)?;
    let closes = minutes(&unit.closes)?;

    let mut booked: Vec<Window> = unit
        .booked
        .iter()
        .map(|b| Ok((minutes(&b.start)?, minutes(&b.end)?)))
        .collect::<Result<_>>()?;
    booked.sort_unstable();

    let mut free = Vec::new();
    let mut cursor = opens;
    for (start, end) in booked {
        // Ignore bookings outside (or overlapping) the operating window edges.
        let start = start.max(opens);
        let end = end.min(closes);
        if start >= end {
            continue;
        }
        if start > cursor {
            free.push((cursor, start));
        }
        cursor = cursor.max(end);
    }
    if cursor < closes {
        free.push((cursor, closes));
    }
    Ok(free)
}

/// Does `[start, start + duration)` fit entirely inside a free window?
pub fn slot_is_free(unit: &UnitAvailability, start: NaiveTime, duration_minutes: u32) -> Result<bool> {
    let begin = start.signed_duration_since(NaiveTime::MIN).num_minutes() as u32;
    let end = begin + duration_minutes;
    Ok(free_windows(unit)?
        .iter()
        .any(|&(lo, hi)| lo <= begin && end <= hi))
}

/// Pick the unit to book: the preferred one when free, else the first free
/// substitute when the template allows any, else a conflict.
pub fn choose_unit(
    day: &DayAvailability,
    preferred: Option<&str>,
    accept_any_unit: bool,
    start: NaiveTime,
    duration_minutes: u32,
) -> Result<String> {
    if let Some(wanted) = preferred {
        if let Some(unit) = day.units.iter().find(|u| u.id == wanted) {
            if slot_is_free(unit, start, duration_minutes)? {
                return Ok(unit.id.clone());
            }
        }
        if !accept_any_unit {
            return Err(PortalError::AvailabilityConflict {
                date: day.date,
                detail: format!("unit {wanted} is not free at {}", start.format("%H:%M")),
            });
        }
    }

    for unit in &day.units {
        if slot_is_free(unit, start, duration_minutes)? {
            return Ok(unit.id.clone());
        }
    }
    Err(PortalError::AvailabilityConflict {
        date: day.date,
        detail: format!(
            "no unit free for {} minutes at {}",
            duration_minutes,
            start.format("%H:%M")
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(id: &str, booked: &[(&str, &str)]) -> UnitAvailability {
        UnitAvailability {
            id: id.to_string(),
            opens: "07:00".to_string(),
            closes: "22:00".to_string(),
            booked: booked
                .iter()
                .map(|(s, e)| BookedInterval {
                    start: s.to_string(),
                    end: e.to_string(),
                })
                .collect(),
        }
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn empty_day_is_one_big_window() {
        let windows = free_windows(&unit("c1", &[])).unwrap();
        assert_eq!(windows, vec![(7 * 60, 22 * 60)]);
    }

    #[test]
    fn bookings_split_the_window() {
        let windows =
            free_windows(&unit("c1", &[("09:00", "10:00"), ("18:00", "19:30")])).unwrap();
        assert_eq!(
            windows,
            vec![(7 * 60, 9 * 60), (10 * 60, 18 * 60), (19 * 60 + 30, 22 * 60)]
        );
    }

    #[test]
    fn back_to_back_bookings_leave_no_gap() {
        let windows =
            free_windows(&unit("c1", &[("09:00", "10:00"), ("10:00", "11:00")])).unwrap();
        assert_eq!(windows, vec![(7 * 60, 9 * 60), (11 * 60, 22 * 60)]);
    }

    #[test]
    fn booking_spanning_opening_hour_is_clamped() {
        let windows = free_windows(&unit("c1", &[("06:00", "08:00")])).unwrap();
        assert_eq!(windows, vec![(8 * 60, 22 * 60)]);
    }

    #[test]
    fn slot_fit_checks_both_edges() {
        let u = unit("c1", &[("09:00", "10:00")]);
        assert!(slot_is_free(&u, t(8, 0), 60).unwrap());
        assert!(!slot_is_free(&u, t(8, 30), 60).unwrap()); // runs into the booking
        assert!(slot_is_free(&u, t(10, 0), 60).unwrap());
        assert!(!slot_is_free(&u, t(21, 30), 60).unwrap()); // past closing
    }

    #[test]
    fn preferred_unit_wins_when_free() {
        let day = DayAvailability {
            date: NaiveDate::from_ymd_opt(2025, 11, 7).unwrap(),
            units: vec![unit("c1", &[]), unit("c2", &[])],
        };
        let chosen = choose_unit(&day, Some("c2"), true, t(18, 0), 60).unwrap();
        assert_eq!(chosen, "c2");
    }

    #[test]
    fn substitute_only_when_allowed() {
        let day = DayAvailability {
            date: NaiveDate::from_ymd_opt(2025, 11, 7).unwrap(),
            units: vec![unit("c1", &[]), unit("c2", &[("17:00", "20:00")])],
        };

        // accept_any_unit picks the first free equivalent
        let chosen = choose_unit(&day, Some("c2"), true, t(18, 0), 60).unwrap();
        assert_eq!(chosen, "c1");

        // without the flag it is a conflict, and a permanent one
        let err = choose_unit(&day, Some("c2"), false, t(18, 0), 60).unwrap_err();
        assert!(err.is_permanent());
    }

    #[test]
    fn fully_booked_day_is_a_conflict() {
        let day = DayAvailability {
            date: NaiveDate::from_ymd_opt(2025, 11, 7).unwrap(),
            units: vec![unit("c1", &[("07:00", "22:00")])],
        };
        assert!(choose_unit(&day, None, true, t(18, 0), 60).is_err());
    }

    #[test]
    fn payload_deserialises() {
        let day: DayAvailability = serde_json::from_str(
            r#"{
                "date": "2025-11-07",
                "units": [
                    {"id": "court-1", "opens": "07:00", "closes": "22:00",
                     "booked": [{"start": "09:00", "end": "10:30"}]},
                    {"id": "court-2", "opens": "08:00", "closes": "21:00"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(day.units.len(), 2);
        assert_eq!(day.units[0].booked.len(), 1);
        assert!(day.units[1].booked.is_empty());
    }
}
