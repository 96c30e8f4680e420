//! Expansion of a recurrence rule into concrete dates.

use chrono::{Duration, NaiveDate};
use matchpoint_core::config::MAX_INSTANCES_PER_TEMPLATE;
use matchpoint_store::Recurrence;

/// Expand `rule` starting at `start` into an ordered date sequence.
///
/// Stops once the next date would pass `end`, and always at the safety cap
/// so an open-ended rule cannot generate unbounded instances. `monthly` is
/// a fixed 30-day stride (the upstream behaviour), so the weekday drifts
/// and the day-of-month is not preserved.
pub fn expand_dates(start: NaiveDate, rule: Recurrence, end: Option<NaiveDate>) -> Vec<NaiveDate> {
    let Some(stride) = rule.stride_days() else {
        return vec![start];
    };

    let mut dates = Vec::new();
    let mut date = start;
    while dates.len() < MAX_INSTANCES_PER_TEMPLATE {
        if end.is_some_and(|e| date > e) {
            break;
        }
        dates.push(date);
        date += Duration::days(stride);
    }
    dates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn once_yields_single_date() {
        assert_eq!(
            expand_dates(d(2025, 11, 7), Recurrence::Once, None),
            vec![d(2025, 11, 7)]
        );
    }

    #[test]
    fn weekly_without_end_caps_at_limit() {
        let dates = expand_dates(d(2025, 11, 7), Recurrence::Weekly, None);
        assert_eq!(dates.len(), MAX_INSTANCES_PER_TEMPLATE);
        assert_eq!(dates[0], d(2025, 11, 7));
        assert_eq!(dates[1], d(2025, 11, 14));
        assert_eq!(dates[2], d(2025, 11, 21));
        for pair in dates.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::days(7));
        }
    }

    #[test]
    fn biweekly_strides_fourteen_days() {
        let dates = expand_dates(d(2025, 11, 7), Recurrence::Biweekly, Some(d(2025, 12, 31)));
        assert_eq!(
            dates,
            vec![d(2025, 11, 7), d(2025, 11, 21), d(2025, 12, 5), d(2025, 12, 19)]
        );
    }

    #[test]
    fn monthly_is_a_fixed_thirty_day_stride() {
        let dates = expand_dates(d(2025, 1, 31), Recurrence::Monthly, Some(d(2025, 4, 30)));
        // Not calendar months: 31 Jan + 30d = 2 Mar, + 30d = 1 Apr.
        assert_eq!(dates, vec![d(2025, 1, 31), d(2025, 3, 2), d(2025, 4, 1)]);
    }

    #[test]
    fn end_date_is_inclusive() {
        let dates = expand_dates(d(2025, 11, 7), Recurrence::Weekly, Some(d(2025, 11, 14)));
        assert_eq!(dates, vec![d(2025, 11, 7), d(2025, 11, 14)]);
    }

    #[test]
    fn end_before_any_repeat_yields_only_start() {
        let dates = expand_dates(d(2025, 11, 7), Recurrence::Weekly, Some(d(2025, 11, 10)));
        assert_eq!(dates, vec![d(2025, 11, 7)]);
    }
}
