//! Calendar helpers: month buckets and pay-date arithmetic.
//!
//! All dates are UTC. A "month bucket" is the first day of a month and is
//! the key for the contribution ledger and the goals' `month_started`
//! marker.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};

use crate::model::Frequency;

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

/// Number of days in the given month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    match (
        NaiveDate::from_ymd_opt(year, month, 1),
        NaiveDate::from_ymd_opt(next_year, next_month, 1),
    ) {
        (Some(first), Some(next)) => (next - first).num_days() as u32,
        _ => 30,
    }
}

/// `day` of the given month, clamped to the month length.
pub fn clamped_date(year: i32, month: u32, day: u32) -> NaiveDate {
    let day = day.clamp(1, days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

/// `date` shifted by whole months, clamped to the month length.
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months)).unwrap_or(date)
}

/// Midnight-based timestamp for `date` at `hour` UTC.
pub fn at_hour(date: NaiveDate, hour: u32) -> DateTime<Utc> {
    date.and_hms_opt(hour.min(23), 0, 0)
        .unwrap_or_default()
        .and_utc()
}

/// Weekday of `date` with 0 = Sunday.
pub fn weekday_index(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_sunday()
}

/// Check a schedule description before it is persisted.
pub fn validate_schedule(frequency: Frequency, recurring_day: u32, hour: u32) -> Result<(), String> {
    if hour > 23 {
        return Err(format!("notification hour {hour} out of range 0-23"));
    }
    match frequency {
        Frequency::Monthly if !(1..=31).contains(&recurring_day) => Err(format!(
            "day of month {recurring_day} out of range 1-31"
        )),
        Frequency::Weekly | Frequency::Biweekly if recurring_day > 6 => Err(format!(
            "weekday {recurring_day} out of range 0-6 (0 = Sunday)"
        )),
        _ => Ok(()),
    }
}

/// The first pay date strictly after `now` for a newly added income.
pub fn first_pay_date(
    frequency: Frequency,
    recurring_day: u32,
    hour: u32,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let today = now.date_naive();
    match frequency {
        Frequency::Monthly => {
            let this_month = at_hour(clamped_date(today.year(), today.month(), recurring_day), hour);
            if this_month > now {
                this_month
            } else {
                let next = add_months(month_start(today), 1);
                at_hour(clamped_date(next.year(), next.month(), recurring_day), hour)
            }
        }
        Frequency::Weekly | Frequency::Biweekly => {
            let days_until = (recurring_day + 7 - weekday_index(today)) % 7;
            let candidate = at_hour(today + Duration::days(days_until as i64), hour);
            if candidate > now {
                candidate
            } else {
                candidate + Duration::days(7)
            }
        }
    }
}

/// The pay date that follows an occurrence processed on `today`.
///
/// - monthly: `recurring_day` of the first month whose occurrence falls
///   after `today`, clamped to the month length
/// - weekly: next matching weekday after `today`
/// - biweekly: `current_due` plus 14-day steps until it lands after `today`
pub fn next_pay_date(
    frequency: Frequency,
    recurring_day: u32,
    hour: u32,
    current_due: DateTime<Utc>,
    today: NaiveDate,
) -> DateTime<Utc> {
    match frequency {
        Frequency::Monthly => {
            let mut bucket = month_start(today);
            let mut candidate = clamped_date(bucket.year(), bucket.month(), recurring_day);
            while candidate <= today {
                bucket = add_months(bucket, 1);
                candidate = clamped_date(bucket.year(), bucket.month(), recurring_day);
            }
            at_hour(candidate, hour)
        }
        Frequency::Weekly => {
            let mut days_until = (recurring_day + 7 - weekday_index(today)) % 7;
            if days_until == 0 {
                days_until = 7;
            }
            at_hour(today + Duration::days(days_until as i64), hour)
        }
        Frequency::Biweekly => {
            let mut candidate = current_due.date_naive() + Duration::days(14);
            while candidate <= today {
                candidate += Duration::days(14);
            }
            at_hour(candidate, hour)
        }
    }
}

/// Months needed to cover `remaining` at `per_month`, at least one.
pub fn months_to_cover(remaining: i64, per_month: i64) -> u32 {
    let per_month = per_month.max(1);
    let months = (remaining.max(0) + per_month - 1) / per_month;
    months.clamp(1, u32::MAX as i64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_start_and_lengths() {
        assert_eq!(month_start(date(2026, 2, 17)), date(2026, 2, 1));
        assert_eq!(days_in_month(2026, 2), 28);
        assert_eq!(days_in_month(2028, 2), 29);
        assert_eq!(days_in_month(2026, 12), 31);
        assert_eq!(clamped_date(2026, 4, 31), date(2026, 4, 30));
    }

    #[test]
    fn monthly_advance_clamps_to_short_month() {
        let due = Utc.with_ymd_and_hms(2026, 1, 31, 9, 0, 0).unwrap();
        let next = next_pay_date(Frequency::Monthly, 31, 9, due, date(2026, 1, 31));
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 2, 28, 9, 0, 0).unwrap());

        // Day 31 comes back once the month is long enough again.
        let next = next_pay_date(Frequency::Monthly, 31, 9, next, date(2026, 2, 28));
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 31, 9, 0, 0).unwrap());
    }

    #[test]
    fn monthly_advance_after_downtime_does_not_skip_a_month() {
        let due = Utc.with_ymd_and_hms(2026, 3, 15, 9, 0, 0).unwrap();
        let next = next_pay_date(Frequency::Monthly, 15, 9, due, date(2026, 3, 20));
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 4, 15, 9, 0, 0).unwrap());
    }

    #[test]
    fn weekly_advance_moves_to_next_matching_weekday() {
        // 2026-02-23 is a Monday (1).
        let due = Utc.with_ymd_and_hms(2026, 2, 23, 8, 0, 0).unwrap();
        let next = next_pay_date(Frequency::Weekly, 1, 8, due, date(2026, 2, 23));
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap());

        let next = next_pay_date(Frequency::Weekly, 5, 8, due, date(2026, 2, 23));
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 2, 27, 8, 0, 0).unwrap());
    }

    #[test]
    fn biweekly_advance_keeps_fourteen_day_phase() {
        let due = Utc.with_ymd_and_hms(2026, 2, 23, 8, 0, 0).unwrap();
        let next = next_pay_date(Frequency::Biweekly, 1, 8, due, date(2026, 2, 23));
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 9, 8, 0, 0).unwrap());

        // Processed late: still lands on the original cadence.
        let next = next_pay_date(Frequency::Biweekly, 1, 8, due, date(2026, 3, 10));
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 23, 8, 0, 0).unwrap());
    }

    #[test]
    fn first_pay_date_monthly() {
        let now = Utc.with_ymd_and_hms(2026, 5, 10, 12, 0, 0).unwrap();
        assert_eq!(
            first_pay_date(Frequency::Monthly, 25, 9, now),
            Utc.with_ymd_and_hms(2026, 5, 25, 9, 0, 0).unwrap()
        );
        assert_eq!(
            first_pay_date(Frequency::Monthly, 10, 9, now),
            Utc.with_ymd_and_hms(2026, 6, 10, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn first_pay_date_weekly_same_day_before_hour() {
        // Monday 07:00, payday Monday 09:00 → today.
        let now = Utc.with_ymd_and_hms(2026, 2, 23, 7, 0, 0).unwrap();
        assert_eq!(
            first_pay_date(Frequency::Weekly, 1, 9, now),
            Utc.with_ymd_and_hms(2026, 2, 23, 9, 0, 0).unwrap()
        );
        // Monday 10:00 → next Monday.
        let now = Utc.with_ymd_and_hms(2026, 2, 23, 10, 0, 0).unwrap();
        assert_eq!(
            first_pay_date(Frequency::Weekly, 1, 9, now),
            Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn schedule_validation() {
        assert!(validate_schedule(Frequency::Monthly, 31, 9).is_ok());
        assert!(validate_schedule(Frequency::Monthly, 0, 9).is_err());
        assert!(validate_schedule(Frequency::Weekly, 7, 9).is_err());
        assert!(validate_schedule(Frequency::Biweekly, 6, 24).is_err());
    }

    #[test]
    fn months_to_cover_rounds_up() {
        assert_eq!(months_to_cover(10_000, 3_000), 4);
        assert_eq!(months_to_cover(9_000, 3_000), 3);
        assert_eq!(months_to_cover(0, 3_000), 1);
        assert_eq!(months_to_cover(500, 0), 500);
    }
}
