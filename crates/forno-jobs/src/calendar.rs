//! Business-day arithmetic shared by the summary jobs and the job catalog.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc,
    Weekday,
};
use forno_core::config::BusinessConfig;
use forno_core::{FornoError, Result};

/// Converts scheduler instants (UTC) into the pizzeria's local calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessCalendar {
    offset: FixedOffset,
}

impl Default for BusinessCalendar {
    fn default() -> Self {
        Self::utc()
    }
}

impl BusinessCalendar {
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    pub fn with_offset_minutes(minutes: i32) -> Result<Self> {
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| FornoError::Config(format!("utc offset of {minutes} minutes is out of range")))?;
        Ok(Self { offset })
    }

    pub fn from_config(cfg: &BusinessConfig) -> Result<Self> {
        Self::with_offset_minutes(cfg.utc_offset_minutes)
    }

    /// Local wall-clock time at `now`.
    pub fn local(&self, now: DateTime<Utc>) -> NaiveDateTime {
        now.with_timezone(&self.offset).naive_local()
    }

    /// Local calendar date at `now`.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.local(now).date()
    }

    /// The UTC instant of a local wall-clock time.
    pub fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        let utc = local - Duration::seconds(self.offset.local_minus_utc() as i64);
        DateTime::from_naive_utc_and_offset(utc, Utc)
    }
}

/// Inclusive Monday..Sunday range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

pub fn previous_day(today: NaiveDate) -> NaiveDate {
    today - Duration::days(1)
}

/// The most recent Monday..Sunday week that ended before `today`.
///
/// `end = today - (weekday_index + 1)` with Monday = 0, so on a Monday the
/// week ending yesterday is returned and on a Sunday the week ending a week
/// ago (today's week is not complete yet).
pub fn last_completed_week(today: NaiveDate) -> WeekRange {
    let idx = today.weekday().num_days_from_monday() as i64;
    let end = today - Duration::days(idx + 1);
    WeekRange {
        start: end - Duration::days(6),
        end,
    }
}

/// First occurrence of `weekday` at `time` strictly after `now`.
pub fn next_weekday_at(now: NaiveDateTime, weekday: Weekday, time: NaiveTime) -> NaiveDateTime {
    let today_dow = now.weekday().num_days_from_monday() as i64;
    let target_dow = weekday.num_days_from_monday() as i64;
    let days_ahead = (target_dow - today_dow).rem_euclid(7);

    let candidate = (now.date() + Duration::days(days_ahead)).and_time(time);
    if candidate > now {
        candidate
    } else {
        // Today is the target day and the time has passed: push 7 days.
        candidate + Duration::days(7)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn week_range_from_every_weekday() {
        // 2026-10-12 is a Monday; the week ending 2026-10-11 runs from 10-05.
        let expected_prev = WeekRange { start: d("2026-10-05"), end: d("2026-10-11") };
        let expected_this = WeekRange { start: d("2026-10-12"), end: d("2026-10-18") };

        assert_eq!(last_completed_week(d("2026-10-12")), expected_prev);
        assert_eq!(last_completed_week(d("2026-10-15")), expected_prev);
        assert_eq!(last_completed_week(d("2026-10-18")), expected_prev);
        assert_eq!(last_completed_week(d("2026-10-19")), expected_this);
    }

    #[test]
    fn week_range_crosses_year_boundary() {
        // 2027-01-01 is a Friday.
        let week = last_completed_week(d("2027-01-01"));
        assert_eq!(week, WeekRange { start: d("2026-12-21"), end: d("2026-12-27") });
    }

    #[test]
    fn previous_day_crosses_month() {
        assert_eq!(previous_day(d("2026-03-01")), d("2026-02-28"));
    }

    #[test]
    fn next_monday_at_one() {
        let one_am = NaiveTime::from_hms_opt(1, 0, 0).unwrap();
        // Monday before 01:00: later the same day.
        assert_eq!(
            next_weekday_at(dt("2026-10-19 00:30:00"), Weekday::Mon, one_am),
            dt("2026-10-19 01:00:00")
        );
        // Monday exactly at 01:00: a week later.
        assert_eq!(
            next_weekday_at(dt("2026-10-19 01:00:00"), Weekday::Mon, one_am),
            dt("2026-10-26 01:00:00")
        );
        // Thursday.
        assert_eq!(
            next_weekday_at(dt("2026-10-22 18:00:00"), Weekday::Mon, one_am),
            dt("2026-10-26 01:00:00")
        );
    }

    #[test]
    fn offset_shifts_the_business_day() {
        let cal = BusinessCalendar::with_offset_minutes(-300).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 3, 0, 0).unwrap();
        assert_eq!(cal.today(now), d("2026-10-18"));
        assert_eq!(cal.to_utc(cal.local(now)), now);
    }

    #[test]
    fn absurd_offset_is_rejected() {
        assert!(BusinessCalendar::with_offset_minutes(24 * 60).is_err());
    }
}
