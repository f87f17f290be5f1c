//! Calendar arithmetic for reminders: weekday sets, `HH:MM` times, IANA
//! timezones and the next fire time.

use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc,
    Weekday,
};
use chrono_tz::Tz;

use crate::error::{AppError, AppResult};
use crate::i18n;

pub const EVERY_DAY: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Canonical weekday name as stored in `days_of_week`.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

pub fn parse_weekday(name: &str) -> Option<Weekday> {
    match name.trim().to_ascii_lowercase().as_str() {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Non-empty, de-duplicated set of weekdays ordered Monday to Sunday.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekdaySet(Vec<Weekday>);

impl WeekdaySet {
    pub fn parse<S: AsRef<str>>(names: &[S]) -> AppResult<Self> {
        let mut days = Vec::with_capacity(names.len());
        for name in names {
            let day = parse_weekday(name.as_ref())
                .ok_or_else(|| AppError::Validation(i18n::t("validation.days_of_week")))?;
            days.push(day);
        }

        days.sort_by_key(|d| d.num_days_from_monday());
        days.dedup();

        if days.is_empty() {
            return Err(AppError::Validation(i18n::t("validation.days_of_week")));
        }

        Ok(Self(days))
    }

    /// Parse the stored JSON array form.
    pub fn from_json(raw: &str) -> AppResult<Self> {
        let names: Vec<String> = serde_json::from_str(raw)
            .map_err(|e| AppError::Validation(format!("Malformed days_of_week {raw:?}: {e}")))?;
        Self::parse(&names)
    }

    pub fn to_json(&self) -> String {
        let names: Vec<&str> = self.0.iter().map(|d| weekday_name(*d)).collect();
        serde_json::Value::from(names).to_string()
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0.contains(&day)
    }

    pub fn days(&self) -> &[Weekday] {
        &self.0
    }
}

/// Accept `HH:MM` or `HH:MM:SS`; seconds are dropped.
pub fn parse_reminder_time(raw: &str) -> AppResult<NaiveTime> {
    let raw = raw.trim();
    let parsed = NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| AppError::Validation(i18n::t("validation.reminder_time")))?;

    NaiveTime::from_hms_opt(parsed.hour(), parsed.minute(), 0)
        .ok_or_else(|| AppError::Validation(i18n::t("validation.reminder_time")))
}

pub fn format_reminder_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

pub fn parse_timezone(raw: &str) -> AppResult<Tz> {
    raw.trim()
        .parse::<Tz>()
        .map_err(|_| AppError::Validation(i18n::t_with("validation.timezone", &[("tz", raw)])))
}

/// Wall-clock view of `now` in `tz`, truncated to the minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalMinute {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub weekday: Weekday,
}

impl LocalMinute {
    pub fn of(now: DateTime<Utc>, tz: Tz) -> Self {
        let local = now.with_timezone(&tz).naive_local();
        let time = NaiveTime::from_hms_opt(local.hour(), local.minute(), 0).unwrap_or(local.time());
        Self {
            date: local.date(),
            time,
            weekday: local.weekday(),
        }
    }

    pub fn hhmm(&self) -> String {
        format_reminder_time(self.time)
    }
}

/// Resolve a local wall-clock time to an instant.
///
/// Ambiguous times (DST fold) take the earliest instant; non-existent times
/// (DST gap) move forward to the first minute that exists.
fn resolve_local(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    let mut candidate = local;
    // Real-world gaps are at most a couple of hours
    for _ in 0..(24 * 60) {
        if let Some(dt) = tz.from_local_datetime(&candidate).earliest() {
            return dt.with_timezone(&Utc);
        }
        candidate += Duration::minutes(1);
    }
    Utc.from_utc_datetime(&local)
}

/// The first instant strictly after `now` whose local time in `tz` is `time`
/// on one of `days`.
///
/// Scans today and the following six days; if none qualifies the same weekday
/// next week is returned. An empty `days` slice therefore yields today's
/// weekday a week ahead.
pub fn next_occurrence(
    time: NaiveTime,
    days: &[Weekday],
    tz: Tz,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let today = now.with_timezone(&tz).date_naive();

    for offset in 0..7 {
        let date = today + Duration::days(offset);
        if !days.contains(&date.weekday()) {
            continue;
        }
        let candidate = resolve_local(tz, date.and_time(time));
        if candidate > now {
            return candidate;
        }
    }

    resolve_local(tz, (today + Duration::days(7)).and_time(time))
}

/// Start of the UTC minute containing `now`.
pub fn minute_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let secs = now.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(60), 0).unwrap_or(now)
}

/// The instant `time` falls on for the local date `date` in `tz`.
pub fn occurrence_on(date: NaiveDate, time: NaiveTime, tz: Tz) -> DateTime<Utc> {
    resolve_local(tz, date.and_time(time))
}

/// Whether a reminder set for `time` on `days` fires in the minute containing `now`.
///
/// Follows `next_occurrence`: a time skipped by a DST gap fires at the first
/// minute after the gap, and a time repeated by a fold fires only once.
pub fn is_due_at(time: NaiveTime, days: &WeekdaySet, tz: Tz, now: DateTime<Utc>) -> bool {
    let local = LocalMinute::of(now, tz);
    days.contains(local.weekday) && occurrence_on(local.date, time, tz) == minute_start(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn monday_reminder_after_wednesday_morning_lands_next_monday() {
        // 2026-03-04 is a Wednesday
        let now = utc(2026, 3, 4, 9, 1);
        let next = next_occurrence(hm(9, 0), &[Weekday::Mon], Tz::UTC, now);
        assert_eq!(next, utc(2026, 3, 9, 9, 0));
    }

    #[test]
    fn same_day_reminder_before_its_time_lands_today() {
        let now = utc(2026, 3, 4, 8, 59);
        let next = next_occurrence(hm(9, 0), &[Weekday::Wed], Tz::UTC, now);
        assert_eq!(next, utc(2026, 3, 4, 9, 0));
    }

    #[test]
    fn exact_match_moves_a_full_week() {
        let now = utc(2026, 3, 4, 9, 0);
        let next = next_occurrence(hm(9, 0), &[Weekday::Wed], Tz::UTC, now);
        assert_eq!(next, utc(2026, 3, 11, 9, 0));
    }

    #[test]
    fn result_is_earliest_valid_future_candidate() {
        let days = [Weekday::Mon, Weekday::Thu, Weekday::Sat];
        let start = utc(2026, 3, 1, 0, 0);

        for step in 0..(14 * 24 * 4) {
            let now = start + Duration::minutes(15 * step);
            let next = next_occurrence(hm(18, 30), &days, Tz::UTC, now);

            assert!(next > now);
            assert!(days.contains(&next.weekday()));
            assert_eq!((next.hour(), next.minute()), (18, 30));

            // No earlier qualifying instant exists
            for offset in 0..=7 {
                let candidate = (now.date_naive() + Duration::days(offset))
                    .and_time(hm(18, 30))
                    .and_utc();
                if candidate > now && days.contains(&candidate.weekday()) {
                    assert!(candidate >= next, "earlier candidate {candidate} before {next}");
                }
            }
        }
    }

    #[test]
    fn respects_reminder_timezone() {
        let tz: Tz = "Asia/Tokyo".parse().unwrap();
        // 2026-03-04 00:30 UTC is Wednesday 09:30 in Tokyo
        let now = utc(2026, 3, 4, 0, 30);
        let next = next_occurrence(hm(9, 0), &[Weekday::Thu], tz, now);
        assert_eq!(next, utc(2026, 3, 5, 0, 0));
    }

    #[test]
    fn dst_gap_moves_forward() {
        let tz: Tz = "America/New_York".parse().unwrap();
        // 2026-03-08 02:30 does not exist in New York; clocks jump to 03:00 EDT
        let now = utc(2026, 3, 8, 0, 0);
        let next = next_occurrence(hm(2, 30), &[Weekday::Sun], tz, now);
        assert_eq!(next, utc(2026, 3, 8, 7, 0));
    }

    #[test]
    fn dst_fold_takes_earliest() {
        let tz: Tz = "America/New_York".parse().unwrap();
        // 2026-11-01 01:30 happens twice; the EDT one is 05:30 UTC
        let now = utc(2026, 11, 1, 0, 0);
        let next = next_occurrence(hm(1, 30), &[Weekday::Sun], tz, now);
        assert_eq!(next, utc(2026, 11, 1, 5, 30));
    }

    #[test]
    fn weekday_set_is_canonical() {
        let set = WeekdaySet::parse(&["friday", "MONDAY", "Friday"]).unwrap();
        assert_eq!(set.days(), &[Weekday::Mon, Weekday::Fri]);
        assert_eq!(set.to_json(), r#"["Monday","Friday"]"#);
        assert_eq!(WeekdaySet::from_json(&set.to_json()).unwrap(), set);
    }

    #[test]
    fn weekday_set_rejects_empty_and_unknown() {
        assert!(WeekdaySet::parse::<&str>(&[]).is_err());
        assert!(WeekdaySet::parse(&["Funday"]).is_err());
        assert!(WeekdaySet::from_json("not json").is_err());
    }

    #[test]
    fn reminder_time_truncates_seconds() {
        assert_eq!(parse_reminder_time("07:05").unwrap(), hm(7, 5));
        assert_eq!(parse_reminder_time("07:05:59").unwrap(), hm(7, 5));
        assert!(parse_reminder_time("25:00").is_err());
        assert!(parse_reminder_time("7pm").is_err());
    }

    #[test]
    fn due_check_uses_local_minute() {
        let tz: Tz = "Asia/Tokyo".parse().unwrap();
        let days = WeekdaySet::parse(&["Wednesday"]).unwrap();
        // Wednesday 09:00:42 in Tokyo
        let now = utc(2026, 3, 4, 0, 0) + Duration::seconds(42);
        assert!(is_due_at(hm(9, 0), &days, tz, now));
        assert!(!is_due_at(hm(9, 0), &days, Tz::UTC, now));
    }

    #[test]
    fn due_check_follows_dst_gap_and_fold() {
        let tz: Tz = "America/New_York".parse().unwrap();
        let sunday = WeekdaySet::parse(&["Sunday"]).unwrap();

        // 02:30 is skipped on 2026-03-08 and fires at 03:00 EDT (07:00 UTC)
        assert!(!is_due_at(hm(2, 30), &sunday, tz, utc(2026, 3, 8, 6, 59)));
        assert!(is_due_at(hm(2, 30), &sunday, tz, utc(2026, 3, 8, 7, 0) + Duration::seconds(30)));
        assert!(!is_due_at(hm(2, 30), &sunday, tz, utc(2026, 3, 8, 7, 1)));

        // 01:30 happens twice on 2026-11-01; only the first pass fires
        assert!(is_due_at(hm(1, 30), &sunday, tz, utc(2026, 11, 1, 5, 30)));
        assert!(!is_due_at(hm(1, 30), &sunday, tz, utc(2026, 11, 1, 6, 30)));
    }

    #[test]
    fn minute_start_truncates() {
        let at = utc(2026, 3, 4, 9, 0) + Duration::milliseconds(59_999);
        assert_eq!(minute_start(at), utc(2026, 3, 4, 9, 0));
        assert_eq!(minute_start(utc(2026, 3, 4, 9, 0)), utc(2026, 3, 4, 9, 0));
    }
}
