use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Days between occurrences for a custom rule with no usable interval.
pub const DEFAULT_CUSTOM_INTERVAL: u32 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecurrenceError {
    #[error("Invalid date")]
    InvalidDate,
    #[error("unknown recurrence type: {0}")]
    UnknownRecurrenceType(String),
}

/// How far a recurring task moves forward each time it repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceType {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    /// Every N days.
    Custom(u32),
}

impl RecurrenceType {
    /// Parse a stored type string. `interval` only matters for `custom` and
    /// falls back to [`DEFAULT_CUSTOM_INTERVAL`] when missing or non-positive.
    pub fn parse(kind: &str, interval: Option<i64>) -> Result<Self, RecurrenceError> {
        match kind.trim().to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            "custom" => Ok(Self::Custom(custom_interval(interval))),
            other => Err(RecurrenceError::UnknownRecurrenceType(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Custom(_) => "custom",
        }
    }

    pub fn interval(&self) -> Option<u32> {
        match self {
            Self::Custom(days) => Some(*days),
            _ => None,
        }
    }

    /// Step `from` forward by one period. `None` only when the result leaves
    /// the representable date range. A stored `Custom(0)` steps by the default
    /// interval.
    pub fn advance(&self, from: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            Self::Daily => from.checked_add_signed(Duration::days(1)),
            Self::Weekly => from.checked_add_signed(Duration::weeks(1)),
            Self::Monthly => add_months_overflowing(from, 1),
            Self::Yearly => add_months_overflowing(from, 12),
            Self::Custom(days) => {
                from.checked_add_signed(Duration::days(i64::from(custom_interval(Some(i64::from(*days))))))
            }
        }
    }
}

impl fmt::Display for RecurrenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn custom_interval(interval: Option<i64>) -> u32 {
    match interval {
        Some(days) if days > 0 => u32::try_from(days).unwrap_or(u32::MAX),
        _ => DEFAULT_CUSTOM_INTERVAL,
    }
}

/// Calendar-month addition that keeps the day-of-month and lets days past the
/// end of the target month spill into the following month (Jan 31 + 1 month
/// lands on Mar 3 in a non-leap year).
fn add_months_overflowing(from: NaiveDateTime, months: u32) -> Option<NaiveDateTime> {
    let total_months = from.month0() + months;
    let year = from.year().checked_add(i32::try_from(total_months / 12).ok()?)?;
    let month = total_months % 12 + 1;
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let date = first.checked_add_signed(Duration::days(i64::from(from.day0())))?;
    Some(date.and_time(from.time()))
}

/// Parse a due date given as RFC 3339 (converted to local wall-clock time),
/// `YYYY-MM-DDTHH:MM[:SS]`, `YYYY-MM-DD HH:MM[:SS]` or a bare `YYYY-MM-DD`.
pub fn parse_due_date(input: &str) -> Option<NaiveDateTime> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parse `HH:MM` with hour in 0..=23 and minute in 0..=59.
pub fn parse_time_of_day(input: &str) -> Option<NaiveTime> {
    let (hour, minute) = input.trim().split_once(':')?;
    let valid = |part: &str| !part.is_empty() && part.len() <= 2 && part.bytes().all(|b| b.is_ascii_digit());
    if !valid(hour) || !valid(minute) {
        return None;
    }
    NaiveTime::from_hms_opt(hour.parse().ok()?, minute.parse().ok()?, 0)
}

/// Next occurrence after `anchor`: the anchor's date at `time_of_day`
/// (seconds zeroed), advanced by one period of `kind`.
pub fn next_occurrence_from(
    anchor: NaiveDateTime,
    kind: RecurrenceType,
    time_of_day: NaiveTime,
) -> Result<NaiveDateTime, RecurrenceError> {
    let time = NaiveTime::from_hms_opt(time_of_day.hour(), time_of_day.minute(), 0)
        .ok_or(RecurrenceError::InvalidDate)?;
    kind.advance(anchor.date().and_time(time))
        .ok_or(RecurrenceError::InvalidDate)
}

/// String-level entry point used by forms and the CLI.
pub fn compute_next_occurrence(
    due_date: &str,
    kind: &str,
    time_of_day: &str,
    interval: Option<i64>,
) -> Result<NaiveDateTime, RecurrenceError> {
    let due = parse_due_date(due_date).ok_or(RecurrenceError::InvalidDate)?;
    let time = parse_time_of_day(time_of_day).ok_or(RecurrenceError::InvalidDate)?;
    let kind = RecurrenceType::parse(kind, interval)?;
    next_occurrence_from(due, kind, time)
}

/// Stored schedule of a repeating task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub kind: RecurrenceType,
    pub time_of_day: NaiveTime,
    pub next_occurrence: Option<NaiveDateTime>,
}

impl RecurrenceRule {
    pub fn new(kind: RecurrenceType, time_of_day: NaiveTime) -> Self {
        Self {
            kind,
            time_of_day,
            next_occurrence: None,
        }
    }

    pub fn parse(kind: &str, time_of_day: &str, interval: Option<i64>) -> Result<Self, RecurrenceError> {
        let time = parse_time_of_day(time_of_day).ok_or(RecurrenceError::InvalidDate)?;
        Ok(Self::new(RecurrenceType::parse(kind, interval)?, time))
    }

    /// First scheduling of the series. A due date already in the past is
    /// replaced by `now` as the anchor.
    pub fn schedule_initial(
        &mut self,
        due: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<NaiveDateTime, RecurrenceError> {
        let anchor = due.max(now);
        let next = next_occurrence_from(anchor, self.kind, self.time_of_day)?;
        log::debug!("Initial {} schedule anchored at {}: next {}", self.kind, anchor, next);
        self.next_occurrence = Some(next);
        Ok(next)
    }

    /// Advance the series after a completion. Always anchors on the previous
    /// `next_occurrence`, even when that lies in the past, so missed
    /// occurrences are caught up one completion at a time.
    pub fn roll_forward(&mut self) -> Result<NaiveDateTime, RecurrenceError> {
        let anchor = self.next_occurrence.ok_or(RecurrenceError::InvalidDate)?;
        let next = next_occurrence_from(anchor, self.kind, self.time_of_day)?;
        log::debug!("Rolled {} rule from {} to {}", self.kind, anchor, next);
        self.next_occurrence = Some(next);
        Ok(next)
    }

    pub fn time_of_day_string(&self) -> String {
        self.time_of_day.format("%H:%M").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn daily_sets_time_and_adds_one_day() {
        let next = compute_next_occurrence("2026-02-01T10:17:42", "daily", "08:30", None).unwrap();
        assert_eq!(next, at(2026, 2, 2, 8, 30));
        assert_eq!(next.second(), 0);
    }

    #[test]
    fn weekly_adds_seven_days() {
        let next = compute_next_occurrence("2026-02-01", "weekly", "09:00", None).unwrap();
        assert_eq!(next, at(2026, 2, 8, 9, 0));
    }

    #[test]
    fn custom_defaults_to_seven_days() {
        let next = compute_next_occurrence("2026-02-01", "custom", "09:00", None).unwrap();
        assert_eq!(next, at(2026, 2, 8, 9, 0));
        let next = compute_next_occurrence("2026-02-01", "custom", "09:00", Some(0)).unwrap();
        assert_eq!(next, at(2026, 2, 8, 9, 0));
        let next = compute_next_occurrence("2026-02-01", "custom", "09:00", Some(-4)).unwrap();
        assert_eq!(next, at(2026, 2, 8, 9, 0));
    }

    #[test]
    fn custom_uses_interval() {
        let next = compute_next_occurrence("2026-02-01", "custom", "09:00", Some(3)).unwrap();
        assert_eq!(next, at(2026, 2, 4, 9, 0));
    }

    #[test]
    fn interval_ignored_for_fixed_types() {
        let next = compute_next_occurrence("2026-02-01", "daily", "09:00", Some(3)).unwrap();
        assert_eq!(next, at(2026, 2, 2, 9, 0));
    }

    #[test]
    fn monthly_from_jan_31_leaves_january() {
        let next = compute_next_occurrence("2026-01-31", "monthly", "09:00", None).unwrap();
        assert!(next.month() > 1);
        // Day 31 spills past the end of February.
        assert_eq!(next, at(2026, 3, 3, 9, 0));
    }

    #[test]
    fn monthly_keeps_day_of_month() {
        let next = compute_next_occurrence("2026-12-15", "monthly", "18:45", None).unwrap();
        assert_eq!(next, at(2027, 1, 15, 18, 45));
    }

    #[test]
    fn yearly_from_leap_day_spills_into_march() {
        let next = compute_next_occurrence("2028-02-29", "yearly", "07:00", None).unwrap();
        assert_eq!(next, at(2029, 3, 1, 7, 0));
        let next = compute_next_occurrence("2026-06-10", "yearly", "07:00", None).unwrap();
        assert_eq!(next, at(2027, 6, 10, 7, 0));
    }

    #[test]
    fn type_is_case_insensitive() {
        assert_eq!(RecurrenceType::parse("Weekly", None), Ok(RecurrenceType::Weekly));
        assert_eq!(RecurrenceType::parse(" CUSTOM ", Some(2)), Ok(RecurrenceType::Custom(2)));
    }

    #[test]
    fn invalid_due_date() {
        assert_eq!(
            compute_next_occurrence("not a date", "daily", "09:00", None),
            Err(RecurrenceError::InvalidDate)
        );
        assert_eq!(
            compute_next_occurrence("2026-02-30", "daily", "09:00", None),
            Err(RecurrenceError::InvalidDate)
        );
        assert_eq!(
            compute_next_occurrence("", "daily", "09:00", None),
            Err(RecurrenceError::InvalidDate)
        );
    }

    #[test]
    fn invalid_time_of_day() {
        for time in ["24:00", "12:60", "noon", "12", "1:2:3", "-1:30", ":30"] {
            assert_eq!(
                compute_next_occurrence("2026-02-01", "daily", time, None),
                Err(RecurrenceError::InvalidDate),
                "{time}"
            );
        }
        assert!(parse_time_of_day("9:05").is_some());
        assert!(parse_time_of_day("23:59").is_some());
        assert!(parse_time_of_day("00:00").is_some());
    }

    #[test]
    fn unknown_type() {
        assert_eq!(
            compute_next_occurrence("2026-02-01", "hourly", "09:00", None),
            Err(RecurrenceError::UnknownRecurrenceType("hourly".to_string()))
        );
    }

    #[test]
    fn rfc3339_due_date_parses() {
        assert!(parse_due_date("2026-02-01T10:00:00Z").is_some());
        assert!(parse_due_date("2026-02-01T10:00:00.000+02:00").is_some());
        assert_eq!(parse_due_date("2026-02-01 10:00"), Some(at(2026, 2, 1, 10, 0)));
    }

    #[test]
    fn next_is_strictly_after_due() {
        let kinds = [
            RecurrenceType::Daily,
            RecurrenceType::Weekly,
            RecurrenceType::Monthly,
            RecurrenceType::Yearly,
            RecurrenceType::Custom(1),
            RecurrenceType::Custom(0),
        ];
        let dues = [at(2026, 1, 31, 23, 59), at(2026, 2, 28, 0, 0), at(2028, 2, 29, 12, 0)];
        let times = [
            NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(23, 59, 0).unwrap(),
        ];
        for kind in kinds {
            for due in dues {
                for time in times {
                    let next = next_occurrence_from(due, kind, time).unwrap();
                    assert!(next > due, "{kind} {due} {time}");
                }
            }
        }
    }

    #[test]
    fn initial_schedule_anchors_on_now_when_due_is_past() {
        let mut rule = RecurrenceRule::parse("daily", "09:00", None).unwrap();
        let due = at(2026, 1, 1, 9, 0);
        let now = at(2026, 2, 10, 14, 0);
        let next = rule.schedule_initial(due, now).unwrap();
        assert_eq!(next, at(2026, 2, 11, 9, 0));
        assert_eq!(rule.next_occurrence, Some(next));
    }

    #[test]
    fn initial_schedule_anchors_on_future_due() {
        let mut rule = RecurrenceRule::parse("weekly", "09:00", None).unwrap();
        let due = at(2026, 3, 1, 9, 0);
        let now = at(2026, 2, 10, 14, 0);
        assert_eq!(rule.schedule_initial(due, now).unwrap(), at(2026, 3, 8, 9, 0));
    }

    #[test]
    fn rollover_anchors_on_previous_occurrence_even_in_the_past() {
        let mut rule = RecurrenceRule::parse("daily", "09:00", None).unwrap();
        let two_days_ago = at(2026, 2, 8, 9, 0);
        rule.next_occurrence = Some(two_days_ago);
        assert_eq!(rule.roll_forward().unwrap(), at(2026, 2, 9, 9, 0));
        // Still behind; the next completion catches up one more day.
        assert_eq!(rule.roll_forward().unwrap(), at(2026, 2, 10, 9, 0));
    }

    #[test]
    fn stored_zero_interval_rule_still_moves_forward() {
        let mut rule: RecurrenceRule = serde_json::from_value(serde_json::json!({
            "kind": {"custom": 0},
            "time_of_day": "09:00:00",
            "next_occurrence": "2026-02-10T09:00:00",
        }))
        .unwrap();
        assert_eq!(rule.kind, RecurrenceType::Custom(0));
        let next = rule.roll_forward().unwrap();
        assert_eq!(next, at(2026, 2, 17, 9, 0));
        assert!(next > at(2026, 2, 10, 9, 0));
    }

    #[test]
    fn rollover_without_schedule_fails() {
        let mut rule = RecurrenceRule::parse("daily", "09:00", None).unwrap();
        assert_eq!(rule.roll_forward(), Err(RecurrenceError::InvalidDate));
    }

    #[test]
    fn display_round_trips_type_names() {
        for name in ["daily", "weekly", "monthly", "yearly", "custom"] {
            let kind = RecurrenceType::parse(name, Some(3)).unwrap();
            assert_eq!(kind.to_string(), name);
        }
    }
}
