use chrono::{Duration, NaiveDateTime};

use super::ical::*;
use super::DurationToken;
use crate::core::recurrence::RecurrenceType;
use crate::core::task::Task;

/// A calendar entry derived from a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub uid: String,
    pub summary: String,
    pub description: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// RRULE value, without the `RRULE:` prefix.
    pub rrule: Option<String>,
}

impl CalendarEvent {
    /// One-hour event at the task's due time, or at its next occurrence, or at `now`.
    pub fn from_task(task: &Task, now: NaiveDateTime) -> Self {
        let start = task
            .due
            .or_else(|| task.recurrence.as_ref().and_then(|r| r.next_occurrence))
            .unwrap_or(now);
        let summary = if task.title.is_empty() {
            "(untitled task)".to_string()
        } else {
            task.title.clone()
        };
        Self {
            uid: task.id.to_string(),
            summary,
            description: task.description.clone(),
            start,
            end: start + Duration::hours(1),
            rrule: None,
        }
    }

    /// Like [`CalendarEvent::from_task`], repeating on the task's schedule
    /// (daily without one) until `duration` after the start.
    pub fn recurring_from_task(task: &Task, duration: DurationToken, now: NaiveDateTime) -> Self {
        let mut event = Self::from_task(task, now);
        let kind = task
            .recurrence
            .as_ref()
            .map(|r| r.kind)
            .unwrap_or(RecurrenceType::Daily);
        let freq = match kind {
            RecurrenceType::Daily => "FREQ=DAILY".to_string(),
            RecurrenceType::Weekly => "FREQ=WEEKLY".to_string(),
            RecurrenceType::Monthly => "FREQ=MONTHLY".to_string(),
            RecurrenceType::Yearly => "FREQ=YEARLY".to_string(),
            RecurrenceType::Custom(days) => format!("FREQ=DAILY;INTERVAL={}", days),
        };
        let until = duration.end_from(event.start);
        event.rrule = Some(format!("{};UNTIL={}", freq, format_datetime(until)));
        event
    }

    /// Full VCALENDAR text carrying this event as a VEVENT.
    pub fn to_vcalendar(&self, stamp: NaiveDateTime) -> String {
        let mut lines = vec![
            "BEGIN:VCALENDAR".to_string(),
            "VERSION:2.0".to_string(),
            "PRODID:-//Taskdeck//EN".to_string(),
            "BEGIN:VEVENT".to_string(),
            format!("UID:{}", self.uid),
            format!("DTSTAMP:{}", format_datetime(stamp)),
            fold_line(&format!("SUMMARY:{}", escape_text(&self.summary))),
            format!("DTSTART:{}", format_datetime(self.start)),
            format!("DTEND:{}", format_datetime(self.end)),
        ];
        if !self.description.is_empty() {
            lines.push(fold_line(&format!(
                "DESCRIPTION:{}",
                escape_text(&self.description)
            )));
        }
        if let Some(rrule) = &self.rrule {
            lines.push(format!("RRULE:{}", rrule));
        }
        lines.push("END:VEVENT".to_string());
        lines.push("END:VCALENDAR".to_string());

        lines.join("\r\n") + "\r\n"
    }
}
