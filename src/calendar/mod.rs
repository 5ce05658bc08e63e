pub mod ical;
pub mod vevent;

use chrono::{Duration, NaiveDateTime};
use std::fmt;
use thiserror::Error;

use crate::core::recurrence::RecurrenceType;
use crate::core::task::Task;
use vevent::CalendarEvent;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("calendar sign-in failed: {0}")]
    SignInFailed(String),
    #[error("calendar request failed: {0}")]
    Request(String),
    #[error("unknown calendar duration: {0}")]
    UnknownDuration(String),
}

/// How long a recurring calendar event keeps repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationToken {
    OneWeek,
    OneMonth,
}

impl DurationToken {
    pub fn parse(s: &str) -> Result<Self, CalendarError> {
        match s.trim() {
            "1week" => Ok(Self::OneWeek),
            "1month" => Ok(Self::OneMonth),
            other => Err(CalendarError::UnknownDuration(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneWeek => "1week",
            Self::OneMonth => "1month",
        }
    }

    pub fn end_from(&self, start: NaiveDateTime) -> NaiveDateTime {
        match self {
            Self::OneWeek => start + Duration::weeks(1),
            Self::OneMonth => RecurrenceType::Monthly
                .advance(start)
                .unwrap_or(start + Duration::days(30)),
        }
    }
}

impl fmt::Display for DurationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote calendar account.
#[allow(async_fn_in_trait)]
pub trait CalendarClient {
    fn is_signed_in(&self) -> bool;
    async fn sign_in(&self) -> Result<(), String>;
    /// Insert one event given as VCALENDAR text; returns the remote event id.
    async fn insert_event(&self, ical: &str) -> Result<String, String>;
}

/// Pushes tasks to a calendar, signing in at most once per call.
pub struct CalendarSync<C> {
    client: C,
}

impl<C: CalendarClient> CalendarSync<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    async fn ensure_signed_in(&self) -> Result<(), CalendarError> {
        if self.client.is_signed_in() {
            return Ok(());
        }
        log::info!("Calendar not signed in, attempting sign-in");
        self.client.sign_in().await.map_err(|e| {
            log::error!("Calendar sign-in failed: {}", e);
            CalendarError::SignInFailed(format!(
                "could not sign in to the calendar ({}); sign in and try again",
                e
            ))
        })?;
        if !self.client.is_signed_in() {
            return Err(CalendarError::SignInFailed(
                "sign-in finished without an active session".to_string(),
            ));
        }
        Ok(())
    }

    async fn insert(&self, event: &CalendarEvent, now: NaiveDateTime) -> Result<String, CalendarError> {
        self.ensure_signed_in().await?;
        let id = self
            .client
            .insert_event(&event.to_vcalendar(now))
            .await
            .map_err(|e| {
                log::error!("Failed to create calendar event for {}: {}", event.uid, e);
                CalendarError::Request(e)
            })?;
        log::info!("Created calendar event {} for task {}", id, event.uid);
        Ok(id)
    }

    pub async fn create_event(&self, task: &Task, now: NaiveDateTime) -> Result<String, CalendarError> {
        self.insert(&CalendarEvent::from_task(task, now), now).await
    }

    pub async fn create_recurring_event(
        &self,
        task: &Task,
        duration: DurationToken,
        now: NaiveDateTime,
    ) -> Result<String, CalendarError> {
        self.insert(&CalendarEvent::recurring_from_task(task, duration, now), now)
            .await
    }
}
