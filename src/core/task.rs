use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::recurrence::{RecurrenceRule, RecurrenceType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub const ALL: [Self; 3] = [Self::Pending, Self::InProgress, Self::Completed];

    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
        }
    }

    pub fn from_slug(s: &str) -> Option<Self> {
        match s {
            "pending" | "todo" => Some(Self::Pending),
            "in-progress" => Some(Self::InProgress),
            "completed" | "done" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Form option order.
    pub const ALL: [Self; 3] = [Self::High, Self::Medium, Self::Low];

    /// Internal option value.
    pub fn value(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }

    pub fn from_value(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.value() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    Admin,
    Member,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("task title cannot be empty")]
    EmptyTitle,
    #[error("unknown priority: {0}")]
    UnknownPriority(String),
    #[error("unknown status: {0}")]
    UnknownStatus(String),
}

/// Editable form state. Voice input and keyboard input both write here; a
/// [`Task`] is only built when the form is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    /// Raw select value; validated on submit.
    pub priority: String,
    /// Raw status slug; validated on submit.
    pub status: String,
    pub tags: Vec<String>,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
    pub recurrence: Option<RecurrenceType>,
    pub assignee: Option<String>,
    pub team: Option<String>,
}

impl Default for TaskDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            priority: Priority::Medium.value().to_string(),
            status: TaskStatus::Pending.as_slug().to_string(),
            tags: Vec::new(),
            due_date: None,
            due_time: None,
            recurrence: None,
            assignee: None,
            team: None,
        }
    }
}

impl TaskDraft {
    pub fn due(&self) -> Option<NaiveDateTime> {
        self.due_date
            .map(|d| d.and_time(self.due_time.unwrap_or(NaiveTime::MIN)))
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub tags: Vec<String>,
    pub due: Option<NaiveDateTime>,
    pub recurrence: Option<RecurrenceRule>,
    pub owner: String,
    pub assignee: Option<String>,
    pub team: Option<String>,
    pub created: NaiveDateTime,
    pub completed: Option<NaiveDateTime>,
}

impl Task {
    pub fn new(title: impl Into<String>, owner: impl Into<String>, created: NaiveDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: String::new(),
            priority: Priority::Medium,
            status: TaskStatus::Pending,
            tags: Vec::new(),
            due: None,
            recurrence: None,
            owner: owner.into(),
            assignee: None,
            team: None,
            created,
            completed: None,
        }
    }

    /// Validate a submitted form. The recurrence rule is attached unscheduled;
    /// its time of day is the draft's due time, or `default_time` without one.
    pub fn from_draft(
        draft: &TaskDraft,
        owner: &str,
        now: NaiveDateTime,
        default_time: NaiveTime,
    ) -> Result<Self, DraftError> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(DraftError::EmptyTitle);
        }
        let priority = Priority::from_value(draft.priority.trim())
            .ok_or_else(|| DraftError::UnknownPriority(draft.priority.clone()))?;
        let status = TaskStatus::from_slug(draft.status.trim())
            .ok_or_else(|| DraftError::UnknownStatus(draft.status.clone()))?;

        let mut task = Self::new(title, owner, now);
        task.description = draft.description.trim().to_string();
        task.priority = priority;
        task.status = status;
        task.tags = draft
            .tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        task.due = draft.due();
        task.recurrence = draft
            .recurrence
            .map(|kind| RecurrenceRule::new(kind, draft.due_time.unwrap_or(default_time)));
        task.assignee = draft.assignee.clone().filter(|a| !a.is_empty());
        task.team = draft.team.clone().filter(|t| !t.is_empty());
        if status.is_done() {
            task.completed = Some(now);
        }
        Ok(task)
    }

    pub fn complete(&mut self, now: NaiveDateTime) {
        self.status = TaskStatus::Completed;
        self.completed = Some(now);
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    pub fn is_overdue(&self, now: NaiveDateTime) -> bool {
        !self.status.is_done() && self.due.is_some_and(|due| due < now)
    }

    /// The next instance of a recurring series, due at `due`.
    pub fn next_instance(&self, due: NaiveDateTime, now: NaiveDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: TaskStatus::Pending,
            due: Some(due),
            created: now,
            completed: None,
            ..self.clone()
        }
    }

    /// Admins see every task of their team; members see what they own or
    /// were assigned.
    pub fn visible_to(&self, user: &str, role: UserRole, team: Option<&str>) -> bool {
        if self.owner == user || self.assignee.as_deref() == Some(user) {
            return true;
        }
        match role {
            UserRole::Admin => team.is_some() && self.team.as_deref() == team,
            UserRole::Member => false,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn nine() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 0, 0).unwrap()
    }

    #[test]
    fn draft_converts_to_task() {
        let draft = TaskDraft {
            title: "  Water plants ".into(),
            priority: "high".into(),
            status: "in-progress".into(),
            tags: vec!["home".into(), " ".into()],
            due_date: NaiveDate::from_ymd_opt(2026, 2, 12),
            ..TaskDraft::default()
        };
        let task = Task::from_draft(&draft, "ana", now(), nine()).unwrap();
        assert_eq!(task.title, "Water plants");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.tags, vec!["home"]);
        assert_eq!(
            task.due,
            NaiveDate::from_ymd_opt(2026, 2, 12).unwrap().and_hms_opt(0, 0, 0)
        );
        assert!(task.recurrence.is_none());
    }

    #[test]
    fn draft_validation_errors() {
        let mut draft = TaskDraft::default();
        assert_eq!(
            Task::from_draft(&draft, "ana", now(), nine()),
            Err(DraftError::EmptyTitle)
        );
        draft.title = "x".into();
        draft.priority = "urgent".into();
        assert_eq!(
            Task::from_draft(&draft, "ana", now(), nine()),
            Err(DraftError::UnknownPriority("urgent".into()))
        );
        draft.priority = "low".into();
        draft.status = "blocked".into();
        assert_eq!(
            Task::from_draft(&draft, "ana", now(), nine()),
            Err(DraftError::UnknownStatus("blocked".into()))
        );
    }

    #[test]
    fn recurring_draft_uses_due_time_or_default() {
        let mut draft = TaskDraft {
            title: "Standup".into(),
            recurrence: Some(RecurrenceType::Daily),
            ..TaskDraft::default()
        };
        let task = Task::from_draft(&draft, "ana", now(), nine()).unwrap();
        assert_eq!(task.recurrence.unwrap().time_of_day, nine());

        draft.due_time = NaiveTime::from_hms_opt(10, 15, 0);
        let task = Task::from_draft(&draft, "ana", now(), nine()).unwrap();
        let rule = task.recurrence.unwrap();
        assert_eq!(rule.time_of_day_string(), "10:15");
        assert!(rule.next_occurrence.is_none());
    }

    #[test]
    fn next_instance_resets_completion() {
        let mut task = Task::new("Report", "ana", now());
        task.complete(now());
        let due = now() + chrono::Duration::days(1);
        let next = task.next_instance(due, now());
        assert_ne!(next.id, task.id);
        assert_eq!(next.status, TaskStatus::Pending);
        assert_eq!(next.due, Some(due));
        assert!(next.completed.is_none());
    }

    #[test]
    fn visibility_by_role() {
        let mut task = Task::new("Audit", "ana", now());
        task.team = Some("ops".into());
        task.assignee = Some("ben".into());
        assert!(task.visible_to("ana", UserRole::Member, None));
        assert!(task.visible_to("ben", UserRole::Member, Some("ops")));
        assert!(!task.visible_to("cy", UserRole::Member, Some("ops")));
        assert!(task.visible_to("cy", UserRole::Admin, Some("ops")));
        assert!(!task.visible_to("cy", UserRole::Admin, Some("sales")));
        assert!(!task.visible_to("cy", UserRole::Admin, None));
    }

    #[test]
    fn overdue_ignores_completed() {
        let mut task = Task::new("Bills", "ana", now());
        task.due = Some(now() - chrono::Duration::hours(1));
        assert!(task.is_overdue(now()));
        task.complete(now());
        assert!(!task.is_overdue(now()));
    }
}
