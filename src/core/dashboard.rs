use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::HashMap;

use super::task::{Priority, Task, TaskStatus, UserRole};

/// Per-session view state: who is looking and the tasks they can see.
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub user: String,
    pub role: UserRole,
    pub team: Option<String>,
    tasks: Vec<Task>,
}

/// Numeric aggregates handed to the charting layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub by_status: Vec<(TaskStatus, usize)>,
    pub by_priority: Vec<(Priority, usize)>,
    pub overdue: usize,
    /// Completed / total, 0.0 when there are no tasks.
    pub completion_rate: f64,
    /// Oldest day first, ending today.
    pub completions_per_day: Vec<(NaiveDate, usize)>,
    /// Most used tags first, ties by name.
    pub top_tags: Vec<(String, usize)>,
}

impl Dashboard {
    pub fn new(user: impl Into<String>, role: UserRole, team: Option<String>) -> Self {
        Self {
            user: user.into(),
            role,
            team,
            tasks: Vec::new(),
        }
    }

    /// Replace the current snapshot, keeping only tasks visible to this session.
    pub fn apply_snapshot(&mut self, tasks: Vec<Task>) {
        let team = self.team.as_deref();
        self.tasks = tasks
            .into_iter()
            .filter(|t| t.visible_to(&self.user, self.role, team))
            .collect();
        log::debug!("Dashboard snapshot: {} visible tasks", self.tasks.len());
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Open tasks with a due date, soonest first.
    pub fn upcoming(&self, limit: usize) -> Vec<&Task> {
        let mut open: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| !t.status.is_done() && t.due.is_some())
            .collect();
        open.sort_by_key(|t| t.due);
        open.truncate(limit);
        open
    }

    pub fn stats(&self, now: NaiveDateTime, days: u32) -> TaskStats {
        let total = self.tasks.len();

        let by_status = TaskStatus::ALL
            .into_iter()
            .map(|s| (s, self.tasks.iter().filter(|t| t.status == s).count()))
            .collect::<Vec<_>>();

        let by_priority = Priority::ALL
            .into_iter()
            .map(|p| (p, self.tasks.iter().filter(|t| t.priority == p).count()))
            .collect();

        let done = by_status
            .iter()
            .find(|(s, _)| s.is_done())
            .map(|(_, n)| *n)
            .unwrap_or(0);
        let completion_rate = if total == 0 {
            0.0
        } else {
            done as f64 / total as f64
        };

        let today = now.date();
        let completions_per_day = (0..days)
            .rev()
            .map(|back| {
                let day = today - Duration::days(i64::from(back));
                let count = self
                    .tasks
                    .iter()
                    .filter(|t| t.completed.is_some_and(|c| c.date() == day))
                    .count();
                (day, count)
            })
            .collect();

        let mut tag_counts: HashMap<&str, usize> = HashMap::new();
        for tag in self.tasks.iter().flat_map(|t| t.tags.iter()) {
            *tag_counts.entry(tag.as_str()).or_default() += 1;
        }
        let mut top_tags: Vec<(String, usize)> = tag_counts
            .into_iter()
            .map(|(tag, n)| (tag.to_string(), n))
            .collect();
        top_tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        TaskStats {
            total,
            by_status,
            by_priority,
            overdue: self.tasks.iter().filter(|t| t.is_overdue(now)).count(),
            completion_rate,
            completions_per_day,
            top_tags,
        }
    }
}
