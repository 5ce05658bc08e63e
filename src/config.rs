use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::calendar::DurationToken;
use crate::core::recurrence::{parse_time_of_day, DEFAULT_CUSTOM_INTERVAL};
use crate::core::task::TaskDraft;

pub const CONFIG_FILE: &str = "config.json";

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("taskdeck")
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct TaskdeckConfig {
    pub debug_logging: bool,
    /// `HH:MM` applied to recurring tasks created without a due time.
    pub default_time_of_day: String,
    pub default_custom_interval: i64,
    /// How long exported recurring events repeat: `1week` or `1month`.
    pub calendar_duration: String,
    pub default_tags: Vec<String>,
}

impl Default for TaskdeckConfig {
    fn default() -> Self {
        Self {
            debug_logging: false,
            default_time_of_day: "09:00".into(),
            default_custom_interval: i64::from(DEFAULT_CUSTOM_INTERVAL),
            calendar_duration: DurationToken::OneWeek.as_str().into(),
            default_tags: Vec::new(),
        }
    }
}

impl TaskdeckConfig {
    pub fn path() -> PathBuf {
        default_config_dir().join(CONFIG_FILE)
    }

    /// Load from the default location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                log::warn!("Ignoring unreadable config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// The configured default time, or 09:00 when it does not parse.
    pub fn default_time(&self) -> NaiveTime {
        parse_time_of_day(&self.default_time_of_day).unwrap_or_else(|| {
            log::warn!("Invalid default_time_of_day {:?}, using 09:00", self.default_time_of_day);
            NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN)
        })
    }

    /// Empty form pre-filled with the configured tags.
    pub fn new_draft(&self) -> TaskDraft {
        TaskDraft {
            tags: self.default_tags.clone(),
            ..TaskDraft::default()
        }
    }

    pub fn calendar_duration(&self) -> DurationToken {
        DurationToken::parse(&self.calendar_duration).unwrap_or(DurationToken::OneWeek)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("taskdeck-test-{}-{}", name, std::process::id()))
            .join(CONFIG_FILE)
    }

    #[test]
    fn missing_file_gives_defaults() {
        let config = TaskdeckConfig::load_from(&scratch_path("missing"));
        assert_eq!(config, TaskdeckConfig::default());
        assert_eq!(config.default_time(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    }

    #[test]
    fn save_and_reload() {
        let path = scratch_path("roundtrip");
        let config = TaskdeckConfig {
            debug_logging: true,
            default_tags: vec!["home".into()],
            calendar_duration: "1month".into(),
            ..TaskdeckConfig::default()
        };
        config.save_to(&path).unwrap();
        let loaded = TaskdeckConfig::load_from(&path);
        assert_eq!(loaded, config);
        assert_eq!(loaded.calendar_duration(), DurationToken::OneMonth);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config: TaskdeckConfig = serde_json::from_str(r#"{"default_time_of_day": "7:30"}"#).unwrap();
        assert_eq!(config.default_time(), NaiveTime::from_hms_opt(7, 30, 0).unwrap());
        assert_eq!(config.default_custom_interval, 7);
    }

    #[test]
    fn new_draft_carries_default_tags() {
        let config = TaskdeckConfig {
            default_tags: vec!["inbox".into()],
            ..TaskdeckConfig::default()
        };
        let draft = config.new_draft();
        assert_eq!(draft.tags, vec!["inbox"]);
        assert_eq!(draft.priority, "medium");
    }

    #[test]
    fn calendar_duration_bounds_recurring_events() {
        use crate::calendar::vevent::CalendarEvent;
        use crate::core::recurrence::RecurrenceType;
        use crate::core::task::Task;
        use chrono::NaiveDate;

        let start = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let mut task = Task::new("Backup", "ana", start);
        task.due = Some(start);
        task.recurrence = Some(crate::core::recurrence::RecurrenceRule::new(
            RecurrenceType::Weekly,
            start.time(),
        ));
        let config = TaskdeckConfig {
            calendar_duration: "1month".into(),
            ..TaskdeckConfig::default()
        };
        let event = CalendarEvent::recurring_from_task(&task, config.calendar_duration(), start);
        assert_eq!(event.rrule.as_deref(), Some("FREQ=WEEKLY;UNTIL=20260303T090000"));
    }

    #[test]
    fn bad_values_fall_back() {
        let config = TaskdeckConfig {
            default_time_of_day: "25:00".into(),
            calendar_duration: "forever".into(),
            ..TaskdeckConfig::default()
        };
        assert_eq!(config.default_time(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(config.calendar_duration(), DurationToken::OneWeek);
    }
}
