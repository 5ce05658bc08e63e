use std::io::BufRead;
use std::process::ExitCode;

use chrono::Local;
use tokio::sync::mpsc;

use taskdeck::backend::memory::{MemoryAuth, MemoryStore};
use taskdeck::backend::service::TaskService;
use taskdeck::backend::User;
use taskdeck::calendar::vevent::CalendarEvent;
use taskdeck::config::TaskdeckConfig;
use taskdeck::core::dashboard::Dashboard;
use taskdeck::core::recurrence::{compute_next_occurrence, parse_due_date, RecurrenceRule};
use taskdeck::core::task::{Task, UserRole};
use taskdeck::voice::{parse_voice_command, SpeechEvent, VoiceAction, VoiceSession};

const USAGE: &str = "\
usage:
  taskdeck next <due-date> <daily|weekly|monthly|yearly|custom> <HH:MM> [interval]
  taskdeck parse <transcript...>
  taskdeck event <title> <due-date> [<type> <HH:MM> [interval]]
  taskdeck dictate        (one final transcript per stdin line)
  taskdeck config";

/// Log to the systemd user journal (`journalctl --user -t taskdeck -f`).
/// taskdeck targets at info/debug (per config), everything else at warn.
fn init_logging(config: &TaskdeckConfig) {
    struct FilteredJournal {
        inner: systemd_journal_logger::JournalLog,
    }

    impl log::Log for FilteredJournal {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            if metadata.target().starts_with("taskdeck") {
                let max = if taskdeck::debug_logging() { log::LevelFilter::Debug } else { log::LevelFilter::Info };
                metadata.level() <= max
            } else {
                metadata.level() <= log::LevelFilter::Warn
            }
        }
        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                self.inner.log(record);
            }
        }
        fn flush(&self) {
            self.inner.flush();
        }
    }

    taskdeck::set_debug_logging(config.debug_logging);

    let journal = match systemd_journal_logger::JournalLog::new() {
        Ok(journal) => journal.with_syslog_identifier("taskdeck".to_string()),
        Err(e) => {
            eprintln!("taskdeck: journal logging unavailable: {}", e);
            return;
        }
    };
    if log::set_boxed_logger(Box::new(FilteredJournal { inner: journal })).is_ok() {
        // Global max must be Debug so debug logs can pass through when toggled
        log::set_max_level(log::LevelFilter::Debug);
    }
}

fn cmd_next(args: &[String], config: &TaskdeckConfig) -> ExitCode {
    let [due, kind, time, rest @ ..] = args else {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    };
    let interval = match parse_interval(rest.first(), config) {
        Ok(interval) => interval,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };
    match compute_next_occurrence(due, kind, time, interval) {
        Ok(next) => {
            println!("{}", next.format("%Y-%m-%dT%H:%M:%S"));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn parse_interval(raw: Option<&String>, config: &TaskdeckConfig) -> Result<Option<i64>, String> {
    match raw {
        Some(raw) => raw
            .parse::<i64>()
            .map(Some)
            .map_err(|_| format!("invalid interval: {}", raw)),
        None => Ok(Some(config.default_custom_interval)),
    }
}

/// Print a task as VCALENDAR text. Recurring tasks repeat for the configured
/// calendar duration.
fn cmd_event(args: &[String], config: &TaskdeckConfig) -> ExitCode {
    let [title, due, schedule @ ..] = args else {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    };
    let now = Local::now().naive_local();
    let Some(due) = parse_due_date(due) else {
        eprintln!("Invalid date");
        return ExitCode::FAILURE;
    };
    let owner = std::env::var("USER").unwrap_or_else(|_| "local".to_string());
    let mut task = Task::new(title.as_str(), owner, now);
    task.due = Some(due);

    let event = match schedule {
        [] => CalendarEvent::from_task(&task, now),
        [kind, time, rest @ ..] => {
            let interval = match parse_interval(rest.first(), config) {
                Ok(interval) => interval,
                Err(e) => {
                    eprintln!("{}", e);
                    return ExitCode::from(2);
                }
            };
            let rule = RecurrenceRule::parse(kind, time, interval).and_then(|mut rule| {
                rule.schedule_initial(due, now)?;
                Ok(rule)
            });
            match rule {
                Ok(rule) => task.recurrence = Some(rule),
                Err(e) => {
                    eprintln!("{}", e);
                    return ExitCode::FAILURE;
                }
            }
            CalendarEvent::recurring_from_task(&task, config.calendar_duration(), now)
        }
        [_] => {
            eprintln!("{}", USAGE);
            return ExitCode::from(2);
        }
    };
    print!("{}", event.to_vcalendar(now));
    ExitCode::SUCCESS
}

fn cmd_parse(args: &[String]) -> ExitCode {
    let transcript = args.join(" ");
    let parsed = parse_voice_command(&transcript);
    let today = Local::now().date_naive();
    let output = serde_json::json!({
        "utterance": parsed,
        "assignments": parsed.assignments(today),
    });
    match serde_json::to_string_pretty(&output) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Feed stdin lines through a voice session as final transcripts. Every
/// submit stores the draft in a process-local store; prints the stats at EOF.
async fn cmd_dictate(config: &TaskdeckConfig) -> ExitCode {
    let auth = MemoryAuth::new();
    let user = std::env::var("USER").unwrap_or_else(|_| "local".to_string());
    auth.sign_in(User {
        uid: user.clone(),
        display_name: user.clone(),
        role: UserRole::Member,
        team: None,
    });
    let service = TaskService::new(MemoryStore::new(), auth, config.default_time());
    let mut feed = service.subscribe();
    let mut dashboard = Dashboard::new(user, UserRole::Member, None);

    let (event_tx, mut event_rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines().map_while(Result::ok) {
            let event = SpeechEvent::Result {
                transcript: line,
                is_final: true,
            };
            if event_tx.blocking_send(event).is_err() {
                return;
            }
        }
        let _ = event_tx.blocking_send(SpeechEvent::End);
    });

    let today = Local::now().date_naive();
    let mut session = VoiceSession::new(config.new_draft());
    let mut failed = false;
    while let Some(event) = event_rx.recv().await {
        match session.handle(event, today) {
            None | Some(VoiceAction::Interim(_)) => {}
            Some(VoiceAction::Applied(fields)) => println!("updated {:?}", fields),
            Some(VoiceAction::Submit(fields)) => {
                println!("updated {:?}, saving", fields);
                let draft = std::mem::replace(&mut session, VoiceSession::new(config.new_draft()))
                    .into_draft();
                match service.create_task(&draft, Local::now().naive_local()).await {
                    Ok(task) => println!("saved {} ({})", task.title, task.id),
                    Err(e) => {
                        eprintln!("could not save task: {}", e);
                        failed = true;
                    }
                }
            }
            Some(VoiceAction::Failed(message)) => eprintln!("{}", message),
            Some(VoiceAction::Ended) => break,
        }
    }

    while let Ok(Some(Ok(tasks))) =
        tokio::time::timeout(std::time::Duration::from_millis(10), feed.next()).await
    {
        dashboard.apply_snapshot(tasks);
    }
    let stats = dashboard.stats(Local::now().naive_local(), 7);
    match serde_json::to_string_pretty(&stats) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("{}", e);
            failed = true;
        }
    }
    if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = TaskdeckConfig::load();
    init_logging(&config);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("next") => cmd_next(&args[1..], &config),
        Some("parse") => cmd_parse(&args[1..]),
        Some("event") => cmd_event(&args[1..], &config),
        Some("dictate") => cmd_dictate(&config).await,
        Some("config") => match serde_json::to_string_pretty(&config) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::FAILURE
            }
        },
        _ => {
            eprintln!("{}", USAGE);
            ExitCode::from(2)
        }
    }
}
