use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::Serialize;
use std::ops::Range;
use std::sync::LazyLock;

use super::keywords::{
    find_phrase, DESCRIPTION_PHRASES, FILLER_WORDS, SUBMIT_PHRASES, TRAILING_CONNECTORS,
};
use crate::core::task::{Priority, TaskDraft};

static COMMAND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bset\s+(?:task\s+)?(?P<field>title|description|priority|due\s+date|status|tags?)\s+to\b")
        .unwrap()
});

static TAG_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*(?:,|\band\b)\s*").unwrap()
});

static ORDINAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?P<day>\d{1,2})(?:st|nd|rd|th)\b").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum VoiceField {
    Title,
    Description,
    Priority,
    Tags,
    DueDate,
    Status,
}

impl VoiceField {
    fn from_keyword(keyword: &str) -> Option<Self> {
        let keyword = keyword.to_lowercase();
        match keyword.split_whitespace().next()? {
            "title" => Some(Self::Title),
            "description" => Some(Self::Description),
            "priority" => Some(Self::Priority),
            "due" => Some(Self::DueDate),
            "status" => Some(Self::Status),
            "tag" | "tags" => Some(Self::Tags),
            _ => None,
        }
    }
}

/// One `set <field> to <value>` span of an utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceFieldCommand {
    pub field: VoiceField,
    /// Cleaned value text, without trailing punctuation or connector words.
    pub raw_value: String,
    /// Byte range of the value in the trimmed transcript.
    pub span: Range<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Submit,
    Description,
}

/// A normalized value ready to be written into the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum FieldValue {
    Title(String),
    Description(String),
    Priority(String),
    Tags(Vec<String>),
    DueDate(NaiveDate),
    Status(String),
}

impl FieldValue {
    pub fn field(&self) -> VoiceField {
        match self {
            Self::Title(_) => VoiceField::Title,
            Self::Description(_) => VoiceField::Description,
            Self::Priority(_) => VoiceField::Priority,
            Self::Tags(_) => VoiceField::Tags,
            Self::DueDate(_) => VoiceField::DueDate,
            Self::Status(_) => VoiceField::Status,
        }
    }

    pub fn apply_to(&self, draft: &mut TaskDraft) {
        match self {
            Self::Title(v) => draft.title = v.clone(),
            Self::Description(v) => draft.description = v.clone(),
            Self::Priority(v) => draft.priority = v.clone(),
            Self::Tags(v) => draft.tags = v.clone(),
            Self::DueDate(v) => draft.due_date = Some(*v),
            Self::Status(v) => draft.status = v.clone(),
        }
    }
}

impl VoiceFieldCommand {
    /// Field-specific normalization. `None` when a due date cannot be resolved.
    pub fn normalize(&self, today: NaiveDate) -> Option<FieldValue> {
        let raw = self.raw_value.as_str();
        Some(match self.field {
            VoiceField::Title => FieldValue::Title(raw.to_string()),
            VoiceField::Description => FieldValue::Description(raw.to_string()),
            VoiceField::Priority => FieldValue::Priority(match_priority(raw)),
            VoiceField::Status => FieldValue::Status(
                raw.to_lowercase().split_whitespace().collect::<Vec<_>>().join("-"),
            ),
            VoiceField::Tags => FieldValue::Tags(split_tags(raw)),
            VoiceField::DueDate => FieldValue::DueDate(parse_spoken_date(raw, today)?),
        })
    }
}

/// Result of parsing one final transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedUtterance {
    pub commands: Vec<VoiceFieldCommand>,
    /// Text before the first `set ... to` command.
    pub leftover: Option<String>,
    pub trigger: Option<Trigger>,
    /// Whether a command pattern or trigger phrase was recognized. False for
    /// the fallback-to-title case.
    pub matched: bool,
}

impl ParsedUtterance {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.leftover.is_none() && self.trigger.is_none()
    }

    pub fn submit(&self) -> bool {
        self.trigger == Some(Trigger::Submit)
    }

    /// Normalized values, at most one per field. A later command for the same
    /// field replaces an earlier one. Leftover text becomes the title when no
    /// title command was given.
    pub fn assignments(&self, today: NaiveDate) -> Vec<FieldValue> {
        let mut values: Vec<FieldValue> = Vec::new();
        for value in self.commands.iter().filter_map(|c| c.normalize(today)) {
            match values.iter_mut().find(|v| v.field() == value.field()) {
                Some(slot) => *slot = value,
                None => values.push(value),
            }
        }
        if let Some(leftover) = &self.leftover {
            if !values.iter().any(|v| v.field() == VoiceField::Title) {
                values.insert(0, FieldValue::Title(leftover.clone()));
            }
        }
        values
    }

    /// Write the assignments into `draft`, returning the fields touched.
    pub fn apply_to(&self, draft: &mut TaskDraft, today: NaiveDate) -> Vec<VoiceField> {
        self.assignments(today)
            .iter()
            .map(|value| {
                value.apply_to(draft);
                value.field()
            })
            .collect()
    }
}

/// Parse a final speech transcript into form field commands.
///
/// `set [task] <field> to <value>` commands are found left to right; each
/// value runs until the next command or the end of the text. Without any
/// command, the submit and description trigger tables are tried, and
/// failing those the whole transcript becomes the title.
pub fn parse_voice_command(transcript: &str) -> ParsedUtterance {
    let text = transcript.trim();
    if text.is_empty() {
        return ParsedUtterance::default();
    }

    let heads: Vec<(Range<usize>, VoiceField)> = COMMAND_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let head = caps.get(0)?;
            let field = VoiceField::from_keyword(caps.name("field")?.as_str())?;
            Some((head.range(), field))
        })
        .collect();

    if let Some((first, _)) = heads.first() {
        let commands = heads
            .iter()
            .enumerate()
            .filter_map(|(i, (head, field))| {
                let end = heads.get(i + 1).map_or(text.len(), |(next, _)| next.start);
                let raw_value = clean_value(&text[head.end..end]);
                (!raw_value.is_empty()).then(|| VoiceFieldCommand {
                    field: *field,
                    raw_value,
                    span: head.end..end,
                })
            })
            .collect::<Vec<_>>();
        let leftover = Some(clean_value(&text[..first.start])).filter(|s| !s.is_empty());
        log::debug!("Voice: {} field command(s) recognized", commands.len());
        return ParsedUtterance {
            commands,
            leftover,
            trigger: None,
            matched: true,
        };
    }

    let lowered = text.to_lowercase();
    let triggered = find_phrase(SUBMIT_PHRASES, &lowered)
        .map(|phrase| (Trigger::Submit, VoiceField::Title, phrase))
        .or_else(|| {
            find_phrase(DESCRIPTION_PHRASES, &lowered)
                .map(|phrase| (Trigger::Description, VoiceField::Description, phrase))
        });

    if let Some((trigger, field, phrase)) = triggered {
        log::debug!("Voice: {:?} trigger {:?}", trigger, phrase);
        let remainder = strip_edge_fillers(&remove_phrase(text, phrase));
        let commands = if remainder.is_empty() {
            Vec::new()
        } else {
            vec![VoiceFieldCommand {
                field,
                raw_value: remainder,
                span: 0..text.len(),
            }]
        };
        return ParsedUtterance {
            commands,
            leftover: None,
            trigger: Some(trigger),
            matched: true,
        };
    }

    log::debug!("Voice: no command recognized, using transcript as title");
    ParsedUtterance {
        commands: vec![VoiceFieldCommand {
            field: VoiceField::Title,
            raw_value: text.to_string(),
            span: 0..text.len(),
        }],
        leftover: None,
        trigger: None,
        matched: false,
    }
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | '¡' | '¿' | '。' | '、' | '，')
}

/// Trim separators and any trailing connector words ("buy milk and" -> "buy milk").
fn clean_value(s: &str) -> String {
    let mut value = s.trim_matches(is_separator);
    loop {
        let Some(rest) = TRAILING_CONNECTORS
            .iter()
            .find_map(|word| strip_suffix_word(value, word))
        else {
            break;
        };
        value = rest.trim_matches(is_separator);
    }
    value.to_string()
}

/// Strip `word` (lowercase) from the start of `s` when it is a whole word.
fn strip_prefix_word<'a>(s: &'a str, word: &str) -> Option<&'a str> {
    let n = word.chars().count();
    let end = s.char_indices().nth(n).map_or(s.len(), |(i, _)| i);
    let (head, rest) = s.split_at(end);
    (head.to_lowercase() == word && rest.chars().next().is_none_or(is_separator)).then_some(rest)
}

/// Strip `word` (lowercase) from the end of `s` when it is a whole word.
fn strip_suffix_word<'a>(s: &'a str, word: &str) -> Option<&'a str> {
    let n = word.chars().count().checked_sub(1)?;
    let (start, _) = s.char_indices().rev().nth(n)?;
    let (rest, tail) = s.split_at(start);
    (tail.to_lowercase() == word && rest.chars().next_back().is_none_or(is_separator))
        .then_some(rest)
}

/// Remove every case-insensitive occurrence of `phrase` (lowercase).
fn remove_phrase(text: &str, phrase: &str) -> String {
    let n = phrase.chars().count();
    let mut out = String::with_capacity(text.len());
    let mut skip = 0;
    for (i, c) in text.char_indices() {
        if skip > 0 {
            skip -= 1;
            continue;
        }
        let end = text[i..].char_indices().nth(n).map_or(text.len(), |(j, _)| i + j);
        if text[i..end].to_lowercase() == phrase {
            out.push(' ');
            skip = n - 1;
        } else {
            out.push(c);
        }
    }
    out
}

/// Drop filler words from both ends and collapse whitespace.
fn strip_edge_fillers(s: &str) -> String {
    let mut value = s.trim_matches(is_separator);
    loop {
        let stripped = FILLER_WORDS.iter().find_map(|word| {
            strip_prefix_word(value, word).or_else(|| strip_suffix_word(value, word))
        });
        match stripped {
            Some(rest) => value = rest.trim_matches(is_separator),
            None => break,
        }
    }
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve a spoken priority against the form options: exact value or label
/// first, then substring containment in either direction, else the
/// lowercased text itself.
pub fn match_priority(raw: &str) -> String {
    let value = raw.trim().to_lowercase();
    let exact = Priority::ALL
        .into_iter()
        .find(|p| p.value() == value || p.label().to_lowercase() == value);
    let fuzzy = || {
        Priority::ALL.into_iter().find(|p| {
            let text = p.label().to_lowercase();
            value.contains(&text) || text.contains(&value)
        })
    };
    match exact.or_else(fuzzy) {
        Some(priority) => priority.value().to_string(),
        None => value,
    }
}

fn split_tags(raw: &str) -> Vec<String> {
    TAG_SPLIT_RE
        .split(raw)
        .map(|t| t.trim_matches(is_separator))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a dictated date. Explicit dates win over the relative words
/// "tomorrow" and "today".
pub fn parse_spoken_date(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
    let cleaned = ORDINAL_RE.replace_all(raw.trim(), "$day").replace(',', "");
    let cleaned = cleaned.trim();

    const FULL: [&str; 6] = ["%Y-%m-%d", "%m/%d/%Y", "%B %d %Y", "%d %B %Y", "%Y/%m/%d", "%d.%m.%Y"];
    if let Some(date) = FULL
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(cleaned, fmt).ok())
    {
        return Some(date);
    }

    const NO_YEAR: [&str; 2] = ["%B %d", "%d %B"];
    let with_year = format!("{} {}", cleaned, today.year());
    if let Some(date) = NO_YEAR
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&with_year, &format!("{fmt} %Y")).ok())
    {
        return Some(date);
    }

    let lowered = cleaned.to_lowercase();
    if lowered.contains("tomorrow") {
        return today.succ_opt();
    }
    if lowered.contains("today") {
        return Some(today);
    }
    None
}
