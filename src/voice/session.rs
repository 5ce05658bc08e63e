use chrono::NaiveDate;
use tokio::sync::mpsc;

use super::grammar::{parse_voice_command, VoiceField};
use crate::core::task::TaskDraft;

/// Events produced by the speech recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    Result { transcript: String, is_final: bool },
    Error(String),
    End,
}

/// What the form layer should do in response to a speech event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceAction {
    /// Show the partial transcript; nothing is written yet.
    Interim(String),
    /// These fields of the draft were written.
    Applied(Vec<VoiceField>),
    /// Fields were written and the form should be submitted now.
    Submit(Vec<VoiceField>),
    /// Transient notification text.
    Failed(String),
    Ended,
}

/// User-facing text for a recognizer error code.
pub fn speech_error_message(code: &str) -> String {
    match code {
        "no-speech" => "No speech was detected. Try again.".to_string(),
        "audio-capture" => "No microphone was found.".to_string(),
        "not-allowed" | "service-not-allowed" => "Microphone access was denied.".to_string(),
        "network" => "Speech recognition needs a network connection.".to_string(),
        "aborted" => "Voice input was cancelled.".to_string(),
        other => format!("Speech recognition error: {}", other),
    }
}

/// Owns the form draft for one dictation session.
#[derive(Debug, Clone, Default)]
pub struct VoiceSession {
    draft: TaskDraft,
}

impl VoiceSession {
    pub fn new(draft: TaskDraft) -> Self {
        Self { draft }
    }

    pub fn draft(&self) -> &TaskDraft {
        &self.draft
    }

    pub fn into_draft(self) -> TaskDraft {
        self.draft
    }

    /// Handle one recognizer event. Only final transcripts reach the grammar.
    pub fn handle(&mut self, event: SpeechEvent, today: NaiveDate) -> Option<VoiceAction> {
        match event {
            SpeechEvent::Result {
                transcript,
                is_final: false,
            } => Some(VoiceAction::Interim(transcript)),
            SpeechEvent::Result {
                transcript,
                is_final: true,
            } => {
                let parsed = parse_voice_command(&transcript);
                if parsed.is_empty() {
                    return None;
                }
                let fields = parsed.apply_to(&mut self.draft, today);
                log::info!("Voice input wrote {:?} (submit: {})", fields, parsed.submit());
                if parsed.submit() {
                    Some(VoiceAction::Submit(fields))
                } else {
                    Some(VoiceAction::Applied(fields))
                }
            }
            SpeechEvent::Error(code) => {
                log::warn!("Speech recognition error: {}", code);
                Some(VoiceAction::Failed(speech_error_message(&code)))
            }
            SpeechEvent::End => Some(VoiceAction::Ended),
        }
    }

    /// Consume events until `End` or until every sender is dropped, forwarding
    /// actions. Returns the final draft.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<SpeechEvent>,
        actions: mpsc::Sender<VoiceAction>,
        today: NaiveDate,
    ) -> TaskDraft {
        while let Some(event) = events.recv().await {
            let end = event == SpeechEvent::End;
            if let Some(action) = self.handle(event, today) {
                if actions.send(action).await.is_err() {
                    log::debug!("Voice action receiver dropped, stopping session");
                    break;
                }
            }
            if end {
                break;
            }
        }
        self.draft
    }
}
