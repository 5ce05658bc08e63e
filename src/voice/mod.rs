pub mod grammar;
pub mod keywords;
pub mod session;

pub use grammar::{parse_voice_command, FieldValue, ParsedUtterance, VoiceField, VoiceFieldCommand};
pub use session::{SpeechEvent, VoiceAction, VoiceSession};
