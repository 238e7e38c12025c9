//! Rallypoint Audio - Dictation and Read-Back
//!
//! Voice features of the coordination chat:
//! - Dictation: one speech-recognition engine behind a capability-detecting
//!   factory, and the bridge that merges transcripts into a compose buffer
//! - Read-back: opt-in spoken announcements of incoming messages
//!
//! Dictation needs `OPENAI_API_KEY` (Whisper API); without it the factory
//! returns `None` and callers surface "dictation unavailable". Read-back
//! uses Edge TTS and needs no key.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bridge;
pub mod capture;
pub mod config;
pub mod dictation;
pub mod error;
pub mod readback;
pub mod transcribe;

pub use bridge::DictationBridge;
pub use config::{DictationConfig, ReadbackConfig};
pub use dictation::{dictation_provider, DictationEvent, DictationProvider, WhisperDictation};
pub use error::{Error, Result};
pub use readback::{MessageReadback, SpeechSynthesizer};
pub use transcribe::UtteranceTranscriber;
