//! Dictation and read-back configuration

use serde::{Deserialize, Serialize};

/// Dictation configuration.
///
/// Recognizer settings: a BCP-47 language tag, interim results on by
/// default, single-utterance (non-continuous) runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictationConfig {
    /// Recognition language (BCP-47, e.g. "en-US")
    #[serde(default = "default_language")]
    pub language: String,

    /// Engine: "auto" | "whisper-api" | "off"
    #[serde(default = "default_engine")]
    pub engine: String,

    /// Emit partial transcripts while an utterance is in progress
    #[serde(default = "default_interim")]
    pub interim_results: bool,

    /// Keep listening after an utterance ends
    #[serde(default)]
    pub continuous: bool,

    /// Capture sample rate
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// RMS energy below which audio counts as silence
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Silence run (ms) that ends an utterance
    #[serde(default = "default_silence_duration")]
    pub silence_duration_ms: u64,

    /// Hard cap on one utterance (seconds)
    #[serde(default = "default_max_utterance")]
    pub max_utterance_secs: u64,
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_engine() -> String {
    "auto".to_string()
}

fn default_interim() -> bool {
    true
}

fn default_sample_rate() -> u32 {
    16_000
}

fn default_threshold() -> f32 {
    0.01
}

fn default_silence_duration() -> u64 {
    1_200
}

fn default_max_utterance() -> u64 {
    30
}

impl Default for DictationConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            engine: default_engine(),
            interim_results: default_interim(),
            continuous: false,
            sample_rate: default_sample_rate(),
            threshold: default_threshold(),
            silence_duration_ms: default_silence_duration(),
            max_utterance_secs: default_max_utterance(),
        }
    }
}

impl DictationConfig {
    /// Set the recognition language.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the engine.
    #[must_use]
    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    /// Keep listening across utterances.
    #[must_use]
    pub fn with_continuous(mut self, continuous: bool) -> Self {
        self.continuous = continuous;
        self
    }

    /// ISO-639-1 language code for the transcription backend
    /// ("en-US" → "en").
    #[must_use]
    pub fn whisper_language(&self) -> &str {
        self.language.split('-').next().unwrap_or("en")
    }
}

/// Read-back (spoken incoming messages) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadbackConfig {
    /// Speak incoming messages from other senders
    #[serde(default)]
    pub enabled: bool,

    /// Language used to pick a default voice
    #[serde(default = "default_language")]
    pub language: String,

    /// Explicit voice name; overrides the language default
    #[serde(default)]
    pub voice: Option<String>,
}

impl Default for ReadbackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            language: default_language(),
            voice: None,
        }
    }
}

impl ReadbackConfig {
    /// Enable read-back.
    #[must_use]
    pub fn enabled(mut self) -> Self {
        self.enabled = true;
        self
    }

    /// The voice to synthesize with.
    #[must_use]
    pub fn resolve_voice(&self) -> &str {
        if let Some(ref voice) = self.voice {
            return voice;
        }
        match self.language.to_lowercase().as_str() {
            "en" | "en-us" | "english" => "en-US-JennyNeural",
            "en-gb" => "en-GB-SoniaNeural",
            "es" | "es-es" | "spanish" => "es-ES-ElviraNeural",
            "fr" | "fr-fr" | "french" => "fr-FR-DeniseNeural",
            "de" | "de-de" | "german" => "de-DE-KatjaNeural",
            "pt" | "pt-br" | "portuguese" => "pt-BR-FranciscaNeural",
            _ => "en-US-JennyNeural",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DictationConfig::default();
        assert_eq!(config.language, "en-US");
        assert!(config.interim_results);
        assert!(!config.continuous);
        assert_eq!(config.sample_rate, 16_000);
    }

    #[test]
    fn test_whisper_language_strips_region() {
        assert_eq!(DictationConfig::default().whisper_language(), "en");
        let config = DictationConfig::default().with_language("pt-BR");
        assert_eq!(config.whisper_language(), "pt");
    }

    #[test]
    fn test_voice_selection() {
        let config = ReadbackConfig::default();
        assert!(config.resolve_voice().starts_with("en-US"));

        let mut config = ReadbackConfig::default();
        config.voice = Some("en-GB-RyanNeural".to_string());
        assert_eq!(config.resolve_voice(), "en-GB-RyanNeural");
    }
}
