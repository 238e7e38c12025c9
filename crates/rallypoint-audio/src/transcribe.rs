//! Utterance transcription via the Whisper API.

use async_openai::{
    config::OpenAIConfig,
    types::audio::{AudioInput, AudioResponseFormat, CreateTranscriptionRequestArgs},
    Client,
};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Transcribes recorded utterances.
///
/// API-backed only: without `OPENAI_API_KEY` the transcriber is disabled and
/// the dictation factory reports the capability as unavailable.
pub struct UtteranceTranscriber {
    client: Option<Client<OpenAIConfig>>,
    language: String,
}

impl UtteranceTranscriber {
    /// Create a transcriber for an ISO-639-1 language code.
    #[must_use]
    pub fn new(language: &str) -> Self {
        let client = if std::env::var("OPENAI_API_KEY").is_ok() {
            Some(Client::new())
        } else {
            warn!("OPENAI_API_KEY not set - transcription disabled");
            None
        };
        Self {
            client,
            language: language.to_string(),
        }
    }

    /// Whether a backend is available.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.client.is_some()
    }

    /// The configured language code.
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Transcribe one WAV-encoded utterance.
    pub async fn transcribe_wav(&self, wav: &[u8]) -> Result<String> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| Error::NotAvailable("transcription requires OPENAI_API_KEY".to_string()))?;

        if wav.len() < 44 {
            return Err(Error::Stt("audio data too short".to_string()));
        }
        if &wav[0..4] != b"RIFF" || &wav[8..12] != b"WAVE" {
            return Err(Error::Stt("invalid WAV payload".to_string()));
        }

        debug!("transcribing {} bytes", wav.len());

        let request = CreateTranscriptionRequestArgs::default()
            .file(AudioInput::from_vec_u8(
                "utterance.wav".to_string(),
                wav.to_vec(),
            ))
            .model("whisper-1")
            .language(&self.language)
            .response_format(AudioResponseFormat::Text)
            .build()
            .map_err(|e| Error::Stt(format!("failed to build request: {e}")))?;

        let response = client
            .audio()
            .transcription()
            .create(request)
            .await
            .map_err(|e| Error::Stt(format!("transcription failed: {e}")))?;

        let text = response.text.trim().to_string();
        debug!("transcription result: {text}");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_without_api_key() {
        let saved = std::env::var("OPENAI_API_KEY").ok();
        std::env::remove_var("OPENAI_API_KEY");

        let transcriber = UtteranceTranscriber::new("en");
        assert!(!transcriber.enabled());

        if let Some(key) = saved {
            std::env::set_var("OPENAI_API_KEY", key);
        }
    }

    #[tokio::test]
    async fn test_transcribe_without_backend_is_not_available() {
        let saved = std::env::var("OPENAI_API_KEY").ok();
        std::env::remove_var("OPENAI_API_KEY");

        let transcriber = UtteranceTranscriber::new("en");
        let err = transcriber.transcribe_wav(&[0u8; 64]).await.unwrap_err();
        assert!(matches!(err, Error::NotAvailable(_)));

        if let Some(key) = saved {
            std::env::set_var("OPENAI_API_KEY", key);
        }
    }
}
