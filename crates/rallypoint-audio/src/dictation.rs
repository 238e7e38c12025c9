//! Dictation providers.
//!
//! A single `DictationProvider` implementation serves every compose field.
//! The factory is capability-detecting: callers get `None` when no engine is
//! available and surface "dictation unavailable" instead of crashing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::capture::{capture_utterance, samples_to_wav, CaptureLimits};
use crate::config::DictationConfig;
use crate::error::{Error, Result};
use crate::transcribe::UtteranceTranscriber;

/// Events emitted during one recognition run.
#[derive(Debug, Clone)]
pub enum DictationEvent {
    /// Recognition started; the bridge snapshots its baseline on this
    Started,
    /// Cumulative transcript of the run so far (all segments concatenated)
    Interim {
        /// Full transcript since the run began
        transcript: String,
    },
    /// Run finished (stop or natural end of utterance)
    Ended,
    /// Recognition failed; the listening flag must reset, no retry
    Error {
        /// Human-readable description
        detail: String,
    },
}

/// A speech recognition engine.
#[async_trait]
pub trait DictationProvider: Send + Sync {
    /// Engine name for logs.
    fn name(&self) -> &'static str;

    /// Begin a recognition run. Events flow on the returned channel until
    /// `Ended` or `Error`; only one run may be active at a time.
    async fn start(&self) -> Result<mpsc::Receiver<DictationEvent>>;

    /// Request the active run to stop, if any.
    fn stop(&self);
}

/// Capability-detecting factory.
///
/// Returns `None` when dictation is switched off or no engine is available;
/// the caller must surface an "unsupported" message rather than crash.
#[must_use]
pub fn dictation_provider(config: &DictationConfig) -> Option<Arc<dyn DictationProvider>> {
    if config.engine == "off" {
        info!("dictation disabled by configuration");
        return None;
    }
    WhisperDictation::detect(config).map(|p| Arc::new(p) as Arc<dyn DictationProvider>)
}

/// Whisper-API-backed dictation: microphone capture segmented by an energy
/// gate, each utterance transcribed and appended to the run transcript.
pub struct WhisperDictation {
    config: DictationConfig,
    transcriber: Arc<UtteranceTranscriber>,
    active: Arc<Mutex<Option<CancellationToken>>>,
}

impl WhisperDictation {
    /// Probe for the engine; `None` when no transcription backend exists.
    #[must_use]
    pub fn detect(config: &DictationConfig) -> Option<Self> {
        let transcriber = UtteranceTranscriber::new(config.whisper_language());
        if !transcriber.enabled() {
            warn!("dictation unavailable: no transcription backend (set OPENAI_API_KEY)");
            return None;
        }
        info!(language = %config.language, "dictation engine ready");
        Some(Self {
            config: config.clone(),
            transcriber: Arc::new(transcriber),
            active: Arc::new(Mutex::new(None)),
        })
    }
}

#[async_trait]
impl DictationProvider for WhisperDictation {
    fn name(&self) -> &'static str {
        "whisper-api"
    }

    async fn start(&self) -> Result<mpsc::Receiver<DictationEvent>> {
        let cancel = {
            let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
            if active.is_some() {
                return Err(Error::Busy("a recognition run is already active".to_string()));
            }
            let cancel = CancellationToken::new();
            *active = Some(cancel.clone());
            cancel
        };

        let (tx, rx) = mpsc::channel(16);
        let config = self.config.clone();
        let transcriber = Arc::clone(&self.transcriber);
        let active = Arc::clone(&self.active);

        tokio::spawn(async move {
            run_recognition(config, transcriber, cancel, tx).await;
            let mut guard = active.lock().unwrap_or_else(|e| e.into_inner());
            *guard = None;
        });

        Ok(rx)
    }

    fn stop(&self) {
        let guard = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cancel) = guard.as_ref() {
            cancel.cancel();
        }
    }
}

async fn run_recognition(
    config: DictationConfig,
    transcriber: Arc<UtteranceTranscriber>,
    cancel: CancellationToken,
    tx: mpsc::Sender<DictationEvent>,
) {
    let _ = tx.send(DictationEvent::Started).await;

    // The blocking capture thread watches this flag instead of the token.
    let stop_flag = Arc::new(AtomicBool::new(false));
    {
        let stop_flag = Arc::clone(&stop_flag);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            stop_flag.store(true, Ordering::SeqCst);
        });
    }

    let mut transcript = String::new();
    loop {
        if cancel.is_cancelled() {
            break;
        }

        let sample_rate = config.sample_rate;
        let limits = CaptureLimits::from(&config);
        let flag = Arc::clone(&stop_flag);
        let captured =
            tokio::task::spawn_blocking(move || capture_utterance(sample_rate, &limits, &flag))
                .await;

        let samples = match captured {
            Ok(Ok(samples)) => samples,
            Ok(Err(e)) => {
                let _ = tx
                    .send(DictationEvent::Error {
                        detail: e.to_string(),
                    })
                    .await;
                return;
            }
            Err(e) => {
                let _ = tx
                    .send(DictationEvent::Error {
                        detail: format!("capture task failed: {e}"),
                    })
                    .await;
                return;
            }
        };

        if samples.is_empty() {
            debug!("no speech captured");
            break;
        }

        let wav = match samples_to_wav(&samples, sample_rate) {
            Ok(wav) => wav,
            Err(e) => {
                let _ = tx
                    .send(DictationEvent::Error {
                        detail: e.to_string(),
                    })
                    .await;
                return;
            }
        };

        match transcriber.transcribe_wav(&wav).await {
            Ok(text) if !text.is_empty() => {
                if !transcript.is_empty() {
                    transcript.push(' ');
                }
                transcript.push_str(&text);
                if config.interim_results {
                    let _ = tx
                        .send(DictationEvent::Interim {
                            transcript: transcript.clone(),
                        })
                        .await;
                }
            }
            Ok(_) => {}
            Err(e) => {
                let _ = tx
                    .send(DictationEvent::Error {
                        detail: e.to_string(),
                    })
                    .await;
                return;
            }
        }

        if !config.continuous {
            break;
        }
    }

    // With interim results off, the transcript lands once at the end.
    if !config.interim_results && !transcript.is_empty() {
        let _ = tx.send(DictationEvent::Interim { transcript }).await;
    }
    let _ = tx.send(DictationEvent::Ended).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_respects_off_switch() {
        let config = DictationConfig::default().with_engine("off");
        assert!(dictation_provider(&config).is_none());
    }

    #[test]
    fn test_factory_detects_missing_backend() {
        let saved = std::env::var("OPENAI_API_KEY").ok();
        std::env::remove_var("OPENAI_API_KEY");

        let config = DictationConfig::default();
        assert!(dictation_provider(&config).is_none());

        if let Some(key) = saved {
            std::env::set_var("OPENAI_API_KEY", key);
        }
    }
}
