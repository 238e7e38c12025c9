//! DictationBridge - merges transcripts into the compose buffer.
//!
//! The bridge owns the baseline rule: every interim event rewrites the
//! buffer to `baseline + transcript so far`, where the baseline is the
//! snapshot taken when the run started. Replaying the same interim event is
//! therefore a no-op — but the recognizer holds effective ownership of the
//! field while listening, and keystrokes typed mid-run are overwritten by
//! the next event. DESIGN.md records why that trade-off stands.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use rallypoint_core::ComposeBuffer;

use crate::dictation::{DictationEvent, DictationProvider};
use crate::error::{Error, Result};

/// Bridges one provider into one compose field.
pub struct DictationBridge {
    provider: Arc<dyn DictationProvider>,
    compose: ComposeBuffer,
    listening: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DictationBridge {
    /// Wire a provider to a compose buffer.
    #[must_use]
    pub fn new(provider: Arc<dyn DictationProvider>, compose: ComposeBuffer) -> Self {
        Self {
            provider,
            compose,
            listening: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    /// Whether a run is active. At most one per field.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    /// Start a recognition run, snapshotting the current buffer as the
    /// baseline.
    pub async fn start(&self) -> Result<()> {
        if self.is_listening() {
            return Err(Error::Busy("dictation already listening".to_string()));
        }

        let mut events = self.provider.start().await?;
        let baseline = self.compose.snapshot();
        self.listening.store(true, Ordering::SeqCst);
        debug!(engine = self.provider.name(), "dictation run started");

        let compose = self.compose.clone();
        let listening = Arc::clone(&self.listening);
        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    DictationEvent::Started => {}
                    DictationEvent::Interim { transcript } => {
                        // Always rewrite from the frozen baseline, never from
                        // the field's live value.
                        compose.replace(format!("{baseline}{transcript}"));
                    }
                    DictationEvent::Ended => {
                        debug!("dictation run ended");
                        break;
                    }
                    DictationEvent::Error { detail } => {
                        warn!("dictation error: {detail}");
                        break;
                    }
                }
            }
            // No retroactive reconciliation of edits lost during the run.
            listening.store(false, Ordering::SeqCst);
        });

        let mut guard = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(stale) = guard.replace(task) {
            stale.abort();
        }
        Ok(())
    }

    /// Ask the provider to stop the active run.
    pub fn stop(&self) {
        self.provider.stop();
    }

    /// Toggle: stop when listening, start otherwise.
    pub async fn toggle(&self) -> Result<()> {
        if self.is_listening() {
            self.stop();
            Ok(())
        } else {
            self.start().await
        }
    }

    /// Teardown for the owning view: stop the provider, detach the event
    /// task, clear the flag. Safe to call more than once.
    pub fn shutdown(&self) {
        self.provider.stop();
        let mut guard = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(task) = guard.take() {
            task.abort();
        }
        self.listening.store(false, Ordering::SeqCst);
    }
}

impl Drop for DictationBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::{sleep, timeout};

    /// Provider whose events the test feeds by hand.
    struct ScriptedProvider {
        sender: Mutex<Option<mpsc::Sender<DictationEvent>>>,
    }

    impl ScriptedProvider {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sender: Mutex::new(None),
            })
        }

        async fn emit(&self, event: DictationEvent) {
            let tx = self
                .sender
                .lock()
                .unwrap()
                .clone()
                .expect("run not started");
            tx.send(event).await.unwrap();
        }
    }

    #[async_trait]
    impl DictationProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn start(&self) -> Result<mpsc::Receiver<DictationEvent>> {
            let (tx, rx) = mpsc::channel(16);
            *self.sender.lock().unwrap() = Some(tx);
            Ok(rx)
        }

        fn stop(&self) {
            // Dropping the sender ends the run.
            self.sender.lock().unwrap().take();
        }
    }

    async fn wait_for_text(compose: &ComposeBuffer, expected: &str) {
        timeout(Duration::from_secs(1), async {
            while compose.snapshot() != expected {
                sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "compose never reached {expected:?}, last value {:?}",
                compose.snapshot()
            )
        });
    }

    async fn wait_until_stopped(bridge: &DictationBridge) {
        timeout(Duration::from_secs(1), async {
            while bridge.is_listening() {
                sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_interim_events_are_idempotent_on_baseline() {
        let provider = ScriptedProvider::new();
        let compose = ComposeBuffer::with_text("Status: ");
        let bridge = DictationBridge::new(provider.clone(), compose.clone());

        bridge.start().await.unwrap();
        provider
            .emit(DictationEvent::Interim {
                transcript: "all clear".to_string(),
            })
            .await;
        wait_for_text(&compose, "Status: all clear").await;

        // The identical event replayed leaves the field unchanged.
        provider
            .emit(DictationEvent::Interim {
                transcript: "all clear".to_string(),
            })
            .await;
        sleep(Duration::from_millis(20)).await;
        assert_eq!(compose.snapshot(), "Status: all clear");
    }

    #[tokio::test]
    async fn test_manual_edits_during_run_are_overwritten() {
        let provider = ScriptedProvider::new();
        let compose = ComposeBuffer::with_text("abc");
        let bridge = DictationBridge::new(provider.clone(), compose.clone());

        bridge.start().await.unwrap();
        provider
            .emit(DictationEvent::Interim {
                transcript: "go".to_string(),
            })
            .await;
        wait_for_text(&compose, "abcgo").await;

        // A keystroke lands between interim events...
        compose.push_str("def");
        assert_eq!(compose.snapshot(), "abcgodef");

        // ...and the next event rewrites from the frozen baseline: the
        // manual "def" is lost.
        provider
            .emit(DictationEvent::Interim {
                transcript: "go now".to_string(),
            })
            .await;
        wait_for_text(&compose, "abcgo now").await;
    }

    #[tokio::test]
    async fn test_ended_clears_listening_flag() {
        let provider = ScriptedProvider::new();
        let bridge = DictationBridge::new(provider.clone(), ComposeBuffer::new());

        bridge.start().await.unwrap();
        assert!(bridge.is_listening());

        provider.emit(DictationEvent::Ended).await;
        wait_until_stopped(&bridge).await;
    }

    #[tokio::test]
    async fn test_error_clears_listening_flag_without_touching_text() {
        let provider = ScriptedProvider::new();
        let compose = ComposeBuffer::with_text("draft");
        let bridge = DictationBridge::new(provider.clone(), compose.clone());

        bridge.start().await.unwrap();
        provider
            .emit(DictationEvent::Error {
                detail: "microphone permission denied".to_string(),
            })
            .await;
        wait_until_stopped(&bridge).await;
        assert_eq!(compose.snapshot(), "draft");
    }

    #[tokio::test]
    async fn test_second_start_while_listening_is_rejected() {
        let provider = ScriptedProvider::new();
        let bridge = DictationBridge::new(provider.clone(), ComposeBuffer::new());

        bridge.start().await.unwrap();
        let err = bridge.start().await.unwrap_err();
        assert!(matches!(err, Error::Busy(_)));
    }

    #[tokio::test]
    async fn test_stop_ends_run_via_provider() {
        let provider = ScriptedProvider::new();
        let bridge = DictationBridge::new(provider.clone(), ComposeBuffer::new());

        bridge.start().await.unwrap();
        bridge.stop();
        // ScriptedProvider closes the channel on stop; the flag resets.
        wait_until_stopped(&bridge).await;

        // A fresh run may start afterwards.
        bridge.start().await.unwrap();
        assert!(bridge.is_listening());
    }
}
