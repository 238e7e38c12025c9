//! Spoken read-back of incoming messages.
//!
//! Opt-in: when enabled, messages from *other* senders are spoken as
//! "<sender> says <text>". A new announcement cancels whatever is still
//! playing so the speaker never queues up a backlog.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use rodio::{Decoder, OutputStream, Sink};
use tracing::{debug, error, info, warn};

use rallypoint_core::ChatMessage;

use crate::config::ReadbackConfig;
use crate::error::{Error, Result};

/// Edge TTS endpoint (free Microsoft service, no API key)
const EDGE_TTS_ENDPOINT: &str =
    "https://speech.platform.bing.com/consumer/speech/synthesize/readaloud/voice/v1";

/// Edge TTS trusted client token (public)
const TRUSTED_CLIENT_TOKEN: &str = "6A5AA1D4EAFF4E9FB37E23D68491D6F4";

/// Synthesizes announcement audio.
pub struct SpeechSynthesizer {
    client: reqwest::Client,
    voice: String,
}

impl SpeechSynthesizer {
    /// Create a synthesizer with the configured voice.
    pub fn new(config: &ReadbackConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Tts(format!("failed to create HTTP client: {e}")))?;
        let voice = config.resolve_voice().to_string();
        info!(voice = %voice, "speech synthesizer ready");
        Ok(Self { client, voice })
    }

    /// The active voice name.
    #[must_use]
    pub fn voice(&self) -> &str {
        &self.voice
    }

    /// Synthesize text to MP3 bytes.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let ssml = format!(
            r#"<speak version="1.0" xmlns="http://www.w3.org/2001/10/synthesis" xml:lang="en-US">
                <voice name="{}">{}</voice>
            </speak>"#,
            self.voice,
            escape_xml(text)
        );

        let url = format!("{EDGE_TTS_ENDPOINT}?trustedclienttoken={TRUSTED_CLIENT_TOKEN}");
        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", "audio-24khz-48kbitrate-mono-mp3")
            .body(ssml)
            .send()
            .await
            .map_err(|e| Error::Tts(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Tts(format!("TTS API error: {}", response.status())));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::Tts(format!("failed to read response: {e}")))?;
        debug!("synthesized {} bytes", audio.len());
        Ok(audio.to_vec())
    }
}

/// Escape XML special characters for SSML.
fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

enum PlaybackCmd {
    Play(Vec<u8>),
    Stop,
}

/// Speaker playback on a dedicated thread.
///
/// The audio device handle is thread-confined; the rest of the crate talks
/// to it through a command channel. Playing always stops the current
/// utterance first.
pub struct Playback {
    commands: mpsc::Sender<PlaybackCmd>,
}

impl Playback {
    /// Start the playback thread.
    pub fn spawn() -> Result<Self> {
        let (tx, rx) = mpsc::channel::<PlaybackCmd>();

        std::thread::Builder::new()
            .name("readback-audio".to_string())
            .spawn(move || playback_thread(rx))
            .map_err(|e| Error::AudioDevice(format!("failed to spawn playback thread: {e}")))?;

        Ok(Self { commands: tx })
    }

    /// Queue audio, cancelling the current utterance.
    pub fn play(&self, audio: Vec<u8>) {
        let _ = self.commands.send(PlaybackCmd::Play(audio));
    }

    /// Stop the current utterance.
    pub fn stop(&self) {
        let _ = self.commands.send(PlaybackCmd::Stop);
    }
}

fn playback_thread(rx: mpsc::Receiver<PlaybackCmd>) {
    let Ok((_stream, handle)) = OutputStream::try_default() else {
        error!("no audio output device; read-back muted");
        return;
    };

    let mut current: Option<Sink> = None;
    while let Ok(command) = rx.recv() {
        match command {
            PlaybackCmd::Play(audio) => {
                if let Some(sink) = current.take() {
                    sink.stop();
                }
                let source = match Decoder::new(std::io::Cursor::new(audio)) {
                    Ok(source) => source,
                    Err(e) => {
                        warn!("failed to decode announcement audio: {e}");
                        continue;
                    }
                };
                match Sink::try_new(&handle) {
                    Ok(sink) => {
                        sink.append(source);
                        current = Some(sink);
                    }
                    Err(e) => warn!("failed to open playback sink: {e}"),
                }
            }
            PlaybackCmd::Stop => {
                if let Some(sink) = current.take() {
                    sink.stop();
                }
            }
        }
    }
}

/// Speaks incoming messages from other senders.
pub struct MessageReadback {
    user_id: String,
    enabled: AtomicBool,
    synth: SpeechSynthesizer,
    playback: Playback,
}

impl MessageReadback {
    /// Build read-back for one user.
    pub fn new(config: &ReadbackConfig, user_id: impl Into<String>) -> Result<Self> {
        Ok(Self {
            user_id: user_id.into(),
            enabled: AtomicBool::new(config.enabled),
            synth: SpeechSynthesizer::new(config)?,
            playback: Playback::spawn()?,
        })
    }

    /// Whether read-back is on.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Turn read-back on or off. Turning it off silences playback.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.playback.stop();
        }
    }

    /// Whether a message would be spoken: read-back must be on, and we never
    /// read our own messages back.
    #[must_use]
    pub fn should_announce(&self, message: &ChatMessage) -> bool {
        self.is_enabled() && message.sender != self.user_id
    }

    /// Speak a message. Failures are logged, never surfaced — read-back must
    /// not break the chat view.
    pub async fn announce(&self, message: &ChatMessage) {
        if !self.should_announce(message) {
            return;
        }
        let line = format!("{} says {}", message.sender, message.text);
        match self.synth.synthesize(&line).await {
            Ok(audio) if !audio.is_empty() => self.playback.play(audio),
            Ok(_) => {}
            Err(e) => warn!("read-back failed: {e}"),
        }
    }
}
