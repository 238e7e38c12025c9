//! Microphone capture (blocking) and WAV encoding.
//!
//! Capture runs on a blocking thread: the cpal stream lives and dies inside
//! [`capture_utterance`], which hands back one utterance's mono samples once
//! a silence run, the stop flag, or the duration cap ends it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use tracing::{debug, error, info};

use crate::config::DictationConfig;
use crate::error::{Error, Result};

/// Audio sample type
pub type Sample = f32;

/// Bounds on one captured utterance.
#[derive(Debug, Clone, Copy)]
pub struct CaptureLimits {
    /// RMS energy below which audio counts as silence
    pub threshold: f32,
    /// Silence run (ms) that ends the utterance
    pub silence_duration_ms: u64,
    /// Hard cap (seconds)
    pub max_utterance_secs: u64,
}

impl From<&DictationConfig> for CaptureLimits {
    fn from(config: &DictationConfig) -> Self {
        Self {
            threshold: config.threshold,
            silence_duration_ms: config.silence_duration_ms,
            max_utterance_secs: config.max_utterance_secs,
        }
    }
}

/// Root-mean-square energy of a sample block.
#[must_use]
pub fn rms(samples: &[Sample]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Energy-based voice gate.
#[derive(Debug, Clone, Copy)]
pub struct EnergyGate {
    threshold: f32,
}

impl EnergyGate {
    /// Gate at the given RMS threshold.
    #[must_use]
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Whether a block carries voice energy.
    #[must_use]
    pub fn is_voice(&self, samples: &[Sample]) -> bool {
        rms(samples) > self.threshold
    }
}

/// Record one utterance from the default input device.
///
/// Blocks the calling thread; run it under `spawn_blocking`. Returns the
/// captured mono samples, empty if the stop flag was raised before any voice
/// was heard. Silence is only honored as an end marker after voice started.
pub fn capture_utterance(
    sample_rate: u32,
    limits: &CaptureLimits,
    stop: &AtomicBool,
) -> Result<Vec<Sample>> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| Error::AudioDevice("no input device found".to_string()))?;

    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
    info!("capturing from input device: {device_name}");

    let supported = device
        .supported_input_configs()
        .map_err(|e| Error::AudioDevice(format!("failed to query configs: {e}")))?
        .find(|c| {
            c.min_sample_rate().0 <= sample_rate
                && c.max_sample_rate().0 >= sample_rate
                && c.sample_format() == SampleFormat::F32
        })
        .ok_or_else(|| Error::AudioDevice(format!("no config supports {sample_rate}Hz F32")))?
        .with_sample_rate(cpal::SampleRate(sample_rate));

    let config: StreamConfig = supported.into();
    let channels = config.channels as usize;
    debug!(
        "capture config: {} channels at {}Hz",
        config.channels, config.sample_rate.0
    );

    let (tx, rx) = mpsc::channel::<Vec<Sample>>();
    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // Downmix to mono so the VAD and encoder see one channel.
                let mono: Vec<f32> = if channels > 1 {
                    data.chunks(channels)
                        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                        .collect()
                } else {
                    data.to_vec()
                };
                let _ = tx.send(mono);
            },
            move |err| {
                error!("capture stream error: {err}");
            },
            None,
        )
        .map_err(|e| Error::AudioStream(format!("failed to build stream: {e}")))?;

    stream
        .play()
        .map_err(|e| Error::AudioStream(format!("failed to start stream: {e}")))?;

    let gate = EnergyGate::new(limits.threshold);
    let silence_samples_needed =
        (limits.silence_duration_ms * u64::from(sample_rate) / 1_000) as usize;
    let max_samples = (limits.max_utterance_secs * u64::from(sample_rate)) as usize;

    let mut buffer: Vec<Sample> = Vec::new();
    let mut heard_voice = false;
    let mut silence_run: usize = 0;

    loop {
        if stop.load(Ordering::SeqCst) {
            debug!("capture stopped by caller");
            break;
        }
        let block = match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(block) => block,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };

        if gate.is_voice(&block) {
            heard_voice = true;
            silence_run = 0;
        } else {
            silence_run += block.len();
        }

        if heard_voice {
            buffer.extend(block);
        }

        if heard_voice && silence_run >= silence_samples_needed {
            debug!("silence run ended utterance");
            break;
        }
        if buffer.len() >= max_samples {
            debug!("max utterance duration reached");
            break;
        }
    }

    drop(stream);

    // Trim the trailing silence we waited through.
    let trim = silence_run.min(buffer.len());
    buffer.truncate(buffer.len() - trim);

    Ok(buffer)
}

/// Encode mono samples as 16-bit PCM WAV bytes.
pub fn samples_to_wav(samples: &[Sample], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| Error::AudioStream(format!("failed to create WAV writer: {e}")))?;
        for &sample in samples {
            let amplitude = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
            writer
                .write_sample(amplitude)
                .map_err(|e| Error::AudioStream(format!("failed to write sample: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| Error::AudioStream(format!("failed to finalize WAV: {e}")))?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_of_silence_is_zero() {
        assert_eq!(rms(&[]), 0.0);
        assert_eq!(rms(&[0.0; 512]), 0.0);
    }

    #[test]
    fn test_energy_gate() {
        let gate = EnergyGate::new(0.01);
        assert!(!gate.is_voice(&[0.001; 512]));
        assert!(gate.is_voice(&[0.5; 512]));
    }

    #[test]
    fn test_samples_to_wav_header() {
        let samples = vec![0.0f32; 1_600]; // 0.1s at 16kHz
        let wav = samples_to_wav(&samples, 16_000).unwrap();
        assert!(wav.len() > 44);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
    }

    #[test]
    fn test_limits_from_config() {
        let config = DictationConfig::default();
        let limits = CaptureLimits::from(&config);
        assert_eq!(limits.silence_duration_ms, config.silence_duration_ms);
        assert_eq!(limits.max_utterance_secs, config.max_utterance_secs);
    }
}
