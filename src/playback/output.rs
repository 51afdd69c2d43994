//! cpal output player for WAV tracks
//!
//! Tracks are decoded up front with `hound`, converted to the output
//! device's channel count and sample rate, and then streamed from memory by
//! the cpal callback. The callback owns the decoded frames; the control
//! loop only shares the `busy` flag with it.

use super::library::{extension_is, TrackLibrary};
use super::{Playback, PlaybackError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A decoded track, interleaved f32 in [-1, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub samples: Vec<f32>,
    pub channels: usize,
    pub sample_rate: u32,
}

impl Track {
    /// Decode a PCM or float WAV file
    pub fn load(path: &Path) -> Result<Self, PlaybackError> {
        let decode_error = |e: hound::Error| PlaybackError::DecodeError {
            path: path.display().to_string(),
            message: e.to_string(),
        };

        let mut reader = hound::WavReader::open(path).map_err(decode_error)?;
        let spec = reader.spec();
        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(decode_error)?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<_, _>>()
                    .map_err(decode_error)?
            }
        };

        Ok(Self {
            samples,
            channels: usize::from(spec.channels.max(1)),
            sample_rate: spec.sample_rate,
        })
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    /// Convert to `channels` at `sample_rate` using linear interpolation
    ///
    /// Mono is copied to every output channel; surplus output channels are
    /// silent.
    pub fn render(&self, channels: usize, sample_rate: u32) -> Vec<f32> {
        let frames_in = self.frames();
        if frames_in == 0 || channels == 0 || sample_rate == 0 {
            return Vec::new();
        }

        let step = self.sample_rate as f64 / sample_rate as f64;
        let frames_out = (frames_in as f64 / step).floor() as usize;
        let mut out = Vec::with_capacity(frames_out * channels);

        for i in 0..frames_out {
            let pos = i as f64 * step;
            let i0 = (pos.floor() as usize).min(frames_in - 1);
            let i1 = (i0 + 1).min(frames_in - 1);
            let frac = (pos - i0 as f64) as f32;

            for ch in 0..channels {
                let source = if self.channels == 1 {
                    Some(0)
                } else if ch < self.channels {
                    Some(ch)
                } else {
                    None
                };
                let value = source
                    .map(|sc| {
                        let a = self.samples[i0 * self.channels + sc];
                        let b = self.samples[i1 * self.channels + sc];
                        a + (b - a) * frac
                    })
                    .unwrap_or(0.0);
                out.push(value);
            }
        }

        out
    }
}

/// Plays random WAV tracks from a [`TrackLibrary`] on the default output device
pub struct OutputPlayer {
    library: TrackLibrary,
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
    busy: Arc<AtomicBool>,
}

impl OutputPlayer {
    /// Open the default output device
    pub fn open(library: TrackLibrary) -> Result<Self, PlaybackError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(PlaybackError::NoOutputDevice)?;
        let config = device
            .default_output_config()
            .map_err(|e| PlaybackError::StreamError(e.to_string()))?
            .config();

        tracing::info!(
            device = %device.name().unwrap_or_else(|_| "Unknown".to_string()),
            channels = config.channels,
            sample_rate = config.sample_rate.0,
            music_dir = %library.dir().display(),
            "Audio output ready"
        );

        Ok(Self {
            library,
            device,
            config,
            stream: None,
            busy: Arc::new(AtomicBool::new(false)),
        })
    }

    fn start_random_track(&mut self) -> Result<(), PlaybackError> {
        let path = self
            .library
            .pick_where(|p| extension_is(p, &["wav"]))?
            .ok_or_else(|| PlaybackError::NoTracks(self.library.dir().display().to_string()))?;

        let track = Track::load(&path)?;
        let frames = track.render(
            usize::from(self.config.channels),
            self.config.sample_rate.0,
        );

        let busy = Arc::clone(&self.busy);
        let mut position = 0usize;
        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let n = (frames.len() - position).min(data.len());
                    data[..n].copy_from_slice(&frames[position..position + n]);
                    data[n..].fill(0.0);
                    position += n;
                    if position >= frames.len() {
                        busy.store(false, Ordering::Release);
                    }
                },
                move |err| {
                    tracing::error!("Output stream error: {}", err);
                },
                None,
            )
            .map_err(|e| PlaybackError::StreamError(e.to_string()))?;

        self.busy.store(true, Ordering::Release);
        stream
            .play()
            .map_err(|e| PlaybackError::StreamError(e.to_string()))?;
        self.stream = Some(stream);

        tracing::info!(
            track = %path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
            "Playing"
        );
        Ok(())
    }
}

impl Playback for OutputPlayer {
    fn play(&mut self) {
        if self.is_busy() {
            return;
        }
        if let Err(e) = self.start_random_track() {
            self.busy.store(false, Ordering::Release);
            tracing::warn!(error = %e, "Could not start playback");
        }
    }

    fn stop(&mut self) {
        self.busy.store(false, Ordering::Release);
        if self.stream.take().is_some() {
            tracing::info!("Music stopped");
        }
    }

    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for OutputPlayer {
    fn drop(&mut self) {
        self.stop();
        tracing::info!("Audio output released");
    }
}
