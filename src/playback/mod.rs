//! Audio playback collaborator
//!
//! The control loop only ever calls [`Playback::play`] and
//! [`Playback::stop`]; which track plays and how it reaches the speaker is
//! decided here:
//! - Music directory scanning and random track choice ([`library`])
//! - cpal output stream for WAV tracks ([`output`], `audio` feature)
//! - No-op stand-in when no backend is available ([`DisabledPlayback`])

pub mod library;
#[cfg(feature = "audio")]
pub mod output;

use std::path::Path;
use thiserror::Error;

pub use library::TrackLibrary;

/// Errors that can occur while starting playback
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("No audio output device available")]
    NoOutputDevice,

    #[error("Failed to open output stream: {0}")]
    StreamError(String),

    #[error("No playable tracks in {0}")]
    NoTracks(String),

    #[error("Failed to decode {path}: {message}")]
    DecodeError { path: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Something that can start and stop a track
pub trait Playback {
    /// Start a track unless one is already playing
    fn play(&mut self);

    /// Stop whatever is playing
    fn stop(&mut self);

    /// Whether a track is currently playing
    fn is_busy(&self) -> bool;
}

impl<P: Playback + ?Sized> Playback for Box<P> {
    fn play(&mut self) {
        (**self).play()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn is_busy(&self) -> bool {
        (**self).is_busy()
    }
}

/// Playback that only logs what it would have done
#[derive(Debug, Default)]
pub struct DisabledPlayback;

impl DisabledPlayback {
    pub fn new() -> Self {
        Self
    }
}

impl Playback for DisabledPlayback {
    fn play(&mut self) {
        tracing::debug!("Would play music here (audio disabled)");
    }

    fn stop(&mut self) {
        tracing::debug!("Would stop music here (audio disabled)");
    }

    fn is_busy(&self) -> bool {
        false
    }
}

/// Open the best available playback backend
///
/// Never fails: if audio cannot be initialized a warning is logged once and
/// a [`DisabledPlayback`] is returned, so `play`/`stop` become no-ops.
pub fn open(music_dir: &Path, enabled: bool) -> Box<dyn Playback> {
    if !enabled {
        tracing::info!("Audio disabled, playback events will only be logged");
        return Box::new(DisabledPlayback::new());
    }

    #[cfg(feature = "audio")]
    {
        match output::OutputPlayer::open(TrackLibrary::new(music_dir)) {
            Ok(player) => return Box::new(player),
            Err(e) => {
                tracing::warn!(error = %e, "Audio initialization failed, running without audio");
            }
        }
    }

    #[cfg(not(feature = "audio"))]
    tracing::warn!(
        music_dir = %music_dir.display(),
        "Built without the `audio` feature, running without audio"
    );

    Box::new(DisabledPlayback::new())
}
