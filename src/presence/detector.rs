//! Debounced presence state machine
//!
//! A subject counts as present once the smoothed distance has stayed below
//! the threshold for longer than the sustain time. Entering `Present` fires
//! a single `Play`; leaving it fires a single `Stop`. The `rearmed` flag
//! blocks further `Play` events until the subject has gone away and the
//! detector has returned to `Idle`.
//!
//! Timing uses the time passed to [`PresenceDetector::update`], never a
//! tick count, so an overrunning loop does not stretch or shrink the
//! sustain window.

use std::time::Duration;

/// Distance below which someone is considered close
pub const DEFAULT_THRESHOLD_CM: f64 = 100.0;

/// How long the distance must stay below threshold before playback starts
pub const DEFAULT_SUSTAIN: Duration = Duration::from_millis(500);

/// Detector state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionState {
    /// Nobody within threshold
    Idle,
    /// Below threshold, waiting for the sustain time to pass
    Pending,
    /// Presence confirmed
    Present,
}

/// Action requested from the playback collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    Play,
    Stop,
    None,
}

/// Hysteresis/debounce/rearm state machine
#[derive(Debug, Clone)]
pub struct PresenceDetector {
    /// Distance threshold in cm
    threshold_cm: f64,
    /// Minimum continuous below-threshold time
    sustain: Duration,
    /// Current state
    state: DetectionState,
    /// When the current below-threshold streak started
    detection_start: Option<Duration>,
    /// Set once `Play` fired for the current episode
    rearmed: bool,
}

impl PresenceDetector {
    /// Create a detector with the default 100cm / 0.5s parameters
    pub fn new() -> Self {
        Self::with_params(DEFAULT_THRESHOLD_CM, DEFAULT_SUSTAIN)
    }

    pub fn with_params(threshold_cm: f64, sustain: Duration) -> Self {
        Self {
            threshold_cm,
            sustain,
            state: DetectionState::Idle,
            detection_start: None,
            rearmed: false,
        }
    }

    /// Run one transition for a smoothed distance observed at `now`
    ///
    /// # Example
    /// ```
    /// use presence_player::presence::detector::{PlaybackEvent, PresenceDetector};
    /// use std::time::Duration;
    ///
    /// let mut detector = PresenceDetector::new();
    /// assert_eq!(detector.update(50.0, Duration::ZERO), PlaybackEvent::None);
    /// assert_eq!(detector.update(50.0, Duration::from_millis(600)), PlaybackEvent::Play);
    /// assert_eq!(detector.update(50.0, Duration::from_millis(700)), PlaybackEvent::None);
    /// assert_eq!(detector.update(150.0, Duration::from_millis(800)), PlaybackEvent::Stop);
    /// ```
    pub fn update(&mut self, filtered_cm: f64, now: Duration) -> PlaybackEvent {
        let close = filtered_cm < self.threshold_cm;

        match (self.state, close) {
            (DetectionState::Idle, true) => {
                self.state = DetectionState::Pending;
                self.detection_start = Some(now);
                PlaybackEvent::None
            }
            (DetectionState::Idle, false) => {
                self.rearmed = false;
                PlaybackEvent::None
            }
            (DetectionState::Pending, false) => {
                self.state = DetectionState::Idle;
                self.detection_start = None;
                PlaybackEvent::None
            }
            (DetectionState::Pending, true) => {
                let start = self.detection_start.unwrap_or(now);
                if now.saturating_sub(start) > self.sustain {
                    self.state = DetectionState::Present;
                    let event = if self.rearmed {
                        PlaybackEvent::None
                    } else {
                        PlaybackEvent::Play
                    };
                    self.rearmed = true;
                    event
                } else {
                    PlaybackEvent::None
                }
            }
            (DetectionState::Present, false) => {
                self.state = DetectionState::Idle;
                self.detection_start = None;
                self.rearmed = false;
                PlaybackEvent::Stop
            }
            (DetectionState::Present, true) => PlaybackEvent::None,
        }
    }

    pub fn state(&self) -> DetectionState {
        self.state
    }

    pub fn is_rearmed(&self) -> bool {
        self.rearmed
    }

    /// Start of the current below-threshold streak
    pub fn detection_start(&self) -> Option<Duration> {
        self.detection_start
    }

    /// Whether a below-threshold streak is active (pending or confirmed)
    pub fn person_present(&self) -> bool {
        self.state != DetectionState::Idle
    }

    pub fn threshold_cm(&self) -> f64 {
        self.threshold_cm
    }

    pub fn sustain(&self) -> Duration {
        self.sustain
    }

    /// Return to `Idle` without emitting events
    pub fn reset(&mut self) {
        self.state = DetectionState::Idle;
        self.detection_start = None;
        self.rearmed = false;
    }
}

impl Default for PresenceDetector {
    fn default() -> Self {
        Self::new()
    }
}
