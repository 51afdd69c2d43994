//! Sliding-window smoothing of raw distances
//!
//! The window holds the most recent raw readings (30 by default). While it
//! is still filling, the smoothed value is a plain mean; once it holds
//! enough samples a zero-phase Butterworth low-pass runs over the whole
//! window and the newest output sample is used.
//!
//! A numerical failure never escapes as an error: [`Filtered::Fallback`]
//! carries the window mean together with the reason, and the caller decides
//! how loudly to report it.

use super::butterworth::{FilterError, LowPass};
use ringbuf::traits::{Consumer, Observer, RingBuffer};
use ringbuf::HeapRb;

/// Default window capacity
pub const WINDOW_CAPACITY: usize = 30;

/// Samples required before the low-pass is used
pub const MIN_FILTER_SAMPLES: usize = 15;

/// Default low-pass cutoff
pub const CUTOFF_HZ: f64 = 1.0;

/// Assumed sampling rate of the poll loop
pub const SAMPLE_RATE_HZ: f64 = 10.0;

/// Tunables of [`SignalFilter`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    pub capacity: usize,
    pub min_samples: usize,
    pub cutoff_hz: f64,
    pub sample_rate_hz: f64,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            capacity: WINDOW_CAPACITY,
            min_samples: MIN_FILTER_SAMPLES,
            cutoff_hz: CUTOFF_HZ,
            sample_rate_hz: SAMPLE_RATE_HZ,
        }
    }
}

/// Smoothed distance and how it was obtained
#[derive(Debug, Clone, PartialEq)]
pub enum Filtered {
    /// Window still filling, arithmetic mean of what is held
    Mean(f64),
    /// Newest sample of the zero-phase low-pass output
    Smoothed(f64),
    /// Low-pass failed, arithmetic mean of the window
    Fallback { value: f64, reason: FilterError },
}

impl Filtered {
    pub fn value(&self) -> f64 {
        match self {
            Filtered::Mean(v) | Filtered::Smoothed(v) => *v,
            Filtered::Fallback { value, .. } => *value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Filtered::Fallback { .. })
    }
}

/// Fixed-capacity window of raw distances with a low-pass readout
pub struct SignalFilter {
    window: HeapRb<f64>,
    params: FilterParams,
    design: Result<LowPass, FilterError>,
}

impl SignalFilter {
    /// Create a filter with the default 30-sample window and 1 Hz cutoff
    pub fn new() -> Self {
        Self::with_params(FilterParams::default())
    }

    /// Create a filter with custom parameters
    ///
    /// A design failure is kept and reported through
    /// [`Filtered::Fallback`] on every readout rather than here. A zero
    /// capacity is raised to one sample.
    pub fn with_params(mut params: FilterParams) -> Self {
        if params.capacity == 0 {
            tracing::warn!("Filter window capacity of 0 requested, using 1");
            params.capacity = 1;
        }

        let design = LowPass::design(params.cutoff_hz, params.sample_rate_hz);
        if let Err(ref e) = design {
            tracing::warn!(error = %e, "Low-pass design failed, readouts will use the window mean");
        }

        Self {
            window: HeapRb::new(params.capacity),
            params,
            design,
        }
    }

    pub fn params(&self) -> &FilterParams {
        &self.params
    }

    /// Append a raw distance, evicting the oldest once full
    pub fn push(&mut self, raw_cm: f64) {
        self.window.push_overwrite(raw_cm);
    }

    /// Number of samples currently held
    pub fn len(&self) -> usize {
        self.window.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Window contents, oldest first
    pub fn samples(&self) -> Vec<f64> {
        self.window.iter().copied().collect()
    }

    /// Drop all held samples
    pub fn clear(&mut self) {
        self.window.clear();
    }

    /// Smoothed value of the current window, `None` before the first push
    pub fn filtered(&self) -> Option<Filtered> {
        let samples = self.samples();
        if samples.is_empty() {
            return None;
        }

        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        if samples.len() < self.params.min_samples {
            return Some(Filtered::Mean(mean));
        }

        let result = self
            .design
            .clone()
            .and_then(|lowpass| lowpass.filtfilt(&samples));

        Some(match result {
            Ok(output) => output
                .last()
                .copied()
                .map_or(Filtered::Mean(mean), Filtered::Smoothed),
            Err(reason) => Filtered::Fallback {
                value: mean,
                reason,
            },
        })
    }
}

impl Default for SignalFilter {
    fn default() -> Self {
        Self::new()
    }
}
