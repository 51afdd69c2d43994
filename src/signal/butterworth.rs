//! Second-order Butterworth low-pass and zero-phase filtering
//!
//! The design follows the usual bilinear transform with frequency
//! pre-warping, so the coefficients match what common DSP packages produce
//! for `butter(2, fc / (fs / 2))`. [`LowPass::filtfilt`] runs the filter
//! forward and backward over a block with odd-extension padding and
//! steady-state initial conditions, giving a zero-phase result.

use thiserror::Error;

/// Errors from filter design or application
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Cutoff {cutoff_hz} Hz must lie strictly between 0 and Nyquist ({nyquist_hz} Hz)")]
    InvalidCutoff { cutoff_hz: f64, nyquist_hz: f64 },

    #[error("Filter coefficients are not finite")]
    NonFiniteCoefficients,

    #[error("Initial state system is singular (1 + a1 + a2 = {0})")]
    SingularInitialState(f64),

    #[error("Input of {len} samples is too short for padding of {padlen}")]
    InputTooShort { len: usize, padlen: usize },

    #[error("Filter produced a non-finite value")]
    NonFiniteOutput,
}

/// Denominators smaller than this are treated as singular
const SINGULAR_EPSILON: f64 = 1e-12;

/// Second-order Butterworth low-pass section
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LowPass {
    b: [f64; 3],
    a: [f64; 3],
}

impl LowPass {
    /// Design a low-pass for `cutoff_hz` at `sample_rate_hz`
    ///
    /// # Example
    /// ```
    /// use presence_player::signal::butterworth::LowPass;
    ///
    /// let lp = LowPass::design(1.0, 10.0).unwrap();
    /// assert!((lp.numerator()[0] - 0.0674553).abs() < 1e-6);
    /// ```
    pub fn design(cutoff_hz: f64, sample_rate_hz: f64) -> Result<Self, FilterError> {
        let nyquist_hz = sample_rate_hz / 2.0;
        if !(cutoff_hz > 0.0 && cutoff_hz < nyquist_hz) {
            return Err(FilterError::InvalidCutoff {
                cutoff_hz,
                nyquist_hz,
            });
        }

        let k = (std::f64::consts::PI * cutoff_hz / sample_rate_hz).tan();
        let k2 = k * k;
        let sqrt2_k = std::f64::consts::SQRT_2 * k;
        let norm = 1.0 / (1.0 + sqrt2_k + k2);

        let b0 = k2 * norm;
        let b = [b0, 2.0 * b0, b0];
        let a = [1.0, 2.0 * (k2 - 1.0) * norm, (1.0 - sqrt2_k + k2) * norm];

        if b.iter().chain(a.iter()).any(|c| !c.is_finite()) {
            return Err(FilterError::NonFiniteCoefficients);
        }

        Ok(Self { b, a })
    }

    pub fn numerator(&self) -> &[f64; 3] {
        &self.b
    }

    pub fn denominator(&self) -> &[f64; 3] {
        &self.a
    }

    /// Samples of odd extension added at each end by [`filtfilt`](Self::filtfilt)
    pub fn padlen(&self) -> usize {
        3 * self.a.len().max(self.b.len())
    }

    /// Filter state for a unit step at steady state
    fn steady_state(&self) -> Result<[f64; 2], FilterError> {
        let [b0, b1, b2] = self.b;
        let [_, a1, a2] = self.a;

        let denom = 1.0 + a1 + a2;
        if !denom.is_finite() || denom.abs() < SINGULAR_EPSILON {
            return Err(FilterError::SingularInitialState(denom));
        }

        let dc = (b0 + b1 + b2) / denom;
        Ok([dc - b0, b2 - a2 * dc])
    }

    /// Direct form II transposed over `input`, starting from state `zi`
    fn lfilter(&self, input: &[f64], zi: [f64; 2]) -> Vec<f64> {
        let [b0, b1, b2] = self.b;
        let [_, a1, a2] = self.a;
        let [mut z0, mut z1] = zi;

        input
            .iter()
            .map(|&x| {
                let y = b0 * x + z0;
                z0 = b1 * x - a1 * y + z1;
                z1 = b2 * x - a2 * y;
                y
            })
            .collect()
    }

    /// Forward-backward filter `input`, returning a result of the same length
    pub fn filtfilt(&self, input: &[f64]) -> Result<Vec<f64>, FilterError> {
        let padlen = self.padlen();
        let len = input.len();
        if len <= padlen {
            return Err(FilterError::InputTooShort { len, padlen });
        }

        let zi = self.steady_state()?;

        // Odd extension: reflect about the end points
        let first = input[0];
        let last = input[len - 1];
        let mut extended = Vec::with_capacity(len + 2 * padlen);
        extended.extend((1..=padlen).rev().map(|i| 2.0 * first - input[i]));
        extended.extend_from_slice(input);
        extended.extend((0..padlen).map(|j| 2.0 * last - input[len - 2 - j]));

        let x0 = extended[0];
        let mut forward = self.lfilter(&extended, [zi[0] * x0, zi[1] * x0]);

        forward.reverse();
        let y0 = forward[0];
        let mut backward = self.lfilter(&forward, [zi[0] * y0, zi[1] * y0]);
        backward.reverse();

        let output = backward[padlen..padlen + len].to_vec();
        if output.iter().any(|y| !y.is_finite()) {
            return Err(FilterError::NonFiniteOutput);
        }
        Ok(output)
    }
}
