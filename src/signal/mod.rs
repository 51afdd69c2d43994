//! Distance signal processing
//!
//! - Butterworth design and zero-phase filtering ([`butterworth`])
//! - Windowed smoothing with a mean fallback ([`filter`])

pub mod butterworth;
pub mod filter;
