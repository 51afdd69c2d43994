//! Presence decision
//!
//! Turns the smoothed distance into playback start/stop events
//! ([`detector`]).

pub mod detector;
