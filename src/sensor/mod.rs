//! Ultrasonic sensor module
//!
//! This module contains everything between the pins and a distance:
//! - Time source abstraction ([`clock`])
//! - Digital pin capability and the sysfs backend ([`gpio`])
//! - Trigger/echo pulse timing ([`pulse`])
//! - Pulse to distance conversion ([`distance`])
//! - Simulated sensor for tests and dry runs ([`sim`])

pub mod clock;
pub mod distance;
pub mod gpio;
pub mod pulse;
pub mod sim;
