//! Progress tracking and throttling.
//!
//! This module handles rate-limiting for download progress events.

mod throttle;

pub use throttle::ProgressThrottle;
