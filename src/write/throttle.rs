//! Adaptive throttling for background writes.
//!
//! There is no rate-limiting primitive underneath, so the writer measures
//! itself: after the first chunk, and then once per smoothing window, the
//! time spent actually writing is turned into a per-chunk rest period.
//!
//! ```text
//! sleep = window_active * (1 - bandwidth_percent / 100) / window_chunks
//! ```
//!
//! A sink that slows down makes `window_active` grow with it, so the rest
//! period tracks the real cost of a chunk rather than a nominal rate.

use super::priority::IoPriorityProfile;
use std::time::Duration;

/// Per-task throttle state.
#[derive(Debug, Clone)]
pub struct Throttle {
    /// Fraction of active time to rest, `1 - percent / 100`.
    rest_factor: f64,
    window: u32,
    enabled: bool,
    measured_once: bool,
    window_chunks: u32,
    window_bytes: u64,
    window_active: Duration,
    sleep_per_chunk: Duration,
    last_rate: Option<f64>,
}

impl Throttle {
    /// Throttle for the given profile.
    pub fn new(profile: &IoPriorityProfile) -> Self {
        Self {
            rest_factor: (1.0 - profile.bandwidth_percent / 100.0).clamp(0.0, 1.0),
            window: profile.rate_smoothing_window.max(1),
            enabled: !profile.is_unthrottled(),
            measured_once: false,
            window_chunks: 0,
            window_bytes: 0,
            window_active: Duration::ZERO,
            sleep_per_chunk: Duration::ZERO,
            last_rate: None,
        }
    }

    /// Whether this throttle ever sleeps.
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record a written chunk and return how long to rest before the next.
    ///
    /// `active` is the time spent writing and flushing this chunk, excluding
    /// any earlier rest.
    pub fn record(&mut self, bytes: usize, active: Duration) -> Duration {
        if !self.enabled {
            return Duration::ZERO;
        }

        self.window_chunks += 1;
        self.window_bytes += bytes as u64;
        self.window_active += active;

        if !self.measured_once || self.window_chunks >= self.window {
            self.measured_once = true;
            self.recalculate();
        }

        self.sleep_per_chunk
    }

    /// Rest period currently applied after each chunk.
    pub const fn sleep_per_chunk(&self) -> Duration {
        self.sleep_per_chunk
    }

    /// Write rate over the last measured window, in bytes per second.
    pub const fn last_rate(&self) -> Option<f64> {
        self.last_rate
    }

    #[allow(clippy::cast_precision_loss)]
    fn recalculate(&mut self) {
        self.sleep_per_chunk = self.window_active.mul_f64(self.rest_factor) / self.window_chunks;

        let secs = self.window_active.as_secs_f64();
        if secs > 0.0 {
            self.last_rate = Some(self.window_bytes as f64 / secs);
        }

        log::trace!(
            "throttle window: {} chunks, {} bytes in {:?}, resting {:?} per chunk",
            self.window_chunks,
            self.window_bytes,
            self.window_active,
            self.sleep_per_chunk
        );

        self.window_chunks = 0;
        self.window_bytes = 0;
        self.window_active = Duration::ZERO;
    }
}
