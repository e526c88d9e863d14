//! Audio sample clock: the producer-side position source.
//!
//! The audio output callback advances this clock by the number of
//! samples it consumed; the playback loop then forwards
//! [`position_samples`](AudioClock::position_samples) into
//! [`MasterClock::update_audio_position`](crate::MasterClock::update_audio_position).
//! Everything here is lock-free so the callback never blocks or
//! allocates.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use mt_common::TimePoint;

/// Lock-free sample-position clock driven by the audio callback.
///
/// Tracks samples consumed by the output device plus a base offset in
/// samples (for seek support) and converts the sum to a rational
/// timeline position.
///
/// Thread-safe: all operations use atomics, so the clock can be
/// advanced from the audio thread and read from the render thread.
/// Relaxed ordering is sufficient — readers polling a position a few
/// microseconds stale is inherent to A/V sync measurement.
pub struct AudioClock {
    /// Sample rate in Hz.
    sample_rate: u32,
    /// Samples consumed since the last seek/reset.
    samples_played: Arc<AtomicU64>,
    /// Base position in samples, set on seek.
    base_samples: Arc<AtomicI64>,
    /// Whether the clock is running.
    running: Arc<AtomicBool>,
}

impl AudioClock {
    /// Create a new sample clock for the given sample rate.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            samples_played: Arc::new(AtomicU64::new(0)),
            base_samples: Arc::new(AtomicI64::new(0)),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Advance the clock after the output callback consumed `count`
    /// samples. Hot path: a single relaxed fetch-add.
    pub fn advance(&self, count: u64) {
        self.samples_played.fetch_add(count, Ordering::Relaxed);
    }

    /// Absolute position in samples (base + consumed).
    ///
    /// This is the value fed to the master clock's audio-position
    /// update.
    pub fn position_samples(&self) -> i64 {
        let played = self.samples_played.load(Ordering::Relaxed) as i64;
        self.base_samples.load(Ordering::Relaxed) + played
    }

    /// Current timeline position as rational time.
    pub fn current_time(&self) -> TimePoint {
        TimePoint::from_samples(self.position_samples(), self.sample_rate)
    }

    /// Seek: set the base position and restart the sample counter.
    ///
    /// The target is rounded to the nearest whole sample.
    pub fn seek(&self, position: TimePoint) {
        let samples = (position.as_secs_f64() * self.sample_rate as f64).round() as i64;
        self.base_samples.store(samples, Ordering::Relaxed);
        self.samples_played.store(0, Ordering::Relaxed);
    }

    /// Reset to position zero.
    pub fn reset(&self) {
        self.base_samples.store(0, Ordering::Relaxed);
        self.samples_played.store(0, Ordering::Relaxed);
    }

    /// Start the clock.
    pub fn start(&self) {
        self.running.store(true, Ordering::Relaxed);
    }

    /// Stop the clock.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// Whether the clock is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Sample rate this clock was configured with.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Clone for AudioClock {
    fn clone(&self) -> Self {
        Self {
            sample_rate: self.sample_rate,
            samples_played: Arc::clone(&self.samples_played),
            base_samples: Arc::clone(&self.base_samples),
            running: Arc::clone(&self.running),
        }
    }
}
