//! Audio-driven master clock with drift detection and gradual correction.
//!
//! The master clock owns the canonical timebase. Audio is the
//! authoritative time source because audio glitches are far more
//! perceptible than a dropped video frame, so the timebase is derived
//! from the audio sample position and video follows it. The render
//! thread reports the video position it actually displayed; when the
//! observed A/V offset exceeds tolerance, the clock accumulates a
//! bounded correction toward the negated offset and folds it into the
//! expected video position it hands back to the frame scheduler. The
//! correction is an exponential approach, never a snap — a hard snap is
//! only available through [`force_sync_correction`](MasterClock::force_sync_correction)
//! for explicit user-triggered resync.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use mt_common::{TimeDuration, TimePoint};

use crate::error::SyncError;

/// Offset history kept for confidence/drift estimation.
const MAX_OFFSET_HISTORY: usize = 1000;
/// Samples needed before a confidence score is computed.
const MIN_SAMPLES_FOR_CONFIDENCE: usize = 5;
/// Trailing window used for the short-term drift-rate estimate.
const DRIFT_RATE_WINDOW: usize = 10;
/// Exponential smoothing factor for the running mean offset.
const OFFSET_SMOOTHING_ALPHA: f64 = 0.1;
/// Accumulated corrections below this are considered settled.
const CORRECTION_ACTIVE_THRESHOLD_MS: f64 = 0.1;

/// Master clock configuration.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MasterClockConfig {
    /// Audio sample rate in Hz.
    pub sample_rate: u32,
    /// Audio buffer size in samples (one position update per buffer).
    pub buffer_size: u32,
    /// Offsets within this tolerance are considered in sync.
    pub drift_tolerance_ms: f64,
    /// Fraction of the remaining drift corrected per audio update (0-1).
    pub correction_speed: f64,
    /// Enable automatic drift detection/correction.
    pub enable_drift_compensation: bool,
    /// Enable internal offset metrics.
    pub enable_quality_monitoring: bool,
}

impl Default for MasterClockConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            buffer_size: 1024,
            drift_tolerance_ms: 5.0,
            correction_speed: 0.1,
            enable_drift_compensation: true,
            enable_quality_monitoring: true,
        }
    }
}

/// Drift compensation state.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct DriftState {
    /// Correction accumulated so far, approaching the negated offset.
    pub accumulated_drift_ms: f64,
    /// Master time of the last drift evaluation.
    pub last_correction_time_us: i64,
    /// Whether a correction is currently being applied.
    pub correction_active: bool,
    /// Instantaneous drift rate estimate.
    pub drift_rate_ms_per_sec: f64,
}

/// The clock's own smoothed view of sync quality.
///
/// This is the actuation-side view used by the correction loop; the
/// independent QA view lives in
/// [`SyncQualityMetrics`](crate::SyncQualityMetrics) and is measured
/// from its own recorded series.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct SyncMetrics {
    pub mean_offset_ms: f64,
    pub max_offset_ms: f64,
    pub min_offset_ms: f64,
    pub drift_rate_ms_per_min: f64,
    pub measurement_count: i64,
    pub confidence_score: f64,
}

struct AudioState {
    position_samples: i64,
    timestamp: Option<Instant>,
    start_time: Option<Instant>,
}

struct VideoState {
    position: TimePoint,
    timestamp: Option<Instant>,
}

struct MetricsState {
    metrics: SyncMetrics,
    recent_offsets: VecDeque<f64>,
}

/// Audio-driven master clock.
///
/// Concurrency: audio, video, drift, and metrics state sit behind four
/// separate mutexes so the audio write path and the video write path
/// never contend on the same lock, and metric reads never block either
/// producer. `master_time_us`, the playback rate, and the running flag
/// are atomics so cheap reads take no lock at all. No code path holds
/// two of these locks at once; positions are copied out under one lock
/// and the offset is computed from the copies.
pub struct MasterClock {
    sample_rate: u32,
    correction_speed: f64,
    quality_monitoring: bool,

    // Runtime knobs, atomic so queries stay lock-free.
    drift_tolerance_bits: AtomicU64,
    drift_compensation_enabled: AtomicBool,

    master_time_us: AtomicI64,
    playback_rate_bits: AtomicU64,
    running: AtomicBool,

    audio: Mutex<AudioState>,
    video: Mutex<VideoState>,
    drift: Mutex<DriftState>,
    metrics: Mutex<MetricsState>,
}

impl MasterClock {
    /// Create a master clock with the given configuration.
    pub fn new(config: MasterClockConfig) -> Self {
        info!(
            sample_rate = config.sample_rate,
            buffer_size = config.buffer_size,
            "Master clock created"
        );
        Self {
            sample_rate: config.sample_rate,
            correction_speed: config.correction_speed,
            quality_monitoring: config.enable_quality_monitoring,
            drift_tolerance_bits: AtomicU64::new(config.drift_tolerance_ms.to_bits()),
            drift_compensation_enabled: AtomicBool::new(config.enable_drift_compensation),
            master_time_us: AtomicI64::new(0),
            playback_rate_bits: AtomicU64::new(1.0f64.to_bits()),
            running: AtomicBool::new(false),
            audio: Mutex::new(AudioState {
                position_samples: 0,
                timestamp: None,
                start_time: None,
            }),
            video: Mutex::new(VideoState {
                position: TimePoint::ZERO,
                timestamp: None,
            }),
            drift: Mutex::new(DriftState::default()),
            metrics: Mutex::new(MetricsState {
                metrics: SyncMetrics::default(),
                recent_offsets: VecDeque::with_capacity(MAX_OFFSET_HISTORY),
            }),
        }
    }

    /// Start the clock, zeroing the timebase, drift state, and metrics.
    ///
    /// Returns `false` (and logs) if already running; callers may
    /// safely retry after `stop()`.
    pub fn start(&self) -> bool {
        if self.running.load(Ordering::Acquire) {
            warn!("Master clock already running");
            return false;
        }

        let now = Instant::now();
        {
            let mut audio = self.audio.lock();
            audio.position_samples = 0;
            audio.timestamp = Some(now);
            audio.start_time = Some(now);
        }
        {
            let mut video = self.video.lock();
            video.position = TimePoint::ZERO;
            video.timestamp = Some(now);
        }
        *self.drift.lock() = DriftState::default();
        {
            let mut metrics = self.metrics.lock();
            metrics.metrics = SyncMetrics::default();
            metrics.recent_offsets.clear();
        }
        self.master_time_us.store(0, Ordering::Relaxed);

        self.running.store(true, Ordering::Release);
        info!("Master clock started");
        true
    }

    /// Stop the clock. No-op if already stopped.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        info!("Master clock stopped");
    }

    /// Re-zero positions and drift without changing running state.
    pub fn reset(&self) {
        let now = Instant::now();
        {
            let mut audio = self.audio.lock();
            audio.position_samples = 0;
            audio.timestamp = Some(now);
            audio.start_time = Some(now);
        }
        {
            let mut video = self.video.lock();
            video.position = TimePoint::ZERO;
            video.timestamp = Some(now);
        }
        *self.drift.lock() = DriftState::default();
        self.master_time_us.store(0, Ordering::Relaxed);

        debug!("Master clock reset");
    }

    /// Whether the clock is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Set the playback rate used to derive master time from the
    /// sample position. Rejects non-positive rates; the previous valid
    /// rate stays in effect.
    pub fn set_playback_rate(&self, rate: f64) -> Result<(), SyncError> {
        if rate <= 0.0 {
            error!(rate, "Invalid playback rate");
            return Err(SyncError::InvalidRate(rate));
        }
        self.playback_rate_bits.store(rate.to_bits(), Ordering::Relaxed);
        debug!(rate, "Playback rate set");
        Ok(())
    }

    /// Current playback rate.
    pub fn playback_rate(&self) -> f64 {
        f64::from_bits(self.playback_rate_bits.load(Ordering::Relaxed))
    }

    /// Update the audio position. The sole write path for the
    /// canonical timebase; called from the audio callback thread once
    /// per buffer. Never blocks on the video/metric locks.
    pub fn update_audio_position(&self, position_samples: i64, timestamp: Instant) {
        if !self.running.load(Ordering::Acquire) {
            return;
        }

        {
            let mut audio = self.audio.lock();
            audio.position_samples = position_samples;
            audio.timestamp = Some(timestamp);
        }

        let rate = self.playback_rate();
        let time_us =
            (position_samples as f64 * 1_000_000.0 / (self.sample_rate as f64 * rate)) as i64;
        self.master_time_us.store(time_us, Ordering::Relaxed);

        if self.drift_compensation_enabled.load(Ordering::Relaxed) {
            self.update_drift_state(position_samples);
        }
    }

    /// Current master time in microseconds. Lock-free.
    pub fn master_time_us(&self) -> i64 {
        self.master_time_us.load(Ordering::Relaxed)
    }

    /// Current audio position as rational time (`samples / sample_rate`).
    pub fn audio_position(&self) -> TimePoint {
        if !self.running.load(Ordering::Acquire) {
            return TimePoint::ZERO;
        }
        let samples = self.audio.lock().position_samples;
        TimePoint::from_samples(samples, self.sample_rate)
    }

    /// Expected video position: the audio position with the active
    /// drift correction applied as a rational time offset.
    pub fn video_position(&self) -> TimePoint {
        if !self.running.load(Ordering::Acquire) {
            return TimePoint::ZERO;
        }

        let audio_pos = self.audio_position();
        if !self.drift_compensation_enabled.load(Ordering::Relaxed) {
            return audio_pos;
        }

        let correction_ms = self.drift.lock().accumulated_drift_ms * self.correction_speed;
        audio_pos + TimeDuration::from_millis_f64(correction_ms)
    }

    /// Report the video position actually displayed, for sync
    /// monitoring. Called from the render thread once per frame.
    pub fn report_video_position(&self, position: TimePoint, timestamp: Instant) {
        if !self.running.load(Ordering::Acquire) {
            return;
        }

        {
            let mut video = self.video.lock();
            video.position = position;
            video.timestamp = Some(timestamp);
        }

        if self.quality_monitoring {
            let audio_pos = self.audio_position();
            let offset_ms = (position.as_secs_f64() - audio_pos.as_secs_f64()) * 1000.0;
            self.update_sync_metrics(offset_ms);
        }
    }

    /// Current A/V offset in milliseconds (positive = video ahead).
    pub fn av_offset_ms(&self) -> f64 {
        if !self.running.load(Ordering::Acquire) {
            return 0.0;
        }
        let video_pos = self.video.lock().position;
        let audio_pos = self.audio_position();
        (video_pos.as_secs_f64() - audio_pos.as_secs_f64()) * 1000.0
    }

    /// Whether the current offset is within the drift tolerance.
    pub fn is_in_sync(&self) -> bool {
        self.av_offset_ms().abs() <= self.drift_tolerance_ms()
    }

    /// Current drift compensation state.
    pub fn drift_state(&self) -> DriftState {
        *self.drift.lock()
    }

    /// The clock's smoothed sync metrics.
    pub fn sync_metrics(&self) -> SyncMetrics {
        self.metrics.lock().metrics
    }

    /// Enable or disable automatic drift compensation.
    pub fn set_drift_compensation_enabled(&self, enabled: bool) {
        self.drift_compensation_enabled.store(enabled, Ordering::Relaxed);
        debug!(enabled, "Drift compensation toggled");
    }

    /// Set the drift tolerance threshold.
    pub fn set_drift_tolerance(&self, tolerance_ms: f64) {
        self.drift_tolerance_bits.store(tolerance_ms.to_bits(), Ordering::Relaxed);
        debug!(tolerance_ms, "Drift tolerance set");
    }

    /// Current drift tolerance in milliseconds.
    pub fn drift_tolerance_ms(&self) -> f64 {
        f64::from_bits(self.drift_tolerance_bits.load(Ordering::Relaxed))
    }

    /// Sample rate the clock was configured with.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Wall-clock age of the last audio position update. A growing age
    /// during playback means the audio callback has stalled.
    pub fn audio_update_age(&self) -> Option<Duration> {
        self.audio.lock().timestamp.map(|t| t.elapsed())
    }

    /// Wall-clock age of the last video position report.
    pub fn video_report_age(&self) -> Option<Duration> {
        self.video.lock().timestamp.map(|t| t.elapsed())
    }

    /// Time since the clock was last started or reset.
    pub fn uptime(&self) -> Option<Duration> {
        self.audio.lock().start_time.map(|t| t.elapsed())
    }

    /// Hard resync: snap the accumulated correction to the negated
    /// current offset. Escape hatch for explicit user-triggered resync,
    /// not for continuous use.
    pub fn force_sync_correction(&self) {
        if !self.running.load(Ordering::Acquire) {
            return;
        }

        let current_offset = self.av_offset_ms();
        let master_time = self.master_time_us();

        let mut drift = self.drift.lock();
        drift.accumulated_drift_ms = -current_offset;
        drift.last_correction_time_us = master_time;
        drift.correction_active = true;

        info!(offset_ms = current_offset, "Force sync correction applied");
    }

    /// Re-evaluate drift from the sample position the audio update just
    /// stored. The offset is recomputed from the passed-in sample count
    /// rather than through the public accessors, so the video lock is
    /// the only one touched (briefly, copy-out) and no lock pair is
    /// ever held.
    fn update_drift_state(&self, position_samples: i64) {
        let video_position = self.video.lock().position;
        let audio_position = TimePoint::from_samples(position_samples, self.sample_rate);
        let current_offset =
            (video_position.as_secs_f64() - audio_position.as_secs_f64()) * 1000.0;

        let current_time = self.master_time_us();
        let tolerance = self.drift_tolerance_ms();

        let mut drift = self.drift.lock();

        if drift.last_correction_time_us > 0 {
            let elapsed_us = current_time - drift.last_correction_time_us;
            if elapsed_us > 0 {
                drift.drift_rate_ms_per_sec = current_offset / (elapsed_us as f64 / 1_000_000.0);
            }
        }

        if current_offset.abs() > tolerance {
            self.apply_drift_correction(&mut drift, current_offset);
        }

        drift.last_correction_time_us = current_time;
    }

    /// Move the accumulated correction a `correction_speed` fraction of
    /// the way toward the negated offset. First-order approach: the
    /// accumulated value converges on `-offset` and cannot overshoot it
    /// in a single step for speeds in (0, 1).
    fn apply_drift_correction(&self, drift: &mut DriftState, current_offset: f64) {
        drift.accumulated_drift_ms +=
            (-current_offset - drift.accumulated_drift_ms) * self.correction_speed;
        drift.correction_active =
            drift.accumulated_drift_ms.abs() > CORRECTION_ACTIVE_THRESHOLD_MS;

        debug!(
            offset_ms = current_offset,
            accumulated_ms = drift.accumulated_drift_ms,
            "Drift correction applied"
        );
    }

    fn update_sync_metrics(&self, offset_ms: f64) {
        let mut state = self.metrics.lock();

        state.recent_offsets.push_back(offset_ms);
        if state.recent_offsets.len() > MAX_OFFSET_HISTORY {
            state.recent_offsets.pop_front();
        }

        state.metrics.measurement_count += 1;
        if state.metrics.measurement_count == 1 {
            state.metrics.mean_offset_ms = offset_ms;
            state.metrics.max_offset_ms = offset_ms;
            state.metrics.min_offset_ms = offset_ms;
        } else {
            state.metrics.mean_offset_ms = OFFSET_SMOOTHING_ALPHA * offset_ms
                + (1.0 - OFFSET_SMOOTHING_ALPHA) * state.metrics.mean_offset_ms;
            state.metrics.max_offset_ms = state.metrics.max_offset_ms.max(offset_ms);
            state.metrics.min_offset_ms = state.metrics.min_offset_ms.min(offset_ms);
        }

        if state.recent_offsets.len() >= DRIFT_RATE_WINDOW {
            let recent_sum: f64 = state
                .recent_offsets
                .iter()
                .rev()
                .take(DRIFT_RATE_WINDOW)
                .sum();
            let recent_mean = recent_sum / DRIFT_RATE_WINDOW as f64;
            // ms-per-minute scaling of the short-term deviation from
            // the long-term mean.
            state.metrics.drift_rate_ms_per_min =
                (recent_mean - state.metrics.mean_offset_ms) * 6.0;
        }

        if state.recent_offsets.len() >= MIN_SAMPLES_FOR_CONFIDENCE {
            let mean = state.metrics.mean_offset_ms;
            let variance = state
                .recent_offsets
                .iter()
                .map(|o| (o - mean) * (o - mean))
                .sum::<f64>()
                / state.recent_offsets.len() as f64;
            state.metrics.confidence_score = 1.0 / (1.0 + variance);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started_clock(config: MasterClockConfig) -> MasterClock {
        let clock = MasterClock::new(config);
        assert!(clock.start());
        clock
    }

    #[test]
    fn start_is_guarded_against_double_start() {
        let clock = MasterClock::new(MasterClockConfig::default());
        assert!(clock.start());
        assert!(!clock.start());
        clock.stop();
        assert!(clock.start());
    }

    #[test]
    fn queries_return_zero_when_stopped() {
        let clock = MasterClock::new(MasterClockConfig::default());
        assert_eq!(clock.audio_position(), TimePoint::ZERO);
        assert_eq!(clock.video_position(), TimePoint::ZERO);
        assert_eq!(clock.av_offset_ms(), 0.0);

        // Updates between stop() and start() are safe no-ops.
        clock.update_audio_position(48000, Instant::now());
        assert_eq!(clock.master_time_us(), 0);
    }

    #[test]
    fn master_time_follows_sample_position() {
        let clock = started_clock(MasterClockConfig::default());
        clock.update_audio_position(48000, Instant::now());
        assert_eq!(clock.master_time_us(), 1_000_000);
        assert_eq!(clock.audio_position(), TimePoint::new(1, 1));
    }

    #[test]
    fn master_time_respects_playback_rate() {
        let clock = started_clock(MasterClockConfig::default());
        clock.set_playback_rate(2.0).unwrap();
        clock.update_audio_position(48000, Instant::now());
        assert_eq!(clock.master_time_us(), 500_000);
    }

    #[test]
    fn invalid_rate_is_rejected_and_previous_kept() {
        let clock = started_clock(MasterClockConfig::default());
        clock.set_playback_rate(1.5).unwrap();
        assert!(clock.set_playback_rate(0.0).is_err());
        assert!(clock.set_playback_rate(-2.0).is_err());
        assert!((clock.playback_rate() - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn perfect_sync_scenario() {
        let clock = started_clock(MasterClockConfig::default());

        // Audio advances 100ms per step; video reports the same position.
        for step in 1..=10 {
            let samples = step * 4800;
            clock.update_audio_position(samples, Instant::now());
            clock.report_video_position(
                TimePoint::from_samples(samples, 48000),
                Instant::now(),
            );
        }

        assert!(clock.is_in_sync());
        let metrics = clock.sync_metrics();
        assert_eq!(metrics.measurement_count, 10);
        assert!(metrics.mean_offset_ms.abs() < 1e-9);
    }

    #[test]
    fn offset_is_video_minus_audio() {
        let clock = started_clock(MasterClockConfig::default());
        clock.update_audio_position(48000, Instant::now());
        // Video 30ms ahead of audio.
        clock.report_video_position(TimePoint::new(1030, 1000), Instant::now());
        assert!((clock.av_offset_ms() - 30.0).abs() < 1e-9);
        assert!(!clock.is_in_sync());
    }

    #[test]
    fn drift_correction_approaches_negated_offset_without_overshoot() {
        let config = MasterClockConfig {
            correction_speed: 0.2,
            ..Default::default()
        };
        let clock = started_clock(config);

        // Constant 30ms video-ahead offset, well beyond the 5ms
        // tolerance. Video is reported before the first audio update so
        // every drift evaluation sees the same 30ms offset.
        clock.report_video_position(TimePoint::new(1030, 1000), Instant::now());

        let mut previous_error = 30.0;
        for _ in 0..50 {
            clock.update_audio_position(48000, Instant::now());
            let accumulated = clock.drift_state().accumulated_drift_ms;

            // Never overshoots -30 and the remaining error shrinks.
            assert!(accumulated >= -30.0 - 1e-9);
            assert!(accumulated <= 0.0);
            let error = (accumulated + 30.0).abs();
            assert!(error <= previous_error + 1e-9);
            previous_error = error;
        }

        assert!((clock.drift_state().accumulated_drift_ms + 30.0).abs() < 0.5);
        assert!(clock.drift_state().correction_active);
    }

    #[test]
    fn video_position_applies_correction_offset() {
        let config = MasterClockConfig {
            correction_speed: 0.5,
            ..Default::default()
        };
        let clock = started_clock(config);

        clock.update_audio_position(48000, Instant::now());
        clock.report_video_position(TimePoint::new(1020, 1000), Instant::now());
        clock.force_sync_correction();

        // accumulated = -20ms; applied correction = -20 * 0.5 = -10ms.
        let video = clock.video_position();
        let expected = TimePoint::new(1, 1) + TimeDuration::from_millis_f64(-10.0);
        assert_eq!(video, expected);
        assert!((video.as_secs_f64() - 0.990).abs() < 1e-6);
    }

    #[test]
    fn video_position_without_compensation_tracks_audio() {
        let config = MasterClockConfig {
            enable_drift_compensation: false,
            ..Default::default()
        };
        let clock = started_clock(config);
        clock.update_audio_position(24000, Instant::now());
        assert_eq!(clock.video_position(), TimePoint::new(1, 2));
    }

    #[test]
    fn force_sync_snaps_accumulated_drift() {
        let clock = started_clock(MasterClockConfig::default());
        clock.update_audio_position(48000, Instant::now());
        clock.report_video_position(TimePoint::new(1050, 1000), Instant::now());

        clock.force_sync_correction();
        let drift = clock.drift_state();
        assert!((drift.accumulated_drift_ms + 50.0).abs() < 1e-9);
        assert!(drift.correction_active);
    }

    #[test]
    fn reset_rezeros_without_stopping() {
        let clock = started_clock(MasterClockConfig::default());
        clock.update_audio_position(96000, Instant::now());
        clock.report_video_position(TimePoint::new(2, 1), Instant::now());

        clock.reset();
        assert!(clock.is_running());
        assert_eq!(clock.master_time_us(), 0);
        assert_eq!(clock.audio_position(), TimePoint::ZERO);
        assert!((clock.drift_state().accumulated_drift_ms).abs() < 1e-9);
    }

    #[test]
    fn metrics_track_min_max_and_confidence() {
        let clock = started_clock(MasterClockConfig::default());
        clock.update_audio_position(48000, Instant::now());

        for offset_ms in [2.0f64, -3.0, 4.0, -1.0, 2.0, 3.0] {
            let video = TimePoint::new(1_000_000 + (offset_ms * 1000.0) as i64, 1_000_000);
            clock.report_video_position(video, Instant::now());
        }

        let metrics = clock.sync_metrics();
        assert_eq!(metrics.measurement_count, 6);
        assert!((metrics.max_offset_ms - 4.0).abs() < 1e-9);
        assert!((metrics.min_offset_ms + 3.0).abs() < 1e-9);
        assert!(metrics.confidence_score > 0.0 && metrics.confidence_score <= 1.0);
    }

    #[test]
    fn update_ages_track_producers() {
        let clock = MasterClock::new(MasterClockConfig::default());
        assert!(clock.audio_update_age().is_none());
        assert!(clock.video_report_age().is_none());
        assert!(clock.uptime().is_none());

        assert!(clock.start());
        clock.update_audio_position(4800, Instant::now());
        clock.report_video_position(TimePoint::new(1, 10), Instant::now());

        assert!(clock.audio_update_age().is_some());
        assert!(clock.video_report_age().is_some());
        assert!(clock.uptime().is_some());
    }

    #[test]
    fn tolerance_knob_changes_in_sync_verdict() {
        let clock = started_clock(MasterClockConfig::default());
        clock.update_audio_position(48000, Instant::now());
        clock.report_video_position(TimePoint::new(1008, 1000), Instant::now());

        assert!(!clock.is_in_sync());
        clock.set_drift_tolerance(10.0);
        assert!(clock.is_in_sync());
    }
}
